use std::time::Duration;

/// Pause policy applied after every remote call.
pub trait Pacer {
    fn pause(&mut self);
}

/// Blocking sleep of a fixed interval.
#[derive(Clone, Copy, Debug)]
pub struct FixedDelay {
    pub interval: Duration,
}

impl FixedDelay {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Default for FixedDelay {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

impl Pacer for FixedDelay {
    fn pause(&mut self) {
        if !self.interval.is_zero() {
            std::thread::sleep(self.interval);
        }
    }
}

/// Never waits.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoDelay;

impl Pacer for NoDelay {
    fn pause(&mut self) {}
}
