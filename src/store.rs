//! Output-tree state: the filesystem is the only record of what has been generated.

use std::path::{Path, PathBuf};

use crate::{codec::list_frames, foundation::error::PixelartResult};

/// Completion state of one animation directory.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnimationStatus {
    Missing,
    /// Some frames exist but fewer than the completion threshold.
    Partial(usize),
    Complete(usize),
}

impl AnimationStatus {
    pub fn is_complete(self) -> bool {
        matches!(self, AnimationStatus::Complete(_))
    }

    pub fn frame_count(self) -> usize {
        match self {
            AnimationStatus::Missing => 0,
            AnimationStatus::Partial(n) | AnimationStatus::Complete(n) => n,
        }
    }
}

/// Classify `dir` against a completion threshold of `required` frame files.
pub fn inspect(dir: &Path, required: usize) -> PixelartResult<AnimationStatus> {
    let count = list_frames(dir)?.len();
    Ok(match count {
        0 => AnimationStatus::Missing,
        n if n >= required => AnimationStatus::Complete(n),
        n => AnimationStatus::Partial(n),
    })
}

/// `<kind dir>/<name>.gif`, beside the frame directory.
pub fn gif_path(frame_dir: &Path, name: &str) -> PathBuf {
    frame_dir
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(format!("{name}.gif"))
}

pub fn static_path(static_dir: &Path, name: &str) -> PathBuf {
    static_dir.join(format!("{name}.png"))
}
