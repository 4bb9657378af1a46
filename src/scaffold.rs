use std::path::{Path, PathBuf};

use anyhow::Context as _;
use image::{Rgba, RgbaImage};

use crate::foundation::error::PixelartResult;

pub const REFERENCE_FILE: &str = "reference.png";
pub const CONFIG_FILE: &str = "config.yaml";

/// Files a scaffolded project ended up with; `created_*` is false when the file was
/// already there and left untouched.
#[derive(Clone, Debug)]
pub struct ScaffoldedProject {
    pub dir: PathBuf,
    pub reference: PathBuf,
    pub config: PathBuf,
    pub created_reference: bool,
    pub created_config: bool,
}

/// 64x64 transparent canvas with a gold disc (radius 20) that darkens toward its rim.
pub fn gold_circle_reference() -> RgbaImage {
    let (cx, cy, r) = (32.0f64, 32.0f64, 20.0f64);
    RgbaImage::from_fn(64, 64, |x, y| {
        let dist = ((f64::from(x) - cx).powi(2) + (f64::from(y) - cy).powi(2)).sqrt();
        if dist <= r {
            let brightness = (255.0 - dist * 3.0).clamp(0.0, 255.0) as u8;
            Rgba([255, 215, brightness / 2, 255])
        } else {
            Rgba([0, 0, 0, 0])
        }
    })
}

pub fn starter_config(name: &str) -> String {
    format!(
        r#"# {name} - pixel art pipeline config

project:
  name: "{name}"
  reference: "{REFERENCE_FILE}"
  output_dir: "./output"
  frame_size: 64
  upscale_size: 512
  frame_duration_ms: 200

singles:
  flame:
    prompt: "golden circle transforms into a dancing flame"
  star:
    prompt: "golden circle transforms into a twinkling star with five points"
  heart:
    prompt: "golden circle transforms into a glowing heart shape"
  sword:
    prompt: "golden circle transforms into a pixel art sword standing upright"
  crown:
    prompt: "golden circle transforms into a royal crown with pointed tips"

emotes:
  flame:
    prompt: "a golden flame gently sways left and right, subtle idle animation"
  star:
    prompt: "a golden star twinkles, its points glowing brighter then dimmer"
  heart:
    prompt: "a golden heart pulses gently like a slow heartbeat"

chains:
  flame_to_heart:
    label: "Fire to Love"
    steps:
      - from: reference
        to: flame
        prompt: "golden circle transforms into a dancing flame"
      - from: flame
        to: heart
        prompt: "the flame softens and reshapes into a glowing heart"

cycles:
  cycle_flame:
    shape: flame
    forward_prompt: "golden circle transforms into a dancing flame"
    reverse_prompt: "flame dissolves back into a golden circle"
"#
    )
}

/// Create `<parent>/<name>/` with a reference image and starter config. Existing files
/// are kept as they are.
pub fn init_project(parent: &Path, name: &str) -> PixelartResult<ScaffoldedProject> {
    let dir = parent.join(name);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("create project dir '{}'", dir.display()))?;

    let reference = dir.join(REFERENCE_FILE);
    let created_reference = !reference.exists();
    if created_reference {
        gold_circle_reference()
            .save_with_format(&reference, image::ImageFormat::Png)
            .with_context(|| format!("write reference '{}'", reference.display()))?;
    }

    let config = dir.join(CONFIG_FILE);
    let created_config = !config.exists();
    if created_config {
        std::fs::write(&config, starter_config(name))
            .with_context(|| format!("write config '{}'", config.display()))?;
    }

    Ok(ScaffoldedProject {
        dir,
        reference,
        config,
        created_reference,
        created_config,
    })
}
