use std::{
    fs::File,
    io::{BufWriter, Write as _},
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use image::{RgbaImage, imageops::FilterType};

use crate::{
    codec::{frame_path, list_frames},
    foundation::error::{PixelartError, PixelartResult},
};

/// Last frame of a 16-frame single: the finished shape, before any emote frames.
pub const DEFAULT_STATIC_FRAME: usize = 15;

// 1 = slowest / best NeuQuant quality. Frames with <=256 colours get an exact palette
// regardless.
const QUANTIZE_SPEED: i32 = 1;

fn ensure_parent_dir(path: &Path) -> PixelartResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

fn load_upscaled(path: &Path, size: u32) -> PixelartResult<RgbaImage> {
    let img = image::open(path).with_context(|| format!("decode frame '{}'", path.display()))?;
    // Nearest keeps hard pixel edges; any smoothing filter would blur the art.
    Ok(image::imageops::resize(
        &img.to_rgba8(),
        size,
        size,
        FilterType::Nearest,
    ))
}

fn gif_side(upscale_size: u32) -> PixelartResult<u16> {
    match u16::try_from(upscale_size) {
        Ok(0) | Err(_) => Err(PixelartError::validation(format!(
            "upscale size must be 1..={}, got {upscale_size}",
            u16::MAX
        ))),
        Ok(side) => Ok(side),
    }
}

/// GIF delays are in centiseconds.
fn delay_centis(frame_duration_ms: u32) -> u16 {
    u16::try_from(frame_duration_ms.saturating_add(5) / 10).unwrap_or(u16::MAX)
}

fn gif_err(e: gif::EncodingError) -> PixelartError {
    PixelartError::assembly(format!("gif encoding failed: {e}"))
}

/// Assemble every frame file in `frame_dir` into an infinitely looping GIF.
///
/// Frames are upscaled to `upscale_size` square with nearest-neighbour sampling and each
/// one clears the canvas before the next is drawn, so transparent regions never ghost.
/// Returns `Ok(None)` without writing anything when the directory has no frames.
pub fn frames_to_gif(
    frame_dir: &Path,
    out_path: &Path,
    upscale_size: u32,
    frame_duration_ms: u32,
) -> PixelartResult<Option<PathBuf>> {
    let files = list_frames(frame_dir)?;
    if files.is_empty() {
        return Ok(None);
    }
    let side = gif_side(upscale_size)?;

    let frames = files
        .iter()
        .map(|p| load_upscaled(p, upscale_size))
        .collect::<PixelartResult<Vec<_>>>()?;

    ensure_parent_dir(out_path)?;
    let file = File::create(out_path)
        .with_context(|| format!("create gif '{}'", out_path.display()))?;

    let mut encoder = gif::Encoder::new(BufWriter::new(file), side, side, &[]).map_err(gif_err)?;
    encoder.set_repeat(gif::Repeat::Infinite).map_err(gif_err)?;

    let delay = delay_centis(frame_duration_ms);
    for img in frames {
        let mut rgba = img.into_raw();
        let mut frame = gif::Frame::from_rgba_speed(side, side, &mut rgba, QUANTIZE_SPEED);
        frame.delay = delay;
        frame.dispose = gif::DisposalMethod::Background;
        encoder.write_frame(&frame).map_err(gif_err)?;
    }

    let mut writer = encoder
        .into_inner()
        .with_context(|| format!("finish gif '{}'", out_path.display()))?;
    writer
        .flush()
        .with_context(|| format!("flush gif '{}'", out_path.display()))?;

    tracing::debug!(
        frames = files.len(),
        path = %out_path.display(),
        "assembled gif"
    );
    Ok(Some(out_path.to_path_buf()))
}

/// Write one upscaled frame as a static PNG.
///
/// Uses `frame_<frame_index>` when present, otherwise the last frame by name. Returns
/// `Ok(None)` only when the directory has no frames at all.
pub fn static_fallback(
    frame_dir: &Path,
    out_path: &Path,
    upscale_size: u32,
    frame_index: usize,
) -> PixelartResult<Option<PathBuf>> {
    let preferred = frame_path(frame_dir, frame_index);
    let source = if preferred.is_file() {
        preferred
    } else {
        match list_frames(frame_dir)?.pop() {
            Some(last) => last,
            None => return Ok(None),
        }
    };

    let img = load_upscaled(&source, upscale_size)?;
    ensure_parent_dir(out_path)?;
    img.save_with_format(out_path, image::ImageFormat::Png)
        .with_context(|| format!("write png '{}'", out_path.display()))?;

    Ok(Some(out_path.to_path_buf()))
}
