use std::path::{Path, PathBuf};

use anyhow::Context as _;
use tempfile::NamedTempFile;

use crate::{
    assemble::DEFAULT_STATIC_FRAME,
    codec::{EncodedFrame, frame_path},
    config::StepSpec,
    foundation::error::PixelartResult,
};

/// Step `from` values that mean "start from the project reference".
pub const BASE_REFERENCE_ALIASES: [&str; 3] = ["reference", "base", "liquid"];

/// Image chosen as input for one sequence step.
#[derive(Debug)]
pub enum ResolvedReference {
    Project(PathBuf),
    /// Terminal frame of a finished single.
    Single(PathBuf),
    /// Last in-flight frame of the current sequence, written to a temp file that is removed
    /// when this value is dropped.
    Transient(NamedTempFile),
}

impl ResolvedReference {
    pub fn path(&self) -> &Path {
        match self {
            ResolvedReference::Project(p) | ResolvedReference::Single(p) => p,
            ResolvedReference::Transient(f) => f.path(),
        }
    }
}

pub fn is_base_alias(from: &str) -> bool {
    from.is_empty() || BASE_REFERENCE_ALIASES.contains(&from)
}

/// Pick the reference image for `step`.
///
/// Priority: base alias -> project reference; a finished single named by `from`
/// (its `frame_15.png`); the latest frame produced earlier in this sequence; finally the
/// project reference.
pub fn resolve_step_reference(
    step: &StepSpec,
    project_reference: &Path,
    singles_dir: &Path,
    previous_frames: &[EncodedFrame],
) -> PixelartResult<ResolvedReference> {
    let from = step.from.trim();
    if is_base_alias(from) {
        return Ok(ResolvedReference::Project(project_reference.to_path_buf()));
    }

    let single_frame = frame_path(&singles_dir.join(from), DEFAULT_STATIC_FRAME);
    if single_frame.is_file() {
        return Ok(ResolvedReference::Single(single_frame));
    }

    if let Some(last) = previous_frames.last() {
        let tmp = tempfile::Builder::new()
            .prefix("pixelart_ref_")
            .suffix(".png")
            .tempfile()
            .context("create temporary reference frame")?;
        last.write_to(tmp.path())?;
        return Ok(ResolvedReference::Transient(tmp));
    }

    Ok(ResolvedReference::Project(project_reference.to_path_buf()))
}
