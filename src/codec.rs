use std::path::{Path, PathBuf};

use anyhow::Context as _;
use base64::Engine as _;

use crate::foundation::error::{PixelartError, PixelartResult};

pub const FRAME_PREFIX: &str = "frame_";
pub const FRAME_EXT: &str = "png";

/// One frame in transfer encoding, shaped like the PixelLab image objects
/// (`{"type": "base64", "base64": "...", "format": "png"}`).
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct EncodedFrame {
    #[serde(rename = "type", default = "default_kind")]
    pub kind: String,
    pub base64: String,
    #[serde(default = "default_format")]
    pub format: String,
}

fn default_kind() -> String {
    "base64".to_string()
}

fn default_format() -> String {
    FRAME_EXT.to_string()
}

impl EncodedFrame {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            kind: default_kind(),
            base64: base64::engine::general_purpose::STANDARD.encode(bytes),
            format: default_format(),
        }
    }

    pub fn from_file(path: &Path) -> PixelartResult<Self> {
        let bytes =
            std::fs::read(path).with_context(|| format!("read frame '{}'", path.display()))?;
        Ok(Self::from_bytes(&bytes))
    }

    pub fn decode(&self) -> PixelartResult<Vec<u8>> {
        base64::engine::general_purpose::STANDARD
            .decode(self.base64.as_bytes())
            .map_err(|e| PixelartError::codec(format!("invalid base64 frame payload: {e}")))
    }

    /// Decode and write the raw bytes to `path`.
    pub fn write_to(&self, path: &Path) -> PixelartResult<()> {
        let bytes = self.decode()?;
        std::fs::write(path, bytes).with_context(|| format!("write frame '{}'", path.display()))?;
        Ok(())
    }
}

pub fn frame_file_name(index: usize) -> String {
    format!("{FRAME_PREFIX}{index:02}.{FRAME_EXT}")
}

pub fn frame_path(dir: &Path, index: usize) -> PathBuf {
    dir.join(frame_file_name(index))
}

/// Index encoded in a frame file name, e.g. `frame_07.png` -> 7.
pub fn frame_index(path: &Path) -> Option<usize> {
    let name = path.file_name()?.to_str()?;
    let digits = name
        .strip_prefix(FRAME_PREFIX)?
        .strip_suffix(FRAME_EXT)?
        .strip_suffix('.')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn is_frame_file_name(name: &str) -> bool {
    name.starts_with(FRAME_PREFIX) && name.ends_with(&format!(".{FRAME_EXT}"))
}

/// Write `frames` as `frame_<NN>.png` into `dir`, numbering from `start_index`.
///
/// The directory (and parents) is created when absent. Payloads are decoded but not
/// checked as images.
pub fn persist_frames(
    frames: &[EncodedFrame],
    dir: &Path,
    start_index: usize,
) -> PixelartResult<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("create frame dir '{}'", dir.display()))?;

    let mut paths = Vec::with_capacity(frames.len());
    for (i, frame) in frames.iter().enumerate() {
        let path = frame_path(dir, start_index + i);
        frame.write_to(&path)?;
        paths.push(path);
    }
    Ok(paths)
}

/// Frame files in `dir` in frame order. Up to `frame_99` this is plain name order;
/// longer sequences keep numeric order. A missing directory lists as empty.
pub fn list_frames(dir: &Path) -> PixelartResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut out = Vec::new();
    let entries =
        std::fs::read_dir(dir).with_context(|| format!("list frames in '{}'", dir.display()))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("list frames in '{}'", dir.display()))?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if is_frame_file_name(name) && entry.path().is_file() {
            out.push(entry.path());
        }
    }
    out.sort_by(|a, b| (frame_index(a), a).cmp(&(frame_index(b), b)));
    Ok(out)
}
