use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use anyhow::Context as _;

use crate::foundation::error::{PixelartError, PixelartResult};

/// Approximate PixelLab price of one 16-frame generation, in USD.
pub const COST_PER_CALL_USD: f64 = 0.16;

/// Frames returned by one generation call.
pub const FRAMES_PER_STEP: usize = 16;

/// Largest GIF canvas side.
pub const MAX_UPSCALE_SIZE: u32 = u16::MAX as u32;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AnimationKind {
    Singles,
    Emotes,
    Chains,
    Journeys,
    Cycles,
}

impl AnimationKind {
    pub const ALL: [AnimationKind; 5] = [
        AnimationKind::Singles,
        AnimationKind::Emotes,
        AnimationKind::Chains,
        AnimationKind::Journeys,
        AnimationKind::Cycles,
    ];

    /// Directory name under the output root (also the YAML catalog key).
    pub fn dir_name(self) -> &'static str {
        match self {
            AnimationKind::Singles => "singles",
            AnimationKind::Emotes => "emotes",
            AnimationKind::Chains => "chains",
            AnimationKind::Journeys => "journeys",
            AnimationKind::Cycles => "cycles",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SingleSpec {
    #[serde(default)]
    pub prompt: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EmoteSpec {
    #[serde(default)]
    pub prompt: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StepSpec {
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub to: String,
    #[serde(default)]
    pub prompt: Option<String>,
}

/// Chains and journeys share this shape.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SequenceSpec {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub steps: Vec<StepSpec>,
}

impl SequenceSpec {
    pub fn expected_frames(&self) -> usize {
        self.steps.len() * FRAMES_PER_STEP
    }
}

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CycleSpec {
    #[serde(default)]
    pub shape: Option<String>,
    #[serde(default)]
    pub forward_prompt: Option<String>,
    #[serde(default)]
    pub reverse_prompt: Option<String>,
}

#[derive(Clone, Debug, serde::Deserialize)]
#[serde(default)]
struct ProjectSection {
    name: String,
    reference: PathBuf,
    output_dir: PathBuf,
    frame_size: u32,
    upscale_size: u32,
    frame_duration_ms: u32,
}

impl Default for ProjectSection {
    fn default() -> Self {
        Self {
            name: "untitled".to_string(),
            reference: PathBuf::from("reference.png"),
            output_dir: PathBuf::from("./output"),
            frame_size: 64,
            upscale_size: 512,
            frame_duration_ms: 200,
        }
    }
}

#[derive(Clone, Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    project: ProjectSection,
    singles: BTreeMap<String, SingleSpec>,
    emotes: BTreeMap<String, EmoteSpec>,
    chains: BTreeMap<String, SequenceSpec>,
    journeys: BTreeMap<String, SequenceSpec>,
    cycles: BTreeMap<String, CycleSpec>,
}

/// Parsed pipeline configuration with paths resolved against the config file's directory.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub name: String,
    pub reference: PathBuf,
    pub output_dir: PathBuf,
    pub frame_size: u32,
    pub upscale_size: u32,
    pub frame_duration_ms: u32,
    pub singles: BTreeMap<String, SingleSpec>,
    pub emotes: BTreeMap<String, EmoteSpec>,
    pub chains: BTreeMap<String, SequenceSpec>,
    pub journeys: BTreeMap<String, SequenceSpec>,
    pub cycles: BTreeMap<String, CycleSpec>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AnimationCounts {
    pub singles: usize,
    pub emotes: usize,
    /// Chain steps (one API call each).
    pub chains: usize,
    /// Journey steps (one API call each).
    pub journeys: usize,
    /// One reverse call per cycle; forward singles are assumed reused.
    pub cycles: usize,
}

impl AnimationCounts {
    pub fn total_api_calls(&self) -> usize {
        self.singles + self.emotes + self.chains + self.journeys + self.cycles
    }
}

/// Load a YAML pipeline config.
///
/// Errors when the file is missing or the document is empty / not a mapping. Field-level
/// problems are reported separately by [`PipelineConfig::validate`].
pub fn load_config(path: impl AsRef<Path>) -> PixelartResult<PipelineConfig> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(PixelartError::validation(format!(
            "config file not found: {}",
            path.display()
        )));
    }
    let path = std::fs::canonicalize(path)
        .with_context(|| format!("resolve config path '{}'", path.display()))?;
    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("read config '{}'", path.display()))?;
    let config_dir = path.parent().unwrap_or_else(|| Path::new("."));
    PipelineConfig::from_yaml_str(&text, config_dir).map_err(|e| match e {
        PixelartError::Validation(msg) => {
            PixelartError::validation(format!("{msg}: {}", path.display()))
        }
        other => other,
    })
}

impl PipelineConfig {
    pub fn from_yaml_str(text: &str, config_dir: &Path) -> PixelartResult<Self> {
        let value: serde_yaml::Value = serde_yaml::from_str(text)
            .map_err(|e| PixelartError::validation(format!("invalid config file ({e})")))?;
        if !value.is_mapping() {
            return Err(PixelartError::validation("invalid config file"));
        }
        let file: ConfigFile = serde_yaml::from_value(value)
            .map_err(|e| PixelartError::validation(format!("invalid config file ({e})")))?;
        Ok(Self::from_file(file, config_dir))
    }

    fn from_file(file: ConfigFile, config_dir: &Path) -> Self {
        let ConfigFile {
            project,
            singles,
            emotes,
            chains,
            journeys,
            cycles,
        } = file;

        Self {
            name: project.name,
            reference: normalize_join(config_dir, &project.reference),
            output_dir: normalize_join(config_dir, &project.output_dir),
            frame_size: project.frame_size,
            upscale_size: project.upscale_size,
            frame_duration_ms: project.frame_duration_ms,
            singles,
            emotes,
            chains,
            journeys,
            cycles,
        }
    }

    pub fn kind_dir(&self, kind: AnimationKind) -> PathBuf {
        self.output_dir.join(kind.dir_name())
    }

    pub fn singles_dir(&self) -> PathBuf {
        self.kind_dir(AnimationKind::Singles)
    }

    pub fn emotes_dir(&self) -> PathBuf {
        self.kind_dir(AnimationKind::Emotes)
    }

    pub fn chains_dir(&self) -> PathBuf {
        self.kind_dir(AnimationKind::Chains)
    }

    pub fn journeys_dir(&self) -> PathBuf {
        self.kind_dir(AnimationKind::Journeys)
    }

    pub fn cycles_dir(&self) -> PathBuf {
        self.kind_dir(AnimationKind::Cycles)
    }

    pub fn static_dir(&self) -> PathBuf {
        self.output_dir.join("static")
    }

    /// Collect every configuration problem. An empty list means the config is usable.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if !self.reference.exists() {
            errors.push(format!(
                "Reference image not found: {}",
                self.reference.display()
            ));
        }
        if !(16..=256).contains(&self.frame_size) {
            errors.push(format!(
                "frame_size must be 16-256, got {}",
                self.frame_size
            ));
        }
        if self.upscale_size < self.frame_size {
            errors.push(format!(
                "upscale_size ({}) must be >= frame_size ({})",
                self.upscale_size, self.frame_size
            ));
        }
        if self.upscale_size > MAX_UPSCALE_SIZE {
            errors.push(format!(
                "upscale_size must be <= {MAX_UPSCALE_SIZE}, got {}",
                self.upscale_size
            ));
        }
        if self.frame_duration_ms < 10 {
            errors.push(format!(
                "frame_duration_ms must be >= 10, got {}",
                self.frame_duration_ms
            ));
        }

        for (name, entry) in &self.singles {
            check_dir_name("singles", name, &mut errors);
            if is_blank(&entry.prompt) {
                errors.push(format!("singles.{name}: missing 'prompt'"));
            }
        }
        for (name, entry) in &self.emotes {
            check_dir_name("emotes", name, &mut errors);
            if is_blank(&entry.prompt) {
                errors.push(format!("emotes.{name}: missing 'prompt'"));
            }
        }
        validate_sequences("chains", &self.chains, &mut errors);
        validate_sequences("journeys", &self.journeys, &mut errors);

        for (name, entry) in &self.cycles {
            check_dir_name("cycles", name, &mut errors);
            match entry.shape.as_deref().map(str::trim) {
                None | Some("") => errors.push(format!("cycles.{name}: missing 'shape'")),
                Some(shape) if !is_plain_name(shape) => errors.push(format!(
                    "cycles.{name}: 'shape' must be a plain name, got '{shape}'"
                )),
                Some(_) => {}
            }
            if is_blank(&entry.forward_prompt) {
                errors.push(format!("cycles.{name}: missing 'forward_prompt'"));
            }
            if is_blank(&entry.reverse_prompt) {
                errors.push(format!("cycles.{name}: missing 'reverse_prompt'"));
            }
        }

        errors
    }

    /// Like [`PipelineConfig::validate`] but as a `Result`.
    pub fn ensure_valid(&self) -> PixelartResult<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(PixelartError::Config(errors))
        }
    }

    pub fn count_animations(&self) -> AnimationCounts {
        AnimationCounts {
            singles: self.singles.len(),
            emotes: self.emotes.len(),
            chains: self.chains.values().map(|c| c.steps.len()).sum(),
            journeys: self.journeys.values().map(|j| j.steps.len()).sum(),
            cycles: self.cycles.len(),
        }
    }

    pub fn estimate_cost(&self) -> f64 {
        self.count_animations().total_api_calls() as f64 * COST_PER_CALL_USD
    }
}

fn validate_sequences(
    section: &str,
    sequences: &BTreeMap<String, SequenceSpec>,
    errors: &mut Vec<String>,
) {
    for (name, entry) in sequences {
        check_dir_name(section, name, errors);
        if entry.steps.len() < 2 {
            errors.push(format!("{section}.{name}: needs at least 2 steps"));
        }
        for (i, step) in entry.steps.iter().enumerate() {
            if is_blank(&step.prompt) {
                errors.push(format!("{section}.{name}.steps[{i}]: missing 'prompt'"));
            }
            let from = step.from.trim();
            if !from.is_empty() && !is_plain_name(from) {
                errors.push(format!(
                    "{section}.{name}.steps[{i}]: 'from' must be a plain name, got '{from}'"
                ));
            }
        }
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().is_none_or(|s| s.trim().is_empty())
}

/// A single path component that stays inside its parent directory.
fn is_plain_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && !name.contains("..")
}

fn check_dir_name(section: &str, name: &str, errors: &mut Vec<String>) {
    if !is_plain_name(name) {
        errors.push(format!("{section}: '{name}' is not a valid animation name"));
    }
}

/// Join `rel` onto `base` and fold away `.` / `..` components without touching the
/// filesystem (the target may not exist yet).
fn normalize_join(base: &Path, rel: &Path) -> PathBuf {
    use std::path::Component;

    let mut out = PathBuf::new();
    for comp in base.join(rel).components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
