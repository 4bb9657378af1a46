//! Batch generation across the five animation kinds.
//!
//! Everything runs sequentially: one remote call at a time, a pacing pause after each
//! call, and the output directory tree as the only record of progress. Re-running a
//! batch skips every animation that already meets its frame threshold.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use tracing::{error, info, warn};

use crate::{
    assemble::{DEFAULT_STATIC_FRAME, frames_to_gif, static_fallback},
    client::{AnimationGenerator, Generation, GenerationRequest},
    codec::{EncodedFrame, frame_index, frame_path, list_frames, persist_frames},
    config::{AnimationKind, COST_PER_CALL_USD, FRAMES_PER_STEP, PipelineConfig, SequenceSpec},
    foundation::error::PixelartResult,
    pacing::Pacer,
    resolve::resolve_step_reference,
    store::{AnimationStatus, gif_path, inspect, static_path},
};

/// Outcome of one orchestrator run.
#[derive(Clone, Debug, Default)]
pub struct RunReport {
    /// Sum of the costs of successful remote calls, in USD.
    pub cost_usd: f64,
    pub calls_succeeded: usize,
    pub calls_failed: usize,
    /// Animations whose frames were written during this run.
    pub generated: Vec<(AnimationKind, String)>,
    pub skipped: Vec<(AnimationKind, String)>,
}

impl RunReport {
    pub fn total_calls(&self) -> usize {
        self.calls_succeeded + self.calls_failed
    }
}

pub struct Orchestrator<'a> {
    config: &'a PipelineConfig,
    generator: &'a mut dyn AnimationGenerator,
    pacer: &'a mut dyn Pacer,
    report: RunReport,
}

impl<'a> Orchestrator<'a> {
    /// Fails with [`PixelartError::Config`](crate::PixelartError::Config) listing every
    /// problem when the config is not valid; no remote call is made in that case.
    pub fn new(
        config: &'a PipelineConfig,
        generator: &'a mut dyn AnimationGenerator,
        pacer: &'a mut dyn Pacer,
    ) -> PixelartResult<Self> {
        config.ensure_valid()?;
        Ok(Self {
            config,
            generator,
            pacer,
            report: RunReport::default(),
        })
    }

    pub fn report(&self) -> &RunReport {
        &self.report
    }

    pub fn into_report(self) -> RunReport {
        self.report
    }

    /// Generate the requested kinds in catalog order (singles, emotes, chains, journeys,
    /// cycles). `targets` narrows singles, emotes and journeys by name; empty means all.
    #[tracing::instrument(skip_all, fields(project = %self.config.name))]
    pub fn run(&mut self, kinds: &[AnimationKind], targets: &[String]) -> f64 {
        for kind in AnimationKind::ALL {
            if !kinds.contains(&kind) {
                continue;
            }
            match kind {
                AnimationKind::Singles => self.generate_singles(targets),
                AnimationKind::Emotes => self.generate_emotes(targets),
                AnimationKind::Chains => self.generate_chains(),
                AnimationKind::Journeys => self.generate_journeys(targets),
                AnimationKind::Cycles => self.generate_cycles(),
            };
        }
        info!(
            cost_usd = self.report.cost_usd,
            calls = self.report.total_calls(),
            failed = self.report.calls_failed,
            "batch complete"
        );
        self.report.cost_usd
    }

    /// One generation call followed by the pacing pause. Only a successful call adds cost.
    fn call(&mut self, reference: &Path, prompt: &str) -> PixelartResult<Generation> {
        let req = GenerationRequest {
            reference,
            prompt,
            width: self.config.frame_size,
            height: self.config.frame_size,
            seed: None,
        };
        let result = self.generator.generate(&req);
        self.pacer.pause();

        match &result {
            Ok(generation) => {
                self.report.cost_usd += generation.cost_usd;
                self.report.calls_succeeded += 1;
                info!(
                    frames = generation.frames.len(),
                    cost_usd = generation.cost_usd,
                    "generation ok"
                );
            }
            Err(_) => self.report.calls_failed += 1,
        }
        result
    }

    /// `true` when `dir` already meets `required`; records the skip.
    fn already_complete(
        &mut self,
        kind: AnimationKind,
        name: &str,
        dir: &Path,
        required: usize,
    ) -> bool {
        match inspect(dir, required) {
            Ok(AnimationStatus::Complete(frames)) => {
                info!(kind = kind.dir_name(), name, frames, "skip: already complete");
                self.report.skipped.push((kind, name.to_string()));
                true
            }
            Ok(AnimationStatus::Partial(frames)) => {
                info!(kind = kind.dir_name(), name, frames, required, "regenerating partial animation");
                false
            }
            Ok(AnimationStatus::Missing) => false,
            Err(e) => {
                warn!(kind = kind.dir_name(), name, error = %e, "could not inspect frame dir");
                false
            }
        }
    }

    fn skip(&mut self, kind: AnimationKind, name: &str) {
        self.report.skipped.push((kind, name.to_string()));
    }

    fn persist_and_assemble(
        &mut self,
        kind: AnimationKind,
        name: &str,
        frames: &[EncodedFrame],
        dir: &Path,
        start_index: usize,
    ) {
        let saved = match persist_frames(frames, dir, start_index) {
            Ok(saved) => saved,
            Err(e) => {
                error!(kind = kind.dir_name(), name, error = %e, "failed to save frames");
                return;
            }
        };
        info!(kind = kind.dir_name(), name, frames = saved.len(), "saved frames");
        self.report.generated.push((kind, name.to_string()));

        if let Err(e) = assemble_animation(self.config, dir, name) {
            error!(kind = kind.dir_name(), name, error = %e, "assembly failed");
        }
    }

    pub fn generate_singles(&mut self, targets: &[String]) -> f64 {
        let cfg = self.config;
        let start = self.report.cost_usd;
        let items = selected(&cfg.singles, targets);
        if items.is_empty() {
            info!("no singles to generate");
            return 0.0;
        }
        info!(
            count = items.len(),
            estimated_usd = items.len() as f64 * COST_PER_CALL_USD,
            reference = %cfg.reference.display(),
            "generating singles"
        );

        for (name, entry) in items {
            let name = name.as_str();
            let frame_dir = cfg.singles_dir().join(name);
            if self.already_complete(AnimationKind::Singles, name, &frame_dir, FRAMES_PER_STEP) {
                continue;
            }

            info!(name, "generating single");
            let prompt = entry.prompt.as_deref().unwrap_or_default();
            match self.call(&cfg.reference, prompt) {
                Ok(generation) => self.persist_and_assemble(
                    AnimationKind::Singles,
                    name,
                    &generation.frames,
                    &frame_dir,
                    0,
                ),
                Err(e) => error!(name, error = %e, "single failed"),
            }
        }

        let cost = self.report.cost_usd - start;
        info!(cost_usd = cost, "singles complete");
        cost
    }

    /// Emotes continue a single's timeline: frames 16.. in the single's own directory,
    /// generated from its `frame_15.png`.
    pub fn generate_emotes(&mut self, targets: &[String]) -> f64 {
        let cfg = self.config;
        let start = self.report.cost_usd;
        let items = selected(&cfg.emotes, targets);
        if items.is_empty() {
            info!("no emotes to generate");
            return 0.0;
        }
        info!(
            count = items.len(),
            estimated_usd = items.len() as f64 * COST_PER_CALL_USD,
            "generating emotes"
        );

        for (name, entry) in items {
            let name = name.as_str();
            let frame_dir = cfg.singles_dir().join(name);
            let ref_frame = frame_path(&frame_dir, DEFAULT_STATIC_FRAME);

            if !ref_frame.is_file() {
                warn!(name, "skip emote: single has no frame_15 (generate singles first)");
                self.skip(AnimationKind::Emotes, name);
                continue;
            }
            if frame_path(&frame_dir, FRAMES_PER_STEP).is_file() {
                info!(name, "skip emote: emote frames already exist");
                self.skip(AnimationKind::Emotes, name);
                continue;
            }

            info!(name, "generating emote");
            let prompt = entry.prompt.as_deref().unwrap_or_default();
            match self.call(&ref_frame, prompt) {
                Ok(generation) => self.persist_and_assemble(
                    AnimationKind::Emotes,
                    name,
                    &generation.frames,
                    &frame_dir,
                    FRAMES_PER_STEP,
                ),
                Err(e) => error!(name, error = %e, "emote failed"),
            }
        }

        let cost = self.report.cost_usd - start;
        info!(cost_usd = cost, "emotes complete");
        cost
    }

    pub fn generate_chains(&mut self) -> f64 {
        let cfg = self.config;
        let items = selected(&cfg.chains, &[]);
        self.generate_sequences(AnimationKind::Chains, items)
    }

    pub fn generate_journeys(&mut self, targets: &[String]) -> f64 {
        let cfg = self.config;
        let items = selected(&cfg.journeys, targets);
        self.generate_sequences(AnimationKind::Journeys, items)
    }

    /// Chains and journeys. A failed step abandons the rest of its sequence; whatever
    /// frames were produced are still saved, and the next run starts the sequence over.
    fn generate_sequences(
        &mut self,
        kind: AnimationKind,
        items: Vec<(&String, &SequenceSpec)>,
    ) -> f64 {
        let cfg = self.config;
        let start = self.report.cost_usd;
        if items.is_empty() {
            info!(kind = kind.dir_name(), "nothing to generate");
            return 0.0;
        }
        let total_steps: usize = items.iter().map(|(_, s)| s.steps.len()).sum();
        info!(
            kind = kind.dir_name(),
            count = items.len(),
            steps = total_steps,
            estimated_usd = total_steps as f64 * COST_PER_CALL_USD,
            "generating sequences"
        );

        let kind_dir = cfg.kind_dir(kind);
        let singles_dir = cfg.singles_dir();
        for (name, entry) in items {
            let name = name.as_str();
            let seq_dir = kind_dir.join(name);
            if self.already_complete(kind, name, &seq_dir, entry.expected_frames()) {
                continue;
            }

            let label = entry.label.as_deref().unwrap_or(name);
            info!(kind = kind.dir_name(), name, label, steps = entry.steps.len(), "generating sequence");

            let mut all_frames: Vec<EncodedFrame> = Vec::new();
            for (idx, step) in entry.steps.iter().enumerate() {
                info!(
                    step = idx + 1,
                    of = entry.steps.len(),
                    from = %step.from,
                    to = %step.to,
                    "sequence step"
                );
                let reference =
                    match resolve_step_reference(step, &cfg.reference, &singles_dir, &all_frames)
                    {
                        Ok(r) => r,
                        Err(e) => {
                            error!(name, step = idx + 1, error = %e, "could not resolve reference");
                            break;
                        }
                    };

                let prompt = step.prompt.as_deref().unwrap_or_default();
                match self.call(reference.path(), prompt) {
                    Ok(generation) => all_frames.extend(generation.frames),
                    Err(e) => {
                        error!(name, step = idx + 1, error = %e, "step failed; abandoning sequence");
                        break;
                    }
                }
            }

            if !all_frames.is_empty() {
                self.persist_and_assemble(kind, name, &all_frames, &seq_dir, 0);
            }
        }

        let cost = self.report.cost_usd - start;
        info!(kind = kind.dir_name(), cost_usd = cost, "sequences complete");
        cost
    }

    /// Forward single (reused when complete) followed by a reverse step back to the base,
    /// written together as one 32-frame animation.
    pub fn generate_cycles(&mut self) -> f64 {
        let cfg = self.config;
        let start = self.report.cost_usd;
        if cfg.cycles.is_empty() {
            info!("no cycles to generate");
            return 0.0;
        }
        info!(
            count = cfg.cycles.len(),
            estimated_usd = cfg.cycles.len() as f64 * COST_PER_CALL_USD,
            "generating cycles (reusing forward singles)"
        );

        for (name, entry) in &cfg.cycles {
            let name = name.as_str();
            let cycle_dir = cfg.cycles_dir().join(name);
            if self.already_complete(
                AnimationKind::Cycles,
                name,
                &cycle_dir,
                2 * FRAMES_PER_STEP,
            ) {
                continue;
            }

            let shape = entry.shape.as_deref().unwrap_or_default();
            let forward_dir = cfg.singles_dir().join(shape);
            let mut forward = match forward_frames(&forward_dir) {
                Ok(f) => f,
                Err(e) => {
                    error!(name, error = %e, "could not read forward frames");
                    continue;
                }
            };

            if forward.len() < FRAMES_PER_STEP {
                info!(name, shape, "generating forward single");
                let prompt = entry.forward_prompt.as_deref().unwrap_or_default();
                let generation = match self.call(&cfg.reference, prompt) {
                    Ok(g) => g,
                    Err(e) => {
                        error!(name, error = %e, "forward generation failed");
                        continue;
                    }
                };
                let reread = persist_frames(&generation.frames, &forward_dir, 0)
                    .and_then(|_| forward_frames(&forward_dir));
                forward = match reread {
                    Ok(f) => f,
                    Err(e) => {
                        error!(name, error = %e, "failed to save forward frames");
                        continue;
                    }
                };
            } else {
                info!(name, shape, "reusing forward single");
            }

            let Some(last) = forward.last() else {
                warn!(name, "forward generation returned no frames");
                continue;
            };

            info!(name, shape, "generating reverse");
            let prompt = entry.reverse_prompt.as_deref().unwrap_or_default();
            let reverse = match self.call(last, prompt) {
                Ok(g) => g,
                Err(e) => {
                    error!(name, error = %e, "reverse generation failed");
                    continue;
                }
            };

            let mut all_frames = match forward
                .iter()
                .map(|p| EncodedFrame::from_file(p))
                .collect::<PixelartResult<Vec<_>>>()
            {
                Ok(frames) => frames,
                Err(e) => {
                    error!(name, error = %e, "could not re-read forward frames");
                    continue;
                }
            };
            all_frames.extend(reverse.frames);
            self.persist_and_assemble(AnimationKind::Cycles, name, &all_frames, &cycle_dir, 0);
        }

        let cost = self.report.cost_usd - start;
        info!(cost_usd = cost, "cycles complete");
        cost
    }
}

fn selected<'c, T>(
    catalog: &'c BTreeMap<String, T>,
    targets: &[String],
) -> Vec<(&'c String, &'c T)> {
    catalog
        .iter()
        .filter(|(name, _)| targets.is_empty() || targets.contains(*name))
        .collect()
}

/// The transform frames (0..16) of a single, excluding any emote extension.
fn forward_frames(dir: &Path) -> PixelartResult<Vec<PathBuf>> {
    Ok(list_frames(dir)?
        .into_iter()
        .filter(|p| frame_index(p).is_some_and(|i| i < FRAMES_PER_STEP))
        .collect())
}

/// Write `<kind dir>/<name>.gif` and `static/<name>.png` from the frames in `frame_dir`.
pub fn assemble_animation(
    config: &PipelineConfig,
    frame_dir: &Path,
    name: &str,
) -> PixelartResult<()> {
    let gif = gif_path(frame_dir, name);
    if let Some(path) = frames_to_gif(
        frame_dir,
        &gif,
        config.upscale_size,
        config.frame_duration_ms,
    )? {
        let size_kb = std::fs::metadata(&path).map(|m| m.len() / 1024).unwrap_or(0);
        info!(gif = %path.display(), size_kb, "wrote gif");
    }

    static_fallback(
        frame_dir,
        &static_path(&config.static_dir(), name),
        config.upscale_size,
        DEFAULT_STATIC_FRAME,
    )?;
    Ok(())
}

/// Rebuild the GIF and static fallback of every frame directory under every kind,
/// without any remote call. Returns how many animations were assembled.
pub fn reassemble_existing(config: &PipelineConfig) -> PixelartResult<usize> {
    let mut count = 0;
    for kind in AnimationKind::ALL {
        let kind_dir = config.kind_dir(kind);
        if !kind_dir.is_dir() {
            continue;
        }

        let mut dirs = Vec::new();
        for entry in std::fs::read_dir(&kind_dir)
            .with_context(|| format!("list '{}'", kind_dir.display()))?
        {
            let entry = entry.with_context(|| format!("list '{}'", kind_dir.display()))?;
            if entry.path().is_dir() {
                dirs.push(entry.path());
            }
        }
        dirs.sort();

        for frame_dir in dirs {
            if list_frames(&frame_dir)?.is_empty() {
                continue;
            }
            let Some(name) = frame_dir.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            match assemble_animation(config, &frame_dir, name) {
                Ok(()) => count += 1,
                Err(e) => error!(kind = kind.dir_name(), name, error = %e, "assembly failed"),
            }
        }
    }

    info!(count, "assembled animations");
    Ok(count)
}
