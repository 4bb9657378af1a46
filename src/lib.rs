//! Batch pixel-art animation generation.
//!
//! A [`PipelineConfig`] lists the animations to produce. The [`Orchestrator`] walks that
//! catalog, asks an [`AnimationGenerator`] (normally [`PixelLabClient`]) for frames, writes
//! them as numbered PNGs under the output directory and assembles each animation into a
//! looping GIF plus a static PNG fallback.
#![forbid(unsafe_code)]

pub mod assemble;
pub mod client;
pub mod codec;
pub mod config;
mod foundation;
pub mod orchestrate;
pub mod pacing;
pub mod resolve;
pub mod scaffold;
pub mod store;

pub use assemble::{DEFAULT_STATIC_FRAME, frames_to_gif, static_fallback};
pub use client::{
    AnimationGenerator, Balance, ClientConfig, Generation, GenerationRequest, PixelLabClient,
};
pub use codec::{EncodedFrame, frame_file_name, frame_path, list_frames, persist_frames};
pub use config::{
    AnimationCounts, AnimationKind, COST_PER_CALL_USD, CycleSpec, EmoteSpec, FRAMES_PER_STEP,
    MAX_UPSCALE_SIZE, PipelineConfig, SequenceSpec, SingleSpec, StepSpec, load_config,
};
pub use foundation::error::{PixelartError, PixelartResult};
pub use orchestrate::{Orchestrator, RunReport, assemble_animation, reassemble_existing};
pub use pacing::{FixedDelay, NoDelay, Pacer};
pub use resolve::{ResolvedReference, resolve_step_reference};
pub use store::{AnimationStatus, inspect};
