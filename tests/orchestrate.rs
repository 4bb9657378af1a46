use std::{
    io::Cursor,
    path::{Path, PathBuf},
};

use pixelart::{
    AnimationGenerator, AnimationKind, EncodedFrame, Generation, GenerationRequest, NoDelay,
    Orchestrator, Pacer, PipelineConfig, PixelartError, PixelartResult, frame_path, list_frames,
    reassemble_existing,
};

fn temp_dir(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "pixelart_{name}_{}_{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ))
}

fn png_bytes(size: u32, rgba: [u8; 4]) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(size, size, image::Rgba(rgba));
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

/// Stands in for the remote service: 16 solid frames per call, a fixed cost, and
/// failures on chosen call indices.
struct ScriptedGenerator {
    calls: Vec<(PathBuf, String)>,
    fail_on: Vec<usize>,
    cost: f64,
}

impl ScriptedGenerator {
    fn new() -> Self {
        Self {
            calls: Vec::new(),
            fail_on: Vec::new(),
            cost: 0.16,
        }
    }

    fn failing_on(calls: &[usize]) -> Self {
        Self {
            fail_on: calls.to_vec(),
            ..Self::new()
        }
    }
}

impl AnimationGenerator for ScriptedGenerator {
    fn generate(&mut self, req: &GenerationRequest<'_>) -> PixelartResult<Generation> {
        let idx = self.calls.len();
        assert!(
            req.reference.is_file(),
            "reference missing at call time: {}",
            req.reference.display()
        );
        assert_eq!((req.width, req.height), (16, 16));
        self.calls
            .push((req.reference.to_path_buf(), req.prompt.to_string()));

        if self.fail_on.contains(&idx) {
            return Err(PixelartError::api(500, "scripted failure"));
        }
        let frames = (0..16)
            .map(|i| EncodedFrame::from_bytes(&png_bytes(16, [idx as u8 * 10, i * 15, 0, 255])))
            .collect();
        Ok(Generation {
            frames,
            cost_usd: self.cost,
        })
    }
}

#[derive(Default)]
struct CountingPacer {
    pauses: usize,
}

impl Pacer for CountingPacer {
    fn pause(&mut self) {
        self.pauses += 1;
    }
}

const PROJECT: &str = r#"
project:
  name: test-project
  reference: reference.png
  output_dir: ./output
  frame_size: 16
  upscale_size: 32
  frame_duration_ms: 100
"#;

const CATALOG: &str = r#"
singles:
  flame: { prompt: "becomes a flame" }
  star: { prompt: "becomes a star" }
emotes:
  flame: { prompt: "flame sways" }
chains:
  flame_to_heart:
    label: Fire to Love
    steps:
      - { from: reference, to: flame, prompt: "becomes a flame" }
      - { from: flame, to: heart, prompt: "becomes a heart" }
journeys:
  hero:
    steps:
      - { from: reference, to: sword, prompt: "becomes sword" }
      - { from: sword, to: mushroom, prompt: "becomes mushroom" }
      - { from: mushroom, to: crown, prompt: "becomes crown" }
cycles:
  cycle_flame:
    shape: flame
    forward_prompt: becomes a flame
    reverse_prompt: flame returns to gold
"#;

fn project(name: &str, catalog: &str) -> (PathBuf, PipelineConfig) {
    let tmp = temp_dir(name);
    std::fs::create_dir_all(&tmp).unwrap();
    std::fs::write(tmp.join("reference.png"), png_bytes(16, [255, 215, 0, 255])).unwrap();
    let cfg = PipelineConfig::from_yaml_str(&format!("{PROJECT}{catalog}"), &tmp).unwrap();
    (tmp, cfg)
}

fn frame_count(dir: &Path) -> usize {
    list_frames(dir).unwrap().len()
}

fn seed_frames(dir: &Path, count: usize) {
    std::fs::create_dir_all(dir).unwrap();
    for i in 0..count {
        std::fs::write(frame_path(dir, i), png_bytes(16, [1, 2, 3, 255])).unwrap();
    }
}

#[test]
fn full_batch_makes_nine_calls_and_lays_out_outputs() {
    let (tmp, cfg) = project("orch_full", CATALOG);
    assert_eq!(cfg.count_animations().total_api_calls(), 9);
    assert!((cfg.estimate_cost() - 1.44).abs() < 1e-9);

    let mut generator = ScriptedGenerator::new();
    let mut pacer = NoDelay;
    let mut orch = Orchestrator::new(&cfg, &mut generator, &mut pacer).unwrap();
    let total = orch.run(&AnimationKind::ALL, &[]);
    let report = orch.into_report();

    assert_eq!(report.calls_succeeded, 9);
    assert_eq!(report.calls_failed, 0);
    assert!((total - 1.44).abs() < 1e-9);
    assert!((report.cost_usd - 1.44).abs() < 1e-9);

    let out = tmp.join("output");
    assert_eq!(frame_count(&out.join("singles/flame")), 32);
    assert_eq!(frame_count(&out.join("singles/star")), 16);
    assert_eq!(frame_count(&out.join("chains/flame_to_heart")), 32);
    assert_eq!(frame_count(&out.join("journeys/hero")), 48);
    assert_eq!(frame_count(&out.join("cycles/cycle_flame")), 32);

    for gif in [
        "singles/flame.gif",
        "singles/star.gif",
        "chains/flame_to_heart.gif",
        "journeys/hero.gif",
        "cycles/cycle_flame.gif",
    ] {
        assert!(out.join(gif).is_file(), "missing {gif}");
    }
    for name in ["flame", "star", "flame_to_heart", "hero", "cycle_flame"] {
        let png = image::open(out.join("static").join(format!("{name}.png"))).unwrap();
        assert_eq!((png.width(), png.height()), (32, 32));
    }

    // singles flame, star; emote flame; chain x2; journey x3; cycle reverse.
    let calls = &generator.calls;
    let flame_15 = frame_path(&out.join("singles/flame"), 15);
    assert_eq!(calls[0].0, cfg.reference);
    assert_eq!(calls[2].0, flame_15, "emote starts from the single's frame 15");
    assert_eq!(calls[3].0, cfg.reference, "chain step 1 from the base alias");
    assert_eq!(calls[4].0, flame_15, "chain step 2 from the finished flame");
    assert_eq!(calls[5].0, cfg.reference);
    assert!(
        calls[6].0.starts_with(std::env::temp_dir()) && !calls[6].0.exists(),
        "journey step 2 uses a transient frame"
    );
    assert_eq!(calls[8].0, flame_15, "cycle reverse from forward frame 15");
    assert_eq!(calls[8].1, "flame returns to gold");

    // Cycle forward half is the single's transform frames, byte for byte.
    for i in [0, 15] {
        assert_eq!(
            std::fs::read(frame_path(&out.join("cycles/cycle_flame"), i)).unwrap(),
            std::fs::read(frame_path(&out.join("singles/flame"), i)).unwrap()
        );
    }

    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn rerun_after_complete_batch_makes_no_calls() {
    let (tmp, cfg) = project("orch_rerun", CATALOG);

    let mut first = ScriptedGenerator::new();
    let mut pacer = NoDelay;
    Orchestrator::new(&cfg, &mut first, &mut pacer)
        .unwrap()
        .run(&AnimationKind::ALL, &[]);
    assert_eq!(first.calls.len(), 9);

    let mut second = ScriptedGenerator::new();
    let mut orch = Orchestrator::new(&cfg, &mut second, &mut pacer).unwrap();
    let total = orch.run(&AnimationKind::ALL, &[]);
    let report = orch.into_report();

    assert_eq!(total, 0.0);
    assert_eq!(report.total_calls(), 0);
    assert_eq!(report.skipped.len(), 6);
    assert!(second.calls.is_empty());

    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn emote_without_single_is_skipped() {
    let (tmp, cfg) = project("orch_emote_skip", "emotes:\n  flame: { prompt: sways }\n");

    let mut generator = ScriptedGenerator::new();
    let mut pacer = NoDelay;
    let mut orch = Orchestrator::new(&cfg, &mut generator, &mut pacer).unwrap();
    let cost = orch.generate_emotes(&[]);
    let report = orch.into_report();

    assert_eq!(cost, 0.0);
    assert_eq!(report.total_calls(), 0);
    assert_eq!(
        report.skipped,
        vec![(AnimationKind::Emotes, "flame".to_string())]
    );
    assert!(generator.calls.is_empty());
    assert!(!tmp.join("output/singles/flame").exists());

    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn failed_call_contributes_no_cost_and_batch_continues() {
    let catalog = r#"
singles:
  a: { prompt: "a" }
  b: { prompt: "b" }
  c: { prompt: "c" }
"#;
    let (tmp, cfg) = project("orch_fail_single", catalog);

    let mut generator = ScriptedGenerator::failing_on(&[1]);
    let mut pacer = NoDelay;
    let mut orch = Orchestrator::new(&cfg, &mut generator, &mut pacer).unwrap();
    let cost = orch.generate_singles(&[]);
    let report = orch.into_report();

    assert!((cost - 0.32).abs() < 1e-9);
    assert_eq!(report.calls_succeeded, 2);
    assert_eq!(report.calls_failed, 1);
    assert_eq!(frame_count(&tmp.join("output/singles/a")), 16);
    assert!(!tmp.join("output/singles/b").exists());
    assert_eq!(frame_count(&tmp.join("output/singles/c")), 16);

    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn failed_step_abandons_sequence_but_keeps_frames_then_restarts() {
    let catalog = r#"
journeys:
  hero:
    steps:
      - { from: reference, to: sword, prompt: "s1" }
      - { from: sword, to: mushroom, prompt: "s2" }
      - { from: mushroom, to: crown, prompt: "s3" }
"#;
    let (tmp, cfg) = project("orch_fail_step", catalog);
    let hero = tmp.join("output/journeys/hero");

    let mut generator = ScriptedGenerator::failing_on(&[1]);
    let mut pacer = NoDelay;
    let mut orch = Orchestrator::new(&cfg, &mut generator, &mut pacer).unwrap();
    let cost = orch.generate_journeys(&[]);
    drop(orch);

    assert_eq!(generator.calls.len(), 2, "step 3 is never attempted");
    assert!((cost - 0.16).abs() < 1e-9);
    assert_eq!(frame_count(&hero), 16);
    assert!(tmp.join("output/journeys/hero.gif").is_file());

    let mut retry = ScriptedGenerator::new();
    let mut orch = Orchestrator::new(&cfg, &mut retry, &mut pacer).unwrap();
    let cost = orch.generate_journeys(&[]);
    drop(orch);

    assert_eq!(retry.calls.len(), 3, "partial sequence restarts from step 0");
    assert_eq!(retry.calls[0].1, "s1");
    assert!((cost - 0.48).abs() < 1e-9);
    assert_eq!(frame_count(&hero), 48);

    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn targets_narrow_singles_but_not_chains() {
    let catalog = r#"
singles:
  flame: { prompt: "flame" }
  star: { prompt: "star" }
chains:
  c:
    steps:
      - { from: reference, to: flame, prompt: "c1" }
      - { from: "", to: heart, prompt: "c2" }
"#;
    let (tmp, cfg) = project("orch_targets", catalog);

    let mut generator = ScriptedGenerator::new();
    let mut pacer = NoDelay;
    let mut orch = Orchestrator::new(&cfg, &mut generator, &mut pacer).unwrap();
    orch.run(
        &[AnimationKind::Singles, AnimationKind::Chains],
        &["star".to_string()],
    );
    drop(orch);

    let prompts: Vec<&str> = generator.calls.iter().map(|(_, p)| p.as_str()).collect();
    assert_eq!(prompts, vec!["star", "c1", "c2"]);
    assert!(!tmp.join("output/singles/flame").exists());
    assert_eq!(frame_count(&tmp.join("output/chains/c")), 32);

    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn skip_threshold_controls_remote_calls() {
    let catalog = r#"
singles:
  done: { prompt: "done" }
  partial: { prompt: "partial" }
"#;
    let (tmp, cfg) = project("orch_threshold", catalog);
    seed_frames(&tmp.join("output/singles/done"), 16);
    seed_frames(&tmp.join("output/singles/partial"), 4);

    let mut generator = ScriptedGenerator::new();
    let mut pacer = NoDelay;
    let mut orch = Orchestrator::new(&cfg, &mut generator, &mut pacer).unwrap();
    orch.generate_singles(&[]);
    let report = orch.into_report();

    assert_eq!(generator.calls.len(), 1);
    assert_eq!(generator.calls[0].1, "partial");
    assert_eq!(
        report.skipped,
        vec![(AnimationKind::Singles, "done".to_string())]
    );
    assert_eq!(frame_count(&tmp.join("output/singles/partial")), 16);

    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn cycle_generates_missing_forward_then_reverse() {
    let catalog = r#"
cycles:
  cycle_star:
    shape: star
    forward_prompt: "to star"
    reverse_prompt: "back to gold"
"#;
    let (tmp, cfg) = project("orch_cycle_forward", catalog);

    let mut generator = ScriptedGenerator::new();
    let mut pacer = NoDelay;
    let mut orch = Orchestrator::new(&cfg, &mut generator, &mut pacer).unwrap();
    let cost = orch.generate_cycles();
    drop(orch);

    let star = tmp.join("output/singles/star");
    assert_eq!(generator.calls.len(), 2);
    assert_eq!(generator.calls[0], (cfg.reference.clone(), "to star".to_string()));
    assert_eq!(generator.calls[1].0, frame_path(&star, 15));
    assert!((cost - 0.32).abs() < 1e-9);
    assert_eq!(frame_count(&star), 16);
    assert_eq!(frame_count(&tmp.join("output/cycles/cycle_star")), 32);

    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn invalid_config_never_starts() {
    let (tmp, cfg) = project("orch_invalid", "singles:\n  flame: {}\n");

    let mut generator = ScriptedGenerator::new();
    let mut pacer = NoDelay;
    let Err(PixelartError::Config(errors)) = Orchestrator::new(&cfg, &mut generator, &mut pacer)
    else {
        panic!("expected config error");
    };
    assert_eq!(errors, vec!["singles.flame: missing 'prompt'".to_string()]);
    assert!(generator.calls.is_empty());

    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn reassemble_rebuilds_every_frame_dir() {
    let (tmp, cfg) = project("orch_reassemble", "");
    let out = tmp.join("output");
    seed_frames(&out.join("singles/flame"), 16);
    seed_frames(&out.join("chains/c"), 4);
    std::fs::create_dir_all(out.join("journeys/empty")).unwrap();
    std::fs::write(out.join("cycles.txt"), b"not a dir").unwrap();

    assert_eq!(reassemble_existing(&cfg).unwrap(), 2);
    assert!(out.join("singles/flame.gif").is_file());
    assert!(out.join("chains/c.gif").is_file());
    assert!(out.join("static/flame.png").is_file());
    assert!(out.join("static/c.png").is_file());
    assert!(!out.join("journeys/empty.gif").exists());

    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn every_remote_call_is_paced_and_skips_are_not() {
    let catalog = r#"
singles:
  a: { prompt: "a" }
  b: { prompt: "b" }
  done: { prompt: "done" }
emotes:
  a: { prompt: "a sways" }
cycles:
  cycle_a:
    shape: a
    forward_prompt: "to a"
    reverse_prompt: "back from a"
"#;
    let (tmp, cfg) = project("orch_pacing", catalog);
    seed_frames(&tmp.join("output/singles/done"), 16);

    let mut generator = ScriptedGenerator::failing_on(&[1]);
    let mut pacer = CountingPacer::default();
    let mut orch = Orchestrator::new(&cfg, &mut generator, &mut pacer).unwrap();
    let total = orch.run(&AnimationKind::ALL, &[]);

    let report = orch.report();
    assert_eq!(report.calls_succeeded, 3);
    assert_eq!(report.calls_failed, 1);
    assert_eq!(
        report.skipped,
        vec![(AnimationKind::Singles, "done".to_string())]
    );
    assert!((total - 0.48).abs() < 1e-9);
    let total_calls = report.total_calls();
    drop(orch);

    assert_eq!(pacer.pauses, total_calls);
    assert_eq!(pacer.pauses, 4);
    assert_eq!(generator.calls.len(), 4);
    assert_eq!(generator.calls[3].1, "back from a", "cycle reuses single a");
    assert_eq!(frame_count(&tmp.join("output/singles/a")), 32);
    assert_eq!(frame_count(&tmp.join("output/cycles/cycle_a")), 32);

    std::fs::remove_dir_all(&tmp).ok();
}
