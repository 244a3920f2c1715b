use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use anyhow::{Context, Result};
use gazex_core::{FixationStats, Session, SessionSummary, TrialPayload};
use gazex_experiment::{Engine, EngineReport, ExperimentConfig, FileImageSource, ManifestSource};
use gazex_gaze::{GazeAdapter, GazeTarget, SyntheticOracle, ValidationReport};
use gazex_render::{FrameRenderer, RenderingPresenter};
use gazex_store::{Health, LocalQueue, MemoryTransport, PersistenceGateway};
use serde::Serialize;
use tracing::info;

use crate::cli::Args;
use crate::participant::AutoParticipant;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionExport<'a> {
    session: &'a Session,
    summary: &'a SessionSummary,
    calibration_threshold: f64,
    validation: &'a ValidationReport,
    stimuli: String,
    trials: Vec<TrialPayload>,
}

fn describe(source: &ManifestSource) -> String {
    match source {
        ManifestSource::File(path) => path.display().to_string(),
        ManifestSource::Placeholder { reason } => format!("placeholder ({reason})"),
    }
}

fn export(path: &Path, report: &EngineReport) -> Result<usize> {
    let trials: Vec<TrialPayload> = report.trials.iter().filter_map(|t| t.payload()).collect();
    let count = trials.len();
    let doc = SessionExport {
        session: &report.session,
        summary: &report.summary,
        calibration_threshold: report.calibration.threshold,
        validation: &report.validation,
        stimuli: describe(&report.manifest_source),
        trials,
    };
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), &doc)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(count)
}

fn print_summary(report: &EngineReport, pending: usize, store: &Health) {
    let s = &report.summary;
    let completed: Vec<_> = report
        .trials
        .iter()
        .filter_map(|t| t.outcome())
        .filter(|o| o.abandoned.is_none())
        .collect();
    let mean = |f: fn(&FixationStats) -> f64| {
        if completed.is_empty() {
            0.0
        } else {
            completed.iter().map(|o| f(&o.fixation)).sum::<f64>() / completed.len() as f64
        }
    };

    println!("\nSession summary");
    println!(
        "  Session:               {}{}",
        s.session_id,
        if report.session.is_local() { " (local)" } else { "" }
    );
    println!("  Calibration accuracy:  {:.1}%", s.calibration_accuracy * 100.0);
    println!("  Calibration runs:      {}", report.calibration_runs);
    println!("  Stimuli:               {}", describe(&report.manifest_source));
    println!("  Trials run:            {} ({} abandoned)", s.trials_run, s.trials_abandoned);
    println!("  Breaks:                {}", s.breaks_taken);
    println!(
        "  Mean dwell L/R:        {:.1}% / {:.1}%",
        mean(|f: &FixationStats| f.left_percentage),
        mean(|f: &FixationStats| f.right_percentage)
    );
    println!("  Delivered:             {}", s.delivered);
    println!("  Undelivered:           {} ({pending} pending in queue)", s.undelivered);
    println!(
        "  Completion sent:       {}",
        if s.completion_acknowledged { "yes" } else { "no" }
    );
    println!(
        "  Store:                 {} ({} sessions, {} trials)",
        store.status, store.sessions, store.trials
    );
}

/// Headless run of one simulated participant against the in-memory store.
pub struct App {
    args: Args,
    config: ExperimentConfig,
}

impl App {
    pub fn new(args: Args) -> Result<Self> {
        let mut config = match &args.config {
            Some(path) => ExperimentConfig::from_json_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => ExperimentConfig::default(),
        };
        args.apply(&mut config);
        config.validate().context("invalid configuration")?;
        Ok(Self { args, config })
    }

    pub async fn run(self) -> Result<()> {
        let Self { args, mut config } = self;
        let seed = config.seed.unwrap_or_else(rand::random);
        config.seed = Some(seed);

        println!("=== GAZEX ATTENTION SESSION ===");
        println!("Platform: {}", std::env::consts::OS);
        println!("Architecture: {}", std::env::consts::ARCH);
        println!("Participant: {}", config.participant_id);
        println!(
            "Trials: {} (break every {})",
            config.trials, config.break_every
        );
        println!("Seed: {seed}\n");

        let target = GazeTarget::new();
        let oracle = SyntheticOracle::new(
            target.clone(),
            config.gaze.sample_rate_hz,
            args.jitter,
            seed,
        );
        let gaze = GazeAdapter::new(oracle, config.gaze.channel_capacity);

        let transport = MemoryTransport::new();
        if args.offline {
            info!("data store offline for this run");
            transport.set_offline(true);
        }
        let gateway = PersistenceGateway::new(
            transport.clone(),
            LocalQueue::new(&config.delivery.queue_path),
            config.delivery.retry,
        );

        let participant = AutoParticipant::new(target, args.left_bias, seed);
        let mut presenter = RenderingPresenter::new(participant, FrameRenderer::new(&config.layout)?);
        if let Some(dir) = &args.frames {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating {}", dir.display()))?;
            presenter = presenter.with_frame_dir(dir);
        }
        let images = FileImageSource::new(&config.stimuli);

        let mut engine = Engine::new(config, gaze, gateway, images, presenter)?;
        let report = engine.run().await?;
        let pending = engine.gateway().queue().len().await?;
        print_summary(&report, pending, &transport.health());

        if let Some(path) = &args.export {
            let count = export(path, &report)?;
            println!("\nExported {count} trial records to {}", path.display());
        }
        Ok(())
    }
}
