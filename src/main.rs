mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::path::{Path, PathBuf};

use cli::{Cli, DetectorKind};
use pcm2midi::config::{self, Config};
use pcm2midi::detect::pitch::PitchStrategy;
use pcm2midi::reference::KeyHistogram;
use pcm2midi::score::report::{self, ReportRow};
use pcm2midi::track::{self, Detector};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    // Load config: explicit --config path, or auto-detect pcm2midi.toml / global config
    let config_path = cli.config.clone().or_else(|| {
        let local = PathBuf::from("pcm2midi.toml");
        if local.exists() {
            return Some(local);
        }
        if let Some(home) = dirs::home_dir() {
            let xdg = home.join(".config").join("pcm2midi").join("config.toml");
            if xdg.exists() {
                return Some(xdg);
            }
        }
        if let Some(config_dir) = dirs::config_dir() {
            let platform = config_dir.join("pcm2midi").join("config.toml");
            if platform.exists() {
                return Some(platform);
            }
        }
        None
    });
    let mut config = match config_path {
        Some(ref path) => {
            let config = config::load_config(path)?;
            log::info!("Loaded config from {}", path.display());
            config
        }
        None => Config::default(),
    };
    apply_overrides(&cli, &mut config);
    config.validate().context("Invalid settings")?;

    // Histogram mode
    if cli.histogram {
        let mut histogram = KeyHistogram::new();
        let files = track::key_histogram(&cli.input, &mut histogram)?;
        log::info!("Counted {} note-ons in {} files", histogram.total(), files);
        print!("{}", histogram);
        return Ok(());
    }

    if !cli.input.exists() {
        anyhow::bail!("Input not found: {}", cli.input.display());
    }

    let detector_kind = cli.detector.unwrap_or(match config.pitch.strategy {
        PitchStrategy::Yin => DetectorKind::Yin,
        PitchStrategy::Hps => DetectorKind::Hps,
    });
    let detector = match detector_kind {
        DetectorKind::Replay => Detector::Replay {
            probability: cli.probability,
            seed: cli.seed,
        },
        DetectorKind::Yin | DetectorKind::Hps => Detector::Transcribe,
    };

    let inputs = track::collect_inputs(&cli.input)?;
    if inputs.is_empty() {
        anyhow::bail!("No audio files found in {}", cli.input.display());
    }

    if let Some(jobs) = cli.jobs {
        rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build_global()
            .context("Failed to configure worker threads")?;
    }

    log::info!("pcm2midi - monophonic transcription scoring");
    log::info!("Input: {} ({} tracks)", cli.input.display(), inputs.len());
    log::info!("Detector: {}", detector_kind.name());
    log::info!(
        "Policy: {:?}, window {}ms, false positive weight {}",
        config.scoring.policy,
        config.scoring.max_latency_ms,
        config.scoring.false_positive_weight
    );

    let pb = ProgressBar::new(inputs.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} tracks ({eta} remaining)")
            .context("Invalid progress template")?
            .progress_chars("=>-"),
    );

    let rows: Vec<ReportRow> = inputs
        .par_iter()
        .map(|path| {
            let row = track::evaluate(path, &config, detector);
            pb.inc(1);
            row
        })
        .collect();

    pb.finish();

    let policy = config.scoring.policy;
    let mut lines = vec![report::header(policy)];
    lines.extend(rows.iter().map(|row| row.to_line(policy)));
    let text = lines.join("\n") + "\n";
    print!("{}", text);

    let report_path = cli
        .report
        .clone()
        .unwrap_or_else(|| default_report_path(&cli.input, detector_kind));
    std::fs::write(&report_path, &text)
        .with_context(|| format!("Failed to write report: {}", report_path.display()))?;

    let failed = rows.iter().filter(|r| r.outcome.is_err()).count();
    if failed > 0 {
        log::warn!("{} of {} tracks failed", failed, rows.len());
    }
    match report::mean_grade(&rows) {
        Some(grade) => log::info!("Mean grade: {:.2}", grade),
        None => log::info!("Mean grade: undefined"),
    }
    log::info!("Done! Report: {}", report_path.display());
    Ok(())
}

/// CLI values win over the config file.
fn apply_overrides(cli: &Cli, config: &mut Config) {
    match cli.detector {
        Some(DetectorKind::Yin) => config.pitch.strategy = PitchStrategy::Yin,
        Some(DetectorKind::Hps) => config.pitch.strategy = PitchStrategy::Hps,
        Some(DetectorKind::Replay) | None => {}
    }
    if let Some(policy) = cli.policy {
        config.scoring.policy = policy;
    }
    if let Some(ms) = cli.max_latency_ms {
        config.scoring.max_latency_ms = ms;
    }
    if let Some(weight) = cli.false_positive_weight {
        config.scoring.false_positive_weight = weight;
    }
    if let Some(block_size) = cli.block_size {
        config.analysis.block_size = block_size;
    }
}

fn default_report_path(input: &Path, detector: DetectorKind) -> PathBuf {
    let dir = if input.is_dir() {
        input
    } else {
        input.parent().unwrap_or_else(|| Path::new("."))
    };
    dir.join(format!("{}_report.txt", detector.name()))
}
