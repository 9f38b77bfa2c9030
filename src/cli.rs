use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use pcm2midi::score::MatchPolicy;

#[derive(Parser, Debug)]
#[command(name = "pcm2midi", about = "Transcribe monophonic recordings to notes and grade them against reference MIDI")]
pub struct Cli {
    /// Audio file (WAV, MP3, FLAC, OGG) or a directory of them; each needs a
    /// sibling .mid with the same name. With --histogram, a directory of MIDI files.
    pub input: PathBuf,

    /// Config file (TOML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Report file [default: <input dir>/<detector>_report.txt]
    #[arg(short, long)]
    pub report: Option<PathBuf>,

    /// Note detector; yin and hps override the configured pitch strategy
    #[arg(short, long, value_enum)]
    pub detector: Option<DetectorKind>,

    /// Note matching policy
    #[arg(long, value_enum)]
    pub policy: Option<MatchPolicy>,

    /// Maximum accepted detection latency in milliseconds
    #[arg(long)]
    pub max_latency_ms: Option<f64>,

    /// Weight of false detections in the grade
    #[arg(long)]
    pub false_positive_weight: Option<f64>,

    /// Samples per analysis block
    #[arg(long)]
    pub block_size: Option<usize>,

    /// Replay probability per reference bucket (replay detector only)
    #[arg(long, default_value_t = 1.0)]
    pub probability: f64,

    /// RNG seed (replay detector only)
    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    /// Print per-key note-on counts of the MIDI files under the input directory and exit
    #[arg(long)]
    pub histogram: bool,

    /// Worker threads [default: one per core]
    #[arg(short, long)]
    pub jobs: Option<usize>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum DetectorKind {
    Yin,
    Hps,
    Replay,
}

impl DetectorKind {
    pub fn name(self) -> &'static str {
        match self {
            DetectorKind::Yin => "yin",
            DetectorKind::Hps => "hps",
            DetectorKind::Replay => "replay",
        }
    }
}
