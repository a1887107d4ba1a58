use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "summeval",
    version,
    about = "Local summarization model comparison over paper abstracts"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Import(ImportArgs),
    Summarize(SummarizeArgs),
    Score(ScoreArgs),
    Compare(CompareArgs),
    Status(StatusArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ImportArgs {
    #[arg(long, default_value = ".cache/summeval")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub input_path: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum SummarizeRefreshMode {
    Full,
    MissingOrStale,
}

impl SummarizeRefreshMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::MissingOrStale => "missing-or-stale",
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct SummarizeArgs {
    #[arg(long, default_value = ".cache/summeval")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    #[arg(long = "model")]
    pub models: Vec<String>,

    #[arg(long, value_enum, default_value_t = SummarizeRefreshMode::MissingOrStale)]
    pub refresh_mode: SummarizeRefreshMode,

    #[arg(long, default_value_t = 1024)]
    pub max_input_chars: usize,

    #[arg(long, default_value_t = 30)]
    pub min_summary_words: usize,

    #[arg(long, default_value_t = 130)]
    pub max_summary_words: usize,

    #[arg(long)]
    pub summaries_csv_path: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct ScoreArgs {
    #[arg(long, default_value = ".cache/summeval")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    #[arg(long = "model")]
    pub models: Vec<String>,

    #[arg(long, default_value = "lexical-hash-384-v1")]
    pub embedding_model_id: String,

    #[arg(long)]
    pub scores_csv_path: Option<PathBuf>,

    #[arg(long)]
    pub embedding_model_lock_path: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct CompareArgs {
    #[arg(long, default_value = ".cache/summeval")]
    pub cache_root: PathBuf,

    #[arg(long = "model")]
    pub models: Vec<String>,

    #[arg(long)]
    pub scores_csv_path: Option<PathBuf>,

    #[arg(long)]
    pub report_path: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long, default_value = ".cache/summeval")]
    pub cache_root: PathBuf,
}
