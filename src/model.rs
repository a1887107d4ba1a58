use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub generated_at: String,
    pub input_path: String,
    pub db_path: String,
    pub db_schema_version: String,
    pub rows_read: usize,
    pub rows_without_id: usize,
    pub papers_upserted: usize,
    pub missing_abstracts: usize,
    pub dry_run: bool,
    pub status: String,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizeRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub generated_at: String,
    pub db_schema_version: String,
    pub cohort: Vec<String>,
    pub refresh_mode: String,
    pub max_input_chars: usize,
    pub min_summary_words: usize,
    pub max_summary_words: usize,
    pub papers_total: usize,
    pub summaries_generated: usize,
    pub summaries_skipped: usize,
    pub summaries_reused: usize,
    pub summaries_csv_path: String,
    pub duration_ms: u128,
    pub status: String,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub generated_at: String,
    pub cohort: Vec<String>,
    pub embedding_model_id: String,
    pub embedding_dim: usize,
    pub embedding_backend: String,
    pub papers_total: usize,
    pub scores_written: usize,
    pub skipped_summaries: usize,
    pub scores_csv_path: String,
    pub duration_ms: u128,
    pub status: String,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbeddingModelConfigLock {
    pub manifest_version: u32,
    pub model_id: String,
    pub embedding_dim: usize,
    pub normalization: String,
    pub runtime_backend: String,
    pub created_at: String,
    pub checksum: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairwiseTestEntry {
    pub model_a: String,
    pub model_b: String,
    pub sample_size: usize,
    pub mean_difference: f64,
    pub statistic: f64,
    pub p_value: f64,
    pub significant: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub manifest_version: u32,
    pub run_id: String,
    pub generated_at: String,
    pub scores_csv_path: String,
    pub cohort: Vec<String>,
    pub alpha: f64,
    pub papers_total: usize,
    pub pairs: Vec<PairwiseTestEntry>,
    pub status: String,
    pub warnings: Vec<String>,
}
