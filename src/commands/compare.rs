use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{info, warn};

use crate::cli::CompareArgs;
use crate::model::{ComparisonReport, PairwiseTestEntry};
use crate::stats::{SIGNIFICANCE_ALPHA, paired_t_test};
use crate::summarizer::resolve_cohort;
use crate::util::{ensure_directory, now_utc_string, utc_compact_string, write_json_pretty};

struct ScoreTable {
    paper_ids: Vec<String>,
    columns: Vec<Vec<f64>>,
}

pub fn run(args: CompareArgs) -> Result<()> {
    let cohort = resolve_cohort(&args.models)?;

    let manifest_dir = args.cache_root.join("manifests");
    ensure_directory(&manifest_dir)?;
    let scores_csv_path = args
        .scores_csv_path
        .clone()
        .unwrap_or_else(|| args.cache_root.join("artifacts").join("similarity_scores.csv"));
    let report_path = args
        .report_path
        .clone()
        .unwrap_or_else(|| manifest_dir.join("comparison_report.json"));

    let table = read_scores_csv(&scores_csv_path, &cohort)?;

    let mut warnings = Vec::<String>::new();
    let mut pairs = Vec::<PairwiseTestEntry>::new();

    if cohort.len() < 2 {
        warn!(
            cohort_size = cohort.len(),
            "cohort has fewer than 2 models; nothing to compare"
        );
        warnings.push("cohort has fewer than 2 models; no pairwise tests run".to_string());
    } else {
        for left_index in 0..cohort.len() {
            for right_index in (left_index + 1)..cohort.len() {
                let result = paired_t_test(
                    &table.columns[left_index],
                    &table.columns[right_index],
                )?;
                let significant = result.is_significant();

                info!(
                    model_a = %cohort[left_index],
                    model_b = %cohort[right_index],
                    statistic = result.statistic,
                    p_value = result.p_value,
                    significant,
                    "paired t-test"
                );

                pairs.push(PairwiseTestEntry {
                    model_a: cohort[left_index].clone(),
                    model_b: cohort[right_index].clone(),
                    sample_size: result.sample_size,
                    mean_difference: result.mean_difference,
                    statistic: result.statistic,
                    p_value: result.p_value,
                    significant,
                });
            }
        }
    }

    let report = ComparisonReport {
        manifest_version: 1,
        run_id: format!("compare-{}", utc_compact_string(Utc::now())),
        generated_at: now_utc_string(),
        scores_csv_path: scores_csv_path.display().to_string(),
        cohort: cohort.clone(),
        alpha: SIGNIFICANCE_ALPHA,
        papers_total: table.paper_ids.len(),
        pairs,
        status: "completed".to_string(),
        warnings,
    };

    write_json_pretty(&report_path, &report)?;

    info!(
        report_path = %report_path.display(),
        cohort_size = cohort.len(),
        pair_count = report.pairs.len(),
        papers = report.papers_total,
        "comparison completed"
    );

    Ok(())
}

fn read_scores_csv(path: &Path, cohort: &[String]) -> Result<ScoreTable> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open scores artifact: {}", path.display()))?;

    let headers = reader
        .headers()
        .with_context(|| format!("failed to read scores header: {}", path.display()))?
        .clone();

    let paper_id_index = headers
        .iter()
        .position(|header| header == "paper_id")
        .with_context(|| format!("scores artifact is missing the paper_id column: {}", path.display()))?;

    let mut column_indexes = Vec::<usize>::with_capacity(cohort.len());
    for model_id in cohort {
        let index = headers
            .iter()
            .position(|header| header == model_id.as_str())
            .with_context(|| {
                format!("scores artifact has no column for model '{model_id}'; run score first")
            })?;
        column_indexes.push(index);
    }

    let mut paper_ids = Vec::<String>::new();
    let mut columns = vec![Vec::<f64>::new(); cohort.len()];

    for record in reader.records() {
        let record =
            record.with_context(|| format!("failed to read scores record: {}", path.display()))?;
        paper_ids.push(record.get(paper_id_index).unwrap_or_default().to_string());

        for (column, &index) in column_indexes.iter().enumerate() {
            let raw = record.get(index).unwrap_or_default();
            let value = raw.parse::<f64>().with_context(|| {
                format!("invalid score '{raw}' in column '{}'", cohort[column])
            })?;
            columns[column].push(value);
        }
    }

    Ok(ScoreTable { paper_ids, columns })
}
