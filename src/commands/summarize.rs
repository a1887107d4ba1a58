use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, params};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::cli::{SummarizeArgs, SummarizeRefreshMode};
use crate::corpus::Paper;
use crate::model::SummarizeRunManifest;
use crate::summarizer::{
    Summarizer, SummarizerConfig, SummaryOutcome, resolve_cohort, resolve_summarizer_config,
};
use crate::util::{ensure_directory, now_utc_string, utc_compact_string, write_json_pretty};

use super::import::{
    DB_SCHEMA_VERSION, default_db_path, ensure_store_schema, load_papers, open_store_rw,
};

#[derive(Debug, Clone)]
struct StoredSummary {
    summary: String,
    abstract_hash: String,
}

struct PendingSummary {
    paper_id: String,
    summary: String,
    status: &'static str,
    abstract_hash: String,
}

pub fn run(args: SummarizeArgs) -> Result<()> {
    let started = Instant::now();
    let cohort = resolve_cohort(&args.models)?;

    let mut summarizers = Vec::<Summarizer>::with_capacity(cohort.len());
    for model_id in &cohort {
        let config = resolve_summarizer_config(
            model_id,
            args.max_input_chars,
            args.min_summary_words,
            args.max_summary_words,
        )?;
        summarizers.push(Summarizer::new(config)?);
    }

    let db_path = args
        .db_path
        .clone()
        .unwrap_or_else(|| default_db_path(&args.cache_root));
    let manifest_dir = args.cache_root.join("manifests");
    ensure_directory(&manifest_dir)?;
    let summaries_csv_path = args.summaries_csv_path.clone().unwrap_or_else(|| {
        args.cache_root
            .join("artifacts")
            .join("abstract_with_summaries.csv")
    });

    let mut connection = open_store_rw(&db_path)?;
    ensure_store_schema(&connection)?;

    let papers = load_papers(&connection)?;
    let mut warnings = Vec::<String>::new();
    if papers.is_empty() {
        warnings.push("store holds no papers; run import first".to_string());
    }

    let mut summaries_generated = 0usize;
    let mut summaries_skipped = 0usize;
    let mut summaries_reused = 0usize;
    let mut summary_columns = Vec::<Vec<String>>::with_capacity(cohort.len());

    for summarizer in &summarizers {
        let model_id = summarizer.config().model_id.clone();
        ensure_summary_model_entry(&connection, summarizer.config())?;
        let existing = load_existing_summaries(&connection, &model_id)?;

        let mut column = Vec::<String>::with_capacity(papers.len());
        let mut pending = Vec::<PendingSummary>::new();
        let mut generated_for_model = 0usize;
        let mut reused_for_model = 0usize;

        for paper in &papers {
            let abstract_hash = summary_input_hash(&paper.abstract_text);
            let stored = existing.get(&paper.paper_id);
            let stale = stored
                .map(|row| row.abstract_hash != abstract_hash)
                .unwrap_or(true);
            let refresh = match args.refresh_mode {
                SummarizeRefreshMode::Full => true,
                SummarizeRefreshMode::MissingOrStale => stale,
            };

            match (refresh, stored) {
                (false, Some(row)) => {
                    summaries_reused += 1;
                    reused_for_model += 1;
                    column.push(row.summary.clone());
                }
                _ => {
                    let outcome = summarizer.summarize(paper);
                    match &outcome {
                        SummaryOutcome::Generated(_) => {
                            summaries_generated += 1;
                            generated_for_model += 1;
                        }
                        SummaryOutcome::Skipped => summaries_skipped += 1,
                    }
                    column.push(outcome.text().to_string());
                    pending.push(PendingSummary {
                        paper_id: paper.paper_id.clone(),
                        summary: outcome.text().to_string(),
                        status: outcome.status_str(),
                        abstract_hash,
                    });
                }
            }
        }

        flush_summary_batch(&mut connection, &model_id, &mut pending)?;
        info!(
            model_id = %model_id,
            generated = generated_for_model,
            reused = reused_for_model,
            "model summaries committed"
        );
        summary_columns.push(column);
    }

    write_summaries_csv(&summaries_csv_path, &papers, &cohort, &summary_columns)?;

    let manifest = SummarizeRunManifest {
        manifest_version: 1,
        run_id: format!("summarize-{}", utc_compact_string(Utc::now())),
        generated_at: now_utc_string(),
        db_schema_version: DB_SCHEMA_VERSION.to_string(),
        cohort: cohort.clone(),
        refresh_mode: args.refresh_mode.as_str().to_string(),
        max_input_chars: args.max_input_chars,
        min_summary_words: args.min_summary_words,
        max_summary_words: args.max_summary_words,
        papers_total: papers.len(),
        summaries_generated,
        summaries_skipped,
        summaries_reused,
        summaries_csv_path: summaries_csv_path.display().to_string(),
        duration_ms: started.elapsed().as_millis(),
        status: "completed".to_string(),
        warnings: warnings.clone(),
    };

    let manifest_path = manifest_dir.join("summarize_run.json");
    write_json_pretty(&manifest_path, &manifest)?;

    for warning in &warnings {
        warn!(warning = %warning, "summarize warning");
    }
    info!(
        csv_path = %summaries_csv_path.display(),
        papers = papers.len(),
        cohort_size = cohort.len(),
        summaries_generated,
        summaries_skipped,
        summaries_reused,
        "summarize completed"
    );

    Ok(())
}

fn summary_input_hash(abstract_text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(abstract_text.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn ensure_summary_model_entry(connection: &Connection, config: &SummarizerConfig) -> Result<()> {
    let config_json = serde_json::json!({
        "model_id": config.model_id,
        "strategy": config.strategy.as_str(),
        "max_input_chars": config.max_input_chars,
        "min_summary_words": config.min_summary_words,
        "max_summary_words": config.max_summary_words,
    })
    .to_string();

    connection.execute(
        "
        INSERT INTO summary_models(model_id, strategy, max_input_chars, min_summary_words, max_summary_words, created_at, config_json)
        VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7)
        ON CONFLICT(model_id) DO UPDATE SET
          strategy=excluded.strategy,
          max_input_chars=excluded.max_input_chars,
          min_summary_words=excluded.min_summary_words,
          max_summary_words=excluded.max_summary_words,
          config_json=excluded.config_json
        ",
        params![
            config.model_id,
            config.strategy.as_str(),
            config.max_input_chars as i64,
            config.min_summary_words as i64,
            config.max_summary_words as i64,
            now_utc_string(),
            config_json,
        ],
    )?;

    Ok(())
}

fn load_existing_summaries(
    connection: &Connection,
    model_id: &str,
) -> Result<HashMap<String, StoredSummary>> {
    let mut statement = connection.prepare(
        "
        SELECT paper_id, summary, abstract_hash
        FROM summaries
        WHERE model_id = ?1
        ",
    )?;

    let mut rows = statement.query([model_id])?;
    let mut out = HashMap::<String, StoredSummary>::new();

    while let Some(row) = rows.next()? {
        let paper_id: String = row.get(0)?;
        out.insert(
            paper_id,
            StoredSummary {
                summary: row.get(1)?,
                abstract_hash: row.get(2)?,
            },
        );
    }

    Ok(out)
}

fn flush_summary_batch(
    connection: &mut Connection,
    model_id: &str,
    pending: &mut Vec<PendingSummary>,
) -> Result<()> {
    if pending.is_empty() {
        return Ok(());
    }

    let generated_at = now_utc_string();
    let tx = connection.transaction()?;
    for entry in pending.drain(..) {
        tx.execute(
            "
            INSERT INTO summaries(paper_id, model_id, summary, status, abstract_hash, generated_at)
            VALUES(?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(paper_id, model_id) DO UPDATE SET
              summary=excluded.summary,
              status=excluded.status,
              abstract_hash=excluded.abstract_hash,
              generated_at=excluded.generated_at
            ",
            params![
                entry.paper_id,
                model_id,
                entry.summary,
                entry.status,
                entry.abstract_hash,
                generated_at,
            ],
        )?;
    }
    tx.commit()?;

    Ok(())
}

fn write_summaries_csv(
    path: &Path,
    papers: &[Paper],
    cohort: &[String],
    summary_columns: &[Vec<String>],
) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_directory(parent)?;
    }

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create summaries artifact: {}", path.display()))?;

    let mut header = vec!["paper_id".to_string(), "abstract".to_string()];
    for model_id in cohort {
        header.push(format!("{model_id}_summary"));
    }
    writer
        .write_record(&header)
        .context("failed to write summaries header")?;

    for (index, paper) in papers.iter().enumerate() {
        let mut record = vec![paper.paper_id.clone(), paper.abstract_text.clone()];
        for column in summary_columns {
            record.push(column[index].clone());
        }
        writer
            .write_record(&record)
            .context("failed to write summaries record")?;
    }

    writer
        .flush()
        .with_context(|| format!("failed to flush summaries artifact: {}", path.display()))?;

    Ok(())
}
