use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use rusqlite::{Connection, params};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::cli::ScoreArgs;
use crate::corpus::Paper;
use crate::model::{EmbeddingModelConfigLock, ScoreRunManifest};
use crate::semantic::{
    EmbeddingEncoder, EmbeddingModelConfig, cosine_similarity, resolve_embedding_config,
};
use crate::summarizer::resolve_cohort;
use crate::util::{ensure_directory, now_utc_string, utc_compact_string, write_json_pretty};

use super::import::{default_db_path, ensure_store_schema, load_papers, open_store_rw};

#[derive(Debug, Clone)]
struct SummaryRow {
    summary: String,
    status: String,
}

struct PendingScore {
    paper_id: String,
    score: f64,
    summary_status: String,
}

pub fn run(args: ScoreArgs) -> Result<()> {
    let started = Instant::now();
    let cohort = resolve_cohort(&args.models)?;

    let db_path = args
        .db_path
        .clone()
        .unwrap_or_else(|| default_db_path(&args.cache_root));
    let manifest_dir = args.cache_root.join("manifests");
    ensure_directory(&manifest_dir)?;
    let scores_csv_path = args
        .scores_csv_path
        .clone()
        .unwrap_or_else(|| args.cache_root.join("artifacts").join("similarity_scores.csv"));
    let lock_path = args
        .embedding_model_lock_path
        .clone()
        .unwrap_or_else(|| manifest_dir.join("embedding_model_config.lock.json"));

    let encoder = EmbeddingEncoder::new(resolve_embedding_config(&args.embedding_model_id));

    let mut connection = open_store_rw(&db_path)?;
    ensure_store_schema(&connection)?;
    ensure_embedding_model_entry(&connection, encoder.config())?;
    write_embedding_model_lockfile(encoder.config(), &lock_path)?;

    let papers = load_papers(&connection)?;
    let mut warnings = Vec::<String>::new();
    if papers.is_empty() {
        warnings.push("store holds no papers; run import first".to_string());
    }

    let abstract_embeddings = papers
        .iter()
        .map(|paper| encoder.encode(&paper.abstract_text))
        .collect::<Vec<Vec<f32>>>();

    let mut score_columns = Vec::<Vec<f64>>::with_capacity(cohort.len());
    let mut scores_written = 0usize;
    let mut skipped_summaries = 0usize;

    for model_id in &cohort {
        let summaries = load_model_summaries(&connection, model_id)?;
        let mut column = Vec::<f64>::with_capacity(papers.len());
        let mut pending = Vec::<PendingScore>::new();

        for (index, paper) in papers.iter().enumerate() {
            let Some(row) = summaries.get(&paper.paper_id) else {
                bail!(
                    "missing summary for paper '{}' and model '{model_id}'; run summarize first",
                    paper.paper_id
                );
            };

            // a skipped summary embeds to the zero vector; pin it to 0.0
            // and carry the status tag into the scores table
            let score = if row.status == "skipped" {
                skipped_summaries += 1;
                0.0
            } else {
                let summary_embedding = encoder.encode(&row.summary);
                cosine_similarity(&abstract_embeddings[index], &summary_embedding)
            };

            column.push(score);
            pending.push(PendingScore {
                paper_id: paper.paper_id.clone(),
                score,
                summary_status: row.status.clone(),
            });
        }

        scores_written += flush_score_batch(
            &mut connection,
            model_id,
            &encoder.config().model_id,
            &mut pending,
        )?;
        info!(model_id = %model_id, scored = papers.len(), "model scored");
        score_columns.push(column);
    }

    write_scores_csv(&scores_csv_path, &papers, &cohort, &score_columns)?;

    let manifest = ScoreRunManifest {
        manifest_version: 1,
        run_id: format!("score-{}", utc_compact_string(Utc::now())),
        generated_at: now_utc_string(),
        cohort: cohort.clone(),
        embedding_model_id: encoder.config().model_id.clone(),
        embedding_dim: encoder.config().dimensions,
        embedding_backend: encoder.config().backend.clone(),
        papers_total: papers.len(),
        scores_written,
        skipped_summaries,
        scores_csv_path: scores_csv_path.display().to_string(),
        duration_ms: started.elapsed().as_millis(),
        status: "completed".to_string(),
        warnings: warnings.clone(),
    };

    let manifest_path = manifest_dir.join("score_run.json");
    write_json_pretty(&manifest_path, &manifest)?;

    for warning in &warnings {
        warn!(warning = %warning, "score warning");
    }
    info!(
        csv_path = %scores_csv_path.display(),
        embedding_model_id = %encoder.config().model_id,
        papers = papers.len(),
        scores_written,
        skipped_summaries,
        "score completed"
    );

    Ok(())
}

fn ensure_embedding_model_entry(
    connection: &Connection,
    config: &EmbeddingModelConfig,
) -> Result<()> {
    let config_json = serde_json::json!({
        "model_id": config.model_id,
        "dimensions": config.dimensions,
        "normalization": config.normalization,
        "backend": config.backend,
    })
    .to_string();

    connection.execute(
        "
        INSERT INTO embedding_models(model_id, backend, dimensions, normalize, created_at, config_json)
        VALUES(?1, ?2, ?3, 1, ?4, ?5)
        ON CONFLICT(model_id) DO UPDATE SET
          backend=excluded.backend,
          dimensions=excluded.dimensions,
          normalize=excluded.normalize,
          config_json=excluded.config_json
        ",
        params![
            config.model_id,
            config.backend,
            config.dimensions as i64,
            now_utc_string(),
            config_json,
        ],
    )?;

    Ok(())
}

fn write_embedding_model_lockfile(config: &EmbeddingModelConfig, lock_path: &Path) -> Result<()> {
    let checksum_input = format!(
        "{}|{}|{}|{}",
        config.model_id, config.dimensions, config.normalization, config.backend
    );
    let mut hasher = Sha256::new();
    hasher.update(checksum_input.as_bytes());
    let checksum = format!("{:x}", hasher.finalize());

    let lock = EmbeddingModelConfigLock {
        manifest_version: 1,
        model_id: config.model_id.clone(),
        embedding_dim: config.dimensions,
        normalization: config.normalization.clone(),
        runtime_backend: config.backend.clone(),
        created_at: now_utc_string(),
        checksum,
    };

    write_json_pretty(lock_path, &lock)
}

fn load_model_summaries(
    connection: &Connection,
    model_id: &str,
) -> Result<HashMap<String, SummaryRow>> {
    let mut statement = connection.prepare(
        "
        SELECT paper_id, summary, status
        FROM summaries
        WHERE model_id = ?1
        ",
    )?;

    let mut rows = statement.query([model_id])?;
    let mut out = HashMap::<String, SummaryRow>::new();

    while let Some(row) = rows.next()? {
        let paper_id: String = row.get(0)?;
        out.insert(
            paper_id,
            SummaryRow {
                summary: row.get(1)?,
                status: row.get(2)?,
            },
        );
    }

    Ok(out)
}

fn flush_score_batch(
    connection: &mut Connection,
    model_id: &str,
    embedding_model_id: &str,
    pending: &mut Vec<PendingScore>,
) -> Result<usize> {
    if pending.is_empty() {
        return Ok(0);
    }

    let scored_at = now_utc_string();
    let tx = connection.transaction()?;
    let mut written = 0usize;

    for entry in pending.drain(..) {
        tx.execute(
            "
            INSERT INTO similarity_scores(paper_id, model_id, embedding_model_id, score, summary_status, scored_at)
            VALUES(?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(paper_id, model_id) DO UPDATE SET
              embedding_model_id=excluded.embedding_model_id,
              score=excluded.score,
              summary_status=excluded.summary_status,
              scored_at=excluded.scored_at
            ",
            params![
                entry.paper_id,
                model_id,
                embedding_model_id,
                entry.score,
                entry.summary_status,
                scored_at,
            ],
        )?;
        written += 1;
    }

    tx.commit()?;
    Ok(written)
}

fn write_scores_csv(
    path: &Path,
    papers: &[Paper],
    cohort: &[String],
    score_columns: &[Vec<f64>],
) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_directory(parent)?;
    }

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create scores artifact: {}", path.display()))?;

    let mut header = vec!["paper_id".to_string()];
    header.extend(cohort.iter().cloned());
    writer
        .write_record(&header)
        .context("failed to write scores header")?;

    for (index, paper) in papers.iter().enumerate() {
        let mut record = vec![paper.paper_id.clone()];
        for column in score_columns {
            record.push(column[index].to_string());
        }
        writer
            .write_record(&record)
            .context("failed to write scores record")?;
    }

    writer
        .flush()
        .with_context(|| format!("failed to flush scores artifact: {}", path.display()))?;

    Ok(())
}
