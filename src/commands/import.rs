use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::Utc;
use rusqlite::{Connection, OpenFlags, params};
use tracing::{info, warn};

use crate::cli::ImportArgs;
use crate::corpus::{AbstractStatus, Paper, validate_abstract};
use crate::model::ImportRunManifest;
use crate::util::{ensure_directory, now_utc_string, utc_compact_string, write_json_pretty};

pub const DB_SCHEMA_VERSION: &str = "0.1.0";
const DB_FILENAME: &str = "summeval.sqlite";

const ID_COLUMNS: [&str; 3] = ["paper_id", "id", "arxiv_id"];
const ABSTRACT_COLUMNS: [&str; 2] = ["abstract", "abstract_text"];
const TITLE_COLUMNS: [&str; 1] = ["title"];

pub fn default_db_path(cache_root: &Path) -> PathBuf {
    cache_root.join(DB_FILENAME)
}

pub fn open_store_rw(db_path: &Path) -> Result<Connection> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            ensure_directory(parent)?;
        }
    }

    let connection = Connection::open(db_path)
        .with_context(|| format!("failed to open store: {}", db_path.display()))?;

    connection
        .pragma_update(None, "journal_mode", "WAL")
        .context("failed to set journal_mode=WAL")?;
    connection
        .pragma_update(None, "synchronous", "NORMAL")
        .context("failed to set synchronous=NORMAL")?;

    Ok(connection)
}

pub fn open_store_ro(db_path: &Path) -> Result<Connection> {
    Connection::open_with_flags(
        db_path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .with_context(|| format!("failed to open store read-only: {}", db_path.display()))
}

pub fn ensure_store_schema(connection: &Connection) -> Result<()> {
    connection
        .execute_batch(
            "
            CREATE TABLE IF NOT EXISTS papers(
              paper_id TEXT PRIMARY KEY,
              title TEXT NOT NULL DEFAULT '',
              abstract TEXT NOT NULL DEFAULT '',
              abstract_status TEXT NOT NULL DEFAULT 'valid',
              imported_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS summary_models(
              model_id TEXT PRIMARY KEY,
              strategy TEXT NOT NULL,
              max_input_chars INTEGER NOT NULL,
              min_summary_words INTEGER NOT NULL,
              max_summary_words INTEGER NOT NULL,
              created_at TEXT NOT NULL,
              config_json TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS summaries(
              paper_id TEXT NOT NULL,
              model_id TEXT NOT NULL,
              summary TEXT NOT NULL,
              status TEXT NOT NULL,
              abstract_hash TEXT NOT NULL,
              generated_at TEXT NOT NULL,
              PRIMARY KEY(paper_id, model_id)
            );

            CREATE TABLE IF NOT EXISTS embedding_models(
              model_id TEXT PRIMARY KEY,
              backend TEXT NOT NULL,
              dimensions INTEGER NOT NULL,
              normalize INTEGER NOT NULL DEFAULT 1,
              created_at TEXT NOT NULL,
              config_json TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS similarity_scores(
              paper_id TEXT NOT NULL,
              model_id TEXT NOT NULL,
              embedding_model_id TEXT NOT NULL,
              score REAL NOT NULL,
              summary_status TEXT NOT NULL,
              scored_at TEXT NOT NULL,
              PRIMARY KEY(paper_id, model_id)
            );
            ",
        )
        .context("failed to ensure store schema")
}

pub fn load_papers(connection: &Connection) -> Result<Vec<Paper>> {
    let mut statement = connection.prepare(
        "
        SELECT paper_id, title, abstract, abstract_status
        FROM papers
        ORDER BY paper_id ASC
        ",
    )?;

    let mut rows = statement.query([])?;
    let mut out = Vec::<Paper>::new();

    while let Some(row) = rows.next()? {
        let status_raw: String = row.get(3)?;
        out.push(Paper {
            paper_id: row.get(0)?,
            title: row.get(1)?,
            abstract_text: row.get(2)?,
            abstract_status: AbstractStatus::parse(&status_raw)?,
        });
    }

    Ok(out)
}

pub fn run(args: ImportArgs) -> Result<()> {
    let db_path = args
        .db_path
        .clone()
        .unwrap_or_else(|| default_db_path(&args.cache_root));
    let manifest_dir = args.cache_root.join("manifests");
    ensure_directory(&manifest_dir)?;

    let (papers, rows_read, rows_without_id) = read_input_rows(&args.input_path)?;
    let missing_abstracts = papers
        .iter()
        .filter(|paper| paper.abstract_status == AbstractStatus::Missing)
        .count();

    let mut warnings = Vec::<String>::new();
    if rows_without_id > 0 {
        warnings.push(format!("{rows_without_id} rows had no usable id and were dropped"));
    }
    if missing_abstracts > 0 {
        warnings.push(format!(
            "{missing_abstracts} papers have a missing or blank abstract and were flagged"
        ));
    }
    if papers.is_empty() {
        warnings.push("input contained no importable rows".to_string());
    }

    let papers_upserted = if args.dry_run {
        info!(rows_read, "dry run; store not touched");
        0
    } else {
        let mut connection = open_store_rw(&db_path)?;
        ensure_store_schema(&connection)?;
        upsert_papers(&mut connection, &papers)?
    };

    let manifest = ImportRunManifest {
        manifest_version: 1,
        run_id: format!("import-{}", utc_compact_string(Utc::now())),
        generated_at: now_utc_string(),
        input_path: args.input_path.display().to_string(),
        db_path: db_path.display().to_string(),
        db_schema_version: DB_SCHEMA_VERSION.to_string(),
        rows_read,
        rows_without_id,
        papers_upserted,
        missing_abstracts,
        dry_run: args.dry_run,
        status: "completed".to_string(),
        warnings: warnings.clone(),
    };

    let manifest_path = manifest_dir.join("import_run.json");
    write_json_pretty(&manifest_path, &manifest)?;

    for warning in &warnings {
        warn!(warning = %warning, "import warning");
    }
    info!(
        input_path = %args.input_path.display(),
        rows_read,
        papers_upserted,
        missing_abstracts,
        "import completed"
    );

    Ok(())
}

fn read_input_rows(input_path: &Path) -> Result<(Vec<Paper>, usize, usize)> {
    let mut reader = csv::Reader::from_path(input_path)
        .with_context(|| format!("failed to open input file: {}", input_path.display()))?;

    let headers = reader
        .headers()
        .with_context(|| format!("failed to read header row: {}", input_path.display()))?
        .clone();

    let id_index = locate_column(&headers, &ID_COLUMNS);
    let Some(id_index) = id_index else {
        bail!(
            "input file has no id column (expected one of: {})",
            ID_COLUMNS.join(", ")
        );
    };
    let Some(abstract_index) = locate_column(&headers, &ABSTRACT_COLUMNS) else {
        bail!(
            "input file has no abstract column (expected one of: {})",
            ABSTRACT_COLUMNS.join(", ")
        );
    };
    let title_index = locate_column(&headers, &TITLE_COLUMNS);

    let mut papers = Vec::<Paper>::new();
    let mut rows_read = 0usize;
    let mut rows_without_id = 0usize;

    for record in reader.records() {
        let record = record
            .with_context(|| format!("failed to read record: {}", input_path.display()))?;
        rows_read += 1;

        let paper_id = record.get(id_index).unwrap_or_default().trim().to_string();
        if paper_id.is_empty() {
            rows_without_id += 1;
            continue;
        }

        let (abstract_text, abstract_status) = validate_abstract(record.get(abstract_index));
        let title = title_index
            .and_then(|index| record.get(index))
            .unwrap_or_default()
            .trim()
            .to_string();

        papers.push(Paper {
            paper_id,
            title,
            abstract_text,
            abstract_status,
        });
    }

    Ok((papers, rows_read, rows_without_id))
}

fn locate_column(headers: &csv::StringRecord, candidates: &[&str]) -> Option<usize> {
    for candidate in candidates {
        if let Some(index) = headers
            .iter()
            .position(|header| header.trim().eq_ignore_ascii_case(candidate))
        {
            return Some(index);
        }
    }
    None
}

fn upsert_papers(connection: &mut Connection, papers: &[Paper]) -> Result<usize> {
    let imported_at = now_utc_string();
    let tx = connection.transaction()?;
    let mut upserted = 0usize;

    for paper in papers {
        tx.execute(
            "
            INSERT INTO papers(paper_id, title, abstract, abstract_status, imported_at)
            VALUES(?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(paper_id) DO UPDATE SET
              title=excluded.title,
              abstract=excluded.abstract,
              abstract_status=excluded.abstract_status,
              imported_at=excluded.imported_at
            ",
            params![
                paper.paper_id,
                paper.title,
                paper.abstract_text,
                paper.abstract_status.as_str(),
                imported_at,
            ],
        )?;
        upserted += 1;
    }

    tx.commit()?;
    Ok(upserted)
}
