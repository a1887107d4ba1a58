use anyhow::Result;
use rusqlite::Connection;
use tracing::{info, warn};

use crate::cli::StatusArgs;

use super::import::{default_db_path, open_store_ro};

pub fn run(args: StatusArgs) -> Result<()> {
    let db_path = default_db_path(&args.cache_root);
    let manifest_dir = args.cache_root.join("manifests");

    info!(cache_root = %args.cache_root.display(), "status requested");

    if db_path.exists() {
        let connection = open_store_ro(&db_path)?;
        let papers = query_count(&connection, "SELECT COUNT(*) FROM papers").unwrap_or(0);
        let summary_models =
            query_count(&connection, "SELECT COUNT(*) FROM summary_models").unwrap_or(0);
        let summaries = query_count(&connection, "SELECT COUNT(*) FROM summaries").unwrap_or(0);
        let skipped_summaries = query_count(
            &connection,
            "SELECT COUNT(*) FROM summaries WHERE status = 'skipped'",
        )
        .unwrap_or(0);
        let scores =
            query_count(&connection, "SELECT COUNT(*) FROM similarity_scores").unwrap_or(0);

        info!(
            path = %db_path.display(),
            papers,
            summary_models,
            summaries,
            skipped_summaries,
            scores,
            "store status"
        );
    } else {
        warn!(path = %db_path.display(), "store file missing");
    }

    for manifest_name in [
        "import_run.json",
        "summarize_run.json",
        "score_run.json",
        "comparison_report.json",
    ] {
        let manifest_path = manifest_dir.join(manifest_name);
        if manifest_path.exists() {
            info!(path = %manifest_path.display(), "manifest present");
        } else {
            warn!(path = %manifest_path.display(), "manifest missing");
        }
    }

    Ok(())
}

fn query_count(connection: &Connection, sql: &str) -> Result<i64> {
    let count = connection.query_row(sql, [], |row| row.get(0))?;
    Ok(count)
}
