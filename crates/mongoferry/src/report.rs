//! Plain-text rendering of analysis results and migration summaries.

use crate::analyzer::DatabaseStats;
use crate::stats::{MigrationProgress, MigrationStats};

/// Errors listed in a summary before the rest are only counted.
pub const MAX_LISTED_ERRORS: usize = 5;

/// Formats a byte count as megabytes with two decimals.
pub fn megabytes(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / 1024.0 / 1024.0)
}

/// Renders every database with its collections, largest first.
pub fn analysis_summary(databases: &[DatabaseStats]) -> String {
    let mut out = String::from("Database Analysis Summary:\n");
    for db in databases {
        out.push_str(&format!(
            "\n{} ({} documents, {})\nCollections:\n",
            db.name,
            db.total_documents,
            megabytes(db.total_size)
        ));
        let mut collections: Vec<_> = db.collections.iter().collect();
        collections.sort_by(|a, b| b.size.cmp(&a.size));
        for coll in collections {
            out.push_str(&format!(
                "  {}: {} docs, {}, {} indexes\n",
                coll.name,
                coll.count,
                megabytes(coll.size),
                coll.indexes.len()
            ));
        }
    }
    out
}

/// Spinner text for a progress snapshot.
pub fn progress_line(progress: &MigrationProgress) -> String {
    format!(
        "Migrating {}.{}: {}/{} docs ({}%)",
        progress.database,
        progress.collection,
        progress.processed_documents,
        progress.total_documents,
        progress.percentage
    )
}

/// Lists the first errors, then counts the remainder.
pub fn error_list(stats: &MigrationStats) -> Vec<String> {
    let mut lines: Vec<String> = stats
        .errors
        .iter()
        .take(MAX_LISTED_ERRORS)
        .enumerate()
        .map(|(i, e)| format!("{}. {e}", i + 1))
        .collect();
    if stats.errors.len() > MAX_LISTED_ERRORS {
        lines.push(format!(
            "...and {} more errors. See logs for details.",
            stats.errors.len() - MAX_LISTED_ERRORS
        ));
    }
    lines
}

/// Final summary lines printed after a run.
pub fn migration_summary(stats: &MigrationStats) -> Vec<String> {
    let mut lines = vec![
        "Migration Summary:".to_string(),
        format!("Status: {}", stats.status),
        format!("Duration: {} seconds", stats.elapsed_secs().round()),
        format!("Databases: {}", stats.total_databases),
        format!("Collections: {}", stats.total_collections),
        format!(
            "Documents: {}/{} migrated",
            stats.migrated_documents, stats.total_documents
        ),
    ];
    if stats.failed_documents > 0 {
        lines.push(format!(
            "{} documents failed to migrate",
            stats.failed_documents
        ));
    }
    lines
}
