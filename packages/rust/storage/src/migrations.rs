//! SQL migrations for the classification history database.
//!
//! Applied in ascending order on [`crate::Storage::open`]. Each migration
//! records its version in `schema_migrations`.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: classifications",
        sql: r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- One row per classified document; reclassification replaces the row
CREATE TABLE IF NOT EXISTS classifications (
    document_id      TEXT PRIMARY KEY,
    source           TEXT,
    document_type    TEXT NOT NULL,
    file_format      TEXT NOT NULL,
    confidence_score REAL NOT NULL,
    scores_json      TEXT NOT NULL,
    disposition      TEXT NOT NULL,
    content_hash     TEXT,
    classified_at    TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_classifications_type ON classifications(document_type);
CREATE INDEX IF NOT EXISTS idx_classifications_disposition ON classifications(disposition);
CREATE INDEX IF NOT EXISTS idx_classifications_at ON classifications(classified_at);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
