//! libSQL-backed classification history.
//!
//! The [`Storage`] struct records every [`ClassificationResult`] so the
//! review queue and per-category counts can be inspected later.
//!
//! **Access rules:**
//! - classification runs: read-write via [`Storage::open`]
//! - history queries: read-only via [`Storage::open_readonly`]

mod migrations;

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use libsql::{Connection, Database, Row, params};
use serde::Serialize;
use tracing::debug;

use triage_shared::{
    Category, CategoryScores, ClassificationResult, Disposition, DocumentId, FileFormat, Result,
    TriageError,
};

/// A classification as read back from the database.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredResult {
    pub document_id: DocumentId,
    pub source: Option<String>,
    pub document_type: Category,
    pub file_format: FileFormat,
    pub confidence_score: f64,
    pub scores: CategoryScores,
    pub disposition: Disposition,
    pub content_hash: Option<String>,
    pub classified_at: DateTime<Utc>,
}

impl StoredResult {
    pub fn needs_review(&self) -> bool {
        self.disposition == Disposition::NeedsReview
    }
}

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

fn storage_err(e: impl std::fmt::Display) -> TriageError {
    TriageError::Storage(e.to_string())
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| TriageError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;
        Self::from_database(db, false, true).await
    }

    /// Open a private in-memory database, migrated and writable.
    pub async fn open_in_memory() -> Result<Self> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(storage_err)?;
        Self::from_database(db, false, true).await
    }

    /// Open an existing database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(TriageError::Storage(format!(
                "database not found: {}",
                path.display()
            )));
        }
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;
        Self::from_database(db, true, false).await
    }

    async fn from_database(db: Database, readonly: bool, migrate: bool) -> Result<Self> {
        let conn = db.connect().map_err(storage_err)?;
        let storage = Self { db, conn, readonly };
        if migrate {
            storage.run_migrations().await?;
        }
        Ok(storage)
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    TriageError::Storage(format!("migration v{} failed: {e}", migration.version))
                })?;
            }
        }
        Ok(())
    }

    /// Current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0,
        }
    }

    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(TriageError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Classification records
    // -----------------------------------------------------------------------

    /// Insert or replace the record for `result.document_id()`.
    pub async fn record_result(
        &self,
        result: &ClassificationResult,
        source: Option<&str>,
        content_hash: Option<&str>,
    ) -> Result<()> {
        self.check_writable()?;
        let scores_json = serde_json::to_string(result.scores()).map_err(storage_err)?;
        self.conn
            .execute(
                "INSERT INTO classifications (document_id, source, document_type, file_format,
                    confidence_score, scores_json, disposition, content_hash, classified_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT(document_id) DO UPDATE SET
                   source = excluded.source,
                   document_type = excluded.document_type,
                   file_format = excluded.file_format,
                   confidence_score = excluded.confidence_score,
                   scores_json = excluded.scores_json,
                   disposition = excluded.disposition,
                   content_hash = excluded.content_hash,
                   classified_at = excluded.classified_at",
                params![
                    result.document_id().to_string(),
                    source,
                    result.document_type().as_str(),
                    result.file_format().as_str(),
                    result.confidence_score(),
                    scores_json,
                    result.disposition().as_str(),
                    content_hash,
                    result.classified_at().to_rfc3339(),
                ],
            )
            .await
            .map_err(storage_err)?;
        debug!(document_id = %result.document_id(), "classification recorded");
        Ok(())
    }

    /// Fetch the record for one document.
    pub async fn get_result(&self, document_id: DocumentId) -> Result<Option<StoredResult>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {COLUMNS} FROM classifications WHERE document_id = ?1"),
                params![document_id.to_string()],
            )
            .await
            .map_err(storage_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_stored(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(storage_err(e)),
        }
    }

    /// Most recent records first, optionally only those awaiting review.
    pub async fn list_recent(
        &self,
        limit: usize,
        needs_review_only: bool,
    ) -> Result<Vec<StoredResult>> {
        let filter = if needs_review_only {
            "WHERE disposition = 'needs_review'"
        } else {
            ""
        };
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {COLUMNS} FROM classifications {filter}
                     ORDER BY classified_at DESC, rowid DESC LIMIT ?1"
                ),
                params![limit as i64],
            )
            .await
            .map_err(storage_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            results.push(row_to_stored(&row)?);
        }
        Ok(results)
    }

    /// Number of records per category. Every category is present.
    pub async fn category_counts(&self) -> Result<BTreeMap<Category, u64>> {
        let mut counts: BTreeMap<Category, u64> =
            Category::ALL.iter().map(|c| (*c, 0)).collect();

        let mut rows = self
            .conn
            .query(
                "SELECT document_type, COUNT(*) FROM classifications GROUP BY document_type",
                params![],
            )
            .await
            .map_err(storage_err)?;

        while let Some(row) = rows.next().await.map_err(storage_err)? {
            let name: String = row.get(0).map_err(storage_err)?;
            let n: i64 = row.get(1).map_err(storage_err)?;
            counts.insert(name.parse()?, n.max(0) as u64);
        }
        Ok(counts)
    }

    /// Total number of records.
    pub async fn count(&self) -> Result<u64> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM classifications", params![])
            .await
            .map_err(storage_err)?;
        match rows.next().await.map_err(storage_err)? {
            Some(row) => Ok(row.get::<i64>(0).map_err(storage_err)?.max(0) as u64),
            None => Ok(0),
        }
    }
}

const COLUMNS: &str = "document_id, source, document_type, file_format, confidence_score, \
                       scores_json, disposition, content_hash, classified_at";

fn row_to_stored(row: &Row) -> Result<StoredResult> {
    let id: String = row.get(0).map_err(storage_err)?;
    let document_type: String = row.get(2).map_err(storage_err)?;
    let file_format: String = row.get(3).map_err(storage_err)?;
    let scores_json: String = row.get(5).map_err(storage_err)?;
    let disposition: String = row.get(6).map_err(storage_err)?;
    let classified_at: String = row.get(8).map_err(storage_err)?;

    Ok(StoredResult {
        document_id: id.parse().map_err(storage_err)?,
        source: row.get::<String>(1).ok(),
        document_type: document_type.parse()?,
        file_format: file_format.parse()?,
        confidence_score: row.get(4).map_err(storage_err)?,
        scores: serde_json::from_str(&scores_json).map_err(storage_err)?,
        disposition: match disposition.as_str() {
            "accepted" => Disposition::Accepted,
            "needs_review" => Disposition::NeedsReview,
            other => {
                return Err(TriageError::Storage(format!("invalid disposition: {other}")));
            }
        },
        content_hash: row.get::<String>(7).ok(),
        classified_at: DateTime::parse_from_rfc3339(&classified_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| TriageError::Storage(format!("invalid date: {e}")))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn result(scores: [f64; 3]) -> ClassificationResult {
        ClassificationResult::from_scores(
            DocumentId::new(),
            FileFormat::Pdf,
            CategoryScores::from_array(scores),
            0.75,
        )
    }

    fn result_at(scores: [f64; 3], classified_at: &str) -> ClassificationResult {
        let mut value = serde_json::to_value(result(scores)).unwrap();
        value["classified_at"] = serde_json::json!(classified_at);
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn open_and_migrate() {
        let storage = Storage::open_in_memory().await.expect("open in-memory db");
        assert_eq!(storage.get_schema_version().await, 1);
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let tmp = std::env::temp_dir().join(format!("triage_test_{}.db", Uuid::now_v7()));
        let s1 = Storage::open(&tmp).await.expect("first open");
        drop(s1);
        let s2 = Storage::open(&tmp).await.expect("second open");
        assert_eq!(s2.get_schema_version().await, 1);
    }

    #[tokio::test]
    async fn record_and_get() {
        let storage = Storage::open_in_memory().await.unwrap();
        let r = result([0.9, 0.05, 0.05]);
        storage
            .record_result(&r, Some("inbox/a.pdf"), Some("abc123"))
            .await
            .expect("record");

        let stored = storage.get_result(r.document_id()).await.unwrap().unwrap();
        assert_eq!(stored.document_type, Category::Invoice);
        assert_eq!(stored.file_format, FileFormat::Pdf);
        assert_eq!(stored.source.as_deref(), Some("inbox/a.pdf"));
        assert_eq!(stored.content_hash.as_deref(), Some("abc123"));
        assert_eq!(stored.scores, *r.scores());
        assert!(!stored.needs_review());

        assert!(storage.get_result(DocumentId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn rerecord_replaces() {
        let storage = Storage::open_in_memory().await.unwrap();
        let r = result([0.9, 0.05, 0.05]);
        storage.record_result(&r, None, None).await.unwrap();
        storage.record_result(&r, Some("again"), None).await.unwrap();
        assert_eq!(storage.count().await.unwrap(), 1);
        let stored = storage.get_result(r.document_id()).await.unwrap().unwrap();
        assert_eq!(stored.source.as_deref(), Some("again"));
    }

    #[tokio::test]
    async fn review_queue_and_counts() {
        let storage = Storage::open_in_memory().await.unwrap();
        storage
            .record_result(&result([0.9, 0.05, 0.05]), None, None)
            .await
            .unwrap();
        storage
            .record_result(&result([0.1, 0.5, 0.4]), None, None)
            .await
            .unwrap();
        storage
            .record_result(&result([0.05, 0.05, 0.9]), None, None)
            .await
            .unwrap();

        let all = storage.list_recent(10, false).await.unwrap();
        assert_eq!(all.len(), 3);
        let limited = storage.list_recent(2, false).await.unwrap();
        assert_eq!(limited.len(), 2);

        let review = storage.list_recent(10, true).await.unwrap();
        assert_eq!(review.len(), 1);
        assert_eq!(review[0].document_type, Category::SupportTicket);
        assert!(review[0].needs_review());

        let counts = storage.category_counts().await.unwrap();
        assert_eq!(counts[&Category::Invoice], 1);
        assert_eq!(counts[&Category::SupportTicket], 1);
        assert_eq!(counts[&Category::FeatureRequest], 1);
    }

    #[tokio::test]
    async fn counts_include_empty_categories() {
        let storage = Storage::open_in_memory().await.unwrap();
        let counts = storage.category_counts().await.unwrap();
        assert_eq!(counts.len(), 3);
        assert!(counts.values().all(|n| *n == 0));
    }

    #[tokio::test]
    async fn readonly_rejects_writes() {
        let tmp = std::env::temp_dir().join(format!("triage_test_{}.db", Uuid::now_v7()));
        let rw = Storage::open(&tmp).await.unwrap();
        rw.record_result(&result([0.9, 0.05, 0.05]), None, None)
            .await
            .unwrap();
        drop(rw);

        let ro = Storage::open_readonly(&tmp).await.unwrap();
        assert_eq!(ro.count().await.unwrap(), 1);
        let err = ro
            .record_result(&result([0.9, 0.05, 0.05]), None, None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("read-only"));
    }

    #[tokio::test]
    async fn readonly_requires_existing_file() {
        let tmp = std::env::temp_dir().join(format!("triage_missing_{}.db", Uuid::now_v7()));
        assert!(Storage::open_readonly(&tmp).await.is_err());
    }

    #[tokio::test]
    async fn recent_orders_by_classification_time() {
        let storage = Storage::open_in_memory().await.unwrap();
        // Inserted out of chronological order on purpose.
        let middle = result_at([0.9, 0.05, 0.05], "2025-02-01T09:00:00Z");
        let newest = result_at([0.4, 0.3, 0.3], "2025-03-01T09:00:00Z");
        let oldest = result_at([0.05, 0.9, 0.05], "2025-01-01T09:00:00Z");
        for r in [&middle, &newest, &oldest] {
            storage.record_result(r, None, None).await.unwrap();
        }

        let ids: Vec<DocumentId> = storage
            .list_recent(10, false)
            .await
            .unwrap()
            .iter()
            .map(|r| r.document_id)
            .collect();
        assert_eq!(
            ids,
            vec![newest.document_id(), middle.document_id(), oldest.document_id()]
        );

        let top = storage.list_recent(1, false).await.unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].document_id, newest.document_id());
        assert_eq!(top[0].classified_at, newest.classified_at());
    }

    #[tokio::test]
    async fn malformed_document_id_is_a_storage_error() {
        let storage = Storage::open_in_memory().await.unwrap();
        storage
            .conn
            .execute(
                "INSERT INTO classifications (document_id, document_type, file_format,
                    confidence_score, scores_json, disposition, classified_at)
                 VALUES ('not-a-uuid', 'invoice', 'pdf', 0.9,
                    '{\"invoice\":0.9,\"support_ticket\":0.05,\"feature_request\":0.05}',
                    'accepted', '2025-01-01T00:00:00Z')",
                params![],
            )
            .await
            .unwrap();

        let err = storage.list_recent(10, false).await.unwrap_err();
        assert!(matches!(err, TriageError::Storage(_)), "{err:?}");
    }
}
