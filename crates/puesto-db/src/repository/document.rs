//! # Document Repository
//!
//! JSON documents addressed by `(collection, id)`, with the write operations
//! the coordinator needs.
//!
//! ## Write Operations
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Set { merge: false }   replace the whole body (creates if missing)    │
//! │  Set { merge: true }    overlay top-level fields (creates if missing)  │
//! │  Update                 overlay fields; document must exist            │
//! │  Increment              field += delta; missing field counts as 0;     │
//! │                         document must exist                            │
//! │  Delete                 remove (no error when already gone)            │
//! │                                                                         │
//! │  apply(&[DocumentWrite]) runs a batch in ONE transaction:              │
//! │  either every write lands or none does.                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! [`apply_op`] is the pure part of the write path and is shared with the
//! in-memory store so both behave identically.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};

/// A JSON object body.
pub type Body = Map<String, Value>;

// =============================================================================
// Types
// =============================================================================

/// A document as stored.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub collection: String,
    pub id: String,
    pub body: Body,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One change to one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum DocumentOp {
    Set { body: Body, merge: bool },
    Update { fields: Body },
    Increment { field: String, delta: i64 },
    Delete,
}

/// A [`DocumentOp`] aimed at a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentWrite {
    pub collection: String,
    pub id: String,
    pub op: DocumentOp,
}

impl DocumentWrite {
    pub fn new(collection: impl Into<String>, id: impl Into<String>, op: DocumentOp) -> Self {
        DocumentWrite {
            collection: collection.into(),
            id: id.into(),
            op,
        }
    }

    fn path(&self) -> String {
        format!("{}/{}", self.collection, self.id)
    }
}

/// Outcome of one write: the document's body afterwards, `None` if deleted.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedWrite {
    pub collection: String,
    pub id: String,
    pub body: Option<Body>,
}

// =============================================================================
// Pure Write Semantics
// =============================================================================

/// Applies `op` to the current body of the document at `path`.
///
/// Returns the new body, or `None` when the document is deleted.
pub fn apply_op(path: &str, current: Option<Body>, op: &DocumentOp) -> DbResult<Option<Body>> {
    match op {
        DocumentOp::Set { body, merge: false } => Ok(Some(body.clone())),

        DocumentOp::Set { body, merge: true } => {
            let mut merged = current.unwrap_or_default();
            for (k, v) in body {
                merged.insert(k.clone(), v.clone());
            }
            Ok(Some(merged))
        }

        DocumentOp::Update { fields } => {
            let mut existing = current.ok_or_else(|| DbError::not_found("Document", path))?;
            for (k, v) in fields {
                existing.insert(k.clone(), v.clone());
            }
            Ok(Some(existing))
        }

        DocumentOp::Increment { field, delta } => {
            let mut existing = current.ok_or_else(|| DbError::not_found("Document", path))?;
            let value = match existing.get(field) {
                None | Some(Value::Null) => 0,
                Some(v) => v.as_i64().ok_or_else(|| {
                    DbError::invalid(path, format!("field '{}' is not an integer", field))
                })?,
            };
            let next = value.checked_add(*delta).ok_or_else(|| {
                DbError::invalid(path, format!("field '{}' would overflow", field))
            })?;
            existing.insert(field.clone(), Value::from(next));
            Ok(Some(existing))
        }

        DocumentOp::Delete => Ok(None),
    }
}

fn parse_body(path: &str, raw: &str) -> DbResult<Body> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(DbError::invalid(path, "body is not a JSON object")),
        Err(e) => Err(DbError::invalid(path, e.to_string())),
    }
}

// =============================================================================
// Repository
// =============================================================================

type DocumentRow = (String, String, String, DateTime<Utc>, DateTime<Utc>);

fn row_to_document(row: DocumentRow) -> DbResult<StoredDocument> {
    let (collection, id, raw, created_at, updated_at) = row;
    let body = parse_body(&format!("{}/{}", collection, id), &raw)?;
    Ok(StoredDocument {
        collection,
        id,
        body,
        created_at,
        updated_at,
    })
}

/// Repository for document rows.
///
/// ## Usage
/// ```rust,ignore
/// let docs = db.documents();
/// let stock_a = docs.get("stocks", "A").await?;
/// let id = docs.insert("registros", body).await?;
/// ```
#[derive(Debug, Clone)]
pub struct DocumentRepository {
    pool: SqlitePool,
}

impl DocumentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        DocumentRepository { pool }
    }

    /// Fetches one document.
    pub async fn get(&self, collection: &str, id: &str) -> DbResult<Option<StoredDocument>> {
        let row: Option<DocumentRow> = sqlx::query_as(
            "SELECT collection, id, body, created_at, updated_at
             FROM documents WHERE collection = ?1 AND id = ?2",
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_document).transpose()
    }

    /// All documents of a collection, oldest first.
    pub async fn list(&self, collection: &str) -> DbResult<Vec<StoredDocument>> {
        let rows: Vec<DocumentRow> = sqlx::query_as(
            "SELECT collection, id, body, created_at, updated_at
             FROM documents WHERE collection = ?1
             ORDER BY created_at, id",
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await?;

        debug!(collection = %collection, count = rows.len(), "Listed documents");
        rows.into_iter().map(row_to_document).collect()
    }

    /// Appends a new document with a generated id and returns the id.
    pub async fn insert(&self, collection: &str, body: &Body) -> DbResult<String> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let raw = serde_json::to_string(body)?;

        debug!(collection = %collection, id = %id, "Inserting document");

        sqlx::query(
            "INSERT INTO documents (collection, id, body, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
        )
        .bind(collection)
        .bind(&id)
        .bind(raw)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    /// Applies a batch of writes in one transaction.
    ///
    /// On any error nothing is committed.
    pub async fn apply(&self, writes: &[DocumentWrite]) -> DbResult<Vec<AppliedWrite>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        let mut applied = Vec::with_capacity(writes.len());

        for write in writes {
            let path = write.path();
            let raw: Option<(String,)> =
                sqlx::query_as("SELECT body FROM documents WHERE collection = ?1 AND id = ?2")
                    .bind(&write.collection)
                    .bind(&write.id)
                    .fetch_optional(&mut *tx)
                    .await?;

            let current = raw.map(|(r,)| parse_body(&path, &r)).transpose()?;
            let next = apply_op(&path, current, &write.op)?;
            let now = Utc::now();

            match &next {
                Some(body) => {
                    sqlx::query(
                        "INSERT INTO documents (collection, id, body, created_at, updated_at)
                         VALUES (?1, ?2, ?3, ?4, ?4)
                         ON CONFLICT (collection, id)
                         DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at",
                    )
                    .bind(&write.collection)
                    .bind(&write.id)
                    .bind(serde_json::to_string(body)?)
                    .bind(now)
                    .execute(&mut *tx)
                    .await?;
                }
                None => {
                    sqlx::query("DELETE FROM documents WHERE collection = ?1 AND id = ?2")
                        .bind(&write.collection)
                        .bind(&write.id)
                        .execute(&mut *tx)
                        .await?;
                }
            }

            debug!(path = %path, deleted = next.is_none(), "Applied document write");

            applied.push(AppliedWrite {
                collection: write.collection.clone(),
                id: write.id.clone(),
                body: next,
            });
        }

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        Ok(applied)
    }

    /// Number of documents in a collection.
    pub async fn count(&self, collection: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE collection = ?1")
            .bind(collection)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use serde_json::json;

    fn body(value: Value) -> Body {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_apply_op_merge_and_replace() {
        let current = Some(body(json!({"chapata": 5, "sandwich": 2})));

        let merged = apply_op(
            "stocks/A",
            current.clone(),
            &DocumentOp::Set {
                body: body(json!({"chapata": 9})),
                merge: true,
            },
        )
        .unwrap()
        .unwrap();
        assert_eq!(Value::Object(merged), json!({"chapata": 9, "sandwich": 2}));

        let replaced = apply_op(
            "stocks/A",
            current,
            &DocumentOp::Set {
                body: body(json!({"chapata": 9})),
                merge: false,
            },
        )
        .unwrap()
        .unwrap();
        assert_eq!(Value::Object(replaced), json!({"chapata": 9}));
    }

    #[test]
    fn test_apply_op_increment() {
        let op = DocumentOp::Increment {
            field: "chapata".into(),
            delta: -3,
        };
        let next = apply_op("stocks/A", Some(body(json!({"chapata": 5}))), &op)
            .unwrap()
            .unwrap();
        assert_eq!(next["chapata"], 2);

        // missing field counts as zero
        let next = apply_op("stocks/A", Some(Body::new()), &op).unwrap().unwrap();
        assert_eq!(next["chapata"], -3);

        assert!(matches!(
            apply_op("stocks/A", None, &op),
            Err(DbError::NotFound { .. })
        ));
        assert!(matches!(
            apply_op("stocks/A", Some(body(json!({"chapata": "x"}))), &op),
            Err(DbError::InvalidDocument { .. })
        ));
    }

    #[test]
    fn test_apply_op_increment_overflow_is_an_error() {
        let up = DocumentOp::Increment {
            field: "chapata".into(),
            delta: 1,
        };
        let current = Some(body(json!({ "chapata": i64::MAX })));
        assert!(matches!(
            apply_op("stocks/A", current, &up),
            Err(DbError::InvalidDocument { .. })
        ));

        let down = DocumentOp::Increment {
            field: "chapata".into(),
            delta: -1,
        };
        let current = Some(body(json!({ "chapata": i64::MIN })));
        assert!(apply_op("stocks/A", current, &down).is_err());
    }

    #[test]
    fn test_apply_op_update_requires_document() {
        let op = DocumentOp::Update {
            fields: body(json!({"name": "Chapata grande"})),
        };
        assert!(apply_op("productos/x", None, &op).is_err());
        assert_eq!(apply_op("productos/x", None, &DocumentOp::Delete).unwrap(), None);
    }

    #[tokio::test]
    async fn test_batch_is_atomic() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let docs = db.documents();

        docs.apply(&[DocumentWrite::new(
            "stocks",
            "A",
            DocumentOp::Set {
                body: body(json!({"chapata": 2})),
                merge: false,
            },
        )])
        .await
        .unwrap();

        // second write targets a missing document, so the first must roll back
        let result = docs
            .apply(&[
                DocumentWrite::new(
                    "stocks",
                    "A",
                    DocumentOp::Increment {
                        field: "chapata".into(),
                        delta: -2,
                    },
                ),
                DocumentWrite::new(
                    "stocks",
                    "B",
                    DocumentOp::Increment {
                        field: "chapata".into(),
                        delta: 2,
                    },
                ),
            ])
            .await;
        assert!(result.is_err());

        let a = docs.get("stocks", "A").await.unwrap().unwrap();
        assert_eq!(a.body["chapata"], 2);
        assert!(docs.get("stocks", "B").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_insert_and_list() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let docs = db.documents();

        let id = docs
            .insert("registros", &body(json!({"totalVenta": 0})))
            .await
            .unwrap();
        assert_eq!(docs.count("registros").await.unwrap(), 1);

        let listed = docs.list("registros").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, id);
        assert!(docs.list("productos").await.unwrap().is_empty());
    }
}
