//! Revisioned JSON document store
//!
//! One store per identity, persisted to a single documents file through
//! atomic writes. Every document carries a monotonically increasing `_rev`;
//! writes must present the revision they read or fail with a conflict, which
//! is how concurrent modification is detected. `bulk_put` applies a batch of
//! writes atomically: either every document in the batch lands (and is
//! persisted) or none do.

use std::collections::HashMap;
use std::path::PathBuf;

use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{LedgerError, LedgerResult};

use super::file_io::{read_json, write_json_atomic};

/// A document as stored: body plus revision metadata
#[derive(Debug, Clone)]
pub struct StoredDoc {
    pub id: String,
    pub rev: u64,
    pub body: Value,
}

/// One write in a batch
#[derive(Debug, Clone)]
pub struct PutDoc {
    pub id: String,
    /// `None` means "create": the id must not exist yet
    pub expected_rev: Option<u64>,
    pub body: Value,
}

impl PutDoc {
    pub fn create(id: impl Into<String>, body: Value) -> Self {
        Self {
            id: id.into(),
            expected_rev: None,
            body,
        }
    }

    pub fn update(id: impl Into<String>, expected_rev: u64, body: Value) -> Self {
        Self {
            id: id.into(),
            expected_rev: Some(expected_rev),
            body,
        }
    }
}

/// Serialized file shape: a flat list of document objects with `_id`/`_rev`
#[derive(Debug, Default, serde::Serialize, serde::Deserialize)]
struct DocFile {
    docs: Vec<Value>,
}

/// Per-identity revisioned document store
pub struct DocStore {
    path: PathBuf,
    docs: RwLock<HashMap<String, StoredDoc>>,
}

impl DocStore {
    /// Open (or create) the store persisted at `path`
    pub async fn open(path: PathBuf) -> LedgerResult<Self> {
        let file: DocFile = read_json(&path)?;
        let mut docs = HashMap::with_capacity(file.docs.len());

        for raw in file.docs {
            let obj = raw
                .as_object()
                .ok_or_else(|| LedgerError::Storage("document is not an object".into()))?;
            let id = obj
                .get("_id")
                .and_then(Value::as_str)
                .ok_or_else(|| LedgerError::Storage("document missing _id".into()))?
                .to_string();
            let rev = obj
                .get("_rev")
                .and_then(Value::as_u64)
                .ok_or_else(|| LedgerError::Storage(format!("document {id} missing _rev")))?;

            let mut body = obj.clone();
            body.remove("_id");
            body.remove("_rev");

            docs.insert(
                id.clone(),
                StoredDoc {
                    id,
                    rev,
                    body: Value::Object(body),
                },
            );
        }

        debug!(path = %path.display(), count = docs.len(), "opened document store");

        Ok(Self {
            path,
            docs: RwLock::new(docs),
        })
    }

    /// Get a document by id
    pub async fn get(&self, id: &str) -> Option<StoredDoc> {
        self.docs.read().await.get(id).cloned()
    }

    /// Get a document by id, failing with `NotFound` when absent
    pub async fn get_required(&self, id: &str) -> LedgerResult<StoredDoc> {
        self.get(id)
            .await
            .ok_or_else(|| LedgerError::document_not_found(id))
    }

    /// Write a single document (create when `expected_rev` is `None`)
    pub async fn put(&self, doc: PutDoc) -> LedgerResult<StoredDoc> {
        let mut written = self.bulk_put(vec![doc]).await?;
        Ok(written.remove(0))
    }

    /// Create a document only if it does not exist yet
    ///
    /// Returns `false` when the id was already present. This is how idempotent
    /// provisioning (seed documents, index/view descriptors) tolerates
    /// "already exists" on repeated initialization.
    pub async fn create_if_absent(&self, id: &str, body: Value) -> LedgerResult<bool> {
        match self.put(PutDoc::create(id, body)).await {
            Ok(_) => Ok(true),
            Err(LedgerError::Conflict { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Apply a batch of writes atomically
    ///
    /// All revision checks run before anything is applied; the updated state
    /// is persisted to disk before the in-memory map is swapped, so readers
    /// never observe a partially applied batch and a failed persist leaves
    /// the store unchanged.
    pub async fn bulk_put(&self, batch: Vec<PutDoc>) -> LedgerResult<Vec<StoredDoc>> {
        let mut docs = self.docs.write().await;

        // Validate every revision before touching anything
        for put in &batch {
            match (docs.get(&put.id), put.expected_rev) {
                (Some(existing), None) => {
                    return Err(LedgerError::Conflict {
                        id: put.id.clone(),
                        expected: 0,
                        actual: existing.rev,
                    });
                }
                (Some(existing), Some(expected)) if existing.rev != expected => {
                    return Err(LedgerError::Conflict {
                        id: put.id.clone(),
                        expected,
                        actual: existing.rev,
                    });
                }
                (None, Some(expected)) => {
                    return Err(LedgerError::Conflict {
                        id: put.id.clone(),
                        expected,
                        actual: 0,
                    });
                }
                _ => {}
            }
        }

        let mut scratch = docs.clone();
        let mut written = Vec::with_capacity(batch.len());
        for put in batch {
            let rev = scratch.get(&put.id).map(|d| d.rev).unwrap_or(0) + 1;
            let doc = StoredDoc {
                id: put.id.clone(),
                rev,
                body: put.body,
            };
            scratch.insert(put.id, doc.clone());
            written.push(doc);
        }

        persist(&self.path, &scratch)?;
        *docs = scratch;

        Ok(written)
    }

    /// Delete a document, checking its revision
    pub async fn delete(&self, id: &str, expected_rev: u64) -> LedgerResult<()> {
        let mut docs = self.docs.write().await;

        let existing = docs
            .get(id)
            .ok_or_else(|| LedgerError::document_not_found(id))?;
        if existing.rev != expected_rev {
            return Err(LedgerError::Conflict {
                id: id.to_string(),
                expected: expected_rev,
                actual: existing.rev,
            });
        }

        let mut scratch = docs.clone();
        scratch.remove(id);
        persist(&self.path, &scratch)?;
        *docs = scratch;
        Ok(())
    }

    /// All documents whose id starts with `prefix`, sorted by id
    ///
    /// Id namespaces are time-ordered, so this is also creation order.
    pub async fn list_prefix(&self, prefix: &str) -> Vec<StoredDoc> {
        let docs = self.docs.read().await;
        let mut matched: Vec<StoredDoc> = docs
            .values()
            .filter(|d| d.id.starts_with(prefix))
            .cloned()
            .collect();
        matched.sort_by(|a, b| a.id.cmp(&b.id));
        matched
    }

    /// Number of documents with the given id prefix
    pub async fn count_prefix(&self, prefix: &str) -> usize {
        self.docs
            .read()
            .await
            .keys()
            .filter(|id| id.starts_with(prefix))
            .count()
    }
}

fn persist(path: &PathBuf, docs: &HashMap<String, StoredDoc>) -> LedgerResult<()> {
    let mut flat: Vec<&StoredDoc> = docs.values().collect();
    flat.sort_by(|a, b| a.id.cmp(&b.id));

    let serialized: LedgerResult<Vec<Value>> = flat
        .into_iter()
        .map(|doc| {
            let mut obj: Map<String, Value> = doc
                .body
                .as_object()
                .cloned()
                .ok_or_else(|| LedgerError::Storage(format!("{} body is not an object", doc.id)))?;
            obj.insert("_id".into(), Value::String(doc.id.clone()));
            obj.insert("_rev".into(), Value::from(doc.rev));
            Ok(Value::Object(obj))
        })
        .collect();

    write_json_atomic(path, &DocFile { docs: serialized? })
}
