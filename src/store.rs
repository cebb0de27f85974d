//! Document store holding crawled gem versions, keyed by identity key.

use crate::error::Result;
use crate::models::GemDetail;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::debug;

/// What an insert did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The document was written
    Inserted,
    /// A document with the same key already existed; nothing was written
    AlreadyPresent,
}

/// Keyed document storage
///
/// `insert` is atomic insert-if-absent: two concurrent inserts for one key
/// store exactly one document.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Looks up the document stored under `key`
    async fn find_one(&self, key: &str) -> Result<Option<Value>>;

    /// Stores `document` under its identity key unless the key is taken
    async fn insert(&self, document: &GemDetail) -> Result<InsertOutcome>;

    /// Persists buffered writes
    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// On-disk store backed by sled
pub struct SledStore {
    db: sled::Db,
}

impl SledStore {
    /// Opens (or creates) the store at `path`
    pub fn open(path: &Path) -> Result<Self> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    /// Number of stored documents
    pub fn len(&self) -> usize {
        self.db.len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.db.is_empty()
    }
}

#[async_trait]
impl DocumentStore for SledStore {
    async fn find_one(&self, key: &str) -> Result<Option<Value>> {
        match self.db.get(key.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn insert(&self, document: &GemDetail) -> Result<InsertOutcome> {
        let bytes = serde_json::to_vec(document)?;
        let swapped = self
            .db
            .compare_and_swap(document.id.as_bytes(), None::<&[u8]>, Some(bytes))?;
        match swapped {
            Ok(()) => Ok(InsertOutcome::Inserted),
            Err(_) => {
                debug!("{} already stored", document.id);
                Ok(InsertOutcome::AlreadyPresent)
            }
        }
    }

    async fn flush(&self) -> Result<()> {
        self.db.flush_async().await?;
        Ok(())
    }
}

/// In-memory store for tests and dry runs
#[derive(Default)]
pub struct MemoryStore {
    documents: Mutex<HashMap<String, Value>>,
    insert_calls: AtomicUsize,
}

impl MemoryStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a document without going through `insert`
    pub fn put_raw(&self, key: &str, document: Value) {
        self.documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), document);
    }

    /// Number of stored documents
    pub fn len(&self) -> usize {
        self.documents.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of times `insert` was called, successful or not
    pub fn insert_calls(&self) -> usize {
        self.insert_calls.load(Ordering::SeqCst)
    }

    /// Stored keys, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find_one(&self, key: &str) -> Result<Option<Value>> {
        Ok(self
            .documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned())
    }

    async fn insert(&self, document: &GemDetail) -> Result<InsertOutcome> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        let value = serde_json::to_value(document)?;
        let mut documents = self.documents.lock().unwrap_or_else(PoisonError::into_inner);
        if documents.contains_key(&document.id) {
            return Ok(InsertOutcome::AlreadyPresent);
        }
        documents.insert(document.id.clone(), value);
        Ok(InsertOutcome::Inserted)
    }
}
