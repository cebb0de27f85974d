//! Fast checks that let a run skip work that is already done.
//!
//! Both checks answer "proceed" whenever they cannot prove the item is
//! satisfied, so a broken check costs a redundant fetch, never a lost item.

use crate::error::Result;
use crate::store::DocumentStore;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::io::AsyncReadExt;
use tracing::{debug, warn};

const READ_CHUNK: usize = 64 * 1024;

/// Decodes a base64 checksum as stored in the metadata database
pub fn decode_checksum(encoded: &str) -> Result<Vec<u8>> {
    Ok(STANDARD.decode(encoded.trim())?)
}

/// Streams a file through SHA-256
pub async fn sha256_file(path: &Path) -> Result<Vec<u8>> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; READ_CHUNK];
    loop {
        let read = file.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hasher.finalize().to_vec())
}

/// True when `path` is a regular file whose SHA-256 equals the base64 `expected` checksum
///
/// Absent files, partial downloads, unreadable files and missing or
/// malformed checksums all return false.
pub async fn artifact_is_current(path: &Path, expected: Option<&str>) -> bool {
    let is_file = tokio::fs::symlink_metadata(path)
        .await
        .map(|meta| meta.is_file())
        .unwrap_or(false);
    if !is_file {
        return false;
    }

    let Some(expected) = expected else {
        debug!("No checksum for {}, refetching", path.display());
        return false;
    };
    let expected = match decode_checksum(expected) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("Undecodable checksum for {}: {}", path.display(), e);
            return false;
        }
    };

    match sha256_file(path).await {
        Ok(actual) if actual == expected => true,
        Ok(actual) => {
            debug!(
                "Checksum mismatch for {}: expected {}, found {}",
                path.display(),
                hex::encode(&expected),
                hex::encode(&actual)
            );
            false
        }
        Err(e) => {
            warn!("Failed to hash {}: {}", path.display(), e);
            false
        }
    }
}

/// True when the store already holds a document under `key`
///
/// A failed lookup counts as absent.
pub async fn already_stored(store: &dyn DocumentStore, key: &str) -> bool {
    match store.find_one(key).await {
        Ok(found) => found.is_some(),
        Err(e) => {
            warn!("Lookup of {} failed, treating as absent: {}", key, e);
            false
        }
    }
}
