//! Records that flow through both pipelines.
//!
//! [`WorkItem`] comes out of the metadata database and drives the fetch
//! pipeline. [`VersionRecord`] and [`GemDetail`] come out of the HTML
//! catalog and end up in the document store, keyed by their identity key.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// One package version slated for artifact download
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    /// Gem name
    pub name: String,
    /// Version number
    pub version: String,
    /// When the version was pushed
    pub created_at: NaiveDateTime,
    /// When the version row was last touched
    pub updated_at: NaiveDateTime,
    /// `name-version[-platform]` as recorded by the registry
    pub full_name: String,
    /// Base64 of the SHA-256 digest of the `.gem` file
    pub checksum: Option<String>,
    /// Artifact size in bytes
    pub size: i64,
    /// `false` means the version was yanked
    pub indexed: bool,
}

impl WorkItem {
    /// File name the fetch tool writes for this version
    pub fn file_name(&self) -> String {
        format!("{}-{}.gem", self.name, self.version)
    }

    /// Yanked versions are never downloaded
    pub fn is_yanked(&self) -> bool {
        !self.indexed
    }
}

/// One row of a gem's versions page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRecord {
    /// Gem name
    pub name: String,
    /// Version number as displayed
    pub version: String,
    /// Absolute URL of the version detail page
    pub url: String,
    /// Human-readable size, e.g. `12 KB`
    pub size: String,
    /// Publish date, when the page shows a parseable one
    pub published_at: Option<NaiveDate>,
    /// Whether the version is marked yanked
    pub yanked: bool,
    /// Platform tag for native gems
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
}

impl VersionRecord {
    /// Key under which this version is stored
    pub fn identity_key(&self) -> String {
        identity_key(&self.name, &self.version, self.platform.as_deref())
    }
}

/// A version record enriched with its detail page, as stored in the index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GemDetail {
    /// Identity key, the store's primary key
    #[serde(rename = "_id")]
    pub id: String,
    /// Gem name
    pub name: String,
    /// Version number
    pub version: String,
    /// Detail page URL
    pub url: String,
    /// Human-readable size
    pub size: String,
    /// Publish date
    pub published_at: Option<NaiveDate>,
    /// Platform tag for native gems
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    /// SHA-256 checksum as displayed on the detail page
    pub checksum: String,
    /// Gem description text
    pub description: String,
}

impl GemDetail {
    /// Builds the stored document from a version row and its detail page fields
    pub fn from_record(record: VersionRecord, checksum: String, description: String) -> Self {
        Self {
            id: record.identity_key(),
            name: record.name,
            version: record.version,
            url: record.url,
            size: record.size,
            published_at: record.published_at,
            platform: record.platform,
            checksum,
            description,
        }
    }

    /// Key under which this document is stored
    pub fn identity_key(&self) -> String {
        identity_key(&self.name, &self.version, self.platform.as_deref())
    }
}

/// Derives the store key for a `(name, version, platform)` triple
pub fn identity_key(name: &str, version: &str, platform: Option<&str>) -> String {
    match platform {
        Some(platform) if !platform.is_empty() => format!("{name}-{version}-{platform}"),
        _ => format!("{name}-{version}"),
    }
}

/// Result of handling one item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T = ()> {
    /// Already satisfied; no side effect ran
    Skipped,
    /// Side effect ran and succeeded
    Succeeded(T),
    /// Side effect ran and failed with the given reason
    Failed(String),
    /// The run was cancelled before this item started
    Cancelled,
}

/// Aggregated counters for one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Items enumerated
    pub total: u64,
    /// Items whose side effect ran
    pub attempted: u64,
    /// Attempted items that succeeded
    pub succeeded: u64,
    /// Attempted items that failed
    pub failed: u64,
    /// Items skipped by an idempotency check or yank status
    pub skipped: u64,
    /// Items never started because the run was cancelled
    pub cancelled: u64,
}

impl RunSummary {
    /// Items that have reached a final outcome
    pub fn completed(&self) -> u64 {
        self.attempted + self.skipped + self.cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn record(name: &str, version: &str, platform: Option<&str>) -> VersionRecord {
        VersionRecord {
            name: name.to_string(),
            version: version.to_string(),
            url: format!("https://rubygems.org/gems/{name}/versions/{version}"),
            size: "10 KB".to_string(),
            published_at: None,
            yanked: false,
            platform: platform.map(str::to_string),
        }
    }

    #[test]
    fn test_identity_key_format() {
        assert_eq!(identity_key("rake", "13.0.6", None), "rake-13.0.6");
        assert_eq!(
            identity_key("nokogiri", "1.15.4", Some("x86_64-linux")),
            "nokogiri-1.15.4-x86_64-linux"
        );
        assert_eq!(identity_key("rake", "13.0.6", Some("")), "rake-13.0.6");
    }

    #[test]
    fn test_identity_key_stable_and_distinct() {
        let corpus = [
            record("rails", "7.0.0", None),
            record("rails", "7.0.1", None),
            record("nokogiri", "1.15.4", None),
            record("nokogiri", "1.15.4", Some("java")),
            record("nokogiri", "1.15.4", Some("x86_64-linux")),
            record("ffi", "1.16.3", Some("x64-mingw32")),
        ];

        let keys: HashSet<String> = corpus.iter().map(VersionRecord::identity_key).collect();
        assert_eq!(keys.len(), corpus.len());

        for item in &corpus {
            assert_eq!(item.identity_key(), item.clone().identity_key());
        }
    }

    #[test]
    fn test_detail_keeps_record_key() {
        let version = record("nokogiri", "1.15.4", Some("java"));
        let key = version.identity_key();
        let detail = GemDetail::from_record(version, "abc".into(), "HTML parser".into());
        assert_eq!(detail.id, key);
        assert_eq!(detail.identity_key(), key);
    }

    #[test]
    fn test_detail_serializes_id_field() {
        let detail = GemDetail::from_record(record("rake", "13.0.6", None), "abc".into(), "".into());
        let value = serde_json::to_value(&detail).unwrap();
        assert_eq!(value["_id"], "rake-13.0.6");
        assert!(value.get("platform").is_none());
        assert!(value.get("yanked").is_none());
    }
}
