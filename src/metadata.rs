//! Enumeration of versions to download, read from a RubyGems database dump.

use crate::config::DatabaseConfig;
use crate::error::Result;
use crate::models::WorkItem;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;
use tracing::{error, info};

const COUNT_SQL: &str = "
    SELECT count(*)
    FROM versions
    WHERE versions.indexed = true
      AND versions.created_at > $1";

const SIZE_SQL: &str = "
    SELECT COALESCE(SUM(versions.size), 0)::BIGINT
    FROM versions
    WHERE versions.indexed = true
      AND versions.created_at > $1";

const ROWS_SQL: &str = "
    SELECT
      rubygems.name AS package_name,
      versions.number AS version_number,
      versions.created_at,
      versions.updated_at,
      versions.full_name,
      versions.sha256 AS checksum_base64,
      versions.size::BIGINT AS size,
      versions.indexed
    FROM versions
    JOIN rubygems ON versions.rubygem_id = rubygems.id
    WHERE versions.indexed = true
      AND versions.created_at > $1
    ORDER BY versions.created_at";

/// Read-only queries over the versions of all gems
///
/// Every query only sees indexed (not yanked) versions created strictly
/// after `cutoff`.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Number of matching versions
    async fn count(&self, cutoff: NaiveDate) -> Result<i64>;

    /// Sum of the matching versions' sizes in bytes
    async fn total_size(&self, cutoff: NaiveDate) -> Result<i64>;

    /// Matching versions ordered by creation time, oldest first
    async fn rows(&self, cutoff: NaiveDate) -> Result<Vec<WorkItem>>;
}

/// The three enumeration results, with failures collapsed to empty values
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkQuery {
    /// Cutoff actually used
    pub cutoff: NaiveDate,
    /// Matching version count
    pub count: i64,
    /// Total bytes of the matching versions
    pub total_size: i64,
    /// Work list for the fetch pipeline
    pub items: Vec<WorkItem>,
}

/// The epoch start, used when no cutoff is given
pub fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or(NaiveDate::MIN)
}

/// Resolves an optional cutoff to a concrete date ("all time" when unset)
pub fn resolve_cutoff(cutoff: Option<NaiveDate>) -> NaiveDate {
    cutoff.unwrap_or_else(epoch)
}

/// Formats a cutoff the way the database compares it
pub fn format_cutoff(cutoff: NaiveDate) -> String {
    cutoff.format("%Y-%m-%d").to_string()
}

/// Runs the count, size and row queries concurrently
///
/// A failing query is logged and contributes 0 or an empty list instead of
/// aborting the run.
pub async fn query_work(source: &dyn MetadataSource, cutoff: Option<NaiveDate>) -> WorkQuery {
    let cutoff = resolve_cutoff(cutoff);
    info!("Querying versions created after {}", format_cutoff(cutoff));

    let (count, total_size, items) = tokio::join!(
        source.count(cutoff),
        source.total_size(cutoff),
        source.rows(cutoff)
    );

    WorkQuery {
        cutoff,
        count: count.unwrap_or_else(|e| {
            error!("Error running count query: {}", e);
            0
        }),
        total_size: total_size.unwrap_or_else(|e| {
            error!("Error running size query: {}", e);
            0
        }),
        items: items.unwrap_or_else(|e| {
            error!("Error running versions query: {}", e);
            Vec::new()
        }),
    }
}

#[derive(Debug, FromRow)]
struct VersionRow {
    package_name: String,
    version_number: String,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
    full_name: Option<String>,
    checksum_base64: Option<String>,
    size: Option<i64>,
    indexed: bool,
}

impl From<VersionRow> for WorkItem {
    fn from(row: VersionRow) -> Self {
        let full_name = row
            .full_name
            .unwrap_or_else(|| format!("{}-{}", row.package_name, row.version_number));
        Self {
            name: row.package_name,
            version: row.version_number,
            created_at: row.created_at,
            updated_at: row.updated_at,
            full_name,
            checksum: row.checksum_base64,
            size: row.size.unwrap_or(0),
            indexed: row.indexed,
        }
    }
}

/// Postgres-backed metadata source
pub struct PgMetadataSource {
    pool: PgPool,
}

impl PgMetadataSource {
    /// Creates a pool that connects on first use
    ///
    /// Connection failures therefore surface per query, where they are
    /// collapsed by [`query_work`].
    pub fn connect_lazy(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections.max(1))
            .connect_lazy(&config.url)?;
        Ok(Self { pool })
    }

    fn cutoff_timestamp(cutoff: NaiveDate) -> NaiveDateTime {
        cutoff.and_time(NaiveTime::MIN)
    }
}

#[async_trait]
impl MetadataSource for PgMetadataSource {
    async fn count(&self, cutoff: NaiveDate) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(COUNT_SQL)
            .bind(Self::cutoff_timestamp(cutoff))
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn total_size(&self, cutoff: NaiveDate) -> Result<i64> {
        let size = sqlx::query_scalar::<_, i64>(SIZE_SQL)
            .bind(Self::cutoff_timestamp(cutoff))
            .fetch_one(&self.pool)
            .await?;
        Ok(size)
    }

    async fn rows(&self, cutoff: NaiveDate) -> Result<Vec<WorkItem>> {
        let rows = sqlx::query_as::<_, VersionRow>(ROWS_SQL)
            .bind(Self::cutoff_timestamp(cutoff))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(WorkItem::from).collect())
    }
}
