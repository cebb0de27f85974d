#![doc = include_str!("../README.md")]
#![warn(missing_docs)]
#![warn(clippy::all)]

//! gem-harvester - RubyGems metadata and artifact harvesting
//!
//! Two pipelines share one bounded-concurrency runner:
//!
//! - **fetch**: reads version rows from a RubyGems database dump, writes a
//!   manifest and downloads every `.gem` not already present with a matching
//!   SHA-256 checksum.
//! - **index**: crawls the HTML catalog gem by gem and stores every version
//!   detail page not already in the document store.
//!
//! ## Usage
//! ```rust,ignore
//! use gem_harvester::{Config, FetchOptions, FetchPipeline, GemCommand, PgMetadataSource};
//! use std::sync::Arc;
//!
//! async fn example() -> gem_harvester::Result<()> {
//!     let config = Config::default();
//!     let source = Arc::new(PgMetadataSource::connect_lazy(&config.database)?);
//!     let fetcher = Arc::new(GemCommand::from_config(&config.fetch));
//!     let report = FetchPipeline::new(config, source, fetcher)
//!         .run(&FetchOptions::default())
//!         .await?;
//!     println!("{}", report.found_line());
//!     Ok(())
//! }
//! ```

/// Catalog HTTP client, HTML extraction and gem name sources
pub mod catalog;
/// Skip checks for work that is already done
pub mod check;
/// Configuration module for the application
pub mod config;
/// Error handling types and utilities
pub mod error;
/// Artifact download pipeline
pub mod fetch;
/// Catalog crawl pipeline
pub mod index;
/// Logging configuration and utilities
pub mod logging;
/// Version enumeration from the metadata database
pub mod metadata;
/// Records shared by both pipelines
pub mod models;
/// Bounded-concurrency task runner
pub mod parallel;
/// Document store for crawled versions
pub mod store;
/// In-memory collaborators for tests and dry runs
pub mod testing;
/// Terminal output: banner, progress bars, colored messages
pub mod ui;
/// Utilities (path normalization, retry helpers)
pub mod utils;

// Re-export common types
pub use catalog::{CatalogClient, GemNameSource, GemSearch, NameList};
pub use config::Config;
pub use error::{HarvestError, Result};
pub use fetch::{ArtifactFetcher, FetchOptions, FetchPipeline, FetchReport, GemCommand};
pub use index::{GemTally, IndexPipeline, IndexReport};
pub use metadata::{query_work, MetadataSource, PgMetadataSource, WorkQuery};
pub use models::{identity_key, GemDetail, Outcome, RunSummary, VersionRecord, WorkItem};
pub use parallel::{RunReport, TaskRunner};
pub use store::{DocumentStore, InsertOutcome, MemoryStore, SledStore};
