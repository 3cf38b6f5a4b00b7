//! Linefeed OVAPI - public transport line pipeline
//!
//! Fetches the OVAPI `/line/` feed, normalizes every entry into a
//! [`LineRecord`], stages the batch as Parquet in a date-scoped warehouse
//! table, upserts it into the permanent table on `pk_line_id`, and cleans
//! up the staging table and artifact.
//!
//! # Example
//!
//! ```no_run
//! use chrono::Utc;
//! use linefeed_core::ProgressContext;
//! use linefeed_ovapi::{Config, run};
//! use linefeed_warehouse::{Warehouse, WarehouseConfig};
//!
//! let config = Config::default();
//! let mut warehouse = Warehouse::open(&WarehouseConfig::default()).unwrap();
//! let summary = run(
//!     &config,
//!     &mut warehouse,
//!     Utc::now().date_naive(),
//!     &ProgressContext::new(),
//! )
//! .expect("Pipeline failed");
//! println!("Merged {} new lines", summary.merge.inserted);
//! ```

pub mod cleanup;
pub mod config;
pub mod error;
pub mod feed;
pub mod merge;
pub mod runner;
pub mod schema;
pub mod stage;
pub mod transform;

// Re-exports for convenience
pub use cleanup::{Cleaner, CleanupReport};
pub use config::{Config, Target};
pub use error::{CleanupWarning, PipelineError};
pub use feed::{FeedDocument, RawLineEntry, decode_feed, fetch_feed};
pub use merge::Merger;
pub use runner::{RunSummary, Stage, run};
pub use stage::{Stager, StagingHandle};
pub use transform::{Batch, LineRecord, TransportType, transform};
