//! Linefeed Core - Common infrastructure for the line feed pipeline
//!
//! HTTP access behind a synchronous interface, atomic Parquet artifact
//! writing, logging and progress display shared by the pipeline crates.

pub mod http;
pub mod logging;
pub mod progress;
pub mod sink;

// Re-exports for convenience
pub use http::{HttpError, get_bytes};
pub use logging::{IndicatifLogger, init_logging};
pub use progress::{ProgressContext, SharedProgress, fmt_num};
pub use sink::{ParquetSink, is_valid_parquet};
