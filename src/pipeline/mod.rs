//! Pipeline entry points for archive operations.
//!
//! - `run_convert`: Turn a CSV export into an ENEX archive, scraping article text
//! - `run_split`: Break an existing archive into smaller files

pub mod batch;
pub mod checkpoint;
pub mod convert;
pub mod split;

pub use batch::BatchScheduler;
pub use checkpoint::{CheckpointStore, show_stats};
pub use convert::{ConvertSummary, Extractors, convert_records, run_convert};
pub use split::run_split;
