//! Storage for archives and checkpoints.
//!
//! ## Files written next to the output archive
//!
//! ```text
//! out/
//! ├── pocket.enex                   # Final archive
//! ├── pocket.checkpoint.json        # Progress snapshot (removed on success)
//! └── pocket_partial_100.enex       # Intermediate archive at a checkpoint
//! ```

pub mod enex;
pub mod local;

// Re-export for convenience
pub use enex::{ArchiveMeta, render_archive, split_archive};
pub use local::LocalStorage;
