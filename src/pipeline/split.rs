// src/pipeline/split.rs

//! Split a large archive into smaller importable files.

use std::path::{Path, PathBuf};

use crate::error::{AppError, Result};
use crate::storage::{LocalStorage, split_archive};
use crate::utils;

/// Split the archive at `input` into files of at most `per_file` notes.
///
/// Parts are written as `<stem>_part_001.enex`, … into `out_dir`, or next to
/// the input when no directory is given. Returns the written paths in order.
pub async fn run_split(
    input: &Path,
    per_file: usize,
    out_dir: Option<&Path>,
) -> Result<Vec<PathBuf>> {
    let xml = tokio::fs::read_to_string(input).await?;
    let stem = utils::file_stem(input)?;

    let parts = split_archive(&xml, per_file)?;
    if parts.is_empty() {
        return Err(AppError::archive(format!(
            "{} contains no notes",
            input.display()
        )));
    }

    let storage = match out_dir {
        Some(dir) => LocalStorage::new(dir),
        None => LocalStorage::beside(input),
    };

    let mut written = Vec::with_capacity(parts.len());
    for (i, part) in parts.iter().enumerate() {
        let key = format!("{}_part_{:03}.enex", stem, i + 1);
        storage.write_bytes(&key, part.as_bytes()).await?;
        written.push(storage.path(&key));
    }

    log::info!(
        "Split {} into {} files of up to {} notes",
        input.display(),
        written.len(),
        per_file
    );
    Ok(written)
}
