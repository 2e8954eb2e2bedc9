//! Utility functions and helpers.

pub mod http;
pub mod report;

use std::path::Path;

use crate::error::{AppError, Result};

/// File stem of `path` as UTF-8, rejecting paths without a file name.
pub fn file_stem(path: &Path) -> Result<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppError::config(format!("'{}' does not name a file", path.display())))
}

/// File name of `path` as UTF-8, rejecting paths without a file name.
pub fn file_name(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .ok_or_else(|| AppError::config(format!("'{}' does not name a file", path.display())))
}
