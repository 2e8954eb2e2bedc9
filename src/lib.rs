// src/lib.rs

//! ENEX archiver library
//!
//! Turns a saved-article export into an ENEX note archive, scraping article
//! text in checkpointed batches.

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
