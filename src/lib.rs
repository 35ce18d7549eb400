// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Sortwise: Local Folder Organizer
//!
//! Scans a directory tree, deduplicates files by content, sorts them into
//! categories with a local AI model (or static rules), extracts archives and
//! keeps watching for changes.

pub mod archive;
pub mod categories;
pub mod config;
pub mod coordinator;
pub mod db;
pub mod dedup;
pub mod error;
pub mod history;
pub mod identity;
pub mod ollama;
pub mod orchestrator;
pub mod placement;
pub mod record;
pub mod scan;
pub mod sorter;
pub mod watcher;

pub use config::AppConfig;
pub use error::{ErrorKind, Result, SortwiseError};
