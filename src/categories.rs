// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Category set resolution
//!
//! The one place where user categories and the built-in taxonomy are merged.

use crate::AppConfig;

/// Built-in taxonomy, in display order
pub const DEFAULT_CATEGORIES: &[&str] = &[
    "Documents",
    "Images",
    "Audio",
    "Videos",
    "Code",
    "Archives",
    "Spreadsheets",
    "Presentations",
    "Finance",
    "Work",
    "Personal",
    "Other",
];

/// Candidate categories for a configuration.
pub fn resolve(config: &AppConfig) -> Vec<String> {
    resolve_with_defaults(&config.rules.custom_categories, DEFAULT_CATEGORIES)
}

/// Custom names first (in order), then every default not already present.
///
/// Names are trimmed and compared case-insensitively; the first spelling
/// wins and blank entries are dropped.
pub fn resolve_with_defaults<S: AsRef<str>>(custom: &[S], defaults: &[&str]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(custom.len() + defaults.len());

    let candidates = custom.iter().map(|c| c.as_ref()).chain(defaults.iter().copied());
    for name in candidates {
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        if !out.iter().any(|existing| existing.eq_ignore_ascii_case(name)) {
            out.push(name.to_string());
        }
    }

    out
}

/// Canonical spelling of `name` within `candidates`, if it is one of them.
pub fn find_candidate<'a>(candidates: &'a [String], name: &str) -> Option<&'a str> {
    let name = name.trim();
    candidates
        .iter()
        .find(|c| c.eq_ignore_ascii_case(name))
        .map(String::as_str)
}
