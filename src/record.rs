// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Per-file state carried through the pipeline

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::OnceLock;

use crate::identity::{self, Fingerprint};
use crate::{Result, SortwiseError};

/// Coarse file kind derived from the extension, used by the domain filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Image,
    Document,
    Spreadsheet,
    Presentation,
    Audio,
    Video,
    Code,
    Archive,
    Other,
}

impl FileKind {
    /// Detect the kind of a lowercase extension
    pub fn from_extension(ext: &str) -> Self {
        match ext {
            "jpg" | "jpeg" | "png" | "gif" | "webp" | "heic" | "heif" | "bmp" | "tiff" | "tif"
            | "svg" | "avif" => FileKind::Image,
            "pdf" | "doc" | "docx" | "odt" | "txt" | "md" | "markdown" | "rst" | "rtf"
            | "adoc" | "epub" => FileKind::Document,
            "xls" | "xlsx" | "csv" | "ods" | "tsv" => FileKind::Spreadsheet,
            "ppt" | "pptx" | "odp" | "key" => FileKind::Presentation,
            "mp3" | "wav" | "flac" | "ogg" | "m4a" | "aac" | "opus" => FileKind::Audio,
            "mp4" | "mkv" | "webm" | "avi" | "mov" | "m4v" => FileKind::Video,
            "rs" | "py" | "js" | "ts" | "go" | "java" | "c" | "cpp" | "h" | "hpp" | "rb"
            | "sh" | "toml" | "json" | "yaml" | "yml" | "html" | "css" => FileKind::Code,
            "zip" | "tar" | "gz" | "tgz" | "7z" | "rar" | "jar" | "bz2" | "xz" => FileKind::Archive,
            _ => FileKind::Other,
        }
    }

    /// Kinds whose leading bytes are worth sending to the classifier
    pub fn is_text_like(&self) -> bool {
        matches!(self, FileKind::Document | FileKind::Code | FileKind::Spreadsheet)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Image => "image",
            FileKind::Document => "document",
            FileKind::Spreadsheet => "spreadsheet",
            FileKind::Presentation => "presentation",
            FileKind::Audio => "audio",
            FileKind::Video => "video",
            FileKind::Code => "code",
            FileKind::Archive => "archive",
            FileKind::Other => "other",
        }
    }
}

impl FromStr for FileKind {
    type Err = SortwiseError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "image" | "images" => Ok(FileKind::Image),
            "document" | "documents" => Ok(FileKind::Document),
            "spreadsheet" | "spreadsheets" => Ok(FileKind::Spreadsheet),
            "presentation" | "presentations" => Ok(FileKind::Presentation),
            "audio" => Ok(FileKind::Audio),
            "video" | "videos" => Ok(FileKind::Video),
            "code" => Ok(FileKind::Code),
            "archive" | "archives" => Ok(FileKind::Archive),
            "other" => Ok(FileKind::Other),
            other => Err(SortwiseError::Config(format!("Unknown file domain: {}", other))),
        }
    }
}

impl std::fmt::Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deduplication status of a record
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DedupStatus {
    #[default]
    Unknown,
    Original,
    Duplicate { original: PathBuf },
}

/// A discovered file
#[derive(Debug)]
pub struct FileRecord {
    pub path: PathBuf,
    /// Root the file was discovered under
    pub root: PathBuf,
    pub size: u64,
    /// Lowercase extension without the dot, empty when absent
    pub extension: String,
    pub kind: FileKind,
    pub category: Option<String>,
    pub status: DedupStatus,
    fingerprint: OnceLock<Fingerprint>,
}

impl FileRecord {
    /// Build a record from an existing file
    pub fn from_path(root: &Path, path: &Path) -> Result<Self> {
        let size = std::fs::metadata(path)?.len();
        Ok(Self::new(root, path, size))
    }

    pub fn new(root: &Path, path: &Path, size: u64) -> Self {
        let extension = extension_of(path);
        let kind = FileKind::from_extension(&extension);
        Self {
            path: path.to_path_buf(),
            root: root.to_path_buf(),
            size,
            extension,
            kind,
            category: None,
            status: DedupStatus::Unknown,
            fingerprint: OnceLock::new(),
        }
    }

    /// Content fingerprint, computed on first use and cached for the run
    pub fn fingerprint(&self) -> Result<Fingerprint> {
        if let Some(fp) = self.fingerprint.get() {
            return Ok(*fp);
        }
        let fp = identity::fingerprint(&self.path)?;
        let _ = self.fingerprint.set(fp);
        Ok(fp)
    }

    /// Cached fingerprint without touching the disk
    pub fn cached_fingerprint(&self) -> Option<Fingerprint> {
        self.fingerprint.get().copied()
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self.status, DedupStatus::Duplicate { .. })
    }
}

/// Lowercase extension of a path
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default()
}
