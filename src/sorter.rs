// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Smart sorter: picks a category for each file
//!
//! The candidate set always comes from [`categories::resolve`]. Whatever the
//! backend answers is checked against that set; anything else (timeouts,
//! garbage, unknown categories) ends up in the fallback category.

use async_trait::async_trait;
use serde::Serialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::categories;
use crate::ollama::OllamaClient;
use crate::record::{FileKind, FileRecord};
use crate::{AppConfig, Result, SortwiseError};

/// What the classifier gets to see about a file
#[derive(Debug, Clone, Serialize)]
pub struct ClassifyRequest {
    pub file_name: String,
    pub extension: String,
    pub size: u64,
    pub kind: FileKind,
    pub excerpt: Option<String>,
    pub candidates: Vec<String>,
}

/// A category-choosing backend
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Name of this backend
    fn name(&self) -> &'static str;

    /// Pick one of `request.candidates`
    async fn classify(&self, request: &ClassifyRequest) -> Result<String>;
}

/// Classifier backed by a local Ollama model
pub struct OllamaClassifier {
    client: OllamaClient,
    model: String,
    retries: u32,
}

impl OllamaClassifier {
    pub fn new(client: OllamaClient, model: &str, retries: u32) -> Self {
        Self {
            client,
            model: model.to_string(),
            retries,
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let client = OllamaClient::new(
            &config.ai_engine.url,
            Duration::from_secs(config.ai_engine.timeout_secs),
        )?;
        Ok(Self::new(client, &config.ai_engine.model, config.ai_engine.retries))
    }
}

#[async_trait]
impl Classifier for OllamaClassifier {
    fn name(&self) -> &'static str {
        "ollama"
    }

    async fn classify(&self, request: &ClassifyRequest) -> Result<String> {
        let prompt = build_prompt(request);
        let reply = self
            .client
            .generate_with_retry(&self.model, &prompt, true, self.retries)
            .await?;
        parse_reply(&reply)
            .ok_or_else(|| SortwiseError::Classifier(format!("Unusable reply: {:?}", reply)))
    }
}

/// Static extension and file-name rules
#[derive(Debug, Default, Clone, Copy)]
pub struct RuleClassifier;

#[async_trait]
impl Classifier for RuleClassifier {
    fn name(&self) -> &'static str {
        "rules"
    }

    async fn classify(&self, request: &ClassifyRequest) -> Result<String> {
        Ok(rule_category(request))
    }
}

/// Category assigned to a file, plus the reason if it is the fallback
#[derive(Debug)]
pub struct Classification {
    pub category: String,
    pub failure: Option<SortwiseError>,
}

impl Classification {
    pub fn fallback(config: &AppConfig, failure: SortwiseError) -> Self {
        Self {
            category: config.rules.fallback_category.clone(),
            failure: Some(failure),
        }
    }
}

/// Assigns categories through a [`Classifier`]
#[derive(Clone)]
pub struct SmartSorter {
    classifier: Arc<dyn Classifier>,
}

impl SmartSorter {
    pub fn new(classifier: Arc<dyn Classifier>) -> Self {
        Self { classifier }
    }

    /// Ollama when the AI engine is enabled, static rules otherwise
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let classifier: Arc<dyn Classifier> = if config.ai_engine.enabled {
            Arc::new(OllamaClassifier::from_config(config)?)
        } else {
            Arc::new(RuleClassifier)
        };
        Ok(Self::new(classifier))
    }

    pub fn backend(&self) -> &'static str {
        self.classifier.name()
    }

    /// Build the classifier request for a record
    pub async fn request_for(config: &AppConfig, record: &FileRecord) -> ClassifyRequest {
        ClassifyRequest {
            file_name: record.file_name(),
            extension: record.extension.clone(),
            size: record.size,
            kind: record.kind,
            excerpt: load_excerpt(record, config.ai_engine.excerpt_bytes).await,
            candidates: categories::resolve(config),
        }
    }

    /// Choose a category for `record` and store it on the record.
    ///
    /// Never fails: problems are reported through [`Classification::failure`]
    /// and the record gets the fallback category.
    pub async fn classify(&self, config: &AppConfig, record: &mut FileRecord) -> Classification {
        let request = Self::request_for(config, record).await;
        let timeout = Duration::from_secs(config.ai_engine.timeout_secs);

        let outcome = match tokio::time::timeout(timeout, self.classifier.classify(&request)).await {
            Ok(Ok(answer)) => match categories::find_candidate(&request.candidates, &answer) {
                Some(category) => Ok(category.to_string()),
                None => Err(SortwiseError::Classifier(format!(
                    "{} answered {:?}, which is not a known category",
                    self.classifier.name(),
                    answer
                ))),
            },
            Ok(Err(e)) => Err(SortwiseError::Classifier(e.to_string())),
            Err(_) => Err(SortwiseError::Classifier(format!(
                "{} timed out after {:?}",
                self.classifier.name(),
                timeout
            ))),
        };

        let classification = match outcome {
            Ok(category) => {
                debug!("{:?} -> {}", record.path, category);
                Classification { category, failure: None }
            }
            Err(e) => {
                warn!("Classification failed for {:?}: {}", record.path, e);
                Classification::fallback(config, e)
            }
        };

        record.category = Some(classification.category.clone());
        classification
    }
}

fn build_prompt(request: &ClassifyRequest) -> String {
    let mut prompt = format!(
        "You sort files into folders. Choose the single best category for the file below.\n\
         Categories: {}\n\n\
         File name: {}\nExtension: {}\nSize: {} bytes\nKind: {}\n",
        request.candidates.join(", "),
        request.file_name,
        if request.extension.is_empty() { "(none)" } else { &request.extension },
        request.size,
        request.kind,
    );
    if let Some(excerpt) = &request.excerpt {
        prompt.push_str("Content excerpt:\n");
        prompt.push_str(excerpt);
        prompt.push('\n');
    }
    prompt.push_str(
        "\nRespond with JSON only: {\"category\": \"<one of the categories above>\"}",
    );
    prompt
}

/// Pull a category name out of a model reply.
///
/// Accepts `{"category": "..."}` or a bare name, possibly quoted or with a
/// short `Category:` style prefix.
pub fn parse_reply(raw: &str) -> Option<String> {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(raw.trim()) {
        let category = match &value {
            serde_json::Value::String(s) => Some(s.as_str()),
            other => other.get("category").and_then(|c| c.as_str()),
        };
        return category
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
    }

    let mut line = raw.lines().map(str::trim).find(|l| !l.is_empty())?.to_string();

    // Remove common chat prefixes
    if let Some(idx) = line.find(':') {
        if idx < 30 {
            line = line[idx + 1..].trim().to_string();
        }
    }

    let clean = line
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '`' || c == '.' || c == '*')
        .trim()
        .to_string();

    if clean.is_empty() { None } else { Some(clean) }
}

/// Static category rules
pub fn rule_category(request: &ClassifyRequest) -> String {
    let name = request.file_name.to_lowercase();

    // A candidate spelled out in the file name wins
    if let Some(hit) = request
        .candidates
        .iter()
        .find(|c| c.len() >= 3 && name.contains(&c.to_lowercase()))
    {
        return hit.clone();
    }

    let has = |words: &[&str]| words.iter().any(|w| name.contains(w));
    let category = match request.kind {
        _ if has(&["invoice", "receipt", "statement", "tax", "payslip", "budget"]) => "Finance",
        _ if has(&["resume", "cv_", "passport", "family"]) => "Personal",
        _ if has(&["meeting", "report", "proposal", "contract"]) => "Work",
        FileKind::Image => "Images",
        FileKind::Document => "Documents",
        FileKind::Spreadsheet => "Spreadsheets",
        FileKind::Presentation => "Presentations",
        FileKind::Audio => "Audio",
        FileKind::Video => "Videos",
        FileKind::Code => "Code",
        FileKind::Archive => "Archives",
        FileKind::Other => "Other",
    };
    category.to_string()
}

/// Leading text of a text-like file, read on the blocking pool
async fn load_excerpt(record: &FileRecord, max_bytes: usize) -> Option<String> {
    if max_bytes == 0 || !record.kind.is_text_like() {
        return None;
    }
    if matches!(record.extension.as_str(), "pdf" | "doc" | "docx" | "odt" | "xls" | "xlsx" | "ods" | "epub") {
        return None;
    }

    let path = record.path.clone();
    match tokio::task::spawn_blocking(move || read_excerpt(&path, max_bytes)).await {
        Ok(excerpt) => excerpt,
        Err(e) => {
            warn!("Excerpt task failed for {:?}: {}", record.path, e);
            None
        }
    }
}

/// Leading text of a file, if it looks like text at all
fn read_excerpt(path: &Path, max_bytes: usize) -> Option<String> {
    let file = File::open(path).ok()?;
    let mut buf = Vec::with_capacity(max_bytes.min(64 * 1024));
    file.take(max_bytes as u64).read_to_end(&mut buf).ok()?;
    if buf.contains(&0) {
        return None;
    }

    let text = String::from_utf8_lossy(&buf).trim().to_string();
    if text.is_empty() { None } else { Some(text) }
}
