//! User supplied extra context (text, directories, URLs)
//!
//! Every item is resolved independently and capped; a failing item
//! contributes nothing instead of failing the instruction.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use super::template::absolutize;

/// Character budget for a text item
pub const TEXT_MAX: usize = 5000;
/// Character budget for a fetched URL body
pub const URL_MAX: usize = 2000;
/// Files read from one directory item
pub const DIR_MAX_FILES: usize = 10;
/// Largest file read from a directory item, in bytes
pub const DIR_MAX_FILE_SIZE: usize = 50 * 1024;
/// Request timeout for URL items
pub const URL_TIMEOUT: Duration = Duration::from_secs(10);

const TRUNCATION_MARK: &str = "...[截断]";

/// One configured context item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum ExtraContextItem {
    /// Literal text
    Text(String),
    /// A directory whose files are inlined
    Directory(String),
    /// A page fetched over HTTP
    Url(String),
}

impl ExtraContextItem {
    /// The configured value
    pub fn value(&self) -> &str {
        match self {
            ExtraContextItem::Text(v) | ExtraContextItem::Directory(v) | ExtraContextItem::Url(v) => v,
        }
    }
}

/// Context text together with labels describing where it came from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedContext {
    /// Concatenated context
    pub body: String,
    /// One label per contributing item
    pub sources: Vec<String>,
}

impl ResolvedContext {
    /// Whether no item contributed anything
    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}

/// Cut `s` to `max` characters, marking the cut
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}{}", &s[..idx], TRUNCATION_MARK),
        None => s.to_string(),
    }
}

/// Resolve all items in order
pub async fn resolve_extra_context(
    root: &Path,
    items: &[ExtraContextItem],
    http: &reqwest::Client,
) -> ResolvedContext {
    let mut parts = Vec::new();
    let mut sources = Vec::new();

    for item in items.iter().filter(|i| !i.value().trim().is_empty()) {
        let resolved = match item {
            ExtraContextItem::Text(value) => resolve_text(value),
            ExtraContextItem::Directory(value) => resolve_directory(root, value),
            ExtraContextItem::Url(value) => resolve_url(http, value).await,
        };

        if let Some((text, source)) = resolved {
            parts.push(text);
            sources.push(source);
        }
    }

    ResolvedContext {
        body: parts.join("\n\n---\n\n"),
        sources,
    }
}

fn resolve_text(value: &str) -> Option<(String, String)> {
    let text = truncate_chars(value.trim(), TEXT_MAX);
    let source = format!("[文本] {}", truncate_chars(value, 50));
    Some((text, source))
}

fn resolve_directory(root: &Path, value: &str) -> Option<(String, String)> {
    let raw = value.trim();
    let dir = absolutize(root, raw);
    if !dir.is_dir() {
        tracing::info!("Context directory missing or not a directory: {}", dir.display());
        return None;
    }

    let mut files: Vec<_> = match std::fs::read_dir(&dir) {
        Ok(entries) => entries
            .flatten()
            .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
            .filter(|e| !e.file_name().to_string_lossy().starts_with('.'))
            .collect(),
        Err(e) => {
            tracing::warn!("Failed to list context directory {}: {}", dir.display(), e);
            return None;
        }
    };
    files.sort_by_key(|e| e.file_name());
    files.truncate(DIR_MAX_FILES);

    let mut parts = Vec::new();
    for entry in &files {
        let path = entry.path();
        let too_large = entry
            .metadata()
            .map(|m| m.len() > DIR_MAX_FILE_SIZE as u64)
            .unwrap_or(true);
        if too_large {
            continue;
        }

        // Binary (non UTF-8) and unreadable files are skipped
        if let Ok(content) = std::fs::read_to_string(&path) {
            parts.push(format!(
                "### {}\n{}",
                entry.file_name().to_string_lossy(),
                truncate_chars(&content, DIR_MAX_FILE_SIZE)
            ));
        }
    }

    let text = parts.join("\n\n");
    if text.is_empty() {
        return None;
    }

    Some((text, format!("[目录] {} ({} 个文件)", raw, files.len())))
}

async fn resolve_url(http: &reqwest::Client, value: &str) -> Option<(String, String)> {
    let raw = value.trim();
    let url = match Url::parse(raw) {
        Ok(u) => u,
        Err(e) => {
            tracing::info!("Invalid context URL {}: {}", raw, e);
            return None;
        }
    };

    let fetched = async {
        http.get(url.clone())
            .timeout(URL_TIMEOUT)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await
    }
    .await;

    match fetched {
        Ok(body) if !body.is_empty() => {
            Some((truncate_chars(&body, URL_MAX), format!("[网页] {}", url)))
        }
        Ok(_) => None,
        Err(e) => {
            tracing::info!("Failed to fetch context URL {}: {}", url, e);
            None
        }
    }
}
