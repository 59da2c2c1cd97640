//! The personal-information document and its markdown sections.

use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::{info, warn};

use folio_core::Result;

/// Used when the configured document file does not exist.
pub const PLACEHOLDER_DOCUMENT: &str =
    "# Personal Information\n\nThis is a placeholder for personal information.";

static HEADER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^(#{1,6})[ \t]+(.+?)[ \t#]*$").expect("valid header regex"));

/// A markdown section: the span from one header to the next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    /// Header text, `None` for any preamble before the first header.
    pub title: Option<String>,
    pub level: usize,
    pub start: usize,
    pub end: usize,
}

/// Source text plus section boundaries. Immutable once loaded.
#[derive(Debug, Clone)]
pub struct Document {
    text: String,
    sections: Vec<Section>,
}

impl Document {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let sections = split_sections(&text);
        Self { text, sections }
    }

    /// Load from disk, substituting the placeholder when the file is missing.
    ///
    /// Other IO errors (permissions, invalid UTF-8) are returned.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => {
                let doc = Self::new(text);
                info!(
                    "Loaded document {} ({} bytes, {} sections)",
                    path.display(),
                    doc.text.len(),
                    doc.sections.len()
                );
                Ok(doc)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("{} not found, using placeholder content", path.display());
                Ok(Self::new(PLACEHOLDER_DOCUMENT))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

fn split_sections(text: &str) -> Vec<Section> {
    let mut sections = Vec::new();
    let headers: Vec<_> = HEADER_RE.captures_iter(text).collect();

    let first_start = headers
        .first()
        .and_then(|c| c.get(0))
        .map(|m| m.start())
        .unwrap_or(text.len());
    if !text[..first_start].trim().is_empty() {
        sections.push(Section {
            title: None,
            level: 0,
            start: 0,
            end: first_start,
        });
    }

    for (i, caps) in headers.iter().enumerate() {
        let (Some(whole), Some(hashes), Some(title)) = (caps.get(0), caps.get(1), caps.get(2))
        else {
            continue;
        };
        let end = headers
            .get(i + 1)
            .and_then(|c| c.get(0))
            .map(|m| m.start())
            .unwrap_or(text.len());
        sections.push(Section {
            title: Some(title.as_str().trim().to_string()),
            level: hashes.as_str().len(),
            start: whole.start(),
            end,
        });
    }

    sections
}
