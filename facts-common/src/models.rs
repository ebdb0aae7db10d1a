//! Track metadata and facts document models
//!
//! `TrackMetadata` is read from the Music service; `FactsDocument` is the
//! validated payload produced from the model's answer.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Track metadata returned by `GET /internal/tracks/{trackId}`
///
/// Every field is optional; unknown fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackMetadata {
    pub id: Option<String>,
    pub title: Option<String>,
    pub artist: Option<String>,
    /// Track length in milliseconds
    pub duration_ms: Option<u64>,
    /// Release year
    pub year: Option<i32>,
    /// Explicit-content flag
    pub explicit: Option<bool>,
    pub cover_url: Option<String>,
}

/// Structural problems found in a model answer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("response is not a facts JSON object: {0}")]
    Json(String),

    #[error("{0} is missing")]
    MissingField(&'static str),

    #[error("sources are missing")]
    NoSources,

    #[error("source #{0} url is missing")]
    MissingSourceUrl(usize),

    #[error("source #{index} url is not http(s): {url}")]
    InvalidSourceUrl { index: usize, url: String },
}

/// One citation backing the fact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactSource {
    pub title: Option<String>,
    pub url: String,
}

/// Validated facts document
///
/// Serialized field order is stable, so `to_canonical_json` output re-parses
/// into an equal document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FactsDocument {
    pub format_version: i64,
    pub lang: String,
    pub short: String,
    pub full: String,
    pub sources: Vec<FactSource>,
}

/// Lenient shape used to read the model answer before validation
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFactsDocument {
    format_version: Option<i64>,
    lang: Option<String>,
    short: Option<String>,
    full: Option<String>,
    sources: Option<Vec<RawFactSource>>,
}

#[derive(Debug, Default, Deserialize)]
struct RawFactSource {
    title: Option<String>,
    url: Option<String>,
}

fn has_text(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

fn is_http_url(url: &str) -> bool {
    let lower = url.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

impl FactsDocument {
    /// Parse and validate a cleaned model answer
    ///
    /// Sources beyond `max_sources` are dropped; a `max_sources` of zero keeps
    /// every source.
    pub fn parse(text: &str, max_sources: usize) -> Result<Self, FormatError> {
        let raw: RawFactsDocument =
            serde_json::from_str(text).map_err(|e| FormatError::Json(e.to_string()))?;

        let format_version = raw
            .format_version
            .ok_or(FormatError::MissingField("formatVersion"))?;
        if !has_text(&raw.lang) {
            return Err(FormatError::MissingField("lang"));
        }
        if !has_text(&raw.short) {
            return Err(FormatError::MissingField("short"));
        }
        if !has_text(&raw.full) {
            return Err(FormatError::MissingField("full"));
        }

        let raw_sources = raw.sources.unwrap_or_default();
        if raw_sources.is_empty() {
            return Err(FormatError::NoSources);
        }

        let mut sources = Vec::with_capacity(raw_sources.len());
        for (index, source) in raw_sources.into_iter().enumerate() {
            if !has_text(&source.url) {
                return Err(FormatError::MissingSourceUrl(index));
            }
            let url = source.url.unwrap_or_default();
            if !is_http_url(&url) {
                return Err(FormatError::InvalidSourceUrl { index, url });
            }
            sources.push(FactSource {
                title: source.title,
                url,
            });
        }

        if max_sources > 0 && sources.len() > max_sources {
            tracing::warn!(
                returned = sources.len(),
                max_sources,
                "Model returned more sources than allowed, truncating"
            );
            sources.truncate(max_sources);
        }

        Ok(Self {
            format_version,
            lang: raw.lang.unwrap_or_default(),
            short: raw.short.unwrap_or_default(),
            full: raw.full.unwrap_or_default(),
            sources,
        })
    }

    pub fn to_canonical_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
