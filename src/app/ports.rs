use crate::error::Result;
use crate::types::{EnrichedEvent, EventRow, ScrapedEvent};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::path::PathBuf;

/// Discovers the chain's current event list.
///
/// Never fails: navigation or parse problems are logged and yield an empty list,
/// which callers read as "no events found".
#[async_trait]
pub trait ListingSource: Send + Sync {
    async fn discover(&self) -> Vec<ScrapedEvent>;
}

/// Captures a full-page screenshot of a detail page, or `None` on failure.
#[async_trait]
pub trait PageCapturer: Send + Sync {
    async fn capture(&self, detail_url: &str) -> Option<PathBuf>;
}

/// Base64 image sent inline with a prompt
#[derive(Clone, Debug)]
pub struct InlineImage {
    pub mime_type: String,
    pub data_base64: String,
}

/// One multimodal generation call against a named model
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    async fn generate(&self, model: &str, prompt: &str, image: &InlineImage) -> Result<String>;
}

/// Relational store holding published events
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Every `official_url` already stored
    async fn existing_urls(&self) -> Result<HashSet<String>>;
    async fn insert_event(&self, row: &EventRow) -> Result<()>;
}

/// Spreadsheet mirror of scraped events
#[async_trait]
pub trait SheetSink: Send + Sync {
    async fn append_event(&self, event: &EnrichedEvent, crawled_at: DateTime<Utc>) -> Result<()>;
}
