use crate::constants::UNKNOWN_GOODS;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Lightweight event record as discovered on the listing page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapedEvent {
    pub title: String,
    /// Unique key used for dedup
    pub detail_url: String,
    /// `"<start> ~ <end>"` with `YYYY.MM.DD` components
    pub date_range: Option<String>,
}

/// Structured fields read off a detail-page screenshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extraction {
    pub movie_title: String,
    pub goods_type: String,
    pub locations: Vec<String>,
}

impl Extraction {
    /// The record returned whenever extraction fails outright
    pub fn empty() -> Self {
        Self {
            movie_title: String::new(),
            goods_type: UNKNOWN_GOODS.to_string(),
            locations: Vec::new(),
        }
    }
}

/// A scraped event merged with its extraction; written once to each sink
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichedEvent {
    pub title: String,
    pub detail_url: String,
    pub date_range: Option<String>,
    pub movie_title: String,
    pub goods_type: String,
    pub locations: Vec<String>,
}

impl EnrichedEvent {
    pub fn merge(event: ScrapedEvent, extraction: Extraction) -> Self {
        Self {
            title: event.title,
            detail_url: event.detail_url,
            date_range: event.date_range,
            movie_title: extraction.movie_title,
            goods_type: extraction.goods_type,
            locations: extraction.locations,
        }
    }
}

/// Cinema chains known to the site, keyed by their `cinema_id`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CinemaChain {
    Cgv,
    Megabox,
    Lotte,
}

impl CinemaChain {
    pub fn id(self) -> i32 {
        match self {
            CinemaChain::Cgv => 1,
            CinemaChain::Megabox => 2,
            CinemaChain::Lotte => 3,
        }
    }
}

/// Display status shown on the site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventStatus {
    #[serde(rename = "예정")]
    Upcoming,
    #[serde(rename = "진행중")]
    Ongoing,
    #[serde(rename = "마감임박")]
    ClosingSoon,
}

/// Row inserted into the `events` table.
///
/// Fresh rows are hidden and flagged new so that an admin reviews them before
/// they appear on the public site.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventRow {
    pub event_title: String,
    pub movie_title: String,
    pub cinema_id: i32,
    pub goods_type: String,
    pub period: Option<String>,
    pub locations: Vec<String>,
    pub official_url: String,
    pub status: EventStatus,
    pub is_visible: bool,
    pub is_new: bool,
}

impl EventRow {
    pub fn from_enriched(event: &EnrichedEvent, chain: CinemaChain) -> Self {
        Self {
            event_title: event.title.clone(),
            movie_title: event.movie_title.clone(),
            cinema_id: chain.id(),
            goods_type: event.goods_type.clone(),
            period: event.date_range.clone(),
            locations: event.locations.clone(),
            official_url: event.detail_url.clone(),
            status: EventStatus::Upcoming,
            is_visible: false,
            is_new: true,
        }
    }
}

/// Build the spreadsheet row in header order
pub fn sheet_row(event: &EnrichedEvent, crawled_at: DateTime<Utc>) -> Vec<String> {
    vec![
        event.title.clone(),
        event.movie_title.clone(),
        event.goods_type.clone(),
        event.locations.join(", "),
        event.date_range.clone().unwrap_or_default(),
        event.detail_url.clone(),
        crawled_at.to_rfc3339_opts(SecondsFormat::Millis, true),
    ]
}
