/// Endpoint, timing and labelling constants shared across the crawler.
/// Every value here can be overridden through `crawler.toml` unless noted otherwise.

// Lotte Cinema endpoints
pub const LOTTE_LISTING_URL: &str = "https://www.lottecinema.co.kr/NLCHS/Event/DetailList?code=20";
pub const LOTTE_EVENT_BASE_URL: &str = "https://www.lottecinema.co.kr/NLCHS/Event";
/// Substring identifying the background XHR that carries the event list JSON
pub const LISTING_DATA_ENDPOINT: &str = "EventData.aspx";

pub const DESKTOP_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36";

// Listing poll budget
pub const LISTING_POLL_ATTEMPTS: u32 = 15;
pub const LISTING_POLL_INTERVAL_MS: u64 = 1_000;

// Detail capture
pub const VIEWPORT_WIDTH: u32 = 1280;
pub const VIEWPORT_HEIGHT: u32 = 2000;
pub const DETAIL_SETTLE_MS: u64 = 2_000;
/// Page lifecycle event marking no network activity for 500 ms
pub const NETWORK_IDLE_EVENT: &str = "networkIdle";
pub const NETWORK_IDLE_TIMEOUT_MS: u64 = 30_000;
pub const SCREENSHOT_DIR: &str = "crawled_images";
pub const SCREENSHOT_PREFIX: &str = "lotte";

/// Pause between two processed events
pub const ITEM_DELAY_MS: u64 = 3_000;

/// Title must contain one of these (case-sensitive)
pub const EVENT_KEYWORDS: [&str; 4] = ["증정", "스페셜", "아트카드", "시그니처"];

// Vision model fallback, cheapest first
pub const GEMINI_MODELS: [&str; 5] = [
    "gemini-2.5-flash-lite",
    "gemini-2.5-flash",
    "gemini-2.5-pro",
    "gemini-2.0-flash",
    "gemini-2.0-pro",
];
pub const ATTEMPTS_PER_MODEL: u32 = 2;
pub const RATE_LIMIT_BACKOFF_MS: u64 = 15_000;
pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com";
pub const IMAGE_MIME_TYPE: &str = "image/png";

// Extraction sentinels
pub const GENERAL_MOVIE: &str = "General";
pub const UNKNOWN_GOODS: &str = "Unknown";
pub const ALL_LOCATIONS: &str = "All";

// Relational store (not configurable)
pub const EVENTS_TABLE: &str = "events";
pub const DEDUP_COLUMN: &str = "official_url";

// Spreadsheet layout (not configurable)
pub const SHEET_HEADERS: [&str; 7] = [
    "event_title",
    "movie_title",
    "goods_type",
    "locations",
    "period",
    "detail_url",
    "crawled_at",
];
pub const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";
pub const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Build the detail page address for a listing item id
pub fn detail_url_for(event_id: &str) -> String {
    format!("{LOTTE_EVENT_BASE_URL}/EventTemplateInfo?eventId={event_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_url_uses_event_template_info() {
        assert_eq!(
            detail_url_for("42"),
            "https://www.lottecinema.co.kr/NLCHS/Event/EventTemplateInfo?eventId=42"
        );
    }
}
