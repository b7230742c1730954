use thiserror::Error;

#[derive(Error, Debug)]
pub enum CrawlerError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Browser error: {0}")]
    Browser(#[from] chromiumoxide::error::CdpError),

    #[error("Failed to launch browser: {0}")]
    BrowserLaunch(String),

    #[error("Missing required configuration: {}", .0.join(", "))]
    MissingConfig(Vec<String>),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Model error: {message}")]
    Model { status: Option<u16>, message: String },

    #[error("All models failed. Last error: {}", .last_error.as_deref().unwrap_or("none"))]
    ModelsExhausted { last_error: Option<String> },

    #[error("API error: {message}")]
    Api { message: String },

    #[error("Authentication failed: {0}")]
    Auth(String),
}

impl CrawlerError {
    /// True when the error reports HTTP 429, either through the status code
    /// or inside the message text.
    pub fn is_rate_limited(&self) -> bool {
        match self {
            CrawlerError::Model { status, message } => {
                *status == Some(429) || message.contains("429")
            }
            CrawlerError::Http(e) => e.status().map(|s| s.as_u16() == 429).unwrap_or(false),
            other => other.to_string().contains("429"),
        }
    }
}

pub type Result<T> = std::result::Result<T, CrawlerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_detected_from_status_or_message() {
        let by_status = CrawlerError::Model {
            status: Some(429),
            message: "quota".into(),
        };
        let by_message = CrawlerError::Model {
            status: None,
            message: "[429 Too Many Requests] Resource has been exhausted".into(),
        };
        let other = CrawlerError::Model {
            status: Some(500),
            message: "internal".into(),
        };

        assert!(by_status.is_rate_limited());
        assert!(by_message.is_rate_limited());
        assert!(!other.is_rate_limited());
    }

    #[test]
    fn missing_config_lists_every_name() {
        let err = CrawlerError::MissingConfig(vec!["GEMINI_API_KEY".into(), "GOOGLE_SHEET_ID".into()]);
        assert_eq!(
            err.to_string(),
            "Missing required configuration: GEMINI_API_KEY, GOOGLE_SHEET_ID"
        );
    }

    #[test]
    fn exhausted_carries_last_error() {
        let err = CrawlerError::ModelsExhausted {
            last_error: Some("boom".into()),
        };
        assert_eq!(err.to_string(), "All models failed. Last error: boom");
    }
}
