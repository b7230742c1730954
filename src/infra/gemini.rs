use crate::app::ports::{GenerativeModel, InlineImage};
use crate::constants::GEMINI_API_BASE;
use crate::error::{CrawlerError, Result};
use crate::infra::http_client::build_client;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Gemini `generateContent` over REST
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text { text: &'a str },
    InlineData { inline_data: Blob<'a> },
}

#[derive(Serialize)]
struct Blob<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl GenerateResponse {
    /// Concatenated text of the first candidate
    fn text(self) -> Option<String> {
        let content = self.candidates.into_iter().next()?.content?;
        let text: String = content.parts.into_iter().filter_map(|p| p.text).collect();
        (!text.is_empty()).then_some(text)
    }
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_base_url(api_key, GEMINI_API_BASE)
    }

    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: build_client()?,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, model)
    }
}

#[async_trait]
impl GenerativeModel for GeminiClient {
    async fn generate(&self, model: &str, prompt: &str, image: &InlineImage) -> Result<String> {
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text { text: prompt },
                    Part::InlineData {
                        inline_data: Blob {
                            mime_type: &image.mime_type,
                            data: &image.data_base64,
                        },
                    },
                ],
            }],
        };

        let resp = self
            .client
            .post(self.endpoint(model))
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|e| CrawlerError::Model {
                status: e.status().map(|s| s.as_u16()),
                message: format!("{model}: {e}"),
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(CrawlerError::Model {
                status: Some(status.as_u16()),
                message: format!("{model}: [{}] {}", status, body),
            });
        }

        let body: GenerateResponse = resp.json().await?;
        let text = body.text().ok_or_else(|| CrawlerError::Model {
            status: None,
            message: format!("{model}: response contained no text"),
        })?;
        debug!("{} answered with {} chars", model, text.len());
        Ok(text)
    }
}
