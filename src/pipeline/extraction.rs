use crate::app::ports::{GenerativeModel, InlineImage};
use crate::config::ModelSettings;
use crate::constants::{IMAGE_MIME_TYPE, UNKNOWN_GOODS};
use crate::error::{CrawlerError, Result};
use crate::pipeline::prompt::extraction_prompt;
use crate::types::Extraction;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use regex::Regex;
use serde_json::Value;
use std::path::Path;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::{error, info, instrument, warn};

/// Greedy first-`{`-to-last-`}` span
fn json_object_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?s)\{.*\}").expect("valid JSON object pattern"))
}

fn code_fence_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"```(?:json)?\s*").expect("valid code fence pattern"))
}

/// Strip Markdown fences and cut out the JSON object the model answered with
pub fn extract_json_payload(raw: &str) -> String {
    let stripped = code_fence_pattern().replace_all(raw.trim(), "");
    let stripped = stripped.trim();
    match json_object_pattern().find(stripped) {
        Some(m) => m.as_str().to_string(),
        None => stripped.to_string(),
    }
}

fn trimmed_string(value: Option<&Value>) -> String {
    value
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

impl Extraction {
    /// Build a normalized extraction from the model's JSON object
    pub fn from_model_json(parsed: &Value) -> Self {
        let locations = match parsed.get("locations") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        };

        Self {
            movie_title: trimmed_string(parsed.get("movieTitle")),
            goods_type: trimmed_string(parsed.get("goodsType")),
            locations,
        }
        .normalized()
    }

    /// Trim every field, default the goods type and drop blank or repeated
    /// locations. Applying this twice changes nothing.
    pub fn normalized(self) -> Self {
        let goods_type = match self.goods_type.trim() {
            "" => UNKNOWN_GOODS.to_string(),
            other => other.to_string(),
        };

        let mut locations: Vec<String> = Vec::with_capacity(self.locations.len());
        for location in self.locations {
            let location = location.trim();
            if !location.is_empty() && !locations.iter().any(|l| l == location) {
                locations.push(location.to_string());
            }
        }

        Self {
            movie_title: self.movie_title.trim().to_string(),
            goods_type,
            locations,
        }
    }
}

/// Parse a raw model answer into a normalized extraction
pub fn parse_model_response(raw: &str) -> Result<Extraction> {
    let payload = extract_json_payload(raw);
    let parsed: Value = serde_json::from_str(&payload)?;
    if !parsed.is_object() {
        return Err(CrawlerError::Api {
            message: format!("model answered with non-object JSON: {payload}"),
        });
    }
    Ok(Extraction::from_model_json(&parsed))
}

/// Model list and per-model retry budget
#[derive(Debug, Clone)]
pub struct ModelPolicy {
    pub models: Vec<String>,
    pub attempts_per_model: u32,
    pub rate_limit_backoff: Duration,
}

impl From<&ModelSettings> for ModelPolicy {
    fn from(settings: &ModelSettings) -> Self {
        Self {
            models: settings.models.clone(),
            attempts_per_model: settings.attempts_per_model,
            rate_limit_backoff: settings.rate_limit_backoff(),
        }
    }
}

/// A successful generation and what it cost
#[derive(Debug, Clone)]
pub struct Generation {
    pub model: String,
    pub text: String,
    /// Calls made across the whole model matrix, including the successful one
    pub attempts: u32,
}

/// Extraction result plus how it was obtained
#[derive(Debug, Clone)]
pub struct ExtractionReport {
    pub extraction: Extraction,
    /// Model that answered; `None` when the sentinel record was returned
    pub model: Option<String>,
    pub attempts: u32,
}

impl ExtractionReport {
    pub fn fell_back(&self) -> bool {
        self.model.is_none()
    }
}

/// Reads structured event fields from a screenshot through a multimodal model,
/// walking a prioritized model list with a bounded retry budget per model.
pub struct VisionExtractor {
    model: Arc<dyn GenerativeModel>,
    policy: ModelPolicy,
    prompt: String,
}

impl VisionExtractor {
    pub fn new(model: Arc<dyn GenerativeModel>, policy: ModelPolicy) -> Self {
        Self {
            model,
            policy,
            prompt: extraction_prompt(),
        }
    }

    /// Best-effort extraction. Never fails: any error is logged and the
    /// sentinel record is returned.
    #[instrument(skip(self), fields(image = %image_path.display()))]
    pub async fn extract(&self, image_path: &Path) -> ExtractionReport {
        info!("🔍 Analyzing screenshot");
        let mut attempts = 0;
        match self.try_extract(image_path, &mut attempts).await {
            Ok((extraction, model)) => {
                info!(
                    "✅ Extraction complete via {}: movie=\"{}\" goods=\"{}\" locations={:?}",
                    model, extraction.movie_title, extraction.goods_type, extraction.locations
                );
                ExtractionReport {
                    extraction,
                    model: Some(model),
                    attempts,
                }
            }
            Err(e) => {
                error!("❌ Extraction failed: {}", e);
                ExtractionReport {
                    extraction: Extraction::empty(),
                    model: None,
                    attempts,
                }
            }
        }
    }

    async fn try_extract(&self, image_path: &Path, attempts: &mut u32) -> Result<(Extraction, String)> {
        let bytes = tokio::fs::read(image_path).await?;
        let image = InlineImage {
            mime_type: IMAGE_MIME_TYPE.to_string(),
            data_base64: STANDARD.encode(bytes),
        };

        let generation = self.generate_with_fallback(&image).await;
        *attempts = match &generation {
            Ok(g) => g.attempts,
            Err(_) => self.policy.models.len() as u32 * self.policy.attempts_per_model,
        };
        let generation = generation?;

        let extraction = parse_model_response(&generation.text)?;
        Ok((extraction, generation.model))
    }

    /// Walk the model list until one call succeeds.
    ///
    /// Each model gets `attempts_per_model` calls. A rate-limited call sleeps for
    /// the backoff before the next attempt; any other failure retries at once.
    pub async fn generate_with_fallback(&self, image: &InlineImage) -> Result<Generation> {
        let mut outcome: Option<Generation> = None;
        let mut last_error: Option<String> = None;
        let mut attempts = 0;

        for model in &self.policy.models {
            info!("🤖 Trying model: {}", model);

            for attempt in 1..=self.policy.attempts_per_model {
                attempts += 1;
                match self.model.generate(model, &self.prompt, image).await {
                    Ok(text) => {
                        outcome = Some(Generation {
                            model: model.clone(),
                            text,
                            attempts,
                        });
                    }
                    Err(e) if e.is_rate_limited() => {
                        warn!(
                            "⏳ Rate limit (429) on {} (attempt {}/{}), waiting {:?}",
                            model, attempt, self.policy.attempts_per_model, self.policy.rate_limit_backoff
                        );
                        last_error = Some(e.to_string());
                        tokio::time::sleep(self.policy.rate_limit_backoff).await;
                    }
                    Err(e) => {
                        warn!(
                            "⚠️ Error with {} (attempt {}/{}): {}",
                            model, attempt, self.policy.attempts_per_model, e
                        );
                        last_error = Some(e.to_string());
                    }
                }

                if outcome.is_some() {
                    break;
                }
            }

            if outcome.is_some() {
                break;
            }
        }

        outcome.ok_or(CrawlerError::ModelsExhausted { last_error })
    }
}
