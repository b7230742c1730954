use async_trait::async_trait;
use mog_crawler::app::ports::{GenerativeModel, InlineImage};
use mog_crawler::error::{CrawlerError, Result};
use mog_crawler::pipeline::{ModelPolicy, VisionExtractor};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// What a scripted model does on each call, in order. The last entry repeats.
#[derive(Clone)]
enum Reply {
    Text(&'static str),
    RateLimited,
    Fail,
}

#[derive(Default)]
struct ScriptedModel {
    scripts: HashMap<String, Vec<Reply>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedModel {
    fn with(mut self, model: &str, replies: Vec<Reply>) -> Self {
        self.scripts.insert(model.to_string(), replies);
        self
    }

    fn calls_to(&self, model: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|m| *m == model).count()
    }

    fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl GenerativeModel for ScriptedModel {
    async fn generate(&self, model: &str, prompt: &str, image: &InlineImage) -> Result<String> {
        assert!(!prompt.is_empty());
        assert_eq!(image.mime_type, "image/png");

        let call_index = {
            let mut calls = self.calls.lock().unwrap();
            let index = calls.iter().filter(|m| *m == model).count();
            calls.push(model.to_string());
            index
        };

        let script = self.scripts.get(model).cloned().unwrap_or_default();
        let reply = script
            .get(call_index)
            .or_else(|| script.last())
            .cloned()
            .unwrap_or(Reply::Fail);

        match reply {
            Reply::Text(text) => Ok(text.to_string()),
            Reply::RateLimited => Err(CrawlerError::Model {
                status: Some(429),
                message: format!("{model}: [429 Too Many Requests] quota exceeded"),
            }),
            Reply::Fail => Err(CrawlerError::Model {
                status: Some(500),
                message: format!("{model}: [500 Internal Server Error] boom"),
            }),
        }
    }
}

fn policy(models: &[&str], backoff: Duration) -> ModelPolicy {
    ModelPolicy {
        models: models.iter().map(|m| m.to_string()).collect(),
        attempts_per_model: 2,
        rate_limit_backoff: backoff,
    }
}

fn screenshot(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("lotte_1.png");
    std::fs::write(&path, [0x89, b'P', b'N', b'G']).unwrap();
    path
}

const GOOD_ANSWER: &str = r#"```json
{"movieTitle": " 위키드 ", "goodsType": "아트카드", "locations": ["월드타워", " 건대입구", "", "월드타워"]}
```"#;

#[tokio::test]
async fn falls_back_to_next_model_after_retry_budget() {
    let dir = TempDir::new().unwrap();
    let model = Arc::new(
        ScriptedModel::default()
            .with("model-a", vec![Reply::Fail])
            .with("model-b", vec![Reply::Text(GOOD_ANSWER)]),
    );
    let extractor = VisionExtractor::new(model.clone(), policy(&["model-a", "model-b"], Duration::ZERO));

    let report = extractor.extract(&screenshot(&dir)).await;

    assert_eq!(model.calls_to("model-a"), 2);
    assert_eq!(model.calls_to("model-b"), 1);
    assert_eq!(report.model.as_deref(), Some("model-b"));
    assert_eq!(report.attempts, 3);
    assert_eq!(report.extraction.movie_title, "위키드");
    assert_eq!(report.extraction.goods_type, "아트카드");
    assert_eq!(report.extraction.locations, vec!["월드타워", "건대입구"]);
}

#[tokio::test]
async fn rate_limit_consumes_an_attempt_and_waits() {
    let dir = TempDir::new().unwrap();
    let model = Arc::new(
        ScriptedModel::default()
            .with("model-a", vec![Reply::RateLimited, Reply::Text(GOOD_ANSWER)]),
    );
    let backoff = Duration::from_millis(50);
    let extractor = VisionExtractor::new(model.clone(), policy(&["model-a", "model-b"], backoff));

    let started = Instant::now();
    let report = extractor.extract(&screenshot(&dir)).await;

    assert!(started.elapsed() >= backoff);
    assert_eq!(model.calls_to("model-a"), 2);
    assert_eq!(model.calls_to("model-b"), 0);
    assert_eq!(report.model.as_deref(), Some("model-a"));
}

#[tokio::test]
async fn ordinary_failure_retries_without_backoff() {
    let dir = TempDir::new().unwrap();
    let model = Arc::new(
        ScriptedModel::default().with("model-a", vec![Reply::Fail, Reply::Text(GOOD_ANSWER)]),
    );
    let extractor = VisionExtractor::new(
        model.clone(),
        policy(&["model-a"], Duration::from_secs(10)),
    );

    let started = Instant::now();
    let report = extractor.extract(&screenshot(&dir)).await;

    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(model.calls_to("model-a"), 2);
    assert_eq!(report.model.as_deref(), Some("model-a"));
}

#[tokio::test]
async fn exhausting_every_model_returns_sentinel() {
    let dir = TempDir::new().unwrap();
    let model = Arc::new(
        ScriptedModel::default()
            .with("model-a", vec![Reply::RateLimited])
            .with("model-b", vec![Reply::Fail]),
    );
    let extractor = VisionExtractor::new(
        model.clone(),
        policy(&["model-a", "model-b"], Duration::from_millis(1)),
    );

    let report = extractor.extract(&screenshot(&dir)).await;

    assert!(report.fell_back());
    assert_eq!(model.total_calls(), 4);
    assert_eq!(report.extraction.movie_title, "");
    assert_eq!(report.extraction.goods_type, "Unknown");
    assert!(report.extraction.locations.is_empty());
}

#[tokio::test]
async fn exhaustion_error_carries_last_failure() {
    let model = Arc::new(ScriptedModel::default().with("model-a", vec![Reply::Fail]));
    let extractor = VisionExtractor::new(model, policy(&["model-a"], Duration::ZERO));
    let image = InlineImage {
        mime_type: "image/png".into(),
        data_base64: "AAAA".into(),
    };

    let err = extractor.generate_with_fallback(&image).await.unwrap_err();
    match err {
        CrawlerError::ModelsExhausted { last_error } => {
            assert!(last_error.unwrap().contains("boom"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn unreadable_image_returns_sentinel_without_calling_model() {
    let model = Arc::new(ScriptedModel::default().with("model-a", vec![Reply::Text(GOOD_ANSWER)]));
    let extractor = VisionExtractor::new(model.clone(), policy(&["model-a"], Duration::ZERO));

    let report = extractor.extract(std::path::Path::new("/nonexistent/lotte_0.png")).await;

    assert!(report.fell_back());
    assert_eq!(model.total_calls(), 0);
    assert_eq!(report.extraction.goods_type, "Unknown");
}

#[tokio::test]
async fn non_json_answer_returns_sentinel() {
    let dir = TempDir::new().unwrap();
    let model = Arc::new(
        ScriptedModel::default().with("model-a", vec![Reply::Text("I could not read this image.")]),
    );
    let extractor = VisionExtractor::new(model.clone(), policy(&["model-a"], Duration::ZERO));

    let report = extractor.extract(&screenshot(&dir)).await;

    assert!(report.fell_back());
    // a parse failure is not retried
    assert_eq!(model.total_calls(), 1);
    assert_eq!(report.extraction.movie_title, "");
    assert!(report.extraction.locations.is_empty());
}
