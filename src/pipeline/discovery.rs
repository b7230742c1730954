use crate::constants::{detail_url_for, LISTING_DATA_ENDPOINT};
use crate::error::Result;
use crate::types::ScrapedEvent;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Body of the listing XHR
#[derive(Debug, Deserialize)]
struct ListingPayload {
    #[serde(rename = "Items")]
    items: Option<Vec<ListingItem>>,
}

#[derive(Debug, Deserialize)]
struct ListingItem {
    #[serde(rename = "EventName")]
    event_name: Option<String>,
    #[serde(rename = "ProgressStartDate")]
    progress_start_date: Option<String>,
    #[serde(rename = "ProgressEndDate")]
    progress_end_date: Option<String>,
    /// Sent as a string by the current site, as a number by older responses
    #[serde(rename = "EventID")]
    event_id: Option<Value>,
}

impl ListingItem {
    fn event_id(&self) -> Option<String> {
        match self.event_id.as_ref()? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    fn into_scraped(self) -> Option<ScrapedEvent> {
        let event_id = self.event_id()?;
        let title = self.event_name?;
        let date_range = match (self.progress_start_date, self.progress_end_date) {
            (Some(start), Some(end)) => Some(format!("{} ~ {}", start.trim(), end.trim())),
            _ => None,
        };

        Some(ScrapedEvent {
            title,
            detail_url: detail_url_for(&event_id),
            date_range,
        })
    }
}

/// Map a listing response body into scraped events.
///
/// Returns `Ok(None)` when the body is JSON without an `Items` collection, which
/// happens for unrelated calls to the same endpoint.
pub fn parse_listing_payload(body: &str) -> Result<Option<Vec<ScrapedEvent>>> {
    let payload: ListingPayload = serde_json::from_str(body)?;
    let Some(items) = payload.items else {
        return Ok(None);
    };

    let total = items.len();
    let events: Vec<ScrapedEvent> = items
        .into_iter()
        .filter_map(ListingItem::into_scraped)
        .collect();

    if events.len() < total {
        warn!(
            "Dropped {} listing items without a name or id",
            total - events.len()
        );
    }
    Ok(Some(events))
}

/// Wait for the response listener to publish events.
///
/// Checks up to `attempts` times, sleeping `interval` between checks, and returns
/// whatever has been captured once events appear or the budget runs out.
pub async fn poll_for_events(
    captured: &watch::Receiver<Vec<ScrapedEvent>>,
    attempts: u32,
    interval: Duration,
) -> Vec<ScrapedEvent> {
    for attempt in 0..attempts {
        if !captured.borrow().is_empty() {
            debug!("Listing captured after {} polls", attempt);
            break;
        }
        tokio::time::sleep(interval).await;
    }
    captured.borrow().clone()
}

/// Pairs `responseReceived` with `loadingFinished` for listing requests.
///
/// The two notifications travel on separate subscriptions, so either can be seen
/// first. A request is ready once both have arrived and its URL is the listing
/// endpoint.
#[derive(Debug, Default)]
pub struct ListingRequestTracker {
    awaiting_body: HashSet<String>,
    finished_early: HashSet<String>,
}

impl ListingRequestTracker {
    /// Record a response. Returns true when its body can be read now.
    pub fn on_response(&mut self, request_id: &str, url: &str) -> bool {
        let already_finished = self.finished_early.remove(request_id);
        if !url.contains(LISTING_DATA_ENDPOINT) {
            return false;
        }
        debug!("Matched listing response: {}", url);
        if already_finished {
            return true;
        }
        self.awaiting_body.insert(request_id.to_string());
        false
    }

    /// Record a finished load. Returns true when it completes a listing response.
    pub fn on_finished(&mut self, request_id: &str) -> bool {
        if self.awaiting_body.remove(request_id) {
            return true;
        }
        self.finished_early.insert(request_id.to_string());
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_listing_item_to_scraped_event() {
        let body = r#"{"Items":[{"EventName":"A","ProgressStartDate":"2024.01.01","ProgressEndDate":"2024.02.01","EventID":"42"}]}"#;
        let events = parse_listing_payload(body).unwrap().unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "A");
        assert!(events[0].detail_url.ends_with("eventId=42"));
        assert_eq!(events[0].date_range.as_deref(), Some("2024.01.01 ~ 2024.02.01"));
    }

    #[test]
    fn numeric_event_id_is_accepted() {
        let body = r#"{"Items":[{"EventName":"B","ProgressStartDate":"2024.03.01","ProgressEndDate":"2024.03.31","EventID":201010016924725}]}"#;
        let events = parse_listing_payload(body).unwrap().unwrap();
        assert!(events[0].detail_url.ends_with("eventId=201010016924725"));
    }

    #[test]
    fn missing_dates_leave_range_empty() {
        let body = r#"{"Items":[{"EventName":"C","EventID":"7"}]}"#;
        let events = parse_listing_payload(body).unwrap().unwrap();
        assert_eq!(events[0].date_range, None);
    }

    #[test]
    fn items_without_id_are_dropped() {
        let body = r#"{"Items":[{"EventName":"D"},{"EventName":"E","EventID":"8"}]}"#;
        let events = parse_listing_payload(body).unwrap().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "E");
    }

    #[test]
    fn body_without_items_is_not_a_capture() {
        assert_eq!(parse_listing_payload(r#"{"IsOK":"true"}"#).unwrap(), None);
    }

    #[test]
    fn non_json_body_is_an_error() {
        assert!(parse_listing_payload("<html></html>").is_err());
    }

    const LISTING_URL: &str = "https://www.lottecinema.co.kr/LCWS/Event/EventData.aspx";

    #[test]
    fn tracker_matches_response_then_finish() {
        let mut tracker = ListingRequestTracker::default();
        assert!(!tracker.on_response("1000.1", LISTING_URL));
        assert!(tracker.on_finished("1000.1"));
        // each request is read once
        assert!(!tracker.on_finished("1000.1"));
    }

    #[test]
    fn tracker_matches_finish_seen_before_response() {
        let mut tracker = ListingRequestTracker::default();
        assert!(!tracker.on_finished("1000.2"));
        assert!(tracker.on_response("1000.2", LISTING_URL));
        assert!(!tracker.on_finished("1000.2"));
    }

    #[test]
    fn tracker_ignores_other_requests_in_either_order() {
        let mut tracker = ListingRequestTracker::default();
        assert!(!tracker.on_response("1", "https://www.lottecinema.co.kr/main.js"));
        assert!(!tracker.on_finished("1"));

        assert!(!tracker.on_finished("2"));
        assert!(!tracker.on_response("2", "https://www.lottecinema.co.kr/style.css"));
        assert!(!tracker.on_response("3", LISTING_URL));
        assert!(tracker.on_finished("3"));
    }

    #[tokio::test]
    async fn poll_returns_as_soon_as_events_arrive() {
        let (tx, rx) = watch::channel(Vec::new());
        let publisher = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let _ = tx.send(vec![ScrapedEvent {
                title: "증정".into(),
                detail_url: "u".into(),
                date_range: None,
            }]);
            // keep the sender alive until the poller has read
            tokio::time::sleep(Duration::from_millis(200)).await;
        });

        let events = poll_for_events(&rx, 50, Duration::from_millis(10)).await;
        assert_eq!(events.len(), 1);
        publisher.abort();
    }

    #[tokio::test]
    async fn poll_gives_up_after_budget() {
        let (_tx, rx) = watch::channel(Vec::new());
        let start = std::time::Instant::now();
        let events = poll_for_events(&rx, 3, Duration::from_millis(5)).await;
        assert!(events.is_empty());
        assert!(start.elapsed() >= Duration::from_millis(15));
    }
}
