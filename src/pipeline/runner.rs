use crate::app::ports::{EventStore, ListingSource, PageCapturer};
use crate::pipeline::dedup::ExistingUrlIndex;
use crate::pipeline::extraction::VisionExtractor;
use crate::pipeline::filter::{EventFilter, FilterStats};
use crate::pipeline::persistence::{PersistStatus, PersistenceSinks};
use crate::types::EnrichedEvent;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Per-run behaviour switches
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub today: NaiveDate,
    /// Pause between two processed events
    pub item_delay: Duration,
    /// Skip both sinks
    pub dry_run: bool,
    pub keep_screenshots: bool,
}

/// Summary of a complete run
#[derive(Debug, Default)]
pub struct RunSummary {
    pub existing_urls: usize,
    pub discovered: usize,
    pub filter: FilterStats,
    pub processed: usize,
    pub capture_failures: usize,
    /// Events that got the sentinel extraction
    pub extraction_fallbacks: usize,
    /// Events answered per model
    pub model_usage: HashMap<String, usize>,
    /// Model calls across all events
    pub model_calls: u32,
    pub persistence: HashMap<PersistStatus, usize>,
    pub events: Vec<EnrichedEvent>,
}

impl RunSummary {
    pub fn persisted(&self, status: PersistStatus) -> usize {
        self.persistence.get(&status).copied().unwrap_or(0)
    }
}

/// Wires the stages together: dedup index, discovery, filter, then
/// capture, extract and persist for each surviving event, one at a time.
pub struct Pipeline {
    pub listing: Arc<dyn ListingSource>,
    pub capturer: Arc<dyn PageCapturer>,
    pub extractor: VisionExtractor,
    pub store: Arc<dyn EventStore>,
    pub sinks: PersistenceSinks,
    pub filter: EventFilter,
}

impl Pipeline {
    #[instrument(skip(self, options), fields(today = %options.today, dry_run = options.dry_run))]
    pub async fn run(&self, options: &RunOptions) -> RunSummary {
        let mut summary = RunSummary::default();

        let index = ExistingUrlIndex::load(self.store.as_ref()).await;
        summary.existing_urls = index.len();
        if index.is_empty() {
            info!("No stored events found, every candidate counts as new");
        }

        info!("📡 Discovering events...");
        let events = self.listing.discover().await;
        summary.discovered = events.len();
        info!("✅ Discovered {} events", events.len());

        let (targets, filter_stats) = self.filter.apply(events, &index, options.today);
        summary.filter = filter_stats;
        info!("🎯 Found {} events to process", targets.len());

        let total = targets.len();
        for (i, event) in targets.into_iter().enumerate() {
            info!("🔧 Processing {}/{}: {}", i + 1, total, event.title);

            let Some(screenshot) = self.capturer.capture(&event.detail_url).await else {
                warn!("Skipping {}: screenshot failed", event.detail_url);
                summary.capture_failures += 1;
                continue;
            };

            let report = self.extractor.extract(&screenshot).await;
            summary.model_calls += report.attempts;
            match &report.model {
                Some(model) => *summary.model_usage.entry(model.clone()).or_insert(0) += 1,
                None => summary.extraction_fallbacks += 1,
            }
            let enriched = EnrichedEvent::merge(event, report.extraction);

            if options.dry_run {
                info!("Dry run, not persisting: {:?}", enriched);
            } else {
                let outcome = self.sinks.persist(&enriched).await;
                *summary.persistence.entry(outcome.status()).or_insert(0) += 1;
            }

            if !options.keep_screenshots {
                remove_screenshot(&screenshot).await;
            }

            summary.processed += 1;
            summary.events.push(enriched);

            if i + 1 < total && !options.item_delay.is_zero() {
                tokio::time::sleep(options.item_delay).await;
            }
        }

        info!(
            "🎉 Run finished: {} discovered, {} processed, {} capture failures, {} extraction fallbacks",
            summary.discovered, summary.processed, summary.capture_failures, summary.extraction_fallbacks
        );
        summary
    }
}

async fn remove_screenshot(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("Removed screenshot {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove screenshot {}: {}", path.display(), e),
    }
}
