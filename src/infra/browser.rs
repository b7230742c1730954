use crate::app::ports::{ListingSource, PageCapturer};
use crate::config::CrawlerSettings;
use crate::constants::{DESKTOP_USER_AGENT, NETWORK_IDLE_EVENT, SCREENSHOT_PREFIX};
use crate::error::{CrawlerError, Result};
use crate::pipeline::discovery::{parse_listing_payload, poll_for_events, ListingRequestTracker};
use crate::types::ScrapedEvent;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, EventLoadingFinished, EventResponseReceived, GetResponseBodyParams, RequestId,
    SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::page::{
    CaptureScreenshotFormat, EventLifecycleEvent, SetLifecycleEventsEnabledParams,
};
use chromiumoxide::listeners::EventStream;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, trace, warn};

/// Tab that is closed on every exit path.
///
/// `close` is the normal path. If the guard is dropped without it (early return,
/// cancelled future) a background task closes the tab instead.
pub struct PageGuard {
    page: Option<Page>,
    url: String,
    runtime_handle: tokio::runtime::Handle,
}

impl PageGuard {
    pub fn new(page: Page, url: impl Into<String>) -> Self {
        Self {
            page: Some(page),
            url: url.into(),
            runtime_handle: tokio::runtime::Handle::current(),
        }
    }

    pub async fn close(mut self) -> Result<()> {
        if let Some(page) = self.page.take() {
            page.close().await?;
            debug!("Closed tab for {}", self.url);
        }
        Ok(())
    }
}

impl Deref for PageGuard {
    type Target = Page;

    fn deref(&self) -> &Self::Target {
        // only `close` and `drop` take the page out, and both consume the guard
        self.page.as_ref().expect("page present until the guard is consumed")
    }
}

impl Drop for PageGuard {
    fn drop(&mut self) {
        if let Some(page) = self.page.take() {
            let url = std::mem::take(&mut self.url);
            self.runtime_handle.spawn(async move {
                if let Err(e) = page.close().await {
                    warn!("Tab cleanup failed for {}: {}", url, e);
                } else {
                    trace!("Tab cleanup succeeded for {}", url);
                }
            });
        }
    }
}

/// Path for a new screenshot: `<dir>/lotte_<epoch-millis>.png`
pub fn screenshot_path(dir: &Path, taken_at: DateTime<Utc>) -> PathBuf {
    dir.join(format!("{}_{}.png", SCREENSHOT_PREFIX, taken_at.timestamp_millis()))
}

/// Wait for `target` among lifecycle event names of the next document.
///
/// Events before that document's `init` belong to the previous page and are
/// skipped. Returns false on timeout or when the stream ends.
pub async fn wait_for_lifecycle<S>(names: S, target: &str, limit: Duration) -> bool
where
    S: Stream<Item = String>,
{
    let wait = async {
        tokio::pin!(names);
        let mut navigated = false;
        while let Some(name) = names.next().await {
            if name == "init" {
                navigated = true;
            } else if navigated && name == target {
                return true;
            }
        }
        false
    };
    tokio::time::timeout(limit, wait).await.unwrap_or(false)
}

/// One headless Chrome for the whole run. Each listing or detail fetch opens
/// its own tab and closes it when done.
pub struct BrowserSession {
    browser: Browser,
    handler_task: JoinHandle<()>,
    settings: CrawlerSettings,
}

impl BrowserSession {
    pub async fn launch(settings: &CrawlerSettings) -> Result<Self> {
        let config = BrowserConfig::builder()
            .window_size(settings.viewport_width, settings.viewport_height)
            .build()
            .map_err(CrawlerError::BrowserLaunch)?;

        let (browser, mut handler) = Browser::launch(config).await?;
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser handler error: {}", e);
                }
            }
        });

        info!("🌐 Browser launched");
        Ok(Self {
            browser,
            handler_task,
            settings: settings.clone(),
        })
    }

    pub async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            warn!("Failed to close browser: {}", e);
        }
        if let Err(e) = self.browser.wait().await {
            warn!("Failed waiting for browser exit: {}", e);
        }
        self.handler_task.abort();
        info!("Browser closed");
    }

    async fn open_tab(&self, url: &str) -> Result<PageGuard> {
        let page = self.browser.new_page("about:blank").await?;
        Ok(PageGuard::new(page, url))
    }

    #[instrument(skip(self))]
    async fn discover_listing(&self) -> Result<Vec<ScrapedEvent>> {
        let url = self.settings.listing_url.clone();
        let tab = self.open_tab(&url).await?;
        let result = self.intercept_listing(&tab, &url).await;
        if let Err(e) = tab.close().await {
            warn!("Failed to close listing tab: {}", e);
        }
        result
    }

    async fn intercept_listing(&self, tab: &PageGuard, url: &str) -> Result<Vec<ScrapedEvent>> {
        tab.set_user_agent(SetUserAgentOverrideParams::new(DESKTOP_USER_AGENT)).await?;
        tab.execute(EnableParams::default()).await?;

        // subscribe before navigating so the data call cannot slip past
        let responses = tab.event_listener::<EventResponseReceived>().await?;
        let finished = tab.event_listener::<EventLoadingFinished>().await?;
        let (tx, rx) = watch::channel(Vec::new());
        let listener = tokio::spawn(listen_for_listing(
            tab.deref().clone(),
            responses,
            finished,
            tx,
        ));

        if let Err(e) = tab.goto(url).await {
            listener.abort();
            return Err(e.into());
        }

        let events = poll_for_events(
            &rx,
            self.settings.poll_attempts,
            self.settings.poll_interval(),
        )
        .await;
        listener.abort();

        if events.is_empty() {
            warn!("No listing data captured within the polling budget");
        }
        Ok(events)
    }

    #[instrument(skip(self))]
    async fn capture_detail(&self, detail_url: &str) -> Result<PathBuf> {
        let tab = self.open_tab(detail_url).await?;
        let result = self.screenshot(&tab, detail_url).await;
        if let Err(e) = tab.close().await {
            warn!("Failed to close detail tab: {}", e);
        }
        result
    }

    async fn screenshot(&self, tab: &PageGuard, detail_url: &str) -> Result<PathBuf> {
        tab.execute(SetDeviceMetricsOverrideParams::new(
            i64::from(self.settings.viewport_width),
            i64::from(self.settings.viewport_height),
            1.0,
            false,
        ))
        .await?;

        tab.execute(SetLifecycleEventsEnabledParams::new(true)).await?;
        let lifecycle = tab
            .event_listener::<EventLifecycleEvent>()
            .await?
            .map(|event| event.name.clone());

        tab.goto(detail_url).await?;
        let idle_timeout = self.settings.network_idle_timeout();
        if !wait_for_lifecycle(lifecycle, NETWORK_IDLE_EVENT, idle_timeout).await {
            warn!("Network not idle after {:?}, capturing anyway", idle_timeout);
        }
        tokio::time::sleep(self.settings.settle_time()).await;

        tokio::fs::create_dir_all(&self.settings.screenshot_dir).await?;
        let path = screenshot_path(&self.settings.screenshot_dir, Utc::now());
        tab.save_screenshot(
            ScreenshotParams::builder()
                .format(CaptureScreenshotFormat::Png)
                .full_page(true)
                .build(),
            &path,
        )
        .await?;

        debug!("📸 Saved screenshot to {}", path.display());
        Ok(path)
    }
}

/// Watch network traffic for the listing XHR and publish its events.
///
/// Bodies are only available once loading finishes, so a listing request is read
/// when both its response and its finished load have been seen.
async fn listen_for_listing(
    page: Page,
    mut responses: EventStream<EventResponseReceived>,
    mut finished: EventStream<EventLoadingFinished>,
    captured: watch::Sender<Vec<ScrapedEvent>>,
) {
    let mut tracker = ListingRequestTracker::default();

    loop {
        let ready = tokio::select! {
            // CDP queues responseReceived before loadingFinished for one request
            biased;
            Some(event) = responses.next() => {
                tracker.on_response(event.request_id.inner(), &event.response.url)
                    .then(|| event.request_id.clone())
            }
            Some(event) = finished.next() => {
                tracker.on_finished(event.request_id.inner())
                    .then(|| event.request_id.clone())
            }
            else => break,
        };

        if let Some(request_id) = ready {
            publish_listing(&page, request_id, &captured).await;
        }
    }
}

async fn publish_listing(
    page: &Page,
    request_id: RequestId,
    captured: &watch::Sender<Vec<ScrapedEvent>>,
) {
    match read_body(page, request_id).await {
        Ok(body) => match parse_listing_payload(&body) {
            Ok(Some(events)) if !events.is_empty() => {
                info!("Captured {} listing events", events.len());
                let _ = captured.send(events);
            }
            Ok(_) => debug!("Listing response carried no items"),
            Err(e) => warn!("Failed to parse listing response: {}", e),
        },
        Err(e) => warn!("Failed to read listing response body: {}", e),
    }
}

async fn read_body(page: &Page, request_id: RequestId) -> Result<String> {
    let resp = page.execute(GetResponseBodyParams::new(request_id)).await?;
    let body = &resp.result;
    if !body.base64_encoded {
        return Ok(body.body.clone());
    }
    let bytes = STANDARD.decode(&body.body).map_err(|e| CrawlerError::Api {
        message: format!("listing body was not valid base64: {e}"),
    })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[async_trait]
impl ListingSource for BrowserSession {
    async fn discover(&self) -> Vec<ScrapedEvent> {
        match self.discover_listing().await {
            Ok(events) => events,
            Err(e) => {
                error!("Error while discovering listing: {}", e);
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl PageCapturer for BrowserSession {
    async fn capture(&self, detail_url: &str) -> Option<PathBuf> {
        match self.capture_detail(detail_url).await {
            Ok(path) => Some(path),
            Err(e) => {
                warn!("Failed to capture {}: {}", detail_url, e);
                None
            }
        }
    }
}
