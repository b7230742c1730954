use crate::app::ports::EventStore;
use std::collections::HashSet;
use tracing::{info, instrument, warn};

/// Detail URLs already stored in the datastore.
///
/// Loaded once at the start of a run and never refreshed. Two runs racing on the
/// same URL can both insert it.
#[derive(Debug, Clone, Default)]
pub struct ExistingUrlIndex {
    urls: HashSet<String>,
}

impl ExistingUrlIndex {
    /// Load from the store. A failed lookup degrades to an empty index.
    #[instrument(skip(store))]
    pub async fn load(store: &dyn EventStore) -> Self {
        match store.existing_urls().await {
            Ok(urls) => {
                info!("📚 Loaded {} existing event URLs", urls.len());
                Self { urls }
            }
            Err(e) => {
                warn!("Failed to load existing event URLs, dedup disabled for this run: {}", e);
                Self::default()
            }
        }
    }

    pub fn contains(&self, detail_url: &str) -> bool {
        self.urls.contains(detail_url)
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}

impl FromIterator<String> for ExistingUrlIndex {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self {
            urls: iter.into_iter().collect(),
        }
    }
}
