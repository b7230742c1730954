use crate::app::ports::EventStore;
use crate::config::Credentials;
use crate::constants::{DEDUP_COLUMN, EVENTS_TABLE};
use crate::error::Result;
use crate::infra::http_client::{build_client, ensure_success};
use crate::types::EventRow;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashSet;
use tracing::debug;

const PAGE_SIZE: usize = 1000;

/// Events table behind Supabase's PostgREST endpoint, authenticated with the
/// service role key.
pub struct SupabaseEventStore {
    client: reqwest::Client,
    base_url: String,
    service_key: String,
}

#[derive(Deserialize)]
struct OfficialUrlRow {
    official_url: Option<String>,
}

impl SupabaseEventStore {
    pub fn new(base_url: impl Into<String>, service_key: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: build_client()?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            service_key: service_key.into(),
        })
    }

    pub fn from_credentials(credentials: &Credentials) -> Result<Self> {
        Self::new(&credentials.supabase_url, &credentials.supabase_service_key)
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, EVENTS_TABLE)
    }

    fn authorized(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.header("apikey", &self.service_key)
            .header("Authorization", format!("Bearer {}", self.service_key))
    }
}

#[async_trait]
impl EventStore for SupabaseEventStore {
    async fn existing_urls(&self) -> Result<HashSet<String>> {
        let mut urls = HashSet::new();
        let mut offset = 0usize;

        // PostgREST caps each response, so page until a short page comes back
        loop {
            let resp = self
                .authorized(self.client.get(self.table_url()))
                .query(&[
                    ("select", DEDUP_COLUMN.to_string()),
                    ("order", "id.asc".to_string()),
                    ("limit", PAGE_SIZE.to_string()),
                    ("offset", offset.to_string()),
                ])
                .send()
                .await?;
            let resp = ensure_success(resp, "Supabase select").await?;
            let rows: Vec<OfficialUrlRow> = resp.json().await?;

            let page_len = rows.len();
            urls.extend(rows.into_iter().filter_map(|r| r.official_url));
            if page_len < PAGE_SIZE {
                break;
            }
            offset += page_len;
        }

        debug!("Fetched {} official URLs", urls.len());
        Ok(urls)
    }

    async fn insert_event(&self, row: &EventRow) -> Result<()> {
        let resp = self
            .authorized(self.client.post(self.table_url()))
            .header("Prefer", "return=minimal")
            .json(row)
            .send()
            .await?;
        ensure_success(resp, "Supabase insert").await?;
        Ok(())
    }
}
