use crate::app::ports::SheetSink;
use crate::config::Credentials;
use crate::constants::{GOOGLE_TOKEN_URL, SHEETS_API_BASE, SHEETS_SCOPE, SHEET_HEADERS};
use crate::error::{CrawlerError, Result};
use crate::infra::http_client::{build_client, ensure_success};
use crate::types::{sheet_row, EnrichedEvent};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info};

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const TOKEN_LIFETIME_SECS: i64 = 3600;
/// Refresh this long before the token actually expires
const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;

#[derive(Debug, Serialize)]
struct ServiceAccountClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<i64>,
}

struct AccessToken {
    value: String,
    expires_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetMeta>,
}

#[derive(Deserialize)]
struct SheetMeta {
    properties: SheetProperties,
}

#[derive(Deserialize)]
struct SheetProperties {
    title: String,
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

/// First worksheet of a Google spreadsheet, written through a service account.
///
/// Authentication and header setup happen on first use, not at construction.
pub struct GoogleSheetsSink {
    client: reqwest::Client,
    sheet_id: String,
    service_account_email: String,
    encoding_key: EncodingKey,
    token: Mutex<Option<AccessToken>>,
    worksheet: OnceCell<String>,
}

impl GoogleSheetsSink {
    pub fn from_credentials(credentials: &Credentials) -> Result<Self> {
        let encoding_key = EncodingKey::from_rsa_pem(credentials.google_private_key.as_bytes())
            .map_err(|e| CrawlerError::Auth(format!("invalid service account key: {e}")))?;

        Ok(Self {
            client: build_client()?,
            sheet_id: credentials.google_sheet_id.clone(),
            service_account_email: credentials.google_service_account_email.clone(),
            encoding_key,
            token: Mutex::new(None),
            worksheet: OnceCell::new(),
        })
    }

    fn signed_assertion(&self, now: DateTime<Utc>) -> Result<String> {
        let claims = ServiceAccountClaims {
            iss: &self.service_account_email,
            scope: SHEETS_SCOPE,
            aud: GOOGLE_TOKEN_URL,
            iat: now.timestamp(),
            exp: now.timestamp() + TOKEN_LIFETIME_SECS,
        };
        encode(&Header::new(Algorithm::RS256), &claims, &self.encoding_key)
            .map_err(|e| CrawlerError::Auth(format!("failed to sign assertion: {e}")))
    }

    async fn access_token(&self) -> Result<String> {
        let mut cached = self.token.lock().await;
        let now = Utc::now();
        if let Some(token) = cached.as_ref() {
            if token.expires_at > now {
                return Ok(token.value.clone());
            }
        }

        debug!("Requesting Google access token");
        let assertion = self.signed_assertion(now)?;
        let resp = self
            .client
            .post(GOOGLE_TOKEN_URL)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;
        let resp = ensure_success(resp, "Google token exchange")
            .await
            .map_err(|e| CrawlerError::Auth(e.to_string()))?;
        let token: TokenResponse = resp.json().await?;

        let lifetime = token.expires_in.unwrap_or(TOKEN_LIFETIME_SECS) - TOKEN_REFRESH_MARGIN_SECS;
        let value = token.access_token;
        *cached = Some(AccessToken {
            value: value.clone(),
            expires_at: now + Duration::seconds(lifetime.max(0)),
        });
        Ok(value)
    }

    /// Title of the first worksheet, with the header row written if it is missing
    async fn worksheet(&self) -> Result<&String> {
        self.worksheet
            .get_or_try_init(|| async {
                let title = self.first_sheet_title().await?;
                self.ensure_header_row(&title).await?;
                Ok::<_, CrawlerError>(title)
            })
            .await
    }

    async fn first_sheet_title(&self) -> Result<String> {
        let token = self.access_token().await?;
        let resp = self
            .client
            .get(format!("{}/{}", SHEETS_API_BASE, self.sheet_id))
            .bearer_auth(token)
            .query(&[("fields", "sheets.properties.title")])
            .send()
            .await?;
        let meta: SpreadsheetMeta = ensure_success(resp, "Sheets metadata").await?.json().await?;
        meta.sheets
            .into_iter()
            .next()
            .map(|s| s.properties.title)
            .ok_or_else(|| CrawlerError::Api {
                message: format!("spreadsheet {} has no worksheets", self.sheet_id),
            })
    }

    async fn ensure_header_row(&self, title: &str) -> Result<()> {
        let token = self.access_token().await?;
        let header_range = format!("'{}'!1:1", title);
        let resp = self
            .client
            .get(self.values_url(&header_range))
            .bearer_auth(&token)
            .send()
            .await?;
        let existing: ValueRange = ensure_success(resp, "Sheets header read").await?.json().await?;
        if existing.values.first().map_or(false, |row| !row.is_empty()) {
            return Ok(());
        }

        info!("Writing header row to worksheet '{}'", title);
        let resp = self
            .client
            .put(self.values_url(&format!("'{}'!A1", title)))
            .bearer_auth(&token)
            .query(&[("valueInputOption", "RAW")])
            .json(&json!({ "values": [SHEET_HEADERS] }))
            .send()
            .await?;
        ensure_success(resp, "Sheets header write").await?;
        Ok(())
    }

    fn values_url(&self, range: &str) -> String {
        format!("{}/{}/values/{}", SHEETS_API_BASE, self.sheet_id, range)
    }
}

#[async_trait]
impl SheetSink for GoogleSheetsSink {
    async fn append_event(&self, event: &EnrichedEvent, crawled_at: DateTime<Utc>) -> Result<()> {
        let title = self.worksheet().await?;
        let token = self.access_token().await?;

        let resp = self
            .client
            .post(format!("{}:append", self.values_url(&format!("'{}'!A1", title))))
            .bearer_auth(token)
            .query(&[("valueInputOption", "RAW"), ("insertDataOption", "INSERT_ROWS")])
            .json(&json!({ "values": [sheet_row(event, crawled_at)] }))
            .send()
            .await?;
        ensure_success(resp, "Sheets append").await?;
        Ok(())
    }
}
