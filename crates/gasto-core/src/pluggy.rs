//! Pluggy bank-aggregation API client
//!
//! Only the fields the ingestion path needs are deserialized; everything
//! else in Pluggy's payloads is ignored.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::settings::PluggySettings;

/// An account as reported by Pluggy
#[derive(Debug, Clone, Deserialize)]
pub struct PluggyAccount {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type", default)]
    pub account_type: Option<String>,
    #[serde(default)]
    pub balance: Option<Decimal>,
}

impl PluggyAccount {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Unknown")
    }

    pub fn kind(&self) -> &str {
        self.account_type.as_deref().unwrap_or("OTHER")
    }
}

/// A transaction as reported by Pluggy
#[derive(Debug, Clone, Deserialize)]
pub struct PluggyTransaction {
    pub id: String,
    pub amount: Decimal,
    #[serde(default)]
    pub description: String,
    /// ISO-8601 timestamp, parsed with [`parse_pluggy_date`]
    pub date: String,
}

#[derive(Debug, Deserialize)]
struct AccountsResponse {
    #[serde(default)]
    results: Vec<PluggyAccount>,
}

#[derive(Debug, Deserialize)]
struct TransactionsResponse {
    #[serde(default, alias = "results")]
    transactions: Vec<PluggyTransaction>,
}

/// Parse the date formats Pluggy emits into a naive UTC timestamp
///
/// Accepts RFC 3339 (`2024-03-15T10:30:00.000Z`), offset-less datetimes and
/// bare dates.
pub fn parse_pluggy_date(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt);
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// HTTP client for the Pluggy API
#[derive(Clone)]
pub struct PluggyClient {
    http_client: Client,
    base_url: String,
    api_key: String,
}

impl PluggyClient {
    pub fn new(settings: &PluggySettings, api_key: &str) -> Result<Self> {
        let http_client = Client::builder().timeout(settings.timeout()).build()?;
        Ok(Self {
            http_client,
            base_url: settings.base_url.trim().trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    /// Build a client when `PLUGGY_API_KEY` was configured
    pub fn from_settings(settings: &PluggySettings) -> Result<Option<Self>> {
        settings
            .api_key
            .as_deref()
            .map(|key| Self::new(settings, key))
            .transpose()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "Pluggy request");

        let response = self
            .http_client
            .get(&url)
            .header("X-API-KEY", &self.api_key)
            .query(query)
            .send()
            .await
            .map_err(|e| Error::Pluggy(format!("Request to {} failed: {}", path, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Pluggy(format!("{} returned {}: {}", path, status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| Error::Pluggy(format!("Malformed response from {}: {}", path, e)))
    }

    /// Accounts belonging to a connected item
    pub async fn get_accounts(&self, item_id: &str) -> Result<Vec<PluggyAccount>> {
        let response: AccountsResponse = self
            .get("/accounts", &[("itemId", item_id.to_string())])
            .await?;
        Ok(response.results)
    }

    /// Transactions of an account between two dates (inclusive)
    pub async fn get_transactions(
        &self,
        account_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<PluggyTransaction>> {
        let response: TransactionsResponse = self
            .get(
                "/transactions",
                &[
                    ("accountId", account_id.to_string()),
                    ("from", from.to_string()),
                    ("to", to.to_string()),
                ],
            )
            .await?;
        Ok(response.transactions)
    }
}
