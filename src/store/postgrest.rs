//! Supabase/PostgREST gateway for the `user_chart_data` table.
//!
//! Uses reqwest with the project's anon key sent both as `apikey` and as a
//! Bearer token. Single-row reads ask for an object response, so a missing
//! row comes back as HTTP 406 with code `PGRST116` rather than an empty array.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{HeaderValue, ACCEPT};
use reqwest::{StatusCode, Url};
use serde::Deserialize;

use super::{ChartStore, StoreError};
use crate::config::StoreSettings;
use crate::identity::Identity;
use crate::types::{ChartData, StoredRecord};

/// PostgREST code for "JSON object requested, multiple (or no) rows returned".
const NO_ROWS_CODE: &str = "PGRST116";
const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";
const UPSERT_PREFER: &str = "resolution=merge-duplicates,return=minimal";

#[derive(Debug, Deserialize)]
struct PostgrestErrorBody {
    code: Option<String>,
    message: Option<String>,
    details: Option<String>,
}

pub struct PostgrestStore {
    http: reqwest::Client,
    base_url: Url,
    anon_key: String,
    table: String,
}

impl PostgrestStore {
    pub fn new(settings: &StoreSettings) -> Result<Self, StoreError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("callboard/", env!("CARGO_PKG_VERSION")))
            .timeout(settings.request_timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: settings.url.clone(),
            anon_key: settings.anon_key.clone(),
            table: settings.table.clone(),
        })
    }

    fn table_url(&self) -> Result<Url, StoreError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(["rest", "v1", self.table.as_str()]);
        url.set_query(None);
        Ok(url)
    }

    fn select_url(&self, columns: &str, key: &Identity) -> Result<Url, StoreError> {
        let mut url = self.table_url()?;
        url.query_pairs_mut()
            .append_pair("select", columns)
            .append_pair("email", &format!("eq.{}", key));
        Ok(url)
    }

    fn upsert_url(&self) -> Result<Url, StoreError> {
        let mut url = self.table_url()?;
        url.query_pairs_mut().append_pair("on_conflict", "email");
        Ok(url)
    }

    fn authed(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("apikey", self.anon_key.as_str())
            .bearer_auth(&self.anon_key)
    }

    async fn select_single(
        &self,
        columns: &str,
        key: &Identity,
    ) -> Result<Option<serde_json::Value>, StoreError> {
        let url = self.select_url(columns, key)?;
        let resp = self
            .authed(self.http.get(url))
            .header(ACCEPT, HeaderValue::from_static(SINGLE_OBJECT))
            .send()
            .await?;
        let status = resp.status();
        let body = resp.text().await?;
        classify_single(status, &body)
    }
}

/// Map a single-object response onto present / absent / error.
fn classify_single(status: StatusCode, body: &str) -> Result<Option<serde_json::Value>, StoreError> {
    if status.is_success() {
        return Ok(Some(serde_json::from_str(body)?));
    }

    match serde_json::from_str::<PostgrestErrorBody>(body) {
        Ok(err) if err.code.as_deref() == Some(NO_ROWS_CODE) => Ok(None),
        Ok(err) => Err(StoreError::Api {
            status: status.as_u16(),
            message: match (err.message, err.details) {
                (Some(m), Some(d)) => format!("{} ({})", m, d),
                (Some(m), None) => m,
                _ => body.to_string(),
            },
        }),
        Err(_) => Err(StoreError::Api {
            status: status.as_u16(),
            message: body.to_string(),
        }),
    }
}

/// Error for a rejected upsert. An unreadable body falls back to the status text.
fn failed_upsert<E: std::fmt::Display>(status: StatusCode, body: Result<String, E>) -> StoreError {
    let message = match body {
        Ok(text) => text,
        Err(e) => {
            log::warn!("Could not read upsert error body ({}): {}", status, e);
            status
                .canonical_reason()
                .unwrap_or("Upsert failed")
                .to_string()
        }
    };
    StoreError::Api {
        status: status.as_u16(),
        message,
    }
}

fn chart_values_from_row(row: serde_json::Value) -> Result<Option<ChartData>, StoreError> {
    match row.get("chart_values") {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(values) => {
            let data: ChartData = serde_json::from_value(values.clone())?;
            data.validate().map_err(StoreError::Invalid)?;
            Ok(Some(data))
        }
    }
}

#[async_trait]
impl ChartStore for PostgrestStore {
    async fn fetch(&self, key: &Identity) -> Result<Option<ChartData>, StoreError> {
        match self.select_single("chart_values", key).await? {
            Some(row) => chart_values_from_row(row),
            None => Ok(None),
        }
    }

    async fn exists(&self, key: &Identity) -> Result<bool, StoreError> {
        Ok(self.select_single("email", key).await?.is_some())
    }

    async fn upsert(&self, key: &Identity, value: &ChartData) -> Result<(), StoreError> {
        let row = StoredRecord {
            email: key.as_str().to_string(),
            chart_values: value.clone(),
            updated_at: Some(Utc::now()),
        };
        let resp = self
            .authed(self.http.post(self.upsert_url()?))
            .header("Prefer", UPSERT_PREFER)
            .json(&row)
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            log::debug!("Upserted chart data for {} ({})", key, status);
            return Ok(());
        }
        Err(failed_upsert(status, resp.text().await))
    }
}
