//! RootData project-data provider.
//!
//! Every call here is best-effort enrichment: a missing key, a failed request
//! or an unexpected body all degrade to an empty result with a warning.

use projfill_core::config::ProviderSettings;
use projfill_core::{CanonicalRecord, Founder, SearchHit};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, info, warn};

const API_KEY_HEADER: &str = "apikey";
const LANGUAGE_HEADER: &str = "language";
const LANGUAGE: &str = "en";

/// Search hit type for projects; other types (people, VCs) are dropped.
const PROJECT_HIT_TYPE: u64 = 1;

#[derive(Error, Debug)]
enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("provider returned {status}: {body}")]
    Server { status: u16, body: String },
    #[error("response has no data field")]
    NoData,
}

pub struct RootDataClient {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
}

impl RootDataClient {
    pub fn new(settings: &ProviderSettings) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(settings.timeout).build()?;
        Ok(Self {
            client,
            api_key: settings.api_key.clone(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Fetch the provider's record for `project_id`.
    ///
    /// Returns an empty record without touching the network when no API key
    /// is configured or the id is zero.
    pub async fn fetch(&self, project_id: u64) -> CanonicalRecord {
        let Some(api_key) = self.api_key.as_deref() else {
            warn!(project_id, "RootData API key not configured; skipping fetch");
            return CanonicalRecord::default();
        };
        if project_id == 0 {
            debug!("project id is zero; skipping fetch");
            return CanonicalRecord::default();
        }

        let body = json!({ "project_id": project_id, "include_investors": true });
        match self.post(api_key, "get_item", &body).await {
            Ok(detail) if detail.is_object() => {
                let record = map_detail(project_id, &detail);
                info!(project_id, name = ?record.name, "fetched RootData project");
                record
            }
            Ok(_) => {
                warn!(project_id, "RootData detail is not an object");
                CanonicalRecord::default()
            }
            Err(e) => {
                warn!(project_id, error = %e, "RootData fetch failed");
                CanonicalRecord::default()
            }
        }
    }

    /// Keyword search. Provider order is the rank.
    pub async fn search(&self, query: &str) -> Vec<SearchHit> {
        let Some(api_key) = self.api_key.as_deref() else {
            warn!("RootData API key not configured; skipping search");
            return Vec::new();
        };

        match self.post(api_key, "ser_inv", &json!({ "query": query })).await {
            Ok(Value::Array(items)) => {
                let hits: Vec<SearchHit> = items.iter().filter_map(map_hit).collect();
                info!(query = %query, count = hits.len(), "RootData search complete");
                hits
            }
            Ok(_) => {
                warn!(query = %query, "RootData search data is not a list");
                Vec::new()
            }
            Err(e) => {
                warn!(query = %query, error = %e, "RootData search failed");
                Vec::new()
            }
        }
    }

    /// POST to `{base}/{endpoint}` and return the body's `data` field.
    async fn post(&self, api_key: &str, endpoint: &str, body: &Value) -> Result<Value, ProviderError> {
        let url = format!("{}/{endpoint}", self.base_url);
        debug!(url = %url, "calling RootData");
        let resp = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, api_key)
            .header(LANGUAGE_HEADER, LANGUAGE)
            .json(body)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Server {
                status: status.as_u16(),
                body,
            });
        }
        let mut value: Value = resp.json().await?;
        match value.get_mut("data").map(Value::take) {
            Some(Value::Null) | None => Err(ProviderError::NoData),
            Some(data) => Ok(data),
        }
    }
}

// Each field is read on its own so one odd value never discards the rest.
fn map_detail(project_id: u64, detail: &Value) -> CanonicalRecord {
    CanonicalRecord {
        project_id: Some(project_id),
        name: text(detail, "project_name"),
        tagline: text(detail, "one_liner"),
        logo_url: text(detail, "logo"),
        description: text(detail, "description"),
        website: detail.get("social_media").and_then(|s| text(s, "website")),
        provider_url: text(detail, "rootdataurl"),
        tags: detail
            .get("tags")
            .and_then(Value::as_array)
            .map(|tags| {
                tags.iter()
                    .filter_map(Value::as_str)
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
        has_funding: Some(
            detail
                .get("investors")
                .and_then(Value::as_array)
                .is_some_and(|investors| !investors.is_empty()),
        ),
        founders: detail
            .get("team_members")
            .and_then(Value::as_array)
            .map(|members| {
                members
                    .iter()
                    .filter_map(|m| {
                        Some(Founder {
                            name: text(m, "name")?,
                            title: text(m, "position").unwrap_or_default(),
                            region: None,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default(),
        date_founded: text(detail, "establishment_date"),
        white_paper: text(detail, "white_paper"),
    }
}

fn map_hit(item: &Value) -> Option<SearchHit> {
    if let Some(kind) = item.get("type").and_then(Value::as_u64)
        && kind != PROJECT_HIT_TYPE
    {
        return None;
    }
    let id = match item.get("id")? {
        Value::Number(n) => n.to_string(),
        Value::String(s) if !s.trim().is_empty() => s.trim().to_string(),
        _ => return None,
    };
    Some(SearchHit {
        id,
        name: text(item, "name")?,
        introduce: text(item, "introduce"),
        logo: text(item, "logo"),
        provider_url: text(item, "rootdataurl"),
    })
}

fn text(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
