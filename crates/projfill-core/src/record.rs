//! Records shared between the provider, extractor, and registry layers.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Website {
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Founder {
    pub name: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmartContract {
    pub id: String,
    pub chain: String,
    pub addresses: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub key: String,
    pub value: String,
}

/// Best-known facts about a project from the external provider.
///
/// A narrow read-only view of the provider's detail response: every field is
/// optional and an all-empty record means "no data available", never an
/// error. `founders`, `date_founded`, and `white_paper` are unvalidated
/// candidates for the extractor to corroborate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CanonicalRecord {
    pub project_id: Option<u64>,
    pub name: Option<String>,
    pub tagline: Option<String>,
    pub logo_url: Option<String>,
    #[serde(rename = "mainDescription")]
    pub description: Option<String>,
    pub website: Option<String>,
    #[serde(rename = "rootdataurl")]
    pub provider_url: Option<String>,
    pub tags: Vec<String>,
    #[serde(rename = "fundingStatus")]
    pub has_funding: Option<bool>,
    pub founders: Vec<Founder>,
    pub date_founded: Option<String>,
    pub white_paper: Option<String>,
}

impl CanonicalRecord {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Website and provider URLs in the order the extractor should trust them.
    pub fn candidate_urls(&self) -> Vec<&str> {
        [self.website.as_deref(), self.provider_url.as_deref()]
            .into_iter()
            .flatten()
            .collect()
    }
}

/// One ranked entry from a provider keyword search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub id: String,
    pub name: String,
    pub introduce: Option<String>,
    pub logo: Option<String>,
    #[serde(rename = "rootdataurl")]
    pub provider_url: Option<String>,
}
