//! The AI capability seam.
//!
//! A [`StructuredGenerator`] takes a system instruction, a user prompt, a JSON
//! schema and a web-search tool, and returns an object that claims to match the
//! schema, or nothing at all. The extractor never trusts that claim; it
//! re-validates at the boundary.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// How much retrieved context the search tool may feed the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchContext {
    Low,
    Medium,
    High,
}

impl SearchContext {
    pub fn as_str(self) -> &'static str {
        match self {
            SearchContext::Low => "low",
            SearchContext::Medium => "medium",
            SearchContext::High => "high",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructuredRequest {
    pub system: String,
    pub prompt: String,
    /// Name the schema is registered under with the provider.
    pub schema_name: &'static str,
    pub schema: Value,
    pub search_context: SearchContext,
    /// When set, the provider must call the web-search tool before answering.
    pub require_search: bool,
}

#[derive(Error, Debug)]
pub enum CapabilityError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("provider returned {status}: {body}")]
    Server { status: u16, body: String },
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

#[async_trait]
pub trait StructuredGenerator: Send + Sync {
    /// Run one schema-constrained generation.
    ///
    /// `Ok(None)` means the call succeeded but the model produced no output.
    /// Output that is not JSON comes back as a string value for the caller's
    /// schema check to reject. Transport and provider failures are `Err`.
    async fn generate(&self, request: &StructuredRequest) -> Result<Option<Value>, CapabilityError>;
}
