//! OpenAI Responses API as a [`StructuredGenerator`].

use std::time::Duration;

use async_trait::async_trait;
use projfill_core::config::ExtractionSettings;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::capability::{CapabilityError, StructuredGenerator, StructuredRequest};

pub struct OpenAiResponses {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiResponses {
    pub fn new(settings: &ExtractionSettings, timeout: Duration) -> Result<Self, CapabilityError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn body(&self, request: &StructuredRequest) -> Value {
        let tool_choice = if request.require_search {
            json!({ "type": "web_search" })
        } else {
            json!("auto")
        };
        json!({
            "model": self.model,
            "instructions": request.system,
            "input": request.prompt,
            "tools": [{
                "type": "web_search",
                "search_context_size": request.search_context.as_str(),
            }],
            "tool_choice": tool_choice,
            "text": {
                "format": {
                    "type": "json_schema",
                    "name": request.schema_name,
                    "schema": request.schema,
                    "strict": true,
                }
            }
        })
    }
}

#[async_trait]
impl StructuredGenerator for OpenAiResponses {
    async fn generate(&self, request: &StructuredRequest) -> Result<Option<Value>, CapabilityError> {
        let url = format!("{}/responses", self.base_url);
        info!(url = %url, model = %self.model, "requesting structured response");

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.body(request))
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(CapabilityError::Server {
                status: status.as_u16(),
                body,
            });
        }

        let value: Value = resp.json().await?;
        let text = output_text(&value);
        if text.trim().is_empty() {
            debug!("response carried no output_text");
            return Ok(None);
        }
        // Unparseable text is still output; the schema boundary rejects it.
        match serde_json::from_str::<Value>(&text) {
            Ok(parsed) => Ok(Some(parsed)),
            Err(e) => {
                warn!(error = %e, "output_text is not JSON");
                Ok(Some(Value::String(text)))
            }
        }
    }
}

/// Concatenate every `output_text` part of every message in a Responses
/// API result. Tool-call items are skipped.
pub fn output_text(response: &Value) -> String {
    let Some(items) = response.get("output").and_then(Value::as_array) else {
        return String::new();
    };
    items
        .iter()
        .filter_map(|item| item.get("content").and_then(Value::as_array))
        .flatten()
        .filter(|part| part.get("type").and_then(Value::as_str) == Some("output_text"))
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect()
}
