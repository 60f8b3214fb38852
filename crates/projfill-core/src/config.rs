//! Explicit runtime settings.
//!
//! Settings are loaded once by the binary and handed to each component.
//! Components never read the environment themselves; the `require_*`
//! accessors fail with [`ConfigError`] before any network call is made.

use std::fmt;
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_ROOTDATA_BASE_URL: &str = "https://api.rootdata.com/open";

#[derive(Clone)]
pub struct Settings {
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_base_url: String,
    pub rootdata_api_key: Option<String>,
    pub rootdata_base_url: String,
    pub pensieve_base_url: Option<String>,
    pub pensieve_system_token: Option<String>,
    /// Timeout for provider and registry HTTP calls.
    pub request_timeout: Duration,
    /// Upper bound the caller places around a single extraction.
    pub extraction_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            openai_model: DEFAULT_OPENAI_MODEL.to_string(),
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            rootdata_api_key: None,
            rootdata_base_url: DEFAULT_ROOTDATA_BASE_URL.to_string(),
            pensieve_base_url: None,
            pensieve_system_token: None,
            request_timeout: Duration::from_secs(30),
            extraction_timeout: Duration::from_secs(120),
        }
    }
}

// Secrets never reach log output.
impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("openai_api_key", &redact(&self.openai_api_key))
            .field("openai_model", &self.openai_model)
            .field("openai_base_url", &self.openai_base_url)
            .field("rootdata_api_key", &redact(&self.rootdata_api_key))
            .field("rootdata_base_url", &self.rootdata_base_url)
            .field("pensieve_base_url", &self.pensieve_base_url)
            .field("pensieve_system_token", &redact(&self.pensieve_system_token))
            .field("request_timeout", &self.request_timeout)
            .field("extraction_timeout", &self.extraction_timeout)
            .finish()
    }
}

fn redact(secret: &Option<String>) -> &'static str {
    match secret {
        Some(_) => "<redacted>",
        None => "<unset>",
    }
}

/// Credentials for the AI capability.
#[derive(Clone)]
pub struct ExtractionSettings {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

/// Provider settings. The key is optional: without it every provider call
/// degrades to an empty result.
#[derive(Clone)]
pub struct ProviderSettings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub timeout: Duration,
}

#[derive(Clone)]
pub struct RegistrySettings {
    pub base_url: String,
    pub system_token: String,
    pub timeout: Duration,
}

impl Settings {
    pub fn require_extraction(&self) -> Result<ExtractionSettings, ConfigError> {
        let api_key = present(&self.openai_api_key)
            .ok_or_else(|| ConfigError::Missing(vec!["OPENAI_API_KEY"]))?;
        Ok(ExtractionSettings {
            api_key,
            model: self.openai_model.clone(),
            base_url: self.openai_base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn provider(&self) -> ProviderSettings {
        ProviderSettings {
            api_key: present(&self.rootdata_api_key),
            base_url: self.rootdata_base_url.trim_end_matches('/').to_string(),
            timeout: self.request_timeout,
        }
    }

    pub fn require_registry(&self) -> Result<RegistrySettings, ConfigError> {
        match (
            present(&self.pensieve_base_url),
            present(&self.pensieve_system_token),
        ) {
            (Some(base_url), Some(system_token)) => Ok(RegistrySettings {
                base_url,
                system_token,
                timeout: self.request_timeout,
            }),
            _ => Err(ConfigError::NotConfigured {
                integration: "Pensieve",
                vars: vec!["PENSIEVE_BASE_URL", "PENSIEVE_SYSTEM_TOKEN"],
            }),
        }
    }
}

fn present(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
