//! Schema-constrained extractor.

use std::sync::Arc;

use projfill_core::schema::extraction_schema;
use projfill_core::{CanonicalRecord, ErrorKind, ExtractedRecord, SchemaViolation};
use thiserror::Error;
use tracing::{error, info};

use crate::capability::{CapabilityError, SearchContext, StructuredGenerator, StructuredRequest};
use crate::prompt;

pub const SCHEMA_NAME: &str = "project_fields";

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Structured generation failed. Please try again later.")]
    Upstream(#[source] CapabilityError),
    #[error("Model output did not contain structured data.")]
    NoStructuredOutput,
    #[error("Model output did not match the schema: {0}")]
    SchemaMismatch(#[from] SchemaViolation),
}

impl ExtractionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExtractionError::Upstream(_) => ErrorKind::UpstreamUnavailable,
            ExtractionError::NoStructuredOutput | ExtractionError::SchemaMismatch(_) => {
                ErrorKind::ExtractionIncomplete
            }
        }
    }
}

/// Drives one [`StructuredGenerator`] with the fixed extraction schema.
#[derive(Clone)]
pub struct Extractor {
    generator: Arc<dyn StructuredGenerator>,
}

impl Extractor {
    pub fn new(generator: Arc<dyn StructuredGenerator>) -> Self {
        Self { generator }
    }

    pub async fn extract(
        &self,
        project_name: &str,
        grounding_urls: &[String],
    ) -> Result<ExtractedRecord, ExtractionError> {
        self.run(project_name, grounding_urls, None).await
    }

    /// Like [`Extractor::extract`], but also offers the provider's founders,
    /// founding date and whitepaper as candidates to corroborate.
    pub async fn extract_with_hints(
        &self,
        project_name: &str,
        grounding_urls: &[String],
        hints: &CanonicalRecord,
    ) -> Result<ExtractedRecord, ExtractionError> {
        self.run(project_name, grounding_urls, Some(hints)).await
    }

    pub fn request(
        project_name: &str,
        grounding_urls: &[String],
        hints: Option<&CanonicalRecord>,
    ) -> StructuredRequest {
        StructuredRequest {
            system: prompt::system_instruction(),
            prompt: prompt::user_prompt(project_name, grounding_urls, hints),
            schema_name: SCHEMA_NAME,
            schema: extraction_schema(),
            search_context: SearchContext::High,
            require_search: true,
        }
    }

    async fn run(
        &self,
        project_name: &str,
        grounding_urls: &[String],
        hints: Option<&CanonicalRecord>,
    ) -> Result<ExtractedRecord, ExtractionError> {
        let request = Self::request(project_name, grounding_urls, hints);
        info!(
            project = %project_name,
            domains = grounding_urls.len(),
            "running structured extraction"
        );

        let output = self.generator.generate(&request).await.map_err(|e| {
            error!(error = %e, "structured generation failed");
            ExtractionError::Upstream(e)
        })?;
        let Some(value) = output else {
            error!("model returned no structured output");
            return Err(ExtractionError::NoStructuredOutput);
        };

        let record = ExtractedRecord::from_value(value).map_err(|violation| {
            error!(error = %violation, "model output rejected at schema boundary");
            ExtractionError::SchemaMismatch(violation)
        })?;
        info!(
            categories = record.categories.len(),
            founders = record.founders.len(),
            "extraction complete"
        );
        Ok(record)
    }
}
