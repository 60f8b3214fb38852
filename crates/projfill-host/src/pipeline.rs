//! The four user-triggered operations, each run to completion in order.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use projfill_ai::prompt::{grounding_urls, project_label};
use projfill_ai::{CapabilityError, ExtractionError, Extractor, OpenAiResponses, StructuredGenerator};
use projfill_core::{
    CandidateEdits, ConfigError, ErrorKind, MergedCandidate, SearchHit, Settings,
    ValidationFailure, build_payload, reconcile,
};
use projfill_sync::{CreatedProject, PensieveClient, RegistryError, RootDataClient};
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("{0}")]
    Input(String),
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    #[error("Structured generation did not finish within {}s.", .0.as_secs())]
    ExtractionTimeout(Duration),
    #[error("AI capability could not be initialised: {0}")]
    Capability(#[from] CapabilityError),
    #[error("RootData client could not be initialised: {0}")]
    Provider(#[source] reqwest::Error),
    #[error(transparent)]
    Validation(#[from] ValidationFailure),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl PipelineError {
    pub fn input(message: impl Into<String>) -> Self {
        PipelineError::Input(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Config(e) => e.kind(),
            PipelineError::Provider(_) => ErrorKind::ConfigurationMissing,
            PipelineError::Input(_) => ErrorKind::InputInvalid,
            PipelineError::Extraction(e) => e.kind(),
            PipelineError::ExtractionTimeout(_) | PipelineError::Capability(_) => {
                ErrorKind::UpstreamUnavailable
            }
            PipelineError::Validation(e) => e.kind(),
            PipelineError::Registry(e) => e.kind(),
        }
    }
}

pub struct Pipeline {
    settings: Settings,
    provider: RootDataClient,
    extractor: Option<Extractor>,
}

impl Pipeline {
    /// Wire the pipeline to the real providers. Extraction stays disabled
    /// (and `fill` fails with a configuration error) when no OpenAI key is set.
    pub fn from_settings(settings: Settings) -> Result<Self, PipelineError> {
        let generator: Option<Arc<dyn StructuredGenerator>> = match settings.require_extraction() {
            Ok(extraction) => Some(Arc::new(OpenAiResponses::new(
                &extraction,
                settings.extraction_timeout,
            )?)),
            Err(e) => {
                warn!(error = %e, "structured extraction disabled");
                None
            }
        };
        Self::new(settings, generator)
    }

    pub fn new(
        settings: Settings,
        generator: Option<Arc<dyn StructuredGenerator>>,
    ) -> Result<Self, PipelineError> {
        let provider = RootDataClient::new(&settings.provider()).map_err(PipelineError::Provider)?;
        Ok(Self {
            provider,
            extractor: generator.map(Extractor::new),
            settings,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Keyword search against the provider. Degrades to an empty list.
    pub async fn search(&self, query: &str) -> Result<Vec<SearchHit>, PipelineError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(PipelineError::input("Invalid parameter format. Verify q."));
        }
        Ok(self.provider.search(query).await)
    }

    /// Fetch, extract, reconcile.
    pub async fn fill(&self, project_id: u64) -> Result<MergedCandidate, PipelineError> {
        if project_id == 0 {
            return Err(PipelineError::input("projectId must not be empty."));
        }
        let extractor = self.extractor()?;

        let canonical = self.provider.fetch(project_id).await;
        if canonical.is_empty() {
            warn!(project_id, "no provider data; extraction runs without grounding URLs");
        }
        let urls = grounding_urls(&canonical);
        let name = project_label(&canonical, project_id);
        info!(project_id, name = %name, domains = urls.len(), "filling project");

        let limit = self.settings.extraction_timeout;
        let extracted = tokio::time::timeout(limit, extractor.extract_with_hints(&name, &urls, &canonical))
            .await
            .map_err(|_| {
                error!(project_id, timeout_secs = limit.as_secs(), "extraction timed out");
                PipelineError::ExtractionTimeout(limit)
            })??;

        let merged = reconcile(&canonical, &extracted);
        info!(project_id, categories = merged.categories.len(), "candidate ready");
        Ok(merged)
    }

    pub async fn check_name(&self, name: &str) -> Result<bool, PipelineError> {
        let registry = self.registry()?;
        let name = name.trim();
        if name.is_empty() {
            return Err(PipelineError::input("Project name cannot be empty"));
        }
        Ok(registry.check_name_exists(name).await?)
    }

    /// Validate edits against the candidate they came from, then submit.
    pub async fn submit(
        &self,
        edits: &CandidateEdits,
        candidate: &MergedCandidate,
    ) -> Result<CreatedProject, PipelineError> {
        let registry = self.registry()?;
        let payload = build_payload(edits, candidate).inspect_err(|failure| {
            warn!(field = failure.field, reason = %failure.reason, "submission rejected locally");
        })?;
        Ok(registry.submit(&payload).await?)
    }

    /// [`Pipeline::submit`], abandoned with a cancellation error once
    /// `cancel` resolves.
    pub async fn submit_with_cancel<C>(
        &self,
        edits: &CandidateEdits,
        candidate: &MergedCandidate,
        cancel: C,
    ) -> Result<CreatedProject, PipelineError>
    where
        C: Future<Output = ()>,
    {
        let registry = self.registry()?;
        let payload = build_payload(edits, candidate)?;
        Ok(registry.submit_with_cancel(&payload, cancel).await?)
    }

    fn extractor(&self) -> Result<&Extractor, PipelineError> {
        match &self.extractor {
            Some(extractor) => Ok(extractor),
            None => Err(ConfigError::Missing(vec!["OPENAI_API_KEY"]).into()),
        }
    }

    // Loaded per call so a missing registry config fails before any I/O.
    fn registry(&self) -> Result<PensieveClient, PipelineError> {
        let settings = self.settings.require_registry()?;
        Ok(PensieveClient::new(&settings)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use projfill_ai::StructuredRequest;
    use serde_json::{Value, json};

    struct Never;

    #[async_trait]
    impl StructuredGenerator for Never {
        async fn generate(&self, _: &StructuredRequest) -> Result<Option<Value>, CapabilityError> {
            std::future::pending().await
        }
    }

    struct Canned(Value);

    #[async_trait]
    impl StructuredGenerator for Canned {
        async fn generate(&self, _: &StructuredRequest) -> Result<Option<Value>, CapabilityError> {
            Ok(Some(self.0.clone()))
        }
    }

    fn extracted() -> Value {
        json!({
            "categories": ["Developer tools"],
            "dateFounded": "2020-01-01T00:00:00Z",
            "dateLaunch": null,
            "devStatus": "Alpha",
            "orgStructure": "DAO",
            "openSource": true,
            "publicGoods": true,
            "founders": [{"name": "Grace", "title": "Founder"}],
            "codeRepo": null,
            "tokenContract": null,
            "whitePaper": null
        })
    }

    #[tokio::test]
    async fn fill_without_openai_key_is_configuration_missing() {
        let pipeline = Pipeline::new(Settings::default(), None).unwrap();
        let err = pipeline.fill(42).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigurationMissing);
        assert_eq!(
            err.to_string(),
            "Missing required environment variables: OPENAI_API_KEY"
        );
    }

    #[tokio::test]
    async fn fill_rejects_zero_id() {
        let pipeline =
            Pipeline::new(Settings::default(), Some(Arc::new(Canned(extracted())))).unwrap();
        let err = pipeline.fill(0).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InputInvalid);
    }

    #[tokio::test]
    async fn fill_without_provider_key_uses_extraction_only() {
        let pipeline =
            Pipeline::new(Settings::default(), Some(Arc::new(Canned(extracted())))).unwrap();
        let merged = pipeline.fill(42).await.unwrap();
        assert!(merged.name.is_none());
        assert_eq!(merged.founders[0].name, "Grace");
        assert_eq!(merged.open_source, Some(true));
    }

    #[tokio::test]
    async fn fill_enforces_extraction_timeout() {
        let settings = Settings {
            extraction_timeout: Duration::from_millis(20),
            ..Default::default()
        };
        let pipeline = Pipeline::new(settings, Some(Arc::new(Never))).unwrap();
        let err = pipeline.fill(42).await.unwrap_err();
        assert!(matches!(err, PipelineError::ExtractionTimeout(_)));
        assert_eq!(err.kind(), ErrorKind::UpstreamUnavailable);
    }

    #[tokio::test]
    async fn registry_config_is_checked_before_validation() {
        let pipeline = Pipeline::new(Settings::default(), None).unwrap();
        let err = pipeline
            .submit(&CandidateEdits::default(), &MergedCandidate::default())
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Pensieve integration is not configured. Set PENSIEVE_BASE_URL and PENSIEVE_SYSTEM_TOKEN."
        );
    }

    #[tokio::test]
    async fn submit_surfaces_first_validation_failure() {
        let settings = Settings {
            pensieve_base_url: Some("http://127.0.0.1:9".into()),
            pensieve_system_token: Some("tok".into()),
            ..Default::default()
        };
        let pipeline = Pipeline::new(settings, None).unwrap();
        let edits = CandidateEdits {
            name: Some("Acme".into()),
            ..Default::default()
        };
        match pipeline.submit(&edits, &MergedCandidate::default()).await {
            Err(PipelineError::Validation(failure)) => assert_eq!(failure.field, "tagline"),
            other => panic!("expected validation failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn blank_search_and_name_are_input_errors() {
        let settings = Settings {
            pensieve_base_url: Some("http://127.0.0.1:9".into()),
            pensieve_system_token: Some("tok".into()),
            ..Default::default()
        };
        let pipeline = Pipeline::new(settings, None).unwrap();
        assert_eq!(
            pipeline.search("  ").await.unwrap_err().kind(),
            ErrorKind::InputInvalid
        );
        assert_eq!(
            pipeline.check_name(" ").await.unwrap_err().to_string(),
            "Project name cannot be empty"
        );
    }
}
