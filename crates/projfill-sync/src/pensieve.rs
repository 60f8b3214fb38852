//! Pensieve registry client over tRPC with superjson bodies.

use std::future::Future;

use projfill_core::config::RegistrySettings;
use projfill_core::{ErrorKind, SubmissionPayload, ToWire, Wire};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::superjson;

pub const CREATE_PROJECT_ROUTE: &str = "/api/trpc/project.createProjectViaAI";
pub const CHECK_NAME_ROUTE: &str = "/api/trpc/project.checkProjectName";
pub const SYSTEM_TOKEN_HEADER: &str = "x-ai-system-token";

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("{0}")]
    Configuration(&'static str),
    #[error("Failed to reach Pensieve service: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Pensieve request was cancelled.")]
    Cancelled,
    /// The registry answered with an error envelope or a failing status.
    #[error("{message}")]
    Rejected { message: String, status: Option<u16> },
    #[error("{0}")]
    Decode(String),
}

impl RegistryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RegistryError::Configuration(_) => ErrorKind::ConfigurationMissing,
            RegistryError::Transport(_) => ErrorKind::TransportFailure,
            RegistryError::Cancelled => ErrorKind::Cancelled,
            RegistryError::Rejected { .. } | RegistryError::Decode(_) => {
                ErrorKind::ProtocolFailure
            }
        }
    }
}

/// Normalised result of a project creation.
///
/// `id` and `project_id` are always both set. `proposal_id` is absent when
/// the registry did not send one and `Some(None)` when it sent an empty one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedProject {
    pub id: String,
    pub project_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proposal_id: Option<Option<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

pub struct PensieveClient {
    client: reqwest::Client,
    base_url: String,
    system_token: String,
}

impl PensieveClient {
    /// Build a client. The base URL loses any trailing slash.
    pub fn new(settings: &RegistrySettings) -> Result<Self, RegistryError> {
        if settings.base_url.trim().is_empty() {
            return Err(RegistryError::Configuration("baseUrl is required"));
        }
        if settings.system_token.trim().is_empty() {
            return Err(RegistryError::Configuration("x-ai-system-token is required"));
        }
        let client = reqwest::Client::builder().timeout(settings.timeout).build()?;
        Ok(Self {
            client,
            base_url: settings.base_url.trim().trim_end_matches('/').to_string(),
            system_token: settings.system_token.clone(),
        })
    }

    pub async fn submit(&self, payload: &SubmissionPayload) -> Result<CreatedProject, RegistryError> {
        let url = format!("{}{CREATE_PROJECT_ROUTE}", self.base_url);
        let body = superjson::to_string(&payload.to_wire());

        info!(url = %url, name = %payload.name(), "submitting project to Pensieve");
        let resp = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(SYSTEM_TOKEN_HEADER, &self.system_token)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Pensieve network error");
                RegistryError::Transport(e)
            })?;

        let data = read_envelope(resp).await?;
        let created = normalize_created(data.to_plain_json())?;
        info!(id = %created.id, "Pensieve accepted project");
        Ok(created)
    }

    /// [`PensieveClient::submit`], abandoned as soon as `cancel` resolves.
    ///
    /// Dropping the in-flight request aborts it; the outcome is
    /// [`RegistryError::Cancelled`], never a transport failure.
    pub async fn submit_with_cancel<C>(
        &self,
        payload: &SubmissionPayload,
        cancel: C,
    ) -> Result<CreatedProject, RegistryError>
    where
        C: Future<Output = ()>,
    {
        tokio::select! {
            biased;
            () = cancel => {
                warn!("Pensieve submission cancelled");
                Err(RegistryError::Cancelled)
            }
            result = self.submit(payload) => result,
        }
    }

    pub async fn check_name_exists(&self, name: &str) -> Result<bool, RegistryError> {
        let url = format!("{}{CHECK_NAME_ROUTE}", self.base_url);
        let input = superjson::to_string(&Wire::object([("name", name.to_wire())]));

        info!(url = %url, name = %name, "checking project name with Pensieve");
        let resp = self
            .client
            .get(&url)
            .header(SYSTEM_TOKEN_HEADER, &self.system_token)
            .query(&[("input", input)])
            .send()
            .await?;

        match read_envelope(resp).await? {
            Wire::Bool(exists) => Ok(exists),
            result @ Wire::Object(_) => match result.get("exists") {
                Some(Wire::Bool(exists)) => Ok(*exists),
                _ => Err(RegistryError::Decode(
                    "Pensieve response is missing the exists field.".into(),
                )),
            },
            _ => Err(RegistryError::Decode(
                "Pensieve name check returned an unexpected result.".into(),
            )),
        }
    }
}

/// Decode a tRPC response into the value under `result.data`.
async fn read_envelope(resp: reqwest::Response) -> Result<Wire, RegistryError> {
    let status = resp.status();
    let text = resp.text().await?;
    let body: Option<Value> = serde_json::from_str(&text).ok();

    if let Some(message) = body.as_ref().and_then(error_message) {
        let status = body
            .as_ref()
            .and_then(|b| error_body(b)?.pointer("/data/httpStatus")?.as_u64())
            .and_then(|s| u16::try_from(s).ok())
            .or(Some(status.as_u16()));
        error!(status = ?status, message = %message, "Pensieve rejected request");
        return Err(RegistryError::Rejected { message, status });
    }
    if !status.is_success() {
        error!(status = status.as_u16(), "Pensieve returned failing status");
        return Err(RegistryError::Rejected {
            message: format!("Pensieve HTTP status {}", status.as_u16()),
            status: Some(status.as_u16()),
        });
    }

    let body = body.ok_or_else(|| RegistryError::Decode("Pensieve returned a non-JSON response.".into()))?;
    let data = body
        .pointer("/result/data")
        .ok_or_else(|| RegistryError::Decode("Pensieve response did not contain result data.".into()))?;
    superjson::deserialize(data)
        .map_err(|e| RegistryError::Decode(format!("Pensieve response could not be decoded: {e}")))
}

/// The error object of an error envelope, unwrapping a superjson layer if
/// the server applied one.
fn error_body(body: &Value) -> Option<&Value> {
    let error = body.get("error")?;
    match error.get("json") {
        Some(inner) if inner.is_object() => Some(inner),
        _ if error.is_object() => Some(error),
        _ => None,
    }
}

/// Human-readable message for an error envelope, or `None` if `body` is not
/// one. Falls back through message, symbolic code, numeric code and HTTP
/// status before giving up with a generic message.
pub fn error_message(body: &Value) -> Option<String> {
    let error = error_body(body)?;

    if let Some(message) = error.get("message").and_then(Value::as_str)
        && !message.trim().is_empty()
    {
        return Some(message.to_string());
    }
    let code = error.pointer("/data/code").or_else(|| error.get("code"));
    match code {
        Some(Value::String(code)) if !code.trim().is_empty() => return Some(code.clone()),
        Some(Value::Number(code)) => return Some(format!("Pensieve error code {code}")),
        _ => {}
    }
    if let Some(status) = error.pointer("/data/httpStatus").and_then(Value::as_u64) {
        return Some(format!("Pensieve HTTP status {status}"));
    }
    Some("Pensieve returned an unknown error.".to_string())
}

fn normalize_created(data: Value) -> Result<CreatedProject, RegistryError> {
    let Value::Object(mut fields) = data else {
        return Err(RegistryError::Decode(
            "Pensieve response data is not an object.".into(),
        ));
    };

    let id = non_empty(fields.remove("id"));
    let project_id = non_empty(fields.remove("projectId"));
    let proposal = fields.remove("proposalId").map(|p| non_empty(Some(p)));

    let id = id
        .or_else(|| project_id.clone())
        .ok_or_else(|| RegistryError::Decode("Pensieve response is missing the id field.".into()))?;
    Ok(CreatedProject {
        project_id: project_id.unwrap_or_else(|| id.clone()),
        id,
        proposal_id: proposal,
        extra: fields,
    })
}

fn non_empty(value: Option<Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Query;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use projfill_core::{CandidateEdits, MergedCandidate, build_payload};
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn settings(base_url: String) -> RegistrySettings {
        RegistrySettings {
            base_url,
            system_token: "tok".into(),
            timeout: Duration::from_secs(5),
        }
    }

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.expect("serve") });
        format!("http://{addr}")
    }

    fn payload() -> SubmissionPayload {
        let edits: CandidateEdits = serde_json::from_value(json!({
            "name": "Acme",
            "tagline": "Rails for chains",
            "mainDescription": "Longer text",
            "categories": ["Infrastructure"],
            "logoUrl": "https://acme.io/logo.png",
            "websites": [{"title": "Official Website", "url": "https://acme.io"}],
            "dateFounded": "2021-03-01T08:15:30.250Z",
            "dateLaunch": "2022-06-01",
            "devStatus": "Beta",
            "openSource": true,
            "orgStructure": "DAO",
            "publicGoods": false,
            "founders": [{"name": "Ada", "title": "CEO"}]
        }))
        .unwrap();
        build_payload(&edits, &MergedCandidate::default()).unwrap()
    }

    fn reply(status: StatusCode, body: Value) -> Router {
        Router::new().route(
            CREATE_PROJECT_ROUTE,
            post(move || {
                let body = body.clone();
                async move { (status, Json(body)) }
            }),
        )
    }

    #[test]
    fn options_are_validated() {
        let mut s = settings("".into());
        assert_eq!(
            PensieveClient::new(&s).err().unwrap().to_string(),
            "baseUrl is required"
        );
        s.base_url = "https://pensieve.example/".into();
        s.system_token = " ".into();
        assert_eq!(
            PensieveClient::new(&s).err().unwrap().to_string(),
            "x-ai-system-token is required"
        );
        s.system_token = "tok".into();
        let client = PensieveClient::new(&s).unwrap();
        assert_eq!(client.base_url, "https://pensieve.example");
    }

    #[test]
    fn error_message_fallback_chain() {
        let msg = |v: Value| error_message(&v);
        assert_eq!(msg(json!({"error": {"message": "Name taken"}})).as_deref(), Some("Name taken"));
        assert_eq!(msg(json!({"error": {"code": "CONFLICT"}})).as_deref(), Some("CONFLICT"));
        assert_eq!(
            msg(json!({"error": {"message": " ", "data": {"code": "BAD_REQUEST"}, "code": -32600}}))
                .as_deref(),
            Some("BAD_REQUEST")
        );
        assert_eq!(
            msg(json!({"error": {"code": -32603}})).as_deref(),
            Some("Pensieve error code -32603")
        );
        assert_eq!(
            msg(json!({"error": {"data": {"httpStatus": 503}}})).as_deref(),
            Some("Pensieve HTTP status 503")
        );
        assert_eq!(
            msg(json!({"error": {}})).as_deref(),
            Some("Pensieve returned an unknown error.")
        );
        assert_eq!(
            msg(json!({"error": {"json": {"message": "wrapped"}}})).as_deref(),
            Some("wrapped")
        );
        assert_eq!(msg(json!({"result": {}})), None);
    }

    #[test]
    fn created_project_ids_fall_back_to_each_other() {
        let created = normalize_created(json!({"projectId": "p-1", "slug": "acme"})).unwrap();
        assert_eq!(created.id, "p-1");
        assert_eq!(created.project_id, "p-1");
        assert_eq!(created.proposal_id, None);
        assert_eq!(created.extra["slug"], "acme");

        let created = normalize_created(json!({"id": "i-1", "proposalId": ""})).unwrap();
        assert_eq!(created.project_id, "i-1");
        assert_eq!(created.proposal_id, Some(None));
        assert_eq!(
            serde_json::to_value(&created).unwrap(),
            json!({"id": "i-1", "projectId": "i-1", "proposalId": null})
        );

        let err = normalize_created(json!({"name": "x"})).unwrap_err();
        assert_eq!(err.to_string(), "Pensieve response is missing the id field.");
        assert_eq!(err.kind(), ErrorKind::ProtocolFailure);
    }

    #[tokio::test]
    async fn submit_sends_superjson_with_token() {
        let captured: Arc<Mutex<Option<(String, Value)>>> = Arc::default();
        let sink = captured.clone();
        let app = Router::new().route(
            CREATE_PROJECT_ROUTE,
            post(move |headers: HeaderMap, Json(body): Json<Value>| {
                let sink = sink.clone();
                async move {
                    let token = headers[SYSTEM_TOKEN_HEADER].to_str().unwrap().to_string();
                    *sink.lock().unwrap() = Some((token, body));
                    Json(json!({"result": {"data": {"json": {"id": "p-9", "proposalId": "prop-1"}}}}))
                }
            }),
        );
        let base = serve(app).await;
        let client = PensieveClient::new(&settings(base)).unwrap();
        let original = payload();
        let created = client.submit(&original).await.unwrap();
        assert_eq!(created.id, "p-9");
        assert_eq!(created.proposal_id, Some(Some("prop-1".into())));

        let (token, body) = captured.lock().unwrap().clone().unwrap();
        assert_eq!(token, "tok");
        assert_eq!(body["meta"]["values"]["dateFounded"], json!(["Date"]));
        assert_eq!(body["json"]["dateFounded"], "2021-03-01T08:15:30.250Z");

        let decoded = superjson::deserialize(&body).unwrap();
        assert_eq!(decoded.get("dateFounded"), Some(&Wire::Date(original.date_founded())));
        let launch = original.date_launch().map_or(Wire::Null, Wire::Date);
        assert_eq!(decoded.get("dateLaunch"), Some(&launch));
        assert_eq!(decoded.to_plain_json(), original.to_wire().to_plain_json());
    }

    #[tokio::test]
    async fn conflict_code_becomes_message() {
        let base = serve(reply(
            StatusCode::CONFLICT,
            json!({"error": {"code": "CONFLICT"}}),
        ))
        .await;
        let client = PensieveClient::new(&settings(base)).unwrap();
        let err = client.submit(&payload()).await.unwrap_err();
        assert_eq!(err.to_string(), "CONFLICT");
        assert_eq!(err.kind(), ErrorKind::ProtocolFailure);
    }

    #[tokio::test]
    async fn http_status_fallback_message() {
        let base = serve(reply(
            StatusCode::SERVICE_UNAVAILABLE,
            json!({"error": {"data": {"httpStatus": 503}}}),
        ))
        .await;
        let client = PensieveClient::new(&settings(base)).unwrap();
        match client.submit(&payload()).await.unwrap_err() {
            RegistryError::Rejected { message, status } => {
                assert_eq!(message, "Pensieve HTTP status 503");
                assert_eq!(status, Some(503));
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn failing_status_without_envelope_is_rejected() {
        let app = Router::new().route(
            CREATE_PROJECT_ROUTE,
            post(|| async { (StatusCode::BAD_GATEWAY, "upstream down") }),
        );
        let base = serve(app).await;
        let client = PensieveClient::new(&settings(base)).unwrap();
        let err = client.submit(&payload()).await.unwrap_err();
        assert_eq!(err.to_string(), "Pensieve HTTP status 502");
    }

    #[tokio::test]
    async fn missing_result_is_protocol_failure() {
        let base = serve(reply(StatusCode::OK, json!({"ok": true}))).await;
        let client = PensieveClient::new(&settings(base)).unwrap();
        let err = client.submit(&payload()).await.unwrap_err();
        assert!(matches!(err, RegistryError::Decode(_)));
    }

    #[tokio::test]
    async fn unreachable_registry_is_transport_failure() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let client = PensieveClient::new(&settings(format!("http://{addr}"))).unwrap();
        let err = client.submit(&payload()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TransportFailure);
        assert!(err.to_string().starts_with("Failed to reach Pensieve service:"));
    }

    #[tokio::test]
    async fn cancellation_is_distinct() {
        let app = Router::new().route(
            CREATE_PROJECT_ROUTE,
            post(|| async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Json(json!({"result": {"data": {"json": {"id": "late"}}}}))
            }),
        );
        let base = serve(app).await;
        let client = PensieveClient::new(&settings(base)).unwrap();
        let cancel = tokio::time::sleep(Duration::from_millis(50));
        let err = client
            .submit_with_cancel(&payload(), cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::Cancelled));
        assert_eq!(err.kind(), ErrorKind::Cancelled);
    }

    #[tokio::test]
    async fn check_name_reads_exists_flag() {
        let app = Router::new().route(
            CHECK_NAME_ROUTE,
            get(|Query(params): Query<HashMap<String, String>>| async move {
                let input: Value = serde_json::from_str(&params["input"]).unwrap();
                let exists = input["json"]["name"] == "Acme";
                Json(json!({"result": {"data": {"json": {"exists": exists}}}}))
            }),
        );
        let base = serve(app).await;
        let client = PensieveClient::new(&settings(base)).unwrap();
        assert!(client.check_name_exists("Acme").await.unwrap());
        assert!(!client.check_name_exists("Other").await.unwrap());
    }

    #[tokio::test]
    async fn check_name_accepts_bare_boolean() {
        let app = Router::new().route(
            CHECK_NAME_ROUTE,
            get(|| async { Json(json!({"result": {"data": {"json": true}}})) }),
        );
        let base = serve(app).await;
        let client = PensieveClient::new(&settings(base)).unwrap();
        assert!(client.check_name_exists("Acme").await.unwrap());
    }
}
