//! HTTP client for the valet server and the narrow traits the agent's
//! background loops depend on.

use crate::error::AgentError;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use vp_core::types::io::{SubscribeInput, UnsubscribeInput};
use vp_core::types::{HelpRequest, HelpResponse, ReportKind, SubmittedReport};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

pub trait ResponseSource: Send + Sync + 'static {
    fn recent_responses(
        &self,
    ) -> impl Future<Output = Result<Vec<HelpResponse>, AgentError>> + Send;
}

pub trait BoardSource: Send + Sync + 'static {
    fn active_requests(&self) -> impl Future<Output = Result<Vec<HelpRequest>, AgentError>> + Send;
}

pub trait ReportSubmitter: Send + Sync + 'static {
    fn submit(
        &self,
        kind: ReportKind,
        payload: &Value,
        idempotency_key: Option<&str>,
    ) -> impl Future<Output = Result<SubmittedReport, AgentError>> + Send;
}

pub trait HealthProbe: Send + Sync + 'static {
    fn is_reachable(&self) -> impl Future<Output = bool> + Send;
}

pub trait PushRegistry: Send + Sync + 'static {
    fn register(&self, input: &SubscribeInput)
    -> impl Future<Output = Result<(), AgentError>> + Send;
    fn unregister(&self, endpoint: &str) -> impl Future<Output = Result<bool, AgentError>> + Send;
}

#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    client: Client,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, AgentError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, AgentError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AgentError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response.json().await?)
}

impl ResponseSource for ApiClient {
    async fn recent_responses(&self) -> Result<Vec<HelpResponse>, AgentError> {
        let response = self
            .client
            .get(self.url("/api/help-responses/recent"))
            .send()
            .await?;
        decode(response).await
    }
}

impl BoardSource for ApiClient {
    async fn active_requests(&self) -> Result<Vec<HelpRequest>, AgentError> {
        let response = self
            .client
            .get(self.url("/api/help-requests/active"))
            .send()
            .await?;
        decode(response).await
    }
}

impl ReportSubmitter for ApiClient {
    async fn submit(
        &self,
        kind: ReportKind,
        payload: &Value,
        idempotency_key: Option<&str>,
    ) -> Result<SubmittedReport, AgentError> {
        let mut request = self.client.post(self.url(kind.endpoint())).json(payload);
        if let Some(key) = idempotency_key {
            request = request.header(IDEMPOTENCY_HEADER, key);
        }
        decode(request.send().await?).await
    }
}

impl HealthProbe for ApiClient {
    async fn is_reachable(&self) -> bool {
        match self.client.get(self.url("/api/health")).send().await {
            Ok(response) => response.status().is_success(),
            Err(err) => {
                tracing::debug!(error = %err, "health probe failed");
                false
            }
        }
    }
}

#[derive(serde::Deserialize)]
struct Removed {
    removed: bool,
}

impl PushRegistry for ApiClient {
    async fn register(&self, input: &SubscribeInput) -> Result<(), AgentError> {
        let response = self
            .client
            .post(self.url("/api/push-subscription"))
            .json(input)
            .send()
            .await?;
        decode::<Value>(response).await.map(|_| ())
    }

    async fn unregister(&self, endpoint: &str) -> Result<bool, AgentError> {
        let response = self
            .client
            .delete(self.url("/api/push-subscription"))
            .json(&UnsubscribeInput {
                endpoint: endpoint.to_string(),
            })
            .send()
            .await?;
        decode::<Removed>(response).await.map(|body| body.removed)
    }
}
