use crate::error::ClientError;
use crate::types::*;
use bulwark_core::{RetryExecutor, RetryOutcome};
use reqwest::header::RETRY_AFTER;
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// GraphQL client whose requests run through a shared [`RetryExecutor`].
///
/// Breaker and budget state lives in the executor, so clones of the same
/// `Arc` across clients share it.
#[derive(Debug, Clone)]
pub struct GraphqlClient {
    http: Client,
    config: ClientConfig,
    executor: Arc<RetryExecutor>,
}

impl GraphqlClient {
    pub fn new(config: ClientConfig, executor: Arc<RetryExecutor>) -> Result<Self, ClientError> {
        let http = Client::builder().timeout(Duration::from_secs(config.timeout_secs)).build()?;
        Ok(Self { http, config, executor })
    }

    /// Client with its own executor using the default resilience config.
    pub fn with_defaults(config: ClientConfig) -> Result<Self, ClientError> {
        Self::new(config, Arc::new(RetryExecutor::new()))
    }

    /// Send one GraphQL operation.
    ///
    /// Queries are retried per their endpoint's policy; mutations and
    /// subscriptions are sent once.
    pub async fn request(&self, query: &str, variables: Option<Value>) -> RetryOutcome<Value, ClientError> {
        let body = GraphqlRequest { query: query.to_string(), variables };
        let body = &body;
        let client = self;
        self.executor.execute_operation(query, move || client.send_once(body)).await
    }

    async fn send_once(&self, body: &GraphqlRequest) -> Result<Value, ClientError> {
        let mut request = self.http.post(&self.config.endpoint_url).json(body);
        if let Some(token) = &self.config.bearer_token {
            request = request.bearer_auth(token);
        }
        let resp = request.send().await?;

        let status = resp.status();
        if !status.is_success() {
            let retry_after =
                resp.headers().get(RETRY_AFTER).and_then(|v| v.to_str().ok()).map(str::to_string);
            let message = resp.text().await.unwrap_or_default();
            tracing::debug!(status = status.as_u16(), "GraphQL request failed");
            return Err(ClientError::from_status(status.as_u16(), message, retry_after));
        }

        let payload: GraphqlResponse =
            resp.json().await.map_err(|e| ClientError::InvalidResponse(e.to_string()))?;
        if !payload.errors.is_empty() {
            return Err(ClientError::GraphQl {
                messages: payload.errors.into_iter().map(|e| e.message).collect(),
            });
        }
        Ok(payload.data.unwrap_or(Value::Null))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn executor(&self) -> &Arc<RetryExecutor> {
        &self.executor
    }
}
