//! Resource client for the SAP workflow endpoints.

use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, error, info, warn};
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use secrecy::ExposeSecret;

use sapflow_common::{Config, Decision, WorkflowTask};

use crate::WorkflowApi;
use crate::credentials::{ClientCredentials, build_http_client};
use crate::error::{ClientError, error_message};
use crate::response::{decision_status, parse_task_list};
use crate::token::{TokenCache, TokenProvider};

/// Endpoint returning the task inbox.
pub const LIST_ENDPOINT: &str = "http/getSAPdata";

/// Endpoint accepting approve / reject decisions.
pub const DECISION_ENDPOINT: &str = "http/postSAPdata";

const DECISION_ACCEPT: &str = "application/xml,application/json";

/// Client for listing and deciding workflow tasks.
///
/// Every request carries a bearer token from the wrapped
/// [`TokenProvider`]. A 401 answer discards the cached token and surfaces
/// as [`ClientError::AuthExpired`]; the call is not retried here.
#[derive(Debug, Clone)]
pub struct WorkflowClient {
    http: reqwest::Client,
    config: Arc<Config>,
    tokens: TokenProvider,
}

impl WorkflowClient {
    /// Creates a client that obtains tokens with the client-credentials
    /// grant and caches them in a fresh [`TokenCache`].
    ///
    /// # Errors
    ///
    /// Returns a configuration error if credentials are missing or either
    /// URL is invalid.
    pub fn new(config: Config) -> Result<Self, ClientError> {
        let http = build_http_client(config.timeout_seconds)?;
        let source = ClientCredentials::with_http_client(&config, http.clone())?;
        let tokens = TokenProvider::from_config(&config, Arc::new(source), TokenCache::new());
        Self::with_parts(config, http, tokens)
    }

    /// Creates a client around an existing token provider.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the base URL is invalid.
    pub fn with_token_provider(
        config: Config,
        tokens: TokenProvider,
    ) -> Result<Self, ClientError> {
        let http = build_http_client(config.timeout_seconds)?;
        Self::with_parts(config, http, tokens)
    }

    fn with_parts(
        config: Config,
        http: reqwest::Client,
        tokens: TokenProvider,
    ) -> Result<Self, ClientError> {
        let list_url = config.resource_url(LIST_ENDPOINT);
        reqwest::Url::parse(&list_url).map_err(|e| {
            ClientError::ConfigurationError(format!("Invalid base URL '{}': {e}", config.base_url))
        })?;

        Ok(Self {
            http,
            config: Arc::new(config),
            tokens,
        })
    }

    /// The configuration this client was built from.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The token provider used for every request.
    #[must_use]
    pub const fn token_provider(&self) -> &TokenProvider {
        &self.tokens
    }

    /// Sends an authorized request and returns the content type and body of
    /// a successful response.
    async fn execute(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<(Option<String>, String), ClientError> {
        let token = self.tokens.get_token().await?;

        let response = request
            .bearer_auth(token.expose_secret())
            .send()
            .await
            .map_err(|e| ClientError::from_transport(&e))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            warn!("Resource endpoint rejected the token; clearing cache");
            self.tokens.invalidate().await;
            return Err(ClientError::AuthExpired);
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        let body = response
            .text()
            .await
            .map_err(|e| ClientError::from_transport(&e))?;

        if !status.is_success() {
            let message = error_message(status, &body);
            error!(
                "API request failed with status {}: {message}",
                status.as_u16()
            );
            return Err(ClientError::RequestFailed {
                status: Some(status.as_u16()),
                message,
            });
        }

        debug!(
            "Raw API response: {}",
            &body.chars().take(500).collect::<String>()
        );
        Ok((content_type, body))
    }
}

#[async_trait]
impl WorkflowApi for WorkflowClient {
    async fn list_tasks(&self) -> Result<Vec<WorkflowTask>, ClientError> {
        let url = self.config.resource_url(LIST_ENDPOINT);
        debug!("Fetching tasks from {url}");

        let request = self.http.get(&url).header(ACCEPT, "application/json");
        let (_, body) = self.execute(request).await?;

        let tasks = parse_task_list(&body);
        debug!("Received {} tasks", tasks.len());
        Ok(tasks)
    }

    async fn decide(
        &self,
        instance_id: &str,
        decision: Decision,
        comment: Option<&str>,
    ) -> Result<String, ClientError> {
        let url = self.config.resource_url(DECISION_ENDPOINT);
        let comment = comment.unwrap_or_else(|| decision.default_comment());
        debug!("Sending {decision} for instance {instance_id} to {url}");

        let request = self
            .http
            .post(&url)
            .query(&[
                ("DecisionKey", decision.code()),
                ("InstanceID", instance_id),
                ("Comments", comment),
            ])
            .header(ACCEPT, DECISION_ACCEPT);

        let (content_type, body) = self.execute(request).await?;
        let status = decision_status(instance_id, content_type.as_deref(), &body)?;
        info!("Task {instance_id} {}: {status}", decision.past_tense());
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]
    #![allow(clippy::panic)]

    use super::*;
    use crate::testing::StaticSource;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_string, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TOKEN: &str = "test-token";

    fn client_with_source(server: &MockServer, source: Arc<StaticSource>) -> WorkflowClient {
        let config = Config::new(server.uri(), "http://auth.invalid");
        let tokens = TokenProvider::new(source, TokenCache::new());
        WorkflowClient::with_token_provider(config, tokens).unwrap()
    }

    fn create_test_client(server: &MockServer) -> (WorkflowClient, Arc<StaticSource>) {
        let source = Arc::new(StaticSource::new(TOKEN, Some(3600)));
        (client_with_source(server, Arc::clone(&source)), source)
    }

    async fn mount_list(server: &MockServer, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/http/getSAPdata"))
            .and(header("authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    fn xml_response(body: &str, content_type: &str) -> ResponseTemplate {
        let template = ResponseTemplate::new(200);
        template.set_body_raw(body, content_type)
    }

    #[tokio::test]
    async fn test_list_single_task() {
        let server = MockServer::start().await;
        let body = json!({"TaskCollection": {"Task": {"InstanceID": "1", "TaskTitle": "PO 4711"}}});
        mount_list(&server, body).await;

        let (client, _) = create_test_client(&server);
        let tasks = client.list_tasks().await.unwrap();

        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].instance_id, "1");
        assert_eq!(tasks[0].display_title(), "PO 4711");
    }

    #[tokio::test]
    async fn test_list_multiple_tasks() {
        let server = MockServer::start().await;
        let body = json!({"TaskCollection": {"Task": [{"InstanceID": "1"}, {"InstanceID": "2"}]}});
        mount_list(&server, body).await;

        let (client, _) = create_test_client(&server);
        assert_eq!(client.list_tasks().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_list_unexpected_shape_is_empty() {
        let server = MockServer::start().await;
        mount_list(&server, json!({})).await;

        let (client, _) = create_test_client(&server);
        assert!(client.list_tasks().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_token_reused_across_calls() {
        let server = MockServer::start().await;
        mount_list(&server, json!([{"InstanceID": "1"}])).await;

        let (client, source) = create_test_client(&server);
        client.list_tasks().await.unwrap();
        client.list_tasks().await.unwrap();

        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_unauthorized_clears_cache() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/http/postSAPdata"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let (client, source) = create_test_client(&server);
        let err = client.approve("42").await.unwrap_err();

        assert!(err.is_authentication_error());
        assert!(client.token_provider().cache().peek().await.is_none());
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_retry_after_unauthorized_fetches_new_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/http/getSAPdata"))
            .respond_with(ResponseTemplate::new(401))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        mount_list(&server, json!([{"InstanceID": "1"}])).await;

        let (client, source) = create_test_client(&server);
        assert!(matches!(
            client.list_tasks().await,
            Err(ClientError::AuthExpired)
        ));
        assert_eq!(client.list_tasks().await.unwrap().len(), 1);
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_decision_query_and_xml_completed() {
        let server = MockServer::start().await;
        let body = r#"<?xml version="1.0"?>
            <Task>
              <InstanceID>000001234567</InstanceID>
              <Status>COMPLETED</Status>
            </Task>"#;

        Mock::given(method("POST"))
            .and(path("/http/postSAPdata"))
            .and(query_param("DecisionKey", "0001"))
            .and(query_param("InstanceID", "000001234567"))
            .and(query_param("Comments", "Looks good & approved"))
            .and(header("authorization", "Bearer test-token"))
            .and(body_string(""))
            .respond_with(xml_response(body, "application/xml"))
            .expect(1)
            .mount(&server)
            .await;

        let (client, _) = create_test_client(&server);
        let status = client
            .decide("000001234567", Decision::Approve, Some("Looks good & approved"))
            .await
            .unwrap();

        assert_eq!(status, "COMPLETED");
    }

    #[tokio::test]
    async fn test_reject_uses_default_comment() {
        let server = MockServer::start().await;
        let body = json!({"status": "COMPLETED"});

        Mock::given(method("POST"))
            .and(path("/http/postSAPdata"))
            .and(query_param("DecisionKey", "0002"))
            .and(query_param("Comments", "Rejected"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .expect(1)
            .mount(&server)
            .await;

        let (client, _) = create_test_client(&server);
        assert_eq!(client.reject("7").await.unwrap(), "COMPLETED");
    }

    #[tokio::test]
    async fn test_xml_rejected_decision() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/http/postSAPdata"))
            .respond_with(xml_response("<Task><Status>IN_PROGRESS</Status></Task>", "text/xml"))
            .mount(&server)
            .await;

        let (client, _) = create_test_client(&server);
        match client.approve("9").await {
            Err(ClientError::DecisionRejected { instance_id, status }) => {
                assert_eq!(instance_id, "9");
                assert_eq!(status.as_deref(), Some("IN_PROGRESS"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_json_decision_without_status_defaults_to_completed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/http/postSAPdata"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let (client, _) = create_test_client(&server);
        assert_eq!(client.approve("9").await.unwrap(), "COMPLETED");
    }

    #[tokio::test]
    async fn test_server_error_is_request_failed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/http/getSAPdata"))
            .respond_with(ResponseTemplate::new(502).set_body_json(json!({
                "error": "Proxy error",
                "details": "upstream unreachable"
            })))
            .mount(&server)
            .await;

        let (client, source) = create_test_client(&server);
        match client.list_tasks().await {
            Err(ClientError::RequestFailed { status, message }) => {
                assert_eq!(status, Some(502));
                assert_eq!(message, "Proxy error: upstream unreachable");
            }
            other => panic!("unexpected result: {other:?}"),
        }
        // Only a 401 discards the token.
        assert!(client.token_provider().cache().peek().await.is_some());
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_timeout_is_network_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/http/getSAPdata"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([]))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let source = Arc::new(StaticSource::new(TOKEN, None));
        let config = Config::new(server.uri(), "http://auth.invalid").with_timeout(1);
        let tokens = TokenProvider::new(source, TokenCache::new());
        let client = WorkflowClient::with_token_provider(config, tokens).unwrap();

        let err = client.list_tasks().await.unwrap_err();
        assert!(err.is_network_error(), "got {err:?}");
    }

    #[tokio::test]
    async fn test_refused_connection_is_network_error() {
        let source = Arc::new(StaticSource::new(TOKEN, None));
        let config = Config::new("http://127.0.0.1:9", "http://auth.invalid");
        let tokens = TokenProvider::new(source, TokenCache::new());
        let client = WorkflowClient::with_token_provider(config, tokens).unwrap();

        let err = client.list_tasks().await.unwrap_err();
        assert!(err.is_network_error(), "got {err:?}");
    }

    #[tokio::test]
    async fn test_token_failure_skips_resource_call() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/http/getSAPdata"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(0)
            .mount(&server)
            .await;

        let client = client_with_source(&server, Arc::new(StaticSource::failing()));
        let err = client.list_tasks().await.unwrap_err();
        assert!(matches!(err, ClientError::TokenRequestFailed { .. }));
    }

    #[tokio::test]
    async fn test_end_to_end_with_client_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "test-token",
                "expires_in": 43199
            })))
            .expect(1)
            .mount(&server)
            .await;
        let body = json!({"TaskCollection": {"Task": {"InstanceID": "1"}}});
        mount_list(&server, body).await;

        let config =
            Config::new(server.uri(), server.uri()).with_client_credentials("user", "pass");
        let client = WorkflowClient::new(config).unwrap();

        assert_eq!(client.list_tasks().await.unwrap().len(), 1);
        assert_eq!(client.list_tasks().await.unwrap().len(), 1);
    }

    #[test]
    fn test_invalid_base_url() {
        let config = Config::new("not a url", "https://auth.example.com")
            .with_client_credentials("user", "pass");
        let err = WorkflowClient::new(config).unwrap_err();
        assert!(matches!(err, ClientError::ConfigurationError(_)));
    }
}
