//! OAuth2 client-credentials token source.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use log::{debug, error};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;

use sapflow_common::Config;

use crate::error::{ClientError, error_message};
use crate::token::{TokenGrant, TokenSource};

/// Content-Type for form-urlencoded data.
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Form body of a client-credentials grant.
const GRANT_BODY: &str = "grant_type=client_credentials";

/// Token endpoint response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    expires_in: Option<Value>,
}

/// Reads `expires_in` as whole seconds.
///
/// Authorization servers send integers, floats or numeric strings. Anything
/// that is not a positive number counts as missing.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn lifetime_seconds(value: &Value) -> Option<u64> {
    let seconds = match value {
        Value::Number(n) if n.is_u64() => return n.as_u64().filter(|&s| s > 0),
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    // Float-to-int casts saturate; fractions round down.
    (seconds.is_finite() && seconds >= 1.0).then_some(seconds as u64)
}

/// Exchanges a client id and secret for a bearer token.
///
/// Sends `POST <auth_url>/oauth/token` with HTTP Basic authentication and
/// the form body `grant_type=client_credentials`.
#[derive(Clone)]
pub struct ClientCredentials {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: Arc<SecretString>,
}

impl fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl ClientCredentials {
    /// Creates a token source from a configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the client id or secret is missing,
    /// the token URL does not parse, or the HTTP client cannot be built.
    pub fn new(config: &Config) -> Result<Self, ClientError> {
        let http = build_http_client(config.timeout_seconds)?;
        Self::with_http_client(config, http)
    }

    /// Creates a token source sharing an existing HTTP client.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the client id or secret is missing
    /// or the token URL does not parse.
    pub fn with_http_client(config: &Config, http: reqwest::Client) -> Result<Self, ClientError> {
        let client_id = config
            .client_id
            .clone()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ClientError::ConfigurationError("Client id is required".to_string()))?;

        let client_secret = config.client_secret.clone().ok_or_else(|| {
            ClientError::ConfigurationError("Client secret is required".to_string())
        })?;

        let token_url = config.token_url();
        url::Url::parse(&token_url).map_err(|e| {
            ClientError::ConfigurationError(format!("Invalid token URL '{token_url}': {e}"))
        })?;

        Ok(Self {
            http,
            token_url,
            client_id,
            client_secret: Arc::new(client_secret),
        })
    }

    /// The token endpoint this source talks to.
    #[must_use]
    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    /// Value of the `Authorization` header sent to the token endpoint.
    #[must_use]
    pub fn basic_authorization(&self) -> String {
        let credentials = format!("{}:{}", self.client_id, self.client_secret.expose_secret());
        format!("Basic {}", STANDARD.encode(credentials.as_bytes()))
    }
}

#[async_trait]
impl TokenSource for ClientCredentials {
    async fn fetch_token(&self) -> Result<TokenGrant, ClientError> {
        debug!("Requesting client-credentials token from {}", self.token_url);

        let response = self
            .http
            .post(&self.token_url)
            .header("Authorization", self.basic_authorization())
            .header("Content-Type", FORM_CONTENT_TYPE)
            .body(GRANT_BODY)
            .send()
            .await
            .map_err(|e| ClientError::from_transport(&e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ClientError::from_transport(&e))?;

        if !status.is_success() {
            let message = error_message(status, &body);
            error!(
                "Token request failed with status {}: {message}",
                status.as_u16()
            );
            return Err(ClientError::TokenRequestFailed {
                status: Some(status.as_u16()),
                message,
            });
        }

        let parsed: TokenResponse = serde_json::from_str(&body).map_err(|e| {
            ClientError::InvalidResponse(format!("Failed to parse token response: {e}"))
        })?;

        let access_token = parsed
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                ClientError::InvalidResponse("Token response has no access_token".to_string())
            })?;

        Ok(TokenGrant {
            access_token: SecretString::new(access_token.into()),
            expires_in: parsed.expires_in.as_ref().and_then(lifetime_seconds),
        })
    }
}

/// Builds the HTTP client used for both endpoints.
///
/// `None` means no deadline.
pub(crate) fn build_http_client(
    timeout_seconds: Option<u64>,
) -> Result<reqwest::Client, ClientError> {
    let builder = match timeout_seconds {
        Some(timeout) => reqwest::Client::builder().timeout(Duration::from_secs(timeout)),
        None => reqwest::Client::builder(),
    };
    builder
        .build()
        .map_err(|e| ClientError::ConfigurationError(format!("Failed to build HTTP client: {e}")))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]
    #![allow(clippy::panic)]

    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn create_test_config(auth_url: &str) -> Config {
        Config::new("http://unused.invalid", auth_url).with_client_credentials("user", "pass")
    }

    async fn declared_lifetime(expires_in: Value) -> Option<u64> {
        let mock_server = MockServer::start().await;
        let body = json!({"access_token": "t", "expires_in": expires_in});

        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&mock_server)
            .await;

        let config = create_test_config(&mock_server.uri());
        let source = ClientCredentials::new(&config).unwrap();
        source.fetch_token().await.unwrap().expires_in
    }

    #[test]
    fn test_basic_authorization() {
        let config = create_test_config("https://auth.example.com");
        let source = ClientCredentials::new(&config).unwrap();
        // "user:pass" base64 encoded is "dXNlcjpwYXNz"
        assert_eq!(source.basic_authorization(), "Basic dXNlcjpwYXNz");
        assert_eq!(source.token_url(), "https://auth.example.com/oauth/token");
    }

    #[test]
    fn test_missing_credentials() {
        let config = Config::new("http://a", "https://auth.example.com");
        let err = ClientCredentials::new(&config).unwrap_err();
        assert!(matches!(err, ClientError::ConfigurationError(_)));

        let mut config = create_test_config("https://auth.example.com");
        config.client_secret = None;
        assert!(ClientCredentials::new(&config).is_err());
    }

    #[test]
    fn test_invalid_token_url() {
        let config = create_test_config("not a url");
        let err = ClientCredentials::new(&config).unwrap_err();
        assert!(err.to_string().contains("Invalid token URL"));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = create_test_config("https://auth.example.com");
        let source = ClientCredentials::new(&config).unwrap();
        let debug = format!("{source:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("pass\""));
    }

    #[tokio::test]
    async fn test_successful_exchange() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .and(header("authorization", "Basic dXNlcjpwYXNz"))
            .and(header("content-type", FORM_CONTENT_TYPE))
            .and(body_string(GRANT_BODY))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "eyJhbGciOi",
                "token_type": "bearer",
                "expires_in": 43199
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let config = create_test_config(&mock_server.uri());
        let source = ClientCredentials::new(&config).unwrap();
        let grant = source.fetch_token().await.unwrap();

        assert_eq!(grant.access_token.expose_secret(), "eyJhbGciOi");
        assert_eq!(grant.expires_in, Some(43199));
    }

    #[tokio::test]
    async fn test_lenient_expires_in() {
        assert_eq!(declared_lifetime(json!(43199)).await, Some(43199));
        assert_eq!(declared_lifetime(json!(3599.5)).await, Some(3599));
        assert_eq!(declared_lifetime(json!("3600")).await, Some(3600));
        assert_eq!(declared_lifetime(json!(0)).await, None);
        assert_eq!(declared_lifetime(json!(-5)).await, None);
        assert_eq!(declared_lifetime(json!("soon")).await, None);
        assert_eq!(declared_lifetime(json!(null)).await, None);
    }

    #[tokio::test]
    async fn test_rejected_credentials() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": "unauthorized",
                "error_description": "Bad credentials"
            })))
            .mount(&mock_server)
            .await;

        let config = create_test_config(&mock_server.uri());
        let source = ClientCredentials::new(&config).unwrap();
        let err = source.fetch_token().await.unwrap_err();

        match err {
            ClientError::TokenRequestFailed { status, message } => {
                assert_eq!(status, Some(401));
                assert_eq!(message, "unauthorized");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_access_token() {
        let mock_server = MockServer::start().await;
        let body = json!({"expires_in": 60});

        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&mock_server)
            .await;

        let config = create_test_config(&mock_server.uri());
        let source = ClientCredentials::new(&config).unwrap();
        let err = source.fetch_token().await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_unreachable_token_endpoint() {
        // Port 9 (discard) on localhost is not expected to accept connections.
        let config = create_test_config("http://127.0.0.1:9");
        let source = ClientCredentials::new(&config).unwrap();
        let err = source.fetch_token().await.unwrap_err();
        assert!(err.is_network_error(), "got {err:?}");
    }
}
