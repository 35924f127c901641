use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Operations the store setup form needs from the remote store API.
#[async_trait]
pub trait StoreApi: Send + Sync {
    /// Asks whether `subdomain` is already registered.
    async fn check_domain(&self, subdomain: &str) -> Result<DomainCheck, ApiError>;

    /// Creates a store from a fully validated draft.
    async fn create_store(
        &self,
        request: &CreateStoreRequest<'_>,
    ) -> Result<CreateStoreResponse, ApiError>;
}

/// reqwest-backed client for the store API.
#[derive(Clone)]
pub struct StoreApiClient {
    http: Client,
    base_url: Url,
    domain_suffix: String,
}

impl StoreApiClient {
    /// Creates a new client with the provided configuration.
    pub fn new(base_url: Url, domain_suffix: impl Into<String>, http: Client) -> Self {
        Self {
            http,
            base_url,
            domain_suffix: domain_suffix.into(),
        }
    }

    /// Full host name checked for `subdomain`.
    pub fn qualified_domain(&self, subdomain: &str) -> String {
        format!("{subdomain}.{}", self.domain_suffix)
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidBaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

#[async_trait]
impl StoreApi for StoreApiClient {
    async fn check_domain(&self, subdomain: &str) -> Result<DomainCheck, ApiError> {
        let host = self.qualified_domain(subdomain);
        let url = self.endpoint(&["task", "domains", "check", &host])?;
        debug!(stage = "api", %url, "checking domain availability");

        let response = self.http.get(url).send().await?;
        parse_json::<DomainCheckEnvelope>(response)
            .await
            .map(|envelope| envelope.data)
    }

    async fn create_store(
        &self,
        request: &CreateStoreRequest<'_>,
    ) -> Result<CreateStoreResponse, ApiError> {
        let url = self.endpoint(&["task", "stores", "create"])?;
        debug!(stage = "api", %url, domain = request.domain, "creating store");

        let response = self.http.post(url).json(request).send().await?;
        parse_json(response).await
    }
}

/// Availability payload nested under `data` in the check response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct DomainCheck {
    pub taken: bool,
}

#[derive(Debug, Deserialize)]
struct DomainCheckEnvelope {
    data: DomainCheck,
}

/// Body sent to the store-creation endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateStoreRequest<'a> {
    pub name: &'a str,
    pub domain: &'a str,
    pub country: &'a str,
    pub category: &'a str,
    pub currency: &'a str,
    pub email: &'a str,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CreateStoreResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

/// Errors produced by the store API client.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("base url cannot carry a path: {0}")]
    InvalidBaseUrl(String),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {status}: {body}")]
    Status { status: StatusCode, body: String },
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

impl ApiError {
    /// Text suitable for the form's error banner.
    ///
    /// A `message` field in an error response body wins over the generic
    /// status line.
    pub fn user_message(&self) -> String {
        match self {
            Self::Status { status, body } => serde_json::from_str::<ErrorBody>(body)
                .ok()
                .and_then(|parsed| parsed.message)
                .filter(|message| !message.is_empty())
                .unwrap_or_else(|| {
                    format!("Request failed with status code {}", status.as_u16())
                }),
            Self::Http(err) if err.is_timeout() => "Request timed out".to_string(),
            Self::Http(err) if err.is_decode() => "Unexpected response from server".to_string(),
            other => other.to_string(),
        }
    }
}

async fn parse_json<T>(response: Response) -> Result<T, ApiError>
where
    T: DeserializeOwned,
{
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<unavailable>"));
        return Err(ApiError::Status { status, body });
    }

    Ok(response.json().await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn client(server: &MockServer) -> StoreApiClient {
        let base = Url::parse(&server.url("/api")).expect("url");
        StoreApiClient::new(
            base,
            "expressitbd.com",
            Client::builder().build().expect("client"),
        )
    }

    fn request() -> CreateStoreRequest<'static> {
        CreateStoreRequest {
            name: "Corner Shop",
            domain: "corner-shop",
            country: "Bangladesh",
            category: "Fashion",
            currency: "BDT",
            email: "owner@example.com",
        }
    }

    #[tokio::test]
    async fn check_domain_reports_taken() {
        let server = MockServer::start_async().await;
        let client = client(&server);

        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/api/task/domains/check/corner-shop.expressitbd.com");
                then.status(200)
                    .json_body(json!({ "success": true, "data": { "taken": true } }));
            })
            .await;

        let check = client.check_domain("corner-shop").await.expect("check");
        mock.assert_async().await;
        assert!(check.taken);
    }

    #[tokio::test]
    async fn check_domain_reports_available() {
        let server = MockServer::start_async().await;
        let client = client(&server);

        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/api/task/domains/check/fresh.expressitbd.com");
                then.status(200).json_body(json!({ "data": { "taken": false } }));
            })
            .await;

        let check = client.check_domain("fresh").await.expect("check");
        assert_eq!(check, DomainCheck { taken: false });
    }

    #[tokio::test]
    async fn check_domain_rejects_malformed_body() {
        let server = MockServer::start_async().await;
        let client = client(&server);

        server
            .mock_async(|when, then| {
                when.method(GET);
                then.status(200).json_body(json!({ "data": {} }));
            })
            .await;

        let err = client
            .check_domain("fresh")
            .await
            .expect_err("missing flag should error");
        assert!(matches!(err, ApiError::Http(_)));
        assert_eq!(err.user_message(), "Unexpected response from server");
    }

    #[tokio::test]
    async fn create_store_posts_draft() {
        let server = MockServer::start_async().await;
        let client = client(&server);

        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/task/stores/create")
                    .json_body(json!({
                        "name": "Corner Shop",
                        "domain": "corner-shop",
                        "country": "Bangladesh",
                        "category": "Fashion",
                        "currency": "BDT",
                        "email": "owner@example.com"
                    }));
                then.status(201).json_body(json!({
                    "message": "Store created!",
                    "data": { "id": 7 }
                }));
            })
            .await;

        let response = client.create_store(&request()).await.expect("create");
        mock.assert_async().await;
        assert_eq!(response.message.as_deref(), Some("Store created!"));
        assert_eq!(response.data, Some(json!({ "id": 7 })));
    }

    #[tokio::test]
    async fn create_store_without_message() {
        let server = MockServer::start_async().await;
        let client = client(&server);

        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/task/stores/create");
                then.status(200).json_body(json!({}));
            })
            .await;

        let response = client.create_store(&request()).await.expect("create");
        assert_eq!(response.message, None);
    }

    #[tokio::test]
    async fn error_status_returns_message() {
        let server = MockServer::start_async().await;
        let client = client(&server);

        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/task/stores/create");
                then.status(400).body("bad request");
            })
            .await;

        let err = client
            .create_store(&request())
            .await
            .expect_err("should error");
        assert_eq!(err.user_message(), "Request failed with status code 400");
        match err {
            ApiError::Status { status, body } => {
                assert_eq!(status, StatusCode::BAD_REQUEST);
                assert_eq!(body, "bad request");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn error_body_message_is_surfaced() {
        let server = MockServer::start_async().await;
        let client = client(&server);

        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/task/stores/create");
                then.status(409)
                    .json_body(json!({ "message": "Domain already registered" }));
            })
            .await;

        let err = client
            .create_store(&request())
            .await
            .expect_err("should error");
        assert_eq!(err.user_message(), "Domain already registered");
    }

    #[test]
    fn rejects_base_without_path() {
        let client = StoreApiClient::new(
            Url::parse("mailto:ops@example.com").expect("url"),
            "expressitbd.com",
            Client::new(),
        );
        let err = client
            .endpoint(&["task"])
            .expect_err("cannot-be-a-base url");
        assert!(matches!(err, ApiError::InvalidBaseUrl(_)));
    }
}
