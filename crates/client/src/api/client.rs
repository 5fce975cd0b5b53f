//! HTTP API client
//!
//! [`ApiClient`] wraps every backend call in the same pipeline: pre-flight
//! token refresh, header assembly, one reactive refresh-and-retry on 401,
//! and uniform [`ApiResult`] envelopes. Failures never unwind; call sites
//! branch on the envelope.

use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::envelope::ApiResult;
use crate::auth::coordinator::TokenCoordinator;
use crate::auth::store::TokenStore;
use crate::auth::types::{SessionResponse, TokenPair};
use crate::config::ClientConfig;
use crate::testing::time::{Clock, SystemClock};

/// Failure message for a 401 whose refresh-and-retry could not recover.
const AUTH_FAILED_MESSAGE: &str = "Authentication failed. Please login again.";

/// One field of a multipart upload
///
/// Owned description rather than a built form, so the form can be rebuilt
/// when a 401 forces a retry.
#[derive(Debug, Clone)]
pub struct UploadField {
    /// Form field name
    pub name: String,
    /// Field payload
    pub kind: UploadFieldKind,
}

/// Payload of an [`UploadField`]
#[derive(Debug, Clone)]
pub enum UploadFieldKind {
    /// Plain text value
    Text(String),
    /// File contents with metadata
    File {
        /// Raw file bytes
        bytes: Vec<u8>,
        /// File name reported to the server
        file_name: String,
        /// MIME type of the contents
        mime: String,
    },
}

impl UploadField {
    /// Text field.
    #[must_use]
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self { name: name.into(), kind: UploadFieldKind::Text(value.into()) }
    }

    /// File field.
    #[must_use]
    pub fn file(
        name: impl Into<String>,
        bytes: Vec<u8>,
        file_name: impl Into<String>,
        mime: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: UploadFieldKind::File {
                bytes,
                file_name: file_name.into(),
                mime: mime.into(),
            },
        }
    }
}

/// Request body variants accepted by the pipeline
#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    /// No body
    #[default]
    Empty,
    /// JSON body (Content-Type set to `application/json` unless the
    /// caller supplied one)
    Json(Value),
    /// Multipart form data (the transport sets the boundary Content-Type;
    /// it is never overridden with `application/json`)
    Multipart(Vec<UploadField>),
}

/// Per-request options
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Extra headers; caller-supplied headers win over defaults
    pub headers: Vec<(String, String)>,
    /// Request body
    pub body: RequestBody,
}

impl RequestOptions {
    /// Options carrying a JSON body.
    #[must_use]
    pub const fn json(body: Value) -> Self {
        Self { headers: Vec::new(), body: RequestBody::Json(body) }
    }

    /// Options carrying a multipart body.
    #[must_use]
    pub const fn multipart(fields: Vec<UploadField>) -> Self {
        Self { headers: Vec::new(), body: RequestBody::Multipart(fields) }
    }
}

/// API client with coordinated token refresh
///
/// All requests share one [`TokenCoordinator`]; concurrent 401s therefore
/// collapse into a single refresh.
pub struct ApiClient<S: TokenStore + 'static, C: Clock + 'static> {
    http: reqwest::Client,
    base_url: String,
    request_buffer_secs: i64,
    coordinator: TokenCoordinator<S, C>,
}

impl<S: TokenStore + 'static> ApiClient<S, SystemClock> {
    /// Create a client using the real system clock.
    #[must_use]
    pub fn new(config: &ClientConfig, store: S) -> Self {
        Self::with_clock(config, store, SystemClock)
    }
}

impl<S: TokenStore + 'static, C: Clock + 'static> ApiClient<S, C> {
    /// Create a client with an explicit clock implementation.
    #[must_use]
    pub fn with_clock(config: &ClientConfig, store: S, clock: C) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            http,
            base_url: config.base_url.clone(),
            request_buffer_secs: config.request_buffer_secs,
            coordinator: TokenCoordinator::with_clock(config, store, clock),
        }
    }

    /// The token coordinator backing this client.
    ///
    /// Use it to initialize the session, control the expiry watch, and
    /// inspect auth status.
    #[must_use]
    pub const fn coordinator(&self) -> &TokenCoordinator<S, C> {
        &self.coordinator
    }

    /// Issue an authenticated request through the full pipeline.
    ///
    /// Pipeline: refresh inline if the token expires within the request
    /// buffer, attach the Bearer header when a token is held, send, and on
    /// a 401 that carried a token, refresh once and retry once.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        options: RequestOptions,
    ) -> ApiResult<T> {
        self.dispatch(method, endpoint, options, true).await
    }

    /// GET an endpoint.
    pub async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> ApiResult<T> {
        self.request(Method::GET, endpoint, RequestOptions::default()).await
    }

    /// POST a JSON body to an endpoint.
    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> ApiResult<T> {
        match serde_json::to_value(body) {
            Ok(value) => self.request(Method::POST, endpoint, RequestOptions::json(value)).await,
            Err(e) => ApiResult::err(format!("failed to serialize request body: {e}"), 0),
        }
    }

    /// PUT a JSON body to an endpoint.
    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> ApiResult<T> {
        match serde_json::to_value(body) {
            Ok(value) => self.request(Method::PUT, endpoint, RequestOptions::json(value)).await,
            Err(e) => ApiResult::err(format!("failed to serialize request body: {e}"), 0),
        }
    }

    /// DELETE an endpoint.
    pub async fn delete<T: DeserializeOwned>(&self, endpoint: &str) -> ApiResult<T> {
        self.request(Method::DELETE, endpoint, RequestOptions::default()).await
    }

    /// POST a multipart upload to an endpoint.
    ///
    /// Fields are owned descriptions so the form can be rebuilt if a 401
    /// forces a retry.
    pub async fn upload<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        fields: Vec<UploadField>,
    ) -> ApiResult<T> {
        self.request(Method::POST, endpoint, RequestOptions::multipart(fields)).await
    }

    /// Log in with email and password.
    ///
    /// Anonymous call; on success the returned token pair is installed as
    /// the active session.
    pub async fn login(&self, email: &str, password: &str) -> ApiResult<SessionResponse> {
        let body = serde_json::json!({ "email": email, "password": password });
        let result: ApiResult<SessionResponse> = self
            .dispatch(Method::POST, "/api/auth/login", RequestOptions::json(body), false)
            .await;
        self.install_session(&result).await;
        result
    }

    /// Register a new account.
    ///
    /// Anonymous call; on success the returned token pair is installed as
    /// the active session.
    pub async fn register<B: Serialize + ?Sized>(&self, payload: &B) -> ApiResult<SessionResponse> {
        let body = match serde_json::to_value(payload) {
            Ok(value) => value,
            Err(e) => return ApiResult::err(format!("failed to serialize request body: {e}"), 0),
        };
        let result: ApiResult<SessionResponse> = self
            .dispatch(Method::POST, "/api/auth/register", RequestOptions::json(body), false)
            .await;
        self.install_session(&result).await;
        result
    }

    /// Log out, clearing the local session regardless of the server's
    /// answer.
    pub async fn logout(&self) -> ApiResult<Value> {
        let result =
            self.request(Method::POST, "/api/auth/logout", RequestOptions::default()).await;
        self.coordinator.stop_expiry_watch();
        self.coordinator.clear_tokens().await;
        result
    }

    async fn install_session(&self, result: &ApiResult<SessionResponse>) {
        if let Some(session) = &result.data {
            let pair = TokenPair::new(session.access_token.clone(), session.refresh_token.clone());
            self.coordinator.install_tokens(pair).await;
        }
    }

    async fn dispatch<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        options: RequestOptions,
        authenticated: bool,
    ) -> ApiResult<T> {
        if authenticated && self.coordinator.is_expiring_soon(self.request_buffer_secs).await {
            debug!(endpoint, "token expires before the next watch tick; refreshing inline");
            self.coordinator.refresh().await;
        }

        let url = format!("{}{}", self.base_url, endpoint);
        let token = if authenticated { self.coordinator.access_token().await } else { None };

        let response = match self.send(method.clone(), &url, &options, token.as_deref()).await {
            Ok(response) => response,
            Err(e) => {
                warn!(endpoint, error = %e, "request failed before reaching the server");
                return ApiResult::transport(&e);
            }
        };

        // A 401 triggers refresh-and-retry only when this request actually
        // presented a token; anonymous 401s pass through untouched.
        if response.status() == StatusCode::UNAUTHORIZED && token.is_some() {
            warn!(endpoint, "request rejected with 401; refreshing token");
            let Some(fresh_token) = self.coordinator.refresh().await else {
                return ApiResult::err(AUTH_FAILED_MESSAGE, 401);
            };
            return match self.send(method, &url, &options, Some(&fresh_token)).await {
                Ok(retried) => Self::envelope(retried).await,
                Err(e) => {
                    warn!(endpoint, error = %e, "retry failed before reaching the server");
                    ApiResult::transport(&e)
                }
            };
        }

        Self::envelope(response).await
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        options: &RequestOptions,
        token: Option<&str>,
    ) -> Result<reqwest::Response, reqwest::Error> {
        let mut builder = self.http.request(method, url);
        for (name, value) in &options.headers {
            builder = builder.header(name, value);
        }
        builder = match &options.body {
            RequestBody::Empty => builder,
            // .json() only sets Content-Type when the caller didn't.
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Multipart(fields) => builder.multipart(Self::build_form(fields)?),
        };
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        builder.send().await
    }

    fn build_form(fields: &[UploadField]) -> Result<reqwest::multipart::Form, reqwest::Error> {
        let mut form = reqwest::multipart::Form::new();
        for field in fields {
            form = match &field.kind {
                UploadFieldKind::Text(value) => form.text(field.name.clone(), value.clone()),
                UploadFieldKind::File { bytes, file_name, mime } => {
                    let part = reqwest::multipart::Part::bytes(bytes.clone())
                        .file_name(file_name.clone())
                        .mime_str(mime)?;
                    form.part(field.name.clone(), part)
                }
            };
        }
        Ok(form)
    }

    /// Fold an HTTP response into the uniform envelope.
    ///
    /// Success bodies are parsed only when the server declares JSON; a
    /// bodiless or non-JSON 2xx yields an empty success. Failure bodies
    /// are mined for a `message` or `error` string, falling back to a
    /// generic status line.
    async fn envelope<T: DeserializeOwned>(response: reqwest::Response) -> ApiResult<T> {
        let status = response.status().as_u16();
        let declares_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.contains("application/json"));

        if response.status().is_success() {
            if !declares_json {
                return ApiResult::empty(status);
            }
            return match response.json::<T>().await {
                Ok(data) => ApiResult::ok(data, status),
                Err(e) => ApiResult::err(format!("failed to parse response body: {e}"), status),
            };
        }

        let message = if declares_json {
            response.json::<Value>().await.ok().and_then(|body| Self::extract_message(&body))
        } else {
            None
        };
        ApiResult::err(
            message.unwrap_or_else(|| format!("request failed with status {status}")),
            status,
        )
    }

    fn extract_message(body: &Value) -> Option<String> {
        body.get("message")
            .or_else(|| body.get("error"))
            .and_then(Value::as_str)
            .map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for request plumbing that needs no live server.
    use super::*;
    use crate::testing::mocks::MemoryTokenStore;

    /// Validates `UploadField` constructors.
    ///
    /// Assertions:
    /// - Confirms the text variant carries its value.
    /// - Confirms the file variant carries name, bytes, and mime.
    #[test]
    fn test_upload_field_constructors() {
        let text = UploadField::text("caption", "hello");
        assert_eq!(text.name, "caption");
        assert!(matches!(text.kind, UploadFieldKind::Text(ref v) if v == "hello"));

        let file = UploadField::file("photo", vec![1, 2, 3], "p.jpg", "image/jpeg");
        match file.kind {
            UploadFieldKind::File { ref bytes, ref file_name, ref mime } => {
                assert_eq!(bytes, &[1, 2, 3]);
                assert_eq!(file_name, "p.jpg");
                assert_eq!(mime, "image/jpeg");
            }
            UploadFieldKind::Text(_) => panic!("expected file field"),
        }
    }

    /// Validates `extract_message` key precedence.
    ///
    /// Assertions:
    /// - Confirms `message` wins over `error`.
    /// - Confirms `error` is used when `message` is absent.
    /// - Ensures non-string values yield `None`.
    #[test]
    fn test_extract_message_precedence() {
        type Client = ApiClient<MemoryTokenStore, SystemClock>;

        let both = serde_json::json!({"message": "m", "error": "e"});
        assert_eq!(Client::extract_message(&both), Some("m".to_string()));

        let only_error = serde_json::json!({"error": "e"});
        assert_eq!(Client::extract_message(&only_error), Some("e".to_string()));

        let numeric = serde_json::json!({"message": 7});
        assert_eq!(Client::extract_message(&numeric), None);
    }

    /// Validates `post` behavior for an unserializable body.
    ///
    /// Assertions:
    /// - Confirms `result.status` equals `0`.
    /// - Ensures the error mentions serialization.
    #[tokio::test]
    async fn test_post_unserializable_body() {
        let config = ClientConfig::new("http://127.0.0.1:9");
        let client = ApiClient::new(&config, MemoryTokenStore::new());

        let mut bad = std::collections::HashMap::new();
        bad.insert(vec![1u8], "non-string keys cannot serialize to JSON");
        let result: ApiResult<Value> = client.post("/api/echo", &bad).await;

        assert_eq!(result.status, 0);
        assert!(result.error.unwrap().contains("serialize"));
    }
}
