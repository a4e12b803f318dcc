use quillboard_shared::Envelope;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::config::ClientConfig;
use crate::error::{ApiError, TransportError};
use crate::token::TokenProvider;
use crate::transport::{Body, HttpRequest, HttpResponse, Method, Transport};

/// Per-call transport options. Headers set here win over the defaults.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }
}

/// Single chokepoint for backend calls: attaches the bearer token, unwraps
/// the response envelope and folds every failure into [`ApiError`].
pub struct ApiClient<T, P> {
    config: ClientConfig,
    transport: T,
    tokens: P,
}

impl<T: Transport, P: TokenProvider> ApiClient<T, P> {
    pub fn new(config: ClientConfig, transport: T, tokens: P) -> Self {
        Self {
            config,
            transport,
            tokens,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub async fn get<R: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<R, ApiError> {
        self.send(Method::Get, path, None, options).await
    }

    pub async fn post<R: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        options: RequestOptions,
    ) -> Result<R, ApiError> {
        let body = Body::json(body).map_err(|e| ApiError::Encode(e.to_string()))?;
        self.send(Method::Post, path, Some(body), options).await
    }

    pub async fn put<R: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        options: RequestOptions,
    ) -> Result<R, ApiError> {
        let body = Body::json(body).map_err(|e| ApiError::Encode(e.to_string()))?;
        self.send(Method::Put, path, Some(body), options).await
    }

    pub async fn delete<R: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<R, ApiError> {
        self.send(Method::Delete, path, None, options).await
    }

    pub async fn send<R: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Body>,
        options: RequestOptions,
    ) -> Result<R, ApiError> {
        let request = self.build_request(method, path, body, options);
        debug!(%method, path, authenticated = request.header("Authorization").is_some(), "dispatching request");

        let response = match self.transport.send(request).await {
            Ok(response) => response,
            Err(err) => {
                error!(%method, path, error = %err, "transport failure");
                return Err(err.into());
            }
        };

        unwrap_envelope(response).inspect_err(|err| match err {
            ApiError::Envelope { status, message } => {
                warn!(%method, path, status, message = %message, "request rejected");
            }
            ApiError::Transport(err) => error!(%method, path, error = %err, "transport failure"),
            other => error!(%method, path, error = %other, "unusable response"),
        })
    }

    fn build_request(
        &self,
        method: Method,
        path: &str,
        body: Option<Body>,
        options: RequestOptions,
    ) -> HttpRequest {
        let mut headers = vec![("Accept".to_string(), "application/json".to_string())];
        if let Some(body) = &body {
            set_header(&mut headers, "Content-Type", &body.content_type);
        }
        // Re-read on every call: login and logout happen between requests.
        if let Some(token) = self.tokens.token() {
            set_header(&mut headers, "Authorization", &format!("Bearer {token}"));
        }
        for (name, value) in &options.headers {
            set_header(&mut headers, name, value);
        }

        HttpRequest {
            method,
            url: self.config.endpoint(path, &options.query),
            headers,
            body,
        }
    }
}

fn set_header(headers: &mut Vec<(String, String)>, name: &str, value: &str) {
    match headers.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(name)) {
        Some(existing) => existing.1 = value.to_string(),
        None => headers.push((name.to_string(), value.to_string())),
    }
}

/// Branches on the envelope rather than the status code: a 200 carrying
/// `success: false` is still a failure, and a 403 carrying an envelope is
/// reported with the backend's message.
fn unwrap_envelope<R: DeserializeOwned>(response: HttpResponse) -> Result<R, ApiError> {
    let envelope = match serde_json::from_str::<Envelope<Value>>(&response.body) {
        Ok(envelope) => envelope,
        Err(_) if !response.is_success() => {
            return Err(TransportError::Status { status: response.status }.into());
        }
        Err(err) => return Err(ApiError::Decode(err.to_string())),
    };

    if !envelope.success {
        let message = envelope
            .reason()
            .map(str::to_string)
            .unwrap_or_else(|| format!("Request failed with status {}", response.status));
        return Err(ApiError::Envelope {
            status: response.status,
            message,
        });
    }

    serde_json::from_value(envelope.data.unwrap_or(Value::Null))
        .map_err(|e| ApiError::Decode(e.to_string()))
}
