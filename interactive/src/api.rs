use std::future::Future;

use gloo_net::http::Request;
use quillboard_client::config::DEFAULT_BASE_URL;
use quillboard_client::{
    ApiClient, ClientConfig, HttpRequest, HttpResponse, Method, TokenProvider, Transport,
    TransportError,
};
use quillboard_shared::User;
use web_sys::window;

pub type Client = ApiClient<BrowserTransport, StoredToken>;

const USER_KEY: &str = "user";

fn api_base() -> String {
    // Read from a meta tag set by the host page, falling back to localhost for dev
    let meta = window()
        .and_then(|w| w.document())
        .and_then(|d| d.query_selector("meta[name='quillboard-api']").ok().flatten())
        .and_then(|el| el.get_attribute("content"));
    match meta {
        Some(url) if !url.is_empty() => url,
        _ => DEFAULT_BASE_URL.to_string(),
    }
}

pub fn config() -> ClientConfig {
    ClientConfig::default().with_base_url(api_base())
}

pub fn client() -> Client {
    let config = config();
    let tokens = StoredToken::from_config(&config);
    ApiClient::new(config, BrowserTransport, tokens)
}

/// The token slot the client reads, for the login and logout flow to write.
pub fn session() -> StoredToken {
    StoredToken::from_config(&config())
}

// ── Persisted session ──

fn storage() -> Option<web_sys::Storage> {
    window()?.local_storage().ok()?
}

pub fn stored_token() -> Option<String> {
    session().token()
}

pub fn set_token(token: &str) {
    if let Some(storage) = storage() {
        let _ = storage.set_item(session().key(), token);
    }
}

pub fn stored_user() -> Option<User> {
    let raw = storage()?.get_item(USER_KEY).ok()??;
    serde_json::from_str(&raw).ok()
}

pub fn set_user(user: &User) {
    if let (Some(storage), Ok(raw)) = (storage(), serde_json::to_string(user)) {
        let _ = storage.set_item(USER_KEY, &raw);
    }
}

pub fn clear_session() {
    if let Some(storage) = storage() {
        let _ = storage.remove_item(session().key());
        let _ = storage.remove_item(USER_KEY);
    }
}

/// Bearer token read straight from `localStorage` on every request.
#[derive(Debug, Clone)]
pub struct StoredToken {
    key: String,
}

impl StoredToken {
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            key: config.token_key.clone(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl TokenProvider for StoredToken {
    fn token(&self) -> Option<String> {
        storage()?.get_item(&self.key).ok()?
    }
}

// ── Transport ──

/// `fetch`-backed transport via gloo-net.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserTransport;

impl Transport for BrowserTransport {
    fn send(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, TransportError>> {
        async move {
            let mut builder = match request.method {
                Method::Get => Request::get(&request.url),
                Method::Post => Request::post(&request.url),
                Method::Put => Request::put(&request.url),
                Method::Delete => Request::delete(&request.url),
            };
            for (name, value) in &request.headers {
                builder = builder.header(name, value);
            }

            let req = match request.body {
                Some(body) => builder.body(web_sys::js_sys::Uint8Array::from(body.bytes.as_slice())),
                None => builder.build(),
            }
            .map_err(network)?;

            let resp = req.send().await.map_err(network)?;
            let status = resp.status();
            let body = resp.text().await.map_err(network)?;
            Ok(HttpResponse { status, body })
        }
    }
}

fn network(err: gloo_net::Error) -> TransportError {
    TransportError::Network(err.to_string())
}
