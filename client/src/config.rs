use serde::Deserialize;

pub const DEFAULT_BASE_URL: &str = "http://localhost:5000/api";
pub const DEFAULT_COMMENTS_PER_PAGE: u32 = 10;
pub const DEFAULT_TOKEN_KEY: &str = "token";

/// Where the backend lives and how the reader talks to it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClientConfig {
    pub base_url: String,
    pub comments_per_page: u32,
    /// Storage key the bearer token is persisted under.
    pub token_key: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            comments_per_page: DEFAULT_COMMENTS_PER_PAGE,
            token_key: DEFAULT_TOKEN_KEY.to_string(),
        }
    }
}

impl ClientConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_comments_per_page(mut self, limit: u32) -> Self {
        self.comments_per_page = limit.max(1);
        self
    }

    pub fn with_token_key(mut self, key: impl Into<String>) -> Self {
        self.token_key = key.into();
        self
    }

    /// Joins `path` onto the base URL and appends the encoded query string.
    pub fn endpoint(&self, path: &str, query: &[(String, String)]) -> String {
        let base = self.base_url.trim_end_matches('/');
        let mut url = if path.starts_with('/') {
            format!("{base}{path}")
        } else {
            format!("{base}/{path}")
        };

        if !query.is_empty() {
            let pairs: Vec<String> = query
                .iter()
                .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
                .collect();
            url.push(if url.contains('?') { '&' } else { '?' });
            url.push_str(&pairs.join("&"));
        }

        url
    }
}
