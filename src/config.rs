use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the backend serving `/api/search` and `/api/comment`
    pub base_url: String,
    /// TCP connect timeout in seconds
    pub connect_timeout_secs: u64,
    /// Whole-request timeout in seconds. Searches clone and scan a repo
    /// server-side, so this is generous.
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3000".to_string(),
            connect_timeout_secs: 10,
            request_timeout_secs: 120,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("REPO_ASK_BASE_URL") {
            config.base_url = url;
        }
        if let Ok(val) = std::env::var("REPO_ASK_CONNECT_TIMEOUT_SECS") {
            if let Ok(v) = val.parse() {
                config.connect_timeout_secs = v;
            }
        }
        if let Ok(val) = std::env::var("REPO_ASK_REQUEST_TIMEOUT_SECS") {
            if let Ok(v) = val.parse() {
                config.request_timeout_secs = v;
            }
        }

        config
    }

    pub fn search_url(&self) -> String {
        format!("{}/api/search", self.base_url.trim_end_matches('/'))
    }

    pub fn comment_url(&self) -> String {
        format!("{}/api/comment", self.base_url.trim_end_matches('/'))
    }
}
