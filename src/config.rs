use base64::Engine;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:7860";
pub const DEFAULT_IMG2IMG_PATH: &str = "/sdapi/v1/img2img";

fn normalize(endpoint: String) -> String {
    endpoint.trim_end_matches('/').to_string()
}

/// Connection settings for the Stable Diffusion server.
///
/// Passed explicitly into the node instead of being read from process-wide
/// state. Use [`ServerConfig::default()`] for a local server without auth,
/// or [`ServerConfig::from_env()`] to pick values up from the environment.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server base URL (e.g., "http://127.0.0.1:7860"). Trailing slashes are trimmed.
    pub base_url: String,
    /// Path of the img2img endpoint, appended to `base_url`.
    pub img2img_path: String,
    /// Attach a basic-auth header when both credentials are non-empty.
    pub use_auth: bool,
    pub username: String,
    pub password: String,
    /// How often the workflow re-checks an outstanding request (default: 500ms).
    pub poll_interval: Duration,
    /// Per-request HTTP timeout (default: 300s).
    pub timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            img2img_path: DEFAULT_IMG2IMG_PATH.to_string(),
            use_auth: false,
            username: String::new(),
            password: String::new(),
            poll_interval: Duration::from_millis(500),
            timeout: Duration::from_secs(300),
        }
    }
}

impl ServerConfig {
    /// Create a config pointing at the given server.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: normalize(base_url.into()),
            ..Default::default()
        }
    }

    /// Build a config from `SD_*` environment variables.
    ///
    /// Recognized: `SD_SERVER_URL`, `SD_IMG2IMG_PATH`, `SD_USE_AUTH`,
    /// `SD_USERNAME`, `SD_PASSWORD`, `SD_POLL_INTERVAL_MS`, `SD_TIMEOUT_SECS`.
    /// Missing or unparsable values keep their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(url) = lookup("SD_SERVER_URL") {
            config.base_url = normalize(url);
        }
        if let Some(path) = lookup("SD_IMG2IMG_PATH") {
            config.img2img_path = path;
        }
        if let Some(flag) = lookup("SD_USE_AUTH") {
            config.use_auth = matches!(flag.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Some(user) = lookup("SD_USERNAME") {
            config.username = user;
        }
        if let Some(pass) = lookup("SD_PASSWORD") {
            config.password = pass;
        }
        if let Some(ms) = lookup("SD_POLL_INTERVAL_MS").and_then(|v| v.trim().parse().ok()) {
            config.poll_interval = Duration::from_millis(ms);
        }
        if let Some(secs) = lookup("SD_TIMEOUT_SECS").and_then(|v| v.trim().parse().ok()) {
            config.timeout = Duration::from_secs(secs);
        }
        config
    }

    /// Set the img2img endpoint path.
    pub fn with_img2img_path(mut self, path: impl Into<String>) -> Self {
        self.img2img_path = path.into();
        self
    }

    /// Enable basic auth with the given credentials.
    pub fn with_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.use_auth = true;
        self.username = username.into();
        self.password = password.into();
        self
    }

    /// Set the completion polling interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the per-request HTTP timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Full URL of the img2img endpoint.
    pub fn img2img_url(&self) -> String {
        let path = self.img2img_path.trim_start_matches('/');
        format!("{}/{}", normalize(self.base_url.clone()), path)
    }

    /// `Authorization` header value, if auth is enabled and both credentials are set.
    pub fn auth_header(&self) -> Option<String> {
        if !self.use_auth || self.username.is_empty() || self.password.is_empty() {
            return None;
        }
        let credentials = format!("{}:{}", self.username, self.password);
        Some(format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode(credentials.as_bytes())
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.base_url, "http://127.0.0.1:7860");
        assert_eq!(config.img2img_path, "/sdapi/v1/img2img");
        assert!(!config.use_auth);
        assert_eq!(config.poll_interval, Duration::from_millis(500));
        assert_eq!(config.timeout, Duration::from_secs(300));
    }

    #[test]
    fn test_img2img_url_joins_cleanly() {
        let config = ServerConfig::new("http://host:7860///");
        assert_eq!(config.img2img_url(), "http://host:7860/sdapi/v1/img2img");

        let config = ServerConfig::new("http://host:7860").with_img2img_path("api/img2img");
        assert_eq!(config.img2img_url(), "http://host:7860/api/img2img");
    }

    #[test]
    fn test_auth_header_encodes_credentials() {
        let config = ServerConfig::default().with_auth("user", "pass");
        // base64("user:pass")
        assert_eq!(config.auth_header().as_deref(), Some("Basic dXNlcjpwYXNz"));
    }

    #[test]
    fn test_auth_header_requires_both_credentials() {
        assert!(ServerConfig::default().auth_header().is_none());
        assert!(ServerConfig::default().with_auth("user", "").auth_header().is_none());
        assert!(ServerConfig::default().with_auth("", "pass").auth_header().is_none());

        let mut config = ServerConfig::default().with_auth("user", "pass");
        config.use_auth = false;
        assert!(config.auth_header().is_none());
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("SD_SERVER_URL", "http://gpu-box:7861/"),
            ("SD_USE_AUTH", "true"),
            ("SD_USERNAME", "alice"),
            ("SD_PASSWORD", "secret"),
            ("SD_POLL_INTERVAL_MS", "250"),
            ("SD_TIMEOUT_SECS", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let config = ServerConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()));
        assert_eq!(config.base_url, "http://gpu-box:7861");
        assert!(config.use_auth);
        assert_eq!(config.username, "alice");
        assert_eq!(config.poll_interval, Duration::from_millis(250));
        // Unparsable values keep the default
        assert_eq!(config.timeout, Duration::from_secs(300));
        assert_eq!(config.img2img_path, DEFAULT_IMG2IMG_PATH);
    }
}
