use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Url};
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::error::{NodeError, Result};

/// An outstanding request running on the tokio runtime.
///
/// Completion is observed with [`is_finished`](Self::is_finished), which never
/// blocks. Dropping the handle aborts the request.
#[derive(Debug)]
pub struct PendingResponse {
    handle: JoinHandle<Result<String>>,
}

impl PendingResponse {
    /// Run `fut` in the background. Must be called from within a tokio runtime.
    pub fn spawn<F>(fut: F) -> Self
    where
        F: Future<Output = Result<String>> + Send + 'static,
    {
        Self {
            handle: tokio::spawn(fut),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Abort the request, releasing its connection.
    pub fn abort(&self) {
        self.handle.abort();
    }

    /// Wait for the response body. Returns immediately once `is_finished()`.
    pub async fn wait(&mut self) -> Result<String> {
        match (&mut self.handle).await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(NodeError::Cancelled),
            Err(e) => Err(NodeError::Task(e.to_string())),
        }
    }
}

impl Drop for PendingResponse {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Sends a serialized generation request.
///
/// Errors returned from [`submit`](Self::submit) mean nothing was sent.
/// Failures after that surface from [`PendingResponse::wait`].
pub trait Transport: Send + Sync {
    fn submit(&self, url: &str, body: String, auth_header: Option<String>) -> Result<PendingResponse>;
}

/// HTTP transport backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: Client,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Self {
        Self {
            http: Client::new(),
            timeout,
        }
    }

    /// Use a custom `reqwest::Client` (for connection pooling, proxies, TLS).
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(Duration::from_secs(300))
    }
}

impl Transport for HttpTransport {
    fn submit(&self, url: &str, body: String, auth_header: Option<String>) -> Result<PendingResponse> {
        let parsed = Url::parse(url).map_err(|e| NodeError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let mut builder = self
            .http
            .post(parsed)
            .timeout(self.timeout)
            .header(CONTENT_TYPE, "application/json")
            .body(body);
        if let Some(value) = auth_header {
            builder = builder.header(AUTHORIZATION, value);
        }
        let request = builder.build().map_err(|e| NodeError::Network {
            context: "Failed to build img2img request".into(),
            source: e,
        })?;

        let http = self.http.clone();
        let endpoint = url.to_string();
        Ok(PendingResponse::spawn(async move {
            let resp = http.execute(request).await.map_err(|e| NodeError::Network {
                context: format!("Cannot reach Stable Diffusion at {}. Is the server running?", endpoint),
                source: e,
            })?;

            if !resp.status().is_success() {
                let status = resp.status().as_u16();
                let body = resp.text().await.unwrap_or_default();
                return Err(NodeError::Http { status, body });
            }

            resp.text().await.map_err(|e| NodeError::Network {
                context: "Failed to read img2img response body".into(),
                source: e,
            })
        }))
    }
}
