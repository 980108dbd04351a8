// src/network/oracle.rs
//! Work generation and validation service client
//!
//! The coordinator obtains task payloads from, and submits candidates to,
//! an external HTTP service. [`WorkOracle`] is the seam the dispatcher and
//! validator talk to; [`HttpOracle`] is the production binding.

use crate::utils::error::OracleError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;
use url::Url;

/// Configuration for the work generation / validation service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OracleConfig {
    /// Endpoint returning `{"data": "<payload>"}` for `?d=<difficulty>`
    pub work_url: String,
    /// Endpoint accepting `{"d", "n", "h"}` candidates
    pub validate_url: String,
    /// Optional bearer token sent with every request
    pub token: Option<String>,
    /// Per-request timeout in milliseconds
    pub timeout_ms: u64,
    /// Validation attempts before a candidate is reported indeterminate
    pub validate_attempts: u32,
}

impl Default for OracleConfig {
    fn default() -> Self {
        OracleConfig {
            work_url: "http://127.0.0.1:8080/generate_work".into(),
            validate_url: "http://127.0.0.1:8080/validate_work".into(),
            token: None,
            timeout_ms: 10_000,
            validate_attempts: 3,
        }
    }
}

/// Outcome of a validation request the service actually answered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The candidate solves the task
    Accepted,
    /// The candidate was refused, with the service's reason
    Rejected(String),
}

/// Remote work generation and validation
#[async_trait]
pub trait WorkOracle: Send + Sync {
    /// Fetches the payload of a new task at `difficulty`
    async fn generate_work(&self, difficulty: u32) -> Result<String, OracleError>;

    /// Asks whether `(difficulty, nonce_hex, hash)` solves the current task
    async fn validate_work(
        &self,
        difficulty: u32,
        nonce_hex: &str,
        hash: &str,
    ) -> Result<Verdict, OracleError>;
}

/// HTTP binding of [`WorkOracle`]
pub struct HttpOracle {
    /// HTTP client carrying the request timeout
    client: Client,
    /// Parsed work generation endpoint
    work_url: Url,
    /// Parsed validation endpoint
    validate_url: Url,
    /// Bearer token, if configured
    token: Option<String>,
}

impl HttpOracle {
    /// Creates a client for the service described by `config`
    ///
    /// # Errors
    /// Returns `OracleError` if either URL is invalid or the HTTP client
    /// cannot be built
    pub fn new(config: &OracleConfig) -> Result<Self, OracleError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(format!("hashswarm-rs/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(HttpOracle {
            client,
            work_url: Url::parse(&config.work_url)?,
            validate_url: Url::parse(&config.validate_url)?,
            token: config.token.clone(),
        })
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl WorkOracle for HttpOracle {
    async fn generate_work(&self, difficulty: u32) -> Result<String, OracleError> {
        let mut url = self.work_url.clone();
        url.query_pairs_mut()
            .append_pair("d", &difficulty.to_string());

        let response = self.authorize(self.client.get(url)).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(OracleError::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let body = response.text().await?;
        let json: Value = serde_json::from_str(&body)
            .map_err(|e| OracleError::Malformed(format!("Work response is not JSON: {}", e)))?;

        let data = json["data"]
            .as_str()
            .ok_or_else(|| OracleError::Malformed("Missing data".to_string()))?;
        Ok(data.to_string())
    }

    async fn validate_work(
        &self,
        difficulty: u32,
        nonce_hex: &str,
        hash: &str,
    ) -> Result<Verdict, OracleError> {
        let response = self
            .authorize(self.client.post(self.validate_url.clone()))
            .json(&json!({
                "d": difficulty,
                "n": nonce_hex,
                "h": hash
            }))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status.is_success() {
            Ok(Verdict::Accepted)
        } else if status.is_client_error() {
            Ok(Verdict::Rejected(body))
        } else {
            Err(OracleError::Status {
                status: status.as_u16(),
                body,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Answers a single HTTP request with `status` and `body`, returning the raw request.
    async fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                if n == 0 || request_complete(&request) {
                    break;
                }
            }
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            String::from_utf8_lossy(&request).into_owned()
        });

        (base, handle)
    }

    fn request_complete(request: &[u8]) -> bool {
        let text = String::from_utf8_lossy(request);
        let Some(end) = text.find("\r\n\r\n") else {
            return false;
        };
        let length = text[..end]
            .lines()
            .find_map(|l| {
                let (name, value) = l.split_once(':')?;
                name.eq_ignore_ascii_case("content-length").then(|| value.trim().parse::<usize>().ok())?
            })
            .unwrap_or(0);
        request.len() >= end + 4 + length
    }

    fn oracle(base: &str, token: Option<&str>) -> HttpOracle {
        HttpOracle::new(&OracleConfig {
            work_url: format!("{}/generate_work", base),
            validate_url: format!("{}/validate_work", base),
            token: token.map(str::to_string),
            timeout_ms: 5_000,
            validate_attempts: 1,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_generate_work_returns_data_field() {
        let (base, server) = serve_once("200 OK", r#"{"data":"f00dcafe"}"#).await;
        let payload = oracle(&base, Some("t0k3n")).generate_work(3).await.unwrap();
        assert_eq!(payload, "f00dcafe");

        let request = server.await.unwrap();
        assert!(request.starts_with("GET /generate_work?d=3 "), "got {}", request);
        assert!(request.to_ascii_lowercase().contains("authorization: bearer t0k3n"));
    }

    #[tokio::test]
    async fn test_generate_work_requires_string_data() {
        let (base, _server) = serve_once("200 OK", r#"{"data":42}"#).await;
        let result = oracle(&base, None).generate_work(1).await;
        assert!(matches!(result, Err(OracleError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_generate_work_reports_status() {
        let (base, _server) = serve_once("503 Service Unavailable", "busy").await;
        let result = oracle(&base, None).generate_work(1).await;
        assert!(matches!(result, Err(OracleError::Status { status: 503, .. })));
    }

    #[tokio::test]
    async fn test_validate_posts_candidate() {
        let (base, server) = serve_once("200 OK", "{}").await;
        let verdict = oracle(&base, None).validate_work(2, "1f", "00ab").await.unwrap();
        assert_eq!(verdict, Verdict::Accepted);

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /validate_work "));
        let body = &request[request.find("\r\n\r\n").unwrap() + 4..];
        let json: Value = serde_json::from_str(body).unwrap();
        assert_eq!(json, json!({"d": 2, "n": "1f", "h": "00ab"}));
    }

    #[tokio::test]
    async fn test_validate_client_error_is_rejection() {
        let (base, _server) = serve_once("400 Bad Request", "wrong nonce").await;
        let verdict = oracle(&base, None).validate_work(2, "1f", "00ab").await.unwrap();
        assert_eq!(verdict, Verdict::Rejected("wrong nonce".into()));
    }

    #[tokio::test]
    async fn test_validate_server_error_is_indeterminate() {
        let (base, _server) = serve_once("500 Internal Server Error", "oops").await;
        let result = oracle(&base, None).validate_work(2, "1f", "00ab").await;
        assert!(matches!(result, Err(OracleError::Status { status: 500, .. })));
    }

    #[test]
    fn test_invalid_url_is_rejected() {
        let config = OracleConfig {
            work_url: "not a url".into(),
            ..OracleConfig::default()
        };
        assert!(matches!(HttpOracle::new(&config), Err(OracleError::Url(_))));
    }
}
