//! HTTP client for delivering files to the upload endpoint.

use std::path::Path;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, StatusCode};

use crate::config::{AuthConfig, Config};
use crate::error::{Error, UploadError};
use crate::Result;

/// Cap on rejection bodies carried into logs.
const MAX_BODY_SNIPPET: usize = 256;

/// Response payload from a successful upload.
#[derive(Debug, Clone)]
pub struct UploadResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body, parsed as JSON when possible, raw text otherwise.
    pub body: serde_json::Value,
}

/// Client for uploading files to the configured endpoint.
///
/// Cheap to clone; all clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    endpoint: String,
    auth: AuthConfig,
}

impl ApiClient {
    /// Create a client for the given endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(endpoint: impl Into<String>, auth: AuthConfig, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("courier/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            endpoint: endpoint.into(),
            auth,
        })
    }

    /// Create a client from the service configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            config.api.endpoint.clone(),
            config.api.auth.clone(),
            config.request_timeout(),
        )
    }

    /// The configured endpoint URL.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Upload one file as a multipart POST.
    ///
    /// The file is re-read from disk on every call; handles are never held
    /// across attempts.
    ///
    /// # Errors
    ///
    /// Returns a classified `UploadError`: `Vanished` when the file is gone,
    /// `Rejected` on non-retryable HTTP status, `Transient` otherwise.
    pub async fn upload(&self, path: &Path) -> std::result::Result<UploadResponse, UploadError> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(UploadError::Vanished {
                    path: path.display().to_string(),
                })
            }
            Err(e) => {
                return Err(UploadError::Transient {
                    reason: format!("failed to read file: {e}"),
                })
            }
        };

        let file_name = path
            .file_name()
            .map_or_else(|| "file".to_string(), |n| n.to_string_lossy().into_owned());
        let size = bytes.len();

        let part = Part::bytes(bytes)
            .file_name(file_name.clone())
            .mime_str("application/xml")
            .map_err(|e| UploadError::Transient {
                reason: format!("failed to build multipart body: {e}"),
            })?;

        let form = Form::new()
            .part("file", part)
            .text("filename", file_name)
            .text("size", size.to_string())
            .text("path", path.display().to_string());

        let request = self.apply_auth(self.http.post(&self.endpoint).multipart(form));

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                return Err(UploadError::Transient {
                    reason: "request timed out".to_string(),
                })
            }
            Err(e) => {
                return Err(UploadError::Transient {
                    reason: format!("connection error: {e}"),
                })
            }
        };

        let status = response.status();

        if status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let body =
                serde_json::from_str(&text).unwrap_or_else(|_| serde_json::Value::String(text));
            return Ok(UploadResponse {
                status: status.as_u16(),
                body,
            });
        }

        // 429 is nominally a client error but signals load, not a malformed
        // request; treat it like a 5xx.
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Err(UploadError::Transient {
                reason: format!("HTTP {status}"),
            });
        }

        let body = response.text().await.unwrap_or_default();
        Err(UploadError::Rejected {
            status: status.as_u16(),
            body: snippet(&body),
        })
    }

    /// Probe the endpoint: HEAD first, GET fallback when HEAD is not
    /// allowed. Success is any status below 500.
    pub async fn test_connection(&self) -> bool {
        let head = self.apply_auth(self.http.head(&self.endpoint)).send().await;

        match head {
            Ok(response) if response.status() == StatusCode::METHOD_NOT_ALLOWED => {
                match self.apply_auth(self.http.get(&self.endpoint)).send().await {
                    Ok(response) => response.status().as_u16() < 500,
                    Err(e) => {
                        tracing::error!(error = %e, "API connection test failed");
                        false
                    }
                }
            }
            Ok(response) => response.status().as_u16() < 500,
            Err(e) => {
                tracing::error!(error = %e, "API connection test failed");
                false
            }
        }
    }

    fn apply_auth(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth {
            AuthConfig::None => request,
            AuthConfig::Bearer { token } => request.bearer_auth(token),
            AuthConfig::Basic { username, password } => {
                request.basic_auth(username, Some(password))
            }
        }
    }
}

fn snippet(body: &str) -> String {
    if body.len() <= MAX_BODY_SNIPPET {
        body.to_string()
    } else {
        let mut end = MAX_BODY_SNIPPET;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &body[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::AUTHORIZATION;
    use axum::http::HeaderMap;
    use axum::routing::post;
    use axum::Router;
    use std::fs;
    use std::net::SocketAddr;
    use tempfile::TempDir;

    async fn serve(router: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        addr
    }

    fn client_for(addr: SocketAddr, auth: AuthConfig) -> ApiClient {
        ApiClient::new(
            format!("http://{addr}/upload"),
            auth,
            Duration::from_secs(5),
        )
        .unwrap()
    }

    fn write_xml(tmp: &TempDir) -> std::path::PathBuf {
        let path = tmp.path().join("order.xml");
        fs::write(&path, "<order id=\"42\"/>").unwrap();
        path
    }

    #[tokio::test]
    async fn test_upload_success_parses_json_body() {
        let router = Router::new().route(
            "/upload",
            post(|| async { axum::Json(serde_json::json!({"status": "ok"})) }),
        );
        let addr = serve(router).await;
        let tmp = TempDir::new().unwrap();

        let client = client_for(addr, AuthConfig::None);
        let response = client.upload(&write_xml(&tmp)).await.unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.body["status"], "ok");
    }

    #[tokio::test]
    async fn test_upload_success_keeps_plain_text_body() {
        let router = Router::new().route("/upload", post(|| async { "accepted" }));
        let addr = serve(router).await;
        let tmp = TempDir::new().unwrap();

        let client = client_for(addr, AuthConfig::None);
        let response = client.upload(&write_xml(&tmp)).await.unwrap();

        assert_eq!(response.body, serde_json::Value::String("accepted".into()));
    }

    #[tokio::test]
    async fn test_upload_401_is_rejected() {
        let router = Router::new().route(
            "/upload",
            post(|| async { (StatusCode::UNAUTHORIZED, "bad credentials") }),
        );
        let addr = serve(router).await;
        let tmp = TempDir::new().unwrap();

        let client = client_for(addr, AuthConfig::None);
        let err = client.upload(&write_xml(&tmp)).await.unwrap_err();

        match err {
            UploadError::Rejected { status, body } => {
                assert_eq!(status, 401);
                assert_eq!(body, "bad credentials");
            }
            other => panic!("expected Rejected, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_upload_503_is_transient() {
        let router = Router::new().route(
            "/upload",
            post(|| async { StatusCode::SERVICE_UNAVAILABLE }),
        );
        let addr = serve(router).await;
        let tmp = TempDir::new().unwrap();

        let client = client_for(addr, AuthConfig::None);
        let err = client.upload(&write_xml(&tmp)).await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_upload_429_is_transient() {
        let router = Router::new().route(
            "/upload",
            post(|| async { StatusCode::TOO_MANY_REQUESTS }),
        );
        let addr = serve(router).await;
        let tmp = TempDir::new().unwrap();

        let client = client_for(addr, AuthConfig::None);
        let err = client.upload(&write_xml(&tmp)).await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_upload_missing_file_is_vanished() {
        let router = Router::new().route("/upload", post(|| async { StatusCode::OK }));
        let addr = serve(router).await;

        let client = client_for(addr, AuthConfig::None);
        let err = client
            .upload(Path::new("/nonexistent/ghost.xml"))
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::Vanished { .. }));
    }

    #[tokio::test]
    async fn test_bearer_auth_header_sent() {
        let router = Router::new().route(
            "/upload",
            post(|headers: HeaderMap| async move {
                let authorized = headers
                    .get(AUTHORIZATION)
                    .is_some_and(|v| v == "Bearer secret-token");
                if authorized {
                    StatusCode::OK
                } else {
                    StatusCode::UNAUTHORIZED
                }
            }),
        );
        let addr = serve(router).await;
        let tmp = TempDir::new().unwrap();

        let client = client_for(
            addr,
            AuthConfig::Bearer {
                token: "secret-token".to_string(),
            },
        );
        assert!(client.upload(&write_xml(&tmp)).await.is_ok());

        let unauthenticated = client_for(addr, AuthConfig::None);
        let err = unauthenticated.upload(&write_xml(&tmp)).await.unwrap_err();
        assert!(matches!(err, UploadError::Rejected { status: 401, .. }));
    }

    #[tokio::test]
    async fn test_basic_auth_header_sent() {
        let router = Router::new().route(
            "/upload",
            post(|headers: HeaderMap| async move {
                // "alice:hunter2" base64-encoded.
                let authorized = headers
                    .get(AUTHORIZATION)
                    .is_some_and(|v| v == "Basic YWxpY2U6aHVudGVyMg==");
                if authorized {
                    StatusCode::OK
                } else {
                    StatusCode::UNAUTHORIZED
                }
            }),
        );
        let addr = serve(router).await;
        let tmp = TempDir::new().unwrap();

        let client = client_for(
            addr,
            AuthConfig::Basic {
                username: "alice".to_string(),
                password: "hunter2".to_string(),
            },
        );
        assert!(client.upload(&write_xml(&tmp)).await.is_ok());
    }

    #[tokio::test]
    async fn test_connection_refused_is_transient() {
        // Bind and drop to get a port with nothing listening.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let tmp = TempDir::new().unwrap();

        let client = client_for(addr, AuthConfig::None);
        let err = client.upload(&write_xml(&tmp)).await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_connection_probe() {
        let router = Router::new().route("/upload", post(|| async { StatusCode::OK }));
        let addr = serve(router).await;

        let client = client_for(addr, AuthConfig::None);
        // HEAD on a POST-only route returns 405, and the GET fallback 405
        // too, which still counts as reachable.
        assert!(client.test_connection().await);
    }

    #[test]
    fn test_snippet_truncates_long_bodies() {
        let long = "x".repeat(1000);
        let short = snippet(&long);
        assert!(short.len() <= MAX_BODY_SNIPPET + 3);
        assert!(short.ends_with("..."));
        assert_eq!(snippet("short"), "short");
    }
}
