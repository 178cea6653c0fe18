// SPDX-FileCopyrightText: 2026 Chronicler Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the downstream writer service.
//!
//! [`HttpGenerator`] posts each [`GenerationRequest`] as JSON and maps the
//! response status onto the [`GenerationError`] taxonomy. It never retries;
//! retries belong to the rate-limited caller.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::ExposeSecret;
use serde::Deserialize;
use tracing::debug;

use chronicler_config::model::WriterConfig;
use chronicler_core::{
    AdapterType, ChroniclerError, Credential, GenerationError, GenerationRequest,
    GenerationResponse, GenerationService, HealthStatus, PluginAdapter,
};

/// Error body the writer may return alongside a non-2xx status.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Clone)]
pub struct HttpGenerator {
    client: reqwest::Client,
    endpoint: String,
    max_request_bytes: Option<usize>,
}

impl HttpGenerator {
    pub fn new(config: &WriterConfig) -> Result<Self, ChroniclerError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ChroniclerError::Provider {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            max_request_bytes: config.max_request_bytes,
        })
    }
}

#[async_trait]
impl PluginAdapter for HttpGenerator {
    fn name(&self) -> &str {
        "http-writer"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Generator
    }

    async fn health_check(&self) -> Result<HealthStatus, ChroniclerError> {
        match self.client.head(&self.endpoint).send().await {
            Ok(response) if response.status().is_server_error() => Ok(HealthStatus::Degraded(
                format!("writer returned {}", response.status()),
            )),
            Ok(_) => Ok(HealthStatus::Healthy),
            Err(e) => Ok(HealthStatus::Unhealthy(e.to_string())),
        }
    }
}

#[async_trait]
impl GenerationService for HttpGenerator {
    fn max_request_bytes(&self) -> Option<usize> {
        self.max_request_bytes
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
        credential: &Credential,
    ) -> Result<GenerationResponse, GenerationError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(credential.token.expose_secret())
            .header("idempotency-key", &request.key)
            .json(request)
            .send()
            .await
            .map_err(|e| GenerationError::Transient(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        debug!(status = %status, key = %request.key, credential = %credential.name, "writer responded");

        if status.is_success() {
            let body = response
                .text()
                .await
                .map_err(|e| GenerationError::Transient(format!("failed to read response: {e}")))?;
            return serde_json::from_str(&body)
                .map_err(|e| GenerationError::Rejected(format!("malformed writer response: {e}")));
        }

        let body = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<ErrorBody>(&body)
            .map(|b| b.error)
            .unwrap_or(body);
        Err(classify(status, detail, request.serialized_len(), self.max_request_bytes))
    }
}

fn classify(
    status: StatusCode,
    detail: String,
    request_bytes: usize,
    limit: Option<usize>,
) -> GenerationError {
    match status {
        StatusCode::PAYLOAD_TOO_LARGE => GenerationError::Overflow {
            request_bytes,
            limit,
        },
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
            GenerationError::Transient(format!("writer returned {status}: {detail}"))
        }
        s if s.is_server_error() => {
            GenerationError::Transient(format!("writer returned {status}: {detail}"))
        }
        _ => GenerationError::Rejected(format!("writer returned {status}: {detail}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronicler_core::RequestPurpose;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn generator(server: &MockServer) -> HttpGenerator {
        HttpGenerator::new(&WriterConfig {
            endpoint: format!("{}/v1/generate", server.uri()),
            timeout_secs: 5,
            max_request_bytes: Some(1_000),
        })
        .unwrap()
    }

    fn request() -> GenerationRequest {
        GenerationRequest {
            purpose: RequestPurpose::Window,
            model_id: "writer-1".to_string(),
            key: "abc:def:writer-1".to_string(),
            body: serde_json::json!({"messages": []}),
        }
    }

    fn credential() -> Credential {
        Credential::new("primary", "tok-123")
    }

    async fn respond_with(status: u16, body: serde_json::Value) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/generate"))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn success_parses_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/generate"))
            .and(header("authorization", "Bearer tok-123"))
            .and(header("idempotency-key", "abc:def:writer-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "result_reference": "posts/2026-01-01.md",
                "artifacts": ["post-1"]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let response = generator(&server)
            .generate(&request(), &credential())
            .await
            .unwrap();
        assert_eq!(response.result_reference, "posts/2026-01-01.md");
        assert_eq!(response.artifacts, vec!["post-1"]);
    }

    #[tokio::test]
    async fn payload_too_large_is_overflow() {
        let server = respond_with(413, serde_json::json!({"error": "too big"})).await;
        let err = generator(&server)
            .generate(&request(), &credential())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GenerationError::Overflow {
                limit: Some(1_000),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn rate_limit_and_server_errors_are_transient() {
        for status in [408, 429, 500, 501, 503, 507, 520, 529] {
            let server = respond_with(status, serde_json::json!({"error": "busy"})).await;
            let err = generator(&server)
                .generate(&request(), &credential())
                .await
                .unwrap_err();
            assert!(
                matches!(&err, GenerationError::Transient(m) if m.contains("busy")),
                "status {status} gave {err:?}"
            );
        }
    }

    #[tokio::test]
    async fn client_errors_are_rejected() {
        let server = respond_with(400, serde_json::json!({"error": "bad model"})).await;
        let err = generator(&server)
            .generate(&request(), &credential())
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Rejected(m) if m.contains("bad model")));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_transient() {
        let generator = HttpGenerator::new(&WriterConfig {
            endpoint: "http://127.0.0.1:9/v1/generate".to_string(),
            timeout_secs: 1,
            max_request_bytes: None,
        })
        .unwrap();
        let err = generator
            .generate(&request(), &credential())
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Transient(_)));
    }

    #[test]
    fn advertises_configured_limit() {
        let generator = HttpGenerator::new(&WriterConfig {
            endpoint: "http://localhost".to_string(),
            timeout_secs: 1,
            max_request_bytes: Some(42),
        })
        .unwrap();
        assert_eq!(generator.max_request_bytes(), Some(42));
    }
}
