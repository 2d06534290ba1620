//! HTTP analysis client (multipart upload over reqwest)

use super::{AnalysisBackend, AnalysisError, AnalysisOutcome, HealthStatus, RawResponseBody};
use crate::normalize::service_error_message;
use crate::selection::SelectedFile;
use crate::{ClientConfig, ConfigError};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode, Url};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Client for the remote lash analysis endpoint
pub struct HttpAnalysisClient {
    client: Client,
    endpoint: Url,
    field_name: String,
    name: String,
}

impl HttpAnalysisClient {
    /// Create a client from configuration
    pub fn new(config: &ClientConfig) -> Result<Self, ConfigError> {
        let endpoint = config.endpoint_url()?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()?;

        Ok(Self {
            name: format!("http:{}", endpoint.host_str().unwrap_or("unknown")),
            client,
            endpoint,
            field_name: config.field_name.clone(),
        })
    }

    /// The analysis route this client posts to
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn file_part(file: &SelectedFile) -> Part {
        let part = || Part::bytes(file.data().to_vec()).file_name(file.name().to_string());
        part().mime_str(file.media_type()).unwrap_or_else(|e| {
            debug!(media_type = file.media_type(), error = %e, "Sending part without content type");
            part()
        })
    }
}

/// Map a received status and body to an outcome.
///
/// Non-2xx responses carrying a service error message are reported as that
/// message; 2xx bodies are passed on whenever they decode as JSON.
pub(crate) fn classify_response(status: StatusCode, body: &[u8]) -> AnalysisOutcome {
    let parsed = serde_json::from_slice::<RawResponseBody>(body).ok();

    if !status.is_success() {
        return Err(match parsed.as_ref().and_then(service_error_message) {
            Some(message) => AnalysisError::ServiceReported(message),
            None => AnalysisError::HttpError(status),
        });
    }

    parsed.ok_or(AnalysisError::MalformedResponse)
}

fn describe_transport_error(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        "the request timed out".to_string()
    } else if error.is_connect() {
        "connection failed".to_string()
    } else {
        error.to_string()
    }
}

#[async_trait]
impl AnalysisBackend for HttpAnalysisClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn submit(&self, file: &SelectedFile) -> AnalysisOutcome {
        let form = Form::new().part(self.field_name.clone(), Self::file_part(file));

        info!(
            endpoint = %self.endpoint,
            file = file.name(),
            bytes = file.size(),
            "Submitting image for analysis"
        );
        let start = Instant::now();

        let response = match self
            .client
            .post(self.endpoint.clone())
            .multipart(form)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(endpoint = %self.endpoint, error = %e, "Analysis request failed");
                return Err(AnalysisError::NetworkFailure(describe_transport_error(&e)));
            }
        };

        let status = response.status();
        let body = response.bytes().await.map_err(|e| {
            warn!(status = %status, error = %e, "Failed to read analysis response body");
            AnalysisError::NetworkFailure(describe_transport_error(&e))
        })?;

        let latency_ms = start.elapsed().as_millis() as u64;
        debug!(status = %status, body_len = body.len(), latency_ms, "Analysis response received");

        let outcome = classify_response(status, &body);
        if let Err(e) = &outcome {
            warn!(status = %status, error = %e, "Analysis response rejected");
        }
        outcome
    }

    async fn health_check(&self) -> HealthStatus {
        let mut url = self.endpoint.clone();
        url.set_path("/");
        url.set_query(None);
        let start = Instant::now();

        match self.client.get(url).send().await {
            Ok(response) => {
                let latency = start.elapsed().as_millis() as u64;
                if response.status().is_success() {
                    HealthStatus {
                        healthy: true,
                        latency_ms: Some(latency),
                        error: None,
                    }
                } else {
                    HealthStatus {
                        healthy: false,
                        latency_ms: Some(latency),
                        error: Some(format!("HTTP {}", response.status())),
                    }
                }
            }
            Err(e) => HealthStatus {
                healthy: false,
                latency_ms: None,
                error: Some(describe_transport_error(&e)),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let config = ClientConfig {
            endpoint: "https://lashes.example.com/analyze_lash/".to_string(),
            ..ClientConfig::default()
        };
        let client = HttpAnalysisClient::new(&config).unwrap();
        assert_eq!(client.name(), "http:lashes.example.com");
        assert_eq!(client.endpoint().path(), "/analyze_lash/");
    }

    #[test]
    fn test_rejects_bad_endpoint() {
        let config = ClientConfig {
            endpoint: "lashes.example.com".to_string(),
            ..ClientConfig::default()
        };
        assert!(matches!(
            HttpAnalysisClient::new(&config),
            Err(ConfigError::InvalidEndpoint { .. })
        ));
    }

    #[test]
    fn test_classify_success_json() {
        let outcome = classify_response(StatusCode::OK, br#"{"eye_shape":"Round Eyes"}"#);
        assert_eq!(outcome.unwrap()["eye_shape"], "Round Eyes");
    }

    #[test]
    fn test_classify_success_error_flag_passes_through() {
        // 2xx bodies carrying an error are left for the normalizer
        let outcome = classify_response(StatusCode::OK, br#"{"error":"No face detected"}"#);
        assert!(outcome.is_ok());
    }

    #[test]
    fn test_classify_success_not_json() {
        let outcome = classify_response(StatusCode::OK, b"<html>gateway</html>");
        assert_eq!(outcome, Err(AnalysisError::MalformedResponse));
    }

    #[test]
    fn test_classify_http_error_with_detail() {
        let outcome = classify_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            br#"{"detail":"Model not loaded"}"#,
        );
        assert_eq!(
            outcome,
            Err(AnalysisError::ServiceReported("Model not loaded".to_string()))
        );
    }

    #[test]
    fn test_classify_validation_envelope() {
        let outcome = classify_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            br#"{"detail":[{"loc":["body","file"],"msg":"Field required","type":"missing"}]}"#,
        );
        assert_eq!(
            outcome,
            Err(AnalysisError::ServiceReported("Field required".to_string()))
        );
    }

    #[test]
    fn test_classify_http_error_without_diagnostics() {
        assert_eq!(
            classify_response(StatusCode::BAD_GATEWAY, b"Bad Gateway"),
            Err(AnalysisError::HttpError(StatusCode::BAD_GATEWAY))
        );
        assert_eq!(
            classify_response(StatusCode::NOT_FOUND, br#"{"message":"nope"}"#),
            Err(AnalysisError::HttpError(StatusCode::NOT_FOUND))
        );
    }
}
