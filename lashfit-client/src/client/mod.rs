//! Analysis service client abstraction and the HTTP implementation

mod http;

pub use http::HttpAnalysisClient;

use crate::selection::SelectedFile;
use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;

/// Decoded JSON body exactly as received, shape unknown
pub type RawResponseBody = serde_json::Value;

/// Outcome of one submit attempt
pub type AnalysisOutcome = Result<RawResponseBody, AnalysisError>;

/// Errors that end an analysis attempt
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("Could not reach the analysis service: {0}")]
    NetworkFailure(String),

    #[error("The analysis service rejected the request (HTTP {0})")]
    HttpError(StatusCode),

    #[error("The analysis service sent a response with no usable results")]
    MalformedResponse,

    /// Message reported by the service itself, shown verbatim
    #[error("{0}")]
    ServiceReported(String),
}

/// Health status of the analysis service
#[derive(Debug, Clone)]
pub struct HealthStatus {
    pub healthy: bool,
    pub latency_ms: Option<u64>,
    pub error: Option<String>,
}

/// Trait for analysis backends
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    /// Backend name for logging/identification
    fn name(&self) -> &str;

    /// Upload one file and return the decoded response body.
    ///
    /// Exactly one attempt is made per call.
    async fn submit(&self, file: &SelectedFile) -> AnalysisOutcome;

    /// Check whether the service is reachable
    async fn health_check(&self) -> HealthStatus;
}
