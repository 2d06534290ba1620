//! Lashfit client - upload a photo, get a lash fit recommendation
//!
//! This crate provides:
//! - File selection with media type validation
//! - An HTTP client for the remote lash analysis service
//! - A tolerant normalizer for every response shape the service has shipped
//! - The upload state machine that owns the view state
//! - Presentation helpers for rendering results

pub mod client;
pub mod machine;
pub mod normalize;
pub mod presentation;
pub mod selection;
pub mod session;

pub use client::{AnalysisBackend, AnalysisError, HttpAnalysisClient, RawResponseBody};
pub use machine::{Admission, UploadStateMachine, ViewState};
pub use normalize::{AnalysisResult, normalize};
pub use selection::{FileCandidate, FileSelection, SelectedFile, SelectionError};
pub use session::UploadSession;

use reqwest::Url;
use std::path::Path;
use thiserror::Error;

/// Errors raised while loading or validating client configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },

    #[error("Invalid analysis endpoint {endpoint:?}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("Failed to create HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Configuration for talking to the analysis service
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct ClientConfig {
    /// Full URL of the analysis route (multipart POST target)
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Multipart field name the service reads the image from
    #[serde(default = "default_field_name")]
    pub field_name: String,

    /// Whole-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Connection establishment timeout in seconds
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_endpoint() -> String { "http://localhost:8000/analyze_lash/".to_string() }
fn default_field_name() -> String { "file".to_string() }
fn default_timeout_secs() -> u64 { 60 }
fn default_connect_timeout_secs() -> u64 { 10 }

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            field_name: default_field_name(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl ClientConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(contents: &str, origin: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: origin.to_string(),
            source,
        })
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: display.clone(),
            source,
        })?;
        Self::from_toml_str(&contents, &display)
    }

    /// Parse and check the endpoint: it must be an absolute http(s) URL
    pub fn endpoint_url(&self) -> Result<Url, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidEndpoint {
            endpoint: self.endpoint.clone(),
            reason,
        };

        let url = Url::parse(&self.endpoint).map_err(|e| invalid(e.to_string()))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(invalid(format!("unsupported scheme {other:?}"))),
        }
    }
}
