//! Verification client - asks the roster backend whether a code may enter
//!
//! Wire format:
//! - Request: form-encoded POST, one field (default `qrCode`) holding the code
//! - Response: JSON object of string values, e.g.
//!   `{"status":"success","priority":"yes"}`
//! - `status == "success"` accepts; `priority` defaults to `"no"`
//!
//! The HTTP status code is not consulted; only the body decides.

use crate::domain::types::{DecodedCode, VerificationResponse, PRIORITY_DEFAULT, STATUS_SUCCESS};
use crate::infra::config::Config;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use std::collections::HashMap;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    /// No endpoint configured; every call fails without I/O
    #[error("verification endpoint not configured")]
    NotConfigured,
    #[error("invalid verification endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("verification request failed: {0}")]
    Transport(String),
    #[error("verification response had no body")]
    EmptyBody,
    #[error("verification response malformed: {0}")]
    Malformed(String),
}

impl VerifyError {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerifyError::NotConfigured => "not_configured",
            VerifyError::InvalidEndpoint(_) => "invalid_endpoint",
            VerifyError::Transport(_) => "transport",
            VerifyError::EmptyBody => "empty_body",
            VerifyError::Malformed(_) => "malformed",
        }
    }
}

/// Asynchronous request/response contract the desk depends on
#[async_trait]
pub trait Verifier: Send + Sync {
    async fn verify(&self, code: &DecodedCode) -> Result<VerificationResponse, VerifyError>;
}

/// Decode a backend response body
pub fn parse_response(body: &[u8]) -> Result<VerificationResponse, VerifyError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(VerifyError::EmptyBody);
    }

    // Every value must be a string, mirroring what the backend promises
    let map: HashMap<String, String> =
        serde_json::from_slice(body).map_err(|e| VerifyError::Malformed(e.to_string()))?;

    let success = map.get("status").is_some_and(|status| status == STATUS_SUCCESS);
    let priority = map.get("priority").map(String::as_str).unwrap_or(PRIORITY_DEFAULT);

    Ok(VerificationResponse::new(success, priority))
}

/// Verifier backed by an HTTP endpoint (e.g. a spreadsheet web app)
pub struct HttpVerifier {
    url: Option<String>,
    username: Option<String>,
    password: Option<String>,
    code_field: String,
    client: Option<reqwest::Client>,
}

impl HttpVerifier {
    pub fn new(config: &Config) -> Self {
        let Some(endpoint) = config.endpoint() else {
            warn!("verification_endpoint_missing: every scan will be rejected");
            return Self {
                url: None,
                username: None,
                password: None,
                code_field: config.code_field().to_string(),
                client: None,
            };
        };

        let (url, username, password) = Self::parse_url_with_auth(endpoint);

        // Create HTTP client once for reuse (connection pooling)
        let client = match reqwest::Client::builder()
            .timeout(config.verification_timeout())
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
        {
            Ok(client) => Some(client),
            Err(e) => {
                warn!(error = %e, "verification_client_build_failed");
                None
            }
        };

        Self {
            url: Some(url),
            username,
            password,
            code_field: config.code_field().to_string(),
            client,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.url.is_some() && self.client.is_some()
    }

    /// Endpoint without credentials
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// Parse URL and extract basic auth credentials if present
    fn parse_url_with_auth(url: &str) -> (String, Option<String>, Option<String>) {
        for scheme in ["https://", "http://"] {
            let Some(rest) = url.strip_prefix(scheme) else {
                continue;
            };
            // Credentials can only appear before the first '/'
            let authority_end = rest.find('/').unwrap_or(rest.len());
            if let Some(at_pos) = rest[..authority_end].rfind('@') {
                let auth_part = &rest[..at_pos];
                let host_part = &rest[at_pos + 1..];

                if let Some(colon_pos) = auth_part.find(':') {
                    let username = auth_part[..colon_pos].to_string();
                    let password = auth_part[colon_pos + 1..].to_string();
                    let clean_url = format!("{}{}", scheme, host_part);
                    return (clean_url, Some(username), Some(password));
                }
            }
        }
        (url.to_string(), None, None)
    }
}

#[async_trait]
impl Verifier for HttpVerifier {
    async fn verify(&self, code: &DecodedCode) -> Result<VerificationResponse, VerifyError> {
        let Some(ref url) = self.url else {
            return Err(VerifyError::NotConfigured);
        };
        let Some(ref client) = self.client else {
            return Err(VerifyError::NotConfigured);
        };

        let start = Instant::now();
        let mut request = client.post(url).form(&[(self.code_field.as_str(), code.as_str())]);

        if let (Some(username), Some(password)) = (&self.username, &self.password) {
            let credentials = format!("{}:{}", username, password);
            let encoded = STANDARD.encode(credentials.as_bytes());
            request = request.header("Authorization", format!("Basic {}", encoded));
        }

        let response = request.send().await.map_err(|e| {
            if e.is_builder() {
                VerifyError::InvalidEndpoint(e.to_string())
            } else {
                VerifyError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| VerifyError::Transport(e.to_string()))?;

        debug!(
            status = %status.as_u16(),
            bytes = %body.len(),
            latency_ms = %start.elapsed().as_millis(),
            "verification_response"
        );

        parse_response(&body)
    }
}
