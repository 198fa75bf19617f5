//! SMS delivery client for the pairing-link side channel.
//!
//! Link delivery is a convenience on top of the relay pairing: a failure
//! here surfaces as a typed error banner and leaves the relay pairing
//! (manual link copy) fully usable.

use std::env;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Environment variable holding the bearer token for the delivery endpoint.
const SMS_TOKEN_VAR: &str = "CROSSCAP_SMS_TOKEN";

/// Errors surfaced to the linking screen.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SmsError {
    /// Rejected before any network call is made.
    #[error("phone number failed validation")]
    InvalidNumber,

    /// The delivery endpoint rate-limited the request (HTTP 429).
    #[error("SMS delivery rate limit exceeded")]
    Overuse,

    /// Any other delivery failure.
    #[error("SMS delivery failed")]
    Failed,
}

/// Phone number as produced by the host's input widget. The widget owns
/// the actual validation; the core only honors its verdict and refuses to
/// send anything it marked invalid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhoneNumber {
    pub number: String,
    pub valid: bool,
}

impl PhoneNumber {
    pub fn valid(number: impl Into<String>) -> Self {
        Self {
            number: number.into(),
            valid: true,
        }
    }

    pub fn invalid(number: impl Into<String>) -> Self {
        Self {
            number: number.into(),
            valid: false,
        }
    }
}

/// Delivery capability, kept behind a trait so the linking screen can be
/// exercised against a test double.
#[async_trait]
pub trait SmsDelivery: Send + Sync {
    /// Deliver a pairing link to `to`. Fire-and-forget from the session's
    /// point of view; the result only drives the error banner.
    async fn send_link(
        &self,
        to: &PhoneNumber,
        link_id: &str,
        language: &str,
    ) -> Result<(), SmsError>;
}

#[derive(Debug, Serialize)]
struct SmsRequest<'a> {
    to: &'a str,
    id: &'a str,
    language: &'a str,
}

#[derive(Debug, Deserialize)]
struct SmsResponse {
    status: String,
}

/// HTTP client for the configured delivery endpoint.
pub struct SmsClient {
    endpoint: String,
    token: String,
    client: reqwest::Client,
}

impl SmsClient {
    pub fn new(endpoint: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("crosscap/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            endpoint: endpoint.into(),
            token: token.into(),
            client,
        })
    }

    /// Create a client from the `CROSSCAP_SMS_TOKEN` environment variable,
    /// or `None` when no token is configured.
    pub fn from_env(endpoint: impl Into<String>) -> Result<Option<Self>> {
        match env::var(SMS_TOKEN_VAR) {
            Ok(token) if !token.is_empty() => Ok(Some(Self::new(endpoint, token)?)),
            _ => Ok(None),
        }
    }

    /// Check if delivery credentials are configured.
    pub fn is_configured() -> bool {
        env::var(SMS_TOKEN_VAR).map(|t| !t.is_empty()).unwrap_or(false)
    }
}

#[async_trait]
impl SmsDelivery for SmsClient {
    async fn send_link(
        &self,
        to: &PhoneNumber,
        link_id: &str,
        language: &str,
    ) -> Result<(), SmsError> {
        if !to.valid || to.number.trim().is_empty() {
            return Err(SmsError::InvalidNumber);
        }

        let request = SmsRequest {
            to: &to.number,
            id: link_id,
            language,
        };
        debug!(endpoint = self.endpoint, id = link_id, "sending pairing SMS");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(&request)
            .send()
            .await
            .map_err(|err| {
                warn!(error = %err, "SMS delivery request failed");
                SmsError::Failed
            })?;

        classify_status(response.status())?;

        let body: SmsResponse = response.json().await.map_err(|err| {
            warn!(error = %err, "Failed to parse SMS delivery response");
            SmsError::Failed
        })?;
        classify_body(&body)
    }
}

fn classify_status(status: reqwest::StatusCode) -> Result<(), SmsError> {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(SmsError::Overuse);
    }
    if !status.is_success() {
        warn!(%status, "SMS delivery endpoint rejected request");
        return Err(SmsError::Failed);
    }
    Ok(())
}

/// A 2xx response still carries a status field; anything but `OK` is a
/// delivery failure.
fn classify_body(body: &SmsResponse) -> Result<(), SmsError> {
    if body.status == "OK" {
        Ok(())
    } else {
        warn!(status = %body.status, "SMS delivery reported failure");
        Err(SmsError::Failed)
    }
}
