//! Inbound render requests and their validation.
//!
//! A request is validated once, before any run exists. After that it is
//! immutable input to the pipeline.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// `None` rejects every address.
static EMAIL: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?)+$").ok()
});

/// Rejection reasons for a malformed request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid URL scheme '{0}': only http and https are supported")]
    UnsupportedScheme(String),

    #[error("Invalid email address: {0}")]
    InvalidEmail(String),
}

/// What a pipeline run works on: one URL and one recipient.
///
/// The URL is kept exactly as submitted because it doubles as the cache key.
/// Deserialization goes through [`RenderRequest::new`], so a journal entry
/// edited by hand is validated like a fresh submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawRenderRequest")]
pub struct RenderRequest {
    url: String,
    recipient: String,
}

#[derive(Deserialize)]
struct RawRenderRequest {
    url: String,
    recipient: String,
}

impl TryFrom<RawRenderRequest> for RenderRequest {
    type Error = ValidationError;

    fn try_from(raw: RawRenderRequest) -> Result<Self, Self::Error> {
        RenderRequest::new(raw.url, raw.recipient)
    }
}

impl RenderRequest {
    /// Validate and build a request.
    pub fn new(url: impl Into<String>, recipient: impl Into<String>) -> Result<Self, ValidationError> {
        let url = url.into();
        let recipient = recipient.into();

        let parsed = url::Url::parse(&url).map_err(|e| ValidationError::InvalidUrl(format!("{url} ({e})")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ValidationError::UnsupportedScheme(parsed.scheme().to_string()));
        }
        if !EMAIL.as_ref().is_some_and(|re| re.is_match(&recipient)) {
            return Err(ValidationError::InvalidEmail(recipient));
        }

        Ok(Self { url, recipient })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn recipient(&self) -> &str {
        &self.recipient
    }
}
