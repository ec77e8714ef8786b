//! Mailer port - delivery of a rendered document to its recipient.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const PARCEL_SUBJECT: &str = "New Webpage Order Just Got Delivered! 🚚";

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("delivery rejected: {0}")]
    Rejected(String),

    #[error("delivery channel unavailable: {0}")]
    Unavailable(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// File format of a rendered document, read from its leading bytes.
///
/// An engine without a print backend hands back the fetched page itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Html,
    Unknown,
}

impl DocumentFormat {
    pub fn detect(document: &[u8]) -> Self {
        if document.starts_with(b"%PDF-") {
            return DocumentFormat::Pdf;
        }
        let body = document.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(document);
        match body.iter().find(|b| !b.is_ascii_whitespace()) {
            Some(b'<') => DocumentFormat::Html,
            _ => DocumentFormat::Unknown,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "pdf",
            DocumentFormat::Html => "html",
            DocumentFormat::Unknown => "bin",
        }
    }

    pub fn content_type(self) -> String {
        mime_guess::from_ext(self.extension()).first_or_octet_stream().to_string()
    }
}

/// A named file attached to a parcel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    pub content: Bytes,
}

/// One outgoing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parcel {
    pub sender: String,
    pub recipient: String,
    pub subject: String,
    pub text: String,
    pub attachment: Attachment,
}

impl Parcel {
    /// Build the delivery for a document rendered from `source_url`.
    ///
    /// The attachment is named after the slug of the URL, with an extension
    /// matching the document's format.
    pub fn compose(sender: &str, recipient: &str, document: Bytes, source_url: &str) -> Self {
        let format = DocumentFormat::detect(&document);
        Self {
            sender: sender.to_string(),
            recipient: recipient.to_string(),
            subject: PARCEL_SUBJECT.to_string(),
            text: format!(
                "Hey there, here's your freshly baked webpage from pressroom. Enjoy! \n\n Generated from {source_url}"
            ),
            attachment: Attachment {
                filename: format!("{}.{}", slug::slugify(source_url), format.extension()),
                content_type: format.content_type(),
                content: document,
            },
        }
    }
}

/// What the delivery channel reports back on success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    pub id: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, parcel: &Parcel) -> Result<DeliveryReceipt, DeliveryError>;
}
