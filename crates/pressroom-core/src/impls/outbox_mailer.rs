//! OutboxMailer - delivers parcels into a directory.
//!
//! Each parcel becomes two files: `<id>-<attachment>` holding the document
//! and `<id>.json` holding the envelope. The id is the receipt.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Serialize;
use tokio::fs;
use ulid::Ulid;

use crate::ports::{DeliveryError, DeliveryReceipt, Mailer, Parcel};

#[derive(Serialize)]
struct Envelope<'a> {
    id: &'a str,
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
    attachment: &'a str,
    content_type: &'a str,
    size: usize,
}

pub struct OutboxMailer {
    dir: PathBuf,
}

impl OutboxMailer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl Mailer for OutboxMailer {
    async fn send(&self, parcel: &Parcel) -> Result<DeliveryReceipt, DeliveryError> {
        fs::create_dir_all(&self.dir).await?;

        let id = Ulid::new().to_string();
        let attachment_name = format!("{id}-{}", parcel.attachment.filename);
        fs::write(self.dir.join(&attachment_name), &parcel.attachment.content).await?;

        let envelope = Envelope {
            id: &id,
            from: &parcel.sender,
            to: &parcel.recipient,
            subject: &parcel.subject,
            text: &parcel.text,
            attachment: &attachment_name,
            content_type: &parcel.attachment.content_type,
            size: parcel.attachment.content.len(),
        };
        let body = serde_json::to_vec_pretty(&envelope).map_err(|e| DeliveryError::Rejected(e.to_string()))?;
        fs::write(self.dir.join(format!("{id}.json")), body).await?;

        tracing::info!(receipt = %id, to = %parcel.recipient, "parcel written to outbox");
        Ok(DeliveryReceipt { id })
    }
}
