//! HttpSnapshotEngine - a rendering engine without a browser.
//!
//! The session is a `reqwest::Client`. Navigation fetches the URL and counts
//! as quiet once the whole body arrived; the capture is that body.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::ports::{CaptureOptions, EngineError, Page, RenderEngine, Session, WaitUntil};

pub struct HttpSnapshotEngine {
    navigation_timeout: Duration,
    user_agent: String,
}

impl HttpSnapshotEngine {
    pub fn new(navigation_timeout: Duration) -> Self {
        Self {
            navigation_timeout,
            user_agent: format!("pressroom/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

#[async_trait]
impl RenderEngine for HttpSnapshotEngine {
    async fn launch(&self) -> Result<Box<dyn Session>, EngineError> {
        let client = reqwest::Client::builder()
            .timeout(self.navigation_timeout)
            .user_agent(self.user_agent.clone())
            .build()
            .map_err(|e| EngineError::Launch(e.to_string()))?;
        tracing::debug!("http snapshot session launched");
        Ok(Box::new(HttpSession { client }))
    }
}

struct HttpSession {
    client: reqwest::Client,
}

#[async_trait]
impl Session for HttpSession {
    fn is_connected(&self) -> bool {
        true
    }

    async fn new_page(&mut self) -> Result<Box<dyn Page>, EngineError> {
        Ok(Box::new(HttpPage {
            client: self.client.clone(),
            body: None,
        }))
    }

    async fn close(self: Box<Self>) -> Result<(), EngineError> {
        Ok(())
    }
}

struct HttpPage {
    client: reqwest::Client,
    body: Option<Bytes>,
}

#[async_trait]
impl Page for HttpPage {
    async fn goto(&mut self, url: &str, _wait_until: WaitUntil) -> Result<(), EngineError> {
        let navigation = |e: reqwest::Error| EngineError::Navigation {
            url: url.to_string(),
            reason: e.to_string(),
        };
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(navigation)?;
        self.body = Some(response.bytes().await.map_err(navigation)?);
        Ok(())
    }

    async fn dismiss_consent(&mut self) -> Result<(), EngineError> {
        Err(EngineError::Unsupported("consent dismissal"))
    }

    async fn pdf(&mut self, _options: &CaptureOptions) -> Result<Bytes, EngineError> {
        self.body
            .clone()
            .ok_or_else(|| EngineError::Capture("no page loaded".to_string()))
    }

    async fn close(self: Box<Self>) -> Result<(), EngineError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn page() -> Box<dyn Page> {
        let engine = HttpSnapshotEngine::new(Duration::from_secs(5));
        let mut session = engine.launch().await.unwrap();
        session.new_page().await.unwrap()
    }

    #[tokio::test]
    async fn captures_fetched_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/a")
            .with_status(200)
            .with_body("<html>article</html>")
            .create_async()
            .await;

        let mut page = page().await;
        let url = format!("{}/a", server.url());
        page.goto(&url, WaitUntil::NETWORK_QUIET).await.unwrap();
        let doc = page.pdf(&CaptureOptions::default()).await.unwrap();

        assert_eq!(doc, Bytes::from_static(b"<html>article</html>"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn error_status_fails_navigation() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server.mock("GET", "/gone").with_status(404).create_async().await;

        let mut page = page().await;
        let url = format!("{}/gone", server.url());
        let err = page.goto(&url, WaitUntil::NETWORK_QUIET).await.unwrap_err();
        assert!(matches!(err, EngineError::Navigation { .. }));
    }

    #[tokio::test]
    async fn capture_before_navigation_fails() {
        let mut page = page().await;
        let err = page.pdf(&CaptureOptions::default()).await.unwrap_err();
        assert!(matches!(err, EngineError::Capture(_)));
    }

    #[tokio::test]
    async fn consent_dismissal_is_unsupported() {
        let mut page = page().await;
        assert!(matches!(
            page.dismiss_consent().await,
            Err(EngineError::Unsupported(_))
        ));
    }
}
