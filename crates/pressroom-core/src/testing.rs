//! Test doubles for the engine and mailer ports.
//!
//! Both are cheap to clone; clones share their counters, so a test keeps one
//! copy for assertions and hands another to the code under test.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;

use crate::ports::{
    CaptureOptions, DeliveryError, DeliveryReceipt, EngineError, Mailer, Page, Parcel, RenderEngine, Session,
    WaitUntil,
};

#[derive(Default)]
struct EngineCounters {
    launches: AtomicUsize,
    closes: AtomicUsize,
    captures: AtomicUsize,
    open_pages: AtomicUsize,
    failing_launches: AtomicUsize,
    failing_consent: AtomicBool,
    disconnected: AtomicBool,
}

/// Scripted rendering engine.
///
/// Captures are `%PDF-fake <url>`; see [`FakeEngine::document_for`].
#[derive(Clone, Default)]
pub struct FakeEngine {
    counters: Arc<EngineCounters>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn document_for(url: &str) -> Bytes {
        Bytes::from(format!("%PDF-fake {url}"))
    }

    /// Successful launches.
    pub fn launches(&self) -> usize {
        self.counters.launches.load(Ordering::SeqCst)
    }

    /// Sessions closed.
    pub fn closes(&self) -> usize {
        self.counters.closes.load(Ordering::SeqCst)
    }

    /// Documents captured.
    pub fn captures(&self) -> usize {
        self.counters.captures.load(Ordering::SeqCst)
    }

    /// Pages opened and not yet closed.
    pub fn open_pages(&self) -> usize {
        self.counters.open_pages.load(Ordering::SeqCst)
    }

    /// Make the next `n` launches fail.
    pub fn fail_next_launches(&self, n: usize) {
        self.counters.failing_launches.store(n, Ordering::SeqCst);
    }

    pub fn fail_consent(&self, fail: bool) {
        self.counters.failing_consent.store(fail, Ordering::SeqCst);
    }

    /// Report the current session as disconnected.
    pub fn disconnect(&self) {
        self.counters.disconnected.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl RenderEngine for FakeEngine {
    async fn launch(&self) -> Result<Box<dyn Session>, EngineError> {
        let counters = &self.counters;
        let failing = counters
            .failing_launches
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failing.is_ok() {
            return Err(EngineError::Launch("scripted launch failure".to_string()));
        }
        counters.launches.fetch_add(1, Ordering::SeqCst);
        counters.disconnected.store(false, Ordering::SeqCst);
        Ok(Box::new(FakeSession {
            counters: self.counters.clone(),
        }))
    }
}

struct FakeSession {
    counters: Arc<EngineCounters>,
}

#[async_trait]
impl Session for FakeSession {
    fn is_connected(&self) -> bool {
        !self.counters.disconnected.load(Ordering::SeqCst)
    }

    async fn new_page(&mut self) -> Result<Box<dyn Page>, EngineError> {
        self.counters.open_pages.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakePage {
            counters: self.counters.clone(),
            url: None,
        }))
    }

    async fn close(self: Box<Self>) -> Result<(), EngineError> {
        self.counters.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct FakePage {
    counters: Arc<EngineCounters>,
    url: Option<String>,
}

#[async_trait]
impl Page for FakePage {
    async fn goto(&mut self, url: &str, _wait_until: WaitUntil) -> Result<(), EngineError> {
        self.url = Some(url.to_string());
        Ok(())
    }

    async fn dismiss_consent(&mut self) -> Result<(), EngineError> {
        if self.counters.failing_consent.load(Ordering::SeqCst) {
            return Err(EngineError::Navigation {
                url: self.url.clone().unwrap_or_default(),
                reason: "no consent button found".to_string(),
            });
        }
        Ok(())
    }

    async fn pdf(&mut self, _options: &CaptureOptions) -> Result<Bytes, EngineError> {
        let url = self
            .url
            .as_deref()
            .ok_or_else(|| EngineError::Capture("no page loaded".to_string()))?;
        self.counters.captures.fetch_add(1, Ordering::SeqCst);
        Ok(FakeEngine::document_for(url))
    }

    async fn close(self: Box<Self>) -> Result<(), EngineError> {
        self.counters.open_pages.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
struct MailerState {
    parcels: Mutex<Vec<Parcel>>,
    failing_sends: AtomicUsize,
    rejecting: AtomicBool,
}

/// Mailer that keeps every parcel it was handed.
#[derive(Clone, Default)]
pub struct RecordingMailer {
    state: Arc<MailerState>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parcels delivered so far, in order.
    pub fn parcels(&self) -> Vec<Parcel> {
        self.state
            .parcels
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn deliveries(&self) -> usize {
        self.parcels().len()
    }

    /// Make the next `n` sends fail.
    pub fn fail_next(&self, n: usize) {
        self.state.failing_sends.store(n, Ordering::SeqCst);
    }

    /// Refuse every parcel as undeliverable.
    pub fn reject_all(&self, reject: bool) {
        self.state.rejecting.store(reject, Ordering::SeqCst);
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, parcel: &Parcel) -> Result<DeliveryReceipt, DeliveryError> {
        if self.state.rejecting.load(Ordering::SeqCst) {
            return Err(DeliveryError::Rejected(format!("mailbox {} does not exist", parcel.recipient)));
        }
        let failing = self
            .state
            .failing_sends
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failing.is_ok() {
            return Err(DeliveryError::Unavailable("scripted delivery failure".to_string()));
        }

        let mut parcels = self.state.parcels.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        parcels.push(parcel.clone());
        Ok(DeliveryReceipt {
            id: format!("receipt-{}", parcels.len()),
        })
    }
}
