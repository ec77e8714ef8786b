//! Ports - the external seams of the pipeline.
//!
//! Each trait hides one collaborator: where documents are cached, how pages
//! are rendered, how parcels are delivered, where runs are journaled, and
//! where time and ids come from.

pub mod clock;
pub mod content_cache;
pub mod engine;
pub mod id_generator;
pub mod mailer;
pub mod run_store;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::content_cache::{CacheError, ContentCache};
pub use self::engine::{CaptureOptions, EngineError, Page, RenderEngine, Session, WaitUntil};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::mailer::{Attachment, DeliveryError, DeliveryReceipt, DocumentFormat, Mailer, PARCEL_SUBJECT, Parcel};
pub use self::run_store::{RunStore, StoreError};
