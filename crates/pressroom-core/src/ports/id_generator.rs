//! IdGenerator port - id generation.
//!
//! # Implementations
//! - **UlidGenerator**: ULID based, timestamp taken from a `Clock`.

use ulid::Ulid;

use crate::domain::ids::{AttemptId, RunId};
use crate::ports::Clock;

pub trait IdGenerator: Send + Sync {
    fn generate_run_id(&self) -> RunId;

    fn generate_attempt_id(&self) -> AttemptId;
}

/// ULID generator.
///
/// The timestamp part comes from the clock, so a `FixedClock` gives ids that
/// share a timestamp but still differ in their random part.
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    fn next_ulid(&self) -> Ulid {
        let timestamp_ms = u64::try_from(self.clock.now().timestamp_millis()).unwrap_or(0);
        Ulid::from_parts(timestamp_ms, rand::random())
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_run_id(&self) -> RunId {
        RunId::from(self.next_ulid())
    }

    fn generate_attempt_id(&self) -> AttemptId {
        AttemptId::from(self.next_ulid())
    }
}
