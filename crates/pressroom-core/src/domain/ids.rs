//! Domain identifiers (strongly-typed IDs).
//!
//! All ids are ULIDs wrapped in a phantom-typed `Id<T>`, so a `RunId` can never
//! be passed where an `AttemptId` is expected. ULIDs sort by creation time,
//! which keeps journal listings in submission order.
//!
//! Ids serialize as their display form (`run-01J...`), which is also what the
//! command line accepts back.

use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use ulid::Ulid;

/// Marker trait for each id kind.
pub trait IdMarker: Send + Sync + 'static {
    /// Display prefix (e.g. "run-").
    fn prefix() -> &'static str;
}

/// Generic id type. `T` only exists at compile time.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid id '{value}': expected '{prefix}' followed by a ULID")]
pub struct ParseIdError {
    value: String,
    prefix: &'static str,
}

impl<T: IdMarker> FromStr for Id<T> {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseIdError {
            value: s.to_string(),
            prefix: T::prefix(),
        };
        let raw = s.strip_prefix(T::prefix()).ok_or_else(invalid)?;
        let ulid = Ulid::from_string(raw).map_err(|_| invalid())?;
        Ok(Self::from_ulid(ulid))
    }
}

impl<T: IdMarker> Serialize for Id<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de, T: IdMarker> Deserialize<'de> for Id<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(D::Error::custom)
    }
}

// ========================================
// Markers
// ========================================

/// Marker for pipeline runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Run {}

impl IdMarker for Run {
    fn prefix() -> &'static str {
        "run-"
    }
}

/// Marker for step attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Attempt {}

impl IdMarker for Attempt {
    fn prefix() -> &'static str {
        "attempt-"
    }
}

/// Identifier of a pipeline run (submit/status/resume unit).
pub type RunId = Id<Run>;

/// Identifier of one execution try of a step.
pub type AttemptId = Id<Attempt>;
