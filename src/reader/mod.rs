//! Archived data readers.
//!
//! The cache never talks to an archiving database directly: it goes through
//! a [`Reader`], which returns raw `(timestamp, value)` pairs for one
//! attribute path and window. [`FixtureReader`] is an in-memory
//! implementation backed by YAML fixtures.

pub mod fixture;

pub use fixture::{FixtureError, FixtureReader};

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures reported by a reader. The cache surfaces all of them as
/// `ArchivingError::BackendUnavailable`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReaderError {
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("backend error: {0}")]
    Backend(String),
}

/// Value of one archived sample as returned by a reader.
///
/// Arrays are nested lists; shape checks happen when the cache decodes them.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum SampleValue {
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<SampleValue>),
}

impl From<f64> for SampleValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<bool> for SampleValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for SampleValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl<T: Into<Self>> From<Vec<T>> for SampleValue {
    fn from(v: Vec<T>) -> Self {
        Self::List(v.into_iter().map(Into::into).collect())
    }
}

/// One `(timestamp, value)` pair; deserializes from a two-element sequence.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RawSample {
    /// Epoch seconds
    pub timestamp: f64,
    pub value: SampleValue,
}

impl RawSample {
    /// Create a new raw sample.
    ///
    /// # Parameters
    ///
    /// - `timestamp` - Epoch seconds
    /// - `value` - Sample value
    ///
    /// # Returns
    ///
    /// Returns a new `RawSample` instance.
    pub fn new(timestamp: f64, value: impl Into<SampleValue>) -> Self {
        Self { timestamp, value: value.into() }
    }
}

/// Source of archived samples.
///
/// Implementations must be shareable across threads; the cache calls them
/// synchronously and at most once at a time per cached attribute.
pub trait Reader: Send + Sync {
    /// Fetch the samples of `attribute` inside `[start, end]`.
    ///
    /// # Parameters
    ///
    /// - `attribute` - Attribute path (full name or alias)
    /// - `start` - Window start, epoch seconds
    /// - `end` - Window end, epoch seconds
    /// - `decimate` - Whether the backend may downsample the result
    ///
    /// # Returns
    ///
    /// Returns the samples in chronological order, possibly none.
    ///
    /// # Errors
    ///
    /// Returns `ReaderError` when the backend cannot be queried.
    fn fetch(
        &self,
        attribute: &str,
        start: f64,
        end: f64,
        decimate: bool,
    ) -> Result<Vec<RawSample>, ReaderError>;

    /// Backend type name of `attribute` (e.g. `DevDouble`), if known.
    fn attribute_type(&self, _attribute: &str) -> Option<String> {
        None
    }

    /// Attribute paths archived by the backend.
    ///
    /// # Parameters
    ///
    /// - `active` - Only list attributes that are currently being archived
    ///
    /// # Errors
    ///
    /// Returns `ReaderError` when the backend cannot be queried.
    fn archived_attributes(&self, _active: bool) -> Result<Vec<String>, ReaderError> {
        Ok(Vec::new())
    }
}
