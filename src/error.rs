//! Error taxonomy for name resolution and archived data access.

use thiserror::Error;

/// Errors surfaced by name resolution, the attribute cache and attribute handles.
///
/// All variants are local and synchronous: nothing here is retried internally.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArchivingError {
    /// The name does not match the grammar for the requested kind, or
    /// violates a semantic rule (duplicated query key, unresolvable time).
    #[error("invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: String },
    /// A write was attempted through an archived attribute.
    #[error("archived attribute '{name}' is read-only")]
    ReadOnly { name: String },
    /// Decoded samples have a shape outside {scalar, 1-D, 2-D}.
    #[error("unsupported sample shape: {reason}")]
    UnsupportedShape { reason: String },
    /// The backing reader failed.
    #[error("archiving backend unavailable: {reason}")]
    BackendUnavailable { reason: String },
}

impl ArchivingError {
    /// Build an `InvalidName` error.
    ///
    /// # Parameters
    ///
    /// - `name` - The offending name as written by the caller
    /// - `reason` - Short description of the violated rule
    pub fn invalid_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidName { name: name.into(), reason: reason.into() }
    }

    /// Short machine-readable tag used in API responses.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InvalidName { .. } => "bad_data",
            Self::ReadOnly { .. } => "read_only",
            Self::UnsupportedShape { .. } => "unsupported_shape",
            Self::BackendUnavailable { .. } => "unavailable",
        }
    }
}

/// Convenience alias used across the crate.
pub type Result<T, E = ArchivingError> = std::result::Result<T, E>;
