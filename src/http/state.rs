//! Application state and configuration for the HTTP server.

use std::io;
use std::sync::Arc;

use time::OffsetDateTime;

use crate::reader::Reader;
use crate::registry::ArchivingRegistry;
use crate::settings::ArchivingSettings;
use crate::timeutil::epoch_now;

/// Application state shared across all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// Name resolution and attribute handles
    pub registry: Arc<ArchivingRegistry>,
    /// Fixed timestamp for deterministic responses (testing only)
    pub fixed_now: Option<OffsetDateTime>,
}

impl AppState {
    /// Create new application state.
    ///
    /// # Parameters
    ///
    /// - `registry` - Registry resolving names and holding attribute handles
    /// - `fixed_now` - Optional fixed timestamp for deterministic testing
    ///
    /// # Returns
    ///
    /// Returns configured `AppState` instance.
    pub fn new(registry: Arc<ArchivingRegistry>, fixed_now: Option<OffsetDateTime>) -> Self {
        Self { registry, fixed_now }
    }

    /// Epoch seconds used to anchor relative windows for one request.
    pub fn now(&self) -> f64 {
        epoch_now(self.fixed_now)
    }

    /// Get a builder for configuring application state step by step.
    ///
    /// # Returns
    ///
    /// Returns an `AppStateBuilder` for fluent configuration.
    pub fn builder() -> AppStateBuilder {
        AppStateBuilder::new()
    }
}

/// Builder for constructing AppState with fluent interface.
#[derive(Default)]
pub struct AppStateBuilder {
    reader: Option<Arc<dyn Reader>>,
    settings: Option<ArchivingSettings>,
    fixed_now: Option<OffsetDateTime>,
}

impl AppStateBuilder {
    /// Create a new builder with default values.
    ///
    /// # Returns
    ///
    /// Returns a new `AppStateBuilder` instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the reader serving archived samples.
    ///
    /// # Parameters
    ///
    /// - `reader` - Reader implementation to use
    ///
    /// # Returns
    ///
    /// Returns the builder for method chaining.
    pub fn with_reader(mut self, reader: Arc<dyn Reader>) -> Self {
        self.reader = Some(reader);
        self
    }

    /// Set the archiving settings.
    ///
    /// # Parameters
    ///
    /// - `settings` - Scheme, default authority, default window and cache policy
    ///
    /// # Returns
    ///
    /// Returns the builder for method chaining.
    pub fn with_settings(mut self, settings: ArchivingSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Set a fixed timestamp for deterministic testing.
    ///
    /// # Parameters
    ///
    /// - `fixed_now` - Fixed timestamp to use
    ///
    /// # Returns
    ///
    /// Returns the builder for method chaining.
    pub fn with_fixed_now(mut self, fixed_now: OffsetDateTime) -> Self {
        self.fixed_now = Some(fixed_now);
        self
    }

    /// Build the final AppState with validation.
    ///
    /// # Errors
    ///
    /// Returns error if no reader is provided or the settings are unusable.
    pub fn build(self) -> io::Result<AppState> {
        let reader = self.reader.ok_or(io::Error::new(
            io::ErrorKind::InvalidInput,
            "Reader is required for AppState",
        ))?;
        let settings = self.settings.unwrap_or_default();

        let registry = ArchivingRegistry::from_settings(&settings, reader)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        Ok(AppState::new(Arc::new(registry), self.fixed_now))
    }
}
