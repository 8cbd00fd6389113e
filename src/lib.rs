//! # Archiving URI Library
//!
//! Resolution, validation and read-through caching of archived attribute
//! names such as `tgarch://host:10000/sys/tg_test/1/ampli?db=hdbpp;t0=-1d`.
//!
//! This library provides components for:
//! - **Name Grammar**: Matches authority, device and attribute names per scheme flavor
//! - **Canonicalization**: Complete, normal and short forms with defaults filled in
//! - **Time Expressions**: Epoch numbers, `now`, relative durations and local date-times
//! - **Attribute Cache**: Value and timestamp series refreshed atomically from a [`Reader`]
//! - **Registry**: Shared read-only attribute handles keyed by complete name
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use archiving_uri::{ArchivingRegistry, ArchivingSettings, FixtureReader};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = ArchivingSettings {
//!     default_authority: Some("tango.example.org:10000".into()),
//!     ..ArchivingSettings::default()
//! };
//! let reader = Arc::new(FixtureReader::load_from_path("fixtures.yaml")?);
//! let registry = ArchivingRegistry::from_settings(&settings, reader)?;
//!
//! let attribute = registry.attribute("tgarch:/sys/tg_test/1/ampli?t0=-2h", 1_641_038_400.0)?;
//! println!("{} has {} samples", attribute.label(), attribute.read()?.len());
//! # Ok(())
//! # }
//! ```

pub mod attribute;
pub mod cache;
pub mod error;
pub mod http;
pub mod names;
pub mod reader;
pub mod registry;
pub mod settings;
pub mod timeutil;

// Re-export commonly used types for convenience
pub use attribute::ArchivedAttribute;
pub use cache::{AttributeCache, AttributeSeries, DataFormat, DataType, ViewPolicy};
pub use error::ArchivingError;
pub use names::{Canonicalizer, ElementKind, NameGrammar, Scheme};
pub use reader::{FixtureReader, RawSample, Reader, SampleValue};
pub use registry::ArchivingRegistry;
pub use settings::ArchivingSettings;
pub use timeutil::TimeResolver;
