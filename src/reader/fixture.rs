//! In-memory reader loaded from YAML fixtures.
//!
//! ```yaml
//! max_points: 500
//! attributes:
//!   - name: sys/tg_test/1/double_scalar
//!     type: DevDouble
//!     samples:
//!       - [1641038400, 1.5]
//!       - [1641038460, 1.75]
//! ```

use std::{
    fs,
    path::Path,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        PoisonError, RwLock,
    },
};

use fnv::FnvHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::reader::{RawSample, Reader, ReaderError};

/// Default cap on the number of samples returned with decimation.
pub const DEFAULT_MAX_POINTS: usize = 1000;

/// Errors that can occur when loading fixtures.
#[derive(Debug, Error)]
pub enum FixtureError {
    /// I/O error while reading fixture file.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    /// YAML parsing error.
    #[error("yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Fixture file layout.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FixtureFile {
    /// Cap applied when decimation is requested.
    pub max_points: Option<usize>,
    #[serde(default)]
    pub attributes: Vec<FixtureAttribute>,
}

/// One archived attribute and its samples.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FixtureAttribute {
    /// Attribute path, matched case-insensitively.
    pub name: String,
    /// Backend type name reported to the cache.
    #[serde(rename = "type")]
    pub data_type: Option<String>,
    /// Whether the attribute is still being archived.
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub samples: Vec<RawSample>,
}

const fn default_active() -> bool {
    true
}

/// Reader serving fixture samples from memory.
pub struct FixtureReader {
    /// Map from lowercased attribute path to its fixture
    attributes: RwLock<FnvHashMap<String, FixtureAttribute>>,
    max_points: usize,
    online: AtomicBool,
    fetches: AtomicUsize,
}

impl Default for FixtureReader {
    fn default() -> Self {
        Self::new()
    }
}

impl FixtureReader {
    /// Create an empty reader.
    ///
    /// # Returns
    ///
    /// Returns a new online `FixtureReader` with no attributes.
    pub fn new() -> Self {
        Self::with_max_points(DEFAULT_MAX_POINTS)
    }

    /// Create an empty reader with a custom decimation cap.
    pub fn with_max_points(max_points: usize) -> Self {
        Self {
            attributes: RwLock::new(FnvHashMap::default()),
            max_points: max_points.max(1),
            online: AtomicBool::new(true),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Load fixtures from a YAML file.
    ///
    /// # Parameters
    ///
    /// - `path` - Path to the YAML fixtures file
    ///
    /// # Returns
    ///
    /// Returns `Ok(FixtureReader)` on success, or `FixtureError` if the file cannot be read or parsed.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, FixtureError> {
        let txt = fs::read_to_string(path)?;
        Self::from_yaml_str(&txt)
    }

    /// Parse fixtures from YAML text.
    ///
    /// # Errors
    ///
    /// Returns `FixtureError::Yaml` on malformed input.
    pub fn from_yaml_str(txt: &str) -> Result<Self, FixtureError> {
        let file: FixtureFile = serde_yaml::from_str(txt)?;
        let reader = Self::with_max_points(file.max_points.unwrap_or(DEFAULT_MAX_POINTS));
        for attribute in file.attributes {
            reader.insert(attribute);
        }
        Ok(reader)
    }

    /// Add or replace an attribute. Samples are kept sorted by timestamp.
    pub fn insert(&self, mut attribute: FixtureAttribute) {
        attribute.samples.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
        let key = attribute.name.to_ascii_lowercase();
        self.attributes.write().unwrap_or_else(PoisonError::into_inner).insert(key, attribute);
    }

    /// Add or replace an active attribute from its parts.
    ///
    /// # Parameters
    ///
    /// - `name` - Attribute path
    /// - `data_type` - Backend type name, if any
    /// - `samples` - Samples in any order
    pub fn add_attribute(
        &self,
        name: impl Into<String>,
        data_type: Option<&str>,
        samples: Vec<RawSample>,
    ) {
        self.insert(FixtureAttribute {
            name: name.into(),
            data_type: data_type.map(str::to_string),
            active: true,
            samples,
        });
    }

    /// Switch the simulated backend on or off. Offline fetches fail.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Number of `fetch` calls served so far, failed ones included.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn check_online(&self) -> Result<(), ReaderError> {
        if self.is_online() {
            Ok(())
        } else {
            Err(ReaderError::Connection("fixture backend is offline".to_string()))
        }
    }

    /// Keep every n-th sample so that at most `max_points` remain.
    fn decimated(&self, samples: Vec<RawSample>) -> Vec<RawSample> {
        if samples.len() <= self.max_points {
            return samples;
        }
        let stride = samples.len().div_ceil(self.max_points);
        samples.into_iter().step_by(stride).collect()
    }
}

impl Reader for FixtureReader {
    fn fetch(
        &self,
        attribute: &str,
        start: f64,
        end: f64,
        decimate: bool,
    ) -> Result<Vec<RawSample>, ReaderError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;

        let in_window: Vec<RawSample> = {
            let attributes = self.attributes.read().unwrap_or_else(PoisonError::into_inner);
            let Some(fixture) = attributes.get(&attribute.to_ascii_lowercase()) else {
                debug!(attribute, "attribute has no fixture, returning no samples");
                return Ok(Vec::new());
            };
            fixture
                .samples
                .iter()
                .filter(|s| s.timestamp >= start && s.timestamp <= end)
                .cloned()
                .collect()
        };

        let total = in_window.len();
        let samples = if decimate { self.decimated(in_window) } else { in_window };
        debug!(attribute, start, end, total, returned = samples.len(), "fixture fetch");
        Ok(samples)
    }

    fn attribute_type(&self, attribute: &str) -> Option<String> {
        let attributes = self.attributes.read().unwrap_or_else(PoisonError::into_inner);
        attributes.get(&attribute.to_ascii_lowercase()).and_then(|a| a.data_type.clone())
    }

    fn archived_attributes(&self, active: bool) -> Result<Vec<String>, ReaderError> {
        self.check_online()?;
        let attributes = self.attributes.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = attributes
            .values()
            .filter(|a| !active || a.active)
            .map(|a| a.name.clone())
            .collect();
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;
    use crate::reader::SampleValue;

    const FIXTURES: &str = r"
max_points: 2
attributes:
  - name: sys/tg_test/1/double_scalar
    type: DevDouble
    samples:
      - [30, 3.0]
      - [10, 1.0]
      - [20, 2.0]
      - [40, 4.0]
      - [50, 5.0]
  - name: sys/tg_test/1/old
    active: false
";

    /// Test loading fixtures from a YAML file.
    #[test]
    fn test_load_from_path() {
        let mut file = NamedTempFile::new().expect("tempfile");
        file.write_all(FIXTURES.as_bytes()).expect("write");

        let reader = FixtureReader::load_from_path(file.path()).expect("fixtures");
        assert_eq!(reader.attribute_type("SYS/tg_test/1/double_scalar").as_deref(), Some("DevDouble"));
        assert_eq!(reader.attribute_type("sys/tg_test/1/old"), None);
    }

    /// Test window filtering, ordering and decimation.
    #[test]
    fn test_fetch_window_and_decimation() {
        let reader = FixtureReader::from_yaml_str(FIXTURES).expect("fixtures");
        let attr = "sys/tg_test/1/double_scalar";

        let all = reader.fetch(attr, 0.0, 100.0, false).expect("fetch");
        let stamps: Vec<f64> = all.iter().map(|s| s.timestamp).collect();
        assert_eq!(stamps, vec![10.0, 20.0, 30.0, 40.0, 50.0]);

        let window = reader.fetch(attr, 20.0, 40.0, false).expect("fetch");
        assert_eq!(window.len(), 3);
        assert_eq!(window[0].value, SampleValue::Number(2.0));

        let thinned = reader.fetch(attr, 0.0, 100.0, true).expect("fetch");
        let stamps: Vec<f64> = thinned.iter().map(|s| s.timestamp).collect();
        assert_eq!(stamps, vec![10.0, 40.0]);

        assert!(reader.fetch("a/b/c/missing", 0.0, 100.0, true).expect("fetch").is_empty());
        assert_eq!(reader.fetch_count(), 4);
    }

    /// Test listing of archived attributes.
    #[test]
    fn test_archived_attributes() {
        let reader = FixtureReader::from_yaml_str(FIXTURES).expect("fixtures");
        assert_eq!(
            reader.archived_attributes(false).expect("list"),
            vec!["sys/tg_test/1/double_scalar".to_string(), "sys/tg_test/1/old".to_string()]
        );
        assert_eq!(
            reader.archived_attributes(true).expect("list"),
            vec!["sys/tg_test/1/double_scalar".to_string()]
        );
    }

    /// Test that an offline reader fails every query.
    #[test]
    fn test_offline() {
        let reader = FixtureReader::new();
        reader.add_attribute("a/b/c/d", None, vec![RawSample::new(1.0, 1.0)]);
        reader.set_online(false);
        assert!(matches!(reader.fetch("a/b/c/d", 0.0, 10.0, true), Err(ReaderError::Connection(_))));
        assert!(reader.archived_attributes(false).is_err());

        reader.set_online(true);
        assert_eq!(reader.fetch("a/b/c/d", 0.0, 10.0, true).expect("fetch").len(), 1);
    }
}
