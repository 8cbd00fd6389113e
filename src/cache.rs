//! Read-through cache of archived attribute series.
//!
//! Each entry holds a value series and its paired timestamp series behind a
//! single pointer, so a refresh swaps both at once and readers never see old
//! values next to new timestamps. Refreshes of one entry are serialized by a
//! per-entry gate; a caller that waited on the gate while another refresh
//! completed reuses that result instead of querying the reader again.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex, PoisonError, RwLock,
};

use fnv::FnvHashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ArchivingError, Result};
use crate::names::AttributeDescriptor;
use crate::reader::{RawSample, Reader, SampleValue};

/// How the value and timestamp views of one attribute are cached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewPolicy {
    /// One entry per attribute and window; both views refresh together.
    #[default]
    Shared,
    /// One entry per view. A new entry starts from its complementary
    /// entry's data when available, then refreshes on its own.
    Independent,
}

/// Dimensionality of the samples of a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DataFormat {
    #[serde(rename = "scalar")]
    Scalar,
    #[serde(rename = "1d")]
    OneD,
    #[serde(rename = "2d")]
    TwoD,
}

/// Element type of a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Integer,
    Float,
    Boolean,
    String,
    Bytes,
    State,
    Encoded,
    Enum,
}

impl DataType {
    /// Map a backend type name such as `DevDouble` or `DevULong64`.
    ///
    /// # Returns
    ///
    /// Returns `None` when the name is not recognized.
    pub fn from_backend_type(name: &str) -> Option<Self> {
        let name = name.to_ascii_lowercase();
        let rules: [(&[&str], Self); 8] = [
            (&["short", "long"], Self::Integer),
            (&["state"], Self::State),
            (&["float", "double"], Self::Float),
            (&["boolean"], Self::Boolean),
            (&["string"], Self::String),
            (&["uchar"], Self::Bytes),
            (&["encoded"], Self::Encoded),
            (&["enum"], Self::Enum),
        ];
        rules
            .into_iter()
            .find(|(patterns, _)| patterns.iter().any(|p| name.contains(p)))
            .map(|(_, t)| t)
    }

    /// Type of the first scalar element found in `values`; `Float` if none.
    pub fn infer<'a>(values: impl IntoIterator<Item = &'a SampleValue>) -> Self {
        fn first_leaf(value: &SampleValue) -> Option<DataType> {
            match value {
                SampleValue::Number(_) => Some(DataType::Float),
                SampleValue::Bool(_) => Some(DataType::Boolean),
                SampleValue::Text(_) => Some(DataType::String),
                SampleValue::List(items) => items.iter().find_map(first_leaf),
            }
        }
        values.into_iter().find_map(first_leaf).unwrap_or(Self::Float)
    }
}

/// One decoded sample.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    pub timestamp: f64,
    pub value: SampleValue,
}

/// A decoded, immutable series for one view of an attribute.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttributeSeries {
    pub format: DataFormat,
    pub data_type: DataType,
    pub samples: Vec<Sample>,
}

impl AttributeSeries {
    pub const fn empty(format: DataFormat, data_type: DataType) -> Self {
        Self { format, data_type, samples: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn timestamps(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().map(|s| s.timestamp)
    }

    pub fn values(&self) -> impl Iterator<Item = &SampleValue> + '_ {
        self.samples.iter().map(|s| &s.value)
    }
}

/// Value and timestamp series decoded from the same fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesPair {
    pub values: Arc<AttributeSeries>,
    pub timestamps: Arc<AttributeSeries>,
}

impl SeriesPair {
    /// The series selected by the `ts` marker.
    pub fn view(&self, timestamps: bool) -> Arc<AttributeSeries> {
        if timestamps {
            Arc::clone(&self.timestamps)
        } else {
            Arc::clone(&self.values)
        }
    }
}

/// Decode raw reader output into a value series and a timestamp series.
///
/// # Parameters
///
/// - `raw` - Samples in chronological order
/// - `backend_type` - Type name reported by the reader, if any
///
/// # Errors
///
/// Returns `ArchivingError::UnsupportedShape` for values nested deeper than
/// two levels, ragged arrays, or samples of differing dimensionality.
pub fn decode(raw: Vec<RawSample>, backend_type: Option<&str>) -> Result<SeriesPair> {
    let mut dims = None;
    for sample in &raw {
        let d = shape(&sample.value)
            .map_err(|reason| ArchivingError::UnsupportedShape { reason })?
            .len();
        match dims {
            None => dims = Some(d),
            Some(prev) if prev != d => {
                return Err(ArchivingError::UnsupportedShape {
                    reason: format!("samples mix {prev}-D and {d}-D values"),
                });
            }
            Some(_) => {}
        }
    }

    let format = match dims.unwrap_or(0) {
        0 => DataFormat::Scalar,
        1 => DataFormat::OneD,
        2 => DataFormat::TwoD,
        d => {
            return Err(ArchivingError::UnsupportedShape {
                reason: format!("{d}-D values are not supported"),
            })
        }
    };
    let data_type = backend_type
        .and_then(DataType::from_backend_type)
        .unwrap_or_else(|| DataType::infer(raw.iter().map(|s| &s.value)));

    let stamps = raw
        .iter()
        .map(|s| Sample { timestamp: s.timestamp, value: SampleValue::Number(s.timestamp) })
        .collect();
    let samples =
        raw.into_iter().map(|s| Sample { timestamp: s.timestamp, value: s.value }).collect();

    Ok(SeriesPair {
        values: Arc::new(AttributeSeries { format, data_type, samples }),
        timestamps: Arc::new(AttributeSeries {
            format: DataFormat::Scalar,
            data_type: DataType::Float,
            samples: stamps,
        }),
    })
}

/// Rectangular shape of a value: empty for scalars, one length per level.
fn shape(value: &SampleValue) -> std::result::Result<Vec<usize>, String> {
    let SampleValue::List(items) = value else {
        return Ok(Vec::new());
    };
    let mut inner: Option<Vec<usize>> = None;
    for item in items {
        let s = shape(item)?;
        match &inner {
            None => inner = Some(s),
            Some(prev) if *prev != s => return Err("ragged array".to_string()),
            Some(_) => {}
        }
    }
    let mut dims = vec![items.len()];
    dims.extend(inner.unwrap_or_default());
    Ok(dims)
}

/// One cached attribute (or one view of it, under `ViewPolicy::Independent`).
#[derive(Debug, Default)]
struct CacheEntry {
    pair: RwLock<Option<Arc<SeriesPair>>>,
    refresh_gate: Mutex<()>,
    /// Completed refreshes
    generation: AtomicU64,
}

impl CacheEntry {
    fn seeded(pair: Arc<SeriesPair>) -> Self {
        Self {
            pair: RwLock::new(Some(pair)),
            refresh_gate: Mutex::new(()),
            generation: AtomicU64::new(1),
        }
    }

    fn current(&self) -> Option<Arc<SeriesPair>> {
        self.pair.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn store(&self, pair: Arc<SeriesPair>) {
        *self.pair.write().unwrap_or_else(PoisonError::into_inner) = Some(pair);
        self.generation.fetch_add(1, Ordering::AcqRel);
    }
}

/// Cache of decoded series keyed by canonical attribute name.
pub struct AttributeCache {
    reader: Arc<dyn Reader>,
    policy: ViewPolicy,
    entries: RwLock<FnvHashMap<String, Arc<CacheEntry>>>,
}

impl AttributeCache {
    /// Create an empty cache.
    ///
    /// # Parameters
    ///
    /// - `reader` - Source of archived samples
    /// - `policy` - Whether both views share one entry
    ///
    /// # Returns
    ///
    /// Returns a new `AttributeCache` instance.
    pub fn new(reader: Arc<dyn Reader>, policy: ViewPolicy) -> Self {
        Self { reader, policy, entries: RwLock::new(FnvHashMap::default()) }
    }

    pub const fn policy(&self) -> ViewPolicy {
        self.policy
    }

    pub fn reader(&self) -> &Arc<dyn Reader> {
        &self.reader
    }

    fn key(&self, descriptor: &AttributeDescriptor) -> String {
        match self.policy {
            ViewPolicy::Shared => descriptor.base_name(),
            ViewPolicy::Independent => descriptor.complete_name(),
        }
    }

    /// Existing entry for `descriptor`, created on first use.
    fn entry(&self, descriptor: &AttributeDescriptor) -> Arc<CacheEntry> {
        let key = self.key(descriptor);
        if let Some(entry) = self.entries.read().unwrap_or_else(PoisonError::into_inner).get(&key) {
            return Arc::clone(entry);
        }

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = entries.get(&key) {
            return Arc::clone(entry);
        }

        let seed = match self.policy {
            ViewPolicy::Shared => None,
            ViewPolicy::Independent => {
                entries.get(&descriptor.complementary_name()).and_then(|e| e.current())
            }
        };
        let entry = Arc::new(match seed {
            Some(pair) => {
                debug!(name = %key, "seeding cache entry from complementary view");
                CacheEntry::seeded(pair)
            }
            None => CacheEntry::default(),
        });
        entries.insert(key, Arc::clone(&entry));
        entry
    }

    /// Value view of `descriptor`, fetching it on first use.
    ///
    /// # Errors
    ///
    /// Returns `BackendUnavailable` or `UnsupportedShape` when the first
    /// fetch fails.
    pub fn get(&self, descriptor: &AttributeDescriptor) -> Result<Arc<AttributeSeries>> {
        self.pair(descriptor).map(|p| p.view(false))
    }

    /// Timestamp view of `descriptor`, fetching it on first use.
    ///
    /// # Errors
    ///
    /// Same as [`get`](Self::get).
    pub fn get_timestamps(&self, descriptor: &AttributeDescriptor) -> Result<Arc<AttributeSeries>> {
        self.pair(descriptor).map(|p| p.view(true))
    }

    /// View selected by the descriptor's `ts` marker.
    ///
    /// # Errors
    ///
    /// Same as [`get`](Self::get).
    pub fn read(&self, descriptor: &AttributeDescriptor) -> Result<Arc<AttributeSeries>> {
        self.pair(descriptor).map(|p| p.view(descriptor.return_timestamps))
    }

    /// Both views, fetching them on first use.
    ///
    /// # Errors
    ///
    /// Same as [`get`](Self::get).
    pub fn pair(&self, descriptor: &AttributeDescriptor) -> Result<Arc<SeriesPair>> {
        let entry = self.entry(descriptor);
        if let Some(pair) = entry.current() {
            debug!(name = %descriptor.complete_name(), "cache hit");
            return Ok(pair);
        }
        debug!(name = %descriptor.complete_name(), "cache miss");
        self.refresh_entry(&entry, descriptor, true)
    }

    /// Cached views without fetching.
    pub fn cached(&self, descriptor: &AttributeDescriptor) -> Option<Arc<SeriesPair>> {
        let key = self.key(descriptor);
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(&key).and_then(|e| e.current())
    }

    /// Fetch `descriptor` again and atomically replace both views.
    ///
    /// A caller that arrives while another refresh of the same entry is in
    /// flight waits for it and returns its result.
    ///
    /// # Errors
    ///
    /// Returns `BackendUnavailable` if the reader fails, or `UnsupportedShape`
    /// if the samples cannot be decoded. The previous views stay cached.
    pub fn refresh(&self, descriptor: &AttributeDescriptor) -> Result<Arc<SeriesPair>> {
        let entry = self.entry(descriptor);
        self.refresh_entry(&entry, descriptor, false)
    }

    /// Archived data cannot be written.
    ///
    /// # Errors
    ///
    /// Always returns `ArchivingError::ReadOnly`.
    pub fn write(&self, descriptor: &AttributeDescriptor, _value: &SampleValue) -> Result<()> {
        Err(ArchivingError::ReadOnly { name: descriptor.complete_name() })
    }

    /// Drop the entry of `descriptor`. Returns whether one existed.
    pub fn evict(&self, descriptor: &AttributeDescriptor) -> bool {
        let key = self.key(descriptor);
        self.entries.write().unwrap_or_else(PoisonError::into_inner).remove(&key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.write().unwrap_or_else(PoisonError::into_inner).clear();
    }

    /// Refresh `entry` under its gate.
    ///
    /// With `fill_only`, an entry populated by the time the gate is taken is
    /// returned as is; otherwise only a refresh completed while waiting is.
    fn refresh_entry(
        &self,
        entry: &CacheEntry,
        descriptor: &AttributeDescriptor,
        fill_only: bool,
    ) -> Result<Arc<SeriesPair>> {
        let observed = entry.generation.load(Ordering::Acquire);
        let _gate = entry.refresh_gate.lock().unwrap_or_else(PoisonError::into_inner);

        let completed_meanwhile = entry.generation.load(Ordering::Acquire) != observed;
        if completed_meanwhile || fill_only {
            if let Some(pair) = entry.current() {
                debug!(name = %descriptor.complete_name(), "refresh coalesced");
                return Ok(pair);
            }
        }

        let name = descriptor.complete_name();
        let path = descriptor.path.as_str();
        let (start, end) = (descriptor.window.start.epoch, descriptor.window.end.epoch);
        debug!(%name, start, end, "refreshing");

        let pair = self
            .reader
            .fetch(path, start, end, true)
            .map_err(|e| ArchivingError::BackendUnavailable { reason: e.to_string() })
            .and_then(|raw| decode(raw, self.reader.attribute_type(path).as_deref()))
            .map_err(|e| {
                warn!(%name, error = %e, "refresh failed");
                e
            })?;

        debug!(%name, samples = pair.values.len(), format = ?pair.values.format, "refreshed");
        let pair = Arc::new(pair);
        entry.store(Arc::clone(&pair));
        Ok(pair)
    }
}
