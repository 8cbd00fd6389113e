//! Get-or-create registry of archived attribute handles.

use std::sync::{Arc, PoisonError, RwLock};

use fnv::FnvHashMap;
use tracing::debug;

use crate::attribute::ArchivedAttribute;
use crate::cache::{AttributeCache, ViewPolicy};
use crate::error::{ArchivingError, Result};
use crate::names::{
    AttributeDescriptor, AuthorityDescriptor, Canonicalizer, DeviceDescriptor, ElementKind, Resolved,
    ResourceDescriptor,
};
use crate::reader::Reader;
use crate::settings::{ArchivingSettings, SettingsError};

/// Registered handles, plus the window each attribute view currently uses.
#[derive(Default)]
struct Handles {
    by_name: FnvHashMap<String, Arc<ArchivedAttribute>>,
    latest: FnvHashMap<String, String>,
}

/// Resolves names and hands out shared attribute handles.
///
/// Handles are keyed by their complete canonical name, so two spellings of
/// the same attribute and window share one handle. Only the latest window of
/// each attribute view stays registered; registering a new window retires the
/// previous handle and its cached data.
pub struct ArchivingRegistry {
    canonicalizer: Canonicalizer,
    cache: Arc<AttributeCache>,
    attributes: RwLock<Handles>,
}

impl ArchivingRegistry {
    /// Create a registry.
    ///
    /// # Parameters
    ///
    /// - `canonicalizer` - Name resolution for the served scheme
    /// - `reader` - Source of archived samples
    /// - `policy` - Cache policy for value and timestamp views
    ///
    /// # Returns
    ///
    /// Returns a new `ArchivingRegistry` instance.
    pub fn new(canonicalizer: Canonicalizer, reader: Arc<dyn Reader>, policy: ViewPolicy) -> Self {
        Self {
            canonicalizer,
            cache: Arc::new(AttributeCache::new(reader, policy)),
            attributes: RwLock::new(Handles::default()),
        }
    }

    /// Create a registry configured from `settings`.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::Invalid` if the settings cannot build a canonicalizer.
    pub fn from_settings(
        settings: &ArchivingSettings,
        reader: Arc<dyn Reader>,
    ) -> std::result::Result<Self, SettingsError> {
        Ok(Self::new(settings.canonicalizer()?, reader, settings.view_policy))
    }

    pub const fn canonicalizer(&self) -> &Canonicalizer {
        &self.canonicalizer
    }

    pub const fn cache(&self) -> &Arc<AttributeCache> {
        &self.cache
    }

    /// Resolve `raw` as a name of `kind`.
    ///
    /// # Errors
    ///
    /// Returns `ArchivingError::InvalidName` if the name is not valid for `kind`.
    pub fn resolve(
        &self,
        raw: &str,
        kind: ElementKind,
        now: f64,
        with_fragment: bool,
    ) -> Result<Resolved> {
        self.canonicalizer.resolve(raw, kind, now, with_fragment)
    }

    /// Resolve `raw` as an attribute name without registering a handle.
    ///
    /// # Errors
    ///
    /// Returns `ArchivingError::InvalidName` if `raw` is not a valid attribute name.
    pub fn descriptor(&self, raw: &str, now: f64) -> Result<AttributeDescriptor> {
        match self.resolve(raw, ElementKind::Attribute, now, false)?.descriptor {
            ResourceDescriptor::Attribute(d) => Ok(d),
            _ => Err(ArchivingError::invalid_name(raw, "not an attribute name")),
        }
    }

    /// Handle for the attribute named `raw`, created on first use.
    ///
    /// # Parameters
    ///
    /// - `raw` - Attribute name as written by the caller
    /// - `now` - Epoch seconds anchoring relative window expressions
    ///
    /// # Errors
    ///
    /// Returns `ArchivingError::InvalidName` if `raw` is not a valid attribute name.
    pub fn attribute(&self, raw: &str, now: f64) -> Result<Arc<ArchivedAttribute>> {
        let Resolved { names, descriptor } = self.resolve(raw, ElementKind::Attribute, now, false)?;
        let ResourceDescriptor::Attribute(descriptor) = descriptor else {
            return Err(ArchivingError::invalid_name(raw, "not an attribute name"));
        };

        if let Some(found) = self
            .attributes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .by_name
            .get(&names.complete)
        {
            return Ok(Arc::clone(found));
        }

        let mut handles = self.attributes.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(found) = handles.by_name.get(&names.complete) {
            return Ok(Arc::clone(found));
        }

        let previous = handles.latest.insert(descriptor.windowless_name(), names.complete.clone());
        if let Some(retired) = previous.and_then(|name| handles.by_name.remove(&name)) {
            self.retire(&handles, &retired);
        }

        debug!(name = %names.complete, "registering archived attribute");
        let handle =
            Arc::new(ArchivedAttribute::new(names.clone(), descriptor, Arc::clone(&self.cache)));
        handles.by_name.insert(names.complete, Arc::clone(&handle));
        Ok(handle)
    }

    /// Drop the cached data of `attribute` if its handle is no longer registered.
    ///
    /// A handle retired while a caller still used it may have filled the
    /// cache again; callers hand it back here once done.
    pub fn release(&self, attribute: &ArchivedAttribute) {
        let handles = self.attributes.read().unwrap_or_else(PoisonError::into_inner);
        let registered = handles
            .by_name
            .get(attribute.full_name())
            .is_some_and(|h| std::ptr::eq(Arc::as_ptr(h), attribute));
        if !registered {
            self.retire(&handles, attribute);
        }
    }

    /// Evict the cache entry of a handle that left the registry, unless the
    /// registered complementary view still reads the same entry.
    fn retire(&self, handles: &Handles, attribute: &ArchivedAttribute) {
        let shared = self.cache.policy() == ViewPolicy::Shared
            && handles.by_name.contains_key(&attribute.complementary_name());
        if !shared && self.cache.evict(attribute.descriptor()) {
            debug!(name = %attribute.full_name(), "evicted retired attribute window");
        }
    }

    /// Registered handle for a complete name, without creating one.
    pub fn get(&self, complete: &str) -> Option<Arc<ArchivedAttribute>> {
        self.attributes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .by_name
            .get(complete)
            .cloned()
    }

    /// Drop the handle registered under `complete`. Its cached data is kept.
    pub fn forget(&self, complete: &str) -> bool {
        let mut handles = self.attributes.write().unwrap_or_else(PoisonError::into_inner);
        let Some(handle) = handles.by_name.remove(complete) else {
            return false;
        };
        let slot = handle.descriptor().windowless_name();
        if handles.latest.get(&slot).is_some_and(|name| name == complete) {
            handles.latest.remove(&slot);
        }
        true
    }

    pub fn len(&self) -> usize {
        self.attributes.read().unwrap_or_else(PoisonError::into_inner).by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolve a device name.
    ///
    /// # Errors
    ///
    /// Returns `ArchivingError::InvalidName` if `raw` is not a valid device name.
    pub fn device(&self, raw: &str) -> Result<DeviceDescriptor> {
        match self.resolve(raw, ElementKind::Device, 0.0, false)?.descriptor {
            ResourceDescriptor::Device(d) => Ok(d),
            _ => Err(ArchivingError::invalid_name(raw, "not a device name")),
        }
    }

    /// Resolve an authority name.
    ///
    /// # Errors
    ///
    /// Returns `ArchivingError::InvalidName` if `raw` is not a valid authority name.
    pub fn authority(&self, raw: &str) -> Result<AuthorityDescriptor> {
        match self.resolve(raw, ElementKind::Authority, 0.0, false)?.descriptor {
            ResourceDescriptor::Authority(d) => Ok(d),
            _ => Err(ArchivingError::invalid_name(raw, "not an authority name")),
        }
    }

    /// Attribute paths archived by the backend.
    ///
    /// # Errors
    ///
    /// Returns `ArchivingError::BackendUnavailable` if the reader fails.
    pub fn archived_attributes(&self, active: bool) -> Result<Vec<String>> {
        self.cache
            .reader()
            .archived_attributes(active)
            .map_err(|e| ArchivingError::BackendUnavailable { reason: e.to_string() })
    }
}
