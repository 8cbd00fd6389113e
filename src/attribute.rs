//! Read-only handle on one archived attribute view.

use std::sync::Arc;

use crate::cache::{AttributeCache, AttributeSeries, SeriesPair};
use crate::error::Result;
use crate::names::{AttributeDescriptor, CanonicalNames};
use crate::reader::SampleValue;

/// An archived attribute: a resolved name bound to the shared cache.
///
/// The `ts` marker in the name selects which view `read` returns. Handles
/// are cheap; the data lives in the [`AttributeCache`].
pub struct ArchivedAttribute {
    names: CanonicalNames,
    descriptor: AttributeDescriptor,
    cache: Arc<AttributeCache>,
}

impl ArchivedAttribute {
    /// Bind a resolved attribute name to `cache`.
    ///
    /// # Parameters
    ///
    /// - `names` - Canonical forms of the name
    /// - `descriptor` - Resolved attribute descriptor
    /// - `cache` - Cache holding the attribute's series
    ///
    /// # Returns
    ///
    /// Returns a new `ArchivedAttribute` instance.
    pub fn new(
        names: CanonicalNames,
        descriptor: AttributeDescriptor,
        cache: Arc<AttributeCache>,
    ) -> Self {
        Self { names, descriptor, cache }
    }

    pub const fn names(&self) -> &CanonicalNames {
        &self.names
    }

    pub const fn descriptor(&self) -> &AttributeDescriptor {
        &self.descriptor
    }

    pub fn full_name(&self) -> &str {
        &self.names.complete
    }

    pub fn label(&self) -> String {
        self.descriptor.label()
    }

    pub fn complementary_name(&self) -> String {
        self.descriptor.complementary_name()
    }

    pub const fn returns_timestamps(&self) -> bool {
        self.descriptor.return_timestamps
    }

    /// Archived attributes are never event driven.
    pub const fn is_using_events(&self) -> bool {
        false
    }

    /// Current view, fetched on first use.
    ///
    /// # Errors
    ///
    /// Returns `BackendUnavailable` or `UnsupportedShape` when the first fetch fails.
    pub fn read(&self) -> Result<Arc<AttributeSeries>> {
        self.cache.read(&self.descriptor)
    }

    /// Fetch again and return the new view.
    ///
    /// # Errors
    ///
    /// Returns `BackendUnavailable` or `UnsupportedShape`; the previous view
    /// stays cached.
    pub fn refresh(&self) -> Result<Arc<AttributeSeries>> {
        self.cache
            .refresh(&self.descriptor)
            .map(|pair| pair.view(self.descriptor.return_timestamps))
    }

    /// Cached data, if any, without fetching.
    pub fn cached(&self) -> Option<Arc<SeriesPair>> {
        self.cache.cached(&self.descriptor)
    }

    /// # Errors
    ///
    /// Always returns `ArchivingError::ReadOnly`.
    pub fn write(&self, value: &SampleValue) -> Result<()> {
        self.cache.write(&self.descriptor, value)
    }
}

impl std::fmt::Debug for ArchivedAttribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchivedAttribute").field("name", &self.names.complete).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ViewPolicy;
    use crate::error::ArchivingError;
    use crate::names::{Authority, CanonicalDefaults, Canonicalizer, ElementKind, Scheme};
    use crate::reader::{FixtureReader, RawSample};
    use crate::timeutil::TimeResolver;

    fn attribute(raw: &str, reader: Arc<FixtureReader>) -> ArchivedAttribute {
        let c = Canonicalizer::new(
            Scheme::Archiving,
            CanonicalDefaults::new(Authority::new("foo", "1234")),
            TimeResolver::default(),
        );
        let resolved = c.resolve(raw, ElementKind::Attribute, 1000.0, false).expect("valid name");
        let descriptor = resolved.descriptor.as_attribute().cloned().expect("attribute");
        let cache = Arc::new(AttributeCache::new(reader, ViewPolicy::Shared));
        ArchivedAttribute::new(resolved.names, descriptor, cache)
    }

    /// Test the handle's names, label and view selection.
    #[test]
    fn test_handle_views() {
        let reader = Arc::new(FixtureReader::new());
        reader.add_attribute("a/b/c/d", None, vec![RawSample::new(900.0, 7.0)]);

        let values = attribute("archiving:/a/b/c/d", reader.clone());
        assert_eq!(values.full_name(), "archiving://foo:1234/a/b/c/d?db=*;t0=-85400;t1=1000");
        assert_eq!(values.label(), "a/b/c/d (archiving)");
        assert_eq!(values.complementary_name(), format!("{};ts", values.full_name()));
        assert!(!values.is_using_events());
        assert!(values.cached().is_none());
        assert_eq!(values.read().expect("read").samples[0].value, SampleValue::Number(7.0));

        let stamps = attribute("archiving:/a/b/c/d?ts", reader);
        assert!(stamps.returns_timestamps());
        assert_eq!(stamps.label(), "a/b/c/d (archiving ts)");
        assert_eq!(stamps.refresh().expect("refresh").samples[0].value, SampleValue::Number(900.0));
    }

    /// Test that both views refuse writes.
    #[test]
    fn test_write_is_read_only() {
        let reader = Arc::new(FixtureReader::new());
        for raw in ["archiving:/a/b/c/d", "archiving:/a/b/c/d?ts"] {
            let handle = attribute(raw, reader.clone());
            let err = handle.write(&SampleValue::Number(1.0)).unwrap_err();
            assert_eq!(err, ArchivingError::ReadOnly { name: handle.full_name().to_string() });
        }
    }
}
