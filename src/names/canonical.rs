//! Canonicalization of parsed names into complete, normal and short forms.

use crate::error::{ArchivingError, Result};
use crate::names::descriptor::{
    AttributeDescriptor, AuthorityDescriptor, DeviceDescriptor, ResourceDescriptor, TimeBound,
    TimeWindow,
};
use crate::names::{
    Authority, ElementKind, NameGrammar, QueryKey, Scheme, TimeFormat, UriGroups, WILDCARD_DB,
};
use crate::timeutil::{format_epoch, TimeResolver};

/// Values substituted for parts a name leaves out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalDefaults {
    /// Authority used when a name has none
    pub authority: Authority,
    /// Database id used when a name has none (normally `*`)
    pub db: String,
    /// Window start expression used when `t0` is absent
    pub t0: String,
    /// Window end expression used when `t1` is absent
    pub t1: String,
}

impl CanonicalDefaults {
    /// Defaults with the wildcard database and a one-day window ending now.
    pub fn new(authority: Authority) -> Self {
        Self { authority, db: WILDCARD_DB.to_string(), t0: "-1d".to_string(), t1: "now".to_string() }
    }
}

/// The three standard string forms of a resolved name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalNames {
    /// Fully qualified, all defaults materialized
    pub complete: String,
    /// What the caller wrote, minus the default authority
    pub normal: String,
    /// Bare identifying token
    pub short: String,
    /// Fragment label, only set when requested and present
    pub fragment: Option<String>,
}

/// Canonical names together with the structured descriptor they denote.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub names: CanonicalNames,
    pub descriptor: ResourceDescriptor,
}

/// Turns raw names into canonical forms for one scheme flavor.
///
/// Canonicalization is pure: the only time input is the `now` passed in, so
/// equal inputs always give equal names and the complete form can be used as
/// a registry key.
#[derive(Debug, Clone)]
pub struct Canonicalizer {
    grammar: NameGrammar,
    defaults: CanonicalDefaults,
    times: TimeResolver,
}

impl Canonicalizer {
    /// Create a canonicalizer.
    ///
    /// # Parameters
    ///
    /// - `scheme` - Scheme flavor to accept
    /// - `defaults` - Values used for omitted authority, database and window
    /// - `times` - Resolver for window expressions and local-time rendering
    ///
    /// # Returns
    ///
    /// Returns a new `Canonicalizer` instance.
    pub fn new(scheme: Scheme, defaults: CanonicalDefaults, times: TimeResolver) -> Self {
        Self { grammar: NameGrammar::new(scheme), defaults, times }
    }

    pub const fn grammar(&self) -> &NameGrammar {
        &self.grammar
    }

    pub const fn defaults(&self) -> &CanonicalDefaults {
        &self.defaults
    }

    pub const fn time_resolver(&self) -> &TimeResolver {
        &self.times
    }

    /// Parse and canonicalize `raw` in one step.
    ///
    /// # Parameters
    ///
    /// - `raw` - Name as written by the caller
    /// - `kind` - Element kind the name addresses
    /// - `now` - Epoch seconds anchoring relative window expressions
    /// - `with_fragment` - Whether to return the fragment as a fourth value
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
        let groups = self.grammar.try_parse(raw, kind)?;
        self.canonicalize(Some(&groups), now, with_fragment)
    }

    /// Complete, normal and short forms of `raw`.
    ///
    /// # Errors
    ///
    /// Returns `ArchivingError::InvalidName` if the name is not valid for `kind`.
    pub fn names(&self, raw: &str, kind: ElementKind, now: f64) -> Result<CanonicalNames> {
        self.resolve(raw, kind, now, false).map(|r| r.names)
    }

    /// Canonicalize groups produced by the grammar.
    ///
    /// # Errors
    ///
    /// Returns `ArchivingError::InvalidName` when `groups` is `None`, when a
    /// window bound cannot be resolved, or when the groups lack the parts
    /// their kind requires.
    pub fn canonicalize(
        &self,
        groups: Option<&UriGroups>,
        now: f64,
        with_fragment: bool,
    ) -> Result<Resolved> {
        let groups = groups.ok_or_else(|| {
            ArchivingError::invalid_name("", "name was rejected by the grammar")
        })?;

        let mut resolved = match groups.kind {
            ElementKind::Authority => self.authority_names(groups)?,
            ElementKind::Device => self.device_names(groups),
            ElementKind::Attribute => self.attribute_names(groups, now)?,
        };

        if with_fragment {
            resolved.names.fragment = groups.fragment.clone();
        }
        Ok(resolved)
    }

    /// Authority of `groups`, or the default, plus whether it may be elided.
    fn authority_or_default(&self, groups: &UriGroups) -> (Authority, bool) {
        match &groups.authority {
            Some(a) => (a.clone(), a.eq_ignore_case(&self.defaults.authority)),
            None => (self.defaults.authority.clone(), true),
        }
    }

    fn authority_names(&self, groups: &UriGroups) -> Result<Resolved> {
        let authority = groups
            .authority
            .clone()
            .ok_or_else(|| ArchivingError::invalid_name(&groups.raw, "authority is required"))?;

        let names = CanonicalNames {
            complete: format!("{}:{}", groups.scheme, authority.uri()),
            normal: authority.uri(),
            short: authority.to_string(),
            fragment: None,
        };
        let descriptor =
            ResourceDescriptor::Authority(AuthorityDescriptor { scheme: groups.scheme, authority });
        Ok(Resolved { names, descriptor })
    }

    fn device_names(&self, groups: &UriGroups) -> Resolved {
        let (authority, elide) = self.authority_or_default(groups);
        let db = groups.arch_db().unwrap_or(self.defaults.db.as_str()).to_string();

        let device = DeviceDescriptor { scheme: groups.scheme, authority, db };
        let normal = if elide {
            format!("?db={}", device.db)
        } else {
            format!("{}?db={}", device.authority.uri(), device.db)
        };

        let names = CanonicalNames {
            complete: device.complete_name(),
            normal,
            short: device.db.clone(),
            fragment: None,
        };
        Resolved { names, descriptor: ResourceDescriptor::Device(device) }
    }

    fn attribute_names(&self, groups: &UriGroups, now: f64) -> Result<Resolved> {
        let path = groups
            .path
            .clone()
            .ok_or_else(|| ArchivingError::invalid_name(&groups.raw, "attribute path is required"))?;
        let (authority, elide) = self.authority_or_default(groups);
        let db = groups.arch_db().unwrap_or(self.defaults.db.as_str()).to_string();

        let t0 = groups.query.value(QueryKey::T0).unwrap_or(self.defaults.t0.as_str());
        let t1 = groups.query.value(QueryKey::T1).unwrap_or(self.defaults.t1.as_str());
        let window = TimeWindow {
            start: self.resolve_bound(groups, QueryKey::T0, t0, now)?,
            end: self.resolve_bound(groups, QueryKey::T1, t1, now)?,
        };

        let descriptor = AttributeDescriptor {
            scheme: groups.scheme,
            authority,
            db,
            path,
            window,
            return_timestamps: groups.query.contains(QueryKey::Ts),
            fragment: groups.fragment.clone(),
        };

        let mut normal = if elide { String::new() } else { descriptor.authority.uri() };
        normal.push('/');
        normal.push_str(descriptor.path.as_str());
        if !groups.query.is_empty() {
            normal.push('?');
            normal.push_str(&Self::normal_query(groups, &descriptor));
        }

        let names = CanonicalNames {
            complete: descriptor.complete_name(),
            normal,
            short: descriptor.path.to_string(),
            fragment: None,
        };
        Ok(Resolved { names, descriptor: ResourceDescriptor::Attribute(descriptor) })
    }

    /// Caller's query in caller order, `;`-separated. Local-time flavors show
    /// the canonical rendering of the window bounds the caller wrote.
    fn normal_query(groups: &UriGroups, descriptor: &AttributeDescriptor) -> String {
        let local = groups.scheme.time_format() == TimeFormat::Local;
        groups
            .query
            .iter()
            .map(|e| {
                let value = match e.key {
                    QueryKey::T0 if local => Some(descriptor.window.start.text.as_str()),
                    QueryKey::T1 if local => Some(descriptor.window.end.text.as_str()),
                    _ => e.value.as_deref(),
                };
                value.map_or_else(|| e.key.to_string(), |v| format!("{}={v}", e.key))
            })
            .collect::<Vec<_>>()
            .join(";")
    }

    fn resolve_bound(
        &self,
        groups: &UriGroups,
        key: QueryKey,
        expr: &str,
        now: f64,
    ) -> Result<TimeBound> {
        let unresolvable = || {
            ArchivingError::invalid_name(
                &groups.raw,
                format!("cannot resolve time expression '{expr}' for '{key}'"),
            )
        };

        let epoch = self.times.resolve(expr, now).ok_or_else(&unresolvable)?;
        match groups.scheme.time_format() {
            TimeFormat::Epoch => Ok(TimeBound { epoch, text: format_epoch(epoch) }),
            TimeFormat::Local => {
                let text = self.times.format_local(epoch).ok_or_else(&unresolvable)?;
                Ok(TimeBound { epoch: epoch.floor(), text })
            }
        }
    }
}
