//! Archived resource names: grammar, query maps and canonicalization.
//!
//! A name addresses one of three element kinds under an archiving scheme:
//!
//! - authority: `tgarch://host:port`
//! - device: `tgarch://host:port?db=hdbpp`
//! - attribute: `tgarch://host:port/a/b/c/d?db=hdbpp;t0=-1d;t1=now;ts#label`
//!
//! [`NameGrammar`] matches raw strings into [`UriGroups`], and
//! [`Canonicalizer`] fills in defaults and produces the complete, normal and
//! short forms together with a typed [`ResourceDescriptor`].

pub mod canonical;
pub mod descriptor;
pub mod grammar;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use canonical::{CanonicalDefaults, CanonicalNames, Canonicalizer, Resolved};
pub use descriptor::{
    AttributeDescriptor, AuthorityDescriptor, DeviceDescriptor, ResourceDescriptor, TimeBound,
    TimeWindow,
};
pub use grammar::NameGrammar;

/// Wildcard database identifier used when a name does not pick one.
pub const WILDCARD_DB: &str = "*";

/// Archiving backend flavor, selected by the scheme literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum Scheme {
    /// `archiving:` names; time bounds canonicalize to epoch seconds.
    #[serde(rename = "archiving")]
    Archiving,
    /// `tgarch:` names; time bounds canonicalize to local date-times.
    #[serde(rename = "tgarch")]
    TangoArchiving,
}

/// How a scheme renders resolved time bounds in canonical names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeFormat {
    Epoch,
    Local,
}

impl Scheme {
    /// Scheme literal as written before the first `:`.
    pub const fn literal(self) -> &'static str {
        match self {
            Self::Archiving => "archiving",
            Self::TangoArchiving => "tgarch",
        }
    }

    pub const fn time_format(self) -> TimeFormat {
        match self {
            Self::Archiving => TimeFormat::Epoch,
            Self::TangoArchiving => TimeFormat::Local,
        }
    }

    /// Regex alternatives accepted as a database identifier.
    pub(crate) const fn db_pattern(self) -> &'static str {
        match self {
            Self::Archiving => r"hdb|hdblite|tdb|tdbpp|rad2s|rad10s|snap|hdbpp|\*",
            Self::TangoArchiving => r"\w+|\*",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.literal())
    }
}

impl FromStr for Scheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "archiving" => Ok(Self::Archiving),
            "tgarch" => Ok(Self::TangoArchiving),
            other => Err(format!("unknown archiving scheme '{other}'")),
        }
    }
}

/// Element kind a name refers to; selects grammar and canonicalization rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Authority,
    Device,
    Attribute,
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Authority => "authority",
            Self::Device => "device",
            Self::Attribute => "attribute",
        })
    }
}

impl FromStr for ElementKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "authority" => Ok(Self::Authority),
            "device" => Ok(Self::Device),
            "attribute" => Ok(Self::Attribute),
            other => Err(format!("unknown element kind '{other}'")),
        }
    }
}

/// Host and port of an archive registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Authority {
    pub host: String,
    pub port: String,
}

impl Authority {
    /// Create a new authority.
    ///
    /// # Parameters
    ///
    /// - `host` - Host name, without port
    /// - `port` - Port number as written
    ///
    /// # Returns
    ///
    /// Returns a new `Authority` instance.
    pub fn new(host: impl Into<String>, port: impl Into<String>) -> Self {
        Self { host: host.into(), port: port.into() }
    }

    /// Authority as it appears inside a URI: `//host:port`.
    pub fn uri(&self) -> String {
        format!("//{}:{}", self.host, self.port)
    }

    /// Case-insensitive comparison, as used to elide the default authority.
    pub fn eq_ignore_case(&self, other: &Self) -> bool {
        self.host.eq_ignore_ascii_case(&other.host) && self.port == other.port
    }
}

impl fmt::Display for Authority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for Authority {
    type Err = String;

    /// Parse `host:port` (a leading `//` is tolerated).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let s = s.strip_prefix("//").unwrap_or(s);
        let (host, port) =
            s.rsplit_once(':').ok_or_else(|| format!("authority '{s}' is not host:port"))?;

        let host_ok = !host.is_empty()
            && host.split('.').all(|label| {
                !label.is_empty() && label.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-')
            });
        let port_ok = (1..=5).contains(&port.len()) && port.chars().all(|c| c.is_ascii_digit());
        if !host_ok || !port_ok {
            return Err(format!("authority '{s}' is not host:port"));
        }

        Ok(Self::new(host, port))
    }
}

/// Attribute path: either the full 4-segment name or a 2-segment alias.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AttributePath {
    /// `domain/family/member/attribute`
    Full(String),
    /// `alias/attribute`, resolved by the backend rather than by this crate.
    Alias(String),
}

impl AttributePath {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Full(p) | Self::Alias(p) => p,
        }
    }

    pub const fn is_alias(&self) -> bool {
        matches!(self, Self::Alias(_))
    }
}

impl fmt::Display for AttributePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keys admitted in an archived name query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKey {
    Db,
    T0,
    T1,
    Ts,
}

impl QueryKey {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Db => "db",
            Self::T0 => "t0",
            Self::T1 => "t1",
            Self::Ts => "ts",
        }
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `key[=value]` element of a query, as written by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryElement {
    pub key: QueryKey,
    pub value: Option<String>,
}

/// Query elements in caller order. Every key appears at most once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryMap {
    elements: Vec<QueryElement>,
}

impl QueryMap {
    /// Insert an element, rejecting a repeated key.
    ///
    /// # Errors
    ///
    /// Returns a description of the violation when `key` is already present.
    pub fn insert(&mut self, key: QueryKey, value: Option<String>) -> Result<(), String> {
        if self.contains(key) {
            return Err(format!("duplicated query key '{key}'"));
        }
        self.elements.push(QueryElement { key, value });
        Ok(())
    }

    pub fn get(&self, key: QueryKey) -> Option<&QueryElement> {
        self.elements.iter().find(|e| e.key == key)
    }

    /// Value of `key`, if present with an explicit non-empty value.
    pub fn value(&self, key: QueryKey) -> Option<&str> {
        self.get(key).and_then(|e| e.value.as_deref()).filter(|v| !v.is_empty())
    }

    pub fn contains(&self, key: QueryKey) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueryElement> {
        self.elements.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

/// Named groups extracted from a raw name by [`NameGrammar`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UriGroups {
    /// Name exactly as given by the caller.
    pub raw: String,
    pub scheme: Scheme,
    pub kind: ElementKind,
    pub authority: Option<Authority>,
    pub path: Option<AttributePath>,
    /// Query text after the first `?`, before any fragment.
    pub query_text: Option<String>,
    pub query: QueryMap,
    pub fragment: Option<String>,
}

impl UriGroups {
    /// Full 4-segment attribute name, when the path has that shape.
    pub fn attrname(&self) -> Option<&str> {
        match &self.path {
            Some(AttributePath::Full(p)) => Some(p),
            _ => None,
        }
    }

    /// 2-segment alias, when the path has that shape.
    pub fn short_attrname(&self) -> Option<&str> {
        match &self.path {
            Some(AttributePath::Alias(p)) => Some(p),
            _ => None,
        }
    }

    /// Database id as written, if any.
    pub fn arch_db(&self) -> Option<&str> {
        self.query.value(QueryKey::Db)
    }

    pub fn host(&self) -> Option<&str> {
        self.authority.as_ref().map(|a| a.host.as_str())
    }

    pub fn port(&self) -> Option<&str> {
        self.authority.as_ref().map(|a| a.port.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test parsing and rendering of authorities.
    #[test]
    fn test_authority_from_str() {
        let a: Authority = "foo.domain.name:10000".parse().expect("valid authority");
        assert_eq!(a.host, "foo.domain.name");
        assert_eq!(a.port, "10000");
        assert_eq!(a.uri(), "//foo.domain.name:10000");
        assert_eq!(a.to_string(), "foo.domain.name:10000");

        let b: Authority = "//FOO.domain.name:10000".parse().expect("valid authority");
        assert!(a.eq_ignore_case(&b));
        assert_ne!(a, b);

        assert!("foo".parse::<Authority>().is_err());
        assert!("foo:bar".parse::<Authority>().is_err());
        assert!(":1234".parse::<Authority>().is_err());
        assert!("foo:123456".parse::<Authority>().is_err());
    }

    /// Test that a query map refuses repeated keys.
    #[test]
    fn test_query_map_rejects_duplicates() {
        let mut q = QueryMap::default();
        q.insert(QueryKey::T0, Some("-1d".into())).expect("first t0");
        q.insert(QueryKey::Ts, None).expect("ts");
        let err = q.insert(QueryKey::T0, Some("-2d".into())).unwrap_err();
        assert!(err.contains("t0"));
        assert_eq!(q.value(QueryKey::T0), Some("-1d"));
        assert!(q.contains(QueryKey::Ts));
        assert_eq!(q.value(QueryKey::Ts), None);
    }

    /// Test scheme and kind parsing.
    #[test]
    fn test_scheme_and_kind() {
        assert_eq!("tgarch".parse::<Scheme>(), Ok(Scheme::TangoArchiving));
        assert_eq!("archiving".parse::<Scheme>(), Ok(Scheme::Archiving));
        assert!("tango".parse::<Scheme>().is_err());
        assert_eq!(Scheme::Archiving.time_format(), TimeFormat::Epoch);
        assert_eq!("Attribute".parse::<ElementKind>(), Ok(ElementKind::Attribute));
        assert_eq!(ElementKind::Device.to_string(), "device");
    }
}
