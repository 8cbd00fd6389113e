//! Regular grammars for authority, device and attribute names.
//!
//! Each grammar is anchored and built around the shared authority
//! sub-pattern. Attribute queries are matched loosely by the pattern and
//! then tokenized into a [`QueryMap`], which is where unknown keys,
//! malformed values and repeated keys are rejected.

use regex::{Captures, Regex};

use crate::error::{ArchivingError, Result};
use crate::names::{
    AttributePath, Authority, ElementKind, QueryKey, QueryMap, Scheme, UriGroups,
};

/// `//host:port`, host being dotted `[\w-]+` labels and port 1-5 digits.
const AUTHORITY: &str = r"//(?P<host>(?:[\w-]+\.)*[\w-]+):(?P<port>\d{1,5})";

/// Four `/`-separated segments, or a two-segment alias.
const ATTRIBUTE_PATH: &str =
    r"/(?:(?P<attrname>[^/?:#]+(?:/[^/?:#]+){3})|(?P<shortattrname>[^/?:#]+/[^/?:#]+))";

/// Compiled grammars for one scheme flavor.
#[derive(Debug, Clone)]
pub struct NameGrammar {
    scheme: Scheme,
    authority: Regex,
    device: Regex,
    attribute: Regex,
    db: Regex,
}

impl NameGrammar {
    /// Compile the grammars for `scheme`.
    ///
    /// # Parameters
    ///
    /// - `scheme` - Scheme flavor whose literal and database ids are accepted
    ///
    /// # Returns
    ///
    /// Returns a new `NameGrammar` instance.
    pub fn new(scheme: Scheme) -> Self {
        let s = regex::escape(scheme.literal());
        let db = scheme.db_pattern();

        let authority = format!(r"^(?P<scheme>{s}):(?P<authority>{AUTHORITY})$");
        let device = format!(
            r"^(?P<scheme>{s}):(?P<authority>{AUTHORITY})?\?(?P<query>db(?:=(?P<arch_db>{db}))?)$"
        );
        let attribute = format!(
            r"^(?P<scheme>{s}):(?P<authority>{AUTHORITY})?(?P<path>{ATTRIBUTE_PATH})(?:\?(?P<query>[^#]*))?(?:#(?P<fragment>[^# ]*))?$"
        );

        Self {
            scheme,
            authority: Regex::new(&authority).expect("valid authority grammar"),
            device: Regex::new(&device).expect("valid device grammar"),
            attribute: Regex::new(&attribute).expect("valid attribute grammar"),
            db: Regex::new(&format!("^(?:{db})$")).expect("valid db grammar"),
        }
    }

    pub const fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// Match `raw` against the grammar for `kind`.
    ///
    /// # Parameters
    ///
    /// - `raw` - Name as written by the caller; the scheme prefix may be
    ///   omitted when the name starts with `/` or `?`
    /// - `kind` - Element kind the name is expected to address
    ///
    /// # Returns
    ///
    /// Returns `Some(UriGroups)` when the name is valid, `None` otherwise.
    pub fn parse(&self, raw: &str, kind: ElementKind) -> Option<UriGroups> {
        self.try_parse(raw, kind).ok()
    }

    pub fn is_valid(&self, raw: &str, kind: ElementKind) -> bool {
        self.try_parse(raw, kind).is_ok()
    }

    /// Like [`parse`](Self::parse), but explains why a name was rejected.
    ///
    /// # Errors
    ///
    /// Returns `ArchivingError::InvalidName` if the name does not match the
    /// grammar, carries an unknown or malformed query element, or repeats a
    /// query key.
    pub fn try_parse(&self, raw: &str, kind: ElementKind) -> Result<UriGroups> {
        let name = self.with_scheme(raw);
        let pattern = match kind {
            ElementKind::Authority => &self.authority,
            ElementKind::Device => &self.device,
            ElementKind::Attribute => &self.attribute,
        };

        let caps = pattern.captures(&name).ok_or_else(|| {
            ArchivingError::invalid_name(
                raw,
                format!("does not match the {} {kind} grammar", self.scheme),
            )
        })?;

        let authority = caps
            .name("authority")
            .map(|_| Authority::new(&caps["host"], &caps["port"]));
        let query_text = caps.name("query").map(|m| m.as_str().to_string());

        let mut groups = UriGroups {
            raw: raw.to_string(),
            scheme: self.scheme,
            kind,
            authority,
            path: None,
            query_text,
            query: QueryMap::default(),
            fragment: None,
        };

        match kind {
            ElementKind::Authority => {}
            ElementKind::Device => {
                let db = caps.name("arch_db").map(|m| m.as_str().to_string());
                groups
                    .query
                    .insert(QueryKey::Db, db)
                    .map_err(|reason| ArchivingError::invalid_name(raw, reason))?;
            }
            ElementKind::Attribute => {
                groups.path = Some(Self::attribute_path(&caps));
                if let Some(query) = &groups.query_text {
                    groups.query = self
                        .parse_query(query)
                        .map_err(|reason| ArchivingError::invalid_name(raw, reason))?;
                }
                groups.fragment = caps.name("fragment").map(|m| m.as_str().to_string());
            }
        }

        Ok(groups)
    }

    /// Prefix the scheme when it was left implicit.
    fn with_scheme(&self, raw: &str) -> String {
        if raw.starts_with('/') || raw.starts_with('?') {
            format!("{}:{raw}", self.scheme.literal())
        } else {
            raw.to_string()
        }
    }

    fn attribute_path(caps: &Captures<'_>) -> AttributePath {
        match caps.name("attrname") {
            Some(m) => AttributePath::Full(m.as_str().to_string()),
            None => AttributePath::Alias(caps["shortattrname"].to_string()),
        }
    }

    /// Tokenize an attribute query separated by `;` or `?`.
    fn parse_query(&self, query: &str) -> std::result::Result<QueryMap, String> {
        let mut map = QueryMap::default();
        if query.is_empty() {
            return Ok(map);
        }

        for element in query.split([';', '?']) {
            if element.is_empty() {
                return Err(format!("empty element in query '{query}'"));
            }

            let (key, value) = match element.split_once('=') {
                Some((k, v)) => (k, Some(v)),
                None => (element, None),
            };

            let key = match key {
                "db" => QueryKey::Db,
                "t0" => QueryKey::T0,
                "t1" => QueryKey::T1,
                "ts" => QueryKey::Ts,
                other => return Err(format!("unknown query key '{other}'")),
            };

            match (key, value) {
                (QueryKey::Db, Some(v)) if !self.db.is_match(v) => {
                    return Err(format!("unknown archiving database '{v}'"));
                }
                (QueryKey::T0 | QueryKey::T1, None) => {
                    return Err(format!("query key '{key}' needs a value"));
                }
                (QueryKey::T0 | QueryKey::T1, Some(v)) if v.is_empty() || v.contains('=') => {
                    return Err(format!("malformed time expression '{v}' for '{key}'"));
                }
                (QueryKey::Ts, Some(_)) => {
                    return Err("query key 'ts' takes no value".to_string());
                }
                _ => {}
            }

            map.insert(key, value.map(str::to_string))?;
        }

        Ok(map)
    }
}
