//! Archiving settings: default authority, default window and cache policy.

use std::{fs, path::Path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::ViewPolicy;
use crate::names::{Authority, CanonicalDefaults, Canonicalizer, Scheme};
use crate::timeutil::{parse_utc_offset, TimeResolver};

/// Errors that can occur when loading or applying settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// I/O error while reading the settings file.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    /// YAML parsing error.
    #[error("yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),
    /// A value parsed but is not usable.
    #[error("invalid setting '{key}': {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Settings injected into the canonicalizer and the attribute cache.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ArchivingSettings {
    /// Scheme flavor served (`tgarch` by default).
    pub scheme: Scheme,
    /// `host:port` substituted when a name has no authority.
    pub default_authority: Option<String>,
    /// Window start used when `t0` is omitted.
    pub first: String,
    /// Window end used when `t1` is omitted.
    pub last: String,
    /// Offset used to render and parse local date-times (`±HH:MM`).
    pub utc_offset: String,
    /// Whether the value and timestamp views share one cache entry.
    pub view_policy: ViewPolicy,
}

impl Default for ArchivingSettings {
    fn default() -> Self {
        Self {
            scheme: Scheme::TangoArchiving,
            default_authority: None,
            first: "-1d".to_string(),
            last: "now".to_string(),
            utc_offset: "+00:00".to_string(),
            view_policy: ViewPolicy::default(),
        }
    }
}

impl ArchivingSettings {
    /// Load settings from a YAML file. Missing keys take their defaults.
    ///
    /// # Parameters
    ///
    /// - `path` - Path to the YAML settings file
    ///
    /// # Returns
    ///
    /// Returns `Ok(ArchivingSettings)` on success, or `SettingsError` if the file cannot be read or parsed.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let txt = fs::read_to_string(path)?;
        Self::from_yaml_str(&txt)
    }

    /// Parse settings from YAML text. An empty document gives the defaults.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::Yaml` on malformed input.
    pub fn from_yaml_str(txt: &str) -> Result<Self, SettingsError> {
        if txt.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(txt)?)
    }

    /// Parsed default authority.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::Invalid` when it is missing or not `host:port`.
    pub fn authority(&self) -> Result<Authority, SettingsError> {
        let raw = self.default_authority.as_deref().ok_or(SettingsError::Invalid {
            key: "default_authority",
            reason: "no default authority configured".to_string(),
        })?;
        raw.parse().map_err(|reason| SettingsError::Invalid { key: "default_authority", reason })
    }

    /// Time resolver configured with `utc_offset`.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::Invalid` when the offset cannot be parsed.
    pub fn time_resolver(&self) -> Result<TimeResolver, SettingsError> {
        let offset = parse_utc_offset(&self.utc_offset)
            .map_err(|reason| SettingsError::Invalid { key: "utc_offset", reason })?;
        Ok(TimeResolver::new(offset))
    }

    /// Canonical defaults, with `first` and `last` checked against the resolver.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::Invalid` for a bad authority or window expression.
    pub fn canonical_defaults(&self) -> Result<CanonicalDefaults, SettingsError> {
        let times = self.time_resolver()?;
        for (key, expr) in [("first", &self.first), ("last", &self.last)] {
            if times.resolve(expr, 0.0).is_none() {
                return Err(SettingsError::Invalid {
                    key,
                    reason: format!("'{expr}' is not a time expression"),
                });
            }
        }

        let mut defaults = CanonicalDefaults::new(self.authority()?);
        defaults.t0.clone_from(&self.first);
        defaults.t1.clone_from(&self.last);
        Ok(defaults)
    }

    /// Build the canonicalizer for these settings.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::Invalid` if any value is unusable.
    pub fn canonicalizer(&self) -> Result<Canonicalizer, SettingsError> {
        Ok(Canonicalizer::new(self.scheme, self.canonical_defaults()?, self.time_resolver()?))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;
    use crate::names::ElementKind;

    /// Test loading settings from a YAML file.
    #[test]
    fn test_load_from_path() {
        let mut file = NamedTempFile::new().expect("tempfile");
        writeln!(
            file,
            "scheme: archiving\ndefault_authority: foo:1234\nfirst: -2h\nview_policy: independent"
        )
        .expect("write");

        let settings = ArchivingSettings::load_from_path(file.path()).expect("settings");
        assert_eq!(settings.scheme, Scheme::Archiving);
        assert_eq!(settings.default_authority.as_deref(), Some("foo:1234"));
        assert_eq!(settings.first, "-2h");
        assert_eq!(settings.last, "now");
        assert_eq!(settings.view_policy, ViewPolicy::Independent);

        let c = settings.canonicalizer().expect("canonicalizer");
        let names = c.names("archiving:/a/b/c/d?t1=1000", ElementKind::Attribute, 0.0).expect("name");
        assert_eq!(names.complete, "archiving://foo:1234/a/b/c/d?db=*;t0=-7200;t1=1000");
    }

    /// Test that an empty document gives the defaults.
    #[test]
    fn test_empty_document() {
        let settings = ArchivingSettings::from_yaml_str("").expect("settings");
        assert_eq!(settings, ArchivingSettings::default());
        assert!(matches!(
            settings.authority(),
            Err(SettingsError::Invalid { key: "default_authority", .. })
        ));
    }

    /// Test rejection of unusable values.
    #[test]
    fn test_invalid_values() {
        let mut settings = ArchivingSettings {
            default_authority: Some("foo:1234".into()),
            ..ArchivingSettings::default()
        };
        assert!(settings.canonicalizer().is_ok());

        settings.utc_offset = "bogus".into();
        assert!(matches!(settings.canonicalizer(), Err(SettingsError::Invalid { key: "utc_offset", .. })));

        settings.utc_offset = "+01:00".into();
        settings.first = "yesterday".into();
        assert!(matches!(settings.canonicalizer(), Err(SettingsError::Invalid { key: "first", .. })));

        settings.first = "-1d".into();
        settings.default_authority = Some("no-port".into());
        assert!(matches!(
            settings.canonicalizer(),
            Err(SettingsError::Invalid { key: "default_authority", .. })
        ));

        assert!(matches!(ArchivingSettings::from_yaml_str("first: [1"), Err(SettingsError::Yaml(_))));
    }
}
