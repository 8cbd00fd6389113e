//! Structured descriptors produced by canonicalization.

use crate::names::{AttributePath, Authority, Scheme};

/// One resolved time bound: the epoch handed to readers and its canonical text.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeBound {
    /// Epoch seconds
    pub epoch: f64,
    /// Rendering used in canonical names (epoch number or local date-time)
    pub text: String,
}

/// Concrete `[start, end]` window; no relative tokens survive canonicalization.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeWindow {
    pub start: TimeBound,
    pub end: TimeBound,
}

/// Resolved authority name.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthorityDescriptor {
    pub scheme: Scheme,
    pub authority: Authority,
}

/// Resolved device name: an archiving database under an authority.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceDescriptor {
    pub scheme: Scheme,
    pub authority: Authority,
    pub db: String,
}

impl DeviceDescriptor {
    /// Complete device name, e.g. `tgarch://foo:1234?db=hdbpp`.
    pub fn complete_name(&self) -> String {
        format!("{}:{}?db={}", self.scheme, self.authority.uri(), self.db)
    }
}

/// Resolved archived attribute name. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeDescriptor {
    pub scheme: Scheme,
    pub authority: Authority,
    pub db: String,
    pub path: AttributePath,
    pub window: TimeWindow,
    /// Whether the timestamp view is selected (`ts` marker)
    pub return_timestamps: bool,
    pub fragment: Option<String>,
}

impl AttributeDescriptor {
    /// Fully explicit name, with every default materialized.
    pub fn complete_name(&self) -> String {
        let mut name = self.base_name();
        if self.return_timestamps {
            name.push_str(";ts");
        }
        name
    }

    /// Complete name without the `ts` marker; shared by both views.
    pub fn base_name(&self) -> String {
        format!(
            "{}:{}/{}?db={};t0={};t1={}",
            self.scheme,
            self.authority.uri(),
            self.path,
            self.db,
            self.window.start.text,
            self.window.end.text
        )
    }

    /// Complete name without the window, e.g. `archiving://foo:1234/a/b/c/d?db=*;ts`.
    ///
    /// Every window of one attribute view shares it.
    pub fn windowless_name(&self) -> String {
        let ts = if self.return_timestamps { ";ts" } else { "" };
        format!("{}:{}/{}?db={}{ts}", self.scheme, self.authority.uri(), self.path, self.db)
    }

    /// The same attribute and window with the view marker toggled.
    pub fn complementary(&self) -> Self {
        Self { return_timestamps: !self.return_timestamps, ..self.clone() }
    }

    /// Complete name of the complementary view.
    pub fn complementary_name(&self) -> String {
        self.complementary().complete_name()
    }

    /// Owning device of this attribute.
    pub fn device(&self) -> DeviceDescriptor {
        DeviceDescriptor {
            scheme: self.scheme,
            authority: self.authority.clone(),
            db: self.db.clone(),
        }
    }

    /// Display label, e.g. `a/b/c/d (archiving ts)`.
    pub fn label(&self) -> String {
        if self.return_timestamps {
            format!("{} (archiving ts)", self.path)
        } else {
            format!("{} (archiving)", self.path)
        }
    }
}

/// Closed set of resolved element kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceDescriptor {
    Authority(AuthorityDescriptor),
    Device(DeviceDescriptor),
    Attribute(AttributeDescriptor),
}

impl ResourceDescriptor {
    pub const fn scheme(&self) -> Scheme {
        match self {
            Self::Authority(d) => d.scheme,
            Self::Device(d) => d.scheme,
            Self::Attribute(d) => d.scheme,
        }
    }

    pub const fn as_attribute(&self) -> Option<&AttributeDescriptor> {
        match self {
            Self::Attribute(d) => Some(d),
            _ => None,
        }
    }
}
