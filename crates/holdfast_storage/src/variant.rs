//! Resource variants.

use std::collections::BTreeMap;
use std::fmt;
use std::hash::Hash;

/// Identity of a transferable resource.
///
/// A variant names *what* is stored, never how much. Every variant type has
/// one blank value standing for "nothing", and storages hold a blank
/// variant exactly when they hold no amount.
pub trait TransferVariant: Clone + Eq + Hash + fmt::Debug + 'static {
    /// Returns the blank variant.
    fn blank() -> Self;

    /// Returns `true` if this is the blank variant.
    fn is_blank(&self) -> bool;
}

/// General purpose variant: a kind plus optional attributes.
///
/// Two variants are equal only if both the kind and every attribute match,
/// so `water` and `water{temperature=hot}` are stored separately.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ResourceVariant {
    kind: Option<String>,
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "BTreeMap::is_empty")
    )]
    attributes: BTreeMap<String, String>,
}

impl ResourceVariant {
    /// Creates a variant of the given kind with no attributes.
    pub fn of(kind: impl Into<String>) -> Self {
        Self {
            kind: Some(kind.into()),
            attributes: BTreeMap::new(),
        }
    }

    /// Returns a copy of this variant with an attribute set.
    ///
    /// Attributes on the blank variant are ignored, since blank carries
    /// no data.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        if self.kind.is_some() {
            self.attributes.insert(key.into(), value.into());
        }
        self
    }

    /// Returns the kind, or `None` for the blank variant.
    #[must_use]
    pub fn kind(&self) -> Option<&str> {
        self.kind.as_deref()
    }

    /// Returns `true` if the variant is of `kind`, whatever its attributes.
    #[must_use]
    pub fn is_of(&self, kind: &str) -> bool {
        self.kind.as_deref() == Some(kind)
    }

    /// Returns an attribute value.
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Returns the attributes in key order.
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }
}

impl TransferVariant for ResourceVariant {
    fn blank() -> Self {
        Self::default()
    }

    fn is_blank(&self) -> bool {
        self.kind.is_none()
    }
}

impl fmt::Display for ResourceVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(kind) = &self.kind else {
            return write!(f, "blank");
        };
        write!(f, "{kind}")?;
        if !self.attributes.is_empty() {
            write!(f, "{{")?;
            for (i, (key, value)) in self.attributes.iter().enumerate() {
                if i > 0 {
                    write!(f, ",")?;
                }
                write!(f, "{key}={value}")?;
            }
            write!(f, "}}")?;
        }
        Ok(())
    }
}
