//! Core domain types for combining pipeline outputs.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// GroupId
// ---------------------------------------------------------------------------

/// Identifies a coordination set of participants.
///
/// Participants that do not name a group all share [`GroupId::Default`], which
/// never compares equal to any named group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "Option<String>")]
pub enum GroupId {
    #[default]
    Default,
    Named(String),
}

impl GroupId {
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }
}

impl From<Option<String>> for GroupId {
    fn from(value: Option<String>) -> Self {
        value.map_or(Self::Default, Self::Named)
    }
}

impl From<GroupId> for Option<String> {
    fn from(value: GroupId) -> Self {
        match value {
            GroupId::Default => None,
            GroupId::Named(name) => Some(name),
        }
    }
}

impl std::fmt::Display for GroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Default => f.write_str("<default>"),
            Self::Named(name) => write!(f, "'{name}'"),
        }
    }
}

// ---------------------------------------------------------------------------
// ParticipantId
// ---------------------------------------------------------------------------

/// Opaque identity of one participant handle (UUID v7, generated per handle).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(pub Uuid);

impl ParticipantId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ParticipantId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Assets
// ---------------------------------------------------------------------------

/// The references one pipeline contributes, or the merged union of a group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assets {
    /// Script references in emission order.
    pub js: Vec<String>,
}

impl Assets {
    pub fn new<I, S>(js: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            js: js.into_iter().map(Into::into).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// ReferenceRecord
// ---------------------------------------------------------------------------

/// Value of a single reference attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Bool(bool),
    Text(String),
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// A script-like reference as the document generator sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceRecord {
    /// The referenced asset (e.g. `legacy-bundle.js`).
    pub source: String,
    /// Tag attributes in insertion order.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub attributes: IndexMap<String, AttrValue>,
}

impl ReferenceRecord {
    /// A reference with no attributes yet.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            attributes: IndexMap::new(),
        }
    }

    /// Builder-style attribute setter.
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}
