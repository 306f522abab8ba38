//! Variable definitions.
//!
//! A [`Variable`] is a named placeholder that query templates reference. Its
//! [`VariableArguments`] decide how it resolves: by running a query, by picking from a
//! key/value map, or from a constant list.

use chrono::{DateTime, Utc};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Opaque variable identifier.
pub type VariableId = String;

/// Opaque display-context identifier (e.g. one dashboard cell).
pub type ContextId = String;

/// The three resolution kinds a variable can have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableKind {
    /// Values come from executing a query template
    Query,
    /// Values are the keys of a literal map; the mapped literal is substituted
    Map,
    /// Values are a literal list of strings
    Constant,
}

impl fmt::Display for VariableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariableKind::Query => write!(f, "query"),
            VariableKind::Map => write!(f, "map"),
            VariableKind::Constant => write!(f, "constant"),
        }
    }
}

impl std::str::FromStr for VariableKind {
    type Err = crate::core::HydrateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "query" => Ok(VariableKind::Query),
            "map" => Ok(VariableKind::Map),
            "constant" | "csv" => Ok(VariableKind::Constant),
            _ => Err(crate::core::HydrateError::Other {
                message: format!("Unknown variable kind: {s}"),
            }),
        }
    }
}

/// Ordered key/value pairs of a map variable.
///
/// Serialized as a plain map; entry order from the source document is kept because the
/// first key is the default selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MapValues(Vec<(String, String)>);

impl MapValues {
    /// Build from ordered entries. Later duplicates of a key are dropped.
    pub fn new<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut pairs: Vec<(String, String)> = Vec::new();
        for (key, value) in entries {
            let key = key.into();
            if !pairs.iter().any(|(existing, _)| *existing == key) {
                pairs.push((key, value.into()));
            }
        }
        Self(pairs)
    }

    /// Look up the literal for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    /// Keys in document order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    /// Entries in document order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the map has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for MapValues {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in &self.0 {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for MapValues {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct MapValuesVisitor;

        impl<'de> Visitor<'de> for MapValuesVisitor {
            type Value = MapValues;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of string keys to string values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((key, value)) = access.next_entry::<String, String>()? {
                    entries.push((key, value));
                }
                Ok(MapValues::new(entries))
            }
        }

        deserializer.deserialize_map(MapValuesVisitor)
    }
}

/// Kind-specific payload of a variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum VariableArguments {
    /// A query template, possibly referencing other variables by placeholder
    Query {
        /// The template text
        query: String,
        /// Optional language tag passed through to the executor
        #[serde(default, skip_serializing_if = "Option::is_none")]
        language: Option<String>,
    },
    /// An ordered key → literal mapping
    Map {
        /// The mapping
        values: MapValues,
    },
    /// An ordered list of literal strings
    #[serde(alias = "csv")]
    Constant {
        /// The literals
        values: Vec<String>,
    },
}

impl VariableArguments {
    /// The resolution kind of these arguments.
    #[must_use]
    pub fn kind(&self) -> VariableKind {
        match self {
            VariableArguments::Query {
                ..
            } => VariableKind::Query,
            VariableArguments::Map {
                ..
            } => VariableKind::Map,
            VariableArguments::Constant {
                ..
            } => VariableKind::Constant,
        }
    }

    /// The query template, for query variables.
    #[must_use]
    pub fn query_text(&self) -> Option<&str> {
        match self {
            VariableArguments::Query {
                query,
                ..
            } => Some(query),
            _ => None,
        }
    }
}

/// A label attached to variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    /// Label identifier
    pub id: String,
    /// Display name
    pub name: String,
}

/// A variable definition as stored for an organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    /// Opaque identifier
    pub id: VariableId,
    /// Owning organization
    #[serde(default)]
    pub org_id: String,
    /// Name, unique within the organization; this is what query templates reference
    pub name: String,
    /// Resolution rule
    pub arguments: VariableArguments,
    /// Attached labels
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<Label>,
    /// Creation timestamp, set by persistence
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Last update timestamp, set by persistence
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Variable {
    /// Create a variable with the given arguments and no labels or timestamps.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: VariableArguments,
    ) -> Self {
        Self {
            id: id.into(),
            org_id: String::new(),
            name: name.into(),
            arguments,
            labels: Vec::new(),
            created_at: None,
            updated_at: None,
        }
    }

    /// Create a query variable without a language tag.
    pub fn query(id: impl Into<String>, name: impl Into<String>, query: impl Into<String>) -> Self {
        Self::new(
            id,
            name,
            VariableArguments::Query {
                query: query.into(),
                language: None,
            },
        )
    }

    /// Create a map variable from ordered entries.
    pub fn map<K, V>(
        id: impl Into<String>,
        name: impl Into<String>,
        entries: impl IntoIterator<Item = (K, V)>,
    ) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self::new(
            id,
            name,
            VariableArguments::Map {
                values: MapValues::new(entries),
            },
        )
    }

    /// Create a constant variable.
    pub fn constant<S: Into<String>>(
        id: impl Into<String>,
        name: impl Into<String>,
        values: impl IntoIterator<Item = S>,
    ) -> Self {
        Self::new(
            id,
            name,
            VariableArguments::Constant {
                values: values.into_iter().map(Into::into).collect(),
            },
        )
    }

    /// Set the owning organization.
    #[must_use]
    pub fn with_org(mut self, org_id: impl Into<String>) -> Self {
        self.org_id = org_id.into();
        self
    }

    /// The resolution kind.
    #[must_use]
    pub fn kind(&self) -> VariableKind {
        self.arguments.kind()
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.name)
    }
}

/// Fields supplied by a caller creating a variable; persistence assigns the id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewVariable {
    /// Name, must be unique in the organization
    pub name: String,
    /// Resolution rule
    pub arguments: VariableArguments,
    /// Initial labels
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<Label>,
}
