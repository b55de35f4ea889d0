//! Core type definitions for keyway
//!
//! This module defines the store-native data model shared by every crate:
//! attribute values, primary keys, items, table metadata, write requests
//! and attribute update actions.

use crate::error::{Error, Result};
use bytes::Bytes;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Raw item as stored: attribute name to store-native value
pub type Item = BTreeMap<String, AttributeValue>;

/// Attribute updates keyed by store attribute name
pub type AttributeUpdates = BTreeMap<String, UpdateAction>;

/// Store-native attribute value
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    /// String
    S(String),
    /// Number, kept in its decimal string form
    N(String),
    /// Binary
    B(Bytes),
    /// String set
    Ss(BTreeSet<String>),
    /// Number set
    Ns(BTreeSet<String>),
    /// List
    L(Vec<AttributeValue>),
    /// Map
    M(BTreeMap<String, AttributeValue>),
}

impl AttributeValue {
    /// Short type descriptor used in error messages
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "NULL",
            Self::Bool(_) => "BOOL",
            Self::S(_) => "S",
            Self::N(_) => "N",
            Self::B(_) => "B",
            Self::Ss(_) => "SS",
            Self::Ns(_) => "NS",
            Self::L(_) => "L",
            Self::M(_) => "M",
        }
    }

    /// Whether this value may be used as a hash key
    #[must_use]
    pub const fn is_key_type(&self) -> bool {
        matches!(self, Self::S(_) | Self::N(_) | Self::B(_))
    }

    #[must_use]
    pub fn as_s(&self) -> Option<&str> {
        match self {
            Self::S(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_n(&self) -> Option<&str> {
        match self {
            Self::N(n) => Some(n),
            _ => None,
        }
    }

    /// Number value as an integer, if it parses as one
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        self.as_n().and_then(|n| n.parse().ok())
    }

    /// Number value as a float
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        self.as_n().and_then(|n| n.parse().ok())
    }

    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_b(&self) -> Option<&Bytes> {
        match self {
            Self::B(b) => Some(b),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Build a string set
    pub fn string_set<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Ss(values.into_iter().map(Into::into).collect())
    }

    /// Build a number set
    pub fn number_set<I, N>(values: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: ToString,
    {
        Self::Ns(values.into_iter().map(|n| n.to_string()).collect())
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::S(s) => write!(f, "{s:?}"),
            Self::N(n) => write!(f, "{n}"),
            Self::B(b) => write!(f, "<{} bytes>", b.len()),
            Self::Ss(set) => write!(f, "{set:?}"),
            Self::Ns(set) => write!(f, "{{{}}}", set.iter().cloned().collect::<Vec<_>>().join(", ")),
            Self::L(list) => write!(f, "[{} elements]", list.len()),
            Self::M(map) => write!(f, "{{{} attributes}}", map.len()),
        }
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        Self::S(s)
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        Self::S(s.to_string())
    }
}

impl From<bool> for AttributeValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

macro_rules! number_from {
    ($($t:ty),*) => {
        $(
            impl From<$t> for AttributeValue {
                fn from(n: $t) -> Self {
                    Self::N(n.to_string())
                }
            }
        )*
    };
}

number_from!(i32, i64, u32, u64, usize, f64);

impl From<Bytes> for AttributeValue {
    fn from(b: Bytes) -> Self {
        Self::B(b)
    }
}

impl From<Vec<u8>> for AttributeValue {
    fn from(b: Vec<u8>) -> Self {
        Self::B(Bytes::from(b))
    }
}

impl<T: Into<Self>> From<Option<T>> for AttributeValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Primary key of one item: key attribute name to value
///
/// Tables handled by this workspace have a hash key only, so a well-formed
/// key holds exactly one attribute.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Key(BTreeMap<String, AttributeValue>);

impl Key {
    /// Create a hash key
    pub fn hash(name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        let mut attrs = BTreeMap::new();
        attrs.insert(name.into(), value.into());
        Self(attrs)
    }

    /// Extract the key attributes from an item
    ///
    /// Returns `None` if any of the key attributes is missing.
    #[must_use]
    pub fn from_item(item: &Item, key_attributes: &[&str]) -> Option<Self> {
        key_attributes
            .iter()
            .map(|name| item.get(*name).map(|v| ((*name).to_string(), v.clone())))
            .collect::<Option<BTreeMap<_, _>>>()
            .map(Self)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.0.get(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &AttributeValue)> {
        self.0.iter()
    }

    /// Key attributes as an item (used when a write creates a new item)
    #[must_use]
    pub fn to_item(&self) -> Item {
        self.0.clone()
    }

    #[must_use]
    pub fn into_inner(self) -> BTreeMap<String, AttributeValue> {
        self.0
    }
}

impl FromIterator<(String, AttributeValue)> for Key {
    fn from_iter<I: IntoIterator<Item = (String, AttributeValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<BTreeMap<String, AttributeValue>> for Key {
    fn from(attrs: BTreeMap<String, AttributeValue>) -> Self {
        Self(attrs)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|(k, v)| format!("{k}={v}")).collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}

/// A declared attribute: store name and the record property it maps to
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeMetadata {
    /// Attribute name in the store
    pub name: String,
    /// Property name on the typed record
    pub property_name: String,
}

/// Table definition consumed by accessors
///
/// Immutable once built; accessors hold it behind an `Arc`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMetadata {
    /// Table name in the store
    pub name: String,
    /// Store name of the hash key attribute
    pub hash_key: String,
    /// Declared attributes
    pub attributes: Vec<AttributeMetadata>,
}

impl TableMetadata {
    /// Create table metadata with no declared attributes
    pub fn new(name: impl Into<String>, hash_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hash_key: hash_key.into(),
            attributes: Vec::new(),
        }
    }

    /// Declare an attribute. Re-declaring a property replaces its store name.
    #[must_use]
    pub fn with_attribute(
        mut self,
        name: impl Into<String>,
        property_name: impl Into<String>,
    ) -> Self {
        let attr = AttributeMetadata {
            name: name.into(),
            property_name: property_name.into(),
        };
        self.attributes.retain(|a| a.property_name != attr.property_name);
        self.attributes.push(attr);
        self
    }

    /// Look up a declared attribute by its record property name
    #[must_use]
    pub fn attribute_by_property(&self, property_name: &str) -> Option<&AttributeMetadata> {
        self.attributes
            .iter()
            .find(|a| a.property_name == property_name)
    }

    /// Look up a declared attribute by its store name
    #[must_use]
    pub fn attribute_by_name(&self, name: &str) -> Option<&AttributeMetadata> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Build the primary key for a hash key value
    pub fn key(&self, hash_value: impl Into<AttributeValue>) -> Key {
        Key::hash(self.hash_key.clone(), hash_value)
    }

    /// Extract the primary key of an item
    #[must_use]
    pub fn key_of(&self, item: &Item) -> Option<Key> {
        Key::from_item(item, &[self.hash_key.as_str()])
    }
}

/// Update action tag, as received at the dynamic interface edge
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum AttributeAction {
    #[display("PUT")]
    Put,
    #[display("ADD")]
    Add,
    #[display("DELETE")]
    Delete,
}

/// Single-attribute update
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UpdateAction {
    /// Replace the attribute value
    Put(AttributeValue),
    /// Add to a number or union into a set
    Add(AttributeValue),
    /// Remove the attribute, or remove the given elements from a set
    Delete(Option<AttributeValue>),
}

impl UpdateAction {
    /// Build an action from a dynamic `(action, value)` pair
    ///
    /// PUT and ADD require a value.
    pub fn from_parts(action: AttributeAction, value: Option<AttributeValue>) -> Result<Self> {
        match (action, value) {
            (AttributeAction::Put, Some(v)) => Ok(Self::Put(v)),
            (AttributeAction::Add, Some(v)) => Ok(Self::Add(v)),
            (AttributeAction::Delete, v) => Ok(Self::Delete(v)),
            (action, None) => Err(Error::validation(format!(
                "{action} update requires a value"
            ))),
        }
    }

    #[must_use]
    pub const fn action(&self) -> AttributeAction {
        match self {
            Self::Put(_) => AttributeAction::Put,
            Self::Add(_) => AttributeAction::Add,
            Self::Delete(_) => AttributeAction::Delete,
        }
    }

    #[must_use]
    pub const fn value(&self) -> Option<&AttributeValue> {
        match self {
            Self::Put(v) | Self::Add(v) => Some(v),
            Self::Delete(v) => v.as_ref(),
        }
    }
}

/// One entry of a batch write
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WriteRequest {
    Put { item: Item },
    Delete { key: Key },
}

impl WriteRequest {
    #[must_use]
    pub const fn put(item: Item) -> Self {
        Self::Put { item }
    }

    #[must_use]
    pub const fn delete(key: Key) -> Self {
        Self::Delete { key }
    }

    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Put { .. } => "put",
            Self::Delete { .. } => "delete",
        }
    }
}

/// Capacity consumed by a request, as reported by the store
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConsumedCapacity {
    pub table_name: String,
    pub capacity_units: f64,
}
