//! Change sets for single-item updates
//!
//! A [`ChangeSet`] maps record property names to update actions. It is built
//! either from typed changes (anything implementing [`AttributeChange`]) or,
//! at a dynamic edge, from `(action, value)` pairs checked by
//! [`ChangeSet::from_dynamic`]. Resolution against the table drops every
//! property the table does not declare.

use keyway_common::{
    AttributeAction, AttributeUpdates, AttributeValue, Result, TableMetadata, UpdateAction,
};
use std::collections::BTreeMap;
use tracing::debug;

/// One typed property change
pub trait AttributeChange {
    /// Property name and the action to apply to it
    fn into_change(self) -> (String, UpdateAction);
}

impl<P: Into<String>> AttributeChange for (P, UpdateAction) {
    fn into_change(self) -> (String, UpdateAction) {
        (self.0.into(), self.1)
    }
}

/// Property name to update action; later changes to a property win
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChangeSet {
    changes: BTreeMap<String, UpdateAction>,
}

impl ChangeSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from untyped `(property, (action, value))` pairs
    ///
    /// PUT and ADD without a value are rejected as validation errors.
    pub fn from_dynamic<I, P>(changes: I) -> Result<Self>
    where
        I: IntoIterator<Item = (P, (AttributeAction, Option<AttributeValue>))>,
        P: Into<String>,
    {
        let mut set = Self::new();
        for (property, (action, value)) in changes {
            set.insert((property, UpdateAction::from_parts(action, value)?));
        }
        Ok(set)
    }

    pub fn insert(&mut self, change: impl AttributeChange) {
        let (property, action) = change.into_change();
        self.changes.insert(property, action);
    }

    #[must_use]
    pub fn with(mut self, change: impl AttributeChange) -> Self {
        self.insert(change);
        self
    }

    #[must_use]
    pub fn put(self, property: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.with((property, UpdateAction::Put(value.into())))
    }

    #[must_use]
    pub fn add(self, property: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.with((property, UpdateAction::Add(value.into())))
    }

    /// Remove the attribute
    #[must_use]
    pub fn delete(self, property: impl Into<String>) -> Self {
        self.with((property, UpdateAction::Delete(None)))
    }

    /// Remove elements from a set attribute
    #[must_use]
    pub fn delete_elements(self, property: impl Into<String>, elements: AttributeValue) -> Self {
        self.with((property, UpdateAction::Delete(Some(elements))))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &UpdateAction)> {
        self.changes.iter()
    }

    /// Translate declared properties to store attribute updates
    #[must_use]
    pub fn resolve(&self, table: &TableMetadata) -> AttributeUpdates {
        let mut updates = AttributeUpdates::new();
        for (property, action) in &self.changes {
            match table.attribute_by_property(property) {
                Some(attr) => {
                    updates.insert(attr.name.clone(), action.clone());
                }
                None => debug!(
                    table = %table.name,
                    property = %property,
                    "Dropping change to undeclared property"
                ),
            }
        }
        updates
    }
}

impl<C: AttributeChange> FromIterator<C> for ChangeSet {
    fn from_iter<I: IntoIterator<Item = C>>(iter: I) -> Self {
        let mut set = Self::new();
        for change in iter {
            set.insert(change);
        }
        set
    }
}

impl<C: AttributeChange> Extend<C> for ChangeSet {
    fn extend<I: IntoIterator<Item = C>>(&mut self, iter: I) {
        for change in iter {
            self.insert(change);
        }
    }
}
