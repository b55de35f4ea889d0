//! Attribute update semantics
//!
//! - PUT replaces the attribute
//! - ADD adds to a number or unions into a set; an absent attribute takes the value
//! - DELETE without a value removes the attribute; with a set it removes
//!   those elements, and an emptied set removes the attribute

use crate::error::{LocalStoreError, LocalStoreResult};
use keyway_common::{AttributeUpdates, AttributeValue, Item, UpdateAction};
use std::collections::BTreeSet;

/// Apply `updates` to `item` as one unit: on error `item` is left untouched
pub fn apply_updates(
    item: &mut Item,
    hash_key: &str,
    updates: &AttributeUpdates,
) -> LocalStoreResult<()> {
    if updates.contains_key(hash_key) {
        return Err(LocalStoreError::validation(format!(
            "cannot update hash key attribute '{hash_key}'"
        )));
    }

    let mut updated = item.clone();
    for (name, action) in updates {
        match action {
            UpdateAction::Put(value) => {
                updated.insert(name.clone(), value.clone());
            }
            UpdateAction::Add(value) => {
                let next = match updated.remove(name) {
                    None => add_to_absent(name, value)?,
                    Some(current) => add(name, current, value)?,
                };
                updated.insert(name.clone(), next);
            }
            UpdateAction::Delete(None) => {
                updated.remove(name);
            }
            UpdateAction::Delete(Some(value)) => {
                if let Some(current) = updated.remove(name) {
                    if let Some(remaining) = remove_elements(name, current, value)? {
                        updated.insert(name.clone(), remaining);
                    }
                }
            }
        }
    }

    *item = updated;
    Ok(())
}

fn add_to_absent(name: &str, value: &AttributeValue) -> LocalStoreResult<AttributeValue> {
    match value {
        AttributeValue::N(_) | AttributeValue::Ss(_) | AttributeValue::Ns(_) => Ok(value.clone()),
        other => Err(LocalStoreError::validation(format!(
            "ADD on '{name}' requires a number or set, got {}",
            other.type_name()
        ))),
    }
}

fn add(
    name: &str,
    current: AttributeValue,
    value: &AttributeValue,
) -> LocalStoreResult<AttributeValue> {
    match (current, value) {
        (AttributeValue::N(a), AttributeValue::N(b)) => {
            add_numbers(name, &a, b).map(AttributeValue::N)
        }
        (AttributeValue::Ss(mut a), AttributeValue::Ss(b)) => {
            a.extend(b.iter().cloned());
            Ok(AttributeValue::Ss(a))
        }
        (AttributeValue::Ns(mut a), AttributeValue::Ns(b)) => {
            a.extend(b.iter().cloned());
            Ok(AttributeValue::Ns(a))
        }
        (current, value) => Err(type_mismatch("ADD", name, &current, value)),
    }
}

fn remove_elements(
    name: &str,
    current: AttributeValue,
    value: &AttributeValue,
) -> LocalStoreResult<Option<AttributeValue>> {
    let shrink = |set: BTreeSet<String>, remove: &BTreeSet<String>| -> BTreeSet<String> {
        set.into_iter().filter(|e| !remove.contains(e)).collect()
    };
    let remaining = match (current, value) {
        (AttributeValue::Ss(a), AttributeValue::Ss(b)) => AttributeValue::Ss(shrink(a, b)),
        (AttributeValue::Ns(a), AttributeValue::Ns(b)) => AttributeValue::Ns(shrink(a, b)),
        (current, value) => return Err(type_mismatch("DELETE", name, &current, value)),
    };
    let empty = matches!(
        &remaining,
        AttributeValue::Ss(s) | AttributeValue::Ns(s) if s.is_empty()
    );
    Ok((!empty).then_some(remaining))
}

/// Sum two decimal numbers, exact for integers
fn add_numbers(name: &str, a: &str, b: &str) -> LocalStoreResult<String> {
    if let (Ok(x), Ok(y)) = (a.parse::<i128>(), b.parse::<i128>()) {
        if let Some(sum) = x.checked_add(y) {
            return Ok(sum.to_string());
        }
    }
    match (a.parse::<f64>(), b.parse::<f64>()) {
        (Ok(x), Ok(y)) => Ok((x + y).to_string()),
        _ => Err(LocalStoreError::validation(format!(
            "ADD on '{name}': invalid number operands '{a}' and '{b}'"
        ))),
    }
}

fn type_mismatch(
    action: &str,
    name: &str,
    current: &AttributeValue,
    value: &AttributeValue,
) -> LocalStoreError {
    LocalStoreError::validation(format!(
        "{action} on '{name}': cannot combine {} with {}",
        current.type_name(),
        value.type_name()
    ))
}
