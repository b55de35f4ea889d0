//! Record codec
//!
//! Typed records cross into the store as raw items. The conversion is owned
//! by the record type; accessors only call through this trait.

use keyway_common::{AttributeValue, Error, Item, Result, TableMetadata};

/// A typed entity stored as one item
pub trait Record: Sized + Send + Sync {
    /// Encode into a store item (store attribute names)
    fn to_item(&self) -> Item;

    /// Decode a store item read from `table`
    fn from_item(table: &TableMetadata, item: Item) -> Result<Self>;
}

/// Raw items pass through unchanged
impl Record for Item {
    fn to_item(&self) -> Item {
        self.clone()
    }

    fn from_item(_table: &TableMetadata, item: Item) -> Result<Self> {
        Ok(item)
    }
}

/// Value of a declared property, looked up by its store name
pub fn attribute<'a>(
    table: &TableMetadata,
    item: &'a Item,
    property_name: &str,
) -> Option<&'a AttributeValue> {
    let attr = table.attribute_by_property(property_name)?;
    item.get(&attr.name)
}

/// Like [`attribute`], but a missing value is a decode error
pub fn required_attribute<'a>(
    table: &TableMetadata,
    item: &'a Item,
    property_name: &str,
) -> Result<&'a AttributeValue> {
    attribute(table, item, property_name).ok_or_else(|| {
        Error::deserialization(format!(
            "item of '{}' is missing property '{property_name}'",
            table.name
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> TableMetadata {
        TableMetadata::new("users", "id")
            .with_attribute("id", "id")
            .with_attribute("full_name", "name")
    }

    #[test]
    fn test_attribute_lookup_uses_store_names() {
        let table = table();
        let mut item = Item::new();
        item.insert("id".into(), "u1".into());
        item.insert("full_name".into(), "Ada".into());

        assert_eq!(attribute(&table, &item, "name"), Some(&AttributeValue::from("Ada")));
        assert!(attribute(&table, &item, "full_name").is_none());

        let err = required_attribute(&table, &Item::new(), "name").unwrap_err();
        assert!(matches!(err, Error::Deserialization(_)));
    }

    #[test]
    fn test_raw_item_roundtrip() {
        let mut item = Item::new();
        item.insert("id".into(), "u1".into());
        assert_eq!(Item::from_item(&table(), item.to_item()).unwrap(), item);
    }
}
