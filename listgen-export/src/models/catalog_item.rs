//! Catalog rows: priced items, extended attributes and the merged item

use serde::Serialize;
use std::collections::BTreeMap;

/// Canonical attribute keys, independent of how a source schema names them
pub mod attr {
    pub const DESCRIPTION: &str = "Description";
    pub const BRAND: &str = "Brand";
    pub const STYLE: &str = "Style_Stockcode";
    pub const UNIT_OF_MEASURE: &str = "Unit_of_Measure";
    pub const NET_WEIGHT: &str = "Net Weight";
    pub const GROSS_WEIGHT: &str = "Gross Weight";
    pub const PRICE_POINT: &str = "Point_Power";
    pub const COLOR: &str = "Dial Color";
    pub const SIZE: &str = "Case _Frame Size";
    pub const GENDER: &str = "Gender";

    /// Map a triple attribute name onto its canonical key
    pub fn canonical(name: &str) -> &str {
        match name {
            "Pricepoint" => PRICE_POINT,
            other => other,
        }
    }
}

/// Bucket name for items whose brand code is blank
pub const NO_BRAND: &str = "NO BRAND";

/// One price-list hit for a (sales code, price memo) pair
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PricedItem {
    pub item_no: String,
    pub unit_price: f64,
}

impl PricedItem {
    pub fn new(item_no: impl Into<String>, unit_price: f64) -> Self {
        Self {
            item_no: item_no.into(),
            unit_price,
        }
    }
}

/// Item-table row keyed by canonical attribute names
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ItemDetail {
    pub item_no: String,
    pub attributes: BTreeMap<String, String>,
}

/// Normalized attribute row: (item, attribute name, value)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttributeTriple {
    pub item_no: String,
    pub name: String,
    pub value: Option<String>,
}

/// Priced item merged with its attributes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogItem {
    pub item_no: String,
    pub unit_price: f64,
    pub attributes: BTreeMap<String, String>,
}

impl CatalogItem {
    pub fn new(item_no: impl Into<String>, unit_price: f64) -> Self {
        Self {
            item_no: item_no.into(),
            unit_price,
            attributes: BTreeMap::new(),
        }
    }

    /// Builder-style attribute setter (tests and fixtures)
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.attributes.insert(key.to_string(), value.into());
        self
    }

    /// Attribute value, trimmed; empty when absent
    pub fn get(&self, key: &str) -> &str {
        self.attributes.get(key).map(|v| v.trim()).unwrap_or("")
    }

    /// Brand bucket this item belongs to
    pub fn brand(&self) -> &str {
        match self.get(attr::BRAND) {
            "" => NO_BRAND,
            brand => brand,
        }
    }
}
