//! Locally maintained reference data: vendor codes and brand hierarchy

use serde::Serialize;
use std::collections::HashMap;

/// Vendor code stamped on exports when no mapping exists
pub const PLACEHOLDER_VENDOR_CODE: &str = "000000";

/// Hierarchy code used for every level of an unknown brand
pub const PLACEHOLDER_HIERARCHY_CODE: &str = "000";

/// Retailer-required vendor identifiers for one (chain, company) export
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VendorMapping {
    pub vendor_code: String,
    pub mfg_part_no: String,
}

impl Default for VendorMapping {
    fn default() -> Self {
        Self {
            vendor_code: PLACEHOLDER_VENDOR_CODE.to_string(),
            mfg_part_no: String::new(),
        }
    }
}

/// Department / sub-department / class / sub-class for a brand
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BrandHierarchy {
    pub dept: String,
    pub sub_dept: String,
    pub class: String,
    pub sub_class: String,
    pub subclass_name: Option<String>,
}

impl BrandHierarchy {
    /// Hierarchy used for brands the reference store does not know.
    ///
    /// Unknown brands are exported under this placeholder rather than rejected;
    /// downstream retail teams rely on the `000` codes to spot them.
    pub fn placeholder() -> Self {
        Self {
            dept: PLACEHOLDER_HIERARCHY_CODE.to_string(),
            sub_dept: PLACEHOLDER_HIERARCHY_CODE.to_string(),
            class: PLACEHOLDER_HIERARCHY_CODE.to_string(),
            sub_class: PLACEHOLDER_HIERARCHY_CODE.to_string(),
            subclass_name: None,
        }
    }

    /// Department and sub-department codes joined, e.g. "054012"
    pub fn dept_code(&self) -> String {
        format!("{}{}", self.dept, self.sub_dept)
    }

    /// Class and sub-class codes joined
    pub fn class_code(&self) -> String {
        format!("{}{}", self.class, self.sub_class)
    }

    pub fn is_placeholder(&self) -> bool {
        *self == Self::placeholder()
    }
}

/// Raw hierarchy row as read from the reference store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HierarchyRow {
    pub brand_name: String,
    pub product_group: String,
    pub dept_code: Option<String>,
    pub sub_dept_code: Option<String>,
    pub class_code: Option<String>,
    pub subclass_code: Option<String>,
    pub subclass_name: Option<String>,
}

impl HierarchyRow {
    /// Convert to a hierarchy, defaulting blank codes level by level
    pub fn to_hierarchy(&self) -> BrandHierarchy {
        fn code(value: &Option<String>) -> String {
            match value.as_deref().map(str::trim) {
                Some(v) if !v.is_empty() => v.to_string(),
                _ => PLACEHOLDER_HIERARCHY_CODE.to_string(),
            }
        }

        BrandHierarchy {
            dept: code(&self.dept_code),
            sub_dept: code(&self.sub_dept_code),
            class: code(&self.class_code),
            sub_class: code(&self.subclass_code),
            subclass_name: self
                .subclass_name
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        }
    }
}

/// Everything the formatter needs from the reference store for one job
#[derive(Debug, Clone, Default)]
pub struct ReferenceData {
    pub vendor: VendorMapping,
    pub hierarchies: HashMap<String, BrandHierarchy>,
}

impl ReferenceData {
    /// Hierarchy for a brand bucket, placeholder when unknown
    pub fn hierarchy_for(&self, brand: &str) -> BrandHierarchy {
        self.hierarchies
            .get(brand)
            .cloned()
            .unwrap_or_else(BrandHierarchy::placeholder)
    }
}
