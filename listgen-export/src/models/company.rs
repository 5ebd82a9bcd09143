//! Source-company profiles
//!
//! Each company lives in an ERP reporting database under its own table prefix,
//! and stores extended item attributes in one of two shapes.

use serde::Serialize;

/// How a company's schema stores extended item attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AttributeLayout {
    /// Attributes are plain columns on the item table
    Columns,
    /// Attributes are (item, attribute-name, value) rows that must be pivoted
    Triples,
}

/// Where and how to read one company's catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompanyProfile {
    /// Short company code used in requests ("NIC", "ATC", "TPC")
    pub code: &'static str,
    /// Reporting database name
    pub database: &'static str,
    /// ERP table-name prefix, joined to table names with `$`
    pub table_prefix: &'static str,
    /// Registered vendor name, used when no chain-specific mapping exists
    pub vendor_name: &'static str,
    pub attribute_layout: AttributeLayout,
}

const KNOWN_COMPANIES: [CompanyProfile; 3] = [
    CompanyProfile {
        code: "NIC",
        database: "NICREP",
        table_prefix: "Newtrends International Corp_",
        vendor_name: "NEWTRENDS INTERNATIONAL CORP.",
        attribute_layout: AttributeLayout::Columns,
    },
    CompanyProfile {
        code: "ATC",
        database: "ATCREP",
        table_prefix: "About Time Corporation",
        vendor_name: "ABOUT TIME CORP.",
        attribute_layout: AttributeLayout::Triples,
    },
    CompanyProfile {
        code: "TPC",
        database: "ATCREP",
        table_prefix: "Transcend Prime Inc",
        vendor_name: "TIME PLUS CORP.",
        attribute_layout: AttributeLayout::Triples,
    },
];

impl CompanyProfile {
    /// Look up a company by code (case-insensitive)
    pub fn lookup(code: &str) -> Option<CompanyProfile> {
        let code = code.trim();
        KNOWN_COMPANIES
            .iter()
            .find(|c| c.code.eq_ignore_ascii_case(code))
            .cloned()
    }

    /// All registered companies
    pub fn all() -> &'static [CompanyProfile] {
        &KNOWN_COMPANIES
    }

    /// Quoted ERP table name, e.g. `"About Time Corporation$Item"`
    pub fn table(&self, name: &str) -> String {
        format!("\"{}${}\"", self.table_prefix, name)
    }
}
