//! Vendor and brand-hierarchy lookup for one export job
//!
//! Both lookups are bulk queries issued concurrently, so a job costs a fixed
//! number of reference round trips no matter how many items it exports.
//! Missing reference data is never an error: vendors fall back to `000000`
//! and unknown brands to the placeholder hierarchy.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{ExportError, ReferenceError};
use crate::models::{BrandHierarchy, CompanyProfile, HierarchyRow, ReferenceData, VendorMapping};

/// Read interface over the locally maintained reference tables
#[async_trait]
pub trait ReferenceStore: Send + Sync {
    /// Vendor code assigned to a company for one retail chain
    async fn chain_vendor_code(
        &self,
        chain: &str,
        company: &str,
    ) -> Result<Option<String>, ReferenceError>;

    /// Vendor code registered under a vendor name
    async fn vendor_code_by_name(&self, vendor_name: &str) -> Result<Option<String>, ReferenceError>;

    /// Manufacturer part number registered for a vendor code
    async fn mfg_part_no(&self, vendor_code: &str) -> Result<Option<String>, ReferenceError>;

    /// Every brand/subclass row whose product group or brand name matches one of `brands`
    async fn hierarchy_rows(&self, brands: &[String]) -> Result<Vec<HierarchyRow>, ReferenceError>;
}

pub struct ReferenceResolver {
    store: Arc<dyn ReferenceStore>,
}

impl ReferenceResolver {
    pub fn new(store: Arc<dyn ReferenceStore>) -> Self {
        Self { store }
    }

    /// Vendor mapping and per-brand hierarchy for a job
    pub async fn resolve(
        &self,
        chain: &str,
        company: &CompanyProfile,
        brands: &[String],
    ) -> Result<ReferenceData, ExportError> {
        let (vendor, rows) = tokio::try_join!(
            self.vendor_mapping(chain, company),
            self.store.hierarchy_rows(brands),
        )?;

        let hierarchies = match_hierarchies(brands, &rows);
        info!(
            chain,
            company = company.code,
            vendor_code = %vendor.vendor_code,
            brands = brands.len(),
            matched = hierarchies.len(),
            "Reference data resolved"
        );

        Ok(ReferenceData {
            vendor,
            hierarchies,
        })
    }

    async fn vendor_mapping(
        &self,
        chain: &str,
        company: &CompanyProfile,
    ) -> Result<VendorMapping, ReferenceError> {
        let vendor_code = match self.store.chain_vendor_code(chain, company.code).await? {
            Some(code) => Some(code),
            None => {
                debug!(chain, company = company.code, "No chain mapping, trying vendor name");
                self.store.vendor_code_by_name(company.vendor_name).await?
            }
        };

        let Some(vendor_code) = vendor_code.filter(|c| !c.trim().is_empty()) else {
            return Ok(VendorMapping::default());
        };
        let vendor_code = vendor_code.trim().to_string();

        let mfg_part_no = self
            .store
            .mfg_part_no(&vendor_code)
            .await?
            .map(|p| p.trim().to_string())
            .unwrap_or_default();

        Ok(VendorMapping {
            vendor_code,
            mfg_part_no,
        })
    }
}

/// Pick one hierarchy per brand from the candidate rows
///
/// A product-group match beats a brand-name match (both case-insensitive).
/// Among rows of the winning kind the lowest subclass code wins; rows without
/// a subclass sort last. Brands without any match are left out, which the
/// formatter reads as the placeholder hierarchy.
pub fn match_hierarchies(brands: &[String], rows: &[HierarchyRow]) -> HashMap<String, BrandHierarchy> {
    let mut result = HashMap::new();

    for brand in brands {
        let key = brand.trim();
        if key.is_empty() {
            continue;
        }

        let by_group = best_row(rows.iter().filter(|r| r.product_group.trim().eq_ignore_ascii_case(key)));
        let chosen = by_group
            .or_else(|| best_row(rows.iter().filter(|r| r.brand_name.trim().eq_ignore_ascii_case(key))));

        if let Some(row) = chosen {
            result.insert(brand.clone(), row.to_hierarchy());
        }
    }

    result
}

fn best_row<'a>(candidates: impl Iterator<Item = &'a HierarchyRow>) -> Option<&'a HierarchyRow> {
    candidates.min_by(|a, b| {
        let a_code = a.subclass_code.as_deref().map(str::trim).filter(|s| !s.is_empty());
        let b_code = b.subclass_code.as_deref().map(str::trim).filter(|s| !s.is_empty());
        match (a_code, b_code) {
            (Some(x), Some(y)) => x.cmp(y),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(brand: &str, group: &str, subclass: Option<&str>) -> HierarchyRow {
        HierarchyRow {
            brand_name: brand.to_string(),
            product_group: group.to_string(),
            dept_code: Some("054".to_string()),
            sub_dept_code: Some("012".to_string()),
            class_code: Some("101".to_string()),
            subclass_code: subclass.map(str::to_string),
            subclass_name: subclass.map(|s| format!("Subclass {}", s)),
        }
    }

    #[test]
    fn test_product_group_match_beats_brand_name() {
        let rows = vec![
            HierarchyRow {
                dept_code: Some("999".to_string()),
                ..row("CASIO", "OTHER", Some("001"))
            },
            row("Casio Watches", "CASIO", Some("005")),
        ];

        let matched = match_hierarchies(&["CASIO".to_string()], &rows);

        assert_eq!(matched["CASIO"].dept, "054");
        assert_eq!(matched["CASIO"].sub_class, "005");
    }

    #[test]
    fn test_brand_name_fallback_is_case_insensitive() {
        let rows = vec![row("Guess", "GS", Some("002"))];
        let matched = match_hierarchies(&["GUESS".to_string()], &rows);
        assert_eq!(matched["GUESS"].class_code(), "101002");
    }

    #[test]
    fn test_lowest_subclass_wins() {
        let rows = vec![
            row("Timex", "TMX", Some("030")),
            row("Timex", "TMX", None),
            row("Timex", "TMX", Some("010")),
        ];
        let matched = match_hierarchies(&["TMX".to_string()], &rows);
        assert_eq!(matched["TMX"].sub_class, "010");
    }

    #[test]
    fn test_unknown_brand_left_out() {
        let matched = match_hierarchies(&["NOPE".to_string()], &[row("Timex", "TMX", None)]);
        assert!(matched.is_empty());
    }
}
