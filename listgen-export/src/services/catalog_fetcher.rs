//! Priced-item retrieval from the ERP reporting database
//!
//! Fetch order: priced items → dedupe → capacity check → item details and
//! attribute triples (batched) → pivot → left join onto the priced items.
//! The capacity check runs before any detail query so oversized price lists
//! are rejected before image indexing or spreadsheet work starts.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{CatalogError, ExportError};
use crate::models::{
    attr, AttributeTriple, CatalogItem, CompanyProfile, ItemDetail, PrecheckResult, PricedItem,
};
use crate::services::progress_reporter::ProgressReporter;

/// Catalog query interface, scoped per company by its table prefix
///
/// Every predicate is a bound parameter; implementations never splice codes
/// into SQL text.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Price-list rows for a (sales code, price memo) pair, duplicates included
    async fn priced_items(
        &self,
        company: &CompanyProfile,
        sales_code: &str,
        price_memo: &str,
    ) -> Result<Vec<PricedItem>, CatalogError>;

    /// Number of distinct items on a price list
    async fn count_priced_items(
        &self,
        company: &CompanyProfile,
        sales_code: &str,
        price_memo: &str,
    ) -> Result<u64, CatalogError>;

    /// Item-table rows for one batch of item numbers
    async fn item_details(
        &self,
        company: &CompanyProfile,
        item_nos: &[String],
    ) -> Result<Vec<ItemDetail>, CatalogError>;

    /// Normalized attribute rows for one batch of item numbers
    ///
    /// Empty for companies whose attributes are item-table columns.
    async fn item_attributes(
        &self,
        company: &CompanyProfile,
        item_nos: &[String],
    ) -> Result<Vec<AttributeTriple>, CatalogError>;
}

pub struct CatalogFetcher {
    source: Arc<dyn CatalogSource>,
    max_items: usize,
    batch_size: usize,
}

impl CatalogFetcher {
    pub fn new(source: Arc<dyn CatalogSource>, max_items: usize, batch_size: usize) -> Self {
        Self {
            source,
            max_items,
            batch_size: batch_size.max(1),
        }
    }

    /// Merged, deduplicated item dataset for a price list
    pub async fn fetch(
        &self,
        company: &CompanyProfile,
        sales_code: &str,
        price_memo: &str,
        progress: &ProgressReporter,
    ) -> Result<Vec<CatalogItem>, ExportError> {
        progress.status(format!("Querying {} price list...", company.database));

        let priced = self
            .source
            .priced_items(company, sales_code, price_memo)
            .await?;
        if priced.is_empty() {
            return Err(ExportError::NotFound(format!(
                "no priced items in {} for sales code {} / price memo {}",
                company.database, sales_code, price_memo
            )));
        }

        let raw_count = priced.len();
        let priced = dedupe_highest_price(priced);
        if priced.len() > self.max_items {
            return Err(ExportError::Capacity {
                count: priced.len(),
                limit: self.max_items,
            });
        }
        info!(
            company = company.code,
            rows = raw_count,
            items = priced.len(),
            "Priced items fetched"
        );

        let item_nos: Vec<String> = priced.iter().map(|p| p.item_no.clone()).collect();
        let mut details: HashMap<String, BTreeMap<String, String>> = HashMap::new();
        let mut triples = Vec::new();

        let batches = item_nos.len().div_ceil(self.batch_size);
        for (idx, batch) in item_nos.chunks(self.batch_size).enumerate() {
            progress.status(format!("Fetching item details (batch {}/{})", idx + 1, batches));

            for detail in self.source.item_details(company, batch).await? {
                details.entry(detail.item_no).or_insert(detail.attributes);
            }
            triples.extend(self.source.item_attributes(company, batch).await?);
        }
        debug!(
            details = details.len(),
            triples = triples.len(),
            "Item details fetched"
        );

        let pivoted = pivot_attributes(triples);
        Ok(merge_items(priced, details, pivoted))
    }

    /// Cheap existence probe using the same keys as [`fetch`](Self::fetch)
    pub async fn precheck(
        &self,
        company: &CompanyProfile,
        sales_code: &str,
        price_memo: &str,
    ) -> Result<PrecheckResult, ExportError> {
        if sales_code.trim().is_empty() || price_memo.trim().is_empty() {
            return Ok(PrecheckResult {
                exists: false,
                count: 0,
            });
        }

        let count = self
            .source
            .count_priced_items(company, sales_code, price_memo)
            .await?;
        Ok(PrecheckResult {
            exists: count > 0,
            count,
        })
    }
}

/// One row per item number, keeping the strictly higher price
///
/// On equal prices the first row seen is kept. Output keeps first-seen order.
pub fn dedupe_highest_price(items: Vec<PricedItem>) -> Vec<PricedItem> {
    let mut position: HashMap<String, usize> = HashMap::new();
    let mut kept: Vec<PricedItem> = Vec::with_capacity(items.len());

    for item in items {
        match position.get(&item.item_no) {
            Some(&idx) => {
                if item.unit_price > kept[idx].unit_price {
                    kept[idx] = item;
                }
            }
            None => {
                position.insert(item.item_no.clone(), kept.len());
                kept.push(item);
            }
        }
    }

    kept
}

/// Turn (item, attribute, value) rows into per-item attribute maps
///
/// Attribute names are mapped onto canonical keys. Rows with no value are
/// ignored; the first non-empty value of an attribute wins.
pub fn pivot_attributes(triples: Vec<AttributeTriple>) -> HashMap<String, BTreeMap<String, String>> {
    let mut pivoted: HashMap<String, BTreeMap<String, String>> = HashMap::new();

    for triple in triples {
        let Some(value) = triple.value.filter(|v| !v.trim().is_empty()) else {
            continue;
        };
        let name = triple.name.trim();
        if name.is_empty() {
            continue;
        }

        pivoted
            .entry(triple.item_no)
            .or_default()
            .entry(attr::canonical(name).to_string())
            .or_insert(value);
    }

    pivoted
}

/// Left join of details and pivoted attributes onto priced items
///
/// Pivoted attributes override item-table columns of the same name.
pub fn merge_items(
    priced: Vec<PricedItem>,
    mut details: HashMap<String, BTreeMap<String, String>>,
    mut pivoted: HashMap<String, BTreeMap<String, String>>,
) -> Vec<CatalogItem> {
    priced
        .into_iter()
        .map(|p| {
            let mut attributes = details.remove(&p.item_no).unwrap_or_default();
            if let Some(extra) = pivoted.remove(&p.item_no) {
                attributes.extend(extra);
            }
            CatalogItem {
                item_no: p.item_no,
                unit_price: p.unit_price,
                attributes,
            }
        })
        .collect()
}
