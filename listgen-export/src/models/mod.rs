//! Data models for the listing-template export pipeline

pub mod catalog_item;
pub mod company;
pub mod export_job;
pub mod layout;
pub mod reference;

pub use catalog_item::{attr, AttributeTriple, CatalogItem, ItemDetail, PricedItem, NO_BRAND};
pub use company::{AttributeLayout, CompanyProfile};
pub use export_job::{ExportRequest, JobContext, JobState, PrecheckResult, ProgressState};
pub use layout::{
    Banner, CellValue, ColumnSpec, FormattedSheet, HeaderStyle, PackagingMode, PreambleCell,
    RetailerLayout, Section,
};
pub use reference::{BrandHierarchy, HierarchyRow, ReferenceData, VendorMapping};
