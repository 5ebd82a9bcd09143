//! Retailer template formatting
//!
//! Each retail chain is a [`RetailerTemplate`]: a static [`RetailerLayout`]
//! plus the rules deriving a row from a catalog item. Templates are looked up
//! in a [`TemplateRegistry`]; adding a retailer means registering a template,
//! never branching inside the shared code below.
//!
//! Shared code owns everything common to all layouts: bucketing by brand,
//! photo cells, projecting rows onto the declared columns, and containment
//! of row-level and bucket-level failures.

pub mod rds;
pub mod rustans;
pub mod sm;
pub mod text;

use std::collections::{BTreeMap, HashMap};
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::ExportError;
use crate::models::layout::IMAGE_SIZE_PX;
use crate::models::{
    BrandHierarchy, CatalogItem, CellValue, FormattedSheet, JobContext, PreambleCell,
    ReferenceData, RetailerLayout, VendorMapping,
};
use crate::services::image_index::ImageIndex;
use crate::services::progress_reporter::ProgressReporter;

pub use rds::RdsTemplate;
pub use rustans::RustansTemplate;
pub use sm::SmTemplate;

/// Photo cell text when no image matches the item
pub const IMAGE_NOT_FOUND: &str = "IMAGE NOT FOUND";

/// Photo cell text when the matched image cannot be decoded
pub const CORRUPT_IMAGE: &str = "CORRUPT IMAGE";

/// Cell values keyed by column key; keys a template leaves out become empty cells
pub type Row = HashMap<String, CellValue>;

/// Failures that void a whole brand bucket
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Invalid price value: {0}")]
    InvalidPrice(String),
}

/// What a template sees while building one bucket
#[derive(Debug, Clone, Copy)]
pub struct SheetContext<'a> {
    pub job: &'a JobContext,
    pub vendor: &'a VendorMapping,
    pub bucket: &'a str,
    pub hierarchy: &'a BrandHierarchy,
}

/// One retail chain's layout and value rules
pub trait RetailerTemplate: Send + Sync {
    fn layout(&self) -> &RetailerLayout;

    /// Values for one item; the photo column is filled by the formatter
    fn build_row(&self, item: &CatalogItem, sheet: &SheetContext<'_>) -> Result<Row, TemplateError>;

    /// Cells above the header row
    fn preamble(&self, _sheet: &SheetContext<'_>) -> Vec<PreambleCell> {
        Vec::new()
    }

    /// File name (without extension) of the bucket's archive entry
    fn entry_stem(&self, sheet: &SheetContext<'_>) -> String;

    /// Download name of the whole artifact, extension included
    fn artifact_name(&self, job: &JobContext) -> String;
}

/// Chain → template, with a generic default for unregistered chains
pub struct TemplateRegistry {
    templates: HashMap<String, Arc<dyn RetailerTemplate>>,
    default: Arc<dyn RetailerTemplate>,
}

impl TemplateRegistry {
    pub fn new(default: Arc<dyn RetailerTemplate>) -> Self {
        Self {
            templates: HashMap::new(),
            default,
        }
    }

    /// Registry with the built-in layouts: SM (default), RUSTANS and RDS
    pub fn builtin() -> Self {
        let sm: Arc<dyn RetailerTemplate> = Arc::new(SmTemplate::new());
        let mut registry = Self::new(sm.clone());
        registry.register("SM", sm);
        registry.register("RUSTANS", Arc::new(RustansTemplate::new()));
        registry.register("RDS", Arc::new(RdsTemplate::new()));
        registry
    }

    pub fn register(&mut self, chain: &str, template: Arc<dyn RetailerTemplate>) {
        self.templates.insert(chain.trim().to_uppercase(), template);
    }

    /// Template for a chain, falling back to the default layout
    pub fn resolve(&self, chain: &str) -> Arc<dyn RetailerTemplate> {
        self.templates
            .get(&chain.trim().to_uppercase())
            .cloned()
            .unwrap_or_else(|| self.default.clone())
    }

    pub fn is_registered(&self, chain: &str) -> bool {
        self.templates.contains_key(&chain.trim().to_uppercase())
    }
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Turns merged catalog items into one formatted sheet per brand bucket
pub struct TemplateFormatter<'a> {
    template: &'a dyn RetailerTemplate,
    images: &'a ImageIndex,
}

impl<'a> TemplateFormatter<'a> {
    pub fn new(template: &'a dyn RetailerTemplate, images: &'a ImageIndex) -> Self {
        Self { template, images }
    }

    /// Format every brand bucket, skipping buckets that fail
    ///
    /// Buckets come out in brand order; rows keep catalog order within a bucket.
    /// One progress tick per row.
    pub fn format(
        &self,
        items: &[CatalogItem],
        refs: &ReferenceData,
        job: &JobContext,
        progress: &ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<Vec<FormattedSheet>, ExportError> {
        let mut buckets: BTreeMap<&str, Vec<&CatalogItem>> = BTreeMap::new();
        for item in items {
            buckets.entry(item.brand()).or_default().push(item);
        }

        let mut sheets = Vec::with_capacity(buckets.len());
        for (bucket, bucket_items) in buckets {
            progress.status(format!("Processing Brand: {}", bucket));
            let before = progress.current();

            let hierarchy = refs.hierarchy_for(bucket);
            let sheet = SheetContext {
                job,
                vendor: &refs.vendor,
                bucket,
                hierarchy: &hierarchy,
            };

            match self.format_bucket(&bucket_items, &sheet, progress, cancel) {
                Ok(formatted) => sheets.push(formatted),
                Err(BucketFailure::Cancelled) => return Err(ExportError::Cancelled),
                Err(BucketFailure::Template(e)) => {
                    warn!(job_id = %progress.job_id(), bucket, error = %e, "Brand bucket skipped");
                    progress.advance_to(before + bucket_items.len() as u64, format!("Skipped brand: {}", bucket));
                }
            }
        }

        if sheets.is_empty() {
            return Err(ExportError::NoSheets);
        }

        info!(
            job_id = %progress.job_id(),
            sheets = sheets.len(),
            images_found = sheets.iter().map(|s| s.images_found).sum::<usize>(),
            "Formatting complete"
        );
        Ok(sheets)
    }

    fn format_bucket(
        &self,
        items: &[&CatalogItem],
        sheet: &SheetContext<'_>,
        progress: &ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<FormattedSheet, BucketFailure> {
        let layout = self.template.layout();
        let mut rows = Vec::with_capacity(items.len());
        let mut images_found = 0;

        for item in items {
            if cancel.is_cancelled() {
                return Err(BucketFailure::Cancelled);
            }

            let mut row = self.template.build_row(item, sheet)?;
            if let Some(key) = &layout.image_column {
                let cell = self.photo_cell(&item.item_no);
                if cell.is_image() {
                    images_found += 1;
                }
                row.insert(key.clone(), cell);
                progress.tick(format!("Inserting Images: {}", item.item_no));
            } else {
                progress.tick(format!("Formatting: {}", item.item_no));
            }

            rows.push(project(layout, row));
        }

        Ok(FormattedSheet {
            bucket: sheet.bucket.to_string(),
            hierarchy: sheet.hierarchy.clone(),
            file_stem: self.template.entry_stem(sheet),
            preamble: self.template.preamble(sheet),
            rows,
            images_found,
        })
    }

    /// Photo cell; misses and decode failures become text placeholders
    fn photo_cell(&self, item_no: &str) -> CellValue {
        let Some(path) = self.images.lookup(item_no) else {
            return CellValue::text(IMAGE_NOT_FOUND);
        };

        match thumbnail(path) {
            Ok(png) => CellValue::Image {
                name: format!("{}.png", item_no),
                png,
            },
            Err(e) => {
                debug!(item_no, path = %path.display(), error = %e, "Unreadable product image");
                CellValue::text(CORRUPT_IMAGE)
            }
        }
    }
}

enum BucketFailure {
    Cancelled,
    Template(TemplateError),
}

impl From<TemplateError> for BucketFailure {
    fn from(err: TemplateError) -> Self {
        BucketFailure::Template(err)
    }
}

/// Lay a keyed row out in the layout's column order
///
/// Every declared column gets a cell; keys not declared are dropped.
pub fn project(layout: &RetailerLayout, mut row: Row) -> Vec<CellValue> {
    layout
        .columns
        .iter()
        .map(|column| row.remove(&column.key).unwrap_or_default())
        .collect()
}

/// Decode, resize to the embedded footprint, re-encode as PNG
pub fn thumbnail(path: &Path) -> Result<Vec<u8>, image::ImageError> {
    let img = image::open(path)?;
    let resized = img.resize_exact(
        IMAGE_SIZE_PX,
        IMAGE_SIZE_PX,
        image::imageops::FilterType::Lanczos3,
    );

    let mut buffer = Cursor::new(Vec::new());
    resized.write_to(&mut buffer, image::ImageFormat::Png)?;
    Ok(buffer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{attr, ColumnSpec, CompanyProfile, HeaderStyle, PackagingMode};
    use chrono::NaiveDate;
    use image::{ImageBuffer, Rgb};
    use tempfile::TempDir;
    use uuid::Uuid;

    /// Two-column template whose price rule rejects negative prices
    struct TinyTemplate {
        layout: RetailerLayout,
    }

    impl TinyTemplate {
        fn new(with_photo: bool) -> Self {
            let mut columns = vec![
                ColumnSpec::keyed("ITEM", 10.0),
                ColumnSpec::keyed("PRICE", 10.0),
            ];
            if with_photo {
                columns.push(ColumnSpec::keyed("PHOTO", 35.0));
            }
            Self {
                layout: RetailerLayout {
                    chain: "TINY".to_string(),
                    sheet_name: "Sheet".to_string(),
                    columns,
                    header_row: 0,
                    data_start_row: 1,
                    sections: Vec::new(),
                    header_style: HeaderStyle {
                        fill: 0xFFFFFF,
                        font_size: 11.0,
                        wrap: false,
                    },
                    banner: None,
                    image_column: with_photo.then(|| "PHOTO".to_string()),
                    packaging: PackagingMode::Archive,
                },
            }
        }
    }

    impl RetailerTemplate for TinyTemplate {
        fn layout(&self) -> &RetailerLayout {
            &self.layout
        }

        fn build_row(&self, item: &CatalogItem, _sheet: &SheetContext<'_>) -> Result<Row, TemplateError> {
            if item.unit_price < 0.0 {
                return Err(TemplateError::InvalidPrice(item.unit_price.to_string()));
            }
            let mut row = Row::new();
            row.insert("ITEM".to_string(), CellValue::text(&item.item_no));
            row.insert("UNDECLARED".to_string(), CellValue::text("dropped"));
            Ok(row)
        }

        fn entry_stem(&self, sheet: &SheetContext<'_>) -> String {
            format!("TINY {}", sheet.bucket)
        }

        fn artifact_name(&self, _job: &JobContext) -> String {
            "tiny.zip".to_string()
        }
    }

    fn job() -> JobContext {
        JobContext {
            job_id: Uuid::new_v4(),
            chain: "TINY".to_string(),
            company: CompanyProfile::lookup("NIC").unwrap(),
            sales_code: "S1".to_string(),
            price_memo: "M1".to_string(),
            generated_at: NaiveDate::from_ymd_opt(2024, 3, 5)
                .unwrap()
                .and_hms_opt(14, 7, 0)
                .unwrap(),
        }
    }

    async fn reporter() -> ProgressReporter {
        use crate::services::progress_reporter::ProgressStore;
        let pool = listgen_common::db::open_in_memory().await.unwrap();
        crate::db::init_tables(&pool).await.unwrap();
        let store: Arc<dyn ProgressStore> = Arc::new(crate::db::SqliteProgressStore::new(pool));
        ProgressReporter::start(store, Uuid::new_v4()).await.0
    }

    #[tokio::test]
    async fn test_rows_follow_declared_columns() {
        let template = TinyTemplate::new(false);
        let index = ImageIndex::empty();
        let items = vec![CatalogItem::new("W100", 1.0).with(attr::BRAND, "CASIO")];

        let sheets = TemplateFormatter::new(&template, &index)
            .format(&items, &ReferenceData::default(), &job(), &reporter().await, &CancellationToken::new())
            .unwrap();

        assert_eq!(sheets.len(), 1);
        let row = &sheets[0].rows[0];
        assert_eq!(row.len(), 2);
        assert_eq!(row[0].as_text(), Some("W100"));
        assert_eq!(row[1].as_text(), Some(""));
        assert!(sheets[0].hierarchy.is_placeholder());
    }

    #[tokio::test]
    async fn test_buckets_by_brand_and_skips_failures() {
        let template = TinyTemplate::new(false);
        let index = ImageIndex::empty();
        let items = vec![
            CatalogItem::new("A1", 1.0).with(attr::BRAND, "TIMEX"),
            CatalogItem::new("B1", -1.0).with(attr::BRAND, "BROKEN"),
            CatalogItem::new("C1", 1.0),
            CatalogItem::new("A2", 1.0).with(attr::BRAND, "TIMEX"),
        ];
        let progress = reporter().await;

        let sheets = TemplateFormatter::new(&template, &index)
            .format(&items, &ReferenceData::default(), &job(), &progress, &CancellationToken::new())
            .unwrap();

        let buckets: Vec<&str> = sheets.iter().map(|s| s.bucket.as_str()).collect();
        assert_eq!(buckets, vec!["NO BRAND", "TIMEX"]);
        assert_eq!(sheets[1].rows.len(), 2);
        assert_eq!(sheets[1].file_stem, "TINY TIMEX");
        assert_eq!(progress.current(), 4);
    }

    #[tokio::test]
    async fn test_all_buckets_failing_is_no_sheets() {
        let template = TinyTemplate::new(false);
        let index = ImageIndex::empty();
        let items = vec![CatalogItem::new("B1", -1.0)];

        let result = TemplateFormatter::new(&template, &index).format(
            &items,
            &ReferenceData::default(),
            &job(),
            &reporter().await,
            &CancellationToken::new(),
        );
        assert!(matches!(result, Err(ExportError::NoSheets)));
    }

    #[tokio::test]
    async fn test_photo_cells() {
        let dir = TempDir::new().unwrap();
        let good = dir.path().join("W100.png");
        ImageBuffer::from_pixel(8, 8, Rgb([200u8, 10, 10])).save(&good).unwrap();
        let bad = dir.path().join("W200.jpg");
        std::fs::write(&bad, b"not a jpeg").unwrap();
        let index = ImageIndex::from_paths(vec![good, bad]);

        let template = TinyTemplate::new(true);
        let items = vec![
            CatalogItem::new("W100", 1.0),
            CatalogItem::new("W200", 1.0),
            CatalogItem::new("W300", 1.0),
        ];

        let sheets = TemplateFormatter::new(&template, &index)
            .format(&items, &ReferenceData::default(), &job(), &reporter().await, &CancellationToken::new())
            .unwrap();

        let rows = &sheets[0].rows;
        assert!(rows[0][2].is_image());
        assert_eq!(rows[1][2].as_text(), Some(CORRUPT_IMAGE));
        assert_eq!(rows[2][2].as_text(), Some(IMAGE_NOT_FOUND));
        assert_eq!(sheets[0].images_found, 1);
    }

    #[tokio::test]
    async fn test_cancelled_format() {
        let template = TinyTemplate::new(false);
        let index = ImageIndex::empty();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = TemplateFormatter::new(&template, &index).format(
            &[CatalogItem::new("A1", 1.0)],
            &ReferenceData::default(),
            &job(),
            &reporter().await,
            &cancel,
        );
        assert!(matches!(result, Err(ExportError::Cancelled)));
    }

    #[test]
    fn test_thumbnail_is_fixed_size_png() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("big.png");
        ImageBuffer::from_pixel(600, 300, Rgb([0u8, 0, 255])).save(&path).unwrap();

        let png = thumbnail(&path).unwrap();
        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (IMAGE_SIZE_PX, IMAGE_SIZE_PX));
    }

    #[test]
    fn test_registry_falls_back_to_default() {
        let registry = TemplateRegistry::builtin();
        assert_eq!(registry.resolve("rustans").layout().chain, "RUSTANS");
        assert_eq!(registry.resolve("RDS").layout().chain, "RDS");
        assert_eq!(registry.resolve("LANDMARK").layout().chain, "SM");
        assert!(!registry.is_registered("LANDMARK"));
    }
}
