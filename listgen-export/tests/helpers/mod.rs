//! Shared fixtures for listgen-export integration tests
//!
//! Every fixture runs on in-memory SQLite: one pool per catalog mirror, one
//! for the reference store, one for progress records.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use listgen_export::db::catalog::create_mirror_tables;
use listgen_export::db::reference::init_reference_schema;
use listgen_export::db::{SqliteCatalogSource, SqliteProgressStore, SqliteReferenceStore};
use listgen_export::models::{CompanyProfile, ExportRequest};
use listgen_export::services::image_index::ScanError;
use listgen_export::services::{
    CatalogFetcher, ExportService, ExportSettings, ImageIndex, ImageIndexer, ProgressPoller,
    ProgressStore, ReferenceResolver, TemplateRegistry, WalkdirIndexer,
};
use listgen_export::AppState;

/// Fixed generation time so file names are predictable: 2024-03-05 14:07
pub fn generated_at() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 5)
        .unwrap()
        .and_hms_opt(14, 7, 0)
        .unwrap()
}

pub fn company(code: &str) -> CompanyProfile {
    CompanyProfile::lookup(code).unwrap()
}

pub fn request(chain: &str, company: &str) -> ExportRequest {
    ExportRequest {
        chain: chain.to_string(),
        company: company.to_string(),
        price_memo: "PM-001".to_string(),
        sales_code: "SC01".to_string(),
        job_id: None,
    }
}

/// [`ImageIndexer`] wrapper counting how often an index is built
pub struct CountingIndexer {
    inner: WalkdirIndexer,
    pub calls: Arc<AtomicUsize>,
}

impl CountingIndexer {
    pub fn new() -> Self {
        Self {
            inner: WalkdirIndexer::new(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl ImageIndexer for CountingIndexer {
    async fn build(&self, root: &Path, cancel: CancellationToken) -> Result<ImageIndex, ScanError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.build(root, cancel).await
    }
}

/// Catalog mirrors, reference store and image root for one test
pub struct Fixture {
    pub nicrep: SqlitePool,
    pub atcrep: SqlitePool,
    pub reference: SqlitePool,
    pub progress_pool: SqlitePool,
    pub images: TempDir,
    /// Defaults to the temp image dir; point elsewhere to simulate a missing mount
    pub image_root: PathBuf,
    pub max_items: usize,
}

impl Fixture {
    pub async fn new() -> Self {
        let nicrep = listgen_common::db::open_in_memory().await.unwrap();
        create_mirror_tables(&nicrep, &company("NIC")).await.unwrap();

        let atcrep = listgen_common::db::open_in_memory().await.unwrap();
        create_mirror_tables(&atcrep, &company("ATC")).await.unwrap();
        create_mirror_tables(&atcrep, &company("TPC")).await.unwrap();

        let reference = listgen_common::db::open_in_memory().await.unwrap();
        init_reference_schema(&reference).await.unwrap();

        let progress_pool = listgen_common::db::open_in_memory().await.unwrap();
        listgen_export::db::init_tables(&progress_pool).await.unwrap();

        let images = TempDir::new().unwrap();
        Self {
            nicrep,
            atcrep,
            reference,
            progress_pool,
            image_root: images.path().to_path_buf(),
            images,
            max_items: 100,
        }
    }

    pub fn catalog_pool(&self, company_code: &str) -> &SqlitePool {
        if company_code.eq_ignore_ascii_case("NIC") {
            &self.nicrep
        } else {
            &self.atcrep
        }
    }

    pub async fn price(&self, company_code: &str, item_no: &str, price: f64) {
        let profile = company(company_code);
        let sql = format!(
            r#"INSERT INTO {} ("Item No_", "Sales Code", "PC Memo No", "Unit Price") VALUES (?, 'SC01', 'PM-001', ?)"#,
            profile.table("Sales Price")
        );
        sqlx::query(&sql)
            .bind(item_no)
            .bind(price)
            .execute(self.catalog_pool(company_code))
            .await
            .unwrap();
    }

    pub async fn item(&self, company_code: &str, item_no: &str, description: &str, brand: &str) {
        let profile = company(company_code);
        let sql = format!(
            r#"INSERT INTO {} ("No_", "Description", "Product Group Code", "Vendor Item No_", "Base Unit of Measure", "Net Weight", "Gross Weight")
               VALUES (?, ?, ?, ?, 'PCS', 0.2, 0.5)"#,
            profile.table("Item")
        );
        sqlx::query(&sql)
            .bind(item_no)
            .bind(description)
            .bind(brand)
            .bind(format!("V-{}", item_no))
            .execute(self.catalog_pool(company_code))
            .await
            .unwrap();
    }

    /// Normalized attribute row (triple-layout companies only)
    pub async fn attribute(
        &self,
        company_code: &str,
        item_no: &str,
        attribute_id: i64,
        name: &str,
        value_id: i64,
        value: &str,
    ) {
        let profile = company(company_code);
        let pool = self.catalog_pool(company_code);

        sqlx::query(&format!(
            r#"INSERT OR IGNORE INTO {} ("ID", "Name") VALUES (?, ?)"#,
            profile.table("Item Attribute")
        ))
        .bind(attribute_id)
        .bind(name)
        .execute(pool)
        .await
        .unwrap();

        sqlx::query(&format!(
            r#"INSERT OR IGNORE INTO {} ("Attribute ID", "ID", "Value") VALUES (?, ?, ?)"#,
            profile.table("Item Attribute Value")
        ))
        .bind(attribute_id)
        .bind(value_id)
        .bind(value)
        .execute(pool)
        .await
        .unwrap();

        sqlx::query(&format!(
            r#"INSERT INTO {} ("Table ID", "No_", "Item Attribute ID", "Item Attribute Value ID") VALUES (27, ?, ?, ?)"#,
            profile.table("Item Attribute Value Mapping")
        ))
        .bind(item_no)
        .bind(attribute_id)
        .bind(value_id)
        .execute(pool)
        .await
        .unwrap();
    }

    pub async fn chain_vendor(&self, chain: &str, company_code: &str, vendor_code: &str) {
        sqlx::query(
            "INSERT INTO vendor_chain_mappings (chain_name, company_selection, vendor_code) VALUES (?, ?, ?)",
        )
        .bind(chain)
        .bind(company_code)
        .bind(vendor_code)
        .execute(&self.reference)
        .await
        .unwrap();
    }

    pub async fn brand(&self, product_group: &str, dept: &str, sub_dept: &str, class: &str, sub_class: &str) {
        sqlx::query(
            "INSERT INTO brands (brand_name, product_group, dept_code, sub_dept_code, class_code) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(format!("{} WATCHES", product_group))
        .bind(product_group)
        .bind(dept)
        .bind(sub_dept)
        .bind(class)
        .execute(&self.reference)
        .await
        .unwrap();

        sqlx::query(
            "INSERT INTO sub_classes (product_group, subclass_code, subclass_name) VALUES (?, ?, 'WATCHES')",
        )
        .bind(product_group)
        .bind(sub_class)
        .execute(&self.reference)
        .await
        .unwrap();
    }

    pub fn write_image(&self, rel: &str) -> PathBuf {
        let path = self.images.path().join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        image::ImageBuffer::from_pixel(32, 32, image::Rgb([120u8, 60, 200]))
            .save(&path)
            .unwrap();
        path
    }

    pub fn progress_store(&self) -> Arc<dyn ProgressStore> {
        Arc::new(SqliteProgressStore::new(self.progress_pool.clone()))
    }

    /// Service over this fixture, with the indexer's call counter
    pub fn service(&self) -> (ExportService, Arc<AtomicUsize>) {
        let catalog = SqliteCatalogSource::new()
            .with_database("NICREP", self.nicrep.clone())
            .with_database("ATCREP", self.atcrep.clone());
        let indexer = CountingIndexer::new();
        let calls = indexer.calls.clone();

        let service = ExportService::new(
            CatalogFetcher::new(Arc::new(catalog), self.max_items, 2),
            ReferenceResolver::new(Arc::new(SqliteReferenceStore::new(self.reference.clone()))),
            Arc::new(indexer),
            Arc::new(TemplateRegistry::builtin()),
            self.progress_store(),
            ExportSettings {
                image_root: self.image_root.clone(),
                job_timeout: Duration::from_secs(30),
                progress_ttl: Duration::from_secs(3600),
            },
        );
        (service, calls)
    }

    pub fn app_state(&self) -> AppState {
        let (service, _) = self.service();
        let poller = ProgressPoller::new(self.progress_store(), Duration::from_millis(10), 50, 3);
        AppState::new(Arc::new(service), poller)
    }
}
