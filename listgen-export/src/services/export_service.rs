//! Export job orchestration
//!
//! One job runs strictly in order: fetch → resolve → index images (only for
//! layouts with a photo column) → format → package. The whole pipeline runs
//! under the job deadline; on expiry the cancellation token stops any
//! blocking stage still running and the job fails with `DeadlineExceeded`.
//! Every outcome, success or failure, is written to the progress record.

use chrono::{Local, NaiveDateTime, Utc};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::ExportError;
use crate::models::export_job::normalize_code;
use crate::models::{
    CompanyProfile, ExportRequest, JobContext, JobState, PrecheckResult, NO_BRAND,
};
use crate::services::catalog_fetcher::CatalogFetcher;
use crate::services::formatter::{TemplateFormatter, TemplateRegistry};
use crate::services::image_index::{ImageIndex, ImageIndexer, ScanError};
use crate::services::packager::{ExportArtifact, ExportPackager};
use crate::services::progress_reporter::{ProgressReporter, ProgressStore};
use crate::services::reference_resolver::ReferenceResolver;

/// Runtime knobs for the orchestrator
#[derive(Debug, Clone)]
pub struct ExportSettings {
    /// Root of the shared product photo tree
    pub image_root: PathBuf,
    pub job_timeout: Duration,
    /// How long finished progress records are kept
    pub progress_ttl: Duration,
}

/// A finished job
#[derive(Debug, Clone)]
pub struct ExportOutcome {
    pub job_id: Uuid,
    pub artifact: ExportArtifact,
}

pub struct ExportService {
    fetcher: CatalogFetcher,
    resolver: ReferenceResolver,
    indexer: Arc<dyn ImageIndexer>,
    templates: Arc<TemplateRegistry>,
    progress: Arc<dyn ProgressStore>,
    settings: ExportSettings,
}

impl ExportService {
    pub fn new(
        fetcher: CatalogFetcher,
        resolver: ReferenceResolver,
        indexer: Arc<dyn ImageIndexer>,
        templates: Arc<TemplateRegistry>,
        progress: Arc<dyn ProgressStore>,
        settings: ExportSettings,
    ) -> Self {
        Self {
            fetcher,
            resolver,
            indexer,
            templates,
            progress,
            settings,
        }
    }

    pub fn progress_store(&self) -> Arc<dyn ProgressStore> {
        self.progress.clone()
    }

    pub fn image_root(&self) -> &Path {
        &self.settings.image_root
    }

    /// Run one export job stamped with the current local time
    pub async fn run(&self, request: ExportRequest) -> Result<ExportOutcome, ExportError> {
        self.run_at(request, Local::now().naive_local()).await
    }

    /// Run one export job with an explicit generation timestamp
    ///
    /// The timestamp drives every date-derived file name and cell.
    pub async fn run_at(
        &self,
        request: ExportRequest,
        generated_at: NaiveDateTime,
    ) -> Result<ExportOutcome, ExportError> {
        let request = request.normalized();
        let job_id = request.job_id.unwrap_or_else(Uuid::new_v4);

        self.expire_finished().await;
        let (progress, forwarder) = ProgressReporter::start(self.progress.clone(), job_id).await;
        let cancel = CancellationToken::new();
        let started = Instant::now();

        info!(
            job_id = %job_id,
            chain = %request.chain,
            company = %request.company,
            sales_code = %request.sales_code,
            price_memo = %request.price_memo,
            "Export started"
        );

        let pipeline = self.pipeline(&request, job_id, generated_at, &progress, &cancel);
        let result = match tokio::time::timeout(self.settings.job_timeout, pipeline).await {
            Ok(result) => result,
            Err(_) => {
                cancel.cancel();
                Err(ExportError::DeadlineExceeded(self.settings.job_timeout.as_secs()))
            }
        };

        match &result {
            Ok(artifact) => {
                info!(
                    job_id = %job_id,
                    filename = %artifact.filename,
                    items = artifact.total_items,
                    images_found = artifact.images_found,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Export completed"
                );
                progress.finish(
                    JobState::Completed,
                    format!("Completed: {}", artifact.filename),
                );
            }
            Err(e) => {
                error!(
                    job_id = %job_id,
                    code = e.code(),
                    error = %e,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Export failed"
                );
                progress.finish(JobState::Failed, e.to_string());
            }
        }
        forwarder.join().await;

        result.map(|artifact| ExportOutcome { job_id, artifact })
    }

    /// Existence probe for a price list, without starting a job
    pub async fn precheck(
        &self,
        company: &str,
        sales_code: &str,
        price_memo: &str,
    ) -> Result<PrecheckResult, ExportError> {
        let code = normalize_code(company);
        let company =
            CompanyProfile::lookup(&code).ok_or_else(|| ExportError::UnknownCompany(code.clone()))?;

        self.fetcher
            .precheck(&company, &normalize_code(sales_code), &normalize_code(price_memo))
            .await
    }

    async fn pipeline(
        &self,
        request: &ExportRequest,
        job_id: Uuid,
        generated_at: NaiveDateTime,
        progress: &ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<ExportArtifact, ExportError> {
        let job = job_context(request, job_id, generated_at)?;
        let template = self.templates.resolve(&job.chain);
        if !self.templates.is_registered(&job.chain) {
            debug!(chain = %job.chain, "No registered layout, using default");
        }

        let items = self
            .fetcher
            .fetch(&job.company, &job.sales_code, &job.price_memo, progress)
            .await?;
        progress.set_total(items.len() as u64, format!("Found {} items", items.len()));

        progress.status("Resolving vendor and brand hierarchy...");
        let brands: Vec<String> = items
            .iter()
            .map(|item| item.brand())
            .filter(|brand| *brand != NO_BRAND)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect();
        let refs = self.resolver.resolve(&job.chain, &job.company, &brands).await?;

        let images = if template.layout().image_column.is_some() {
            self.index_images(progress, cancel).await?
        } else {
            ImageIndex::empty()
        };

        let sheets = {
            let template = template.clone();
            let progress = progress.clone();
            let cancel = cancel.clone();
            let job = job.clone();
            tokio::task::spawn_blocking(move || {
                TemplateFormatter::new(template.as_ref(), &images)
                    .format(&items, &refs, &job, &progress, &cancel)
            })
            .await
            .map_err(|e| ExportError::Internal(format!("formatting task failed: {}", e)))??
        };

        if cancel.is_cancelled() {
            return Err(ExportError::Cancelled);
        }

        progress.status(format!("Packaging {} sheets...", sheets.len()));
        let artifact_name = template.artifact_name(&job);
        tokio::task::spawn_blocking(move || {
            ExportPackager::new(template.layout()).package(&sheets, &artifact_name)
        })
        .await
        .map_err(|e| ExportError::Internal(format!("packaging task failed: {}", e)))?
    }

    /// Build the photo index; an unavailable image root degrades to no photos
    async fn index_images(
        &self,
        progress: &ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<ImageIndex, ExportError> {
        progress.status("Indexing product images...");

        match self.indexer.build(&self.settings.image_root, cancel.clone()).await {
            Ok(index) => Ok(index),
            Err(e @ (ScanError::RootMissing(_) | ScanError::NotADirectory(_))) => {
                warn!(error = %e, "Image root unavailable, exporting without photos");
                Ok(ImageIndex::empty())
            }
            Err(ScanError::Cancelled) => Err(ExportError::Cancelled),
            Err(ScanError::Task(msg)) => Err(ExportError::Internal(msg)),
        }
    }

    async fn expire_finished(&self) {
        let ttl = chrono::Duration::from_std(self.settings.progress_ttl)
            .unwrap_or_else(|_| chrono::Duration::days(1));
        match self.progress.expire(Utc::now() - ttl).await {
            Ok(0) => {}
            Ok(removed) => debug!(removed, "Expired finished progress records"),
            Err(e) => warn!(error = %e, "Progress expiry failed"),
        }
    }
}

/// Validate a normalized request into the job's runtime context
fn job_context(
    request: &ExportRequest,
    job_id: Uuid,
    generated_at: NaiveDateTime,
) -> Result<JobContext, ExportError> {
    let required = [
        ("chain", &request.chain),
        ("company", &request.company),
        ("sales_code", &request.sales_code),
        ("price_memo", &request.price_memo),
    ];
    for (field, value) in required {
        if value.is_empty() {
            return Err(ExportError::InvalidRequest(format!("{} is required", field)));
        }
    }

    let company = CompanyProfile::lookup(&request.company)
        .ok_or_else(|| ExportError::UnknownCompany(request.company.clone()))?;

    Ok(JobContext {
        job_id,
        chain: request.chain.clone(),
        company,
        sales_code: request.sales_code.clone(),
        price_memo: request.price_memo.clone(),
        generated_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{SqliteCatalogSource, SqliteProgressStore, SqliteReferenceStore};
    use crate::error::CatalogError;
    use crate::models::{AttributeTriple, ItemDetail, PricedItem};
    use crate::services::catalog_fetcher::CatalogSource;
    use crate::services::image_index::WalkdirIndexer;
    use async_trait::async_trait;

    /// Catalog that never answers within any reasonable deadline
    struct StalledCatalog;

    #[async_trait]
    impl CatalogSource for StalledCatalog {
        async fn priced_items(
            &self,
            _company: &CompanyProfile,
            _sales_code: &str,
            _price_memo: &str,
        ) -> Result<Vec<PricedItem>, CatalogError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(Vec::new())
        }

        async fn count_priced_items(
            &self,
            _company: &CompanyProfile,
            _sales_code: &str,
            _price_memo: &str,
        ) -> Result<u64, CatalogError> {
            Ok(0)
        }

        async fn item_details(
            &self,
            _company: &CompanyProfile,
            _item_nos: &[String],
        ) -> Result<Vec<ItemDetail>, CatalogError> {
            Ok(Vec::new())
        }

        async fn item_attributes(
            &self,
            _company: &CompanyProfile,
            _item_nos: &[String],
        ) -> Result<Vec<AttributeTriple>, CatalogError> {
            Ok(Vec::new())
        }
    }

    async fn service(catalog: Arc<dyn CatalogSource>, job_timeout: Duration) -> ExportService {
        let pool = listgen_common::db::open_in_memory().await.unwrap();
        crate::db::init_tables(&pool).await.unwrap();
        crate::db::reference::init_reference_schema(&pool).await.unwrap();

        ExportService::new(
            CatalogFetcher::new(catalog, 100, 50),
            ReferenceResolver::new(Arc::new(SqliteReferenceStore::new(pool.clone()))),
            Arc::new(WalkdirIndexer::new()),
            Arc::new(TemplateRegistry::builtin()),
            Arc::new(SqliteProgressStore::new(pool)),
            ExportSettings {
                image_root: PathBuf::from("/nonexistent/images"),
                job_timeout,
                progress_ttl: Duration::from_secs(3600),
            },
        )
    }

    fn request(chain: &str, company: &str) -> ExportRequest {
        ExportRequest {
            chain: chain.to_string(),
            company: company.to_string(),
            price_memo: "M1".to_string(),
            sales_code: "S1".to_string(),
            job_id: Some(Uuid::new_v4()),
        }
    }

    #[tokio::test]
    async fn test_blank_field_is_invalid_request() {
        let service = service(Arc::new(SqliteCatalogSource::new()), Duration::from_secs(5)).await;
        let req = request("  ", "NIC");
        let job_id = req.job_id.unwrap();

        let result = service.run(req).await;
        assert!(matches!(result, Err(ExportError::InvalidRequest(_))));

        let state = service.progress_store().read(job_id).await.unwrap().unwrap();
        assert_eq!(state.state, JobState::Failed);
    }

    #[tokio::test]
    async fn test_unknown_company() {
        let service = service(Arc::new(SqliteCatalogSource::new()), Duration::from_secs(5)).await;
        let result = service.run(request("SM", "XYZ")).await;
        assert!(matches!(result, Err(ExportError::UnknownCompany(ref c)) if c == "XYZ"));
    }

    #[tokio::test]
    async fn test_unconfigured_catalog_is_connection_error() {
        let service = service(Arc::new(SqliteCatalogSource::new()), Duration::from_secs(5)).await;
        let result = service.run(request("SM", "nic")).await;
        assert!(matches!(result, Err(ExportError::Connection(_))));
    }

    #[tokio::test]
    async fn test_deadline_fails_job() {
        let service = service(Arc::new(StalledCatalog), Duration::from_millis(50)).await;
        let req = request("SM", "NIC");
        let job_id = req.job_id.unwrap();

        let result = service.run(req).await;
        assert!(matches!(result, Err(ExportError::DeadlineExceeded(_))));

        let state = service.progress_store().read(job_id).await.unwrap().unwrap();
        assert_eq!(state.state, JobState::Failed);
        assert!(state.status.contains("deadline"));
    }

    #[tokio::test]
    async fn test_precheck_blank_codes() {
        let service = service(Arc::new(SqliteCatalogSource::new()), Duration::from_secs(5)).await;
        let result = service.precheck("NIC", " ", "M1").await.unwrap();
        assert_eq!(result, PrecheckResult { exists: false, count: 0 });

        let unknown = service.precheck("XYZ", "S1", "M1").await;
        assert!(matches!(unknown, Err(ExportError::UnknownCompany(_))));
    }
}
