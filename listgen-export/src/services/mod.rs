//! Export pipeline services

pub mod catalog_fetcher;
pub mod export_service;
pub mod formatter;
pub mod image_index;
pub mod packager;
pub mod progress_reporter;
pub mod reference_resolver;

pub use catalog_fetcher::{CatalogFetcher, CatalogSource};
pub use export_service::{ExportOutcome, ExportService, ExportSettings};
pub use formatter::{RetailerTemplate, TemplateFormatter, TemplateRegistry};
pub use image_index::{ImageIndex, ImageIndexer, WalkdirIndexer};
pub use packager::{ExportArtifact, ExportPackager};
pub use progress_reporter::{ProgressPoller, ProgressReporter, ProgressStore};
pub use reference_resolver::{ReferenceResolver, ReferenceStore};
