//! Product photo index
//!
//! One walk of the shared image tree per job, bucketed by the first character
//! of the lowercase file stem. Buckets are sorted lexically by (stem, path) so
//! prefix lookups give the same answer on every platform and mount.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use walkdir::{DirEntry, WalkDir};

/// Image root scan errors
#[derive(Debug, Error)]
pub enum ScanError {
    /// Image root does not exist
    #[error("Image root not found: {0}")]
    RootMissing(PathBuf),

    /// Path exists but is not a directory
    #[error("Image root is not a directory: {0}")]
    NotADirectory(PathBuf),

    /// Job cancelled or deadline hit mid-walk
    #[error("Image scan cancelled")]
    Cancelled,

    /// Blocking scan task failed
    #[error("Image scan task failed: {0}")]
    Task(String),
}

/// Immutable photo lookup built for one job
#[derive(Debug, Clone, Default)]
pub struct ImageIndex {
    buckets: HashMap<char, Vec<(String, PathBuf)>>,
    len: usize,
}

impl ImageIndex {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from candidate paths, keeping only jpg/jpeg/png files
    pub fn from_paths<I>(paths: I) -> Self
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let mut buckets: HashMap<char, Vec<(String, PathBuf)>> = HashMap::new();
        let mut len = 0;

        for path in paths {
            if !is_image_path(&path) {
                continue;
            }
            let Some(stem) = path.file_stem().map(|s| s.to_string_lossy().to_lowercase()) else {
                continue;
            };
            let Some(first) = stem.chars().next() else {
                continue;
            };
            buckets.entry(first).or_default().push((stem, path));
            len += 1;
        }

        for bucket in buckets.values_mut() {
            bucket.sort();
        }

        Self { buckets, len }
    }

    /// Photo for an item number: exact stem match, else first prefix match
    pub fn lookup(&self, item_no: &str) -> Option<&Path> {
        let key = item_no.trim().to_lowercase();
        let first = key.chars().next()?;
        let bucket = self.buckets.get(&first)?;

        bucket
            .iter()
            .find(|(stem, _)| *stem == key)
            .or_else(|| bucket.iter().find(|(stem, _)| stem.starts_with(&key)))
            .map(|(_, path)| path.as_path())
    }

    /// Number of indexed image files
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

fn is_image_path(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| matches!(ext.as_str(), "jpg" | "jpeg" | "png"))
}

/// Builds an [`ImageIndex`] from an image root
#[async_trait]
pub trait ImageIndexer: Send + Sync {
    async fn build(&self, root: &Path, cancel: CancellationToken) -> Result<ImageIndex, ScanError>;
}

/// [`ImageIndexer`] walking the tree with walkdir on the blocking pool
pub struct WalkdirIndexer {
    ignore_names: Vec<String>,
}

impl WalkdirIndexer {
    /// Indexer with default ignore list
    ///
    /// Skips OS metadata files (.DS_Store, Thumbs.db, AppleDouble `._*`
    /// files) and VCS folders.
    pub fn new() -> Self {
        Self {
            ignore_names: vec![
                ".DS_Store".to_string(),
                "Thumbs.db".to_string(),
                ".git".to_string(),
                ".svn".to_string(),
            ],
        }
    }

    /// Walk `root` once, collecting candidate image paths
    pub fn scan(&self, root: &Path, cancel: &CancellationToken) -> Result<Vec<PathBuf>, ScanError> {
        if !root.exists() {
            return Err(ScanError::RootMissing(root.to_path_buf()));
        }
        if !root.is_dir() {
            return Err(ScanError::NotADirectory(root.to_path_buf()));
        }

        let mut files = Vec::new();
        let mut visited_links = HashSet::new();

        let walker = WalkDir::new(root)
            .follow_links(true)
            .into_iter()
            .filter_entry(|e| self.should_process_entry(e, &mut visited_links));

        for entry in walker {
            if cancel.is_cancelled() {
                return Err(ScanError::Cancelled);
            }

            match entry {
                Ok(entry) => {
                    if entry.file_type().is_file() && is_image_path(entry.path()) {
                        files.push(entry.into_path());
                    }
                }
                Err(e) => {
                    if e.loop_ancestor().is_some() {
                        tracing::warn!("Symlink loop detected: {}", e);
                    } else {
                        tracing::debug!("Error accessing entry: {}", e);
                    }
                }
            }
        }

        Ok(files)
    }

    fn should_process_entry(&self, entry: &DirEntry, visited_links: &mut HashSet<PathBuf>) -> bool {
        let file_name = entry.file_name().to_string_lossy();

        if file_name.starts_with("._") || self.ignore_names.iter().any(|n| *n == file_name) {
            return false;
        }

        // Two links to the same directory would index it twice
        if entry.path_is_symlink() && entry.file_type().is_dir() {
            if let Ok(canonical) = entry.path().canonicalize() {
                if !visited_links.insert(canonical) {
                    return false;
                }
            }
        }

        true
    }
}

impl Default for WalkdirIndexer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageIndexer for WalkdirIndexer {
    async fn build(&self, root: &Path, cancel: CancellationToken) -> Result<ImageIndex, ScanError> {
        let root = root.to_path_buf();
        let scanner = WalkdirIndexer {
            ignore_names: self.ignore_names.clone(),
        };

        let started = std::time::Instant::now();
        let files = tokio::task::spawn_blocking(move || scanner.scan(&root, &cancel))
            .await
            .map_err(|e| ScanError::Task(e.to_string()))??;

        let index = ImageIndex::from_paths(files);
        tracing::info!(
            images = index.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Image index built"
        );
        Ok(index)
    }
}
