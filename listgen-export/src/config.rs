//! Service configuration for listgen-export
//!
//! Loaded from TOML through `listgen_common::config`, then individual keys
//! may be overridden from the environment. Every key is optional.
//!
//! ```toml
//! port = 5740
//! database = "/var/lib/listgen/listgen-export.db"
//! reference_database = "sqlite:///var/lib/listgen/reference.db"
//! image_root = "/mnt/photos"
//!
//! [catalog]
//! NICREP = "sqlite:///var/lib/listgen/nicrep.db?mode=ro"
//! ATCREP = "sqlite:///var/lib/listgen/atcrep.db?mode=ro"
//!
//! [limits]
//! max_items = 5000
//! ```

use listgen_common::config::LoggingConfig;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "LISTGEN_CONFIG";
/// Config file name looked up under the platform config directory
pub const CONFIG_FILE_NAME: &str = "listgen-export.toml";

pub const IMAGE_ROOT_ENV_VAR: &str = "LISTGEN_IMAGE_ROOT";
pub const PORT_ENV_VAR: &str = "LISTGEN_PORT";

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    pub bind_address: String,
    pub port: u16,
    /// Service database holding progress records
    pub database: PathBuf,
    /// sqlx URL of the reference store
    pub reference_database: String,
    /// Root of the shared product photo tree
    pub image_root: PathBuf,
    /// Catalog source database name → sqlx URL of its reporting mirror
    pub catalog: HashMap<String, String>,
    pub limits: LimitsConfig,
    pub progress: ProgressConfig,
    pub logging: LoggingConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 5740,
            database: PathBuf::from("listgen-export.db"),
            reference_database: "sqlite://reference.db".to_string(),
            image_root: PathBuf::from("images"),
            catalog: HashMap::new(),
            limits: LimitsConfig::default(),
            progress: ProgressConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LimitsConfig {
    /// Largest deduplicated price list a job will export
    pub max_items: usize,
    /// Item numbers per detail/attribute query
    pub attribute_batch_size: usize,
    pub job_timeout_secs: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_items: 5000,
            attribute_batch_size: 500,
            job_timeout_secs: 600,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProgressConfig {
    pub poll_interval_ms: u64,
    /// Reads before a progress stream gives up
    pub max_polls: u32,
    /// Finished records older than this are deleted at job start
    pub ttl_secs: u64,
    /// Reads tolerated before an unknown job id ends the stream
    pub missing_grace_polls: u32,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 500,
            max_polls: 2400,
            ttl_secs: 3600,
            missing_grace_polls: 20,
        }
    }
}

impl ServiceConfig {
    /// Apply `LISTGEN_IMAGE_ROOT` and `LISTGEN_PORT`
    pub fn apply_env_overrides(&mut self) {
        if let Ok(root) = std::env::var(IMAGE_ROOT_ENV_VAR) {
            if !root.trim().is_empty() {
                info!("Image root overridden by {}", IMAGE_ROOT_ENV_VAR);
                self.image_root = PathBuf::from(root.trim());
            }
        }

        if let Ok(port) = std::env::var(PORT_ENV_VAR) {
            match port.trim().parse::<u16>() {
                Ok(port) => self.port = port,
                Err(_) => warn!("Ignoring invalid {}={}", PORT_ENV_VAR, port),
            }
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.limits.job_timeout_secs.max(1))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.progress.poll_interval_ms.max(10))
    }

    pub fn progress_ttl(&self) -> Duration {
        Duration::from_secs(self.progress.ttl_secs)
    }
}
