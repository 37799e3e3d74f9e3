//! Configuration loading for the geoportal index pipeline.
//!
//! Layered config: defaults -> config file -> env vars.
//! Config file at ~/.config/geoportal/config.toml, overridable by an
//! explicitly passed path.

use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::PortalError;

/// Search engine connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolrSettings {
    /// Base URL of the Solr server.
    #[serde(default = "default_solr_url")]
    pub url: String,

    /// Core holding the search documents.
    #[serde(default = "default_solr_core")]
    pub core: String,

    /// Per-query time allowance in seconds.
    #[serde(default = "default_query_timeout")]
    pub query_timeout_secs: u64,

    /// Documents submitted to the engine per batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Geometry validation rule applied by the spatial field type.
    /// One of: error, none, repairBuffer0, repairConvexHull.
    #[serde(default = "default_validation_rule")]
    pub geometry_validation_rule: String,
}

fn default_solr_url() -> String {
    "http://localhost:8983/solr".to_string()
}

fn default_solr_core() -> String {
    "geoportal".to_string()
}

fn default_query_timeout() -> u64 {
    7
}

fn default_batch_size() -> usize {
    1000
}

fn default_validation_rule() -> String {
    "repairBuffer0".to_string()
}

impl Default for SolrSettings {
    fn default() -> Self {
        Self {
            url: default_solr_url(),
            core: default_solr_core(),
            query_timeout_secs: default_query_timeout(),
            batch_size: default_batch_size(),
            geometry_validation_rule: default_validation_rule(),
        }
    }
}

/// Scheduler settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerSettings {
    /// Timezone cron expressions are evaluated in.
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Seconds to wait for running jobs during shutdown.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,

    /// Newly created or rescheduled tasks do not fire for this many
    /// seconds, so rapid edits settle before the first run.
    #[serde(default = "default_task_start_delay")]
    pub task_start_delay_secs: u64,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_shutdown_timeout() -> u64 {
    30
}

fn default_task_start_delay() -> u64 {
    90
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            shutdown_timeout_secs: default_shutdown_timeout(),
            task_start_delay_secs: default_task_start_delay(),
        }
    }
}

/// Feature source settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSettings {
    /// Seconds to wait for a single feature read before failing the run.
    #[serde(default = "default_source_timeout")]
    pub timeout_secs: u64,
}

fn default_source_timeout() -> u64 {
    60
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_source_timeout(),
        }
    }
}

/// Main application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Search engine connection.
    #[serde(default)]
    pub solr: SolrSettings,

    /// Background scheduler.
    #[serde(default)]
    pub scheduler: SchedulerSettings,

    /// Feature source access.
    #[serde(default)]
    pub source: SourceSettings,

    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            solr: SolrSettings::default(),
            scheduler: SchedulerSettings::default(),
            source: SourceSettings::default(),
            log_level: default_log_level(),
        }
    }
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Config file (~/.config/geoportal/config.toml)
    /// 3. Explicitly passed config file (optional)
    /// 4. Environment variables (PORTAL_*)
    pub fn load(config_path: Option<&str>) -> Result<Self, PortalError> {
        let config_dir = ProjectDirs::from("", "", "geoportal")
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let default_config_path = config_dir.join("config");

        let mut builder = Config::builder()
            // 1. Built-in defaults
            .set_default("solr.url", default_solr_url())
            .map_err(|e| PortalError::Config(e.to_string()))?
            .set_default("solr.core", default_solr_core())
            .map_err(|e| PortalError::Config(e.to_string()))?
            .set_default("solr.query_timeout_secs", default_query_timeout() as i64)
            .map_err(|e| PortalError::Config(e.to_string()))?
            .set_default("solr.batch_size", default_batch_size() as i64)
            .map_err(|e| PortalError::Config(e.to_string()))?
            .set_default("solr.geometry_validation_rule", default_validation_rule())
            .map_err(|e| PortalError::Config(e.to_string()))?
            .set_default("scheduler.timezone", default_timezone())
            .map_err(|e| PortalError::Config(e.to_string()))?
            .set_default(
                "scheduler.shutdown_timeout_secs",
                default_shutdown_timeout() as i64,
            )
            .map_err(|e| PortalError::Config(e.to_string()))?
            .set_default(
                "scheduler.task_start_delay_secs",
                default_task_start_delay() as i64,
            )
            .map_err(|e| PortalError::Config(e.to_string()))?
            .set_default("source.timeout_secs", default_source_timeout() as i64)
            .map_err(|e| PortalError::Config(e.to_string()))?
            .set_default("log_level", default_log_level())
            .map_err(|e| PortalError::Config(e.to_string()))?
            // 2. Default config file (~/.config/geoportal/config.toml)
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        // 3. Explicitly passed config file (higher precedence than default)
        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // 4. Environment variables (highest precedence)
        // Format: PORTAL_SOLR_URL, PORTAL_SOLR_CORE, PORTAL_SCHEDULER_TIMEZONE, etc.
        builder = builder.add_source(
            Environment::with_prefix("PORTAL")
                .separator("_")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| PortalError::Config(e.to_string()))?;

        config
            .try_deserialize()
            .map_err(|e| PortalError::Config(e.to_string()))
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), PortalError> {
        if self.solr.url.is_empty() {
            return Err(PortalError::Config("solr.url must not be empty".to_string()));
        }
        if self.solr.batch_size == 0 {
            return Err(PortalError::Config(
                "solr.batch_size must be > 0".to_string(),
            ));
        }
        if self.solr.query_timeout_secs == 0 {
            return Err(PortalError::Config(
                "solr.query_timeout_secs must be > 0".to_string(),
            ));
        }
        if self.source.timeout_secs == 0 {
            return Err(PortalError::Config(
                "source.timeout_secs must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}
