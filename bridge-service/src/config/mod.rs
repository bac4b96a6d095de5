//! Configuration module for bridge-service.
//!
//! Runtime settings come from the environment (`.env` supported); the static
//! cross-system lookup tables (tax classes, numbering series, customer
//! groups) live in a JSON mapping file maintained by the operator.

use chrono::{DateTime, TimeZone, Utc};
use secrecy::Secret;
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use sync_core::config as core_config;
use sync_core::error::SyncError;

#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub common: core_config::Config,
    pub service_name: String,
    pub source: SourceApiConfig,
    pub target: TargetApiConfig,
    pub data_dir: PathBuf,
    /// Approved documents are emailed to the buyer when set.
    pub email_enabled: bool,
    /// Invoices dated before this instant are never (re)synced.
    pub sync_cutoff: DateTime<Utc>,
    pub scheduler: SchedulerConfig,
    pub mapping: MappingConfig,
}

#[derive(Debug, Clone)]
pub struct SourceApiConfig {
    pub base_url: String,
    pub api_key: Secret<String>,
}

#[derive(Debug, Clone)]
pub struct TargetApiConfig {
    pub base_url: String,
    pub api_key: Secret<String>,
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Near-real-time new-invoice sweep interval.
    pub new_invoice_interval_secs: u64,
    /// Same-day resync of the most recent invoices.
    pub recent_resync_interval_secs: u64,
    /// Number of recent invoices covered by the same-day resync.
    pub recent_resync_count: usize,
    /// Deep resync from the cutoff forward.
    pub deep_resync_interval_secs: u64,
}

/// Static lookup tables read from the mapping file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MappingConfig {
    /// Source tax-class id -> ledger tax-code string.
    #[serde(default)]
    pub tax_classes: HashMap<String, String>,
    /// Document type ("invoice", "creditnote") -> ledger numbering-series id.
    #[serde(default)]
    pub numbering_series: HashMap<String, String>,
    /// Tax-class id the shop uses for used goods (margin scheme).
    #[serde(default)]
    pub used_goods_tax_class: Option<String>,
    /// Customer-group id -> true when the group holds business entities.
    #[serde(default)]
    pub business_customer_groups: HashMap<String, bool>,
}

impl MappingConfig {
    pub fn from_file(path: &PathBuf) -> Result<Self, SyncError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Ledger tax code for a source tax class; id "0" and unknown ids map to
    /// no tax code at all.
    pub fn tax_code(&self, tax_class: Option<&str>) -> Option<String> {
        let id = tax_class?;
        if id == "0" {
            return None;
        }
        self.tax_classes.get(id).cloned()
    }

    pub fn is_business_group(&self, group_id: &str) -> bool {
        self.business_customer_groups
            .get(group_id)
            .copied()
            .unwrap_or(false)
    }

    pub fn is_used_goods_class(&self, tax_class: Option<&str>) -> bool {
        match (&self.used_goods_tax_class, tax_class) {
            (Some(configured), Some(class)) => configured == class,
            _ => false,
        }
    }
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl BridgeConfig {
    pub fn from_env() -> Result<Self, SyncError> {
        dotenvy::dotenv().ok();

        let common = core_config::Config::load()?;

        let source_key = env::var("SOURCE_API_KEY")
            .map_err(|_| SyncError::Config(anyhow::anyhow!("SOURCE_API_KEY is required")))?;
        let target_key = env::var("TARGET_API_KEY")
            .map_err(|_| SyncError::Config(anyhow::anyhow!("TARGET_API_KEY is required")))?;

        let sync_cutoff = match env::var("SYNC_CUTOFF") {
            Ok(raw) => raw
                .parse::<DateTime<Utc>>()
                .map_err(|e| SyncError::Config(anyhow::anyhow!("Invalid SYNC_CUTOFF: {}", e)))?,
            Err(_) => Utc.timestamp_opt(0, 0).single().unwrap_or_default(),
        };

        let mapping_path = PathBuf::from(
            env::var("MAPPING_FILE")
                .unwrap_or_else(|_| "/etc/bridge-service/mapping.json".to_string()),
        );
        let mapping = MappingConfig::from_file(&mapping_path)?;

        Ok(Self {
            common,
            service_name: env::var("SERVICE_NAME").unwrap_or_else(|_| "bridge-service".to_string()),
            source: SourceApiConfig {
                base_url: env::var("SOURCE_API_URL")
                    .unwrap_or_else(|_| "https://api.repairshop.example/api/web/v1".to_string()),
                api_key: Secret::new(source_key),
            },
            target: TargetApiConfig {
                base_url: env::var("TARGET_API_URL")
                    .unwrap_or_else(|_| "https://api.ledger.example/api/invoicing/v1".to_string()),
                api_key: Secret::new(target_key),
            },
            data_dir: PathBuf::from(
                env::var("DATA_DIR").unwrap_or_else(|_| "/var/lib/bridge-service".to_string()),
            ),
            email_enabled: env::var("EMAIL_ENABLED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            sync_cutoff,
            scheduler: SchedulerConfig {
                new_invoice_interval_secs: env_u64("NEW_INVOICE_INTERVAL_SECS", 60),
                recent_resync_interval_secs: env_u64("RECENT_RESYNC_INTERVAL_SECS", 6 * 3600),
                recent_resync_count: env_u64("RECENT_RESYNC_COUNT", 50) as usize,
                deep_resync_interval_secs: env_u64("DEEP_RESYNC_INTERVAL_SECS", 7 * 24 * 3600),
            },
            mapping,
        })
    }
}
