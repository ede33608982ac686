//! Configuration for the access-control core.

use serde::Deserialize;

use crate::catalog::{CatalogEntry, ResourceCatalog};
use crate::error::AccessError;

fn default_auth_cache_ttl() -> u64 { 30 }
fn default_outage_ttl() -> u64 { 2 }
fn default_snapshot_cache_enabled() -> bool { true }
fn default_snapshot_ttl() -> u64 { 60 }
fn default_audit_capacity() -> usize { 1_000 }
fn default_audit_log_events() -> bool { true }
fn default_bind() -> String { "0.0.0.0:3000".to_string() }

/// Identity verification cache settings.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    /// How long a resolved auth status stays fresh. Default: 30.
    #[serde(default = "default_auth_cache_ttl")]
    pub cache_ttl_secs: u64,
    /// How long a status caused by a provider outage stays fresh. Default: 2.
    #[serde(default = "default_outage_ttl")]
    pub outage_ttl_secs: u64,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: default_auth_cache_ttl(),
            outage_ttl_secs: default_outage_ttl(),
        }
    }
}

/// Rule snapshot cache settings.
#[derive(Debug, Clone, Deserialize)]
pub struct RulesConfig {
    /// Whether rule snapshots are cached between resolutions. Default: true.
    #[serde(default = "default_snapshot_cache_enabled")]
    pub cache_enabled: bool,
    /// Snapshot TTL in seconds. Default: 60.
    #[serde(default = "default_snapshot_ttl")]
    pub snapshot_ttl_secs: u64,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            cache_enabled: default_snapshot_cache_enabled(),
            snapshot_ttl_secs: default_snapshot_ttl(),
        }
    }
}

/// Data-client audit trail settings.
#[derive(Debug, Clone, Deserialize)]
pub struct AuditConfig {
    /// Entries kept in the in-memory audit log. Default: 1000.
    #[serde(default = "default_audit_capacity")]
    pub capacity: usize,
    /// Also emit every entry as a tracing event. Default: true.
    #[serde(default = "default_audit_log_events")]
    pub log_events: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            capacity: default_audit_capacity(),
            log_events: default_audit_log_events(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Administrative server settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Socket address to bind. Default: "0.0.0.0:3000".
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default)]
    pub log_format: LogFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            log_format: LogFormat::default(),
        }
    }
}

/// Top-level qagate configuration.
///
/// Every section is optional; missing keys fall back to their defaults.
///
/// ```yaml
/// identity:
///   cache_ttl_secs: 30
///   outage_ttl_secs: 2
/// rules:
///   cache_enabled: true
///   snapshot_ttl_secs: 60
/// audit:
///   capacity: 1000
///   log_events: true
/// server:
///   bind: "0.0.0.0:3000"
///   log_format: json
/// catalog:                       # optional, replaces the built-in catalog
///   - name: audit-reports
///     kind: page
///     category: Audits
///     display_label: Audit Reports
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QagateConfig {
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub rules: RulesConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub catalog: Option<Vec<CatalogEntry>>,
}

impl QagateConfig {
    /// Parse a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, AccessError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn with_auth_cache_ttl(mut self, secs: u64) -> Self {
        self.identity.cache_ttl_secs = secs;
        self
    }

    pub fn with_snapshot_ttl(mut self, secs: u64) -> Self {
        self.rules.snapshot_ttl_secs = secs;
        self
    }

    /// Disable rule snapshot caching; every resolution reads the backend.
    pub fn without_snapshot_cache(mut self) -> Self {
        self.rules.cache_enabled = false;
        self
    }

    /// The configured catalog, or the built-in one.
    pub fn catalog(&self) -> Result<ResourceCatalog, AccessError> {
        match &self.catalog {
            Some(entries) => ResourceCatalog::from_entries(entries.clone()),
            None => Ok(ResourceCatalog::standard()),
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), AccessError> {
        if self.identity.cache_ttl_secs == 0 {
            return Err(AccessError::Config("identity.cache_ttl_secs must be positive".into()));
        }
        if self.identity.outage_ttl_secs > self.identity.cache_ttl_secs {
            return Err(AccessError::Config(
                "identity.outage_ttl_secs cannot exceed identity.cache_ttl_secs".into(),
            ));
        }
        if self.audit.capacity == 0 {
            return Err(AccessError::Config("audit.capacity must be positive".into()));
        }
        if self.server.bind.is_empty() {
            return Err(AccessError::Config("server.bind cannot be empty".into()));
        }
        self.catalog()?;
        Ok(())
    }
}
