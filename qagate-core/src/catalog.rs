//! Static registry of protected resources.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::AccessError;
use crate::model::{ResourceDescriptor, ResourceKind};
use crate::normalize;

/// One protected resource as shown in the administrative UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub name: String,
    pub kind: ResourceKind,
    pub category: String,
    pub display_label: String,
}

impl CatalogEntry {
    pub fn new(name: &str, kind: ResourceKind, category: &str, display_label: &str) -> Self {
        Self {
            name: normalize::resource_name(name),
            kind,
            category: category.to_string(),
            display_label: display_label.to_string(),
        }
    }

    pub fn descriptor(&self) -> ResourceDescriptor {
        ResourceDescriptor::new(&self.name, self.kind)
    }
}

/// Entries grouped under one category, in catalog order.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogCategory<'a> {
    pub category: &'a str,
    pub entries: Vec<&'a CatalogEntry>,
}

const STANDARD: &[(&str, ResourceKind, &str, &str)] = &[
    ("dashboard", ResourceKind::Page, "Audits", "Dashboard"),
    ("audit-form", ResourceKind::Page, "Audits", "Audit Form"),
    ("audit-reports", ResourceKind::Page, "Audits", "Audit Reports"),
    ("dispute-audits", ResourceKind::Feature, "Audits", "Dispute Audits"),
    ("ai-audit", ResourceKind::Feature, "Audits", "AI Audit"),
    ("calibration-sessions", ResourceKind::Feature, "Audits", "Calibration Sessions"),
    ("scorecards", ResourceKind::Page, "Scorecards", "Scorecards"),
    ("scorecard-editor", ResourceKind::Feature, "Scorecards", "Scorecard Editor"),
    ("agent-performance", ResourceKind::Page, "Analytics", "Agent Performance"),
    ("analytics", ResourceKind::Page, "Analytics", "Analytics"),
    ("export-reports", ResourceKind::Feature, "Analytics", "Export Reports"),
    ("notifications", ResourceKind::Page, "Notifications", "Notifications"),
    ("user-management", ResourceKind::Page, "Administration", "User Management"),
    ("access-control", ResourceKind::Page, "Administration", "Access Control"),
    ("bulk-import", ResourceKind::Feature, "Administration", "Bulk Import"),
    ("settings", ResourceKind::Page, "Administration", "Settings"),
    ("/api/audits", ResourceKind::ApiEndpoint, "API", "Audits API"),
    ("/api/scorecards", ResourceKind::ApiEndpoint, "API", "Scorecards API"),
    ("/api/users", ResourceKind::ApiEndpoint, "API", "Users API"),
    ("/api/analytics", ResourceKind::ApiEndpoint, "API", "Analytics API"),
    ("/api/access-control", ResourceKind::ApiEndpoint, "API", "Access Control API"),
];

/// Immutable table of protected resources.
///
/// Iteration order is the order entries were declared in; reports and
/// category groupings follow it.
#[derive(Debug, Clone)]
pub struct ResourceCatalog {
    entries: Vec<CatalogEntry>,
}

impl ResourceCatalog {
    /// The platform's built-in resources.
    pub fn standard() -> Self {
        Self {
            entries: STANDARD
                .iter()
                .map(|(name, kind, category, label)| CatalogEntry::new(name, *kind, category, label))
                .collect(),
        }
    }

    /// Build a catalog from explicit entries. Duplicate `(name, kind)` pairs are rejected.
    pub fn from_entries(entries: impl IntoIterator<Item = CatalogEntry>) -> Result<Self, AccessError> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for mut entry in entries {
            entry.name = normalize::resource_name(&entry.name);
            if entry.name.is_empty() {
                return Err(AccessError::InvalidCatalog("resource name cannot be empty".into()));
            }
            if !seen.insert((entry.name.clone(), entry.kind)) {
                return Err(AccessError::InvalidCatalog(format!(
                    "duplicate {} '{}'",
                    entry.kind, entry.name
                )));
            }
            out.push(entry);
        }
        Ok(Self { entries: out })
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Find the first entry with the given name, whatever its kind.
    pub fn lookup(&self, name: &str) -> Result<&CatalogEntry, AccessError> {
        let name = normalize::resource_name(name);
        self.entries
            .iter()
            .find(|e| e.name == name)
            .ok_or(AccessError::UnknownResource(name))
    }

    /// Find the entry with the given name and kind.
    pub fn lookup_kind(&self, name: &str, kind: ResourceKind) -> Result<&CatalogEntry, AccessError> {
        let name = normalize::resource_name(name);
        self.entries
            .iter()
            .find(|e| e.name == name && e.kind == kind)
            .ok_or_else(|| AccessError::UnknownResource(format!("{kind} '{name}'")))
    }

    /// Category names in order of first appearance.
    pub fn categories(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for entry in &self.entries {
            if !out.contains(&entry.category.as_str()) {
                out.push(&entry.category);
            }
        }
        out
    }

    /// Entries grouped by category, categories and entries both in catalog order.
    pub fn grouped(&self) -> Vec<CatalogCategory<'_>> {
        self.categories()
            .into_iter()
            .map(|category| CatalogCategory {
                category,
                entries: self.entries.iter().filter(|e| e.category == category).collect(),
            })
            .collect()
    }
}

impl Default for ResourceCatalog {
    fn default() -> Self {
        Self::standard()
    }
}
