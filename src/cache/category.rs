//! Cache Categories
//!
//! Per-category TTLs for the kinds of records fetched from external systems.

use serde::Serialize;

/// Kind of cached record, each with its own freshness requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheCategory {
    Device,
    User,
    Incident,
    Knowledge,
    RemoteAction,
    Diagnostics,
}

impl CacheCategory {
    pub const ALL: [CacheCategory; 6] = [
        CacheCategory::Device,
        CacheCategory::User,
        CacheCategory::Incident,
        CacheCategory::Knowledge,
        CacheCategory::RemoteAction,
        CacheCategory::Diagnostics,
    ];

    /// Suffix of the `CACHE_TTL_<NAME>` environment variable.
    pub fn env_name(self) -> &'static str {
        match self {
            CacheCategory::Device => "DEVICE",
            CacheCategory::User => "USER",
            CacheCategory::Incident => "INCIDENT",
            CacheCategory::Knowledge => "KNOWLEDGE",
            CacheCategory::RemoteAction => "REMOTE_ACTION",
            CacheCategory::Diagnostics => "DIAGNOSTICS",
        }
    }
}

/// TTL table in seconds, one slot per [`CacheCategory`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryTtls {
    pub device: i64,
    pub user: i64,
    pub incident: i64,
    pub knowledge: i64,
    pub remote_action: i64,
    pub diagnostics: i64,
}

impl CategoryTtls {
    pub fn get(&self, category: CacheCategory) -> i64 {
        match category {
            CacheCategory::Device => self.device,
            CacheCategory::User => self.user,
            CacheCategory::Incident => self.incident,
            CacheCategory::Knowledge => self.knowledge,
            CacheCategory::RemoteAction => self.remote_action,
            CacheCategory::Diagnostics => self.diagnostics,
        }
    }

    pub fn set(&mut self, category: CacheCategory, ttl: i64) {
        let slot = match category {
            CacheCategory::Device => &mut self.device,
            CacheCategory::User => &mut self.user,
            CacheCategory::Incident => &mut self.incident,
            CacheCategory::Knowledge => &mut self.knowledge,
            CacheCategory::RemoteAction => &mut self.remote_action,
            CacheCategory::Diagnostics => &mut self.diagnostics,
        };
        *slot = ttl;
    }
}

impl Default for CategoryTtls {
    fn default() -> Self {
        Self {
            device: 300,
            user: 600,
            incident: 120,
            knowledge: 1800,
            remote_action: 60,
            diagnostics: 120,
        }
    }
}
