//! Tenant-scoped schema metadata cache.
//!
//! Readers fetch an immutable snapshot `Arc` per tenant and never block
//! on writers. A refresh builds a complete replacement snapshot and swaps
//! it in with a single map insert, so concurrent readers observe either
//! the old state or the new state, never a torn mixture. Refreshes for
//! the same tenant serialize; different tenants do not interfere.

mod introspect;
mod relationship;
mod table;

pub use introspect::{ForeignKeyRow, KeyRow, PgIntrospector, SchemaIntrospector};
pub use relationship::{
    derive_relationships, Cardinality, Junction, Relationship, RelationshipsMap,
};
pub use table::{Column, Table};

use crate::error::{Error, Result};
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(30);

/// One tenant's complete schema metadata.
#[derive(Clone, Debug, Default)]
pub struct TenantSnapshot {
    tables: HashMap<(String, String), Table>,
    relationships: RelationshipsMap,
}

impl TenantSnapshot {
    pub fn new(tables: Vec<Table>, relationships: RelationshipsMap) -> Self {
        Self {
            tables: tables
                .into_iter()
                .map(|t| ((t.schema.clone(), t.name.clone()), t))
                .collect(),
            relationships,
        }
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    pub fn relationship_count(&self) -> usize {
        self.relationships.values().map(Vec::len).sum()
    }
}

/// Process-wide schema cache keyed by tenant.
#[derive(Debug)]
pub struct SchemaCache {
    tenants: DashMap<String, Arc<TenantSnapshot>>,
    refresh_locks: DashMap<String, Arc<tokio::sync::Mutex<()>>>,
    refresh_timeout: Duration,
}

impl SchemaCache {
    /// Create an empty cache; lookups return not-found until a refresh.
    pub fn new() -> Self {
        Self {
            tenants: DashMap::new(),
            refresh_locks: DashMap::new(),
            refresh_timeout: DEFAULT_REFRESH_TIMEOUT,
        }
    }

    /// Create a cache with a non-default introspection timeout.
    pub fn with_refresh_timeout(timeout: Duration) -> Self {
        Self {
            refresh_timeout: timeout,
            ..Self::new()
        }
    }

    /// Fetch the current snapshot for a tenant.
    pub fn snapshot(&self, tenant: &str) -> Option<Arc<TenantSnapshot>> {
        self.tenants.get(tenant).map(|entry| entry.value().clone())
    }

    /// Look a table up by `(tenant, schema, table)`.
    pub fn get_table(&self, tenant: &str, schema: &str, table: &str) -> Option<Table> {
        self.snapshot(tenant)?
            .tables
            .get(&(schema.to_string(), table.to_string()))
            .cloned()
    }

    /// All relationships rooted at a table; empty when none are known.
    pub fn get_relationships(&self, tenant: &str, schema: &str, table: &str) -> Vec<Relationship> {
        self.snapshot(tenant)
            .and_then(|snap| {
                snap.relationships
                    .get(&(schema.to_string(), table.to_string()))
                    .cloned()
            })
            .unwrap_or_default()
    }

    /// Find the unique relationship from `source` whose target is `target`.
    pub fn find_relationship(
        &self,
        tenant: &str,
        schema: &str,
        source: &str,
        target: &str,
    ) -> Result<Relationship> {
        let matches: Vec<Relationship> = self
            .get_relationships(tenant, schema, source)
            .into_iter()
            .filter(|r| r.target_table == target)
            .collect();

        match matches.len() {
            0 => Err(Error::RelationshipNotFound(target.to_string())),
            1 => Ok(matches.into_iter().next().unwrap()),
            _ => Err(Error::RelationshipAmbiguous(target.to_string())),
        }
    }

    /// Find a relationship narrowed by a disambiguation hint.
    ///
    /// The hint matches a constraint name or a column on either side.
    pub fn find_relationship_with_hint(
        &self,
        tenant: &str,
        schema: &str,
        source: &str,
        target: &str,
        hint: &str,
    ) -> Result<Relationship> {
        let matches: Vec<Relationship> = self
            .get_relationships(tenant, schema, source)
            .into_iter()
            .filter(|r| r.target_table == target && r.matches_hint(hint))
            .collect();

        match matches.len() {
            0 => Err(Error::RelationshipNotFound(target.to_string())),
            1 => Ok(matches.into_iter().next().unwrap()),
            _ => Err(Error::RelationshipAmbiguous(target.to_string())),
        }
    }

    /// Rebuild one tenant's metadata and swap it in atomically.
    ///
    /// Refreshes for the same tenant serialize; on error (including
    /// timeout) the previously visible snapshot is retained.
    pub async fn refresh(
        &self,
        tenant: &str,
        introspector: &dyn SchemaIntrospector,
    ) -> Result<()> {
        let lock = self
            .refresh_locks
            .entry(tenant.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        info!(tenant, "refreshing schema cache");

        let snapshot = match tokio::time::timeout(
            self.refresh_timeout,
            Self::build_snapshot(introspector),
        )
        .await
        {
            Ok(Ok(snapshot)) => snapshot,
            Ok(Err(e)) => {
                warn!(tenant, error = %e, "schema refresh failed, keeping previous snapshot");
                return Err(e);
            }
            Err(_) => {
                warn!(tenant, "schema refresh timed out, keeping previous snapshot");
                return Err(Error::SchemaRefreshTimeout);
            }
        };

        info!(
            tenant,
            tables = snapshot.table_count(),
            relationships = snapshot.relationship_count(),
            "schema cache refreshed"
        );

        self.tenants.insert(tenant.to_string(), Arc::new(snapshot));
        Ok(())
    }

    async fn build_snapshot(introspector: &dyn SchemaIntrospector) -> Result<TenantSnapshot> {
        let tables = introspector.tables().await?;
        let fks = introspector.foreign_keys().await?;
        let keys = introspector.table_keys().await?;
        let relationships = derive_relationships(&fks, &keys);
        Ok(TenantSnapshot::new(tables, relationships))
    }

    /// Drop one tenant's metadata.
    pub fn clear(&self, tenant: &str) {
        self.tenants.remove(tenant);
        self.refresh_locks.remove(tenant);
        info!(tenant, "schema cache cleared");
    }

    /// Drop everything.
    pub fn clear_all(&self) {
        self.tenants.clear();
        self.refresh_locks.clear();
    }
}

impl Default for SchemaCache {
    fn default() -> Self {
        Self::new()
    }
}
