//! In-memory port implementations, used by the CLI snapshot mode and tests.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use compliance_core::ports::{EntitlementRegistry, InventoryStore, Result};
use compliance_core::ComplianceError;
use compliance_types::{
    Entitlement, EntitlementId, InventoryFilter, InventoryUnit, UnitKind, Versioned,
};
use tokio::sync::RwLock;

#[derive(Default, Clone)]
pub struct InMemoryInventory {
    units: Arc<RwLock<Vec<InventoryUnit>>>,
}

impl InMemoryInventory {
    pub fn new(units: Vec<InventoryUnit>) -> Self {
        Self {
            units: Arc::new(RwLock::new(units)),
        }
    }

    /// Insert or replace by unit id.
    pub async fn upsert(&self, unit: InventoryUnit) {
        let mut units = self.units.write().await;
        let id = unit.id();
        match units.iter_mut().find(|u| u.id() == id) {
            Some(existing) => *existing = unit,
            None => units.push(unit),
        }
    }

    /// Mark a host dismissed. Returns false for an unknown host.
    pub async fn archive_host(&self, hostname: &str) -> bool {
        let mut units = self.units.write().await;
        match units
            .iter_mut()
            .find(|u| u.kind == UnitKind::Host && u.name == hostname)
        {
            Some(host) => {
                host.archived = true;
                true
            }
            None => false,
        }
    }

    fn live_host<'a>(units: &'a [InventoryUnit], hostname: &str) -> Option<&'a InventoryUnit> {
        units
            .iter()
            .find(|u| u.kind == UnitKind::Host && u.name == hostname && !u.archived)
    }
}

#[async_trait]
impl InventoryStore for InMemoryInventory {
    async fn list_units(&self, filter: &InventoryFilter) -> Result<Vec<InventoryUnit>> {
        let units = self.units.read().await;
        Ok(units.iter().filter(|u| filter.matches(u)).cloned().collect())
    }

    async fn host_exists(&self, hostname: &str) -> Result<bool> {
        let units = self.units.read().await;
        Ok(Self::live_host(&units, hostname).is_some())
    }

    async fn host_cluster(&self, hostname: &str) -> Result<Option<String>> {
        let units = self.units.read().await;
        Ok(Self::live_host(&units, hostname).and_then(|h| h.cluster.clone()))
    }

    async fn cluster_members(&self, cluster: &str) -> Result<Vec<String>> {
        let units = self.units.read().await;
        let mut members: Vec<String> = units
            .iter()
            .filter(|u| {
                u.kind == UnitKind::Host && !u.archived && u.cluster.as_deref() == Some(cluster)
            })
            .map(|u| u.name.clone())
            .collect();
        members.sort();
        Ok(members)
    }
}

/// Versioned entitlement map. Saves are compare-and-swap on the version,
/// matching the Postgres adapter.
#[derive(Default, Clone)]
pub struct InMemoryEntitlementRegistry {
    entries: Arc<RwLock<BTreeMap<EntitlementId, Versioned<Entitlement>>>>,
}

impl InMemoryEntitlementRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with entitlements at version 1.
    pub fn seeded(entitlements: impl IntoIterator<Item = Entitlement>) -> Self {
        let entries = entitlements
            .into_iter()
            .map(|e| (e.id, Versioned::new(e, 1)))
            .collect();
        Self {
            entries: Arc::new(RwLock::new(entries)),
        }
    }
}

#[async_trait]
impl EntitlementRegistry for InMemoryEntitlementRegistry {
    async fn list_entitlements(
        &self,
        part_id: Option<&str>,
    ) -> Result<Vec<Versioned<Entitlement>>> {
        let entries = self.entries.read().await;
        Ok(entries
            .values()
            .filter(|v| part_id.map_or(true, |p| v.value.part_id == p))
            .cloned()
            .collect())
    }

    async fn get_entitlement(&self, id: EntitlementId) -> Result<Option<Versioned<Entitlement>>> {
        let entries = self.entries.read().await;
        Ok(entries.get(&id).cloned())
    }

    async fn save_entitlement(
        &self,
        entitlement: &Entitlement,
        expected_version: Option<i64>,
    ) -> Result<i64> {
        let mut entries = self.entries.write().await;
        let id = entitlement.id;
        let version = match (expected_version, entries.get(&id)) {
            (None, None) => 1,
            (None, Some(_)) => return Err(ComplianceError::Conflict { id, expected: 0 }),
            (Some(_), None) => return Err(ComplianceError::EntitlementNotFound(id)),
            (Some(expected), Some(stored)) if stored.version != expected => {
                return Err(ComplianceError::Conflict { id, expected });
            }
            (Some(expected), Some(_)) => expected + 1,
        };
        entries.insert(id, Versioned::new(entitlement.clone(), version));
        Ok(version)
    }

    async fn delete_entitlement(&self, id: EntitlementId) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries
            .remove(&id)
            .map(|_| ())
            .ok_or(ComplianceError::EntitlementNotFound(id))
    }
}
