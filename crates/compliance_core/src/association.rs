//! Association manager: binds and unbinds hosts on entitlements.
//!
//! Writers are serialized per license part with an async mutex, which also
//! makes the cross-entitlement ambiguity check atomic with the write. Every
//! save is a compare-and-swap on the entitlement version, so a writer outside
//! this process surfaces as `Conflict` rather than a lost update.

use std::collections::HashMap;
use std::sync::Arc;

use compliance_types::{Entitlement, EntitlementId, Versioned};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::catalog::LicenseCatalog;
use crate::error::ComplianceError;
use crate::ports::{EntitlementRegistry, InventoryStore, Result};

/// One async mutex per license part, created on first use.
#[derive(Default)]
pub struct PartLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl PartLocks {
    pub async fn acquire(&self, part_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks.entry(part_id.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }
}

pub struct AssociationManager {
    registry: Arc<dyn EntitlementRegistry>,
    inventory: Arc<dyn InventoryStore>,
    catalog: Arc<LicenseCatalog>,
    locks: PartLocks,
}

impl AssociationManager {
    pub fn new(
        registry: Arc<dyn EntitlementRegistry>,
        inventory: Arc<dyn InventoryStore>,
        catalog: Arc<LicenseCatalog>,
    ) -> Self {
        Self {
            registry,
            inventory,
            catalog,
            locks: PartLocks::default(),
        }
    }

    pub(crate) async fn lock_part(&self, part_id: &str) -> OwnedMutexGuard<()> {
        self.locks.acquire(part_id).await
    }

    async fn load(&self, id: EntitlementId) -> Result<Versioned<Entitlement>> {
        self.registry
            .get_entitlement(id)
            .await?
            .ok_or(ComplianceError::EntitlementNotFound(id))
    }

    /// Load an entitlement while holding its part lock. Re-reads under the
    /// lock so the returned version is current.
    async fn load_locked(
        &self,
        id: EntitlementId,
    ) -> Result<(Versioned<Entitlement>, OwnedMutexGuard<()>)> {
        loop {
            let part_id = self.load(id).await?.value.part_id;
            let guard = self.lock_part(&part_id).await;
            let current = self.load(id).await?;
            if current.value.part_id == part_id {
                return Ok((current, guard));
            }
            // Part changed between reads; take the other lock.
        }
    }

    /// Other non-catch-all entitlements of `part_id`, excluding `id`.
    async fn siblings(&self, part_id: &str, id: EntitlementId) -> Result<Vec<Entitlement>> {
        Ok(self
            .registry
            .list_entitlements(Some(part_id))
            .await?
            .into_iter()
            .map(|v| v.value)
            .filter(|e| e.id != id && !e.catch_all)
            .collect())
    }

    /// Fails with `AmbiguousBinding` if any host of `entitlement` is already
    /// bound to a sibling. Caller holds the part lock.
    pub(crate) async fn check_unambiguous(
        &self,
        entitlement: &Entitlement,
        hosts: impl IntoIterator<Item = &str>,
    ) -> Result<()> {
        let siblings = self
            .siblings(&entitlement.part_id, entitlement.id)
            .await?;
        for hostname in hosts {
            if let Some(existing) = siblings.iter().find(|s| s.hosts.contains(hostname)) {
                return Err(ComplianceError::AmbiguousBinding {
                    hostname: hostname.to_string(),
                    part_id: entitlement.part_id.clone(),
                    existing: existing.id,
                });
            }
        }
        Ok(())
    }

    pub(crate) async fn require_host(&self, hostname: &str) -> Result<()> {
        if self.inventory.host_exists(hostname).await? {
            Ok(())
        } else {
            Err(ComplianceError::HostNotFound(hostname.to_string()))
        }
    }

    /// For cluster-scoped parts the host must sit in a cluster whose other
    /// members are not bound to a different entitlement of the part.
    pub(crate) async fn check_cluster_scope(
        &self,
        entitlement: &Entitlement,
        hostname: &str,
    ) -> Result<()> {
        let cluster_scoped = self
            .catalog
            .get(&entitlement.part_id)
            .is_some_and(|p| p.metric.is_cluster_scoped());
        if !cluster_scoped {
            return Ok(());
        }

        let not_eligible = || ComplianceError::NotInClusterHostNotFound {
            hostname: hostname.to_string(),
            part_id: entitlement.part_id.clone(),
        };
        let cluster = self
            .inventory
            .host_cluster(hostname)
            .await?
            .ok_or_else(not_eligible)?;
        let members = self.inventory.cluster_members(&cluster).await?;
        let siblings = self
            .siblings(&entitlement.part_id, entitlement.id)
            .await?;
        let clash = members
            .iter()
            .filter(|m| m.as_str() != hostname)
            .any(|m| siblings.iter().any(|s| s.hosts.contains(m)));
        if clash {
            return Err(not_eligible());
        }
        Ok(())
    }

    pub async fn add_host_to_entitlement(&self, id: EntitlementId, hostname: &str) -> Result<()> {
        let (current, _guard) = self.load_locked(id).await?;
        self.require_host(hostname).await?;

        let mut entitlement = current.value;
        if entitlement.hosts.contains(hostname) {
            tracing::debug!(entitlement_id = %id, hostname, "host already bound");
            return Ok(());
        }

        if entitlement.catch_all {
            return Err(ComplianceError::InvalidEntitlement(
                "catch-all entitlements cannot list hosts".into(),
            ));
        }
        self.check_cluster_scope(&entitlement, hostname).await?;
        self.check_unambiguous(&entitlement, [hostname]).await?;

        entitlement.hosts.insert(hostname.to_string());
        let version = self
            .registry
            .save_entitlement(&entitlement, Some(current.version))
            .await?;
        tracing::info!(
            entitlement_id = %id,
            part_id = %entitlement.part_id,
            hostname,
            version,
            "host bound to entitlement"
        );
        Ok(())
    }

    /// Idempotent; the host need not exist in the inventory any more.
    pub async fn remove_host_from_entitlement(
        &self,
        id: EntitlementId,
        hostname: &str,
    ) -> Result<()> {
        let (current, _guard) = self.load_locked(id).await?;
        let mut entitlement = current.value;
        if !entitlement.hosts.remove(hostname) {
            tracing::debug!(entitlement_id = %id, hostname, "host not bound");
            return Ok(());
        }
        let version = self
            .registry
            .save_entitlement(&entitlement, Some(current.version))
            .await?;
        tracing::info!(
            entitlement_id = %id,
            part_id = %entitlement.part_id,
            hostname,
            version,
            "host unbound from entitlement"
        );
        Ok(())
    }

    /// Unbind a dismissed host everywhere. Returns the entitlements changed.
    pub async fn remove_host_from_all_entitlements(
        &self,
        hostname: &str,
    ) -> Result<Vec<EntitlementId>> {
        let bound: Vec<EntitlementId> = self
            .registry
            .list_entitlements(None)
            .await?
            .into_iter()
            .filter(|v| v.value.hosts.contains(hostname))
            .map(|v| v.value.id)
            .collect();
        for id in &bound {
            match self.remove_host_from_entitlement(*id, hostname).await {
                // Deleted concurrently; nothing left to unbind.
                Ok(()) | Err(ComplianceError::EntitlementNotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(bound)
    }
}
