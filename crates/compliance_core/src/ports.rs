//! Storage port traits. Implemented by `compliance_postgres` and by the
//! in-memory stores in the root crate; core logic depends only on these.

use async_trait::async_trait;
use compliance_types::{Entitlement, EntitlementId, InventoryFilter, InventoryUnit, Versioned};

use crate::error::ComplianceError;

pub type Result<T> = std::result::Result<T, ComplianceError>;

/// Read-only view of the discovered inventory.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Hosts, clusters and databases matching the filter.
    async fn list_units(&self, filter: &InventoryFilter) -> Result<Vec<InventoryUnit>>;

    /// True when a non-archived host with this name exists.
    async fn host_exists(&self, hostname: &str) -> Result<bool>;

    /// Cluster the host belongs to, if any.
    async fn host_cluster(&self, hostname: &str) -> Result<Option<String>>;

    /// Hostnames of the cluster's members. Empty for an unknown cluster.
    async fn cluster_members(&self, cluster: &str) -> Result<Vec<String>>;
}

/// Persistence for entitlements.
///
/// Every stored entitlement carries a version. `save_entitlement` is a
/// compare-and-swap: `expected_version = None` inserts and fails with
/// `Conflict` if the id exists; `Some(v)` updates only if the stored version
/// is still `v`. Returns the new version.
#[async_trait]
pub trait EntitlementRegistry: Send + Sync {
    /// Entitlements whose `part_id` equals `part_id`, or all when `None`.
    async fn list_entitlements(&self, part_id: Option<&str>)
        -> Result<Vec<Versioned<Entitlement>>>;

    async fn get_entitlement(&self, id: EntitlementId) -> Result<Option<Versioned<Entitlement>>>;

    async fn save_entitlement(
        &self,
        entitlement: &Entitlement,
        expected_version: Option<i64>,
    ) -> Result<i64>;

    /// Fails with `EntitlementNotFound` when absent.
    async fn delete_entitlement(&self, id: EntitlementId) -> Result<()>;
}
