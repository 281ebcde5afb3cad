//! Allocation results: per part, per entitlement, per unit, and the
//! presentation views (per host / per cluster) derived from them.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{EntitlementId, InventoryUnitId, Metric};

/// How a slice of demand got covered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverageBasis {
    Explicit,
    Unlimited,
    CatchAll,
}

/// A quantity of one unit's demand covered by one entitlement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageSlice {
    pub entitlement_id: EntitlementId,
    pub basis: CoverageBasis,
    pub quantity: Decimal,
}

/// Allocation outcome for one demand unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitAllocation {
    pub unit: InventoryUnitId,
    pub demand: Decimal,
    pub covered: Decimal,
    pub uncovered: Decimal,
    pub slices: Vec<CoverageSlice>,
    /// Bound to more than one explicit entitlement; left uncovered.
    #[serde(default)]
    pub ambiguous: bool,
}

/// Explicitly associated host as seen from one entitlement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssociatedHostUsage {
    pub hostname: String,
    /// Demand of the units reachable through this host.
    pub consumed: Decimal,
    /// Portion of that demand covered by this entitlement.
    pub covered_by_entitlement: Decimal,
    /// Portion of that demand covered by any entitlement.
    pub covered_total: Decimal,
}

/// Allocation outcome for one entitlement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitlementAllocation {
    pub entitlement_id: EntitlementId,
    pub agreement_id: String,
    pub count: Decimal,
    pub unlimited: bool,
    pub catch_all: bool,
    pub covered: Decimal,
    /// `count - covered`; for the last catch-all of a part this also carries
    /// the pooled deficit, so it may be negative. Zero for unlimited grants.
    pub available: Decimal,
    pub hosts: Vec<AssociatedHostUsage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostUsage {
    pub hostname: String,
    pub cluster: Option<String>,
    pub demand: Decimal,
    pub covered: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterUsage {
    pub cluster: String,
    pub demand: Decimal,
    pub covered: Decimal,
    pub hosts: Vec<String>,
}

/// A unit excluded from demand because a measurement was missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataQualityWarning {
    pub unit: InventoryUnitId,
    pub message: String,
}

/// A unit bound to several explicit entitlements of the same part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmbiguousUnit {
    pub unit: InventoryUnitId,
    pub entitlements: Vec<EntitlementId>,
}

/// Compliance outcome for one license part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationResult {
    pub part_id: String,
    pub item_description: String,
    pub metric: Metric,
    /// Sum of all demand, independent of coverage.
    pub used_count: Decimal,
    pub covered_count: Decimal,
    /// `used_count - covered_count`.
    pub uncovered_demand: Decimal,
    /// Uncovered demand no entitlement carries as its own deficit: ambiguous
    /// units, and unbound demand when the part has no catch-all.
    pub unattributed_demand: Decimal,
    /// Sum of `count` over non-unlimited entitlements.
    pub purchased_count: Decimal,
    /// `purchased_count - used_count`, never clamped.
    pub available_count: Decimal,
    pub unlimited: bool,
    /// No entitlement exists for a part with positive demand.
    pub uncovered: bool,
    pub compliant: bool,
    /// `covered / used`, 1 when nothing is used or an unlimited grant applies.
    pub coverage: Decimal,
    pub entitlements: Vec<EntitlementAllocation>,
    pub units: Vec<UnitAllocation>,
    pub hosts: Vec<HostUsage>,
    pub clusters: Vec<ClusterUsage>,
    pub warnings: Vec<DataQualityWarning>,
    pub ambiguous: Vec<AmbiguousUnit>,
}

impl AllocationResult {
    pub fn entitlement(&self, id: EntitlementId) -> Option<&EntitlementAllocation> {
        self.entitlements.iter().find(|e| e.entitlement_id == id)
    }

    pub fn unit(&self, id: &InventoryUnitId) -> Option<&UnitAllocation> {
        self.units.iter().find(|u| &u.unit == id)
    }
}

/// Allocation results for every part with demand or entitlements.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComplianceReport {
    pub parts: Vec<AllocationResult>,
    pub core_factor_version: String,
}

impl ComplianceReport {
    pub fn part(&self, part_id: &str) -> Option<&AllocationResult> {
        self.parts.iter().find(|p| p.part_id == part_id)
    }

    pub fn non_compliant(&self) -> impl Iterator<Item = &AllocationResult> {
        self.parts.iter().filter(|p| !p.compliant)
    }
}

/// One row of an entitlement search: the stored entitlement plus its share of
/// the current allocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitlementView {
    pub entitlement: crate::Entitlement,
    pub version: i64,
    pub item_description: String,
    pub metric: Option<Metric>,
    pub allocation: Option<EntitlementAllocation>,
}
