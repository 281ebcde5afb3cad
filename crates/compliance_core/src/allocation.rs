//! Allocation engine: a pure fold from (part, demand, entitlements) to an
//! [`AllocationResult`].
//!
//! Precedence is explicit > unlimited > catch-all:
//!
//! 1. A unit bound through its hosts to exactly one explicit entitlement
//!    draws from that entitlement's count; overflow falls through.
//! 2. A unit bound to several explicit entitlements is ambiguous. It is
//!    flagged, left uncovered, and still counted as used.
//! 3. An unlimited entitlement covers everything that remains.
//! 4. Otherwise catch-alls absorb the remainder from their pooled count,
//!    filled in id order; the last catch-all carries any deficit.
//!
//! Entitlements are always visited in id order so results are reproducible.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use compliance_types::{
    AllocationResult, AmbiguousUnit, AssociatedHostUsage, ClusterUsage, CoverageBasis,
    CoverageSlice, Entitlement, EntitlementAllocation, EntitlementId, HostUsage,
    InventoryUnitId, LicensePart, UnitAllocation, UnitKind,
};
use rust_decimal::Decimal;

use crate::usage::{Demand, DemandSet};

/// Decimal places kept on the coverage ratio.
const COVERAGE_SCALE: u32 = 4;

/// True when `entitlement` binds `demand` through one of its explicit hosts.
pub fn binds(entitlement: &Entitlement, demand: &Demand) -> bool {
    if !entitlement.binds_explicitly() {
        return false;
    }
    if entitlement.restricted && demand.unit.kind == UnitKind::Cluster {
        return false;
    }
    demand
        .binding_hosts
        .iter()
        .any(|h| entitlement.hosts.contains(h))
}

struct Ledger {
    covered: HashMap<EntitlementId, Decimal>,
    units: BTreeMap<InventoryUnitId, UnitAllocation>,
}

impl Ledger {
    fn cover(
        &mut self,
        unit: &InventoryUnitId,
        entitlement: &Entitlement,
        basis: CoverageBasis,
        quantity: Decimal,
    ) {
        if quantity <= Decimal::ZERO {
            return;
        }
        *self.covered.entry(entitlement.id).or_default() += quantity;
        if let Some(alloc) = self.units.get_mut(unit) {
            alloc.covered += quantity;
            alloc.uncovered -= quantity;
            alloc.slices.push(CoverageSlice {
                entitlement_id: entitlement.id,
                basis,
                quantity,
            });
        }
    }

    fn covered_by(&self, id: EntitlementId) -> Decimal {
        self.covered.get(&id).copied().unwrap_or_default()
    }
}

pub fn allocate(
    part: &LicensePart,
    demand: &DemandSet,
    entitlements: &[Entitlement],
) -> AllocationResult {
    let mut ents: Vec<&Entitlement> = entitlements
        .iter()
        .filter(|e| part.matches(&e.part_id))
        .collect();
    ents.sort_by_key(|e| e.id);

    let mut ledger = Ledger {
        covered: HashMap::new(),
        units: demand
            .units
            .values()
            .map(|d| {
                (
                    d.unit.clone(),
                    UnitAllocation {
                        unit: d.unit.clone(),
                        demand: d.quantity,
                        covered: Decimal::ZERO,
                        uncovered: d.quantity,
                        slices: Vec::new(),
                        ambiguous: false,
                    },
                )
            })
            .collect(),
    };

    // ── Step 1: explicit bindings ────────────────────────────
    let mut remaining: HashMap<EntitlementId, Decimal> = ents
        .iter()
        .filter(|e| e.binds_explicitly())
        .map(|e| (e.id, e.count.max(Decimal::ZERO)))
        .collect();
    let mut unbound: Vec<(InventoryUnitId, Decimal)> = Vec::new();
    let mut ambiguous = Vec::new();
    let mut unattributed = Decimal::ZERO;

    for d in demand.units.values() {
        let bound: Vec<&Entitlement> = ents.iter().copied().filter(|e| binds(e, d)).collect();
        match bound.as_slice() {
            [] => unbound.push((d.unit.clone(), d.quantity)),
            [e] => {
                let left = remaining.entry(e.id).or_default();
                let take = (*left).min(d.quantity);
                *left -= take;
                ledger.cover(&d.unit, e, CoverageBasis::Explicit, take);
                if d.quantity > take {
                    unbound.push((d.unit.clone(), d.quantity - take));
                }
            }
            many => {
                let ids: Vec<EntitlementId> = many.iter().map(|e| e.id).collect();
                tracing::warn!(
                    part_id = %part.part_id,
                    unit = %d.unit,
                    entitlements = ?ids,
                    "unit bound to several entitlements of one part; left uncovered"
                );
                if let Some(alloc) = ledger.units.get_mut(&d.unit) {
                    alloc.ambiguous = true;
                }
                unattributed += d.quantity;
                ambiguous.push(AmbiguousUnit {
                    unit: d.unit.clone(),
                    entitlements: ids,
                });
            }
        }
    }

    // ── Step 2: unlimited, else catch-all ────────────────────
    let unlimited = ents.iter().copied().find(|e| e.unlimited);
    let catch_alls: Vec<&Entitlement> = ents
        .iter()
        .copied()
        .filter(|e| e.catch_all && !e.unlimited)
        .collect();
    let mut deficit = Decimal::ZERO;

    if let Some(grant) = unlimited {
        for (unit, quantity) in &unbound {
            ledger.cover(unit, grant, CoverageBasis::Unlimited, *quantity);
        }
    } else if catch_alls.is_empty() {
        unattributed += unbound.iter().map(|(_, q)| *q).sum::<Decimal>();
    } else {
        let mut idx = 0;
        for (unit, quantity) in &unbound {
            let mut left = *quantity;
            while left > Decimal::ZERO && idx < catch_alls.len() {
                let pool = catch_alls[idx];
                let capacity = pool.count.max(Decimal::ZERO) - ledger.covered_by(pool.id);
                if capacity <= Decimal::ZERO {
                    idx += 1;
                    continue;
                }
                let take = capacity.min(left);
                ledger.cover(unit, pool, CoverageBasis::CatchAll, take);
                left -= take;
            }
            deficit += left;
        }
    }

    // ── Totals ───────────────────────────────────────────────
    let used_count = demand.total();
    let covered_count: Decimal = ledger.units.values().map(|u| u.covered).sum();
    let purchased_count: Decimal = ents.iter().map(|e| e.purchased()).sum();
    let available_count = purchased_count - used_count;
    let is_unlimited = unlimited.is_some();
    let coverage = if is_unlimited || used_count.is_zero() {
        Decimal::ONE
    } else {
        (covered_count / used_count).round_dp(COVERAGE_SCALE)
    };

    let last_catch_all = catch_alls.last().map(|e| e.id);
    let entitlement_allocations = ents
        .iter()
        .map(|e| {
            let covered = ledger.covered_by(e.id);
            let mut available = if e.unlimited {
                Decimal::ZERO
            } else {
                e.count - covered
            };
            if Some(e.id) == last_catch_all {
                available -= deficit;
            }
            EntitlementAllocation {
                entitlement_id: e.id,
                agreement_id: e.agreement_id.clone(),
                count: e.count,
                unlimited: e.unlimited,
                catch_all: e.catch_all,
                covered,
                available,
                hosts: associated_hosts(e, demand, &ledger.units),
            }
        })
        .collect();

    tracing::debug!(
        part_id = %part.part_id,
        used = %used_count,
        covered = %covered_count,
        available = %available_count,
        unlimited = is_unlimited,
        "allocation complete"
    );

    AllocationResult {
        part_id: part.part_id.clone(),
        item_description: part.item_description.clone(),
        metric: part.metric,
        used_count,
        covered_count,
        uncovered_demand: used_count - covered_count,
        unattributed_demand: unattributed,
        purchased_count,
        available_count,
        unlimited: is_unlimited,
        uncovered: ents.is_empty() && used_count > Decimal::ZERO,
        compliant: is_unlimited || available_count >= Decimal::ZERO,
        coverage,
        entitlements: entitlement_allocations,
        hosts: host_view(demand, &ledger.units),
        clusters: cluster_view(demand, &ledger.units),
        units: ledger.units.into_values().collect(),
        warnings: demand.warnings.clone(),
        ambiguous,
    }
}

// ── Presentation views ───────────────────────────────────────

fn associated_hosts(
    entitlement: &Entitlement,
    demand: &DemandSet,
    units: &BTreeMap<InventoryUnitId, UnitAllocation>,
) -> Vec<AssociatedHostUsage> {
    entitlement
        .hosts
        .iter()
        .map(|hostname| {
            let mut usage = AssociatedHostUsage {
                hostname: hostname.clone(),
                consumed: Decimal::ZERO,
                covered_by_entitlement: Decimal::ZERO,
                covered_total: Decimal::ZERO,
            };
            for d in demand
                .units
                .values()
                .filter(|d| d.binding_hosts.contains(hostname))
            {
                usage.consumed += d.quantity;
                if let Some(alloc) = units.get(&d.unit) {
                    usage.covered_total += alloc.covered;
                    usage.covered_by_entitlement += alloc
                        .slices
                        .iter()
                        .filter(|s| s.entitlement_id == entitlement.id)
                        .map(|s| s.quantity)
                        .sum::<Decimal>();
                }
            }
            usage
        })
        .collect()
}

fn covered_of(units: &BTreeMap<InventoryUnitId, UnitAllocation>, unit: &InventoryUnitId) -> Decimal {
    units.get(unit).map(|u| u.covered).unwrap_or_default()
}

/// Host and database demand rolled up per host.
fn host_view(
    demand: &DemandSet,
    units: &BTreeMap<InventoryUnitId, UnitAllocation>,
) -> Vec<HostUsage> {
    let mut hosts: BTreeMap<String, HostUsage> = BTreeMap::new();
    for d in demand
        .units
        .values()
        .filter(|d| d.unit.kind != UnitKind::Cluster)
    {
        for hostname in &d.binding_hosts {
            let row = hosts.entry(hostname.clone()).or_insert_with(|| HostUsage {
                hostname: hostname.clone(),
                cluster: d.cluster.clone(),
                demand: Decimal::ZERO,
                covered: Decimal::ZERO,
            });
            row.demand += d.quantity;
            row.covered += covered_of(units, &d.unit);
        }
    }
    hosts.into_values().collect()
}

/// All demand that sits on a cluster, whether pooled or per member host.
fn cluster_view(
    demand: &DemandSet,
    units: &BTreeMap<InventoryUnitId, UnitAllocation>,
) -> Vec<ClusterUsage> {
    let mut clusters: BTreeMap<String, (Decimal, Decimal, BTreeSet<String>)> = BTreeMap::new();
    for d in demand.units.values() {
        let Some(cluster) = &d.cluster else { continue };
        let row = clusters.entry(cluster.clone()).or_default();
        row.0 += d.quantity;
        row.1 += covered_of(units, &d.unit);
        row.2.extend(d.binding_hosts.iter().cloned());
    }
    clusters
        .into_iter()
        .map(|(cluster, (demand, covered, hosts))| ClusterUsage {
            cluster,
            demand,
            covered,
            hosts: hosts.into_iter().collect(),
        })
        .collect()
}
