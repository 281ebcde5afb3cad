//! Usage calculator: turns inventory into license-unit demand for one part.
//!
//! Dispatch is an enum plus a lookup map: each [`Metric`] has a
//! [`DemandCalculator`] registered in a [`CalculatorRegistry`]. A missing
//! measurement never fails the run; the unit is dropped and a
//! [`DataQualityWarning`] is attached to the [`DemandSet`].

use std::collections::{BTreeMap, BTreeSet, HashMap};

use compliance_types::{
    DataQualityWarning, InventoryUnit, InventoryUnitId, LicensePart, Metric, UnitKind,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core_factor::{CoreFactorTable, RoundingRule};
use crate::error::ComplianceError;
use crate::ports::Result;

/// Oracle's Named User Plus minimum per processor license.
pub const DEFAULT_NAMED_USER_MINIMUM: u32 = 25;

/// Demand of one inventory unit against one part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Demand {
    pub unit: InventoryUnitId,
    pub quantity: Decimal,
    /// Hostnames an explicit entitlement can bind this unit through.
    pub binding_hosts: BTreeSet<String>,
    pub cluster: Option<String>,
}

/// All demand for one part, keyed by unit in deterministic order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemandSet {
    pub part_id: String,
    pub units: BTreeMap<InventoryUnitId, Demand>,
    pub warnings: Vec<DataQualityWarning>,
}

impl DemandSet {
    pub fn new(part_id: impl Into<String>) -> Self {
        Self {
            part_id: part_id.into(),
            ..Default::default()
        }
    }

    pub fn total(&self) -> Decimal {
        self.units.values().map(|d| d.quantity).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn insert(&mut self, demand: Demand) {
        self.units.insert(demand.unit.clone(), demand);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsagePolicy {
    pub rounding: RoundingRule,
    /// Named-user floor per processor license; `None` disables it.
    pub named_user_minimum_per_processor: Option<u32>,
}

impl Default for UsagePolicy {
    fn default() -> Self {
        Self {
            rounding: RoundingRule::default(),
            named_user_minimum_per_processor: Some(DEFAULT_NAMED_USER_MINIMUM),
        }
    }
}

// ── Context ──────────────────────────────────────────────────

/// Indexed inventory handed to calculators for one run.
pub struct UsageContext<'a> {
    pub core_factors: &'a dyn CoreFactorTable,
    pub policy: &'a UsagePolicy,
    hosts: BTreeMap<&'a str, &'a InventoryUnit>,
    clusters: BTreeMap<&'a str, &'a InventoryUnit>,
    databases: Vec<&'a InventoryUnit>,
}

impl<'a> UsageContext<'a> {
    pub fn new(
        units: &'a [InventoryUnit],
        core_factors: &'a dyn CoreFactorTable,
        policy: &'a UsagePolicy,
    ) -> Self {
        let mut hosts = BTreeMap::new();
        let mut clusters = BTreeMap::new();
        let mut databases = Vec::new();
        for unit in units.iter().filter(|u| !u.archived) {
            match unit.kind {
                UnitKind::Host => {
                    hosts.insert(unit.name.as_str(), unit);
                }
                UnitKind::Cluster => {
                    clusters.insert(unit.name.as_str(), unit);
                }
                UnitKind::Database => databases.push(unit),
            }
        }
        Self {
            core_factors,
            policy,
            hosts,
            clusters,
            databases,
        }
    }

    pub fn host(&self, name: &str) -> Option<&'a InventoryUnit> {
        self.hosts.get(name).copied()
    }

    pub fn cluster(&self, name: &str) -> Option<&'a InventoryUnit> {
        self.clusters.get(name).copied()
    }

    /// Hostnames of the cluster's members present in this inventory.
    pub fn cluster_members(&self, cluster: &str) -> BTreeSet<String> {
        self.hosts
            .values()
            .filter(|h| h.cluster.as_deref() == Some(cluster))
            .map(|h| h.name.clone())
            .collect()
    }

    /// Databases using the part, in inventory order.
    pub fn databases_using(&self, part: &LicensePart) -> Vec<&'a InventoryUnit> {
        self.databases
            .iter()
            .copied()
            .filter(|db| uses_part(db, part))
            .collect()
    }

    /// Hosts that use the part themselves or through one of their databases.
    /// A database whose host is not in the inventory is reported separately.
    pub fn participating_hosts(
        &self,
        part: &LicensePart,
    ) -> (Vec<&'a InventoryUnit>, Vec<ComplianceError>) {
        let mut names: BTreeSet<&str> = self
            .hosts
            .values()
            .filter(|h| uses_part(h, part))
            .map(|h| h.name.as_str())
            .collect();
        let mut orphans = Vec::new();
        for db in self.databases_using(part) {
            match db.hostname.as_deref().and_then(|h| self.hosts.get(h)) {
                Some(host) => {
                    names.insert(host.name.as_str());
                }
                None => orphans.push(ComplianceError::MissingInventoryData {
                    unit: db.id(),
                    measurement: "host record",
                }),
            }
        }
        let hosts = names.into_iter().filter_map(|n| self.host(n)).collect();
        (hosts, orphans)
    }

    /// `cores × core_factor`, rounded by the policy.
    pub fn processor_licenses(&self, unit: &InventoryUnit) -> Result<Decimal> {
        let cores = unit
            .cpu_cores
            .ok_or_else(|| ComplianceError::MissingInventoryData {
                unit: unit.id(),
                measurement: "cpu_cores",
            })?;
        let factor = self
            .core_factors
            .factor_for(unit.processor_model.as_deref())
            .ok_or_else(|| ComplianceError::MissingInventoryData {
                unit: unit.id(),
                measurement: "core_factor",
            })?;
        Ok(self.policy.rounding.apply(Decimal::from(cores) * factor))
    }
}

fn uses_part(unit: &InventoryUnit, part: &LicensePart) -> bool {
    unit.licenses_in_use.iter().any(|l| part.matches(l))
}

fn host_demand(host: &InventoryUnit, quantity: Decimal) -> Demand {
    Demand {
        unit: host.id(),
        quantity,
        binding_hosts: BTreeSet::from([host.name.clone()]),
        cluster: host.cluster.clone(),
    }
}

// ── Calculators ──────────────────────────────────────────────

/// Computes demand for every participating unit. Per-unit failures are
/// returned in place so the caller can downgrade them to warnings.
pub trait DemandCalculator: Send + Sync {
    fn compute(&self, part: &LicensePart, ctx: &UsageContext<'_>) -> Vec<Result<Demand>>;
}

pub struct ProcessorCalculator;

impl DemandCalculator for ProcessorCalculator {
    fn compute(&self, part: &LicensePart, ctx: &UsageContext<'_>) -> Vec<Result<Demand>> {
        let (hosts, orphans) = ctx.participating_hosts(part);
        hosts
            .into_iter()
            .map(|host| Ok(host_demand(host, ctx.processor_licenses(host)?)))
            .chain(orphans.into_iter().map(Err))
            .collect()
    }
}

/// Pools demand once per cluster from the cluster's own capacity, however
/// many member hosts use the part.
pub struct ClusterPooledCalculator;

impl DemandCalculator for ClusterPooledCalculator {
    fn compute(&self, part: &LicensePart, ctx: &UsageContext<'_>) -> Vec<Result<Demand>> {
        let (hosts, orphans) = ctx.participating_hosts(part);
        let mut results: Vec<Result<Demand>> = orphans.into_iter().map(Err).collect();

        let mut clusters = BTreeSet::new();
        for host in hosts {
            match host.cluster.as_deref() {
                Some(cluster) => {
                    clusters.insert(cluster);
                }
                None => results.push(
                    ctx.processor_licenses(host)
                        .map(|quantity| host_demand(host, quantity)),
                ),
            }
        }

        for name in clusters {
            let demand = match ctx.cluster(name) {
                Some(cluster) => ctx.processor_licenses(cluster).map(|quantity| Demand {
                    unit: cluster.id(),
                    quantity,
                    binding_hosts: ctx.cluster_members(name),
                    cluster: Some(name.to_string()),
                }),
                None => Err(ComplianceError::MissingInventoryData {
                    unit: InventoryUnitId::cluster(name),
                    measurement: "cluster record",
                }),
            };
            results.push(demand);
        }
        results
    }
}

pub struct NamedUserCalculator;

impl DemandCalculator for NamedUserCalculator {
    fn compute(&self, part: &LicensePart, ctx: &UsageContext<'_>) -> Vec<Result<Demand>> {
        ctx.databases_using(part)
            .into_iter()
            .map(|db| {
                let users = db
                    .user_count
                    .ok_or_else(|| ComplianceError::MissingInventoryData {
                        unit: db.id(),
                        measurement: "user_count",
                    })?;
                let host = db.hostname.as_deref().and_then(|h| ctx.host(h));
                let mut quantity = Decimal::from(users);
                if let (Some(minimum), Some(host)) =
                    (ctx.policy.named_user_minimum_per_processor, host)
                {
                    // Floor only applies when the host footprint is known.
                    if let Ok(processors) = ctx.processor_licenses(host) {
                        quantity = quantity.max(Decimal::from(minimum) * processors);
                    }
                }
                Ok(Demand {
                    unit: db.id(),
                    quantity,
                    binding_hosts: db.hostname.iter().cloned().collect(),
                    cluster: host.and_then(|h| h.cluster.clone()),
                })
            })
            .collect()
    }
}

pub struct HostCalculator;

impl DemandCalculator for HostCalculator {
    fn compute(&self, part: &LicensePart, ctx: &UsageContext<'_>) -> Vec<Result<Demand>> {
        let (hosts, orphans) = ctx.participating_hosts(part);
        hosts
            .into_iter()
            .map(|host| Ok(host_demand(host, Decimal::ONE)))
            .chain(orphans.into_iter().map(Err))
            .collect()
    }
}

// ── Registry ─────────────────────────────────────────────────

pub struct CalculatorRegistry {
    calculators: HashMap<Metric, Box<dyn DemandCalculator>>,
}

impl Default for CalculatorRegistry {
    fn default() -> Self {
        Self::empty()
            .register(Metric::Processor, ProcessorCalculator)
            .register(Metric::ClusterPooled, ClusterPooledCalculator)
            .register(Metric::NamedUser, NamedUserCalculator)
            .register(Metric::Host, HostCalculator)
    }
}

impl CalculatorRegistry {
    pub fn empty() -> Self {
        Self {
            calculators: HashMap::new(),
        }
    }

    pub fn register(mut self, metric: Metric, calculator: impl DemandCalculator + 'static) -> Self {
        self.calculators.insert(metric, Box::new(calculator));
        self
    }

    /// Demand for `part` over `units`. Fails only when the part's metric has
    /// no calculator; missing measurements become warnings.
    pub fn compute_demand(
        &self,
        part: &LicensePart,
        units: &[InventoryUnit],
        core_factors: &dyn CoreFactorTable,
        policy: &UsagePolicy,
    ) -> Result<DemandSet> {
        let calculator = self
            .calculators
            .get(&part.metric)
            .ok_or(ComplianceError::UnsupportedMetric(part.metric))?;

        let ctx = UsageContext::new(units, core_factors, policy);
        let mut set = DemandSet::new(&part.part_id);
        for outcome in calculator.compute(part, &ctx) {
            match outcome {
                Ok(demand) => {
                    tracing::debug!(
                        part_id = %part.part_id,
                        unit = %demand.unit,
                        quantity = %demand.quantity,
                        "demand computed"
                    );
                    set.insert(demand);
                }
                Err(ComplianceError::MissingInventoryData { unit, measurement }) => {
                    tracing::warn!(
                        part_id = %part.part_id,
                        unit = %unit,
                        measurement,
                        "unit excluded from demand"
                    );
                    set.warnings.push(DataQualityWarning {
                        message: format!("missing {measurement}"),
                        unit,
                    });
                }
                Err(other) => return Err(other),
            }
        }
        Ok(set)
    }
}
