#![allow(dead_code)]

use std::sync::Arc;

use compliance_core::{
    ComplianceService, LicenseCatalog, StaticCoreFactorTable, UsagePolicy,
};
use compliance_types::{Entitlement, InventoryUnit, LicensePart, Metric, Vendor};
use license_compliance::memory::{InMemoryEntitlementRegistry, InMemoryInventory};
use rust_decimal::Decimal;

pub const PROCESSOR_PART: &str = "A90611";
pub const CLUSTER_PART: &str = "MYSQL-CLUSTER";
pub const NUP_PART: &str = "L10006";

pub fn catalog() -> LicenseCatalog {
    let part = |id: &str, metric: Metric, aliases: &[&str]| LicensePart {
        part_id: id.into(),
        item_description: format!("{id} description"),
        metric,
        vendor: Vendor::Oracle,
        aliases: aliases.iter().map(|a| a.to_string()).collect(),
    };
    LicenseCatalog::new(
        "test",
        vec![
            part(PROCESSOR_PART, Metric::Processor, &["Oracle ENT"]),
            part(CLUSTER_PART, Metric::ClusterPooled, &[]),
            part(NUP_PART, Metric::NamedUser, &[]),
        ],
    )
    .unwrap()
}

/// Core factor 1 for every model, so demand equals cores.
pub fn factors() -> StaticCoreFactorTable {
    StaticCoreFactorTable::new("test-factors", Some(Decimal::ONE))
}

pub fn host(name: &str, cores: u32, parts: &[&str]) -> InventoryUnit {
    InventoryUnit::host(name)
        .with_cores(cores)
        .using(parts.iter().copied())
}

pub fn entitlement(agreement: &str, part: &str, count: i64) -> Entitlement {
    Entitlement::new(agreement, part, Decimal::from(count))
}

pub struct Fixture {
    pub service: Arc<ComplianceService>,
    pub inventory: InMemoryInventory,
    pub registry: InMemoryEntitlementRegistry,
}

pub fn fixture(units: Vec<InventoryUnit>, entitlements: Vec<Entitlement>) -> Fixture {
    let inventory = InMemoryInventory::new(units);
    let registry = InMemoryEntitlementRegistry::seeded(entitlements);
    let service = ComplianceService::new(
        Arc::new(inventory.clone()),
        Arc::new(registry.clone()),
        Arc::new(catalog()),
        Arc::new(factors()),
        UsagePolicy::default(),
    );
    Fixture {
        service: Arc::new(service),
        inventory,
        registry,
    }
}
