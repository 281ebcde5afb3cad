//! Compliance service: the façade the HTTP collaborator calls.

use std::collections::BTreeMap;
use std::sync::Arc;

use compliance_types::{
    AllocationResult, ComplianceReport, Entitlement, EntitlementFilter, EntitlementId,
    EntitlementView, InventoryFilter, InventoryUnit, LicensePart, Versioned,
};
use futures::future::try_join_all;

use crate::allocation::allocate;
use crate::association::AssociationManager;
use crate::catalog::LicenseCatalog;
use crate::core_factor::CoreFactorTable;
use crate::error::ComplianceError;
use crate::ports::{EntitlementRegistry, InventoryStore, Result};
use crate::search;
use crate::usage::{CalculatorRegistry, UsagePolicy};
use crate::validation;

pub struct ComplianceService {
    inventory: Arc<dyn InventoryStore>,
    registry: Arc<dyn EntitlementRegistry>,
    catalog: Arc<LicenseCatalog>,
    core_factors: Arc<dyn CoreFactorTable>,
    calculators: CalculatorRegistry,
    policy: UsagePolicy,
    associations: AssociationManager,
}

impl ComplianceService {
    pub fn new(
        inventory: Arc<dyn InventoryStore>,
        registry: Arc<dyn EntitlementRegistry>,
        catalog: Arc<LicenseCatalog>,
        core_factors: Arc<dyn CoreFactorTable>,
        policy: UsagePolicy,
    ) -> Self {
        let associations =
            AssociationManager::new(registry.clone(), inventory.clone(), catalog.clone());
        Self {
            inventory,
            registry,
            catalog,
            core_factors,
            calculators: CalculatorRegistry::default(),
            policy,
            associations,
        }
    }

    /// Replace the metric → calculator map.
    pub fn with_calculators(mut self, calculators: CalculatorRegistry) -> Self {
        self.calculators = calculators;
        self
    }

    pub fn catalog(&self) -> &LicenseCatalog {
        &self.catalog
    }

    fn run(
        &self,
        part: &LicensePart,
        units: &[InventoryUnit],
        entitlements: &[Entitlement],
    ) -> Result<AllocationResult> {
        let demand =
            self.calculators
                .compute_demand(part, units, self.core_factors.as_ref(), &self.policy)?;
        Ok(allocate(part, &demand, entitlements))
    }

    async fn entitlements_of(&self, part_id: &str) -> Result<Vec<Entitlement>> {
        Ok(self
            .registry
            .list_entitlements(Some(part_id))
            .await?
            .into_iter()
            .map(|v| v.value)
            .collect())
    }

    // ── Allocation ───────────────────────────────────────────

    /// Allocation for one part, addressed by part id or alias.
    pub async fn allocate(&self, part_id: &str, filter: &InventoryFilter) -> Result<AllocationResult> {
        let part = self
            .catalog
            .resolve(part_id)
            .ok_or_else(|| ComplianceError::PartNotFound(part_id.to_string()))?;
        let units = self.inventory.list_units(filter).await?;
        let entitlements = self.entitlements_of(&part.part_id).await?;
        self.run(part, &units, &entitlements)
    }

    /// Allocation for every part with demand, warnings or entitlements.
    pub async fn compliance_report(&self, filter: &InventoryFilter) -> Result<ComplianceReport> {
        let units = self.inventory.list_units(filter).await?;
        let parts: Vec<&LicensePart> = self.catalog.parts().collect();
        let entitlements =
            try_join_all(parts.iter().map(|p| self.entitlements_of(&p.part_id))).await?;

        let mut report = ComplianceReport {
            parts: Vec::new(),
            core_factor_version: self.core_factors.version().to_string(),
        };
        for (part, entitlements) in parts.into_iter().zip(entitlements) {
            let result = self.run(part, &units, &entitlements)?;
            if result.used_count.is_zero()
                && result.entitlements.is_empty()
                && result.warnings.is_empty()
            {
                continue;
            }
            report.parts.push(result);
        }
        tracing::info!(
            parts = report.parts.len(),
            non_compliant = report.non_compliant().count(),
            "compliance report computed"
        );
        Ok(report)
    }

    // ── Entitlements ─────────────────────────────────────────

    pub fn validate_entitlement(&self, entitlement: &Entitlement) -> Result<()> {
        validation::validate_entitlement(entitlement, &self.catalog)
    }

    /// Host existence, cluster eligibility and ambiguity checks. Caller holds
    /// the part lock.
    async fn check_bindings(&self, entitlement: &Entitlement) -> Result<()> {
        for hostname in &entitlement.hosts {
            self.associations.require_host(hostname).await?;
        }
        for hostname in &entitlement.hosts {
            self.associations
                .check_cluster_scope(entitlement, hostname)
                .await?;
        }
        self.associations
            .check_unambiguous(entitlement, entitlement.hosts.iter().map(String::as_str))
            .await
    }

    pub async fn create_entitlement(&self, entitlement: Entitlement) -> Result<Versioned<Entitlement>> {
        self.validate_entitlement(&entitlement)?;
        let _guard = self.associations.lock_part(&entitlement.part_id).await;
        self.check_bindings(&entitlement).await?;
        let version = self.registry.save_entitlement(&entitlement, None).await?;
        tracing::info!(
            entitlement_id = %entitlement.id,
            part_id = %entitlement.part_id,
            "entitlement created"
        );
        Ok(Versioned::new(entitlement, version))
    }

    /// Optimistic update: fails with `Conflict` unless the stored version is
    /// still `expected_version`.
    pub async fn update_entitlement(
        &self,
        entitlement: Entitlement,
        expected_version: i64,
    ) -> Result<Versioned<Entitlement>> {
        self.validate_entitlement(&entitlement)?;
        let _guard = self.associations.lock_part(&entitlement.part_id).await;
        if self.registry.get_entitlement(entitlement.id).await?.is_none() {
            return Err(ComplianceError::EntitlementNotFound(entitlement.id));
        }
        self.check_bindings(&entitlement).await?;
        let version = self
            .registry
            .save_entitlement(&entitlement, Some(expected_version))
            .await?;
        tracing::info!(
            entitlement_id = %entitlement.id,
            part_id = %entitlement.part_id,
            version,
            "entitlement updated"
        );
        Ok(Versioned::new(entitlement, version))
    }

    pub async fn delete_entitlement(&self, id: EntitlementId) -> Result<()> {
        let current = self.get_entitlement(id).await?;
        let _guard = self.associations.lock_part(&current.value.part_id).await;
        self.registry.delete_entitlement(id).await?;
        tracing::info!(entitlement_id = %id, "entitlement deleted");
        Ok(())
    }

    pub async fn get_entitlement(&self, id: EntitlementId) -> Result<Versioned<Entitlement>> {
        self.registry
            .get_entitlement(id)
            .await?
            .ok_or(ComplianceError::EntitlementNotFound(id))
    }

    /// Entitlements matching `filter`, each with its share of the current
    /// allocation over the whole inventory.
    pub async fn search_entitlements(&self, filter: &EntitlementFilter) -> Result<Vec<EntitlementView>> {
        let stored = self.registry.list_entitlements(None).await?;
        let units = self.inventory.list_units(&InventoryFilter::default()).await?;

        let mut by_part: BTreeMap<&str, Vec<Entitlement>> = BTreeMap::new();
        for v in &stored {
            by_part
                .entry(v.value.part_id.as_str())
                .or_default()
                .push(v.value.clone());
        }
        let mut results: BTreeMap<&str, AllocationResult> = BTreeMap::new();
        for (part_id, entitlements) in &by_part {
            if let Some(part) = self.catalog.get(part_id) {
                results.insert(*part_id, self.run(part, &units, entitlements)?);
            }
        }

        let views = stored
            .iter()
            .map(|v| {
                let part = self.catalog.get(&v.value.part_id);
                EntitlementView {
                    entitlement: v.value.clone(),
                    version: v.version,
                    item_description: part
                        .map(|p| p.item_description.clone())
                        .unwrap_or_default(),
                    metric: part.map(|p| p.metric),
                    allocation: results
                        .get(v.value.part_id.as_str())
                        .and_then(|r| r.entitlement(v.value.id))
                        .cloned(),
                }
            })
            .filter(|view| search::matches(filter, view))
            .collect();
        Ok(views)
    }

    // ── Associations ─────────────────────────────────────────

    pub async fn add_host_to_entitlement(&self, id: EntitlementId, hostname: &str) -> Result<()> {
        self.associations.add_host_to_entitlement(id, hostname).await
    }

    pub async fn remove_host_from_entitlement(&self, id: EntitlementId, hostname: &str) -> Result<()> {
        self.associations
            .remove_host_from_entitlement(id, hostname)
            .await
    }

    pub async fn remove_host_from_all_entitlements(&self, hostname: &str) -> Result<Vec<EntitlementId>> {
        self.associations
            .remove_host_from_all_entitlements(hostname)
            .await
    }
}
