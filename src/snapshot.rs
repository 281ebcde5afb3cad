//! Offline snapshots: parts, inventory and entitlements in one YAML or JSON
//! file, loaded into the in-memory stores.

use std::path::Path;

use anyhow::{Context, Result};
use compliance_types::{Entitlement, InventoryUnit, LicensePart};
use serde::{Deserialize, Serialize};

use crate::memory::{InMemoryEntitlementRegistry, InMemoryInventory};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    /// Replaces the configured catalog when non-empty.
    pub parts: Vec<LicensePart>,
    pub inventory: Vec<InventoryUnit>,
    pub entitlements: Vec<Entitlement>,
}

impl Snapshot {
    /// `.json` files parse as JSON, anything else as YAML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let snapshot: Snapshot = if is_json {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse snapshot {}", path.display()))?
        } else {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse snapshot {}", path.display()))?
        };
        tracing::info!(
            path = %path.display(),
            units = snapshot.inventory.len(),
            entitlements = snapshot.entitlements.len(),
            "loaded snapshot"
        );
        Ok(snapshot)
    }

    pub fn into_stores(self) -> (InMemoryInventory, InMemoryEntitlementRegistry) {
        (
            InMemoryInventory::new(self.inventory),
            InMemoryEntitlementRegistry::seeded(self.entitlements),
        )
    }
}
