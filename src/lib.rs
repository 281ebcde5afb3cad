//! License compliance
//!
//! Reconciles discovered database usage against purchased entitlements and
//! reports, per license part, what is used, what is available and whether
//! the estate is compliant.
//!
//! ## Layout
//! - `compliance_types`: serde value types
//! - `compliance_core`: allocation engine, usage calculator, association
//!   manager, service façade (no I/O)
//! - `compliance_postgres`: sqlx adapters (feature `database`)
//! - this crate: configuration, tracing setup, in-memory stores, snapshots
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use license_compliance::{build_service, config::AppConfig, snapshot::Snapshot};
//! use compliance_types::InventoryFilter;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = AppConfig::from_env()?;
//! let (inventory, registry) = Snapshot::load("estate.yaml")?.into_stores();
//! let service = build_service(&config, inventory, registry)?;
//! let report = service.compliance_report(&InventoryFilter::default()).await?;
//! println!("{} non-compliant parts", report.non_compliant().count());
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use compliance_core::ports::{EntitlementRegistry, InventoryStore};
use compliance_core::ComplianceService;

pub mod config;
pub mod memory;
pub mod snapshot;
pub mod telemetry;

pub use compliance_core;
pub use compliance_types;

use crate::config::AppConfig;

/// Wire a service over the given stores using the configured catalog, core
/// factors and usage policy.
pub fn build_service(
    config: &AppConfig,
    inventory: impl InventoryStore + 'static,
    registry: impl EntitlementRegistry + 'static,
) -> anyhow::Result<ComplianceService> {
    Ok(ComplianceService::new(
        Arc::new(inventory),
        Arc::new(registry),
        Arc::new(config.catalog()?),
        Arc::new(config.core_factors.clone()),
        config.usage,
    ))
}

/// Service over PostgreSQL. Requires `database.url`.
#[cfg(feature = "database")]
pub async fn postgres_service(config: &AppConfig) -> anyhow::Result<ComplianceService> {
    use anyhow::Context;
    use compliance_postgres::{connect, PgEntitlementRegistry, PgInventoryStore};

    let url = config
        .database
        .url
        .as_deref()
        .with_context(|| format!("{} must be set", config::DATABASE_URL_ENV))?;
    let pool: sqlx::PgPool = connect(url, config.database.max_connections).await?;
    build_service(
        config,
        PgInventoryStore::new(pool.clone()),
        PgEntitlementRegistry::new(pool),
    )
}
