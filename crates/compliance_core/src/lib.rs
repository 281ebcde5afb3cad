//! License compliance core
//!
//! Pure domain logic. No database driver: storage sits behind the port
//! traits in [`ports`], implemented by `compliance_postgres` and by the
//! in-memory stores in the root crate.
//!
//! # Data flow
//!
//! ```text
//! InventoryStore ──► usage (DemandSet) ──► allocation ◄── EntitlementRegistry
//!                                              │
//!                                              ▼
//!                                      AllocationResult
//! ```
//!
//! The association manager mutates entitlement host lists; the next
//! allocation sees the change. Nothing is cached between runs.

pub mod allocation;
pub mod association;
pub mod catalog;
pub mod core_factor;
pub mod error;
pub mod ports;
pub mod search;
pub mod service;
pub mod usage;
pub mod validation;

pub use catalog::LicenseCatalog;
pub use core_factor::{CoreFactorTable, RoundingRule, StaticCoreFactorTable};
pub use error::{ComplianceError, ErrorKind};
pub use ports::{EntitlementRegistry, InventoryStore, Result};
pub use service::ComplianceService;
pub use usage::{CalculatorRegistry, Demand, DemandSet, UsagePolicy};
