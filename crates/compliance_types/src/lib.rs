//! Shared value types for license compliance.
//!
//! Everything that crosses a boundary (store ports, CLI output, the HTTP
//! collaborator) lives here. The types are plain data: no I/O, no async.
//!
//! ## Rules
//!
//! 1. License quantities are `rust_decimal::Decimal`, never floats
//! 2. Entitlement ids are UUID newtypes
//! 3. Deficits stay negative; nothing in this crate clamps a count

pub mod allocation;
pub mod entitlement;
pub mod inventory;
pub mod part;

pub use allocation::*;
pub use entitlement::*;
pub use inventory::*;
pub use part::*;
