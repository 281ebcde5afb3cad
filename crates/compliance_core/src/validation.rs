//! Structural entitlement checks that need only the catalog.
//!
//! Checks that need the stores (hosts exist, no ambiguous binding) live in
//! the service, which runs them after these.

use std::sync::LazyLock;

use compliance_types::Entitlement;
use regex::Regex;
use rust_decimal::Decimal;

use crate::catalog::LicenseCatalog;
use crate::error::ComplianceError;
use crate::ports::Result;

pub const MAX_REFERENCE_LEN: usize = 16;
pub const MAX_HOSTNAME_LEN: usize = 253;

static HOSTNAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(([a-zA-Z0-9]|[a-zA-Z0-9][a-zA-Z0-9\-_]*[a-zA-Z0-9])\.)*([A-Za-z0-9]|[A-Za-z0-9][A-Za-z0-9\-_]*[A-Za-z0-9])$",
    )
    .expect("hostname pattern is valid")
});

fn invalid(msg: impl Into<String>) -> ComplianceError {
    ComplianceError::InvalidEntitlement(msg.into())
}

pub fn is_valid_hostname(hostname: &str) -> bool {
    !hostname.is_empty() && hostname.len() <= MAX_HOSTNAME_LEN && HOSTNAME_RE.is_match(hostname)
}

fn check_reference(field: &str, value: &str, required: bool) -> Result<()> {
    let len = value.chars().count();
    if required && len == 0 {
        return Err(invalid(format!("{field} is required")));
    }
    if len > MAX_REFERENCE_LEN {
        return Err(invalid(format!(
            "{field} exceeds {MAX_REFERENCE_LEN} characters"
        )));
    }
    Ok(())
}

/// Validate an entitlement before it is created or updated.
pub fn validate_entitlement(entitlement: &Entitlement, catalog: &LicenseCatalog) -> Result<()> {
    if catalog.get(&entitlement.part_id).is_none() {
        return Err(match catalog.resolve(&entitlement.part_id) {
            Some(part) => invalid(format!(
                "'{}' is an alias; use part id '{}'",
                entitlement.part_id, part.part_id
            )),
            None => invalid(format!("unknown part '{}'", entitlement.part_id)),
        });
    }

    check_reference("agreement_id", &entitlement.agreement_id, true)?;
    check_reference("csi", &entitlement.csi, false)?;
    check_reference("reference_number", &entitlement.reference_number, false)?;

    if !entitlement.unlimited && entitlement.count < Decimal::ZERO {
        return Err(invalid(format!(
            "count must not be negative, got {}",
            entitlement.count
        )));
    }

    if entitlement.catch_all && !entitlement.hosts.is_empty() {
        return Err(invalid("catch-all entitlements cannot list hosts"));
    }

    if let Some(bad) = entitlement.hosts.iter().find(|h| !is_valid_hostname(h)) {
        return Err(invalid(format!("invalid hostname '{bad}'")));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use compliance_types::{LicensePart, Metric, Vendor};

    use super::*;

    fn catalog() -> LicenseCatalog {
        LicenseCatalog::new(
            "test",
            vec![LicensePart {
                part_id: "A90611".into(),
                item_description: "Enterprise Edition".into(),
                metric: Metric::Processor,
                vendor: Vendor::Oracle,
                aliases: vec!["Oracle ENT".into()],
            }],
        )
        .unwrap()
    }

    fn valid() -> Entitlement {
        Entitlement::new("AG-1", "A90611", Decimal::from(10)).with_hosts(["db01.example.com"])
    }

    fn message(result: Result<()>) -> String {
        match result {
            Err(ComplianceError::InvalidEntitlement(msg)) => msg,
            other => panic!("expected InvalidEntitlement, got {other:?}"),
        }
    }

    #[test]
    fn accepts_well_formed_entitlement() {
        validate_entitlement(&valid(), &catalog()).unwrap();
    }

    #[test]
    fn alias_part_suggests_canonical_id() {
        let mut e = valid();
        e.part_id = "Oracle ENT".into();
        assert!(message(validate_entitlement(&e, &catalog())).contains("A90611"));
    }

    #[test]
    fn unknown_part_rejected() {
        let mut e = valid();
        e.part_id = "B00000".into();
        assert!(message(validate_entitlement(&e, &catalog())).contains("unknown part"));
    }

    #[test]
    fn catch_all_with_hosts_rejected() {
        let e = valid().as_catch_all();
        assert!(message(validate_entitlement(&e, &catalog())).contains("catch-all"));
    }

    #[test]
    fn negative_count_rejected_unless_unlimited() {
        let mut e = valid();
        e.count = Decimal::from(-1);
        assert!(validate_entitlement(&e, &catalog()).is_err());
        validate_entitlement(&e.as_unlimited(), &catalog()).unwrap();
    }

    #[test]
    fn unlimited_with_hosts_allowed() {
        validate_entitlement(&valid().as_unlimited(), &catalog()).unwrap();
    }

    #[test]
    fn reference_lengths() {
        let mut e = valid();
        e.agreement_id = String::new();
        assert!(message(validate_entitlement(&e, &catalog())).contains("agreement_id"));

        let mut e = valid();
        e.csi = "x".repeat(17);
        assert!(message(validate_entitlement(&e, &catalog())).contains("csi"));
    }

    #[test]
    fn hostname_pattern() {
        assert!(is_valid_hostname("db01"));
        assert!(is_valid_hostname("db_01.corp-net.example"));
        assert!(!is_valid_hostname("-db01"));
        assert!(!is_valid_hostname("db01."));
        assert!(!is_valid_hostname("db 01"));
        assert!(!is_valid_hostname(&"a".repeat(254)));

        let e = valid().with_hosts(["bad host"]);
        assert!(message(validate_entitlement(&e, &catalog())).contains("bad host"));
    }
}
