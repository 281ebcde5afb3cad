//! Purchased entitlements (Oracle agreements, MySQL contracts, SQL Server
//! license-type rows) and the versioned envelope the registry hands out.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for an entitlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntitlementId(pub Uuid);

impl EntitlementId {
    /// Create a new random entitlement id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub fn inner(&self) -> Uuid {
        self.0
    }
}

impl Default for EntitlementId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for EntitlementId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for EntitlementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for EntitlementId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// A purchased grant for exactly one license part.
///
/// `count` is ignored when `unlimited` is set. A catch-all entitlement never
/// carries explicit hosts; the validator rejects that combination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entitlement {
    #[serde(default)]
    pub id: EntitlementId,
    pub agreement_id: String,
    pub part_id: String,
    #[serde(default)]
    pub csi: String,
    #[serde(default)]
    pub reference_number: String,
    #[serde(default)]
    pub count: Decimal,
    #[serde(default)]
    pub unlimited: bool,
    #[serde(default)]
    pub catch_all: bool,
    /// Explicit hosts bind host and database demand only, never the
    /// cluster those hosts belong to.
    #[serde(default)]
    pub restricted: bool,
    #[serde(default)]
    pub hosts: BTreeSet<String>,
    #[serde(default)]
    pub support_expiration: Option<NaiveDate>,
}

impl Entitlement {
    pub fn new(agreement_id: impl Into<String>, part_id: impl Into<String>, count: Decimal) -> Self {
        Self {
            id: EntitlementId::new(),
            agreement_id: agreement_id.into(),
            part_id: part_id.into(),
            csi: String::new(),
            reference_number: String::new(),
            count,
            unlimited: false,
            catch_all: false,
            restricted: false,
            hosts: BTreeSet::new(),
            support_expiration: None,
        }
    }

    pub fn with_hosts<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hosts = hosts.into_iter().map(Into::into).collect();
        self
    }

    pub fn as_catch_all(mut self) -> Self {
        self.catch_all = true;
        self
    }

    pub fn as_unlimited(mut self) -> Self {
        self.unlimited = true;
        self
    }

    pub fn as_restricted(mut self) -> Self {
        self.restricted = true;
        self
    }

    /// Participates in explicit host binding (neither catch-all nor unlimited).
    pub fn binds_explicitly(&self) -> bool {
        !self.catch_all && !self.unlimited
    }

    /// Quantity that counts towards the purchased pool.
    pub fn purchased(&self) -> Decimal {
        if self.unlimited {
            Decimal::ZERO
        } else {
            self.count
        }
    }
}

/// A stored value together with its optimistic-concurrency version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Versioned<T> {
    pub value: T,
    pub version: i64,
}

impl<T> Versioned<T> {
    pub fn new(value: T, version: i64) -> Self {
        Self { value, version }
    }
}

/// Search filter over entitlements. Text fields match case-insensitive
/// substrings; empty strings match everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EntitlementFilter {
    pub agreement_id: String,
    pub part_id: String,
    pub item_description: String,
    pub csi: String,
    pub reference_number: String,
    pub metric: Option<crate::Metric>,
    pub unlimited: Option<bool>,
    pub catch_all: Option<bool>,
    pub available_count_gte: Option<Decimal>,
    pub available_count_lte: Option<Decimal>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn purchased_ignores_count_when_unlimited() {
        let e = Entitlement::new("AG-1", "A90611", Decimal::from(40)).as_unlimited();
        assert_eq!(e.purchased(), Decimal::ZERO);
        assert!(!e.binds_explicitly());
    }

    #[test]
    fn deserialize_defaults_missing_flags() {
        let json = r#"{"agreement_id":"AG-1","part_id":"A90611","count":"10","hosts":["db01"]}"#;
        let e: Entitlement = serde_json::from_str(json).unwrap();
        assert_eq!(e.count, Decimal::from(10));
        assert!(!e.catch_all && !e.unlimited && !e.restricted);
        assert!(e.hosts.contains("db01"));
    }

    #[test]
    fn entitlement_id_round_trips_through_str() {
        let id = EntitlementId::new();
        let parsed: EntitlementId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }
}
