//! Processor core factors and the rounding applied to processor licenses.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Processor-model → core-factor lookup.
pub trait CoreFactorTable: Send + Sync {
    fn version(&self) -> &str;

    /// Factor for a known model, `None` when the model is not in the table.
    fn core_factor(&self, model: &str) -> Option<Decimal>;

    /// Factor applied to unknown or unreported models.
    fn default_factor(&self) -> Option<Decimal>;

    fn factor_for(&self, model: Option<&str>) -> Option<Decimal> {
        model
            .and_then(|m| self.core_factor(m))
            .or_else(|| self.default_factor())
    }
}

/// Table loaded from configuration.
///
/// Keys match case-insensitively, either exactly or as a substring of the
/// reported model string (agents report e.g. `Intel(R) Xeon(R) Gold 6248`).
/// The longest matching key wins.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticCoreFactorTable {
    pub version: String,
    pub default: Option<Decimal>,
    pub factors: BTreeMap<String, Decimal>,
}

impl StaticCoreFactorTable {
    pub fn new(version: impl Into<String>, default: Option<Decimal>) -> Self {
        Self {
            version: version.into(),
            default,
            factors: BTreeMap::new(),
        }
    }

    pub fn with_factor(mut self, model: impl Into<String>, factor: Decimal) -> Self {
        self.factors.insert(model.into(), factor);
        self
    }
}

impl CoreFactorTable for StaticCoreFactorTable {
    fn version(&self) -> &str {
        &self.version
    }

    fn core_factor(&self, model: &str) -> Option<Decimal> {
        let model = model.to_ascii_lowercase();
        self.factors
            .iter()
            .filter(|(key, _)| {
                let key = key.to_ascii_lowercase();
                !key.is_empty() && model.contains(&key)
            })
            .max_by_key(|(key, _)| key.len())
            .map(|(_, factor)| *factor)
    }

    fn default_factor(&self) -> Option<Decimal> {
        self.default
    }
}

/// Rounding applied to `cores × factor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundingRule {
    /// Up to the next multiple of 0.5.
    #[default]
    UpToHalf,
    /// Up to the next whole license.
    UpToWhole,
    Exact,
}

impl RoundingRule {
    pub fn apply(&self, value: Decimal) -> Decimal {
        match self {
            Self::UpToHalf => (value * Decimal::TWO).ceil() / Decimal::TWO,
            Self::UpToWhole => value.ceil(),
            Self::Exact => value,
        }
    }
}
