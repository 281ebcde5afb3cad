//! License part catalog entries.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How demand for a part is measured.
///
/// Deserializes case-insensitively from either the snake_case name or the
/// vendor catalog label (see [`FromStr`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum Metric {
    /// Physical cores times core factor, per host.
    Processor,
    /// Reported named users, per database.
    NamedUser,
    /// Aggregate cluster capacity, once per cluster.
    ClusterPooled,
    /// One unit per host.
    Host,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processor => "processor",
            Self::NamedUser => "named_user",
            Self::ClusterPooled => "cluster_pooled",
            Self::Host => "host",
        }
    }

    /// Cluster-scoped parts bind through cluster membership.
    pub fn is_cluster_scoped(&self) -> bool {
        matches!(self, Self::ClusterPooled)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownMetric(pub String);

impl fmt::Display for UnknownMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown metric '{}'", self.0)
    }
}

impl std::error::Error for UnknownMetric {}

impl FromStr for Metric {
    type Err = UnknownMetric;

    /// Accepts both the snake_case names and the vendor catalog labels,
    /// case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "processor" | "processor perpetual" => Ok(Self::Processor),
            "named_user" | "named user plus perpetual" => Ok(Self::NamedUser),
            "cluster_pooled" | "cluster" | "cluster perpetual" => Ok(Self::ClusterPooled),
            "host" | "computer perpetual" => Ok(Self::Host),
            _ => Err(UnknownMetric(s.to_string())),
        }
    }
}

impl TryFrom<String> for Metric {
    type Error = UnknownMetric;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Vendor family a part belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Vendor {
    #[default]
    Oracle,
    MicrosoftSqlServer,
    MySql,
}

/// A purchasable license unit. Immutable once loaded into the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LicensePart {
    pub part_id: String,
    pub item_description: String,
    pub metric: Metric,
    #[serde(default)]
    pub vendor: Vendor,
    /// Other license names that count as this part.
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl LicensePart {
    /// True when `name` is the part id or one of its aliases.
    pub fn matches(&self, name: &str) -> bool {
        self.part_id == name || self.aliases.iter().any(|a| a == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_parses_catalog_labels() {
        assert_eq!(
            "Processor Perpetual".parse::<Metric>().unwrap(),
            Metric::Processor
        );
        assert_eq!(
            "named user plus perpetual".parse::<Metric>().unwrap(),
            Metric::NamedUser
        );
        assert_eq!(
            "Computer Perpetual".parse::<Metric>().unwrap(),
            Metric::Host
        );
        assert_eq!("cluster".parse::<Metric>().unwrap(), Metric::ClusterPooled);
        assert!("per socket".parse::<Metric>().is_err());
    }

    #[test]
    fn metric_deserializes_vendor_label() {
        let m: Metric = serde_json::from_str("\"Named User Plus Perpetual\"").unwrap();
        assert_eq!(m, Metric::NamedUser);
        assert_eq!(serde_json::to_string(&m).unwrap(), "\"named_user\"");

        let m: Metric = serde_json::from_str("\"PROCESSOR\"").unwrap();
        assert_eq!(m, Metric::Processor);
        assert!(serde_json::from_str::<Metric>("\"per socket\"").is_err());
    }

    #[test]
    fn part_matches_aliases() {
        let part = LicensePart {
            part_id: "A90611".into(),
            item_description: "Oracle Database Enterprise Edition".into(),
            metric: Metric::Processor,
            vendor: Vendor::Oracle,
            aliases: vec!["Oracle EE".into()],
        };
        assert!(part.matches("A90611"));
        assert!(part.matches("Oracle EE"));
        assert!(!part.matches("Oracle SE"));
    }
}
