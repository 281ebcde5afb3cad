//! Discovered inventory: hosts, clusters and databases as reported by agents.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    Host,
    Cluster,
    Database,
}

impl UnitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Host => "host",
            Self::Cluster => "cluster",
            Self::Database => "database",
        }
    }
}

/// Identity of an inventory unit. Databases are qualified by their host
/// (`host/db`) since database names repeat across hosts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InventoryUnitId {
    pub kind: UnitKind,
    pub name: String,
}

impl InventoryUnitId {
    pub fn host(name: impl Into<String>) -> Self {
        Self {
            kind: UnitKind::Host,
            name: name.into(),
        }
    }

    pub fn cluster(name: impl Into<String>) -> Self {
        Self {
            kind: UnitKind::Cluster,
            name: name.into(),
        }
    }

    pub fn database(hostname: &str, name: &str) -> Self {
        Self {
            kind: UnitKind::Database,
            name: format!("{hostname}/{name}"),
        }
    }
}

impl fmt::Display for InventoryUnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.name)
    }
}

/// A host, cluster or database with the footprint needed to compute demand.
///
/// Measurements are optional because agents do not always report them; the
/// usage calculator turns an absent measurement into a data-quality warning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryUnit {
    pub kind: UnitKind,
    pub name: String,
    /// Owning host for databases; the host itself for hosts.
    #[serde(default)]
    pub hostname: Option<String>,
    /// Cluster the host runs on (hosts only).
    #[serde(default)]
    pub cluster: Option<String>,
    #[serde(default)]
    pub processor_model: Option<String>,
    #[serde(default)]
    pub cpu_cores: Option<u32>,
    #[serde(default)]
    pub cpu_threads: Option<u32>,
    #[serde(default)]
    pub cpu_sockets: Option<u32>,
    #[serde(default)]
    pub user_count: Option<u32>,
    /// Part ids or aliases of the products/editions/options in use.
    #[serde(default)]
    pub licenses_in_use: Vec<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub environment: Option<String>,
    #[serde(default)]
    pub archived: bool,
}

impl InventoryUnit {
    pub fn host(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            kind: UnitKind::Host,
            hostname: Some(name.clone()),
            name,
            cluster: None,
            processor_model: None,
            cpu_cores: None,
            cpu_threads: None,
            cpu_sockets: None,
            user_count: None,
            licenses_in_use: Vec::new(),
            location: None,
            environment: None,
            archived: false,
        }
    }

    pub fn cluster(name: impl Into<String>) -> Self {
        Self {
            kind: UnitKind::Cluster,
            hostname: None,
            ..Self::host(name)
        }
    }

    pub fn database(hostname: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: UnitKind::Database,
            hostname: Some(hostname.into()),
            ..Self::host(name)
        }
    }

    pub fn with_cores(mut self, cores: u32) -> Self {
        self.cpu_cores = Some(cores);
        self
    }

    pub fn with_processor(mut self, model: impl Into<String>) -> Self {
        self.processor_model = Some(model.into());
        self
    }

    pub fn with_users(mut self, users: u32) -> Self {
        self.user_count = Some(users);
        self
    }

    pub fn in_cluster(mut self, cluster: impl Into<String>) -> Self {
        self.cluster = Some(cluster.into());
        self
    }

    pub fn using<I, S>(mut self, licenses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.licenses_in_use = licenses.into_iter().map(Into::into).collect();
        self
    }

    pub fn id(&self) -> InventoryUnitId {
        match self.kind {
            UnitKind::Host => InventoryUnitId::host(&self.name),
            UnitKind::Cluster => InventoryUnitId::cluster(&self.name),
            UnitKind::Database => {
                InventoryUnitId::database(self.hostname.as_deref().unwrap_or(""), &self.name)
            }
        }
    }

    /// Host this unit runs on, if any.
    pub fn host_name(&self) -> Option<&str> {
        match self.kind {
            UnitKind::Host => Some(self.name.as_str()),
            UnitKind::Database => self.hostname.as_deref(),
            UnitKind::Cluster => None,
        }
    }

    pub fn uses(&self, name: &str) -> bool {
        self.licenses_in_use.iter().any(|l| l == name)
    }
}

/// Selects the inventory a run is computed over.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InventoryFilter {
    pub location: Option<String>,
    pub environment: Option<String>,
    pub include_archived: bool,
}

impl InventoryFilter {
    pub fn matches(&self, unit: &InventoryUnit) -> bool {
        if unit.archived && !self.include_archived {
            return false;
        }
        // Clusters carry no location of their own; they follow their members.
        if unit.kind == UnitKind::Cluster {
            return true;
        }
        let field_matches = |wanted: &Option<String>, actual: &Option<String>| match wanted {
            None => true,
            Some(w) => actual.as_deref() == Some(w.as_str()),
        };
        field_matches(&self.location, &unit.location)
            && field_matches(&self.environment, &unit.environment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_ids_are_host_qualified() {
        let db = InventoryUnit::database("db01", "ORCL");
        assert_eq!(db.id().to_string(), "database:db01/ORCL");
        assert_eq!(db.host_name(), Some("db01"));
    }

    #[test]
    fn unit_ids_order_by_kind_then_name() {
        let mut ids = vec![
            InventoryUnitId::database("a", "x"),
            InventoryUnitId::cluster("c1"),
            InventoryUnitId::host("b"),
            InventoryUnitId::host("a"),
        ];
        ids.sort();
        let rendered: Vec<String> = ids.iter().map(ToString::to_string).collect();
        assert_eq!(
            rendered,
            vec!["host:a", "host:b", "cluster:c1", "database:a/x"]
        );
    }

    #[test]
    fn filter_excludes_archived_and_other_locations() {
        let mut host = InventoryUnit::host("db01");
        host.location = Some("Italy".into());
        let filter = InventoryFilter {
            location: Some("Italy".into()),
            ..Default::default()
        };
        assert!(filter.matches(&host));

        host.archived = true;
        assert!(!filter.matches(&host));

        host.archived = false;
        host.location = Some("Germany".into());
        assert!(!filter.matches(&host));
    }
}
