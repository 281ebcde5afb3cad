//! License part catalog. Injected, versioned data resolved by part id or alias.

use std::collections::{BTreeMap, HashMap};

use anyhow::anyhow;
use compliance_types::LicensePart;

use crate::error::ComplianceError;

#[derive(Debug, Clone, Default)]
pub struct LicenseCatalog {
    version: String,
    parts: BTreeMap<String, LicensePart>,
    aliases: HashMap<String, String>,
}

impl LicenseCatalog {
    /// Build a catalog. Part ids must be unique and no alias may shadow
    /// another part's id or alias.
    pub fn new(
        version: impl Into<String>,
        parts: impl IntoIterator<Item = LicensePart>,
    ) -> Result<Self, ComplianceError> {
        let mut by_id = BTreeMap::new();
        for part in parts {
            if by_id.contains_key(&part.part_id) {
                return Err(anyhow!("duplicate part id '{}' in catalog", part.part_id).into());
            }
            by_id.insert(part.part_id.clone(), part);
        }

        let mut aliases = HashMap::new();
        for part in by_id.values() {
            for alias in &part.aliases {
                if alias == &part.part_id {
                    continue;
                }
                if by_id.contains_key(alias) {
                    return Err(anyhow!(
                        "alias '{}' of part '{}' shadows another part id",
                        alias,
                        part.part_id
                    )
                    .into());
                }
                if let Some(previous) = aliases.insert(alias.clone(), part.part_id.clone()) {
                    return Err(anyhow!(
                        "alias '{}' claimed by both '{}' and '{}'",
                        alias,
                        previous,
                        part.part_id
                    )
                    .into());
                }
            }
        }

        Ok(Self {
            version: version.into(),
            parts: by_id,
            aliases,
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Look up by canonical part id only.
    pub fn get(&self, part_id: &str) -> Option<&LicensePart> {
        self.parts.get(part_id)
    }

    /// Look up by part id or alias.
    pub fn resolve(&self, name: &str) -> Option<&LicensePart> {
        self.parts
            .get(name)
            .or_else(|| self.aliases.get(name).and_then(|id| self.parts.get(id)))
    }

    pub fn require(&self, part_id: &str) -> Result<&LicensePart, ComplianceError> {
        self.get(part_id)
            .ok_or_else(|| ComplianceError::PartNotFound(part_id.to_string()))
    }

    /// Parts in part-id order.
    pub fn parts(&self) -> impl Iterator<Item = &LicensePart> {
        self.parts.values()
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use compliance_types::{Metric, Vendor};

    use super::*;

    fn part(id: &str, aliases: &[&str]) -> LicensePart {
        LicensePart {
            part_id: id.into(),
            item_description: format!("part {id}"),
            metric: Metric::Processor,
            vendor: Vendor::Oracle,
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
        }
    }

    #[test]
    fn resolves_ids_and_aliases() {
        let catalog = LicenseCatalog::new(
            "2024.1",
            vec![part("A90611", &["Oracle ENT"]), part("A90610", &[])],
        )
        .unwrap();
        assert_eq!(catalog.resolve("Oracle ENT").unwrap().part_id, "A90611");
        assert_eq!(catalog.resolve("A90610").unwrap().part_id, "A90610");
        assert!(catalog.get("Oracle ENT").is_none());
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.version(), "2024.1");
    }

    #[test]
    fn rejects_duplicate_ids() {
        let err = LicenseCatalog::new("v", vec![part("A1", &[]), part("A1", &[])]).unwrap_err();
        assert!(err.to_string().contains("duplicate part id"));
    }

    #[test]
    fn rejects_alias_shadowing_part() {
        let err =
            LicenseCatalog::new("v", vec![part("A1", &["A2"]), part("A2", &[])]).unwrap_err();
        assert!(err.to_string().contains("shadows"));
    }

    #[test]
    fn require_reports_part_not_found() {
        let catalog = LicenseCatalog::new("v", vec![part("A1", &[])]).unwrap();
        assert!(matches!(
            catalog.require("nope"),
            Err(ComplianceError::PartNotFound(_))
        ));
    }
}
