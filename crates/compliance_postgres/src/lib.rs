//! Postgres implementations of the compliance_core port traits.
//!
//! Each adapter is a newtype wrapping PgPool. All SQL is runtime-checked
//! (sqlx::query, not sqlx::query!) to avoid a compile-time DB requirement.
//! Entities are stored as JSONB definitions next to the columns the queries
//! filter on.

use anyhow::anyhow;
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use compliance_core::error::ComplianceError;
use compliance_core::ports::{EntitlementRegistry, InventoryStore, Result};
use compliance_types::{
    Entitlement, EntitlementId, InventoryFilter, InventoryUnit, Versioned,
};

/// Open a pool and apply the bundled migrations.
pub async fn connect(url: &str, max_connections: u32) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(url)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!(max_connections, "license compliance schema ready");
    Ok(pool)
}

fn decode<T: serde::de::DeserializeOwned>(value: serde_json::Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| ComplianceError::Internal(anyhow!(e)))
}

fn encode<T: serde::Serialize>(value: &T) -> Result<serde_json::Value> {
    serde_json::to_value(value).map_err(|e| ComplianceError::Internal(anyhow!(e)))
}

// ── PgInventoryStore ──────────────────────────────────────────

pub struct PgInventoryStore {
    pool: PgPool,
}

impl PgInventoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert or replace a unit as reported by an agent.
    pub async fn upsert_unit(&self, unit: &InventoryUnit) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO license_compliance.inventory_units
                (kind, name, hostname, cluster, archived, definition)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (kind, name) DO UPDATE
               SET hostname = EXCLUDED.hostname,
                   cluster = EXCLUDED.cluster,
                   archived = EXCLUDED.archived,
                   definition = EXCLUDED.definition,
                   updated_at = now()
            "#,
        )
        .bind(unit.kind.as_str())
        .bind(unit.id().name)
        .bind(&unit.hostname)
        .bind(&unit.cluster)
        .bind(unit.archived)
        .bind(encode(unit)?)
        .execute(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(())
    }
}

#[async_trait]
impl InventoryStore for PgInventoryStore {
    async fn list_units(&self, filter: &InventoryFilter) -> Result<Vec<InventoryUnit>> {
        let rows = sqlx::query_as::<_, (serde_json::Value,)>(
            r#"
            SELECT definition
            FROM license_compliance.inventory_units
            WHERE $1 OR NOT archived
            ORDER BY kind, name
            "#,
        )
        .bind(filter.include_archived)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;

        let mut units = Vec::with_capacity(rows.len());
        for (definition,) in rows {
            let unit: InventoryUnit = decode(definition)?;
            if filter.matches(&unit) {
                units.push(unit);
            }
        }
        Ok(units)
    }

    async fn host_exists(&self, hostname: &str) -> Result<bool> {
        let (exists,) = sqlx::query_as::<_, (bool,)>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM license_compliance.inventory_units
                WHERE kind = 'host' AND name = $1 AND NOT archived
            )
            "#,
        )
        .bind(hostname)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(exists)
    }

    async fn host_cluster(&self, hostname: &str) -> Result<Option<String>> {
        let row = sqlx::query_as::<_, (Option<String>,)>(
            r#"
            SELECT cluster FROM license_compliance.inventory_units
            WHERE kind = 'host' AND name = $1 AND NOT archived
            "#,
        )
        .bind(hostname)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(row.and_then(|(cluster,)| cluster))
    }

    async fn cluster_members(&self, cluster: &str) -> Result<Vec<String>> {
        let rows = sqlx::query_as::<_, (String,)>(
            r#"
            SELECT name FROM license_compliance.inventory_units
            WHERE kind = 'host' AND cluster = $1 AND NOT archived
            ORDER BY name
            "#,
        )
        .bind(cluster)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(rows.into_iter().map(|(name,)| name).collect())
    }
}

// ── PgEntitlementRegistry ─────────────────────────────────────

pub struct PgEntitlementRegistry {
    pool: PgPool,
}

impl PgEntitlementRegistry {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn exists(&self, id: Uuid) -> Result<bool> {
        let (exists,) = sqlx::query_as::<_, (bool,)>(
            "SELECT EXISTS (SELECT 1 FROM license_compliance.entitlements WHERE entitlement_id = $1)",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(exists)
    }
}

#[async_trait]
impl EntitlementRegistry for PgEntitlementRegistry {
    async fn list_entitlements(
        &self,
        part_id: Option<&str>,
    ) -> Result<Vec<Versioned<Entitlement>>> {
        let rows = sqlx::query_as::<_, (serde_json::Value, i64)>(
            r#"
            SELECT definition, version
            FROM license_compliance.entitlements
            WHERE $1::text IS NULL OR part_id = $1
            ORDER BY entitlement_id
            "#,
        )
        .bind(part_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;

        rows.into_iter()
            .map(|(definition, version)| Ok(Versioned::new(decode(definition)?, version)))
            .collect()
    }

    async fn get_entitlement(&self, id: EntitlementId) -> Result<Option<Versioned<Entitlement>>> {
        let row = sqlx::query_as::<_, (serde_json::Value, i64)>(
            r#"
            SELECT definition, version
            FROM license_compliance.entitlements
            WHERE entitlement_id = $1
            "#,
        )
        .bind(id.inner())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;

        row.map(|(definition, version)| Ok(Versioned::new(decode(definition)?, version)))
            .transpose()
    }

    async fn save_entitlement(
        &self,
        entitlement: &Entitlement,
        expected_version: Option<i64>,
    ) -> Result<i64> {
        let definition = encode(entitlement)?;
        let id = entitlement.id.inner();

        match expected_version {
            None => {
                let result = sqlx::query(
                    r#"
                    INSERT INTO license_compliance.entitlements
                        (entitlement_id, part_id, version, definition)
                    VALUES ($1, $2, 1, $3)
                    ON CONFLICT (entitlement_id) DO NOTHING
                    "#,
                )
                .bind(id)
                .bind(&entitlement.part_id)
                .bind(&definition)
                .execute(&self.pool)
                .await
                .map_err(|e| anyhow!(e))?;

                if result.rows_affected() == 0 {
                    return Err(ComplianceError::Conflict {
                        id: entitlement.id,
                        expected: 0,
                    });
                }
                Ok(1)
            }
            Some(expected) => {
                let row = sqlx::query_as::<_, (i64,)>(
                    r#"
                    UPDATE license_compliance.entitlements
                       SET part_id = $2,
                           definition = $3,
                           version = version + 1,
                           updated_at = now()
                     WHERE entitlement_id = $1
                       AND version = $4
                    RETURNING version
                    "#,
                )
                .bind(id)
                .bind(&entitlement.part_id)
                .bind(&definition)
                .bind(expected)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| anyhow!(e))?;

                match row {
                    Some((version,)) => Ok(version),
                    None if self.exists(id).await? => Err(ComplianceError::Conflict {
                        id: entitlement.id,
                        expected,
                    }),
                    None => Err(ComplianceError::EntitlementNotFound(entitlement.id)),
                }
            }
        }
    }

    async fn delete_entitlement(&self, id: EntitlementId) -> Result<()> {
        let result = sqlx::query("DELETE FROM license_compliance.entitlements WHERE entitlement_id = $1")
            .bind(id.inner())
            .execute(&self.pool)
            .await
            .map_err(|e| anyhow!(e))?;
        if result.rows_affected() == 0 {
            return Err(ComplianceError::EntitlementNotFound(id));
        }
        Ok(())
    }
}
