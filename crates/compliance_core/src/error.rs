use compliance_types::{EntitlementId, InventoryUnitId, Metric};
use thiserror::Error;

/// Coarse error classes callers map to transport status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Validation,
    DataQuality,
    Conflict,
    Internal,
}

#[derive(Debug, Error)]
pub enum ComplianceError {
    #[error("entitlement not found: {0}")]
    EntitlementNotFound(EntitlementId),

    #[error("host not found: {0}")]
    HostNotFound(String),

    #[error("license part not found: {0}")]
    PartNotFound(String),

    #[error("host {hostname} is not in a cluster eligible for part {part_id}")]
    NotInClusterHostNotFound { hostname: String, part_id: String },

    #[error("host {hostname} is already bound to entitlement {existing} for part {part_id}")]
    AmbiguousBinding {
        hostname: String,
        part_id: String,
        existing: EntitlementId,
    },

    #[error("invalid entitlement: {0}")]
    InvalidEntitlement(String),

    #[error("no demand calculator registered for metric {0}")]
    UnsupportedMetric(Metric),

    #[error("missing {measurement} for {unit}")]
    MissingInventoryData {
        unit: InventoryUnitId,
        measurement: &'static str,
    },

    #[error("conflict: entitlement {id} changed since version {expected}")]
    Conflict { id: EntitlementId, expected: i64 },

    #[error("internal: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ComplianceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EntitlementNotFound(_) | Self::HostNotFound(_) | Self::PartNotFound(_) => {
                ErrorKind::NotFound
            }
            Self::NotInClusterHostNotFound { .. }
            | Self::AmbiguousBinding { .. }
            | Self::InvalidEntitlement(_)
            | Self::UnsupportedMetric(_) => ErrorKind::Validation,
            Self::MissingInventoryData { .. } => ErrorKind::DataQuality,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidEntitlement(_) => 400,
            _ => match self.kind() {
                ErrorKind::NotFound => 404,
                ErrorKind::Validation | ErrorKind::DataQuality => 422,
                ErrorKind::Conflict => 409,
                ErrorKind::Internal => 500,
            },
        }
    }

    /// Lost an optimistic-lock race; the caller may reload and retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}
