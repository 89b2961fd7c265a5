use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::AdministrationStatus;

/// Append-only dosing event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Administration {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub medicine_id: Uuid,
    pub prescription_id: Option<Uuid>,
    pub status: AdministrationStatus,
    pub administered_by: String,
    pub administered_at: DateTime<Utc>,
    pub message: Option<String>,
}

/// A caller's attempt to record a dose.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdministrationRequest {
    pub patient_id: Uuid,
    pub medicine_id: Uuid,
    pub prescription_id: Option<Uuid>,
    pub status: AdministrationStatus,
    #[serde(default)]
    pub message: Option<String>,
}
