use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Protocol template: giving the trigger medicine makes the follow-up
/// medicine administrable after `delay_minutes`, for `follow_duration_hours`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicationLink {
    pub id: Uuid,
    pub trigger_medicine_id: Uuid,
    pub follow_medicine_id: Uuid,
    pub delay_minutes: u32,
    pub follow_frequency: String,
    pub follow_duration_hours: u32,
    pub default_dose_override: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Administrator input for creating or replacing a link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicationLinkInput {
    pub trigger_medicine_id: Uuid,
    pub follow_medicine_id: Uuid,
    pub delay_minutes: i64,
    pub follow_frequency: String,
    pub follow_duration_hours: i64,
    pub default_dose_override: Option<String>,
}
