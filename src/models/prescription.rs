use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Whether a prescription may currently be administered.
///
/// Follow-up prescriptions are written `Inactive` and become `Active`
/// only when their protocol is activated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PrescriptionSchedule {
    Inactive,
    Active {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

impl PrescriptionSchedule {
    /// Rebuild from the nullable storage columns.
    pub fn from_columns(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        match (start, end) {
            (Some(start), Some(end)) => Self::Active { start, end },
            _ => Self::Inactive,
        }
    }

    pub fn start(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Active { start, .. } => Some(*start),
            Self::Inactive => None,
        }
    }

    pub fn end(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Active { end, .. } => Some(*end),
            Self::Inactive => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prescription {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub medicine_id: Uuid,
    pub dosage: String,
    pub periodicity: String,
    pub duration: String,
    pub route: String,
    pub schedule: PrescriptionSchedule,
    /// `None` for as-needed orders.
    pub total_doses: Option<u32>,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
}

/// Clinician input for writing a new prescription.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrescriptionInput {
    pub patient_id: Uuid,
    pub medicine_id: Uuid,
    pub dosage: String,
    pub periodicity: String,
    pub duration: String,
    pub route: String,
}
