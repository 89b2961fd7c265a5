use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Activation is a one-way transition: `Pending` → `Activated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ProtocolInstanceState {
    Pending,
    Activated { at: DateTime<Utc> },
}

impl ProtocolInstanceState {
    pub fn from_column(activated_at: Option<DateTime<Utc>>) -> Self {
        match activated_at {
            Some(at) => Self::Activated { at },
            None => Self::Pending,
        }
    }

    pub fn activated_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Activated { at } => Some(*at),
            Self::Pending => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolInstance {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub link_id: Uuid,
    pub trigger_prescription_id: Uuid,
    pub follow_prescription_id: Uuid,
    pub state: ProtocolInstanceState,
    pub created_at: DateTime<Utc>,
}

/// Optional per-instantiation overrides for the generated follow-up order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FollowUpOverrides {
    pub dosage: Option<String>,
    pub periodicity: Option<String>,
    pub route: Option<String>,
    pub duration: Option<String>,
}
