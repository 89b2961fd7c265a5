use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::{AuditAction, RejectionCode};

/// One row of the safety-training audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Simulated time at which the event happened.
    pub timestamp: DateTime<Utc>,
    pub actor: String,
    pub action: AuditAction,
    pub reason_code: Option<RejectionCode>,
    /// `kind:id` of the primary entity, e.g. `prescription:<uuid>`.
    pub entity: String,
    pub detail: serde_json::Value,
}
