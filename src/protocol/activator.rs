//! Protocol activation after a trigger dose.
//!
//! Follow-up windows are anchored on when the trigger was actually given
//! (`administered_at`), never on when this code happens to run. Failures are
//! collected per instance and never propagate: the administration that
//! caused the activation is already recorded.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use super::instances::{activate_instance, follow_up_window, pending_for_trigger};
use super::ProtocolError;
use crate::audit::AuditLogger;
use crate::db::repository::{get_medication_link, set_prescription_window};
use crate::db::DatabaseError;
use crate::models::enums::{AdministrationStatus, AuditAction};
use crate::models::{Administration, ProtocolInstance};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivatedProtocol {
    pub instance_id: Uuid,
    pub follow_prescription_id: Uuid,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    /// Processing time. Bookkeeping only, not used in timing math.
    pub activated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivationFailure {
    /// `None` when the pending lookup itself failed.
    pub instance_id: Option<Uuid>,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ActivationReport {
    pub activated: Vec<ActivatedProtocol>,
    pub failures: Vec<ActivationFailure>,
}

impl ActivationReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Single operator-facing line summarising failures, if any.
    pub fn warning(&self) -> Option<String> {
        if self.is_clean() {
            return None;
        }
        Some(format!(
            "Dose recorded, but {} follow-up protocol(s) could not be activated",
            self.failures.len()
        ))
    }
}

/// Activate every pending instance keyed on the administration's
/// prescription. Only `administered` doses activate anything.
pub fn activate_protocols(
    conn: &Connection,
    audit: &AuditLogger,
    actor: &str,
    administration: &Administration,
    processing_time: DateTime<Utc>,
) -> ActivationReport {
    let mut report = ActivationReport::default();

    if administration.status != AdministrationStatus::Administered {
        return report;
    }
    let Some(trigger_prescription_id) = administration.prescription_id else {
        return report;
    };

    let pending = match pending_for_trigger(conn, &administration.patient_id, &trigger_prescription_id) {
        Ok(pending) => pending,
        Err(e) => {
            tracing::error!(
                administration_id = %administration.id,
                "Pending protocol lookup failed: {e}"
            );
            report.failures.push(ActivationFailure {
                instance_id: None,
                reason: e.to_string(),
            });
            return report;
        }
    };

    let anchor = administration.administered_at;
    for instance in pending {
        match activate_one(conn, &instance, anchor, processing_time) {
            Ok(Some(done)) => {
                tracing::info!(
                    instance_id = %done.instance_id,
                    follow_prescription_id = %done.follow_prescription_id,
                    "Protocol activated"
                );
                audit.log(
                    processing_time,
                    actor,
                    AuditAction::ProtocolActivated,
                    None,
                    format!("protocol_instance:{}", done.instance_id),
                    json!({
                        "administration_id": administration.id,
                        "trigger_prescription_id": trigger_prescription_id,
                        "follow_prescription_id": done.follow_prescription_id,
                        "anchor_time": anchor,
                        "activated_at": done.activated_at,
                        "window_start": done.window_start,
                        "window_end": done.window_end,
                    }),
                );
                report.activated.push(done);
            }
            // Activated concurrently by another call; nothing to do.
            Ok(None) => {}
            Err(e) => {
                tracing::error!(instance_id = %instance.id, "Protocol activation failed: {e}");
                audit.log(
                    processing_time,
                    actor,
                    AuditAction::ProtocolActivationFailed,
                    None,
                    format!("protocol_instance:{}", instance.id),
                    json!({
                        "administration_id": administration.id,
                        "error": e.to_string(),
                    }),
                );
                report.failures.push(ActivationFailure {
                    instance_id: Some(instance.id),
                    reason: e.to_string(),
                });
            }
        }
    }

    report
}

/// Mark the instance activated and open the follow-up window as one unit.
/// `Ok(None)` if the instance was no longer pending.
fn activate_one(
    conn: &Connection,
    instance: &ProtocolInstance,
    anchor: DateTime<Utc>,
    processing_time: DateTime<Utc>,
) -> Result<Option<ActivatedProtocol>, ProtocolError> {
    let link = get_medication_link(conn, &instance.link_id)?
        .ok_or(ProtocolError::LinkNotFound(instance.link_id))?;
    let (window_start, window_end) =
        follow_up_window(anchor, link.delay_minutes, link.follow_duration_hours).ok_or_else(|| {
            ProtocolError::InvalidLink(format!("follow-up window for link {} is out of range", link.id))
        })?;

    let tx = conn.unchecked_transaction().map_err(DatabaseError::from)?;
    let Some(activated) = activate_instance(&tx, &instance.id, processing_time)? else {
        return Ok(None);
    };
    set_prescription_window(&tx, &activated.follow_prescription_id, window_start, window_end)?;
    tx.commit().map_err(DatabaseError::from)?;

    Ok(Some(ActivatedProtocol {
        instance_id: activated.id,
        follow_prescription_id: activated.follow_prescription_id,
        window_start,
        window_end,
        activated_at: processing_time,
    }))
}
