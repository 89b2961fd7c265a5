//! Boundary operations used by the HTTP layer.
//!
//! A [`ProtocolContext`] bundles one locked connection, the injected clock,
//! the audit buffer and the acting user for the duration of a request.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use super::activator::{activate_protocols, ActivatedProtocol};
use super::guard::{self, FollowUpStatus, GuardDecision, Rejection};
use super::instances::{self, InstantiatedProtocol, ProtocolView};
use super::{catalog, links, prescriptions, ProtocolError};
use crate::audit::AuditLogger;
use crate::clock::{Clock, ClockStatus, VirtualClock};
use crate::db::repository::{delete_administration, get_administration, insert_administration};
use crate::models::enums::{AdministrationStatus, AuditAction};
use crate::models::{
    Administration, AdministrationRequest, FollowUpOverrides, MedicationLink,
    MedicationLinkInput, Medicine, MedicineInput, Prescription, PrescriptionInput,
};

/// Outcome of [`ProtocolContext::record_administration`].
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RecordOutcome {
    Recorded(RecordedAdministration),
    Rejected(Rejection),
}

#[derive(Debug, Clone, Serialize)]
pub struct RecordedAdministration {
    pub administration: Administration,
    pub prescription_completed: bool,
    pub activated: Vec<ActivatedProtocol>,
    /// Set when the dose was stored but follow-up activation partly failed.
    pub protocol_activation_warning: Option<String>,
}

pub struct ProtocolContext<'a> {
    pub conn: &'a Connection,
    pub clock: &'a dyn Clock,
    pub audit: &'a AuditLogger,
    pub actor: &'a str,
}

impl<'a> ProtocolContext<'a> {
    pub fn new(conn: &'a Connection, clock: &'a dyn Clock, audit: &'a AuditLogger, actor: &'a str) -> Self {
        Self {
            conn,
            clock,
            audit,
            actor,
        }
    }

    fn flush_audit(&self) {
        if let Err(e) = self.audit.flush_to_db(self.conn) {
            tracing::warn!("Audit flush failed: {e}");
        }
    }

    fn log(&self, at: DateTime<Utc>, action: AuditAction, entity: String, detail: serde_json::Value) {
        if self.audit.log(at, self.actor, action, None, entity, detail) {
            self.flush_audit();
        }
    }

    pub fn instantiate_protocol(
        &self,
        patient_id: &Uuid,
        link_id: &Uuid,
        trigger_prescription_id: &Uuid,
        overrides: &FollowUpOverrides,
    ) -> Result<InstantiatedProtocol, ProtocolError> {
        let now = self.clock.now();
        let out = instances::instantiate(self.conn, now, patient_id, link_id, trigger_prescription_id, overrides)?;
        self.log(
            now,
            AuditAction::ProtocolInstantiated,
            format!("protocol_instance:{}", out.protocol_instance.id),
            json!({
                "patient_id": patient_id,
                "link_id": link_id,
                "trigger_prescription_id": trigger_prescription_id,
                "follow_prescription_id": out.follow_prescription.id,
            }),
        );
        self.flush_audit();
        Ok(out)
    }

    pub fn check_follow_up_status(
        &self,
        patient_id: &Uuid,
        prescription_id: &Uuid,
    ) -> Result<FollowUpStatus, ProtocolError> {
        guard::check_follow_up_status(self.conn, patient_id, prescription_id)
    }

    /// Evaluate without persisting anything but the audit trail.
    pub fn guard_administration(&self, request: &AdministrationRequest) -> GuardDecision {
        let decision = self.evaluate_and_audit(request, self.clock.now());
        self.flush_audit();
        decision
    }

    fn evaluate_and_audit(&self, request: &AdministrationRequest, now: DateTime<Utc>) -> GuardDecision {
        let decision = guard::evaluate(self.conn, now, request);
        if let GuardDecision::Reject(rejection) = &decision {
            self.audit_rejection(request, rejection, now);
        }
        decision
    }

    fn audit_rejection(&self, request: &AdministrationRequest, rejection: &Rejection, now: DateTime<Utc>) {
        if rejection.code.is_integrity_failure() {
            tracing::warn!(
                code = rejection.code.as_str(),
                patient_id = %request.patient_id,
                prescription_id = ?request.prescription_id,
                "Administration rejected"
            );
        } else {
            tracing::info!(
                code = rejection.code.as_str(),
                patient_id = %request.patient_id,
                prescription_id = ?request.prescription_id,
                "Administration rejected"
            );
        }

        let mut details = serde_json::to_value(&rejection.details).unwrap_or_else(|_| json!({}));
        if let Some(map) = details.as_object_mut() {
            map.remove("trigger_medicine_name");
            map.insert("patient_id".into(), json!(request.patient_id));
            map.insert("medicine_id".into(), json!(request.medicine_id));
            map.insert("status".into(), json!(request.status));
        }
        let entity = match request.prescription_id {
            Some(id) => format!("prescription:{id}"),
            None => format!("patient:{}", request.patient_id),
        };
        if self.audit.log(
            now,
            self.actor,
            AuditAction::AdministrationRejected,
            Some(rejection.code),
            entity,
            details,
        ) {
            self.flush_audit();
        }
    }

    /// Guard, persist, then run completion and activation. Activation
    /// problems surface as `protocol_activation_warning`, never as errors.
    pub fn record_administration(&self, request: &AdministrationRequest) -> Result<RecordOutcome, ProtocolError> {
        let now = self.clock.now();
        if let GuardDecision::Reject(rejection) = self.evaluate_and_audit(request, now) {
            self.flush_audit();
            return Ok(RecordOutcome::Rejected(rejection));
        }
        catalog::get(self.conn, &request.medicine_id)?;

        let administration = Administration {
            id: Uuid::new_v4(),
            patient_id: request.patient_id,
            medicine_id: request.medicine_id,
            prescription_id: request.prescription_id,
            status: request.status,
            administered_by: self.actor.to_string(),
            administered_at: now,
            message: request
                .message
                .as_deref()
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(str::to_string),
        };
        insert_administration(self.conn, &administration)?;
        tracing::info!(
            administration_id = %administration.id,
            status = administration.status.as_str(),
            "Administration recorded"
        );
        self.log(
            now,
            AuditAction::AdministrationRecorded,
            format!("administration:{}", administration.id),
            json!({
                "patient_id": administration.patient_id,
                "medicine_id": administration.medicine_id,
                "prescription_id": administration.prescription_id,
                "status": administration.status,
            }),
        );

        let mut prescription_completed = false;
        let mut activated = Vec::new();
        let mut protocol_activation_warning = None;

        if administration.status == AdministrationStatus::Administered {
            if let Some(rx_id) = administration.prescription_id {
                match prescriptions::update_completion(self.conn, &rx_id) {
                    Ok(done) => prescription_completed = done,
                    Err(e) => tracing::warn!(prescription_id = %rx_id, "Completion update failed: {e}"),
                }

                let report = activate_protocols(self.conn, self.audit, self.actor, &administration, self.clock.now());
                protocol_activation_warning = report.warning();
                activated = report.activated;
            }
        }

        self.flush_audit();
        Ok(RecordOutcome::Recorded(RecordedAdministration {
            administration,
            prescription_completed,
            activated,
            protocol_activation_warning,
        }))
    }

    /// Remove an administration record. Protocol activation it caused stays
    /// in place.
    pub fn delete_administration(&self, id: &Uuid) -> Result<Administration, ProtocolError> {
        let administration = get_administration(self.conn, id)?.ok_or(ProtocolError::AdministrationNotFound(*id))?;
        if !delete_administration(self.conn, id)? {
            return Err(ProtocolError::AdministrationNotFound(*id));
        }
        tracing::info!(administration_id = %id, "Administration deleted");
        self.log(
            self.clock.now(),
            AuditAction::AdministrationDeleted,
            format!("administration:{id}"),
            json!({
                "patient_id": administration.patient_id,
                "prescription_id": administration.prescription_id,
                "status": administration.status,
                "administered_at": administration.administered_at,
                "administered_by": administration.administered_by,
            }),
        );
        self.flush_audit();
        Ok(administration)
    }

    pub fn list_medication_links_by_trigger(&self, medicine_id: &Uuid) -> Result<Vec<MedicationLink>, ProtocolError> {
        links::list_links_by_trigger(self.conn, medicine_id)
    }

    pub fn list_medication_links(&self) -> Result<Vec<MedicationLink>, ProtocolError> {
        links::list_links(self.conn)
    }

    pub fn get_medication_link(&self, id: &Uuid) -> Result<MedicationLink, ProtocolError> {
        links::get_link(self.conn, id)
    }

    pub fn create_medication_link(&self, input: &MedicationLinkInput) -> Result<MedicationLink, ProtocolError> {
        let now = self.clock.now();
        let link = links::create_link(self.conn, now, input)?;
        self.log(
            now,
            AuditAction::LinkCreated,
            format!("medication_link:{}", link.id),
            json!({ "delay_minutes": link.delay_minutes, "follow_duration_hours": link.follow_duration_hours }),
        );
        self.flush_audit();
        Ok(link)
    }

    pub fn update_medication_link(&self, id: &Uuid, input: &MedicationLinkInput) -> Result<MedicationLink, ProtocolError> {
        let link = links::update_link(self.conn, id, input)?;
        self.log(
            self.clock.now(),
            AuditAction::LinkUpdated,
            format!("medication_link:{id}"),
            json!({ "delay_minutes": link.delay_minutes, "follow_duration_hours": link.follow_duration_hours }),
        );
        self.flush_audit();
        Ok(link)
    }

    pub fn delete_medication_link(&self, id: &Uuid) -> Result<(), ProtocolError> {
        links::delete_link(self.conn, id)?;
        self.log(self.clock.now(), AuditAction::LinkDeleted, format!("medication_link:{id}"), json!({}));
        self.flush_audit();
        Ok(())
    }

    pub fn list_protocols_for_patient(&self, patient_id: &Uuid) -> Result<Vec<ProtocolView>, ProtocolError> {
        instances::list_protocols_for_patient(self.conn, patient_id)
    }

    pub fn create_prescription(&self, input: &PrescriptionInput) -> Result<Prescription, ProtocolError> {
        prescriptions::create_prescription(self.conn, self.clock.now(), input)
    }

    pub fn get_prescription(&self, prescription_id: &Uuid) -> Result<Prescription, ProtocolError> {
        prescriptions::get(self.conn, prescription_id)
    }

    pub fn doses_remaining(&self, prescription_id: &Uuid) -> Result<Option<u32>, ProtocolError> {
        prescriptions::doses_remaining(self.conn, prescription_id)
    }

    pub fn create_medicine(&self, input: &MedicineInput) -> Result<Medicine, ProtocolError> {
        catalog::create_medicine(self.conn, input)
    }

    pub fn get_medicine(&self, id: &Uuid) -> Result<Medicine, ProtocolError> {
        catalog::get(self.conn, id)
    }

    pub fn list_medicines(&self) -> Result<Vec<Medicine>, ProtocolError> {
        catalog::list(self.conn)
    }
}

/// Instructor time travel. Buffers an audit entry; the caller flushes.
pub fn advance_virtual_clock(
    clock: &VirtualClock,
    audit: &AuditLogger,
    actor: &str,
    hours: u32,
    minutes: u32,
) -> ClockStatus {
    let now = clock.advance(hours, minutes);
    audit.log(
        now,
        actor,
        AuditAction::ClockAdvanced,
        None,
        "clock".into(),
        json!({ "hours": hours, "minutes": minutes, "now": now }),
    );
    clock.status()
}

pub fn reset_virtual_clock(clock: &VirtualClock, audit: &AuditLogger, actor: &str) -> ClockStatus {
    let offset_minutes = clock.offset().num_minutes();
    let now = clock.reset();
    audit.log(
        now,
        actor,
        AuditAction::ClockReset,
        None,
        "clock".into(),
        json!({ "previous_offset_minutes": offset_minutes }),
    );
    clock.status()
}
