//! Administration guard.
//!
//! Runs before an administration is persisted and decides Allow or Reject.
//! Every check fails closed: a storage fault while verifying the
//! prescription rejects with `PRESCRIPTION_VERIFICATION_FAILED`, a fault
//! while evaluating protocol state rejects with `VALIDATION_FAILED`.
//!
//! Time is passed in once per evaluation so a clock change mid-decision
//! cannot split the checks across two instants.

use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;
use serde::Serialize;
use uuid::Uuid;

use super::{wait, ProtocolError};
use crate::clock::eastern;
use crate::config::FOLLOW_UP_GRACE_MINUTES;
use crate::db::repository::{
    get_medication_link, get_prescription, latest_administered_for_prescription,
    list_protocol_instances_by_patient, medicine_display_name,
};
use crate::models::enums::{AdministrationStatus, RejectionCode};
use crate::models::{AdministrationRequest, Prescription, ProtocolInstance};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum GuardDecision {
    Allow,
    Reject(Rejection),
}

impl GuardDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Self::Reject(r) => Some(r),
            Self::Allow => None,
        }
    }
}

/// Structured refusal shown to the operator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rejection {
    pub code: RejectionCode,
    pub message: String,
    pub details: RejectionDetails,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RejectionDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prescription_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger_prescription_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger_medicine_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger_medicine_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger_administered_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay_minutes: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_at_display: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_left_minutes: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_left_display: Option<String>,
}

impl Rejection {
    fn new(code: RejectionCode, message: impl Into<String>, details: RejectionDetails) -> Self {
        Self {
            code,
            message: message.into(),
            details,
        }
    }
}

/// Read-only preview of follow-up state for one prescription.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FollowUpStatus {
    pub is_follow_up: bool,
    pub trigger_administered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger_medicine_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger_prescription_id: Option<Uuid>,
}

/// Earliest time a follow-up may be given after a trigger dose.
pub fn follow_up_due_at(trigger_administered_at: DateTime<Utc>, delay_minutes: u32) -> DateTime<Utc> {
    trigger_administered_at + Duration::minutes(i64::from(delay_minutes))
        - Duration::minutes(FOLLOW_UP_GRACE_MINUTES)
}

/// Decide whether `request` may be recorded at `now`.
pub fn evaluate(conn: &Connection, now: DateTime<Utc>, request: &AdministrationRequest) -> GuardDecision {
    let Some(prescription_id) = request.prescription_id else {
        return GuardDecision::Allow;
    };

    if let Err(rejection) = verify_prescription(conn, request, &prescription_id) {
        return GuardDecision::Reject(rejection);
    }

    if request.status != AdministrationStatus::Administered {
        return GuardDecision::Allow;
    }

    match gate_follow_up(conn, now, &request.patient_id, &prescription_id) {
        Ok(None) => GuardDecision::Allow,
        Ok(Some(rejection)) => GuardDecision::Reject(rejection),
        Err(e) => {
            tracing::error!(prescription_id = %prescription_id, "Follow-up evaluation failed: {e}");
            GuardDecision::Reject(Rejection::new(
                RejectionCode::ValidationFailed,
                "Unable to validate protocol requirements for this dose",
                RejectionDetails {
                    prescription_id: Some(prescription_id),
                    ..Default::default()
                },
            ))
        }
    }
}

/// Identity checks: the prescription exists and matches the request's
/// patient and medicine. Later checks key on the prescription id, so a
/// mismatched id must never get past this point.
fn verify_prescription(
    conn: &Connection,
    request: &AdministrationRequest,
    prescription_id: &Uuid,
) -> Result<Prescription, Rejection> {
    let details = RejectionDetails {
        prescription_id: Some(*prescription_id),
        ..Default::default()
    };

    let rx = match get_prescription(conn, prescription_id) {
        Ok(Some(rx)) => rx,
        Ok(None) => {
            return Err(Rejection::new(
                RejectionCode::PrescriptionNotFound,
                "Prescription not found",
                details,
            ))
        }
        Err(e) => {
            tracing::error!(prescription_id = %prescription_id, "Prescription lookup failed: {e}");
            return Err(Rejection::new(
                RejectionCode::PrescriptionVerificationFailed,
                "Unable to verify prescription",
                details,
            ));
        }
    };

    if rx.patient_id != request.patient_id {
        return Err(Rejection::new(
            RejectionCode::PatientIdMismatch,
            "Prescription does not belong to this patient",
            details,
        ));
    }
    if rx.medicine_id != request.medicine_id {
        return Err(Rejection::new(
            RejectionCode::MedicineIdMismatch,
            "Prescription is for a different medicine",
            details,
        ));
    }
    Ok(rx)
}

fn find_follow_up_instance(
    conn: &Connection,
    patient_id: &Uuid,
    prescription_id: &Uuid,
) -> Result<Option<ProtocolInstance>, ProtocolError> {
    let instances = list_protocol_instances_by_patient(conn, patient_id)?;
    Ok(instances
        .into_iter()
        .find(|inst| inst.follow_prescription_id == *prescription_id))
}

/// `Ok(None)` when the dose is not a follow-up or its timing is satisfied.
fn gate_follow_up(
    conn: &Connection,
    now: DateTime<Utc>,
    patient_id: &Uuid,
    prescription_id: &Uuid,
) -> Result<Option<Rejection>, ProtocolError> {
    let Some(instance) = find_follow_up_instance(conn, patient_id, prescription_id)? else {
        return Ok(None);
    };

    let trigger_rx = get_prescription(conn, &instance.trigger_prescription_id)?
        .ok_or(ProtocolError::PrescriptionNotFound(instance.trigger_prescription_id))?;

    let mut details = RejectionDetails {
        prescription_id: Some(*prescription_id),
        instance_id: Some(instance.id),
        trigger_prescription_id: Some(instance.trigger_prescription_id),
        trigger_medicine_id: Some(trigger_rx.medicine_id),
        ..Default::default()
    };

    let Some(trigger_admin) =
        latest_administered_for_prescription(conn, patient_id, &instance.trigger_prescription_id)?
    else {
        let name = medicine_display_name(conn, &trigger_rx.medicine_id);
        let message = format!("Cannot give this follow-up dose until {name} has been administered");
        details.trigger_medicine_name = Some(name);
        return Ok(Some(Rejection::new(RejectionCode::FollowUpBlocked, message, details)));
    };

    let link = get_medication_link(conn, &instance.link_id)?
        .ok_or(ProtocolError::LinkNotFound(instance.link_id))?;

    let due_at = follow_up_due_at(trigger_admin.administered_at, link.delay_minutes);
    if now >= due_at {
        return Ok(None);
    }

    let remaining = due_at - now;
    let time_left = wait::format_wait(remaining);
    let due_display = eastern::format_eastern(due_at);
    let name = medicine_display_name(conn, &trigger_rx.medicine_id);

    details.trigger_medicine_name = Some(name.clone());
    details.trigger_administered_at = Some(trigger_admin.administered_at);
    details.delay_minutes = Some(link.delay_minutes);
    details.due_at = Some(due_at);
    details.due_at_display = Some(due_display.clone());
    details.time_left_minutes = Some(wait::wait_minutes(remaining));
    details.time_left_display = Some(time_left.clone());

    Ok(Some(Rejection::new(
        RejectionCode::ProtocolTimingTooEarly,
        format!("Too early: follow-up to {name} is due in {time_left} (at {due_display})"),
        details,
    )))
}

/// Whether a prescription is a follow-up and whether its trigger was given.
pub fn check_follow_up_status(
    conn: &Connection,
    patient_id: &Uuid,
    prescription_id: &Uuid,
) -> Result<FollowUpStatus, ProtocolError> {
    let Some(instance) = find_follow_up_instance(conn, patient_id, prescription_id)? else {
        return Ok(FollowUpStatus::default());
    };

    let trigger_medicine_id = get_prescription(conn, &instance.trigger_prescription_id)?
        .map(|rx| rx.medicine_id);
    let trigger_administered =
        latest_administered_for_prescription(conn, patient_id, &instance.trigger_prescription_id)?
            .is_some();

    Ok(FollowUpStatus {
        is_follow_up: true,
        trigger_administered,
        trigger_medicine_id,
        trigger_prescription_id: Some(instance.trigger_prescription_id),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::{insert_administration, insert_medication_link, insert_medicine};
    use crate::db::sqlite::open_memory_database;
    use crate::models::{Administration, FollowUpOverrides, MedicationLink, Medicine};
    use crate::protocol::instances::instantiate;
    use crate::protocol::prescriptions::create_prescription;
    use crate::models::PrescriptionInput;
    use chrono::TimeZone;

    struct Scenario {
        conn: Connection,
        patient: Uuid,
        trigger_med: Uuid,
        follow_med: Uuid,
        trigger_rx: Uuid,
        follow_rx: Uuid,
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 10, 14, 0, 0).unwrap()
    }

    fn medicine(conn: &Connection, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        insert_medicine(
            conn,
            &Medicine {
                id,
                name: name.into(),
                default_dose: "1 unit".into(),
                default_route: "PO".into(),
            },
        )
        .unwrap();
        id
    }

    fn scenario(delay_minutes: u32, written_at: DateTime<Utc>) -> Scenario {
        let conn = open_memory_database().unwrap();
        let trigger_med = medicine(&conn, "Penicillin");
        let follow_med = medicine(&conn, "Probenecid");
        let link = MedicationLink {
            id: Uuid::new_v4(),
            trigger_medicine_id: trigger_med,
            follow_medicine_id: follow_med,
            delay_minutes,
            follow_frequency: "every 4 hours".into(),
            follow_duration_hours: 24,
            default_dose_override: None,
            created_at: written_at,
        };
        insert_medication_link(&conn, &link).unwrap();

        let patient = Uuid::new_v4();
        let trigger = create_prescription(
            &conn,
            written_at,
            &PrescriptionInput {
                patient_id: patient,
                medicine_id: trigger_med,
                dosage: "500mg".into(),
                periodicity: "once".into(),
                duration: "1 day".into(),
                route: "PO".into(),
            },
        )
        .unwrap();
        let out = instantiate(&conn, written_at, &patient, &link.id, &trigger.id, &FollowUpOverrides::default()).unwrap();

        Scenario {
            conn,
            patient,
            trigger_med,
            follow_med,
            trigger_rx: trigger.id,
            follow_rx: out.follow_prescription.id,
        }
    }

    fn give_trigger(s: &Scenario, at: DateTime<Utc>, status: AdministrationStatus) {
        insert_administration(
            &s.conn,
            &Administration {
                id: Uuid::new_v4(),
                patient_id: s.patient,
                medicine_id: s.trigger_med,
                prescription_id: Some(s.trigger_rx),
                status,
                administered_by: "nurse.lee".into(),
                administered_at: at,
                message: None,
            },
        )
        .unwrap();
    }

    fn follow_request(s: &Scenario) -> AdministrationRequest {
        AdministrationRequest {
            patient_id: s.patient,
            medicine_id: s.follow_med,
            prescription_id: Some(s.follow_rx),
            status: AdministrationStatus::Administered,
            message: None,
        }
    }

    fn code(decision: &GuardDecision) -> Option<RejectionCode> {
        decision.rejection().map(|r| r.code)
    }

    #[test]
    fn no_prescription_is_allowed() {
        let s = scenario(0, t0());
        let request = AdministrationRequest {
            prescription_id: None,
            ..follow_request(&s)
        };
        assert!(evaluate(&s.conn, t0(), &request).is_allowed());
    }

    #[test]
    fn unknown_prescription_rejected() {
        let s = scenario(0, t0());
        let request = AdministrationRequest {
            prescription_id: Some(Uuid::new_v4()),
            ..follow_request(&s)
        };
        assert_eq!(code(&evaluate(&s.conn, t0(), &request)), Some(RejectionCode::PrescriptionNotFound));
    }

    #[test]
    fn other_patients_prescription_rejected_regardless_of_state() {
        let s = scenario(0, t0());
        give_trigger(&s, t0(), AdministrationStatus::Administered);
        let request = AdministrationRequest {
            patient_id: Uuid::new_v4(),
            ..follow_request(&s)
        };
        assert_eq!(code(&evaluate(&s.conn, t0() + Duration::hours(5), &request)), Some(RejectionCode::PatientIdMismatch));
    }

    #[test]
    fn medicine_mismatch_rejected_even_when_not_administered() {
        let s = scenario(0, t0());
        let request = AdministrationRequest {
            medicine_id: s.trigger_med,
            status: AdministrationStatus::Refused,
            ..follow_request(&s)
        };
        assert_eq!(code(&evaluate(&s.conn, t0(), &request)), Some(RejectionCode::MedicineIdMismatch));
    }

    #[test]
    fn follow_up_blocked_without_trigger_dose() {
        let s = scenario(120, t0());
        let decision = evaluate(&s.conn, t0() + Duration::days(1), &follow_request(&s));
        let rejection = decision.rejection().unwrap();
        assert_eq!(rejection.code, RejectionCode::FollowUpBlocked);
        assert!(rejection.message.contains("Penicillin"));
        assert_eq!(rejection.details.trigger_medicine_name.as_deref(), Some("Penicillin"));
        assert_eq!(rejection.details.trigger_prescription_id, Some(s.trigger_rx));
    }

    #[test]
    fn refused_trigger_does_not_unblock() {
        let s = scenario(0, t0());
        give_trigger(&s, t0(), AdministrationStatus::Refused);
        assert_eq!(
            code(&evaluate(&s.conn, t0() + Duration::hours(2), &follow_request(&s))),
            Some(RejectionCode::FollowUpBlocked)
        );
    }

    #[test]
    fn non_administered_follow_up_skips_gating() {
        let s = scenario(120, t0());
        let request = AdministrationRequest {
            status: AdministrationStatus::Held,
            ..follow_request(&s)
        };
        assert!(evaluate(&s.conn, t0(), &request).is_allowed());
    }

    #[test]
    fn zero_delay_follow_up_allowed_immediately() {
        let s = scenario(0, t0());
        give_trigger(&s, t0(), AdministrationStatus::Administered);
        assert!(evaluate(&s.conn, t0() + Duration::minutes(5), &follow_request(&s)).is_allowed());
    }

    #[test]
    fn too_early_reports_remaining_wait() {
        let s = scenario(120, t0());
        give_trigger(&s, t0(), AdministrationStatus::Administered);

        let decision = evaluate(&s.conn, t0() + Duration::minutes(30), &follow_request(&s));
        let rejection = decision.rejection().unwrap();
        assert_eq!(rejection.code, RejectionCode::ProtocolTimingTooEarly);
        assert_eq!(rejection.details.due_at, Some(t0() + Duration::minutes(60)));
        assert_eq!(rejection.details.time_left_display.as_deref(), Some("30m"));
        assert_eq!(rejection.details.time_left_minutes, Some(30));
        assert_eq!(rejection.details.due_at_display.as_deref(), Some("2026-02-10 10:00 AM EST"));
    }

    #[test]
    fn timing_boundary_is_delay_minus_grace() {
        let delay = 300;
        let s = scenario(delay, t0());
        give_trigger(&s, t0(), AdministrationStatus::Administered);
        let due = t0() + Duration::minutes(i64::from(delay) - 60);

        for probe in [t0(), t0() + Duration::minutes(1), due - Duration::seconds(1)] {
            assert_eq!(
                code(&evaluate(&s.conn, probe, &follow_request(&s))),
                Some(RejectionCode::ProtocolTimingTooEarly),
                "expected too early at {probe}"
            );
        }
        for probe in [due, due + Duration::seconds(1), due + Duration::days(3)] {
            assert!(evaluate(&s.conn, probe, &follow_request(&s)).is_allowed(), "expected allow at {probe}");
        }
    }

    #[test]
    fn latest_trigger_dose_is_the_anchor() {
        let s = scenario(180, t0());
        give_trigger(&s, t0(), AdministrationStatus::Administered);
        give_trigger(&s, t0() + Duration::hours(4), AdministrationStatus::Administered);

        // Due two hours after the second dose.
        let at = t0() + Duration::hours(5);
        let rejection = evaluate(&s.conn, at, &follow_request(&s)).rejection().cloned().unwrap();
        assert_eq!(rejection.details.due_at, Some(t0() + Duration::hours(6)));
        assert_eq!(rejection.details.time_left_display.as_deref(), Some("1h"));
    }

    #[test]
    fn due_time_stable_across_spring_forward() {
        // 10:00 EST Saturday; DST starts 02:00 Sunday 2026-03-08.
        let given = Utc.with_ymd_and_hms(2026, 3, 7, 15, 0, 0).unwrap();
        let s = scenario(49 * 60, given);
        give_trigger(&s, given, AdministrationStatus::Administered);

        let rejection = evaluate(&s.conn, given, &follow_request(&s)).rejection().cloned().unwrap();
        assert_eq!(rejection.details.due_at, Some(given + Duration::hours(48)));
        assert_eq!(rejection.details.time_left_display.as_deref(), Some("2d"));
        // 48 elapsed hours read as 11:00 local once clocks have sprung forward.
        assert_eq!(rejection.details.due_at_display.as_deref(), Some("2026-03-09 11:00 AM EDT"));
    }

    #[test]
    fn due_time_stable_across_fall_back() {
        // 10:00 EDT Saturday; DST ends 02:00 Sunday 2026-11-01.
        let given = Utc.with_ymd_and_hms(2026, 10, 31, 14, 0, 0).unwrap();
        let s = scenario(49 * 60, given);
        give_trigger(&s, given, AdministrationStatus::Administered);

        let rejection = evaluate(&s.conn, given, &follow_request(&s)).rejection().cloned().unwrap();
        assert_eq!(rejection.details.due_at, Some(given + Duration::hours(48)));
        assert_eq!(rejection.details.due_at_display.as_deref(), Some("2026-11-02 09:00 AM EST"));
        assert!(evaluate(&s.conn, given + Duration::hours(48), &follow_request(&s)).is_allowed());
    }

    #[test]
    fn trigger_prescription_itself_is_not_gated() {
        let s = scenario(120, t0());
        let request = AdministrationRequest {
            patient_id: s.patient,
            medicine_id: s.trigger_med,
            prescription_id: Some(s.trigger_rx),
            status: AdministrationStatus::Administered,
            message: None,
        };
        assert!(evaluate(&s.conn, t0(), &request).is_allowed());
    }

    #[test]
    fn storage_fault_fails_closed() {
        let s = scenario(0, t0());
        s.conn.execute_batch("DROP TABLE administrations;").unwrap();
        assert_eq!(
            code(&evaluate(&s.conn, t0(), &follow_request(&s))),
            Some(RejectionCode::ValidationFailed)
        );

        s.conn.execute_batch("PRAGMA foreign_keys = OFF; DROP TABLE protocol_instances; DROP TABLE prescriptions;").unwrap();
        assert_eq!(
            code(&evaluate(&s.conn, t0(), &follow_request(&s))),
            Some(RejectionCode::PrescriptionVerificationFailed)
        );
    }

    #[test]
    fn follow_up_status_preview() {
        let s = scenario(60, t0());
        let before = check_follow_up_status(&s.conn, &s.patient, &s.follow_rx).unwrap();
        assert!(before.is_follow_up);
        assert!(!before.trigger_administered);
        assert_eq!(before.trigger_medicine_id, Some(s.trigger_med));

        give_trigger(&s, t0(), AdministrationStatus::Administered);
        let after = check_follow_up_status(&s.conn, &s.patient, &s.follow_rx).unwrap();
        assert!(after.trigger_administered);

        let plain = check_follow_up_status(&s.conn, &s.patient, &s.trigger_rx).unwrap();
        assert_eq!(plain, FollowUpStatus::default());
    }
}
