//! Per-patient protocol instances.

use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;
use serde::Serialize;
use uuid::Uuid;

use super::{dosing, ProtocolError};
use crate::db::repository::{
    find_pending_by_trigger, find_protocol_instance, get_medication_link, get_medicine,
    get_prescription, get_protocol_instance, insert_prescription, insert_protocol_instance,
    list_protocol_instances_by_patient, mark_instance_activated,
};
use crate::db::DatabaseError;
use crate::models::{
    FollowUpOverrides, Prescription, PrescriptionSchedule, ProtocolInstance,
    ProtocolInstanceState,
};

/// Result of a successful instantiation.
#[derive(Debug, Clone, Serialize)]
pub struct InstantiatedProtocol {
    pub follow_prescription: Prescription,
    pub protocol_instance: ProtocolInstance,
}

/// Read model for listing a patient's protocols.
#[derive(Debug, Clone, Serialize)]
pub struct ProtocolView {
    pub instance_id: Uuid,
    pub link_id: Uuid,
    pub trigger_prescription_id: Uuid,
    pub follow_prescription_id: Uuid,
    pub trigger_medicine_id: Option<Uuid>,
    pub follow_medicine_id: Option<Uuid>,
    pub delay_minutes: Option<u32>,
    pub state: ProtocolInstanceState,
    pub follow_schedule: PrescriptionSchedule,
}

fn pick(override_value: &Option<String>) -> Option<String> {
    override_value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Create the inactive follow-up prescription and a pending instance for
/// one (patient, link, trigger prescription) triple.
///
/// Preconditions are checked in order and the first failure is returned:
/// trigger prescription exists, belongs to the patient, link exists, link
/// trigger medicine matches, no instance exists yet, follow-up medicine exists.
pub fn instantiate(
    conn: &Connection,
    now: DateTime<Utc>,
    patient_id: &Uuid,
    link_id: &Uuid,
    trigger_prescription_id: &Uuid,
    overrides: &FollowUpOverrides,
) -> Result<InstantiatedProtocol, ProtocolError> {
    let trigger = get_prescription(conn, trigger_prescription_id)?
        .ok_or(ProtocolError::PrescriptionNotFound(*trigger_prescription_id))?;
    if trigger.patient_id != *patient_id {
        return Err(ProtocolError::PatientMismatch);
    }

    let link = get_medication_link(conn, link_id)?.ok_or(ProtocolError::LinkNotFound(*link_id))?;
    if trigger.medicine_id != link.trigger_medicine_id {
        return Err(ProtocolError::MedicineMismatch);
    }

    if find_protocol_instance(conn, patient_id, link_id, trigger_prescription_id)?.is_some() {
        return Err(ProtocolError::DuplicateInstance);
    }

    let follow_medicine = get_medicine(conn, &link.follow_medicine_id)?
        .ok_or(ProtocolError::FollowMedicineNotFound(link.follow_medicine_id))?;

    let dosage = pick(&overrides.dosage)
        .or_else(|| link.default_dose_override.clone())
        .unwrap_or_else(|| follow_medicine.default_dose.clone());
    let periodicity = pick(&overrides.periodicity).unwrap_or_else(|| link.follow_frequency.clone());
    let route = pick(&overrides.route).unwrap_or_else(|| follow_medicine.default_route.clone());
    let duration = pick(&overrides.duration)
        .unwrap_or_else(|| format!("{} hours", link.follow_duration_hours));

    let follow_prescription = Prescription {
        id: Uuid::new_v4(),
        patient_id: *patient_id,
        medicine_id: follow_medicine.id,
        total_doses: dosing::total_doses(&periodicity, &duration),
        dosage,
        periodicity,
        duration,
        route,
        schedule: PrescriptionSchedule::Inactive,
        completed: false,
        created_at: now,
    };

    let protocol_instance = ProtocolInstance {
        id: Uuid::new_v4(),
        patient_id: *patient_id,
        link_id: *link_id,
        trigger_prescription_id: *trigger_prescription_id,
        follow_prescription_id: follow_prescription.id,
        state: ProtocolInstanceState::Pending,
        created_at: now,
    };

    // Both rows or neither; the unique index closes the check-then-insert race.
    let tx = conn.unchecked_transaction().map_err(DatabaseError::from)?;
    insert_prescription(&tx, &follow_prescription)?;
    match insert_protocol_instance(&tx, &protocol_instance) {
        Ok(()) => {}
        Err(DatabaseError::UniqueViolation(_)) => return Err(ProtocolError::DuplicateInstance),
        Err(e) => return Err(e.into()),
    }
    tx.commit().map_err(DatabaseError::from)?;

    tracing::info!(
        instance_id = %protocol_instance.id,
        link_id = %link_id,
        trigger_prescription_id = %trigger_prescription_id,
        follow_prescription_id = %follow_prescription.id,
        "Protocol instantiated"
    );

    Ok(InstantiatedProtocol {
        follow_prescription,
        protocol_instance,
    })
}

pub fn list_by_patient(conn: &Connection, patient_id: &Uuid) -> Result<Vec<ProtocolInstance>, ProtocolError> {
    Ok(list_protocol_instances_by_patient(conn, patient_id)?)
}

/// Pending instances for a trigger prescription, scoped to the patient.
pub fn pending_for_trigger(
    conn: &Connection,
    patient_id: &Uuid,
    trigger_prescription_id: &Uuid,
) -> Result<Vec<ProtocolInstance>, ProtocolError> {
    Ok(find_pending_by_trigger(conn, patient_id, trigger_prescription_id)?)
}

/// Move a pending instance to `Activated`. Returns `None` when the instance
/// was already activated; its original activation time is kept.
pub fn activate_instance(
    conn: &Connection,
    instance_id: &Uuid,
    activated_at: DateTime<Utc>,
) -> Result<Option<ProtocolInstance>, ProtocolError> {
    let instance = get_protocol_instance(conn, instance_id)?.ok_or_else(|| {
        DatabaseError::NotFound {
            entity_type: "ProtocolInstance".into(),
            id: instance_id.to_string(),
        }
    })?;
    if !instance.state.is_pending() || !mark_instance_activated(conn, instance_id, activated_at)? {
        return Ok(None);
    }
    Ok(Some(ProtocolInstance {
        state: ProtocolInstanceState::Activated { at: activated_at },
        ..instance
    }))
}

/// Instances for a patient joined with link timing and follow-up schedule.
pub fn list_protocols_for_patient(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<ProtocolView>, ProtocolError> {
    let instances = list_by_patient(conn, patient_id)?;
    let mut views = Vec::with_capacity(instances.len());
    for inst in instances {
        let link = get_medication_link(conn, &inst.link_id)?;
        let follow_schedule = get_prescription(conn, &inst.follow_prescription_id)?
            .map(|rx| rx.schedule)
            .unwrap_or(PrescriptionSchedule::Inactive);
        views.push(ProtocolView {
            instance_id: inst.id,
            link_id: inst.link_id,
            trigger_prescription_id: inst.trigger_prescription_id,
            follow_prescription_id: inst.follow_prescription_id,
            trigger_medicine_id: link.as_ref().map(|l| l.trigger_medicine_id),
            follow_medicine_id: link.as_ref().map(|l| l.follow_medicine_id),
            delay_minutes: link.as_ref().map(|l| l.delay_minutes),
            state: inst.state,
            follow_schedule,
        });
    }
    Ok(views)
}

/// Follow-up window opened by a trigger dose given at `anchor`. `None` if
/// the window falls outside the representable time range.
pub fn follow_up_window(
    anchor: DateTime<Utc>,
    delay_minutes: u32,
    duration_hours: u32,
) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let start = anchor.checked_add_signed(Duration::try_minutes(i64::from(delay_minutes))?)?;
    let end = start.checked_add_signed(Duration::try_hours(i64::from(duration_hours))?)?;
    Some((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::{insert_medication_link, insert_medicine};
    use crate::db::sqlite::open_memory_database;
    use crate::models::{MedicationLink, Medicine};
    use chrono::TimeZone;

    struct Fixture {
        conn: Connection,
        patient: Uuid,
        link: Uuid,
        trigger_rx: Uuid,
        follow_med: Uuid,
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 20, 9, 0, 0).unwrap()
    }

    fn medicine(conn: &Connection, name: &str, dose: &str, route: &str) -> Uuid {
        let id = Uuid::new_v4();
        insert_medicine(
            conn,
            &Medicine {
                id,
                name: name.into(),
                default_dose: dose.into(),
                default_route: route.into(),
            },
        )
        .unwrap();
        id
    }

    fn prescription(conn: &Connection, patient: Uuid, med: Uuid) -> Uuid {
        let rx = Prescription {
            id: Uuid::new_v4(),
            patient_id: patient,
            medicine_id: med,
            dosage: "2g".into(),
            periodicity: "once".into(),
            duration: "1 hour".into(),
            route: "IV".into(),
            schedule: PrescriptionSchedule::Active {
                start: now(),
                end: now() + Duration::hours(1),
            },
            total_doses: Some(1),
            completed: false,
            created_at: now(),
        };
        insert_prescription(conn, &rx).unwrap();
        rx.id
    }

    fn fixture(dose_override: Option<&str>) -> Fixture {
        let conn = open_memory_database().unwrap();
        let trigger_med = medicine(&conn, "Cefazolin", "2g", "IV");
        let follow_med = medicine(&conn, "Acetaminophen", "650mg", "PO");
        let link = MedicationLink {
            id: Uuid::new_v4(),
            trigger_medicine_id: trigger_med,
            follow_medicine_id: follow_med,
            delay_minutes: 240,
            follow_frequency: "every 6 hours".into(),
            follow_duration_hours: 24,
            default_dose_override: dose_override.map(str::to_string),
            created_at: now(),
        };
        insert_medication_link(&conn, &link).unwrap();
        let patient = Uuid::new_v4();
        let trigger_rx = prescription(&conn, patient, trigger_med);
        Fixture {
            conn,
            patient,
            link: link.id,
            trigger_rx,
            follow_med,
        }
    }

    #[test]
    fn instantiate_creates_inactive_follow_up() {
        let f = fixture(None);
        let out = instantiate(&f.conn, now(), &f.patient, &f.link, &f.trigger_rx, &FollowUpOverrides::default()).unwrap();

        let rx = &out.follow_prescription;
        assert_eq!(rx.medicine_id, f.follow_med);
        assert_eq!(rx.dosage, "650mg");
        assert_eq!(rx.route, "PO");
        assert_eq!(rx.periodicity, "every 6 hours");
        assert_eq!(rx.duration, "24 hours");
        assert_eq!(rx.total_doses, Some(4));
        assert_eq!(rx.schedule, PrescriptionSchedule::Inactive);
        assert_eq!(out.protocol_instance.state, ProtocolInstanceState::Pending);

        let stored = get_prescription(&f.conn, &rx.id).unwrap().unwrap();
        assert_eq!(stored.schedule, PrescriptionSchedule::Inactive);
    }

    #[test]
    fn dose_precedence_override_then_link_then_medicine() {
        let f = fixture(Some("1g"));
        let out = instantiate(&f.conn, now(), &f.patient, &f.link, &f.trigger_rx, &FollowUpOverrides::default()).unwrap();
        assert_eq!(out.follow_prescription.dosage, "1g");

        let g = fixture(Some("1g"));
        let overrides = FollowUpOverrides {
            dosage: Some("500mg".into()),
            periodicity: Some("every 4 hours".into()),
            route: Some("IV".into()),
            duration: Some("12 hours".into()),
        };
        let out = instantiate(&g.conn, now(), &g.patient, &g.link, &g.trigger_rx, &overrides).unwrap();
        let rx = out.follow_prescription;
        assert_eq!(rx.dosage, "500mg");
        assert_eq!(rx.periodicity, "every 4 hours");
        assert_eq!(rx.route, "IV");
        assert_eq!(rx.duration, "12 hours");
        assert_eq!(rx.total_doses, Some(3));
    }

    #[test]
    fn missing_trigger_prescription() {
        let f = fixture(None);
        let err = instantiate(&f.conn, now(), &f.patient, &f.link, &Uuid::new_v4(), &FollowUpOverrides::default()).unwrap_err();
        assert!(matches!(err, ProtocolError::PrescriptionNotFound(_)));
    }

    #[test]
    fn trigger_for_other_patient() {
        let f = fixture(None);
        let err = instantiate(&f.conn, now(), &Uuid::new_v4(), &f.link, &f.trigger_rx, &FollowUpOverrides::default()).unwrap_err();
        assert!(matches!(err, ProtocolError::PatientMismatch));
    }

    #[test]
    fn missing_link() {
        let f = fixture(None);
        let err = instantiate(&f.conn, now(), &f.patient, &Uuid::new_v4(), &f.trigger_rx, &FollowUpOverrides::default()).unwrap_err();
        assert!(matches!(err, ProtocolError::LinkNotFound(_)));
    }

    #[test]
    fn trigger_medicine_mismatch() {
        let f = fixture(None);
        let other_rx = prescription(&f.conn, f.patient, f.follow_med);
        let err = instantiate(&f.conn, now(), &f.patient, &f.link, &other_rx, &FollowUpOverrides::default()).unwrap_err();
        assert!(matches!(err, ProtocolError::MedicineMismatch));
    }

    #[test]
    fn second_instantiation_is_duplicate_without_side_effects() {
        let f = fixture(None);
        instantiate(&f.conn, now(), &f.patient, &f.link, &f.trigger_rx, &FollowUpOverrides::default()).unwrap();
        let count_rx = |conn: &Connection| -> i64 {
            conn.query_row(
                "SELECT COUNT(*) FROM prescriptions WHERE patient_id = ?1",
                [f.patient.to_string()],
                |row| row.get(0),
            )
            .unwrap()
        };
        let before = count_rx(&f.conn);

        let err = instantiate(&f.conn, now(), &f.patient, &f.link, &f.trigger_rx, &FollowUpOverrides::default()).unwrap_err();
        assert!(matches!(err, ProtocolError::DuplicateInstance));

        let after = count_rx(&f.conn);
        assert_eq!(before, after);
        assert_eq!(list_by_patient(&f.conn, &f.patient).unwrap().len(), 1);
    }

    #[test]
    fn activate_instance_is_one_way() {
        let f = fixture(None);
        let out = instantiate(&f.conn, now(), &f.patient, &f.link, &f.trigger_rx, &FollowUpOverrides::default()).unwrap();
        let id = out.protocol_instance.id;

        assert_eq!(pending_for_trigger(&f.conn, &f.patient, &f.trigger_rx).unwrap().len(), 1);

        let first = activate_instance(&f.conn, &id, now()).unwrap().unwrap();
        assert_eq!(first.state, ProtocolInstanceState::Activated { at: now() });

        assert!(activate_instance(&f.conn, &id, now() + Duration::hours(3)).unwrap().is_none());
        let stored = get_protocol_instance(&f.conn, &id).unwrap().unwrap();
        assert_eq!(stored.state, ProtocolInstanceState::Activated { at: now() });
        assert!(pending_for_trigger(&f.conn, &f.patient, &f.trigger_rx).unwrap().is_empty());
    }

    #[test]
    fn oversized_duration_override_is_uncounted() {
        let f = fixture(None);
        let overrides = FollowUpOverrides {
            duration: Some("999999999999 days".into()),
            ..FollowUpOverrides::default()
        };
        let out = instantiate(&f.conn, now(), &f.patient, &f.link, &f.trigger_rx, &overrides).unwrap();
        assert_eq!(out.follow_prescription.duration, "999999999999 days");
        assert_eq!(out.follow_prescription.total_doses, None);
        assert_eq!(out.follow_prescription.schedule, PrescriptionSchedule::Inactive);
    }

    #[test]
    fn protocol_view_includes_link_timing() {
        let f = fixture(None);
        instantiate(&f.conn, now(), &f.patient, &f.link, &f.trigger_rx, &FollowUpOverrides::default()).unwrap();
        let views = list_protocols_for_patient(&f.conn, &f.patient).unwrap();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].delay_minutes, Some(240));
        assert_eq!(views[0].follow_medicine_id, Some(f.follow_med));
        assert_eq!(views[0].state, ProtocolInstanceState::Pending);
        assert_eq!(views[0].follow_schedule, PrescriptionSchedule::Inactive);
    }

    #[test]
    fn window_starts_after_delay() {
        let (start, end) = follow_up_window(now(), 90, 12).unwrap();
        assert_eq!(start, now() + Duration::minutes(90));
        assert_eq!(end, start + Duration::hours(12));
    }

    #[test]
    fn window_past_time_range_is_none() {
        assert!(follow_up_window(now(), u32::MAX, u32::MAX).is_none());
        assert!(follow_up_window(DateTime::<Utc>::MAX_UTC, 1, 1).is_none());
    }
}
