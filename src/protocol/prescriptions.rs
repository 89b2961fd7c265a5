//! Prescription writing and dose bookkeeping.

use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;
use uuid::Uuid;

use super::dosing;
use super::ProtocolError;
use crate::config::MAX_ORDER_SPAN_DAYS;
use crate::db::repository::{
    count_administered_for_prescription, get_medicine, get_prescription, insert_prescription,
    mark_prescription_completed,
};
use crate::models::{Prescription, PrescriptionInput, PrescriptionSchedule};

/// Write a prescription that is administrable from `now` for its duration.
pub fn create_prescription(
    conn: &Connection,
    now: DateTime<Utc>,
    input: &PrescriptionInput,
) -> Result<Prescription, ProtocolError> {
    if get_medicine(conn, &input.medicine_id)?.is_none() {
        return Err(ProtocolError::MedicineNotFound(input.medicine_id));
    }
    for (field, value) in [
        ("dosage", &input.dosage),
        ("periodicity", &input.periodicity),
        ("route", &input.route),
    ] {
        if value.trim().is_empty() {
            return Err(ProtocolError::InvalidPrescription(format!("{field} is required")));
        }
    }
    let span = dosing::parse_span(&input.duration).ok_or_else(|| {
        ProtocolError::InvalidPrescription(format!("unrecognised duration: {}", input.duration))
    })?;
    let end = now
        .checked_add_signed(span)
        .filter(|_| span <= Duration::days(MAX_ORDER_SPAN_DAYS))
        .ok_or_else(|| {
            ProtocolError::InvalidPrescription(format!(
                "duration exceeds {MAX_ORDER_SPAN_DAYS} days: {}",
                input.duration
            ))
        })?;

    let rx = Prescription {
        id: Uuid::new_v4(),
        patient_id: input.patient_id,
        medicine_id: input.medicine_id,
        dosage: input.dosage.trim().to_string(),
        periodicity: input.periodicity.trim().to_string(),
        duration: input.duration.trim().to_string(),
        route: input.route.trim().to_string(),
        schedule: PrescriptionSchedule::Active {
            start: now,
            end,
        },
        total_doses: dosing::total_doses(&input.periodicity, &input.duration),
        completed: false,
        created_at: now,
    };
    insert_prescription(conn, &rx)?;
    tracing::info!(prescription_id = %rx.id, total_doses = ?rx.total_doses, "Prescription written");
    Ok(rx)
}

pub fn get(conn: &Connection, prescription_id: &Uuid) -> Result<Prescription, ProtocolError> {
    get_prescription(conn, prescription_id)?.ok_or(ProtocolError::PrescriptionNotFound(*prescription_id))
}

/// Mark the prescription completed once every counted dose has been given.
/// Returns whether the prescription is now completed.
pub fn update_completion(conn: &Connection, prescription_id: &Uuid) -> Result<bool, ProtocolError> {
    let rx = get(conn, prescription_id)?;
    if rx.completed {
        return Ok(true);
    }
    let Some(total) = rx.total_doses else {
        return Ok(false);
    };

    let given = count_administered_for_prescription(conn, prescription_id)?;
    if given >= total {
        mark_prescription_completed(conn, prescription_id)?;
        tracing::info!(prescription_id = %prescription_id, given, "Prescription completed");
        return Ok(true);
    }
    Ok(false)
}

/// Doses still to give. `None` for as-needed orders.
pub fn doses_remaining(conn: &Connection, prescription_id: &Uuid) -> Result<Option<u32>, ProtocolError> {
    let rx = get(conn, prescription_id)?;
    let given = count_administered_for_prescription(conn, prescription_id)?;
    Ok(dosing::doses_remaining(rx.total_doses, given))
}
