use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{parse_uuid, timestamp_from_sql, timestamp_to_sql};
use crate::db::DatabaseError;
use crate::models::{Prescription, PrescriptionSchedule};

const PRESCRIPTION_COLUMNS: &str = "id, patient_id, medicine_id, dosage, periodicity, duration,
     route, start_date, end_date, total_doses, completed, created_at";

pub fn insert_prescription(conn: &Connection, rx: &Prescription) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO prescriptions (id, patient_id, medicine_id, dosage, periodicity, duration,
         route, start_date, end_date, total_doses, completed, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            rx.id.to_string(),
            rx.patient_id.to_string(),
            rx.medicine_id.to_string(),
            rx.dosage,
            rx.periodicity,
            rx.duration,
            rx.route,
            rx.schedule.start().map(|d| timestamp_to_sql(&d)),
            rx.schedule.end().map(|d| timestamp_to_sql(&d)),
            rx.total_doses,
            rx.completed as i32,
            timestamp_to_sql(&rx.created_at),
        ],
    )
    .map_err(DatabaseError::from_write)?;
    Ok(())
}

pub fn get_prescription(conn: &Connection, id: &Uuid) -> Result<Option<Prescription>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {PRESCRIPTION_COLUMNS} FROM prescriptions WHERE id = ?1"),
            params![id.to_string()],
            prescription_row_from_rusqlite,
        )
        .optional()?;
    row.map(prescription_from_row).transpose()
}

/// Open the administration window of a prescription.
pub fn set_prescription_window(
    conn: &Connection,
    id: &Uuid,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE prescriptions SET start_date = ?2, end_date = ?3 WHERE id = ?1",
        params![id.to_string(), timestamp_to_sql(&start), timestamp_to_sql(&end)],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Prescription".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

pub fn mark_prescription_completed(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE prescriptions SET completed = 1 WHERE id = ?1",
        params![id.to_string()],
    )?;
    Ok(())
}

// Internal row type for Prescription mapping
struct PrescriptionRow {
    id: String,
    patient_id: String,
    medicine_id: String,
    dosage: String,
    periodicity: String,
    duration: String,
    route: String,
    start_date: Option<String>,
    end_date: Option<String>,
    total_doses: Option<u32>,
    completed: i32,
    created_at: String,
}

fn prescription_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<PrescriptionRow, rusqlite::Error> {
    Ok(PrescriptionRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        medicine_id: row.get(2)?,
        dosage: row.get(3)?,
        periodicity: row.get(4)?,
        duration: row.get(5)?,
        route: row.get(6)?,
        start_date: row.get(7)?,
        end_date: row.get(8)?,
        total_doses: row.get(9)?,
        completed: row.get(10)?,
        created_at: row.get(11)?,
    })
}

fn prescription_from_row(row: PrescriptionRow) -> Result<Prescription, DatabaseError> {
    let start = row
        .start_date
        .map(|s| timestamp_from_sql("start_date", &s))
        .transpose()?;
    let end = row
        .end_date
        .map(|s| timestamp_from_sql("end_date", &s))
        .transpose()?;

    Ok(Prescription {
        id: parse_uuid(&row.id)?,
        patient_id: parse_uuid(&row.patient_id)?,
        medicine_id: parse_uuid(&row.medicine_id)?,
        dosage: row.dosage,
        periodicity: row.periodicity,
        duration: row.duration,
        route: row.route,
        schedule: PrescriptionSchedule::from_columns(start, end),
        total_doses: row.total_doses,
        completed: row.completed != 0,
        created_at: timestamp_from_sql("created_at", &row.created_at)?,
    })
}
