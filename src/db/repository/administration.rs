use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{parse_uuid, timestamp_from_sql, timestamp_to_sql};
use crate::db::DatabaseError;
use crate::models::enums::AdministrationStatus;
use crate::models::Administration;

const ADMINISTRATION_COLUMNS: &str =
    "id, patient_id, medicine_id, prescription_id, status, administered_by, administered_at, message";

pub fn insert_administration(conn: &Connection, admin: &Administration) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO administrations (id, patient_id, medicine_id, prescription_id, status,
         administered_by, administered_at, message)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            admin.id.to_string(),
            admin.patient_id.to_string(),
            admin.medicine_id.to_string(),
            admin.prescription_id.map(|id| id.to_string()),
            admin.status.as_str(),
            admin.administered_by,
            timestamp_to_sql(&admin.administered_at),
            admin.message,
        ],
    )
    .map_err(DatabaseError::from_write)?;
    Ok(())
}

pub fn get_administration(conn: &Connection, id: &Uuid) -> Result<Option<Administration>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {ADMINISTRATION_COLUMNS} FROM administrations WHERE id = ?1"),
            params![id.to_string()],
            administration_row_from_rusqlite,
        )
        .optional()?;
    row.map(administration_from_row).transpose()
}

/// Most recent dose actually given against a prescription for a patient.
pub fn latest_administered_for_prescription(
    conn: &Connection,
    patient_id: &Uuid,
    prescription_id: &Uuid,
) -> Result<Option<Administration>, DatabaseError> {
    let row = conn
        .query_row(
            &format!(
                "SELECT {ADMINISTRATION_COLUMNS} FROM administrations
                 WHERE patient_id = ?1 AND prescription_id = ?2 AND status = 'administered'
                 ORDER BY administered_at DESC LIMIT 1"
            ),
            params![patient_id.to_string(), prescription_id.to_string()],
            administration_row_from_rusqlite,
        )
        .optional()?;
    row.map(administration_from_row).transpose()
}

pub fn count_administered_for_prescription(
    conn: &Connection,
    prescription_id: &Uuid,
) -> Result<u32, DatabaseError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM administrations WHERE prescription_id = ?1 AND status = 'administered'",
        params![prescription_id.to_string()],
        |row| row.get::<_, u32>(0),
    )?;
    Ok(count)
}

/// Returns `false` when no administration had the id.
pub fn delete_administration(conn: &Connection, id: &Uuid) -> Result<bool, DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM administrations WHERE id = ?1",
        params![id.to_string()],
    )?;
    Ok(deleted > 0)
}

// Internal row type for Administration mapping
struct AdministrationRow {
    id: String,
    patient_id: String,
    medicine_id: String,
    prescription_id: Option<String>,
    status: String,
    administered_by: String,
    administered_at: String,
    message: Option<String>,
}

fn administration_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<AdministrationRow, rusqlite::Error> {
    Ok(AdministrationRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        medicine_id: row.get(2)?,
        prescription_id: row.get(3)?,
        status: row.get(4)?,
        administered_by: row.get(5)?,
        administered_at: row.get(6)?,
        message: row.get(7)?,
    })
}

fn administration_from_row(row: AdministrationRow) -> Result<Administration, DatabaseError> {
    Ok(Administration {
        id: parse_uuid(&row.id)?,
        patient_id: parse_uuid(&row.patient_id)?,
        medicine_id: parse_uuid(&row.medicine_id)?,
        prescription_id: row.prescription_id.as_deref().map(parse_uuid).transpose()?,
        status: AdministrationStatus::from_str(&row.status)?,
        administered_by: row.administered_by,
        administered_at: timestamp_from_sql("administered_at", &row.administered_at)?,
        message: row.message,
    })
}
