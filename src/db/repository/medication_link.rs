use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{parse_uuid, timestamp_from_sql, timestamp_to_sql};
use crate::db::DatabaseError;
use crate::models::MedicationLink;

const LINK_COLUMNS: &str = "id, trigger_medicine_id, follow_medicine_id, delay_minutes,
     follow_frequency, follow_duration_hours, default_dose_override, created_at";

pub fn insert_medication_link(conn: &Connection, link: &MedicationLink) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO medication_links (id, trigger_medicine_id, follow_medicine_id, delay_minutes,
         follow_frequency, follow_duration_hours, default_dose_override, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            link.id.to_string(),
            link.trigger_medicine_id.to_string(),
            link.follow_medicine_id.to_string(),
            link.delay_minutes,
            link.follow_frequency,
            link.follow_duration_hours,
            link.default_dose_override,
            timestamp_to_sql(&link.created_at),
        ],
    )
    .map_err(DatabaseError::from_write)?;
    Ok(())
}

/// Replace the editable fields of an existing link.
pub fn update_medication_link(conn: &Connection, link: &MedicationLink) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE medication_links SET trigger_medicine_id = ?2, follow_medicine_id = ?3,
         delay_minutes = ?4, follow_frequency = ?5, follow_duration_hours = ?6,
         default_dose_override = ?7
         WHERE id = ?1",
        params![
            link.id.to_string(),
            link.trigger_medicine_id.to_string(),
            link.follow_medicine_id.to_string(),
            link.delay_minutes,
            link.follow_frequency,
            link.follow_duration_hours,
            link.default_dose_override,
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "MedicationLink".into(),
            id: link.id.to_string(),
        });
    }
    Ok(())
}

pub fn get_medication_link(conn: &Connection, id: &Uuid) -> Result<Option<MedicationLink>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {LINK_COLUMNS} FROM medication_links WHERE id = ?1"),
            params![id.to_string()],
            link_row_from_rusqlite,
        )
        .optional()?;
    row.map(link_from_row).transpose()
}

pub fn list_medication_links(conn: &Connection) -> Result<Vec<MedicationLink>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {LINK_COLUMNS} FROM medication_links ORDER BY created_at ASC"
    ))?;
    let rows = stmt.query_map([], link_row_from_rusqlite)?;

    let mut links = Vec::new();
    for row in rows {
        links.push(link_from_row(row?)?);
    }
    Ok(links)
}

/// Protocols that apply when the given medicine is prescribed as a trigger.
pub fn get_medication_links_by_trigger(
    conn: &Connection,
    trigger_medicine_id: &Uuid,
) -> Result<Vec<MedicationLink>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {LINK_COLUMNS} FROM medication_links
         WHERE trigger_medicine_id = ?1 ORDER BY created_at ASC"
    ))?;
    let rows = stmt.query_map(params![trigger_medicine_id.to_string()], link_row_from_rusqlite)?;

    let mut links = Vec::new();
    for row in rows {
        links.push(link_from_row(row?)?);
    }
    Ok(links)
}

/// Returns `false` when no link had the id.
pub fn delete_medication_link(conn: &Connection, id: &Uuid) -> Result<bool, DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM medication_links WHERE id = ?1",
        params![id.to_string()],
    )?;
    Ok(deleted > 0)
}

// Internal row type for MedicationLink mapping
struct LinkRow {
    id: String,
    trigger_medicine_id: String,
    follow_medicine_id: String,
    delay_minutes: u32,
    follow_frequency: String,
    follow_duration_hours: u32,
    default_dose_override: Option<String>,
    created_at: String,
}

fn link_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<LinkRow, rusqlite::Error> {
    Ok(LinkRow {
        id: row.get(0)?,
        trigger_medicine_id: row.get(1)?,
        follow_medicine_id: row.get(2)?,
        delay_minutes: row.get(3)?,
        follow_frequency: row.get(4)?,
        follow_duration_hours: row.get(5)?,
        default_dose_override: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn link_from_row(row: LinkRow) -> Result<MedicationLink, DatabaseError> {
    Ok(MedicationLink {
        id: parse_uuid(&row.id)?,
        trigger_medicine_id: parse_uuid(&row.trigger_medicine_id)?,
        follow_medicine_id: parse_uuid(&row.follow_medicine_id)?,
        delay_minutes: row.delay_minutes,
        follow_frequency: row.follow_frequency,
        follow_duration_hours: row.follow_duration_hours,
        default_dose_override: row.default_dose_override,
        created_at: timestamp_from_sql("created_at", &row.created_at)?,
    })
}
