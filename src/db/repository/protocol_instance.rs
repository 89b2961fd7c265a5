use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{parse_uuid, timestamp_from_sql, timestamp_to_sql};
use crate::db::DatabaseError;
use crate::models::{ProtocolInstance, ProtocolInstanceState};

const INSTANCE_COLUMNS: &str =
    "id, patient_id, link_id, trigger_prescription_id, follow_prescription_id, activated_at, created_at";

/// Insert a new instance. A second instance for the same
/// (link, trigger prescription) pair fails with `UniqueViolation`.
pub fn insert_protocol_instance(conn: &Connection, inst: &ProtocolInstance) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO protocol_instances (id, patient_id, link_id, trigger_prescription_id,
         follow_prescription_id, activated_at, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            inst.id.to_string(),
            inst.patient_id.to_string(),
            inst.link_id.to_string(),
            inst.trigger_prescription_id.to_string(),
            inst.follow_prescription_id.to_string(),
            inst.state.activated_at().map(|d| timestamp_to_sql(&d)),
            timestamp_to_sql(&inst.created_at),
        ],
    )
    .map_err(DatabaseError::from_write)?;
    Ok(())
}

pub fn get_protocol_instance(conn: &Connection, id: &Uuid) -> Result<Option<ProtocolInstance>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {INSTANCE_COLUMNS} FROM protocol_instances WHERE id = ?1"),
            params![id.to_string()],
            instance_row_from_rusqlite,
        )
        .optional()?;
    row.map(instance_from_row).transpose()
}

pub fn list_protocol_instances_by_patient(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<ProtocolInstance>, DatabaseError> {
    query_instances(
        conn,
        &format!(
            "SELECT {INSTANCE_COLUMNS} FROM protocol_instances
             WHERE patient_id = ?1 ORDER BY created_at ASC"
        ),
        &[&patient_id.to_string()],
    )
}

/// Existing instance for a (patient, link, trigger prescription) triple.
pub fn find_protocol_instance(
    conn: &Connection,
    patient_id: &Uuid,
    link_id: &Uuid,
    trigger_prescription_id: &Uuid,
) -> Result<Option<ProtocolInstance>, DatabaseError> {
    let mut found = query_instances(
        conn,
        &format!(
            "SELECT {INSTANCE_COLUMNS} FROM protocol_instances
             WHERE patient_id = ?1 AND link_id = ?2 AND trigger_prescription_id = ?3"
        ),
        &[
            &patient_id.to_string(),
            &link_id.to_string(),
            &trigger_prescription_id.to_string(),
        ],
    )?;
    Ok(found.pop())
}

/// Pending instances waiting on the given trigger prescription.
pub fn find_pending_by_trigger(
    conn: &Connection,
    patient_id: &Uuid,
    trigger_prescription_id: &Uuid,
) -> Result<Vec<ProtocolInstance>, DatabaseError> {
    query_instances(
        conn,
        &format!(
            "SELECT {INSTANCE_COLUMNS} FROM protocol_instances
             WHERE patient_id = ?1 AND trigger_prescription_id = ?2 AND activated_at IS NULL
             ORDER BY created_at ASC"
        ),
        &[&patient_id.to_string(), &trigger_prescription_id.to_string()],
    )
}

/// Transition a pending instance to activated.
/// Returns `false` if the instance was already activated (or missing).
pub fn mark_instance_activated(
    conn: &Connection,
    id: &Uuid,
    activated_at: DateTime<Utc>,
) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE protocol_instances SET activated_at = ?2 WHERE id = ?1 AND activated_at IS NULL",
        params![id.to_string(), timestamp_to_sql(&activated_at)],
    )?;
    Ok(changed == 1)
}

pub fn count_instances_for_link(conn: &Connection, link_id: &Uuid) -> Result<u32, DatabaseError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM protocol_instances WHERE link_id = ?1",
        params![link_id.to_string()],
        |row| row.get::<_, u32>(0),
    )?;
    Ok(count)
}

fn query_instances(
    conn: &Connection,
    sql: &str,
    args: &[&dyn rusqlite::types::ToSql],
) -> Result<Vec<ProtocolInstance>, DatabaseError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(args, instance_row_from_rusqlite)?;

    let mut instances = Vec::new();
    for row in rows {
        instances.push(instance_from_row(row?)?);
    }
    Ok(instances)
}

// Internal row type for ProtocolInstance mapping
struct InstanceRow {
    id: String,
    patient_id: String,
    link_id: String,
    trigger_prescription_id: String,
    follow_prescription_id: String,
    activated_at: Option<String>,
    created_at: String,
}

fn instance_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<InstanceRow, rusqlite::Error> {
    Ok(InstanceRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        link_id: row.get(2)?,
        trigger_prescription_id: row.get(3)?,
        follow_prescription_id: row.get(4)?,
        activated_at: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn instance_from_row(row: InstanceRow) -> Result<ProtocolInstance, DatabaseError> {
    let activated_at = row
        .activated_at
        .map(|s| timestamp_from_sql("activated_at", &s))
        .transpose()?;

    Ok(ProtocolInstance {
        id: parse_uuid(&row.id)?,
        patient_id: parse_uuid(&row.patient_id)?,
        link_id: parse_uuid(&row.link_id)?,
        trigger_prescription_id: parse_uuid(&row.trigger_prescription_id)?,
        follow_prescription_id: parse_uuid(&row.follow_prescription_id)?,
        state: ProtocolInstanceState::from_column(activated_at),
        created_at: timestamp_from_sql("created_at", &row.created_at)?,
    })
}
