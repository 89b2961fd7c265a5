use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::parse_uuid;
use crate::db::DatabaseError;
use crate::models::Medicine;

type MedicineRow = (String, String, String, String);

fn medicine_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MedicineRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn medicine_from_row((id, name, default_dose, default_route): MedicineRow) -> Result<Medicine, DatabaseError> {
    Ok(Medicine {
        id: parse_uuid(&id)?,
        name,
        default_dose,
        default_route,
    })
}

pub fn insert_medicine(conn: &Connection, med: &Medicine) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO medicines (id, name, default_dose, default_route) VALUES (?1, ?2, ?3, ?4)",
        params![med.id.to_string(), med.name, med.default_dose, med.default_route],
    )
    .map_err(DatabaseError::from_write)?;
    Ok(())
}

pub fn get_medicine(conn: &Connection, id: &Uuid) -> Result<Option<Medicine>, DatabaseError> {
    conn.query_row(
        "SELECT id, name, default_dose, default_route FROM medicines WHERE id = ?1",
        params![id.to_string()],
        medicine_row,
    )
    .optional()?
    .map(medicine_from_row)
    .transpose()
}

/// Catalog listing ordered by name.
pub fn list_medicines(conn: &Connection) -> Result<Vec<Medicine>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, name, default_dose, default_route FROM medicines ORDER BY name COLLATE NOCASE, id",
    )?;
    let rows = stmt.query_map([], medicine_row)?;

    let mut medicines = Vec::new();
    for row in rows {
        medicines.push(medicine_from_row(row?)?);
    }
    Ok(medicines)
}

/// Display name for operator messages, falling back to the id.
pub fn medicine_display_name(conn: &Connection, id: &Uuid) -> String {
    conn.query_row(
        "SELECT name FROM medicines WHERE id = ?1",
        params![id.to_string()],
        |row| row.get::<_, String>(0),
    )
    .unwrap_or_else(|_| id.to_string())
}
