//! Medicine catalog: the defaults a follow-up order inherits.

use rusqlite::Connection;
use uuid::Uuid;

use super::ProtocolError;
use crate::db::repository::{get_medicine, insert_medicine, list_medicines};
use crate::models::{Medicine, MedicineInput};

pub fn create_medicine(conn: &Connection, input: &MedicineInput) -> Result<Medicine, ProtocolError> {
    for (field, value) in [
        ("name", &input.name),
        ("default_dose", &input.default_dose),
        ("default_route", &input.default_route),
    ] {
        if value.trim().is_empty() {
            return Err(ProtocolError::InvalidMedicine(format!("{field} is required")));
        }
    }

    let medicine = Medicine {
        id: Uuid::new_v4(),
        name: input.name.trim().to_string(),
        default_dose: input.default_dose.trim().to_string(),
        default_route: input.default_route.trim().to_string(),
    };
    insert_medicine(conn, &medicine)?;
    tracing::info!(medicine_id = %medicine.id, "Medicine added to catalog");
    Ok(medicine)
}

pub fn get(conn: &Connection, id: &Uuid) -> Result<Medicine, ProtocolError> {
    get_medicine(conn, id)?.ok_or(ProtocolError::MedicineNotFound(*id))
}

pub fn list(conn: &Connection) -> Result<Vec<Medicine>, ProtocolError> {
    Ok(list_medicines(conn)?)
}
