//! Repository layer: entity-scoped database operations.
//!
//! All public functions are re-exported here so callers can use
//! `crate::db::repository::*` without knowing the sub-module layout.

mod administration;
mod audit;
mod medication_link;
mod medicine;
mod prescription;
mod protocol_instance;

use uuid::Uuid;

use super::sqlite::{timestamp_from_sql, timestamp_to_sql};
use super::DatabaseError;

pub use administration::*;
pub use audit::*;
pub use medication_link::*;
pub use medicine::*;
pub use prescription::*;
pub use protocol_instance::*;

/// Parse a stored UUID column. Stored ids are always written by this crate,
/// so a parse failure means the row was edited out of band.
fn parse_uuid(value: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(value).map_err(|_| DatabaseError::InvalidId(value.to_string()))
}
