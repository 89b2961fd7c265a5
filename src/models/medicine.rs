use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Catalog entry. Only the fields the protocol engine reads are modelled;
/// the full formulary lives with the CRUD layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Medicine {
    pub id: Uuid,
    pub name: String,
    pub default_dose: String,
    pub default_route: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicineInput {
    pub name: String,
    pub default_dose: String,
    pub default_route: String,
}
