//! Medication protocol engine.
//!
//! A [`MedicationLink`](crate::models::MedicationLink) says "after the trigger
//! medicine is given, the follow-up medicine becomes due". Writing a trigger
//! prescription lets a clinician instantiate the link for one patient, which
//! creates an inactive follow-up prescription and a pending
//! [`ProtocolInstance`](crate::models::ProtocolInstance). The guard decides
//! whether a dose may be recorded; the activator opens the follow-up window
//! once the trigger has actually been given.

pub mod activator;
pub mod catalog;
pub mod dosing;
pub mod guard;
pub mod instances;
pub mod links;
pub mod prescriptions;
pub mod service;
pub mod wait;

use thiserror::Error;
use uuid::Uuid;

use crate::db::DatabaseError;

pub use activator::{activate_protocols, ActivatedProtocol, ActivationFailure, ActivationReport};
pub use guard::{check_follow_up_status, evaluate, FollowUpStatus, GuardDecision, Rejection, RejectionDetails};
pub use instances::{instantiate, InstantiatedProtocol, ProtocolView};
pub use service::{ProtocolContext, RecordOutcome, RecordedAdministration};

/// Configuration and lookup failures reported synchronously to the caller.
///
/// Guard rejections are not errors; they are [`Rejection`] values.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Prescription not found: {0}")]
    PrescriptionNotFound(Uuid),

    #[error("Medicine not found: {0}")]
    MedicineNotFound(Uuid),

    #[error("Follow-up medicine not found: {0}")]
    FollowMedicineNotFound(Uuid),

    #[error("Medication link not found: {0}")]
    LinkNotFound(Uuid),

    #[error("Administration not found: {0}")]
    AdministrationNotFound(Uuid),

    #[error("Prescription belongs to a different patient")]
    PatientMismatch,

    #[error("Prescription medicine does not match the link trigger medicine")]
    MedicineMismatch,

    #[error("Protocol already instantiated for this link and trigger prescription")]
    DuplicateInstance,

    #[error("Medication link is referenced by {instances} protocol instance(s)")]
    LinkInUse { link_id: Uuid, instances: u32 },

    #[error("Invalid medication link: {0}")]
    InvalidLink(String),

    #[error("Invalid prescription: {0}")]
    InvalidPrescription(String),

    #[error("Invalid medicine: {0}")]
    InvalidMedicine(String),
}

impl ProtocolError {
    /// Stable code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Database(_) => "DATABASE_ERROR",
            Self::PrescriptionNotFound(_)
            | Self::MedicineNotFound(_)
            | Self::LinkNotFound(_)
            | Self::AdministrationNotFound(_) => "NOT_FOUND",
            Self::FollowMedicineNotFound(_) => "FOLLOW_MEDICINE_NOT_FOUND",
            Self::PatientMismatch => "PATIENT_MISMATCH",
            Self::MedicineMismatch => "MEDICINE_MISMATCH",
            Self::DuplicateInstance => "DUPLICATE",
            Self::LinkInUse { .. } => "LINK_IN_USE",
            Self::InvalidLink(_) | Self::InvalidPrescription(_) | Self::InvalidMedicine(_) => "VALIDATION_ERROR",
        }
    }
}
