use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(AdministrationStatus {
    Administered => "administered",
    Refused => "refused",
    Held => "held",
    Missed => "missed",
});

str_enum!(RejectionCode {
    PrescriptionNotFound => "PRESCRIPTION_NOT_FOUND",
    PatientIdMismatch => "PATIENT_ID_MISMATCH",
    MedicineIdMismatch => "MEDICINE_ID_MISMATCH",
    FollowUpBlocked => "FOLLOW_UP_BLOCKED",
    ProtocolTimingTooEarly => "PROTOCOL_TIMING_TOO_EARLY",
    PrescriptionVerificationFailed => "PRESCRIPTION_VERIFICATION_FAILED",
    ValidationFailed => "VALIDATION_FAILED",
});

str_enum!(AuditAction {
    AdministrationRejected => "administration_rejected",
    AdministrationRecorded => "administration_recorded",
    AdministrationDeleted => "administration_deleted",
    ProtocolInstantiated => "protocol_instantiated",
    ProtocolActivated => "protocol_activated",
    ProtocolActivationFailed => "protocol_activation_failed",
    LinkCreated => "link_created",
    LinkUpdated => "link_updated",
    LinkDeleted => "link_deleted",
    ClockAdvanced => "clock_advanced",
    ClockReset => "clock_reset",
});

impl RejectionCode {
    /// Identity and integrity failures indicate tampering or client bugs;
    /// sequencing failures are routine during training.
    pub fn is_integrity_failure(&self) -> bool {
        matches!(
            self,
            Self::PrescriptionNotFound
                | Self::PatientIdMismatch
                | Self::MedicineIdMismatch
                | Self::PrescriptionVerificationFailed
                | Self::ValidationFailed
        )
    }
}
