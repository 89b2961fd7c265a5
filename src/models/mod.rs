pub mod administration;
pub mod audit;
pub mod enums;
pub mod medication_link;
pub mod medicine;
pub mod prescription;
pub mod protocol_instance;

pub use administration::*;
pub use audit::*;
pub use medication_link::*;
pub use medicine::*;
pub use prescription::*;
pub use protocol_instance::*;
