//! API endpoint handlers.
//!
//! Handlers stay thin: they borrow a `ProtocolContext` from `CoreState` and
//! call the matching boundary operation.

pub mod administrations;
pub mod catalog;
pub mod clock;
pub mod health;
pub mod links;
pub mod protocols;
