//! API middleware stack.
//!
//! Execution order (outermost → innermost):
//! 1. Access log: method, path, status, latency
//! 2. Actor: `X-Acting-User` → `ActingUser` extension
//! 3. Instructor gate (time travel and deletion routes only)

pub mod access_log;
pub mod actor;
pub mod instructor;
