//! Shared process state.
//!
//! `CoreState` owns the single SQLite connection, the virtual clock and the
//! audit buffer. It is wrapped in `Arc` at startup and shared by every HTTP
//! handler. Requests borrow the connection through [`CoreState::with_protocol`],
//! which hands the protocol engine a fully wired [`ProtocolContext`].

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::Connection;

use crate::audit::AuditLogger;
use crate::clock::{Clock, ClockStatus, VirtualClock};
use crate::config::AppConfig;
use crate::db;
use crate::models::AuditEntry;
use crate::protocol::service::{self, ProtocolContext};

// ═══════════════════════════════════════════════════════════
// CoreState
// ═══════════════════════════════════════════════════════════

pub struct CoreState {
    /// One connection; SQLite serialises writers anyway.
    db: Mutex<Connection>,
    clock: Arc<VirtualClock>,
    audit: AuditLogger,
    /// `None` disables instructor-only routes.
    instructor_pin: Option<String>,
}

impl CoreState {
    /// Open the configured database and start on real time.
    pub fn open(config: &AppConfig) -> Result<Self, CoreError> {
        let conn = db::open_database(&config.db_path)?;
        tracing::info!(path = %config.db_path.display(), "Database opened");
        Ok(Self::with_connection(
            conn,
            VirtualClock::new(),
            config.instructor_pin.clone(),
        ))
    }

    /// Build around an existing connection and clock (tests, tooling).
    pub fn with_connection(conn: Connection, clock: VirtualClock, instructor_pin: Option<String>) -> Self {
        Self {
            db: Mutex::new(conn),
            clock: Arc::new(clock),
            audit: AuditLogger::new(),
            instructor_pin,
        }
    }

    // ── Database access ─────────────────────────────────────

    pub fn lock_db(&self) -> Result<MutexGuard<'_, Connection>, CoreError> {
        self.db.lock().map_err(|_| CoreError::LockPoisoned)
    }

    /// Run `f` with a protocol context bound to `actor`.
    pub fn with_protocol<T>(
        &self,
        actor: &str,
        f: impl FnOnce(&ProtocolContext<'_>) -> T,
    ) -> Result<T, CoreError> {
        let conn = self.lock_db()?;
        let ctx = ProtocolContext::new(&conn, self.clock.as_ref(), &self.audit, actor);
        Ok(f(&ctx))
    }

    // ── Virtual clock ───────────────────────────────────────

    pub fn clock(&self) -> &VirtualClock {
        &self.clock
    }

    pub fn clock_status(&self) -> ClockStatus {
        self.clock.status()
    }

    pub fn advance_clock(&self, actor: &str, hours: u32, minutes: u32) -> Result<ClockStatus, CoreError> {
        let status = service::advance_virtual_clock(&self.clock, &self.audit, actor, hours, minutes);
        self.flush_audit()?;
        Ok(status)
    }

    pub fn reset_clock(&self, actor: &str) -> Result<ClockStatus, CoreError> {
        let status = service::reset_virtual_clock(&self.clock, &self.audit, actor);
        self.flush_audit()?;
        Ok(status)
    }

    // ── Instructor gate ─────────────────────────────────────

    pub fn instructor_pin(&self) -> Option<&str> {
        self.instructor_pin.as_deref()
    }

    // ── Audit ───────────────────────────────────────────────

    /// Get buffered audit entries (for testing).
    pub fn audit_entries(&self) -> Vec<AuditEntry> {
        self.audit.entries()
    }

    pub fn flush_audit(&self) -> Result<(), CoreError> {
        let conn = self.lock_db()?;
        self.audit.flush_to_db(&conn)?;
        Ok(())
    }

    /// Flush buffered audit entries and prune by wall-clock retention.
    /// Simulated time never ages out the trail.
    pub fn flush_and_prune_audit(&self) -> Result<(), CoreError> {
        let conn = self.lock_db()?;
        self.audit.flush_and_prune(&conn, Utc::now())?;
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════
// Error types
// ═══════════════════════════════════════════════════════════

/// Errors from CoreState operations.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Internal lock error")]
    LockPoisoned,
    #[error("Database error: {0}")]
    Database(#[from] db::DatabaseError),
}
