//! Safety-training audit trail.
//!
//! Rejections, activations and instructor actions are buffered in memory and
//! flushed to SQLite when the buffer fills or when a guarded operation
//! completes. Entries carry ids and timing values only.

use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;

use crate::config::{AUDIT_BUFFER_CAPACITY, AUDIT_RETENTION_DAYS};
use crate::db::repository::{insert_audit_entries, prune_audit_log};
use crate::db::DatabaseError;
use crate::models::enums::{AuditAction, RejectionCode};
use crate::models::AuditEntry;

/// In-memory audit log buffer. Entries are flushed to SQLite
/// when the buffer reaches capacity or on explicit flush.
pub struct AuditLogger {
    buffer: Mutex<Vec<AuditEntry>>,
}

impl AuditLogger {
    pub fn new() -> Self {
        Self {
            buffer: Mutex::new(Vec::with_capacity(AUDIT_BUFFER_CAPACITY)),
        }
    }

    /// Append an entry to the buffer.
    /// Returns `true` if the buffer has reached flush threshold.
    pub fn log(
        &self,
        timestamp: DateTime<Utc>,
        actor: &str,
        action: AuditAction,
        reason_code: Option<RejectionCode>,
        entity: String,
        detail: serde_json::Value,
    ) -> bool {
        match self.buffer.lock() {
            Ok(mut buf) => {
                buf.push(AuditEntry {
                    timestamp,
                    actor: actor.to_string(),
                    action,
                    reason_code,
                    entity,
                    detail,
                });
                buf.len() >= AUDIT_BUFFER_CAPACITY
            }
            Err(_) => {
                tracing::error!(action = action.as_str(), "Audit buffer lock poisoned, entry dropped");
                false
            }
        }
    }

    /// Get all buffered entries (for testing or manual flush).
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.buffer
            .lock()
            .map(|buf| buf.clone())
            .unwrap_or_default()
    }

    /// Drain all buffered entries (for flush to SQLite).
    pub fn drain(&self) -> Vec<AuditEntry> {
        self.buffer
            .lock()
            .map(|mut buf| buf.drain(..).collect())
            .unwrap_or_default()
    }

    /// Current buffer size.
    pub fn buffer_len(&self) -> usize {
        self.buffer.lock().map(|buf| buf.len()).unwrap_or(0)
    }

    /// Flush buffered entries to SQLite. On failure the entries are put
    /// back so a later flush can retry them.
    pub fn flush_to_db(&self, conn: &Connection) -> Result<usize, DatabaseError> {
        let entries = self.drain();
        if entries.is_empty() {
            return Ok(0);
        }

        if let Err(e) = insert_audit_entries(conn, &entries) {
            if let Ok(mut buf) = self.buffer.lock() {
                let newer: Vec<AuditEntry> = buf.drain(..).collect();
                buf.extend(entries);
                buf.extend(newer);
            }
            return Err(e);
        }

        let count = entries.len();
        tracing::debug!(count, "Flushed audit entries to database");
        Ok(count)
    }

    /// Flush and drop rows older than the retention window before `now`.
    /// Callers pass wall-clock time.
    pub fn flush_and_prune(&self, conn: &Connection, now: DateTime<Utc>) -> Result<usize, DatabaseError> {
        let flushed = self.flush_to_db(conn)?;
        let cutoff = now - Duration::days(AUDIT_RETENTION_DAYS);
        if let Err(e) = prune_audit_log(conn, cutoff) {
            tracing::warn!("Failed to prune audit log: {e}");
        }
        Ok(flushed)
    }
}

impl Default for AuditLogger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::query_audit_by_actor;
    use crate::db::sqlite::open_memory_database;
    use chrono::TimeZone;
    use serde_json::json;

    fn at(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 1, h, 0, 0).unwrap()
    }

    #[test]
    fn audit_logger_records_entries() {
        let logger = AuditLogger::new();
        assert_eq!(logger.buffer_len(), 0);

        logger.log(
            at(9),
            "nurse.kim",
            AuditAction::AdministrationRejected,
            Some(RejectionCode::FollowUpBlocked),
            "prescription:abc".into(),
            json!({ "trigger_prescription_id": "def" }),
        );
        assert_eq!(logger.buffer_len(), 1);

        let entries = logger.entries();
        assert_eq!(entries[0].actor, "nurse.kim");
        assert_eq!(entries[0].reason_code, Some(RejectionCode::FollowUpBlocked));
        assert_eq!(entries[0].detail["trigger_prescription_id"], "def");
    }

    #[test]
    fn audit_logger_drain_clears_buffer() {
        let logger = AuditLogger::new();
        logger.log(at(9), "a", AuditAction::ClockReset, None, "clock".into(), json!({}));
        logger.log(at(9), "a", AuditAction::ClockReset, None, "clock".into(), json!({}));
        assert_eq!(logger.drain().len(), 2);
        assert_eq!(logger.buffer_len(), 0);
    }

    #[test]
    fn audit_log_returns_true_at_capacity() {
        let logger = AuditLogger::new();
        for i in 0..(AUDIT_BUFFER_CAPACITY - 1) {
            let needs_flush = logger.log(
                at(9),
                "a",
                AuditAction::ClockAdvanced,
                None,
                format!("clock:{i}"),
                json!({}),
            );
            assert!(!needs_flush, "Should not signal flush at {i}");
        }
        let needs_flush =
            logger.log(at(9), "a", AuditAction::ClockAdvanced, None, "clock".into(), json!({}));
        assert!(needs_flush, "Should signal flush at capacity");
    }

    #[test]
    fn flush_to_db_persists_entries() {
        let conn = open_memory_database().unwrap();
        let logger = AuditLogger::new();
        logger.log(
            at(10),
            "instructor",
            AuditAction::ClockAdvanced,
            None,
            "clock".into(),
            json!({ "hours": 8 }),
        );
        logger.log(
            at(11),
            "instructor",
            AuditAction::ClockReset,
            None,
            "clock".into(),
            json!({}),
        );

        assert_eq!(logger.flush_to_db(&conn).unwrap(), 2);
        assert_eq!(logger.buffer_len(), 0);

        let rows = query_audit_by_actor(&conn, "instructor", 10).unwrap();
        assert_eq!(rows.len(), 2);
        // Newest first
        assert_eq!(rows[0].action, AuditAction::ClockReset);
        assert_eq!(rows[1].detail["hours"], 8);
    }

    #[test]
    fn empty_flush_is_noop() {
        let conn = open_memory_database().unwrap();
        assert_eq!(AuditLogger::new().flush_to_db(&conn).unwrap(), 0);
    }

    #[test]
    fn prune_drops_entries_outside_retention() {
        let conn = open_memory_database().unwrap();
        let logger = AuditLogger::new();
        let old = at(9) - Duration::days(AUDIT_RETENTION_DAYS + 1);
        logger.log(old, "a", AuditAction::ClockReset, None, "clock".into(), json!({}));
        logger.log(at(9), "a", AuditAction::ClockReset, None, "clock".into(), json!({}));

        logger.flush_and_prune(&conn, at(9)).unwrap();
        let rows = query_audit_by_actor(&conn, "a", 10).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].timestamp, at(9));
    }
}
