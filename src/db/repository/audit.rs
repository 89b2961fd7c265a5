use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use super::{timestamp_from_sql, timestamp_to_sql};
use crate::db::DatabaseError;
use crate::models::enums::{AuditAction, RejectionCode};
use crate::models::AuditEntry;

/// Insert a batch of audit entries into the audit_log table.
pub fn insert_audit_entries(conn: &Connection, entries: &[AuditEntry]) -> Result<(), DatabaseError> {
    let tx = conn.unchecked_transaction()?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO audit_log (timestamp, actor, action, reason_code, entity, detail_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        for entry in entries {
            stmt.execute(params![
                timestamp_to_sql(&entry.timestamp),
                entry.actor,
                entry.action.as_str(),
                entry.reason_code.map(|c| c.as_str()),
                entry.entity,
                entry.detail.to_string(),
            ])?;
        }
    }
    tx.commit()?;
    Ok(())
}

/// Prune audit entries older than the cutoff.
pub fn prune_audit_log(conn: &Connection, cutoff: DateTime<Utc>) -> Result<usize, DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM audit_log WHERE timestamp < ?1",
        params![timestamp_to_sql(&cutoff)],
    )?;
    Ok(deleted)
}

/// Most recent entries recorded for an actor, newest first.
pub fn query_audit_by_actor(
    conn: &Connection,
    actor: &str,
    limit: u32,
) -> Result<Vec<AuditEntry>, DatabaseError> {
    query_audit(
        conn,
        "SELECT timestamp, actor, action, reason_code, entity, detail_json FROM audit_log
         WHERE actor = ?1 ORDER BY timestamp DESC, id DESC LIMIT ?2",
        params![actor, limit],
    )
}

fn query_audit(
    conn: &Connection,
    sql: &str,
    args: impl rusqlite::Params,
) -> Result<Vec<AuditEntry>, DatabaseError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(args, |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut entries = Vec::with_capacity(rows.len());
    for (timestamp, actor, action, reason_code, entity, detail_json) in rows {
        entries.push(AuditEntry {
            timestamp: timestamp_from_sql("timestamp", &timestamp)?,
            actor,
            action: AuditAction::from_str(&action)?,
            reason_code: reason_code.as_deref().map(RejectionCode::from_str).transpose()?,
            entity,
            detail: serde_json::from_str(&detail_json).unwrap_or(serde_json::Value::Null),
        });
    }
    Ok(entries)
}
