//! Protocol link registry.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use uuid::Uuid;

use super::ProtocolError;
use crate::config::MAX_ORDER_SPAN_DAYS;
use crate::db::repository::{
    count_instances_for_link, delete_medication_link, get_medication_link,
    get_medication_links_by_trigger, get_medicine, insert_medication_link,
    list_medication_links, update_medication_link,
};
use crate::models::{MedicationLink, MedicationLinkInput};

/// Checked numeric fields of a link input.
struct ValidatedTiming {
    delay_minutes: u32,
    follow_duration_hours: u32,
}

fn validate(conn: &Connection, input: &MedicationLinkInput) -> Result<ValidatedTiming, ProtocolError> {
    let delay_minutes = u32::try_from(input.delay_minutes)
        .map_err(|_| ProtocolError::InvalidLink("delay_minutes must be a non-negative integer".into()))?;
    if i64::from(delay_minutes) > MAX_ORDER_SPAN_DAYS * 24 * 60 {
        return Err(ProtocolError::InvalidLink(format!(
            "delay_minutes must not exceed {MAX_ORDER_SPAN_DAYS} days"
        )));
    }

    let follow_duration_hours = u32::try_from(input.follow_duration_hours)
        .ok()
        .filter(|h| *h > 0)
        .ok_or_else(|| ProtocolError::InvalidLink("follow_duration_hours must be positive".into()))?;
    if i64::from(follow_duration_hours) > MAX_ORDER_SPAN_DAYS * 24 {
        return Err(ProtocolError::InvalidLink(format!(
            "follow_duration_hours must not exceed {MAX_ORDER_SPAN_DAYS} days"
        )));
    }

    if input.follow_frequency.trim().is_empty() {
        return Err(ProtocolError::InvalidLink("follow_frequency is required".into()));
    }

    if input.trigger_medicine_id == input.follow_medicine_id {
        return Err(ProtocolError::InvalidLink(
            "trigger and follow-up medicine must differ".into(),
        ));
    }

    if get_medicine(conn, &input.trigger_medicine_id)?.is_none() {
        return Err(ProtocolError::MedicineNotFound(input.trigger_medicine_id));
    }
    if get_medicine(conn, &input.follow_medicine_id)?.is_none() {
        return Err(ProtocolError::FollowMedicineNotFound(input.follow_medicine_id));
    }

    Ok(ValidatedTiming {
        delay_minutes,
        follow_duration_hours,
    })
}

fn normalized_override(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

pub fn create_link(
    conn: &Connection,
    now: DateTime<Utc>,
    input: &MedicationLinkInput,
) -> Result<MedicationLink, ProtocolError> {
    let timing = validate(conn, input)?;
    let link = MedicationLink {
        id: Uuid::new_v4(),
        trigger_medicine_id: input.trigger_medicine_id,
        follow_medicine_id: input.follow_medicine_id,
        delay_minutes: timing.delay_minutes,
        follow_frequency: input.follow_frequency.trim().to_string(),
        follow_duration_hours: timing.follow_duration_hours,
        default_dose_override: normalized_override(&input.default_dose_override),
        created_at: now,
    };
    insert_medication_link(conn, &link)?;
    tracing::info!(link_id = %link.id, delay_minutes = link.delay_minutes, "Medication link created");
    Ok(link)
}

/// Replace a link's definition. Existing instances pick up the new timing
/// the next time they are evaluated.
pub fn update_link(
    conn: &Connection,
    id: &Uuid,
    input: &MedicationLinkInput,
) -> Result<MedicationLink, ProtocolError> {
    let existing = get_link(conn, id)?;
    let timing = validate(conn, input)?;
    let link = MedicationLink {
        trigger_medicine_id: input.trigger_medicine_id,
        follow_medicine_id: input.follow_medicine_id,
        delay_minutes: timing.delay_minutes,
        follow_frequency: input.follow_frequency.trim().to_string(),
        follow_duration_hours: timing.follow_duration_hours,
        default_dose_override: normalized_override(&input.default_dose_override),
        ..existing
    };
    update_medication_link(conn, &link)?;
    tracing::info!(link_id = %link.id, "Medication link updated");
    Ok(link)
}

pub fn get_link(conn: &Connection, id: &Uuid) -> Result<MedicationLink, ProtocolError> {
    get_medication_link(conn, id)?.ok_or(ProtocolError::LinkNotFound(*id))
}

pub fn list_links(conn: &Connection) -> Result<Vec<MedicationLink>, ProtocolError> {
    Ok(list_medication_links(conn)?)
}

pub fn list_links_by_trigger(
    conn: &Connection,
    trigger_medicine_id: &Uuid,
) -> Result<Vec<MedicationLink>, ProtocolError> {
    Ok(get_medication_links_by_trigger(conn, trigger_medicine_id)?)
}

/// Delete a link that no protocol instance references.
pub fn delete_link(conn: &Connection, id: &Uuid) -> Result<(), ProtocolError> {
    let instances = count_instances_for_link(conn, id)?;
    if instances > 0 {
        tracing::warn!(link_id = %id, instances, "Refusing to delete referenced medication link");
        return Err(ProtocolError::LinkInUse {
            link_id: *id,
            instances,
        });
    }
    if !delete_medication_link(conn, id)? {
        return Err(ProtocolError::LinkNotFound(*id));
    }
    tracing::info!(link_id = %id, "Medication link deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::insert_medicine;
    use crate::db::sqlite::open_memory_database;
    use crate::models::Medicine;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 4, 12, 0, 0).unwrap()
    }

    fn medicine(conn: &Connection, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        insert_medicine(
            conn,
            &Medicine {
                id,
                name: name.into(),
                default_dose: "1g".into(),
                default_route: "IV".into(),
            },
        )
        .unwrap();
        id
    }

    fn input(trigger: Uuid, follow: Uuid) -> MedicationLinkInput {
        MedicationLinkInput {
            trigger_medicine_id: trigger,
            follow_medicine_id: follow,
            delay_minutes: 120,
            follow_frequency: " every 4 hours ".into(),
            follow_duration_hours: 24,
            default_dose_override: Some("  ".into()),
        }
    }

    #[test]
    fn create_normalizes_text_fields() {
        let conn = open_memory_database().unwrap();
        let a = medicine(&conn, "Vancomycin");
        let b = medicine(&conn, "Piperacillin");
        let link = create_link(&conn, now(), &input(a, b)).unwrap();
        assert_eq!(link.follow_frequency, "every 4 hours");
        assert!(link.default_dose_override.is_none());
        assert_eq!(list_links_by_trigger(&conn, &a).unwrap().len(), 1);
        assert!(list_links_by_trigger(&conn, &b).unwrap().is_empty());
    }

    #[test]
    fn negative_delay_rejected() {
        let conn = open_memory_database().unwrap();
        let a = medicine(&conn, "A");
        let b = medicine(&conn, "B");
        let mut bad = input(a, b);
        bad.delay_minutes = -5;
        assert!(matches!(create_link(&conn, now(), &bad), Err(ProtocolError::InvalidLink(_))));
    }

    #[test]
    fn zero_duration_rejected() {
        let conn = open_memory_database().unwrap();
        let a = medicine(&conn, "A");
        let b = medicine(&conn, "B");
        let mut bad = input(a, b);
        bad.follow_duration_hours = 0;
        assert!(matches!(create_link(&conn, now(), &bad), Err(ProtocolError::InvalidLink(_))));
    }

    #[test]
    fn oversized_timing_rejected() {
        let conn = open_memory_database().unwrap();
        let a = medicine(&conn, "A");
        let b = medicine(&conn, "B");
        let mut long_delay = input(a, b);
        long_delay.delay_minutes = i64::from(u32::MAX);
        assert!(matches!(create_link(&conn, now(), &long_delay), Err(ProtocolError::InvalidLink(_))));

        let mut long_follow = input(a, b);
        long_follow.follow_duration_hours = MAX_ORDER_SPAN_DAYS * 24 + 1;
        assert!(matches!(create_link(&conn, now(), &long_follow), Err(ProtocolError::InvalidLink(_))));
    }

    #[test]
    fn zero_delay_allowed() {
        let conn = open_memory_database().unwrap();
        let a = medicine(&conn, "A");
        let b = medicine(&conn, "B");
        let mut ok = input(a, b);
        ok.delay_minutes = 0;
        assert_eq!(create_link(&conn, now(), &ok).unwrap().delay_minutes, 0);
    }

    #[test]
    fn self_referential_link_rejected() {
        let conn = open_memory_database().unwrap();
        let a = medicine(&conn, "A");
        assert!(matches!(create_link(&conn, now(), &input(a, a)), Err(ProtocolError::InvalidLink(_))));
    }

    #[test]
    fn unknown_medicines_rejected() {
        let conn = open_memory_database().unwrap();
        let a = medicine(&conn, "A");
        let ghost = Uuid::new_v4();
        assert!(matches!(
            create_link(&conn, now(), &input(ghost, a)),
            Err(ProtocolError::MedicineNotFound(id)) if id == ghost
        ));
        assert!(matches!(
            create_link(&conn, now(), &input(a, ghost)),
            Err(ProtocolError::FollowMedicineNotFound(id)) if id == ghost
        ));
    }

    #[test]
    fn update_keeps_identity() {
        let conn = open_memory_database().unwrap();
        let a = medicine(&conn, "A");
        let b = medicine(&conn, "B");
        let link = create_link(&conn, now(), &input(a, b)).unwrap();

        let mut changed = input(a, b);
        changed.delay_minutes = 45;
        let updated = update_link(&conn, &link.id, &changed).unwrap();
        assert_eq!(updated.id, link.id);
        assert_eq!(updated.created_at, link.created_at);
        assert_eq!(get_link(&conn, &link.id).unwrap().delay_minutes, 45);
    }

    #[test]
    fn update_unknown_link_not_found() {
        let conn = open_memory_database().unwrap();
        let a = medicine(&conn, "A");
        let b = medicine(&conn, "B");
        assert!(matches!(
            update_link(&conn, &Uuid::new_v4(), &input(a, b)),
            Err(ProtocolError::LinkNotFound(_))
        ));
    }

    #[test]
    fn delete_unreferenced_link() {
        let conn = open_memory_database().unwrap();
        let a = medicine(&conn, "A");
        let b = medicine(&conn, "B");
        let link = create_link(&conn, now(), &input(a, b)).unwrap();
        delete_link(&conn, &link.id).unwrap();
        assert!(list_links(&conn).unwrap().is_empty());
        assert!(matches!(delete_link(&conn, &link.id), Err(ProtocolError::LinkNotFound(_))));
    }
}
