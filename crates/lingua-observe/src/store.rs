//! Persistence operations for the usage event log.
//!
//! All writes go through [`emit_event`], which serialises the payload,
//! assigns a monotonically increasing per-user sequence number, and inserts
//! into the `usage_events` table in a single statement. Reads go through
//! [`query_events`], which supports filtering by domain, event type, entity,
//! and time range.

use rusqlite::{params, Connection};

use crate::error::ObserveError;
use crate::event::{UsageDomain, UsageEvent, UsageEventPayload};

/// Writes a single event to the usage event log.
///
/// The domain and event type come from the payload itself; the caller only
/// supplies the user and the entity (usually a message) the event concerns.
///
/// # Errors
///
/// Returns `ObserveError::Database` on SQL failure or
/// `ObserveError::Serialization` if the payload cannot be serialised.
pub fn emit_event(
    conn: &Connection,
    user_id: &str,
    entity_id: &str,
    payload: &UsageEventPayload,
) -> Result<UsageEvent, ObserveError> {
    let payload_json = serde_json::to_string(payload)?;
    let domain = payload.domain();
    let event_type = payload.event_type();

    // The subquery assigns COALESCE(MAX(seq), 0) + 1 within the same INSERT,
    // so two concurrent writers cannot observe the same MAX(seq) and produce
    // duplicate sequence numbers.
    let row = conn.query_row(
        "INSERT INTO usage_events
            (user_id, domain, event_type, entity_id, seq, payload_json, occurred_at)
         VALUES (
            ?1, ?2, ?3, ?4,
            (SELECT COALESCE(MAX(seq), 0) + 1 FROM usage_events WHERE user_id = ?1),
            ?5,
            datetime('now')
         )
         RETURNING id, seq, occurred_at",
        params![user_id, domain.as_str(), event_type, entity_id, payload_json],
        |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
            ))
        },
    )?;

    let (id, seq, occurred_at) = row;

    Ok(UsageEvent {
        id,
        user_id: user_id.to_string(),
        domain: domain.as_str().to_string(),
        event_type: event_type.to_string(),
        entity_id: entity_id.to_string(),
        seq,
        payload_json,
        occurred_at,
    })
}

/// Filter criteria for querying the usage event log.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Filter by event domain.
    pub domain: Option<UsageDomain>,
    /// Filter by event type string.
    pub event_type: Option<String>,
    /// Filter by entity ID.
    pub entity_id: Option<String>,
    /// Return events that occurred at or after this ISO 8601 timestamp.
    pub since: Option<String>,
    /// Maximum number of events to return (default: 100).
    pub limit: Option<i64>,
}

/// Queries a user's usage events with optional filters.
///
/// Results come back in sequence order (oldest first), bounded by
/// `filter.limit` (default 100). Use `filter.since` for cursor-based
/// pagination.
///
/// # Errors
///
/// Returns `ObserveError::Database` on SQL failure.
pub fn query_events(
    conn: &Connection,
    user_id: &str,
    filter: &EventFilter,
) -> Result<Vec<UsageEvent>, ObserveError> {
    // Collect WHERE clauses and bind parameters separately so nothing is
    // interpolated into the SQL text.
    let mut clauses = vec!["user_id = ?1".to_string()];
    let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> =
        vec![Box::new(user_id.to_string())];
    let mut idx = 2u32;

    if let Some(domain) = filter.domain {
        clauses.push(format!("domain = ?{idx}"));
        param_values.push(Box::new(domain.as_str().to_string()));
        idx += 1;
    }

    if let Some(ref et) = filter.event_type {
        clauses.push(format!("event_type = ?{idx}"));
        param_values.push(Box::new(et.clone()));
        idx += 1;
    }

    if let Some(ref ent_id) = filter.entity_id {
        clauses.push(format!("entity_id = ?{idx}"));
        param_values.push(Box::new(ent_id.clone()));
        idx += 1;
    }

    if let Some(ref since) = filter.since {
        clauses.push(format!("occurred_at >= ?{idx}"));
        param_values.push(Box::new(since.clone()));
        idx += 1;
    }

    let limit = filter.limit.unwrap_or(100);
    let where_clause = clauses.join(" AND ");
    let sql = format!(
        "SELECT id, user_id, domain, event_type, entity_id, seq, payload_json, occurred_at
         FROM usage_events
         WHERE {where_clause}
         ORDER BY seq ASC
         LIMIT ?{idx}"
    );

    param_values.push(Box::new(limit));

    let params_refs: Vec<&dyn rusqlite::types::ToSql> =
        param_values.iter().map(|p| &**p).collect();

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_refs.as_slice(), |row| {
        Ok(UsageEvent {
            id: row.get(0)?,
            user_id: row.get(1)?,
            domain: row.get(2)?,
            event_type: row.get(3)?,
            entity_id: row.get(4)?,
            seq: row.get(5)?,
            payload_json: row.get(6)?,
            occurred_at: row.get(7)?,
        })
    })?;

    let mut events = Vec::new();
    for row in rows {
        events.push(row?);
    }

    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lingua_db::run_migrations;
    use rusqlite::Connection;

    fn setup_db() -> Connection {
        let conn = Connection::open_in_memory().expect("failed to open in-memory db");
        run_migrations(&conn).expect("failed to run migrations");
        conn
    }

    fn billed(thread_id: &str, cost: i64, balance_after: i64) -> UsageEventPayload {
        UsageEventPayload::TurnBilled {
            thread_id: thread_id.to_string(),
            cost,
            balance_after,
        }
    }

    #[test]
    fn emit_assigns_per_user_sequence() {
        let conn = setup_db();

        let first = emit_event(&conn, "user-1", "m-1", &billed("t-1", 1, 19)).expect("emit");
        let second = emit_event(&conn, "user-1", "m-2", &billed("t-1", 1, 18)).expect("emit");
        let other = emit_event(&conn, "user-2", "m-3", &billed("t-2", 1, 399)).expect("emit");

        assert_eq!(first.seq, 1);
        assert_eq!(second.seq, 2);
        assert_eq!(other.seq, 1, "sequence numbers are per user");
        assert_eq!(first.domain, "BILLING");
        assert_eq!(first.event_type, "TURN_BILLED");
    }

    #[test]
    fn payload_round_trips_through_json() {
        let conn = setup_db();
        let event = emit_event(
            &conn,
            "user-1",
            "m-1",
            &UsageEventPayload::ScoringFailed {
                error_code: "ML_SERVICE_ERROR".to_string(),
                detail: "scorer returned 503".to_string(),
            },
        )
        .expect("emit");

        let decoded: UsageEventPayload =
            serde_json::from_str(&event.payload_json).expect("decode");
        match decoded {
            UsageEventPayload::ScoringFailed { error_code, detail } => {
                assert_eq!(error_code, "ML_SERVICE_ERROR");
                assert_eq!(detail, "scorer returned 503");
            }
            other => panic!("unexpected payload: {other:?}"),
        }
        assert_eq!(event.domain, "SCORING");
    }

    #[test]
    fn query_filters_by_type_and_entity() {
        let conn = setup_db();
        emit_event(&conn, "user-1", "m-1", &billed("t-1", 1, 19)).expect("emit");
        emit_event(
            &conn,
            "user-1",
            "m-2",
            &UsageEventPayload::DebitFailed {
                thread_id: "t-1".to_string(),
                cost: 1,
                reason: "insufficient credits".to_string(),
            },
        )
        .expect("emit");
        emit_event(&conn, "user-2", "m-9", &billed("t-2", 1, 5)).expect("emit");

        let failures = query_events(
            &conn,
            "user-1",
            &EventFilter {
                event_type: Some("DEBIT_FAILED".to_string()),
                ..Default::default()
            },
        )
        .expect("query");
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].entity_id, "m-2");

        let by_entity = query_events(
            &conn,
            "user-1",
            &EventFilter {
                entity_id: Some("m-1".to_string()),
                ..Default::default()
            },
        )
        .expect("query");
        assert_eq!(by_entity.len(), 1);
        assert_eq!(by_entity[0].event_type, "TURN_BILLED");

        let all = query_events(&conn, "user-1", &EventFilter::default()).expect("query");
        assert_eq!(all.len(), 2, "other users' events are invisible");
        assert!(all.windows(2).all(|w| w[0].seq < w[1].seq));
    }

    #[test]
    fn query_respects_limit() {
        let conn = setup_db();
        for i in 0..5 {
            emit_event(&conn, "user-1", &format!("m-{i}"), &billed("t-1", 1, 19 - i))
                .expect("emit");
        }
        let events = query_events(
            &conn,
            "user-1",
            &EventFilter {
                limit: Some(3),
                ..Default::default()
            },
        )
        .expect("query");
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].seq, 1, "oldest first");
    }
}
