use super::parse_column;
use crate::models::{ChangeRequest, ChangeStatus, ChangeType};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Result as RusqliteResult};

const REQUEST_SELECT: &str = "SELECT c.id, c.change_type, c.target_id, c.requested_by, u.display_name, c.requested_at,
        c.status, c.reviewed_by, c.reviewed_at, c.review_notes, c.original_data, c.proposed_changes, c.change_summary
    FROM change_requests c
    LEFT JOIN users u ON u.id = c.requested_by";

fn request_from_row(row: &rusqlite::Row) -> RusqliteResult<ChangeRequest> {
    Ok(ChangeRequest {
        id: row.get(0)?,
        change_type: parse_column::<ChangeType>(row, 1)?,
        target_id: row.get(2)?,
        requested_by: row.get(3)?,
        requester_name: row.get(4)?,
        requested_at: row.get(5)?,
        status: parse_column::<ChangeStatus>(row, 6)?,
        reviewed_by: row.get(7)?,
        reviewed_at: row.get(8)?,
        review_notes: row.get(9)?,
        original_data: row.get(10)?,
        proposed_changes: row.get(11)?,
        change_summary: row.get(12)?,
    })
}

/// Inserts a new request in the `pending` state.
pub fn insert_change_request(
    conn: &Connection,
    id: &str,
    change_type: ChangeType,
    target_id: &str,
    requested_by: &str,
    original_data: Option<&serde_json::Value>,
    proposed_changes: &serde_json::Value,
    change_summary: &str,
) -> RusqliteResult<()> {
    conn.execute(
        "INSERT INTO change_requests (id, change_type, target_id, requested_by, requested_at, status, original_data, proposed_changes, change_summary)
         VALUES (?1, ?2, ?3, ?4, ?5, 'pending', ?6, ?7, ?8)",
        params![
            id,
            change_type.as_str(),
            target_id,
            requested_by,
            Utc::now(),
            original_data,
            proposed_changes,
            change_summary
        ],
    )?;
    Ok(())
}

pub fn read_change_request(conn: &Connection, id: &str) -> RusqliteResult<Option<ChangeRequest>> {
    conn.query_row(&format!("{} WHERE c.id = ?1", REQUEST_SELECT), [id], request_from_row)
        .optional()
}

pub fn read_change_requests(conn: &Connection, status: Option<ChangeStatus>) -> RusqliteResult<Vec<ChangeRequest>> {
    let mut stmt = conn.prepare(&format!(
        "{} WHERE (?1 IS NULL OR c.status = ?1) ORDER BY c.requested_at DESC",
        REQUEST_SELECT
    ))?;
    let requests = stmt
        .query_map([status.map(|s| s.as_str())], request_from_row)?
        .collect::<RusqliteResult<Vec<_>>>()?;
    Ok(requests)
}

/// Resolves a pending request. Returns 0 when the request was not pending.
pub fn mark_reviewed(
    conn: &Connection,
    id: &str,
    status: ChangeStatus,
    reviewed_by: &str,
    reviewed_at: DateTime<Utc>,
    review_notes: Option<&str>,
) -> RusqliteResult<usize> {
    conn.execute(
        "UPDATE change_requests SET status = ?1, reviewed_by = ?2, reviewed_at = ?3, review_notes = ?4
         WHERE id = ?5 AND status = 'pending'",
        params![status.as_str(), reviewed_by, reviewed_at, review_notes, id],
    )
}
