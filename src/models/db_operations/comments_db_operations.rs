use crate::models::Comment;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Result as RusqliteResult};

const COMMENT_COLUMNS: &str = "id, post_id, parent_id, user_id, display_name, message, is_approved, is_anonymous, created_at, updated_at";

fn comment_from_row(row: &rusqlite::Row) -> RusqliteResult<Comment> {
    Ok(Comment {
        id: row.get(0)?,
        post_id: row.get(1)?,
        parent_id: row.get(2)?,
        user_id: row.get(3)?,
        display_name: row.get(4)?,
        message: row.get(5)?,
        is_approved: row.get(6)?,
        is_anonymous: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

pub fn insert_comment(conn: &Connection, comment: &Comment) -> RusqliteResult<()> {
    conn.execute(
        &format!("INSERT INTO comments ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)", COMMENT_COLUMNS),
        params![
            comment.id,
            comment.post_id,
            comment.parent_id,
            comment.user_id,
            comment.display_name,
            comment.message,
            comment.is_approved,
            comment.is_anonymous,
            comment.created_at,
            comment.updated_at
        ],
    )?;
    Ok(())
}

pub fn read_comment(conn: &Connection, comment_id: &str) -> RusqliteResult<Option<Comment>> {
    conn.query_row(
        &format!("SELECT {} FROM comments WHERE id = ?1", COMMENT_COLUMNS),
        [comment_id],
        comment_from_row,
    )
    .optional()
}

/// Public thread of a post: approved comments only, oldest first.
pub fn read_approved_comments(conn: &Connection, post_id: &str) -> RusqliteResult<Vec<Comment>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM comments WHERE post_id = ?1 AND is_approved = 1 ORDER BY created_at ASC",
        COMMENT_COLUMNS
    ))?;
    let comments = stmt.query_map([post_id], comment_from_row)?.collect::<RusqliteResult<Vec<_>>>()?;
    Ok(comments)
}

/// Moderation queue: every comment, newest first.
pub fn read_all_comments(conn: &Connection) -> RusqliteResult<Vec<Comment>> {
    let mut stmt = conn.prepare(&format!("SELECT {} FROM comments ORDER BY created_at DESC", COMMENT_COLUMNS))?;
    let comments = stmt.query_map([], comment_from_row)?.collect::<RusqliteResult<Vec<_>>>()?;
    Ok(comments)
}

pub fn set_comment_approval(conn: &Connection, comment_id: &str, approved: bool) -> RusqliteResult<usize> {
    conn.execute(
        "UPDATE comments SET is_approved = ?1, updated_at = ?2 WHERE id = ?3",
        params![approved, Utc::now(), comment_id],
    )
}

pub fn delete_comment(conn: &Connection, comment_id: &str) -> RusqliteResult<usize> {
    conn.execute("DELETE FROM comments WHERE id = ?1", [comment_id])
}
