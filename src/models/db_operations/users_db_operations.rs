use super::{parse_column, DbError};
use crate::models::{Profile, ProfileStats, Role, UserSummary};
use bcrypt::{hash, verify};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Result as RusqliteResult, TransactionBehavior};

/// Label written over the display name of comments left by a deleted account.
pub const ANONYMIZED_DISPLAY_NAME: &str = "Anonymous User";

const SUMMARY_SELECT: &str = "SELECT u.id, u.email, u.display_name,
        CASE
            WHEN EXISTS (SELECT 1 FROM user_roles r WHERE r.user_id = u.id AND r.role = 'owner') THEN 'owner'
            WHEN EXISTS (SELECT 1 FROM user_roles r WHERE r.user_id = u.id AND r.role = 'admin') THEN 'admin'
            ELSE 'user'
        END,
        u.created_at, u.last_sign_in_at
    FROM users u";

fn summary_from_row(row: &rusqlite::Row) -> RusqliteResult<UserSummary> {
    Ok(UserSummary {
        id: row.get(0)?,
        email: row.get(1)?,
        display_name: row.get(2)?,
        role: parse_column::<Role>(row, 3)?,
        registered_at: row.get(4)?,
        last_sign_in_at: row.get(5)?,
    })
}

pub fn create_user(
    conn: &Connection,
    email: &str,
    password: &str,
    display_name: &str,
) -> Result<String, DbError> {
    let hashed_password = hash(password, bcrypt::DEFAULT_COST)?;
    let id = uuid::Uuid::new_v4().to_string();
    let now = Utc::now();
    conn.execute(
        "INSERT INTO users (id, email, password_hash, display_name, email_notifications_enabled, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, 1, ?5, ?5)",
        params![id, email.trim().to_lowercase(), hashed_password, display_name, now],
    )?;
    Ok(id)
}

pub fn email_exists(conn: &Connection, email: &str) -> RusqliteResult<bool> {
    conn.query_row(
        "SELECT EXISTS (SELECT 1 FROM users WHERE email = ?1)",
        [email.trim().to_lowercase()],
        |row| row.get(0),
    )
}

/// Returns the user id when the email/password pair is valid.
pub fn verify_credentials(conn: &Connection, email: &str, password: &str) -> Result<Option<String>, DbError> {
    let stored: Option<(String, String)> = conn
        .query_row(
            "SELECT id, password_hash FROM users WHERE email = ?1",
            [email.trim().to_lowercase()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    match stored {
        Some((id, password_hash)) if verify(password, &password_hash)? => Ok(Some(id)),
        _ => Ok(None),
    }
}

/// Replaces the stored bcrypt hash. Returns the number of rows changed.
pub fn update_password(conn: &Connection, user_id: &str, new_password: &str) -> Result<usize, DbError> {
    let hashed_password = hash(new_password, bcrypt::DEFAULT_COST)?;
    let changed = conn.execute(
        "UPDATE users SET password_hash = ?1, updated_at = ?2 WHERE id = ?3",
        params![hashed_password, Utc::now(), user_id],
    )?;
    Ok(changed)
}

pub fn update_last_sign_in(conn: &Connection, user_id: &str) -> RusqliteResult<()> {
    conn.execute(
        "UPDATE users SET last_sign_in_at = ?1 WHERE id = ?2",
        params![Utc::now(), user_id],
    )?;
    Ok(())
}

pub fn read_profile(conn: &Connection, user_id: &str) -> RusqliteResult<Option<Profile>> {
    conn.query_row(
        "SELECT id, email, display_name, email_notifications_enabled, created_at, updated_at FROM users WHERE id = ?1",
        [user_id],
        |row| {
            Ok(Profile {
                user_id: row.get(0)?,
                email: row.get(1)?,
                display_name: row.get(2)?,
                email_notifications_enabled: row.get(3)?,
                created_at: row.get(4)?,
                updated_at: row.get(5)?,
            })
        },
    )
    .optional()
}

pub fn update_display_name(conn: &Connection, user_id: &str, display_name: &str) -> RusqliteResult<usize> {
    conn.execute(
        "UPDATE users SET display_name = ?1, updated_at = ?2 WHERE id = ?3",
        params![display_name, Utc::now(), user_id],
    )
}

pub fn set_email_notifications(conn: &Connection, user_id: &str, enabled: bool) -> RusqliteResult<usize> {
    conn.execute(
        "UPDATE users SET email_notifications_enabled = ?1, updated_at = ?2 WHERE id = ?3",
        params![enabled, Utc::now(), user_id],
    )
}

pub fn read_profile_stats(conn: &Connection, user_id: &str) -> RusqliteResult<ProfileStats> {
    conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(is_approved), 0) FROM comments WHERE user_id = ?1",
        [user_id],
        |row| {
            Ok(ProfileStats {
                comment_count: row.get(0)?,
                approved_comment_count: row.get(1)?,
            })
        },
    )
}

// --- Roles ---

/// Privileged grants (`admin`, `owner`) held by a principal.
pub fn read_privileged_roles(conn: &Connection, user_id: &str) -> RusqliteResult<Vec<Role>> {
    let mut stmt = conn.prepare(
        "SELECT role FROM user_roles WHERE user_id = ?1 AND role IN ('admin', 'owner')",
    )?;
    let roles = stmt
        .query_map([user_id], |row| parse_column::<Role>(row, 0))?
        .collect::<RusqliteResult<Vec<_>>>()?;
    Ok(roles)
}

/// Idempotent: granting an existing role is a no-op.
pub fn grant_role(conn: &Connection, user_id: &str, role: Role) -> RusqliteResult<usize> {
    conn.execute(
        "INSERT OR IGNORE INTO user_roles (user_id, role, created_at) VALUES (?1, ?2, ?3)",
        params![user_id, role.as_str(), Utc::now()],
    )
}

pub fn revoke_role(conn: &Connection, user_id: &str, role: Role) -> RusqliteResult<usize> {
    conn.execute(
        "DELETE FROM user_roles WHERE user_id = ?1 AND role = ?2",
        params![user_id, role.as_str()],
    )
}

pub fn read_all_users(conn: &Connection) -> RusqliteResult<Vec<UserSummary>> {
    let mut stmt = conn.prepare(&format!("{} ORDER BY u.created_at DESC", SUMMARY_SELECT))?;
    let users = stmt
        .query_map([], summary_from_row)?
        .collect::<RusqliteResult<Vec<_>>>()?;
    Ok(users)
}

pub fn read_user_summary(conn: &Connection, user_id: &str) -> RusqliteResult<Option<UserSummary>> {
    conn.query_row(&format!("{} WHERE u.id = ?1", SUMMARY_SELECT), [user_id], summary_from_row)
        .optional()
}

pub fn count_users(conn: &Connection) -> RusqliteResult<i64> {
    conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
}

/// Subscribers: users with an email address and notifications enabled.
pub fn read_subscriber_emails(conn: &Connection) -> RusqliteResult<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT email FROM users WHERE email_notifications_enabled = 1 AND email IS NOT NULL AND email <> '' ORDER BY created_at",
    )?;
    let emails = stmt
        .query_map([], |row| row.get(0))?
        .collect::<RusqliteResult<Vec<String>>>()?;
    Ok(emails)
}

pub fn read_owner_emails(conn: &Connection) -> RusqliteResult<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT u.email FROM users u JOIN user_roles r ON r.user_id = u.id WHERE r.role = 'owner' ORDER BY u.created_at",
    )?;
    let emails = stmt
        .query_map([], |row| row.get(0))?
        .collect::<RusqliteResult<Vec<String>>>()?;
    Ok(emails)
}

/// Removes an account. The user's comments stay, anonymized in place;
/// message text and timestamps are untouched. Runs as one transaction.
/// Owner grants are never removed, so an owner's account is refused.
pub fn delete_user_account(conn: &mut Connection, user_id: &str) -> Result<bool, DbError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let is_owner: bool = tx.query_row(
        "SELECT EXISTS (SELECT 1 FROM user_roles WHERE user_id = ?1 AND role = 'owner')",
        [user_id],
        |row| row.get(0),
    )?;
    if is_owner {
        return Err(DbError::OwnerAccount);
    }
    tx.execute(
        "UPDATE comments SET display_name = ?1, user_id = NULL, is_anonymous = 1 WHERE user_id = ?2",
        params![ANONYMIZED_DISPLAY_NAME, user_id],
    )?;
    tx.execute("DELETE FROM user_roles WHERE user_id = ?1", [user_id])?;
    let deleted = tx.execute("DELETE FROM users WHERE id = ?1", [user_id])?;
    tx.commit()?;
    Ok(deleted > 0)
}
