use super::DbError;
use crate::models::{AboutContent, Category, CategoryInput, ContactMessage, SiteSettingRow};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Result as RusqliteResult};

// --- Site settings ---

pub fn read_all_settings(conn: &Connection) -> RusqliteResult<Vec<SiteSettingRow>> {
    let mut stmt = conn.prepare(
        "SELECT key, value, category, description, updated_at FROM site_settings ORDER BY category, key",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(SiteSettingRow {
                key: row.get(0)?,
                value: row.get(1)?,
                category: row.get(2)?,
                description: row.get(3)?,
                updated_at: row.get(4)?,
            })
        })?
        .collect::<RusqliteResult<Vec<_>>>()?;
    Ok(rows)
}

/// Upsert on key. Category and description keep their stored values when not given.
pub fn upsert_setting(
    conn: &Connection,
    key: &str,
    value: &serde_json::Value,
    category: Option<&str>,
    description: Option<&str>,
) -> RusqliteResult<()> {
    conn.execute(
        "INSERT INTO site_settings (key, value, category, description, updated_at)
         VALUES (?1, ?2, COALESCE(?3, 'general'), ?4, ?5)
         ON CONFLICT(key) DO UPDATE SET
            value = excluded.value,
            category = COALESCE(?3, site_settings.category),
            description = COALESCE(?4, site_settings.description),
            updated_at = excluded.updated_at",
        params![key, value, category, description, Utc::now()],
    )?;
    Ok(())
}

// --- Categories ---

fn category_from_row(row: &rusqlite::Row) -> RusqliteResult<Category> {
    let tags: serde_json::Value = row.get(4)?;
    Ok(Category {
        id: row.get(0)?,
        slug: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        tags: serde_json::from_value(tags).unwrap_or_default(),
        color: row.get(5)?,
        icon: row.get(6)?,
        is_active: row.get(7)?,
        sort_order: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

const CATEGORY_COLUMNS: &str = "id, slug, title, description, tags, color, icon, is_active, sort_order, created_at, updated_at";

pub fn read_categories(conn: &Connection, active_only: bool) -> RusqliteResult<Vec<Category>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM categories WHERE (?1 = 0 OR is_active = 1) ORDER BY sort_order, title",
        CATEGORY_COLUMNS
    ))?;
    let categories = stmt
        .query_map([active_only], category_from_row)?
        .collect::<RusqliteResult<Vec<_>>>()?;
    Ok(categories)
}

pub fn read_category(conn: &Connection, id: &str) -> RusqliteResult<Option<Category>> {
    conn.query_row(
        &format!("SELECT {} FROM categories WHERE id = ?1", CATEGORY_COLUMNS),
        [id],
        category_from_row,
    )
    .optional()
}

pub fn insert_category(conn: &Connection, input: &CategoryInput) -> Result<String, DbError> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = Utc::now();
    conn.execute(
        &format!("INSERT INTO categories ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)", CATEGORY_COLUMNS),
        params![
            id,
            input.slug,
            input.title,
            input.description,
            serde_json::to_value(&input.tags)?,
            input.color,
            input.icon,
            input.is_active,
            input.sort_order,
            now
        ],
    )?;
    Ok(id)
}

pub fn update_category(conn: &Connection, id: &str, input: &CategoryInput) -> Result<usize, DbError> {
    let changed = conn.execute(
        "UPDATE categories SET slug = ?1, title = ?2, description = ?3, tags = ?4, color = ?5, icon = ?6,
            is_active = ?7, sort_order = ?8, updated_at = ?9
         WHERE id = ?10",
        params![
            input.slug,
            input.title,
            input.description,
            serde_json::to_value(&input.tags)?,
            input.color,
            input.icon,
            input.is_active,
            input.sort_order,
            Utc::now(),
            id
        ],
    )?;
    Ok(changed)
}

pub fn toggle_category(conn: &Connection, id: &str) -> RusqliteResult<usize> {
    conn.execute(
        "UPDATE categories SET is_active = 1 - is_active, updated_at = ?1 WHERE id = ?2",
        params![Utc::now(), id],
    )
}

pub fn delete_category(conn: &Connection, id: &str) -> RusqliteResult<usize> {
    conn.execute("DELETE FROM categories WHERE id = ?1", [id])
}

// --- About page ---

const ABOUT_ROW_ID: &str = "main";

pub fn read_about(conn: &Connection) -> Result<Option<AboutContent>, DbError> {
    let stored: Option<serde_json::Value> = conn
        .query_row("SELECT content FROM about_content WHERE id = ?1", [ABOUT_ROW_ID], |row| row.get(0))
        .optional()?;
    match stored {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

pub fn upsert_about(conn: &Connection, about: &AboutContent) -> Result<(), DbError> {
    conn.execute(
        "INSERT INTO about_content (id, content, updated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(id) DO UPDATE SET content = excluded.content, updated_at = excluded.updated_at",
        params![ABOUT_ROW_ID, serde_json::to_value(about)?, Utc::now()],
    )?;
    Ok(())
}

// --- Contact messages ---

fn message_from_row(row: &rusqlite::Row) -> RusqliteResult<ContactMessage> {
    Ok(ContactMessage {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        message: row.get(3)?,
        is_read: row.get(4)?,
        is_replied: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

pub fn insert_contact_message(conn: &Connection, message: &ContactMessage) -> RusqliteResult<()> {
    conn.execute(
        "INSERT INTO contact_messages (id, name, email, message, is_read, is_replied, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            message.id,
            message.name,
            message.email,
            message.message,
            message.is_read,
            message.is_replied,
            message.created_at,
            message.updated_at
        ],
    )?;
    Ok(())
}

pub fn read_contact_messages(conn: &Connection) -> RusqliteResult<Vec<ContactMessage>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, email, message, is_read, is_replied, created_at, updated_at
         FROM contact_messages ORDER BY created_at DESC",
    )?;
    let messages = stmt.query_map([], message_from_row)?.collect::<RusqliteResult<Vec<_>>>()?;
    Ok(messages)
}

pub fn mark_message_read(conn: &Connection, id: &str) -> RusqliteResult<usize> {
    conn.execute(
        "UPDATE contact_messages SET is_read = 1, updated_at = ?1 WHERE id = ?2",
        params![Utc::now(), id],
    )
}

/// A replied message is also read.
pub fn mark_message_replied(conn: &Connection, id: &str) -> RusqliteResult<usize> {
    conn.execute(
        "UPDATE contact_messages SET is_read = 1, is_replied = 1, updated_at = ?1 WHERE id = ?2",
        params![Utc::now(), id],
    )
}

pub fn delete_contact_message(conn: &Connection, id: &str) -> RusqliteResult<usize> {
    conn.execute("DELETE FROM contact_messages WHERE id = ?1", [id])
}

// --- Email notification log ---

pub fn record_notification(
    conn: &Connection,
    post_id: Option<&str>,
    notification_type: &str,
    recipients_count: usize,
    success_count: usize,
    failure_count: usize,
) -> RusqliteResult<()> {
    conn.execute(
        "INSERT INTO email_notifications (post_id, notification_type, recipients_count, success_count, failure_count, sent_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            post_id,
            notification_type,
            recipients_count as i64,
            success_count as i64,
            failure_count as i64,
            Utc::now()
        ],
    )?;
    Ok(())
}

pub fn count_notifications(conn: &Connection, post_id: &str) -> RusqliteResult<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM email_notifications WHERE post_id = ?1",
        [post_id],
        |row| row.get(0),
    )
}
