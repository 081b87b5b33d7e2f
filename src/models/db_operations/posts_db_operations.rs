use super::parse_column;
use crate::models::{AuditLogEntry, Post, PostCategory};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Result as RusqliteResult};

const POST_COLUMNS: &str = "id, title, category, slug, excerpt, content, pdf_url, cover_url, read_time_min, is_published, uploaded_at, published_at, updated_at";

fn post_from_row(row: &rusqlite::Row) -> RusqliteResult<Post> {
    Ok(Post {
        id: row.get(0)?,
        title: row.get(1)?,
        category: parse_column::<PostCategory>(row, 2)?,
        slug: row.get(3)?,
        excerpt: row.get(4)?,
        content: row.get(5)?,
        pdf_url: row.get(6)?,
        cover_url: row.get(7)?,
        read_time_min: row.get(8)?,
        is_published: row.get(9)?,
        uploaded_at: row.get(10)?,
        published_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

pub fn insert_post(conn: &Connection, post: &Post) -> RusqliteResult<()> {
    conn.execute(
        &format!("INSERT INTO posts ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)", POST_COLUMNS),
        params![
            post.id,
            post.title,
            post.category.as_str(),
            post.slug,
            post.excerpt,
            post.content,
            post.pdf_url,
            post.cover_url,
            post.read_time_min,
            post.is_published,
            post.uploaded_at,
            post.published_at,
            post.updated_at
        ],
    )?;
    Ok(())
}

pub fn update_post(conn: &Connection, post: &Post) -> RusqliteResult<usize> {
    conn.execute(
        "UPDATE posts SET title = ?1, category = ?2, slug = ?3, excerpt = ?4, content = ?5, pdf_url = ?6,
            cover_url = ?7, read_time_min = ?8, is_published = ?9, published_at = ?10, updated_at = ?11
         WHERE id = ?12",
        params![
            post.title,
            post.category.as_str(),
            post.slug,
            post.excerpt,
            post.content,
            post.pdf_url,
            post.cover_url,
            post.read_time_min,
            post.is_published,
            post.published_at,
            post.updated_at,
            post.id
        ],
    )
}

pub fn delete_post(conn: &Connection, post_id: &str) -> RusqliteResult<usize> {
    conn.execute("DELETE FROM posts WHERE id = ?1", [post_id])
}

pub fn read_post(conn: &Connection, post_id: &str) -> RusqliteResult<Option<Post>> {
    conn.query_row(
        &format!("SELECT {} FROM posts WHERE id = ?1", POST_COLUMNS),
        [post_id],
        post_from_row,
    )
    .optional()
}

/// Every post, drafts included, newest first.
pub fn read_all_posts(conn: &Connection) -> RusqliteResult<Vec<Post>> {
    let mut stmt = conn.prepare(&format!("SELECT {} FROM posts ORDER BY uploaded_at DESC", POST_COLUMNS))?;
    let posts = stmt.query_map([], post_from_row)?.collect::<RusqliteResult<Vec<_>>>()?;
    Ok(posts)
}

/// Published posts only, most recently published first.
pub fn read_published_posts(
    conn: &Connection,
    category: Option<PostCategory>,
    limit: u32,
    offset: u32,
) -> RusqliteResult<Vec<Post>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM posts
         WHERE is_published = 1 AND (?1 IS NULL OR category = ?1)
         ORDER BY published_at DESC
         LIMIT ?2 OFFSET ?3",
        POST_COLUMNS
    ))?;
    let posts = stmt
        .query_map(params![category.map(|c| c.as_str()), limit, offset], post_from_row)?
        .collect::<RusqliteResult<Vec<_>>>()?;
    Ok(posts)
}

pub fn read_published_post_by_slug(
    conn: &Connection,
    category: PostCategory,
    slug: &str,
) -> RusqliteResult<Option<Post>> {
    conn.query_row(
        &format!("SELECT {} FROM posts WHERE is_published = 1 AND category = ?1 AND slug = ?2", POST_COLUMNS),
        params![category.as_str(), slug],
        post_from_row,
    )
    .optional()
}

pub fn is_published(conn: &Connection, post_id: &str) -> RusqliteResult<bool> {
    conn.query_row(
        "SELECT EXISTS (SELECT 1 FROM posts WHERE id = ?1 AND is_published = 1)",
        [post_id],
        |row| row.get(0),
    )
}

pub fn slug_taken(conn: &Connection, category: PostCategory, slug: &str, except_id: &str) -> RusqliteResult<bool> {
    conn.query_row(
        "SELECT EXISTS (SELECT 1 FROM posts WHERE category = ?1 AND slug = ?2 AND id <> ?3)",
        params![category.as_str(), slug, except_id],
        |row| row.get(0),
    )
}

// --- Audit log ---

pub fn record_audit(
    conn: &Connection,
    post_id: &str,
    action: &str,
    post_title: &str,
    changed_by: Option<&str>,
) -> RusqliteResult<()> {
    conn.execute(
        "INSERT INTO post_audit_log (post_id, action, post_title, changed_by, changed_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![post_id, action, post_title, changed_by, Utc::now()],
    )?;
    Ok(())
}

pub fn read_audit_log(conn: &Connection, limit: u32) -> RusqliteResult<Vec<AuditLogEntry>> {
    let mut stmt = conn.prepare(
        "SELECT a.id, a.post_id, a.action, a.post_title, a.changed_by, u.display_name, a.changed_at
         FROM post_audit_log a
         LEFT JOIN users u ON u.id = a.changed_by
         ORDER BY a.changed_at DESC, a.id DESC
         LIMIT ?1",
    )?;
    let entries = stmt
        .query_map([limit], |row| {
            Ok(AuditLogEntry {
                id: row.get(0)?,
                post_id: row.get(1)?,
                action: row.get(2)?,
                post_title: row.get(3)?,
                changed_by: row.get(4)?,
                changed_by_name: row.get(5)?,
                changed_at: row.get(6)?,
            })
        })?
        .collect::<RusqliteResult<Vec<_>>>()?;
    Ok(entries)
}
