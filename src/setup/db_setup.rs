use crate::models::settings::SiteSettings;
use crate::models::PostCategory;
use crate::DbPool;
use chrono::Utc;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, Result as RusqliteResult, Transaction};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SetupError {
    #[error("Rusqlite error: {0}")]
    Rusqlite(#[from] rusqlite::Error),
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
}

/// Opens a pooled connection manager with foreign keys enforced on every connection.
pub fn build_pool(db_file: &Path) -> Result<DbPool, SetupError> {
    let manager = SqliteConnectionManager::file(db_file).with_init(|conn| {
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
    });
    Ok(r2d2::Pool::builder().build(manager)?)
}

pub fn setup_blog_db(conn: &mut Connection) -> Result<(), SetupError> {
    let tx = conn.transaction()?;

    println!("- Creating 'users' table...");
    tx.execute(
        "CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE COLLATE NOCASE,
            password_hash TEXT NOT NULL,
            display_name TEXT NOT NULL,
            email_notifications_enabled INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            last_sign_in_at TEXT
        )",
        [],
    )?;

    // Absence of a row means the implicit 'user' role.
    println!("- Creating 'user_roles' table...");
    tx.execute(
        "CREATE TABLE IF NOT EXISTS user_roles (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            role TEXT NOT NULL CHECK(role IN ('admin', 'owner')),
            created_at TEXT NOT NULL,
            UNIQUE (user_id, role),
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        )",
        [],
    )?;

    println!("- Creating 'posts' table...");
    tx.execute(
        "CREATE TABLE IF NOT EXISTS posts (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            category TEXT NOT NULL CHECK(category IN ('mental-health', 'current-affairs', 'creative-writing', 'books')),
            slug TEXT NOT NULL,
            excerpt TEXT,
            content TEXT,
            pdf_url TEXT,
            cover_url TEXT,
            read_time_min INTEGER NOT NULL DEFAULT 1,
            is_published INTEGER NOT NULL DEFAULT 0,
            uploaded_at TEXT NOT NULL,
            published_at TEXT,
            updated_at TEXT NOT NULL,
            UNIQUE (category, slug),
            CHECK (content IS NOT NULL OR pdf_url IS NOT NULL)
        )",
        [],
    )?;
    tx.execute(
        "CREATE INDEX IF NOT EXISTS idx_posts_published ON posts (is_published, published_at DESC)",
        [],
    )?;

    println!("- Creating 'post_audit_log' table...");
    tx.execute(
        "CREATE TABLE IF NOT EXISTS post_audit_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            post_id TEXT NOT NULL,
            action TEXT NOT NULL CHECK(action IN ('INSERT', 'UPDATE', 'DELETE')),
            post_title TEXT,
            changed_by TEXT,
            changed_at TEXT NOT NULL
        )",
        [],
    )?;

    println!("- Creating 'comments' table...");
    tx.execute(
        "CREATE TABLE IF NOT EXISTS comments (
            id TEXT PRIMARY KEY,
            post_id TEXT NOT NULL,
            parent_id TEXT,
            user_id TEXT,
            display_name TEXT NOT NULL,
            message TEXT NOT NULL,
            is_approved INTEGER NOT NULL DEFAULT 0,
            is_anonymous INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            CHECK (is_anonymous = 0 OR user_id IS NULL),
            FOREIGN KEY (post_id) REFERENCES posts(id) ON DELETE CASCADE,
            FOREIGN KEY (parent_id) REFERENCES comments(id) ON DELETE CASCADE,
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE SET NULL
        )",
        [],
    )?;
    tx.execute(
        "CREATE INDEX IF NOT EXISTS idx_comments_post ON comments (post_id, created_at)",
        [],
    )?;

    println!("- Creating 'change_requests' table...");
    tx.execute(
        "CREATE TABLE IF NOT EXISTS change_requests (
            id TEXT PRIMARY KEY,
            change_type TEXT NOT NULL CHECK(change_type IN ('post_edit', 'post_delete', 'post_create', 'user_role_change')),
            target_id TEXT NOT NULL,
            requested_by TEXT NOT NULL,
            requested_at TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending' CHECK(status IN ('pending', 'approved', 'rejected')),
            reviewed_by TEXT,
            reviewed_at TEXT,
            review_notes TEXT,
            original_data TEXT,
            proposed_changes TEXT NOT NULL,
            change_summary TEXT NOT NULL,
            CHECK (
                (status = 'pending' AND reviewed_by IS NULL AND reviewed_at IS NULL AND review_notes IS NULL)
                OR (status <> 'pending' AND reviewed_by IS NOT NULL AND reviewed_at IS NOT NULL)
            ),
            CHECK ((change_type = 'post_create') = (original_data IS NULL))
        )",
        [],
    )?;
    tx.execute(
        "CREATE INDEX IF NOT EXISTS idx_change_requests_status ON change_requests (status, requested_at DESC)",
        [],
    )?;

    println!("- Creating 'site_settings' table...");
    tx.execute(
        "CREATE TABLE IF NOT EXISTS site_settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            category TEXT NOT NULL DEFAULT 'general',
            description TEXT,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    println!("- Creating 'categories' table...");
    tx.execute(
        "CREATE TABLE IF NOT EXISTS categories (
            id TEXT PRIMARY KEY,
            slug TEXT NOT NULL UNIQUE,
            title TEXT NOT NULL,
            description TEXT,
            tags TEXT NOT NULL DEFAULT '[]',
            color TEXT NOT NULL,
            icon TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            sort_order INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    println!("- Creating 'about_content' table...");
    tx.execute(
        "CREATE TABLE IF NOT EXISTS about_content (
            id TEXT PRIMARY KEY,
            content TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    println!("- Creating 'contact_messages' table...");
    tx.execute(
        "CREATE TABLE IF NOT EXISTS contact_messages (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT NOT NULL,
            message TEXT NOT NULL,
            is_read INTEGER NOT NULL DEFAULT 0,
            is_replied INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    println!("- Creating 'email_notifications' table...");
    tx.execute(
        "CREATE TABLE IF NOT EXISTS email_notifications (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            post_id TEXT,
            notification_type TEXT NOT NULL,
            recipients_count INTEGER NOT NULL,
            success_count INTEGER NOT NULL,
            failure_count INTEGER NOT NULL,
            sent_at TEXT NOT NULL
        )",
        [],
    )?;

    seed_initial_settings(&tx)?;
    seed_initial_categories(&tx)?;

    tx.commit()?;
    Ok(())
}

fn seed_initial_settings(tx: &Transaction) -> RusqliteResult<()> {
    println!("- Seeding initial settings...");
    let now = Utc::now();
    for default in SiteSettings::default_rows() {
        tx.execute(
            "INSERT OR IGNORE INTO site_settings (key, value, category, description, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![default.key, default.value, default.category, default.description, now],
        )?;
    }
    Ok(())
}

fn seed_initial_categories(tx: &Transaction) -> RusqliteResult<()> {
    println!("- Seeding post categories...");
    let now = Utc::now();
    let seeds: [(PostCategory, &str, &str, &str); 4] = [
        (PostCategory::MentalHealth, "Honest conversations about the mind.", "#8b5cf6", "brain"),
        (PostCategory::CurrentAffairs, "Opinions on what is happening in the world.", "#ef4444", "newspaper"),
        (PostCategory::CreativeWriting, "Poetry, prose and everything in between.", "#f59e0b", "pen-tool"),
        (PostCategory::Books, "Thoughts on what I have been reading.", "#10b981", "book-open"),
    ];
    for (order, (category, description, color, icon)) in seeds.iter().enumerate() {
        tx.execute(
            "INSERT OR IGNORE INTO categories (id, slug, title, description, tags, color, icon, is_active, sort_order, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, '[]', ?5, ?6, 1, ?7, ?8, ?8)",
            params![
                uuid::Uuid::new_v4().to_string(),
                category.as_str(),
                category.label(),
                description,
                color,
                icon,
                order as i64,
                now
            ],
        )?;
        println!("  > {} ({})", category.label(), category.as_str());
    }
    Ok(())
}
