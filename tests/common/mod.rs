#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::Connection;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use unfiltered_backend::config::{Config, MailConfig, WebConfig};
use unfiltered_backend::helper::notification_helpers::{Mailer, NotificationError, OutboundEmail};
use unfiltered_backend::helper::post_helpers;
use unfiltered_backend::helper::realtime_helpers::RealtimeHub;
use unfiltered_backend::helper::settings_helpers::SettingsStore;
use unfiltered_backend::models::db_operations::{posts_db_operations, users_db_operations};
use unfiltered_backend::models::{Post, PostCategory, PostDraft, Role, RoleFlags};
use unfiltered_backend::setup::db_setup;
use unfiltered_backend::{AppState, DbPool};

/// A migrated blog database in a temporary directory. Dropping it removes the files.
pub struct TestDb {
    pub dir: TempDir,
    pub pool: DbPool,
}

impl TestDb {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("blog.db");
        let mut conn = Connection::open(&path).expect("open db");
        db_setup::setup_blog_db(&mut conn).expect("schema");
        drop(conn);
        let pool = db_setup::build_pool(&path).expect("pool");
        TestDb { dir, pool }
    }

    pub fn conn(&self) -> r2d2::PooledConnection<r2d2_sqlite::SqliteConnectionManager> {
        self.pool.get().expect("connection")
    }

    pub fn config(&self) -> Config {
        Config {
            web: WebConfig { host: "127.0.0.1".to_string(), port: 0 },
            site_name: "The Unfiltered Voice".to_string(),
            site_base_url: "https://www.unfilteredvoice.me".to_string(),
            database_path: self.dir.path().display().to_string(),
            media_path: self.dir.path().join("media").display().to_string(),
            allowed_origins: "*".to_string(),
            log_level: "debug".to_string(),
            session_secret_key: "ab".repeat(64),
            use_secure_cookies: false,
            mail: MailConfig {
                resend_api_key: None,
                from_address: "The Unfiltered Voice <noreply@unfilteredvoice.me>".to_string(),
                api_url: "http://127.0.0.1:9/emails".to_string(),
            },
        }
    }

    pub fn app_state(&self, mailer: Arc<dyn Mailer>) -> AppState {
        AppState {
            settings: SettingsStore::load(&self.conn()).expect("settings"),
            realtime: RealtimeHub::default(),
            mailer,
        }
    }

    pub fn user(&self, email: &str, display_name: &str, roles: &[Role]) -> String {
        let conn = self.conn();
        let id = users_db_operations::create_user(&conn, email, "Sup3r$ecret", display_name).expect("user");
        for role in roles {
            users_db_operations::grant_role(&conn, &id, *role).expect("grant");
        }
        id
    }

    pub fn post(&self, title: &str, category: PostCategory, published: bool) -> Post {
        let draft = PostDraft {
            title: title.to_string(),
            category,
            slug: None,
            excerpt: Some(format!("About {}", title)),
            content: Some(format!("Some words about {}.", title)),
            pdf_url: None,
            cover_url: None,
            is_published: published,
        };
        let post = post_helpers::build_post(&uuid::Uuid::new_v4().to_string(), &draft, Utc::now()).expect("valid post");
        posts_db_operations::insert_post(&self.conn(), &post).expect("insert post");
        post
    }
}

pub fn admin() -> RoleFlags {
    RoleFlags { is_admin: true, is_owner: false }
}

pub fn owner() -> RoleFlags {
    RoleFlags { is_admin: true, is_owner: true }
}

/// Captures outgoing mail instead of sending it.
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<OutboundEmail>>,
    pub fail: bool,
}

impl RecordingMailer {
    pub fn failing() -> Self {
        RecordingMailer { sent: Mutex::new(Vec::new()), fail: true }
    }

    pub fn sent(&self) -> Vec<OutboundEmail> {
        self.sent.lock().expect("mailer lock").clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: &OutboundEmail) -> Result<(), NotificationError> {
        self.sent.lock().expect("mailer lock").push(email.clone());
        if self.fail {
            return Err(NotificationError::Rejected { status: 500, body: "provider down".to_string() });
        }
        Ok(())
    }
}
