use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::helper::notification_helpers::Mailer;
use crate::helper::realtime_helpers::RealtimeHub;
use crate::helper::settings_helpers::SettingsStore;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Process-wide state shared by every worker.
pub struct AppState {
    pub settings: SettingsStore,
    pub realtime: RealtimeHub,
    pub mailer: Arc<dyn Mailer>,
}

pub mod config;
pub mod helper;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod setup;
