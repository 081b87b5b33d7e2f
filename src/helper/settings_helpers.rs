use crate::models::db_operations::{site_db_operations, DbError};
use crate::models::settings::SiteSettings;
use rusqlite::Connection;
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;

/// Decoded site settings shared across workers. Refreshed after every
/// write; subscribers receive each new snapshot.
pub struct SettingsStore {
    current: RwLock<Arc<SiteSettings>>,
    changes: broadcast::Sender<Arc<SiteSettings>>,
}

impl SettingsStore {
    pub fn new(initial: SiteSettings) -> Self {
        let (changes, _) = broadcast::channel(16);
        SettingsStore {
            current: RwLock::new(Arc::new(initial)),
            changes,
        }
    }

    pub fn load(conn: &Connection) -> Result<Self, DbError> {
        Ok(SettingsStore::new(read_settings(conn)?))
    }

    pub fn current(&self) -> Arc<SiteSettings> {
        let guard = self.current.read().unwrap_or_else(|poisoned| {
            log::error!("RwLock for site settings was poisoned! Using stale data.");
            poisoned.into_inner()
        });
        Arc::clone(&guard)
    }

    /// Re-reads the store and notifies subscribers.
    pub fn refresh(&self, conn: &Connection) -> Result<Arc<SiteSettings>, DbError> {
        let fresh = Arc::new(read_settings(conn)?);
        {
            let mut guard = self.current.write().unwrap_or_else(|poisoned| {
                log::error!("RwLock for site settings was poisoned! Recovering lock.");
                poisoned.into_inner()
            });
            *guard = Arc::clone(&fresh);
        }
        // No receivers is not an error.
        let _ = self.changes.send(Arc::clone(&fresh));
        Ok(fresh)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<SiteSettings>> {
        self.changes.subscribe()
    }
}

fn read_settings(conn: &Connection) -> Result<SiteSettings, DbError> {
    let rows = site_db_operations::read_all_settings(conn)?;
    let (settings, issues) = SiteSettings::from_rows(rows.iter().map(|r| (r.key.as_str(), &r.value)));
    for issue in issues {
        log::warn!("Ignoring stored setting: {}. Default value in use.", issue);
    }
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_returns_injected_fixture() {
        let fixture = SiteSettings { site_name: "Fixture".to_string(), ..SiteSettings::default() };
        let store = SettingsStore::new(fixture.clone());
        assert_eq!(*store.current(), fixture);
    }

    #[test]
    fn refresh_notifies_subscribers() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE site_settings (key TEXT PRIMARY KEY, value TEXT NOT NULL, category TEXT NOT NULL, description TEXT, updated_at TEXT NOT NULL);
             INSERT INTO site_settings VALUES ('site_name', '\"Fresh\"', 'general', NULL, '2024-01-01 00:00:00+00:00');",
        )
        .unwrap();
        let store = SettingsStore::new(SiteSettings::default());
        let mut rx = store.subscribe();
        store.refresh(&conn).unwrap();
        assert_eq!(store.current().site_name, "Fresh");
        assert_eq!(rx.try_recv().unwrap().site_name, "Fresh");
    }
}
