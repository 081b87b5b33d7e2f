use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
}

/// Outbound email settings. Without an API key, messages are logged instead of sent.
#[derive(Debug, Deserialize, Clone)]
pub struct MailConfig {
    pub resend_api_key: Option<String>,
    pub from_address: String,
    pub api_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub web: WebConfig,
    pub site_name: String,
    pub site_base_url: String,
    // These fields are populated from the .env file
    pub database_path: String,
    pub media_path: String,
    pub allowed_origins: String,
    pub log_level: String,
    pub session_secret_key: String,
    pub use_secure_cookies: bool,
    pub mail: MailConfig,
}

impl Config {
    pub fn from_env(env_path: &Path) -> Result<Self, config::ConfigError> {
        dotenvy::from_path(env_path)
            .map_err(|e| config::ConfigError::Message(format!(
                "FATAL: Failed to load .env file from '{}'. Error: {}", env_path.display(), e
            )))?;

        // --- VALIDATION & EXTRACTION ---
        let database_path = absolute_path_var("DATABASE_PATH")?;
        let media_path = absolute_path_var("MEDIA_PATH")?;
        let session_secret_key = required_var("SESSION_SECRET_KEY")?;

        // 128 hex characters (64 bytes), as produced by `setup_cli keygen`.
        if session_secret_key.len() != 128 || !session_secret_key.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(config::ConfigError::Message(
                "FATAL: 'SESSION_SECRET_KEY' must be 128 hexadecimal characters long (64 bytes).".to_string()
            ));
        }

        let site_base_url = env::var("SITE_BASE_URL")
            .unwrap_or_else(|_| "https://www.unfilteredvoice.me".to_string());
        validate_base_url(&site_base_url)?;

        let allowed_origins = env::var("ALLOWED_ORIGINS").unwrap_or_default();
        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let use_secure_cookies = env::var("USE_SECURE_COOKIES")
            .ok()
            .and_then(|v| v.parse::<bool>().ok())
            .unwrap_or(false);
        let resend_api_key = env::var("RESEND_API_KEY").ok().filter(|k| !k.trim().is_empty());
        let mail_from = env::var("MAIL_FROM").ok();
        // --- END VALIDATION & EXTRACTION ---

        let mut builder = config::Config::builder()
            .set_default("web.host", "127.0.0.1")?
            .set_default("web.port", 8080)?
            .set_default("site_name", "The Unfiltered Voice")?
            .set_default("mail.from_address", "The Unfiltered Voice <noreply@unfilteredvoice.me>")?
            .set_default("mail.api_url", "https://api.resend.com/emails")?
            // Host/port and the site name may be overridden from the TOML file.
            .add_source(config::File::new("config/default.toml", config::FileFormat::Toml).required(false))
            .set_override("database_path", database_path)?
            .set_override("media_path", media_path)?
            .set_override("session_secret_key", session_secret_key)?
            .set_override("site_base_url", site_base_url.trim_end_matches('/').to_string())?
            .set_override("allowed_origins", allowed_origins)?
            .set_override("log_level", log_level)?
            .set_override("use_secure_cookies", use_secure_cookies)?;

        if let Some(key) = resend_api_key {
            builder = builder.set_override("mail.resend_api_key", key)?;
        }
        if let Some(from) = mail_from {
            builder = builder.set_override("mail.from_address", from)?;
        }

        builder.build()?.try_deserialize()
    }

    /// Full path to the blog database file inside its own folder.
    pub fn blog_db_path(&self) -> PathBuf {
        PathBuf::from(&self.database_path).join("blog").join("blog.db")
    }

    /// Public URL of a post, `{base}/{category}/{slug}`.
    pub fn post_url(&self, category: &str, slug: &str) -> String {
        format!("{}/{}/{}", self.site_base_url, category, slug)
    }
}

fn required_var(name: &str) -> Result<String, config::ConfigError> {
    env::var(name).map_err(|_| {
        config::ConfigError::Message(format!("FATAL: Environment variable '{}' is not set in your .env file.", name))
    })
}

/// Storage locations must not depend on the working directory.
fn absolute_path_var(name: &str) -> Result<String, config::ConfigError> {
    let value = required_var(name)?;
    if Path::new(&value).is_relative() {
        return Err(config::ConfigError::Message(format!(
            "FATAL: The '{}' in your .env file is a relative path ('{}'). It MUST be an absolute path.",
            name, value
        )));
    }
    Ok(value)
}

fn validate_base_url(raw: &str) -> Result<(), config::ConfigError> {
    let parsed = url::Url::parse(raw).map_err(|e| config::ConfigError::Message(format!(
        "FATAL: 'SITE_BASE_URL' ('{}') is not a valid URL: {}", raw, e
    )))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(config::ConfigError::Message(format!(
            "FATAL: 'SITE_BASE_URL' must use http or https, got '{}'.", parsed.scheme()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_must_be_http() {
        assert!(validate_base_url("https://www.unfilteredvoice.me").is_ok());
        assert!(validate_base_url("ftp://example.com").is_err());
        assert!(validate_base_url("not a url").is_err());
    }
}
