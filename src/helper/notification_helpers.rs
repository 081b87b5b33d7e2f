use crate::config::{Config, MailConfig};
use crate::helper::post_helpers::summary_for;
use crate::models::db_operations::{posts_db_operations, site_db_operations, users_db_operations, DbError};
use crate::models::{ContactMessage, NotificationReport};
use crate::{AppState, DbPool};
use actix_web::web;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tera::{Context, Tera};
use thiserror::Error;

const EXCERPT_CHARS: usize = 200;

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Email provider request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Email provider rejected the message ({status}): {body}")]
    Rejected { status: u16, body: String },
    #[error("Email template error: {0}")]
    Template(#[from] tera::Error),
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("Post '{0}' not found")]
    PostNotFound(String),
}

impl From<rusqlite::Error> for NotificationError {
    fn from(e: rusqlite::Error) -> Self {
        NotificationError::Db(DbError::Rusqlite(e))
    }
}

impl From<r2d2::Error> for NotificationError {
    fn from(e: r2d2::Error) -> Self {
        NotificationError::Db(DbError::Pool(e))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundEmail {
    pub from: String,
    pub to: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub bcc: Vec<String>,
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutboundEmail) -> Result<(), NotificationError>;
}

/// Transactional email over the Resend HTTP API.
pub struct ResendMailer {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
}

impl ResendMailer {
    pub fn new(api_url: &str, api_key: &str) -> Result<Self, NotificationError> {
        let client = reqwest::Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(ResendMailer {
            client,
            api_url: api_url.to_string(),
            api_key: api_key.to_string(),
        })
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send(&self, email: &OutboundEmail) -> Result<(), NotificationError> {
        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(email)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotificationError::Rejected { status: status.as_u16(), body });
        }
        Ok(())
    }
}

/// Used when no API key is configured: messages are logged, not delivered.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &OutboundEmail) -> Result<(), NotificationError> {
        log::info!(
            "Email delivery disabled; would send '{}' to {} recipient(s) (+{} bcc)",
            email.subject,
            email.to.len(),
            email.bcc.len()
        );
        Ok(())
    }
}

pub fn mailer_from_config(mail: &MailConfig) -> Result<Arc<dyn Mailer>, NotificationError> {
    match mail.resend_api_key.as_deref() {
        Some(key) => Ok(Arc::new(ResendMailer::new(&mail.api_url, key)?)),
        None => {
            log::warn!("RESEND_API_KEY is not set. Outgoing emails will only be logged.");
            Ok(Arc::new(LogMailer))
        }
    }
}

/// `"Name <addr@host>"` -> `"addr@host"`.
pub fn bare_address(from: &str) -> String {
    match (from.find('<'), from.rfind('>')) {
        (Some(start), Some(end)) if start < end => from[start + 1..end].trim().to_string(),
        _ => from.trim().to_string(),
    }
}

/// Announces a newly published post to every subscriber in one BCC message.
/// Delivery is all-or-nothing, so the report is either all successes or all failures.
pub async fn notify_published(
    pool: &DbPool,
    mailer: &dyn Mailer,
    tera: &Tera,
    config: &Config,
    site_name: &str,
    post_id: &str,
) -> Result<NotificationReport, NotificationError> {
    let (post, subscribers) = {
        let conn = pool.get()?;
        let post = posts_db_operations::read_post(&conn, post_id)?
            .ok_or_else(|| NotificationError::PostNotFound(post_id.to_string()))?;
        (post, users_db_operations::read_subscriber_emails(&conn)?)
    };

    if !post.is_published {
        log::info!("Post {} is no longer published; skipping notification", post_id);
        return Ok(NotificationReport::default());
    }

    let total = subscribers.len();
    if total == 0 {
        log::info!("No subscribers to notify about post {}", post_id);
        return Ok(NotificationReport::default());
    }

    let mut ctx = Context::new();
    ctx.insert("site_name", site_name);
    ctx.insert("title", &post.title);
    ctx.insert("excerpt", &summary_for(&post, EXCERPT_CHARS));
    ctx.insert("category_label", post.category.label());
    ctx.insert(
        "published_on",
        &post.published_at.unwrap_or(post.uploaded_at).format("%B %-d, %Y").to_string(),
    );
    ctx.insert("post_url", &config.post_url(post.category.as_str(), &post.slug));
    ctx.insert("unsubscribe_url", &format!("{}/unsubscribe", config.site_base_url));

    let email = OutboundEmail {
        from: config.mail.from_address.clone(),
        to: vec![bare_address(&config.mail.from_address)],
        bcc: subscribers,
        subject: format!("New Post: {}", post.title),
        html: tera.render("email/new_post.html", &ctx)?,
    };

    let report = match mailer.send(&email).await {
        Ok(()) => NotificationReport { success_count: total, failure_count: 0, total_subscribers: total },
        Err(e) => {
            log::error!("Failed to send new post notification for {}: {}", post_id, e);
            NotificationReport { success_count: 0, failure_count: total, total_subscribers: total }
        }
    };

    let conn = pool.get()?;
    site_db_operations::record_notification(
        &conn,
        Some(post_id),
        "new_post",
        total,
        report.success_count,
        report.failure_count,
    )?;
    Ok(report)
}

/// Forwards a contact form submission to the owners. Best-effort.
pub async fn notify_contact(
    pool: &DbPool,
    mailer: &dyn Mailer,
    tera: &Tera,
    config: &Config,
    site_name: &str,
    message: &ContactMessage,
) -> Result<usize, NotificationError> {
    let owners = {
        let conn = pool.get()?;
        users_db_operations::read_owner_emails(&conn)?
    };
    if owners.is_empty() {
        log::warn!("Contact message {} received but no owner email is on file", message.id);
        return Ok(0);
    }

    let mut ctx = Context::new();
    ctx.insert("site_name", site_name);
    ctx.insert("name", &message.name);
    ctx.insert("email", &message.email);
    ctx.insert("message", &message.message);
    ctx.insert("received_at", &message.created_at.format("%B %-d, %Y %H:%M UTC").to_string());

    let recipients = owners.len();
    let email = OutboundEmail {
        from: config.mail.from_address.clone(),
        to: owners,
        bcc: Vec::new(),
        subject: format!("New Contact Message from {}", message.name),
        html: tera.render("email/contact.html", &ctx)?,
    };
    mailer.send(&email).await?;
    Ok(recipients)
}

/// Fire-and-forget publish notification. Failures are logged only.
pub fn spawn_publish_notification(
    pool: web::Data<DbPool>,
    state: web::Data<AppState>,
    tera: web::Data<Tera>,
    config: web::Data<Config>,
    post_id: String,
) {
    actix_web::rt::spawn(async move {
        let site_name = state.settings.current().site_name.clone();
        match notify_published(&pool, state.mailer.as_ref(), &tera, &config, &site_name, &post_id).await {
            Ok(report) => log::info!(
                "Post {} notification: {} sent, {} failed, {} subscribers",
                post_id,
                report.success_count,
                report.failure_count,
                report.total_subscribers
            ),
            Err(e) => log::error!("Post {} notification failed: {}", post_id, e),
        }
    });
}

/// Fire-and-forget contact notification.
pub fn spawn_contact_notification(
    pool: web::Data<DbPool>,
    state: web::Data<AppState>,
    tera: web::Data<Tera>,
    config: web::Data<Config>,
    message: ContactMessage,
) {
    actix_web::rt::spawn(async move {
        let site_name = state.settings.current().site_name.clone();
        if let Err(e) = notify_contact(&pool, state.mailer.as_ref(), &tera, &config, &site_name, &message).await {
            log::error!("Contact message {} notification failed: {}", message.id, e);
        }
    });
}
