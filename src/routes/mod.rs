pub mod admin;
pub mod auth;
pub mod change_requests;
pub mod public;

use crate::config::Config;
use crate::helper::change_request_helpers::{AppliedEffect, WorkflowError};
use crate::helper::gate_helpers::ActionOutcome;
use crate::helper::notification_helpers;
use crate::middleware::AuthenticatedPrincipal;
use crate::{AppState, DbPool};
use actix_web::{dev, http::StatusCode, web, FromRequest, HttpRequest, HttpResponse};
use serde::Serialize;
use serde_json::json;
use std::future::{ready, Ready};
use tera::Tera;

/// JSON envelope used by every API endpoint.
#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

pub fn ok_json<T: Serialize>(data: T) -> HttpResponse {
    HttpResponse::Ok().json(ApiResponse { success: true, data: Some(data), error: None })
}

pub fn error_json(status: StatusCode, message: impl Into<String>) -> HttpResponse {
    HttpResponse::build(status).json(ApiResponse::<()> { success: false, data: None, error: Some(message.into()) })
}

pub fn db_unavailable(e: impl std::fmt::Display) -> HttpResponse {
    log::error!("Failed to get DB connection: {}", e);
    error_json(StatusCode::SERVICE_UNAVAILABLE, "Database unavailable.")
}

pub fn internal_error(context: &str, e: impl std::fmt::Display) -> HttpResponse {
    log::error!("{}: {}", context, e);
    error_json(StatusCode::INTERNAL_SERVER_ERROR, format!("{}.", context))
}

pub fn workflow_error_response(e: WorkflowError, context: &str) -> HttpResponse {
    let status = match &e {
        WorkflowError::Forbidden(_) => StatusCode::FORBIDDEN,
        WorkflowError::Validation(_) | WorkflowError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
        WorkflowError::NotFound(_) => StatusCode::NOT_FOUND,
        WorkflowError::AlreadyReviewed(_) | WorkflowError::Conflict(_) => StatusCode::CONFLICT,
        WorkflowError::Db(_) => return internal_error(context, e),
    };
    log::warn!("{}: {}", context, e);
    error_json(status, e.to_string())
}

pub fn require_admin(principal: &AuthenticatedPrincipal) -> Result<(), HttpResponse> {
    if principal.flags.is_admin {
        Ok(())
    } else {
        Err(error_json(StatusCode::FORBIDDEN, "Admin privileges are required."))
    }
}

pub fn require_owner(principal: &AuthenticatedPrincipal) -> Result<(), HttpResponse> {
    if principal.flags.is_owner {
        Ok(())
    } else {
        Err(error_json(StatusCode::FORBIDDEN, "Only the owner can do this."))
    }
}

/// Shared app data needed to react to a committed write.
pub struct Services {
    pub pool: web::Data<DbPool>,
    pub state: web::Data<AppState>,
    pub tera: web::Data<Tera>,
    pub config: web::Data<Config>,
}

impl FromRequest for Services {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut dev::Payload) -> Self::Future {
        let services = (|| {
            Some(Services {
                pool: req.app_data::<web::Data<DbPool>>()?.clone(),
                state: req.app_data::<web::Data<AppState>>()?.clone(),
                tera: req.app_data::<web::Data<Tera>>()?.clone(),
                config: req.app_data::<web::Data<Config>>()?.clone(),
            })
        })();
        ready(services.ok_or_else(|| {
            log::error!("Application data is not fully registered.");
            actix_web::error::ErrorInternalServerError("Server misconfiguration.")
        }))
    }
}

impl Services {
    /// Post-commit side effects: publish notifications and settings refresh.
    pub fn after_commit(&self, effect: &AppliedEffect) {
        if let Some(post_id) = &effect.published_post_id {
            notification_helpers::spawn_publish_notification(
                self.pool.clone(),
                self.state.clone(),
                self.tera.clone(),
                self.config.clone(),
                post_id.clone(),
            );
        }
        if effect.settings_changed {
            match self.pool.get() {
                Ok(conn) => {
                    if let Err(e) = self.state.settings.refresh(&conn) {
                        log::error!("Settings were saved but the cache refresh failed: {}", e);
                    }
                }
                Err(e) => log::error!("Settings were saved but no connection was available to refresh: {}", e),
            }
        }
    }
}

pub fn outcome_response(services: &Services, outcome: ActionOutcome) -> HttpResponse {
    match outcome {
        ActionOutcome::Applied(effect) => {
            services.after_commit(&effect);
            ok_json(json!({ "status": "applied", "target_id": effect.target_id }))
        }
        ActionOutcome::Queued { request_id } => HttpResponse::Accepted().json(ApiResponse {
            success: true,
            data: Some(json!({ "status": "pending_approval", "request_id": request_id })),
            error: None,
        }),
    }
}
