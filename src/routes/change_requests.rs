use crate::helper::change_request_helpers;
use crate::middleware::AuthenticatedPrincipal;
use crate::models::db_operations::change_requests_db_operations;
use crate::models::{ChangeStatus, ChangeType, ReviewAction};
use crate::routes::{db_unavailable, error_json, internal_error, ok_json, require_admin, workflow_error_response, Services};
use crate::DbPool;
use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, Responder};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Deserialize)]
pub struct StatusQuery {
    status: Option<ChangeStatus>,
}

#[derive(Deserialize)]
pub struct SubmitForm {
    change_type: ChangeType,
    /// Generated for `post_create` when omitted.
    target_id: Option<String>,
    original_data: Option<Value>,
    proposed_changes: Value,
    change_summary: String,
}

#[derive(Deserialize)]
pub struct ReviewForm {
    action: ReviewAction,
    notes: Option<String>,
}

pub fn config_change_requests(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/admin/change-requests")
            .route("", web::get().to(list_requests))
            .route("", web::post().to(submit_request))
            .route("/{id}", web::get().to(get_request))
            .route("/{id}/review", web::post().to(review_request)),
    );
}

async fn list_requests(
    principal: AuthenticatedPrincipal,
    pool: web::Data<DbPool>,
    query: web::Query<StatusQuery>,
) -> impl Responder {
    if let Err(resp) = require_admin(&principal) {
        return resp;
    }
    let conn = match pool.get() {
        Ok(c) => c,
        Err(e) => return db_unavailable(e),
    };
    match change_requests_db_operations::read_change_requests(&conn, query.status) {
        Ok(requests) => ok_json(requests),
        Err(e) => internal_error("Failed to fetch change requests", e),
    }
}

async fn get_request(principal: AuthenticatedPrincipal, pool: web::Data<DbPool>, id: web::Path<String>) -> impl Responder {
    if let Err(resp) = require_admin(&principal) {
        return resp;
    }
    let conn = match pool.get() {
        Ok(c) => c,
        Err(e) => return db_unavailable(e),
    };
    match change_requests_db_operations::read_change_request(&conn, &id) {
        Ok(Some(request)) => ok_json(request),
        Ok(None) => error_json(StatusCode::NOT_FOUND, "Change request not found."),
        Err(e) => internal_error("Failed to fetch change request", e),
    }
}

/// Raw submission for clients that build their own snapshot and payload.
async fn submit_request(
    principal: AuthenticatedPrincipal,
    pool: web::Data<DbPool>,
    form: web::Json<SubmitForm>,
) -> impl Responder {
    let form = form.into_inner();
    let target_id = match (form.change_type, form.target_id) {
        (_, Some(id)) => id,
        (ChangeType::PostCreate, None) => uuid::Uuid::new_v4().to_string(),
        (_, None) => return error_json(StatusCode::BAD_REQUEST, "target_id is required."),
    };
    let conn = match pool.get() {
        Ok(c) => c,
        Err(e) => return db_unavailable(e),
    };
    match change_request_helpers::submit_change_request(
        &conn,
        &principal.user_id,
        principal.flags,
        form.change_type,
        &target_id,
        form.original_data,
        form.proposed_changes,
        &form.change_summary,
    ) {
        Ok(request_id) => HttpResponse::Created().json(json!({
            "success": true,
            "data": { "request_id": request_id, "target_id": target_id }
        })),
        Err(e) => workflow_error_response(e, "Failed to submit change request"),
    }
}

async fn review_request(
    principal: AuthenticatedPrincipal,
    services: Services,
    id: web::Path<String>,
    form: web::Json<ReviewForm>,
) -> impl Responder {
    let mut conn = match services.pool.get() {
        Ok(c) => c,
        Err(e) => return db_unavailable(e),
    };
    let outcome = change_request_helpers::review_change_request(
        &mut conn,
        &id,
        &principal.user_id,
        principal.flags,
        form.action,
        form.notes.as_deref(),
    );
    drop(conn);

    match outcome {
        Ok(outcome) => {
            services.after_commit(&outcome.effect);
            ok_json(outcome.request)
        }
        Err(e) => workflow_error_response(e, "Failed to review change request"),
    }
}
