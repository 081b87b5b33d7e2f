use crate::helper::analytics_helpers;
use crate::helper::gate_helpers::{self, ActionOutcome, PrivilegedAction};
use crate::helper::media_helpers::{self, MediaKind};
use crate::helper::realtime_helpers::RowChange;
use crate::middleware::AuthenticatedPrincipal;
use crate::models::db_operations::{comments_db_operations, posts_db_operations, site_db_operations, users_db_operations};
use crate::models::{AboutContent, CategoryInput, PostDraft, PostPatch, Role, SettingUpdate};
use crate::routes::{
    db_unavailable, error_json, internal_error, ok_json, outcome_response, require_admin, require_owner,
    workflow_error_response, Services,
};
use crate::DbPool;
use actix_multipart::Multipart;
use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, Responder};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

const AUDIT_LOG_LIMIT: u32 = 100;

#[derive(Deserialize)]
pub struct ApprovalForm {
    approved: bool,
}

#[derive(Deserialize)]
pub struct RoleForm {
    grant: bool,
}

#[derive(Deserialize)]
pub struct MediaQuery {
    kind: MediaKind,
}

pub fn config_admin(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/admin")
            // --- Posts (gated) ---
            .route("/posts", web::get().to(list_posts))
            .route("/posts", web::post().to(create_post))
            .route("/posts/{id}", web::put().to(edit_post))
            .route("/posts/{id}/publish", web::post().to(publish_post))
            .route("/posts/{id}/unpublish", web::post().to(unpublish_post))
            .route("/posts/{id}", web::delete().to(delete_post))
            // --- Comments ---
            .route("/comments", web::get().to(list_comments))
            .route("/comments/{id}/approval", web::post().to(set_comment_approval))
            .route("/comments/{id}", web::delete().to(delete_comment))
            // --- Contact messages ---
            .route("/messages", web::get().to(list_messages))
            .route("/messages/{id}/read", web::post().to(mark_message_read))
            .route("/messages/{id}/replied", web::post().to(mark_message_replied))
            .route("/messages/{id}", web::delete().to(delete_message))
            // --- Site content ---
            .route("/settings", web::get().to(list_settings))
            .route("/settings", web::put().to(save_settings))
            .route("/categories", web::get().to(list_categories))
            .route("/categories", web::post().to(create_category))
            .route("/categories/{id}", web::put().to(update_category))
            .route("/categories/{id}/toggle", web::post().to(toggle_category))
            .route("/categories/{id}", web::delete().to(delete_category))
            .route("/about", web::put().to(save_about))
            // --- Users (admin role changes are gated) ---
            .route("/users", web::get().to(list_users))
            .route("/users/{id}/admin-role", web::post().to(set_admin_role))
            .route("/users/{id}/owner-role", web::post().to(make_owner))
            // --- Reporting & media ---
            .route("/analytics", web::get().to(analytics))
            .route("/audit-log", web::get().to(audit_log))
            .route("/media", web::post().to(upload_media)),
    );
}

/// Routes a privileged mutation through the gate.
fn run_action(
    services: &Services,
    principal: &AuthenticatedPrincipal,
    action: PrivilegedAction,
    context: &str,
) -> Result<ActionOutcome, HttpResponse> {
    let mut conn = services.pool.get().map_err(db_unavailable)?;
    gate_helpers::perform_gated_action(&mut conn, &principal.user_id, principal.flags, action)
        .map_err(|e| workflow_error_response(e, context))
}

fn gated(services: Services, principal: AuthenticatedPrincipal, action: PrivilegedAction, context: &str) -> HttpResponse {
    match run_action(&services, &principal, action, context) {
        Ok(outcome) => outcome_response(&services, outcome),
        Err(resp) => resp,
    }
}

/// Read-only listing shared by the admin endpoints.
fn admin_read<T, F>(principal: &AuthenticatedPrincipal, pool: &DbPool, context: &str, read: F) -> HttpResponse
where
    T: serde::Serialize,
    F: FnOnce(&rusqlite::Connection) -> Result<T, String>,
{
    if let Err(resp) = require_admin(principal) {
        return resp;
    }
    let conn = match pool.get() {
        Ok(c) => c,
        Err(e) => return db_unavailable(e),
    };
    match read(&conn) {
        Ok(data) => ok_json(data),
        Err(e) => internal_error(context, e),
    }
}

// --- Posts ---

async fn list_posts(principal: AuthenticatedPrincipal, pool: web::Data<DbPool>) -> impl Responder {
    admin_read(&principal, &pool, "Failed to fetch posts", |conn| {
        posts_db_operations::read_all_posts(conn).map_err(|e| e.to_string())
    })
}

async fn create_post(principal: AuthenticatedPrincipal, services: Services, draft: web::Json<PostDraft>) -> impl Responder {
    gated(services, principal, PrivilegedAction::CreatePost(draft.into_inner()), "Failed to create post")
}

async fn edit_post(
    principal: AuthenticatedPrincipal,
    services: Services,
    id: web::Path<String>,
    patch: web::Json<PostPatch>,
) -> impl Responder {
    let action = PrivilegedAction::EditPost { post_id: id.into_inner(), patch: patch.into_inner() };
    gated(services, principal, action, "Failed to update post")
}

async fn publish_post(principal: AuthenticatedPrincipal, services: Services, id: web::Path<String>) -> impl Responder {
    let patch = PostPatch { is_published: Some(true), ..Default::default() };
    gated(services, principal, PrivilegedAction::EditPost { post_id: id.into_inner(), patch }, "Failed to publish post")
}

async fn unpublish_post(principal: AuthenticatedPrincipal, services: Services, id: web::Path<String>) -> impl Responder {
    let patch = PostPatch { is_published: Some(false), ..Default::default() };
    gated(services, principal, PrivilegedAction::EditPost { post_id: id.into_inner(), patch }, "Failed to unpublish post")
}

async fn delete_post(principal: AuthenticatedPrincipal, services: Services, id: web::Path<String>) -> impl Responder {
    gated(services, principal, PrivilegedAction::DeletePost { post_id: id.into_inner() }, "Failed to delete post")
}

// --- Comments ---

async fn list_comments(principal: AuthenticatedPrincipal, pool: web::Data<DbPool>) -> impl Responder {
    admin_read(&principal, &pool, "Failed to fetch comments", |conn| {
        comments_db_operations::read_all_comments(conn).map_err(|e| e.to_string())
    })
}

async fn set_comment_approval(
    principal: AuthenticatedPrincipal,
    services: Services,
    id: web::Path<String>,
    form: web::Json<ApprovalForm>,
) -> impl Responder {
    let comment_id = id.into_inner();
    let action = PrivilegedAction::SetCommentApproval { comment_id: comment_id.clone(), approved: form.approved };
    let outcome = match run_action(&services, &principal, action, "Failed to moderate comment") {
        Ok(o) => o,
        Err(resp) => return resp,
    };

    let comment = services
        .pool
        .get()
        .map_err(|e| e.to_string())
        .and_then(|conn| comments_db_operations::read_comment(&conn, &comment_id).map_err(|e| e.to_string()));
    match comment {
        Ok(Some(comment)) if comment.is_approved => {
            services.state.realtime.publish(RowChange::CommentVisible { comment })
        }
        Ok(Some(comment)) => services
            .state
            .realtime
            .publish(RowChange::CommentHidden { post_id: comment.post_id, comment_id: comment.id }),
        Ok(None) => {}
        Err(e) => log::error!("Comment {} moderated but the live update failed: {}", comment_id, e),
    }
    outcome_response(&services, outcome)
}

async fn delete_comment(principal: AuthenticatedPrincipal, services: Services, id: web::Path<String>) -> impl Responder {
    let comment_id = id.into_inner();
    let existing = match services.pool.get() {
        Ok(conn) => comments_db_operations::read_comment(&conn, &comment_id).unwrap_or_else(|e| {
            log::error!("Failed to read comment {} before deletion: {}", comment_id, e);
            None
        }),
        Err(e) => return db_unavailable(e),
    };

    let action = PrivilegedAction::DeleteComment { comment_id: comment_id.clone() };
    let outcome = match run_action(&services, &principal, action, "Failed to delete comment") {
        Ok(o) => o,
        Err(resp) => return resp,
    };
    if let Some(comment) = existing {
        services
            .state
            .realtime
            .publish(RowChange::CommentHidden { post_id: comment.post_id, comment_id });
    }
    outcome_response(&services, outcome)
}

// --- Contact messages ---

async fn list_messages(principal: AuthenticatedPrincipal, pool: web::Data<DbPool>) -> impl Responder {
    admin_read(&principal, &pool, "Failed to fetch messages", |conn| {
        site_db_operations::read_contact_messages(conn).map_err(|e| e.to_string())
    })
}

async fn mark_message_read(principal: AuthenticatedPrincipal, services: Services, id: web::Path<String>) -> impl Responder {
    let action = PrivilegedAction::MarkMessageRead { message_id: id.into_inner() };
    gated(services, principal, action, "Failed to update message")
}

async fn mark_message_replied(principal: AuthenticatedPrincipal, services: Services, id: web::Path<String>) -> impl Responder {
    let action = PrivilegedAction::MarkMessageReplied { message_id: id.into_inner() };
    gated(services, principal, action, "Failed to update message")
}

async fn delete_message(principal: AuthenticatedPrincipal, services: Services, id: web::Path<String>) -> impl Responder {
    let action = PrivilegedAction::DeleteMessage { message_id: id.into_inner() };
    gated(services, principal, action, "Failed to delete message")
}

// --- Settings, categories, about ---

async fn list_settings(principal: AuthenticatedPrincipal, pool: web::Data<DbPool>) -> impl Responder {
    admin_read(&principal, &pool, "Failed to fetch settings", |conn| {
        site_db_operations::read_all_settings(conn).map_err(|e| e.to_string())
    })
}

async fn save_settings(
    principal: AuthenticatedPrincipal,
    services: Services,
    updates: web::Json<Vec<SettingUpdate>>,
) -> impl Responder {
    gated(services, principal, PrivilegedAction::UpsertSettings(updates.into_inner()), "Failed to save settings")
}

async fn list_categories(principal: AuthenticatedPrincipal, pool: web::Data<DbPool>) -> impl Responder {
    admin_read(&principal, &pool, "Failed to fetch categories", |conn| {
        site_db_operations::read_categories(conn, false).map_err(|e| e.to_string())
    })
}

async fn create_category(
    principal: AuthenticatedPrincipal,
    services: Services,
    input: web::Json<CategoryInput>,
) -> impl Responder {
    gated(services, principal, PrivilegedAction::CreateCategory(input.into_inner()), "Failed to create category")
}

async fn update_category(
    principal: AuthenticatedPrincipal,
    services: Services,
    id: web::Path<String>,
    input: web::Json<CategoryInput>,
) -> impl Responder {
    let action = PrivilegedAction::UpdateCategory { category_id: id.into_inner(), input: input.into_inner() };
    gated(services, principal, action, "Failed to update category")
}

async fn toggle_category(principal: AuthenticatedPrincipal, services: Services, id: web::Path<String>) -> impl Responder {
    let action = PrivilegedAction::ToggleCategory { category_id: id.into_inner() };
    gated(services, principal, action, "Failed to toggle category")
}

async fn delete_category(principal: AuthenticatedPrincipal, services: Services, id: web::Path<String>) -> impl Responder {
    let action = PrivilegedAction::DeleteCategory { category_id: id.into_inner() };
    gated(services, principal, action, "Failed to delete category")
}

async fn save_about(principal: AuthenticatedPrincipal, services: Services, about: web::Json<AboutContent>) -> impl Responder {
    gated(services, principal, PrivilegedAction::SaveAbout(about.into_inner()), "Failed to save about content")
}

// --- Users ---

async fn list_users(principal: AuthenticatedPrincipal, pool: web::Data<DbPool>) -> impl Responder {
    admin_read(&principal, &pool, "Failed to fetch users", |conn| {
        users_db_operations::read_all_users(conn).map_err(|e| e.to_string())
    })
}

async fn set_admin_role(
    principal: AuthenticatedPrincipal,
    services: Services,
    id: web::Path<String>,
    form: web::Json<RoleForm>,
) -> impl Responder {
    let user_id = id.into_inner();
    if user_id == principal.user_id {
        return error_json(StatusCode::BAD_REQUEST, "You cannot change your own role.");
    }
    let action = PrivilegedAction::SetAdminRole { user_id, grant: form.grant };
    gated(services, principal, action, "Failed to change role")
}

/// Owner promotion is owner-only and applied directly.
async fn make_owner(principal: AuthenticatedPrincipal, pool: web::Data<DbPool>, id: web::Path<String>) -> impl Responder {
    if let Err(resp) = require_owner(&principal) {
        return resp;
    }
    let user_id = id.into_inner();
    let conn = match pool.get() {
        Ok(c) => c,
        Err(e) => return db_unavailable(e),
    };
    match users_db_operations::read_user_summary(&conn, &user_id) {
        Ok(Some(_)) => {}
        Ok(None) => return error_json(StatusCode::NOT_FOUND, "User not found."),
        Err(e) => return internal_error("Failed to promote user", e),
    }
    match users_db_operations::grant_role(&conn, &user_id, Role::Owner) {
        Ok(_) => {
            log::info!("User {} promoted to owner by {}", user_id, principal.user_id);
            ok_json(json!({ "user_id": user_id, "role": Role::Owner }))
        }
        Err(e) => internal_error("Failed to promote user", e),
    }
}

// --- Reporting & media ---

async fn analytics(principal: AuthenticatedPrincipal, pool: web::Data<DbPool>) -> impl Responder {
    admin_read(&principal, &pool, "Failed to build analytics", |conn| {
        analytics_helpers::build_analytics(conn, Utc::now()).map_err(|e| e.to_string())
    })
}

async fn audit_log(principal: AuthenticatedPrincipal, pool: web::Data<DbPool>) -> impl Responder {
    admin_read(&principal, &pool, "Failed to fetch audit log", |conn| {
        posts_db_operations::read_audit_log(conn, AUDIT_LOG_LIMIT).map_err(|e| e.to_string())
    })
}

async fn upload_media(
    principal: AuthenticatedPrincipal,
    services: Services,
    query: web::Query<MediaQuery>,
    payload: Multipart,
) -> impl Responder {
    if let Err(resp) = require_admin(&principal) {
        return resp;
    }
    let max_mb = services.state.settings.current().max_upload_size_mb;
    match media_helpers::save_upload(&services.config, query.kind, max_mb, payload).await {
        Ok(stored) => ok_json(stored),
        Err(e) if e.is_client_error() => error_json(StatusCode::BAD_REQUEST, e.to_string()),
        Err(e) => internal_error("Failed to store upload", e),
    }
}
