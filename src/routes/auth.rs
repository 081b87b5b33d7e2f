use crate::helper::password_helpers::{self, PasswordCheck};
use crate::helper::role_helpers;
use crate::helper::sanitization_helpers::strip_all_html;
use crate::middleware::{AuthenticatedPrincipal, SESSION_USER_KEY};
use crate::models::db_operations::{users_db_operations, DbError};
use crate::routes::{db_unavailable, error_json, internal_error, ok_json};
use crate::DbPool;
use actix_session::Session;
use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, Responder};
use serde::Deserialize;
use serde_json::json;

#[derive(Deserialize)]
pub struct SignupForm {
    email: String,
    password: String,
    password_confirmation: String,
    display_name: String,
}

#[derive(Deserialize)]
pub struct SigninForm {
    email: String,
    password: String,
}

#[derive(Deserialize)]
pub struct PasswordProbe {
    password: String,
}

#[derive(Deserialize)]
pub struct PasswordChange {
    password: String,
    password_confirmation: String,
}

#[derive(Deserialize)]
pub struct OwnerQuery {
    user_id: Option<String>,
}

#[derive(Deserialize)]
pub struct ProfileUpdate {
    display_name: Option<String>,
    email_notifications_enabled: Option<bool>,
}

pub fn config_auth(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/auth")
            .route("/signup", web::post().to(signup))
            .route("/signin", web::post().to(signin))
            .route("/signout", web::post().to(signout))
            .route("/password-strength", web::post().to(password_strength))
            .route("/password", web::post().to(change_password))
            .route("/me", web::get().to(me))
            .route("/is-owner", web::get().to(is_owner)),
    )
    .service(
        web::scope("/api/profile")
            .route("", web::get().to(get_profile))
            .route("", web::patch().to(update_profile))
            .route("", web::delete().to(delete_account))
            .route("/subscription", web::get().to(get_subscription))
            .route("/unsubscribe", web::post().to(unsubscribe))
            .route("/resubscribe", web::post().to(resubscribe)),
    );
}

fn start_session(session: &Session, user_id: &str) -> Result<(), HttpResponse> {
    session.renew();
    session
        .insert(SESSION_USER_KEY, user_id)
        .map_err(|e| internal_error("Failed to start session", e))
}

async fn signup(session: Session, pool: web::Data<DbPool>, form: web::Json<SignupForm>) -> impl Responder {
    let display_name = strip_all_html(&form.display_name);
    if let Err(msg) = password_helpers::validate_signup(&form.email, &form.password, &form.password_confirmation, &display_name) {
        return error_json(StatusCode::BAD_REQUEST, msg);
    }

    let conn = match pool.get() {
        Ok(c) => c,
        Err(e) => return db_unavailable(e),
    };
    match users_db_operations::email_exists(&conn, &form.email) {
        Ok(true) => return error_json(StatusCode::CONFLICT, "An account with this email already exists."),
        Ok(false) => {}
        Err(e) => return internal_error("Failed to create account", e),
    }

    let user_id = match users_db_operations::create_user(&conn, &form.email, &form.password, &display_name) {
        Ok(id) => id,
        Err(e) => return internal_error("Failed to create account", e),
    };
    log::info!("New account registered: {}", user_id);

    if let Err(resp) = start_session(&session, &user_id) {
        return resp;
    }
    HttpResponse::Created().json(json!({ "success": true, "data": { "user_id": user_id } }))
}

async fn signin(session: Session, pool: web::Data<DbPool>, form: web::Json<SigninForm>) -> impl Responder {
    let conn = match pool.get() {
        Ok(c) => c,
        Err(e) => return db_unavailable(e),
    };
    let user_id = match users_db_operations::verify_credentials(&conn, &form.email, &form.password) {
        Ok(Some(id)) => id,
        Ok(None) => {
            log::warn!("Failed sign-in attempt for {}", form.email.trim());
            return error_json(StatusCode::UNAUTHORIZED, "Invalid email or password.");
        }
        Err(e) => return internal_error("Failed to sign in", e),
    };
    if let Err(e) = users_db_operations::update_last_sign_in(&conn, &user_id) {
        log::error!("Failed to record sign-in time for {}: {}", user_id, e);
    }
    if let Err(resp) = start_session(&session, &user_id) {
        return resp;
    }
    let flags = role_helpers::resolve_role_flags(&conn, Some(&user_id));
    ok_json(json!({ "user_id": user_id, "is_admin": flags.is_admin, "is_owner": flags.is_owner }))
}

async fn signout(session: Session) -> impl Responder {
    session.purge();
    ok_json(json!({ "signed_out": true }))
}

async fn password_strength(form: web::Json<PasswordProbe>) -> impl Responder {
    let check: PasswordCheck = password_helpers::check_password(&form.password);
    ok_json(check)
}

async fn change_password(
    principal: AuthenticatedPrincipal,
    pool: web::Data<DbPool>,
    form: web::Json<PasswordChange>,
) -> impl Responder {
    if let Err(msg) = password_helpers::validate_new_password(&form.password, &form.password_confirmation) {
        return error_json(StatusCode::BAD_REQUEST, msg);
    }
    let conn = match pool.get() {
        Ok(c) => c,
        Err(e) => return db_unavailable(e),
    };
    match users_db_operations::update_password(&conn, &principal.user_id, &form.password) {
        Ok(0) => error_json(StatusCode::NOT_FOUND, "Account not found."),
        Ok(_) => {
            log::info!("Password changed for {}", principal.user_id);
            ok_json(json!({ "password_changed": true }))
        }
        Err(e) => internal_error("Failed to change password", e),
    }
}

async fn me(principal: AuthenticatedPrincipal) -> impl Responder {
    ok_json(principal)
}

async fn is_owner(principal: AuthenticatedPrincipal, pool: web::Data<DbPool>, query: web::Query<OwnerQuery>) -> impl Responder {
    let user_id = query.user_id.clone().unwrap_or_else(|| principal.user_id.clone());
    let conn = match pool.get() {
        Ok(c) => c,
        Err(e) => return db_unavailable(e),
    };
    ok_json(json!({ "user_id": user_id, "is_owner": role_helpers::is_owner(&conn, &user_id) }))
}

async fn get_profile(principal: AuthenticatedPrincipal, pool: web::Data<DbPool>) -> impl Responder {
    let conn = match pool.get() {
        Ok(c) => c,
        Err(e) => return db_unavailable(e),
    };
    let profile = match users_db_operations::read_profile(&conn, &principal.user_id) {
        Ok(Some(p)) => p,
        Ok(None) => return error_json(StatusCode::NOT_FOUND, "Profile not found."),
        Err(e) => return internal_error("Failed to load profile", e),
    };
    match users_db_operations::read_profile_stats(&conn, &principal.user_id) {
        Ok(stats) => ok_json(json!({ "profile": profile, "stats": stats, "roles": principal.flags })),
        Err(e) => internal_error("Failed to load profile", e),
    }
}

async fn update_profile(
    principal: AuthenticatedPrincipal,
    pool: web::Data<DbPool>,
    form: web::Json<ProfileUpdate>,
) -> impl Responder {
    let conn = match pool.get() {
        Ok(c) => c,
        Err(e) => return db_unavailable(e),
    };
    if let Some(name) = &form.display_name {
        let name = strip_all_html(name);
        if name.is_empty() {
            return error_json(StatusCode::BAD_REQUEST, "Display name is required.");
        }
        if let Err(e) = users_db_operations::update_display_name(&conn, &principal.user_id, &name) {
            return internal_error("Failed to update profile", e);
        }
    }
    if let Some(enabled) = form.email_notifications_enabled {
        if let Err(resp) = change_subscription(&conn, &principal, enabled) {
            return resp;
        }
    }
    match users_db_operations::read_profile(&conn, &principal.user_id) {
        Ok(Some(profile)) => ok_json(profile),
        Ok(None) => error_json(StatusCode::NOT_FOUND, "Profile not found."),
        Err(e) => internal_error("Failed to load profile", e),
    }
}

/// Removes the account. Comments stay, anonymized.
async fn delete_account(session: Session, principal: AuthenticatedPrincipal, pool: web::Data<DbPool>) -> impl Responder {
    let mut conn = match pool.get() {
        Ok(c) => c,
        Err(e) => return db_unavailable(e),
    };
    match users_db_operations::delete_user_account(&mut conn, &principal.user_id) {
        Ok(true) => {
            log::info!("Account {} deleted by its owner", principal.user_id);
            session.purge();
            ok_json(json!({ "deleted": true }))
        }
        Ok(false) => error_json(StatusCode::NOT_FOUND, "Account not found."),
        Err(DbError::OwnerAccount) => {
            log::warn!("Refused account deletion for owner {}", principal.user_id);
            error_json(StatusCode::FORBIDDEN, "The owner account cannot be deleted.")
        }
        Err(e) => internal_error("Failed to delete account", e),
    }
}

async fn get_subscription(principal: AuthenticatedPrincipal, pool: web::Data<DbPool>) -> impl Responder {
    let conn = match pool.get() {
        Ok(c) => c,
        Err(e) => return db_unavailable(e),
    };
    match users_db_operations::read_profile(&conn, &principal.user_id) {
        Ok(Some(p)) => ok_json(json!({
            "email_notifications_enabled": p.email_notifications_enabled,
            "can_unsubscribe": !principal.flags.is_admin
        })),
        Ok(None) => error_json(StatusCode::NOT_FOUND, "Profile not found."),
        Err(e) => internal_error("Failed to load subscription", e),
    }
}

/// Staff always receive publish notifications.
fn change_subscription(
    conn: &rusqlite::Connection,
    principal: &AuthenticatedPrincipal,
    enabled: bool,
) -> Result<(), HttpResponse> {
    if !enabled && principal.flags.is_admin {
        return Err(error_json(StatusCode::FORBIDDEN, "Admins and owners cannot unsubscribe from notifications."));
    }
    users_db_operations::set_email_notifications(conn, &principal.user_id, enabled)
        .map(|_| ())
        .map_err(|e| internal_error("Failed to update subscription", e))
}

async fn unsubscribe(principal: AuthenticatedPrincipal, pool: web::Data<DbPool>) -> impl Responder {
    set_subscription(principal, pool, false)
}

async fn resubscribe(principal: AuthenticatedPrincipal, pool: web::Data<DbPool>) -> impl Responder {
    set_subscription(principal, pool, true)
}

fn set_subscription(principal: AuthenticatedPrincipal, pool: web::Data<DbPool>, enabled: bool) -> HttpResponse {
    let conn = match pool.get() {
        Ok(c) => c,
        Err(e) => return db_unavailable(e),
    };
    match change_subscription(&conn, &principal, enabled) {
        Ok(()) => ok_json(json!({ "email_notifications_enabled": enabled })),
        Err(resp) => resp,
    }
}
