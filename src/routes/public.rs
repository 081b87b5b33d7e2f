use crate::config::Config;
use crate::helper::comment_helpers::{self, Commenter};
use crate::helper::feed_helpers::{self, RSS_ITEM_LIMIT};
use crate::helper::notification_helpers;
use crate::helper::realtime_helpers::{self, RowChange};
use crate::middleware::MaybePrincipal;
use crate::models::db_operations::{comments_db_operations, posts_db_operations, site_db_operations};
use crate::models::{NewComment, NewContactMessage, PostCategory};
use crate::routes::{db_unavailable, error_json, internal_error, ok_json, Services};
use crate::{AppState, DbPool};
use actix_web::http::{header, Method, StatusCode};
use actix_web::middleware::DefaultHeaders;
use actix_web::{web, HttpResponse, Responder};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tera::Tera;

const DEFAULT_PAGE_SIZE: u32 = 10;
const MAX_PAGE_SIZE: u32 = 50;
const FEED_CACHE_CONTROL: &str = "public, max-age=3600, s-maxage=3600";

#[derive(Deserialize)]
pub struct PostListQuery {
    category: Option<String>,
    limit: Option<u32>,
    offset: Option<u32>,
}

/// Unauthenticated endpoints that live outside the session scope.
pub fn config_site(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health))
        .route("/rss.xml", web::get().to(rss_feed))
        .route("/sitemap.xml", web::get().to(sitemap))
        .service(
            web::resource("/api/settings")
                .wrap(
                    DefaultHeaders::new()
                        .add((header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"))
                        .add((header::ACCESS_CONTROL_ALLOW_METHODS, "GET, OPTIONS"))
                        .add((header::ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type")),
                )
                .route(web::get().to(get_public_settings))
                .route(web::method(Method::OPTIONS).to(|| async { HttpResponse::Ok().finish() }))
                .default_service(web::to(|| async {
                    HttpResponse::MethodNotAllowed().json(json!({ "error": "Method not allowed" }))
                })),
        );
}

pub fn config_api(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/posts", web::get().to(list_posts))
            .route("/posts/latest", web::get().to(latest_posts))
            .route("/posts/{post_id}/comments", web::get().to(list_comments))
            .route("/posts/{post_id}/comments", web::post().to(create_comment))
            .route("/posts/{post_id}/comments/stream", web::get().to(comment_stream))
            .route("/categories/{category}/posts/{slug}", web::get().to(get_post_by_slug))
            .route("/settings/stream", web::get().to(settings_stream))
            .route("/categories", web::get().to(list_categories))
            .route("/about", web::get().to(get_about))
            .route("/contact", web::post().to(submit_contact)),
    );
}

async fn health() -> impl Responder {
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339(),
        "service": "The Unfiltered Voice"
    }))
}

async fn rss_feed(
    pool: web::Data<DbPool>,
    state: web::Data<AppState>,
    tera: web::Data<Tera>,
    config: web::Data<Config>,
) -> impl Responder {
    let conn = match pool.get() {
        Ok(c) => c,
        Err(e) => return db_unavailable(e),
    };
    let posts = match posts_db_operations::read_published_posts(&conn, None, RSS_ITEM_LIMIT, 0) {
        Ok(p) => p,
        Err(e) => {
            log::error!("Failed to load posts for RSS: {}", e);
            return HttpResponse::InternalServerError().content_type("text/plain").body("Error generating RSS feed");
        }
    };
    let site_name = state.settings.current().site_name.clone();
    match feed_helpers::render_rss(&tera, &config, &site_name, &posts, Utc::now()) {
        Ok(xml) => HttpResponse::Ok()
            .content_type("application/rss+xml")
            .insert_header((header::CACHE_CONTROL, FEED_CACHE_CONTROL))
            .body(xml),
        Err(e) => {
            log::error!("Failed to render RSS: {}", e);
            HttpResponse::InternalServerError().content_type("text/plain").body("Error generating RSS feed")
        }
    }
}

async fn sitemap(pool: web::Data<DbPool>, tera: web::Data<Tera>, config: web::Data<Config>) -> impl Responder {
    let conn = match pool.get() {
        Ok(c) => c,
        Err(e) => return db_unavailable(e),
    };
    let posts = match posts_db_operations::read_published_posts(&conn, None, u32::MAX, 0) {
        Ok(p) => p,
        Err(e) => {
            log::error!("Failed to load posts for sitemap: {}", e);
            return HttpResponse::InternalServerError().content_type("text/plain").body("Error generating sitemap");
        }
    };
    let entries = feed_helpers::sitemap_entries(&config, &posts, Utc::now());
    match feed_helpers::render_sitemap(&tera, &entries) {
        Ok(xml) => HttpResponse::Ok()
            .content_type("application/xml")
            .insert_header((header::CACHE_CONTROL, FEED_CACHE_CONTROL))
            .body(xml),
        Err(e) => {
            log::error!("Failed to render sitemap: {}", e);
            HttpResponse::InternalServerError().content_type("text/plain").body("Error generating sitemap")
        }
    }
}

async fn get_public_settings(pool: web::Data<DbPool>) -> impl Responder {
    let rows = pool
        .get()
        .map_err(|e| e.to_string())
        .and_then(|conn| site_db_operations::read_all_settings(&conn).map_err(|e| e.to_string()));
    match rows {
        Ok(rows) => {
            let data: Vec<_> = rows.iter().map(|r| json!({ "key": r.key, "value": r.value })).collect();
            HttpResponse::Ok().json(json!({ "success": true, "data": data }))
        }
        Err(details) => {
            log::error!("Settings API error: {}", details);
            HttpResponse::InternalServerError().json(json!({ "error": "Failed to fetch settings", "details": details }))
        }
    }
}

fn parse_category(raw: &str) -> Result<PostCategory, HttpResponse> {
    raw.parse::<PostCategory>().map_err(|e| error_json(StatusCode::BAD_REQUEST, e))
}

async fn list_posts(pool: web::Data<DbPool>, query: web::Query<PostListQuery>) -> impl Responder {
    let category = match query.category.as_deref().filter(|c| !c.is_empty()).map(parse_category).transpose() {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE);
    let offset = query.offset.unwrap_or(0);

    let conn = match pool.get() {
        Ok(c) => c,
        Err(e) => return db_unavailable(e),
    };
    match posts_db_operations::read_published_posts(&conn, category, limit, offset) {
        Ok(posts) => ok_json(posts),
        Err(e) => internal_error("Failed to fetch posts", e),
    }
}

async fn latest_posts(pool: web::Data<DbPool>, query: web::Query<PostListQuery>) -> impl Responder {
    let limit = query.limit.unwrap_or(3).min(MAX_PAGE_SIZE);
    let conn = match pool.get() {
        Ok(c) => c,
        Err(e) => return db_unavailable(e),
    };
    match posts_db_operations::read_published_posts(&conn, None, limit, 0) {
        Ok(posts) => ok_json(posts),
        Err(e) => internal_error("Failed to fetch latest posts", e),
    }
}

async fn get_post_by_slug(pool: web::Data<DbPool>, path: web::Path<(String, String)>) -> impl Responder {
    let (category, slug) = path.into_inner();
    let category = match parse_category(&category) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let conn = match pool.get() {
        Ok(c) => c,
        Err(e) => return db_unavailable(e),
    };
    match posts_db_operations::read_published_post_by_slug(&conn, category, &slug) {
        Ok(Some(post)) => ok_json(post),
        Ok(None) => error_json(StatusCode::NOT_FOUND, "Post not found."),
        Err(e) => internal_error("Failed to fetch post", e),
    }
}

/// 404 unless the post exists and is published.
fn ensure_published(conn: &rusqlite::Connection, post_id: &str) -> Result<(), HttpResponse> {
    match posts_db_operations::is_published(conn, post_id) {
        Ok(true) => Ok(()),
        Ok(false) => Err(error_json(StatusCode::NOT_FOUND, "Post not found.")),
        Err(e) => Err(internal_error("Failed to look up post", e)),
    }
}

async fn list_comments(pool: web::Data<DbPool>, post_id: web::Path<String>) -> impl Responder {
    let conn = match pool.get() {
        Ok(c) => c,
        Err(e) => return db_unavailable(e),
    };
    if let Err(resp) = ensure_published(&conn, &post_id) {
        return resp;
    }
    match comments_db_operations::read_approved_comments(&conn, &post_id) {
        Ok(comments) => ok_json(comments),
        Err(e) => internal_error("Failed to fetch comments", e),
    }
}

async fn create_comment(
    principal: MaybePrincipal,
    pool: web::Data<DbPool>,
    state: web::Data<AppState>,
    post_id: web::Path<String>,
    body: web::Json<NewComment>,
) -> impl Responder {
    let conn = match pool.get() {
        Ok(c) => c,
        Err(e) => return db_unavailable(e),
    };
    if let Err(resp) = ensure_published(&conn, &post_id) {
        return resp;
    }

    let commenter = match &principal.0 {
        Some(p) => Commenter::User { user_id: &p.user_id, display_name: &p.display_name },
        None => Commenter::Anonymous,
    };
    let require_approval = state.settings.current().comments_require_approval;
    let id = uuid::Uuid::new_v4().to_string();
    let comment = match comment_helpers::build_comment(&id, &post_id, commenter, &body, require_approval, Utc::now()) {
        Ok(c) => c,
        Err(msg) => return error_json(StatusCode::BAD_REQUEST, msg),
    };

    if let Err(e) = comments_db_operations::insert_comment(&conn, &comment) {
        return internal_error("Failed to save comment", e);
    }
    log::info!("Comment {} added to post {} (approved: {})", comment.id, comment.post_id, comment.is_approved);
    if comment.is_approved {
        state.realtime.publish(RowChange::CommentVisible { comment: comment.clone() });
    }
    HttpResponse::Created().json(json!({ "success": true, "data": comment }))
}

async fn comment_stream(state: web::Data<AppState>, post_id: web::Path<String>) -> impl Responder {
    let stream = realtime_helpers::comment_event_stream(state.realtime.subscribe(), post_id.into_inner());
    HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header((header::CACHE_CONTROL, "no-cache"))
        .streaming(stream)
}

async fn settings_stream(state: web::Data<AppState>) -> impl Responder {
    let stream = realtime_helpers::settings_event_stream(state.settings.subscribe());
    HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header((header::CACHE_CONTROL, "no-cache"))
        .streaming(stream)
}

async fn list_categories(pool: web::Data<DbPool>) -> impl Responder {
    let conn = match pool.get() {
        Ok(c) => c,
        Err(e) => return db_unavailable(e),
    };
    match site_db_operations::read_categories(&conn, true) {
        Ok(categories) => ok_json(categories),
        Err(e) => internal_error("Failed to fetch categories", e),
    }
}

async fn get_about(pool: web::Data<DbPool>) -> impl Responder {
    let conn = match pool.get() {
        Ok(c) => c,
        Err(e) => return db_unavailable(e),
    };
    match site_db_operations::read_about(&conn) {
        Ok(about) => ok_json(about.unwrap_or_default()),
        Err(e) => internal_error("Failed to fetch about content", e),
    }
}

async fn submit_contact(services: Services, body: web::Json<NewContactMessage>) -> impl Responder {
    let id = uuid::Uuid::new_v4().to_string();
    let message = match comment_helpers::build_contact_message(&id, &body, Utc::now()) {
        Ok(m) => m,
        Err(msg) => return error_json(StatusCode::BAD_REQUEST, msg),
    };
    {
        let conn = match services.pool.get() {
            Ok(c) => c,
            Err(e) => return db_unavailable(e),
        };
        if let Err(e) = site_db_operations::insert_contact_message(&conn, &message) {
            return internal_error("Failed to save your message", e);
        }
    }
    log::info!("Contact message {} received", message.id);
    notification_helpers::spawn_contact_notification(
        services.pool.clone(),
        services.state.clone(),
        services.tera.clone(),
        services.config.clone(),
        message,
    );
    ok_json(json!({ "message": "Thank you for your message. We'll get back to you soon." }))
}
