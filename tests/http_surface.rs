mod common;

use actix_session::{storage::CookieSessionStore, SessionMiddleware};
use actix_web::cookie::{Cookie, Key};
use actix_web::http::{header, Method, StatusCode};
use actix_web::{test, web, App};
use common::{RecordingMailer, TestDb};
use serde_json::{json, Value};
use std::sync::Arc;
use unfiltered_backend::helper::feed_helpers;
use unfiltered_backend::models::db_operations::{posts_db_operations, users_db_operations};
use unfiltered_backend::models::{PostCategory, Role};
use unfiltered_backend::routes;

/// The server's route table over a temporary database.
macro_rules! blog_app {
    ($db:expr) => {{
        let db: &TestDb = $db;
        test::init_service(
            App::new()
                .app_data(web::Data::new(db.config()))
                .app_data(web::Data::new(feed_helpers::build_templates().unwrap()))
                .app_data(web::Data::new(db.pool.clone()))
                .app_data(web::Data::new(db.app_state(Arc::new(RecordingMailer::default()))))
                .configure(routes::public::config_site)
                .service(
                    web::scope("")
                        .wrap(
                            SessionMiddleware::builder(CookieSessionStore::default(), Key::from(&[7u8; 64]))
                                .cookie_secure(false)
                                .build(),
                        )
                        .configure(routes::change_requests::config_change_requests)
                        .configure(routes::admin::config_admin)
                        .configure(routes::auth::config_auth)
                        .configure(routes::public::config_api),
                ),
        )
        .await
    }};
}

macro_rules! sign_in {
    ($app:expr, $email:expr) => {{
        let req = test::TestRequest::post()
            .uri("/api/auth/signin")
            .set_json(json!({ "email": $email, "password": "Sup3r$ecret" }))
            .to_request();
        let resp = test::call_service($app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let cookie: Cookie<'static> = resp.response().cookies().next().expect("session cookie").into_owned();
        cookie
    }};
}

#[actix_web::test]
async fn health_reports_service_name() {
    let db = TestDb::new();
    let app = blog_app!(&db);

    let body: Value = test::call_and_read_body_json(&app, test::TestRequest::get().uri("/health").to_request()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "The Unfiltered Voice");
    assert!(body["timestamp"].as_str().is_some());
}

#[actix_web::test]
async fn feeds_list_only_published_posts() {
    let db = TestDb::new();
    let live = db.post("Finding Calm", PostCategory::MentalHealth, true);
    let draft = db.post("Unfinished Thoughts", PostCategory::MentalHealth, false);
    let app = blog_app!(&db);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/rss.xml").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers().get(header::CONTENT_TYPE).unwrap(), "application/rss+xml");
    assert_eq!(resp.headers().get(header::CACHE_CONTROL).unwrap(), "public, max-age=3600, s-maxage=3600");
    let rss = String::from_utf8(test::read_body(resp).await.to_vec()).unwrap();
    assert!(rss.contains("<title>Finding Calm</title>"));
    assert!(rss.contains(&format!("https://www.unfilteredvoice.me/mental-health/{}", live.slug)));
    assert!(!rss.contains("Unfinished Thoughts"));

    let resp = test::call_service(&app, test::TestRequest::get().uri("/sitemap.xml").to_request()).await;
    assert_eq!(resp.headers().get(header::CONTENT_TYPE).unwrap(), "application/xml");
    let sitemap = String::from_utf8(test::read_body(resp).await.to_vec()).unwrap();
    assert!(sitemap.contains(&live.slug));
    assert!(!sitemap.contains(&draft.slug));
    assert!(sitemap.contains("<loc>https://www.unfilteredvoice.me/meet-niyati</loc>"));
}

#[actix_web::test]
async fn settings_api_is_read_only_and_cross_origin() {
    let db = TestDb::new();
    let app = blog_app!(&db);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/api/settings").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(), "*");
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], true);
    let keys: Vec<&str> = body["data"].as_array().unwrap().iter().filter_map(|row| row["key"].as_str()).collect();
    assert!(keys.contains(&"site_name"));

    let preflight = test::TestRequest::default().method(Method::OPTIONS).uri("/api/settings").to_request();
    let resp = test::call_service(&app, preflight).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers().get(header::ACCESS_CONTROL_ALLOW_METHODS).unwrap(), "GET, OPTIONS");

    let resp = test::call_service(
        &app,
        test::TestRequest::post().uri("/api/settings").set_json(json!({ "key": "site_name" })).to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Method not allowed");
}

#[actix_web::test]
async fn anonymous_comments_never_carry_a_user() {
    let db = TestDb::new();
    let post = db.post("Why I Write", PostCategory::CreativeWriting, true);
    let draft = db.post("Not Yet", PostCategory::CreativeWriting, false);
    let app = blog_app!(&db);

    let req = test::TestRequest::post()
        .uri(&format!("/api/posts/{}/comments", post.id))
        .set_json(json!({ "message": "<b>Lovely</b> piece", "display_name": "Visitor" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["user_id"], Value::Null);
    assert_eq!(body["data"]["is_anonymous"], true);
    assert_eq!(body["data"]["display_name"], "Visitor");
    assert_eq!(body["data"]["message"], "Lovely piece");
    // New comments wait for moderation by default.
    assert_eq!(body["data"]["is_approved"], false);

    let listed: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get().uri(&format!("/api/posts/{}/comments", post.id)).to_request(),
    )
    .await;
    assert!(listed["data"].as_array().unwrap().is_empty());

    let req = test::TestRequest::post()
        .uri(&format!("/api/posts/{}/comments", draft.id))
        .set_json(json!({ "message": "Too early" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn admin_routes_require_a_session() {
    let db = TestDb::new();
    let app = blog_app!(&db);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/api/admin/posts").to_request()).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/api/admin/change-requests").to_request()).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn admin_edit_waits_for_owner_review() {
    let db = TestDb::new();
    db.user("admin@example.com", "Ada", &[Role::Admin]);
    db.user("owner@example.com", "Niyati", &[Role::Owner]);
    db.user("reader@example.com", "Riya", &[]);
    let post = db.post("Old", PostCategory::Books, false);
    let app = blog_app!(&db);

    let reader = sign_in!(&app, "reader@example.com");
    let req = test::TestRequest::put()
        .uri(&format!("/api/admin/posts/{}", post.id))
        .cookie(reader)
        .set_json(json!({ "title": "Hijacked" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

    let admin = sign_in!(&app, "admin@example.com");
    let req = test::TestRequest::put()
        .uri(&format!("/api/admin/posts/{}", post.id))
        .cookie(admin.clone())
        .set_json(json!({ "title": "New" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["status"], "pending_approval");
    let request_id = body["data"]["request_id"].as_str().unwrap().to_string();
    assert_eq!(posts_db_operations::read_post(&db.conn(), &post.id).unwrap().unwrap().title, "Old");

    // Admins cannot approve their own proposals.
    let req = test::TestRequest::post()
        .uri(&format!("/api/admin/change-requests/{}/review", request_id))
        .cookie(admin)
        .set_json(json!({ "action": "approve" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

    let owner = sign_in!(&app, "owner@example.com");
    let req = test::TestRequest::post()
        .uri(&format!("/api/admin/change-requests/{}/review", request_id))
        .cookie(owner.clone())
        .set_json(json!({ "action": "approve", "notes": "looks good" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["status"], "approved");
    assert_eq!(body["data"]["review_notes"], "looks good");
    assert_eq!(posts_db_operations::read_post(&db.conn(), &post.id).unwrap().unwrap().title, "New");

    let req = test::TestRequest::post()
        .uri(&format!("/api/admin/change-requests/{}/review", request_id))
        .cookie(owner)
        .set_json(json!({ "action": "reject" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CONFLICT);
}

#[actix_web::test]
async fn only_owners_can_promote_an_owner() {
    let db = TestDb::new();
    db.user("admin@example.com", "Ada", &[Role::Admin]);
    db.user("owner@example.com", "Niyati", &[Role::Owner]);
    let reader = db.user("reader@example.com", "Riya", &[]);
    let app = blog_app!(&db);

    let admin = sign_in!(&app, "admin@example.com");
    let req = test::TestRequest::post()
        .uri(&format!("/api/admin/users/{}/owner-role", reader))
        .cookie(admin)
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);
    assert!(users_db_operations::read_privileged_roles(&db.conn(), &reader).unwrap().is_empty());

    let owner = sign_in!(&app, "owner@example.com");
    let req = test::TestRequest::post()
        .uri("/api/admin/users/no-such-user/owner-role")
        .cookie(owner.clone())
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::post()
        .uri(&format!("/api/admin/users/{}/owner-role", reader))
        .cookie(owner)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["role"], "owner");
    // Applied directly, nothing waits for review.
    assert!(users_db_operations::read_privileged_roles(&db.conn(), &reader).unwrap().contains(&Role::Owner));
    assert_eq!(users_db_operations::read_owner_emails(&db.conn()).unwrap().len(), 2);
}

#[actix_web::test]
async fn password_change_enforces_the_policy() {
    let db = TestDb::new();
    db.user("reader@example.com", "Riya", &[]);
    let app = blog_app!(&db);

    let req = test::TestRequest::post()
        .uri("/api/auth/password")
        .set_json(json!({ "password": "N3w&Better", "password_confirmation": "N3w&Better" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

    let session = sign_in!(&app, "reader@example.com");
    let req = test::TestRequest::post()
        .uri("/api/auth/password")
        .cookie(session.clone())
        .set_json(json!({ "password": "password1", "password_confirmation": "password1" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["error"].as_str().unwrap().starts_with("Password does not meet requirements"));

    let req = test::TestRequest::post()
        .uri("/api/auth/password")
        .cookie(session.clone())
        .set_json(json!({ "password": "N3w&Better", "password_confirmation": "N3w&Bett3r" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Passwords do not match.");

    let conn = db.conn();
    assert!(users_db_operations::verify_credentials(&conn, "reader@example.com", "Sup3r$ecret").unwrap().is_some());

    let req = test::TestRequest::post()
        .uri("/api/auth/password")
        .cookie(session)
        .set_json(json!({ "password": "N3w&Better", "password_confirmation": "N3w&Better" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
    assert!(users_db_operations::verify_credentials(&conn, "reader@example.com", "Sup3r$ecret").unwrap().is_none());

    let req = test::TestRequest::post()
        .uri("/api/auth/signin")
        .set_json(json!({ "email": "reader@example.com", "password": "N3w&Better" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
}

#[actix_web::test]
async fn owners_cannot_delete_their_account() {
    let db = TestDb::new();
    let owner_id = db.user("owner@example.com", "Niyati", &[Role::Owner]);
    let app = blog_app!(&db);

    let owner = sign_in!(&app, "owner@example.com");
    let req = test::TestRequest::delete().uri("/api/profile").cookie(owner).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "The owner account cannot be deleted.");
    assert!(users_db_operations::read_privileged_roles(&db.conn(), &owner_id).unwrap().contains(&Role::Owner));
}
