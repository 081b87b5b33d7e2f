use actix_cors::Cors;
use actix_session::{storage::CookieSessionStore, SessionMiddleware};
use actix_web::{
    cookie::Key,
    http::header,
    middleware::{DefaultHeaders, Logger},
    web, App, HttpResponse, HttpServer, Responder,
};
use clap::Parser;
use std::convert::TryFrom;
use std::fs;
use std::path::PathBuf;
use unfiltered_backend::{
    config::Config,
    helper::{feed_helpers, notification_helpers, realtime_helpers::RealtimeHub, settings_helpers::SettingsStore},
    routes,
    setup::db_setup,
    AppState,
};

async fn root_handler() -> impl Responder {
    HttpResponse::Ok().content_type("text/plain").body("OK")
}

/// Credentialed CORS for the session-backed API. `*` allows any origin.
fn build_cors(allowed_origins: &str) -> Cors {
    let base = if allowed_origins.trim() == "*" {
        Cors::default().allow_any_origin()
    } else {
        allowed_origins
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
    };
    base.allowed_methods(vec!["GET", "POST", "PUT", "PATCH", "DELETE"])
        .allowed_headers(vec![header::AUTHORIZATION, header::ACCEPT, header::CONTENT_TYPE])
        .supports_credentials()
        .max_age(3600)
}

#[derive(Parser, Debug)]
#[command(name = "unfiltered_server", author, version, about = "Starts The Unfiltered Voice API server.")]
struct Cli {
    /// Path to the .env configuration file.
    #[arg(long, required = true, value_name = "FILE")]
    env_file: PathBuf,
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let cli = Cli::parse();

    let config = Config::from_env(&cli.env_file).expect("FATAL: Failed to load or parse configuration.");

    env_logger::init_from_env(env_logger::Env::new().default_filter_or(&config.log_level));

    let tera = feed_helpers::build_templates().expect("FATAL: Template initialization failed.");

    fs::create_dir_all(&config.media_path).expect("Failed to create media directory");

    let db_path = config.blog_db_path();
    if !db_path.exists() {
        panic!(
            "FATAL: {} not found. Run 'cargo run --bin setup_cli -- --env-file <path> db setup'",
            db_path.display()
        );
    }
    let pool = db_setup::build_pool(&db_path).expect("FATAL: Failed to create Rusqlite connection pool.");

    let settings = {
        let conn = pool.get().expect("Failed to get DB connection for initial setup.");
        SettingsStore::load(&conn).expect("FATAL: Failed to load site settings.")
    };
    let mailer = notification_helpers::mailer_from_config(&config.mail).expect("FATAL: Failed to build the email client.");

    let app_state = web::Data::new(AppState {
        settings,
        realtime: RealtimeHub::default(),
        mailer,
    });

    let session_key_bytes =
        hex::decode(&config.session_secret_key).expect("FATAL: SESSION_SECRET_KEY in .env is not a valid hex string.");
    let session_key = Key::try_from(session_key_bytes.as_slice())
        .expect("FATAL: The decoded SESSION_SECRET_KEY is not long enough (minimum 64 bytes required).");

    let server_address = format!("{}:{}", config.web.host, config.web.port);
    log::info!("Serving '{}' from {}", config.site_name, db_path.display());
    println!("🚀 Server starting at http://{}", server_address);

    let pool_data = web::Data::new(pool);
    let tera_data = web::Data::new(tera);
    let config_data = web::Data::new(config.clone());

    HttpServer::new(move || {
        let session_mw = SessionMiddleware::builder(CookieSessionStore::default(), session_key.clone())
            .cookie_secure(config.use_secure_cookies)
            .cookie_http_only(true)
            .cookie_same_site(actix_web::cookie::SameSite::Lax)
            .build();

        let cors = build_cors(&config.allowed_origins);

        App::new()
            .wrap(Logger::default())
            .wrap(
                DefaultHeaders::new()
                    .add(("X-Content-Type-Options", "nosniff"))
                    .add(("X-Frame-Options", "DENY"))
                    .add(("X-XSS-Protection", "1; mode=block")),
            )
            .app_data(config_data.clone())
            .app_data(tera_data.clone())
            .app_data(pool_data.clone())
            .app_data(app_state.clone())
            // Open endpoints with their own CORS policy.
            .configure(routes::public::config_site)
            .service(actix_files::Files::new("/media", &config.media_path))
            .route("/", web::get().to(root_handler))
            .service(
                web::scope("")
                    .wrap(session_mw)
                    .wrap(cors)
                    // Narrower scopes first: actix does not fall through between scopes.
                    .configure(routes::change_requests::config_change_requests)
                    .configure(routes::admin::config_admin)
                    .configure(routes::auth::config_auth)
                    .configure(routes::public::config_api),
            )
    })
    .bind(server_address)?
    .run()
    .await
}
