use clap::{Parser, Subcommand};
use rand::RngCore;
use rusqlite::Connection;
use std::fs;
use std::path::PathBuf;
use unfiltered_backend::config::Config;
use unfiltered_backend::helper::password_helpers;
use unfiltered_backend::models::db_operations::users_db_operations;
use unfiltered_backend::models::Role;
use unfiltered_backend::setup::db_setup;

#[derive(Parser, Debug)]
#[command(name = "setup_cli", author, version, about = "A CLI for initial application setup.", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the .env configuration file. Required by every command except `keygen`.
    #[arg(long, global = true, value_name = "FILE")]
    env_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Db {
        #[command(subcommand)]
        action: DbAction,
    },
    Owner {
        #[command(subcommand)]
        action: OwnerAction,
    },
    /// Prints a fresh SESSION_SECRET_KEY.
    Keygen,
}

#[derive(Subcommand, Debug)]
enum DbAction {
    Setup,
}

#[derive(Subcommand, Debug)]
enum OwnerAction {
    Create {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        display_name: String,
    },
    /// Grants the owner role to an existing account.
    Promote {
        #[arg(long)]
        email: String,
    },
    List,
}

fn main() {
    let cli = Cli::parse();

    if let Commands::Keygen = cli.command {
        generate_session_key();
        return;
    }

    let Some(env_file) = cli.env_file.as_ref() else {
        eprintln!("❌ Error: --env-file is required for this command.");
        std::process::exit(2);
    };
    let config = Config::from_env(env_file).expect("FATAL: Failed to load or parse configuration.");

    match &cli.command {
        Commands::Db { action: DbAction::Setup } => setup_database(&config),
        Commands::Owner { action } => match action {
            OwnerAction::Create { email, password, display_name } => create_owner(&config, email, password, display_name),
            OwnerAction::Promote { email } => promote_owner(&config, email),
            OwnerAction::List => list_owners(&config),
        },
        Commands::Keygen => {}
    }
}

fn generate_session_key() {
    let mut key = [0u8; 64];
    rand::thread_rng().fill_bytes(&mut key);
    println!("SESSION_SECRET_KEY={}", hex::encode(key));
}

fn setup_database(config: &Config) {
    let db_path = config.blog_db_path();
    println!("\nSetting up blog database at '{}'...", db_path.display());

    if let Some(parent_dir) = db_path.parent() {
        fs::create_dir_all(parent_dir).expect("Could not create database directory.");
    }

    let mut conn = Connection::open(&db_path).expect("Could not create blog database file.");
    match db_setup::setup_blog_db(&mut conn) {
        Ok(_) => println!("✅ Blog database setup completed successfully."),
        Err(e) => eprintln!("❌ Error setting up blog database: {}", e),
    }
}

fn open_existing(config: &Config) -> Option<Connection> {
    let db_path = config.blog_db_path();
    if !db_path.exists() {
        eprintln!(
            "❌ Error: Blog database not found at '{}'. Please run `setup_cli db setup` first.",
            db_path.display()
        );
        return None;
    }
    match Connection::open(&db_path) {
        Ok(conn) => Some(conn),
        Err(e) => {
            eprintln!("❌ Error opening blog database: {}", e);
            None
        }
    }
}

fn create_owner(config: &Config, email: &str, password: &str, display_name: &str) {
    if let Err(msg) = password_helpers::validate_signup(email, password, password, display_name) {
        eprintln!("❌ Error: {}", msg);
        return;
    }
    let Some(conn) = open_existing(config) else { return };

    let user_id = match users_db_operations::create_user(&conn, email, password, display_name.trim()) {
        Ok(id) => id,
        Err(e) => {
            eprintln!("❌ Error creating account: {}. The email might already be registered.", e);
            return;
        }
    };
    match users_db_operations::grant_role(&conn, &user_id, Role::Owner) {
        Ok(_) => println!("✅ Owner '{}' created successfully.", email),
        Err(e) => eprintln!("❌ Account created but granting the owner role failed: {}", e),
    }
}

fn promote_owner(config: &Config, email: &str) {
    let Some(conn) = open_existing(config) else { return };
    let user_id: Option<String> = match conn.query_row(
        "SELECT id FROM users WHERE email = ?1",
        [email.trim().to_lowercase()],
        |row| row.get(0),
    ) {
        Ok(id) => Some(id),
        Err(rusqlite::Error::QueryReturnedNoRows) => None,
        Err(e) => {
            eprintln!("❌ Error looking up account: {}", e);
            return;
        }
    };
    let Some(user_id) = user_id else {
        eprintln!("❌ Error: No account registered with '{}'.", email);
        return;
    };
    match users_db_operations::grant_role(&conn, &user_id, Role::Owner) {
        Ok(0) => println!("ℹ️ '{}' is already an owner.", email),
        Ok(_) => println!("✅ '{}' is now an owner.", email),
        Err(e) => eprintln!("❌ Error granting owner role: {}", e),
    }
}

fn list_owners(config: &Config) {
    let Some(conn) = open_existing(config) else { return };
    println!("Listing Owners:");
    match users_db_operations::read_owner_emails(&conn) {
        Ok(emails) if emails.is_empty() => println!("(none)"),
        Ok(emails) => {
            for email in emails {
                println!("- {}", email);
            }
        }
        Err(e) => eprintln!("❌ Error fetching owners: {}", e),
    }
}
