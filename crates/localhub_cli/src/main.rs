//! Operator CLI for Localhub databases.
//!
//! # Responsibility
//! - Initialize and migrate a database file.
//! - Bootstrap a community with its first admin.
//! - Print deterministic, line-oriented output for scripting.

use clap::{Parser, Subcommand};
use localhub_core::model::user::User;
use localhub_core::repo::community_repo::{CommunityRepository, SqliteCommunityRepository};
use localhub_core::repo::user_repo::{SqliteUserRepository, UserRepository};
use localhub_core::notifications::{MemoryEmailOutbox, MemoryPushOutbox};
use localhub_core::service::CommunityService;
use localhub_core::{AdapterRegistry, Community, Dispatcher, Settings};
use std::error::Error;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "localhub")]
#[command(about = "Localhub community administration", long_about = None)]
#[command(version)]
struct Cli {
    /// TOML settings file
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or migrate a database
    Init {
        #[arg(long, value_name = "PATH")]
        db: Option<PathBuf>,
    },

    /// Create a community and its admin account
    CreateCommunity {
        #[arg(long, value_name = "PATH")]
        db: Option<PathBuf>,

        #[arg(long)]
        domain: String,

        #[arg(long)]
        name: String,

        /// Username of the admin; created when missing
        #[arg(long)]
        admin: String,

        /// Email of the admin account
        #[arg(long)]
        email: String,
    },

    /// List all communities
    Communities {
        #[arg(long, value_name = "PATH")]
        db: Option<PathBuf>,
    },

    /// Print the core version
    Version,
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Self::Init { .. } => "init",
            Self::CreateCommunity { .. } => "create-community",
            Self::Communities { .. } => "communities",
            Self::Version => "version",
        }
    }
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("error: {err}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let settings = match &cli.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    if localhub_core::init_from_settings(&settings)? {
        log::info!("event=cli_start module=cli status=ok command={}", cli.command.name());
    }
    let database = |db: Option<PathBuf>| db.unwrap_or_else(|| settings.database_path.clone());

    match cli.command {
        Commands::Init { db } => {
            let path = database(db);
            let conn = localhub_core::open_db(&path)?;
            println!(
                "initialized {} schema={}",
                path.display(),
                localhub_core::db::schema_version(&conn)?
            );
        }
        Commands::CreateCommunity {
            db,
            domain,
            name,
            admin,
            email,
        } => {
            let conn = localhub_core::open_db(database(db))?;
            let users = SqliteUserRepository::new(&conn);
            let admin_user = match users.get_user_by_username(&admin)? {
                Some(user) => user,
                None => {
                    let user = User::new(admin.as_str(), email.as_str());
                    users.create_user(&user)?;
                    user
                }
            };
            // The CLI never delivers notifications.
            let dispatcher = Dispatcher::new(
                AdapterRegistry::with_defaults(),
                Arc::new(MemoryEmailOutbox::new()),
                Arc::new(MemoryPushOutbox::new()),
                settings.push.clone(),
            );
            let community = CommunityService::new(&conn, &dispatcher)
                .create_community(admin_user.id, Community::new(domain, name))?;
            println!(
                "community id={} domain={} admin={}",
                community.id, community.domain, admin_user.username
            );
        }
        Commands::Communities { db } => {
            let conn = localhub_core::open_db(database(db))?;
            for summary in SqliteCommunityRepository::new(&conn).list_all()? {
                println!(
                    "{}\t{}\t{}\tmembers={}\tactive={}",
                    summary.community.id,
                    summary.community.domain,
                    summary.community.name,
                    summary.member_count,
                    summary.community.active
                );
            }
        }
        Commands::Version => {
            println!("localhub_core version={}", localhub_core::core_version());
            println!(
                "localhub_core schema={}",
                localhub_core::db::migrations::latest_version()
            );
        }
    }
    Ok(())
}
