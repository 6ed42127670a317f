//! Operator commands: schema migration, admin provisioning and session cleanup.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{ArgAction, Args, Parser, Subcommand};
use environovalab_api::{
    config, db,
    services::{accounts::AccountService, mailer::mailer_from_config, settings::SettingsService},
};

#[derive(Parser)]
#[command(name = "environovalab-admin", about = "Environovalab operator commands", version)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON when available"
    )]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending migrations and provision the settings row
    Migrate,
    /// Create an administrator, or promote and reactivate an existing user
    CreateAdmin(CreateAdminArgs),
    /// Delete sessions that are already expired
    PurgeSessions,
}

#[derive(Args)]
struct CreateAdminArgs {
    #[arg(long)]
    username: String,
    #[arg(long)]
    email: String,
    #[arg(long)]
    password: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config().context("failed to load configuration")?;
    config::init_tracing(&cfg.log_level, cfg.log_json);

    let pool = Arc::new(
        db::establish_connection_from_app_config(&cfg)
            .await
            .context("failed to connect to the database")?,
    );

    match cli.command {
        Commands::Migrate => {
            db::run_migrations(&pool).await.context("migration failed")?;
            SettingsService::new(pool.clone())
                .ensure_provisioned()
                .await
                .context("failed to provision company settings")?;
            println!("migrations applied");
        }
        Commands::CreateAdmin(args) => {
            let accounts = AccountService::new(pool.clone(), mailer_from_config(&cfg.mail), &cfg);
            let user = accounts
                .ensure_admin(&args.username, &args.email, &args.password)
                .await
                .context("failed to provision administrator")?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&user)?);
            } else {
                println!("administrator {} ({}) ready", user.username, user.id);
            }
        }
        Commands::PurgeSessions => {
            let accounts = AccountService::new(pool.clone(), mailer_from_config(&cfg.mail), &cfg);
            let removed = accounts
                .purge_expired_sessions(Utc::now())
                .await
                .context("failed to purge sessions")?;
            if cli.json {
                println!("{}", serde_json::json!({ "removed": removed }));
            } else {
                println!("removed {} expired sessions", removed);
            }
        }
    }

    Ok(())
}
