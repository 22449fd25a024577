use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mentorbook_common::{env_or, DatabaseConfig};
use mentorbook_database::{
    connect_url, create_pool, seed_admin, seed_expertise, AdminSeed, MigrationRunner, PgStore, Store,
};

#[derive(Parser)]
#[command(name = "db-cli")]
#[command(about = "Mentorbook database CLI tool")]
struct Cli {
    /// Database URL override (otherwise DATABASE_* variables are used)
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Check migration status
    Status,
    /// Seed the expertise catalogue and an admin account
    Seed {
        #[arg(long, default_value = "admin")]
        admin_username: String,
        #[arg(long, default_value = "admin@mentorbook.local")]
        admin_email: String,
        #[arg(long)]
        admin_password: Option<String>,
    },
    /// Create or delete mentor records so they match profile roles
    ReconcileMentors,
    /// Drop every table and re-run migrations
    Reset {
        /// Skip confirmation prompt
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mentorbook_database=info,db_cli=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = DatabaseConfig::from_env()?;
    let pool = match cli.database_url.as_deref() {
        Some(raw) => {
            let url = checked_database_url(raw)?;
            connect_url(url.as_str(), config.max_connections)
                .await
                .with_context(|| format!("connecting to {}", url.host_str().unwrap_or("localhost")))?
        }
        None => create_pool(&config)
            .await
            .with_context(|| format!("connecting to {}:{}/{}", config.host, config.port, config.database))?,
    };
    let runner = MigrationRunner::new(pool.clone());

    match cli.command {
        Commands::Migrate => {
            runner.run_all_migrations().await?;
            println!("✅ Migrations completed successfully");
        }
        Commands::Status => {
            let status = runner.check_migration_status().await?;
            println!("📊 {}", status);

            if status.is_up_to_date {
                println!("✅ Database is up to date");
            } else {
                println!("⚠️  Database needs migration");
            }
        }
        Commands::Seed {
            admin_username,
            admin_email,
            admin_password,
        } => {
            let store = PgStore::new(pool);
            let added = seed_expertise(&store).await?;
            println!("✅ {} expertise tags added", added);

            match admin_password {
                Some(password) => {
                    let admin = AdminSeed {
                        username: admin_username,
                        email: admin_email,
                        password,
                    };
                    let cost: u32 = env_or("BCRYPT_COST", 12)?;
                    if seed_admin(&store, &admin, cost).await? {
                        println!("✅ Admin account '{}' created", admin.username);
                    } else {
                        println!("ℹ️  Admin account '{}' already exists", admin.username);
                    }
                }
                None => println!("ℹ️  No --admin-password given; admin account skipped"),
            }
        }
        Commands::ReconcileMentors => {
            let store = PgStore::new(pool);
            let report = store.reconcile_all_mentors().await?;
            println!(
                "✅ Mentor records reconciled: {} created, {} removed",
                report.created, report.removed
            );
        }
        Commands::Reset { force } => {
            if !force {
                println!("⚠️  This will delete ALL data in the database!");
                println!("Type 'yes' to continue:");

                let mut input = String::new();
                std::io::stdin().read_line(&mut input)?;

                if input.trim() != "yes" {
                    println!("❌ Operation cancelled");
                    return Ok(());
                }
            }

            runner.reset().await?;
            runner.run_all_migrations().await?;
            println!("✅ Database reset completed");
        }
    }

    Ok(())
}

/// The override is handed to sqlx as-is, so percent-encoded credentials are
/// decoded by the driver.
fn checked_database_url(raw: &str) -> anyhow::Result<url::Url> {
    let url = url::Url::parse(raw).context("invalid --database-url")?;
    if !matches!(url.scheme(), "postgres" | "postgresql") {
        bail!("unsupported database scheme '{}'", url.scheme());
    }
    Ok(url)
}
