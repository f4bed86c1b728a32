use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use sqlshift::config::{init_config, read_config, CONFIG_FILE, DEFAULT_ENVIRONMENT};
use sqlshift::{
    connect, DirectorySource, Environment, MigrationDirection, MigrationStatus, Migrator,
    PlannedMigration, TemplateEngine,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Sqlshift - ordered, reversible SQL schema migrations
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the config file
    #[arg(short, long, env = "SQLSHIFT_CONFIG", default_value = CONFIG_FILE)]
    config: PathBuf,

    /// Environment to use from the config file
    #[arg(short, long, env = "SQLSHIFT_ENV", default_value = DEFAULT_ENVIRONMENT)]
    env: String,

    /// Log at debug level (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply pending migrations
    Up {
        /// Maximum number of migrations to apply (0 = all)
        #[arg(short, long, default_value_t = 0)]
        limit: usize,

        /// Print the plan without applying it
        #[arg(long)]
        dry_run: bool,
    },

    /// Revert applied migrations
    Down {
        /// Maximum number of migrations to revert (0 = all)
        #[arg(short, long, default_value_t = 1)]
        limit: usize,

        /// Print the plan without applying it
        #[arg(long)]
        dry_run: bool,
    },

    /// Revert the newest applied migration and apply it again
    Redo {
        /// Print the plan without applying it
        #[arg(long)]
        dry_run: bool,
    },

    /// Show every migration and whether it has been applied
    Status {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the statements a run would execute
    Plan {
        #[arg(value_enum)]
        direction: DirectionArg,

        /// Maximum number of migrations (0 = all)
        #[arg(short, long, default_value_t = 0)]
        limit: usize,
    },

    /// Write a starter config file
    Init,

    /// Create a new, empty migration script
    New {
        /// Short description, used in the file name
        name: String,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum DirectionArg {
    Up,
    Down,
}

impl From<DirectionArg> for MigrationDirection {
    fn from(arg: DirectionArg) -> Self {
        match arg {
            DirectionArg::Up => MigrationDirection::Up,
            DirectionArg::Down => MigrationDirection::Down,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Initialize logging
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new(default_level),
    };
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match args.command {
        Command::Init => {
            init_config(&args.config)
                .await
                .with_context(|| format!("Failed to create {}", args.config.display()))?;
            println!("Created config {}", args.config.display());
        }
        Command::New { name } => {
            let env = load_environment(&args.config, &args.env).await?;
            let engine = TemplateEngine::new();
            let path = engine.create_migration(&env.dir, &name).await?;
            println!("Created migration {}", path.display());
        }
        Command::Up { limit, dry_run } => {
            let migrator = open_migrator(&args.config, &args.env).await?;
            let direction = MigrationDirection::Up;
            apply(&migrator, direction, limit, dry_run).await?;
        }
        Command::Down { limit, dry_run } => {
            let migrator = open_migrator(&args.config, &args.env).await?;
            let direction = MigrationDirection::Down;
            apply(&migrator, direction, limit, dry_run).await?;
        }
        Command::Redo { dry_run } => {
            let migrator = open_migrator(&args.config, &args.env).await?;
            redo(&migrator, dry_run).await?;
        }
        Command::Status { json } => {
            let migrator = open_migrator(&args.config, &args.env).await?;
            let statuses = migrator.status().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&statuses)?);
            } else {
                print_status(&statuses);
            }
        }
        Command::Plan { direction, limit } => {
            let migrator = open_migrator(&args.config, &args.env).await?;
            let direction: MigrationDirection = direction.into();
            let plan = migrator.plan(direction, limit).await?;
            print_plan(&plan, direction);
        }
    }

    Ok(())
}

async fn load_environment(path: &Path, name: &str) -> anyhow::Result<Environment> {
    let config = read_config(path)
        .await
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    Ok(config.environment(name)?)
}

async fn open_migrator(path: &Path, name: &str) -> anyhow::Result<Migrator> {
    let env = load_environment(path, name).await?;
    info!(
        environment = %name,
        dialect = %env.dialect,
        dir = %env.dir.display(),
        "Using environment"
    );

    let store = connect(&env.dialect, &env.datasource)?;
    let source = Arc::new(DirectorySource::new(&env.dir));
    Ok(Migrator::new(source, store).with_table(env.table))
}

async fn apply(
    migrator: &Migrator,
    direction: MigrationDirection,
    limit: usize,
    dry_run: bool,
) -> anyhow::Result<()> {
    if dry_run {
        let plan = migrator.plan(direction, limit).await?;
        print_plan(&plan, direction);
        return Ok(());
    }

    let applied = migrator.apply(direction, limit).await?;
    match direction {
        MigrationDirection::Up => println!("Applied {} migration(s)", applied),
        MigrationDirection::Down => println!("Reverted {} migration(s)", applied),
    }
    Ok(())
}

async fn redo(migrator: &Migrator, dry_run: bool) -> anyhow::Result<()> {
    if dry_run {
        let down = migrator.plan(MigrationDirection::Down, 1).await?;
        let Some(newest) = down.first() else {
            println!("Nothing to redo");
            return Ok(());
        };
        let migration = Arc::clone(&newest.migration);
        let up = PlannedMigration::new(migration, MigrationDirection::Up);
        print_plan(&down, MigrationDirection::Down);
        print_plan(&[up], MigrationDirection::Up);
        return Ok(());
    }

    match migrator.redo().await? {
        Some(id) => println!("Reapplied migration {}", id),
        None => println!("Nothing to redo"),
    }
    Ok(())
}

fn print_plan(plan: &[PlannedMigration], direction: MigrationDirection) {
    if plan.is_empty() {
        println!("Nothing to migrate {}", direction);
        return;
    }

    for migration in plan {
        println!("==> Would migrate {} {}", direction, migration.id());
        for query in &migration.queries {
            println!("{}", query);
        }
        println!();
    }
}

fn print_status(statuses: &[MigrationStatus]) {
    println!("{:<50} APPLIED", "MIGRATION");
    for status in statuses {
        let applied = status
            .applied_at
            .map(|at| at.to_rfc3339())
            .unwrap_or_else(|| "no".to_string());
        let note = if status.in_source {
            ""
        } else {
            " (missing from source)"
        };
        println!("{:<50} {}{}", status.id, applied, note);
    }
}
