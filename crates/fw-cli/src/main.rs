use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use fw_cli::commands::{baby, check, feed, push, settings, util, watch};
use fw_cli::host::{stdout_writer, terminal_host};
use fw_cli::session::Session;
use fw_cli::{BabyAction, Cli, Commands, Config, SettingsAction};
use fw_core::{Dispatcher, ReminderSettings};
use fw_db::SqliteStore;

/// Load config and open the store, ensuring the database directory exists.
fn open_store(config_path: Option<&Path>) -> Result<(Arc<SqliteStore>, Config)> {
    let config = load_config(config_path)?;

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }

    let store = SqliteStore::open(&config.database_path).context("failed to open database")?;
    Ok((Arc::new(store), config))
}

fn load_config(config_path: Option<&Path>) -> Result<Config> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");
    Ok(config)
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().context("failed to initialize tokio runtime")
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Logs go to stderr so stdout carries only command output
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let mut stdout = std::io::stdout();
    match &cli.command {
        Some(Commands::Baby(action)) => {
            let (store, _config) = open_store(cli.config.as_deref())?;
            match action {
                BabyAction::Add { name, twins, id } => {
                    baby::add(&mut stdout, &store, name, *twins, id.as_deref(), Utc::now())?;
                }
                BabyAction::List { json } => baby::list(&mut stdout, &store, *json)?,
            }
        }
        Some(Commands::Settings(action)) => {
            let (store, _config) = open_store(cli.config.as_deref())?;
            let reminder_settings = ReminderSettings::new(store.clone());
            match action {
                SettingsAction::Show { baby, json } => {
                    let baby = util::find_baby(&store.database(), baby)?;
                    settings::show(&mut stdout, &reminder_settings, &baby, *json)?;
                }
                SettingsAction::Update { id, changes } => {
                    settings::update(&mut stdout, &reminder_settings, id, &changes.into())?;
                }
            }
        }
        Some(Commands::Feed { baby, twin, at }) => {
            let (store, _config) = open_store(cli.config.as_deref())?;
            let mut db = store.database();
            let baby = util::find_baby(&db, baby)?;
            feed::run(&mut stdout, &mut db, &baby, *twin, at.as_deref(), Utc::now())?;
        }
        Some(Commands::Check { baby }) => {
            let (store, config) = open_store(cli.config.as_deref())?;
            let baby = util::find_baby(&store.database(), baby)?;
            let session = Session::new(&config, store, Some(baby.clone()), stdout_writer());
            runtime()?.block_on(async {
                let result = check::run(&mut stdout, &session, &baby, Utc::now()).await;
                session.finish().await;
                result
            })?;
        }
        Some(Commands::Watch { baby, every }) => {
            let (store, config) = open_store(cli.config.as_deref())?;
            let baby = util::find_baby(&store.database(), baby)?;
            let period = every.map_or_else(
                || config.poll_period(),
                |minutes| std::time::Duration::from_secs(minutes.saturating_mul(60)),
            );
            let session = Session::new(&config, store, Some(baby), stdout_writer());
            runtime()?.block_on(async {
                let stdin = tokio::io::BufReader::new(tokio::io::stdin());
                let result = watch::run(
                    &mut stdout,
                    stdin,
                    &session,
                    period,
                    config.background_period(),
                )
                .await;
                session.shutdown();
                result
            })?;
        }
        Some(Commands::Push) => {
            let config = load_config(cli.config.as_deref())?;
            let (host, _notifications) = terminal_host(&config, stdout_writer());
            let dispatcher = Dispatcher::new(host);
            push::run(&mut stdout, std::io::stdin().lock(), &dispatcher)?;
        }
        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}
