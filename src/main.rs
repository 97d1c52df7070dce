use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt};

use wraprewards::{
    AppConfig, SqliteBackend,
    config::ConfigArgs,
    core::{IdentitySession, RecordStore, SubjectId},
};

#[derive(Parser)]
#[command(name = "wraprewards")]
#[command(about = "Register your vehicle for paid car-wrap advertising")]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Open the registration window (default)
    Run,
    /// Print the registration on file for the signed-in subject
    Show,
    /// Provision a bootstrap token that signs in as SUBJECT
    IssueToken {
        #[arg(value_name = "TOKEN")]
        token: String,
        #[arg(value_name = "SUBJECT")]
        subject: String,
    },
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let filter = if args.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    fmt().with_env_filter(filter).init();

    let config = args.config.into_config()?;
    match args.command.unwrap_or(Command::Run) {
        Command::Run => run_gui(config),
        Command::Show => runtime()?.block_on(show(config)),
        Command::IssueToken { token, subject } => {
            runtime()?.block_on(issue_token(config, token, subject))
        }
    }
}

fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().context("Failed to start async runtime")
}

#[cfg(feature = "gui")]
fn run_gui(config: AppConfig) -> anyhow::Result<()> {
    wraprewards::gui::run(config).map_err(|e| anyhow::anyhow!("GUI failed: {}", e))
}

#[cfg(not(feature = "gui"))]
fn run_gui(_config: AppConfig) -> anyhow::Result<()> {
    anyhow::bail!("This build has no window support; rebuild with the `gui` feature")
}

async fn show(config: AppConfig) -> anyhow::Result<()> {
    let backend = Arc::new(SqliteBackend::connect(&config).await?);
    let session = IdentitySession::new(backend.clone(), &config);
    let records = RecordStore::new(backend.clone(), &config, session.changes());

    let subject = session
        .resolve()
        .await
        .context("Identity provider unavailable")?;
    match records.read().await? {
        Some(record) => {
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        None => println!("No registration on file for {subject}"),
    }
    backend.close().await;
    Ok(())
}

async fn issue_token(config: AppConfig, token: String, subject: String) -> anyhow::Result<()> {
    let subject = SubjectId::new(&subject)
        .with_context(|| format!("Invalid subject id: {subject:?}"))?;
    let backend = SqliteBackend::connect(&config).await?;
    backend.register_token(&token, &subject).await?;
    backend.close().await;
    println!("Token registered for {subject}");
    Ok(())
}
