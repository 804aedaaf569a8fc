use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use renewd::config::EngineConfig;
use renewd::notify::LogNotifier;
use renewd::runner::{AccountSpec, Runner};
use renewd::store::JsonFileCookieStore;

#[derive(Parser)]
#[command(name = "renewd")]
#[command(about = "Renew hosting services and settle their invoices")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "renewd.toml")]
    config: PathBuf,

    /// JSON file with accounts: [{"key": "...", "cookie": "..."}]
    #[arg(long)]
    accounts_file: Option<PathBuf>,

    /// Accounts given inline as KEY=COOKIE pairs
    #[arg(value_name = "KEY=COOKIE")]
    accounts: Vec<String>,
}

#[derive(serde::Deserialize)]
struct AccountEntry {
    key: String,
    cookie: String,
}

fn collect_accounts(cli: &Cli) -> Result<Vec<AccountSpec>> {
    let mut accounts = Vec::new();

    if let Some(path) = &cli.accounts_file {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read accounts file: {}", path.display()))?;
        let entries: Vec<AccountEntry> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse accounts file: {}", path.display()))?;
        accounts.extend(
            entries
                .into_iter()
                .map(|e| AccountSpec::new(e.key, e.cookie)),
        );
    }

    for raw in &cli.accounts {
        let Some((key, cookie)) = raw.split_once('=') else {
            bail!("Account argument must look like KEY=COOKIE: {raw}");
        };
        accounts.push(AccountSpec::new(key, cookie));
    }

    if accounts.is_empty() {
        bail!("No accounts given; pass KEY=COOKIE arguments or --accounts-file");
    }
    Ok(accounts)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = EngineConfig::load_or_default(&cli.config)?;
    let accounts = collect_accounts(&cli)?;

    let store = Arc::new(JsonFileCookieStore::new()?);
    let runner = Runner::new(config, store, Arc::new(LogNotifier));

    let summary = runner.run(&accounts).await;
    print!("{}", summary.render());

    Ok(())
}
