//! `ekv`: command-line access to an EdgeKV namespace.

mod commands;
mod config;

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use ekv_client::Connection;
use ekv_common::EkvError;
use ekv_store::KvNamespace;

use commands::Commands;

#[derive(Parser)]
#[command(name = "ekv")]
#[command(version)]
#[command(about = "Edge-style KV namespace over a RESP store", long_about = None)]
struct Cli {
    /// Store URL, e.g. redis://:password@host:6379/0
    #[arg(long, global = true, env = "EKV_URL")]
    url: Option<String>,

    /// TOML file with a `[store] url = "..."` entry
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level: error, warn, info, debug, trace
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            exit_code(&err)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let store = config::resolve(cli.url.as_deref(), cli.config.as_deref())?;
    let connection = Connection::connect(&store).await?;
    let kv = KvNamespace::new(connection);

    let mut stdout = std::io::stdout().lock();
    commands::run(&kv, cli.command, &mut stdout).await?;
    stdout.flush()?;
    Ok(())
}

/// Library errors exit with their stable code, anything else with 1.
fn exit_code(err: &anyhow::Error) -> ExitCode {
    let code = err
        .downcast_ref::<EkvError>()
        .and_then(|err| u8::try_from(err.code()).ok())
        .unwrap_or(1);
    ExitCode::from(code)
}
