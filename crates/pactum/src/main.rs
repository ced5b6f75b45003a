//! Pactum CLI
//!
//! Usage:
//!   pactum serve --pact pacts/web-api.json [--port 8080] [--tls]
//!   pactum check --pact pacts/web-api.json
//!
//! `serve` runs a mock provider for the interactions of a pact file until
//! Ctrl-C, then prints the verification report. `check` validates a pact
//! file and lists its interactions.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use pactum::{InteractionRegistry, MockServer, MockServerConfig, PactReader, TlsConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Pactum - consumer-driven contract testing
#[derive(Parser, Debug)]
#[command(name = "pactum")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Emit logs as JSON
    #[arg(long, global = true, env = "PACTUM_LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the interactions of a pact file until Ctrl-C
    Serve(ServeArgs),
    /// Validate a pact file and list its interactions
    Check {
        /// Pact file to read
        #[arg(short, long, env = "PACTUM_PACT")]
        pact: PathBuf,
    },
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Pact file whose interactions are served
    #[arg(short, long, env = "PACTUM_PACT")]
    pact: PathBuf,

    /// YAML mock server configuration
    #[arg(short, long, env = "PACTUM_CONFIG")]
    config: Option<PathBuf>,

    /// Host to bind (overrides the config file)
    #[arg(long, env = "PACTUM_HOST")]
    host: Option<String>,

    /// Port to bind, 0 for ephemeral (overrides the config file)
    #[arg(short = 'P', long, env = "PACTUM_PORT")]
    port: Option<u16>,

    /// Serve HTTPS with a generated self-signed certificate
    #[arg(long, env = "PACTUM_TLS")]
    tls: bool,
}

fn init_tracing(log_json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if log_json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn serve(args: ServeArgs) -> anyhow::Result<ExitCode> {
    let pact = PactReader::read(&args.pact)
        .with_context(|| format!("Failed to read pact file {}", args.pact.display()))?;

    let mut config = match &args.config {
        Some(path) => MockServerConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => MockServerConfig::new(pact.consumer.clone(), pact.provider.clone()),
    };
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if args.tls {
        config.tls = Some(TlsConfig::self_signed());
    }

    let registry = InteractionRegistry::from_pact(&pact).context("Invalid interactions in pact file")?;
    let mut server = MockServer::new(config, registry);
    server.start().await.context("Failed to start mock server")?;
    info!(
        "Serving {} interactions at {} (Ctrl-C to stop)",
        pact.interactions.len(),
        server.url().unwrap_or_default()
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    server.stop().await;

    match server.verify() {
        Ok(()) => {
            println!("All {} interactions matched", pact.interactions.len());
            Ok(ExitCode::SUCCESS)
        }
        Err(report) => {
            eprintln!("{report}");
            Ok(ExitCode::FAILURE)
        }
    }
}

fn check(pact_path: PathBuf) -> anyhow::Result<ExitCode> {
    let pact = PactReader::read(&pact_path)
        .with_context(|| format!("Failed to read pact file {}", pact_path.display()))?;
    let registry = InteractionRegistry::from_pact(&pact).context("Invalid interactions in pact file")?;

    println!(
        "{} -> {}: {} interactions",
        pact.consumer,
        pact.provider,
        registry.len()
    );
    for (index, interaction) in registry.iter().enumerate() {
        println!(
            "  [{}] {} {} {} -> {}",
            index,
            interaction.description,
            interaction.request.method,
            interaction.request.path,
            interaction.response.status
        );
        for state in &interaction.provider_states {
            println!("      given {}", state.name);
        }
    }
    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Command::Serve(args) => serve(args).await,
        Command::Check { pact } => check(pact),
    }
}
