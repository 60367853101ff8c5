// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

mod repl;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use portal_client::auth::{Session, SessionKeepAlive};
use portal_client::client::{GuardedClient, Navigator};
use portal_client::config::{parse_base_url, ClientConfig};
use portal_client::error::ClientError;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use repl::{Command, CommandError};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Pretty,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "portal-client", about = "Activity points portal API client")]
struct Cli {
    /// Backend base URL, overrides PORTAL_API_BASE_URL.
    #[arg(long)]
    base_url: Option<String>,

    /// File keeping the signed-in identity between runs, overrides
    /// PORTAL_IDENTITY_FILE.
    #[arg(long)]
    identity_file: Option<PathBuf>,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value = "pretty")]
    log_format: LogFormat,
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "portal-client failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), ClientError> {
    let mut config = ClientConfig::from_env()?;
    if let Some(base_url) = &cli.base_url {
        config.base_url = parse_base_url(base_url)?;
    }
    if let Some(path) = cli.identity_file {
        config.identity_file = Some(path);
    }

    info!(
        base_url = %config.base_url,
        identity_file = ?config.identity_file,
        "Portal client starting"
    );

    let navigator: Arc<dyn Navigator> =
        Arc::new(|target: &str| println!("session ended, sign in again at {target}"));
    let client = GuardedClient::from_config(&config, navigator)?;
    let session = Session::new(client.clone());

    if let Some(identity) = session.restore().await {
        println!(
            "signed in as {} ({})",
            identity.email().unwrap_or("unknown"),
            identity.role
        );
    }

    let shutdown = CancellationToken::new();
    let keepalive = tokio::spawn(
        SessionKeepAlive::new(client)
            .with_interval(config.keepalive_interval)
            .run(shutdown.clone()),
    );

    println!("{}", repl::HELP);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line,
            _ = tokio::signal::ctrl_c() => break,
        };

        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "Failed to read command");
                break;
            }
        };

        match repl::parse(&line) {
            Ok(Command::Quit) => break,
            Ok(command) => match repl::run(&session, command).await {
                Ok(output) => println!("{output}"),
                Err(err) => println!("error: {err}"),
            },
            Err(CommandError::Empty) => {}
            Err(err) => println!("{err}"),
        }
    }

    shutdown.cancel();
    if let Err(e) = keepalive.await {
        warn!(error = %e, "Keep-alive task ended abnormally");
    }
    info!("Portal client stopped");
    Ok(())
}
