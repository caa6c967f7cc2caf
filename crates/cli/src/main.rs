// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! almond-cloud: single entry point for the control-plane processes.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand};

use almond_controller::ControllerOptions;
use almond_core::Config;

#[derive(Parser)]
#[command(name = "almond-cloud", version, about = "almond-cloud control plane")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the database proxy
    Dbproxy {
        /// Listen port
        #[arg(long, default_value_t = almond_dbproxy::DEFAULT_PORT)]
        port: u16,
        /// CA bundle applied to the database connection
        #[arg(long = "aws-tls-cert")]
        aws_tls_cert: Option<PathBuf>,
    },
    /// Run the user reconcile controller
    Controller {
        /// JSON manifest for developer-backend deployments
        #[arg(long)]
        deployment_template: PathBuf,
        /// JSON manifest for developer-backend services
        #[arg(long)]
        service_template: PathBuf,
        /// Port for /metrics and /healthz
        #[arg(long, default_value_t = almond_controller::DEFAULT_METRICS_PORT)]
        metrics_port: u16,
    },
    /// Create the database tables
    InitDb,
    /// Print a signed proxy access token for a user
    SignToken { user_id: i64 },
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    let Some(command) = cli.command else {
        let _ = Cli::command().print_help();
        return ExitCode::from(1);
    };
    match run(command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error:#}");
            ExitCode::from(1)
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

fn run(command: Command) -> anyhow::Result<()> {
    let config = Arc::new(Config::load()?);
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        match command {
            Command::Dbproxy { port, aws_tls_cert } => {
                almond_dbproxy::serve(&config, port, aws_tls_cert.as_deref()).await?;
            }
            Command::Controller {
                deployment_template,
                service_template,
                metrics_port,
            } => {
                almond_controller::run(
                    config,
                    ControllerOptions {
                        deployment_template,
                        service_template,
                        metrics_port,
                    },
                )
                .await?;
            }
            Command::InitDb => {
                let pool = almond_storage::db::connect(&config.database_url, None).await?;
                almond_storage::db::init_schema(&pool).await?;
                println!("database schema created");
            }
            Command::SignToken { user_id } => {
                let token = almond_core::sign_token(&config.jwt_signing_key, user_id)?;
                println!("{token}");
            }
        }
        Ok(())
    })
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
