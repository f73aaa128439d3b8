//! referrals: command-line front end for the referral tracker.
//!
//! Talks to the backend through the same surface the web app uses
//! (`from`, `auth`, `channel`). Without a hosted backend configured it runs on
//! the local backend, persisting to SQLite by default.
//!
//! Run:
//! ```bash
//! # sign in as the seeded admin, then look at the board
//! cargo run -p referral-cli -- login --email admin@sistema.com --password admin123
//! cargo run -p referral-cli -- board
//!
//! # json logs, no simulated latency, throwaway store
//! LOG_FORMAT=json MOCK_LATENCY_MS=0 STORE_PROVIDER=memory cargo run -p referral-cli -- sellers
//! ```
//!
//! Configuration: see `config.rs` for all environment variables.

mod config;
mod service;

use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use domain::adapters::memory_store::InMemoryStore;
use domain::assign::RandomSellerPicker;
use domain::schema::{IndicationStatus, NewIndication, INDICATIONS, SELLERS, USERS};
use domain::stats::TOP_REFERRERS;
use domain::validate::{validate_email, validate_password};
use domain::{CoreError, KeyValueStore, SystemClock};
use local_backend::{Credentials, LocalBackend, SignUp, SignUpOptions};
use serde::Serialize;
use sqlite_store::SqliteStore;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::{BackendSelection, Config, LogFormat, StoreProvider};
use crate::service::{ReferralService, ServiceError};

/// Referral tracker on the command line
#[derive(Parser, Debug)]
#[command(name = "referrals")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in with email and password
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },

    /// Create an account and sign in with it
    Signup {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        /// Display name
        #[arg(long)]
        name: Option<String>,
    },

    /// Sign out
    Logout,

    /// Show the signed-in account
    Whoami,

    /// Submit a new indication as the signed-in referrer
    Submit {
        /// Name of the person being referred
        #[arg(long)]
        name: String,
        #[arg(long)]
        phone: String,
        #[arg(long)]
        observation: Option<String>,
    },

    /// Show the pipeline board
    Board,

    /// Move an indication to another pipeline stage
    Move {
        id: String,
        /// em_contato, negociacao, fechamento, fechados or nao_interessado
        status: String,
    },

    /// Dashboard numbers for the signed-in account
    Stats,

    /// Referrers with the most indications
    Ranking {
        #[arg(long, default_value_t = TOP_REFERRERS)]
        limit: usize,
    },

    /// List sellers
    Sellers,

    /// Show what the local store holds
    Status,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error("unknown status '{0}'")]
    UnknownStatus(String),
    #[error("output error: {0}")]
    Output(#[from] serde_json::Error),
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        CliError::Service(err.into())
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    init_tracing(&cfg);
    let cli = Cli::parse();

    if let BackendSelection::Hosted { url, .. } = config::backend_selection() {
        error!(%url, "hosted backend selected, but this build only bundles the local backend");
        return ExitCode::from(2);
    }
    cfg.warn_if_ephemeral();

    let kv = match build_store(&cfg) {
        Ok(kv) => kv,
        Err(e) => {
            error!(error = %e, "failed to open store");
            return ExitCode::FAILURE;
        }
    };
    let backend = LocalBackend::new(kv, cfg.backend_options());
    let _auth_log = backend.auth().on_auth_state_change(|event, session| {
        let user = session.map(|s| s.user.email).unwrap_or_default();
        info!(event = event.as_str(), %user, "auth state");
    });

    let svc = ReferralService::new(backend, Arc::new(RandomSellerPicker::new()), Arc::new(SystemClock));
    match run(cli.command, &svc).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command, svc: &ReferralService) -> Result<(), CliError> {
    let auth = svc.backend().auth();
    match command {
        Command::Login { email, password } => {
            let session = auth
                .sign_in_with_password(Credentials::new(email, password))
                .await
                .into_result()
                .map_err(ServiceError::from)?;
            println!("signed in as {} ({})", session.user.name, session.user.role.as_str());
        }
        Command::Signup { email, password, name } => {
            validate_email(&email)?;
            validate_password(&password)?;
            let request = SignUp {
                email,
                password,
                options: SignUpOptions { name },
            };
            let session = auth.sign_up(request).await.into_result().map_err(ServiceError::from)?;
            println!("created {} ({})", session.user.name, session.user.id);
        }
        Command::Logout => {
            if let Some(err) = auth.sign_out().await.error {
                return Err(ServiceError::from(err).into());
            }
            println!("signed out");
        }
        Command::Whoami => {
            let session = svc.session().await?;
            print_json(&session.user)?;
        }
        Command::Submit {
            name,
            phone,
            observation,
        } => {
            let session = svc.session().await?;
            let input = NewIndication::new(name, phone, observation)?;
            let created = svc.submit_indication(&session, input).await?;
            println!("indication {} assigned to {}", created.id, created.seller_name);
        }
        Command::Board => {
            // Registered for parity with the web board; the local backend never pushes.
            let changes = svc
                .backend()
                .channel("indications-changes")
                .on("postgres_changes", |_| {})
                .subscribe();
            for column in svc.board().await? {
                println!("== {} ({})", column.title, column.count());
                for ind in &column.indications {
                    println!("  [{}] {} {} -> {}", ind.id, ind.indicated_name, ind.indicated_phone, ind.seller_name);
                }
            }
            changes.unsubscribe();
        }
        Command::Move { id, status } => {
            let status = IndicationStatus::parse(&status).ok_or(CliError::UnknownStatus(status))?;
            let moved = svc.move_indication(&id, status).await?;
            println!("indication {} is now {}", moved.id, moved.status.title());
        }
        Command::Stats => {
            let session = svc.session().await?;
            print_json(&svc.dashboard(&session).await?)?;
        }
        Command::Ranking { limit } => {
            for entry in svc.top_referrers(limit).await? {
                println!("{}. {} ({} indications)", entry.position, entry.user_name, entry.total_indications);
            }
        }
        Command::Sellers => {
            for seller in svc.sellers().await? {
                let state = if seller.active { "active" } else { "inactive" };
                println!("{} {} [{}]", seller.id, seller.name, state);
            }
        }
        Command::Status => {
            let summary = svc.backend().store().summary(&[USERS, SELLERS, INDICATIONS])?;
            print_json(&summary)?;
        }
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn build_store(cfg: &Config) -> Result<Arc<dyn KeyValueStore>, CoreError> {
    match cfg.store_provider {
        StoreProvider::Sqlite => Ok(Arc::new(SqliteStore::open_creating_dirs(&cfg.store_path)?)),
        StoreProvider::Memory => Ok(Arc::new(InMemoryStore::new())),
    }
}

fn init_tracing(cfg: &Config) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // stdout carries command output; logs go to stderr.
    let registry = tracing_subscriber::registry().with(env_filter);
    match cfg.log_format {
        LogFormat::Json => {
            registry
                .with(
                    fmt::layer()
                        .json()
                        .with_target(true)
                        .with_timer(fmt::time::SystemTime)
                        .with_writer(std::io::stderr),
                )
                .init();
        }
        LogFormat::Pretty => {
            registry
                .with(fmt::layer().pretty().with_target(true).with_writer(std::io::stderr))
                .init();
        }
    }
}
