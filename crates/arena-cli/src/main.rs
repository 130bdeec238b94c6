use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "arena")]
#[command(about = "Tipster Arena verification reconciliation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile one tipster's postings against their verifications
    Reconcile {
        /// Tipster (author) id
        #[arg(long)]
        tipster: String,

        /// Layered config paths in merge order (base -> env -> local)
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,

        /// Output format; overrides report.format
        #[arg(long)]
        format: Option<String>,

        /// Append the report to this hash-chained JSONL log; overrides report.audit_log
        #[arg(long = "audit-log")]
        audit_log: Option<String>,

        /// Exit with status 2 when the outcome is DRIFT
        #[arg(long, default_value_t = false)]
        fail_on_drift: bool,
    },

    /// Follow a tipster's documents and re-reconcile on every change
    Watch {
        /// Tipster (author) id
        #[arg(long)]
        tipster: String,

        /// Layered config paths in merge order
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,

        /// Poll interval; overrides watch.interval_ms
        #[arg(long)]
        interval_ms: Option<u64>,

        /// Stop after printing this many reports
        #[arg(long)]
        max_reports: Option<usize>,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Audit log utilities
    Audit {
        #[command(subcommand)]
        cmd: AuditCmd,
    },

    /// Postgres store commands
    Db {
        #[command(subcommand)]
        cmd: DbCmd,
    },
}

#[derive(Subcommand)]
enum AuditCmd {
    /// Verify the hash chain of a JSONL audit log
    Verify {
        #[arg(long)]
        path: String,
    },
}

#[derive(Subcommand)]
enum DbCmd {
    /// Apply document store migrations (uses ARENA_DATABASE_URL)
    Migrate,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Silent if absent; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Reconcile {
            tipster,
            config_paths,
            format,
            audit_log,
            fail_on_drift,
        } => {
            commands::reconcile::run(commands::reconcile::ReconcileArgs {
                tipster,
                config_paths,
                format,
                audit_log,
                fail_on_drift,
            })
            .await
        }

        Commands::Watch {
            tipster,
            config_paths,
            interval_ms,
            max_reports,
        } => {
            commands::watch::run(commands::watch::WatchArgs {
                tipster,
                config_paths,
                interval_ms,
                max_reports,
            })
            .await?;
            Ok(ExitCode::SUCCESS)
        }

        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(String::as_str).collect();
            let loaded = arena_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
            Ok(ExitCode::SUCCESS)
        }

        Commands::Audit { cmd } => match cmd {
            AuditCmd::Verify { path } => match arena_audit::verify_hash_chain(&path)? {
                arena_audit::VerifyResult::Valid { lines } => {
                    println!("audit_valid=true lines={} path={}", lines, path);
                    Ok(ExitCode::SUCCESS)
                }
                arena_audit::VerifyResult::Broken { line, reason } => {
                    println!("audit_valid=false line={} reason={}", line, reason);
                    Ok(ExitCode::from(2))
                }
            },
        },

        Commands::Db { cmd } => match cmd {
            DbCmd::Migrate => {
                let pool = arena_store::pg::connect_from_env().await?;
                arena_store::pg::migrate(&pool).await?;
                println!("migrations_applied=true");
                Ok(ExitCode::SUCCESS)
            }
        },
    }
}

/// Logs go to stderr; stdout carries reports.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}
