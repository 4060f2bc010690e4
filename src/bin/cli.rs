//! Custodian CLI
//!
//! Operator tooling over the persisted backup state: location status,
//! aggregate stats, and admin configuration.

use std::sync::Arc;

use clap::{Parser, Subcommand};

use custodian::config::JsonFileConfigStore;
use custodian::error::Result;
use custodian::types::*;
use custodian::BackupService;

#[derive(Parser)]
#[command(name = "custodian")]
#[command(about = "Backup orchestration operator CLI")]
#[command(version)]
struct Cli {
    /// State file path
    #[arg(
        long,
        env = "CUSTODIAN_STATE_PATH",
        default_value = "~/.local/share/custodian/state.json"
    )]
    state_path: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show every backup location and its status
    Status,
    /// Show aggregate backup statistics
    Stats,
    /// Show the current admin configuration
    Config,
    /// Update the admin configuration
    Configure {
        /// Backup interval in minutes
        #[arg(long)]
        interval: Option<u32>,
        /// Snapshot retention in days
        #[arg(long)]
        retention_days: Option<u32>,
        /// Enable or disable the periodic scheduler
        #[arg(long)]
        realtime: Option<bool>,
    },
    /// Add a secondary cloud-drive account
    AddAccount {
        /// Account email
        email: String,
        /// Mark as a workspace (organization) account
        #[arg(long)]
        workspace: bool,
        /// Remote folder to back up into
        #[arg(long)]
        folder: Option<String>,
    },
    /// Remove a secondary cloud-drive account
    RemoveAccount {
        /// Account email
        email: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "custodian=warn".into()),
        )
        .init();

    let cli = Cli::parse();

    let state_path = shellexpand::tilde(&cli.state_path).to_string();
    let store = Arc::new(JsonFileConfigStore::open(&state_path)?);
    let service = BackupService::new(store)?;

    match cli.command {
        Commands::Status => {
            for location in service.backup_status() {
                println!(
                    "{:<40} {:<22} {:<8} last backup: {}",
                    location.id,
                    location.name,
                    location.status.to_string(),
                    location
                        .last_backup_time
                        .map(|t| t.to_rfc3339())
                        .unwrap_or_else(|| "never".to_string()),
                );
            }
        }
        Commands::Stats => {
            let stats = service.backup_stats();
            println!("Locations:      {}", stats.total_locations);
            println!("Active:         {}", stats.active_locations);
            println!("Queue depth:    {}", stats.queue_depth);
            println!("Bytes stored:   {}", stats.total_bytes);
            println!(
                "Last backup:    {}",
                stats
                    .last_backup_time
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "never".to_string()),
            );
        }
        Commands::Config => {
            let config = service.admin_config();
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Commands::Configure {
            interval,
            retention_days,
            realtime,
        } => {
            let mut config = service.admin_config();
            if let Some(interval) = interval {
                config.auto_backup_interval_minutes = interval;
            }
            if let Some(retention_days) = retention_days {
                config.retention_days = retention_days;
            }
            if let Some(realtime) = realtime {
                config.enable_real_time_sync = realtime;
            }
            service.configure_admin_backup(config)?;
            println!("Configuration updated");
        }
        Commands::AddAccount {
            email,
            workspace,
            folder,
        } => {
            let mut config = service.admin_config();
            config.secondary_accounts.retain(|a| a.email != email);
            config.secondary_accounts.push(DriveAccount {
                email: email.clone(),
                is_workspace_account: workspace,
                remote_folder_ref: folder,
            });
            service.configure_admin_backup(config)?;
            println!("Added account {}", email);
        }
        Commands::RemoveAccount { email } => {
            let mut config = service.admin_config();
            let before = config.secondary_accounts.len();
            config.secondary_accounts.retain(|a| a.email != email);
            if config.secondary_accounts.len() == before {
                eprintln!("No account {} configured", email);
            } else {
                service.configure_admin_backup(config)?;
                println!("Removed account {}", email);
            }
        }
    }

    service.shutdown().await;
    Ok(())
}
