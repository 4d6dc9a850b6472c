// ShelfReader - Library E-Reader Core for Mobile
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


use anyhow::{bail, Context};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use shelf_core::age_gate::{AgeGate, AgePrompt, AgePromptPresenter};
use shelf_core::config::CoreConfig;
use shelf_core::reader::ReaderFormat;
use shelf_core::storage::{accounts, Database, NewAccount, SqliteAccountStore};
use shelf_core::ShelfError;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "shelf-cli")]
#[command(about = "ShelfReader CLI - Desktop testing tool", long_about = None)]
struct Cli {
    /// Account database (defaults to the configured path)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// JSON config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add or update a library account
    AddAccount {
        /// Account identifier (library card number)
        account_id: String,
        /// Name shown in the account list
        display_name: String,
        /// Library requires the age question before showing content
        #[arg(long)]
        gated: bool,
    },
    /// Sign in to an account
    UseAccount {
        account_id: String,
    },
    /// List accounts and their age state
    Accounts,
    /// Run the age check for the signed-in account, asking on the terminal
    VerifyAge,
    /// Forget an account's age answer
    ResetAge {
        account_id: String,
    },
    /// Sign out of the current account, forgetting its age answer
    SignOut,
    /// Show which reading module opens a file or media type
    Format {
        /// File path or MIME type
        target: String,
    },
}

/// Asks the age question on stdin/stdout
struct TerminalPresenter;

#[async_trait]
impl AgePromptPresenter for TerminalPresenter {
    async fn present_age_prompt(&self, prompt: &AgePrompt) -> shelf_core::Result<bool> {
        let minimum_age = prompt.minimum_age;

        let line = tokio::task::spawn_blocking(move || -> std::io::Result<String> {
            print!("Are you {} or older? [y/n] ", minimum_age);
            std::io::stdout().flush()?;
            let mut line = String::new();
            std::io::stdin().lock().read_line(&mut line)?;
            Ok(line)
        })
        .await
        .map_err(|e| ShelfError::internal(e.to_string()))??;

        match line.trim().to_ascii_lowercase().as_str() {
            "y" | "yes" => Ok(true),
            "n" | "no" => Ok(false),
            "" => Err(ShelfError::prompt_failed("no answer on stdin")),
            other => Err(ShelfError::prompt_failed(format!("unrecognized answer {:?}", other))),
        }
    }
}

fn init_logging(filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn describe_format(target: &str) -> Option<ReaderFormat> {
    ReaderFormat::from_media_type(target).or_else(|| ReaderFormat::from_path(Path::new(target)))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => CoreConfig::load(path)
            .await
            .with_context(|| format!("loading config {}", path.display()))?,
        None => CoreConfig::default(),
    };
    if let Some(db) = cli.db {
        config.database_path = db;
    }
    init_logging(&config.log_filter);

    if let Commands::Format { target } = &cli.command {
        match describe_format(target) {
            Some(format) => {
                println!("{} ({})", format, format.media_type());
                println!("DRM capable: {}", format.is_drm_capable());
                return Ok(());
            }
            None => bail!("no reading module for {}", target),
        }
    }

    let db = Database::new(&config.database_path)
        .await
        .with_context(|| format!("opening {}", config.database_path.display()))?;
    let pool = db.pool();

    match cli.command {
        Commands::AddAccount {
            account_id,
            display_name,
            gated,
        } => {
            let account = NewAccount::new(account_id, display_name, gated);
            accounts::save_account(pool, &account).await?;
            println!("Saved account {}", account.account_id);
        }
        Commands::UseAccount { account_id } => {
            accounts::set_current_account(pool, Some(&account_id)).await?;
            println!("Signed in to {}", account_id);
        }
        Commands::Accounts => {
            let current = accounts::get_current_account_id(pool).await?;
            let all = accounts::list_accounts(pool).await?;
            if all.is_empty() {
                println!("No accounts");
            }
            for account in all {
                let marker = if current.as_deref() == Some(account.account_id.as_str()) {
                    "*"
                } else {
                    " "
                };
                println!(
                    "{} {:<16} {:<24} gated={} decision={:?} prompted={}",
                    marker,
                    account.account_id,
                    account.display_name,
                    account.requires_age_gate,
                    account.age_decision,
                    account.age_prompted
                );
            }
        }
        Commands::VerifyAge => {
            let store = Arc::new(SqliteAccountStore::new(db.clone()));
            let gate = AgeGate::new(store, Arc::new(TerminalPresenter), config.age_gate);
            if gate.check().await {
                println!("Age-restricted content allowed");
            } else {
                println!("Age-restricted content hidden");
            }
        }
        Commands::ResetAge { account_id } => {
            accounts::reset_age_state(pool, &account_id).await?;
            println!("Age answer cleared for {}", account_id);
        }
        Commands::SignOut => match accounts::sign_out(pool).await {
            Ok(account_id) => println!("Signed out of {}", account_id),
            Err(ShelfError::NoActiveAccount) => println!("Not signed in"),
            Err(e) => return Err(e.into()),
        },
        Commands::Format { .. } => unreachable!("handled before opening the database"),
    }

    db.close().await?;
    Ok(())
}
