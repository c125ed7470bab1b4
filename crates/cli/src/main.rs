//! `routedesk` command-line entry point.
//!
//! Configuration comes from the environment (and `.env`); see
//! `utils::config`. Every data command acts as the identity given by `--uid`.

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, bail};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use db::{DBService, DocumentStore, SqliteDocumentStore, models::account::UserProfile};
use serde::Serialize;
use services::services::{
    accounts::AccountService,
    assistant::assistant_from_config,
    blob::FsBlobStore,
    csv_import::{CsvImporter, CsvKind},
    database_validator::DatabaseValidator,
    sync::SyncContext,
};
use tracing::info;
use utils::{config::Config, logging::init_tracing};

#[derive(Parser, Debug)]
#[command(name = "routedesk", version, about = "Route distribution back office")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a business and owner profile for a new identity, with demo data
    ProvisionOwner {
        #[arg(long, env = "ROUTEDESK_UID")]
        uid: String,
        #[arg(long)]
        email: String,
        #[arg(long, default_value = "")]
        name: String,
    },
    /// Give an identity team-member access as an existing employee
    LinkMember {
        #[arg(long, env = "ROUTEDESK_UID")]
        uid: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        business: String,
        #[arg(long)]
        employee: String,
    },
    /// Print everything visible to the identity as JSON
    Show {
        #[arg(long, env = "ROUTEDESK_UID")]
        uid: String,
    },
    /// Import products, routes or stores from a CSV file
    Import {
        #[arg(long, env = "ROUTEDESK_UID")]
        uid: String,
        /// products, routes or stores
        #[arg(long)]
        kind: CsvKind,
        #[arg(long)]
        file: PathBuf,
    },
    /// Suggest order quantities for the visible products
    Suggest {
        #[arg(long, env = "ROUTEDESK_UID")]
        uid: String,
        /// Defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Check that the local document store is initialized
    Doctor,
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn open_session(
    accounts: &AccountService,
    uid: &str,
) -> anyhow::Result<(SyncContext, UserProfile)> {
    let Some(profile) = accounts.resolve_session(uid).await? else {
        bail!("no profile for uid {uid}; run `routedesk provision-owner` first");
    };
    let ctx = SyncContext::default();
    ctx.start_session(accounts.store(), &profile).await;
    Ok((ctx, profile))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing("info,sqlx=warn");
    let config = Config::from_env().context("invalid configuration")?;
    let cli = Cli::parse();

    let db = DBService::new(&config.database_url)
        .await
        .with_context(|| format!("failed to open {}", config.database_url))?;
    let store: Arc<dyn DocumentStore> = Arc::new(SqliteDocumentStore::new(&db));
    let accounts = AccountService::new(store);

    match cli.command {
        Command::ProvisionOwner { uid, email, name } => {
            let profile = accounts.provision_owner(&uid, &email, &name).await?;
            print_json(&profile)?;
        }
        Command::LinkMember {
            uid,
            email,
            name,
            business,
            employee,
        } => {
            let profile = accounts
                .link_member(&uid, &email, &name, &business, &employee)
                .await?;
            print_json(&profile)?;
        }
        Command::Show { uid } => {
            let (ctx, _) = open_session(&accounts, &uid).await?;
            print_json(ctx.snapshot().as_ref())?;
        }
        Command::Import { uid, kind, file } => {
            let bytes = tokio::fs::read(&file)
                .await
                .with_context(|| format!("failed to read {}", file.display()))?;
            let filename = file
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| "upload.csv".to_string());
            let (ctx, _) = open_session(&accounts, &uid).await?;
            let importer = CsvImporter::new(Arc::new(FsBlobStore::new(&config.blob_dir)));
            let result = ctx.import_csv(&importer, kind, &filename, &bytes).await?;
            print_json(&result)?;
            if !result.success {
                bail!("import failed: {}", result.message);
            }
        }
        Command::Suggest { uid, date } => {
            let (ctx, _) = open_session(&accounts, &uid).await?;
            let assistant = assistant_from_config(&config);
            let date = date.unwrap_or_else(|| Utc::now().date_naive());
            let suggestions = assistant
                .suggest_order_quantities(&ctx.snapshot().products, date)
                .await;
            print_json(&suggestions)?;
        }
        Command::Doctor => {
            let result = DatabaseValidator::new(db.pool.clone()).validate().await?;
            info!(ok = result.is_ok(), "{}", result.summary());
            print_json(&result)?;
            if !result.is_ok() {
                bail!(result.summary());
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn import_parses_kind_and_file() {
        let cli = Cli::try_parse_from([
            "routedesk",
            "import",
            "--uid",
            "u1",
            "--kind",
            "stores",
            "--file",
            "stores.csv",
        ])
        .unwrap();
        match cli.command {
            Command::Import { uid, kind, file } => {
                assert_eq!(uid, "u1");
                assert_eq!(kind, CsvKind::Stores);
                assert_eq!(file, PathBuf::from("stores.csv"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
