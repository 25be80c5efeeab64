//! App Proxy Manager
//!
//! Reconciles the applications listed in a YAML declaration file against
//! Microsoft Entra ID, and offers lookup and removal by display name.
//!
//! Runtime settings come from `apm.toml` (or `--config` / `APM_CONFIG`) with
//! environment variable overrides; see `apm example-config`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use apm_common::auth::{GRAPH_SCOPE, KEY_VAULT_SCOPE};
use apm_common::logging::init_logging;
use apm_common::{AuthError, ClientCredentials, StaticToken, TokenProvider};
use apm_config::{AuthSettings, ConfigLoader, Declarations, Settings};
use apm_graph::{Directory, GraphClient};
use apm_reconciler::{delete_by_name, find_by_prefix, Reconciler, ReconcilerOptions};
use apm_secrets::{create_provider, SecretsConfig};
use clap::{Parser, Subcommand};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about = "Entra application proxy manager")]
struct Cli {
    /// Runtime settings file (TOML)
    #[arg(short, long, global = true, env = "APM_CONFIG")]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Converge every declared application
    Reconcile {
        /// Application declaration file (YAML)
        #[arg(short = 'f', long = "file")]
        file: String,
    },
    /// List applications whose display name starts with a prefix
    Find {
        prefix: String,
    },
    /// Delete the application with this exact display name
    Delete {
        name: String,
    },
    /// Print an example settings file
    ExampleConfig,
}

/// Settings and clients shared by the directory commands.
struct Runtime {
    settings: Settings,
    http_client: reqwest::Client,
    directory: Arc<dyn Directory>,
}

impl Runtime {
    fn load(config: Option<&str>) -> Result<Self> {
        let loader = match config {
            Some(path) => ConfigLoader::with_path(path),
            None => ConfigLoader::new(),
        };
        let settings = loader.load().context("loading settings")?;
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.graph.timeout_secs))
            .build()?;

        let graph_tokens = token_provider(
            &settings.auth,
            settings.auth.graph_token.as_deref(),
            GRAPH_SCOPE,
            &http_client,
        )?;
        let directory: Arc<dyn Directory> = Arc::new(GraphClient::new(
            &settings.graph.url,
            graph_tokens,
            Duration::from_secs(settings.graph.timeout_secs),
        )?);

        Ok(Self {
            settings,
            http_client,
            directory,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging("apm");

    match cli.command {
        Commands::Reconcile { file } => {
            let runtime = Runtime::load(cli.config.as_deref())?;
            let declarations = Declarations::from_file(&file)
                .with_context(|| format!("loading declarations from {}", file))?;
            info!(apps = declarations.apps.len(), file = %file, "Starting reconciliation");

            let settings = &runtime.settings;
            let vault_tokens = token_provider(
                &settings.auth,
                settings.auth.key_vault_token.as_deref(),
                KEY_VAULT_SCOPE,
                &runtime.http_client,
            )?;
            let secrets = create_provider(
                &SecretsConfig {
                    provider: settings.secrets.provider.clone(),
                    key_vault_suffix: settings.secrets.key_vault_suffix.clone(),
                    env_prefix: settings.secrets.env_prefix.clone(),
                },
                vault_tokens,
                runtime.http_client.clone(),
            )?;

            let reconciler = Reconciler::new(
                runtime.directory.clone(),
                secrets,
                runtime.http_client.clone(),
                ReconcilerOptions::from(&settings.reconcile),
            );
            let report = reconciler.run(&declarations.apps).await;

            if report.has_errors() {
                error!(
                    failed = report.failed.len(),
                    succeeded = report.succeeded.len(),
                    "Reconciliation finished with errors"
                );
                std::process::exit(1);
            }
        }
        Commands::Find { prefix } => {
            let runtime = Runtime::load(cli.config.as_deref())?;
            let applications = find_by_prefix(runtime.directory.as_ref(), &prefix).await?;
            if applications.is_empty() {
                println!("No applications starting with {}", prefix);
            }
            for app in applications {
                println!(
                    "{}\t{}\t{}\t{}",
                    app.id,
                    app.display_name.unwrap_or_default(),
                    app.publisher_domain.unwrap_or_default(),
                    app.created_date_time
                        .map(|t| t.to_rfc3339())
                        .unwrap_or_default()
                );
            }
        }
        Commands::Delete { name } => {
            let runtime = Runtime::load(cli.config.as_deref())?;
            let application_id = delete_by_name(runtime.directory.as_ref(), &name).await?;
            println!("Deleted {} ({})", name, application_id);
        }
        Commands::ExampleConfig => {
            print!("{}", Settings::example_toml());
        }
    }

    Ok(())
}

/// Pre-acquired token if configured, else the client credentials grant for `scope`.
fn token_provider(
    auth: &AuthSettings,
    static_token: Option<&str>,
    scope: &str,
    http_client: &reqwest::Client,
) -> Result<Arc<dyn TokenProvider>> {
    if let Some(token) = static_token {
        return Ok(Arc::new(StaticToken::new(token)));
    }

    match (&auth.tenant_id, &auth.client_id, &auth.client_secret) {
        (Some(tenant_id), Some(client_id), Some(client_secret)) => {
            Ok(Arc::new(ClientCredentials::new(
                &auth.login_url,
                tenant_id,
                client_id.clone(),
                client_secret.clone(),
                scope,
                http_client.clone(),
            )))
        }
        _ => Err(AuthError::MissingCredential(format!(
            "{}: set a pre-acquired token or AZURE_TENANT_ID, AZURE_CLIENT_ID and AZURE_CLIENT_SECRET",
            scope
        ))
        .into()),
    }
}
