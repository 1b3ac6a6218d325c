use clap::{Parser, Subcommand};
use mfdeploy_core::config::DEFAULT_DATABASE_PASSWORD;
use mfdeploy_core::{DeployError, DeploymentConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod output;

#[derive(Parser)]
#[command(name = "mfdeploy")]
#[command(about = "Run a local Metaflow deployment on Docker", long_about = None)]
struct Cli {
    /// Log level for stderr diagnostics (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Provision the deployment: database, metadata service, UI backend and UI
    Create {
        /// Password for the Postgres superuser
        #[arg(long, default_value = DEFAULT_DATABASE_PASSWORD, hide_default_value = true)]
        database_password: String,

        /// Database the metadata service stores flows in
        #[arg(long, default_value = "metaflow")]
        database_name: String,

        /// Postgres user the services connect as
        #[arg(long, default_value = "metaflow")]
        database_user: String,

        /// Host port the database listens on
        #[arg(long, default_value_t = 5432)]
        database_port: u16,

        /// Metadata service release to deploy
        #[arg(long, default_value = "2.1.0")]
        md_version: String,

        /// UI release to deploy
        #[arg(long, default_value = "v1.0.0")]
        ui_version: String,
    },

    /// Stop and remove the deployment's containers and network
    Teardown,

    /// Report which deployment resources currently exist
    Check,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.log_level);

    let result = match cli.command {
        Commands::Create {
            database_password,
            database_name,
            database_user,
            database_port,
            md_version,
            ui_version,
        } => {
            let config = DeploymentConfig {
                database_password,
                database_name,
                database_user,
                database_port,
                metadata_version: md_version,
                ui_version,
                ..DeploymentConfig::default()
            };
            commands::create(config).await
        }

        Commands::Teardown => commands::teardown().await,

        Commands::Check => commands::check().await,
    };

    if let Err(err) = result {
        report_failure(&err);
        std::process::exit(1);
    }
}

/// Diagnostics go to stderr so stdout stays clean for status lines.
/// `RUST_LOG` takes precedence over the flag when set.
fn init_tracing(log_level: tracing::Level) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(log_level.into()));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true).with_writer(std::io::stderr))
        .init();
}

/// Errors the operator can act on get a headline before the chain.
fn report_failure(err: &anyhow::Error) {
    if let Some(headline) = err.downcast_ref::<DeployError>().and_then(DeployError::headline) {
        output::failure(headline);
    }
    output::failure(&format!("{err:#}"));
}
