use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::Server;
use clap::{Parser, Subcommand};
use eyre::{eyre, Result, WrapErr};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tx_intent_lab::catalog;
use tx_intent_lab::config::{load_config, Network};
use tx_intent_lab::provider::MaestroProvider;
use tx_intent_lab::routes::{router, AppState};
use tx_intent_lab::{SubmissionGateway, TransactionBuilder};

#[derive(Parser, Debug)]
#[command(name = "tx-intent-lab", version, about)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Ledger network (preprod, preview or mainnet)
    #[arg(long, global = true)]
    network: Option<Network>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the build and submit endpoints
    Serve {
        #[arg(long, env = "TX_LAB_LISTEN")]
        listen: Option<SocketAddr>,
        /// Prometheus exporter address
        #[arg(long)]
        metrics_listen: Option<SocketAddr>,
        #[arg(long, env = "MAESTRO_API_KEY", hide_env_values = true)]
        maestro_api_key: Option<String>,
    },
    /// Print the variant catalog as JSON
    Variants,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let mut config = load_config(cli.config)?;
    if let Some(network) = cli.network {
        config.network = network;
    }

    match cli.command {
        Command::Variants => {
            println!("{}", serde_json::to_string_pretty(catalog::all())?);
            Ok(())
        }
        Command::Serve {
            listen,
            metrics_listen,
            maestro_api_key,
        } => {
            if let Some(listen) = listen {
                config.server.listen = listen;
            }
            if let Some(metrics_listen) = metrics_listen {
                config.server.metrics_listen = Some(metrics_listen);
            }
            let api_key = maestro_api_key
                .or_else(|| config.provider.api_key.clone())
                .ok_or_else(|| eyre!("no Maestro API key: set MAESTRO_API_KEY or provider.api_key"))?;

            if let Some(addr) = config.server.metrics_listen {
                PrometheusBuilder::new()
                    .with_http_listener(addr)
                    .install()
                    .wrap_err("failed to start prometheus exporter")?;
                info!(%addr, "prometheus exporter listening");
            }

            let provider = MaestroProvider::new(config.network, &config.provider, api_key)
                .wrap_err("failed to build provider client")?;
            let state = AppState {
                builder: Arc::new(TransactionBuilder::new(config.network, config.protocol)),
                gateway: SubmissionGateway::new(Arc::new(provider)),
            };

            info!(
                listen = %config.server.listen,
                network = %config.network,
                variants = catalog::all().len(),
                "serving transaction lab"
            );
            Server::bind(&config.server.listen)
                .serve(router(state).into_make_service())
                .with_graceful_shutdown(async {
                    let _ = tokio::signal::ctrl_c().await;
                })
                .await?;
            Ok(())
        }
    }
}
