use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

mod aggregators;
mod api;
mod cli;
mod gas;
mod metrics;
mod nameplates;
mod normalize;
mod orchestrator;
mod paging;
mod providers;
mod recap;

use common::config::{Config, Credentials};
use common::observability::{build_dispatch, LogFormat};
use nameplates::NameplateThresholds;
use orchestrator::Orchestrator;
use providers::{
    alchemy::AlchemyClient, covalent::CovalentClient, helius::HeliusClient,
    prices::CoinGeckoPrices,
};
use recap::RecapService;

type Service = RecapService<AlchemyClient, CovalentClient, HeliusClient, CoinGeckoPrices>;

/// Build every provider client. Fails before any network call if a key is missing.
fn build_service(config: &Config, creds: &Credentials) -> Result<Service> {
    let timeout = Duration::from_secs(config.http.timeout_secs);
    let providers = &config.providers;

    let alchemy = AlchemyClient::new(&providers.alchemy, creds.alchemy()?, timeout)?;
    let covalent = CovalentClient::new(&providers.covalent, creds.covalent()?, timeout)?;
    let helius = HeliusClient::new(&providers.helius, creds.helius()?, timeout)?;
    let prices = CoinGeckoPrices::new(&config.prices, timeout)?;

    Ok(RecapService::new(
        Orchestrator::new(alchemy, covalent, helius),
        prices,
        NameplateThresholds::from_config(&config.nameplates),
    ))
}

async fn serve(config: &Config, service: Service) -> Result<()> {
    if let Some(obs) = &config.observability {
        metrics::install_prometheus(obs.prometheus_port)?;
        tracing::info!(port = obs.prometheus_port, "prometheus exporter listening");
    }
    metrics::describe();

    let app = api::router(Arc::new(service));
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("recap api listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;

    let (dispatch, _otel_guard) = build_dispatch(
        "recap",
        &config.general.log_level,
        LogFormat::from_str_loose(&config.general.log_format),
    );
    tracing::dispatcher::set_global_default(dispatch).map_err(anyhow::Error::msg)?;

    let cmd = cli::parse_args(std::env::args()).map_err(anyhow::Error::msg)?;
    let service = build_service(&config, &Credentials::from_env())?;

    match cmd {
        cli::Command::Serve => {
            tracing::info!("wallet recap service starting");
            serve(&config, service).await
        }
        cli::Command::Wallet {
            address,
            year,
            json,
        } => {
            let year = year.unwrap_or_else(api::current_year);
            cli::show_wallet(&service, &address, year, json).await
        }
    }
}
