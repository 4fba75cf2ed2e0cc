use std::sync::Arc;

use anyhow::Context;
use gateway::auth::{ClaimsSymbolAuthorizer, JwtTokenDecoder};
use gateway::broker::TopicBroker;
use gateway::router::create_router;
use gateway::state::AppState;
use gateway::{DistributionGateway, GatewayConfig};
use market_feed::calendar::HolidayCalendar;
use market_feed::events::AuditLogListener;
use market_feed::provider::{Instrument, StaticInstrumentProvider};
use market_feed::{FeedConfig, FeedOrchestrator, StartOutcome};
use rust_decimal::Decimal;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use types::ids::AssetClass;

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Served when no instruments file is configured.
fn default_universe() -> StaticInstrumentProvider {
    StaticInstrumentProvider::new(vec![
        Instrument::new("AAPL", "NASDAQ", AssetClass::Equity).with_open_price(Decimal::new(18_950, 2)),
        Instrument::new("MSFT", "NASDAQ", AssetClass::Equity).with_open_price(Decimal::new(41_525, 2)),
        Instrument::new("SPY", "NYSE", AssetClass::Etf).with_open_price(Decimal::new(52_310, 2)),
        Instrument::new("RELIANCE", "NSE", AssetClass::Equity).with_open_price(Decimal::new(292_040, 2)),
        Instrument::new("TCS", "NSE", AssetClass::Equity).with_open_price(Decimal::new(388_515, 2)),
        Instrument::new("BTCUSD", "CRYPTO", AssetClass::Crypto).with_open_price(Decimal::new(6_432_000, 2)),
    ])
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    init_tracing();
    tracing::info!("Starting market-data gateway v{}", market_feed::SERVICE_VERSION);

    let feed_config = FeedConfig::from_env().context("invalid FEED_* configuration")?;
    let gateway_config = GatewayConfig::from_env().context("invalid GATEWAY_* configuration")?;
    tracing::info!(
        bind_addr = %gateway_config.bind_addr,
        interval_ms = feed_config.interval_ms,
        batch_size = feed_config.batch_size,
        bar_interval_seconds = feed_config.bar_interval_seconds,
        "Configuration loaded"
    );

    let provider = match &gateway_config.instruments_file {
        Some(path) => StaticInstrumentProvider::from_json_file(path)
            .with_context(|| format!("failed to load instruments from {}", path.display()))?,
        None => default_universe(),
    };

    let mut calendar = match &gateway_config.holidays {
        Some(raw) => HolidayCalendar::parse(raw).context("invalid GATEWAY_HOLIDAYS")?,
        None => HolidayCalendar::new(),
    };
    if gateway_config.weekends_closed {
        calendar = calendar.with_weekends_closed();
    }

    let gateway = Arc::new(DistributionGateway::new(
        Arc::new(JwtTokenDecoder::new(gateway_config.jwt_secret.as_bytes())),
        Arc::new(ClaimsSymbolAuthorizer),
        Arc::new(TopicBroker::new(gateway_config.topic_capacity)),
    ));

    let feed = FeedOrchestrator::builder(feed_config)
        .provider(Arc::new(provider))
        .calendar(Arc::new(calendar))
        .sink(gateway.clone())
        .listener(Arc::new(AuditLogListener))
        .build()?;

    match feed.start("system")? {
        StartOutcome::AllExchangesClosed => {
            tracing::warn!("Every exchange is closed today; feed stays stopped")
        }
        outcome => tracing::info!(?outcome, "Feed start requested"),
    }

    let app = create_router(AppState::new(gateway, feed.clone()));
    let listener = TcpListener::bind(gateway_config.bind_addr).await?;
    tracing::info!("Listening on {}", gateway_config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    feed.stop("system", "shutdown");
    tracing::info!("Gateway stopped");
    Ok(())
}
