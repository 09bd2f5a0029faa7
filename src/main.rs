use fractalbot::api::BinanceClient;
use fractalbot::config::Config;
use fractalbot::scheduler::TradeScheduler;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let config = Config::from_env()?;

    tracing::info!("🚀 fractalbot starting");
    tracing::info!("\n📊 Configuration:");
    tracing::info!("  Symbol: {}", config.symbol);
    tracing::info!(
        "  Candles: {} x {} per fetch",
        config.candle_limit,
        config.interval
    );
    tracing::info!("  Fractal lookback: {}", config.fractal_period);
    tracing::info!("  Trade quantity: {}", config.trade_quantity);
    tracing::info!("  Tick: every {}s", config.tick_seconds);
    tracing::info!("  Endpoint: {}", config.base_url);

    let client = BinanceClient::from_config(&config);

    // fail fast when the exchange is unreachable
    client.ping().await?;
    tracing::info!("✅ exchange reachable");

    let scheduler = TradeScheduler::new(client, config);
    let trade_task = tokio::spawn(scheduler.run());

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("\n⚠️  Received Ctrl+C, shutting down...");
        }
        result = trade_task => {
            tracing::error!("trade loop exited: {:?}", result);
        }
    }

    tracing::info!("👋 fractalbot stopped");
    Ok(())
}

fn setup_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "fractalbot=info,fractalbot::strategy=debug".to_string()),
        )
        .init();
}
