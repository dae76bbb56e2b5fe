use std::net::SocketAddr;
use std::sync::Arc;

use mindstream::{
    AppState, BroadcastHub, IngestionBridge, Pipeline, PipelineConfig, SampleSource, ServerConfig,
    SyntheticSource,
};
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mindstream=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(ServerConfig::from_env()?);
    info!(
        rate_hz = config.sample_rate_hz,
        window = config.window_size,
        "starting mindstream server"
    );

    let bridge = IngestionBridge::with_capacity(config.ingest_capacity);
    let hub = BroadcastHub::new(config.subscriber_queue_capacity);

    // Single-owner pipeline task: windowing, spectral analysis, broadcast.
    let cancel = CancellationToken::new();
    let pipeline = Pipeline::new(
        PipelineConfig {
            sample_rate_hz: config.sample_rate_hz,
            window_size: config.window_size,
            drain_interval: Duration::from_millis(config.drain_interval_ms),
            drain_batch: config.drain_batch,
        },
        bridge.clone(),
        hub.clone(),
    );
    let pipeline_task = tokio::spawn(pipeline.run(cancel.clone()));

    // The acquisition side delivers on its own thread through the bridge.
    let mut source: Option<SyntheticSource> = if config.synthetic_source {
        let mut source = SyntheticSource::new(config.sample_rate_hz);
        source.start(bridge.clone())?;
        Some(source)
    } else {
        info!("synthetic source disabled, waiting on external producer");
        None
    };

    let state = AppState::new(hub.clone(), bridge.clone(), Arc::clone(&config));
    let app = mindstream::router(state);

    let addr: SocketAddr = config.bind_address().parse()?;
    info!("listening on {}", addr);
    info!("websocket endpoint: ws://{}/ws", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let shutdown = cancel.clone();
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
            shutdown.cancel();
        })
        .await?;

    // Ordered teardown: refuse new samples, stop the pipeline (discarding
    // anything still queued), then close subscriber connections. The device
    // thread may keep calling submit throughout; those calls are no-ops.
    bridge.close();
    cancel.cancel();
    pipeline_task.await?;
    hub.close_all();

    if let Some(source) = source.as_mut() {
        if let Err(e) = source.stop() {
            warn!("failed to stop sample source: {e}");
        }
    }

    info!("shutdown complete");
    Ok(())
}
