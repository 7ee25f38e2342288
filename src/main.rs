use bokario_rate_limiter::{AppState, RateLimiter, Sweeper, config::Args, router};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() {
    init_tracing();

    // parse cli arguments
    let args = Args::parse();
    if let Err(err) = run(args).await {
        error!(%err, "rate limiter exited with error");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();
}

async fn run(args: Args) -> Result<(), BoxError> {
    let defaults = args.rate_limit_config();
    defaults.validate()?;

    let limiter = Arc::new(RateLimiter::new());
    let state = Arc::new(AppState::new(limiter.clone(), defaults));

    let shutdown_token = CancellationToken::new();
    let sweeper = Sweeper::spawn(limiter, args.sweep_interval(), shutdown_token.child_token());

    let listener = args.bind().await?;
    let addr = listener.local_addr()?;

    info!("Rate limiter running on http://{}", addr);
    info!(
        "Rate limit: {} requests per {} ms",
        args.max_requests, args.window_ms
    );
    info!("Sweep interval: {:?}", args.sweep_interval());

    // connect info gives the handler the peer address as a key fallback
    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(shutdown_token))
    .await?;

    match tokio::time::timeout(args.shutdown_timeout(), sweeper.shutdown()).await {
        Ok(true) => info!("Server shutdown complete"),
        Ok(false) => error!("Server shutdown complete, sweeper exited abnormally"),
        Err(_) => error!("Sweeper did not stop within {:?}", args.shutdown_timeout()),
    }
    Ok(())
}

// Resolves on Ctrl+C or SIGTERM and cancels background tasks
async fn shutdown_signal(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }

    shutdown_token.cancel();
}
