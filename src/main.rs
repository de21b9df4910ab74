use std::net::SocketAddr;
use std::sync::Arc;

use ai_receptionist::{
    config::RelayConfig,
    routes,
    services::completion::OpenAiClient,
    state::AppState,
};
use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,ai_receptionist=debug,tower_http=info")
        }))
        .init();

    let config = RelayConfig::from_env().context("loading relay configuration")?;

    let completion = OpenAiClient::from_config(&config).context("building completion client")?;
    info!(
        model = completion.model(),
        timeout = ?config.upstream_timeout,
        "completion client ready"
    );

    if config.debug_allow_any_origin {
        tracing::warn!("CORS_ALLOW_ANY_ORIGIN is set, every origin is accepted");
    }
    info!(
        origins = config.allowed_origins.len(),
        window = ?config.rate_limit_window,
        max = config.rate_limit_max,
        trust_proxy = config.trust_proxy,
        "request policy"
    );
    info!(dir = %config.public_dir.display(), "serving widget files");

    let state = Arc::new(AppState::new(&config, Arc::new(completion)));

    // Expired rate-limit windows would otherwise pile up per address.
    let limiter = state.limiter.clone();
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(limiter.window());
        loop {
            tick.tick().await;
            let removed = limiter.purge_expired().await;
            if removed > 0 {
                tracing::debug!(removed, "purged rate-limit windows");
            }
        }
    });

    let app = routes::create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    info!(%addr, "AI relay running");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("AI relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
