use std::process::ExitCode;

use taskboard_api::TaskboardApi;
use taskboard_dashboard::config::DashboardConfig;
use taskboard_dashboard::session::{sign_in, SessionStore};
use taskboard_dashboard::summary;
use taskboard_sync::Dashboard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "taskboard_dashboard=info,taskboard_sync=info,taskboard_channel=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = match DashboardConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(
        api_url = %config.api_url,
        ws_url = %config.ws_url,
        role = %config.role,
        "Loaded dashboard configuration",
    );

    // --- Identity ---
    let store = SessionStore::new(config.session_file.clone());
    let api = TaskboardApi::new(config.api_url.clone());
    let actor = match sign_in(config.role, &store, &api, config.credentials.as_ref()).await {
        Ok(actor) => actor,
        Err(e) => {
            tracing::error!(error = %e, "Sign-in failed");
            return ExitCode::FAILURE;
        }
    };

    // --- Runtime ---
    let handle = Dashboard::start(config.runtime(actor));
    let summary_handle = tokio::spawn(summary::run(handle.state()));

    shutdown_signal().await;
    tracing::info!("Shutdown signal received");

    handle.shutdown().await;
    // The summary loop ends once the runtime drops its state sender.
    let _ = summary_handle.await;

    tracing::info!("Graceful shutdown complete");
    ExitCode::SUCCESS
}

/// Wait for Ctrl-C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
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
}
