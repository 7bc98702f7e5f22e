//! Core shared utilities for the model serving services.

use anyhow::Result;
use once_cell::sync::OnceCell;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub mod config;
pub mod metrics;

pub use config::{ServiceConfig, DEFAULT_BIND_ADDR, DEFAULT_MODEL_VERSION};
pub use metrics::{metrics_response, ServiceMetrics, OUTCOME_ERROR, OUTCOME_INVALID, OUTCOME_OK};

static TRACING_INIT: OnceCell<()> = OnceCell::new();

/// Install the global subscriber. `RUST_LOG` wins over `default_level` when set.
/// Calling it again after a successful init is a no-op.
pub fn init_tracing(service: &str, default_level: &str, json: bool) -> Result<()> {
    TRACING_INIT.get_or_try_init(|| -> Result<()> {
        let env_filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(default_level))?;
        let json_layer = json.then(|| {
            tracing_subscriber::fmt::layer()
                .json()
                .flatten_event(true)
                .with_current_span(true)
                .with_span_list(false)
        });
        let text_layer = (!json).then(|| {
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_line_number(true)
        });
        tracing_subscriber::registry()
            .with(env_filter)
            .with(json_layer)
            .with(text_layer)
            .try_init()?;
        Ok(())
    })?;
    info!(%service, json, "tracing initialized");
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await { warn!(error=?e, "ctrl_c handler failed"); std::future::pending::<()>().await; }
    };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => { sig.recv().await; }
            Err(e) => { warn!(error=?e, "SIGTERM handler failed"); std::future::pending::<()>().await; }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown_signal_received");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracing_init_is_idempotent() {
        init_tracing("test", "debug", false).unwrap();
        init_tracing("test", "info", true).unwrap();
    }
}
