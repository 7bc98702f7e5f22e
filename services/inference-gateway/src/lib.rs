//! Serves one pre-trained model over HTTP: `/health` and `/predict`.

use anyhow::{Context, Result};
use std::future::Future;
use tokio::net::TcpListener;
use tracing::info;

use serving_core::ServiceConfig;

pub mod api;
pub mod artifact;
pub mod linear;
pub mod model;
#[cfg(feature = "onnx")]
pub mod onnx;

pub use api::{router, ApiError, AppState, PredictRequest};
pub use artifact::{load_model, ArtifactError, LoadedArtifact};
pub use model::{check_widths, PredictError, Prediction, Predictor};

/// Startup then serve until shutdown. Any startup failure is returned and
/// the process never reaches a serving state.
pub async fn run(cfg: ServiceConfig) -> Result<()> {
    let path = match &cfg.model_path {
        Some(p) => p.clone(),
        None => artifact::default_artifact_path().context("cannot locate executable directory")?,
    };
    let loaded = load_model(&path, cfg.model_sha256.as_deref())
        .with_context(|| format!("failed to load model artifact {}", path.display()))?;
    info!(
        path = %loaded.path.display(),
        kind = loaded.model.kind(),
        n_features = ?loaded.model.n_features(),
        sha256 = %loaded.sha256,
        version = %cfg.model_version,
        "model artifact loaded"
    );

    let state = AppState::new(loaded.model, cfg.model_version.as_str())?;
    let listener = TcpListener::bind(cfg.bind_addr)
        .await
        .with_context(|| format!("cannot bind {}", cfg.bind_addr))?;
    info!(addr = %listener.local_addr()?, "inference-gateway listening");
    serve(listener, state, serving_core::shutdown_signal()).await
}

/// Serve the router on an already bound listener until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("inference-gateway stopped");
    Ok(())
}
