use anyhow::Result;
use tracing::info;
use serving_core::{init_tracing, ServiceConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = ServiceConfig::load()?;
    init_tracing("inference-gateway", &cfg.log_level, cfg.log_json)?;
    info!(target: "inference-gateway", version = %cfg.model_version, "Starting inference-gateway service");
    inference_gateway::run(cfg).await
}
