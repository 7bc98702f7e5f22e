//! Prometheus metrics owned by a service instance and rendered on `/metrics`.

use axum::body::Body;
use axum::http::{header, StatusCode};
use axum::response::Response;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder};

pub const OUTCOME_OK: &str = "ok";
pub const OUTCOME_INVALID: &str = "invalid";
pub const OUTCOME_ERROR: &str = "error";

#[derive(Clone)]
pub struct ServiceMetrics {
    registry: Registry,
    pub requests_total: IntCounterVec,
    pub predict_latency_seconds: Histogram,
}

impl ServiceMetrics {
    /// Fresh registry per instance so tests and multiple states never collide.
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();
        let requests_total = IntCounterVec::new(
            Opts::new("inference_requests_total", "Requests handled, by endpoint and outcome"),
            &["endpoint", "outcome"],
        )?;
        let predict_latency_seconds = Histogram::with_opts(HistogramOpts::new(
            "inference_predict_latency_seconds",
            "Wall time spent inside the model for one predict call",
        ))?;
        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(predict_latency_seconds.clone()))?;
        Ok(Self { registry, requests_total, predict_latency_seconds })
    }

    pub fn observe_request(&self, endpoint: &str, outcome: &str) {
        self.requests_total.with_label_values(&[endpoint, outcome]).inc();
    }

    pub fn render(&self) -> prometheus::Result<Vec<u8>> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        Ok(buf)
    }
}

/// Text exposition response; 500 with the encoder error if gathering fails.
pub fn metrics_response(metrics: &ServiceMetrics) -> Response {
    match metrics.render() {
        Ok(buf) => Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "text/plain; version=0.0.4")
            .body(Body::from(buf))
            .unwrap_or_else(|_| Response::new(Body::empty())),
        Err(e) => {
            tracing::error!(error=?e, "metrics encode failed");
            let mut resp = Response::new(Body::from(format!("encode error: {e}")));
            *resp.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            resp
        }
    }
}

#[cfg(test)]
impl ServiceMetrics {
    fn request_count(&self, endpoint: &str, outcome: &str) -> u64 {
        self.requests_total.with_label_values(&[endpoint, outcome]).get()
    }
}
