//! ONNX graphs run through tract. Only built with the `onnx` feature.

use tract_onnx::prelude::*;

use crate::artifact::ArtifactError;
use crate::model::{check_widths, PredictError, Prediction, Predictor};

type Plan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

pub struct OnnxModel {
    plan: Plan,
    n_features: Option<usize>,
}

fn backend(e: impl std::fmt::Display) -> PredictError { PredictError::Backend(e.to_string()) }

impl OnnxModel {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ArtifactError> {
        let load = || -> TractResult<Plan> {
            tract_onnx::onnx()
                .model_for_read(&mut std::io::Cursor::new(bytes))?
                .into_optimized()?
                .into_runnable()
        };
        let plan = load().map_err(|e| ArtifactError::Backend(e.to_string()))?;
        // last input dim is the feature width when it is concrete; batch dim is usually symbolic
        let n_features = plan
            .model()
            .input_fact(0)
            .ok()
            .and_then(|f| f.shape.iter().last().and_then(|d| d.to_usize().ok()));
        Ok(Self { plan, n_features })
    }
}

impl Predictor for OnnxModel {
    fn predict(&self, batch: &[Vec<f64>]) -> Result<Prediction, PredictError> {
        let width = batch.first().map(Vec::len).ok_or(PredictError::EmptyBatch)?;
        check_widths(batch, self.n_features.unwrap_or(width))?;

        let flat: Vec<f32> = batch.iter().flatten().map(|v| *v as f32).collect();
        let input = Tensor::from_shape(&[batch.len(), width], &flat).map_err(backend)?;
        let outputs = self.plan.run(tvec!(input.into())).map_err(backend)?;
        let output = outputs.first().ok_or_else(|| PredictError::Backend("model produced no outputs".into()))?;

        let as_f32 = output.cast_to::<f32>().map_err(backend)?;
        let values: Vec<f64> = as_f32.as_slice::<f32>().map_err(backend)?.iter().map(|v| *v as f64).collect();
        if output.rank() <= 1 {
            return Ok(Prediction::Flat(values));
        }
        let per_row = values.len() / batch.len();
        if per_row == 0 || per_row * batch.len() != values.len() {
            return Err(PredictError::Backend(format!("output of {} values does not split into {} rows", values.len(), batch.len())));
        }
        Ok(Prediction::Nested(values.chunks(per_row).map(<[f64]>::to_vec).collect()))
    }

    fn n_features(&self) -> Option<usize> { self.n_features }
    fn kind(&self) -> &'static str { "onnx" }
}
