//! Native JSON artifacts: linear regression and linear classification.
//!
//! ```json
//! {"kind": "linear", "coef": [0.5, -1.0], "intercept": 1.5}
//! {"kind": "linear", "coef": [[0.5, -1.0], [2.0, 0.0]], "intercept": [0.0, 1.0]}
//! {"kind": "linear_classifier", "coef": [[1.0, -1.0]], "intercept": [0.0], "classes": [0, 1]}
//! ```

use serde::Deserialize;
use std::sync::Arc;

use crate::artifact::ArtifactError;
use crate::model::{check_widths, PredictError, Prediction, Predictor};

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Coef { Vector(Vec<f64>), Matrix(Vec<Vec<f64>>) }

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Intercept { Scalar(f64), Vector(Vec<f64>) }

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NativeArtifact {
    Linear {
        coef: Coef,
        #[serde(default)]
        intercept: Option<Intercept>,
    },
    LinearClassifier {
        coef: Vec<Vec<f64>>,
        intercept: Vec<f64>,
        classes: Vec<f64>,
    },
}

impl NativeArtifact {
    pub fn into_predictor(self) -> Result<Arc<dyn Predictor>, ArtifactError> {
        match self {
            NativeArtifact::Linear { coef: Coef::Vector(coef), intercept } => {
                let intercept = match intercept {
                    None => 0.0,
                    Some(Intercept::Scalar(b)) => b,
                    Some(Intercept::Vector(v)) if v.len() == 1 => v[0],
                    Some(Intercept::Vector(v)) => return Err(ArtifactError::InvalidShape(format!("single-output coef needs one intercept, got {}", v.len()))),
                };
                Ok(Arc::new(LinearRegressor::single(coef, intercept)?))
            }
            NativeArtifact::Linear { coef: Coef::Matrix(coef), intercept } => {
                let targets = coef.len();
                let intercept = match intercept {
                    None => vec![0.0; targets],
                    Some(Intercept::Scalar(b)) => vec![b; targets],
                    Some(Intercept::Vector(v)) => v,
                };
                Ok(Arc::new(LinearRegressor::multi(coef, intercept)?))
            }
            NativeArtifact::LinearClassifier { coef, intercept, classes } => {
                Ok(Arc::new(LinearClassifier::new(coef, intercept, classes)?))
            }
        }
    }
}

fn dot(w: &[f64], x: &[f64]) -> f64 { w.iter().zip(x).map(|(a, b)| a * b).sum() }

/// Returns the shared row width.
fn uniform_width(coef: &[Vec<f64>]) -> Result<usize, ArtifactError> {
    let width = coef.first().map(Vec::len).ok_or_else(|| ArtifactError::InvalidShape("coef has no rows".into()))?;
    if width == 0 { return Err(ArtifactError::InvalidShape("coef rows are empty".into())); }
    if let Some(bad) = coef.iter().position(|r| r.len() != width) {
        return Err(ArtifactError::InvalidShape(format!("coef row {bad} has {} entries, expected {width}", coef[bad].len())));
    }
    Ok(width)
}

/// `y = coef · x + intercept`, one output per target.
#[derive(Debug, Clone)]
pub struct LinearRegressor {
    coef: Vec<Vec<f64>>,
    intercept: Vec<f64>,
    n_features: usize,
    flat: bool,
}

impl LinearRegressor {
    /// Single target; predictions come back as a flat list.
    pub fn single(coef: Vec<f64>, intercept: f64) -> Result<Self, ArtifactError> {
        let mut this = Self::multi(vec![coef], vec![intercept])?;
        this.flat = true;
        Ok(this)
    }

    /// `coef` is `n_targets x n_features`; predictions come back nested.
    pub fn multi(coef: Vec<Vec<f64>>, intercept: Vec<f64>) -> Result<Self, ArtifactError> {
        let n_features = uniform_width(&coef)?;
        if intercept.len() != coef.len() {
            return Err(ArtifactError::InvalidShape(format!("{} coef rows but {} intercepts", coef.len(), intercept.len())));
        }
        Ok(Self { coef, intercept, n_features, flat: false })
    }

    fn row(&self, x: &[f64]) -> Vec<f64> {
        self.coef.iter().zip(&self.intercept).map(|(w, b)| dot(w, x) + b).collect()
    }
}

impl Predictor for LinearRegressor {
    fn predict(&self, batch: &[Vec<f64>]) -> Result<Prediction, PredictError> {
        check_widths(batch, self.n_features)?;
        if self.flat {
            Ok(Prediction::Flat(batch.iter().map(|x| dot(&self.coef[0], x) + self.intercept[0]).collect()))
        } else {
            Ok(Prediction::Nested(batch.iter().map(|x| self.row(x)).collect()))
        }
    }

    fn n_features(&self) -> Option<usize> { Some(self.n_features) }
    fn kind(&self) -> &'static str { "linear" }
}

/// One-vs-rest linear decision function. A single coefficient row is the
/// binary case: positive decision picks `classes[1]`.
#[derive(Debug, Clone)]
pub struct LinearClassifier {
    coef: Vec<Vec<f64>>,
    intercept: Vec<f64>,
    classes: Vec<f64>,
    n_features: usize,
}

impl LinearClassifier {
    pub fn new(coef: Vec<Vec<f64>>, intercept: Vec<f64>, classes: Vec<f64>) -> Result<Self, ArtifactError> {
        let n_features = uniform_width(&coef)?;
        if intercept.len() != coef.len() {
            return Err(ArtifactError::InvalidShape(format!("{} coef rows but {} intercepts", coef.len(), intercept.len())));
        }
        let want_classes = if coef.len() == 1 { 2 } else { coef.len() };
        if classes.len() != want_classes {
            return Err(ArtifactError::InvalidShape(format!("expected {want_classes} classes, got {}", classes.len())));
        }
        Ok(Self { coef, intercept, classes, n_features })
    }

    fn label(&self, x: &[f64]) -> f64 {
        if self.coef.len() == 1 {
            let d = dot(&self.coef[0], x) + self.intercept[0];
            return if d > 0.0 { self.classes[1] } else { self.classes[0] };
        }
        // first maximum wins on ties
        let mut best = 0;
        let mut best_score = f64::NEG_INFINITY;
        for (i, (w, b)) in self.coef.iter().zip(&self.intercept).enumerate() {
            let score = dot(w, x) + b;
            if score > best_score { best = i; best_score = score; }
        }
        self.classes[best]
    }
}

impl Predictor for LinearClassifier {
    fn predict(&self, batch: &[Vec<f64>]) -> Result<Prediction, PredictError> {
        check_widths(batch, self.n_features)?;
        Ok(Prediction::Flat(batch.iter().map(|x| self.label(x)).collect()))
    }

    fn n_features(&self) -> Option<usize> { Some(self.n_features) }
    fn kind(&self) -> &'static str { "linear_classifier" }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Result<Arc<dyn Predictor>, ArtifactError> {
        serde_json::from_str::<NativeArtifact>(json).unwrap().into_predictor()
    }

    #[test]
    fn single_output_regression() {
        let m = parse(r#"{"kind":"linear","coef":[0.5,-1.0,2.0,0.25],"intercept":1.5}"#).unwrap();
        assert_eq!(m.n_features(), Some(4));
        let out = m.predict(&[vec![1.0, 2.0, 3.0, 4.0]]).unwrap();
        assert_eq!(out, Prediction::Flat(vec![7.0]));
    }

    #[test]
    fn intercept_defaults_to_zero() {
        let m = parse(r#"{"kind":"linear","coef":[1.0,1.0]}"#).unwrap();
        assert_eq!(m.predict(&[vec![2.0, 3.0]]).unwrap(), Prediction::Flat(vec![5.0]));
    }

    #[test]
    fn multi_output_regression_is_nested() {
        let m = parse(r#"{"kind":"linear","coef":[[1.0,0.0],[0.0,2.0]],"intercept":[0.5,-1.0]}"#).unwrap();
        let out = m.predict(&[vec![3.0, 4.0], vec![0.0, 0.0]]).unwrap();
        assert_eq!(out, Prediction::Nested(vec![vec![3.5, 7.0], vec![0.5, -1.0]]));
    }

    #[test]
    fn scalar_intercept_broadcasts_over_targets() {
        let m = parse(r#"{"kind":"linear","coef":[[1.0],[2.0]],"intercept":1.0}"#).unwrap();
        assert_eq!(m.predict(&[vec![1.0]]).unwrap(), Prediction::Nested(vec![vec![2.0, 3.0]]));
    }

    #[test]
    fn wrong_width_is_a_predict_error() {
        let m = parse(r#"{"kind":"linear","coef":[1.0,1.0,1.0]}"#).unwrap();
        let err = m.predict(&[vec![1.0]]).unwrap_err();
        assert_eq!(err, PredictError::FeatureCount { row: 0, expected: 3, got: 1 });
    }

    #[test]
    fn binary_classifier_thresholds_at_zero() {
        let m = parse(r#"{"kind":"linear_classifier","coef":[[1.0,-1.0]],"intercept":[0.0],"classes":[0,1]}"#).unwrap();
        let out = m.predict(&[vec![2.0, 1.0], vec![1.0, 2.0], vec![1.0, 1.0]]).unwrap();
        assert_eq!(out, Prediction::Flat(vec![1.0, 0.0, 0.0]));
    }

    #[test]
    fn multiclass_picks_first_best() {
        let m = parse(
            r#"{"kind":"linear_classifier","coef":[[1.0,0.0],[0.0,1.0],[1.0,0.0]],"intercept":[0.0,0.0,0.0],"classes":[10,20,30]}"#,
        )
        .unwrap();
        let out = m.predict(&[vec![0.0, 5.0], vec![5.0, 0.0]]).unwrap();
        assert_eq!(out, Prediction::Flat(vec![20.0, 10.0]));
    }

    #[test]
    fn inconsistent_shapes_fail_to_load() {
        for bad in [
            r#"{"kind":"linear","coef":[]}"#,
            r#"{"kind":"linear","coef":[[1.0,2.0],[1.0]]}"#,
            r#"{"kind":"linear","coef":[[1.0],[2.0]],"intercept":[1.0]}"#,
            r#"{"kind":"linear","coef":[1.0],"intercept":[1.0,2.0]}"#,
            r#"{"kind":"linear_classifier","coef":[[1.0]],"intercept":[0.0],"classes":[0,1,2]}"#,
            r#"{"kind":"linear_classifier","coef":[[1.0],[1.0],[1.0]],"intercept":[0.0],"classes":[0,1,2]}"#,
        ] {
            assert!(matches!(parse(bad), Err(ArtifactError::InvalidShape(_))), "{bad}");
        }
    }

    #[test]
    fn unknown_kind_does_not_decode() {
        assert!(serde_json::from_str::<NativeArtifact>(r#"{"kind":"forest","trees":[]}"#).is_err());
    }
}
