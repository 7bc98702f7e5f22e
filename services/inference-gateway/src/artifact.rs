//! Startup-time artifact loading. The file extension picks the decoder.

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use crate::linear::NativeArtifact;
use crate::model::Predictor;

/// File looked up next to the executable when no path is configured.
pub const DEFAULT_ARTIFACT_NAME: &str = "model.json";

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("cannot read {path}: {source}")]
    Io { path: PathBuf, #[source] source: std::io::Error },
    #[error("cannot decode {path}: {source}")]
    Decode { path: PathBuf, #[source] source: serde_json::Error },
    #[error("invalid model: {0}")]
    InvalidShape(String),
    #[error("unsupported artifact format {0:?}")]
    UnsupportedFormat(String),
    #[error("artifact digest mismatch expected={expected} got={actual}")]
    DigestMismatch { expected: String, actual: String },
    #[error("model backend rejected artifact: {0}")]
    Backend(String),
}

pub struct LoadedArtifact {
    pub model: Arc<dyn Predictor>,
    pub path: PathBuf,
    pub sha256: String,
}

pub fn default_artifact_path() -> std::io::Result<PathBuf> {
    let exe = std::env::current_exe()?;
    let dir = exe.parent().map(Path::to_path_buf).unwrap_or_default();
    Ok(dir.join(DEFAULT_ARTIFACT_NAME))
}

/// Reads, optionally verifies against a hex SHA-256 pin, and decodes.
pub fn load_model(path: &Path, expected_sha256: Option<&str>) -> Result<LoadedArtifact, ArtifactError> {
    let bytes = std::fs::read(path).map_err(|source| ArtifactError::Io { path: path.to_path_buf(), source })?;
    let sha256 = hex::encode(Sha256::digest(&bytes));
    if let Some(expected) = expected_sha256.map(str::trim).filter(|e| !e.is_empty()) {
        if !expected.eq_ignore_ascii_case(&sha256) {
            return Err(ArtifactError::DigestMismatch { expected: expected.to_string(), actual: sha256 });
        }
    }

    let ext = path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase).unwrap_or_default();
    let model: Arc<dyn Predictor> = match ext.as_str() {
        "json" => {
            let native: NativeArtifact = serde_json::from_slice(&bytes)
                .map_err(|source| ArtifactError::Decode { path: path.to_path_buf(), source })?;
            native.into_predictor()?
        }
        #[cfg(feature = "onnx")]
        "onnx" => Arc::new(crate::onnx::OnnxModel::from_bytes(&bytes)?),
        #[cfg(not(feature = "onnx"))]
        "onnx" => return Err(ArtifactError::UnsupportedFormat("onnx (built without the `onnx` feature)".into())),
        other => return Err(ArtifactError::UnsupportedFormat(other.to_string())),
    };
    Ok(LoadedArtifact { model, path: path.to_path_buf(), sha256 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Prediction;
    use std::io::Write;

    const LINEAR: &str = r#"{"kind":"linear","coef":[0.5,-1.0,2.0,0.25],"intercept":1.5}"#;

    fn fixture(suffix: &str, body: &[u8]) -> tempfile::NamedTempFile {
        let mut f = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        f.write_all(body).unwrap();
        f
    }

    #[test]
    fn loads_json_artifact_and_reports_digest() {
        let f = fixture(".json", LINEAR.as_bytes());
        let loaded = load_model(f.path(), None).unwrap();
        assert_eq!(loaded.model.kind(), "linear");
        assert_eq!(loaded.sha256, hex::encode(Sha256::digest(LINEAR.as_bytes())));
        assert_eq!(loaded.model.predict(&[vec![1.0, 2.0, 3.0, 4.0]]).unwrap(), Prediction::Flat(vec![7.0]));
    }

    #[test]
    fn digest_pin_is_case_insensitive() {
        let f = fixture(".json", LINEAR.as_bytes());
        let pin = hex::encode(Sha256::digest(LINEAR.as_bytes())).to_uppercase();
        assert!(load_model(f.path(), Some(&pin)).is_ok());
        assert!(load_model(f.path(), Some("")).is_ok());
    }

    #[test]
    fn digest_mismatch_is_fatal() {
        let f = fixture(".json", LINEAR.as_bytes());
        let err = load_model(f.path(), Some("00ff")).err().unwrap();
        assert!(matches!(err, ArtifactError::DigestMismatch { .. }));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_model(Path::new("/no/such/model.json"), None).err().unwrap();
        assert!(matches!(err, ArtifactError::Io { .. }));
    }

    #[test]
    fn corrupt_json_is_decode_error() {
        let f = fixture(".json", b"{\"kind\":\"linear\",\"coef\":");
        assert!(matches!(load_model(f.path(), None).err().unwrap(), ArtifactError::Decode { .. }));
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let f = fixture(".pkl", b"\x80\x04");
        assert!(matches!(load_model(f.path(), None).err().unwrap(), ArtifactError::UnsupportedFormat(ext) if ext == "pkl"));
    }

    #[test]
    fn bundled_fixture_loads() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures").join("model.json");
        let loaded = load_model(&path, None).unwrap();
        assert_eq!(loaded.model.n_features(), Some(4));
        assert_eq!(loaded.model.predict(&[vec![1.0, 2.0, 3.0, 4.0]]).unwrap(), Prediction::Flat(vec![7.0]));
    }

    #[test]
    fn onnx_extension_needs_the_feature() {
        let f = fixture(".onnx", b"not a graph");
        let err = load_model(f.path(), None).err().unwrap();
        if cfg!(feature = "onnx") {
            assert!(matches!(err, ArtifactError::Backend(_)));
        } else {
            assert!(matches!(err, ArtifactError::UnsupportedFormat(_)));
        }
    }

    #[test]
    fn default_path_sits_next_to_executable() {
        let p = default_artifact_path().unwrap();
        assert_eq!(p.file_name().unwrap(), DEFAULT_ARTIFACT_NAME);
        assert_eq!(p.parent(), std::env::current_exe().unwrap().parent());
    }
}
