//! Model execution runtimes.
//!
//! A runtime turns (artifact, metadata, features) into a fixed-horizon
//! forecast plus a confidence score. The engine treats it as an opaque
//! capability: swapping in an ONNX or candle backed runtime only means
//! implementing [`ForecastRuntime`].

use anyhow::{anyhow, Result};
use bytes::Bytes;

use crate::models::ModelMetadata;

/// Default confidence reported when the metadata carries no fit metric.
const DEFAULT_CONFIDENCE: f32 = 0.9;

/// Output of one model execution.
#[derive(Debug, Clone)]
pub struct Forecast {
    pub values: Vec<f32>,
    pub confidence: f32,
}

/// Executes a model artifact against a prepared feature vector.
///
/// Implementations must be pure with respect to the passed artifact: the
/// engine may call `forecast` concurrently from multiple readers holding
/// the same snapshot.
pub trait ForecastRuntime: Send + Sync {
    /// Validate that an artifact is executable with the given metadata.
    /// Called once at install time, before the model becomes active.
    fn validate(&self, artifact: &Bytes, metadata: &ModelMetadata) -> Result<()>;

    /// Run the model over one feature vector, producing `metadata.horizon()`
    /// samples.
    fn forecast(&self, artifact: &Bytes, metadata: &ModelMetadata, features: &[f32]) -> Result<Forecast>;
}

/// Built-in dense linear runtime.
///
/// Interprets the artifact as a row-major little-endian `f32` matrix of
/// shape `horizon x (features + 1)`, the trailing column being a bias
/// term. Small enough to run on any edge target and exact enough to
/// validate the surrounding plumbing end to end.
#[derive(Debug, Default)]
pub struct LinearForecastRuntime;

impl LinearForecastRuntime {
    fn expected_len(metadata: &ModelMetadata) -> usize {
        metadata.horizon() * (metadata.feature_count() + 1) * std::mem::size_of::<f32>()
    }

    fn weight_at(artifact: &Bytes, index: usize) -> f32 {
        let offset = index * 4;
        let raw: [u8; 4] = artifact[offset..offset + 4]
            .try_into()
            .expect("offset checked against artifact length");
        f32::from_le_bytes(raw)
    }

    fn confidence_for(metadata: &ModelMetadata) -> f32 {
        metadata
            .performance_metrics
            .get("r2")
            .map(|r2| (*r2 as f32).clamp(0.0, 1.0))
            .unwrap_or(DEFAULT_CONFIDENCE)
    }
}

impl ForecastRuntime for LinearForecastRuntime {
    fn validate(&self, artifact: &Bytes, metadata: &ModelMetadata) -> Result<()> {
        if metadata.horizon() == 0 {
            return Err(anyhow!(
                "model {} declares an empty forecast horizon",
                metadata.version
            ));
        }
        if metadata.features.is_empty() {
            return Err(anyhow!("model {} declares no input features", metadata.version));
        }
        let expected = Self::expected_len(metadata);
        if artifact.len() != expected {
            return Err(anyhow!(
                "artifact size mismatch for model {}: expected {} bytes ({}x{} weights), found {}",
                metadata.version,
                expected,
                metadata.horizon(),
                metadata.feature_count() + 1,
                artifact.len()
            ));
        }
        Ok(())
    }

    fn forecast(&self, artifact: &Bytes, metadata: &ModelMetadata, features: &[f32]) -> Result<Forecast> {
        self.validate(artifact, metadata)?;
        if features.len() != metadata.feature_count() {
            return Err(anyhow!(
                "feature vector length {} does not match model input width {}",
                features.len(),
                metadata.feature_count()
            ));
        }

        let width = metadata.feature_count() + 1;
        let mut values = Vec::with_capacity(metadata.horizon());
        for step in 0..metadata.horizon() {
            let row = step * width;
            let mut acc = Self::weight_at(artifact, row + width - 1); // bias
            for (j, feature) in features.iter().enumerate() {
                acc += Self::weight_at(artifact, row + j) * feature;
            }
            values.push(acc);
        }

        Ok(Forecast {
            values,
            confidence: Self::confidence_for(metadata),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::HashMap;

    fn meta(horizon: usize, features: &[&str]) -> ModelMetadata {
        ModelMetadata {
            version: "1.0.0".to_string(),
            created_at: Utc::now(),
            input_shape: vec![1, features.len()],
            output_shape: vec![1, horizon],
            features: features.iter().map(|f| f.to_string()).collect(),
            description: None,
            performance_metrics: HashMap::new(),
        }
    }

    /// Row-major weight matrix as artifact bytes.
    fn artifact(rows: &[Vec<f32>]) -> Bytes {
        let mut buf = Vec::new();
        for row in rows {
            for w in row {
                buf.extend_from_slice(&w.to_le_bytes());
            }
        }
        Bytes::from(buf)
    }

    #[test]
    fn test_validate_rejects_size_mismatch() {
        let runtime = LinearForecastRuntime;
        let m = meta(2, &["a", "b"]);
        let too_small = Bytes::from(vec![0u8; 8]);
        assert!(runtime.validate(&too_small, &m).is_err());
    }

    #[test]
    fn test_validate_rejects_empty_horizon() {
        let runtime = LinearForecastRuntime;
        let m = meta(0, &["a"]);
        assert!(runtime.validate(&Bytes::new(), &m).is_err());
    }

    #[test]
    fn test_forecast_is_affine_in_features() {
        let runtime = LinearForecastRuntime;
        let m = meta(2, &["a", "b"]);
        // y0 = 1*a + 2*b + 0.5, y1 = -1*a + 0*b + 1.0
        let art = artifact(&[vec![1.0, 2.0, 0.5], vec![-1.0, 0.0, 1.0]]);

        let out = runtime.forecast(&art, &m, &[3.0, 4.0]).unwrap();
        assert_eq!(out.values.len(), 2);
        assert!((out.values[0] - 11.5).abs() < f32::EPSILON);
        assert!((out.values[1] + 2.0).abs() < f32::EPSILON);
        assert_eq!(out.confidence, 0.9);
    }

    #[test]
    fn test_confidence_from_performance_metrics() {
        let runtime = LinearForecastRuntime;
        let mut m = meta(1, &["a"]);
        m.performance_metrics.insert("r2".to_string(), 0.73);
        let art = artifact(&[vec![1.0, 0.0]]);

        let out = runtime.forecast(&art, &m, &[1.0]).unwrap();
        assert!((out.confidence - 0.73).abs() < 1e-6);

        // Out-of-range metrics clamp into [0, 1]
        m.performance_metrics.insert("r2".to_string(), 1.7);
        let out = runtime.forecast(&art, &m, &[1.0]).unwrap();
        assert_eq!(out.confidence, 1.0);
    }

    #[test]
    fn test_forecast_rejects_wrong_feature_width() {
        let runtime = LinearForecastRuntime;
        let m = meta(1, &["a", "b"]);
        let art = artifact(&[vec![1.0, 1.0, 0.0]]);
        assert!(runtime.forecast(&art, &m, &[1.0]).is_err());
    }
}
