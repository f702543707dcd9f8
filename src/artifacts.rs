use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::types::Encoded;

/// Logistic classifier produced by offline training. `features` is the
/// ordered schema every request vector must conform to; `weights` is
/// aligned to it 1:1.
#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierArtifact {
    pub features: Vec<String>,
    pub bias: f64,
    pub weights: Vec<f64>,
}

impl ClassifierArtifact {
    pub fn predict_proba(&self, vector: &[f64]) -> f64 {
        let mut total = self.bias;
        for (weight, value) in self.weights.iter().zip(vector) {
            total += weight * value;
        }
        sigmoid(total)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScalerArtifact {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl ScalerArtifact {
    pub fn transform(&self, vector: &[f64]) -> Vec<f64> {
        vector
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(value, (mean, scale))| (value - mean) / scale)
            .collect()
    }
}

/// Per-column category table fixed at training time. A class's code is
/// its index; the fallback code for unseen values is index 0.
#[derive(Debug, Clone, Deserialize)]
pub struct LabelEncoder {
    pub classes: Vec<String>,
}

impl LabelEncoder {
    pub fn encode(&self, value: &str) -> Encoded {
        match self.classes.iter().position(|class| class == value) {
            Some(code) => Encoded::Trained(code),
            None => Encoded::Substituted(0),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ThresholdArtifact {
    threshold: f64,
}

/// Everything offline training produced, loaded once at startup and
/// read-only afterwards.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    pub classifier: ClassifierArtifact,
    pub scaler: ScalerArtifact,
    pub encoders: HashMap<String, LabelEncoder>,
    pub threshold: f64,
}

impl ArtifactStore {
    pub fn load(models_dir: &Path) -> Result<Self, String> {
        let classifier: ClassifierArtifact = load_json(&models_dir.join("classifier.json"))?;
        if classifier.features.is_empty() {
            return Err("classifier has no features".to_string());
        }
        if classifier.weights.len() != classifier.features.len() {
            return Err(format!(
                "classifier has {} weights for {} features",
                classifier.weights.len(),
                classifier.features.len()
            ));
        }

        let scaler: ScalerArtifact = load_json(&models_dir.join("scaler.json"))?;
        if scaler.mean.len() != classifier.features.len()
            || scaler.scale.len() != classifier.features.len()
        {
            return Err(format!(
                "scaler covers {} mean / {} scale columns for {} features",
                scaler.mean.len(),
                scaler.scale.len(),
                classifier.features.len()
            ));
        }
        if let Some(index) = scaler.scale.iter().position(|scale| *scale == 0.0) {
            return Err(format!(
                "scaler has zero scale for column '{}'",
                classifier.features[index]
            ));
        }

        let encoders: HashMap<String, LabelEncoder> =
            load_json(&models_dir.join("encoders.json"))?;
        for (column, encoder) in &encoders {
            if encoder.classes.is_empty() {
                return Err(format!("encoder for column '{}' has no classes", column));
            }
        }

        let threshold: ThresholdArtifact = load_json(&models_dir.join("threshold.json"))?;
        if !(0.0..=1.0).contains(&threshold.threshold) {
            return Err(format!(
                "threshold {} is outside [0, 1]",
                threshold.threshold
            ));
        }

        Ok(ArtifactStore {
            classifier,
            scaler,
            encoders,
            threshold: threshold.threshold,
        })
    }

    pub fn model_features(&self) -> &[String] {
        &self.classifier.features
    }
}

fn load_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, String> {
    let data = std::fs::read(path).map_err(|error| format!("{}: {}", path.display(), error))?;
    serde_json::from_slice(&data).map_err(|error| format!("{}: {}", path.display(), error))
}

fn sigmoid(value: f64) -> f64 {
    1.0 / (1.0 + (-value).exp())
}
