use serde::Deserialize;

// ============================================================================
// REQUEST INPUT
// ============================================================================

// Fields arrive as the transport delivered them. Defaults keep missing
// fields inside the pipeline's own error handling instead of failing
// deserialization.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawInputRecord {
    #[serde(default)]
    pub age: String,
    #[serde(default)]
    pub gender: String,
    #[serde(default)]
    pub smoking: String,
    #[serde(default)]
    pub alcohol: String,
    #[serde(default)]
    pub ecg: String,
    #[serde(default)]
    pub spo2: String,
    #[serde(default)]
    pub bp: String,
    #[serde(default)]
    pub use_iot: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReading {
    pub heart_rate: f64,
    pub spo2: f64,
}

// ============================================================================
// PIPELINE OUTCOMES
// ============================================================================

/// Result of parsing a "systolic/diastolic" string. Malformed input is
/// not an error: it resolves to the fixed fallback pair, and the variant
/// keeps the two cases distinguishable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BloodPressure {
    Measured { systolic: f64, diastolic: f64 },
    Defaulted,
}

impl BloodPressure {
    pub fn systolic(&self) -> f64 {
        match self {
            BloodPressure::Measured { systolic, .. } => *systolic,
            BloodPressure::Defaulted => 120.0,
        }
    }

    pub fn diastolic(&self) -> f64 {
        match self {
            BloodPressure::Measured { diastolic, .. } => *diastolic,
            BloodPressure::Defaulted => 80.0,
        }
    }

    pub fn is_defaulted(&self) -> bool {
        matches!(self, BloodPressure::Defaulted)
    }
}

/// Result of encoding one categorical value. Values outside the trained
/// domain take the code of the encoder's first known class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoded {
    Trained(usize),
    Substituted(usize),
}

impl Encoded {
    pub fn code(&self) -> usize {
        match self {
            Encoded::Trained(code) | Encoded::Substituted(code) => *code,
        }
    }

    pub fn is_substituted(&self) -> bool {
        matches!(self, Encoded::Substituted(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskLabel {
    High,
    Low,
}

impl RiskLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLabel::High => "High Risk",
            RiskLabel::Low => "Low Risk",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub label: RiskLabel,
    /// Positive-class probability as a percentage, rounded to two decimals.
    pub probability: f64,
    /// Schema columns whose raw value was outside the encoder domain.
    pub substituted: Vec<String>,
    pub bp_defaulted: bool,
}

// ============================================================================
// FAILURES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PredictError {
    MissingField(&'static str),
    InvalidNumber { field: &'static str, value: String },
}

impl std::fmt::Display for PredictError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PredictError::MissingField(field) => write!(f, "{} is required", field),
            PredictError::InvalidNumber { field, value } => {
                write!(f, "{} must be numeric, got '{}'", field, value)
            }
        }
    }
}

impl std::error::Error for PredictError {}
