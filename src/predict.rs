use std::sync::Arc;

use crate::artifacts::ArtifactStore;
use crate::types::{
    BloodPressure, Encoded, PredictError, Prediction, RawInputRecord, RiskLabel, SensorReading,
};

/// One raw request, parsed and defaulted. `heart_rate` exists only when a
/// device reading was taken; without one the schema column stays at its
/// zero default.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRecord {
    pub age: f64,
    pub gender: String,
    pub smoking: String,
    pub alcohol: String,
    pub ecg: String,
    pub spo2: f64,
    pub blood_pressure: BloodPressure,
    pub heart_rate: Option<f64>,
}

impl NormalizedRecord {
    pub fn from_raw(
        raw: &RawInputRecord,
        reading: Option<SensorReading>,
    ) -> Result<Self, PredictError> {
        let age = parse_required_number("age", &raw.age)?;

        // A device reading overrides the form SpO2 unconditionally; the
        // form value is only required when there is no reading.
        let spo2 = match reading {
            Some(reading) => reading.spo2,
            None => parse_required_number("spo2", &raw.spo2)?,
        };

        Ok(NormalizedRecord {
            age,
            gender: raw.gender.trim().to_string(),
            smoking: raw.smoking.trim().to_string(),
            alcohol: raw.alcohol.trim().to_string(),
            ecg: raw.ecg.trim().to_string(),
            spo2,
            blood_pressure: parse_blood_pressure(&raw.bp),
            heart_rate: reading.map(|reading| reading.heart_rate),
        })
    }
}

/// Splits "systolic/diastolic". Anything other than exactly two numeric
/// parts resolves to the fixed (120.0, 80.0) fallback pair instead of
/// failing the request.
pub fn parse_blood_pressure(value: &str) -> BloodPressure {
    let parts: Vec<&str> = value.split('/').collect();
    if parts.len() != 2 {
        return BloodPressure::Defaulted;
    }

    match (
        parts[0].trim().parse::<f64>(),
        parts[1].trim().parse::<f64>(),
    ) {
        (Ok(systolic), Ok(diastolic)) => BloodPressure::Measured {
            systolic,
            diastolic,
        },
        _ => BloodPressure::Defaulted,
    }
}

fn parse_required_number(field: &'static str, value: &str) -> Result<f64, PredictError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(PredictError::MissingField(field));
    }
    trimmed.parse::<f64>().map_err(|_| PredictError::InvalidNumber {
        field,
        value: trimmed.to_string(),
    })
}

#[derive(Debug, Clone, PartialEq)]
enum Cell {
    Number(f64),
    Category(String),
}

fn assignments(record: &NormalizedRecord) -> Vec<(&'static str, Cell)> {
    let mut cells = vec![
        ("Age", Cell::Number(record.age)),
        ("Gender", Cell::Category(record.gender.clone())),
        ("Smoking Status", Cell::Category(record.smoking.clone())),
        (
            "Alcohol Consumption",
            Cell::Category(record.alcohol.clone()),
        ),
        ("ECG Results", Cell::Category(record.ecg.clone())),
        (
            "Blood Oxygen Levels (SpO2%)",
            Cell::Number(record.spo2),
        ),
        ("BP_Systolic", Cell::Number(record.blood_pressure.systolic())),
        (
            "BP_Diastolic",
            Cell::Number(record.blood_pressure.diastolic()),
        ),
    ];

    if let Some(heart_rate) = record.heart_rate {
        cells.push(("Heart Rate", Cell::Number(heart_rate)));
    }

    cells
}

/// Assembles the schema-ordered vector. Columns the record does not
/// provide stay 0.0. Columns with an encoder carry the category's code;
/// any value outside the trained domain (including a numeric or absent
/// cell) takes the first class's code.
pub fn build_vector(
    artifacts: &ArtifactStore,
    record: &NormalizedRecord,
) -> (Vec<f64>, Vec<String>) {
    let features = artifacts.model_features();
    let cells = assignments(record);
    let mut vector = vec![0.0; features.len()];
    let mut substituted = Vec::new();

    for (index, feature) in features.iter().enumerate() {
        let cell = cells
            .iter()
            .find(|(name, _)| *name == feature.as_str())
            .map(|(_, cell)| cell);

        match artifacts.encoders.get(feature.as_str()) {
            Some(encoder) => {
                let outcome = match cell {
                    Some(Cell::Category(value)) => encoder.encode(value),
                    _ => Encoded::Substituted(0),
                };
                if outcome.is_substituted() {
                    substituted.push(feature.clone());
                }
                vector[index] = outcome.code() as f64;
            }
            None => {
                if let Some(Cell::Number(value)) = cell {
                    vector[index] = *value;
                }
            }
        }
    }

    (vector, substituted)
}

pub fn classify(probability: f64, threshold: f64) -> RiskLabel {
    if probability >= threshold {
        RiskLabel::High
    } else {
        RiskLabel::Low
    }
}

fn to_percent(probability: f64) -> f64 {
    (probability * 10_000.0).round() / 100.0
}

pub struct PredictionEngine {
    artifacts: Arc<ArtifactStore>,
}

impl PredictionEngine {
    pub fn new(artifacts: Arc<ArtifactStore>) -> Self {
        Self { artifacts }
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    pub fn evaluate(
        &self,
        raw: &RawInputRecord,
        reading: Option<SensorReading>,
    ) -> Result<Prediction, PredictError> {
        let record = NormalizedRecord::from_raw(raw, reading)?;
        Ok(self.evaluate_record(&record))
    }

    pub fn evaluate_record(&self, record: &NormalizedRecord) -> Prediction {
        let (vector, substituted) = build_vector(&self.artifacts, record);
        if !substituted.is_empty() {
            println!(
                "[PIPELINE] Unknown categories substituted: {}",
                substituted.join(", ")
            );
        }
        if record.blood_pressure.is_defaulted() {
            println!("[PIPELINE] Malformed blood pressure, using 120/80 fallback");
        }

        let scaled = self.artifacts.scaler.transform(&vector);
        let probability = self.artifacts.classifier.predict_proba(&scaled);

        Prediction {
            label: classify(probability, self.artifacts.threshold),
            probability: to_percent(probability),
            substituted,
            bp_defaulted: record.blood_pressure.is_defaulted(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::{ClassifierArtifact, LabelEncoder, ScalerArtifact};
    use std::collections::HashMap;

    const FEATURES: [&str; 9] = [
        "Age",
        "Gender",
        "Smoking Status",
        "Alcohol Consumption",
        "ECG Results",
        "Blood Oxygen Levels (SpO2%)",
        "BP_Systolic",
        "BP_Diastolic",
        "Heart Rate",
    ];

    fn encoder(classes: &[&str]) -> LabelEncoder {
        LabelEncoder {
            classes: classes.iter().map(|class| class.to_string()).collect(),
        }
    }

    // Identity scaler, so vector assertions read off raw values; the bias
    // alone fixes the probability when all weights are zero.
    fn stub_store(bias: f64, threshold: f64) -> Arc<ArtifactStore> {
        let features = FEATURES.iter().map(|name| name.to_string()).collect();
        let mut encoders = HashMap::new();
        encoders.insert("Gender".to_string(), encoder(&["Female", "Male"]));
        encoders.insert("Smoking Status".to_string(), encoder(&["No", "Yes"]));
        encoders.insert("Alcohol Consumption".to_string(), encoder(&["No", "Yes"]));
        encoders.insert(
            "ECG Results".to_string(),
            encoder(&["Abnormal", "Normal", "ST-T Abnormality"]),
        );

        Arc::new(ArtifactStore {
            classifier: ClassifierArtifact {
                features,
                bias,
                weights: vec![0.0; FEATURES.len()],
            },
            scaler: ScalerArtifact {
                mean: vec![0.0; FEATURES.len()],
                scale: vec![1.0; FEATURES.len()],
            },
            encoders,
            threshold,
        })
    }

    fn sample_record() -> RawInputRecord {
        RawInputRecord {
            age: "54".to_string(),
            gender: "Male".to_string(),
            smoking: "Yes".to_string(),
            alcohol: "No".to_string(),
            ecg: "Normal".to_string(),
            spo2: "96.0".to_string(),
            bp: "130/85".to_string(),
            use_iot: false,
        }
    }

    #[test]
    fn parses_valid_blood_pressure() {
        assert_eq!(
            parse_blood_pressure("130/85"),
            BloodPressure::Measured {
                systolic: 130.0,
                diastolic: 85.0
            }
        );
        assert_eq!(
            parse_blood_pressure(" 118 / 76.5 "),
            BloodPressure::Measured {
                systolic: 118.0,
                diastolic: 76.5
            }
        );
    }

    #[test]
    fn malformed_blood_pressure_defaults() {
        for input in ["", "130", "130/85/60", "abc/85", "130/xyz", "not-a-number", "/"] {
            let parsed = parse_blood_pressure(input);
            assert_eq!(parsed, BloodPressure::Defaulted, "input {:?}", input);
            assert_eq!(parsed.systolic(), 120.0);
            assert_eq!(parsed.diastolic(), 80.0);
        }
    }

    #[test]
    fn missing_age_is_an_error() {
        let mut raw = sample_record();
        raw.age = "  ".to_string();
        let error = NormalizedRecord::from_raw(&raw, None).unwrap_err();
        assert_eq!(error, PredictError::MissingField("age"));
    }

    #[test]
    fn non_numeric_spo2_is_an_error() {
        let mut raw = sample_record();
        raw.spo2 = "ninety-six".to_string();
        let error = NormalizedRecord::from_raw(&raw, None).unwrap_err();
        assert_eq!(
            error,
            PredictError::InvalidNumber {
                field: "spo2",
                value: "ninety-six".to_string()
            }
        );
    }

    #[test]
    fn device_reading_overrides_spo2_even_when_form_value_is_bad() {
        let mut raw = sample_record();
        raw.spo2 = String::new();
        let reading = SensorReading {
            heart_rate: 72.0,
            spo2: 97.5,
        };

        let record = NormalizedRecord::from_raw(&raw, Some(reading)).unwrap();
        assert_eq!(record.spo2, 97.5);
        assert_eq!(record.heart_rate, Some(72.0));
    }

    #[test]
    fn vector_follows_schema_order() {
        let store = stub_store(0.0, 0.5);
        let record = NormalizedRecord::from_raw(&sample_record(), None).unwrap();
        let (vector, substituted) = build_vector(&store, &record);

        // Age, Gender=Male(1), Smoking=Yes(1), Alcohol=No(0), ECG=Normal(1),
        // SpO2, BP, Heart Rate unset.
        assert_eq!(vector, vec![54.0, 1.0, 1.0, 0.0, 1.0, 96.0, 130.0, 85.0, 0.0]);
        assert!(substituted.is_empty());
    }

    #[test]
    fn malformed_bp_lands_as_fallback_pair_in_vector() {
        let store = stub_store(0.0, 0.5);
        let mut raw = sample_record();
        raw.bp = "not-a-number".to_string();
        let record = NormalizedRecord::from_raw(&raw, None).unwrap();
        let (vector, _) = build_vector(&store, &record);

        assert_eq!(vector[6], 120.0);
        assert_eq!(vector[7], 80.0);
    }

    #[test]
    fn unknown_category_takes_first_class_code() {
        let store = stub_store(0.0, 0.5);
        let mut raw = sample_record();
        raw.gender = "Other".to_string();
        let record = NormalizedRecord::from_raw(&raw, None).unwrap();
        let (vector, substituted) = build_vector(&store, &record);

        assert_eq!(vector[1], 0.0);
        assert_eq!(substituted, vec!["Gender".to_string()]);

        // Indistinguishable from the first trained class in the vector
        // itself; only the outcome list tells them apart.
        let mut first_class = sample_record();
        first_class.gender = "Female".to_string();
        let record = NormalizedRecord::from_raw(&first_class, None).unwrap();
        let (expected, substituted) = build_vector(&store, &record);
        assert_eq!(vector, expected);
        assert!(substituted.is_empty());
    }

    #[test]
    fn device_reading_fills_heart_rate_column() {
        let store = stub_store(0.0, 0.5);
        let reading = SensorReading {
            heart_rate: 72.0,
            spo2: 97.5,
        };
        let record = NormalizedRecord::from_raw(&sample_record(), Some(reading)).unwrap();
        let (vector, _) = build_vector(&store, &record);

        assert_eq!(vector[5], 97.5);
        assert_eq!(vector[8], 72.0);
    }

    #[test]
    fn threshold_is_a_closed_lower_bound() {
        assert_eq!(classify(0.5, 0.5), RiskLabel::High);
        assert_eq!(classify(0.500001, 0.5), RiskLabel::High);
        assert_eq!(classify(0.499999, 0.5), RiskLabel::Low);
        assert_eq!(classify(0.35, 0.35), RiskLabel::High);
    }

    #[test]
    fn end_to_end_high_risk_at_stub_probability() {
        // bias = logit(0.82) with zero weights pins predict_proba at 0.82.
        let store = stub_store((0.82_f64 / 0.18).ln(), 0.5);
        let engine = PredictionEngine::new(store);

        let prediction = engine.evaluate(&sample_record(), None).unwrap();
        assert_eq!(prediction.label, RiskLabel::High);
        assert_eq!(prediction.probability, 82.0);
        assert!(!prediction.bp_defaulted);
    }

    #[test]
    fn end_to_end_low_risk_below_threshold() {
        let store = stub_store((0.2_f64 / 0.8).ln(), 0.5);
        let engine = PredictionEngine::new(store);

        let prediction = engine.evaluate(&sample_record(), None).unwrap();
        assert_eq!(prediction.label, RiskLabel::Low);
        assert_eq!(prediction.probability, 20.0);
    }

    #[test]
    fn evaluation_is_idempotent() {
        let store = stub_store(0.3, 0.5);
        let engine = PredictionEngine::new(store);

        let first = engine.evaluate(&sample_record(), None).unwrap();
        let second = engine.evaluate(&sample_record(), None).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn opt_in_without_a_reading_matches_the_plain_path() {
        // A failed feed fetch reaches the pipeline as `None`, so the result
        // must equal the non-opt-in evaluation with the form SpO2.
        let store = stub_store(0.3, 0.5);
        let engine = PredictionEngine::new(store);

        let mut opted_in = sample_record();
        opted_in.use_iot = true;

        let with_fallback = engine.evaluate(&opted_in, None).unwrap();
        let plain = engine.evaluate(&sample_record(), None).unwrap();
        assert_eq!(with_fallback, plain);
    }

    #[test]
    fn defaulted_bp_is_reported_on_the_prediction() {
        let store = stub_store(0.3, 0.5);
        let engine = PredictionEngine::new(store);

        let mut raw = sample_record();
        raw.bp = "120-80".to_string();
        let prediction = engine.evaluate(&raw, None).unwrap();
        assert!(prediction.bp_defaulted);
    }
}
