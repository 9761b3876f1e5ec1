// src/features/observation.rs
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{FieldError, PredictionError};

/// Raw clinical measurements in the order the models were trained on.
pub const RAW_FEATURES: [&str; 8] = [
    "Pregnancies",
    "Glucose",
    "BloodPressure",
    "SkinThickness",
    "Insulin",
    "BMI",
    "DiabetesPedigreeFunction",
    "Age",
];

/// One patient's eight raw measurements. All fields are required; there is no
/// defaulting of a missing value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawObservation {
    pub pregnancies: f64,
    pub glucose: f64,
    pub blood_pressure: f64,
    pub skin_thickness: f64,
    pub insulin: f64,
    #[serde(rename = "BMI")]
    pub bmi: f64,
    pub diabetes_pedigree_function: f64,
    pub age: f64,
}

impl RawObservation {
    /// Values in `RAW_FEATURES` order.
    pub fn values(&self) -> [f64; 8] {
        [
            self.pregnancies,
            self.glucose,
            self.blood_pressure,
            self.skin_thickness,
            self.insulin,
            self.bmi,
            self.diabetes_pedigree_function,
            self.age,
        ]
    }

    /// Parses the eight fields out of a form-style string map.
    ///
    /// Every invalid field is reported, in `RAW_FEATURES` order, so the caller
    /// can show all problems at once. Nothing is scored on failure.
    pub fn from_form(form: &HashMap<String, String>) -> Result<Self, PredictionError> {
        let mut values = [0.0f64; 8];
        let mut errors = Vec::new();

        for (slot, feature) in RAW_FEATURES.iter().enumerate() {
            match form.get(*feature) {
                None => errors.push(FieldError::missing(feature)),
                Some(raw) => match parse_field(feature, raw) {
                    Ok(value) => values[slot] = value,
                    Err(e) => errors.push(e),
                },
            }
        }

        if !errors.is_empty() {
            return Err(PredictionError::Validation(errors));
        }

        Ok(Self {
            pregnancies: values[0],
            glucose: values[1],
            blood_pressure: values[2],
            skin_thickness: values[3],
            insulin: values[4],
            bmi: values[5],
            diabetes_pedigree_function: values[6],
            age: values[7],
        })
    }
}

fn parse_field(feature: &str, raw: &str) -> Result<f64, FieldError> {
    let trimmed = raw.trim();
    let value = trimmed
        .parse::<f64>()
        .map_err(|_| FieldError::invalid(feature, format!("'{}' is not a number", trimmed)))?;

    if !value.is_finite() {
        return Err(FieldError::invalid(
            feature,
            format!("'{}' is not a finite number", trimmed),
        ));
    }

    if feature == "Pregnancies" && (value < 0.0 || value.fract() != 0.0) {
        return Err(FieldError::invalid(
            feature,
            format!("'{}' must be a non-negative whole number", trimmed),
        ));
    }

    Ok(value)
}
