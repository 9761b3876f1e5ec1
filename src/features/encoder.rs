// src/features/encoder.rs
use log::debug;
use ndarray::Array1;
use serde::Serialize;
use std::collections::HashMap;

use crate::features::categorize::{
    categorize_bmi, glucose_category, insulin_category, BmiCategory, GlucoseCategory,
    InsulinCategory,
};
use crate::features::observation::{RawObservation, RAW_FEATURES};

pub const ENCODED_FEATURE_COUNT: usize = 17;

/// Column layout the trained models expect, in order.
pub const EXPECTED_FEATURES: [&str; ENCODED_FEATURE_COUNT] = [
    "Pregnancies",
    "Glucose",
    "BloodPressure",
    "SkinThickness",
    "Insulin",
    "BMI",
    "DiabetesPedigreeFunction",
    "Age",
    // BMI_Category, drop-first
    "BMI_Category_Obesity1",
    "BMI_Category_Obesity2",
    "BMI_Category_Obesity3",
    "BMI_Category_Overweight",
    "BMI_Category_Underweight",
    // Insulin_Category, drop-first
    "Insulin_Category_Normal",
    // Glucose_Category, drop-first
    "Glucose_Category_Normal",
    "Glucose_Category_Overweight",
    "Glucose_Category_Secret",
];

// Indicator column produced for each category. `None` marks the dropped
// baseline (first declared category). A produced column that is not part of
// EXPECTED_FEATURES is discarded at selection time, exactly as the training
// scripts' column selection did: BMI "Normal" yields no surviving indicator
// and "BMI_Category_Underweight" is always zero-filled.
fn bmi_indicator(category: BmiCategory) -> Option<&'static str> {
    match category {
        BmiCategory::Underweight => None,
        BmiCategory::Normal => Some("BMI_Category_Normal"),
        BmiCategory::Overweight => Some("BMI_Category_Overweight"),
        BmiCategory::Obesity1 => Some("BMI_Category_Obesity1"),
        BmiCategory::Obesity2 => Some("BMI_Category_Obesity2"),
        BmiCategory::Obesity3 => Some("BMI_Category_Obesity3"),
    }
}

fn insulin_indicator(category: InsulinCategory) -> Option<&'static str> {
    match category {
        InsulinCategory::Abnormal => None,
        InsulinCategory::Normal => Some("Insulin_Category_Normal"),
    }
}

fn glucose_indicator(category: GlucoseCategory) -> Option<&'static str> {
    match category {
        GlucoseCategory::Low => None,
        GlucoseCategory::Normal => Some("Glucose_Category_Normal"),
        GlucoseCategory::Overweight => Some("Glucose_Category_Overweight"),
        GlucoseCategory::Secret => Some("Glucose_Category_Secret"),
    }
}

/// The three derived bins for one observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CategoricalBins {
    pub bmi: BmiCategory,
    pub insulin: InsulinCategory,
    pub glucose: GlucoseCategory,
}

impl CategoricalBins {
    pub fn from_observation(obs: &RawObservation) -> Self {
        Self {
            bmi: categorize_bmi(obs.bmi),
            insulin: insulin_category(obs.insulin),
            glucose: glucose_category(obs.glucose),
        }
    }
}

/// Fixed-width model input. Slot `i` always holds `EXPECTED_FEATURES[i]`.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedFeatureVector {
    values: [f64; ENCODED_FEATURE_COUNT],
}

impl EncodedFeatureVector {
    pub fn values(&self) -> &[f64; ENCODED_FEATURE_COUNT] {
        &self.values
    }

    pub fn get(&self, column: &str) -> Option<f64> {
        EXPECTED_FEATURES
            .iter()
            .position(|name| *name == column)
            .map(|idx| self.values[idx])
    }

    /// Column name / value pairs in schema order.
    pub fn named(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        EXPECTED_FEATURES.iter().copied().zip(self.values.iter().copied())
    }

    pub fn to_array(&self) -> Array1<f64> {
        Array1::from(self.values.to_vec())
    }
}

/// Encodes one observation into the 17-column schema.
pub fn encode(obs: &RawObservation) -> EncodedFeatureVector {
    let bins = CategoricalBins::from_observation(obs);

    // Raw columns plus whatever indicators the observation realises
    let mut columns: HashMap<&'static str, f64> = RAW_FEATURES
        .iter()
        .copied()
        .zip(obs.values().iter().copied())
        .collect();

    let indicators = [
        bmi_indicator(bins.bmi),
        insulin_indicator(bins.insulin),
        glucose_indicator(bins.glucose),
    ];
    for indicator in indicators.into_iter().flatten() {
        columns.insert(indicator, 1.0);
    }

    // Select the expected layout; absent indicator columns become zero.
    // Raw columns are always present because RawObservation cannot be partial.
    let mut values = [0.0; ENCODED_FEATURE_COUNT];
    for (slot, name) in EXPECTED_FEATURES.iter().enumerate() {
        values[slot] = columns.get(name).copied().unwrap_or(0.0);
    }

    debug!(
        "Encoded observation: bmi={:?} insulin={:?} glucose={:?}",
        bins.bmi, bins.insulin, bins.glucose
    );

    EncodedFeatureVector { values }
}
