// src/features/categorize.rs
//! Clinical binning of raw measurements.
//!
//! These thresholds were used to label the training data, so they must stay
//! bit-for-bit identical to the offline scripts. Boundary values belong to the
//! lower band.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BmiCategory {
    Underweight,
    Normal,
    Overweight,
    Obesity1,
    Obesity2,
    Obesity3,
}

impl BmiCategory {
    /// Declared category order. The first entry is the dropped baseline.
    pub const ORDERED: [BmiCategory; 6] = [
        BmiCategory::Underweight,
        BmiCategory::Normal,
        BmiCategory::Overweight,
        BmiCategory::Obesity1,
        BmiCategory::Obesity2,
        BmiCategory::Obesity3,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BmiCategory::Underweight => "Underweight",
            BmiCategory::Normal => "Normal",
            BmiCategory::Overweight => "Overweight",
            BmiCategory::Obesity1 => "Obesity1",
            BmiCategory::Obesity2 => "Obesity2",
            BmiCategory::Obesity3 => "Obesity3",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum InsulinCategory {
    Abnormal,
    Normal,
}

impl InsulinCategory {
    pub const ORDERED: [InsulinCategory; 2] = [InsulinCategory::Abnormal, InsulinCategory::Normal];

    pub fn as_str(&self) -> &'static str {
        match self {
            InsulinCategory::Abnormal => "Abnormal",
            InsulinCategory::Normal => "Normal",
        }
    }
}

/// Glucose bands. `Secret` is the historical label of the highest band and is
/// part of the trained column names, so it is kept verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GlucoseCategory {
    Low,
    Normal,
    Overweight,
    Secret,
}

impl GlucoseCategory {
    pub const ORDERED: [GlucoseCategory; 4] = [
        GlucoseCategory::Low,
        GlucoseCategory::Normal,
        GlucoseCategory::Overweight,
        GlucoseCategory::Secret,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GlucoseCategory::Low => "Low",
            GlucoseCategory::Normal => "Normal",
            GlucoseCategory::Overweight => "Overweight",
            GlucoseCategory::Secret => "Secret",
        }
    }
}

pub fn categorize_bmi(bmi: f64) -> BmiCategory {
    if bmi < 18.5 {
        BmiCategory::Underweight
    } else if bmi <= 24.9 {
        BmiCategory::Normal
    } else if bmi <= 29.9 {
        BmiCategory::Overweight
    } else if bmi <= 34.9 {
        BmiCategory::Obesity1
    } else if bmi <= 39.9 {
        BmiCategory::Obesity2
    } else {
        BmiCategory::Obesity3
    }
}

pub fn insulin_category(insulin: f64) -> InsulinCategory {
    if (16.0..=166.0).contains(&insulin) {
        InsulinCategory::Normal
    } else {
        InsulinCategory::Abnormal
    }
}

pub fn glucose_category(glucose: f64) -> GlucoseCategory {
    if glucose <= 70.0 {
        GlucoseCategory::Low
    } else if glucose <= 99.0 {
        GlucoseCategory::Normal
    } else if glucose <= 126.0 {
        GlucoseCategory::Overweight
    } else {
        GlucoseCategory::Secret
    }
}
