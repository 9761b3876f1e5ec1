// src/features/mod.rs
//! Raw measurement parsing, clinical binning and the fixed one-hot schema.

pub mod categorize;
pub mod encoder;
pub mod observation;

pub use categorize::{
    categorize_bmi, glucose_category, insulin_category, BmiCategory, GlucoseCategory,
    InsulinCategory,
};
pub use encoder::{encode, CategoricalBins, EncodedFeatureVector, ENCODED_FEATURE_COUNT, EXPECTED_FEATURES};
pub use observation::{RawObservation, RAW_FEATURES};
