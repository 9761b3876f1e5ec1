// src/lib.rs
pub mod error;
pub mod features;
pub mod models;
pub mod prediction;
pub mod utils;

pub use error::{FieldError, PredictionError};
