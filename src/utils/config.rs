// src/utils/config.rs
use log::{debug, info, warn};
use std::env;
use std::path::PathBuf;

pub const DEFAULT_MODELS_DIR: &str = "models";
pub const DEFAULT_PREPROCESSOR_FILE: &str = "preprocessor.json";
pub const DEFAULT_METRICS_FILE: &str = "model_metrics.json";
pub const DEFAULT_PREDICTION_LOG_PATH: &str = "data/predictions.jsonl";

#[derive(Debug, Clone, PartialEq)]
pub struct PredictorConfig {
    pub models_dir: PathBuf,
    pub preprocessor_file: String,
    pub metrics_file: String,
    pub prediction_log_enabled: bool,
    pub prediction_log_path: PathBuf,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            models_dir: PathBuf::from(DEFAULT_MODELS_DIR),
            preprocessor_file: DEFAULT_PREPROCESSOR_FILE.to_string(),
            metrics_file: DEFAULT_METRICS_FILE.to_string(),
            prediction_log_enabled: true,
            prediction_log_path: PathBuf::from(DEFAULT_PREDICTION_LOG_PATH),
        }
    }
}

impl PredictorConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let prediction_log_enabled = non_empty("PREDICTION_LOG_ENABLED")
            .map(|v| match v.to_lowercase().parse::<bool>() {
                Ok(flag) => flag,
                Err(_) => {
                    warn!(
                        "PREDICTION_LOG_ENABLED='{}' is not a boolean, using {}",
                        v, defaults.prediction_log_enabled
                    );
                    defaults.prediction_log_enabled
                }
            })
            .unwrap_or(defaults.prediction_log_enabled);

        let config = Self {
            models_dir: non_empty("MODELS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.models_dir),
            preprocessor_file: non_empty("PREPROCESSOR_FILE").unwrap_or(defaults.preprocessor_file),
            metrics_file: non_empty("METRICS_FILE").unwrap_or(defaults.metrics_file),
            prediction_log_enabled,
            prediction_log_path: non_empty("PREDICTION_LOG_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.prediction_log_path),
        };
        debug!("Predictor config: {:?}", config);
        config
    }

    pub fn preprocessor_path(&self) -> PathBuf {
        self.models_dir.join(&self.preprocessor_file)
    }

    pub fn metrics_path(&self) -> PathBuf {
        self.models_dir.join(&self.metrics_file)
    }

    /// Files in the models directory that are not models.
    pub fn reserved_files(&self) -> [&str; 2] {
        [self.preprocessor_file.as_str(), self.metrics_file.as_str()]
    }

    pub fn log_config(&self) {
        info!("🧪 Models directory: {}", self.models_dir.display());
        info!("   Preprocessor: {}", self.preprocessor_path().display());
        info!("   Metrics: {}", self.metrics_path().display());
        if self.prediction_log_enabled {
            info!(
                "📝 Prediction log ENABLED at {}",
                self.prediction_log_path.display()
            );
        } else {
            info!("📝 Prediction log DISABLED");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = PredictorConfig::from_lookup(|_| None);
        assert_eq!(config, PredictorConfig::default());
        assert_eq!(config.metrics_path(), PathBuf::from("models/model_metrics.json"));
        assert_eq!(config.preprocessor_path(), PathBuf::from("models/preprocessor.json"));
        assert!(config.prediction_log_enabled);
    }

    #[test]
    fn test_lookup_config() {
        let vars: HashMap<&str, &str> = [
            ("MODELS_DIR", "/srv/models"),
            ("PREPROCESSOR_FILE", "scaler.json"),
            ("METRICS_FILE", " "),
            ("PREDICTION_LOG_ENABLED", "FALSE"),
            ("PREDICTION_LOG_PATH", "/var/log/predictions.jsonl"),
        ]
        .into_iter()
        .collect();

        let config = PredictorConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()));
        assert_eq!(config.models_dir, PathBuf::from("/srv/models"));
        assert_eq!(config.preprocessor_path(), PathBuf::from("/srv/models/scaler.json"));
        // Blank values fall back to the default
        assert_eq!(config.metrics_file, DEFAULT_METRICS_FILE);
        assert!(!config.prediction_log_enabled);
        assert_eq!(config.reserved_files(), ["scaler.json", "model_metrics.json"]);
    }

    #[test]
    fn test_bad_boolean_keeps_default() {
        let config = PredictorConfig::from_lookup(|key| {
            (key == "PREDICTION_LOG_ENABLED").then(|| "sometimes".to_string())
        });
        assert!(config.prediction_log_enabled);
    }
}
