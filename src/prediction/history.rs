// src/prediction/history.rs
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::{debug, error, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::features::RAW_FEATURES;
use crate::prediction::context::PredictionContext;
use crate::prediction::predictor::{DiagnosisLabel, PredictionResult};

/// One line of the prediction log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionLogEntry {
    pub id: Uuid,
    pub user_id: Option<i64>,
    pub username: Option<String>,
    pub timestamp: DateTime<Utc>,
    /// Raw submitted strings, keyed by field name.
    pub inputs: BTreeMap<String, Option<String>>,
    pub model: String,
    pub model_fingerprint: Option<String>,
    pub prediction: DiagnosisLabel,
    pub probability: Option<f64>,
}

impl PredictionLogEntry {
    pub fn new(
        user_id: Option<i64>,
        username: Option<String>,
        form: &HashMap<String, String>,
        result: &PredictionResult,
        model_fingerprint: Option<String>,
    ) -> Self {
        let inputs = RAW_FEATURES
            .iter()
            .map(|feature| (feature.to_string(), form.get(*feature).cloned()))
            .collect();
        Self {
            id: Uuid::new_v4(),
            user_id,
            username,
            timestamp: Utc::now(),
            inputs,
            model: result.model_used.clone(),
            model_fingerprint,
            prediction: result.label,
            probability: result.probability,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PredictionStats {
    pub total_predictions: usize,
    pub diabetic_predictions: usize,
    pub non_diabetic_predictions: usize,
}

/// Append-only JSON Lines log. Writers are serialized through one mutex so
/// concurrent appends never interleave.
pub struct PredictionLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl PredictionLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn append(&self, entry: &PredictionLogEntry) -> Result<()> {
        let mut line =
            serde_json::to_string(entry).context("Failed to serialize prediction log entry")?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("Failed to open prediction log {}", self.path.display()))?;
        file.write_all(line.as_bytes())
            .await
            .context("Failed to append prediction log entry")?;
        file.flush().await?;
        debug!("Appended prediction {} to {}", entry.id, self.path.display());
        Ok(())
    }

    /// Records a completed prediction, tagging it with the model's artifact
    /// fingerprint. Failures are logged and swallowed: the prediction has
    /// already succeeded. Returns the entry when it was written.
    pub async fn record(
        &self,
        ctx: &PredictionContext,
        form: &HashMap<String, String>,
        result: &PredictionResult,
        user_id: Option<i64>,
        username: Option<String>,
    ) -> Option<PredictionLogEntry> {
        let fingerprint = ctx
            .registry()
            .get(&result.model_used)
            .map(|entry| entry.fingerprint.clone());
        let entry = PredictionLogEntry::new(user_id, username, form, result, fingerprint);
        match self.append(&entry).await {
            Ok(()) => Some(entry),
            Err(e) => {
                error!("Failed to record prediction: {:#}", e);
                None
            }
        }
    }

    /// All readable entries in file order. Missing file means no entries.
    pub async fn entries(&self) -> Result<Vec<PredictionLogEntry>> {
        let _guard = self.write_lock.lock().await;
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to read prediction log {}", self.path.display())
                })
            }
        };

        let mut entries = Vec::new();
        for (line_no, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<PredictionLogEntry>(line) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!(
                    "Skipping malformed prediction log line {} in {}: {}",
                    line_no + 1,
                    self.path.display(),
                    e
                ),
            }
        }
        Ok(entries)
    }

    pub async fn history_for_user(&self, user_id: i64) -> Result<Vec<PredictionLogEntry>> {
        Ok(self
            .entries()
            .await?
            .into_iter()
            .filter(|entry| entry.user_id == Some(user_id))
            .collect())
    }

    pub async fn stats_for_user(&self, user_id: i64) -> Result<PredictionStats> {
        let history = self.history_for_user(user_id).await?;
        let diabetic = history
            .iter()
            .filter(|entry| entry.prediction == DiagnosisLabel::Diabetic)
            .count();
        Ok(PredictionStats {
            total_predictions: history.len(),
            diabetic_predictions: diabetic,
            non_diabetic_predictions: history.len() - diabetic,
        })
    }
}
