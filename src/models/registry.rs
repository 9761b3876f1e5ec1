// src/models/registry.rs
use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

use crate::models::estimator::ModelArtifact;

pub const MODEL_FILE_EXTENSION: &str = "json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum ModelKind {
    /// Embeds its own preprocessing and takes the encoded vector directly.
    Pipeline,
    /// Needs the shared fitted preprocessor first.
    Standalone,
}

#[derive(Debug, Clone)]
pub struct ModelEntry {
    pub name: String,
    pub kind: ModelKind,
    pub supports_probability: bool,
    /// SHA-256 of the artifact bytes, hex encoded.
    pub fingerprint: String,
    pub artifact: ModelArtifact,
}

impl ModelEntry {
    pub fn from_bytes(name: String, bytes: &[u8]) -> Result<Self> {
        let artifact = ModelArtifact::from_slice(bytes)?;
        let kind = if artifact.preprocessing.is_some() {
            ModelKind::Pipeline
        } else {
            ModelKind::Standalone
        };
        Ok(Self {
            name,
            kind,
            supports_probability: artifact.estimator.supports_probability(),
            fingerprint: hex::encode(Sha256::digest(bytes)),
            artifact,
        })
    }
}

/// `logistic_regression.json` -> `Logistic Regression`.
///
/// Title-casing upper-cases a letter that follows a non-letter and lower-cases
/// every other letter, so `xgb_v2` becomes `Xgb V2`.
pub fn model_name_from_file(file_name: &str) -> String {
    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name);

    let mut name = String::with_capacity(stem.len());
    let mut prev_is_letter = false;
    for ch in stem.replace('_', " ").chars() {
        if ch.is_alphabetic() {
            if prev_is_letter {
                name.extend(ch.to_lowercase());
            } else {
                name.extend(ch.to_uppercase());
            }
            prev_is_letter = true;
        } else {
            name.push(ch);
            prev_is_letter = false;
        }
    }
    name
}

/// Models loaded once at startup, in deterministic (sorted file name) order.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    entries: Vec<ModelEntry>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry unless the name is already taken.
    pub fn insert(&mut self, entry: ModelEntry) -> bool {
        if self.get(&entry.name).is_some() {
            warn!(
                "Duplicate model name '{}' (fingerprint {}), keeping the first one loaded",
                entry.name,
                short_fingerprint(&entry.fingerprint)
            );
            return false;
        }
        self.entries.push(entry);
        true
    }

    /// Scans `dir` for model artifacts, skipping the designated preprocessor
    /// and metrics files. JSON documents without an `estimator` key (stray
    /// sidecars such as an old `metrics.json`) are skipped quietly. A model
    /// file that fails to load is logged as an error and left out.
    pub fn load_from_dir(dir: &Path, excluded_files: &[&str]) -> Result<Self> {
        let mut registry = Self::new();

        if !dir.is_dir() {
            warn!(
                "Models directory {} does not exist, registry is empty",
                dir.display()
            );
            return Ok(registry);
        }

        let mut candidates: Vec<PathBuf> = std::fs::read_dir(dir)
            .with_context(|| format!("Failed to list models directory {}", dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file())
            .filter(|path| {
                path.extension().and_then(|e| e.to_str()) == Some(MODEL_FILE_EXTENSION)
            })
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| !excluded_files.contains(&n))
                    .unwrap_or(false)
            })
            .collect();
        candidates.sort();

        for path in candidates {
            let file_name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_string();
            let name = model_name_from_file(&file_name);

            let bytes = match std::fs::read(&path) {
                Ok(bytes) => bytes,
                Err(e) => {
                    error!("Error reading model {} from {}: {}", name, file_name, e);
                    continue;
                }
            };
            if !is_model_document(&bytes) {
                debug!("Skipping {}: not a model artifact", file_name);
                continue;
            }

            match ModelEntry::from_bytes(name.clone(), &bytes) {
                Ok(entry) => {
                    info!(
                        "Loaded model: {} ({:?}, {}, probability: {}, sha256 {})",
                        entry.name,
                        entry.kind,
                        entry.artifact.estimator.name(),
                        entry.supports_probability,
                        short_fingerprint(&entry.fingerprint)
                    );
                    registry.insert(entry);
                }
                Err(e) => {
                    error!("Error loading model {} from {}: {:#}", name, file_name, e);
                }
            }
        }

        info!(
            "Total models loaded: {}. Models: {}",
            registry.len(),
            registry.names().collect::<Vec<_>>().join(", ")
        );
        Ok(registry)
    }

    pub fn get(&self, name: &str) -> Option<&ModelEntry> {
        self.entries.iter().find(|entry| entry.name == name)
    }

    /// Fallback used when the metrics table cannot pick a model.
    pub fn first(&self) -> Option<&ModelEntry> {
        let first = self.entries.first();
        debug!("Registry fallback entry: {:?}", first.map(|e| &e.name));
        first
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.name.as_str())
    }

    pub fn entries(&self) -> &[ModelEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// False only for well-formed JSON that has no `estimator` key. Unparseable
/// bytes still count so the load failure gets reported.
pub fn is_model_document(bytes: &[u8]) -> bool {
    match serde_json::from_slice::<serde_json::Value>(bytes) {
        Ok(value) => value.get("estimator").is_some(),
        Err(_) => true,
    }
}

pub fn short_fingerprint(fingerprint: &str) -> &str {
    &fingerprint[..fingerprint.len().min(12)]
}
