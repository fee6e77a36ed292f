//! Ensemble persistence as JSON documents keyed by (model, dataset).

use std::path::{Path, PathBuf};

use stablab_core::ModelKey;
use thiserror::Error;
use tracing::info;

use crate::ensemble::{Ensemble, SCHEMA_VERSION};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no stored ensemble for {key} on '{dataset}' at '{path}'")]
    EnsembleNotFound {
        key: ModelKey,
        dataset: String,
        path: PathBuf,
    },
    #[error("stored ensemble '{path}' is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("unsupported schema version {found} in '{path}' (max supported: {supported})")]
    UnsupportedSchema {
        path: PathBuf,
        found: u32,
        supported: u32,
    },
    #[error("stored ensemble '{path}' holds {found_key} on '{found_dataset}', expected {key} on '{dataset}'")]
    Mismatch {
        path: PathBuf,
        key: ModelKey,
        dataset: String,
        found_key: ModelKey,
        found_dataset: String,
    },
    #[error("failed to serialize ensemble: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// File location of the ensemble for `(key, dataset)` under `dir`.
pub fn ensemble_path(dir: &Path, key: &ModelKey, dataset: &str) -> PathBuf {
    dir.join(format!("{}_{}.json", key.slug(), dataset))
}

/// Write `ensemble` under `dir`, creating the directory. Overwrites any
/// previous ensemble with the same key.
pub fn store(ensemble: &Ensemble, dir: &Path) -> Result<PathBuf, StoreError> {
    std::fs::create_dir_all(dir).map_err(|source| StoreError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let path = ensemble_path(dir, &ensemble.model_key, &ensemble.dataset_name);
    let json = serde_json::to_string(ensemble).map_err(StoreError::Serialize)?;
    std::fs::write(&path, json).map_err(|source| StoreError::Io {
        path: path.clone(),
        source,
    })?;
    info!(path = %path.display(), instances = ensemble.len(), "stored ensemble");
    Ok(path)
}

/// Load the ensemble stored for `(key, dataset)` under `dir`.
pub fn load(key: &ModelKey, dataset: &str, dir: &Path) -> Result<Ensemble, StoreError> {
    let path = ensemble_path(dir, key, dataset);
    if !path.is_file() {
        return Err(StoreError::EnsembleNotFound {
            key: *key,
            dataset: dataset.to_string(),
            path,
        });
    }
    let json = std::fs::read_to_string(&path).map_err(|source| StoreError::Io {
        path: path.clone(),
        source,
    })?;

    // Check the version before the full parse so a newer layout is reported
    // as such instead of as corruption.
    let header: SchemaHeader = serde_json::from_str(&json).map_err(|source| StoreError::Corrupt {
        path: path.clone(),
        source,
    })?;
    if header.schema_version > SCHEMA_VERSION {
        return Err(StoreError::UnsupportedSchema {
            path,
            found: header.schema_version,
            supported: SCHEMA_VERSION,
        });
    }

    let ensemble: Ensemble = serde_json::from_str(&json).map_err(|source| StoreError::Corrupt {
        path: path.clone(),
        source,
    })?;
    if ensemble.model_key != *key || ensemble.dataset_name != dataset {
        return Err(StoreError::Mismatch {
            path,
            key: *key,
            dataset: dataset.to_string(),
            found_key: ensemble.model_key,
            found_dataset: ensemble.dataset_name,
        });
    }
    info!(path = %path.display(), instances = ensemble.len(), "loaded ensemble");
    Ok(ensemble)
}

#[derive(serde::Deserialize)]
struct SchemaHeader {
    schema_version: u32,
}
