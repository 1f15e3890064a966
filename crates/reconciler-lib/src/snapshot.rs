//! Telemetry snapshot reader
//!
//! Reads the JSON documents the kernel telemetry module exposes under
//! `/proc`. Each read loads the whole file; nothing is cached between
//! cycles.

use crate::error::{ReconcileError, Result};
use crate::models::{ContainerSnapshot, SystemSnapshot};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Reader for the system and container telemetry files
#[derive(Debug, Clone)]
pub struct SnapshotReader {
    system_path: PathBuf,
    container_path: PathBuf,
}

impl SnapshotReader {
    pub fn new(system_path: impl Into<PathBuf>, container_path: impl Into<PathBuf>) -> Self {
        Self {
            system_path: system_path.into(),
            container_path: container_path.into(),
        }
    }

    pub fn system_path(&self) -> &Path {
        &self.system_path
    }

    pub fn container_path(&self) -> &Path {
        &self.container_path
    }

    pub async fn read_system_snapshot(&self) -> Result<SystemSnapshot> {
        read_json(&self.system_path).await
    }

    pub async fn read_container_snapshot(&self) -> Result<ContainerSnapshot> {
        read_json(&self.container_path).await
    }
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let data = fs::read(path).await.map_err(|source| ReconcileError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_slice(&data).map_err(|source| ReconcileError::Decode {
        path: path.to_path_buf(),
        source,
    })
}
