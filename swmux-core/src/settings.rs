//! Named persistent settings.
//!
//! The manager only needs get/set of one JSON value per name (it stores the
//! last-published scope set), so the host's settings storage is abstracted
//! to exactly that. `JsonFileSettings` is the durable implementation;
//! `MemorySettings` backs tests.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::error::{Result, SwError};

#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get(&self, name: &str) -> Result<Option<Value>>;

    async fn set(&self, name: &str, value: Value) -> Result<()>;
}

/// Settings persisted as one JSON object in a single file, read-modify-write
/// under an async mutex, replaced atomically.
#[derive(Debug)]
pub struct JsonFileSettings {
    path: PathBuf,
    write_guard: tokio::sync::Mutex<()>,
}

impl JsonFileSettings {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_guard: tokio::sync::Mutex::new(()),
        }
    }

    async fn read_all(&self) -> Result<HashMap<String, Value>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(err) => Err(err.into()),
        }
    }
}

#[async_trait]
impl SettingsStore for JsonFileSettings {
    async fn get(&self, name: &str) -> Result<Option<Value>> {
        Ok(self.read_all().await?.remove(name))
    }

    async fn set(&self, name: &str, value: Value) -> Result<()> {
        let _guard = self.write_guard.lock().await;

        let mut all = self.read_all().await?;
        all.insert(name.to_string(), value);
        let bytes = serde_json::to_vec_pretty(&all)?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self
            .path
            .with_extension(format!("tmp-{}", Uuid::new_v4().simple()));
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(&bytes).await?;
        file.flush().await?;
        drop(file);
        tokio::fs::rename(&tmp, &self.path).await.map_err(|err| {
            SwError::Internal(format!(
                "failed to replace settings file {:?}: {err}",
                self.path
            ))
        })
    }
}

/// Process-local settings for tests.
#[derive(Debug, Default)]
pub struct MemorySettings {
    values: RwLock<HashMap<String, Value>>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SettingsStore for MemorySettings {
    async fn get(&self, name: &str) -> Result<Option<Value>> {
        Ok(self.values.read().get(name).cloned())
    }

    async fn set(&self, name: &str, value: Value) -> Result<()> {
        self.values.write().insert(name.to_string(), value);
        Ok(())
    }
}
