use async_trait::async_trait;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::errors::{AnalysisError, Result};

/// Хранилище именованных JSON-слотов
#[async_trait]
pub trait SlotStorage: Send + Sync {
    /// `Ok(None)`, если слот ещё не создан
    async fn read(&self, slot: &str) -> Result<Option<String>>;
    async fn write(&self, slot: &str, contents: &str) -> Result<()>;
}

/// Слоты в виде файлов `<dir>/<slot>.json`
pub struct FileSlotStorage {
    dir: PathBuf,
}

impl FileSlotStorage {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        FileSlotStorage {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn path(&self, slot: &str) -> PathBuf {
        self.dir.join(format!("{}.json", slot))
    }
}

#[async_trait]
impl SlotStorage for FileSlotStorage {
    async fn read(&self, slot: &str) -> Result<Option<String>> {
        match tokio::fs::read_to_string(self.path(slot)).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, slot: &str, contents: &str) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        // Пишем во временный файл и переименовываем, чтобы не оставить полузаписанный слот
        let tmp = self.dir.join(format!(".{}.json.tmp", slot));
        tokio::fs::write(&tmp, contents).await?;
        tokio::fs::rename(&tmp, self.path(slot)).await?;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemorySlotStorage {
    slots: Mutex<HashMap<String, String>>,
}

impl MemorySlotStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_slot(slot: &str, contents: &str) -> Self {
        let storage = Self::new();
        if let Ok(mut slots) = storage.slots.lock() {
            slots.insert(slot.to_string(), contents.to_string());
        }
        storage
    }
}

#[async_trait]
impl SlotStorage for MemorySlotStorage {
    async fn read(&self, slot: &str) -> Result<Option<String>> {
        let slots = self
            .slots
            .lock()
            .map_err(|_| AnalysisError::Storage("memory storage lock poisoned".to_string()))?;
        Ok(slots.get(slot).cloned())
    }

    async fn write(&self, slot: &str, contents: &str) -> Result<()> {
        let mut slots = self
            .slots
            .lock()
            .map_err(|_| AnalysisError::Storage("memory storage lock poisoned".to_string()))?;
        slots.insert(slot.to_string(), contents.to_string());
        Ok(())
    }
}
