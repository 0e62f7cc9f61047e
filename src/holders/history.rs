use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::catalog::country_matches;
use crate::errors::{AnalysisError, Result};
use crate::holders::storage::SlotStorage;
use crate::models::{AnalysisRecord, HistoryEntry};
use crate::services::normalizer;

/// Старый слот с единственным «текущим» анализом
pub const CURRENT_ANALYSIS_SLOT: &str = "analysisPageData";
/// Журнал истории анализов
pub const HISTORY_SLOT: &str = "analysisHistory";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Inserted,
    Replaced(usize),
}

struct HistoryState {
    entries: Vec<HistoryEntry>,
    available: bool,
    /// Слот истории прочитан; до этого писать в него нельзя
    loaded: bool,
    revision: u64,
}

struct LoadedHistory {
    entries: Vec<HistoryEntry>,
    persisted: bool,
}

#[derive(Clone)]
pub struct AnalysisHistoryHolder {
    state: Arc<Mutex<HistoryState>>,
    /// Последняя записанная ревизия; держится только на время записи в слот
    written: Arc<Mutex<u64>>,
    storage: Arc<dyn SlotStorage>,
}

impl AnalysisHistoryHolder {
    /// Открывает журнал: миграция старого слота и загрузка записей.
    /// Ошибки хранилища не пробрасываются, журнал помечается недоступным.
    pub async fn open(storage: Arc<dyn SlotStorage>) -> Self {
        let holder = AnalysisHistoryHolder {
            state: Arc::new(Mutex::new(HistoryState {
                entries: Vec::new(),
                available: true,
                loaded: false,
                revision: 0,
            })),
            written: Arc::new(Mutex::new(0)),
            storage,
        };
        holder.reload().await;
        holder
    }

    /// Перечитывает журнал. Если слот нечитаем, записи в памяти сохраняются,
    /// а запись в слот блокируется до следующей успешной загрузки.
    pub async fn reload(&self) {
        let mut state = self.state.lock().await;
        match self.load_entries().await {
            Ok(loaded) => {
                tracing::info!("Загружено {} записей истории", loaded.entries.len());
                state.entries = loaded.entries;
                state.available = loaded.persisted;
                state.loaded = true;
            }
            Err(e) => {
                tracing::warn!("История недоступна: {}", e);
                state.available = false;
                state.loaded = false;
            }
        }
    }

    async fn load_entries(&self) -> Result<LoadedHistory> {
        if let Some(entry) = self.migrate_from_single_slot().await? {
            let entries = vec![entry];
            let persisted = match self.write_entries(&entries).await {
                Ok(()) => {
                    tracing::info!("История создана из старого слота {}", CURRENT_ANALYSIS_SLOT);
                    true
                }
                Err(e) => {
                    tracing::warn!("Перенесённая запись не сохранена: {}", e);
                    false
                }
            };
            return Ok(LoadedHistory { entries, persisted });
        }

        let Some(raw) = self.storage.read(HISTORY_SLOT).await? else {
            return Ok(LoadedHistory {
                entries: Vec::new(),
                persisted: true,
            });
        };

        let items: Vec<Value> = serde_json::from_str(&raw)?;
        let entries = items
            .into_iter()
            .filter_map(|item| match serde_json::from_value::<HistoryEntry>(item) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!("Пропущена нечитаемая запись истории: {}", e);
                    None
                }
            })
            .collect();
        Ok(LoadedHistory {
            entries,
            persisted: true,
        })
    }

    /// Однократный перенос: если журнала нет, а старый слот содержит анализ,
    /// возвращает запись, с которой журнал начинается
    pub async fn migrate_from_single_slot(&self) -> Result<Option<HistoryEntry>> {
        if self.storage.read(HISTORY_SLOT).await?.is_some() {
            return Ok(None);
        }
        let Some(raw) = self.storage.read(CURRENT_ANALYSIS_SLOT).await? else {
            return Ok(None);
        };

        let value: Value = serde_json::from_str(&raw)?;
        match value.as_object().map(normalizer::parse_record) {
            Some(Ok(record)) => Ok(Some(HistoryEntry::from_record(record))),
            Some(Err(e)) => {
                tracing::warn!("Старый слот не содержит пригодного анализа: {}", e);
                Ok(None)
            }
            None => {
                tracing::warn!("Старый слот содержит {}", normalizer::describe(&value));
                Ok(None)
            }
        }
    }

    async fn write_entries(&self, entries: &[HistoryEntry]) -> Result<()> {
        let raw = serde_json::to_string(entries)?;
        self.storage.write(HISTORY_SLOT, &raw).await
    }

    /// Вставка или замена по ключу (индикатор, страна); новые записи идут первыми
    pub async fn upsert(&self, record: AnalysisRecord) -> Upsert {
        let entry = HistoryEntry::from_record(record);
        let id = entry.id.clone();
        let country = entry.country().to_string();

        let (outcome, snapshot) = {
            let mut state = self.state.lock().await;
            let outcome = match state.entries.iter().position(|e| e.matches_key(&id, &country)) {
                Some(index) => {
                    state.entries[index] = entry;
                    Upsert::Replaced(index)
                }
                None => {
                    state.entries.insert(0, entry);
                    Upsert::Inserted
                }
            };
            state.revision += 1;
            let snapshot = state
                .loaded
                .then(|| (state.revision, serde_json::to_string(&state.entries)));
            (outcome, snapshot)
        };
        tracing::info!("История: {:?} для {}/{}", outcome, id, country);

        match snapshot {
            Some((revision, raw)) => self.persist(revision, raw).await,
            None => {
                tracing::warn!("Слот истории не прочитан, изменение осталось только в памяти");
                self.state.lock().await.available = false;
            }
        }
        outcome
    }

    async fn persist(&self, revision: u64, raw: serde_json::Result<String>) {
        let result = {
            let mut written = self.written.lock().await;
            // Более новый снимок уже записан
            if *written >= revision {
                return;
            }
            let result = match raw {
                Ok(raw) => self.storage.write(HISTORY_SLOT, &raw).await,
                Err(e) => Err(AnalysisError::from(e)),
            };
            if result.is_ok() {
                *written = revision;
            }
            result
        };

        let mut state = self.state.lock().await;
        match result {
            Ok(()) => state.available = true,
            Err(e) => {
                tracing::warn!("Не удалось сохранить историю: {}", e);
                state.available = false;
            }
        }
    }

    /// Записи от новых к старым, с фильтром по стране (код или название)
    pub async fn list(&self, country: Option<&str>) -> Vec<HistoryEntry> {
        let state = self.state.lock().await;
        state
            .entries
            .iter()
            .filter(|entry| country.map_or(true, |c| entry_in_country(entry, c)))
            .cloned()
            .collect()
    }

    pub async fn find(&self, id: &str, country: Option<&str>) -> Option<HistoryEntry> {
        let state = self.state.lock().await;
        state
            .entries
            .iter()
            .find(|entry| entry.id == id && country.map_or(true, |c| entry_in_country(entry, c)))
            .cloned()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    pub async fn is_available(&self) -> bool {
        self.state.lock().await.available
    }
}

fn entry_in_country(entry: &HistoryEntry, country: &str) -> bool {
    country_matches(&entry.record.summary.country, country)
        || entry
            .country
            .as_deref()
            .map_or(false, |flat| country_matches(flat, country))
}
