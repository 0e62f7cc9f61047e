pub mod catalog;
pub mod config;
pub mod errors;
pub mod holders;
pub mod models;
pub mod routers;
pub mod services;

pub use config::AppConfig;
pub use errors::{AnalysisError, Result};
pub use holders::{AnalysisHistoryHolder, FileSlotStorage, MemorySlotStorage, SlotStorage, Upsert};
pub use models::{
    Action, AiAnalysis, AnalysisRecord, AnalysisStatus, AnalysisSummary, Anomaly, ForecastDirection,
    ForecastPoint, HistoryEntry, Metadata, Statistics, Summary, Trend, TriggerParams, TriggerRequest,
};
pub use services::{ExportFormat, Normalized, WebhookClient, WebhookReply};
pub use config::load_config;

#[derive(Clone)]
pub struct AppState {
    pub webhook: WebhookClient,
    pub history: AnalysisHistoryHolder,
}
