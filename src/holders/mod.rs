pub mod history;
pub mod storage;

pub use history::{AnalysisHistoryHolder, Upsert, CURRENT_ANALYSIS_SLOT, HISTORY_SLOT};
pub use storage::{FileSlotStorage, MemorySlotStorage, SlotStorage};
