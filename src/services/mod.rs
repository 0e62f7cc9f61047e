pub mod export;
pub mod normalizer;
pub mod webhook;

pub use export::ExportFormat;
pub use normalizer::Normalized;
pub use webhook::{WebhookClient, WebhookReply};
