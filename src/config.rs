use anyhow::Result;
use config::Config;
use std::net::SocketAddr;
use std::time::Duration;

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_STORAGE_DIR: &str = "data";
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:3000";

#[derive(Debug, Clone, serde::Deserialize)]
pub struct AppConfig {
    pub webhook_url: String,
    pub request_timeout_secs: Option<u64>,
    pub storage_dir: Option<String>,
    pub bind_address: Option<String>,
    pub log_dir: Option<String>,
}

impl AppConfig {
    /// Конфигурация с адресом вебхука и значениями по умолчанию для остального
    pub fn with_webhook(webhook_url: impl Into<String>) -> Self {
        AppConfig {
            webhook_url: webhook_url.into(),
            request_timeout_secs: None,
            storage_dir: None,
            bind_address: None,
            log_dir: None,
        }
    }

    /// Валидация конфигурации
    pub fn validate(&self) -> Result<()> {
        let url = self.webhook_url.trim();
        if url.is_empty() {
            return Err(anyhow::anyhow!("webhook_url cannot be empty"));
        }

        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(anyhow::anyhow!("webhook_url must be an http(s) URL"));
        }

        if let Some(timeout) = self.request_timeout_secs {
            if timeout == 0 || timeout > 300 {
                return Err(anyhow::anyhow!("request_timeout_secs must be between 1 and 300"));
            }
        }

        if let Some(addr) = &self.bind_address {
            addr.parse::<SocketAddr>()
                .map_err(|e| anyhow::anyhow!("bind_address '{}' is invalid: {}", addr, e))?;
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }

    pub fn storage_dir(&self) -> &str {
        self.storage_dir.as_deref().unwrap_or(DEFAULT_STORAGE_DIR)
    }

    pub fn bind_address(&self) -> Result<SocketAddr> {
        let addr = self.bind_address.as_deref().unwrap_or(DEFAULT_BIND_ADDRESS);
        Ok(addr.parse()?)
    }
}

pub fn load_config() -> Result<AppConfig> {
    // Загружаем .env файл
    dotenvy::dotenv().ok();

    let settings = Config::builder()
        .add_source(config::File::with_name("config").required(false))
        .add_source(config::Environment::with_prefix("ECON_DASHBOARD"))
        .build()?;

    let config: AppConfig = settings.try_deserialize()?;
    config.validate()?;

    Ok(config)
}
