use reqwest::{Client, ClientBuilder};
use serde_json::{json, Value};
use std::time::Duration;

use crate::config::AppConfig;
use crate::errors::{AnalysisError, Result};
use crate::models::{Action, TriggerParams};

/// Успешный (2xx) ответ вебхука
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookReply {
    /// Пустое тело ответа
    NoData,
    /// JSON-тело; не-JSON текст заворачивается в `{"message": ...}`
    Body(Value),
}

#[derive(Clone)]
pub struct WebhookClient {
    client: Client,
    endpoint: String,
    timeout: Duration,
}

impl WebhookClient {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let endpoint = config.webhook_url.trim().to_string();
        if endpoint.is_empty() {
            return Err(AnalysisError::Configuration(
                "webhook endpoint is not configured".to_string(),
            ));
        }

        let timeout = config.request_timeout();
        let client = ClientBuilder::new()
            .timeout(timeout)
            .build()
            .map_err(|e| AnalysisError::Configuration(format!("failed to build HTTP client: {}", e)))?;

        Ok(WebhookClient {
            client,
            endpoint,
            timeout,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub async fn get_analysis(&self, id: &str) -> Result<WebhookReply> {
        self.send(&json!({ "action": Action::GetAnalysis.as_str(), "id": id }))
            .await
    }

    pub async fn list_analyses(&self, country: Option<&str>) -> Result<WebhookReply> {
        let mut payload = json!({ "action": Action::ListAnalyses.as_str() });
        if let Some(country) = country {
            payload["country"] = json!(country);
        }
        self.send(&payload).await
    }

    pub async fn trigger_analysis(&self, params: &TriggerParams) -> Result<WebhookReply> {
        self.send(&params.to_payload()).await
    }

    /// Один POST на вебхук без повторов
    pub async fn send(&self, payload: &Value) -> Result<WebhookReply> {
        if !payload.is_object() {
            return Err(AnalysisError::Configuration(
                "webhook payload must be a JSON object".to_string(),
            ));
        }

        tracing::debug!("Отправка запроса на вебхук: {}", payload);

        let response = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .json(payload)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.classify(e))?;
        tracing::info!("Вебхук ответил статусом {}", status);

        if !status.is_success() {
            let message = upstream_message(&body)
                .unwrap_or_else(|| format!("Analysis service failed with status {}", status.as_u16()));
            tracing::warn!("Вебхук вернул ошибку {}: {}", status, message);
            return Err(AnalysisError::UpstreamHttp {
                status: status.as_u16(),
                message,
            });
        }

        Ok(parse_body(&body))
    }

    fn classify(&self, err: reqwest::Error) -> AnalysisError {
        if err.is_timeout() {
            tracing::warn!("Вебхук не ответил за {:?}", self.timeout);
            AnalysisError::Timeout(self.timeout.as_secs())
        } else if err.is_builder() {
            AnalysisError::Configuration(err.to_string())
        } else {
            tracing::warn!("Вебхук недоступен: {}", err);
            AnalysisError::NetworkUnavailable(err.to_string())
        }
    }
}

/// Разбор тела успешного ответа
pub fn parse_body(body: &str) -> WebhookReply {
    if body.trim().is_empty() {
        return WebhookReply::NoData;
    }

    match serde_json::from_str::<Value>(body) {
        Ok(value) => WebhookReply::Body(value),
        Err(_) => {
            tracing::warn!("Вебхук вернул не-JSON тело длиной {}", body.len());
            WebhookReply::Body(json!({ "message": body }))
        }
    }
}

/// Текст ошибки из тела неуспешного ответа: поле `error`/`message` или сам текст
pub fn upstream_message(body: &str) -> Option<String> {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        let field = ["error", "message"]
            .iter()
            .find_map(|key| value.get(*key).and_then(Value::as_str))
            .map(str::to_string);
        if field.is_some() {
            return field;
        }
    }

    let text = body.trim();
    (!text.is_empty()).then(|| text.to_string())
}
