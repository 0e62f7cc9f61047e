use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};

use crate::catalog::country_matches;
use crate::errors::{AnalysisError, Result};

/// Уверенность прогноза, если вебхук её не прислал
pub const DEFAULT_FORECAST_CONFIDENCE: f64 = 0.85;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Increasing,
    Decreasing,
    Stable,
    #[default]
    Unknown,
}

impl Trend {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "increasing" => Trend::Increasing,
            "decreasing" => Trend::Decreasing,
            "stable" => Trend::Stable,
            _ => Trend::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Increasing => "increasing",
            Trend::Decreasing => "decreasing",
            Trend::Stable => "stable",
            Trend::Unknown => "unknown",
        }
    }
}

impl<'de> Deserialize<'de> for Trend {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        Ok(raw.as_str().map(Trend::parse).unwrap_or_default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ForecastDirection {
    Up,
    Down,
    #[default]
    Unknown,
}

impl ForecastDirection {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "up" => ForecastDirection::Up,
            "down" => ForecastDirection::Down,
            _ => ForecastDirection::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ForecastDirection::Up => "up",
            ForecastDirection::Down => "down",
            ForecastDirection::Unknown => "unknown",
        }
    }
}

impl<'de> Deserialize<'de> for ForecastDirection {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        Ok(raw.as_str().map(ForecastDirection::parse).unwrap_or_default())
    }
}

/// Блок `data` ответа вебхука
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    #[serde(default, deserialize_with = "lenient::string")]
    pub indicator: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub country: String,
    #[serde(default, deserialize_with = "lenient::number")]
    pub latest_value: f64,
    #[serde(default, deserialize_with = "lenient::string")]
    pub change_pct: String,
    #[serde(default)]
    pub trend: Trend,
    #[serde(default)]
    pub forecast_direction: ForecastDirection,
    #[serde(default, deserialize_with = "lenient::count")]
    pub alert_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default, deserialize_with = "lenient::string")]
    pub series_id: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub start_date: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub end_date: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub indicator_name: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub country_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    #[serde(default, deserialize_with = "lenient::count")]
    pub count: u64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub mean: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub min: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub max: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub latest: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub previous: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub std: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub change: f64,
    #[serde(default, deserialize_with = "lenient::string")]
    pub change_pct: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub date: String,
    pub value: f64,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AiAnalysis {
    #[serde(default, deserialize_with = "lenient::string")]
    pub trend: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub trend_strength: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub trend_description: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub volatility: String,
    #[serde(default, deserialize_with = "lenient::boolean")]
    pub seasonality_detected: bool,
    #[serde(default, deserialize_with = "lenient::anomalies")]
    pub anomalies: Vec<Anomaly>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub forecast_direction: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub forecast_confidence: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub insights: String,
    #[serde(default, deserialize_with = "lenient::strings")]
    pub key_observations: Vec<String>,
    #[serde(default, deserialize_with = "lenient::strings")]
    pub risk_factors: Vec<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub economic_interpretation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub date: String,
    pub value: f64,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

/// Точка графика с границами доверительного интервала
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfidenceBand {
    pub label: String,
    pub value: f64,
    pub upper: f64,
    pub lower: f64,
}

impl ForecastPoint {
    /// Уверенность, приведённая к [0, 1]; при отсутствии берётся 0.85
    pub fn clamped_confidence(&self) -> f64 {
        self.confidence
            .filter(|c| c.is_finite())
            .unwrap_or(DEFAULT_FORECAST_CONFIDENCE)
            .clamp(0.0, 1.0)
    }

    pub fn band(&self) -> ConfidenceBand {
        let margin = self.value * (1.0 - self.clamped_confidence());
        ConfidenceBand {
            label: self.date.clone(),
            value: self.value,
            upper: self.value + margin,
            lower: self.value - margin,
        }
    }
}

/// Блок `full_analysis` ответа вебхука
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FullAnalysis {
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub statistics: Statistics,
    #[serde(default)]
    pub ai_analysis: AiAnalysis,
    #[serde(default, deserialize_with = "lenient::forecast")]
    pub forecast: Vec<ForecastPoint>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub alerts: Value,
}

/// Каноническая запись анализа после нормализации
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    #[serde(rename = "data")]
    pub summary: Summary,
    pub full_analysis: FullAnalysis,
    #[serde(default, deserialize_with = "lenient::string")]
    pub timestamp: String,
}

impl AnalysisRecord {
    pub fn indicator(&self) -> &str {
        &self.summary.indicator
    }

    pub fn country(&self) -> &str {
        &self.summary.country
    }

    pub fn metadata(&self) -> &Metadata {
        &self.full_analysis.metadata
    }

    pub fn statistics(&self) -> &Statistics {
        &self.full_analysis.statistics
    }

    pub fn ai_analysis(&self) -> &AiAnalysis {
        &self.full_analysis.ai_analysis
    }

    pub fn forecast(&self) -> &[ForecastPoint] {
        &self.full_analysis.forecast
    }

    pub fn anomalies(&self) -> &[Anomaly] {
        &self.full_analysis.ai_analysis.anomalies
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// Облегчённая строка списка анализов
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSummary {
    pub id: String,
    pub country: String,
    pub indicator: String,
    pub status: AnalysisStatus,
    pub created_at: String,
    pub start_date: String,
    pub end_date: String,
}

impl AnalysisSummary {
    pub fn from_record(record: &AnalysisRecord) -> Self {
        let id = if record.indicator().is_empty() {
            record.country().to_string()
        } else {
            record.indicator().to_string()
        };
        let or_na = |s: &str| if s.is_empty() { "N/A".to_string() } else { s.to_string() };
        let created_at = if record.timestamp.is_empty() {
            Utc::now().to_rfc3339()
        } else {
            record.timestamp.clone()
        };

        AnalysisSummary {
            id,
            country: record.country().to_string(),
            indicator: record.indicator().to_string(),
            status: AnalysisStatus::Completed,
            created_at,
            start_date: or_na(&record.metadata().start_date),
            end_date: or_na(&record.metadata().end_date),
        }
    }
}

/// Запись журнала истории: анализ плюс синтетический `id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    /// Страна на верхнем уровне встречается в записях старого формата
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(flatten)]
    pub record: AnalysisRecord,
}

impl HistoryEntry {
    pub fn from_record(record: AnalysisRecord) -> Self {
        HistoryEntry {
            id: record.summary.indicator.clone(),
            country: None,
            record,
        }
    }

    pub fn country(&self) -> &str {
        if !self.record.summary.country.is_empty() {
            return &self.record.summary.country;
        }
        self.country.as_deref().unwrap_or_default()
    }

    /// Ключ (индикатор, страна); страна сравнивается по каноническому коду
    pub fn matches_key(&self, id: &str, country: &str) -> bool {
        self.id == id && country_matches(self.country(), country)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    GetAnalysis,
    ListAnalyses,
    TriggerAnalysis,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::GetAnalysis => "get_analysis",
            Action::ListAnalyses => "list_analyses",
            Action::TriggerAnalysis => "trigger_analysis",
        }
    }
}

/// Тело `POST /api/analysis/trigger` до валидации
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerRequest {
    pub country: Option<String>,
    pub indicator: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TriggerParams {
    pub country: String,
    pub indicator: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl TriggerRequest {
    pub fn validate(self) -> Result<TriggerParams> {
        let field = |value: Option<String>| value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let country = field(self.country);
        let indicator = field(self.indicator);
        let start_date = field(self.start_date);
        let end_date = field(self.end_date);

        let missing: Vec<&str> = [
            ("country", country.is_none()),
            ("indicator", indicator.is_none()),
            ("startDate", start_date.is_none()),
            ("endDate", end_date.is_none()),
        ]
        .iter()
        .filter(|(_, absent)| *absent)
        .map(|(name, _)| *name)
        .collect();

        let (Some(country), Some(indicator), Some(start_date), Some(end_date)) =
            (country, indicator, start_date, end_date)
        else {
            return Err(AnalysisError::Validation(format!(
                "Missing required fields: {}",
                missing.join(", ")
            )));
        };

        let start_date = parse_date("startDate", &start_date)?;
        let end_date = parse_date("endDate", &end_date)?;
        if start_date >= end_date {
            return Err(AnalysisError::Validation(
                "startDate must be before endDate".to_string(),
            ));
        }

        Ok(TriggerParams {
            country,
            indicator,
            start_date,
            end_date,
        })
    }
}

impl TriggerParams {
    pub fn to_payload(&self) -> Value {
        json!({
            "action": Action::TriggerAnalysis.as_str(),
            "country": self.country,
            "indicator": self.indicator,
            "startDate": self.start_date.format("%Y-%m-%d").to_string(),
            "endDate": self.end_date.format("%Y-%m-%d").to_string(),
        })
    }
}

fn parse_date(name: &str, value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
        AnalysisError::Validation(format!("{} must be a date in YYYY-MM-DD format", name))
    })
}

/// Терпимое чтение полей: вебхук присылает числа строками, null вместо пустых значений и т.п.
mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    use super::{Anomaly, ForecastPoint};

    fn number_of(value: &Value) -> Option<f64> {
        match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            _ => None,
        }
    }

    fn text_of(value: &Value) -> Option<String> {
        match value {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        Ok(text_of(&Value::deserialize(d)?).unwrap_or_default())
    }

    pub fn number<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        Ok(number_of(&Value::deserialize(d)?).unwrap_or(0.0))
    }

    pub fn count<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
        Ok(number_of(&Value::deserialize(d)?)
            .filter(|n| *n >= 0.0)
            .map(|n| n as u64)
            .unwrap_or(0))
    }

    pub fn boolean<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Bool(b) => b,
            Value::String(s) => s.eq_ignore_ascii_case("true"),
            _ => false,
        })
    }

    pub fn strings<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Array(items) => items.iter().filter_map(text_of).collect(),
            _ => Vec::new(),
        })
    }

    // Точки без строковой даты или числового значения отбрасываются
    pub fn forecast<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<ForecastPoint>, D::Error> {
        let Value::Array(items) = Value::deserialize(d)? else {
            return Ok(Vec::new());
        };

        Ok(items
            .iter()
            .filter_map(|item| {
                let date = item.get("date")?.as_str()?;
                let value = item.get("value")?.as_f64()?;
                Some(ForecastPoint {
                    date: date.to_string(),
                    value,
                    kind: item.get("type").and_then(text_of).unwrap_or_default(),
                    confidence: item.get("confidence").and_then(number_of),
                })
            })
            .collect())
    }

    pub fn anomalies<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Anomaly>, D::Error> {
        let Value::Array(items) = Value::deserialize(d)? else {
            return Ok(Vec::new());
        };

        Ok(items
            .iter()
            .filter_map(|item| {
                let date = item.get("date")?.as_str()?;
                let value = item.get("value").and_then(number_of)?;
                Some(Anomaly {
                    date: date.to_string(),
                    value,
                    reason: item.get("reason").and_then(text_of).unwrap_or_default(),
                })
            })
            .collect())
    }
}
