use regex::Regex;

use crate::errors::Result;
use crate::models::{AnalysisRecord, Anomaly, ForecastPoint};

pub const COLUMN_COUNT: usize = 39;

/// Общий заголовок для строк summary, forecast и anomaly
pub const CSV_HEADER: [&str; COLUMN_COUNT] = [
    "row_type",
    "indicator",
    "country",
    "indicator_name",
    "country_name",
    "series_id",
    "start_date",
    "end_date",
    "timestamp",
    "latest_value",
    "change_pct",
    "trend",
    "forecast_direction",
    "alert_count",
    "trend_strength",
    "trend_description",
    "volatility",
    "seasonality_detected",
    "forecast_confidence",
    "insights",
    "key_observations",
    "risk_factors",
    "economic_interpretation",
    "date",
    "value",
    "forecast_type",
    "confidence",
    "upper",
    "lower",
    "stat_count",
    "stat_mean",
    "stat_min",
    "stat_max",
    "stat_latest",
    "stat_previous",
    "stat_std",
    "stat_change",
    "stat_change_pct",
    "anomaly_reason",
];

const LIST_SEPARATOR: &str = " | ";
const MAX_ID_LEN: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    pub fn parse(value: Option<&str>) -> Option<Self> {
        match value.map(|v| v.trim().to_ascii_lowercase()) {
            None => Some(ExportFormat::Csv),
            Some(v) if v == "csv" => Some(ExportFormat::Csv),
            Some(v) if v == "json" => Some(ExportFormat::Json),
            Some(_) => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv; charset=utf-8",
            ExportFormat::Json => "application/json",
        }
    }
}

/// Строка таблицы: значения по индексам колонок `CSV_HEADER`
struct Row([String; COLUMN_COUNT]);

impl Row {
    fn new(row_type: &str) -> Self {
        let mut row = Row(std::array::from_fn(|_| String::new()));
        row.set("row_type", row_type);
        row
    }

    fn set(&mut self, column: &str, value: impl ToString) {
        let index = CSV_HEADER.iter().position(|c| *c == column);
        debug_assert!(index.is_some(), "unknown CSV column: {}", column);
        if let Some(index) = index {
            self.0[index] = value.to_string();
        }
    }

    fn write_to(&self, out: &mut String) {
        let line: Vec<String> = self.0.iter().map(|f| escape_field(f)).collect();
        out.push_str(&line.join(","));
        out.push('\n');
    }
}

/// Экранирование поля по правилам CSV
pub fn escape_field(value: &str) -> String {
    if value.contains(|c| matches!(c, ',' | '"' | '\n' | '\r')) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn summary_row(record: &AnalysisRecord) -> Row {
    let summary = &record.summary;
    let meta = record.metadata();
    let ai = record.ai_analysis();
    let stats = record.statistics();

    let mut row = Row::new("summary");
    row.set("indicator", &summary.indicator);
    row.set("country", &summary.country);
    row.set("indicator_name", &meta.indicator_name);
    row.set("country_name", &meta.country_name);
    row.set("series_id", &meta.series_id);
    row.set("start_date", &meta.start_date);
    row.set("end_date", &meta.end_date);
    row.set("timestamp", &record.timestamp);

    row.set("latest_value", summary.latest_value);
    row.set("change_pct", &summary.change_pct);
    row.set("trend", summary.trend.as_str());
    row.set("forecast_direction", summary.forecast_direction.as_str());
    row.set("alert_count", summary.alert_count);

    row.set("trend_strength", &ai.trend_strength);
    row.set("trend_description", &ai.trend_description);
    row.set("volatility", &ai.volatility);
    row.set("seasonality_detected", ai.seasonality_detected);
    row.set("forecast_confidence", &ai.forecast_confidence);
    row.set("insights", &ai.insights);
    row.set("key_observations", ai.key_observations.join(LIST_SEPARATOR));
    row.set("risk_factors", ai.risk_factors.join(LIST_SEPARATOR));
    row.set("economic_interpretation", &ai.economic_interpretation);

    row.set("stat_count", stats.count);
    row.set("stat_mean", stats.mean);
    row.set("stat_min", stats.min);
    row.set("stat_max", stats.max);
    row.set("stat_latest", stats.latest);
    row.set("stat_previous", stats.previous);
    row.set("stat_std", stats.std);
    row.set("stat_change", stats.change);
    row.set("stat_change_pct", &stats.change_pct);
    row
}

fn forecast_row(point: &ForecastPoint) -> Row {
    let band = point.band();
    let mut row = Row::new("forecast");
    row.set("date", &point.date);
    row.set("value", point.value);
    row.set("forecast_type", &point.kind);
    row.set("confidence", point.clamped_confidence());
    row.set("upper", band.upper);
    row.set("lower", band.lower);
    row
}

fn anomaly_row(anomaly: &Anomaly) -> Row {
    let mut row = Row::new("anomaly");
    row.set("date", &anomaly.date);
    row.set("value", anomaly.value);
    row.set("anomaly_reason", &anomaly.reason);
    row
}

/// CSV: одна строка summary, затем прогноз, затем аномалии
pub fn to_csv(record: &AnalysisRecord) -> String {
    let mut out = String::new();
    out.push_str(&CSV_HEADER.join(","));
    out.push('\n');

    summary_row(record).write_to(&mut out);
    for point in record.forecast() {
        forecast_row(point).write_to(&mut out);
    }
    for anomaly in record.anomalies() {
        anomaly_row(anomaly).write_to(&mut out);
    }

    tracing::debug!(
        "Сформирован CSV: {} прогнозных строк, {} аномалий",
        record.forecast().len(),
        record.anomalies().len()
    );
    out
}

pub fn to_json(record: &AnalysisRecord) -> Result<String> {
    Ok(serde_json::to_string_pretty(record)?)
}

/// Оставляет только `[A-Za-z0-9_-]` и обрезает до 50 символов
pub fn sanitize_id(id: &str) -> Result<String> {
    let unsafe_chars = Regex::new(r"[^A-Za-z0-9_-]")?;
    Ok(unsafe_chars
        .replace_all(id, "")
        .chars()
        .take(MAX_ID_LEN)
        .collect())
}

/// `analysis-<id>-<millis>.<ext>`
pub fn download_filename(id: &str, format: ExportFormat, epoch_millis: i64) -> Result<String> {
    Ok(format!(
        "analysis-{}-{}.{}",
        sanitize_id(id)?,
        epoch_millis,
        format.extension()
    ))
}
