use chrono::Utc;
use serde_json::{Map, Value};

use crate::errors::{AnalysisError, Result};
use crate::models::{Action, AnalysisRecord, AnalysisSummary};

/// Результат нормализации ответа вебхука
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    Single(Box<AnalysisRecord>),
    List(Vec<AnalysisSummary>),
}

/// Форма полезной нагрузки, распознанная до разбора полей
enum Shape<'a> {
    Failure(String),
    Single(&'a Map<String, Value>),
    Many(&'a [Value]),
    Empty,
    Unrecognized(String),
}

fn is_detailed(object: &Map<String, Value>) -> bool {
    let present = |key: &str| object.get(key).map_or(false, |v| !v.is_null());
    present("data") && present("full_analysis")
}

fn all_detailed(items: &[Value]) -> bool {
    items
        .iter()
        .all(|item| item.as_object().map_or(false, is_detailed))
}

fn classify(payload: &Value) -> Shape<'_> {
    match payload {
        Value::Object(object) => {
            if object.get("success").and_then(Value::as_bool) == Some(false) {
                let message = object
                    .get("message")
                    .or_else(|| object.get("error"))
                    .and_then(Value::as_str)
                    .unwrap_or("Analysis service reported a failure");
                return Shape::Failure(message.to_string());
            }
            if is_detailed(object) {
                return Shape::Single(object);
            }
            // Конверт вида {"data": [...]}
            if let Some(Value::Array(items)) = object.get("data") {
                if items.is_empty() {
                    return Shape::Empty;
                }
                if all_detailed(items) {
                    return Shape::Many(items);
                }
            }
            Shape::Unrecognized(describe(payload))
        }
        Value::Array(items) if items.is_empty() => Shape::Empty,
        Value::Array(items) if all_detailed(items) => Shape::Many(items),
        other => Shape::Unrecognized(describe(other)),
    }
}

/// Краткое описание формы для логов: ключи объекта или тип значения
pub fn describe(payload: &Value) -> String {
    match payload {
        Value::Object(object) if object.is_empty() => "empty object".to_string(),
        Value::Object(object) => {
            let keys: Vec<&str> = object.keys().map(String::as_str).collect();
            format!("object with keys [{}]", keys.join(", "))
        }
        Value::Array(items) => format!("array of {} item(s)", items.len()),
        Value::Null => "null".to_string(),
        Value::Bool(_) => "boolean".to_string(),
        Value::Number(_) => "number".to_string(),
        Value::String(_) => "string".to_string(),
    }
}

/// Разбор одиночного анализа; страна и индикатор обязаны быть непустыми
pub fn parse_record(object: &Map<String, Value>) -> Result<AnalysisRecord> {
    let mut record: AnalysisRecord = serde_json::from_value(Value::Object(object.clone()))
        .map_err(|e| AnalysisError::IncompleteData(e.to_string()))?;

    record.summary.indicator = record.summary.indicator.trim().to_string();
    record.summary.country = record.summary.country.trim().to_string();

    if record.summary.country.is_empty() {
        return Err(AnalysisError::IncompleteData("data.country is missing".to_string()));
    }
    if record.summary.indicator.is_empty() {
        return Err(AnalysisError::IncompleteData("data.indicator is missing".to_string()));
    }

    if record.timestamp.is_empty() {
        record.timestamp = Utc::now().to_rfc3339();
    }

    Ok(record)
}

/// Приводит ответ вебхука к канонической форме для указанного действия
pub fn normalize(action: Action, payload: &Value) -> Result<Normalized> {
    match (action, classify(payload)) {
        (_, Shape::Failure(message)) => Err(AnalysisError::Upstream(message)),
        (_, Shape::Unrecognized(shape)) => Err(AnalysisError::UnrecognizedShape(shape)),

        (Action::ListAnalyses, Shape::Empty) => Ok(Normalized::List(Vec::new())),
        (Action::ListAnalyses, Shape::Single(object)) => {
            let record = parse_record(object)?;
            Ok(Normalized::List(vec![AnalysisSummary::from_record(&record)]))
        }
        (Action::ListAnalyses, Shape::Many(items)) => {
            let summaries = items
                .iter()
                .filter_map(Value::as_object)
                .map(|object| parse_record(object).map(|r| AnalysisSummary::from_record(&r)))
                .collect::<Result<Vec<_>>>()?;
            Ok(Normalized::List(summaries))
        }

        (_, Shape::Empty) => Err(AnalysisError::UnrecognizedShape("empty array".to_string())),
        (_, Shape::Single(object)) => Ok(Normalized::Single(Box::new(parse_record(object)?))),
        (_, Shape::Many(items)) => {
            let first = items
                .first()
                .and_then(Value::as_object)
                .ok_or_else(|| AnalysisError::UnrecognizedShape(describe(payload)))?;
            Ok(Normalized::Single(Box::new(parse_record(first)?)))
        }
    }
}

/// Нормализация с ожиданием одиночной записи
pub fn normalize_single(action: Action, payload: &Value) -> Result<AnalysisRecord> {
    match normalize(action, payload)? {
        Normalized::Single(record) => Ok(*record),
        Normalized::List(_) => Err(AnalysisError::UnrecognizedShape(describe(payload))),
    }
}

/// Нормализация с ожиданием списка
pub fn normalize_list(payload: &Value) -> Result<Vec<AnalysisSummary>> {
    match normalize(Action::ListAnalyses, payload)? {
        Normalized::List(items) => Ok(items),
        Normalized::Single(record) => Ok(vec![AnalysisSummary::from_record(&record)]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn detailed(indicator: &str, country: &str) -> Value {
        json!({
            "success": true,
            "data": { "indicator": indicator, "country": country },
            "full_analysis": { "metadata": { "start_date": "2020-01-01" } },
            "timestamp": "2025-01-01T00:00:00Z"
        })
    }

    #[test]
    fn describe_reports_keys() {
        assert_eq!(describe(&json!({})), "empty object");
        assert_eq!(describe(&json!({"message": "x"})), "object with keys [message]");
        assert_eq!(describe(&json!(null)), "null");
    }

    #[test]
    fn success_false_wins_over_detailed_shape() {
        let mut payload = detailed("GDP", "US");
        payload["success"] = json!(false);
        payload["message"] = json!("stale");
        let err = normalize(Action::GetAnalysis, &payload).unwrap_err();
        assert!(matches!(err, AnalysisError::Upstream(ref m) if m == "stale"));
    }

    #[test]
    fn list_wraps_single_detailed_record() {
        let list = normalize_list(&detailed("GDP", "US")).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id, "GDP");
        assert_eq!(list[0].start_date, "2020-01-01");
        assert_eq!(list[0].end_date, "N/A");
        assert_eq!(list[0].created_at, "2025-01-01T00:00:00Z");
    }

    #[test]
    fn data_envelope_with_array_is_accepted() {
        let payload = json!({ "data": [detailed("GDP", "US"), detailed("INFLATION", "DE")] });
        let list = normalize_list(&payload).unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[1].indicator, "INFLATION");
    }

    #[test]
    fn mixed_array_is_unrecognized() {
        let payload = json!([detailed("GDP", "US"), { "id": "x" }]);
        assert!(matches!(
            normalize(Action::ListAnalyses, &payload),
            Err(AnalysisError::UnrecognizedShape(_))
        ));
    }
}
