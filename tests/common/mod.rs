#![allow(dead_code)]

use serde_json::{json, Value};

/// Ответ вебхука с полным анализом
pub fn sample_analysis(indicator: &str, country: &str) -> Value {
    json!({
        "success": true,
        "data": {
            "indicator": indicator,
            "country": country,
            "latest_value": 27360.9,
            "change_pct": "2.45",
            "trend": "increasing",
            "forecast_direction": "up",
            "alert_count": 1
        },
        "full_analysis": {
            "metadata": {
                "series_id": format!("{}_{}", indicator, country),
                "start_date": "2020-01-01",
                "end_date": "2024-12-31",
                "indicator_name": "GDP Growth",
                "country_name": "United States"
            },
            "statistics": {
                "count": 20,
                "mean": 24500.5,
                "min": 21000.0,
                "max": 27360.9,
                "latest": 27360.9,
                "previous": 26706.4,
                "std": 1800.2,
                "change": 654.5,
                "change_pct": "2.45"
            },
            "ai_analysis": {
                "trend": "increasing",
                "trend_strength": "strong",
                "trend_description": "Steady growth after the 2020 contraction",
                "volatility": "low",
                "seasonality_detected": false,
                "anomalies": [
                    { "date": "2020-04-01", "value": 19500.0, "reason": "Pandemic shock, \"lockdown\" quarter" }
                ],
                "forecast_direction": "up",
                "forecast_confidence": "high",
                "insights": "Growth is broad-based, led by services\nand consumption.",
                "key_observations": ["Recovery complete", "Services lead, manufacturing lags"],
                "risk_factors": ["Rate hikes", "Energy prices"],
                "economic_interpretation": "Expansion phase"
            },
            "forecast": [
                { "date": "2025-03-31", "value": 200.0, "type": "projected" },
                { "date": "2025-06-30", "value": 100.0, "type": "projected", "confidence": 1.5 },
                { "date": "2025-09-30", "value": 100.0, "type": "projected", "confidence": 0.9 },
                { "date": "2025-12-31", "type": "projected", "confidence": 0.8 }
            ],
            "alerts": []
        },
        "timestamp": "2025-01-15T10:00:00Z"
    })
}
