//! # Statistical Insight Engine
//! Deterministic, synchronous fallback tier. Compares the trailing 24h
//! window against the preceding one and evaluates four independent rules;
//! each rule optionally contributes one detail and one summary phrase.

use chrono::{DateTime, Utc};

use crate::insight::{DetailCategory, DetailKind, InsightContext, InsightDetail, InsightReport};
use crate::reading::StoredReading;

const TREND_THRESHOLD_C: f64 = 2.0;
const HEAT_EXTREME_C: f64 = 35.0;
const COLD_EXTREME_C: f64 = 5.0;
const WIND_EXTREME_KMH: f64 = 20.0;

pub fn report(
    current: &[StoredReading],
    previous: &[StoredReading],
    now: DateTime<Utc>,
) -> InsightReport {
    let mut details = Vec::new();
    let mut summary_parts: Vec<String> = Vec::new();

    // 1) Temperature trend against the previous window.
    if !current.is_empty() && !previous.is_empty() {
        let diff = mean_temperature(current) - mean_temperature(previous);
        if diff.abs() > TREND_THRESHOLD_C {
            let trend = if diff > 0.0 { "subindo" } else { "caindo" };
            details.push(InsightDetail {
                kind: DetailKind::Trend,
                category: DetailCategory::Temperature,
                message: format!(
                    "A temperatura média está {trend} em relação a ontem ({:.1}°C de diferença).",
                    diff.abs()
                ),
            });
            summary_parts.push(format!("temperatura {trend}"));
        }
    }

    // 2) / 3) Recent extremes.
    if !current.is_empty() {
        let max_temp = fold_max(current, |r| r.reading.data.temperature);
        let min_temp = fold_min(current, |r| r.reading.data.temperature);

        if max_temp > HEAT_EXTREME_C {
            details.push(InsightDetail {
                kind: DetailKind::Warning,
                category: DetailCategory::Temperature,
                message: format!("Calor extremo detectado nas últimas 24h (Máxima: {max_temp}°C)."),
            });
            summary_parts.push("calor intenso".to_string());
        }
        if min_temp < COLD_EXTREME_C {
            details.push(InsightDetail {
                kind: DetailKind::Warning,
                category: DetailCategory::Temperature,
                message: format!("Frio intenso detectado nas últimas 24h (Mínima: {min_temp}°C)."),
            });
            summary_parts.push("frio intenso".to_string());
        }

        // 4) Wind gusts.
        let max_wind = fold_max(current, |r| r.reading.data.wind_speed);
        if max_wind > WIND_EXTREME_KMH {
            details.push(InsightDetail {
                kind: DetailKind::Alert,
                category: DetailCategory::Wind,
                message: format!("Rajadas de vento fortes detectadas ({max_wind} km/h)."),
            });
            summary_parts.push("ventos fortes".to_string());
        }
    }

    let summary = if summary_parts.is_empty() {
        "Condições estáveis observadas nas últimas 24 horas.".to_string()
    } else {
        format!("Destaques recentes: {}.", summary_parts.join(", "))
    };

    InsightReport {
        summary,
        details,
        generated_at: now.to_rfc3339(),
        context: Some(InsightContext {
            data_points_analyzed: current.len(),
            method: "statistical".to_string(),
            ai_provider: None,
            model: None,
        }),
        error: None,
    }
}

fn mean_temperature(rows: &[StoredReading]) -> f64 {
    rows.iter()
        .map(|r| r.reading.data.temperature)
        .sum::<f64>()
        / rows.len() as f64
}

fn fold_max(rows: &[StoredReading], f: impl Fn(&StoredReading) -> f64) -> f64 {
    rows.iter().map(f).fold(f64::NEG_INFINITY, f64::max)
}

fn fold_min(rows: &[StoredReading], f: impl Fn(&StoredReading) -> f64) -> f64 {
    rows.iter().map(f).fold(f64::INFINITY, f64::min)
}
