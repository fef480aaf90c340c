//! AI adapter: provider abstraction behind the generative insight tier.
//! One external call per insight request, no retry, no cross-request state.
//! Transport errors, non-2xx statuses, unparseable responses, and a missing
//! credential all resolve the same way: `None`, deferring to the statistical
//! engine.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::insight::{InsightContext, InsightDetail, InsightReport};
use crate::reading::StoredReading;

/// Readings passed to the model, most recent first.
const MAX_PROMPT_READINGS: usize = 20;
const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Trait object used by the insight orchestrator and tests.
pub trait AiClient: Send + Sync {
    /// Generate a report from recent readings, or `None` to use the fallback.
    fn generate<'a>(
        &'a self,
        readings: &'a [StoredReading],
    ) -> Pin<Box<dyn Future<Output = Option<InsightReport>> + Send + 'a>>;
    /// Provider name for diagnostics.
    fn provider_name(&self) -> &'static str;
}

pub type DynAiClient = Arc<dyn AiClient>;

/// Factory: build a client from the environment.
///
/// * If `AI_TEST_MODE=mock`, returns a deterministic mock client.
/// * Else if `GEMINI_API_KEY` is absent or the placeholder, returns a
///   disabled client.
/// * Else builds the real Gemini client (`GEMINI_MODEL` overrides the model).
pub fn build_client_from_env() -> DynAiClient {
    if std::env::var("AI_TEST_MODE")
        .map(|v| v == "mock")
        .unwrap_or(false)
    {
        return Arc::new(MockClient::default());
    }

    match std::env::var("GEMINI_API_KEY") {
        Ok(key) if !key.is_empty() && key != "your_key_here" => {
            let model = std::env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
            Arc::new(GeminiClient::new(key, model))
        }
        _ => {
            warn!("GEMINI_API_KEY not configured; generative insights disabled");
            Arc::new(DisabledClient)
        }
    }
}

// ------------------------------------------------------------
// Gemini provider
// ------------------------------------------------------------

pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(api_key: String, model: String) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("weather-insight-pipeline/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(15))
            .build()
            .expect("reqwest client");
        Self {
            http,
            api_key,
            model,
        }
    }

    async fn generate_impl(&self, readings: &[StoredReading]) -> Option<InsightReport> {
        #[derive(Serialize)]
        struct Part<'a> {
            text: &'a str,
        }
        #[derive(Serialize)]
        struct Content<'a> {
            parts: Vec<Part<'a>>,
        }
        #[derive(Serialize)]
        struct GenerationConfig {
            temperature: f32,
            #[serde(rename = "maxOutputTokens")]
            max_output_tokens: u32,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            contents: Vec<Content<'a>>,
            #[serde(rename = "generationConfig")]
            generation_config: GenerationConfig,
        }
        #[derive(Deserialize)]
        struct Resp {
            candidates: Vec<Candidate>,
        }
        #[derive(Deserialize)]
        struct Candidate {
            content: CandidateContent,
        }
        #[derive(Deserialize)]
        struct CandidateContent {
            parts: Vec<CandidatePart>,
        }
        #[derive(Deserialize)]
        struct CandidatePart {
            text: String,
        }

        let prompt = build_prompt(readings);
        let req = Req {
            contents: vec![Content {
                parts: vec![Part { text: &prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.5,
                max_output_tokens: 1024,
            },
        };

        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
            self.model, self.api_key
        );

        let resp = match self.http.post(&url).json(&req).send().await {
            Ok(resp) => resp,
            Err(e) => {
                warn!(error = %e, "generative call failed");
                return None;
            }
        };
        if !resp.status().is_success() {
            warn!(status = %resp.status(), "generative call returned error status");
            return None;
        }
        let body: Resp = resp.json().await.ok()?;
        let text = body
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.as_str())?;

        debug!("generative response received");
        parse_ai_text(text, readings.len(), "gemini", &self.model)
    }
}

impl AiClient for GeminiClient {
    fn generate<'a>(
        &'a self,
        readings: &'a [StoredReading],
    ) -> Pin<Box<dyn Future<Output = Option<InsightReport>> + Send + 'a>> {
        Box::pin(self.generate_impl(readings))
    }
    fn provider_name(&self) -> &'static str {
        "gemini"
    }
}

/// Returns `None` always; used when no credential is configured.
pub struct DisabledClient;

impl AiClient for DisabledClient {
    fn generate<'a>(
        &'a self,
        _readings: &'a [StoredReading],
    ) -> Pin<Box<dyn Future<Output = Option<InsightReport>> + Send + 'a>> {
        Box::pin(async { None })
    }
    fn provider_name(&self) -> &'static str {
        "disabled"
    }
}

/// Deterministic client for tests/local runs (`AI_TEST_MODE=mock`).
#[derive(Clone)]
pub struct MockClient {
    pub summary: String,
}

impl Default for MockClient {
    fn default() -> Self {
        Self {
            summary: "Condições simuladas para testes.".to_string(),
        }
    }
}

impl AiClient for MockClient {
    fn generate<'a>(
        &'a self,
        readings: &'a [StoredReading],
    ) -> Pin<Box<dyn Future<Output = Option<InsightReport>> + Send + 'a>> {
        let report = InsightReport {
            summary: self.summary.clone(),
            details: Vec::new(),
            generated_at: Utc::now().to_rfc3339(),
            context: Some(InsightContext {
                data_points_analyzed: readings.len(),
                method: "generative".to_string(),
                ai_provider: Some("mock".to_string()),
                model: None,
            }),
            error: None,
        };
        Box::pin(async move { Some(report) })
    }
    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

// ------------------------------------------------------------
// Prompt + response parsing
// ------------------------------------------------------------

#[derive(Serialize)]
struct PromptReading<'a> {
    timestamp: &'a str,
    city: &'a str,
    temperature: f64,
    humidity: f64,
    #[serde(rename = "windSpeed")]
    wind_speed: f64,
    description: &'a str,
}

fn build_prompt(readings: &[StoredReading]) -> String {
    let projected: Vec<PromptReading<'_>> = readings
        .iter()
        .take(MAX_PROMPT_READINGS)
        .map(|row| PromptReading {
            timestamp: &row.reading.timestamp,
            city: &row.reading.location.city,
            temperature: row.reading.data.temperature,
            humidity: row.reading.data.humidity,
            wind_speed: row.reading.data.wind_speed,
            description: row
                .reading
                .data
                .description
                .as_deref()
                .unwrap_or("No description"),
        })
        .collect();
    let data = serde_json::to_string_pretty(&projected).unwrap_or_else(|_| "[]".to_string());

    format!(
        "Você é um assistente meteorológico especializado. Analise os seguintes dados \
meteorológicos das últimas 24 horas e gere insights em português do Brasil.\n\n\
Dados meteorológicos (mais recentes primeiro):\n{data}\n\n\
Sua tarefa:\n\
1. Identifique tendências (temperatura subindo/caindo, mudanças de umidade, etc.)\n\
2. Detecte anomalias ou condições extremas\n\
3. Forneça recomendações práticas se aplicável\n\n\
Retorne APENAS um JSON válido no seguinte formato:\n\
{{\"summary\": \"Resumo geral em uma frase\", \"details\": [{{\"type\": \"trend\", \
\"category\": \"temperature\", \"message\": \"Descrição da tendência\"}}]}}\n\n\
Tipos válidos: \"trend\", \"warning\", \"alert\", \"recommendation\"\n\
Categorias válidas: \"temperature\", \"humidity\", \"wind\", \"general\""
    )
}

#[derive(Deserialize)]
struct AiPayload {
    summary: String,
    #[serde(default)]
    details: Vec<InsightDetail>,
}

/// Parse the model's structured text into a report. Models love to wrap JSON
/// in code fences; strip those before parsing. Any mismatch yields `None`.
pub fn parse_ai_text(
    text: &str,
    data_points: usize,
    provider: &str,
    model: &str,
) -> Option<InsightReport> {
    let clean = text.replace("```json", "").replace("```", "");
    let payload: AiPayload = match serde_json::from_str(clean.trim()) {
        Ok(p) => p,
        Err(e) => {
            warn!(error = %e, "unparseable generative response");
            return None;
        }
    };
    Some(InsightReport {
        summary: payload.summary,
        details: payload.details,
        generated_at: Utc::now().to_rfc3339(),
        context: Some(InsightContext {
            data_points_analyzed: data_points,
            method: "generative".to_string(),
            ai_provider: Some(provider.to_string()),
            model: Some(model.to_string()),
        }),
        error: None,
    })
}
