//! Анализ текста через Gemini с JSON-ответом

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use super::analysis::ScriptAnalyzer;
use super::models::AnalysisResult;
use crate::config::ProviderConfig;
use crate::credentials::Credential;
use crate::error::{ProviderError, Result, StoryvoxError};
use crate::tts::gemini::generate_content;

const ANALYSIS_PROMPT: &str = "You are preparing a novel chapter for a multi-voice audio drama. \
Split the text into an ordered script of lines. Every line has a speaker and the exact text to be read. \
Narration goes to the speaker \"Narrator\". Keep the original language and order; do not summarise. \
Also list every speaking character with their gender (male, female or neutral) and a short description \
of age and manner of speech. Respond with JSON only: \
{\"characters\": [{\"name\": \"\", \"gender\": \"\", \"description\": \"\"}], \
\"script\": [{\"speaker\": \"\", \"text\": \"\"}]}";

/// Анализатор сценария на основе Gemini
#[derive(Debug, Clone)]
pub struct GeminiAnalyzer {
    client: Client,
    base_url: String,
    model: String,
}

impl GeminiAnalyzer {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let client = Client::builder().build().map_err(StoryvoxError::Http)?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            model: config.analysis_model.clone(),
        })
    }
}

#[async_trait]
impl ScriptAnalyzer for GeminiAnalyzer {
    async fn analyze(
        &self,
        text: &str,
        credential: &Credential,
    ) -> std::result::Result<AnalysisResult, ProviderError> {
        let body = json!({
            "systemInstruction": { "parts": [{ "text": ANALYSIS_PROMPT }] },
            "contents": [{ "parts": [{ "text": text }] }],
            "generationConfig": { "responseMimeType": "application/json" }
        });

        log::info!("Sending analysis request ({} chars)", text.chars().count());
        let response = generate_content(&self.client, &self.base_url, &self.model, credential, &body).await?;
        let payload = response
            .text()
            .ok_or_else(|| ProviderError::InvalidResponse("analysis response has no text".to_string()))?;

        parse_analysis_payload(&payload)
    }
}

/// Разобрать JSON-ответ анализатора, допуская обёртку в markdown-блок
pub fn parse_analysis_payload(payload: &str) -> std::result::Result<AnalysisResult, ProviderError> {
    let trimmed = payload.trim();
    let json_text = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    serde_json::from_str(json_text)
        .map_err(|e| ProviderError::InvalidResponse(format!("malformed analysis JSON: {}", e)))
}
