//! Модуль для интеграции с Gemini API
//!
//! Синтез речи через модель с аудио-ответом. Общие типы запроса и ответа
//! используются также анализатором сценария.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};

use super::SpeechSynthesizer;
use crate::config::ProviderConfig;
use crate::credentials::Credential;
use crate::error::{ProviderError, Result, StoryvoxError};

/// Ответ `generateContent`
#[derive(Debug, Deserialize)]
pub(crate) struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Candidate {
    pub content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Part {
    pub text: Option<String>,
    pub inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct InlineData {
    #[allow(dead_code)]
    pub mime_type: Option<String>,
    pub data: String,
}

impl GenerateContentResponse {
    /// Первый фрагмент с аудио-данными
    pub fn inline_audio(self) -> Option<String> {
        self.parts().find_map(|part| part.inline_data.map(|inline| inline.data))
    }

    /// Весь текст первого кандидата
    pub fn text(self) -> Option<String> {
        let text: String = self.parts().filter_map(|part| part.text).collect();
        if text.is_empty() { None } else { Some(text) }
    }

    fn parts(self) -> impl Iterator<Item = Part> {
        self.candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| content.parts)
            .unwrap_or_default()
            .into_iter()
    }
}

/// Отправить запрос `generateContent` и разобрать ответ
pub(crate) async fn generate_content(
    client: &Client,
    base_url: &str,
    model: &str,
    credential: &Credential,
    body: &Value,
) -> std::result::Result<GenerateContentResponse, ProviderError> {
    let url = format!("{}/models/{}:generateContent", base_url.trim_end_matches('/'), model);

    let response = client
        .post(&url)
        .header("x-goog-api-key", credential.token())
        .header("Content-Type", "application/json")
        .json(body)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let error_text = match response.text().await {
            Ok(text) => text,
            Err(e) => format!("Failed to read error response: {}", e),
        };
        return Err(classify_error(status, &error_text));
    }

    response
        .json::<GenerateContentResponse>()
        .await
        .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse response: {}", e)))
}

/// Отличить превышение лимита от прочих ошибок
pub(crate) fn classify_error(status: StatusCode, body: &str) -> ProviderError {
    if status == StatusCode::TOO_MANY_REQUESTS || body.contains("RESOURCE_EXHAUSTED") {
        return ProviderError::RateLimited(format!("status {}", status));
    }

    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| value["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.to_string());
    ProviderError::Http(format!("API error ({}): {}", status, message))
}

/// Синтез речи через Gemini
#[derive(Debug, Clone)]
pub struct GeminiSpeech {
    client: Client,
    base_url: String,
    model: String,
}

impl GeminiSpeech {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let client = Client::builder().build().map_err(StoryvoxError::Http)?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            model: config.tts_model.clone(),
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for GeminiSpeech {
    async fn synthesize(
        &self,
        text: &str,
        voice: &str,
        credential: &Credential,
    ) -> std::result::Result<String, ProviderError> {
        let body = json!({
            "contents": [{ "parts": [{ "text": text }] }],
            "generationConfig": {
                "responseModalities": ["AUDIO"],
                "speechConfig": {
                    "voiceConfig": {
                        "prebuiltVoiceConfig": { "voiceName": voice }
                    }
                }
            }
        });

        log::debug!(
            "Sending TTS request ({} chars, voice {}) with credential {}",
            text.chars().count(),
            voice,
            credential.masked()
        );

        let response = generate_content(&self.client, &self.base_url, &self.model, credential, &body).await?;
        match response.inline_audio() {
            Some(data) if !data.is_empty() => Ok(data),
            _ => Err(ProviderError::EmptyAudio),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_rate_limit() {
        assert!(classify_error(StatusCode::TOO_MANY_REQUESTS, "").is_rate_limit());
        assert!(
            classify_error(
                StatusCode::BAD_REQUEST,
                r#"{"error": {"status": "RESOURCE_EXHAUSTED", "message": "quota"}}"#
            )
            .is_rate_limit()
        );
    }

    #[test]
    fn test_classify_other_errors() {
        let error = classify_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"error": {"message": "backend unavailable"}}"#,
        );
        assert!(!error.is_rate_limit());
        assert!(error.to_string().contains("backend unavailable"));
    }

    #[test]
    fn test_response_extracts_audio() {
        let response: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates": [{"content": {"parts": [
                {"inlineData": {"mimeType": "audio/L16;codec=pcm;rate=24000", "data": "AAEC"}}
            ]}}]}"#,
        )
        .unwrap();
        assert_eq!(response.inline_audio().as_deref(), Some("AAEC"));
    }

    #[test]
    fn test_response_without_candidates() {
        let response: GenerateContentResponse = serde_json::from_str(r#"{"candidates": []}"#).unwrap();
        assert!(response.inline_audio().is_none());

        let response: GenerateContentResponse = serde_json::from_str(r#"{}"#).unwrap();
        assert!(response.text().is_none());
    }
}
