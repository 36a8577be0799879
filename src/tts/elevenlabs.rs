//! Модуль для интеграции с ElevenLabs API
//!
//! HTTP клиент для эндпоинта `text-to-speech/{voice_id}/with-timestamps`,
//! декодирование ответа (base64 аудио + посимвольная разметка) и каталог голосов.

use std::fmt::Write as _;
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine};
use log::{debug, warn};
use reqwest::Client;
use serde::Deserialize;
use crate::config::VoiceoverConfig;
use crate::error::{Result, TtsError};
use crate::tts::types::{CharacterAlignment, SynthesisRequest, VoiceInfo};
use crate::tts::SpeechTransport;

/// Заголовок с API ключом
const API_KEY_HEADER: &str = "xi-api-key";

/// Клиент ElevenLabs
pub struct ElevenLabsClient {
    client: Client,
    base_url: String,
}

impl ElevenLabsClient {
    /// Создать клиент с таймаутом из конфигурации
    pub fn new(config: &VoiceoverConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| TtsError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn speech_url(&self, voice_id: &str) -> String {
        format!("{}/text-to-speech/{}/with-timestamps", self.base_url, voice_id)
    }

    pub fn voices_url(&self) -> String {
        format!("{}/voices", self.base_url)
    }

    async fn read_success_body(response: reqwest::Response) -> Result<String> {
        let status = response.status();
        if !status.is_success() {
            let error_text = match response.text().await {
                Ok(text) => text,
                Err(e) => format!("Failed to read error response: {}", e),
            };
            return Err(TtsError::Transport(format!(
                "ElevenLabs API error (status {}): {}",
                status, error_text
            )));
        }
        Ok(response.text().await?)
    }
}

#[async_trait]
impl SpeechTransport for ElevenLabsClient {
    async fn post_speech(&self, api_key: &str, request: &SynthesisRequest) -> Result<String> {
        let url = self.speech_url(&request.voice_id);
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, api_key)
            .json(request)
            .send()
            .await?;

        Self::read_success_body(response).await
    }

    async fn get_voices(&self, api_key: &str) -> Result<String> {
        let response = self
            .client
            .get(self.voices_url())
            .header(API_KEY_HEADER, api_key)
            .send()
            .await?;

        Self::read_success_body(response).await
    }
}

/// Ответ эндпоинта with-timestamps
#[derive(Debug, Deserialize)]
struct SpeechWithTimestampsResponse {
    #[serde(default)]
    audio_base64: Option<String>,
    #[serde(default)]
    alignment: Option<CharacterAlignment>,
}

/// Декодированный ответ синтеза
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedSpeech {
    pub audio: Vec<u8>,
    pub alignment: CharacterAlignment,
}

/// Разобрать тело успешного ответа. Любая проблема с содержимым дает `Decode`.
pub fn decode_speech_response(body: &str) -> Result<DecodedSpeech> {
    let response: SpeechWithTimestampsResponse = serde_json::from_str(body)
        .map_err(|e| TtsError::Decode(format!("Invalid response body: {}", e)))?;

    let audio_base64 = response
        .audio_base64
        .filter(|audio| !audio.is_empty())
        .ok_or_else(|| TtsError::Decode("Response has no audio_base64 payload".to_string()))?;

    let audio = general_purpose::STANDARD
        .decode(audio_base64.as_bytes())
        .map_err(|e| TtsError::Decode(format!("Failed to decode audio: {}", e)))?;
    if audio.is_empty() {
        return Err(TtsError::Decode("Decoded audio is empty".to_string()));
    }

    let alignment = response
        .alignment
        .ok_or_else(|| TtsError::Decode("Response has no alignment payload".to_string()))?;

    Ok(DecodedSpeech { audio, alignment })
}

#[derive(Debug, Deserialize)]
struct VoicesResponse {
    #[serde(default)]
    voices: Vec<VoiceInfo>,
}

/// Получить каталог голосов. Ошибки логируются, результат тогда пустой.
pub async fn list_voices<T>(transport: &T, api_key: &str) -> Vec<VoiceInfo>
where
    T: SpeechTransport + ?Sized,
{
    let voices = transport.get_voices(api_key).await.and_then(|body| {
        serde_json::from_str::<VoicesResponse>(&body)
            .map(|response| response.voices)
            .map_err(|e| TtsError::Decode(format!("Invalid voices response: {}", e)))
    });

    match voices {
        Ok(voices) => voices,
        Err(e) => {
            warn!("Could not fetch voices: {}", e);
            Vec::new()
        }
    }
}

/// Описание текущего голоса и первых пяти голосов каталога
pub fn voice_summary(current_voice_id: &str, voices: &[VoiceInfo]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Current Voice: {}", current_voice_id);
    if let Some(current) = voices.iter().find(|v| v.voice_id == current_voice_id) {
        let _ = writeln!(out, "   Name: {}", current.name.as_deref().unwrap_or("Unknown"));
        let _ = writeln!(
            out,
            "   Description: {}",
            current.description.as_deref().unwrap_or("No description")
        );
    }

    let _ = writeln!(out, "Available Voices ({} total):", voices.len());
    for voice in voices.iter().take(5) {
        let _ = writeln!(out, "   {}: {}", voice.voice_id, voice.name.as_deref().unwrap_or("Unnamed"));
    }
    if voices.len() > 5 {
        let _ = writeln!(out, "   ... and {} more", voices.len() - 5);
    }
    out
}
