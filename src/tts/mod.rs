//! Модуль для работы с TTS
//!
//! Этот модуль содержит клиент ElevenLabs, кэш озвучки, восстановление
//! таймингов слов и фасад для плагинного интерфейса.

pub mod cache;
pub mod elevenlabs;
pub mod service;
pub mod timing;
pub mod types;

use async_trait::async_trait;
use crate::error::Result;
use crate::tts::types::SynthesisRequest;

/// Сетевой транспорт до провайдера TTS.
///
/// `Ok` означает успешный HTTP статус и содержит тело ответа. Неуспешный
/// статус, таймаут и сетевые сбои возвращаются как `TtsError::Transport`.
#[async_trait]
pub trait SpeechTransport: Send + Sync {
    /// Запрос синтеза с посимвольными метками времени
    async fn post_speech(&self, api_key: &str, request: &SynthesisRequest) -> Result<String>;

    /// Каталог голосов
    async fn get_voices(&self, api_key: &str) -> Result<String>;
}
