//! Модуль обработки ошибок библиотеки voiceover-sync
//!
//! Этот модуль содержит типы ошибок, которые могут возникнуть при генерации озвучки.

use thiserror::Error;

/// Ошибки библиотеки voiceover-sync
#[derive(Debug, Error)]
pub enum TtsError {
    /// Ошибка конфигурации (например, не найден API ключ). Не повторяется.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Сетевая ошибка, таймаут или неуспешный HTTP статус. Повторяется.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Успешный ответ без аудио или без разметки. Не повторяется.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Поврежденная запись кэша. Наружу не выходит, запись считается промахом.
    #[error("Cache corruption: {0}")]
    CacheCorruption(String),

    /// Генерация не удалась после всех попыток
    #[error("Failed to generate voiceover after {attempts} attempts for \"{text_prefix}\": {source}")]
    Synthesis {
        attempts: u32,
        text_prefix: String,
        #[source]
        source: Box<TtsError>,
    },

    /// Ошибка ввода-вывода
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Ошибка сериализации/десериализации JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TtsError {
    /// Можно ли повторить попытку после этой ошибки
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

impl From<reqwest::Error> for TtsError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TtsError::Transport(format!("request timed out: {}", e))
        } else {
            TtsError::Transport(e.to_string())
        }
    }
}

/// Тип Result для библиотеки voiceover-sync
pub type Result<T> = std::result::Result<T, TtsError>;
