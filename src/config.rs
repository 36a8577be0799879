//! Модуль конфигурации библиотеки voiceover-sync
//!
//! Этот модуль содержит параметры голоса, параметры запросов к ElevenLabs
//! и разрешение API ключа.

use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::error::{Result, TtsError};

/// Базовый URL ElevenLabs API
pub const DEFAULT_BASE_URL: &str = "https://api.elevenlabs.io/v1";

/// Голос по умолчанию (Ewen)
pub const DEFAULT_VOICE_ID: &str = "K80wneyktrw2rE11kA2W";

/// Модель синтеза по умолчанию
pub const DEFAULT_MODEL_ID: &str = "eleven_multilingual_v2";

/// Тег сервиса, участвующий в ключе кэша
pub const SERVICE_TAG: &str = "elevenlabs_timed";

/// Переменные окружения с API ключом, в порядке приоритета
pub const API_KEY_ENV_VARS: [&str; 4] = [
    "ELEVENLABS_API_KEY",
    "elevenlabs_key",
    "ELEVENLABS_KEY",
    "ELEVEN_API_KEY",
];

/// Параметры голоса, передаваемые в запросе синтеза
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct VoiceSettings {
    /// Стабильность голоса (0.0 - 1.0, выше = ровнее)
    pub stability: f32,
    /// Близость к оригинальному голосу (0.0 - 1.0)
    pub similarity_boost: f32,
    /// Выразительность (0.0 - 1.0)
    pub style: f32,
    /// Использовать speaker boost
    pub use_speaker_boost: bool,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            stability: 0.5,
            similarity_boost: 0.75,
            style: 0.0,
            use_speaker_boost: true,
        }
    }
}

/// Конфигурация генератора озвучки
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceoverConfig {
    /// API ключ ElevenLabs. Если не задан, ищется в переменных окружения
    pub api_key: Option<String>,
    /// Базовый URL API
    pub base_url: String,
    /// Модель синтеза
    pub model_id: String,
    /// Голос по умолчанию
    pub voice_id: String,
    /// Параметры голоса
    pub voice_settings: VoiceSettings,
    /// Таймаут одного HTTP запроса в секундах
    pub request_timeout_secs: u64,
    /// Количество попыток по умолчанию
    pub max_retries: u32,
    /// Пауза между попытками в миллисекундах (0 = повтор сразу)
    pub retry_delay_ms: u64,
    /// Стоимость одного символа в USD
    pub cost_per_character: f64,
    /// Тег сервиса для ключа кэша
    pub service_tag: String,
    /// Расширение аудиофайлов в кэше
    pub audio_extension: String,
}

impl Default for VoiceoverConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model_id: DEFAULT_MODEL_ID.to_string(),
            voice_id: DEFAULT_VOICE_ID.to_string(),
            voice_settings: VoiceSettings::default(),
            request_timeout_secs: 60,
            max_retries: 3,
            retry_delay_ms: 0,
            // ~$0.30 per 1,000 characters, not verified against the provider
            cost_per_character: 0.0003,
            service_tag: SERVICE_TAG.to_string(),
            audio_extension: "mp3".to_string(),
        }
    }
}

impl VoiceoverConfig {
    /// Задать API ключ явно
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Задать базовый URL API
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Задать голос по умолчанию
    pub fn with_voice_id(mut self, voice_id: impl Into<String>) -> Self {
        self.voice_id = voice_id.into();
        self
    }

    /// Задать количество попыток по умолчанию
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Задать параметры голоса
    pub fn with_voice_settings(mut self, voice_settings: VoiceSettings) -> Self {
        self.voice_settings = voice_settings;
        self
    }

    /// Задать паузу между попытками
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Оценка стоимости синтеза: линейная модель по числу символов
    pub fn estimate_cost(&self, text: &str) -> f64 {
        character_count(text) as f64 * self.cost_per_character
    }

    /// Получить API ключ из конфигурации или переменных окружения
    pub fn resolve_api_key(&self) -> Result<String> {
        resolve_api_key_with(self.api_key.as_deref(), &API_KEY_ENV_VARS, |name| {
            std::env::var(name).ok()
        })
    }
}

/// Количество символов текста (Unicode scalar values)
pub fn character_count(text: &str) -> usize {
    text.chars().count()
}

/// Разрешение API ключа: явное значение, затем переменные окружения по порядку.
/// Побеждает первое непустое значение.
pub fn resolve_api_key_with<F>(explicit: Option<&str>, env_vars: &[&str], lookup: F) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(key) = explicit.filter(|key| !key.trim().is_empty()) {
        return Ok(key.to_string());
    }

    env_vars
        .iter()
        .filter_map(|name| lookup(name))
        .find(|value| !value.trim().is_empty())
        .ok_or_else(|| {
            TtsError::Configuration(format!(
                "ElevenLabs API key required. Set {} environment variable.",
                env_vars.first().copied().unwrap_or("ELEVENLABS_API_KEY")
            ))
        })
}
