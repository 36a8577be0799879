//! Фасад для плагинного интерфейса анимационного фреймворка
//!
//! Сам ничего не синтезирует: переводит параметры и результат в формат,
//! который ожидает хост (`generate_from_text`, `calculate_cost`, хэш входных
//! данных), и делегирует работу [`VoiceoverGenerator`].

use std::path::{Path, PathBuf};
use log::info;
use serde::Serialize;
use crate::config::{
    resolve_api_key_with, VoiceSettings, VoiceoverConfig, API_KEY_ENV_VARS, DEFAULT_MODEL_ID,
    DEFAULT_VOICE_ID, SERVICE_TAG,
};
use crate::error::Result;
use crate::tts::cache::data_hash;
use crate::tts::elevenlabs::{voice_summary, ElevenLabsClient};
use crate::tts::types::{CharacterAlignment, VoiceInfo, WordTiming};
use crate::tts::SpeechTransport;
use crate::VoiceoverGenerator;

/// Параметры фасада
#[derive(Debug, Clone)]
pub struct TimedSpeechOptions {
    /// API ключ. Если не задан, ищется в переменных окружения
    pub api_key: Option<String>,
    pub voice_id: String,
    pub model_id: String,
    pub voice_settings: VoiceSettings,
    /// Директория для аудио
    pub cache_dir: PathBuf,
}

impl Default for TimedSpeechOptions {
    fn default() -> Self {
        Self {
            api_key: None,
            voice_id: DEFAULT_VOICE_ID.to_string(),
            model_id: DEFAULT_MODEL_ID.to_string(),
            voice_settings: VoiceSettings::default(),
            cache_dir: PathBuf::from("media/voiceovers"),
        }
    }
}

/// Входные данные, из которых строится имя файла
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LegacyInputData {
    pub input_text: String,
    pub service: String,
    pub voice_id: String,
}

/// Результат в формате хоста
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SpeechRecord {
    pub input_text: String,
    pub input_data: LegacyInputData,
    pub original_audio: String,
    pub word_timings: Vec<WordTiming>,
    pub character_alignment: CharacterAlignment,
    pub service: String,
    pub cost: f64,
    pub character_count: usize,
    pub from_cache: bool,
}

/// Сервис озвучки с таймингами для плагинного интерфейса
pub struct TimedSpeechService<T = ElevenLabsClient> {
    generator: VoiceoverGenerator<T>,
    cache_dir: PathBuf,
}

impl TimedSpeechService<ElevenLabsClient> {
    pub fn new(options: TimedSpeechOptions) -> Result<Self> {
        let api_key = resolve_legacy_api_key(&options)?;
        let config = legacy_config(&options, api_key);
        let transport = ElevenLabsClient::new(&config)?;
        Ok(Self::build(options, config, transport))
    }
}

impl<T: SpeechTransport> TimedSpeechService<T> {
    pub fn with_transport(options: TimedSpeechOptions, transport: T) -> Result<Self> {
        let api_key = resolve_legacy_api_key(&options)?;
        let config = legacy_config(&options, api_key);
        Ok(Self::build(options, config, transport))
    }

    fn build(options: TimedSpeechOptions, config: VoiceoverConfig, transport: T) -> Self {
        info!("ElevenLabs TTS initialized with voice: {}", config.voice_id);
        Self {
            generator: VoiceoverGenerator::with_transport(config, transport),
            cache_dir: options.cache_dir,
        }
    }

    pub fn voice_id(&self) -> &str {
        &self.generator.config().voice_id
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Количество попыток синтеза (из конфигурации, по умолчанию 3)
    pub fn max_retries(&self) -> u32 {
        self.generator.config().max_retries
    }

    pub fn calculate_cost(&self, text: &str) -> f64 {
        self.generator.config().estimate_cost(text)
    }

    pub fn input_data(&self, text: &str) -> LegacyInputData {
        LegacyInputData {
            input_text: text.to_string(),
            service: SERVICE_TAG.to_string(),
            voice_id: self.voice_id().to_string(),
        }
    }

    /// SHA-256 канонического JSON входных данных
    pub fn data_hash(&self, input: &LegacyInputData) -> String {
        data_hash(&[
            ("input_text", input.input_text.as_str()),
            ("service", input.service.as_str()),
            ("voice_id", input.voice_id.as_str()),
        ])
    }

    /// Сгенерировать аудио в `cache_dir`. Имя файла берется из `path` или
    /// из хэша входных данных.
    pub async fn generate_from_text(
        &self,
        text: &str,
        cache_dir: Option<&Path>,
        path: Option<&Path>,
    ) -> Result<SpeechRecord> {
        let cache_dir = cache_dir.unwrap_or(self.cache_dir.as_path());
        tokio::fs::create_dir_all(cache_dir).await?;

        let input_data = self.input_data(text);
        let hashed_name = format!("{}.mp3", self.data_hash(&input_data));
        let audio_filename = path
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_else(|| hashed_name.clone());
        let file_name = Path::new(&audio_filename)
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| hashed_name.into());
        let output_path = cache_dir.join(file_name);

        let result = self.generator.generate_default(text, &output_path).await?;

        Ok(SpeechRecord {
            input_text: text.to_string(),
            input_data,
            original_audio: audio_filename,
            word_timings: result.word_timings,
            character_alignment: result.character_alignment,
            service: SERVICE_TAG.to_string(),
            cost: result.cost,
            character_count: result.character_count,
            from_cache: result.from_cache,
        })
    }

    pub async fn available_voices(&self) -> Vec<VoiceInfo> {
        self.generator.list_voices().await
    }

    /// Текущий голос и несколько альтернатив из каталога
    pub async fn voice_summary(&self) -> String {
        let voices = self.available_voices().await;
        voice_summary(self.voice_id(), &voices)
    }
}

/// Фасад исторически не смотрит в `ELEVEN_API_KEY`
fn resolve_legacy_api_key(options: &TimedSpeechOptions) -> Result<String> {
    resolve_api_key_with(options.api_key.as_deref(), &API_KEY_ENV_VARS[..3], |name| {
        std::env::var(name).ok()
    })
}

fn legacy_config(options: &TimedSpeechOptions, api_key: String) -> VoiceoverConfig {
    VoiceoverConfig {
        api_key: Some(api_key),
        voice_id: options.voice_id.clone(),
        model_id: options.model_id.clone(),
        voice_settings: options.voice_settings,
        ..VoiceoverConfig::default()
    }
}
