//! Типы данных озвучки: запрос синтеза, разметка символов, тайминги слов
//! и итоговый результат.

use std::path::PathBuf;
use serde::{Deserialize, Serialize};
use crate::config::VoiceSettings;

/// Запрос синтеза. Полностью определяет результат при детерминированном бэкенде
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SynthesisRequest {
    pub text: String,
    #[serde(skip)]
    pub voice_id: String,
    pub model_id: String,
    pub voice_settings: VoiceSettings,
}

/// Посимвольная разметка времени, как её возвращает провайдер
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CharacterAlignment {
    #[serde(default)]
    pub characters: Vec<String>,
    #[serde(default)]
    pub character_start_times_seconds: Vec<f64>,
    #[serde(default)]
    pub character_end_times_seconds: Vec<f64>,
}

impl CharacterAlignment {
    pub fn is_empty(&self) -> bool {
        self.characters.is_empty()
    }
}

/// Временной интервал одного слова
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WordTiming {
    /// Текст слова (непустой, без пробелов по краям)
    pub text: String,
    /// Начало, секунды
    pub start: f64,
    /// Конец, секунды
    pub end: f64,
    pub char_start_index: usize,
    pub char_end_index: usize,
}

/// Содержимое файла `*.timing.json`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TimingDocument {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub word_timings: Vec<WordTiming>,
    #[serde(default)]
    pub character_alignment: CharacterAlignment,
}

/// Результат генерации озвучки
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct VoiceoverResult {
    /// Путь к аудиофайлу
    pub audio_path: PathBuf,
    /// Тайминги слов
    pub word_timings: Vec<WordTiming>,
    /// Исходная посимвольная разметка
    pub character_alignment: CharacterAlignment,
    /// Оценка стоимости в USD
    pub cost: f64,
    /// Количество символов текста
    pub character_count: usize,
    /// Результат взят из кэша
    pub from_cache: bool,
}

/// Голос из каталога ElevenLabs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VoiceInfo {
    pub voice_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}
