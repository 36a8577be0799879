//! Модуль для кэширования результатов озвучки
//!
//! Кэш лежит рядом с выходным файлом: `{key}.mp3` и `{key}.timing.json`.
//! Ключ: SHA-256 канонического JSON `{service, text, voice_id}`, поэтому он
//! стабилен между запусками и платформами.

use std::fmt::{self, Write as _};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use log::{debug, info, warn};
use sha2::{Digest, Sha256};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use crate::config::{character_count, VoiceoverConfig};
use crate::error::{Result, TtsError};
use crate::tts::types::{TimingDocument, VoiceoverResult};

/// Ключ записи в кэше (64 hex символа)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Вычислить ключ для пары (текст, голос)
    pub fn new(text: &str, voice_id: &str, service_tag: &str) -> Self {
        Self(data_hash(&[("text", text), ("voice_id", voice_id), ("service", service_tag)]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// SHA-256 (hex) канонического JSON из строковых полей
pub fn data_hash(fields: &[(&str, &str)]) -> String {
    let digest = Sha256::digest(canonical_json(fields).as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Канонический JSON: ключи отсортированы, разделители `", "` и `": "`,
/// всё вне печатного ASCII экранируется как `\uXXXX`.
pub fn canonical_json(fields: &[(&str, &str)]) -> String {
    let mut sorted = fields.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let body = sorted
        .iter()
        .map(|(key, value)| format!("{}: {}", quote(key), quote(value)))
        .collect::<Vec<_>>()
        .join(", ");
    format!("{{{}}}", body)
}

fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            ' '..='~' => out.push(ch),
            _ => {
                let mut units = [0u16; 2];
                for unit in ch.encode_utf16(&mut units) {
                    let _ = write!(out, "\\u{:04x}", unit);
                }
            }
        }
    }
    out.push('"');
    out
}

/// Кэш озвучки в директории выходного файла
#[derive(Debug, Clone)]
pub struct VoiceoverCache {
    cache_dir: PathBuf,
    service_tag: String,
    audio_extension: String,
    cost_per_character: f64,
}

impl VoiceoverCache {
    /// Создать кэш в указанной директории
    pub fn new(cache_dir: impl Into<PathBuf>, config: &VoiceoverConfig) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            service_tag: config.service_tag.clone(),
            audio_extension: config.audio_extension.clone(),
            cost_per_character: config.cost_per_character,
        }
    }

    /// Кэш рядом с выходным файлом
    pub fn for_output(output_path: &Path, config: &VoiceoverConfig) -> Self {
        let cache_dir = output_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Self::new(cache_dir, config)
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn key_for(&self, text: &str, voice_id: &str) -> CacheKey {
        CacheKey::new(text, voice_id, &self.service_tag)
    }

    pub fn audio_path(&self, key: &CacheKey) -> PathBuf {
        self.cache_dir.join(format!("{}.{}", key, self.audio_extension))
    }

    pub fn timing_path(&self, key: &CacheKey) -> PathBuf {
        self.cache_dir.join(format!("{}.timing.json", key))
    }

    /// Найти готовую озвучку в кэше. Поврежденная запись считается промахом.
    pub async fn resolve(&self, text: &str, voice_id: &str) -> Option<VoiceoverResult> {
        let key = self.key_for(text, voice_id);
        let audio_path = self.audio_path(&key);
        let timing_path = self.timing_path(&key);

        if !path_exists(&audio_path).await || !path_exists(&timing_path).await {
            debug!("Cache miss for key {}", key);
            return None;
        }

        match read_timing_document(&timing_path).await {
            Ok(document) => {
                info!("Using cached audio for: {}", text_prefix(text));
                let count = character_count(text);
                Some(VoiceoverResult {
                    audio_path,
                    word_timings: document.word_timings,
                    character_alignment: document.character_alignment,
                    cost: count as f64 * self.cost_per_character,
                    character_count: count,
                    from_cache: true,
                })
            }
            Err(e) => {
                // Запись не перезаписывается: пока файлы не удалены, ключ промахивается
                warn!("Cache read error for key {}: {}, regenerating...", key, e);
                None
            }
        }
    }

    /// Сохранить запись в кэш, если её ещё нет. Существующие файлы не
    /// перезаписываются. Возвращает `true`, если запись создана этим вызовом.
    pub async fn store(&self, key: &CacheKey, audio: &[u8], document: &TimingDocument) -> Result<bool> {
        fs::create_dir_all(&self.cache_dir).await?;

        let timing = serde_json::to_string_pretty(document)?;
        let wrote_audio = write_new(&self.audio_path(key), audio).await?;
        let wrote_timing = write_new(&self.timing_path(key), timing.as_bytes()).await?;

        if wrote_audio || wrote_timing {
            debug!("Cached voiceover under key {}", key);
        } else {
            debug!("Cache entry {} already exists, keeping it", key);
        }
        Ok(wrote_audio && wrote_timing)
    }
}

async fn path_exists(path: &Path) -> bool {
    fs::try_exists(path).await.unwrap_or(false)
}

/// Прочитать файл таймингов
pub async fn read_timing_document(path: &Path) -> Result<TimingDocument> {
    let content = fs::read_to_string(path)
        .await
        .map_err(|e| TtsError::CacheCorruption(format!("{}: {}", path.display(), e)))?;
    serde_json::from_str(&content)
        .map_err(|e| TtsError::CacheCorruption(format!("{}: {}", path.display(), e)))
}

/// Записать файл, только если его ещё нет
async fn write_new(path: &Path, bytes: &[u8]) -> Result<bool> {
    match OpenOptions::new().write(true).create_new(true).open(path).await {
        Ok(mut file) => {
            file.write_all(bytes).await?;
            file.flush().await?;
            Ok(true)
        }
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Первые 50 символов текста для логов и ошибок
pub fn text_prefix(text: &str) -> String {
    text.chars().take(50).collect()
}
