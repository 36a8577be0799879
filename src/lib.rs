//! Основной файл библиотеки voiceover-sync
//!
//! Библиотека превращает текст озвучки в аудиофайл, тайминги слов и оценку
//! стоимости для видеопайплайна. Повторные запросы с тем же текстом и голосом
//! обслуживаются из кэша рядом с выходным файлом, сетевые сбои повторяются
//! ограниченное число раз.
//!
//! Одинаковые запросы, выполняемые одновременно, не координируются: оба могут
//! промахнуться мимо кэша и оба заплатить за синтез. Запись в кэш не
//! перезаписывает уже существующие файлы, поэтому первая запись сохраняется.
//! Прогресс каждого вызова `generate` отслеживается отдельно, наблюдатели
//! общие.

pub mod config;
pub mod error;
pub mod notification;
pub mod progress;
pub mod tts;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use log::{error, info, warn};

pub use crate::config::{VoiceSettings, VoiceoverConfig};
pub use crate::error::{Result, TtsError};
pub use crate::tts::cache::{CacheKey, VoiceoverCache};
pub use crate::tts::elevenlabs::ElevenLabsClient;
pub use crate::tts::service::{SpeechRecord, TimedSpeechOptions, TimedSpeechService};
pub use crate::tts::timing::reconstruct;
pub use crate::tts::types::{
    CharacterAlignment, SynthesisRequest, TimingDocument, VoiceInfo, VoiceoverResult, WordTiming,
};
pub use crate::tts::SpeechTransport;

use crate::config::character_count;
use crate::progress::{ProcessStep, ProgressReporter, ProgressTracker};
use crate::tts::cache::text_prefix;
use crate::tts::elevenlabs::{decode_speech_response, list_voices, DecodedSpeech};
use crate::tts::timing::reconstruct_alignment;

/// Генератор озвучки
pub struct VoiceoverGenerator<T = ElevenLabsClient> {
    /// Конфигурация
    config: VoiceoverConfig,
    /// Транспорт до API
    transport: T,
    /// Репортер прогресса, общий для всех запросов
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
}

impl VoiceoverGenerator<ElevenLabsClient> {
    /// Создать генератор с HTTP клиентом ElevenLabs
    pub fn new(config: VoiceoverConfig) -> Result<Self> {
        let transport = ElevenLabsClient::new(&config)?;
        Ok(Self::with_transport(config, transport))
    }
}

impl<T: SpeechTransport> VoiceoverGenerator<T> {
    /// Создать генератор с произвольным транспортом
    pub fn with_transport(config: VoiceoverConfig, transport: T) -> Self {
        Self {
            config,
            transport,
            progress_reporter: None,
        }
    }

    /// Подключить репортер прогресса
    pub fn with_progress_reporter(mut self, reporter: Box<dyn ProgressReporter>) -> Self {
        self.progress_reporter = Some(Arc::from(reporter));
        self
    }

    pub fn config(&self) -> &VoiceoverConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Сгенерировать озвучку голосом и числом попыток из конфигурации
    pub async fn generate_default(
        &self,
        text: &str,
        output_path: impl AsRef<Path>,
    ) -> Result<VoiceoverResult> {
        self.generate(text, output_path, &self.config.voice_id, self.config.max_retries)
            .await
    }

    /// Сгенерировать озвучку с таймингами слов.
    ///
    /// Сначала проверяется кэш рядом с `output_path`. При промахе делается до
    /// `max_retries` попыток синтеза (0 считается одной попыткой). Повторяются
    /// только сетевые ошибки; ошибка декодирования успешного ответа сразу
    /// завершает генерацию.
    pub async fn generate(
        &self,
        text: &str,
        output_path: impl AsRef<Path>,
        voice_id: &str,
        max_retries: u32,
    ) -> Result<VoiceoverResult> {
        let output_path = output_path.as_ref();
        let progress = self.progress_reporter.clone().map(ProgressTracker::with_shared_reporter);
        let tracker = progress.as_ref();

        if let Some(t) = tracker {
            t.begin(Some(text_prefix(text)));
        }

        if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let api_key = self.config.resolve_api_key()?;

        let cache = VoiceoverCache::for_output(output_path, &self.config);
        if let Some(cached) = cache.resolve(text, voice_id).await {
            if let Some(t) = tracker {
                t.complete(Some("Loaded from cache".to_string()));
            }
            return Ok(cached);
        }

        let request = SynthesisRequest {
            text: text.to_string(),
            voice_id: voice_id.to_string(),
            model_id: self.config.model_id.clone(),
            voice_settings: self.config.voice_settings,
        };

        if let Some(t) = tracker {
            t.set_step(ProcessStep::SpeechSynthesis);
        }

        let max_attempts = max_retries.max(1);
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            info!("Generating audio (attempt {}/{}): {}", attempt, max_attempts, text_prefix(text));
            if let Some(t) = tracker {
                let progress = (attempt - 1) as f32 / max_attempts as f32 * 100.0;
                t.update_step_progress(progress, Some(format!("Attempt {}/{}", attempt, max_attempts)));
            }

            match self.attempt(&api_key, &request, output_path, &cache, tracker).await {
                Ok(result) => {
                    if let Some(t) = tracker {
                        t.complete(Some(format!("Generated in {} attempt(s)", attempt)));
                    }
                    return Ok(result);
                }
                Err(e) if e.is_retryable() => {
                    error!("Attempt {} failed: {}", attempt, e);
                    last_error = Some(e);
                    if attempt < max_attempts {
                        info!("Retrying...");
                        let delay = self.config.retry_delay();
                        if !delay.is_zero() {
                            tokio::time::sleep(delay).await;
                        }
                    }
                }
                Err(e) => {
                    error!("Attempt {} failed permanently: {}", attempt, e);
                    return Err(TtsError::Synthesis {
                        attempts: attempt,
                        text_prefix: text_prefix(text),
                        source: Box::new(e),
                    });
                }
            }
        }

        let source = last_error
            .unwrap_or_else(|| TtsError::Transport("no attempts were made".to_string()));
        Err(TtsError::Synthesis {
            attempts: max_attempts,
            text_prefix: text_prefix(text),
            source: Box::new(source),
        })
    }

    /// Одна попытка: запрос, декодирование, сохранение
    async fn attempt(
        &self,
        api_key: &str,
        request: &SynthesisRequest,
        output_path: &Path,
        cache: &VoiceoverCache,
        tracker: Option<&ProgressTracker>,
    ) -> Result<VoiceoverResult> {
        let body = self.transport.post_speech(api_key, request).await?;
        let decoded = decode_speech_response(&body)?;

        if let Some(t) = tracker {
            t.set_step(ProcessStep::Persistence);
        }
        self.persist(request, decoded, output_path, cache).await
    }

    async fn persist(
        &self,
        request: &SynthesisRequest,
        decoded: DecodedSpeech,
        output_path: &Path,
        cache: &VoiceoverCache,
    ) -> Result<VoiceoverResult> {
        let DecodedSpeech { audio, alignment } = decoded;

        tokio::fs::write(output_path, &audio).await?;
        info!("Audio saved: {} ({} bytes)", output_path.display(), audio.len());

        let document = TimingDocument {
            text: request.text.clone(),
            word_timings: reconstruct_alignment(&alignment),
            character_alignment: alignment,
        };
        tokio::fs::write(timing_path_for(output_path), serde_json::to_string_pretty(&document)?).await?;

        let key = cache.key_for(&request.text, &request.voice_id);
        cache.store(&key, &audio, &document).await?;

        let count = character_count(&request.text);
        let cost = self.config.estimate_cost(&request.text);
        info!("Cost: ${:.4} ({} characters)", cost, count);

        Ok(VoiceoverResult {
            audio_path: output_path.to_path_buf(),
            word_timings: document.word_timings,
            character_alignment: document.character_alignment,
            cost,
            character_count: count,
            from_cache: false,
        })
    }

    /// Каталог голосов. Только для диагностики: при любой ошибке пустой список.
    pub async fn list_voices(&self) -> Vec<VoiceInfo> {
        match self.config.resolve_api_key() {
            Ok(api_key) => list_voices(&self.transport, &api_key).await,
            Err(e) => {
                warn!("Could not fetch voices: {}", e);
                Vec::new()
            }
        }
    }
}

/// Путь к файлу таймингов рядом с аудио: `section_1.mp3` -> `section_1.timing.json`
pub fn timing_path_for(output_path: &Path) -> PathBuf {
    output_path.with_extension("timing.json")
}

/// Публичный API для пайплайна: озвучка с настройками по умолчанию
pub async fn generate_voiceover(
    text: &str,
    output_path: impl AsRef<Path>,
    voice_id: &str,
    retries: u32,
) -> Result<VoiceoverResult> {
    let generator = VoiceoverGenerator::new(VoiceoverConfig::default())?;
    generator.generate(text, output_path, voice_id, retries).await
}

/// Инициализировать env_logger (уровень `info`, переопределяется через `RUST_LOG`)
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}
