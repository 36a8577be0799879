//! Интеграционные тесты генерации озвучки
//!
//! Используют транспорт в памяти вместо ElevenLabs API: он считает вызовы и
//! отвечает по заданному сценарию.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine};
use voiceover_sync::notification::MemoryProgressObserver;
use voiceover_sync::progress::{DefaultProgressReporter, ProgressReporter};
use voiceover_sync::{
    timing_path_for, CacheKey, Result, SpeechTransport, SynthesisRequest, TimedSpeechOptions,
    TimedSpeechService, TimingDocument, TtsError, VoiceoverCache, VoiceoverConfig,
    VoiceoverGenerator,
};

const VOICE: &str = "test-voice";

/// Сценарий ответов транспорта
#[derive(Debug, Clone)]
enum MockBehavior {
    /// Всегда успешный ответ
    Success,
    /// Сетевая ошибка N раз, затем успех
    FailThenSuccess { failures: usize },
    /// Всегда сетевая ошибка
    AlwaysFail,
    /// Успешный статус без аудио
    MissingAudio,
}

struct MockTransport {
    behavior: MockBehavior,
    calls: AtomicUsize,
    requests: Mutex<Vec<SynthesisRequest>>,
    voices_body: Option<String>,
}

impl MockTransport {
    fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            voices_body: None,
        }
    }

    fn with_voices(mut self, body: &str) -> Self {
        self.voices_body = Some(body.to_string());
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// Ответ провайдера: каждый символ звучит 0.1 с
fn speech_body(text: &str) -> String {
    let characters: Vec<String> = text.chars().map(|c| c.to_string()).collect();
    let starts: Vec<f64> = (0..characters.len()).map(|i| i as f64 * 0.1).collect();
    let ends: Vec<f64> = (0..characters.len()).map(|i| (i + 1) as f64 * 0.1).collect();

    serde_json::json!({
        "audio_base64": general_purpose::STANDARD.encode(format!("fake-mp3:{}", text)),
        "alignment": {
            "characters": characters,
            "character_start_times_seconds": starts,
            "character_end_times_seconds": ends,
        }
    })
    .to_string()
}

#[async_trait]
impl SpeechTransport for MockTransport {
    async fn post_speech(&self, _api_key: &str, request: &SynthesisRequest) -> Result<String> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());

        match &self.behavior {
            MockBehavior::Success => Ok(speech_body(&request.text)),
            MockBehavior::FailThenSuccess { failures } if call < *failures => {
                Err(TtsError::Transport("status 503: overloaded".to_string()))
            }
            MockBehavior::FailThenSuccess { .. } => Ok(speech_body(&request.text)),
            MockBehavior::AlwaysFail => Err(TtsError::Transport("connection refused".to_string())),
            MockBehavior::MissingAudio => Ok(r#"{"alignment": {"characters": []}}"#.to_string()),
        }
    }

    async fn get_voices(&self, _api_key: &str) -> Result<String> {
        self.voices_body
            .clone()
            .ok_or_else(|| TtsError::Transport("status 401: unauthorized".to_string()))
    }
}

fn config() -> VoiceoverConfig {
    VoiceoverConfig::default().with_api_key("test-key")
}

fn mock_generator(behavior: MockBehavior) -> VoiceoverGenerator<MockTransport> {
    VoiceoverGenerator::with_transport(config(), MockTransport::new(behavior))
}

#[tokio::test]
async fn test_generates_audio_timings_and_cache() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("job/section_1.mp3");
    let generator = mock_generator(MockBehavior::Success);

    let result = generator.generate("hi there", &output, VOICE, 3).await.unwrap();

    assert!(!result.from_cache);
    assert_eq!(result.audio_path, output);
    assert_eq!(result.character_count, 8);
    assert!((result.cost - 8.0 * 0.0003).abs() < 1e-12);
    let texts: Vec<&str> = result.word_timings.iter().map(|w| w.text.as_str()).collect();
    assert_eq!(texts, vec!["hi", "there"]);

    // Основные файлы
    assert_eq!(std::fs::read(&output).unwrap(), b"fake-mp3:hi there");
    let timing: TimingDocument =
        serde_json::from_str(&std::fs::read_to_string(timing_path_for(&output)).unwrap()).unwrap();
    assert_eq!(timing.text, "hi there");
    assert_eq!(timing.word_timings, result.word_timings);

    // Копия в кэше рядом с выходным файлом
    let cache = VoiceoverCache::for_output(&output, generator.config());
    let key = CacheKey::new("hi there", VOICE, "elevenlabs_timed");
    assert!(cache.audio_path(&key).exists());
    assert!(cache.timing_path(&key).exists());

    // Запрос собран из конфигурации
    let requests = generator.transport().requests.lock().unwrap();
    assert_eq!(requests[0].voice_id, VOICE);
    assert_eq!(requests[0].model_id, "eleven_multilingual_v2");
    assert_eq!(requests[0].voice_settings.stability, 0.5);
}

#[tokio::test]
async fn test_second_identical_request_uses_cache() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("section_1.mp3");
    let generator = mock_generator(MockBehavior::Success);

    let first = generator.generate("Hello world", &output, VOICE, 3).await.unwrap();
    let second = generator.generate("Hello world", &output, VOICE, 3).await.unwrap();

    assert_eq!(generator.transport().calls(), 1);
    assert!(second.from_cache);
    assert_eq!(second.word_timings, first.word_timings);
    assert_eq!(second.character_alignment, first.character_alignment);
    assert_eq!(second.cost, first.cost);

    let key = CacheKey::new("Hello world", VOICE, "elevenlabs_timed");
    assert_eq!(second.audio_path, dir.path().join(format!("{}.mp3", key)));
}

#[tokio::test]
async fn test_cache_is_shared_by_outputs_in_same_directory() {
    let dir = tempfile::tempdir().unwrap();
    let generator = mock_generator(MockBehavior::Success);

    generator.generate("Shared line", dir.path().join("a.mp3"), VOICE, 3).await.unwrap();
    let other = generator.generate("Shared line", dir.path().join("b.mp3"), VOICE, 3).await.unwrap();
    let other_voice = generator.generate("Shared line", dir.path().join("c.mp3"), "another", 3).await.unwrap();

    assert!(other.from_cache);
    assert!(!other_voice.from_cache);
    assert_eq!(generator.transport().calls(), 2);
}

#[tokio::test]
async fn test_retry_exhaustion() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("section.mp3");
    let generator = mock_generator(MockBehavior::AlwaysFail);

    let error = generator.generate("never works", &output, VOICE, 3).await.unwrap_err();

    assert_eq!(generator.transport().calls(), 3);
    match &error {
        TtsError::Synthesis { attempts, text_prefix, source } => {
            assert_eq!(*attempts, 3);
            assert_eq!(text_prefix, "never works");
            assert!(matches!(**source, TtsError::Transport(_)));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(error.to_string().contains("after 3 attempts"));
    assert!(!output.exists());
}

#[tokio::test]
async fn test_transient_failure_is_retried() {
    let dir = tempfile::tempdir().unwrap();
    let generator = mock_generator(MockBehavior::FailThenSuccess { failures: 2 });

    let result = generator
        .generate("third time lucky", dir.path().join("out.mp3"), VOICE, 3)
        .await
        .unwrap();

    assert_eq!(generator.transport().calls(), 3);
    assert_eq!(result.word_timings.len(), 3);
}

#[tokio::test]
async fn test_zero_retries_still_makes_one_attempt() {
    let dir = tempfile::tempdir().unwrap();
    let generator = mock_generator(MockBehavior::AlwaysFail);

    let error = generator.generate("once", dir.path().join("out.mp3"), VOICE, 0).await.unwrap_err();

    assert_eq!(generator.transport().calls(), 1);
    assert!(matches!(error, TtsError::Synthesis { attempts: 1, .. }));
}

#[tokio::test]
async fn test_decode_error_is_not_retried() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.mp3");
    let generator = mock_generator(MockBehavior::MissingAudio);

    let error = generator.generate("no audio", &output, VOICE, 3).await.unwrap_err();

    assert_eq!(generator.transport().calls(), 1);
    match error {
        TtsError::Synthesis { attempts, source, .. } => {
            assert_eq!(attempts, 1);
            assert!(matches!(*source, TtsError::Decode(_)));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(!output.exists());
}

#[tokio::test]
async fn test_missing_credential_fails_before_network() {
    for name in ["ELEVENLABS_API_KEY", "elevenlabs_key", "ELEVENLABS_KEY", "ELEVEN_API_KEY"] {
        std::env::remove_var(name);
    }
    let dir = tempfile::tempdir().unwrap();
    let generator =
        VoiceoverGenerator::with_transport(VoiceoverConfig::default(), MockTransport::new(MockBehavior::Success));

    let error = generator.generate("hello", dir.path().join("out.mp3"), VOICE, 3).await.unwrap_err();

    assert!(matches!(error, TtsError::Configuration(_)));
    assert_eq!(generator.transport().calls(), 0);
}

#[tokio::test]
async fn test_empty_text() {
    let dir = tempfile::tempdir().unwrap();
    let generator = mock_generator(MockBehavior::Success);

    let result = generator.generate("", dir.path().join("empty.mp3"), VOICE, 3).await.unwrap();

    assert!(result.word_timings.is_empty());
    assert_eq!(result.cost, 0.0);
    assert_eq!(result.character_count, 0);
}

#[tokio::test]
async fn test_whitespace_heavy_text_has_no_empty_words() {
    let dir = tempfile::tempdir().unwrap();
    let generator = mock_generator(MockBehavior::Success);

    let result = generator
        .generate("  Welcome   to\n\tthe  show \n", dir.path().join("out.mp3"), VOICE, 3)
        .await
        .unwrap();

    let texts: Vec<&str> = result.word_timings.iter().map(|w| w.text.as_str()).collect();
    assert_eq!(texts, vec!["Welcome", "to", "the", "show"]);
}

#[tokio::test]
async fn test_corrupt_cache_entry_is_regenerated() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.mp3");
    let generator = mock_generator(MockBehavior::Success);

    let cache = VoiceoverCache::for_output(&output, generator.config());
    let key = cache.key_for("repair me", VOICE);
    std::fs::write(cache.audio_path(&key), b"stale").unwrap();
    std::fs::write(cache.timing_path(&key), b"{ truncated").unwrap();

    let result = generator.generate("repair me", &output, VOICE, 3).await.unwrap();

    assert!(!result.from_cache);
    assert_eq!(generator.transport().calls(), 1);
    // Существующие файлы кэша не перезаписываются
    assert_eq!(std::fs::read(cache.audio_path(&key)).unwrap(), b"stale");
}

#[tokio::test]
async fn test_progress_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let observer = MemoryProgressObserver::new();
    let mut reporter = DefaultProgressReporter::new();
    reporter.add_observer(Box::new(observer.clone()));

    let generator = VoiceoverGenerator::with_transport(config(), MockTransport::new(MockBehavior::Success))
        .with_progress_reporter(Box::new(reporter));

    generator.generate("progress", dir.path().join("out.mp3"), VOICE, 3).await.unwrap();

    let history = observer.history();
    assert!(history.iter().any(|p| p.details.as_deref() == Some("Attempt 1/3")));
    assert!(history.iter().any(|p| p.step == "Persistence"));
    assert_eq!(history.last().unwrap().total_progress, 100.0);
}

#[tokio::test]
async fn test_voice_catalog() {
    let transport = MockTransport::new(MockBehavior::Success)
        .with_voices(r#"{"voices": [{"voice_id": "a", "name": "Ewen"}, {"voice_id": "b"}]}"#);
    let generator = VoiceoverGenerator::with_transport(config(), transport);

    let voices = generator.list_voices().await;
    assert_eq!(voices.len(), 2);
    assert_eq!(voices[0].name.as_deref(), Some("Ewen"));

    // Ошибка каталога не пробрасывается
    let failing = mock_generator(MockBehavior::Success);
    assert!(failing.list_voices().await.is_empty());
}

#[tokio::test]
async fn test_legacy_service_names_output_by_hash() {
    let dir = tempfile::tempdir().unwrap();
    let options = TimedSpeechOptions {
        api_key: Some("test-key".to_string()),
        voice_id: VOICE.to_string(),
        cache_dir: dir.path().to_path_buf(),
        ..TimedSpeechOptions::default()
    };
    let service = TimedSpeechService::with_transport(options, MockTransport::new(MockBehavior::Success)).unwrap();

    let record = service.generate_from_text("Legacy hello", None, None).await.unwrap();
    let expected_name = format!("{}.mp3", service.data_hash(&service.input_data("Legacy hello")));

    assert_eq!(record.original_audio, expected_name);
    assert_eq!(record.service, "elevenlabs_timed");
    assert_eq!(record.input_data.voice_id, VOICE);
    assert_eq!(record.word_timings.len(), 2);
    assert!(!record.from_cache);
    assert!(dir.path().join(&expected_name).exists());

    let again = service
        .generate_from_text("Legacy hello", None, Some(Path::new("renders/scene_1.mp3")))
        .await
        .unwrap();
    assert!(again.from_cache);
    assert_eq!(again.original_audio, "renders/scene_1.mp3");
}

#[tokio::test]
async fn test_generate_default_uses_configured_voice_and_retries() {
    let dir = tempfile::tempdir().unwrap();
    let config = config().with_voice_id("configured-voice").with_max_retries(2);
    let generator = VoiceoverGenerator::with_transport(config, MockTransport::new(MockBehavior::AlwaysFail));

    let error = generator
        .generate_default("configured", dir.path().join("out.mp3"))
        .await
        .unwrap_err();

    assert_eq!(generator.transport().calls(), 2);
    assert!(matches!(error, TtsError::Synthesis { attempts: 2, .. }));
    let requests = generator.transport().requests.lock().unwrap();
    assert!(requests.iter().all(|r| r.voice_id == "configured-voice"));
}

#[tokio::test(start_paused = true)]
async fn test_retry_waits_configured_delay() {
    let dir = tempfile::tempdir().unwrap();
    let config = config().with_retry_delay(Duration::from_millis(250));
    let generator = VoiceoverGenerator::with_transport(
        config,
        MockTransport::new(MockBehavior::FailThenSuccess { failures: 2 }),
    );

    let started = tokio::time::Instant::now();
    let result = generator
        .generate("patience", dir.path().join("out.mp3"), VOICE, 3)
        .await
        .unwrap();

    assert!(!result.from_cache);
    assert_eq!(generator.transport().calls(), 3);
    // Две паузы между тремя попытками
    assert!(started.elapsed() >= Duration::from_millis(500));
}

#[tokio::test]
async fn test_concurrent_requests_track_progress_separately() {
    let dir = tempfile::tempdir().unwrap();
    let observer = MemoryProgressObserver::new();
    let mut reporter = DefaultProgressReporter::new();
    reporter.add_observer(Box::new(observer.clone()));

    let generator = VoiceoverGenerator::with_transport(config(), MockTransport::new(MockBehavior::Success))
        .with_progress_reporter(Box::new(reporter));

    let (first, second) = tokio::join!(
        generator.generate("first line", dir.path().join("a.mp3"), VOICE, 3),
        generator.generate("second line", dir.path().join("b.mp3"), VOICE, 3),
    );
    first.unwrap();
    second.unwrap();

    let history = observer.history();
    let attempts: Vec<_> = history
        .iter()
        .filter(|p| p.details.as_deref() == Some("Attempt 1/3"))
        .collect();
    assert_eq!(attempts.len(), 2);
    for update in attempts {
        assert_eq!(update.step, "Speech synthesis");
        assert!((update.total_progress - 10.0).abs() < 1e-3);
    }

    let completed = history
        .iter()
        .filter(|p| p.details.as_deref() == Some("Generated in 1 attempt(s)"))
        .count();
    assert_eq!(completed, 2);
}
