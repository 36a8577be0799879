//! Пример: озвучить фрагмент текста и вывести тайминги слов
//!
//! Запуск:
//! ```bash
//! ELEVENLABS_API_KEY=... cargo run --example voiceover -- "Hello there" out/section_1.mp3
//! ```

use std::path::Path;
use anyhow::{Context, Result};
use voiceover_sync::notification::LogProgressObserver;
use voiceover_sync::progress::{DefaultProgressReporter, ProgressReporter};
use voiceover_sync::tts::elevenlabs::voice_summary;
use voiceover_sync::{init_logging, timing_path_for, VoiceoverConfig, VoiceoverGenerator};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let mut args = std::env::args().skip(1);
    let text = args
        .next()
        .unwrap_or_else(|| "Hello there, this is a voiceover test.".to_string());
    let output = args.next().unwrap_or_else(|| "voiceovers/demo.mp3".to_string());

    let mut config = VoiceoverConfig::default();
    if let Ok(voice_id) = std::env::var("ELEVENLABS_VOICE_ID") {
        config = config.with_voice_id(voice_id);
    }

    let mut reporter = DefaultProgressReporter::new();
    reporter.add_observer(Box::new(LogProgressObserver::with_prefix("[voiceover] ")));

    let generator = VoiceoverGenerator::new(config)
        .context("Failed to create voiceover generator")?
        .with_progress_reporter(Box::new(reporter));

    let voices = generator.list_voices().await;
    println!("{}", voice_summary(&generator.config().voice_id, &voices));

    let result = generator
        .generate_default(&text, &output)
        .await
        .context("Voiceover generation failed")?;

    println!(
        "Audio: {} ({} characters, ${:.4}{})",
        result.audio_path.display(),
        result.character_count,
        result.cost,
        if result.from_cache { ", from cache" } else { "" }
    );
    println!("Timings: {}", timing_path_for(Path::new(&output)).display());
    for word in &result.word_timings {
        println!("  {:>7.3} - {:>7.3}  {}", word.start, word.end, word.text);
    }

    Ok(())
}
