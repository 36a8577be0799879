//! Восстановление таймингов слов из посимвольной разметки
//!
//! Провайдер возвращает время начала и конца для каждого символа. Для
//! синхронизации субтитров и анимаций нужны интервалы слов: слова разделяются
//! пробелом, переводом строки или табуляцией, серия таких символов дает одну
//! границу.

use crate::tts::types::{CharacterAlignment, WordTiming};

/// Символы, разделяющие слова
fn is_word_boundary(ch: &str) -> bool {
    matches!(ch, " " | "\n" | "\t")
}

fn time_at(times: &[f64], index: usize) -> f64 {
    times.get(index).copied().unwrap_or(0.0)
}

/// Накапливаемое слово
#[derive(Debug, Default)]
struct WordBuffer {
    text: String,
    start: f64,
    char_start_index: usize,
    char_end_index: usize,
}

impl WordBuffer {
    fn anchored_at(index: usize, start: f64) -> Self {
        Self {
            text: String::new(),
            start,
            char_start_index: index,
            char_end_index: index,
        }
    }

    fn has_content(&self) -> bool {
        !self.text.trim().is_empty()
    }

    fn push(&mut self, ch: &str, index: usize) {
        self.text.push_str(ch);
        self.char_end_index = index;
    }

    fn to_word(&self, end: f64) -> WordTiming {
        WordTiming {
            text: self.text.trim().to_string(),
            start: self.start,
            end,
            char_start_index: self.char_start_index,
            char_end_index: self.char_end_index,
        }
    }
}

/// Преобразовать посимвольные метки времени в тайминги слов.
///
/// Если любой из трех массивов пуст, результат пуст. Слова идут в порядке
/// текста. Недостающие метки времени (массивы короче `characters`) читаются
/// как `0.0`.
pub fn reconstruct(characters: &[String], start_times: &[f64], end_times: &[f64]) -> Vec<WordTiming> {
    if characters.is_empty() || start_times.is_empty() || end_times.is_empty() {
        return Vec::new();
    }

    let mut words = Vec::new();
    let mut current = WordBuffer::anchored_at(0, start_times[0]);

    for (i, ch) in characters.iter().enumerate() {
        if !is_word_boundary(ch) {
            current.push(ch, i);
            continue;
        }

        if current.has_content() {
            let end = if i > 0 {
                time_at(end_times, i - 1)
            } else {
                time_at(start_times, i)
            };
            words.push(current.to_word(end));
        }

        // Следующее слово начинается после серии разделителей
        let next_word = (i + 1..characters.len()).find(|&j| !is_word_boundary(&characters[j]));
        current = match next_word {
            Some(j) => WordBuffer::anchored_at(j, time_at(start_times, j)),
            None => WordBuffer::default(),
        };
    }

    if current.has_content() {
        let end = end_times.last().copied().unwrap_or(0.0);
        words.push(current.to_word(end));
    }

    words
}

/// То же, что [`reconstruct`], для разметки целиком
pub fn reconstruct_alignment(alignment: &CharacterAlignment) -> Vec<WordTiming> {
    reconstruct(
        &alignment.characters,
        &alignment.character_start_times_seconds,
        &alignment.character_end_times_seconds,
    )
}
