//! Модуль для отслеживания прогресса генерации озвучки
//!
//! Реализация паттерна Observer: генератор сообщает об этапах (проверка кэша,
//! синтез, сохранение) и о каждой попытке запроса к API.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::sync::atomic::{AtomicUsize, Ordering};
use serde::{Deserialize, Serialize};

/// Информация о прогрессе выполнения операции
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgressInfo {
    /// Текущий этап операции
    pub step: String,
    /// Процент выполнения текущего этапа (0.0 - 100.0)
    pub step_progress: f32,
    /// Общий процент выполнения (0.0 - 100.0)
    pub total_progress: f32,
    /// Дополнительная информация о текущем этапе
    pub details: Option<String>,
}

impl ProgressInfo {
    pub fn new(step: impl Into<String>, step_progress: f32, total_progress: f32, details: Option<String>) -> Self {
        Self {
            step: step.into(),
            step_progress: step_progress.clamp(0.0, 100.0),
            total_progress: total_progress.clamp(0.0, 100.0),
            details,
        }
    }
}

/// Наблюдатель, получающий уведомления о прогрессе
pub trait ProgressObserver: Send + Sync {
    fn on_progress_update(&self, progress: ProgressInfo);
}

/// Объект, рассылающий уведомления наблюдателям
pub trait ProgressReporter: Send + Sync {
    /// Добавить наблюдателя, вернуть его идентификатор
    fn add_observer(&mut self, observer: Box<dyn ProgressObserver>) -> usize;

    /// Удалить наблюдателя по идентификатору
    fn remove_observer(&mut self, id: usize) -> Option<Box<dyn ProgressObserver>>;

    /// Уведомить всех наблюдателей
    fn notify_progress(&self, progress: ProgressInfo);
}

/// Репортер по умолчанию: синхронная рассылка по списку наблюдателей
pub struct DefaultProgressReporter {
    observers: RwLock<HashMap<usize, Box<dyn ProgressObserver>>>,
    next_id: AtomicUsize,
}

impl DefaultProgressReporter {
    pub fn new() -> Self {
        Self {
            observers: RwLock::new(HashMap::new()),
            next_id: AtomicUsize::new(0),
        }
    }
}

impl Default for DefaultProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for DefaultProgressReporter {
    fn add_observer(&mut self, observer: Box<dyn ProgressObserver>) -> usize {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.observers
            .get_mut()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, observer);
        id
    }

    fn remove_observer(&mut self, id: usize) -> Option<Box<dyn ProgressObserver>> {
        self.observers
            .get_mut()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&id)
    }

    fn notify_progress(&self, progress: ProgressInfo) {
        let observers = self.observers.read().unwrap_or_else(|e| e.into_inner());
        for observer in observers.values() {
            observer.on_progress_update(progress.clone());
        }
    }
}

/// Этапы генерации озвучки
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessStep {
    /// Проверка кэша
    CacheLookup,
    /// Запрос синтеза к API
    SpeechSynthesis,
    /// Сохранение аудио, таймингов и копии в кэш
    Persistence,
}

impl ProcessStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CacheLookup => "Cache lookup",
            Self::SpeechSynthesis => "Speech synthesis",
            Self::Persistence => "Persistence",
        }
    }

    /// Вес этапа в процентах от всего процесса
    pub fn weight(&self) -> f32 {
        match self {
            Self::CacheLookup => 10.0,
            Self::SpeechSynthesis => 70.0,
            Self::Persistence => 20.0,
        }
    }

    fn all() -> [ProcessStep; 3] {
        [Self::CacheLookup, Self::SpeechSynthesis, Self::Persistence]
    }
}

#[derive(Debug)]
struct TrackerState {
    current_step: ProcessStep,
    step_progress: f32,
    total_progress: f32,
    completed_steps: HashMap<ProcessStep, f32>,
}

impl TrackerState {
    fn initial() -> Self {
        Self {
            current_step: ProcessStep::CacheLookup,
            step_progress: 0.0,
            total_progress: 0.0,
            completed_steps: HashMap::new(),
        }
    }

    /// Общий прогресс: завершенные этапы плюс текущий, по весам всех этапов
    fn recompute_total(&mut self) {
        let total_weight: f32 = ProcessStep::all().iter().map(|s| s.weight()).sum();
        let mut done: f32 = self
            .completed_steps
            .iter()
            .filter(|(step, _)| **step != self.current_step)
            .map(|(step, progress)| step.weight() * progress / 100.0)
            .sum();
        done += self.current_step.weight() * self.step_progress / 100.0;
        self.total_progress = (done / total_weight * 100.0).clamp(0.0, 100.0);
    }
}

/// Трекер прогресса одного запроса озвучки.
///
/// Состояние принадлежит одному запросу; репортер может быть общим для
/// нескольких трекеров.
pub struct ProgressTracker {
    reporter: Option<Arc<dyn ProgressReporter>>,
    state: Mutex<TrackerState>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            reporter: None,
            state: Mutex::new(TrackerState::initial()),
        }
    }

    pub fn with_reporter(reporter: Box<dyn ProgressReporter>) -> Self {
        Self::with_shared_reporter(Arc::from(reporter))
    }

    /// Трекер, рассылающий уведомления через общий репортер
    pub fn with_shared_reporter(reporter: Arc<dyn ProgressReporter>) -> Self {
        Self {
            reporter: Some(reporter),
            state: Mutex::new(TrackerState::initial()),
        }
    }

    pub fn set_reporter(&mut self, reporter: Box<dyn ProgressReporter>) {
        self.reporter = Some(Arc::from(reporter));
    }

    /// Добавить наблюдателя. Возвращает `None`, если репортера нет или он
    /// уже используется другими трекерами.
    pub fn add_observer(&mut self, observer: Box<dyn ProgressObserver>) -> Option<usize> {
        self.reporter
            .as_mut()
            .and_then(|reporter| Arc::get_mut(reporter))
            .map(|reporter| reporter.add_observer(observer))
    }

    fn state(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Начать новый запрос с нуля
    pub fn begin(&self, details: Option<String>) {
        *self.state() = TrackerState::initial();
        self.report_progress(details);
    }

    /// Перейти к этапу. Предыдущий этап считается завершенным.
    pub fn set_step(&self, step: ProcessStep) {
        {
            let mut state = self.state();
            if state.current_step == step {
                return;
            }
            let previous = state.current_step;
            state.completed_steps.insert(previous, 100.0);
            state.current_step = step;
            state.step_progress = 0.0;
            state.recompute_total();
        }
        self.report_progress(None);
    }

    /// Обновить прогресс текущего этапа
    pub fn update_step_progress(&self, progress: f32, details: Option<String>) {
        {
            let mut state = self.state();
            state.step_progress = progress.clamp(0.0, 100.0);
            state.recompute_total();
        }
        self.report_progress(details);
    }

    /// Отметить завершение запроса
    pub fn complete(&self, details: Option<String>) {
        {
            let mut state = self.state();
            let current = state.current_step;
            state.completed_steps.insert(current, 100.0);
            state.step_progress = 100.0;
            state.total_progress = 100.0;
        }
        self.report_progress(details);
    }

    pub fn total_progress(&self) -> f32 {
        self.state().total_progress
    }

    fn report_progress(&self, details: Option<String>) {
        if let Some(reporter) = &self.reporter {
            let info = {
                let state = self.state();
                ProgressInfo::new(
                    state.current_step.as_str(),
                    state.step_progress,
                    state.total_progress,
                    details,
                )
            };
            reporter.notify_progress(info);
        }
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}
