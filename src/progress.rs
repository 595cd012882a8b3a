//! Модуль для отслеживания прогресса выполнения операций
//!
//! Реализация паттерна Observer: конвейер сообщает о смене этапа и о
//! прогрессе внутри этапа, наблюдатели получают [`ProgressInfo`].

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Информация о прогрессе выполнения операции
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressInfo {
    /// Текущий этап операции
    pub step: String,
    /// Процент выполнения текущего этапа (0.0 - 100.0)
    pub step_progress: f32,
    /// Общий процент выполнения всей операции (0.0 - 100.0)
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

/// Трейт для наблюдателя, получающего уведомления о прогрессе
pub trait ProgressObserver: Send + Sync {
    fn on_progress_update(&self, progress: ProgressInfo);
}

/// Этапы генерации
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStep {
    Analyzing,
    Casting,
    Generating,
    Assembling,
}

impl PipelineStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Analyzing => "Analyzing text",
            Self::Casting => "Casting voices",
            Self::Generating => "Generating speech",
            Self::Assembling => "Assembling audio",
        }
    }

    /// Весовой коэффициент этапа (в процентах от общего процесса)
    pub fn weight(&self) -> f32 {
        match self {
            Self::Analyzing => 10.0,
            Self::Casting => 5.0,
            Self::Generating => 75.0,
            Self::Assembling => 10.0,
        }
    }
}

/// Трекер прогресса для отслеживания выполнения процесса
///
/// Уведомления рассылаются синхронно всем наблюдателям в порядке добавления.
pub struct ProgressTracker {
    observers: Vec<Box<dyn ProgressObserver>>,
    state: RwLock<TrackerState>,
}

struct TrackerState {
    current_step: PipelineStep,
    step_progress: f32,
    total_progress: f32,
    completed_steps: HashMap<PipelineStep, f32>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            observers: Vec::new(),
            state: RwLock::new(TrackerState {
                current_step: PipelineStep::Analyzing,
                step_progress: 0.0,
                total_progress: 0.0,
                completed_steps: HashMap::new(),
            }),
        }
    }

    /// Добавить наблюдателя, вернуть число наблюдателей
    pub fn add_observer(&mut self, observer: Box<dyn ProgressObserver>) -> usize {
        self.observers.push(observer);
        self.observers.len()
    }

    /// Установить текущий этап; предыдущий считается завершённым
    pub fn set_step(&self, step: PipelineStep) {
        {
            let mut state = self.state.write();
            if state.current_step == step {
                return;
            }
            let previous = state.current_step;
            state.completed_steps.insert(previous, 100.0);
            state.current_step = step;
            state.step_progress = 0.0;
            Self::update_total(&mut state);
        }
        self.report(None);
    }

    /// Обновить прогресс текущего этапа
    pub fn update_step_progress(&self, progress: f32, details: Option<String>) {
        {
            let mut state = self.state.write();
            state.step_progress = progress.clamp(0.0, 100.0);
            Self::update_total(&mut state);
        }
        self.report(details);
    }

    /// Отметить завершение всего процесса
    pub fn complete(&self) {
        {
            let mut state = self.state.write();
            let current = state.current_step;
            state.completed_steps.insert(current, 100.0);
            state.step_progress = 100.0;
            state.total_progress = 100.0;
        }
        self.report(Some("Done".to_string()));
    }

    pub fn total_progress(&self) -> f32 {
        self.state.read().total_progress
    }

    fn update_total(state: &mut TrackerState) {
        let mut total = 0.0;
        let mut total_weight = 0.0;
        for (step, progress) in &state.completed_steps {
            if *step == state.current_step {
                continue;
            }
            total += step.weight() * progress / 100.0;
            total_weight += step.weight();
        }
        total += state.current_step.weight() * state.step_progress / 100.0;
        total_weight += state.current_step.weight();

        state.total_progress = (total / total_weight * 100.0).clamp(0.0, 100.0);
    }

    fn report(&self, details: Option<String>) {
        if self.observers.is_empty() {
            return;
        }
        let info = {
            let state = self.state.read();
            ProgressInfo::new(
                state.current_step.as_str(),
                state.step_progress,
                state.total_progress,
                details,
            )
        };
        for observer in &self.observers {
            observer.on_progress_update(info.clone());
        }
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::MemoryProgressObserver;

    #[test]
    fn test_progress_tracker() {
        let mut tracker = ProgressTracker::new();
        let observer = MemoryProgressObserver::new();
        let history = observer.handle();
        tracker.add_observer(Box::new(observer));

        tracker.update_step_progress(50.0, None);
        {
            let updates = history.lock();
            assert_eq!(updates.len(), 1);
            assert_eq!(updates[0].step, PipelineStep::Analyzing.as_str());
            assert_eq!(updates[0].step_progress, 50.0);
            assert!(updates[0].total_progress > 0.0);
        }

        tracker.set_step(PipelineStep::Casting);
        {
            let updates = history.lock();
            assert_eq!(updates.len(), 2);
            assert_eq!(updates[1].step, PipelineStep::Casting.as_str());
            assert_eq!(updates[1].step_progress, 0.0);
        }

        tracker.complete();
        {
            let updates = history.lock();
            assert_eq!(updates.len(), 3);
            assert_eq!(updates[2].total_progress, 100.0);
            assert_eq!(updates[2].details.as_deref(), Some("Done"));
        }
    }

    #[test]
    fn test_same_step_is_not_reported_twice() {
        let mut tracker = ProgressTracker::new();
        let observer = MemoryProgressObserver::new();
        let history = observer.handle();
        tracker.add_observer(Box::new(observer));

        tracker.set_step(PipelineStep::Analyzing);
        assert!(history.lock().is_empty());
    }

    #[test]
    fn test_every_observer_is_notified() {
        let mut tracker = ProgressTracker::new();
        let first = MemoryProgressObserver::new();
        let second = MemoryProgressObserver::new();
        let (first_history, second_history) = (first.handle(), second.handle());
        assert_eq!(tracker.add_observer(Box::new(first)), 1);
        assert_eq!(tracker.add_observer(Box::new(second)), 2);

        tracker.update_step_progress(20.0, Some("Waiting for available credentials".to_string()));
        assert_eq!(first_history.lock().len(), 1);
        assert_eq!(second_history.lock().len(), 1);
    }
}
