//! Наблюдатели прогресса: вывод в консоль и запись в память

use std::sync::Arc;

use parking_lot::Mutex;

use crate::progress::{ProgressInfo, ProgressObserver};

/// Наблюдатель, выводящий информацию о прогрессе в stderr
#[derive(Default)]
pub struct ConsoleProgressObserver;

impl ConsoleProgressObserver {
    pub fn new() -> Self {
        Self
    }
}

impl ProgressObserver for ConsoleProgressObserver {
    fn on_progress_update(&self, progress: ProgressInfo) {
        let details = progress.details.as_deref().unwrap_or("");

        eprintln!(
            "[{:5.1}%] {}: {:.1}%{}",
            progress.total_progress,
            progress.step,
            progress.step_progress,
            if details.is_empty() { String::new() } else { format!(" - {}", details) }
        );
    }
}

/// Наблюдатель, сохраняющий информацию о прогрессе в памяти
pub struct MemoryProgressObserver {
    history: Arc<Mutex<Vec<ProgressInfo>>>,
}

impl MemoryProgressObserver {
    pub fn new() -> Self {
        Self {
            history: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Общий доступ к истории, сохраняется после передачи наблюдателя трекеру
    pub fn handle(&self) -> Arc<Mutex<Vec<ProgressInfo>>> {
        self.history.clone()
    }

    pub fn history(&self) -> Vec<ProgressInfo> {
        self.history.lock().clone()
    }

    pub fn clear_history(&self) {
        self.history.lock().clear();
    }
}

impl Default for MemoryProgressObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressObserver for MemoryProgressObserver {
    fn on_progress_update(&self, progress: ProgressInfo) {
        self.history.lock().push(progress);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_observer() {
        let observer = MemoryProgressObserver::new();
        observer.on_progress_update(ProgressInfo::new("step", 10.0, 5.0, None));
        observer.on_progress_update(ProgressInfo::new("step", 150.0, 5.0, Some("x".to_string())));

        let history = observer.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].step_progress, 100.0);

        observer.clear_history();
        assert!(observer.history().is_empty());
    }
}
