//! Диагностический журнал запуска
//!
//! Каждая запись содержит время, этап, уровень и сообщение и дублируется в
//! `log`. Журнал экспортируется в JSON вместе со сводными счётчиками.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Уровень записи
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Debug,
    Info,
    Warn,
    Error,
}

impl Severity {
    fn as_log_level(self) -> log::Level {
        match self {
            Severity::Debug => log::Level::Debug,
            Severity::Info => log::Level::Info,
            Severity::Warn => log::Level::Warn,
            Severity::Error => log::Level::Error,
        }
    }
}

/// Запись журнала
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticEntry {
    pub timestamp: DateTime<Utc>,
    pub stage: String,
    pub level: Severity,
    pub message: String,
}

/// Сводка по запуску
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiagnosticSummary {
    pub entries: usize,
    pub by_level: BTreeMap<Severity, usize>,
    pub segments_total: usize,
    pub segments_completed: usize,
    pub segments_dropped: usize,
    pub rate_limit_events: usize,
}

/// Документ для экспорта
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticReport {
    pub generated_at: DateTime<Utc>,
    pub summary: DiagnosticSummary,
    pub entries: Vec<DiagnosticEntry>,
}

#[derive(Debug, Default)]
struct Inner {
    entries: Vec<DiagnosticEntry>,
    counters: DiagnosticSummary,
}

/// Журнал, разделяемый между конвейером и воркерами
#[derive(Debug, Clone, Default)]
pub struct DiagnosticLog {
    inner: Arc<Mutex<Inner>>,
}

impl DiagnosticLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Добавить запись
    pub fn record(&self, stage: &str, level: Severity, message: impl Into<String>) {
        let message = message.into();
        log::log!(target: "storyvox::diagnostics", level.as_log_level(), "[{}] {}", stage, message);

        let mut inner = self.inner.lock();
        inner.entries.push(DiagnosticEntry {
            timestamp: Utc::now(),
            stage: stage.to_string(),
            level,
            message,
        });
    }

    pub fn debug(&self, stage: &str, message: impl Into<String>) {
        self.record(stage, Severity::Debug, message);
    }

    pub fn info(&self, stage: &str, message: impl Into<String>) {
        self.record(stage, Severity::Info, message);
    }

    pub fn warn(&self, stage: &str, message: impl Into<String>) {
        self.record(stage, Severity::Warn, message);
    }

    pub fn error(&self, stage: &str, message: impl Into<String>) {
        self.record(stage, Severity::Error, message);
    }

    pub fn set_segments_total(&self, total: usize) {
        self.inner.lock().counters.segments_total = total;
    }

    pub fn add_completed(&self) {
        self.inner.lock().counters.segments_completed += 1;
    }

    pub fn add_dropped(&self) {
        self.inner.lock().counters.segments_dropped += 1;
    }

    pub fn add_rate_limit_event(&self) {
        self.inner.lock().counters.rate_limit_events += 1;
    }

    pub fn entries(&self) -> Vec<DiagnosticEntry> {
        self.inner.lock().entries.clone()
    }

    /// Сводные счётчики
    pub fn summary(&self) -> DiagnosticSummary {
        let inner = self.inner.lock();
        let mut summary = inner.counters.clone();
        summary.entries = inner.entries.len();
        summary.by_level.clear();
        for entry in &inner.entries {
            *summary.by_level.entry(entry.level).or_insert(0) += 1;
        }
        summary
    }

    pub fn report(&self) -> DiagnosticReport {
        DiagnosticReport {
            generated_at: Utc::now(),
            summary: self.summary(),
            entries: self.entries(),
        }
    }

    /// Экспорт журнала в JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.report())?)
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.counters = DiagnosticSummary::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_counts() {
        let log = DiagnosticLog::new();
        log.info("analysis", "started");
        log.warn("generation", "rate limited");
        log.error("generation", "segment 3 dropped");
        log.error("generation", "segment 4 dropped");
        log.set_segments_total(10);
        log.add_completed();
        log.add_dropped();
        log.add_rate_limit_event();

        let summary = log.summary();
        assert_eq!(summary.entries, 4);
        assert_eq!(summary.by_level[&Severity::Error], 2);
        assert_eq!(summary.by_level[&Severity::Info], 1);
        assert_eq!(summary.segments_total, 10);
        assert_eq!(summary.segments_completed, 1);
        assert_eq!(summary.rate_limit_events, 1);
    }

    #[test]
    fn test_json_export() {
        let log = DiagnosticLog::new();
        log.warn("casting", "voice reused");

        let json = log.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["entries"][0]["stage"], "casting");
        assert_eq!(value["entries"][0]["level"], "warn");
        assert_eq!(value["summary"]["entries"], 1);
        assert!(value["entries"][0]["timestamp"].is_string());
    }

    #[test]
    fn test_clones_share_entries() {
        let log = DiagnosticLog::new();
        let clone = log.clone();
        clone.info("generation", "from worker");
        assert_eq!(log.entries().len(), 1);
    }

    #[test]
    fn test_clear_resets_entries_and_counters() {
        let log = DiagnosticLog::new();
        log.debug("generation", "segment 1 requeued");
        log.set_segments_total(3);
        log.add_completed();

        log.clear();

        let summary = log.summary();
        assert_eq!(summary.entries, 0);
        assert!(summary.by_level.is_empty());
        assert_eq!(summary.segments_total, 0);
        assert_eq!(summary.segments_completed, 0);
    }
}
