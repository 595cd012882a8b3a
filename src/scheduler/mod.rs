//! Планировщик генерации речи
//!
//! Очередь заданий обрабатывают `C` воркеров, где
//! `C = min(max_concurrency, 2 × число ключей)`. Воркер берёт задание только
//! вместе с ключом из пула. Отказ по лимиту приостанавливает ключ и
//! возвращает задание в начало очереди, прочие ошибки отбрасывают сегмент.
//! Результат каждого сегмента пишется в слот с его индексом, поэтому порядок
//! завершения запросов на итоговую дорожку не влияет.

pub mod job;

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use parking_lot::Mutex;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::{AudioConfig, SchedulerConfig};
use crate::credentials::{Credential, CredentialPool};
use crate::diagnostics::DiagnosticLog;
use crate::error::{ProviderError, Result, StoryvoxError};
use crate::media::{AudioChunk, decode_chunk};
use crate::progress::ProgressTracker;
use crate::tts::SpeechSynthesizer;

pub use job::{Job, JobState, build_jobs};

const STAGE: &str = "generation";

/// Итог генерации
#[derive(Debug, Default)]
pub struct GenerationReport {
    /// Слоты по индексу сегмента; `None` для отброшенных сегментов
    pub slots: Vec<Option<AudioChunk>>,
    pub completed: usize,
    /// Сегменты, отброшенные из-за ошибки провайдера
    pub dropped: Vec<usize>,
    /// Сегменты, исчерпавшие лимит повторов после отказов по лимиту
    pub exhausted: Vec<usize>,
    /// Сколько раз задания возвращались в очередь
    pub requeued: usize,
    /// Общее число запросов к провайдеру
    pub attempts: u64,
}

impl GenerationReport {
    pub fn total(&self) -> usize {
        self.slots.len()
    }

    pub fn is_complete(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }
}

struct QueueState {
    pending: VecDeque<Job>,
    active: usize,
}

/// Состояние, общее для всех воркеров одного запуска
struct RunContext {
    pool: Arc<CredentialPool>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    config: SchedulerConfig,
    audio: AudioConfig,
    diagnostics: DiagnosticLog,
    progress: Option<Arc<ProgressTracker>>,
    token: CancellationToken,
    queue: Mutex<QueueState>,
    slots: Mutex<Vec<Option<AudioChunk>>>,
    dropped: Mutex<Vec<usize>>,
    exhausted: Mutex<Vec<usize>>,
    completed: AtomicUsize,
    requeued: AtomicUsize,
    attempts: AtomicU64,
    total: usize,
}

enum NextStep {
    Work(Job, Credential),
    WaitForCredential,
    Drain,
    Finished,
}

/// Планировщик генерации
pub struct GenerationScheduler {
    pool: Arc<CredentialPool>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    config: SchedulerConfig,
    audio: AudioConfig,
    diagnostics: DiagnosticLog,
    progress: Option<Arc<ProgressTracker>>,
    cancel: CancellationToken,
}

impl GenerationScheduler {
    pub fn new(
        pool: Arc<CredentialPool>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        config: SchedulerConfig,
        audio: AudioConfig,
    ) -> Self {
        Self {
            pool,
            synthesizer,
            config,
            audio,
            diagnostics: DiagnosticLog::new(),
            progress: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_diagnostics(mut self, diagnostics: DiagnosticLog) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn with_progress(mut self, progress: Arc<ProgressTracker>) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Токен отмены запуска
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Число одновременно работающих воркеров
    pub fn concurrency(&self) -> usize {
        self.config
            .max_concurrency
            .min(self.pool.len().saturating_mul(2))
            .max(1)
    }

    /// Выполнить все задания
    ///
    /// Возвращает ошибку только для проблем уровня запуска: отмена или
    /// отсутствие доступных ключей дольше `max_credential_wait`. Ошибки
    /// отдельных сегментов попадают в отчёт.
    pub async fn run(&self, jobs: Vec<Job>) -> Result<GenerationReport> {
        let total = jobs.iter().map(|job| job.segment_index + 1).max().unwrap_or(0);
        if jobs.is_empty() {
            return Ok(GenerationReport::default());
        }
        if self.cancel.is_cancelled() {
            return Err(StoryvoxError::Cancelled);
        }

        let workers = self.concurrency();
        log::info!(
            "Starting generation of {} segments with {} workers over {} credentials",
            jobs.len(),
            workers,
            self.pool.len()
        );
        self.diagnostics.set_segments_total(jobs.len());
        self.diagnostics.info(
            STAGE,
            format!("Generating {} segments with concurrency {}", jobs.len(), workers),
        );

        let ctx = Arc::new(RunContext {
            pool: self.pool.clone(),
            synthesizer: self.synthesizer.clone(),
            config: self.config.clone(),
            audio: self.audio.clone(),
            diagnostics: self.diagnostics.clone(),
            progress: self.progress.clone(),
            token: self.cancel.child_token(),
            queue: Mutex::new(QueueState {
                pending: jobs.into(),
                active: 0,
            }),
            slots: Mutex::new(vec![None; total]),
            dropped: Mutex::new(Vec::new()),
            exhausted: Mutex::new(Vec::new()),
            completed: AtomicUsize::new(0),
            requeued: AtomicUsize::new(0),
            attempts: AtomicU64::new(0),
            total,
        });

        let mut set = JoinSet::new();
        for worker_id in 0..workers {
            set.spawn(worker_loop(ctx.clone(), worker_id));
        }

        let mut failure: Option<StoryvoxError> = None;
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    // Запросы в полёте не прерываются, их результаты будут отброшены
                    set.detach_all();
                    log::warn!("Generation cancelled");
                    self.diagnostics.warn(STAGE, "Run cancelled, late results will be discarded");
                    return Err(StoryvoxError::Cancelled);
                }
                joined = set.join_next() => match joined {
                    None => break,
                    Some(Ok(Ok(()))) => {}
                    Some(Ok(Err(err))) => {
                        if failure.is_none() {
                            ctx.token.cancel();
                            failure = Some(err);
                        }
                    }
                    Some(Err(err)) => {
                        if failure.is_none() {
                            ctx.token.cancel();
                            failure = Some(StoryvoxError::Other(format!("Generation worker failed: {}", err)));
                        }
                    }
                }
            }
        }

        if self.cancel.is_cancelled() {
            return Err(StoryvoxError::Cancelled);
        }
        if let Some(err) = failure {
            self.diagnostics.error(STAGE, format!("Generation aborted: {}", err));
            return Err(err);
        }

        let report = GenerationReport {
            slots: std::mem::take(&mut *ctx.slots.lock()),
            completed: ctx.completed.load(Ordering::SeqCst),
            dropped: std::mem::take(&mut *ctx.dropped.lock()),
            exhausted: std::mem::take(&mut *ctx.exhausted.lock()),
            requeued: ctx.requeued.load(Ordering::SeqCst),
            attempts: ctx.attempts.load(Ordering::SeqCst),
        };

        log::info!(
            "Generation finished: {}/{} segments, {} dropped, {} exhausted, {} requests",
            report.completed,
            total,
            report.dropped.len(),
            report.exhausted.len(),
            report.attempts
        );
        Ok(report)
    }
}

async fn worker_loop(ctx: Arc<RunContext>, worker_id: usize) -> Result<()> {
    let mut waiting_since: Option<Instant> = None;

    loop {
        if ctx.token.is_cancelled() {
            return Ok(());
        }

        let next = {
            let mut queue = ctx.queue.lock();
            if queue.pending.is_empty() {
                if queue.active == 0 {
                    NextStep::Finished
                } else {
                    NextStep::Drain
                }
            } else {
                match ctx.pool.reserve() {
                    Some(credential) => match queue.pending.pop_front() {
                        Some(mut job) => {
                            job.state = JobState::Active;
                            queue.active += 1;
                            NextStep::Work(job, credential)
                        }
                        None => NextStep::Drain,
                    },
                    None => NextStep::WaitForCredential,
                }
            }
        };

        match next {
            NextStep::Finished => {
                log::debug!("Worker {} finished", worker_id);
                return Ok(());
            }
            // Активное задание может вернуться в очередь после отказа по лимиту
            NextStep::Drain => tokio::time::sleep(ctx.config.poll_interval()).await,
            NextStep::WaitForCredential => {
                let started = *waiting_since.get_or_insert_with(|| {
                    log::info!("Worker {} waiting for an available credential", worker_id);
                    Instant::now()
                });
                if let Some(limit) = ctx.config.max_credential_wait() {
                    if started.elapsed() >= limit {
                        return Err(StoryvoxError::NoCredentials(format!(
                            "no credential became available within {:?}",
                            limit
                        )));
                    }
                }
                ctx.report_waiting();
                tokio::time::sleep(ctx.config.poll_interval()).await;
            }
            NextStep::Work(job, credential) => {
                waiting_since = None;
                ctx.execute(job, credential).await;
            }
        }
    }
}

impl RunContext {
    async fn execute(&self, mut job: Job, credential: Credential) {
        job.attempts += 1;
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let index = job.segment_index;
        log::debug!(
            "Synthesizing segment {} (attempt {}) with voice {} and credential {}",
            index,
            job.attempts,
            job.voice_name,
            credential.masked()
        );

        let timeout = self.config.request_timeout();
        let outcome = match tokio::time::timeout(
            timeout,
            self.synthesizer
                .synthesize(&job.segment.text, &job.voice_name, &credential),
        )
        .await
        {
            Ok(Ok(payload)) => decode_chunk(index, &payload, self.audio.sample_rate, self.audio.channels),
            Ok(Err(err)) => Err(err),
            Err(_) => Err(ProviderError::Timeout(timeout)),
        };

        if self.token.is_cancelled() {
            log::debug!("Discarding result for segment {} after cancellation", index);
            return;
        }

        match outcome {
            Ok(mut chunk) => {
                chunk.append_silence(self.audio.silence_ms);
                self.slots.lock()[index] = Some(chunk);
                job.state = JobState::Done;
                self.queue.lock().active -= 1;
                let completed = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
                self.diagnostics.add_completed();
                log::info!("Segment {} generated ({}/{})", index, completed, self.total);
                self.report_completed(completed);
            }
            Err(err) if err.is_rate_limit() => {
                self.pool.suspend(&credential);
                self.diagnostics.add_rate_limit_event();
                self.diagnostics.warn(
                    STAGE,
                    format!(
                        "Credential {} rate limited on segment {}: {}",
                        credential.masked(),
                        index,
                        err
                    ),
                );

                let mut queue = self.queue.lock();
                queue.active -= 1;
                if job.attempts >= self.config.max_attempts {
                    job.state = JobState::Dropped;
                    drop(queue);
                    self.exhausted.lock().push(index);
                    self.diagnostics.add_dropped();
                    self.diagnostics.error(
                        STAGE,
                        format!("Segment {} dropped after {} rate-limited attempts", index, job.attempts),
                    );
                } else {
                    let attempts = job.attempts;
                    job.state = JobState::Requeued;
                    queue.pending.push_front(job);
                    drop(queue);
                    self.requeued.fetch_add(1, Ordering::SeqCst);
                    self.diagnostics.debug(
                        STAGE,
                        format!("Segment {} requeued after attempt {}", index, attempts),
                    );
                }
            }
            Err(err) => {
                job.state = JobState::Dropped;
                self.queue.lock().active -= 1;
                self.dropped.lock().push(index);
                self.diagnostics.add_dropped();
                self.diagnostics
                    .error(STAGE, format!("Segment {} dropped: {}", index, err));
            }
        }
    }

    fn report_completed(&self, completed: usize) {
        if let Some(progress) = &self.progress {
            let percent = completed as f32 / self.total.max(1) as f32 * 100.0;
            progress.update_step_progress(
                percent,
                Some(format!("Generated {}/{} segments", completed, self.total)),
            );
        }
    }

    fn report_waiting(&self) {
        if let Some(progress) = &self.progress {
            let completed = self.completed.load(Ordering::SeqCst);
            let percent = completed as f32 / self.total.max(1) as f32 * 100.0;
            let details = match self.pool.next_available_in() {
                Some(wait) => format!("Waiting for available credentials ({}s)", wait.as_secs()),
                None => "Waiting for available credentials".to_string(),
            };
            progress.update_step_progress(percent, Some(details));
        }
    }
}
