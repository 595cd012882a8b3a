//! Конвейер генерации аудиокниги
//!
//! Явный автомат состояний: `Input → Analyzing → Casting → Generating →
//! Complete`. Ошибка анализа возвращает конвейер в `Input`, неудачная или
//! отменённая генерация возвращает его в `Casting`, чтобы можно было сменить
//! голоса и запустить генерацию заново.

use std::fmt;
use std::sync::Arc;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::casting::{CastingEngine, VoiceMap, builtin_catalog};
use crate::config::StoryvoxConfig;
use crate::credentials::{Credential, CredentialPool};
use crate::diagnostics::DiagnosticLog;
use crate::error::{Result, StoryvoxError};
use crate::media::{FinalTrack, assemble};
use crate::progress::{PipelineStep, ProgressObserver, ProgressTracker};
use crate::scheduler::{GenerationScheduler, build_jobs};
use crate::script::{AnalysisResult, ScriptAnalyzer, normalize_analysis, optimize, truncate_input};
use crate::tts::SpeechSynthesizer;

/// Состояние конвейера
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Input,
    Analyzing,
    Casting,
    Generating,
    Complete,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Analyzing => "analyzing",
            Self::Casting => "casting",
            Self::Generating => "generating",
            Self::Complete => "complete",
        }
    }

    /// Разрешён ли переход в `next`
    pub fn can_transition_to(self, next: PipelineStage) -> bool {
        use PipelineStage::*;
        matches!(
            (self, next),
            (Input, Analyzing)
                | (Analyzing, Casting)
                | (Analyzing, Input)
                | (Casting, Generating)
                | (Generating, Complete)
                | (Generating, Casting)
                | (Complete, Casting)
                | (_, Input)
        )
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Основная структура для работы с библиотекой
pub struct Storyvox {
    config: StoryvoxConfig,
    pool: Arc<CredentialPool>,
    analyzer: Arc<dyn ScriptAnalyzer>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    casting: CastingEngine,
    diagnostics: DiagnosticLog,
    progress: Arc<ProgressTracker>,
    stage: PipelineStage,
    analysis: Option<AnalysisResult>,
    cancel: CancellationToken,
}

impl Storyvox {
    /// Создать конвейер; пул ключей строится из конфигурации
    pub fn new(
        config: StoryvoxConfig,
        analyzer: Arc<dyn ScriptAnalyzer>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
    ) -> Result<Self> {
        let pool = Arc::new(CredentialPool::from_config(&config.credentials)?);
        Self::with_pool(config, pool, analyzer, synthesizer)
    }

    /// Создать конвейер с готовым пулом ключей
    pub fn with_pool(
        config: StoryvoxConfig,
        pool: Arc<CredentialPool>,
        analyzer: Arc<dyn ScriptAnalyzer>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
    ) -> Result<Self> {
        config.validate()?;
        if pool.is_empty() {
            return Err(StoryvoxError::Configuration("credential pool is empty".to_string()));
        }

        let casting = CastingEngine::new(
            builtin_catalog(),
            config.casting.narrator_voice.clone(),
            config.casting.seed,
        );

        Ok(Self {
            config,
            pool,
            analyzer,
            synthesizer,
            casting,
            diagnostics: DiagnosticLog::new(),
            progress: Arc::new(ProgressTracker::new()),
            stage: PipelineStage::Input,
            analysis: None,
            cancel: CancellationToken::new(),
        })
    }

    /// Добавить наблюдателя прогресса
    ///
    /// Наблюдателей нужно добавить до начала генерации.
    pub fn add_progress_observer(&mut self, observer: Box<dyn ProgressObserver>) -> Result<usize> {
        Arc::get_mut(&mut self.progress)
            .map(|tracker| tracker.add_observer(observer))
            .ok_or_else(|| StoryvoxError::Other("progress tracker is in use".to_string()))
    }

    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    pub fn config(&self) -> &StoryvoxConfig {
        &self.config
    }

    pub fn analysis(&self) -> Option<&AnalysisResult> {
        self.analysis.as_ref()
    }

    pub fn voice_map(&self) -> &VoiceMap {
        self.casting.assignments()
    }

    pub fn credential_pool(&self) -> &Arc<CredentialPool> {
        &self.pool
    }

    pub fn diagnostics(&self) -> &DiagnosticLog {
        &self.diagnostics
    }

    /// Токен отмены текущего запуска
    ///
    /// После отмены конвейер выдаёт новый токен, поэтому его нужно
    /// запрашивать заново перед каждым запуском.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Отменить текущий запуск
    pub fn cancel(&self) {
        log::warn!("Cancellation requested at stage {}", self.stage);
        self.cancel.cancel();
    }

    /// Вернуть конвейер в исходное состояние
    pub fn reset(&mut self) {
        self.stage = PipelineStage::Input;
        self.analysis = None;
        self.cancel = CancellationToken::new();
        self.diagnostics.clear();
    }

    /// Заменить сработавший токен, чтобы следующий запуск не был отменён сразу
    fn rearm_cancellation(&mut self) {
        if self.cancel.is_cancelled() {
            log::debug!("Re-arming cancellation token");
            self.cancel = CancellationToken::new();
        }
    }

    fn transition(&mut self, next: PipelineStage) -> Result<()> {
        if !self.stage.can_transition_to(next) {
            return Err(StoryvoxError::InvalidTransition(format!("{} -> {}", self.stage, next)));
        }
        log::debug!("Pipeline stage {} -> {}", self.stage, next);
        self.stage = next;
        Ok(())
    }

    /// Разобрать текст на персонажей и сценарий
    pub async fn analyze(&mut self, text: &str) -> Result<&AnalysisResult> {
        self.transition(PipelineStage::Analyzing)?;
        self.progress.set_step(PipelineStep::Analyzing);

        match self.run_analysis(text).await {
            Ok(result) => {
                self.diagnostics.info(
                    "analysis",
                    format!(
                        "Found {} characters and {} lines",
                        result.characters.len(),
                        result.script.len()
                    ),
                );
                self.transition(PipelineStage::Casting)?;
                Ok(&*self.analysis.insert(result))
            }
            Err(err) => {
                self.diagnostics.error("analysis", err.to_string());
                self.analysis = None;
                self.rearm_cancellation();
                self.transition(PipelineStage::Input)?;
                Err(err)
            }
        }
    }

    async fn run_analysis(&self, text: &str) -> Result<AnalysisResult> {
        let text = text.trim();
        if text.is_empty() {
            return Err(StoryvoxError::Analysis("input text is empty".to_string()));
        }

        let input = truncate_input(text, self.config.script.analysis_max_chars);
        if input.len() < text.len() {
            self.diagnostics.warn(
                "analysis",
                format!(
                    "Input truncated to {} characters for analysis",
                    self.config.script.analysis_max_chars
                ),
            );
        }

        // Отказ по лимиту переключает на следующий ключ, не более одного круга
        for attempt in 1..=self.pool.len() {
            let credential = self.wait_for_credential().await?;
            log::info!(
                "Analyzing {} characters with credential {} (attempt {})",
                input.chars().count(),
                credential.masked(),
                attempt
            );

            match self.analyzer.analyze(input, &credential).await {
                Ok(raw) => {
                    let result = normalize_analysis(raw);
                    if result.script.is_empty() {
                        return Err(StoryvoxError::Analysis("analysis produced an empty script".to_string()));
                    }
                    return Ok(result);
                }
                Err(err) if err.is_rate_limit() => {
                    self.pool.suspend(&credential);
                    self.diagnostics.add_rate_limit_event();
                    self.diagnostics.warn("analysis", format!("Rate limited: {}", err));
                }
                Err(err) => return Err(StoryvoxError::Analysis(err.to_string())),
            }
        }

        Err(StoryvoxError::Analysis("every credential was rate limited".to_string()))
    }

    async fn wait_for_credential(&self) -> Result<Credential> {
        let started = Instant::now();
        loop {
            if self.cancel.is_cancelled() {
                return Err(StoryvoxError::Cancelled);
            }
            if let Some(credential) = self.pool.reserve() {
                return Ok(credential);
            }
            if let Some(limit) = self.config.scheduler.max_credential_wait() {
                if started.elapsed() >= limit {
                    return Err(StoryvoxError::NoCredentials(format!(
                        "no credential became available within {:?}",
                        limit
                    )));
                }
            }
            self.progress
                .update_step_progress(0.0, Some("Waiting for available credentials".to_string()));
            tokio::time::sleep(self.config.scheduler.poll_interval()).await;
        }
    }

    /// Назначить голоса всем говорящим
    pub fn cast(&mut self) -> Result<&VoiceMap> {
        if self.stage == PipelineStage::Complete {
            self.transition(PipelineStage::Casting)?;
        }
        if self.stage != PipelineStage::Casting {
            return Err(StoryvoxError::InvalidTransition(format!(
                "cannot cast voices at stage {}",
                self.stage
            )));
        }
        let analysis = self
            .analysis
            .as_ref()
            .ok_or_else(|| StoryvoxError::Casting("no analysis result to cast".to_string()))?;

        self.progress.set_step(PipelineStep::Casting);
        let map = self.casting.cast(&analysis.characters, &analysis.script)?;
        self.diagnostics
            .info("casting", format!("Assigned voices to {} speakers", map.len()));
        Ok(map)
    }

    /// Подобрать голоса заново
    pub fn recast(&mut self) -> Result<&VoiceMap> {
        log::info!("Recasting voices");
        self.cast()
    }

    /// Заменить голос говорящего вручную
    pub fn set_voice(&mut self, speaker: &str, voice: &str) -> Result<()> {
        if !matches!(self.stage, PipelineStage::Casting | PipelineStage::Complete) {
            return Err(StoryvoxError::InvalidTransition(format!(
                "cannot change voices at stage {}",
                self.stage
            )));
        }
        self.casting.assign(speaker, voice)?;
        self.diagnostics
            .info("casting", format!("Speaker {} set to voice {}", speaker, voice));
        Ok(())
    }

    /// Синтезировать все сегменты и собрать дорожку
    pub async fn generate(&mut self) -> Result<FinalTrack> {
        if self.stage == PipelineStage::Complete {
            self.transition(PipelineStage::Casting)?;
        }
        if self.casting.assignments().is_empty() {
            return Err(StoryvoxError::InvalidTransition(format!(
                "voices must be cast before generation (stage {})",
                self.stage
            )));
        }
        self.transition(PipelineStage::Generating)?;

        match self.run_generation().await {
            Ok(track) => {
                self.transition(PipelineStage::Complete)?;
                self.progress.complete();
                Ok(track)
            }
            Err(err) => {
                self.diagnostics.error("generation", err.to_string());
                self.rearm_cancellation();
                self.transition(PipelineStage::Casting)?;
                Err(err)
            }
        }
    }

    async fn run_generation(&self) -> Result<FinalTrack> {
        let analysis = self
            .analysis
            .as_ref()
            .ok_or_else(|| StoryvoxError::GenerationFailed("no script to generate".to_string()))?;

        let segments = optimize(&analysis.script, self.config.script.max_segment_chars);
        self.diagnostics.info(
            "generation",
            format!(
                "Optimized script from {} to {} segments",
                analysis.script.len(),
                segments.len()
            ),
        );
        let jobs = build_jobs(&segments, self.casting.assignments())?;

        self.progress.set_step(PipelineStep::Generating);
        let scheduler = GenerationScheduler::new(
            self.pool.clone(),
            self.synthesizer.clone(),
            self.config.scheduler.clone(),
            self.config.audio.clone(),
        )
        .with_diagnostics(self.diagnostics.clone())
        .with_progress(self.progress.clone())
        .with_cancellation(self.cancel.child_token());

        let report = scheduler.run(jobs).await?;
        if report.completed == 0 {
            return Err(StoryvoxError::GenerationFailed(format!(
                "none of {} segments could be synthesized",
                report.total()
            )));
        }
        if !report.is_complete() {
            self.diagnostics.warn(
                "generation",
                format!(
                    "{} of {} segments missing from the final track",
                    report.total() - report.completed,
                    report.total()
                ),
            );
        }

        self.progress.set_step(PipelineStep::Assembling);
        let track = assemble(&report.slots)?;
        self.diagnostics.info(
            "assembly",
            format!(
                "Assembled {} segments, {:.1} s of audio",
                track.segments.len(),
                track.duration_secs()
            ),
        );
        Ok(track)
    }

    /// Полный цикл: анализ, подбор голосов, генерация
    pub async fn run(&mut self, text: &str) -> Result<FinalTrack> {
        if self.stage != PipelineStage::Input {
            self.reset();
        }
        self.analyze(text).await?;
        self.cast()?;
        self.generate().await
    }
}
