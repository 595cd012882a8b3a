use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use storyvox::config::StoryvoxConfig;
use storyvox::notification::ConsoleProgressObserver;
use storyvox::utils::logger::init_logger;
use storyvox::{GeminiAnalyzer, GeminiSpeech, Storyvox, write_wav};

/// Озвучить текст несколькими голосами и сохранить в WAV
#[derive(Parser, Debug)]
#[command(name = "storyvox", version, about = "Turn a narrative text into a multi-voice WAV track")]
struct Args {
    /// Текстовый файл с исходным текстом
    input: PathBuf,

    /// Куда сохранить WAV
    #[arg(short, long, default_value = "output.wav")]
    output: PathBuf,

    /// JSON-файл конфигурации
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Список ключей через запятую (перекрывает конфигурацию)
    #[arg(long)]
    credentials: Option<String>,

    /// Куда сохранить диагностический журнал в JSON
    #[arg(long)]
    diagnostics: Option<PathBuf>,

    /// Зерно для воспроизводимого подбора голосов
    #[arg(long)]
    seed: Option<u64>,

    /// Максимум одновременных запросов синтеза
    #[arg(long)]
    max_concurrency: Option<usize>,

    /// Подробный вывод
    #[arg(short, long)]
    verbose: bool,
}

fn load_config(args: &Args) -> Result<StoryvoxConfig> {
    let mut config = match &args.config {
        Some(path) => StoryvoxConfig::from_file(path)?,
        None => StoryvoxConfig::default(),
    };
    config.apply_env_overrides();

    if let Some(list) = &args.credentials {
        config.credentials.list = list.clone();
    }
    if let Some(seed) = args.seed {
        config.casting.seed = Some(seed);
    }
    if let Some(max) = args.max_concurrency {
        config.scheduler.max_concurrency = max;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logger(args.verbose);

    let text = std::fs::read_to_string(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    let config = load_config(&args)?;

    let analyzer = Arc::new(GeminiAnalyzer::new(&config.provider)?);
    let synthesizer = Arc::new(GeminiSpeech::new(&config.provider)?);
    let mut storyvox = Storyvox::new(config, analyzer, synthesizer)?;
    storyvox.add_progress_observer(Box::new(ConsoleProgressObserver::new()))?;

    let token = storyvox.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted, cancelling");
            token.cancel();
        }
    });

    let result = storyvox.run(&text).await;

    if let Some(path) = &args.diagnostics {
        let json = storyvox.diagnostics().to_json()?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write diagnostics to {}", path.display()))?;
        log::info!("Diagnostics saved to {}", path.display());
    }

    let track = result?;
    write_wav(&track, &args.output)?;
    log::info!(
        "Done: {} segments, {:.1} s of audio written to {}",
        track.segments.len(),
        track.duration_secs(),
        args.output.display()
    );
    Ok(())
}
