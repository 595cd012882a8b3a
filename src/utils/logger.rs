use std::io::Write;

use env_logger::{Builder, Env};
use log::LevelFilter;

const DEFAULT_FILTER: &str = "warn,storyvox=info";

/// Инициализировать логирование для бинарника
///
/// Фильтр берётся из `RUST_LOG`, по умолчанию `warn,storyvox=info`.
/// `verbose` включает отладочные сообщения самой библиотеки.
pub fn init_logger(verbose: bool) {
    let env = Env::default().filter_or("RUST_LOG", DEFAULT_FILTER);
    let mut builder = Builder::from_env(env);

    // Явно подавляем логи HTTP-клиента
    builder
        .filter_module("hyper", LevelFilter::Error)
        .filter_module("hyper_util", LevelFilter::Error)
        .filter_module("reqwest", LevelFilter::Warn)
        .filter_module("rustls", LevelFilter::Error);

    if verbose {
        builder.filter_module("storyvox", LevelFilter::Debug);
    }

    builder
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {}: {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .target(env_logger::Target::Stderr);

    // Повторная инициализация в тестах не считается ошибкой
    if builder.try_init().is_err() {
        log::debug!("Logger already initialized");
    }
}
