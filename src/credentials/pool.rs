//! Пул ключей доступа с учётом лимитов
//!
//! Пул решает, каким ключом можно воспользоваться прямо сейчас. Для каждого
//! ключа хранится число запросов в текущем окне и момент окончания блокировки.
//! Все операции чтения-изменения выполняются под одним мьютексом, поэтому пул
//! можно разделять между воркерами через `Arc`.
//!
//! Методы с суффиксом `_at` принимают текущее время явно; обычные методы
//! берут его из `tokio::time::Instant::now()`.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::time::Instant;

use crate::config::CredentialConfig;
use crate::error::{Result, StoryvoxError};

/// Встроенный набор ключей, используемый при пустой конфигурации
const BUILTIN_CREDENTIALS: Option<&str> = option_env!("STORYVOX_DEFAULT_CREDENTIALS");

/// Ключ, выданный пулом вызывающему коду
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    index: usize,
    token: Arc<str>,
}

impl Credential {
    /// Позиция ключа в пуле
    pub fn index(&self) -> usize {
        self.index
    }

    /// Значение ключа для подстановки в запрос
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Замаскированное представление для логов
    pub fn masked(&self) -> String {
        mask_token(&self.token)
    }
}

/// Состояние ключа для диагностики
#[derive(Debug, Clone, Serialize)]
pub struct CredentialStatus {
    pub label: String,
    pub request_count: u32,
    pub suspended_for_ms: Option<u64>,
}

#[derive(Debug)]
struct CredentialState {
    token: Arc<str>,
    request_count: u32,
    suspended_until: Option<Instant>,
}

impl CredentialState {
    fn is_usable(&self, now: Instant, max_requests: u32) -> bool {
        let released = self.suspended_until.is_none_or(|until| now >= until);
        released && self.request_count < max_requests
    }
}

#[derive(Debug)]
struct PoolState {
    credentials: Vec<CredentialState>,
    cursor: usize,
    window_start: Instant,
}

impl PoolState {
    /// Сбросить счётчики, если окно истекло
    ///
    /// Границы окон лежат на сетке `window_start + k × window`, поэтому
    /// редкие обращения не сдвигают начало следующего окна.
    fn roll_window(&mut self, now: Instant, window: Duration) {
        let elapsed = now.duration_since(self.window_start);
        if elapsed < window {
            return;
        }
        for credential in &mut self.credentials {
            credential.request_count = 0;
        }
        self.window_start = if window.is_zero() {
            now
        } else {
            let into_window = elapsed.as_nanos() % window.as_nanos();
            now - Duration::from_nanos(into_window as u64)
        };
    }
}

/// Пул ключей доступа
#[derive(Debug)]
pub struct CredentialPool {
    state: Mutex<PoolState>,
    max_requests_per_window: u32,
    window: Duration,
    suspend_duration: Duration,
}

impl CredentialPool {
    /// Создать пул из готового списка ключей
    pub fn new(
        tokens: Vec<String>,
        max_requests_per_window: u32,
        window: Duration,
        suspend_duration: Duration,
    ) -> Self {
        let credentials = tokens
            .into_iter()
            .map(|token| CredentialState {
                token: Arc::from(token),
                request_count: 0,
                suspended_until: None,
            })
            .collect();

        Self {
            state: Mutex::new(PoolState {
                credentials,
                cursor: 0,
                window_start: Instant::now(),
            }),
            max_requests_per_window,
            window,
            suspend_duration,
        }
    }

    /// Создать пул из конфигурации
    ///
    /// Некорректные записи отбрасываются. Если не осталось ни одного ключа,
    /// используется встроенный набор; если пуст и он, возвращается ошибка.
    pub fn from_config(config: &CredentialConfig) -> Result<Self> {
        let mut tokens = parse_credentials(&config.list, config.min_length);

        if tokens.is_empty() {
            log::warn!("Credential configuration is empty or invalid, falling back to built-in set");
            tokens = parse_credentials(BUILTIN_CREDENTIALS.unwrap_or(""), config.min_length);
        }

        if tokens.is_empty() {
            return Err(StoryvoxError::Configuration(
                "no valid credentials configured".to_string(),
            ));
        }

        log::info!("Credential pool initialised with {} credentials", tokens.len());
        Ok(Self::new(
            tokens,
            config.max_requests_per_window,
            config.window(),
            config.suspend_duration(),
        ))
    }

    pub fn len(&self) -> usize {
        self.state.lock().credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn suspend_duration(&self) -> Duration {
        self.suspend_duration
    }

    /// Зарезервировать ключ для одного запроса
    pub fn reserve(&self) -> Option<Credential> {
        self.reserve_at(Instant::now())
    }

    /// Зарезервировать ключ: обход по кругу начиная с последнего
    /// использованного, первый доступный ключ получает запрос в счёт лимита
    pub fn reserve_at(&self, now: Instant) -> Option<Credential> {
        let mut state = self.state.lock();
        state.roll_window(now, self.window);

        let total = state.credentials.len();
        for offset in 0..total {
            let index = (state.cursor + offset) % total;
            if state.credentials[index].is_usable(now, self.max_requests_per_window) {
                let credential = &mut state.credentials[index];
                credential.request_count += 1;
                let token = credential.token.clone();
                state.cursor = index;
                return Some(Credential { index, token });
            }
        }

        None
    }

    /// Заблокировать ключ на стандартный срок
    pub fn suspend(&self, credential: &Credential) {
        self.suspend_for(credential, self.suspend_duration);
    }

    pub fn suspend_for(&self, credential: &Credential, duration: Duration) {
        self.suspend_at(credential, duration, Instant::now());
    }

    /// Заблокировать ключ до `now + duration` и передвинуть указатель
    pub fn suspend_at(&self, credential: &Credential, duration: Duration, now: Instant) {
        let mut state = self.state.lock();
        state.roll_window(now, self.window);

        let total = state.credentials.len();
        if credential.index >= total {
            return;
        }
        state.credentials[credential.index].suspended_until = Some(now + duration);
        log::warn!(
            "Credential {} suspended for {} ms",
            credential.masked(),
            duration.as_millis()
        );

        let next_usable = (1..total)
            .map(|offset| (credential.index + offset) % total)
            .find(|&index| state.credentials[index].is_usable(now, self.max_requests_per_window));

        state.cursor = next_usable.unwrap_or((credential.index + 1) % total);
    }

    /// Принудительно сбросить счётчики запросов
    pub fn reset_window(&self) {
        self.reset_window_at(Instant::now());
    }

    pub fn reset_window_at(&self, now: Instant) {
        let mut state = self.state.lock();
        for credential in &mut state.credentials {
            credential.request_count = 0;
        }
        state.window_start = now;
    }

    /// Нет ни одного доступного ключа
    pub fn all_suspended(&self) -> bool {
        self.all_suspended_at(Instant::now())
    }

    pub fn all_suspended_at(&self, now: Instant) -> bool {
        let mut state = self.state.lock();
        state.roll_window(now, self.window);
        !state
            .credentials
            .iter()
            .any(|credential| credential.is_usable(now, self.max_requests_per_window))
    }

    /// Через сколько появится хотя бы один доступный ключ
    pub fn next_available_in(&self) -> Option<Duration> {
        self.next_available_in_at(Instant::now())
    }

    pub fn next_available_in_at(&self, now: Instant) -> Option<Duration> {
        let mut state = self.state.lock();
        state.roll_window(now, self.window);

        let window_end = state.window_start + self.window;
        state
            .credentials
            .iter()
            .map(|credential| {
                let suspension = credential
                    .suspended_until
                    .map(|until| until.saturating_duration_since(now))
                    .unwrap_or_default();
                let budget = if credential.request_count >= self.max_requests_per_window {
                    window_end.saturating_duration_since(now)
                } else {
                    Duration::ZERO
                };
                suspension.max(budget)
            })
            .min()
    }

    /// Снимок состояния всех ключей
    pub fn snapshot(&self) -> Vec<CredentialStatus> {
        let now = Instant::now();
        let state = self.state.lock();
        state
            .credentials
            .iter()
            .map(|credential| CredentialStatus {
                label: mask_token(&credential.token),
                request_count: credential.request_count,
                suspended_for_ms: credential
                    .suspended_until
                    .filter(|until| *until > now)
                    .map(|until| until.duration_since(now).as_millis() as u64),
            })
            .collect()
    }
}

/// Разобрать список ключей, разделённых запятыми, точками с запятой или пробелами
///
/// Слишком короткие записи отбрасываются, повторы удаляются с сохранением порядка.
pub fn parse_credentials(raw: &str, min_length: usize) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    for token in raw
        .split(|c: char| c == ',' || c == ';' || c.is_whitespace())
        .map(str::trim)
        .filter(|token| !token.is_empty())
    {
        if token.chars().count() < min_length {
            log::warn!("Discarding malformed credential entry ({} chars)", token.chars().count());
            continue;
        }
        if !tokens.iter().any(|existing| existing == token) {
            tokens.push(token.to_string());
        }
    }
    tokens
}

fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_A: &str = "AAAAAAAAAAAAAAAAAAAAAAAA";
    const KEY_B: &str = "BBBBBBBBBBBBBBBBBBBBBBBB";
    const KEY_C: &str = "CCCCCCCCCCCCCCCCCCCCCCCC";

    fn pool(keys: &[&str], max_requests: u32) -> CredentialPool {
        CredentialPool::new(
            keys.iter().map(|k| k.to_string()).collect(),
            max_requests,
            Duration::from_secs(60),
            Duration::from_secs(60),
        )
    }

    #[test]
    fn test_reserve_sticks_to_last_used_until_budget() {
        let pool = pool(&[KEY_A, KEY_B], 2);
        let now = Instant::now();

        assert_eq!(pool.reserve_at(now).unwrap().token(), KEY_A);
        assert_eq!(pool.reserve_at(now).unwrap().token(), KEY_A);
        assert_eq!(pool.reserve_at(now).unwrap().token(), KEY_B);
        assert_eq!(pool.reserve_at(now).unwrap().token(), KEY_B);
        assert!(pool.reserve_at(now).is_none());
    }

    #[test]
    fn test_exhausted_credential_not_returned_until_window_reset() {
        let pool = pool(&[KEY_A], 3);
        let start = Instant::now();

        for _ in 0..3 {
            assert!(pool.reserve_at(start).is_some());
        }
        assert!(pool.reserve_at(start + Duration::from_secs(30)).is_none());
        assert!(pool.reserve_at(start + Duration::from_millis(59_999)).is_none());
        assert!(pool.all_suspended_at(start + Duration::from_secs(59)));

        let after_window = start + Duration::from_secs(60);
        assert_eq!(pool.reserve_at(after_window).unwrap().token(), KEY_A);
    }

    #[test]
    fn test_windows_stay_on_fixed_grid() {
        let pool = pool(&[KEY_A], 1);
        let start = Instant::now();

        assert!(pool.reserve_at(start).is_some());
        // Первое обращение после окна приходится на середину второго окна
        assert!(pool.reserve_at(start + Duration::from_secs(90)).is_some());
        assert!(pool.reserve_at(start + Duration::from_secs(100)).is_none());
        // Третье окно начинается через 120 с от создания пула, а не через 60 с после обращения
        assert!(pool.reserve_at(start + Duration::from_secs(125)).is_some());
    }

    #[test]
    fn test_suspended_credential_eligible_exactly_at_deadline() {
        let pool = pool(&[KEY_A], 100);
        let start = Instant::now();

        let credential = pool.reserve_at(start).unwrap();
        pool.suspend_at(&credential, Duration::from_millis(1_500), start);

        assert!(pool.reserve_at(start).is_none());
        assert!(pool.reserve_at(start + Duration::from_millis(1_499)).is_none());
        assert!(pool.reserve_at(start + Duration::from_millis(1_500)).is_some());
    }

    #[test]
    fn test_suspension_survives_window_reset() {
        let pool = pool(&[KEY_A], 100);
        let start = Instant::now();

        let credential = pool.reserve_at(start).unwrap();
        pool.suspend_at(&credential, Duration::from_secs(90), start);
        pool.reset_window_at(start + Duration::from_secs(61));

        assert!(pool.reserve_at(start + Duration::from_secs(61)).is_none());
        assert!(pool.reserve_at(start + Duration::from_secs(90)).is_some());
    }

    #[test]
    fn test_suspend_advances_to_next_usable() {
        let pool = pool(&[KEY_A, KEY_B, KEY_C], 100);
        let now = Instant::now();

        let first = pool.reserve_at(now).unwrap();
        assert_eq!(first.token(), KEY_A);

        let b = Credential { index: 1, token: Arc::from(KEY_B) };
        pool.suspend_at(&b, Duration::from_secs(10), now);
        pool.suspend_at(&first, Duration::from_secs(10), now);

        assert_eq!(pool.reserve_at(now).unwrap().token(), KEY_C);
    }

    #[test]
    fn test_suspend_all_moves_pointer_anyway() {
        let pool = pool(&[KEY_A, KEY_B], 100);
        let now = Instant::now();

        let a = pool.reserve_at(now).unwrap();
        let b = Credential { index: 1, token: Arc::from(KEY_B) };
        pool.suspend_at(&b, Duration::from_secs(5), now);
        pool.suspend_at(&a, Duration::from_secs(10), now);
        assert!(pool.all_suspended_at(now));

        // Указатель стоит на B, он освободится первым
        let later = now + Duration::from_secs(6);
        assert_eq!(pool.reserve_at(later).unwrap().token(), KEY_B);
        assert_eq!(pool.next_available_in_at(now), Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_parse_credentials() {
        let raw = format!("{KEY_A}, short ;{KEY_B}\n{KEY_A}  {KEY_C}");
        let tokens = parse_credentials(&raw, 20);
        assert_eq!(tokens, vec![KEY_A, KEY_B, KEY_C]);
        assert!(parse_credentials("  , ;", 20).is_empty());
    }

    #[test]
    fn test_from_config_rejects_invalid_list() {
        let config = CredentialConfig {
            list: "tiny,also-tiny".to_string(),
            ..CredentialConfig::default()
        };
        if BUILTIN_CREDENTIALS.is_none() {
            assert!(matches!(
                CredentialPool::from_config(&config),
                Err(StoryvoxError::Configuration(_))
            ));
        }
    }

    #[test]
    fn test_masking() {
        let pool = pool(&[KEY_A], 1);
        let credential = pool.reserve().unwrap();
        assert_eq!(credential.masked(), "AAAA...AAAA");
        assert_eq!(pool.snapshot()[0].request_count, 1);
    }
}
