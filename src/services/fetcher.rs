// src/services/fetcher.rs

//! Resilient page fetcher.
//!
//! | Response | Action |
//! |----------|--------|
//! | 2xx | Return body, then self-throttle |
//! | 429 | Retry after `backoff * 2^attempt + jitter` |
//! | 5xx | Retry after `backoff * 2^attempt` |
//! | Network failure | Retry after `backoff * 2^attempt` |
//! | Other status | Fail immediately, no retry |
//!
//! When every attempt fails the call ends with `AppError::FetchExhausted`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

use crate::error::{AppError, Result};
use crate::models::FetcherConfig;
use crate::storage::cache::{self, PageCache, PageSource};
use crate::utils::http::HttpTransport;

/// Retry and throttle timings.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Base delay, doubled per attempt
    pub backoff: Duration,
    /// Upper bound of the extra delay after a 429
    pub max_jitter: Duration,
    /// Pause range after every network fetch
    pub throttle_min: Duration,
    pub throttle_max: Duration,
}

impl RetryPolicy {
    /// A policy that never sleeps.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff: Duration::ZERO,
            max_jitter: Duration::ZERO,
            throttle_min: Duration::ZERO,
            throttle_max: Duration::ZERO,
        }
    }

    /// Exponential part of the delay before retrying after `attempt` (0-based).
    pub fn base_delay(&self, attempt: u32) -> Duration {
        self.backoff
            .checked_mul(2u32.saturating_pow(attempt))
            .unwrap_or(Duration::MAX)
    }

    /// Full delay before retrying after `failure` on `attempt`.
    pub fn delay_for(&self, attempt: u32, failure: &AppError) -> Duration {
        let base = self.base_delay(attempt);
        match failure {
            AppError::RateLimited { .. } => base.saturating_add(jitter(self.max_jitter)),
            _ => base,
        }
    }

    /// Pause taken after a successful network fetch.
    pub fn throttle_delay(&self) -> Duration {
        let spread = self.throttle_max.saturating_sub(self.throttle_min);
        self.throttle_min.saturating_add(jitter(spread))
    }
}

impl From<&FetcherConfig> for RetryPolicy {
    fn from(config: &FetcherConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff: Duration::from_millis(config.backoff_ms),
            max_jitter: Duration::from_millis(config.max_jitter_ms),
            throttle_min: Duration::from_millis(config.throttle_min_ms),
            throttle_max: Duration::from_millis(config.throttle_max_ms),
        }
    }
}

/// Random duration in `[0, max]`, millisecond resolution.
fn jitter(max: Duration) -> Duration {
    let max_ms = u64::try_from(max.as_millis()).unwrap_or(u64::MAX);
    if max_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::rng().random_range(0..=max_ms))
}

/// Fetches pages over an injected transport, consulting an injected cache.
pub struct Fetcher {
    transport: Arc<dyn HttpTransport>,
    cache: Arc<dyn PageCache>,
    policy: RetryPolicy,
}

impl Fetcher {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        cache: Arc<dyn PageCache>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            transport,
            cache,
            policy,
        }
    }

    /// Fetch `url` from the network, retrying transient failures.
    pub async fn fetch(&self, url: &str) -> Result<String> {
        let max_attempts = self.policy.max_attempts.max(1);

        for attempt in 0..max_attempts {
            let failure = match self.transport.get(url).await {
                Ok(response) if (200..300).contains(&response.status) => {
                    let pause = self.policy.throttle_delay();
                    if !pause.is_zero() {
                        tokio::time::sleep(pause).await;
                    }
                    return Ok(response.body);
                }
                Ok(response) => {
                    let error = AppError::from_status(url, response.status);
                    if !error.is_retryable() {
                        return Err(error);
                    }
                    error
                }
                Err(error) if error.is_retryable() => error,
                Err(error) => return Err(error),
            };

            if attempt + 1 < max_attempts {
                let delay = self.policy.delay_for(attempt, &failure);
                log::warn!(
                    "{} (attempt {}/{}), retrying in {:.1}s",
                    failure,
                    attempt + 1,
                    max_attempts,
                    delay.as_secs_f64()
                );
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            } else {
                log::warn!("{} (attempt {}/{})", failure, attempt + 1, max_attempts);
            }
        }

        Err(AppError::FetchExhausted {
            url: url.to_string(),
            attempts: max_attempts,
        })
    }

    /// Fetch `url` through the cache, treating entries older than `ttl` as stale.
    pub async fn fetch_cached(&self, url: &str, ttl: Duration) -> Result<String> {
        cache::get_or_fetch(self.cache.as_ref(), url, ttl, self).await
    }
}

#[async_trait]
impl PageSource for Fetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        Fetcher::fetch(self, url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::cache::MemoryCache;
    use crate::utils::http::HttpResponse;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays a fixed sequence of outcomes, then keeps returning the last one.
    struct ScriptedTransport {
        script: Mutex<VecDeque<Result<HttpResponse>>>,
        calls: Mutex<usize>,
    }

    impl ScriptedTransport {
        fn statuses(statuses: &[u16]) -> Self {
            let script = statuses
                .iter()
                .map(|&s| Ok(HttpResponse::new(s, format!("body {s}"))))
                .collect();
            Self {
                script: Mutex::new(script),
                calls: Mutex::new(0),
            }
        }

        fn outcomes(outcomes: Vec<Result<HttpResponse>>) -> Self {
            Self {
                script: Mutex::new(outcomes.into()),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl HttpTransport for ScriptedTransport {
        async fn get(&self, url: &str) -> Result<HttpResponse> {
            *self.calls.lock().unwrap() += 1;
            let mut script = self.script.lock().unwrap();
            match script.pop_front() {
                Some(Ok(r)) => {
                    if script.is_empty() {
                        script.push_back(Ok(r.clone()));
                    }
                    Ok(r)
                }
                Some(Err(_)) => Err(AppError::network(url, "connection reset")),
                None => Err(AppError::network(url, "script exhausted")),
            }
        }
    }

    fn fetcher(transport: Arc<ScriptedTransport>, attempts: u32) -> Fetcher {
        Fetcher::new(
            transport,
            Arc::new(MemoryCache::new()),
            RetryPolicy::immediate(attempts),
        )
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let transport = Arc::new(ScriptedTransport::statuses(&[200]));
        let body = fetcher(transport.clone(), 3).fetch("https://x/").await.unwrap();
        assert_eq!(body, "body 200");
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_rate_limited_then_ok_uses_fewer_calls_than_budget() {
        let transport = Arc::new(ScriptedTransport::statuses(&[429, 200]));
        let body = fetcher(transport.clone(), 3).fetch("https://x/").await.unwrap();
        assert_eq!(body, "body 200");
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn test_all_server_errors_exhaust_budget() {
        let transport = Arc::new(ScriptedTransport::statuses(&[500, 500, 500]));
        let err = fetcher(transport.clone(), 3)
            .fetch("https://x/")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::FetchExhausted { attempts: 3, .. }
        ));
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test]
    async fn test_client_error_fails_without_retry() {
        let transport = Arc::new(ScriptedTransport::statuses(&[404, 200]));
        let err = fetcher(transport.clone(), 3)
            .fetch("https://x/")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Client { status: 404, .. }));
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_network_failure_is_retried() {
        let transport = Arc::new(ScriptedTransport::outcomes(vec![
            Err(AppError::network("https://x/", "reset")),
            Ok(HttpResponse::new(200, "recovered")),
        ]));
        let body = fetcher(transport.clone(), 3).fetch("https://x/").await.unwrap();
        assert_eq!(body, "recovered");
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn test_fetch_cached_hits_network_once() {
        let transport = Arc::new(ScriptedTransport::statuses(&[200]));
        let fetcher = fetcher(transport.clone(), 3);
        let ttl = Duration::from_secs(3600);

        fetcher.fetch_cached("https://x/list", ttl).await.unwrap();
        fetcher.fetch_cached("https://x/list", ttl).await.unwrap();

        assert_eq!(transport.calls(), 1);
    }

    #[test]
    fn test_backoff_doubles_per_attempt() {
        let policy = RetryPolicy {
            backoff: Duration::from_millis(1000),
            ..RetryPolicy::immediate(3)
        };
        let server = AppError::from_status("u", 502);
        assert_eq!(policy.delay_for(0, &server), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(1, &server), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(2, &server), Duration::from_millis(4000));
    }

    #[test]
    fn test_rate_limit_delay_adds_bounded_jitter() {
        let policy = RetryPolicy {
            backoff: Duration::from_millis(1000),
            max_jitter: Duration::from_millis(500),
            ..RetryPolicy::immediate(3)
        };
        let limited = AppError::from_status("u", 429);
        let delay = policy.delay_for(1, &limited);
        assert!(delay >= Duration::from_millis(2000));
        assert!(delay <= Duration::from_millis(2500));
    }

    #[test]
    fn test_jitter_accepts_unbounded_maximum() {
        let policy = RetryPolicy {
            max_jitter: Duration::from_millis(u64::MAX),
            ..RetryPolicy::immediate(3)
        };
        let limited = AppError::from_status("u", 429);
        assert!(policy.delay_for(0, &limited) <= Duration::from_millis(u64::MAX));
        assert_eq!(jitter(Duration::ZERO), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_hit_skips_throttle_pause() {
        let transport = Arc::new(ScriptedTransport::statuses(&[200]));
        let fetcher = Fetcher::new(
            transport.clone(),
            Arc::new(MemoryCache::new()),
            RetryPolicy {
                throttle_min: Duration::from_secs(60),
                throttle_max: Duration::from_secs(60),
                ..RetryPolicy::immediate(3)
            },
        );
        let ttl = Duration::from_secs(3600);

        let started = tokio::time::Instant::now();
        fetcher.fetch_cached("https://x/list", ttl).await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(60));

        let second = tokio::time::Instant::now();
        fetcher.fetch_cached("https://x/list", ttl).await.unwrap();
        assert_eq!(second.elapsed(), Duration::ZERO);
        assert_eq!(transport.calls(), 1);
    }

    #[test]
    fn test_throttle_delay_within_range() {
        let policy = RetryPolicy::from(&FetcherConfig::default());
        for _ in 0..20 {
            let pause = policy.throttle_delay();
            assert!(pause >= Duration::from_millis(1000));
            assert!(pause <= Duration::from_millis(1500));
        }
    }
}
