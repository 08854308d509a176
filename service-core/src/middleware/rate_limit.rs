//! Request throttling.
//!
//! Two mechanisms live here:
//! - a governor-backed per-IP limiter applied as router middleware, the outer
//!   defence against floods;
//! - the [`AttemptLimiter`] capability, a fixed-window attempt counter that
//!   services consult and feed explicitly. Attempts are reserved with
//!   [`AttemptLimiter::check_and_increment`] before any work starts, so
//!   concurrent requests on one key cannot overshoot the budget; flows that
//!   only count failures hand the reservation back with
//!   [`AttemptLimiter::release`].
//!
//! Both are in-memory: a restart clears all throttling history, and separate
//! instances do not share counters. A shared backend only needs another
//! [`AttemptLimiter`] implementation.

use crate::error::AppError;
use crate::middleware::headers::{HeaderReader, FORWARDED_FOR_HEADER};
use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;
use governor::{
    clock::{Clock, DefaultClock},
    state::keyed::DashMapStateStore,
    Quota, RateLimiter,
};
use std::{
    net::{IpAddr, SocketAddr},
    num::NonZeroU32,
    sync::Arc,
    time::{Duration, Instant},
};

/// Rate limiter keyed by client IP address
pub type IpRateLimiter = Arc<RateLimiter<IpAddr, DashMapStateStore<IpAddr>, DefaultClock>>;

/// Create a keyed rate limiter (by IP)
pub fn create_ip_rate_limiter(attempts: u32, window_seconds: u64) -> IpRateLimiter {
    let burst = NonZeroU32::new(attempts.max(1)).unwrap_or(NonZeroU32::MIN);
    let window_ms = window_seconds.max(1).saturating_mul(1000);
    let period = Duration::from_millis(window_ms / u64::from(burst.get()));
    let quota = Quota::with_period(period)
        .unwrap_or_else(|| Quota::per_second(burst))
        .allow_burst(burst);

    Arc::new(RateLimiter::dashmap(quota))
}

/// Resolve the caller's IP: first `x-forwarded-for` hop, then the socket peer.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<IpAddr> {
    headers
        .header(FORWARDED_FOR_HEADER)
        .and_then(|s| s.split(',').next())
        .and_then(|s| s.trim().parse::<IpAddr>().ok())
        .or_else(|| peer.map(|addr| addr.ip()))
}

/// Middleware for IP-based rate limiting
pub async fn ip_rate_limit_middleware(
    State(limiter): State<IpRateLimiter>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    match client_ip(request.headers(), peer) {
        Some(ip) => match limiter.check_key(&ip) {
            Ok(_) => Ok(next.run(request).await),
            Err(negative) => {
                let wait_time = negative.wait_time_from(DefaultClock::default().now());
                metrics::counter!("rate_limited_total", "scope" => "global_ip").increment(1);
                Err(AppError::TooManyRequests(
                    "Zu viele Anfragen. Bitte versuchen Sie es später erneut.".to_string(),
                    Some(wait_time.as_secs()),
                ))
            }
        },
        None => {
            tracing::warn!("Could not determine IP for rate limiting");
            Ok(next.run(request).await)
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    Limited { retry_after: Duration },
}

impl RateLimitDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitDecision::Allowed)
    }
}

/// Attempt counter keyed by an opaque string (`login:{ip}`, `activate:{ip}`...).
pub trait AttemptLimiter: Send + Sync {
    /// Decide whether another attempt is allowed, without recording one.
    fn check(&self, key: &str) -> RateLimitDecision;

    /// Record one attempt against `key`.
    fn register(&self, key: &str);

    /// Atomically record an attempt if the budget allows one. A denied
    /// attempt is not counted.
    fn check_and_increment(&self, key: &str) -> RateLimitDecision;

    /// Return one attempt taken by `check_and_increment` in the current
    /// window. No-op once the window has closed.
    fn release(&self, key: &str);

    /// Forget all attempts for `key`.
    fn reset(&self, key: &str);
}

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    reset_at: Instant,
}

/// Fixed-window counter: the first attempt opens a window of `window`
/// length; once `max_attempts` are recorded inside it, checks are denied
/// until it closes, and the next attempt after that starts over at 1.
#[derive(Debug)]
pub struct FixedWindowLimiter {
    max_attempts: u32,
    window: Duration,
    windows: DashMap<String, Window>,
}

const PURGE_THRESHOLD: usize = 10_000;

impl FixedWindowLimiter {
    pub fn new(max_attempts: u32, window: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            window,
            windows: DashMap::new(),
        }
    }

    pub fn check_at(&self, key: &str, now: Instant) -> RateLimitDecision {
        match self.windows.get(key) {
            Some(w) if now < w.reset_at && w.count >= self.max_attempts => {
                RateLimitDecision::Limited {
                    retry_after: w.reset_at - now,
                }
            }
            _ => RateLimitDecision::Allowed,
        }
    }

    pub fn register_at(&self, key: &str, now: Instant) {
        if self.windows.len() > PURGE_THRESHOLD {
            self.purge_expired(now);
        }

        let window = self.window;
        self.windows
            .entry(key.to_string())
            .and_modify(|w| {
                if now >= w.reset_at {
                    w.count = 1;
                    w.reset_at = now + window;
                } else {
                    w.count = w.count.saturating_add(1);
                }
            })
            .or_insert(Window {
                count: 1,
                reset_at: now + window,
            });
    }

    pub fn check_and_increment_at(&self, key: &str, now: Instant) -> RateLimitDecision {
        if self.windows.len() > PURGE_THRESHOLD {
            self.purge_expired(now);
        }

        // The entry guard holds the shard lock across check and increment
        let mut entry = self.windows.entry(key.to_string()).or_insert(Window {
            count: 0,
            reset_at: now + self.window,
        });
        let w = entry.value_mut();
        if now >= w.reset_at {
            w.count = 0;
            w.reset_at = now + self.window;
        }
        if w.count >= self.max_attempts {
            return RateLimitDecision::Limited {
                retry_after: w.reset_at - now,
            };
        }
        w.count += 1;
        RateLimitDecision::Allowed
    }

    pub fn release_at(&self, key: &str, now: Instant) {
        if let Some(mut w) = self.windows.get_mut(key) {
            if now < w.reset_at {
                w.count = w.count.saturating_sub(1);
            }
        }
    }

    /// Drop windows that have already closed.
    pub fn purge_expired(&self, now: Instant) {
        self.windows.retain(|_, w| now < w.reset_at);
    }
}

impl AttemptLimiter for FixedWindowLimiter {
    fn check(&self, key: &str) -> RateLimitDecision {
        self.check_at(key, Instant::now())
    }

    fn register(&self, key: &str) {
        self.register_at(key, Instant::now())
    }

    fn check_and_increment(&self, key: &str) -> RateLimitDecision {
        self.check_and_increment_at(key, Instant::now())
    }

    fn release(&self, key: &str) {
        self.release_at(key, Instant::now())
    }

    fn reset(&self, key: &str) {
        self.windows.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limits_after_max_attempts() {
        let limiter = FixedWindowLimiter::new(5, Duration::from_secs(900));
        let now = Instant::now();

        for _ in 0..5 {
            assert!(limiter.check_at("login:10.0.0.1", now).is_allowed());
            limiter.register_at("login:10.0.0.1", now);
        }

        assert!(!limiter.check_at("login:10.0.0.1", now).is_allowed());
        // Other keys are unaffected
        assert!(limiter.check_at("login:10.0.0.2", now).is_allowed());
    }

    #[test]
    fn test_window_expiry_resets_counter() {
        let limiter = FixedWindowLimiter::new(2, Duration::from_secs(60));
        let start = Instant::now();

        limiter.register_at("k", start);
        limiter.register_at("k", start);
        assert!(!limiter.check_at("k", start + Duration::from_secs(59)).is_allowed());

        let later = start + Duration::from_secs(61);
        assert!(limiter.check_at("k", later).is_allowed());

        limiter.register_at("k", later);
        assert!(limiter.check_at("k", later).is_allowed());
        limiter.register_at("k", later);
        assert!(!limiter.check_at("k", later).is_allowed());
    }

    #[test]
    fn test_retry_after_reports_remaining_window() {
        let limiter = FixedWindowLimiter::new(1, Duration::from_secs(100));
        let start = Instant::now();
        limiter.register_at("k", start);

        match limiter.check_at("k", start + Duration::from_secs(40)) {
            RateLimitDecision::Limited { retry_after } => {
                assert_eq!(retry_after, Duration::from_secs(60))
            }
            RateLimitDecision::Allowed => panic!("expected limit"),
        }
    }

    #[test]
    fn test_check_and_increment() {
        let limiter = FixedWindowLimiter::new(1, Duration::from_secs(60));
        assert!(limiter.check_and_increment("k").is_allowed());
        assert!(!limiter.check_and_increment("k").is_allowed());
        limiter.reset("k");
        assert!(limiter.check_and_increment("k").is_allowed());
    }

    #[test]
    fn test_release_returns_a_reservation() {
        let limiter = FixedWindowLimiter::new(2, Duration::from_secs(60));
        let now = Instant::now();

        assert!(limiter.check_and_increment_at("k", now).is_allowed());
        assert!(limiter.check_and_increment_at("k", now).is_allowed());
        assert!(!limiter.check_and_increment_at("k", now).is_allowed());

        limiter.release_at("k", now);
        assert!(limiter.check_and_increment_at("k", now).is_allowed());
        assert!(!limiter.check_and_increment_at("k", now).is_allowed());

        // Releasing after the window closed does not carry into the next one
        let later = now + Duration::from_secs(61);
        limiter.release_at("k", later);
        assert!(limiter.check_and_increment_at("k", later).is_allowed());
    }

    #[test]
    fn test_concurrent_reservations_never_exceed_budget() {
        let limiter = Arc::new(FixedWindowLimiter::new(5, Duration::from_secs(900)));

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let limiter = limiter.clone();
                std::thread::spawn(move || limiter.check_and_increment("activate:10.0.0.9"))
            })
            .collect();

        let allowed = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(RateLimitDecision::is_allowed)
            .count();
        assert_eq!(allowed, 5);
    }

    #[test]
    fn test_large_window_does_not_overflow() {
        let limiter = create_ip_rate_limiter(10, u64::MAX);
        assert!(limiter.check_key(&"10.0.0.1".parse().unwrap()).is_ok());
    }

    #[test]
    fn test_purge_expired() {
        let limiter = FixedWindowLimiter::new(1, Duration::from_secs(1));
        let start = Instant::now();
        limiter.register_at("a", start);
        limiter.purge_expired(start + Duration::from_secs(2));
        assert!(limiter.windows.is_empty());
    }

    #[test]
    fn test_client_ip_prefers_forwarded_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.1".parse().unwrap());
        let peer: SocketAddr = "127.0.0.1:4000".parse().unwrap();

        assert_eq!(
            client_ip(&headers, Some(peer)),
            Some("203.0.113.7".parse().unwrap())
        );
        assert_eq!(
            client_ip(&HeaderMap::new(), Some(peer)),
            Some("127.0.0.1".parse().unwrap())
        );
        assert_eq!(client_ip(&HeaderMap::new(), None), None);
    }
}
