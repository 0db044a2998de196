//! # Sliding-Window Rate Limiter
//!
//! Per-client request budgets over a rolling window. Each client id (the
//! source address, by convention) owns an ordered list of request
//! timestamps; a request is admitted if, after dropping entries older
//! than `now - window`, fewer than `rate` remain.
//!
//! ## Concurrency
//!
//! The client map is a `DashMap`, so unrelated clients never contend.
//! Each client's timestamp list sits behind its own `parking_lot::Mutex`;
//! the prune-and-count runs under that per-client lock only. The sweeper
//! walks the map and evicts clients whose newest timestamp has aged out,
//! which keeps the map from accumulating one entry per address that ever
//! connected.
//!
//! ## Tiers
//!
//! Three named budgets over a shared one-minute window:
//! strict (5, login/registration), moderate (30, authenticated mutations),
//! generous (100, anonymous reads). This limiter is the system's only
//! back-pressure mechanism.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::{
    GENEROUS_RATE_LIMIT, MODERATE_RATE_LIMIT, RATE_LIMIT_WINDOW, STRICT_RATE_LIMIT,
};
use crate::error::{Result, VotingError};

/// Request timestamps for one client, newest last.
#[derive(Default)]
struct ClientWindow {
    requests: Mutex<Vec<DateTime<Utc>>>,
}

/// Sliding-window limiter for one endpoint class.
pub struct RateLimiter {
    clients: DashMap<String, Arc<ClientWindow>>,
    rate: usize,
    window: Duration,
}

impl RateLimiter {
    /// A limiter admitting `rate` requests per client per `window`.
    pub fn new(rate: usize, window: StdDuration) -> Self {
        Self {
            clients: DashMap::new(),
            rate,
            window: Duration::from_std(window).unwrap_or_else(|_| Duration::seconds(60)),
        }
    }

    /// Strict tier: authentication and registration endpoints.
    pub fn strict() -> Self {
        Self::new(STRICT_RATE_LIMIT, RATE_LIMIT_WINDOW)
    }

    /// Moderate tier: authenticated mutating and admin operations.
    pub fn moderate() -> Self {
        Self::new(MODERATE_RATE_LIMIT, RATE_LIMIT_WINDOW)
    }

    /// Generous tier: anonymous read-only endpoints.
    pub fn generous() -> Self {
        Self::new(GENEROUS_RATE_LIMIT, RATE_LIMIT_WINDOW)
    }

    /// The three tier limiters with the configured budget overrides
    /// applied, in (strict, moderate, generous) order.
    pub fn tiers(config: &crate::config::Config) -> (Self, Self, Self) {
        (
            Self::new(config.rate_strict, RATE_LIMIT_WINDOW),
            Self::new(config.rate_moderate, RATE_LIMIT_WINDOW),
            Self::new(config.rate_generous, RATE_LIMIT_WINDOW),
        )
    }

    /// Admit or reject a request from `client_id` at the current instant.
    pub fn check(&self, client_id: &str) -> Result<()> {
        if self.allow_at(client_id, Utc::now()) {
            Ok(())
        } else {
            Err(VotingError::TooManyRequests)
        }
    }

    /// Admit or reject at an explicit instant. The testable core of
    /// [`check`](Self::check).
    pub fn allow_at(&self, client_id: &str, now: DateTime<Utc>) -> bool {
        let window = self
            .clients
            .entry(client_id.to_string())
            .or_default()
            .clone();

        let mut requests = window.requests.lock();
        let cutoff = now - self.window;
        requests.retain(|&t| t > cutoff);

        if requests.len() >= self.rate {
            return false;
        }
        requests.push(now);
        true
    }

    /// Evict clients with no request inside the current window.
    pub fn sweep(&self) {
        let cutoff = Utc::now() - self.window;
        let before = self.clients.len();
        self.clients.retain(|_, window| {
            let requests = window.requests.lock();
            requests.last().is_some_and(|&t| t > cutoff)
        });
        let evicted = before - self.clients.len();
        if evicted > 0 {
            debug!(evicted, remaining = self.clients.len(), "rate limiter swept idle clients");
        }
    }

    /// Number of currently tracked clients.
    pub fn tracked_clients(&self) -> usize {
        self.clients.len()
    }

    /// Spawn the background sweeper. Runs every two windows until the
    /// shutdown signal flips.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let limiter = Arc::clone(self);
        let period = (limiter.window * 2)
            .to_std()
            .unwrap_or(StdDuration::from_secs(120));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick fires immediately; skip it so the first sweep
            // happens a full period after startup.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => limiter.sweep(),
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            info!("rate limiter sweeper shutting down");
                            return;
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_up_to_rate_then_rejects() {
        let limiter = RateLimiter::new(5, StdDuration::from_secs(60));
        let now = Utc::now();
        for _ in 0..5 {
            assert!(limiter.allow_at("10.0.0.1", now));
        }
        assert!(!limiter.allow_at("10.0.0.1", now));
        assert_eq!(
            limiter.check("10.0.0.1").unwrap_err(),
            VotingError::TooManyRequests
        );
    }

    #[test]
    fn clients_are_independent() {
        let limiter = RateLimiter::new(1, StdDuration::from_secs(60));
        let now = Utc::now();
        assert!(limiter.allow_at("10.0.0.1", now));
        assert!(limiter.allow_at("10.0.0.2", now));
        assert!(!limiter.allow_at("10.0.0.1", now));
    }

    #[test]
    fn window_slides() {
        let limiter = RateLimiter::new(2, StdDuration::from_secs(60));
        let t0 = Utc::now();
        assert!(limiter.allow_at("c", t0));
        assert!(limiter.allow_at("c", t0 + Duration::seconds(10)));
        assert!(!limiter.allow_at("c", t0 + Duration::seconds(20)));
        // t0 ages out of the window; one slot opens.
        assert!(limiter.allow_at("c", t0 + Duration::seconds(61)));
        assert!(!limiter.allow_at("c", t0 + Duration::seconds(62)));
    }

    #[test]
    fn sweep_evicts_only_idle_clients() {
        let limiter = RateLimiter::new(5, StdDuration::from_secs(60));
        let stale = Utc::now() - Duration::seconds(300);
        assert!(limiter.allow_at("stale", stale));
        assert!(limiter.allow_at("fresh", Utc::now()));
        assert_eq!(limiter.tracked_clients(), 2);

        limiter.sweep();
        assert_eq!(limiter.tracked_clients(), 1);
    }

    #[test]
    fn tier_budgets() {
        let now = Utc::now();
        let strict = RateLimiter::strict();
        for _ in 0..5 {
            assert!(strict.allow_at("c", now));
        }
        assert!(!strict.allow_at("c", now));

        let moderate = RateLimiter::moderate();
        for _ in 0..30 {
            assert!(moderate.allow_at("c", now));
        }
        assert!(!moderate.allow_at("c", now));

        let generous = RateLimiter::generous();
        for _ in 0..100 {
            assert!(generous.allow_at("c", now));
        }
        assert!(!generous.allow_at("c", now));
    }
}
