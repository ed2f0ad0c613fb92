//! Fixed-window request budgets
//!
//! Every identity (authenticated user or caller address) has a set of global budgets, and
//! individual routes may add a budget of their own. A request is counted only when it fits
//! in every budget that applies to it.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use log::debug;

use crate::config::RateLimitConfig;

const MINUTE: Duration = Duration::from_secs(60);
const HOUR: Duration = Duration::from_secs(60 * 60);
const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// A number of requests allowed per window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Budget {
    pub limit: u32,
    pub window: Duration,
}

impl Budget {
    pub const fn new(limit: u32, window: Duration) -> Self {
        Self { limit, window }
    }

    pub const fn per_minute(limit: u32) -> Self {
        Self::new(limit, MINUTE)
    }

    pub const fn per_hour(limit: u32) -> Self {
        Self::new(limit, HOUR)
    }

    pub const fn per_day(limit: u32) -> Self {
        Self::new(limit, DAY)
    }
}

impl fmt::Display for Budget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = match self.window {
            w if w == DAY => "day".to_string(),
            w if w == HOUR => "hour".to_string(),
            w if w == MINUTE => "minute".to_string(),
            w => format!("{} seconds", w.as_secs()),
        };
        write!(f, "{} per {}", self.limit, unit)
    }
}

/// Returned when a request does not fit in one of its budgets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitExceeded {
    /// The budget that rejected the request
    pub budget: Budget,
    /// Time until that budget's window rolls over
    pub retry_after: Duration,
}

impl fmt::Display for RateLimitExceeded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.budget)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Scope {
    Global,
    Route(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CounterKey {
    identity: String,
    scope: Scope,
    budget: Budget,
}

#[derive(Debug, Clone)]
struct WindowCounter {
    count: u32,
    window_start: Instant,
}

impl WindowCounter {
    /// Count for the window containing `now`
    fn current(&self, budget: &Budget, now: Instant) -> u32 {
        if self.expired(budget, now) {
            0
        } else {
            self.count
        }
    }

    fn expired(&self, budget: &Budget, now: Instant) -> bool {
        now.saturating_duration_since(self.window_start) >= budget.window
    }

    fn retry_after(&self, budget: &Budget, now: Instant) -> Duration {
        budget
            .window
            .saturating_sub(now.saturating_duration_since(self.window_start))
    }
}

/// In-memory request counters
#[derive(Debug)]
pub struct RateLimiter {
    enabled: bool,
    global: Vec<Budget>,
    routes: HashMap<String, Budget>,
    counters: Mutex<HashMap<CounterKey, WindowCounter>>,
}

impl RateLimiter {
    /// Limiter with the given global budgets and no route budgets
    pub fn new(global: Vec<Budget>) -> Self {
        Self {
            enabled: true,
            global,
            routes: HashMap::new(),
            counters: Mutex::new(HashMap::new()),
        }
    }

    /// Limiter that lets every request through
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::new(Vec::new())
        }
    }

    /// Add a budget that applies to one route only
    pub fn with_route(mut self, route: &str, budget: Budget) -> Self {
        self.routes.insert(route.to_string(), budget);
        self
    }

    /// Build the limiter described by the configuration
    pub fn from_config(config: &RateLimitConfig) -> Self {
        if !config.enabled {
            return Self::disabled();
        }
        Self::new(vec![
            Budget::per_day(config.per_day),
            Budget::per_hour(config.per_hour),
        ])
        .with_route(
            "/api/v1/transcribe",
            Budget::per_minute(config.transcribe_per_minute),
        )
        .with_route(
            "/api/v1/paraphrase",
            Budget::per_minute(config.paraphrase_per_minute),
        )
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Record a request from `identity` on `route` at `now`
    ///
    /// Nothing is counted when any budget is exhausted; the error names the budget with
    /// the longest wait.
    pub fn check_budget(
        &self,
        identity: &str,
        route: &str,
        now: Instant,
    ) -> Result<(), RateLimitExceeded> {
        if !self.enabled {
            return Ok(());
        }

        let keys: Vec<CounterKey> = self
            .global
            .iter()
            .map(|budget| CounterKey {
                identity: identity.to_string(),
                scope: Scope::Global,
                budget: *budget,
            })
            .chain(self.routes.get(route).map(|budget| CounterKey {
                identity: identity.to_string(),
                scope: Scope::Route(route.to_string()),
                budget: *budget,
            }))
            .collect();

        let mut counters = self.counters.lock().unwrap_or_else(PoisonError::into_inner);

        let mut rejection: Option<RateLimitExceeded> = None;
        for key in &keys {
            let (count, retry_after) = match counters.get(key) {
                Some(counter) => (
                    counter.current(&key.budget, now),
                    counter.retry_after(&key.budget, now),
                ),
                None => (0, key.budget.window),
            };
            if count >= key.budget.limit {
                let longer = rejection
                    .as_ref()
                    .map_or(true, |r| retry_after > r.retry_after);
                if longer {
                    rejection = Some(RateLimitExceeded {
                        budget: key.budget,
                        retry_after,
                    });
                }
            }
        }

        if let Some(rejection) = rejection {
            debug!("Rejecting request from {} on {}: {}", identity, route, rejection);
            return Err(rejection);
        }

        for key in keys {
            let budget = key.budget;
            let counter = counters.entry(key).or_insert(WindowCounter {
                count: 0,
                window_start: now,
            });
            if counter.expired(&budget, now) {
                counter.count = 0;
                counter.window_start = now;
            }
            counter.count += 1;
        }

        Ok(())
    }

    /// Drop counters whose window has rolled over
    pub fn purge_expired(&self, now: Instant) -> usize {
        let mut counters = self.counters.lock().unwrap_or_else(PoisonError::into_inner);
        let before = counters.len();
        counters.retain(|key, counter| !counter.expired(&key.budget, now));
        before - counters.len()
    }

    /// Number of live counters
    pub fn tracked_counters(&self) -> usize {
        self.counters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROUTE: &str = "/api/v1/transcribe";

    #[test]
    fn route_budget_rejects_once_spent() {
        let limiter = RateLimiter::new(vec![]).with_route(ROUTE, Budget::per_minute(2));
        let now = Instant::now();

        assert!(limiter.check_budget("alice", ROUTE, now).is_ok());
        assert!(limiter.check_budget("alice", ROUTE, now).is_ok());

        let err = limiter
            .check_budget("alice", ROUTE, now + Duration::from_secs(15))
            .unwrap_err();
        assert_eq!(err.budget, Budget::per_minute(2));
        assert_eq!(err.retry_after, Duration::from_secs(45));
        assert_eq!(err.to_string(), "2 per minute");
    }

    #[test]
    fn window_rollover_resets_the_count() {
        let limiter = RateLimiter::new(vec![]).with_route(ROUTE, Budget::per_minute(1));
        let now = Instant::now();

        assert!(limiter.check_budget("alice", ROUTE, now).is_ok());
        assert!(limiter.check_budget("alice", ROUTE, now).is_err());
        assert!(limiter
            .check_budget("alice", ROUTE, now + Duration::from_secs(60))
            .is_ok());
    }

    #[test]
    fn identities_are_counted_separately() {
        let limiter = RateLimiter::new(vec![]).with_route(ROUTE, Budget::per_minute(1));
        let now = Instant::now();

        assert!(limiter.check_budget("alice", ROUTE, now).is_ok());
        assert!(limiter.check_budget("bob", ROUTE, now).is_ok());
        assert!(limiter.check_budget("alice", ROUTE, now).is_err());
    }

    #[test]
    fn route_budgets_do_not_leak_to_other_routes() {
        let limiter = RateLimiter::new(vec![]).with_route(ROUTE, Budget::per_minute(1));
        let now = Instant::now();

        assert!(limiter.check_budget("alice", ROUTE, now).is_ok());
        assert!(limiter.check_budget("alice", ROUTE, now).is_err());
        for _ in 0..5 {
            assert!(limiter
                .check_budget("alice", "/api/v1/paraphrase_logs", now)
                .is_ok());
        }
    }

    #[test]
    fn global_budget_spans_routes() {
        let limiter = RateLimiter::new(vec![Budget::per_hour(3)]);
        let now = Instant::now();

        assert!(limiter.check_budget("alice", "/a", now).is_ok());
        assert!(limiter.check_budget("alice", "/b", now).is_ok());
        assert!(limiter.check_budget("alice", "/c", now).is_ok());
        let err = limiter.check_budget("alice", "/d", now).unwrap_err();
        assert_eq!(err.to_string(), "3 per hour");
    }

    #[test]
    fn rejected_requests_do_not_consume_other_budgets() {
        let limiter = RateLimiter::new(vec![Budget::per_hour(3)])
            .with_route(ROUTE, Budget::per_minute(1));
        let now = Instant::now();

        assert!(limiter.check_budget("alice", ROUTE, now).is_ok());
        // Rejected by the route budget, so the hourly budget stays at 1 of 3
        assert!(limiter.check_budget("alice", ROUTE, now).is_err());
        assert!(limiter.check_budget("alice", ROUTE, now).is_err());

        assert!(limiter.check_budget("alice", "/other", now).is_ok());
        assert!(limiter.check_budget("alice", "/other", now).is_ok());
        assert!(limiter.check_budget("alice", "/other", now).is_err());
    }

    #[test]
    fn longest_wait_is_reported() {
        let limiter = RateLimiter::new(vec![Budget::per_hour(1)])
            .with_route(ROUTE, Budget::per_minute(1));
        let now = Instant::now();

        assert!(limiter.check_budget("alice", ROUTE, now).is_ok());
        let err = limiter.check_budget("alice", ROUTE, now).unwrap_err();
        assert_eq!(err.budget, Budget::per_hour(1));
        assert_eq!(err.retry_after, HOUR);
    }

    #[test]
    fn disabled_limiter_allows_everything() {
        let limiter = RateLimiter::from_config(&RateLimitConfig {
            enabled: false,
            ..RateLimitConfig::default()
        });
        let now = Instant::now();
        assert!(!limiter.is_enabled());
        for _ in 0..100 {
            assert!(limiter.check_budget("alice", ROUTE, now).is_ok());
        }
        assert_eq!(limiter.tracked_counters(), 0);
    }

    #[test]
    fn default_configuration_budgets() {
        let limiter = RateLimiter::from_config(&RateLimitConfig::default());
        let now = Instant::now();
        for _ in 0..10 {
            assert!(limiter.check_budget("alice", ROUTE, now).is_ok());
        }
        let err = limiter.check_budget("alice", ROUTE, now).unwrap_err();
        assert_eq!(err.to_string(), "10 per minute");
    }

    #[test]
    fn purge_drops_only_expired_counters() {
        let limiter = RateLimiter::new(vec![Budget::per_hour(10)])
            .with_route(ROUTE, Budget::per_minute(10));
        let now = Instant::now();
        limiter.check_budget("alice", ROUTE, now).unwrap();
        assert_eq!(limiter.tracked_counters(), 2);

        assert_eq!(limiter.purge_expired(now + Duration::from_secs(61)), 1);
        assert_eq!(limiter.tracked_counters(), 1);
        assert_eq!(limiter.purge_expired(now + HOUR), 1);
        assert_eq!(limiter.tracked_counters(), 0);
    }
}
