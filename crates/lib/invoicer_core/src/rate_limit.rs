//! Per-identity token-bucket rate limiting.
//!
//! Each caller key (`user:<id>` or `ip:<addr>`) owns an independent bucket
//! created lazily at full burst. Buckets live in a sharded `DashMap`, so a
//! request only contends with others hashing to the same shard. A background
//! sweep drops buckets that have been idle longer than the staleness
//! threshold.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Seconds a rejected caller is told to wait. Fixed, not derived from
/// bucket state.
pub const RETRY_AFTER_SECS: u64 = 60;

/// Default anonymous ceiling (requests per minute).
pub const DEFAULT_ANONYMOUS_PER_MIN: u32 = 30;

/// Default authenticated ceiling (requests per minute).
pub const DEFAULT_AUTHENTICATED_PER_MIN: u32 = 60;

/// Default sweep interval: 3 minutes.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(180);

/// Default staleness threshold: 5 minutes.
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(300);

/// A requests-per-minute ceiling, i.e. a bucket of `per_minute` tokens
/// refilled at `per_minute / 60` tokens per second.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ceiling {
    pub per_minute: u32,
}

impl Ceiling {
    pub const fn per_minute(per_minute: u32) -> Self {
        Self { per_minute }
    }

    /// Maximum tokens held.
    pub fn burst(&self) -> f64 {
        f64::from(self.per_minute)
    }

    /// Tokens added per second.
    pub fn refill_per_sec(&self) -> f64 {
        f64::from(self.per_minute) / 60.0
    }
}

/// Who a request is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Caller<'a> {
    User(&'a str),
    Ip(Option<IpAddr>),
}

impl Caller<'_> {
    /// Bucket key for this caller.
    pub fn key(&self) -> String {
        match self {
            Caller::User(id) => format!("user:{id}"),
            Caller::Ip(Some(ip)) => format!("ip:{ip}"),
            Caller::Ip(None) => "ip:unknown".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
    last_seen: Instant,
}

impl Bucket {
    fn full(ceiling: Ceiling, now: Instant) -> Self {
        Self {
            tokens: ceiling.burst(),
            last_refill: now,
            last_seen: now,
        }
    }

    fn try_take(&mut self, ceiling: Ceiling, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * ceiling.refill_per_sec()).min(ceiling.burst());
        self.last_refill = now;
        self.last_seen = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Token-bucket limiter with separate anonymous and authenticated ceilings.
#[derive(Debug)]
pub struct RateLimiter {
    buckets: DashMap<String, Bucket>,
    anonymous: Ceiling,
    authenticated: Ceiling,
}

impl RateLimiter {
    pub fn new(anonymous_per_min: u32, authenticated_per_min: u32) -> Self {
        Self {
            buckets: DashMap::new(),
            anonymous: Ceiling::per_minute(anonymous_per_min),
            authenticated: Ceiling::per_minute(authenticated_per_min),
        }
    }

    /// Ceiling that applies to `caller`.
    pub fn ceiling_for(&self, caller: &Caller<'_>) -> Ceiling {
        match caller {
            Caller::User(_) => self.authenticated,
            Caller::Ip(_) => self.anonymous,
        }
    }

    /// Attempt to debit one token for `caller` under its ceiling.
    pub fn check(&self, caller: &Caller<'_>) -> bool {
        let key = caller.key();
        let allowed = self.allow(&key, self.ceiling_for(caller));
        if !allowed {
            debug!(key = %key, "rate limit exceeded");
        }
        allowed
    }

    /// Attempt to debit one token from `key`'s bucket.
    pub fn allow(&self, key: &str, ceiling: Ceiling) -> bool {
        self.allow_at(key, ceiling, Instant::now())
    }

    fn allow_at(&self, key: &str, ceiling: Ceiling, now: Instant) -> bool {
        if let Some(mut bucket) = self.buckets.get_mut(key) {
            return bucket.try_take(ceiling, now);
        }
        self.buckets
            .entry(key.to_string())
            .or_insert_with(|| Bucket::full(ceiling, now))
            .try_take(ceiling, now)
    }

    /// Drop buckets idle for longer than `stale_after`. Returns how many were removed.
    ///
    /// Stale keys are collected first and removed one by one, so no shard is
    /// write-locked for longer than a single delete.
    pub fn sweep(&self, stale_after: Duration) -> usize {
        self.sweep_at(Instant::now(), stale_after)
    }

    fn sweep_at(&self, now: Instant, stale_after: Duration) -> usize {
        let is_stale = |b: &Bucket| now.saturating_duration_since(b.last_seen) > stale_after;

        let stale: Vec<String> = self
            .buckets
            .iter()
            .filter(|entry| is_stale(entry.value()))
            .map(|entry| entry.key().clone())
            .collect();

        stale
            .into_iter()
            .filter(|key| self.buckets.remove_if(key, |_, b| is_stale(b)).is_some())
            .count()
    }

    /// Number of tracked buckets.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Spawn the periodic sweep. The task exits when `shutdown` is cancelled.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        interval: Duration,
        stale_after: Duration,
        shutdown: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        let limiter = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let removed = limiter.sweep(stale_after);
                        if removed > 0 {
                            debug!(removed, remaining = limiter.len(), "swept idle rate-limit buckets");
                        }
                    }
                }
            }
            debug!("rate-limit sweeper stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ceiling_converts_to_rate_and_burst() {
        let c = Ceiling::per_minute(30);
        assert_eq!(c.burst(), 30.0);
        assert!((c.refill_per_sec() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn caller_keys() {
        assert_eq!(Caller::User("user_7").key(), "user:user_7");
        assert_eq!(
            Caller::Ip(Some("10.0.0.1".parse().unwrap())).key(),
            "ip:10.0.0.1"
        );
        assert_eq!(Caller::Ip(None).key(), "ip:unknown");
    }

    #[test]
    fn one_per_minute_allows_then_denies_then_refills() {
        let rl = RateLimiter::new(1, 1);
        let ceiling = Ceiling::per_minute(1);
        let t0 = Instant::now();

        assert!(rl.allow_at("ip:10.0.0.1", ceiling, t0));
        assert!(!rl.allow_at("ip:10.0.0.1", ceiling, t0 + Duration::from_millis(10)));
        assert!(!rl.allow_at("ip:10.0.0.1", ceiling, t0 + Duration::from_secs(30)));
        assert!(rl.allow_at("ip:10.0.0.1", ceiling, t0 + Duration::from_secs(61)));
    }

    #[test]
    fn keys_are_independent() {
        let rl = RateLimiter::new(1, 1);
        let ceiling = Ceiling::per_minute(1);
        let t0 = Instant::now();

        assert!(rl.allow_at("ip:10.0.0.1", ceiling, t0));
        assert!(rl.allow_at("ip:10.0.0.2", ceiling, t0));
        assert!(!rl.allow_at("ip:10.0.0.1", ceiling, t0));
        assert_eq!(rl.len(), 2);
    }

    #[test]
    fn burst_is_the_ceiling_and_never_exceeded() {
        let rl = RateLimiter::new(5, 5);
        let ceiling = Ceiling::per_minute(5);
        let t0 = Instant::now();

        for _ in 0..5 {
            assert!(rl.allow_at("k", ceiling, t0));
        }
        assert!(!rl.allow_at("k", ceiling, t0));

        // An hour idle still only refills to burst.
        let later = t0 + Duration::from_secs(3600);
        for _ in 0..5 {
            assert!(rl.allow_at("k", ceiling, later));
        }
        assert!(!rl.allow_at("k", ceiling, later));
    }

    #[test]
    fn refill_is_proportional_to_elapsed_time() {
        let rl = RateLimiter::new(60, 60);
        let ceiling = Ceiling::per_minute(60);
        let t0 = Instant::now();

        for _ in 0..60 {
            assert!(rl.allow_at("k", ceiling, t0));
        }
        assert!(!rl.allow_at("k", ceiling, t0));

        // 60/min = 1 token per second; 3 seconds buys 3 requests.
        let t3 = t0 + Duration::from_secs(3);
        for _ in 0..3 {
            assert!(rl.allow_at("k", ceiling, t3));
        }
        assert!(!rl.allow_at("k", ceiling, t3));
    }

    #[test]
    fn authenticated_callers_get_their_own_ceiling() {
        let rl = RateLimiter::new(1, 3);
        assert_eq!(rl.ceiling_for(&Caller::Ip(None)), Ceiling::per_minute(1));
        assert_eq!(rl.ceiling_for(&Caller::User("u")), Ceiling::per_minute(3));

        let user = Caller::User("user_1");
        assert!(rl.check(&user));
        assert!(rl.check(&user));
        assert!(rl.check(&user));
        assert!(!rl.check(&user));

        let anon = Caller::Ip(Some("192.168.1.1".parse().unwrap()));
        assert!(rl.check(&anon));
        assert!(!rl.check(&anon));
    }

    #[test]
    fn denied_requests_still_update_last_seen() {
        let rl = RateLimiter::new(1, 1);
        let ceiling = Ceiling::per_minute(1);
        let t0 = Instant::now();
        let stale = Duration::from_secs(300);

        assert!(rl.allow_at("k", ceiling, t0));
        assert!(!rl.allow_at("k", ceiling, t0 + Duration::from_secs(200)));

        // Idle 300s since the denied request, not since creation.
        assert_eq!(rl.sweep_at(t0 + Duration::from_secs(400), stale), 0);
        assert_eq!(rl.sweep_at(t0 + Duration::from_secs(501), stale), 1);
        assert!(rl.is_empty());
    }

    #[test]
    fn sweep_removes_only_stale_buckets() {
        let rl = RateLimiter::new(10, 10);
        let ceiling = Ceiling::per_minute(10);
        let t0 = Instant::now();

        rl.allow_at("old", ceiling, t0);
        rl.allow_at("fresh", ceiling, t0 + Duration::from_secs(250));

        let removed = rl.sweep_at(t0 + Duration::from_secs(301), Duration::from_secs(300));
        assert_eq!(removed, 1);
        assert_eq!(rl.len(), 1);
        assert!(rl.buckets.contains_key("fresh"));
    }

    #[tokio::test]
    async fn sweeper_drops_idle_buckets_and_keeps_active_ones() {
        let rl = Arc::new(RateLimiter::new(10, 10));
        let ceiling = Ceiling::per_minute(10);
        rl.allow("ip:10.0.0.1", ceiling);

        let shutdown = CancellationToken::new();
        let handle = rl.spawn_sweeper(
            Duration::from_millis(50),
            Duration::from_millis(100),
            shutdown.clone(),
        );

        // Touch one key every 20ms; denials still refresh last_seen.
        for _ in 0..15 {
            rl.allow("ip:10.0.0.2", ceiling);
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        assert!(!rl.buckets.contains_key("ip:10.0.0.1"));
        assert!(rl.buckets.contains_key("ip:10.0.0.2"));
        assert_eq!(rl.len(), 1);

        shutdown.cancel();
        handle.await.unwrap();
    }
}
