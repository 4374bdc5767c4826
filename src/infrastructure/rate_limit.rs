//! Per-origin token buckets for the edge of the system.
//!
//! The limiter is an ordinary value: build one, optionally start its eviction
//! task, and shut it down when done. Nothing here is process-wide.

use crate::config::RateLimitConfig;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::debug;

struct Bucket {
    tokens: f64,
    refilled_at: Instant,
    last_seen: Instant,
}

pub struct RateLimiter {
    config: RateLimitConfig,
    buckets: Mutex<HashMap<String, Bucket>>,
    janitor: Mutex<Option<(oneshot::Sender<()>, JoinHandle<()>)>>,
}

impl RateLimiter {
    /// A limiter without a background eviction task.
    pub fn new(config: RateLimitConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            buckets: Mutex::new(HashMap::new()),
            janitor: Mutex::new(None),
        })
    }

    /// A limiter that sweeps idle origins every `sweep_interval_secs`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(config: RateLimitConfig) -> Arc<Self> {
        let limiter = Self::new(config);
        let (tx, mut rx) = oneshot::channel();
        let weak: Weak<Self> = Arc::downgrade(&limiter);
        let every = Duration::from_secs(limiter.config.sweep_interval_secs.max(1));
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let Some(limiter) = weak.upgrade() else { break };
                        let evicted = limiter.evict_idle();
                        if evicted > 0 {
                            debug!(evicted, "evicted idle rate limit buckets");
                        }
                    }
                    _ = &mut rx => break,
                }
            }
        });
        *limiter.janitor.lock() = Some((tx, handle));
        limiter
    }

    /// Takes one token for `key`, returning false when the bucket is empty.
    pub fn check(&self, key: &str) -> bool {
        let now = Instant::now();
        let burst = f64::from(self.config.burst.max(1));
        let mut buckets = self.buckets.lock();
        let bucket = buckets.entry(key.to_string()).or_insert(Bucket {
            tokens: burst,
            refilled_at: now,
            last_seen: now,
        });

        let elapsed = now.duration_since(bucket.refilled_at).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.config.per_second).min(burst);
        bucket.refilled_at = now;
        bucket.last_seen = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Drops buckets not seen for `idle_ttl_secs`. Returns how many went.
    pub fn evict_idle(&self) -> usize {
        let ttl = Duration::from_secs(self.config.idle_ttl_secs);
        let now = Instant::now();
        let mut buckets = self.buckets.lock();
        let before = buckets.len();
        buckets.retain(|_, b| now.duration_since(b.last_seen) < ttl);
        before - buckets.len()
    }

    pub fn tracked(&self) -> usize {
        self.buckets.lock().len()
    }

    /// Stops the eviction task, if any, and waits for it to exit.
    pub async fn shutdown(&self) {
        let janitor = self.janitor.lock().take();
        if let Some((tx, handle)) = janitor {
            let _ = tx.send(());
            let _ = handle.await;
        }
    }
}
