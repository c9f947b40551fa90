// ABOUTME: Fixed-window request counter per caller identity
// ABOUTME: Decisions carry limit, remaining and retry-after; idle windows are purged periodically
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 sqlgate contributors

//! # Rate Limiting
//!
//! Each caller key owns one window that opens on its first request. Requests
//! are counted until the window's length elapses, after which the next request
//! opens a fresh window. A `max_requests` of zero disables limiting.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::config::RateLimitConfig;

/// Outcome of a rate-limit check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitDecision {
    /// Whether the request must be rejected
    pub is_rate_limited: bool,
    /// Requests allowed per window
    pub limit: u32,
    /// Requests left in the current window
    pub remaining: u32,
    /// When the current window closes
    pub reset_at: DateTime<Utc>,
    /// Seconds until a rejected caller may retry
    pub retry_after_seconds: u64,
}

#[derive(Clone)]
struct Window {
    opened: Instant,
    count: u32,
}

impl Window {
    const fn open(now: Instant) -> Self {
        Self {
            opened: now,
            count: 0,
        }
    }

    fn is_expired(&self, now: Instant, length: Duration) -> bool {
        now.duration_since(self.opened) >= length
    }
}

/// Process-wide fixed-window limiter
pub struct RateLimiter {
    windows: DashMap<String, Window>,
    config: RateLimitConfig,
}

impl RateLimiter {
    /// Create a limiter with no tracked callers
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            windows: DashMap::new(),
            config,
        }
    }

    /// Count one request for `caller` and decide whether it may proceed
    #[must_use]
    pub fn check(&self, caller: &str) -> RateLimitDecision {
        let limit = self.config.max_requests;
        if limit == 0 {
            return RateLimitDecision {
                is_rate_limited: false,
                limit,
                remaining: u32::MAX,
                reset_at: Utc::now(),
                retry_after_seconds: 0,
            };
        }

        let now = Instant::now();
        let length = self.config.window;
        let mut window = self
            .windows
            .entry(caller.to_owned())
            .or_insert_with(|| Window::open(now));
        if window.is_expired(now, length) {
            *window = Window::open(now);
        }

        let is_rate_limited = window.count >= limit;
        if !is_rate_limited {
            window.count += 1;
        }

        let until_reset = length.saturating_sub(now.duration_since(window.opened));
        let remaining = limit.saturating_sub(window.count);
        drop(window);

        let retry_after_seconds = if is_rate_limited {
            until_reset.as_secs() + u64::from(until_reset.subsec_nanos() > 0)
        } else {
            0
        };

        let reset_in =
            ChronoDuration::from_std(until_reset).unwrap_or_else(|_| ChronoDuration::zero());
        RateLimitDecision {
            is_rate_limited,
            limit,
            remaining,
            reset_at: Utc::now() + reset_in,
            retry_after_seconds: retry_after_seconds.max(u64::from(is_rate_limited)),
        }
    }

    /// Drop windows that have already closed; returns how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let length = self.config.window;
        let before = self.windows.len();
        self.windows.retain(|_, window| !window.is_expired(now, length));
        before.saturating_sub(self.windows.len())
    }

    /// Number of tracked caller windows
    #[must_use]
    pub fn tracked(&self) -> usize {
        self.windows.len()
    }

    /// Spawn the periodic purge loop
    #[must_use]
    pub fn spawn_purge_task(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                let removed = self.purge_expired();
                if removed > 0 {
                    debug!(removed, "expired rate-limit windows purged");
                }
            }
        })
    }
}
