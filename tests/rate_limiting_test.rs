// ABOUTME: Integration tests for per-caller fixed-window rate limiting
// ABOUTME: Concurrent callers sharing a window and the background purge task
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 sqlgate contributors
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

use std::sync::Arc;
use std::time::Duration;

use sqlgate::config::RateLimitConfig;
use sqlgate::rate_limiting::RateLimiter;

fn limiter(max_requests: u32, window: Duration) -> Arc<RateLimiter> {
    Arc::new(RateLimiter::new(RateLimitConfig {
        max_requests,
        window,
    }))
}

#[tokio::test]
async fn test_concurrent_requests_never_exceed_limit() {
    let limiter = limiter(25, Duration::from_secs(60));

    let handles: Vec<_> = (0..100)
        .map(|_| {
            let limiter = Arc::clone(&limiter);
            tokio::spawn(async move { limiter.check("shop/prod:alice").is_rate_limited })
        })
        .collect();

    let mut admitted = 0;
    for handle in handles {
        if !handle.await.unwrap() {
            admitted += 1;
        }
    }
    assert_eq!(admitted, 25);
}

#[tokio::test]
async fn test_rejection_reports_reset_metadata() {
    let limiter = limiter(1, Duration::from_secs(30));
    let admitted = limiter.check("alice");
    assert!(!admitted.is_rate_limited);
    assert_eq!(admitted.limit, 1);
    assert_eq!(admitted.retry_after_seconds, 0);

    let rejected = limiter.check("alice");
    assert!(rejected.is_rate_limited);
    assert_eq!(rejected.remaining, 0);
    assert!((1..=30).contains(&rejected.retry_after_seconds));
    assert!(rejected.reset_at > chrono::Utc::now());
}

#[tokio::test]
async fn test_purge_task_drops_closed_windows() {
    let limiter = limiter(5, Duration::from_millis(20));
    limiter.check("alice");
    limiter.check("bob");
    assert_eq!(limiter.tracked(), 2);

    let task = Arc::clone(&limiter).spawn_purge_task(Duration::from_millis(10));
    for _ in 0..50 {
        if limiter.tracked() == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    task.abort();

    assert_eq!(limiter.tracked(), 0);
}
