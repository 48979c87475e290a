//! 集成测试：速率限制
//!
//! 覆盖默认策略、锁定到期、可插拔存储以及并发访问。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use formguard::Result;
use formguard::clock::ManualClock;
use formguard::security::rate_limit::{
    ActionKind, AttemptRecord, AttemptVerdict, InMemoryRateLimitStore, RateLimitPolicy,
    RateLimitStore, RateLimiter, evaluate_attempt,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn limiter() -> (RateLimiter, ManualClock) {
    let clock = ManualClock::new();
    let limiter = RateLimiter::new().with_clock(Arc::new(clock.clone()));
    (limiter, clock)
}

/// 5 次内允许，第 6 次锁定，锁定到期后计数从 1 开始
#[tokio::test]
async fn test_login_lockout_lifecycle() -> Result<()> {
    let (limiter, clock) = limiter();
    let key = "login_guest@example.com_localhost";

    for _ in 0..5 {
        assert!(limiter.is_allowed(key, ActionKind::Login).await?);
    }
    assert!(!limiter.is_allowed(key, ActionKind::Login).await?);

    let lockout = limiter
        .lockout_time(key, ActionKind::Login)
        .await?
        .expect("key should be locked");
    assert!(lockout > Duration::ZERO);
    assert!(lockout <= RateLimitPolicy::for_login().lockout);

    clock.advance(lockout);
    assert!(limiter.is_allowed(key, ActionKind::Login).await?);
    assert_eq!(
        limiter.remaining_attempts(key, ActionKind::Login).await?,
        4
    );
    Ok(())
}

/// 窗口过后计数重新开始，不会触发锁定
#[tokio::test]
async fn test_window_slides() -> Result<()> {
    let (limiter, clock) = limiter();
    let key = "booking_guest@example.com_localhost";

    for _ in 0..10 {
        assert!(limiter.is_allowed(key, ActionKind::Booking).await?);
    }
    clock.advance(Duration::from_secs(60 * 60));

    for _ in 0..10 {
        assert!(limiter.is_allowed(key, ActionKind::Booking).await?);
    }
    assert!(limiter.lockout_time(key, ActionKind::Booking).await?.is_none());
    Ok(())
}

/// 登录和预订使用各自的策略
#[tokio::test]
async fn test_policies_are_per_kind() -> Result<()> {
    let (limiter, _clock) = limiter();

    for _ in 0..6 {
        limiter.is_allowed("login_k", ActionKind::Login).await?;
    }
    for _ in 0..6 {
        assert!(limiter.is_allowed("booking_k", ActionKind::Booking).await?);
    }
    assert!(!limiter.is_allowed("login_k", ActionKind::Login).await?);
    assert_eq!(
        limiter
            .remaining_attempts("booking_k", ActionKind::Booking)
            .await?,
        4
    );
    Ok(())
}

/// 计数型存储：记录调用次数，迁移逻辑复用 evaluate_attempt
#[derive(Default)]
struct CountingStore {
    records: Mutex<HashMap<String, AttemptRecord>>,
    writes: AtomicUsize,
}

#[async_trait]
impl RateLimitStore for CountingStore {
    async fn check_and_record(
        &self,
        key: &str,
        policy: &RateLimitPolicy,
        now: DateTime<Utc>,
    ) -> Result<AttemptVerdict> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut records = self.records.lock().expect("lock");
        let (verdict, next) = evaluate_attempt(records.remove(key), policy, now);
        if let Some(record) = next {
            records.insert(key.to_string(), record);
        }
        Ok(verdict)
    }

    async fn get(&self, key: &str) -> Result<Option<AttemptRecord>> {
        Ok(self.records.lock().expect("lock").get(key).cloned())
    }

    async fn reset(&self, key: &str) -> Result<()> {
        self.records.lock().expect("lock").remove(key);
        Ok(())
    }

    async fn cleanup(&self, _now: DateTime<Utc>, _window: Duration) -> Result<usize> {
        Ok(0)
    }
}

#[tokio::test]
async fn test_custom_store_is_used() -> Result<()> {
    let store = Arc::new(CountingStore::default());
    let limiter = RateLimiter::new()
        .with_policies(
            RateLimitPolicy::for_login().with_max_attempts(2),
            RateLimitPolicy::for_booking(),
        )
        .with_store(store.clone());

    assert!(limiter.is_allowed("k", ActionKind::Login).await?);
    assert!(limiter.is_allowed("k", ActionKind::Login).await?);
    assert_eq!(
        limiter.check("k", ActionKind::Login).await?,
        AttemptVerdict::LockoutStarted
    );
    assert_eq!(
        limiter.check("k", ActionKind::Login).await?,
        AttemptVerdict::StillLocked
    );
    assert_eq!(store.writes.load(Ordering::SeqCst), 4);
    Ok(())
}

/// 共享存储的两个限流器看到同一份历史
#[tokio::test]
async fn test_shared_store_between_limiters() -> Result<()> {
    let store: Arc<dyn RateLimitStore> = Arc::new(InMemoryRateLimitStore::new());
    let a = RateLimiter::new().with_store(Arc::clone(&store));
    let b = RateLimiter::new().with_store(Arc::clone(&store));

    for _ in 0..3 {
        a.is_allowed("shared", ActionKind::Login).await?;
    }
    assert_eq!(b.remaining_attempts("shared", ActionKind::Login).await?, 2);
    Ok(())
}

/// 多任务并发提交时计数准确
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_attempts_are_counted_once() -> Result<()> {
    let limiter = Arc::new(RateLimiter::new());
    let mut handles = Vec::new();

    for _ in 0..20 {
        let limiter = Arc::clone(&limiter);
        handles.push(tokio::spawn(async move {
            limiter.is_allowed("burst", ActionKind::Booking).await
        }));
    }

    let mut allowed = 0;
    for handle in handles {
        if handle.await.expect("task panicked")? {
            allowed += 1;
        }
    }
    assert_eq!(allowed, 10);
    Ok(())
}

/// 清理只删除既未锁定也不在窗口内的记录
#[tokio::test]
async fn test_cleanup() -> Result<()> {
    let (limiter, clock) = limiter();

    limiter.is_allowed("idle", ActionKind::Booking).await?;
    assert_eq!(limiter.cleanup().await?, 0);

    clock.advance(Duration::from_secs(2 * 60 * 60));
    assert_eq!(limiter.cleanup().await?, 1);
    Ok(())
}
