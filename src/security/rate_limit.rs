//! 速率限制模块
//!
//! 按动作类型（登录、预订）分别配置的滑动窗口计数器，超限后进入锁定期。
//!
//! ## 状态迁移
//!
//! 每个 key 对应一条 [`AttemptRecord`]，每次尝试按以下顺序处理：
//!
//! 1. 仍在锁定期内：拒绝
//! 2. 锁定期已过：删除旧记录，把本次当作全新的第一次尝试
//! 3. 仍在窗口内：次数已满则设置锁定并拒绝，否则计数加一
//! 4. 无记录或窗口已过：重新开始计数
//!
//! 窗口和锁定是两个独立的时钟。锁定不会重置窗口起点，锁定到期后记录整体重置。
//!
//! ## 可插拔存储
//!
//! [`RateLimitStore`] 抽象了记录的保存位置。默认的 [`InMemoryRateLimitStore`]
//! 只在进程内有效，重启即丢失；需要跨进程共享时实现该 trait 即可，
//! 迁移逻辑统一由 [`evaluate_attempt`] 提供。
//!
//! ## 示例
//!
//! ```rust
//! use formguard::security::rate_limit::{ActionKind, RateLimiter};
//!
//! # #[tokio::main]
//! # async fn main() -> formguard::Result<()> {
//! let limiter = RateLimiter::new();
//! let key = "login_guest@example.com_lodge.example";
//!
//! for _ in 0..5 {
//!     assert!(limiter.is_allowed(key, ActionKind::Login).await?);
//! }
//! assert!(!limiter.is_allowed(key, ActionKind::Login).await?);
//! assert!(limiter.lockout_time(key, ActionKind::Login).await?.is_some());
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::clock::{Clock, SystemClock, add_saturating, to_time_delta};
use crate::error::{ConfigError, Error, Result, StorageError};

/// 受速率限制的动作类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    /// 登录
    Login,
    /// 预订
    Booking,
}

impl ActionKind {
    /// 小写名称，用于组成 key 和日志
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Login => "login",
            ActionKind::Booking => "booking",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 速率限制策略
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitPolicy {
    /// 窗口内允许的最大尝试次数
    pub max_attempts: u32,
    /// 窗口长度
    pub window: Duration,
    /// 超限后的锁定时长
    pub lockout: Duration,
}

impl RateLimitPolicy {
    /// 创建策略
    pub fn new(max_attempts: u32, window: Duration, lockout: Duration) -> Self {
        Self {
            max_attempts,
            window,
            lockout,
        }
    }

    /// 登录：15 分钟内最多 5 次，超限锁定 30 分钟
    pub fn for_login() -> Self {
        Self::new(5, Duration::from_secs(15 * 60), Duration::from_secs(30 * 60))
    }

    /// 预订：1 小时内最多 10 次，超限锁定 2 小时
    pub fn for_booking() -> Self {
        Self::new(10, Duration::from_secs(60 * 60), Duration::from_secs(2 * 60 * 60))
    }

    /// 设置最大尝试次数
    pub fn with_max_attempts(mut self, max: u32) -> Self {
        self.max_attempts = max;
        self
    }

    /// 设置窗口长度
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// 设置锁定时长
    pub fn with_lockout(mut self, lockout: Duration) -> Self {
        self.lockout = lockout;
        self
    }

    /// 验证策略有效性
    pub fn validate(&self, name: &str) -> Result<()> {
        let invalid = |message: &str| {
            Error::Config(ConfigError::InvalidValue {
                key: name.to_string(),
                message: message.to_string(),
            })
        };
        if self.max_attempts == 0 {
            return Err(invalid("max_attempts must be greater than 0"));
        }
        if self.window.is_zero() {
            return Err(invalid("window must be greater than 0"));
        }
        if self.lockout.is_zero() {
            return Err(invalid("lockout must be greater than 0"));
        }
        Ok(())
    }
}

/// 单个 key 的尝试记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// 当前窗口内的尝试次数
    pub count: u32,
    /// 窗口开始时间
    pub window_start: DateTime<Utc>,
    /// 锁定结束时间
    pub locked_until: Option<DateTime<Utc>>,
}

impl AttemptRecord {
    /// 以 `now` 为窗口起点的第一次尝试
    pub fn first_attempt(now: DateTime<Utc>) -> Self {
        Self {
            count: 1,
            window_start: now,
            locked_until: None,
        }
    }

    /// 在 `now` 时是否处于锁定期
    pub fn is_locked_at(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.is_some_and(|until| now < until)
    }

    /// 在 `now` 时窗口是否仍然有效
    pub fn window_active_at(&self, now: DateTime<Utc>, window: Duration) -> bool {
        now - self.window_start < to_time_delta(window)
    }

    /// 锁定剩余时间
    pub fn lockout_remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.locked_until
            .filter(|until| now < *until)
            .and_then(|until| (until - now).to_std().ok())
    }

    /// 在 `now` 时的剩余尝试次数
    pub fn remaining_at(&self, now: DateTime<Utc>, policy: &RateLimitPolicy) -> u32 {
        if self.is_locked_at(now) {
            0
        } else if !self.window_active_at(now, policy.window) {
            policy.max_attempts
        } else {
            policy.max_attempts.saturating_sub(self.count)
        }
    }

    /// 锁定已过期且窗口也已结束，可以安全删除
    fn is_stale_at(&self, now: DateTime<Utc>, window: Duration) -> bool {
        !self.is_locked_at(now) && !self.window_active_at(now, window)
    }
}

/// 一次尝试的判定结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptVerdict {
    /// 允许
    Allowed,
    /// 本次尝试触发了锁定
    LockoutStarted,
    /// 已处于锁定期
    StillLocked,
}

impl AttemptVerdict {
    /// 是否允许
    pub fn is_allowed(&self) -> bool {
        matches!(self, AttemptVerdict::Allowed)
    }
}

/// 纯迁移函数：给定当前记录、策略和时间，返回判定与新记录
///
/// 返回的记录为 `None` 表示应删除该 key。
pub fn evaluate_attempt(
    record: Option<AttemptRecord>,
    policy: &RateLimitPolicy,
    now: DateTime<Utc>,
) -> (AttemptVerdict, Option<AttemptRecord>) {
    match record {
        Some(record) if record.is_locked_at(now) => (AttemptVerdict::StillLocked, Some(record)),
        // 锁定已过期：旧记录作废，本次视为全新尝试
        Some(record) if record.locked_until.is_some() => (
            AttemptVerdict::Allowed,
            Some(AttemptRecord::first_attempt(now)),
        ),
        Some(mut record) if record.window_active_at(now, policy.window) => {
            if record.count >= policy.max_attempts {
                record.locked_until = Some(add_saturating(now, policy.lockout));
                (AttemptVerdict::LockoutStarted, Some(record))
            } else {
                record.count += 1;
                (AttemptVerdict::Allowed, Some(record))
            }
        }
        _ => (
            AttemptVerdict::Allowed,
            Some(AttemptRecord::first_attempt(now)),
        ),
    }
}

/// 速率限制存储 trait
///
/// 每个方法对单个 key 必须是原子的。
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// 按策略处理一次尝试并保存结果
    async fn check_and_record(
        &self,
        key: &str,
        policy: &RateLimitPolicy,
        now: DateTime<Utc>,
    ) -> Result<AttemptVerdict>;

    /// 读取记录（不记录尝试）
    async fn get(&self, key: &str) -> Result<Option<AttemptRecord>>;

    /// 删除记录
    async fn reset(&self, key: &str) -> Result<()>;

    /// 删除所有过期记录，返回删除数量
    ///
    /// `window` 取所有策略中最长的窗口。
    async fn cleanup(&self, now: DateTime<Utc>, window: Duration) -> Result<usize>;
}

/// 内存存储
///
/// 生命周期等于进程，不在进程间共享。
#[derive(Debug, Default)]
pub struct InMemoryRateLimitStore {
    records: RwLock<HashMap<String, AttemptRecord>>,
}

impl InMemoryRateLimitStore {
    /// 创建新的内存存储
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前记录数
    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    /// 是否没有任何记录
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned() -> Error {
    Error::Storage(StorageError::LockPoisoned("rate limit records".to_string()))
}

#[async_trait]
impl RateLimitStore for InMemoryRateLimitStore {
    async fn check_and_record(
        &self,
        key: &str,
        policy: &RateLimitPolicy,
        now: DateTime<Utc>,
    ) -> Result<AttemptVerdict> {
        let mut records = self.records.write().map_err(|_| poisoned())?;

        let (verdict, next) = evaluate_attempt(records.remove(key), policy, now);
        if let Some(record) = next {
            records.insert(key.to_string(), record);
        }
        Ok(verdict)
    }

    async fn get(&self, key: &str) -> Result<Option<AttemptRecord>> {
        let records = self.records.read().map_err(|_| poisoned())?;
        Ok(records.get(key).cloned())
    }

    async fn reset(&self, key: &str) -> Result<()> {
        let mut records = self.records.write().map_err(|_| poisoned())?;
        records.remove(key);
        Ok(())
    }

    async fn cleanup(&self, now: DateTime<Utc>, window: Duration) -> Result<usize> {
        let mut records = self.records.write().map_err(|_| poisoned())?;
        let before = records.len();
        records.retain(|_, record| !record.is_stale_at(now, window));
        Ok(before - records.len())
    }
}

/// 速率限制器
///
/// 显式构造的服务对象，测试中每个用例可以拥有独立实例。
pub struct RateLimiter {
    login: RateLimitPolicy,
    booking: RateLimitPolicy,
    store: Arc<dyn RateLimitStore>,
    clock: Arc<dyn Clock>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    /// 使用默认策略、内存存储和系统时钟
    pub fn new() -> Self {
        Self {
            login: RateLimitPolicy::for_login(),
            booking: RateLimitPolicy::for_booking(),
            store: Arc::new(InMemoryRateLimitStore::new()),
            clock: Arc::new(SystemClock),
        }
    }

    /// 指定两类动作的策略
    pub fn with_policies(mut self, login: RateLimitPolicy, booking: RateLimitPolicy) -> Self {
        self.login = login;
        self.booking = booking;
        self
    }

    /// 指定存储
    pub fn with_store(mut self, store: Arc<dyn RateLimitStore>) -> Self {
        self.store = store;
        self
    }

    /// 指定时间源
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// 获取某类动作的策略
    pub fn policy(&self, kind: ActionKind) -> &RateLimitPolicy {
        match kind {
            ActionKind::Login => &self.login,
            ActionKind::Booking => &self.booking,
        }
    }

    /// 处理一次尝试并返回详细判定
    pub async fn check(&self, key: &str, kind: ActionKind) -> Result<AttemptVerdict> {
        let now = self.clock.now();
        let verdict = self
            .store
            .check_and_record(key, self.policy(kind), now)
            .await?;
        if verdict == AttemptVerdict::LockoutStarted {
            tracing::warn!(key, kind = %kind, "rate limit exceeded, lockout started");
        }
        Ok(verdict)
    }

    /// 处理一次尝试，返回是否允许
    pub async fn is_allowed(&self, key: &str, kind: ActionKind) -> Result<bool> {
        Ok(self.check(key, kind).await?.is_allowed())
    }

    /// 剩余尝试次数
    pub async fn remaining_attempts(&self, key: &str, kind: ActionKind) -> Result<u32> {
        let policy = self.policy(kind);
        Ok(match self.store.get(key).await? {
            Some(record) => record.remaining_at(self.clock.now(), policy),
            None => policy.max_attempts,
        })
    }

    /// 距离解锁的剩余时间，未锁定时为 `None`
    pub async fn lockout_time(&self, key: &str, _kind: ActionKind) -> Result<Option<Duration>> {
        Ok(self
            .store
            .get(key)
            .await?
            .and_then(|record| record.lockout_remaining(self.clock.now())))
    }

    /// 清除某个 key 的历史（登录成功后调用）
    pub async fn reset(&self, key: &str) -> Result<()> {
        self.store.reset(key).await
    }

    /// 清理过期记录
    pub async fn cleanup(&self) -> Result<usize> {
        let window = self.login.window.max(self.booking.window);
        self.store.cleanup(self.clock.now(), window).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn limiter_with_clock() -> (RateLimiter, ManualClock) {
        let clock = ManualClock::new();
        let limiter = RateLimiter::new().with_clock(Arc::new(clock.clone()));
        (limiter, clock)
    }

    #[test]
    fn test_presets() {
        let login = RateLimitPolicy::for_login();
        assert_eq!(login.max_attempts, 5);
        assert_eq!(login.window, Duration::from_secs(900));
        assert_eq!(login.lockout, Duration::from_secs(1800));

        let booking = RateLimitPolicy::for_booking();
        assert_eq!(booking.max_attempts, 10);
        assert_eq!(booking.window, Duration::from_secs(3600));
        assert_eq!(booking.lockout, Duration::from_secs(7200));
    }

    #[test]
    fn test_policy_validate() {
        assert!(RateLimitPolicy::for_login().validate("login").is_ok());
        assert!(
            RateLimitPolicy::for_login()
                .with_max_attempts(0)
                .validate("login")
                .is_err()
        );
        assert!(
            RateLimitPolicy::for_booking()
                .with_window(Duration::ZERO)
                .validate("booking")
                .is_err()
        );
        assert!(
            RateLimitPolicy::for_booking()
                .with_lockout(Duration::ZERO)
                .validate("booking")
                .is_err()
        );
    }

    #[test]
    fn test_evaluate_attempt_transitions() {
        let policy = RateLimitPolicy::new(2, Duration::from_secs(60), Duration::from_secs(120));
        let t0 = Utc::now();

        let (v, r) = evaluate_attempt(None, &policy, t0);
        assert_eq!(v, AttemptVerdict::Allowed);
        assert_eq!(r.as_ref().map(|r| r.count), Some(1));

        let (v, r) = evaluate_attempt(r, &policy, t0);
        assert_eq!(v, AttemptVerdict::Allowed);
        assert_eq!(r.as_ref().map(|r| r.count), Some(2));

        let (v, r) = evaluate_attempt(r, &policy, t0);
        assert_eq!(v, AttemptVerdict::LockoutStarted);
        let locked = r.clone().unwrap();
        assert_eq!(locked.count, 2);
        assert_eq!(locked.window_start, t0);
        assert!(locked.locked_until.is_some());

        let (v, r) = evaluate_attempt(r, &policy, t0 + to_time_delta(Duration::from_secs(119)));
        assert_eq!(v, AttemptVerdict::StillLocked);
        // 锁定期内的尝试不会延长锁定
        assert_eq!(r.as_ref().unwrap().locked_until, locked.locked_until);

        let after = t0 + to_time_delta(Duration::from_secs(120));
        let (v, r) = evaluate_attempt(r, &policy, after);
        assert_eq!(v, AttemptVerdict::Allowed);
        assert_eq!(r, Some(AttemptRecord::first_attempt(after)));
    }

    #[test]
    fn test_window_expiry_resets_count() {
        let policy = RateLimitPolicy::new(2, Duration::from_secs(60), Duration::from_secs(120));
        let t0 = Utc::now();
        let record = AttemptRecord {
            count: 2,
            window_start: t0,
            locked_until: None,
        };

        let later = t0 + to_time_delta(Duration::from_secs(60));
        let (v, r) = evaluate_attempt(Some(record), &policy, later);
        assert_eq!(v, AttemptVerdict::Allowed);
        assert_eq!(r, Some(AttemptRecord::first_attempt(later)));
    }

    #[tokio::test]
    async fn test_login_limit_and_lockout() {
        let (limiter, clock) = limiter_with_clock();
        let key = "login:guest";

        for _ in 0..5 {
            assert!(limiter.is_allowed(key, ActionKind::Login).await.unwrap());
        }
        assert_eq!(
            limiter
                .remaining_attempts(key, ActionKind::Login)
                .await
                .unwrap(),
            0
        );

        assert!(!limiter.is_allowed(key, ActionKind::Login).await.unwrap());
        let lockout = limiter
            .lockout_time(key, ActionKind::Login)
            .await
            .unwrap()
            .unwrap();
        assert!(lockout > Duration::ZERO);
        assert!(lockout <= Duration::from_secs(1800));

        clock.advance(Duration::from_secs(1800));
        assert!(
            limiter
                .lockout_time(key, ActionKind::Login)
                .await
                .unwrap()
                .is_none()
        );
        assert!(limiter.is_allowed(key, ActionKind::Login).await.unwrap());
        assert_eq!(
            limiter
                .remaining_attempts(key, ActionKind::Login)
                .await
                .unwrap(),
            4
        );
    }

    #[tokio::test]
    async fn test_remaining_attempts() {
        let (limiter, clock) = limiter_with_clock();
        let key = "booking:guest";

        assert_eq!(
            limiter
                .remaining_attempts(key, ActionKind::Booking)
                .await
                .unwrap(),
            10
        );
        limiter.is_allowed(key, ActionKind::Booking).await.unwrap();
        limiter.is_allowed(key, ActionKind::Booking).await.unwrap();
        assert_eq!(
            limiter
                .remaining_attempts(key, ActionKind::Booking)
                .await
                .unwrap(),
            8
        );

        clock.advance(Duration::from_secs(3600));
        assert_eq!(
            limiter
                .remaining_attempts(key, ActionKind::Booking)
                .await
                .unwrap(),
            10
        );
    }

    #[tokio::test]
    async fn test_reset_clears_history() {
        let (limiter, _clock) = limiter_with_clock();
        let key = "login:reset";

        for _ in 0..6 {
            limiter.is_allowed(key, ActionKind::Login).await.unwrap();
        }
        assert!(!limiter.is_allowed(key, ActionKind::Login).await.unwrap());

        limiter.reset(key).await.unwrap();
        assert!(limiter.is_allowed(key, ActionKind::Login).await.unwrap());
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let (limiter, _clock) = limiter_with_clock();

        for _ in 0..6 {
            limiter.is_allowed("a", ActionKind::Login).await.unwrap();
        }
        assert!(!limiter.is_allowed("a", ActionKind::Login).await.unwrap());
        assert!(limiter.is_allowed("b", ActionKind::Login).await.unwrap());
    }

    #[tokio::test]
    async fn test_cleanup_keeps_locked_and_active() {
        let clock = ManualClock::new();
        let store = Arc::new(InMemoryRateLimitStore::new());
        let limiter = RateLimiter::new()
            .with_store(store.clone())
            .with_clock(Arc::new(clock.clone()));

        for _ in 0..6 {
            limiter.is_allowed("locked", ActionKind::Login).await.unwrap();
        }
        limiter.is_allowed("idle", ActionKind::Login).await.unwrap();
        assert_eq!(store.len(), 2);

        // 超过最长窗口，但仍在登录锁定期内
        clock.advance(Duration::from_secs(3600));
        assert_eq!(limiter.cleanup().await.unwrap(), 1);
        assert!(store.get("locked").await.unwrap().is_some());
        assert!(store.get("idle").await.unwrap().is_none());

        clock.advance(Duration::from_secs(3600));
        assert_eq!(limiter.cleanup().await.unwrap(), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn test_action_kind_display() {
        assert_eq!(ActionKind::Login.to_string(), "login");
        assert_eq!(ActionKind::Booking.as_str(), "booking");
    }
}
