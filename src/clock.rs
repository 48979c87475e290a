//! 时钟抽象
//!
//! 速率限制、日期校验和 CSRF 过期都依赖当前时间。通过 [`Clock`] 注入时间源，
//! 测试中可以用 [`ManualClock`] 精确推进时间而无需真实等待。

use chrono::{DateTime, Local, NaiveDate, TimeDelta, Utc};
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// 时间源
pub trait Clock: Send + Sync {
    /// 当前 UTC 时间
    fn now(&self) -> DateTime<Utc>;

    /// 本地日历上的今天
    fn today(&self) -> NaiveDate {
        self.now().with_timezone(&Local).date_naive()
    }
}

/// 系统时钟
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// 手动推进的时钟
///
/// 克隆后共享同一时间点。
///
/// ```rust
/// use formguard::clock::{Clock, ManualClock};
/// use std::time::Duration;
///
/// let clock = ManualClock::new();
/// let start = clock.now();
/// clock.advance(Duration::from_secs(90));
/// assert_eq!((clock.now() - start).num_seconds(), 90);
/// ```
#[derive(Debug, Clone)]
pub struct ManualClock {
    current: Arc<RwLock<DateTime<Utc>>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    /// 以当前系统时间为起点创建
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    /// 以指定时间为起点创建
    pub fn starting_at(start: DateTime<Utc>) -> Self {
        Self {
            current: Arc::new(RwLock::new(start)),
        }
    }

    /// 向前推进
    pub fn advance(&self, by: Duration) {
        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        *current = add_saturating(*current, by);
    }

    /// 直接设置时间
    pub fn set(&self, to: DateTime<Utc>) {
        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        *current = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current.read().unwrap_or_else(|e| e.into_inner())
    }
}

/// `std::time::Duration` 转换为 chrono 时间差，超出范围时饱和
pub(crate) fn to_time_delta(duration: Duration) -> TimeDelta {
    TimeDelta::from_std(duration).unwrap_or_else(|_| TimeDelta::MAX)
}

/// 在时间点上加一段时长，溢出时饱和到最大可表示时间
pub(crate) fn add_saturating(at: DateTime<Utc>, duration: Duration) -> DateTime<Utc> {
    at.checked_add_signed(to_time_delta(duration))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
