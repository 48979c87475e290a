//! 集成测试：审计日志
//!
//! 测试守卫决定被完整记录，以及事件的查询和过滤。

use chrono::TimeDelta;
use formguard::audit::{
    AuditLogger, EventSeverity, EventType, GuardEvent, InMemoryAuditLogger, NoOpAuditLogger,
};
use formguard::clock::{Clock, ManualClock};
use formguard::form::{FormData, LoginForm};
use formguard::guard::{AbuseGuard, GuardConfig};
use formguard::security::rate_limit::{ActionKind, RateLimitPolicy};
use std::sync::Arc;
use std::time::Duration;

/// 每个决定都留下一条事件，锁定开始额外记录一条
#[tokio::test]
async fn test_every_decision_is_audited() {
    let clock = ManualClock::new();
    let audit = Arc::new(InMemoryAuditLogger::new());
    let config = GuardConfig::default()
        .with_login_policy(RateLimitPolicy::for_login().with_max_attempts(2));
    let guard = AbuseGuard::new(config)
        .unwrap()
        .with_clock(Arc::new(clock.clone()))
        .with_audit_logger(audit.clone());

    let good = FormData::Login(LoginForm::new("staff@example.com", "pw"));
    let bad = FormData::Login(LoginForm::new("staff", ""));

    guard.check_submission("k", "", &good).await.unwrap(); // allowed
    guard.check_submission("k", "", &bad).await.unwrap(); // validation failed
    guard.check_submission("k", "", &good).await.unwrap(); // lockout started
    guard.check_submission("k", "bot", &good).await.unwrap(); // bot

    let stats = audit.get_stats();
    assert_eq!(stats.total_events, 5);
    assert_eq!(stats.rejection_count, 3);
    assert_eq!(stats.events_by_type.get(&EventType::LockoutStarted), Some(&1));

    let failed = audit.get_events_by_type(EventType::ValidationFailed);
    assert_eq!(
        failed[0].details.get("fields").map(String::as_str),
        Some("email,password")
    );

    // 事件时间来自注入的时钟
    assert!(audit.get_events().iter().all(|e| e.timestamp == clock.now()));
}

/// 按时间范围查询
#[test]
fn test_events_in_range_with_manual_clock() {
    let clock = ManualClock::new();
    let logger = InMemoryAuditLogger::new();

    logger.log(GuardEvent::rate_limit_reset("early").with_timestamp(clock.now()));
    clock.advance(Duration::from_secs(3 * 60 * 60));
    logger.log(GuardEvent::rate_limit_reset("late").with_timestamp(clock.now()));

    let window = logger.get_events_in_range(clock.now() - TimeDelta::hours(1), clock.now());
    assert_eq!(window.len(), 1);
    assert_eq!(window[0].key, "late");
}

/// 共享的日志记录器可以作为 trait 对象使用
#[test]
fn test_logger_as_trait_object() {
    let memory = InMemoryAuditLogger::new();
    let loggers: Vec<Arc<dyn AuditLogger>> =
        vec![Arc::new(memory.clone()), Arc::new(NoOpAuditLogger::new())];

    for logger in &loggers {
        logger.log(GuardEvent::bot_detected("k", ActionKind::Booking));
    }

    assert_eq!(memory.event_count(), 1);
    assert_eq!(
        memory.get_events_by_severity(EventSeverity::Warning).len(),
        1
    );
}
