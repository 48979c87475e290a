//! 审计日志模块
//!
//! 记录 [`AbuseGuard`](crate::guard::AbuseGuard) 做出的每一个决定：
//!
//! - **事件**: [`GuardEvent`]，包含类型、严重程度、限流 key 和详情
//! - **审计日志 Trait**: [`AuditLogger`]
//! - **实现**: [`InMemoryAuditLogger`]（测试与开发）、[`TracingAuditLogger`]（转发到 `tracing`）、
//!   [`NoOpAuditLogger`]（禁用）
//!
//! ## 使用示例
//!
//! ```rust
//! use formguard::audit::{AuditLogger, EventSeverity, GuardEvent, InMemoryAuditLogger};
//! use formguard::security::rate_limit::ActionKind;
//!
//! let logger = InMemoryAuditLogger::new();
//!
//! logger.log(GuardEvent::bot_detected("login_a@b.co_lodge", ActionKind::Login));
//! logger.log(GuardEvent::submission_allowed("login_a@b.co_lodge", ActionKind::Login, 4));
//!
//! assert_eq!(logger.event_count(), 2);
//! assert_eq!(logger.get_events_by_severity(EventSeverity::Warning).len(), 1);
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use crate::security::rate_limit::ActionKind;

/// 事件严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum EventSeverity {
    /// 调试信息
    Debug,
    /// 一般信息
    #[default]
    Info,
    /// 警告
    Warning,
    /// 错误
    Error,
}

impl std::fmt::Display for EventSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventSeverity::Debug => write!(f, "DEBUG"),
            EventSeverity::Info => write!(f, "INFO"),
            EventSeverity::Warning => write!(f, "WARNING"),
            EventSeverity::Error => write!(f, "ERROR"),
        }
    }
}

/// 事件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// 蜜罐被填写
    BotDetected,
    /// 因速率限制被拒绝
    RateLimitTriggered,
    /// 本次尝试触发了锁定
    LockoutStarted,
    /// 表单校验失败
    ValidationFailed,
    /// 放行
    SubmissionAllowed,
    /// 登录成功后清除限流历史
    RateLimitReset,
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EventType::BotDetected => "bot_detected",
            EventType::RateLimitTriggered => "rate_limit_triggered",
            EventType::LockoutStarted => "lockout_started",
            EventType::ValidationFailed => "validation_failed",
            EventType::SubmissionAllowed => "submission_allowed",
            EventType::RateLimitReset => "rate_limit_reset",
        };
        f.write_str(name)
    }
}

/// 守卫事件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardEvent {
    /// 事件 ID
    pub id: String,
    /// 事件类型
    pub event_type: EventType,
    /// 严重程度
    pub severity: EventSeverity,
    /// 限流 key
    pub key: String,
    /// 表单类别
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<ActionKind>,
    /// 事件描述
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// 额外详情
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, String>,
    /// 事件时间
    pub timestamp: DateTime<Utc>,
}

impl GuardEvent {
    /// 创建新的事件
    pub fn new(event_type: EventType, severity: EventSeverity, key: impl Into<String>) -> Self {
        Self {
            id: generate_event_id(),
            event_type,
            severity,
            key: key.into(),
            action: None,
            message: None,
            details: BTreeMap::new(),
            timestamp: Utc::now(),
        }
    }

    // ========================================================================
    // 便捷构造方法
    // ========================================================================

    /// 蜜罐被填写
    pub fn bot_detected(key: impl Into<String>, action: ActionKind) -> Self {
        Self::new(EventType::BotDetected, EventSeverity::Warning, key)
            .with_action(action)
            .with_message("Honeypot field was filled")
    }

    /// 被速率限制拒绝
    pub fn rate_limited(key: impl Into<String>, action: ActionKind, retry_after: Duration) -> Self {
        Self::new(EventType::RateLimitTriggered, EventSeverity::Warning, key)
            .with_action(action)
            .with_detail("retry_after_secs", retry_after.as_secs().to_string())
    }

    /// 开始锁定
    pub fn lockout_started(key: impl Into<String>, action: ActionKind, lockout: Duration) -> Self {
        Self::new(EventType::LockoutStarted, EventSeverity::Warning, key)
            .with_action(action)
            .with_message("Too many attempts, key locked")
            .with_detail("lockout_secs", lockout.as_secs().to_string())
    }

    /// 校验失败，详情中记录失败的字段名
    pub fn validation_failed<'a>(
        key: impl Into<String>,
        action: ActionKind,
        fields: impl IntoIterator<Item = &'a String>,
    ) -> Self {
        let fields: Vec<&str> = fields.into_iter().map(String::as_str).collect();
        Self::new(EventType::ValidationFailed, EventSeverity::Info, key)
            .with_action(action)
            .with_detail("fields", fields.join(","))
    }

    /// 放行
    pub fn submission_allowed(key: impl Into<String>, action: ActionKind, remaining: u32) -> Self {
        Self::new(EventType::SubmissionAllowed, EventSeverity::Debug, key)
            .with_action(action)
            .with_detail("remaining_attempts", remaining.to_string())
    }

    /// 清除限流历史
    pub fn rate_limit_reset(key: impl Into<String>) -> Self {
        Self::new(EventType::RateLimitReset, EventSeverity::Info, key)
            .with_message("Rate limit history cleared")
    }

    // ========================================================================
    // Builder 方法
    // ========================================================================

    /// 设置表单类别
    pub fn with_action(mut self, action: ActionKind) -> Self {
        self.action = Some(action);
        self
    }

    /// 设置消息
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// 添加详情
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    /// 设置严重程度
    pub fn with_severity(mut self, severity: EventSeverity) -> Self {
        self.severity = severity;
        self
    }

    /// 设置事件时间
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// 是否为拒绝类事件
    pub fn is_rejection(&self) -> bool {
        matches!(
            self.event_type,
            EventType::BotDetected | EventType::RateLimitTriggered | EventType::ValidationFailed
        )
    }
}

fn generate_event_id() -> String {
    use crate::random::generate_random_hex;
    format!(
        "evt_{}",
        generate_random_hex(16).unwrap_or_else(|_| "unknown".to_string())
    )
}

// ============================================================================
// AuditLogger Trait
// ============================================================================

/// 审计日志记录器 trait
pub trait AuditLogger: Send + Sync {
    /// 记录事件
    fn log(&self, event: GuardEvent);

    /// 批量记录事件
    fn log_batch(&self, events: Vec<GuardEvent>) {
        for event in events {
            self.log(event);
        }
    }
}

// ============================================================================
// InMemoryAuditLogger
// ============================================================================

/// 内存审计日志记录器
///
/// 克隆出的实例共享同一份事件列表。
#[derive(Debug, Default, Clone)]
pub struct InMemoryAuditLogger {
    events: Arc<RwLock<Vec<GuardEvent>>>,
    max_events: Option<usize>,
}

impl InMemoryAuditLogger {
    /// 创建新的内存日志记录器
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建带有最大事件数限制的日志记录器，超出时丢弃最旧的事件
    pub fn with_max_events(max: usize) -> Self {
        Self {
            events: Arc::default(),
            max_events: Some(max),
        }
    }

    // 审计日志不应因为某个写入方 panic 而整体失效
    fn read(&self) -> RwLockReadGuard<'_, Vec<GuardEvent>> {
        self.events.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<GuardEvent>> {
        self.events.write().unwrap_or_else(|e| e.into_inner())
    }

    fn filtered(&self, predicate: impl Fn(&GuardEvent) -> bool) -> Vec<GuardEvent> {
        self.read().iter().filter(|e| predicate(e)).cloned().collect()
    }

    /// 获取所有事件
    pub fn get_events(&self) -> Vec<GuardEvent> {
        self.read().clone()
    }

    /// 获取事件数量
    pub fn event_count(&self) -> usize {
        self.read().len()
    }

    /// 按限流 key 获取事件
    pub fn get_events_by_key(&self, key: &str) -> Vec<GuardEvent> {
        self.filtered(|e| e.key == key)
    }

    /// 按事件类型获取事件
    pub fn get_events_by_type(&self, event_type: EventType) -> Vec<GuardEvent> {
        self.filtered(|e| e.event_type == event_type)
    }

    /// 按严重程度获取事件
    pub fn get_events_by_severity(&self, severity: EventSeverity) -> Vec<GuardEvent> {
        self.filtered(|e| e.severity == severity)
    }

    /// 按表单类别获取事件
    pub fn get_events_by_action(&self, action: ActionKind) -> Vec<GuardEvent> {
        self.filtered(|e| e.action == Some(action))
    }

    /// 获取时间范围内的事件
    pub fn get_events_in_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<GuardEvent> {
        self.filtered(|e| e.timestamp >= start && e.timestamp <= end)
    }

    /// 获取最近 N 个事件，最新的在前
    pub fn get_recent_events(&self, count: usize) -> Vec<GuardEvent> {
        self.read().iter().rev().take(count).cloned().collect()
    }

    /// 清空所有事件
    pub fn clear(&self) {
        self.write().clear();
    }

    /// 获取统计信息
    pub fn get_stats(&self) -> AuditStats {
        let events = self.read();
        let mut stats = AuditStats {
            total_events: events.len(),
            ..Default::default()
        };

        for event in events.iter() {
            match event.severity {
                EventSeverity::Debug => stats.debug_count += 1,
                EventSeverity::Info => stats.info_count += 1,
                EventSeverity::Warning => stats.warning_count += 1,
                EventSeverity::Error => stats.error_count += 1,
            }
            if event.is_rejection() {
                stats.rejection_count += 1;
            }
            *stats.events_by_type.entry(event.event_type).or_insert(0) += 1;
        }

        stats
    }
}

impl AuditLogger for InMemoryAuditLogger {
    fn log(&self, event: GuardEvent) {
        let mut events = self.write();

        if let Some(max) = self.max_events {
            if max == 0 {
                return;
            }
            while events.len() >= max {
                events.remove(0);
            }
        }

        events.push(event);
    }
}

/// 审计统计信息
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AuditStats {
    /// 总事件数
    pub total_events: usize,
    /// 拒绝类事件数
    pub rejection_count: usize,
    /// Debug 级别事件数
    pub debug_count: usize,
    /// Info 级别事件数
    pub info_count: usize,
    /// Warning 级别事件数
    pub warning_count: usize,
    /// Error 级别事件数
    pub error_count: usize,
    /// 按类型统计
    pub events_by_type: HashMap<EventType, usize>,
}

// ============================================================================
// TracingAuditLogger
// ============================================================================

/// 把事件转发为 `tracing` 事件，级别与严重程度对应
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditLogger;

impl TracingAuditLogger {
    /// 创建新的 tracing 日志记录器
    pub fn new() -> Self {
        Self
    }
}

impl AuditLogger for TracingAuditLogger {
    fn log(&self, event: GuardEvent) {
        let action = event.action.map(|a| a.as_str()).unwrap_or("-");
        let details = format!("{:?}", event.details);
        let message = event.message.as_deref().unwrap_or("");

        match event.severity {
            EventSeverity::Debug => tracing::debug!(
                target: "formguard::audit",
                event_id = %event.id, event_type = %event.event_type, key = %event.key, action, details = %details, "{}", message
            ),
            EventSeverity::Info => tracing::info!(
                target: "formguard::audit",
                event_id = %event.id, event_type = %event.event_type, key = %event.key, action, details = %details, "{}", message
            ),
            EventSeverity::Warning => tracing::warn!(
                target: "formguard::audit",
                event_id = %event.id, event_type = %event.event_type, key = %event.key, action, details = %details, "{}", message
            ),
            EventSeverity::Error => tracing::error!(
                target: "formguard::audit",
                event_id = %event.id, event_type = %event.event_type, key = %event.key, action, details = %details, "{}", message
            ),
        }
    }
}

// ============================================================================
// NoOpAuditLogger
// ============================================================================

/// 空操作日志记录器，用于禁用审计日志
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpAuditLogger;

impl NoOpAuditLogger {
    /// 创建新的空操作日志记录器
    pub fn new() -> Self {
        Self
    }
}

impl AuditLogger for NoOpAuditLogger {
    fn log(&self, _event: GuardEvent) {}
}

// ============================================================================
// 测试
// ============================================================================
