//! 表单提交守卫
//!
//! [`AbuseGuard`] 在任何网络请求之前对一次表单提交做出放行或拒绝的决定。检查顺序固定：
//!
//! 1. 蜜罐被填写：[`Rejection::BotDetected`]
//! 2. 速率限制拒绝：[`Rejection::RateLimited`]
//! 3. 表单校验失败：[`Rejection::ValidationFailed`]
//! 4. 放行：[`Approval`]，载荷中所有字符串字段已清理（登录密码除外）
//!
//! 速率限制在校验之前执行，因此校验失败的提交同样消耗一次尝试。
//!
//! ## 示例
//!
//! ```rust
//! use formguard::form::{FormData, LoginForm};
//! use formguard::guard::{AbuseGuard, Decision, GuardConfig, rate_limit_key};
//! use formguard::security::rate_limit::ActionKind;
//!
//! # #[tokio::main]
//! # async fn main() -> formguard::Result<()> {
//! let guard = AbuseGuard::new(GuardConfig::default())?;
//! let session = guard.open_form(ActionKind::Login)?;
//!
//! let form = FormData::Login(LoginForm::new("staff@example.com", "s3cret"));
//! let key = rate_limit_key(ActionKind::Login, "staff@example.com", "lodge.example");
//!
//! match guard.check_submission(&key, &session.honeypot.value, &form).await? {
//!     Decision::Allow(approval) => assert_eq!(approval.remaining_attempts, 4),
//!     Decision::Reject(rejection) => panic!("unexpected rejection: {rejection}"),
//! }
//! # Ok(())
//! # }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::audit::{AuditLogger, GuardEvent, NoOpAuditLogger};
use crate::clock::{Clock, SystemClock};
use crate::error::{ConfigError, Error, FieldErrors, Result};
use crate::form::FormData;
use crate::random::generate_csrf_token;
use crate::security::honeypot::{DEFAULT_HONEYPOT_PREFIX, HoneypotField, is_honeypot_filled};
use crate::security::rate_limit::{
    ActionKind, AttemptVerdict, RateLimitPolicy, RateLimitStore, RateLimiter,
};
use crate::security::sanitize::MAX_INPUT_LENGTH;

// ============================================================================
// 配置
// ============================================================================

/// 守卫配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    /// 登录策略
    pub login: RateLimitPolicy,
    /// 预订策略
    pub booking: RateLimitPolicy,
    /// 单个字段清理后的最大字符数
    pub max_input_length: usize,
    /// 蜜罐字段名前缀
    pub honeypot_prefix: String,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            login: RateLimitPolicy::for_login(),
            booking: RateLimitPolicy::for_booking(),
            max_input_length: MAX_INPUT_LENGTH,
            honeypot_prefix: DEFAULT_HONEYPOT_PREFIX.to_string(),
        }
    }
}

impl GuardConfig {
    /// 严格配置
    ///
    /// - 登录：15 分钟内 3 次，锁定 1 小时
    /// - 预订：1 小时内 5 次，锁定 4 小时
    /// - 字段最长 500 字符
    pub fn strict() -> Self {
        Self {
            login: RateLimitPolicy::for_login()
                .with_max_attempts(3)
                .with_lockout(Duration::from_secs(60 * 60)),
            booking: RateLimitPolicy::for_booking()
                .with_max_attempts(5)
                .with_lockout(Duration::from_secs(4 * 60 * 60)),
            max_input_length: 500,
            ..Self::default()
        }
    }

    /// 宽松配置
    ///
    /// - 登录：15 分钟内 10 次，锁定 15 分钟
    /// - 预订：1 小时内 20 次，锁定 1 小时
    pub fn relaxed() -> Self {
        Self {
            login: RateLimitPolicy::for_login()
                .with_max_attempts(10)
                .with_lockout(Duration::from_secs(15 * 60)),
            booking: RateLimitPolicy::for_booking()
                .with_max_attempts(20)
                .with_lockout(Duration::from_secs(60 * 60)),
            ..Self::default()
        }
    }

    /// 从 JSON 加载并校验，缺失的字段使用默认值
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// 设置登录策略
    pub fn with_login_policy(mut self, policy: RateLimitPolicy) -> Self {
        self.login = policy;
        self
    }

    /// 设置预订策略
    pub fn with_booking_policy(mut self, policy: RateLimitPolicy) -> Self {
        self.booking = policy;
        self
    }

    /// 设置字段最大长度
    pub fn with_max_input_length(mut self, max: usize) -> Self {
        self.max_input_length = max;
        self
    }

    /// 设置蜜罐前缀
    pub fn with_honeypot_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.honeypot_prefix = prefix.into();
        self
    }

    /// 校验配置
    pub fn validate(&self) -> Result<()> {
        self.login.validate("login")?;
        self.booking.validate("booking")?;
        if self.max_input_length == 0 {
            return Err(Error::Config(ConfigError::InvalidValue {
                key: "max_input_length".to_string(),
                message: "must be greater than 0".to_string(),
            }));
        }
        if self.honeypot_prefix.trim().is_empty() {
            return Err(Error::Config(ConfigError::InvalidValue {
                key: "honeypot_prefix".to_string(),
                message: "must not be empty".to_string(),
            }));
        }
        Ok(())
    }
}

// ============================================================================
// 决定
// ============================================================================

/// 一次打开表单时生成的防护材料
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormSession {
    /// 表单类别
    pub kind: ActionKind,
    /// 64 位十六进制 CSRF token
    pub csrf_token: String,
    /// 蜜罐字段
    pub honeypot: HoneypotField,
    /// 打开时间
    pub opened_at: DateTime<Utc>,
}

/// 放行结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Approval {
    /// 表单类别
    pub kind: ActionKind,
    /// 清理后的表单
    pub payload: FormData,
    /// 本次之后的剩余尝试次数
    pub remaining_attempts: u32,
}

/// 拒绝原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// 蜜罐被填写
    BotDetected,
    /// 超出速率限制
    RateLimited {
        /// 距离解锁的时间
        retry_after: Duration,
    },
    /// 表单校验失败
    ValidationFailed {
        /// 字段名到错误信息
        field_errors: FieldErrors,
    },
}

impl Rejection {
    /// 机器可读的原因
    pub fn reason(&self) -> &'static str {
        match self {
            Rejection::BotDetected => "bot-detected",
            Rejection::RateLimited { .. } => "rate-limited",
            Rejection::ValidationFailed { .. } => "validation-failed",
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::BotDetected => write!(f, "Suspicious activity detected"),
            Rejection::RateLimited { retry_after } => {
                let minutes = retry_after.as_secs().div_ceil(60);
                write!(f, "Too many attempts. Please try again in {minutes} minutes")
            }
            Rejection::ValidationFailed { field_errors } => {
                let fields: Vec<&str> = field_errors.keys().map(String::as_str).collect();
                write!(f, "Please correct: {}", fields.join(", "))
            }
        }
    }
}

impl From<Rejection> for Error {
    fn from(rejection: Rejection) -> Self {
        match rejection {
            Rejection::BotDetected => Error::BotDetected,
            Rejection::RateLimited { retry_after } => Error::RateLimitExceeded { retry_after },
            Rejection::ValidationFailed { field_errors } => Error::ValidationFailed(field_errors),
        }
    }
}

/// 守卫的决定
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// 放行
    Allow(Approval),
    /// 拒绝
    Reject(Rejection),
}

impl Decision {
    /// 是否放行
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow(_))
    }

    /// 拒绝原因
    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Decision::Allow(_) => None,
            Decision::Reject(rejection) => Some(rejection),
        }
    }

    /// 把拒绝映射为 [`Error`]
    pub fn into_result(self) -> Result<Approval> {
        match self {
            Decision::Allow(approval) => Ok(approval),
            Decision::Reject(rejection) => Err(rejection.into()),
        }
    }
}

/// 构造限流 key：`<kind>_<identity>_<host>`
///
/// ```rust
/// use formguard::guard::rate_limit_key;
/// use formguard::security::rate_limit::ActionKind;
///
/// assert_eq!(
///     rate_limit_key(ActionKind::Booking, "a@b.co", "lodge.example"),
///     "booking_a@b.co_lodge.example"
/// );
/// ```
pub fn rate_limit_key(kind: ActionKind, identity: &str, host: &str) -> String {
    format!("{}_{}_{}", kind, identity, host)
}

// ============================================================================
// AbuseGuard
// ============================================================================

/// 表单提交守卫
pub struct AbuseGuard {
    config: GuardConfig,
    limiter: RateLimiter,
    audit: Arc<dyn AuditLogger>,
    clock: Arc<dyn Clock>,
}

impl AbuseGuard {
    /// 使用给定配置创建，配置无效时返回错误
    pub fn new(config: GuardConfig) -> Result<Self> {
        config.validate()?;
        let limiter = RateLimiter::new().with_policies(config.login.clone(), config.booking.clone());
        Ok(Self {
            config,
            limiter,
            audit: Arc::new(NoOpAuditLogger),
            clock: Arc::new(SystemClock),
        })
    }

    /// 指定限流存储
    pub fn with_store(mut self, store: Arc<dyn RateLimitStore>) -> Self {
        self.limiter = self.limiter.with_store(store);
        self
    }

    /// 指定审计日志记录器
    pub fn with_audit_logger(mut self, audit: Arc<dyn AuditLogger>) -> Self {
        self.audit = audit;
        self
    }

    /// 指定时间源，同时用于限流和日期校验
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.limiter = self.limiter.with_clock(Arc::clone(&clock));
        self.clock = clock;
        self
    }

    /// 当前配置
    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    /// 内部的速率限制器
    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// 打开表单：生成新的 CSRF token 和蜜罐字段
    pub fn open_form(&self, kind: ActionKind) -> Result<FormSession> {
        Ok(FormSession {
            kind,
            csrf_token: generate_csrf_token()?,
            honeypot: HoneypotField::with_prefix(&self.config.honeypot_prefix),
            opened_at: self.clock.now(),
        })
    }

    /// 检查一次提交
    ///
    /// 本地检查的结果总是以 [`Decision`] 返回；`Err` 只表示存储或其他基础设施故障。
    pub async fn check_submission(
        &self,
        key: &str,
        honeypot_value: &str,
        form: &FormData,
    ) -> Result<Decision> {
        let kind = form.kind();

        if is_honeypot_filled(honeypot_value) {
            tracing::warn!(key, kind = %kind, "honeypot filled, rejecting submission");
            self.record(GuardEvent::bot_detected(key, kind));
            return Ok(Decision::Reject(Rejection::BotDetected));
        }

        match self.limiter.check(key, kind).await? {
            AttemptVerdict::Allowed => {}
            verdict => {
                let retry_after = self
                    .limiter
                    .lockout_time(key, kind)
                    .await?
                    .unwrap_or(self.limiter.policy(kind).lockout);
                if verdict == AttemptVerdict::LockoutStarted {
                    self.record(GuardEvent::lockout_started(
                        key,
                        kind,
                        self.limiter.policy(kind).lockout,
                    ));
                }
                tracing::warn!(
                    key,
                    kind = %kind,
                    retry_after_secs = retry_after.as_secs(),
                    "rate limited"
                );
                self.record(GuardEvent::rate_limited(key, kind, retry_after));
                return Ok(Decision::Reject(Rejection::RateLimited { retry_after }));
            }
        }

        let validation = form.validate_on(self.clock.today());
        if !validation.is_valid {
            tracing::debug!(key, kind = %kind, fields = ?validation.errors.keys(), "validation failed");
            self.record(GuardEvent::validation_failed(
                key,
                kind,
                validation.errors.keys(),
            ));
            return Ok(Decision::Reject(Rejection::ValidationFailed {
                field_errors: validation.errors,
            }));
        }

        let remaining_attempts = self.limiter.remaining_attempts(key, kind).await?;
        tracing::trace!(key, kind = %kind, remaining_attempts, "submission allowed");
        self.record(GuardEvent::submission_allowed(key, kind, remaining_attempts));

        Ok(Decision::Allow(Approval {
            kind,
            payload: form.sanitized_with_limit(self.config.max_input_length),
            remaining_attempts,
        }))
    }

    /// 登录成功后清除该 key 的限流历史
    pub async fn record_success(&self, key: &str) -> Result<()> {
        self.limiter.reset(key).await?;
        self.record(GuardEvent::rate_limit_reset(key));
        Ok(())
    }

    fn record(&self, event: GuardEvent) {
        self.audit.log(event.with_timestamp(self.clock.now()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{EventType, InMemoryAuditLogger};
    use crate::clock::ManualClock;
    use crate::form::LoginForm;

    fn login(email: &str, password: &str) -> FormData {
        FormData::Login(LoginForm::new(email, password))
    }

    #[test]
    fn test_default_config() {
        let config = GuardConfig::default();
        assert_eq!(config.login, RateLimitPolicy::for_login());
        assert_eq!(config.booking, RateLimitPolicy::for_booking());
        assert_eq!(config.max_input_length, 1000);
        assert_eq!(config.honeypot_prefix, "website_");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_presets_are_valid() {
        assert!(GuardConfig::strict().validate().is_ok());
        assert!(GuardConfig::relaxed().validate().is_ok());
        assert!(GuardConfig::strict().login.max_attempts < GuardConfig::relaxed().login.max_attempts);
    }

    #[test]
    fn test_invalid_config() {
        assert!(
            GuardConfig::default()
                .with_max_input_length(0)
                .validate()
                .is_err()
        );
        assert!(
            GuardConfig::default()
                .with_honeypot_prefix("  ")
                .validate()
                .is_err()
        );
        assert!(
            AbuseGuard::new(
                GuardConfig::default()
                    .with_login_policy(RateLimitPolicy::for_login().with_max_attempts(0))
            )
            .is_err()
        );
    }

    #[test]
    fn test_from_json() {
        let config = GuardConfig::from_json(r#"{"max_input_length": 200}"#).unwrap();
        assert_eq!(config.max_input_length, 200);
        assert_eq!(config.login, RateLimitPolicy::for_login());

        let err = GuardConfig::from_json("{not json").unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::Parse(_))));

        let err = GuardConfig::from_json(r#"{"honeypot_prefix": ""}"#).unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_open_form() {
        let guard = AbuseGuard::new(GuardConfig::default().with_honeypot_prefix("url_")).unwrap();
        let a = guard.open_form(ActionKind::Booking).unwrap();
        let b = guard.open_form(ActionKind::Booking).unwrap();

        assert_eq!(a.csrf_token.len(), 64);
        assert_ne!(a.csrf_token, b.csrf_token);
        assert!(a.honeypot.name.starts_with("url_"));
        assert!(a.honeypot.value.is_empty());
    }

    #[tokio::test]
    async fn test_honeypot_checked_before_rate_limit() {
        let guard = AbuseGuard::new(GuardConfig::default()).unwrap();
        let form = login("a@b.co", "x");

        for _ in 0..10 {
            let decision = guard.check_submission("k", "filled", &form).await.unwrap();
            assert_eq!(decision, Decision::Reject(Rejection::BotDetected));
        }
        // 机器人提交不消耗尝试次数
        assert_eq!(
            guard
                .limiter()
                .remaining_attempts("k", ActionKind::Login)
                .await
                .unwrap(),
            5
        );
    }

    #[tokio::test]
    async fn test_validation_failure_consumes_attempt() {
        let guard = AbuseGuard::new(GuardConfig::default()).unwrap();
        let decision = guard
            .check_submission("k", "", &login("bad", ""))
            .await
            .unwrap();

        let Decision::Reject(Rejection::ValidationFailed { field_errors }) = decision else {
            panic!("expected validation failure");
        };
        assert!(field_errors.contains_key("email"));
        assert!(field_errors.contains_key("password"));
        assert_eq!(
            guard
                .limiter()
                .remaining_attempts("k", ActionKind::Login)
                .await
                .unwrap(),
            4
        );
    }

    #[tokio::test]
    async fn test_allow_sanitizes_but_keeps_password() {
        let guard = AbuseGuard::new(GuardConfig::default()).unwrap();
        let decision = guard
            .check_submission("k", "   ", &login("a@b.co", " <pw> "))
            .await
            .unwrap();

        let approval = decision.into_result().unwrap();
        assert_eq!(approval.kind, ActionKind::Login);
        assert_eq!(approval.remaining_attempts, 4);
        assert_eq!(approval.payload, login("a@b.co", " <pw> "));
    }

    #[tokio::test]
    async fn test_lockout_events_and_retry_after() {
        let clock = ManualClock::new();
        let audit = Arc::new(InMemoryAuditLogger::new());
        let guard = AbuseGuard::new(GuardConfig::default())
            .unwrap()
            .with_clock(Arc::new(clock.clone()))
            .with_audit_logger(audit.clone());

        let form = login("a@b.co", "pw");
        for _ in 0..5 {
            assert!(guard.check_submission("k", "", &form).await.unwrap().is_allowed());
        }

        let decision = guard.check_submission("k", "", &form).await.unwrap();
        assert_eq!(
            decision.rejection(),
            Some(&Rejection::RateLimited {
                retry_after: Duration::from_secs(1800)
            })
        );
        assert_eq!(audit.get_events_by_type(EventType::LockoutStarted).len(), 1);

        clock.advance(Duration::from_secs(600));
        let decision = guard.check_submission("k", "", &form).await.unwrap();
        assert_eq!(
            decision.rejection(),
            Some(&Rejection::RateLimited {
                retry_after: Duration::from_secs(1200)
            })
        );
        assert_eq!(audit.get_events_by_type(EventType::LockoutStarted).len(), 1);
        assert_eq!(
            audit.get_events_by_type(EventType::RateLimitTriggered).len(),
            2
        );
        assert_eq!(
            audit.get_events_by_type(EventType::SubmissionAllowed).len(),
            5
        );
    }

    #[tokio::test]
    async fn test_record_success_resets() {
        let audit = Arc::new(InMemoryAuditLogger::new());
        let guard = AbuseGuard::new(GuardConfig::default())
            .unwrap()
            .with_audit_logger(audit.clone());
        let form = login("a@b.co", "pw");

        for _ in 0..3 {
            guard.check_submission("k", "", &form).await.unwrap();
        }
        guard.record_success("k").await.unwrap();

        assert_eq!(
            guard
                .limiter()
                .remaining_attempts("k", ActionKind::Login)
                .await
                .unwrap(),
            5
        );
        assert_eq!(audit.get_events_by_type(EventType::RateLimitReset).len(), 1);
    }

    #[test]
    fn test_rejection_mapping() {
        let err: Error = Rejection::BotDetected.into();
        assert_eq!(err, Error::BotDetected);

        let rejection = Rejection::RateLimited {
            retry_after: Duration::from_secs(1800),
        };
        assert_eq!(rejection.reason(), "rate-limited");
        assert_eq!(
            rejection.to_string(),
            "Too many attempts. Please try again in 30 minutes"
        );
        assert!(Error::from(rejection).is_submission_error());

        let mut field_errors = FieldErrors::new();
        field_errors.insert("email".into(), "bad".into());
        let decision = Decision::Reject(Rejection::ValidationFailed { field_errors });
        assert!(matches!(
            decision.into_result(),
            Err(Error::ValidationFailed(errors)) if errors.contains_key("email")
        ));
    }

    #[test]
    fn test_rate_limit_key() {
        assert_eq!(
            rate_limit_key(ActionKind::Login, "a@b.co", "localhost"),
            "login_a@b.co_localhost"
        );
    }
}
