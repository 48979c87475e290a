//! # formguard
//!
//! 旅舍预订网站登录表单与预订表单的防滥用层。
//!
//! 在任何网络请求之前，对每一次表单提交做出放行或拒绝的决定。
//!
//! ## 功能特性
//!
//! - **输入清理**: 去除尖括号、`javascript:` 和事件处理器片段，限制长度
//! - **字段校验**: 邮箱、电话、姓名、日期与日期区间
//! - **表单校验**: 登录表单与预订表单，错误按字段返回
//! - **速率限制**: 按登录、预订分别配置的滑动窗口与锁定
//! - **蜜罐**: 随机命名的隐藏字段，识别简单爬虫
//! - **CSRF**: 每次打开表单生成随机 token，另有 HMAC 绑定校验可选
//! - **密码强度检查**: 五条规则评分
//! - **审计日志**: 记录每一次决定
//!
//! 本库不发起 HTTP 请求；[`backend`] 只定义放行后发送给后台的载荷。
//!
//! ## 提交检查示例
//!
//! ```rust
//! use formguard::{AbuseGuard, Decision, GuardConfig, Rejection};
//! use formguard::form::{BookingForm, FormData};
//! use formguard::guard::rate_limit_key;
//! use formguard::security::rate_limit::ActionKind;
//!
//! # #[tokio::main]
//! # async fn main() -> formguard::Result<()> {
//! let guard = AbuseGuard::new(GuardConfig::default())?;
//! let key = rate_limit_key(ActionKind::Booking, "guest@example.com", "lodge.example");
//!
//! // 蜜罐被填写时直接拒绝
//! let form = FormData::Booking(BookingForm::default());
//! let decision = guard.check_submission(&key, "http://spam.example", &form).await?;
//! assert_eq!(decision, Decision::Reject(Rejection::BotDetected));
//!
//! // 空表单校验失败
//! let decision = guard.check_submission(&key, "", &form).await?;
//! assert_eq!(decision.rejection().map(|r| r.reason()), Some("validation-failed"));
//! # Ok(())
//! # }
//! ```
//!
//! ## 密码强度检查
//!
//! ```rust
//! use formguard::validate_password_strength;
//!
//! let check = validate_password_strength("password");
//! assert!(!check.is_valid);
//! assert_eq!(check.score, 2);
//! ```

pub mod audit;
pub mod backend;
pub mod clock;
pub mod error;
pub mod form;
pub mod guard;
pub mod password;
pub mod random;
pub mod security;

pub use error::{Error, Result};

// ============================================================================
// 守卫相关导出
// ============================================================================

pub use guard::{AbuseGuard, Approval, Decision, FormSession, GuardConfig, Rejection};

// ============================================================================
// 表单相关导出
// ============================================================================

pub use form::{
    BookingForm, FormData, LoginForm, validate_booking_form, validate_booking_reference,
    validate_login_form,
};

// ============================================================================
// 安全防护相关导出
// ============================================================================

pub use security::{
    RateLimitPolicy, RateLimiter, ValidationResult, create_honeypot_field, generate_csrf_token,
    is_honeypot_filled, sanitize_input,
};

pub use password::{PasswordCheck, validate_password_strength};
