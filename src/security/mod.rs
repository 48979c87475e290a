//! 安全防护模块
//!
//! ## 子模块
//!
//! - **sanitize**: 输入清理
//! - **validate**: 字段校验（邮箱、电话、姓名、日期）
//! - **honeypot**: 蜜罐字段，识别简单爬虫
//! - **csrf**: CSRF token 生成与可选的 HMAC 绑定校验
//! - **rate_limit**: 滑动窗口速率限制与锁定
//!
//! ## 速率限制示例
//!
//! ```rust
//! use formguard::security::rate_limit::{ActionKind, RateLimitPolicy, RateLimiter};
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() -> formguard::Result<()> {
//! let limiter = RateLimiter::new().with_policies(
//!     RateLimitPolicy::for_login().with_max_attempts(2),
//!     RateLimitPolicy::for_booking(),
//! );
//!
//! let key = "login_staff@example.com_lodge.example";
//! assert!(limiter.is_allowed(key, ActionKind::Login).await?);
//! assert!(limiter.is_allowed(key, ActionKind::Login).await?);
//! assert!(!limiter.is_allowed(key, ActionKind::Login).await?);
//!
//! let wait = limiter.lockout_time(key, ActionKind::Login).await?;
//! assert!(wait.is_some_and(|d| d <= Duration::from_secs(30 * 60)));
//! # Ok(())
//! # }
//! ```
//!
//! ## 清理与校验示例
//!
//! ```rust
//! use formguard::security::{is_valid_email, sanitize_input};
//!
//! assert_eq!(sanitize_input("<img src=x onerror=alert(1)>"), "img src=x alert(1)");
//! assert!(is_valid_email("guest@example.com"));
//! ```

pub mod csrf;
pub mod honeypot;
pub mod rate_limit;
pub mod sanitize;
pub mod validate;

pub use csrf::{CsrfConfig, CsrfProtection, CsrfToken, generate_csrf_token};
pub use honeypot::{HoneypotField, create_honeypot_field, is_honeypot_filled};
pub use rate_limit::{
    ActionKind, AttemptRecord, AttemptVerdict, InMemoryRateLimitStore, RateLimitPolicy,
    RateLimitStore, RateLimiter, evaluate_attempt,
};
pub use sanitize::{sanitize_input, sanitize_input_with_limit, sanitize_value};
pub use validate::{
    ValidationResult, is_valid_date, is_valid_date_on, is_valid_date_range, is_valid_email,
    is_valid_name, is_valid_phone,
};
