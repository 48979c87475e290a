//! 表单模型与表单级校验
//!
//! - [`LoginForm`] / [`validate_login_form`]：员工登录
//! - [`BookingForm`] / [`validate_booking_form`]：预订请求
//! - [`validate_booking_reference`]：入住、退房、取消前按预订号查询
//!
//! 表单从 camelCase JSON 反序列化。缺失的字段按空字符串处理，数字会转成文本，
//! 其他非字符串值一律视为空字符串。

pub mod booking;
pub mod login;

pub use booking::{BookingForm, validate_booking_form, validate_booking_form_on};
pub use login::{LoginForm, validate_login_form};

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::FieldErrors;
use crate::security::rate_limit::ActionKind;
use crate::security::validate::ValidationResult;

/// 预订号为空时的提示
pub const MISSING_BOOKING_ID: &str = "Please enter a booking ID";

/// 受保护的表单
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FormData {
    /// 登录表单
    Login(LoginForm),
    /// 预订表单
    Booking(BookingForm),
}

impl FormData {
    /// 对应的速率限制类别
    pub fn kind(&self) -> ActionKind {
        match self {
            FormData::Login(_) => ActionKind::Login,
            FormData::Booking(_) => ActionKind::Booking,
        }
    }

    /// 以给定的"今天"校验
    pub fn validate_on(&self, today: NaiveDate) -> ValidationResult {
        match self {
            FormData::Login(form) => validate_login_form(form),
            FormData::Booking(form) => validate_booking_form_on(form, today),
        }
    }

    /// 清理后的副本，单字段最长 `max_chars` 个字符
    pub fn sanitized_with_limit(&self, max_chars: usize) -> Self {
        match self {
            FormData::Login(form) => FormData::Login(form.sanitized_with_limit(max_chars)),
            FormData::Booking(form) => FormData::Booking(form.sanitized_with_limit(max_chars)),
        }
    }
}

impl From<LoginForm> for FormData {
    fn from(form: LoginForm) -> Self {
        FormData::Login(form)
    }
}

impl From<BookingForm> for FormData {
    fn from(form: BookingForm) -> Self {
        FormData::Booking(form)
    }
}

/// 校验预订号查询表单
///
/// ```rust
/// use formguard::form::validate_booking_reference;
///
/// assert!(validate_booking_reference("KH-2041").is_valid);
/// assert!(!validate_booking_reference("   ").is_valid);
/// ```
pub fn validate_booking_reference(booking_id: &str) -> ValidationResult {
    let mut errors = FieldErrors::new();
    if booking_id.trim().is_empty() {
        errors.insert("bookingId".to_string(), MISSING_BOOKING_ID.to_string());
    }
    ValidationResult::from_errors(errors)
}

/// 宽松的字符串反序列化：数字转文本，其他非字符串值视为空
pub(crate) fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    })
}
