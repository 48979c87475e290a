//! 字段校验
//!
//! 每个校验函数都是纯函数。日期相关函数提供 `_on` 变体，便于显式传入"今天"。

use chrono::{DateTime, Local, NaiveDate};
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

use crate::error::FieldErrors;

/// 邮箱最大长度
pub const MAX_EMAIL_LENGTH: usize = 254;

/// 电话号码清理后的长度范围
pub const PHONE_LENGTH_RANGE: std::ops::RangeInclusive<usize> = 10..=16;

static EMAIL_PATTERN: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$"));

// 国际格式必须以 + 和非零数字开头；本地格式允许一个中继前缀 0
static PHONE_PATTERN: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^(?:\+[1-9]|0?[1-9])[0-9]*$"));

static PHONE_SEPARATORS: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"[\s\-()]"));

static NAME_PATTERN: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z\s\-'.]{2,50}$"));

fn matches(pattern: &LazyLock<Result<Regex, regex::Error>>, input: &str) -> bool {
    pattern.as_ref().map(|re| re.is_match(input)).unwrap_or(false)
}

/// 校验结果
///
/// 构造之后不再修改。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    /// 是否全部通过
    pub is_valid: bool,
    /// 字段名到错误信息
    pub errors: FieldErrors,
}

impl ValidationResult {
    /// 由错误集合构造
    pub fn from_errors(errors: FieldErrors) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
        }
    }

    /// 获取某个字段的错误信息
    pub fn error(&self, field: &str) -> Option<&str> {
        self.errors.get(field).map(String::as_str)
    }
}

/// 校验邮箱
///
/// ```rust
/// use formguard::security::validate::is_valid_email;
///
/// assert!(is_valid_email("a@b.co"));
/// assert!(!is_valid_email("not-an-email"));
/// assert!(!is_valid_email("a@b"));
/// ```
pub fn is_valid_email(email: &str) -> bool {
    email.len() <= MAX_EMAIL_LENGTH && matches(&EMAIL_PATTERN, email)
}

/// 校验电话号码
///
/// 先去掉空格、连字符和括号，再检查格式与长度。
///
/// ```rust
/// use formguard::security::validate::is_valid_phone;
///
/// assert!(is_valid_phone("0766123456"));
/// assert!(is_valid_phone("+255 (766) 123-456"));
/// assert!(!is_valid_phone("123"));
/// ```
pub fn is_valid_phone(phone: &str) -> bool {
    let cleaned = match PHONE_SEPARATORS.as_ref() {
        Ok(re) => re.replace_all(phone, "").into_owned(),
        Err(_) => return false,
    };
    PHONE_LENGTH_RANGE.contains(&cleaned.len()) && matches(&PHONE_PATTERN, &cleaned)
}

/// 校验姓名：字母、空白、连字符、撇号、句点，长度 2 到 50
pub fn is_valid_name(name: &str) -> bool {
    matches(&NAME_PATTERN, name) && name.trim().chars().count() >= 2
}

/// 解析日期
///
/// 接受 `YYYY-MM-DD`，或 RFC 3339 时间（取其本地日历日期）。
pub fn parse_date(input: &str) -> Option<NaiveDate> {
    let input = input.trim();
    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        return Some(date);
    }
    DateTime::parse_from_rfc3339(input)
        .ok()
        .map(|dt| dt.with_timezone(&Local).date_naive())
}

/// 校验日期：必须是真实日期且不早于今天（本地时间）
pub fn is_valid_date(input: &str) -> bool {
    is_valid_date_on(input, Local::now().date_naive())
}

/// 以给定的"今天"校验日期
pub fn is_valid_date_on(input: &str, today: NaiveDate) -> bool {
    parse_date(input).is_some_and(|date| date >= today)
}

/// 校验日期区间：退房日期必须严格晚于入住日期
pub fn is_valid_date_range(check_in: &str, check_out: &str) -> bool {
    match (parse_date(check_in), parse_date(check_out)) {
        (Some(start), Some(end)) => end > start,
        _ => false,
    }
}
