//! 预订表单

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};

use super::lenient_string;
use crate::backend::{HomeSubmission, RoomType, SubmissionType};
use crate::error::FieldErrors;
use crate::security::sanitize::{MAX_INPUT_LENGTH, sanitize_input_with_limit};
use crate::security::validate::{
    ValidationResult, is_valid_date_on, is_valid_date_range, is_valid_email, is_valid_name,
    is_valid_phone,
};

/// 允许的入住人数
pub const GUEST_RANGE: std::ops::RangeInclusive<u32> = 1..=10;

/// 预订表单
///
/// 除姓名、邮箱、电话、日期、房型、人数和来源外，其余字段不做校验，只做清理。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BookingForm {
    #[serde(deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(deserialize_with = "lenient_string")]
    pub email: String,
    #[serde(deserialize_with = "lenient_string")]
    pub phone: String,
    /// 入住日期，`YYYY-MM-DD`
    #[serde(deserialize_with = "lenient_string")]
    pub check_in: String,
    /// 退房日期，`YYYY-MM-DD`
    #[serde(deserialize_with = "lenient_string")]
    pub check_out: String,
    /// 房型 ID
    #[serde(deserialize_with = "lenient_string")]
    pub room_type: String,
    /// 入住人数（文本形式）
    #[serde(deserialize_with = "lenient_string")]
    pub guests: String,
    #[serde(deserialize_with = "lenient_string")]
    pub id_document: String,
    /// 证件类型选择"其他"时的说明
    #[serde(deserialize_with = "lenient_string")]
    pub id_document_other: String,
    /// 来源（城市、国家）
    #[serde(deserialize_with = "lenient_string")]
    pub origin: String,
    #[serde(deserialize_with = "lenient_string")]
    pub purpose: String,
    #[serde(deserialize_with = "lenient_string")]
    pub special_requests: String,
}

impl BookingForm {
    /// 清理后的副本
    pub fn sanitized(&self) -> Self {
        self.sanitized_with_limit(MAX_INPUT_LENGTH)
    }

    /// 使用自定义长度上限清理所有字段
    pub fn sanitized_with_limit(&self, max_chars: usize) -> Self {
        let clean = |value: &str| sanitize_input_with_limit(value, max_chars);
        Self {
            name: clean(&self.name),
            email: clean(&self.email),
            phone: clean(&self.phone),
            check_in: clean(&self.check_in),
            check_out: clean(&self.check_out),
            room_type: clean(&self.room_type),
            guests: clean(&self.guests),
            id_document: clean(&self.id_document),
            id_document_other: clean(&self.id_document_other),
            origin: clean(&self.origin),
            purpose: clean(&self.purpose),
            special_requests: clean(&self.special_requests),
        }
    }

    /// 解析入住人数，非整数时为 `None`
    pub fn guest_count(&self) -> Option<u32> {
        self.guests.trim().parse().ok()
    }

    /// 组装发送给后台的预订请求
    ///
    /// `room_types` 中能找到对应 ID 时使用房型名称和日价，否则原样使用房型字段。
    pub fn to_home_submission(&self, room_types: &[RoomType]) -> HomeSubmission {
        let selected = room_types
            .iter()
            .find(|rt| rt.id.to_string() == self.room_type);
        let room = match selected {
            Some(rt) => format!("{} TZS {}/day", rt.name, rt.price_per_day),
            None => self.room_type.clone(),
        };

        let id_document = if self.id_document_other.is_empty() {
            self.id_document.clone()
        } else {
            format!("{} ({})", self.id_document, self.id_document_other)
        };

        let special_requests = if self.special_requests.is_empty() {
            "None"
        } else {
            &self.special_requests
        };

        let message = [
            "Booking Request Details:".to_string(),
            format!("Check-in: {}", self.check_in),
            format!("Check-out: {}", self.check_out),
            format!("Room Type: {}", room),
            format!("Number of Guests: {}", self.guests),
            format!("Purpose of Stay: {}", self.purpose),
            format!("ID Document: {}", id_document),
            format!("Origin: {}", self.origin),
            format!("Special Requests: {}", special_requests),
        ]
        .join("\n");

        HomeSubmission {
            name: self.name.clone(),
            email: self.email.clone(),
            phone: Some(self.phone.clone()),
            message: Some(message),
            submission_type: SubmissionType::Booking,
        }
    }
}

/// 校验预订表单，日期以本地时区的今天为准
pub fn validate_booking_form(form: &BookingForm) -> ValidationResult {
    validate_booking_form_on(form, Local::now().date_naive())
}

/// 以给定的"今天"校验预订表单
///
/// 所有检查都会执行；日期区间错误覆盖退房日期的错误。
pub fn validate_booking_form_on(form: &BookingForm, today: NaiveDate) -> ValidationResult {
    let mut errors = FieldErrors::new();
    let mut fail = |field: &str, message: &str| {
        errors.insert(field.to_string(), message.to_string());
    };

    if !is_valid_name(&form.name) {
        fail(
            "name",
            "Please enter a valid name (2-50 characters, letters only)",
        );
    }

    if !is_valid_email(&form.email) {
        fail("email", "Please enter a valid email address");
    }

    if !is_valid_phone(&form.phone) {
        fail("phone", "Please enter a valid phone number");
    }

    if !is_valid_date_on(&form.check_in, today) {
        fail(
            "checkIn",
            "Please select a valid check-in date (today or later)",
        );
    }

    if !is_valid_date_on(&form.check_out, today) {
        fail(
            "checkOut",
            "Please select a valid check-out date (today or later)",
        );
    }

    if !form.check_in.is_empty()
        && !form.check_out.is_empty()
        && !is_valid_date_range(&form.check_in, &form.check_out)
    {
        fail("checkOut", "Check-out date must be after check-in date");
    }

    if form.room_type.trim().is_empty() {
        fail("roomType", "Please select a room type");
    }

    if !form.guest_count().is_some_and(|n| GUEST_RANGE.contains(&n)) {
        fail("guests", "Please enter a valid number of guests (1-10)");
    }

    if form.origin.trim().chars().count() < 2 {
        fail("origin", "Please enter your origin (city, country)");
    }

    ValidationResult::from_errors(errors)
}
