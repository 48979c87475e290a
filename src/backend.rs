//! 远端预订后台的数据契约
//!
//! 本 crate 不发起任何 HTTP 请求，这里只定义调用方在收到放行决定后发送、接收的载荷。
//!
//! - 登录：[`LoginRequest`] / [`LoginResponse`]
//! - 首页提交与房型：[`HomeSubmission`]、[`RoomTypeList`]
//! - 按预订号查询、退房、取消：[`BookingEndpoint`] 及对应响应

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::form::lenient_string;

/// 登录请求
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    /// 邮箱
    pub email: String,
    /// 密码
    pub password: String,
}

/// 登录响应状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    /// 成功
    Success,
    /// 失败
    Error,
}

/// 登录成功时返回的用户信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginUser {
    /// 用户 ID
    pub id: u64,
    /// 用户名
    pub username: String,
    /// 邮箱
    pub email: String,
    /// 角色
    pub role: String,
    /// 角色显示名
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_display: Option<String>,
}

/// 登录响应
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    /// 状态
    pub status: ResponseStatus,
    /// 提示信息
    pub message: String,
    /// 登录后跳转地址
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
    /// 角色
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// 用户信息
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<LoginUser>,
}

impl LoginResponse {
    /// 是否登录成功
    pub fn is_success(&self) -> bool {
        self.status == ResponseStatus::Success
    }
}

/// 首页提交类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionType {
    /// 预订
    Booking,
    /// 联系
    Contact,
    /// 咨询
    Inquiry,
}

/// 首页表单提交（预订请求以此格式发送）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HomeSubmission {
    /// 姓名
    pub name: String,
    /// 邮箱
    pub email: String,
    /// 电话
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// 正文
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// 提交类型
    #[serde(rename = "type")]
    pub submission_type: SubmissionType,
}

/// 房型
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomType {
    /// 房型 ID
    pub id: u64,
    /// 名称
    pub name: String,
    /// 日价（后台以十进制字符串返回）
    pub price_per_day: String,
    /// 描述
    #[serde(default)]
    pub description: String,
    /// 房间总数
    #[serde(default)]
    pub total_rooms: u32,
    /// 可用房间数
    #[serde(default)]
    pub available_rooms: u32,
}

/// 房型列表响应
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomTypeList {
    /// 房型
    #[serde(default)]
    pub room_types: Vec<RoomType>,
}

// ============================================================================
// 预订查询
// ============================================================================

/// 预订状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    /// 待确认
    Pending,
    /// 已确认
    Confirmed,
    /// 已入住
    CheckedIn,
    /// 已退房
    CheckedOut,
    /// 已取消
    Cancelled,
}

impl BookingStatus {
    /// 是否还可以退房
    pub fn can_check_out(&self) -> bool {
        *self == BookingStatus::CheckedIn
    }

    /// 是否还可以取消
    pub fn can_cancel(&self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Confirmed)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::CheckedIn => "checked_in",
            BookingStatus::CheckedOut => "checked_out",
            BookingStatus::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// 预订详情（`GET /bookings/{id}/`）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingDetails {
    /// 后台记录 ID，数字也按文本接收
    #[serde(deserialize_with = "lenient_string")]
    pub id: String,
    /// 预订号
    pub booking_id: String,
    /// 客人姓名
    pub guest_name: String,
    /// 邮箱
    pub email: String,
    /// 电话
    pub phone: String,
    /// 入住日期
    pub check_in_date: String,
    /// 退房日期
    pub check_out_date: String,
    /// 房型
    pub room_type: String,
    /// 状态
    pub status: BookingStatus,
    /// 特殊要求
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub special_requests: Option<String>,
    /// 创建时间
    pub created_at: String,
}

/// 退房响应（`POST /bookings/{id}/checkout/`）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckOutResponse {
    /// 是否成功
    pub success: bool,
    /// 提示信息
    pub message: String,
    /// 预订号
    pub booking_id: String,
    /// 退房时间
    pub check_out_time: String,
}

/// 取消响应（`POST /bookings/{id}/cancel/`）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelResponse {
    /// 是否成功
    pub success: bool,
    /// 提示信息
    pub message: String,
    /// 预订号
    pub booking_id: String,
}

/// 状态查询响应（`GET /bookings/{id}/status/`）
///
/// 这个接口的状态是自由文本，不一定属于 [`BookingStatus`]。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingStatusResponse {
    /// 状态
    pub status: String,
    /// 提示信息
    pub message: String,
}

impl BookingStatusResponse {
    /// 尝试解析为已知的预订状态
    pub fn known_status(&self) -> Option<BookingStatus> {
        serde_json::from_value(serde_json::Value::String(self.status.clone())).ok()
    }
}

/// 按预订号访问的后台接口
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BookingEndpoint {
    /// 查询详情
    Details,
    /// 退房
    CheckOut,
    /// 取消
    Cancel,
    /// 查询状态
    Status,
}

impl BookingEndpoint {
    /// HTTP 方法
    pub fn method(&self) -> &'static str {
        match self {
            BookingEndpoint::Details | BookingEndpoint::Status => "GET",
            BookingEndpoint::CheckOut | BookingEndpoint::Cancel => "POST",
        }
    }

    /// 相对于 API 根地址的路径
    ///
    /// 预订号去除首尾空白后只能包含 ASCII 字母、数字、`-` 和 `_`，否则返回 `None`。
    ///
    /// ```rust
    /// use formguard::backend::BookingEndpoint;
    ///
    /// assert_eq!(
    ///     BookingEndpoint::CheckOut.path(" KH-2041 ").as_deref(),
    ///     Some("/bookings/KH-2041/checkout/")
    /// );
    /// assert_eq!(BookingEndpoint::Details.path("../admin"), None);
    /// ```
    pub fn path(&self, booking_id: &str) -> Option<String> {
        let id = booking_id.trim();
        let safe = !id.is_empty()
            && id
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
        if !safe {
            return None;
        }

        let suffix = match self {
            BookingEndpoint::Details => "",
            BookingEndpoint::CheckOut => "checkout/",
            BookingEndpoint::Cancel => "cancel/",
            BookingEndpoint::Status => "status/",
        };
        Some(format!("/bookings/{}/{}", id, suffix))
    }
}
