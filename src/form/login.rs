//! 登录表单

use serde::{Deserialize, Serialize};

use super::lenient_string;
use crate::backend::LoginRequest;
use crate::error::FieldErrors;
use crate::security::sanitize::{MAX_INPUT_LENGTH, sanitize_input_with_limit};
use crate::security::validate::{ValidationResult, is_valid_email};

/// 登录表单
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoginForm {
    /// 邮箱
    #[serde(deserialize_with = "lenient_string")]
    pub email: String,
    /// 密码，不做清理
    #[serde(deserialize_with = "lenient_string")]
    pub password: String,
}

impl LoginForm {
    /// 创建登录表单
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    /// 清理后的副本
    pub fn sanitized(&self) -> Self {
        self.sanitized_with_limit(MAX_INPUT_LENGTH)
    }

    /// 使用自定义长度上限清理，密码原样保留
    pub fn sanitized_with_limit(&self, max_chars: usize) -> Self {
        Self {
            email: sanitize_input_with_limit(&self.email, max_chars),
            password: self.password.clone(),
        }
    }

    /// 转换为后台登录请求
    pub fn to_request(&self) -> LoginRequest {
        LoginRequest {
            email: self.email.clone(),
            password: self.password.clone(),
        }
    }
}

/// 校验登录表单：邮箱格式正确、密码非空（不检查密码强度）
pub fn validate_login_form(form: &LoginForm) -> ValidationResult {
    let mut errors = FieldErrors::new();

    if form.email.is_empty() || !is_valid_email(&form.email) {
        errors.insert(
            "email".to_string(),
            "Please enter a valid email address".to_string(),
        );
    }

    if form.password.is_empty() {
        errors.insert(
            "password".to_string(),
            "Please enter your password".to_string(),
        );
    }

    ValidationResult::from_errors(errors)
}
