//! 蜜罐字段
//!
//! 对真人隐藏、对简单爬虫可见的表单字段。字段名带随机后缀，防止机器人按固定名称跳过。
//!
//! 字段必须由展示层渲染为不可见、不可聚焦、不被自动填充；本模块只检查提交回来的值。

use serde::{Deserialize, Serialize};

use crate::random::generate_random_base36;

/// 默认字段名前缀
pub const DEFAULT_HONEYPOT_PREFIX: &str = "website_";

/// 随机后缀长度
const SUFFIX_LENGTH: usize = 8;

/// 蜜罐字段
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoneypotField {
    /// 随机化的字段名
    pub name: String,
    /// 字段值，初始为空
    pub value: String,
}

impl HoneypotField {
    /// 使用指定前缀生成
    pub fn with_prefix(prefix: &str) -> Self {
        Self {
            name: format!("{}{}", prefix, generate_random_base36(SUFFIX_LENGTH)),
            value: String::new(),
        }
    }

    /// 当前值是否表明自动化提交
    pub fn is_filled(&self) -> bool {
        is_honeypot_filled(&self.value)
    }
}

/// 生成新的蜜罐字段，每次打开表单调用一次
///
/// ```rust
/// use formguard::security::honeypot::create_honeypot_field;
///
/// let field = create_honeypot_field();
/// assert!(field.name.starts_with("website_"));
/// assert!(field.value.is_empty());
/// ```
pub fn create_honeypot_field() -> HoneypotField {
    HoneypotField::with_prefix(DEFAULT_HONEYPOT_PREFIX)
}

/// 蜜罐是否被填写（去除空白后非空）
pub fn is_honeypot_filled(value: &str) -> bool {
    !value.trim().is_empty()
}
