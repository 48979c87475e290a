//! 密码强度检查模块
//!
//! 五条规则各计一分：长度至少 8、包含小写字母、包含大写字母、包含数字、
//! 包含特殊字符。得分不少于 4 即视为足够强。
//!
//! 登录表单不强制强度要求，此检查只用于注册或修改密码等场景。

use serde::Serialize;

/// 最小长度
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// 判定为有效所需的最低分数
pub const MIN_VALID_SCORE: u8 = 4;

/// 被视为特殊字符的集合
const SPECIAL_CHARS: &str = "!@#$%^&*(),.?\":{}|<>";

/// 密码规则，按反馈顺序排列
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PasswordRule {
    /// 长度至少 8 个字符
    MinLength,
    /// 至少一个小写字母
    Lowercase,
    /// 至少一个大写字母
    Uppercase,
    /// 至少一个数字
    Digit,
    /// 至少一个特殊字符
    Special,
}

impl PasswordRule {
    /// 全部规则，顺序即反馈顺序
    pub const ALL: [PasswordRule; 5] = [
        PasswordRule::MinLength,
        PasswordRule::Lowercase,
        PasswordRule::Uppercase,
        PasswordRule::Digit,
        PasswordRule::Special,
    ];

    /// 未满足该规则时的提示
    pub fn message(&self) -> &'static str {
        match self {
            PasswordRule::MinLength => "Password must be at least 8 characters long",
            PasswordRule::Lowercase => "Password must contain at least one lowercase letter",
            PasswordRule::Uppercase => "Password must contain at least one uppercase letter",
            PasswordRule::Digit => "Password must contain at least one number",
            PasswordRule::Special => "Password must contain at least one special character",
        }
    }

    fn is_met(&self, features: &PasswordFeatures) -> bool {
        match self {
            PasswordRule::MinLength => features.length >= MIN_PASSWORD_LENGTH,
            PasswordRule::Lowercase => features.has_lowercase,
            PasswordRule::Uppercase => features.has_uppercase,
            PasswordRule::Digit => features.has_digit,
            PasswordRule::Special => features.has_special,
        }
    }
}

/// 密码包含的特性
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PasswordFeatures {
    /// 字符数
    pub length: usize,
    /// 包含 ASCII 小写字母
    pub has_lowercase: bool,
    /// 包含 ASCII 大写字母
    pub has_uppercase: bool,
    /// 包含数字
    pub has_digit: bool,
    /// 包含特殊字符
    pub has_special: bool,
}

/// 密码强度检查结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PasswordCheck {
    /// 是否足够强
    pub is_valid: bool,
    /// 分数 (0-5)
    pub score: u8,
    /// 未满足的规则提示，按固定顺序
    pub feedback: Vec<String>,
    /// 未满足的规则
    #[serde(skip)]
    pub unmet: Vec<PasswordRule>,
}

/// 分析密码的特性
fn analyze_password(password: &str) -> PasswordFeatures {
    let mut features = PasswordFeatures {
        length: password.chars().count(),
        ..Default::default()
    };

    for c in password.chars() {
        if c.is_ascii_lowercase() {
            features.has_lowercase = true;
        }
        if c.is_ascii_uppercase() {
            features.has_uppercase = true;
        }
        if c.is_ascii_digit() {
            features.has_digit = true;
        }
        if is_special_char(c) {
            features.has_special = true;
        }
    }

    features
}

/// 检查字符是否为特殊字符
fn is_special_char(c: char) -> bool {
    SPECIAL_CHARS.contains(c)
}

/// 检查密码强度
///
/// # Example
///
/// ```rust
/// use formguard::password::validate_password_strength;
///
/// let check = validate_password_strength("Str0ng!pass");
/// assert!(check.is_valid);
/// assert_eq!(check.score, 5);
///
/// let check = validate_password_strength("weak");
/// assert!(!check.is_valid);
/// assert_eq!(check.feedback[0], "Password must be at least 8 characters long");
/// ```
pub fn validate_password_strength(password: &str) -> PasswordCheck {
    let features = analyze_password(password);

    let unmet: Vec<PasswordRule> = PasswordRule::ALL
        .iter()
        .copied()
        .filter(|rule| !rule.is_met(&features))
        .collect();

    let score = (PasswordRule::ALL.len() - unmet.len()) as u8;
    let feedback = unmet.iter().map(|r| r.message().to_string()).collect();

    PasswordCheck {
        is_valid: score >= MIN_VALID_SCORE,
        score,
        feedback,
        unmet,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analyze_password_basic() {
        let features = analyze_password("Test123!");

        assert!(features.has_lowercase);
        assert!(features.has_uppercase);
        assert!(features.has_digit);
        assert!(features.has_special);
        assert_eq!(features.length, 8);
    }

    #[test]
    fn test_non_ascii_letters_do_not_count() {
        let features = analyze_password("ÄÖÜäöü");
        assert!(!features.has_lowercase);
        assert!(!features.has_uppercase);
        assert_eq!(features.length, 6);
    }

    #[test]
    fn test_all_rules_met() {
        let check = validate_password_strength("Abcdef1!");
        assert_eq!(check.score, 5);
        assert!(check.is_valid);
        assert!(check.feedback.is_empty());
    }

    #[test]
    fn test_four_points_is_valid() {
        // 缺少特殊字符
        let check = validate_password_strength("Abcdefg1");
        assert_eq!(check.score, 4);
        assert!(check.is_valid);
        assert_eq!(check.unmet, vec![PasswordRule::Special]);
    }

    #[test]
    fn test_three_points_is_invalid() {
        let check = validate_password_strength("abcdefg1");
        assert_eq!(check.score, 3);
        assert!(!check.is_valid);
    }

    #[test]
    fn test_feedback_order_is_fixed() {
        let check = validate_password_strength("");
        assert_eq!(check.score, 0);
        assert_eq!(
            check.feedback,
            vec![
                "Password must be at least 8 characters long",
                "Password must contain at least one lowercase letter",
                "Password must contain at least one uppercase letter",
                "Password must contain at least one number",
                "Password must contain at least one special character",
            ]
        );
    }

    #[test]
    fn test_is_special_char() {
        for c in ['!', '@', '#', '$', '"', '{', '|', '<', '>'] {
            assert!(is_special_char(c), "{c} should be special");
        }
        for c in ['a', '1', ' ', '_', '-', '~'] {
            assert!(!is_special_char(c), "{c} should not be special");
        }
    }
}
