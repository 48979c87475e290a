//! 安全随机数生成模块
//!
//! 提供密码学安全的随机数生成功能，用于生成 CSRF token、蜜罐字段名后缀等数据。

use rand::{Rng, TryRngCore, rngs::OsRng};

use crate::error::{CryptoError, Error, Result};

/// 蜜罐后缀使用的字符集（小写 base36）
const BASE36_LOWER: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// 生成指定长度的随机字节数组
///
/// 使用操作系统提供的密码学安全随机数生成器 (CSPRNG)
///
/// # Example
///
/// ```rust
/// use formguard::random::generate_random_bytes;
///
/// let bytes = generate_random_bytes(32).unwrap();
/// assert_eq!(bytes.len(), 32);
/// ```
pub fn generate_random_bytes(length: usize) -> Result<Vec<u8>> {
    let mut bytes = vec![0u8; length];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| Error::Crypto(CryptoError::RngFailed(format!("{:?}", e))))?;
    Ok(bytes)
}

/// 生成指定长度的十六进制随机字符串
///
/// 最终字符串长度为字节数的两倍。
///
/// ```rust
/// use formguard::random::generate_random_hex;
///
/// let hex = generate_random_hex(16).unwrap();
/// assert_eq!(hex.len(), 32);
/// ```
pub fn generate_random_hex(byte_length: usize) -> Result<String> {
    let bytes = generate_random_bytes(byte_length)?;
    Ok(hex_encode(&bytes))
}

/// 生成 CSRF token
///
/// 32 字节随机数据，编码为 64 个小写十六进制字符。每次打开表单时重新生成。
///
/// ```rust
/// use formguard::random::generate_csrf_token;
///
/// let token = generate_csrf_token().unwrap();
/// assert_eq!(token.len(), 64);
/// assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
/// ```
pub fn generate_csrf_token() -> Result<String> {
    generate_random_hex(32)
}

/// 生成小写 base36 随机字符串
///
/// 用于蜜罐字段名后缀，不要求密码学强度，但仍使用线程本地 CSPRNG。
pub fn generate_random_base36(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| BASE36_LOWER[rng.random_range(0..BASE36_LOWER.len())] as char)
        .collect()
}

/// 将字节数组编码为十六进制字符串
pub(crate) fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// 将十六进制字符串解码为字节数组
///
/// 长度为奇数或包含非十六进制字符（包括 `+` 号）时返回 `None`。
pub(crate) fn hex_decode(input: &str) -> Option<Vec<u8>> {
    if input.len() % 2 != 0 || !is_hex(input) {
        return None;
    }
    (0..input.len())
        .step_by(2)
        .map(|i| {
            input
                .get(i..i + 2)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
        })
        .collect()
}

/// 非空且只包含十六进制数字
///
/// `from_str_radix` 接受前导 `+`，解析前先用它过滤。
pub(crate) fn is_hex(input: &str) -> bool {
    !input.is_empty() && input.bytes().all(|b| b.is_ascii_hexdigit())
}

/// 常量时间比较两个字节切片
///
/// 用于防止时序攻击
///
/// ```rust
/// use formguard::random::constant_time_compare;
///
/// assert!(constant_time_compare(b"secret_token", b"secret_token"));
/// assert!(!constant_time_compare(b"secret_token", b"other_token!"));
/// ```
pub fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    use subtle::ConstantTimeEq;
    a.ct_eq(b).into()
}

/// 常量时间比较两个字符串
pub fn constant_time_compare_str(a: &str, b: &str) -> bool {
    constant_time_compare(a.as_bytes(), b.as_bytes())
}
