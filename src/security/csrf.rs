//! CSRF (跨站请求伪造) 防护模块
//!
//! 两层能力：
//!
//! - [`generate_csrf_token`]：每次打开表单生成的 64 位十六进制随机 token，随表单提交。
//!   这个 token 本身没有服务端绑定，只能算纵深防御。
//! - [`CsrfProtection`]：需要真正校验时使用。token 由 HMAC-SHA256 签名，并绑定到
//!   调用方提供的值（例如 session ID），带有效期，常量时间比较。
//!
//! ## 基本用法
//!
//! ```rust
//! use formguard::security::csrf::{CsrfConfig, CsrfProtection};
//!
//! let csrf = CsrfProtection::new(CsrfConfig::with_secret(b"my-secret-key-at-least-32-bytes!"));
//!
//! let token = csrf.generate_token("session-42").unwrap();
//! assert!(csrf.verify(&token.token, "session-42").unwrap());
//! assert!(!csrf.verify(&token.token, "session-43").unwrap());
//! ```

use chrono::{DateTime, TimeDelta, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::sync::Arc;
use std::time::Duration;

use crate::clock::{Clock, SystemClock, add_saturating};
use crate::error::{CryptoError, Error, Result, ValidationError};
use crate::random::{
    constant_time_compare, generate_random_bytes, hex_decode, hex_encode, is_hex,
};

pub use crate::random::generate_csrf_token;

type HmacSha256 = Hmac<Sha256>;

/// 随机部分长度（字节）
const NONCE_LENGTH: usize = 16;

/// 密钥最小长度（字节）
const MIN_SECRET_LENGTH: usize = 32;

fn malformed() -> Error {
    Error::Validation(ValidationError::Malformed("csrf token".to_string()))
}

/// CSRF 配置
#[derive(Clone)]
pub struct CsrfConfig {
    /// 用于签名的密钥
    secret: Vec<u8>,
    /// Token 有效期
    ttl: Duration,
}

impl std::fmt::Debug for CsrfConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CsrfConfig")
            .field("secret", &"<redacted>")
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl CsrfConfig {
    /// 使用随机生成的密钥
    pub fn generate() -> Result<Self> {
        Ok(Self::with_secret(&generate_random_bytes(MIN_SECRET_LENGTH)?))
    }

    /// 使用指定密钥，默认有效期 1 小时
    pub fn with_secret(secret: &[u8]) -> Self {
        Self {
            secret: secret.to_vec(),
            ttl: Duration::from_secs(3600),
        }
    }

    /// 设置 token 有效期
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// 有效期
    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

/// 已签名的 CSRF Token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrfToken {
    /// 完整的 token 字符串（`nonce.issued_at.signature`）
    pub token: String,
    /// 签发时间
    pub issued_at: DateTime<Utc>,
    /// 过期时间
    pub expires_at: DateTime<Utc>,
}

/// CSRF 防护器
pub struct CsrfProtection {
    config: CsrfConfig,
    clock: Arc<dyn Clock>,
}

impl CsrfProtection {
    /// 创建新的 CSRF 防护器
    pub fn new(config: CsrfConfig) -> Self {
        Self {
            config,
            clock: Arc::new(SystemClock),
        }
    }

    /// 指定时间源
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// 生成绑定到 `binding` 的 token
    pub fn generate_token(&self, binding: &str) -> Result<CsrfToken> {
        let nonce = generate_random_bytes(NONCE_LENGTH)?;
        let issued_at = self.clock.now();
        let issued_secs = issued_at.timestamp();

        let signature = self.sign(&nonce, issued_secs, binding)?;
        let token = format!(
            "{}.{:x}.{}",
            hex_encode(&nonce),
            issued_secs,
            hex_encode(&signature)
        );

        Ok(CsrfToken {
            token,
            issued_at,
            expires_at: add_saturating(issued_at, self.config.ttl),
        })
    }

    /// 校验 token，格式错误、过期或签名不符时返回 `Ok(false)`
    pub fn verify(&self, token: &str, binding: &str) -> Result<bool> {
        match self.verify_and_decode(token, binding) {
            Ok(_) => Ok(true),
            Err(Error::Validation(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// 校验 token 并返回解析结果
    pub fn verify_and_decode(&self, token: &str, binding: &str) -> Result<CsrfToken> {
        let mut parts = token.split('.');
        let (Some(nonce_hex), Some(issued_hex), Some(sig_hex), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(malformed());
        };

        let nonce = hex_decode(nonce_hex).ok_or_else(malformed)?;
        let provided = hex_decode(sig_hex).ok_or_else(malformed)?;
        if !is_hex(issued_hex) {
            return Err(Error::validation("invalid csrf token timestamp"));
        }
        let issued_secs = i64::from_str_radix(issued_hex, 16)
            .map_err(|_| Error::validation("invalid csrf token timestamp"))?;
        let issued_at = DateTime::<Utc>::from_timestamp(issued_secs, 0)
            .ok_or_else(|| Error::validation("invalid csrf token timestamp"))?;

        let expires_at = add_saturating(issued_at, self.config.ttl);
        let now = self.clock.now();
        if now > expires_at || issued_at - now > TimeDelta::seconds(60) {
            return Err(Error::validation("csrf token expired"));
        }

        let expected = self.sign(&nonce, issued_secs, binding)?;
        if !constant_time_compare(&provided, &expected) {
            return Err(Error::validation("csrf token signature mismatch"));
        }

        Ok(CsrfToken {
            token: token.to_string(),
            issued_at,
            expires_at,
        })
    }

    /// 计算 HMAC 签名
    fn sign(&self, nonce: &[u8], issued_secs: i64, binding: &str) -> Result<Vec<u8>> {
        let mut mac = HmacSha256::new_from_slice(&self.config.secret)
            .map_err(|e| Error::Crypto(CryptoError::InvalidKey(e.to_string())))?;

        mac.update(nonce);
        mac.update(&issued_secs.to_be_bytes());
        mac.update(&(binding.len() as u64).to_be_bytes());
        mac.update(binding.as_bytes());

        Ok(mac.finalize().into_bytes().to_vec())
    }
}
