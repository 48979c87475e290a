//! 密码相关功能
//!
//! 目前只包含强度检查。
//!
//! ```rust
//! use formguard::password::validate_password_strength;
//!
//! let result = validate_password_strength("weak");
//! assert!(!result.is_valid);
//!
//! let result = validate_password_strength("Str0ng_P@ssword!");
//! assert!(result.is_valid);
//! ```

pub mod strength;

pub use strength::{PasswordCheck, PasswordFeatures, PasswordRule, validate_password_strength};
