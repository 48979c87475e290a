//! 输入清理
//!
//! 纵深防御用的过滤器，不做结构化的 HTML 解析：
//!
//! 1. 去除首尾空白
//! 2. 删除 `<` 与 `>`
//! 3. 删除 `javascript:`（ASCII 不区分大小写）
//! 4. 删除形如 `on<word>=` 的事件处理器片段（ASCII 不区分大小写）
//! 5. 截断到 1000 个字符
//!
//! 第 2 到 4 步在一次从左到右的扫描中完成：每写入一个字符，就检查输出缓冲区的
//! 末尾是否刚好构成危险片段，是则立即删掉。删除后的缓冲区是之前某个干净状态的
//! 前缀，所以嵌套构造（如 `javajavascript:script:`）不会重新拼出危险片段，
//! 整个过程对输入长度是线性的。

use serde_json::Value;

/// 默认最大长度（字符数）
pub const MAX_INPUT_LENGTH: usize = 1000;

const JAVASCRIPT_SCHEME: &[u8] = b"javascript:";

/// 清理输入字符串
///
/// ```rust
/// use formguard::security::sanitize::sanitize_input;
///
/// assert_eq!(sanitize_input("  <b>Jane</b>  "), "bJane/b");
/// assert_eq!(sanitize_input("JavaScript:alert(1)"), "alert(1)");
/// assert_eq!(sanitize_input("x onClick=run()"), "x run()");
/// ```
pub fn sanitize_input(raw: &str) -> String {
    sanitize_input_with_limit(raw, MAX_INPUT_LENGTH)
}

/// 使用自定义长度上限清理输入
pub fn sanitize_input_with_limit(raw: &str, max_chars: usize) -> String {
    let mut scanner = Scanner::with_capacity(raw.len());
    for ch in raw.trim().chars() {
        scanner.push(ch);
    }
    truncate_chars(&scanner.out, max_chars)
}

/// 清理任意 JSON 值，非字符串一律返回空字符串
pub fn sanitize_value(value: &Value) -> String {
    match value {
        Value::String(s) => sanitize_input(s),
        _ => String::new(),
    }
}

// ============================================================================
// 单遍扫描
// ============================================================================

/// 输出缓冲区中一个字符的位置信息
#[derive(Debug, Clone, Copy)]
struct Slot {
    /// 字符在 `out` 中的字节偏移
    offset: usize,
    ch: char,
    /// 当前单词中最左边的 `on` 所在的字符下标
    on_start: Option<usize>,
}

/// 不变量：`out` 中从不包含危险片段
struct Scanner {
    out: String,
    slots: Vec<Slot>,
}

impl Scanner {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            out: String::with_capacity(capacity),
            slots: Vec::with_capacity(capacity),
        }
    }

    fn push(&mut self, ch: char) {
        match ch {
            '<' | '>' => {}
            ':' => {
                self.append(ch);
                if self.ends_with_javascript_scheme() {
                    self.truncate_to(self.slots.len() - JAVASCRIPT_SCHEME.len());
                }
            }
            '=' => match self.handler_start() {
                Some(start) => self.truncate_to(start),
                None => self.append(ch),
            },
            _ => self.append(ch),
        }
    }

    fn append(&mut self, ch: char) {
        let on_start = if is_word_char(ch) {
            match self.slots.last() {
                Some(last) if last.on_start.is_some() => last.on_start,
                Some(last)
                    if last.ch.eq_ignore_ascii_case(&'o') && ch.eq_ignore_ascii_case(&'n') =>
                {
                    Some(self.slots.len() - 1)
                }
                _ => None,
            }
        } else {
            None
        };

        self.slots.push(Slot {
            offset: self.out.len(),
            ch,
            on_start,
        });
        self.out.push(ch);
    }

    /// 缓冲区末尾加上 `=` 是否构成 `on<word>=`，返回要删除的起始字符下标
    ///
    /// `on` 之后至少要有一个单词字符。
    fn handler_start(&self) -> Option<usize> {
        let last = self.slots.last()?;
        let start = last.on_start?;
        (start + 2 < self.slots.len()).then_some(start)
    }

    fn ends_with_javascript_scheme(&self) -> bool {
        let bytes = self.out.as_bytes();
        bytes
            .len()
            .checked_sub(JAVASCRIPT_SCHEME.len())
            .is_some_and(|start| bytes[start..].eq_ignore_ascii_case(JAVASCRIPT_SCHEME))
    }

    /// 保留前 `len` 个字符
    fn truncate_to(&mut self, len: usize) {
        if let Some(slot) = self.slots.get(len) {
            self.out.truncate(slot.offset);
            self.slots.truncate(len);
        }
    }
}

fn is_word_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}

fn truncate_chars(input: &str, max_chars: usize) -> String {
    match input.char_indices().nth(max_chars) {
        Some((idx, _)) => input[..idx].to_string(),
        None => input.to_string(),
    }
}
