//! 远程错误分类：把服务端错误码映射为客户端可执行的语义。
//!
//! Remote error classification.
//!
//! The remote service reports failures as `ORA-nnnnn` errors. The client only
//! acts on a handful of them (drop-and-recreate on "already exists", forced
//! drop tolerating "does not exist", invalid listing patterns), so they are
//! folded into [`RemoteErrorKind`].
//!
//! ## Classification order
//!
//! | Step | Input | Notes |
//! |------|-------|-------|
//! | 1 | kind pinned by the gateway | [`crate::RemoteError::with_kind`] |
//! | 2 | structured error number | [`RemoteErrorKind::from_code`] |
//! | 3 | `ORA-nnnnn` prefix in the message | parsed, then step 2 |
//! | 4 | message substrings | last resort |
//!
//! ## Example
//!
//! ```rust
//! use select_ai_rust::error_code::{classify, RemoteErrorKind};
//!
//! assert_eq!(classify(Some(955), "name is already used"), RemoteErrorKind::AlreadyExists);
//! assert_eq!(classify(None, "ORA-12725: unmatched parentheses"), RemoteErrorKind::InvalidPattern);
//! assert_eq!(classify(None, "Profile P does not exist"), RemoteErrorKind::DoesNotExist);
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

static ORA_CODE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"ORA-(\d{5})").ok());

/// What a remote failure means to the reconciliation logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteErrorKind {
    /// ORA-00955 and service-specific "already exists" errors
    AlreadyExists,
    /// ORA-04043 and service-specific "does not exist" errors
    DoesNotExist,
    /// ORA-12725..=ORA-12733: malformed regular expression
    InvalidPattern,
    /// Anything the client does not act on
    Other,
}

impl RemoteErrorKind {
    /// Maps a structured error number to a kind.
    pub fn from_code(code: i32) -> Option<Self> {
        let kind = match code {
            955 => Self::AlreadyExists,
            4043 => Self::DoesNotExist,
            12725..=12733 => Self::InvalidPattern,
            _ => return None,
        };
        Some(kind)
    }

    /// Substring fallback for services that raise application errors with free text.
    pub fn from_message(message: &str) -> Self {
        let lowered = message.to_ascii_lowercase();
        if lowered.contains("already exists") {
            Self::AlreadyExists
        } else if lowered.contains("does not exist") {
            Self::DoesNotExist
        } else {
            Self::Other
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::AlreadyExists => "already_exists",
            Self::DoesNotExist => "does_not_exist",
            Self::InvalidPattern => "invalid_pattern",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for RemoteErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Extracts the first `ORA-nnnnn` number from a message.
pub fn parse_code(message: &str) -> Option<i32> {
    ORA_CODE
        .as_ref()?
        .captures(message)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Classifies a remote failure from its structured code and message.
pub fn classify(code: Option<i32>, message: &str) -> RemoteErrorKind {
    code.and_then(RemoteErrorKind::from_code)
        .or_else(|| parse_code(message).and_then(RemoteErrorKind::from_code))
        .unwrap_or_else(|| RemoteErrorKind::from_message(message))
}
