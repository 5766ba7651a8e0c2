//! Unified error taxonomy with stable wire codes for the capabilities registry.
//!
//! Every [`RegistryError`] carries an [`ErrorCode`] (a machine-readable,
//! stable tag that is also the wire-level `code` field), a human-readable
//! message, and arbitrary structured context for diagnostics. Only
//! [`ErrorCode::Internal`] is ever `retryable`.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable, machine-readable wire error code (`spec.md` §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Bad envelope params, failed validation, or a malformed capability reference.
    InvalidArgument,
    /// Oversize or malformed request envelope.
    InvalidRequest,
    /// The requested dispatcher method is not recognized.
    MethodNotFound,
    /// The referenced capability or version does not exist.
    NotFound,
    /// A tenant rule denied the request.
    Forbidden,
    /// The referenced registry alias is not known.
    UnknownAlias,
    /// A federated registry could not be reached or did not reply in time.
    RegistryUnavailable,
    /// Everything else — the only code that is retryable.
    InternalError,
}

impl ErrorCode {
    /// `true` only for [`ErrorCode::InternalError`].
    #[must_use]
    pub fn retryable(self) -> bool {
        matches!(self, ErrorCode::InternalError)
    }

    /// Stable `&'static str` representation (e.g. `"NOT_FOUND"`).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::InvalidArgument => "INVALID_ARGUMENT",
            ErrorCode::InvalidRequest => "INVALID_REQUEST",
            ErrorCode::MethodNotFound => "METHOD_NOT_FOUND",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::Forbidden => "FORBIDDEN",
            ErrorCode::UnknownAlias => "UNKNOWN_ALIAS",
            ErrorCode::RegistryUnavailable => "REGISTRY_UNAVAILABLE",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured registry error: `{code, message, details?, retryable}`.
///
/// This is both the in-process error type used throughout the core and,
/// via [`RegistryErrorDto`], the exact shape placed on the wire inside a
/// response envelope's `error` field.
#[derive(Debug, Clone)]
pub struct RegistryError {
    /// Machine-readable error code.
    pub code: ErrorCode,
    /// Human-readable description.
    pub message: String,
    /// Arbitrary structured context for diagnostics (not guaranteed stable).
    pub details: BTreeMap<String, serde_json::Value>,
}

impl RegistryError {
    /// Create a new error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: BTreeMap::new(),
        }
    }

    /// Attach a key-value diagnostic. Serialization failures are skipped silently.
    #[must_use]
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.details.insert(key.into(), v);
        }
        self
    }

    /// Shorthand for `ErrorCode::NotFound`.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    /// Shorthand for `ErrorCode::InvalidArgument`.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidArgument, message)
    }

    /// Shorthand for `ErrorCode::Forbidden`.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    /// Shorthand for `ErrorCode::InternalError`, wrapping an underlying cause's message.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// `true` only for [`ErrorCode::InternalError`].
    #[must_use]
    pub fn retryable(&self) -> bool {
        self.code.retryable()
    }

    /// Convert to the wire-serializable [`RegistryErrorDto`].
    #[must_use]
    pub fn to_dto(&self) -> RegistryErrorDto {
        RegistryErrorDto {
            code: self.code,
            message: self.message.clone(),
            details: if self.details.is_empty() {
                None
            } else {
                Some(self.details.clone())
            },
            retryable: self.retryable(),
        }
    }
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for RegistryError {}

/// Any repository or transport failure is mapped to [`ErrorCode::InternalError`].
impl From<anyhow::Error> for RegistryError {
    fn from(e: anyhow::Error) -> Self {
        RegistryError::internal(e.to_string())
    }
}

/// Serializable wire form of [`RegistryError`] — the response envelope's `error` field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryErrorDto {
    /// Machine-readable error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
    /// Structured context, omitted entirely when empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<BTreeMap<String, serde_json::Value>>,
    /// `true` only for `INTERNAL_ERROR`.
    pub retryable: bool,
}

impl From<&RegistryError> for RegistryErrorDto {
    fn from(e: &RegistryError) -> Self {
        e.to_dto()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_internal_is_retryable() {
        for code in [
            ErrorCode::InvalidArgument,
            ErrorCode::InvalidRequest,
            ErrorCode::MethodNotFound,
            ErrorCode::NotFound,
            ErrorCode::Forbidden,
            ErrorCode::UnknownAlias,
            ErrorCode::RegistryUnavailable,
        ] {
            assert!(!code.retryable(), "{code:?} must not be retryable");
        }
        assert!(ErrorCode::InternalError.retryable());
    }

    #[test]
    fn wire_codes_match_spec_strings() {
        assert_eq!(ErrorCode::InvalidArgument.as_str(), "INVALID_ARGUMENT");
        assert_eq!(ErrorCode::InvalidRequest.as_str(), "INVALID_REQUEST");
        assert_eq!(ErrorCode::MethodNotFound.as_str(), "METHOD_NOT_FOUND");
        assert_eq!(ErrorCode::NotFound.as_str(), "NOT_FOUND");
        assert_eq!(ErrorCode::Forbidden.as_str(), "FORBIDDEN");
        assert_eq!(ErrorCode::UnknownAlias.as_str(), "UNKNOWN_ALIAS");
        assert_eq!(
            ErrorCode::RegistryUnavailable.as_str(),
            "REGISTRY_UNAVAILABLE"
        );
        assert_eq!(ErrorCode::InternalError.as_str(), "INTERNAL_ERROR");
    }

    #[test]
    fn dto_omits_empty_details() {
        let err = RegistryError::not_found("no such capability");
        let dto = err.to_dto();
        let json = serde_json::to_value(&dto).unwrap();
        assert!(json.get("details").is_none());
        assert_eq!(json["code"], "NOT_FOUND");
        assert_eq!(json["retryable"], false);
    }

    #[test]
    fn dto_includes_details_when_present() {
        let err = RegistryError::forbidden("tenant denied").with_detail("major", 3);
        let dto = err.to_dto();
        let json = serde_json::to_value(&dto).unwrap();
        assert_eq!(json["details"]["major"], 3);
    }
}
