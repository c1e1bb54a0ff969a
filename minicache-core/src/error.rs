//! Error types for the cache.
//!
//! Cache operations themselves are total: unknown keys produce defaults and
//! clearing an absent key does nothing. `CacheError` only reports setup-time
//! precondition violations and explicitly checked access.

use thiserror::Error;

/// Result type for fallible cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;

/// Errors reported by the cache.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    /// A memoized function was given an empty name.
    ///
    /// The name is the first component of every key the wrapper produces,
    /// so an empty name would make unrelated functions share slots.
    #[error("memoized function name must not be empty")]
    EmptyName,

    /// A cached member was given an empty name.
    #[error("cached member name must not be empty")]
    EmptyMember,

    /// An environment variable held something other than a boolean.
    #[error("invalid value {value:?} for {var}: expected one of 1/0, true/false, yes/no, on/off")]
    InvalidOption { var: String, value: String },

    /// A stored value exists but is not of the requested type.
    #[error("cached value for {key} is not a {expected}")]
    TypeMismatch { key: String, expected: &'static str },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        assert_eq!(
            CacheError::EmptyName.to_string(),
            "memoized function name must not be empty"
        );

        let err = CacheError::InvalidOption {
            var: "MINICACHE_DEBUG".to_string(),
            value: "maybe".to_string(),
        };
        assert!(err.to_string().contains("MINICACHE_DEBUG"));
        assert!(err.to_string().contains("\"maybe\""));

        let err = CacheError::TypeMismatch {
            key: "answer".to_string(),
            expected: "alloc::string::String",
        };
        assert_eq!(
            err.to_string(),
            "cached value for answer is not a alloc::string::String"
        );
    }
}
