use std::env;

use crate::{CacheError, Result};

/// Environment variable holding the initial enabled flag of the process-wide cache.
pub const ENV_ENABLED: &str = "MINICACHE_ENABLED";

/// Environment variable turning on diagnostic logging for the process-wide cache.
pub const ENV_DEBUG: &str = "MINICACHE_DEBUG";

/// Configuration of a [`GlobalCache`](crate::GlobalCache).
///
/// # Fields
///
/// * `enabled` - Whether the cache observes and mutates its store (default `true`)
/// * `debug` - Whether every operation emits a `log::debug!` record (default `false`).
///   This only affects logging, never cache behavior.
///
/// # Examples
///
/// ```
/// use minicache_core::CacheOptions;
///
/// let options = CacheOptions::default();
/// assert!(options.enabled);
/// assert!(!options.debug);
///
/// let options = CacheOptions::default().with_debug(true).with_enabled(false);
/// assert!(options.debug);
/// assert!(!options.enabled);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheOptions {
    pub enabled: bool,
    pub debug: bool,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            debug: false,
        }
    }
}

impl CacheOptions {
    /// Returns a copy with the enabled flag replaced.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Returns a copy with the debug flag replaced.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Builds options from `MINICACHE_ENABLED` and `MINICACHE_DEBUG`.
    ///
    /// Unset variables keep their defaults. Accepted spellings are
    /// `1/true/yes/on` and `0/false/no/off`, case-insensitive.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::InvalidOption`] when a variable is set to anything else.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Builds options from an arbitrary variable lookup.
    ///
    /// This is what [`from_env`](Self::from_env) uses; it lets callers feed
    /// options from another source such as a parsed config file.
    ///
    /// ```
    /// use minicache_core::CacheOptions;
    ///
    /// let options = CacheOptions::from_lookup(|var| match var {
    ///     "MINICACHE_DEBUG" => Some("on".to_string()),
    ///     _ => None,
    /// })
    /// .unwrap();
    /// assert!(options.enabled);
    /// assert!(options.debug);
    /// ```
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let enabled = match lookup(ENV_ENABLED) {
            Some(value) => parse_flag(ENV_ENABLED, &value)?,
            None => defaults.enabled,
        };
        let debug = match lookup(ENV_DEBUG) {
            Some(value) => parse_flag(ENV_DEBUG, &value)?,
            None => defaults.debug,
        };
        Ok(Self { enabled, debug })
    }
}

fn parse_flag(var: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(CacheError::InvalidOption {
            var: var.to_string(),
            value: value.to_string(),
        }),
    }
}
