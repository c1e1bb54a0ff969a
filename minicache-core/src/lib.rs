//! # Minicache Core
//!
//! Core types for the minicache memoization library.
//!
//! Two independent components live here:
//!
//! - [`GlobalCache`] - a key-value store guarded by an enabled flag, with
//!   scoped overrides and a memoizing wrapper ([`GlobalCache::this`]). One
//!   instance is process-wide ([`GlobalCache::global`]); more can be created
//!   and injected where isolation matters.
//! - [`MemberCache`] + [`Cacheable`] - a per-object store of memoized method
//!   results, keyed by member name and call arguments ([`cached`]).
//!
//! ## Module Organization
//!
//! - [`keys`] - argument values ([`Arg`], [`ToArg`]) and call keys ([`CallArgs`], [`ArgKey`])
//! - `global_cache` - the process-wide cache and its enabled-flag state machine
//! - `member_cache` - per-instance method memoization
//! - `options` - [`CacheOptions`] and environment configuration
//! - `error` - [`CacheError`]
//!
//! ## Features
//!
//! - `stats` (default) - hit/miss counters ([`CacheStats`]) on both caches
mod error;
mod global_cache;
mod member_cache;
mod options;

pub mod keys;

#[cfg(feature = "stats")]
mod stats;

pub use error::{CacheError, Result};
pub use global_cache::{GlobalCache, Memoized, OverrideGuard};
pub use keys::{Arg, ArgKey, Arguments, CallArgs, FloatBits, ToArg};
pub use member_cache::{cached, CachedMethod, Cacheable, MemberCache};
pub use options::{CacheOptions, ENV_DEBUG, ENV_ENABLED};

#[cfg(feature = "stats")]
pub use stats::CacheStats;
