//! # Minicache
//!
//! A small memoization library with two independent pieces:
//!
//! - a process-wide key-value cache with an enabled switch, scoped overrides
//!   and a memoizing wrapper (`#[this]`)
//! - per-instance method caches (`#[cached]` on types deriving `Cacheable`)
//!
//! ## Features
//!
//! - **Global switch**: disable the whole cache for tests or debugging, or
//!   only within a block with [`temporarily_disabled`]
//! - **Thread-safe**: every operation takes a `parking_lot` lock; memoized
//!   bodies run outside of it, so recursion is fine
//! - **Per-object memoization**: method results live with the object and die with it
//! - **Optional statistics**: hit/miss counters behind the `stats` feature
//!
//! ## Quick Start
//!
//! ```rust
//! use minicache::this;
//!
//! #[this]
//! fn fibonacci(n: u64) -> u64 {
//!     if n <= 1 {
//!         return n;
//!     }
//!     fibonacci(n - 1) + fibonacci(n - 2)
//! }
//!
//! assert_eq!(fibonacci(60), 1_548_008_755_920);
//! assert!(minicache::has("fibonacci(60){}"));
//! ```
//!
//! ## Key-Value Access
//!
//! ```rust
//! minicache::set("greeting", String::from("hello"));
//! assert_eq!(minicache::get::<String>("greeting").as_deref(), Some("hello"));
//!
//! minicache::temporarily_disabled(|| {
//!     assert!(!minicache::has("greeting"));
//!     minicache::set("ignored", 1);
//! });
//! assert!(!minicache::has("ignored"));
//! assert!(minicache::has("greeting"));
//! ```
//!
//! ## Caching with Methods
//!
//! ```rust
//! use minicache::{cached, Cacheable, MemberCache};
//!
//! #[derive(Default, Cacheable)]
//! struct Report {
//!     cache: MemberCache,
//!     rows: Vec<u32>,
//! }
//!
//! impl Report {
//!     #[cached]
//!     fn total(&self) -> u64 {
//!         self.rows.iter().map(|&r| u64::from(r)).sum()
//!     }
//!
//!     #[cached]
//!     fn find(&self, row: u32) -> Option<usize> {
//!         self.rows.iter().position(|&r| r == row)
//!     }
//! }
//!
//! let report = Report { rows: vec![3, 4, 5], ..Default::default() };
//! assert_eq!(report.total(), 12);
//! assert_eq!(report.find(4), Some(1));
//! assert_eq!(report.find(9), None);
//! report.clear_cache();
//! ```
//!
//! Method caches ignore the global switch; they are cleared per object with
//! [`Cacheable::clear_cache`].

pub use minicache_core::*;
pub use minicache_macros::{cached, this, Cacheable};

// Path used by macro-generated code, so callers only depend on this crate
#[doc(hidden)]
pub use minicache_core as __core;

/// Returns the process-wide cache.
///
/// The free functions of this crate all delegate to it.
pub fn global() -> &'static GlobalCache {
    GlobalCache::global()
}

/// Returns the current options of the process-wide cache.
pub fn options() -> CacheOptions {
    global().options()
}

/// Turns operation logging of the process-wide cache on or off.
pub fn set_debug(debug: bool) {
    global().set_debug(debug)
}

/// Returns true iff `key` is stored in the process-wide cache and it is enabled.
///
/// # Examples
///
/// ```rust
/// assert!(!minicache::has("has?"));
/// minicache::set("has?", "now");
/// assert!(minicache::has("has?"));
/// ```
pub fn has(key: impl ToArg) -> bool {
    global().has(key)
}

/// Stores `value` under `key`. Does nothing while the cache is disabled.
pub fn set<V>(key: impl ToArg, value: V)
where
    V: std::any::Any + Send + Sync,
{
    global().set(key, value)
}

/// Returns a clone of the value stored under `key`, if any.
///
/// # Examples
///
/// ```rust
/// assert_eq!(minicache::get::<&str>("get!"), None);
/// minicache::set("get!", "got");
/// assert_eq!(minicache::get::<&str>("get!"), Some("got"));
/// ```
pub fn get<V>(key: impl ToArg) -> Option<V>
where
    V: Clone + 'static,
{
    global().get(key)
}

/// Returns the value stored under `key`, or `default`.
pub fn get_or<V>(key: impl ToArg, default: V) -> V
where
    V: Clone + 'static,
{
    global().get_or(key, default)
}

/// Removes `key` from the process-wide cache, or everything when `key` is `None`.
///
/// See [`GlobalCache::clear`] for how absent keys are treated.
///
/// # Examples
///
/// ```rust
/// minicache::set("clear!", "now");
/// minicache::set("don't!", "yet");
///
/// minicache::clear(Some(&"clear!"));
/// assert!(!minicache::has("clear!"));
/// assert!(minicache::has("don't!"));
///
/// minicache::clear(None);
/// assert!(!minicache::has("don't!"));
/// ```
pub fn clear(key: Option<&dyn ToArg>) {
    global().clear(key)
}

/// (Re)enables the process-wide cache.
pub fn enable() {
    global().enable()
}

/// Disables the process-wide cache, clearing it first when `clear_cache` is true.
///
/// # Examples
///
/// ```rust
/// minicache::set("disable!", "me");
/// minicache::disable(true);
/// assert!(!minicache::has("disable!"));
/// minicache::enable();
/// assert!(!minicache::has("disable!"));
/// ```
pub fn disable(clear_cache: bool) {
    global().disable(clear_cache)
}

/// Runs `f` with the process-wide cache disabled, restoring the previous
/// state afterwards (even if `f` panics).
pub fn temporarily_disabled<T, F>(f: F) -> T
where
    F: FnOnce() -> T,
{
    global().temporarily_disabled(f)
}

/// Runs `f` with the process-wide cache enabled, restoring the previous
/// state afterwards (even if `f` panics).
pub fn temporarily_enabled<T, F>(f: F) -> T
where
    F: FnOnce() -> T,
{
    global().temporarily_enabled(f)
}

/// Wraps `func` so its results are memoized in the process-wide cache.
///
/// The closure form of `#[this]`, for when an attribute cannot be used.
///
/// # Errors
///
/// [`CacheError::EmptyName`] when `name` is empty.
///
/// # Examples
///
/// ```rust
/// let double = minicache::this("double", |(x,): (i32,)| x * 2).unwrap();
/// assert_eq!(double.call((21,)), 42);
/// assert!(minicache::has("double(21){}"));
/// ```
pub fn this<A, R, F>(name: impl Into<String>, func: F) -> Result<Memoized<A, F>>
where
    A: Arguments,
    F: Fn(A) -> R,
    R: Clone + Send + Sync + 'static,
{
    global().this(name, func)
}
