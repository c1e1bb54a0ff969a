use std::any::{type_name, Any};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::keys::{Arg, Arguments, CallArgs, ToArg};
use crate::{CacheError, CacheOptions, Result};

#[cfg(feature = "stats")]
use crate::CacheStats;

type StoredValue = Arc<dyn Any + Send + Sync>;

/// Emits a `log::debug!` record when the cache's debug option is on.
macro_rules! trace_op {
    ($cache:expr, $($arg:tt)+) => {
        if $cache.is_debug() {
            log::debug!($($arg)+);
        }
    };
}

static GLOBAL: Lazy<GlobalCache> = Lazy::new(|| {
    let options = CacheOptions::from_env().unwrap_or_else(|err| {
        log::warn!("ignoring minicache environment configuration: {}", err);
        CacheOptions::default()
    });
    GlobalCache::new(options)
});

struct CacheState {
    store: HashMap<Arg, StoredValue>,
    enabled: bool,
}

struct Inner {
    state: Mutex<CacheState>,
    debug: AtomicBool,
    #[cfg(feature = "stats")]
    stats: CacheStats,
}

/// A key-value memoization cache guarded by an enabled flag.
///
/// `GlobalCache` is a handle: clones share the same store and flag. The
/// process-wide instance is [`GlobalCache::global`]; independent instances
/// can be built with [`GlobalCache::new`] and passed to whoever needs them,
/// which keeps tests isolated from each other.
///
/// # Enabled flag
///
/// While disabled the cache behaves as if it were empty and read-only:
///
/// - [`has`](Self::has) reports `false`
/// - [`set`](Self::set) does nothing
/// - [`get`](Self::get) returns `None` (and [`get_or`](Self::get_or) the default)
/// - [`clear`](Self::clear) does nothing
///
/// Disabling never wipes the store by itself. [`disable`](Self::disable)
/// clears before flipping the flag only when asked to, and entries kept
/// across a disable become visible again after [`enable`](Self::enable).
///
/// # Keys and values
///
/// Keys are anything implementing [`ToArg`]. Values are any
/// `Send + Sync + 'static` type; reads name the type they expect and a
/// stored value of another type reads as absent (see [`try_get`](Self::try_get)
/// to tell the two apart).
///
/// # Thread Safety
///
/// The store and the enabled flag sit behind a single `parking_lot::Mutex`,
/// so each operation observes a consistent flag and store. Nothing spans two
/// operations: a `has` followed by a `get` may see different states if
/// another thread disables the cache in between. The lock is never held
/// while a memoized function runs.
///
/// # Examples
///
/// ```
/// use minicache_core::{CacheOptions, GlobalCache};
///
/// let cache = GlobalCache::new(CacheOptions::default());
///
/// cache.set("answer", 42);
/// assert!(cache.has("answer"));
/// assert_eq!(cache.get::<i32>("answer"), Some(42));
///
/// cache.disable(false);
/// assert!(!cache.has("answer"));
/// assert_eq!(cache.get_or("answer", 0), 0);
///
/// cache.enable();
/// assert_eq!(cache.get::<i32>("answer"), Some(42));
/// ```
#[derive(Clone)]
pub struct GlobalCache {
    inner: Arc<Inner>,
}

impl GlobalCache {
    /// Creates an empty cache configured by `options`.
    pub fn new(options: CacheOptions) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(CacheState {
                    store: HashMap::new(),
                    enabled: options.enabled,
                }),
                debug: AtomicBool::new(options.debug),
                #[cfg(feature = "stats")]
                stats: CacheStats::new(),
            }),
        }
    }

    /// Returns the process-wide cache.
    ///
    /// It is created empty on first use, configured from `MINICACHE_ENABLED`
    /// and `MINICACHE_DEBUG` (see [`CacheOptions::from_env`]). An invalid
    /// environment is logged as a warning and the defaults are used.
    pub fn global() -> &'static GlobalCache {
        &GLOBAL
    }

    /// Current options. `enabled` reflects any active override.
    pub fn options(&self) -> CacheOptions {
        CacheOptions {
            enabled: self.is_enabled(),
            debug: self.is_debug(),
        }
    }

    /// Whether the cache currently observes and mutates its store.
    pub fn is_enabled(&self) -> bool {
        self.inner.state.lock().enabled
    }

    /// Whether operations are logged at debug level.
    pub fn is_debug(&self) -> bool {
        self.inner.debug.load(Ordering::Relaxed)
    }

    /// Turns per-operation debug logging on or off. Has no effect on caching.
    pub fn set_debug(&self, debug: bool) {
        self.inner.debug.store(debug, Ordering::Relaxed);
    }

    /// Number of stored entries, including ones hidden while disabled.
    pub fn len(&self) -> usize {
        self.inner.state.lock().store.len()
    }

    /// True when nothing is stored, hidden entries included.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Hit/miss counters of this cache.
    #[cfg(feature = "stats")]
    pub fn stats(&self) -> &CacheStats {
        &self.inner.stats
    }

    /// Returns true iff `key` is stored and the cache is enabled.
    pub fn has(&self, key: impl ToArg) -> bool {
        let key = key.to_arg();
        trace_op!(self, "has({})", key);
        let state = self.inner.state.lock();
        state.enabled && state.store.contains_key(&key)
    }

    /// Stores `value` under `key`, replacing any previous value.
    /// Does nothing while disabled.
    pub fn set<V>(&self, key: impl ToArg, value: V)
    where
        V: Any + Send + Sync,
    {
        let key = key.to_arg();
        trace_op!(self, "set({}, <{}>)", key, type_name::<V>());
        let mut state = self.inner.state.lock();
        if !state.enabled {
            return;
        }
        state.store.insert(key, Arc::new(value));
    }

    /// Returns a clone of the value stored under `key`.
    ///
    /// `None` when the cache is disabled, the key is absent, or the stored
    /// value is not a `V`.
    pub fn get<V>(&self, key: impl ToArg) -> Option<V>
    where
        V: Clone + 'static,
    {
        let key = key.to_arg();
        trace_op!(self, "get({})", key);
        let value = self.lookup(&key).and_then(|stored| downcast::<V>(&stored));
        self.record(value.is_some());
        value
    }

    /// Like [`get`](Self::get), falling back to `default`.
    ///
    /// A stored value equal to `default` is indistinguishable from a miss.
    pub fn get_or<V>(&self, key: impl ToArg, default: V) -> V
    where
        V: Clone + 'static,
    {
        self.get(key).unwrap_or(default)
    }

    /// Like [`get`](Self::get), but a stored value of another type is an error.
    ///
    /// # Errors
    ///
    /// [`CacheError::TypeMismatch`] when `key` holds something other than a `V`.
    ///
    /// ```
    /// use minicache_core::{CacheError, GlobalCache};
    ///
    /// let cache = GlobalCache::default();
    /// cache.set("name", String::from("minicache"));
    ///
    /// assert_eq!(cache.try_get::<String>("name"), Ok(Some("minicache".to_string())));
    /// assert_eq!(cache.try_get::<String>("missing"), Ok(None));
    /// assert!(matches!(
    ///     cache.try_get::<u32>("name"),
    ///     Err(CacheError::TypeMismatch { .. })
    /// ));
    /// ```
    pub fn try_get<V>(&self, key: impl ToArg) -> Result<Option<V>>
    where
        V: Clone + 'static,
    {
        let key = key.to_arg();
        trace_op!(self, "get({})", key);
        let result = match self.lookup(&key) {
            Some(stored) => match downcast::<V>(&stored) {
                Some(value) => Ok(Some(value)),
                None => Err(CacheError::TypeMismatch {
                    key: key.to_string(),
                    expected: type_name::<V>(),
                }),
            },
            None => Ok(None),
        };
        self.record(matches!(result, Ok(Some(_))));
        result
    }

    /// Removes one entry, or everything.
    ///
    /// Does nothing while disabled. With `Some(key)`:
    ///
    /// - a stored `key` is removed and nothing else is touched;
    /// - an absent `key` that is falsy (see [`Arg::is_falsy`]) clears the whole store;
    /// - any other absent `key` is ignored.
    ///
    /// With `None` the whole store is cleared.
    ///
    /// ```
    /// use minicache_core::GlobalCache;
    ///
    /// let cache = GlobalCache::default();
    /// cache.set("a", 1);
    /// cache.set("b", 2);
    ///
    /// cache.clear(Some(&"a"));
    /// assert!(!cache.has("a"));
    /// assert!(cache.has("b"));
    ///
    /// cache.clear(None);
    /// assert!(cache.is_empty());
    /// ```
    pub fn clear(&self, key: Option<&dyn ToArg>) {
        let key = key.map(|k| k.to_arg());
        match &key {
            Some(key) => trace_op!(self, "clear({})", key),
            None => trace_op!(self, "clear(None)"),
        }

        let mut state = self.inner.state.lock();
        if !state.enabled {
            return;
        }
        if let Some(key) = key {
            if state.store.remove(&key).is_some() || !key.is_falsy() {
                return;
            }
        }
        state.store.clear();
    }

    /// (Re)enables the cache.
    pub fn enable(&self) {
        trace_op!(self, "enable!");
        self.inner.state.lock().enabled = true;
    }

    /// Disables the cache, first clearing it when `clear_cache` is true.
    ///
    /// The clear follows [`clear`](Self::clear) rules, so disabling an
    /// already disabled cache leaves its entries in place.
    pub fn disable(&self, clear_cache: bool) {
        trace_op!(self, "disable clear_cache({})", clear_cache);
        let mut state = self.inner.state.lock();
        if clear_cache && state.enabled {
            state.store.clear();
        }
        state.enabled = false;
    }

    /// Forces the enabled flag until the returned guard is dropped.
    ///
    /// The guard restores the flag that was in effect when it was created,
    /// whatever happened in between, including a panic unwinding through it.
    /// Guards nest: each restores its own saved value.
    ///
    /// ```
    /// use minicache_core::GlobalCache;
    ///
    /// let cache = GlobalCache::default();
    /// {
    ///     let _off = cache.override_enabled(false);
    ///     assert!(!cache.is_enabled());
    ///     {
    ///         let _on = cache.override_enabled(true);
    ///         assert!(cache.is_enabled());
    ///     }
    ///     assert!(!cache.is_enabled());
    /// }
    /// assert!(cache.is_enabled());
    /// ```
    pub fn override_enabled(&self, enabled: bool) -> OverrideGuard<'_> {
        let previous = {
            let mut state = self.inner.state.lock();
            std::mem::replace(&mut state.enabled, enabled)
        };
        trace_op!(self, "override enabled({}) from ({})", enabled, previous);
        OverrideGuard {
            cache: self,
            previous,
        }
    }

    /// Runs `f` with the cache disabled, then restores the previous flag.
    ///
    /// ```
    /// use minicache_core::GlobalCache;
    ///
    /// let cache = GlobalCache::default();
    /// cache.temporarily_disabled(|| cache.set("temp", "disable"));
    /// assert!(!cache.has("temp"));
    /// ```
    pub fn temporarily_disabled<T, F>(&self, f: F) -> T
    where
        F: FnOnce() -> T,
    {
        let _guard = self.override_enabled(false);
        f()
    }

    /// Runs `f` with the cache enabled, then restores the previous flag.
    ///
    /// ```
    /// use minicache_core::GlobalCache;
    ///
    /// let cache = GlobalCache::default();
    /// cache.temporarily_disabled(|| {
    ///     cache.temporarily_enabled(|| cache.set("temp", "enabled"));
    /// });
    /// assert!(cache.has("temp"));
    /// ```
    pub fn temporarily_enabled<T, F>(&self, f: F) -> T
    where
        F: FnOnce() -> T,
    {
        let _guard = self.override_enabled(true);
        f()
    }

    /// Wraps `func` so its results are memoized in this cache.
    ///
    /// Each call is keyed on `name` followed by the rendered arguments, e.g.
    /// `fib(10){}`. Keys are plain text: arguments that render identically,
    /// such as `1` and `"1"`, share a slot. While the cache is disabled every
    /// call runs `func` and nothing is stored.
    ///
    /// # Errors
    ///
    /// [`CacheError::EmptyName`] when `name` is empty.
    ///
    /// # Examples
    ///
    /// ```
    /// use minicache_core::GlobalCache;
    /// use std::sync::atomic::{AtomicUsize, Ordering};
    ///
    /// let cache = GlobalCache::default();
    /// let calls = AtomicUsize::new(0);
    ///
    /// let square = cache
    ///     .this("square", |(x,): (i64,)| {
    ///         calls.fetch_add(1, Ordering::SeqCst);
    ///         x * x
    ///     })
    ///     .unwrap();
    ///
    /// assert_eq!(square.call((4,)), 16);
    /// assert_eq!(square.call((4,)), 16);
    /// assert_eq!(calls.load(Ordering::SeqCst), 1);
    /// assert!(cache.has("square(4){}"));
    /// ```
    pub fn this<A, R, F>(&self, name: impl Into<String>, func: F) -> Result<Memoized<A, F>>
    where
        A: Arguments,
        F: Fn(A) -> R,
        R: Clone + Send + Sync + 'static,
    {
        let name = name.into();
        if name.is_empty() {
            return Err(CacheError::EmptyName);
        }
        Ok(Memoized {
            cache: self.clone(),
            name,
            func,
            _args: PhantomData,
        })
    }

    /// Looks up the memoized result for `name` called with `args`, running
    /// `compute` and storing its result on a miss.
    ///
    /// This is the primitive behind [`this`](Self::this) and the `#[this]`
    /// attribute.
    pub fn memoize_call<R, F>(&self, name: &str, args: &CallArgs, compute: F) -> R
    where
        R: Clone + Send + Sync + 'static,
        F: FnOnce() -> R,
    {
        let key = Arg::Str(memo_key(name, args));
        trace_op!(self, "this({})", key);

        if let Some(value) = self.lookup(&key).and_then(|stored| downcast::<R>(&stored)) {
            self.record(true);
            return value;
        }
        self.record(false);

        let value = compute();
        self.set(key, value.clone());
        value
    }

    fn lookup(&self, key: &Arg) -> Option<StoredValue> {
        let state = self.inner.state.lock();
        if !state.enabled {
            return None;
        }
        state.store.get(key).cloned()
    }

    #[cfg(feature = "stats")]
    fn record(&self, hit: bool) {
        self.inner.stats.record(hit);
    }

    #[cfg(not(feature = "stats"))]
    fn record(&self, _hit: bool) {}

    fn restore_enabled(&self, previous: bool) {
        self.inner.state.lock().enabled = previous;
        trace_op!(self, "restore enabled({})", previous);
    }
}

impl Default for GlobalCache {
    fn default() -> Self {
        Self::new(CacheOptions::default())
    }
}

impl fmt::Debug for GlobalCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("GlobalCache")
            .field("enabled", &state.enabled)
            .field("debug", &self.is_debug())
            .field("entries", &state.store.len())
            .finish()
    }
}

fn downcast<V: Clone + 'static>(stored: &StoredValue) -> Option<V> {
    (**stored).downcast_ref::<V>().cloned()
}

fn memo_key(name: &str, args: &CallArgs) -> String {
    format!("{}{}", name, args)
}

/// Restores the cache's enabled flag when dropped.
///
/// Returned by [`GlobalCache::override_enabled`].
#[must_use = "the override ends as soon as the guard is dropped"]
pub struct OverrideGuard<'a> {
    cache: &'a GlobalCache,
    previous: bool,
}

impl OverrideGuard<'_> {
    /// The flag that will be restored.
    pub fn previous(&self) -> bool {
        self.previous
    }
}

impl Drop for OverrideGuard<'_> {
    fn drop(&mut self) {
        self.cache.restore_enabled(self.previous);
    }
}

/// A function whose results are memoized in a [`GlobalCache`].
///
/// Created by [`GlobalCache::this`].
pub struct Memoized<A, F> {
    cache: GlobalCache,
    name: String,
    func: F,
    _args: PhantomData<fn(A)>,
}

impl<A, F> Memoized<A, F>
where
    A: Arguments,
{
    /// Returns the memoized result for `args`, computing it on a miss.
    pub fn call<R>(&self, args: A) -> R
    where
        F: Fn(A) -> R,
        R: Clone + Send + Sync + 'static,
    {
        let call_args = args.to_call_args();
        self.cache
            .memoize_call(&self.name, &call_args, || (self.func)(args))
    }

    /// The key a call with `args` is stored under.
    pub fn cache_key(&self, args: &A) -> String {
        memo_key(&self.name, &args.to_call_args())
    }

    /// The key prefix of every call.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The cache results are stored in.
    pub fn cache(&self) -> &GlobalCache {
        &self.cache
    }
}

impl<A, F> fmt::Debug for Memoized<A, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memoized")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
