use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::keys::{ArgKey, Arguments, CallArgs};
use crate::{CacheError, Result};

#[cfg(feature = "stats")]
use crate::CacheStats;

type StoredValue = Arc<dyn Any + Send + Sync>;
type Slots = HashMap<ArgKey, StoredValue>;

/// Memoized results of one object's methods.
///
/// Each owning object embeds its own `MemberCache`; results are keyed first by
/// member name, then by the [`ArgKey`] derived from the call's arguments.
/// Nothing is ever evicted, and nothing is shared between objects: dropping the
/// owner drops its results.
///
/// There is no enabled flag at this level. Once a method is wrapped, it is
/// memoized.
///
/// # Null results
///
/// A `None` result is never retained (see
/// [`get_or_insert_option`](Self::get_or_insert_option)), so the next call with
/// the same arguments computes again.
///
/// # Thread Safety
///
/// The slots are behind a `parking_lot::Mutex` that is released while the
/// method body runs. Recursive memoized methods therefore work, and two
/// threads missing on the same key at once may both compute; the later store
/// wins.
///
/// # Examples
///
/// ```
/// use minicache_core::{CallArgs, MemberCache};
///
/// let cache = MemberCache::new();
/// let args = CallArgs::new().arg(&2).arg(&3);
///
/// assert_eq!(cache.get_or_insert_with("add", &args, || 2 + 3), 5);
/// // Not recomputed
/// assert_eq!(cache.get_or_insert_with("add", &args, || 0), 5);
/// ```
#[derive(Default)]
pub struct MemberCache {
    members: Mutex<HashMap<&'static str, Slots>>,
    #[cfg(feature = "stats")]
    stats: CacheStats,
}

impl MemberCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the stored result of `member` for `args`, or computes, stores
    /// and returns it.
    pub fn get_or_insert_with<R, F>(&self, member: &'static str, args: &CallArgs, compute: F) -> R
    where
        R: Clone + Send + Sync + 'static,
        F: FnOnce() -> R,
    {
        let key = args.key();
        if let Some(value) = self.lookup::<R>(member, &key) {
            return value;
        }

        let value = compute();
        self.store(member, key, value.clone());
        value
    }

    /// Like [`get_or_insert_with`](Self::get_or_insert_with) for members
    /// returning `Option`. A `None` result is returned but not stored.
    ///
    /// ```
    /// use minicache_core::{CallArgs, MemberCache};
    ///
    /// let cache = MemberCache::new();
    /// let args = CallArgs::new();
    ///
    /// assert_eq!(cache.get_or_insert_option("find", &args, || None::<u8>), None);
    /// assert!(!cache.contains("find", &args));
    ///
    /// assert_eq!(cache.get_or_insert_option("find", &args, || Some(1u8)), Some(1));
    /// assert_eq!(cache.get_or_insert_option("find", &args, || Some(2u8)), Some(1));
    /// ```
    pub fn get_or_insert_option<R, F>(
        &self,
        member: &'static str,
        args: &CallArgs,
        compute: F,
    ) -> Option<R>
    where
        R: Clone + Send + Sync + 'static,
        F: FnOnce() -> Option<R>,
    {
        let key = args.key();
        if let Some(value) = self.lookup::<R>(member, &key) {
            return Some(value);
        }

        let value = compute()?;
        self.store(member, key, value.clone());
        Some(value)
    }

    /// Returns true if a result for `member` called with `args` is stored.
    pub fn contains(&self, member: &str, args: &CallArgs) -> bool {
        let key = args.key();
        self.members
            .lock()
            .get(member)
            .is_some_and(|slots| slots.contains_key(&key))
    }

    /// Drops every stored result of every member.
    pub fn clear(&self) {
        self.members.lock().clear();
    }

    /// Drops the stored results of one member.
    pub fn clear_member(&self, member: &str) {
        self.members.lock().remove(member);
    }

    /// Number of stored results across all members.
    pub fn len(&self) -> usize {
        self.members.lock().values().map(HashMap::len).sum()
    }

    /// True when no member has a stored result.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Hit/miss counters across all members.
    #[cfg(feature = "stats")]
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    fn lookup<R: Clone + 'static>(&self, member: &'static str, key: &ArgKey) -> Option<R> {
        let stored = self
            .members
            .lock()
            .get(member)
            .and_then(|slots| slots.get(key))
            .cloned();
        let value = stored.and_then(|stored| (*stored).downcast_ref::<R>().cloned());

        #[cfg(feature = "stats")]
        self.stats.record(value.is_some());

        if value.is_none() {
            log::trace!("member cache miss: {} {:?}", member, key);
        }
        value
    }

    fn store<R: Send + Sync + 'static>(&self, member: &'static str, key: ArgKey, value: R) {
        self.members
            .lock()
            .entry(member)
            .or_default()
            .insert(key, Arc::new(value));
    }
}

impl fmt::Debug for MemberCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let members = self.members.lock();
        let mut names: Vec<&str> = members.keys().copied().collect();
        names.sort_unstable();
        f.debug_struct("MemberCache")
            .field("members", &names)
            .field("entries", &members.values().map(HashMap::len).sum::<usize>())
            .finish()
    }
}

/// Objects that memoize their own methods.
///
/// Implementors expose the [`MemberCache`] they own; methods wrapped with
/// `#[cached]` (or called through [`CachedMethod`]) store their results there.
/// `#[derive(Cacheable)]` implements this for a struct with a `MemberCache` field.
///
/// # Examples
///
/// ```
/// use minicache_core::{CallArgs, Cacheable, MemberCache};
///
/// struct Foo {
///     cache: MemberCache,
///     bar: i64,
/// }
///
/// impl Cacheable for Foo {
///     fn member_cache(&self) -> &MemberCache {
///         &self.cache
///     }
/// }
///
/// impl Foo {
///     fn doubled(&self) -> i64 {
///         self.member_cache()
///             .get_or_insert_with("doubled", &CallArgs::new(), || self.bar * 2)
///     }
/// }
///
/// let foo = Foo { cache: MemberCache::new(), bar: 5 };
/// assert_eq!(foo.doubled(), 10);
/// foo.clear_cache();
/// assert!(foo.member_cache().is_empty());
/// ```
pub trait Cacheable {
    fn member_cache(&self) -> &MemberCache;

    /// Drops every memoized result of this object. Other objects are untouched.
    fn clear_cache(&self) {
        self.member_cache().clear();
    }
}

/// Wraps `method` so its results are memoized per owning object under `member`.
///
/// # Errors
///
/// [`CacheError::EmptyMember`] when `member` is empty.
///
/// # Examples
///
/// ```
/// use minicache_core::{cached, Cacheable, MemberCache};
///
/// #[derive(Default)]
/// struct Counter {
///     cache: MemberCache,
/// }
///
/// impl Cacheable for Counter {
///     fn member_cache(&self) -> &MemberCache {
///         &self.cache
///     }
/// }
///
/// let add = cached("add", |_: &Counter, (a, b): (i32, i32)| a + b).unwrap();
///
/// let counter = Counter::default();
/// assert_eq!(add.call(&counter, (1, 2)), 3);
/// assert_eq!(counter.member_cache().len(), 1);
/// ```
pub fn cached<S, A, R, F>(member: &'static str, method: F) -> Result<CachedMethod<S, A, F>>
where
    S: Cacheable + ?Sized,
    A: Arguments,
    F: Fn(&S, A) -> R,
{
    if member.is_empty() {
        return Err(CacheError::EmptyMember);
    }
    Ok(CachedMethod {
        member,
        method,
        _marker: PhantomData,
    })
}

/// A method whose results are memoized in the owning object's [`MemberCache`].
///
/// Created by [`cached`].
pub struct CachedMethod<S: ?Sized, A, F> {
    member: &'static str,
    method: F,
    _marker: PhantomData<fn(&S, A)>,
}

impl<S, A, F> CachedMethod<S, A, F>
where
    S: Cacheable + ?Sized,
    A: Arguments,
{
    /// Returns `owner`'s memoized result for `args`, computing it on a miss.
    pub fn call<R>(&self, owner: &S, args: A) -> R
    where
        F: Fn(&S, A) -> R,
        R: Clone + Send + Sync + 'static,
    {
        let call_args = args.to_call_args();
        owner
            .member_cache()
            .get_or_insert_with(self.member, &call_args, || (self.method)(owner, args))
    }

    /// Like [`call`](Self::call) for methods returning `Option`; `None` is not stored.
    pub fn call_option<R>(&self, owner: &S, args: A) -> Option<R>
    where
        F: Fn(&S, A) -> Option<R>,
        R: Clone + Send + Sync + 'static,
    {
        let call_args = args.to_call_args();
        owner
            .member_cache()
            .get_or_insert_option(self.member, &call_args, || (self.method)(owner, args))
    }

    /// The member name results are stored under.
    pub fn member(&self) -> &'static str {
        self.member
    }
}
