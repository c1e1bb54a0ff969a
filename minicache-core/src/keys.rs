//! Structured cache keys.
//!
//! Memoized calls are keyed on their arguments. Rather than hashing arbitrary
//! tuples, every argument is converted into an [`Arg`], a small value type with
//! well-defined equality, hashing and ordering. A whole call is captured as
//! [`CallArgs`] (positional values plus named values), from which the
//! per-instance key [`ArgKey`] and the textual key used by the global cache
//! are derived.

use std::collections::BTreeMap;
use std::fmt;

/// Bit pattern of an `f64`, so floats can take part in `Eq`/`Hash`/`Ord`.
///
/// Two floats are the same key iff their bits are identical, which means
/// `0.0` and `-0.0` are distinct and every `NaN` payload is its own key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FloatBits(u64);

impl FloatBits {
    pub fn new(value: f64) -> Self {
        Self(value.to_bits())
    }

    pub fn value(self) -> f64 {
        f64::from_bits(self.0)
    }
}

impl fmt::Debug for FloatBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.value())
    }
}

/// A single argument value as seen by the cache.
///
/// # Examples
///
/// ```
/// use minicache_core::{Arg, ToArg};
///
/// assert_eq!(42i32.to_arg(), Arg::Int(42));
/// assert_eq!("abc".to_arg(), Arg::Str("abc".to_string()));
/// assert_eq!(None::<u8>.to_arg(), Arg::Null);
///
/// // Rendering is what the global cache's `this` keys are built from
/// assert_eq!(vec![1u8, 2].to_arg().to_string(), "[1, 2]");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Arg {
    /// `()` or `None`.
    Null,
    Bool(bool),
    /// Any integer. Every width and signedness maps here, so `5u8` and
    /// `5i64` are the same key.
    Int(i128),
    Float(FloatBits),
    Char(char),
    Str(String),
    Seq(Vec<Arg>),
    /// Opaque rendering of a user-defined type.
    Key(String),
}

impl Arg {
    /// Creates an opaque key argument from a user-chosen rendering.
    ///
    /// ```
    /// use minicache_core::{Arg, ToArg};
    ///
    /// struct UserId(u64);
    ///
    /// impl ToArg for UserId {
    ///     fn to_arg(&self) -> Arg {
    ///         Arg::key(format!("user:{}", self.0))
    ///     }
    /// }
    ///
    /// assert_eq!(UserId(7).to_arg().to_string(), "user:7");
    /// ```
    pub fn key(rendered: impl Into<String>) -> Self {
        Arg::Key(rendered.into())
    }

    /// Creates a float argument.
    pub fn float(value: f64) -> Self {
        Arg::Float(FloatBits::new(value))
    }

    /// Returns true for values that count as "no key": `Null`, `false`, zero,
    /// and empty strings, sequences or keys.
    ///
    /// `GlobalCache::clear` treats an absent falsy key as a request to clear
    /// everything.
    pub fn is_falsy(&self) -> bool {
        match self {
            Arg::Null => true,
            Arg::Bool(b) => !b,
            Arg::Int(i) => *i == 0,
            Arg::Float(f) => f.value() == 0.0,
            Arg::Char(_) => false,
            Arg::Str(s) | Arg::Key(s) => s.is_empty(),
            Arg::Seq(items) => items.is_empty(),
        }
    }
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Null => f.write_str("None"),
            Arg::Bool(b) => write!(f, "{}", b),
            Arg::Int(i) => write!(f, "{}", i),
            Arg::Float(bits) => write!(f, "{}", bits.value()),
            Arg::Char(c) => write!(f, "{}", c),
            Arg::Str(s) | Arg::Key(s) => f.write_str(s),
            Arg::Seq(items) => {
                f.write_str("[")?;
                write_joined(f, items.iter())?;
                f.write_str("]")
            }
        }
    }
}

fn write_joined<'a, I>(f: &mut fmt::Formatter<'_>, items: I) -> fmt::Result
where
    I: Iterator<Item = &'a Arg>,
{
    for (i, item) in items.enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

/// Conversion of a value into a cache [`Arg`].
///
/// Implemented for the primitive types, strings, `Option`, `Vec`, slices and
/// references to any of those. Implement it for your own argument types,
/// typically through [`Arg::key`].
pub trait ToArg {
    fn to_arg(&self) -> Arg;
}

impl ToArg for Arg {
    fn to_arg(&self) -> Arg {
        self.clone()
    }
}

impl<T: ToArg + ?Sized> ToArg for &T {
    fn to_arg(&self) -> Arg {
        (**self).to_arg()
    }
}

impl ToArg for () {
    fn to_arg(&self) -> Arg {
        Arg::Null
    }
}

impl ToArg for bool {
    fn to_arg(&self) -> Arg {
        Arg::Bool(*self)
    }
}

impl ToArg for char {
    fn to_arg(&self) -> Arg {
        Arg::Char(*self)
    }
}

impl ToArg for str {
    fn to_arg(&self) -> Arg {
        Arg::Str(self.to_string())
    }
}

impl ToArg for String {
    fn to_arg(&self) -> Arg {
        Arg::Str(self.clone())
    }
}

impl ToArg for f32 {
    fn to_arg(&self) -> Arg {
        Arg::float(f64::from(*self))
    }
}

impl ToArg for f64 {
    fn to_arg(&self) -> Arg {
        Arg::float(*self)
    }
}

macro_rules! impl_to_arg_int {
    ($($t:ty),*) => {
        $(
            impl ToArg for $t {
                fn to_arg(&self) -> Arg {
                    Arg::Int(*self as i128)
                }
            }
        )*
    };
}

impl_to_arg_int!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl<T: ToArg> ToArg for Option<T> {
    fn to_arg(&self) -> Arg {
        match self {
            Some(value) => value.to_arg(),
            None => Arg::Null,
        }
    }
}

impl<T: ToArg> ToArg for [T] {
    fn to_arg(&self) -> Arg {
        Arg::Seq(self.iter().map(ToArg::to_arg).collect())
    }
}

impl<T: ToArg> ToArg for Vec<T> {
    fn to_arg(&self) -> Arg {
        self.as_slice().to_arg()
    }
}

/// The arguments of one call: positional values in order, named values by name.
///
/// # Examples
///
/// ```
/// use minicache_core::{ArgKey, CallArgs};
///
/// let args = CallArgs::new().arg(&1).arg(&"two").named("k", &4);
/// assert_eq!(args.to_string(), "(1, two){k: 4}");
///
/// assert_eq!(CallArgs::new().key(), ArgKey::Sentinel);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct CallArgs {
    positional: Vec<Arg>,
    named: BTreeMap<String, Arg>,
}

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a positional argument.
    pub fn arg<T: ToArg + ?Sized>(mut self, value: &T) -> Self {
        self.positional.push(value.to_arg());
        self
    }

    /// Adds a named argument. A repeated name replaces the earlier value.
    pub fn named<T: ToArg + ?Sized>(mut self, name: impl Into<String>, value: &T) -> Self {
        self.named.insert(name.into(), value.to_arg());
        self
    }

    pub fn positional(&self) -> &[Arg] {
        &self.positional
    }

    pub fn named_args(&self) -> &BTreeMap<String, Arg> {
        &self.named
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }

    /// Derives the structured per-instance key for these arguments.
    pub fn key(&self) -> ArgKey {
        ArgKey::from(self)
    }
}

/// Renders as `(a, b){k: v}`, the textual form used in global `this` keys.
///
/// Strings render without quotes, so `1` and `"1"` produce the same text.
impl fmt::Display for CallArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        write_joined(f, self.positional.iter())?;
        f.write_str("){")?;
        for (i, (name, value)) in self.named.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {}", name, value)?;
        }
        f.write_str("}")
    }
}

/// Per-instance memoization key.
///
/// Named values are held sorted by name, so the order in which they were
/// supplied never matters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArgKey {
    /// No arguments at all. Every argument-less call shares this slot.
    Sentinel,
    Positional(Vec<Arg>),
    Named(BTreeMap<String, Arg>),
    Both(Vec<Arg>, BTreeMap<String, Arg>),
}

impl From<&CallArgs> for ArgKey {
    fn from(args: &CallArgs) -> Self {
        match (args.positional.is_empty(), args.named.is_empty()) {
            (false, false) => ArgKey::Both(args.positional.clone(), args.named.clone()),
            (false, true) => ArgKey::Positional(args.positional.clone()),
            (true, false) => ArgKey::Named(args.named.clone()),
            (true, true) => ArgKey::Sentinel,
        }
    }
}

/// An argument pack that a memoized function accepts.
///
/// Implemented for `()`, tuples of up to eight [`ToArg`] values (all
/// positional), and [`CallArgs`] itself for calls that need named values.
pub trait Arguments {
    fn to_call_args(&self) -> CallArgs;
}

impl Arguments for () {
    fn to_call_args(&self) -> CallArgs {
        CallArgs::new()
    }
}

impl Arguments for CallArgs {
    fn to_call_args(&self) -> CallArgs {
        self.clone()
    }
}

macro_rules! impl_arguments_for_tuple {
    ($($ty:ident $var:ident),+) => {
        impl<$($ty: ToArg),+> Arguments for ($($ty,)+) {
            fn to_call_args(&self) -> CallArgs {
                let ($($var,)+) = self;
                CallArgs::new()$(.arg($var))+
            }
        }
    };
}

impl_arguments_for_tuple!(A a);
impl_arguments_for_tuple!(A a, B b);
impl_arguments_for_tuple!(A a, B b, C c);
impl_arguments_for_tuple!(A a, B b, C c, D d);
impl_arguments_for_tuple!(A a, B b, C c, D d, E e);
impl_arguments_for_tuple!(A a, B b, C c, D d, E e, F f);
impl_arguments_for_tuple!(A a, B b, C c, D d, E e, F f, G g);
impl_arguments_for_tuple!(A a, B b, C c, D d, E e, F f, G g, H h);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_derivation_variants() {
        assert_eq!(CallArgs::new().key(), ArgKey::Sentinel);

        let positional = CallArgs::new().arg(&1).arg(&2);
        assert_eq!(
            positional.key(),
            ArgKey::Positional(vec![Arg::Int(1), Arg::Int(2)])
        );

        let named = CallArgs::new().named("a", &3);
        let mut expected = BTreeMap::new();
        expected.insert("a".to_string(), Arg::Int(3));
        assert_eq!(named.key(), ArgKey::Named(expected.clone()));

        let both = CallArgs::new().arg(&1).named("a", &3);
        assert_eq!(both.key(), ArgKey::Both(vec![Arg::Int(1)], expected));
    }

    #[test]
    fn test_named_order_does_not_matter() {
        let first = CallArgs::new().named("a", &1).named("b", &2);
        let second = CallArgs::new().named("b", &2).named("a", &1);
        assert_eq!(first.key(), second.key());
        assert_eq!(first.to_string(), second.to_string());
    }

    #[test]
    fn test_named_values_are_part_of_key() {
        let a = CallArgs::new().named("k", &1);
        let b = CallArgs::new().named("k", &2);
        assert_ne!(a.key(), b.key());
    }

    #[test]
    fn test_repeated_name_overwrites() {
        let args = CallArgs::new().named("k", &1).named("k", &2);
        assert_eq!(args.named_args().len(), 1);
        assert_eq!(args.named_args()["k"], Arg::Int(2));
    }

    #[test]
    fn test_positional_differs_from_named() {
        let positional = CallArgs::new().arg(&1);
        let named = CallArgs::new().named("0", &1);
        assert_ne!(positional.key(), named.key());
    }

    #[test]
    fn test_structured_key_keeps_types_apart() {
        let number = CallArgs::new().arg(&1);
        let text = CallArgs::new().arg(&"1");
        assert_ne!(number.key(), text.key());
        // ...while the rendered form cannot tell them apart
        assert_eq!(number.to_string(), text.to_string());
    }

    #[test]
    fn test_rendering() {
        assert_eq!(CallArgs::new().to_string(), "(){}");
        assert_eq!(
            CallArgs::new()
                .arg(&"arg")
                .arg(&None::<i32>)
                .named("kwarg", &true)
                .to_string(),
            "(arg, None){kwarg: true}"
        );
        assert_eq!(Arg::float(1.5).to_string(), "1.5");
        assert_eq!(vec![vec![1u8], vec![]].to_arg().to_string(), "[[1], []]");
    }

    #[test]
    fn test_falsy() {
        assert!(Arg::Null.is_falsy());
        assert!(Arg::Bool(false).is_falsy());
        assert!(Arg::Int(0).is_falsy());
        assert!(Arg::float(0.0).is_falsy());
        assert!(Arg::Str(String::new()).is_falsy());
        assert!(Arg::Seq(vec![]).is_falsy());
        assert!(Arg::key("").is_falsy());

        assert!(!Arg::Bool(true).is_falsy());
        assert!(!Arg::Int(-1).is_falsy());
        assert!(!Arg::Char('\0').is_falsy());
        assert!(!"x".to_arg().is_falsy());
    }

    #[test]
    fn test_integer_width_does_not_matter() {
        assert_eq!(5usize.to_arg(), 5i32.to_arg());
        assert_eq!(0u8.to_arg(), 0i64.to_arg());
        assert_eq!(u64::MAX.to_arg(), Arg::Int(i128::from(u64::MAX)));
        assert_ne!((-1i8).to_arg(), u64::MAX.to_arg());
        assert_eq!(
            CallArgs::new().arg(&1u16).key(),
            CallArgs::new().arg(&1isize).key()
        );
    }

    #[test]
    fn test_float_bits() {
        assert_eq!(Arg::float(0.5), 0.5f64.to_arg());
        assert_ne!(Arg::float(0.0), Arg::float(-0.0));
        assert_eq!(Arg::float(f64::NAN), Arg::float(f64::NAN));
        assert_eq!(format!("{:?}", FloatBits::new(2.5)), "2.5");
    }

    #[test]
    fn test_tuple_arguments() {
        let args = (1u8, "x", 2.0f64).to_call_args();
        assert_eq!(
            args.positional(),
            &[Arg::Int(1), Arg::Str("x".to_string()), Arg::float(2.0)]
        );
        assert!(args.named_args().is_empty());
        assert!(().to_call_args().is_empty());
    }
}
