//! Call key construction for memoized computations
//!
//! A [`CallKey`] is built from the scope a call was issued from, its positional
//! arguments and its keyword arguments. Building a key is fallible: values that
//! cannot be compared for equality in a stable way (unordered containers, NaN
//! floats) are rejected with a [`KeyError`] so the caller can fall back to an
//! uncached call.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt::{self, Debug};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use thiserror::Error;

/// Errors raised while turning call arguments into a cache key
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("unhashable type '{type_name}': {reason}")]
    Unhashable {
        type_name: &'static str,
        reason: String,
    },
}

impl KeyError {
    pub fn unhashable(type_name: &'static str, reason: impl Into<String>) -> Self {
        Self::Unhashable {
            type_name,
            reason: reason.into(),
        }
    }
}

/// Identity of an owning scope (an object instance)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(u64);

impl ScopeId {
    /// Allocates a process-unique scope identity
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scope#{}", self.0)
    }
}

/// Types whose instances can call request-bound memoized computations.
///
/// The returned identity becomes part of every call key so that two instances
/// sharing one request cache never read each other's results.
pub trait MemoScope {
    fn scope_id(&self) -> ScopeId;
}

/// One keyable component of a call key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyPart {
    Unit,
    Bool(bool),
    Int(i128),
    /// Bit pattern of a non-NaN float, with `-0.0` folded into `0.0`
    Float(u64),
    Char(char),
    Str(String),
    Bytes(Vec<u8>),
    Opt(Option<Box<KeyPart>>),
    Seq(Vec<KeyPart>),
    /// Entries of an ordered map, in key order
    Map(Vec<(KeyPart, KeyPart)>),
    Scope(ScopeId),
}

/// Conversion of a single argument value into a [`KeyPart`]
pub trait ToKeyPart {
    fn to_key_part(&self) -> Result<KeyPart, KeyError>;
}

macro_rules! int_key_part {
    ($($ty:ty),*) => {
        $(
            impl ToKeyPart for $ty {
                fn to_key_part(&self) -> Result<KeyPart, KeyError> {
                    Ok(KeyPart::Int(*self as i128))
                }
            }
        )*
    };
}

int_key_part!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

fn float_key_part(value: f64, type_name: &'static str) -> Result<KeyPart, KeyError> {
    if value.is_nan() {
        return Err(KeyError::unhashable(type_name, "NaN is not equal to itself"));
    }

    let normalized = if value == 0.0 { 0.0 } else { value };
    Ok(KeyPart::Float(normalized.to_bits()))
}

impl ToKeyPart for f64 {
    fn to_key_part(&self) -> Result<KeyPart, KeyError> {
        float_key_part(*self, "f64")
    }
}

impl ToKeyPart for f32 {
    fn to_key_part(&self) -> Result<KeyPart, KeyError> {
        float_key_part(f64::from(*self), "f32")
    }
}

impl ToKeyPart for () {
    fn to_key_part(&self) -> Result<KeyPart, KeyError> {
        Ok(KeyPart::Unit)
    }
}

impl ToKeyPart for bool {
    fn to_key_part(&self) -> Result<KeyPart, KeyError> {
        Ok(KeyPart::Bool(*self))
    }
}

impl ToKeyPart for char {
    fn to_key_part(&self) -> Result<KeyPart, KeyError> {
        Ok(KeyPart::Char(*self))
    }
}

impl ToKeyPart for str {
    fn to_key_part(&self) -> Result<KeyPart, KeyError> {
        Ok(KeyPart::Str(self.to_string()))
    }
}

impl ToKeyPart for String {
    fn to_key_part(&self) -> Result<KeyPart, KeyError> {
        Ok(KeyPart::Str(self.clone()))
    }
}

impl ToKeyPart for ScopeId {
    fn to_key_part(&self) -> Result<KeyPart, KeyError> {
        Ok(KeyPart::Scope(*self))
    }
}

impl<T: ToKeyPart + ?Sized> ToKeyPart for &T {
    fn to_key_part(&self) -> Result<KeyPart, KeyError> {
        (**self).to_key_part()
    }
}

impl<T: ToKeyPart + ?Sized> ToKeyPart for Box<T> {
    fn to_key_part(&self) -> Result<KeyPart, KeyError> {
        (**self).to_key_part()
    }
}

impl<T: ToKeyPart + ?Sized> ToKeyPart for Arc<T> {
    fn to_key_part(&self) -> Result<KeyPart, KeyError> {
        (**self).to_key_part()
    }
}

impl<T: ToKeyPart + ?Sized> ToKeyPart for Rc<T> {
    fn to_key_part(&self) -> Result<KeyPart, KeyError> {
        (**self).to_key_part()
    }
}

impl<T: ToKeyPart> ToKeyPart for Option<T> {
    fn to_key_part(&self) -> Result<KeyPart, KeyError> {
        match self {
            Some(value) => Ok(KeyPart::Opt(Some(Box::new(value.to_key_part()?)))),
            None => Ok(KeyPart::Opt(None)),
        }
    }
}

impl<T: ToKeyPart> ToKeyPart for [T] {
    fn to_key_part(&self) -> Result<KeyPart, KeyError> {
        self.iter()
            .map(ToKeyPart::to_key_part)
            .collect::<Result<Vec<_>, _>>()
            .map(KeyPart::Seq)
    }
}

impl<T: ToKeyPart, const N: usize> ToKeyPart for [T; N] {
    fn to_key_part(&self) -> Result<KeyPart, KeyError> {
        self.as_slice().to_key_part()
    }
}

impl<T: ToKeyPart> ToKeyPart for Vec<T> {
    fn to_key_part(&self) -> Result<KeyPart, KeyError> {
        self.as_slice().to_key_part()
    }
}

impl<T: ToKeyPart> ToKeyPart for BTreeSet<T> {
    fn to_key_part(&self) -> Result<KeyPart, KeyError> {
        self.iter()
            .map(ToKeyPart::to_key_part)
            .collect::<Result<Vec<_>, _>>()
            .map(KeyPart::Seq)
    }
}

impl<K: ToKeyPart, V: ToKeyPart> ToKeyPart for BTreeMap<K, V> {
    fn to_key_part(&self) -> Result<KeyPart, KeyError> {
        self.iter()
            .map(|(k, v)| Ok((k.to_key_part()?, v.to_key_part()?)))
            .collect::<Result<Vec<_>, KeyError>>()
            .map(KeyPart::Map)
    }
}

impl<K, V, S> ToKeyPart for HashMap<K, V, S> {
    fn to_key_part(&self) -> Result<KeyPart, KeyError> {
        Err(KeyError::unhashable(
            "HashMap",
            "unordered container has no stable key",
        ))
    }
}

impl<T, S> ToKeyPart for HashSet<T, S> {
    fn to_key_part(&self) -> Result<KeyPart, KeyError> {
        Err(KeyError::unhashable(
            "HashSet",
            "unordered container has no stable key",
        ))
    }
}

impl ToKeyPart for serde_json::Value {
    fn to_key_part(&self) -> Result<KeyPart, KeyError> {
        use serde_json::Value;

        match self {
            Value::Null => Ok(KeyPart::Unit),
            Value::Bool(b) => Ok(KeyPart::Bool(*b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(KeyPart::Int(i as i128))
                } else if let Some(u) = n.as_u64() {
                    Ok(KeyPart::Int(u as i128))
                } else {
                    float_key_part(n.as_f64().unwrap_or(f64::NAN), "serde_json::Number")
                }
            }
            Value::String(s) => Ok(KeyPart::Str(s.clone())),
            Value::Array(items) => items.as_slice().to_key_part(),
            Value::Object(_) => Err(KeyError::unhashable(
                "serde_json::Map",
                "JSON objects are mutable mappings",
            )),
        }
    }
}

macro_rules! tuple_key_part {
    ($($name:ident),+) => {
        impl<$($name: ToKeyPart),+> ToKeyPart for ($($name,)+) {
            #[allow(non_snake_case)]
            fn to_key_part(&self) -> Result<KeyPart, KeyError> {
                let ($($name,)+) = self;
                Ok(KeyPart::Seq(vec![$($name.to_key_part()?),+]))
            }
        }
    };
}

tuple_key_part!(A);
tuple_key_part!(A, B);
tuple_key_part!(A, B, C);
tuple_key_part!(A, B, C, D);

/// Accumulates the positional and keyword parts of a call key
#[derive(Debug, Default)]
pub struct KeyBuilder {
    args: Vec<KeyPart>,
    kwargs: BTreeMap<String, KeyPart>,
}

impl KeyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a positional argument
    pub fn arg<T: ToKeyPart + ?Sized>(&mut self, value: &T) -> Result<&mut Self, KeyError> {
        self.args.push(value.to_key_part()?);
        Ok(self)
    }

    /// Adds a keyword argument; the keyword set is order-insensitive
    pub fn kwarg<T: ToKeyPart + ?Sized>(
        &mut self,
        name: impl Into<String>,
        value: &T,
    ) -> Result<&mut Self, KeyError> {
        self.kwargs.insert(name.into(), value.to_key_part()?);
        Ok(self)
    }

    pub fn build(self, scope: Option<ScopeId>) -> CallKey {
        CallKey {
            scope,
            args: self.args,
            kwargs: self.kwargs,
        }
    }
}

/// Argument lists accepted by memoized computations.
///
/// Tuples map to positional arguments. Structs with named fields implement
/// this by hand and usually emit keyword arguments:
///
/// ```rust
/// use scoped_memo::domain::memoize::{KeyArgs, KeyBuilder, KeyError};
///
/// #[derive(Debug)]
/// struct Search {
///     term: String,
///     limit: Option<u32>,
/// }
///
/// impl KeyArgs for Search {
///     fn write_key(&self, key: &mut KeyBuilder) -> Result<(), KeyError> {
///         key.kwarg("term", &self.term)?.kwarg("limit", &self.limit)?;
///         Ok(())
///     }
/// }
/// ```
pub trait KeyArgs: Debug {
    fn write_key(&self, key: &mut KeyBuilder) -> Result<(), KeyError>;
}

impl KeyArgs for () {
    fn write_key(&self, _key: &mut KeyBuilder) -> Result<(), KeyError> {
        Ok(())
    }
}

macro_rules! tuple_key_args {
    ($($name:ident),+) => {
        impl<$($name: ToKeyPart + Debug),+> KeyArgs for ($($name,)+) {
            #[allow(non_snake_case)]
            fn write_key(&self, key: &mut KeyBuilder) -> Result<(), KeyError> {
                let ($($name,)+) = self;
                $(key.arg($name)?;)+
                Ok(())
            }
        }
    };
}

tuple_key_args!(A);
tuple_key_args!(A, B);
tuple_key_args!(A, B, C);
tuple_key_args!(A, B, C, D);
tuple_key_args!(A, B, C, D, E);
tuple_key_args!(A, B, C, D, E, F);

/// Composite lookup key of one memoized call
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallKey {
    scope: Option<ScopeId>,
    args: Vec<KeyPart>,
    kwargs: BTreeMap<String, KeyPart>,
}

impl CallKey {
    /// Builds the key of a call; fails when an argument is unkeyable
    pub fn new<A: KeyArgs + ?Sized>(scope: Option<ScopeId>, args: &A) -> Result<Self, KeyError> {
        let mut builder = KeyBuilder::new();
        args.write_key(&mut builder)?;
        Ok(builder.build(scope))
    }

    /// Key of an argument-less call (property reads)
    pub fn for_scope(scope: ScopeId) -> Self {
        Self {
            scope: Some(scope),
            args: Vec::new(),
            kwargs: BTreeMap::new(),
        }
    }

    pub fn scope(&self) -> Option<ScopeId> {
        self.scope
    }

    pub fn args(&self) -> &[KeyPart] {
        &self.args
    }

    pub fn kwargs(&self) -> &BTreeMap<String, KeyPart> {
        &self.kwargs
    }
}

/// Sources of call keys handed to an [`Entry`](super::Entry)
pub trait ToCallKey: Debug {
    fn to_call_key(&self) -> Result<CallKey, KeyError>;
}

impl ToCallKey for CallKey {
    fn to_call_key(&self) -> Result<CallKey, KeyError> {
        Ok(self.clone())
    }
}

/// Arguments of one call together with the scope issuing it
pub struct ScopedCall<'a, A: ?Sized> {
    pub scope: Option<ScopeId>,
    pub args: &'a A,
}

impl<'a, A: ?Sized> ScopedCall<'a, A> {
    pub fn new(scope: Option<ScopeId>, args: &'a A) -> Self {
        Self { scope, args }
    }
}

impl<A: Debug + ?Sized> Debug for ScopedCall<'_, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.scope {
            Some(scope) => write!(f, "({}, {:?})", scope, self.args),
            None => write!(f, "{:?}", self.args),
        }
    }
}

impl<A: KeyArgs + ?Sized> ToCallKey for ScopedCall<'_, A> {
    fn to_call_key(&self) -> Result<CallKey, KeyError> {
        CallKey::new(self.scope, self.args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Search {
        term: String,
        limit: Option<u32>,
    }

    impl KeyArgs for Search {
        fn write_key(&self, key: &mut KeyBuilder) -> Result<(), KeyError> {
            key.kwarg("term", &self.term)?;

            if let Some(limit) = &self.limit {
                key.kwarg("limit", limit)?;
            }

            Ok(())
        }
    }

    #[test]
    fn test_same_arguments_produce_equal_keys() {
        let scope = ScopeId::next();
        let a = CallKey::new(Some(scope), &(1u32, "alpha".to_string())).unwrap();
        let b = CallKey::new(Some(scope), &(1u32, "alpha".to_string())).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_different_scopes_produce_distinct_keys() {
        let a = CallKey::new(Some(ScopeId::next()), &(1u32,)).unwrap();
        let b = CallKey::new(Some(ScopeId::next()), &(1u32,)).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_positional_order_matters() {
        let a = CallKey::new(None, &(1u8, 2u8)).unwrap();
        let b = CallKey::new(None, &(2u8, 1u8)).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_keyword_set_is_order_insensitive() {
        let mut first = KeyBuilder::new();
        first.kwarg("a", &1).unwrap().kwarg("b", &2).unwrap();

        let mut second = KeyBuilder::new();
        second.kwarg("b", &2).unwrap().kwarg("a", &1).unwrap();

        assert_eq!(first.build(None), second.build(None));
    }

    #[test]
    fn test_keyword_presence_changes_key() {
        let with_limit = Search {
            term: "db".to_string(),
            limit: Some(10),
        };
        let without_limit = Search {
            term: "db".to_string(),
            limit: None,
        };

        let a = CallKey::new(None, &with_limit).unwrap();
        let b = CallKey::new(None, &without_limit).unwrap();

        assert_ne!(a, b);
        assert_eq!(a.kwargs().len(), 2);
        assert_eq!(b.kwargs().len(), 1);
    }

    #[test]
    fn test_hash_map_argument_is_unkeyable() {
        let mut map = HashMap::new();
        map.insert("k", 1);

        let err = CallKey::new(None, &(map,)).unwrap_err();
        assert!(matches!(err, KeyError::Unhashable { type_name: "HashMap", .. }));
    }

    #[test]
    fn test_nan_is_unkeyable() {
        let err = CallKey::new(None, &(f64::NAN,)).unwrap_err();
        assert!(err.to_string().contains("NaN"));
    }

    #[test]
    fn test_negative_zero_folds_into_zero() {
        assert_eq!((-0.0f64).to_key_part(), 0.0f64.to_key_part());
    }

    #[test]
    fn test_btree_map_is_keyable() {
        let mut map = BTreeMap::new();
        map.insert("b", 2);
        map.insert("a", 1);

        let part = map.to_key_part().unwrap();
        assert_eq!(
            part,
            KeyPart::Map(vec![
                (KeyPart::Str("a".to_string()), KeyPart::Int(1)),
                (KeyPart::Str("b".to_string()), KeyPart::Int(2)),
            ])
        );
    }

    #[test]
    fn test_option_none_differs_from_unit() {
        assert_ne!(None::<()>.to_key_part().unwrap(), ().to_key_part().unwrap());
    }

    #[test]
    fn test_json_object_is_unkeyable() {
        let value = serde_json::json!({"a": 1});
        assert!(value.to_key_part().is_err());

        let array = serde_json::json!([1, "two", null]);
        assert!(array.to_key_part().is_ok());
    }

    #[test]
    fn test_scoped_call_debug_shows_scope_and_args() {
        let scope = ScopeId::next();
        let args = (7u32,);
        let call = ScopedCall::new(Some(scope), &args);

        let rendered = format!("{:?}", call);
        assert!(rendered.contains(&scope.to_string()));
        assert!(rendered.contains('7'));
    }
}
