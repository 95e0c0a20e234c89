//! Behavior descriptors: how a `Dict` hashes, compares, copies and destroys
//! its keys and values.
//!
//! A descriptor parameterizes the generic container for one key/value
//! shape. Only `hash` and `compare_keys` must be supplied; duplication
//! defaults to storing what the caller handed over, and destruction
//! defaults to dropping it.

use crate::hash::{gen_case_hash, gen_hash, int_hash};
use core::hash::{BuildHasher, Hash};
use std::collections::hash_map::RandomState;

/// Payload of an entry: a pointer-like owned value or an inline integer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value<P> {
    Ptr(P),
    I64(i64),
    U64(u64),
}

impl<P> Value<P> {
    /// The value a freshly added raw entry carries until the caller fills it.
    pub const ZERO: Self = Value::U64(0);

    pub fn as_ptr(&self) -> Option<&P> {
        match self {
            Value::Ptr(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_ptr_mut(&mut self) -> Option<&mut P> {
        match self {
            Value::Ptr(p) => Some(p),
            _ => None,
        }
    }

    /// Reads an inline integer as signed; `U64` values are reinterpreted.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::I64(v) => Some(v),
            Value::U64(v) => Some(v as i64),
            Value::Ptr(_) => None,
        }
    }

    /// Reads an inline integer as unsigned; `I64` values are reinterpreted.
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            Value::U64(v) => Some(v),
            Value::I64(v) => Some(v as u64),
            Value::Ptr(_) => None,
        }
    }

    pub fn into_ptr(self) -> Option<P> {
        match self {
            Value::Ptr(p) => Some(p),
            _ => None,
        }
    }
}

/// Capability set parameterizing a `Dict<K, P, T>`.
///
/// `Context` is opaque caller data stored in the dictionary and handed to
/// every callback except `hash`.
pub trait DictType<K, P> {
    type Context;

    /// Hash of `key`. `seed` is the shared config's current hash seed;
    /// descriptors built on the byte hash should feed it through.
    fn hash(&self, key: &K, seed: u32) -> u64;

    fn compare_keys(&self, ctx: &Self::Context, a: &K, b: &K) -> bool;

    /// Turns the caller's key into the key the dictionary stores.
    fn dup_key(&self, _ctx: &Self::Context, key: K) -> K {
        key
    }

    /// Turns the caller's pointer value into the one the dictionary stores.
    /// Inline integer values never pass through here.
    fn dup_value(&self, _ctx: &Self::Context, value: P) -> P {
        value
    }

    /// Releases a stored key on delete and teardown.
    fn destroy_key(&self, _ctx: &Self::Context, _key: K) {}

    /// Releases a stored pointer value. Inline integer values are never
    /// passed here.
    fn destroy_value(&self, _ctx: &Self::Context, _value: P) {}
}

/// Descriptor for any `K: Hash + Eq`, hashed through a `BuildHasher`.
/// The config's hash seed does not apply.
#[derive(Debug, Clone, Default)]
pub struct StdHash<S = RandomState> {
    hasher: S,
}

impl<S> StdHash<S> {
    pub fn with_hasher(hasher: S) -> Self {
        Self { hasher }
    }
}

impl<K, P, S> DictType<K, P> for StdHash<S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    type Context = ();

    fn hash(&self, key: &K, _seed: u32) -> u64 {
        self.hasher.hash_one(key)
    }

    fn compare_keys(&self, _ctx: &(), a: &K, b: &K) -> bool {
        a == b
    }
}

/// `String` keys hashed with the seeded byte hash, compared exactly.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringCopyKeys;

impl<P> DictType<String, P> for StringCopyKeys {
    type Context = ();

    fn hash(&self, key: &String, seed: u32) -> u64 {
        u64::from(gen_hash(key.as_bytes(), seed))
    }

    fn compare_keys(&self, _ctx: &(), a: &String, b: &String) -> bool {
        a == b
    }

    fn dup_key(&self, _ctx: &(), mut key: String) -> String {
        key.shrink_to_fit();
        key
    }
}

/// `String` keys where ASCII case does not distinguish entries.
#[derive(Debug, Clone, Copy, Default)]
pub struct CaseInsensitiveKeys;

impl<P> DictType<String, P> for CaseInsensitiveKeys {
    type Context = ();

    fn hash(&self, key: &String, seed: u32) -> u64 {
        u64::from(gen_case_hash(key.as_bytes(), seed))
    }

    fn compare_keys(&self, _ctx: &(), a: &String, b: &String) -> bool {
        a.eq_ignore_ascii_case(b)
    }
}

/// `u32` keys spread with the integer mix hash.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntKeys;

impl<P> DictType<u32, P> for IntKeys {
    type Context = ();

    fn hash(&self, key: &u32, _seed: u32) -> u64 {
        u64::from(int_hash(*key))
    }

    fn compare_keys(&self, _ctx: &(), a: &u32, b: &u32) -> bool {
        a == b
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_accessors_match_variant() {
        let p: Value<&str> = Value::Ptr("x");
        assert_eq!(p.as_ptr(), Some(&"x"));
        assert_eq!(p.as_i64(), None);

        let s: Value<()> = Value::I64(-1);
        assert_eq!(s.as_i64(), Some(-1));
        assert_eq!(s.as_u64(), Some(u64::MAX));
        assert!(s.as_ptr().is_none());

        assert_eq!(Value::<()>::ZERO.as_u64(), Some(0));
    }

    #[test]
    fn case_insensitive_keys_agree_on_hash_and_equality() {
        let t = CaseInsensitiveKeys;
        let a = "Key".to_string();
        let b = "kEY".to_string();
        assert!(DictType::<String, ()>::compare_keys(&t, &(), &a, &b));
        assert_eq!(
            DictType::<String, ()>::hash(&t, &a, 1),
            DictType::<String, ()>::hash(&t, &b, 1)
        );
    }

    #[test]
    fn string_copy_keys_use_seed() {
        let t = StringCopyKeys;
        let k = "seeded".to_string();
        assert_ne!(
            DictType::<String, ()>::hash(&t, &k, 1),
            DictType::<String, ()>::hash(&t, &k, 2)
        );
    }

    #[test]
    fn std_hash_ignores_seed() {
        let t: StdHash = StdHash::default();
        let k = 17u64;
        assert_eq!(
            DictType::<u64, ()>::hash(&t, &k, 1),
            DictType::<u64, ()>::hash(&t, &k, 2)
        );
    }
}
