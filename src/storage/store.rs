use bytes::Bytes;
use std::collections::{HashMap, HashSet, VecDeque};
use thiserror::Error;

/// Operation applied to a key holding a different kind of value.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
pub struct WrongType;

/// Tag of a stored value's kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Str,
    List,
    Set,
    Hash,
}

/// A stored value, owned outright by its key-space entry.
///
/// Only `Str` is produced by client commands today; the other variants
/// exist so list/set/hash support extends the tag set without touching
/// the key-space contract.
#[derive(Debug, Clone)]
pub enum Value {
    Str(Bytes),
    List(VecDeque<Bytes>),
    Set(HashSet<Bytes>),
    Hash(HashMap<Bytes, Bytes>),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Str(_) => ValueKind::Str,
            Value::List(_) => ValueKind::List,
            Value::Set(_) => ValueKind::Set,
            Value::Hash(_) => ValueKind::Hash,
        }
    }
}

/// The key space: binary-safe keys mapped to tagged values.
///
/// All access happens on the reactor thread, so no locking is needed.
/// A key holds exactly one value kind at a time; a write replaces both
/// the value and its kind.
#[derive(Debug, Default)]
pub struct Store {
    entries: HashMap<Vec<u8>, Value>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a string value. Always succeeds.
    pub fn set(&mut self, key: impl Into<Vec<u8>>, value: Bytes) {
        self.entries.insert(key.into(), Value::Str(value));
    }

    /// Insert or overwrite a value of any kind.
    pub fn insert(&mut self, key: impl Into<Vec<u8>>, value: Value) {
        self.entries.insert(key.into(), value);
    }

    /// Fetch a string value. Absence is `Ok(None)`, not an error; a key
    /// of a non-string kind is a type mismatch.
    pub fn get(&self, key: &[u8]) -> Result<Option<Bytes>, WrongType> {
        match self.entries.get(key) {
            None => Ok(None),
            Some(Value::Str(value)) => Ok(Some(value.clone())),
            Some(_) => Err(WrongType),
        }
    }

    /// Remove a key; true iff it existed.
    pub fn del(&mut self, key: &[u8]) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn exists(&self, key: &[u8]) -> bool {
        self.entries.contains_key(key)
    }

    /// Kind tag of the value at `key`, if any.
    pub fn kind(&self, key: &[u8]) -> Option<ValueKind> {
        self.entries.get(key).map(Value::kind)
    }

    /// Count of live keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove all keys. Test reset hook, not exposed as a command.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_get_multiple_keys() {
        let mut store = Store::new();
        store.set(&b"key1"[..], Bytes::from_static(b"value1"));
        store.set(&b"key2"[..], Bytes::from_static(b"value2"));

        assert_eq!(
            store.get(b"key1").unwrap(),
            Some(Bytes::from_static(b"value1"))
        );
        assert_eq!(
            store.get(b"key2").unwrap(),
            Some(Bytes::from_static(b"value2"))
        );
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn overwrite_replaces_value() {
        let mut store = Store::new();
        store.set(&b"key1"[..], Bytes::from_static(b"value1"));
        store.set(&b"key1"[..], Bytes::from_static(b"new_value"));

        assert_eq!(
            store.get(b"key1").unwrap(),
            Some(Bytes::from_static(b"new_value"))
        );
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn get_missing_key_is_not_an_error() {
        let store = Store::new();
        assert_eq!(store.get(b"non_existent").unwrap(), None);
    }

    #[test]
    fn exists_tracks_lifecycle() {
        let mut store = Store::new();
        assert!(!store.exists(b"key1"));

        store.set(&b"key1"[..], Bytes::from_static(b"value1"));
        assert!(store.exists(b"key1"));

        store.del(b"key1");
        assert!(!store.exists(b"key1"));
    }

    #[test]
    fn del_reports_whether_key_existed() {
        let mut store = Store::new();
        assert!(!store.del(b"non_existent"));

        store.set(&b"key1"[..], Bytes::from_static(b"value1"));
        assert!(store.del(b"key1"));
        assert!(!store.del(b"key1"));
        assert_eq!(store.get(b"key1").unwrap(), None);
    }

    #[test]
    fn delete_and_recreate_key() {
        let mut store = Store::new();
        store.set(&b"key1"[..], Bytes::from_static(b"value1"));
        store.del(b"key1");
        store.set(&b"key1"[..], Bytes::from_static(b"new_value"));

        assert_eq!(
            store.get(b"key1").unwrap(),
            Some(Bytes::from_static(b"new_value"))
        );
    }

    #[test]
    fn clear_empties_the_key_space() {
        let mut store = Store::new();
        store.set(&b"a"[..], Bytes::from_static(b"1"));
        store.set(&b"b"[..], Bytes::from_static(b"2"));
        store.clear();

        assert!(store.is_empty());
        assert!(!store.exists(b"a"));
    }

    #[test]
    fn get_on_non_string_kind_is_a_type_mismatch() {
        let mut store = Store::new();
        store.insert(&b"queue"[..], Value::List(VecDeque::new()));

        assert_eq!(store.get(b"queue"), Err(WrongType));
        assert_eq!(store.kind(b"queue"), Some(ValueKind::List));
        assert!(WrongType.to_string().starts_with("WRONGTYPE"));
    }

    #[test]
    fn overwrite_replaces_kind_as_well() {
        let mut store = Store::new();
        store.insert(&b"k"[..], Value::List(VecDeque::new()));
        store.set(&b"k"[..], Bytes::from_static(b"now a string"));

        assert_eq!(store.kind(b"k"), Some(ValueKind::Str));
        assert!(store.get(b"k").is_ok());
    }

    #[test]
    fn binary_safe_keys_and_values() {
        let mut store = Store::new();
        let key = b"k\x00\xffey".to_vec();
        store.set(key.clone(), Bytes::from_static(b"\x01\x02\x00"));

        assert_eq!(
            store.get(&key).unwrap(),
            Some(Bytes::from_static(b"\x01\x02\x00"))
        );
    }
}
