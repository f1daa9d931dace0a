//! Item registry: process-wide store keyed by a stable 64-bit
//! identifier, secondary lookup by URI, concurrent-safe, traversal with
//! a visitor.
//!
//! One combined `RwLock<RegistryInner>` guards both maps rather than two
//! independently-locked maps, avoiding the two-lock ordering hazard a
//! split-lock design would need to manage by hand.

use crate::error::Error;
use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tweak_core::{Metadata, Value, ValueType};

/// An arbitrary per-item payload attached at creation time, returned
/// verbatim by `Registry::item_cookie`.
pub type Cookie = Arc<dyn Any + Send + Sync>;

/// Invoked after a successful `replace_current` with the item's id and its
/// new current value. The owning Endpoint installs one of these via
/// `set_change_hook` to drive change propagation; whether the hook
/// retransmits is the Endpoint's decision, not the Registry's (see
/// `endpoint.rs`'s `applying_remote` guard).
pub type ChangeHook = Box<dyn Fn(u64, &Value) + Send + Sync>;

struct Item {
    uri: String,
    description: String,
    meta: String,
    metadata: Metadata,
    default_value: Value,
    current_value: Arc<Mutex<Value>>,
    cookie: Option<Cookie>,
}

/// A deep-copied, detached view of one item, returned by
/// `Registry::snapshot`.
#[derive(Debug, Clone)]
pub struct ItemSnapshot {
    pub id: u64,
    pub uri: String,
    pub description: String,
    pub meta: String,
    pub metadata: Metadata,
    pub default_value: Value,
    pub current_value: Value,
}

#[derive(Default)]
struct RegistryInner {
    by_id: HashMap<u64, Item>,
    by_uri: HashMap<String, u64>,
}

pub struct Registry {
    inner: RwLock<RegistryInner>,
    id_source: AtomicU64,
    change_hook: RwLock<Option<ChangeHook>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Registry {
            inner: RwLock::new(RegistryInner::default()),
            // id_source starts at 1; 0 is reserved as the invalid sentinel
            // (invariant I1).
            id_source: AtomicU64::new(1),
            change_hook: RwLock::new(None),
        }
    }

    pub fn set_change_hook(&self, hook: ChangeHook) {
        *self.change_hook.write().expect("registry lock poisoned") = Some(hook);
    }

    /// Allocates a fresh id and atomically inserts a new item. `meta_json`
    /// is parsed into `Metadata` against `initial_value`'s type and element
    /// count (invariant I3: `default_value.type() == current_value.type()`,
    /// enforced here since both start from the same `initial_value`).
    pub fn add(
        &self,
        uri: &str,
        description: &str,
        meta_json: &str,
        initial_value: Value,
        cookie: Option<Cookie>,
    ) -> Result<u64, Error> {
        if uri.is_empty() || matches!(initial_value.value_type(), ValueType::Null) {
            return Err(Error::InvalidArgument);
        }
        let mut inner = self.inner.write().expect("registry lock poisoned");
        if inner.by_uri.contains_key(uri) {
            return Err(Error::AlreadyPresent);
        }
        let id = self.id_source.fetch_add(1, Ordering::Relaxed);
        let metadata = Metadata::parse(initial_value.value_type(), initial_value.item_count(), meta_json);
        let item = Item {
            uri: uri.to_string(),
            description: description.to_string(),
            meta: meta_json.to_string(),
            metadata,
            default_value: initial_value.copy(),
            current_value: Arc::new(Mutex::new(initial_value)),
            cookie,
        };
        inner.by_uri.insert(uri.to_string(), id);
        inner.by_id.insert(id, item);
        Ok(id)
    }

    /// Inserts an item reconstructed from a wire `AddItem` message, whose
    /// `default_value` and `current_value` may already have diverged on the
    /// sending side before this peer subscribed. `id` is the sender's id,
    /// not freshly allocated, so both ends of a connection agree on item
    /// identity.
    pub fn add_mirror(
        &self,
        id: u64,
        uri: &str,
        description: &str,
        meta_json: &str,
        default_value: Value,
        current_value: Value,
    ) -> Result<(), Error> {
        if uri.is_empty() || default_value.value_type() != current_value.value_type() {
            return Err(Error::InvalidArgument);
        }
        let mut inner = self.inner.write().expect("registry lock poisoned");
        if inner.by_uri.contains_key(uri) || inner.by_id.contains_key(&id) {
            return Err(Error::AlreadyPresent);
        }
        let metadata = Metadata::parse(default_value.value_type(), default_value.item_count(), meta_json);
        let item = Item {
            uri: uri.to_string(),
            description: description.to_string(),
            meta: meta_json.to_string(),
            metadata,
            default_value,
            current_value: Arc::new(Mutex::new(current_value)),
            cookie: None,
        };
        inner.by_uri.insert(uri.to_string(), id);
        inner.by_id.insert(id, item);
        Ok(())
    }

    /// Returns `true` iff an item with `id` was present and has now been
    /// removed.
    pub fn remove(&self, id: u64) -> bool {
        let mut inner = self.inner.write().expect("registry lock poisoned");
        if let Some(item) = inner.by_id.remove(&id) {
            inner.by_uri.remove(&item.uri);
            true
        } else {
            false
        }
    }

    pub fn find_by_uri(&self, uri: &str) -> Option<u64> {
        self.inner.read().expect("registry lock poisoned").by_uri.get(uri).copied()
    }

    pub fn get_type(&self, id: u64) -> Option<ValueType> {
        let inner = self.inner.read().expect("registry lock poisoned");
        let item = inner.by_id.get(&id)?;
        Some(item.default_value.value_type())
    }

    pub fn item_cookie(&self, id: u64) -> Option<Cookie> {
        let inner = self.inner.read().expect("registry lock poisoned");
        inner.by_id.get(&id)?.cookie.clone()
    }

    pub fn snapshot(&self, id: u64) -> Option<ItemSnapshot> {
        let inner = self.inner.read().expect("registry lock poisoned");
        let item = inner.by_id.get(&id)?;
        let current = item.current_value.lock().expect("item lock poisoned").copy();
        Some(ItemSnapshot {
            id,
            uri: item.uri.clone(),
            description: item.description.clone(),
            meta: item.meta.clone(),
            metadata: item.metadata.clone(),
            default_value: item.default_value.copy(),
            current_value: current,
        })
    }

    /// Deep copies the item's current value into `out`.
    pub fn clone_current(&self, id: u64, out: &mut Value) -> Result<(), Error> {
        let inner = self.inner.read().expect("registry lock poisoned");
        let item = inner.by_id.get(&id).ok_or(Error::ItemNotFound)?;
        *out = item.current_value.lock().expect("item lock poisoned").copy();
        Ok(())
    }

    /// Swaps `value` with the stored current value, so the caller receives
    /// the previous value. Takes the shared registry lock only long enough
    /// to locate the item and clone out its per-item cell, then mutates
    /// through the finer-grained per-item `Mutex` so concurrent updates to
    /// different items never contend on the coarse lock.
    pub fn replace_current(&self, id: u64, value: &mut Value) -> Result<(), Error> {
        let cell = {
            let inner = self.inner.read().expect("registry lock poisoned");
            let item = inner.by_id.get(&id).ok_or(Error::ItemNotFound)?;
            item.current_value.clone()
        };
        {
            let mut current = cell.lock().expect("item lock poisoned");
            if current.value_type() != value.value_type() {
                return Err(Error::TypeMismatch);
            }
            Value::swap(&mut current, value);
        }
        if let Some(hook) = self.change_hook.read().expect("registry lock poisoned").as_ref() {
            let snapshot = cell.lock().expect("item lock poisoned").copy();
            hook(id, &snapshot);
        }
        Ok(())
    }

    /// Visits every item in unspecified order; the visitor returning
    /// `false` aborts iteration early. Takes a snapshot of the id set under
    /// the shared lock so the visitor itself never runs while holding it
    /// (listener runtimes must stay short, but need not be instantaneous).
    pub fn traverse(&self, mut visitor: impl FnMut(&ItemSnapshot) -> bool) -> bool {
        let ids: Vec<u64> = {
            let inner = self.inner.read().expect("registry lock poisoned");
            inner.by_id.keys().copied().collect()
        };
        for id in ids {
            let Some(snap) = self.snapshot(id) else { continue };
            if !visitor(&snap) {
                return false;
            }
        }
        true
    }

    pub fn len(&self) -> usize {
        self.inner.read().expect("registry lock poisoned").by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_then_find_by_uri() {
        let reg = Registry::new();
        let id = reg.add("/a", "", "", Value::new_i32(7), None).unwrap();
        assert_eq!(reg.find_by_uri("/a"), Some(id));
        assert!(reg.remove(id));
        assert_eq!(reg.find_by_uri("/a"), None);
    }

    #[test]
    fn duplicate_uri_is_rejected() {
        let reg = Registry::new();
        reg.add("/a", "", "", Value::new_i32(1), None).unwrap();
        let err = reg.add("/a", "", "", Value::new_i32(2), None).unwrap_err();
        assert_eq!(err, Error::AlreadyPresent);
    }

    #[test]
    fn ids_start_at_one_and_are_unique() {
        let reg = Registry::new();
        let a = reg.add("/a", "", "", Value::new_i32(1), None).unwrap();
        let b = reg.add("/b", "", "", Value::new_i32(1), None).unwrap();
        assert_eq!(a, 1);
        assert_eq!(b, 2);
    }

    #[test]
    fn replace_current_swaps_and_rejects_type_mismatch() {
        let reg = Registry::new();
        let id = reg.add("/x", "", "", Value::new_f32(1.0), None).unwrap();
        let mut v = Value::new_i32(2);
        let err = reg.replace_current(id, &mut v).unwrap_err();
        assert_eq!(err, Error::TypeMismatch);

        let mut v = Value::new_f32(9.0);
        reg.replace_current(id, &mut v).unwrap();
        assert!(matches!(v, Value::F32(x) if x == 1.0));
        let snap = reg.snapshot(id).unwrap();
        assert!(matches!(snap.current_value, Value::F32(x) if x == 9.0));
    }

    #[test]
    fn snapshot_after_replace_current_matches() {
        let reg = Registry::new();
        let id = reg.add("/y", "", "", Value::new_i32(0), None).unwrap();
        let mut v = Value::new_i32(42);
        reg.replace_current(id, &mut v).unwrap();
        let snap = reg.snapshot(id).unwrap();
        assert!(Value::is_equal(&snap.current_value, &Value::new_i32(42)));
    }

    #[test]
    fn change_hook_fires_with_new_value() {
        let reg = Registry::new();
        let id = reg.add("/z", "", "", Value::new_i32(0), None).unwrap();
        let seen = Arc::new(Mutex::new(None));
        let seen_clone = seen.clone();
        reg.set_change_hook(Box::new(move |hooked_id, v| {
            *seen_clone.lock().unwrap() = Some((hooked_id, v.copy()));
        }));
        let mut v = Value::new_i32(5);
        reg.replace_current(id, &mut v).unwrap();
        let (hooked_id, value) = seen.lock().unwrap().take().unwrap();
        assert_eq!(hooked_id, id);
        assert!(matches!(value, Value::I32(5)));
    }

    #[test]
    fn traverse_visits_living_items_and_can_abort_early() {
        let reg = Registry::new();
        reg.add("/a", "", "", Value::new_i32(1), None).unwrap();
        reg.add("/b", "", "", Value::new_i32(2), None).unwrap();
        reg.add("/c", "", "", Value::new_i32(3), None).unwrap();

        let mut visited = 0;
        let completed = reg.traverse(|_| {
            visited += 1;
            true
        });
        assert!(completed);
        assert_eq!(visited, 3);

        let mut count = 0;
        let completed = reg.traverse(|_| {
            count += 1;
            count < 2
        });
        assert!(!completed);
        assert_eq!(count, 2);
    }

    #[test]
    fn item_cookie_round_trips() {
        let reg = Registry::new();
        let cookie: Cookie = Arc::new(99u32);
        let id = reg.add("/c", "", "", Value::new_i32(1), Some(cookie)).unwrap();
        let got = reg.item_cookie(id).unwrap();
        assert_eq!(*got.downcast_ref::<u32>().unwrap(), 99);
        assert!(reg.item_cookie(999).is_none());
    }

    #[test]
    fn unknown_id_operations_return_item_not_found() {
        let reg = Registry::new();
        let mut v = Value::new_i32(1);
        assert_eq!(reg.replace_current(999, &mut v).unwrap_err(), Error::ItemNotFound);
        let mut out = Value::Null;
        assert_eq!(reg.clone_current(999, &mut out).unwrap_err(), Error::ItemNotFound);
    }
}
