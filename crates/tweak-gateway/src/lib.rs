//! Bridges two `tweak-runtime` endpoints of possibly different transport
//! kinds: a client leg ("left", dialing an upstream server) and a server
//! leg ("right", serving a downstream client), mirroring the left
//! registry's items onto the right registry and forwarding value changes
//! in both directions.
//!
//! This is the "gateway" external collaborator: an entity that sits
//! between two endpoints and needs only `Registry`, `Endpoint`, and
//! `EndpointListeners` from the core to do its job. This crate supplies
//! one concrete implementation of it, using the same
//! shared-state-behind-`Arc<Mutex<_>>` idiom `tweak-runtime::endpoint`
//! itself uses for `Shared`.
//!
//! Echo suppression between the two legs mirrors `endpoint.rs`'s
//! `applying_remote` flag: each direction gets its own `AtomicBool` set
//! for the duration of the synchronous mirroring write, so the mirrored
//! registry's own change-hook-driven listener callback (which fires
//! unconditionally, the same way `Endpoint`'s does) does not bounce the
//! value back across the bridge a second time.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tweak_core::Value;
use tweak_runtime::{tweak_log, ConnectionState, Endpoint, EndpointListeners, Level, Registry};

#[derive(Default)]
struct IdMap {
    left_to_right: HashMap<u64, u64>,
    right_to_left: HashMap<u64, u64>,
}

struct Shared {
    left_registry: Arc<Registry>,
    right_registry: Arc<Registry>,
    /// The right-side `Endpoint` is not available until its (possibly
    /// blocking, e.g. TCP accept) connect completes, so the left listener
    /// holds a cell it can populate later rather than a constructor
    /// argument. The bridge owns it outright from then on.
    right_endpoint: Mutex<Option<Endpoint>>,
    map: Mutex<IdMap>,
    mirroring_left_to_right: AtomicBool,
    mirroring_right_to_left: AtomicBool,
}

/// Owns the id-mapping state shared by both legs' listeners. Construct
/// with [`Bridge::new`], install the returned listeners on each leg's
/// `Endpoint::new`/`connect` call, then once the right leg's `Endpoint`
/// exists, hand it to [`Bridge::attach_right_endpoint`].
pub struct Bridge {
    shared: Arc<Shared>,
}

impl Bridge {
    pub fn new(left_registry: Arc<Registry>, right_registry: Arc<Registry>) -> Bridge {
        Bridge {
            shared: Arc::new(Shared {
                left_registry,
                right_registry,
                right_endpoint: Mutex::new(None),
                map: Mutex::new(IdMap::default()),
                mirroring_left_to_right: AtomicBool::new(false),
                mirroring_right_to_left: AtomicBool::new(false),
            }),
        }
    }

    /// The listener the left (client, upstream-facing) `Endpoint` must be
    /// constructed with.
    pub fn left_listeners(&self) -> Arc<dyn EndpointListeners> {
        Arc::new(LeftListeners { shared: self.shared.clone() })
    }

    /// The listener the right (server, downstream-facing) `Endpoint` must
    /// be constructed with.
    pub fn right_listeners(&self) -> Arc<dyn EndpointListeners> {
        Arc::new(RightListeners { shared: self.shared.clone() })
    }

    /// Supplies the right leg's `Endpoint` once it has finished connecting,
    /// handing the bridge ownership of it so the left listener can push
    /// mirrored `AddItem`/`RemoveItem` notifications to it.
    pub fn attach_right_endpoint(&self, endpoint: Endpoint) {
        *self.shared.right_endpoint.lock().expect("bridge right-endpoint lock poisoned") = Some(endpoint);
    }

    pub fn mirrored_item_count(&self) -> usize {
        self.shared.map.lock().expect("bridge map lock poisoned").left_to_right.len()
    }

    /// Tears down the right leg's `Endpoint`, if attached. The left leg's
    /// `Endpoint` is owned by the caller and must be destroyed separately.
    pub fn destroy_right_endpoint(&self) {
        let endpoint = self.shared.right_endpoint.lock().expect("bridge right-endpoint lock poisoned").take();
        if let Some(endpoint) = endpoint {
            endpoint.destroy();
        }
    }
}

struct LeftListeners {
    shared: Arc<Shared>,
}

impl EndpointListeners for LeftListeners {
    fn on_connection_state(&self, state: ConnectionState) {
        tweak_log!(Level::Debug, "left leg connection state: {:?}", state);
    }

    fn on_item_added(&self, id: u64) {
        let Some(snap) = self.shared.left_registry.snapshot(id) else { return };
        let right_id = match self.shared.right_registry.add(
            &snap.uri,
            &snap.description,
            &snap.meta,
            snap.current_value.copy(),
            None,
        ) {
            Ok(id) => id,
            Err(e) => {
                tweak_log!(Level::Warn, "gateway could not mirror item {} ({}): {}", id, snap.uri, e);
                return;
            }
        };
        {
            let mut map = self.shared.map.lock().expect("bridge map lock poisoned");
            map.left_to_right.insert(id, right_id);
            map.right_to_left.insert(right_id, id);
        }
        if let Some(endpoint) = self.shared.right_endpoint.lock().expect("bridge right-endpoint lock poisoned").as_ref() {
            if let Err(e) = endpoint.on_item_added(right_id) {
                tweak_log!(Level::Warn, "gateway could not publish mirrored item {}: {}", right_id, e);
            }
        }
    }

    fn on_item_removed(&self, id: u64) {
        let right_id = {
            let mut map = self.shared.map.lock().expect("bridge map lock poisoned");
            let Some(right_id) = map.left_to_right.remove(&id) else { return };
            map.right_to_left.remove(&right_id);
            right_id
        };
        self.shared.right_registry.remove(right_id);
        if let Some(endpoint) = self.shared.right_endpoint.lock().expect("bridge right-endpoint lock poisoned").as_ref() {
            if let Err(e) = endpoint.on_item_removed(right_id) {
                tweak_log!(Level::Warn, "gateway could not announce removal of mirrored item {}: {}", right_id, e);
            }
        }
    }

    fn on_value_changed(&self, id: u64, value: &Value) {
        if self.shared.mirroring_right_to_left.load(Ordering::SeqCst) {
            // This change is an echo of our own right->left mirroring
            // write below; do not bounce it back across the bridge.
            return;
        }
        let right_id = {
            let map = self.shared.map.lock().expect("bridge map lock poisoned");
            match map.left_to_right.get(&id) {
                Some(id) => *id,
                None => return,
            }
        };
        self.shared.mirroring_left_to_right.store(true, Ordering::SeqCst);
        let mut v = value.copy();
        let result = self.shared.right_registry.replace_current(right_id, &mut v);
        self.shared.mirroring_left_to_right.store(false, Ordering::SeqCst);
        if let Err(e) = result {
            tweak_log!(Level::Warn, "gateway left->right mirror of item {} failed: {}", id, e);
        }
    }
}

struct RightListeners {
    shared: Arc<Shared>,
}

impl EndpointListeners for RightListeners {
    fn on_connection_state(&self, state: ConnectionState) {
        tweak_log!(Level::Debug, "right leg connection state: {:?}", state);
    }

    fn on_subscribe(&self, pattern: &str) {
        tweak_log!(Level::Debug, "downstream peer subscribed with pattern {:?}", pattern);
    }

    fn on_value_changed(&self, id: u64, value: &Value) {
        if self.shared.mirroring_left_to_right.load(Ordering::SeqCst) {
            return;
        }
        let left_id = {
            let map = self.shared.map.lock().expect("bridge map lock poisoned");
            match map.right_to_left.get(&id) {
                Some(id) => *id,
                None => return,
            }
        };
        self.shared.mirroring_right_to_left.store(true, Ordering::SeqCst);
        let mut v = value.copy();
        let result = self.shared.left_registry.replace_current(left_id, &mut v);
        self.shared.mirroring_right_to_left.store(false, Ordering::SeqCst);
        if let Err(e) = result {
            tweak_log!(Level::Warn, "gateway right->left mirror of item {} failed: {}", id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::{Duration, Instant};
    use tweak_runtime::{Endpoint, InProcessTransport, NullListeners, Role};

    fn wait_until(mut cond: impl FnMut() -> bool, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        cond()
    }

    /// upstream-server -- (left leg) --> gateway -- (right leg) --> downstream-client
    #[test]
    fn item_added_upstream_is_mirrored_to_downstream() {
        let upstream_registry = Arc::new(Registry::new());
        upstream_registry.add("/temp", "", "", Value::new_f64(21.5), None).unwrap();

        let (upstream_t, left_t) = InProcessTransport::pair();
        let (right_t, downstream_t) = InProcessTransport::pair();

        let left_registry = Arc::new(Registry::new());
        let right_registry = Arc::new(Registry::new());
        let bridge = Bridge::new(left_registry.clone(), right_registry.clone());

        let upstream = Endpoint::new(Role::Server, upstream_registry.clone(), Arc::new(upstream_t), Arc::new(NullListeners));
        let left = Endpoint::new(Role::Client, left_registry.clone(), Arc::new(left_t), bridge.left_listeners());
        left.subscribe("*").unwrap();

        let right = Endpoint::new(Role::Server, right_registry.clone(), Arc::new(right_t), bridge.right_listeners());
        bridge.attach_right_endpoint(right);
        let downstream_registry = Arc::new(Registry::new());
        let downstream = Endpoint::new(Role::Client, downstream_registry.clone(), Arc::new(downstream_t), Arc::new(NullListeners));
        downstream.subscribe("*").unwrap();

        assert!(wait_until(|| downstream_registry.find_by_uri("/temp").is_some(), Duration::from_secs(2)));
        let id = downstream_registry.find_by_uri("/temp").unwrap();
        let mut v = Value::Null;
        downstream_registry.clone_current(id, &mut v).unwrap();
        assert!(matches!(v, Value::F64(x) if x == 21.5));

        downstream.destroy();
        bridge.destroy_right_endpoint();
        left.destroy();
        upstream.destroy();
    }

    #[test]
    fn value_change_propagates_both_directions() {
        let upstream_registry = Arc::new(Registry::new());
        let upstream_id = upstream_registry.add("/x", "", "", Value::new_i32(0), None).unwrap();

        let (upstream_t, left_t) = InProcessTransport::pair();
        let (right_t, downstream_t) = InProcessTransport::pair();

        let left_registry = Arc::new(Registry::new());
        let right_registry = Arc::new(Registry::new());
        let bridge = Bridge::new(left_registry.clone(), right_registry.clone());

        let upstream = Endpoint::new(Role::Server, upstream_registry.clone(), Arc::new(upstream_t), Arc::new(NullListeners));
        let left = Endpoint::new(Role::Client, left_registry.clone(), Arc::new(left_t), bridge.left_listeners());
        left.subscribe("*").unwrap();

        let right = Endpoint::new(Role::Server, right_registry.clone(), Arc::new(right_t), bridge.right_listeners());
        bridge.attach_right_endpoint(right);
        let downstream_registry = Arc::new(Registry::new());
        let downstream = Endpoint::new(Role::Client, downstream_registry.clone(), Arc::new(downstream_t), Arc::new(NullListeners));
        downstream.subscribe("*").unwrap();

        assert!(wait_until(|| downstream_registry.find_by_uri("/x").is_some(), Duration::from_secs(2)));
        let downstream_id = downstream_registry.find_by_uri("/x").unwrap();

        // Upstream -> downstream.
        let mut v = Value::new_i32(5);
        upstream_registry.replace_current(upstream_id, &mut v).unwrap();
        assert!(wait_until(
            || {
                let mut out = Value::Null;
                downstream_registry.clone_current(downstream_id, &mut out).is_ok() && matches!(out, Value::I32(5))
            },
            Duration::from_secs(2)
        ));

        // Downstream -> upstream.
        let mut v = Value::new_i32(-2);
        downstream_registry.replace_current(downstream_id, &mut v).unwrap();
        assert!(wait_until(
            || {
                let mut out = Value::Null;
                upstream_registry.clone_current(upstream_id, &mut out).is_ok() && matches!(out, Value::I32(-2))
            },
            Duration::from_secs(2)
        ));

        assert_eq!(bridge.mirrored_item_count(), 1);
        downstream.destroy();
        bridge.destroy_right_endpoint();
        left.destroy();
        upstream.destroy();
    }
}
