//! Endpoint protocol state machine: turns a `Registry` and a `Transport`
//! into a running peer. One `Endpoint` owns exactly one connection and one
//! dedicated OS I/O thread, and drives the five wire messages in `codec`
//! against the registry.
//!
//! State machine:
//!
//! ```text
//! Offline --construct--> Connecting --transport up--> Negotiating
//!   Negotiating --Features exchanged--> Active
//!   Active --transport error/peer close--> Disconnected
//!   Disconnected --reconnection timer--> Connecting
//! ```
//!
//! `Disconnected` is terminal only when the Endpoint is explicitly
//! destroyed; otherwise the I/O thread keeps retrying the connection with
//! a capped exponential backoff, for any Endpoint built with a redial
//! capability (currently, any `connect()`-built TCP endpoint; an Endpoint
//! built directly with a fixed `Transport` that cannot redial itself, such
//! as the in-process test transport, stays `Disconnected`).
//!
//! `EndpointListeners` replaces the original cookie-keyed callback table
//! with a capability set: a host implements only the notifications it
//! cares about, default methods no-op the rest.

use crate::codec::{self, Message};
use crate::config::Role;
use crate::error::{Error, TransportError};
use crate::registry::Registry;
use crate::transport::Transport;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tweak_core::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Before the connection attempt starts. Momentary: the constructor
    /// moves straight to `Connecting`, so a host almost never observes
    /// this through `on_connection_state`.
    Offline,
    Connecting,
    Negotiating,
    Active,
    Disconnected,
}

/// Notifications an Endpoint delivers to its host. All methods default to
/// no-ops so a listener only overrides what it needs.
pub trait EndpointListeners: Send + Sync {
    fn on_connection_state(&self, _state: ConnectionState) {}
    /// Client role only: the server added an item the client now mirrors.
    fn on_item_added(&self, _id: u64) {}
    /// Client role only.
    fn on_item_removed(&self, _id: u64) {}
    /// Both roles: `id`'s current value changed, whether the change
    /// originated locally (via the Facade) or from the peer.
    fn on_value_changed(&self, _id: u64, _value: &Value) {}
    /// Server role only: a client subscribed.
    fn on_subscribe(&self, _pattern: &str) {}
    fn on_features(&self, _features: &[String]) {}
}

/// A listener that ignores everything; useful when a host only needs the
/// Facade's own channel-based wait helpers.
pub struct NullListeners;
impl EndpointListeners for NullListeners {}

const SUPPORTED_FEATURES: &[&str] = &["scalar", "vector", "string"];

fn feature_list_string() -> String {
    SUPPORTED_FEATURES.join(";")
}

fn parse_feature_list(s: &str) -> Vec<String> {
    s.split(';').map(|f| f.trim().to_string()).filter(|f| !f.is_empty()).collect()
}

/// Redials a fresh `Transport` for a `Disconnected` Endpoint to retry on.
/// `None` when the Endpoint's transport has no redial story of its own
/// (e.g. the in-process test transport, or one handed to `Endpoint::new`
/// directly rather than produced via `connect()`).
type Reconnector = Box<dyn Fn() -> Result<Arc<dyn Transport>, TransportError> + Send + Sync>;

struct Shared {
    registry: Arc<Registry>,
    transport: Mutex<Arc<dyn Transport>>,
    state: Mutex<ConnectionState>,
    listeners: Arc<dyn EndpointListeners>,
    role: Role,
    tx_lock: Mutex<()>,
    /// Ids currently being applied from an incoming `ChangeItem`, so the
    /// registry's change hook knows not to echo that specific item back to
    /// the peer it just arrived from. Scoped per id rather than a single
    /// flag, so a Facade-originated change to an unrelated item occurring
    /// on another thread while this set is non-empty is never suppressed.
    applying_remote: Mutex<HashSet<u64>>,
    peer_features: Mutex<Vec<String>>,
    shutdown: AtomicBool,
    reconnect: Option<Reconnector>,
}

impl Shared {
    fn set_state(&self, state: ConnectionState) {
        *self.state.lock().expect("endpoint state lock poisoned") = state;
        self.listeners.on_connection_state(state);
    }

    fn send_message(&self, msg: &Message) -> Result<(), TransportError> {
        let bytes = codec::encode(msg);
        let _guard = self.tx_lock.lock().expect("endpoint tx lock poisoned");
        let transport = self.transport.lock().expect("endpoint transport lock poisoned").clone();
        transport.send(&bytes)
    }

    fn begin_applying_remote(&self, id: u64) {
        self.applying_remote.lock().expect("applying-remote lock poisoned").insert(id);
    }

    fn end_applying_remote(&self, id: u64) {
        self.applying_remote.lock().expect("applying-remote lock poisoned").remove(&id);
    }

    fn is_applying_remote(&self, id: u64) -> bool {
        self.applying_remote.lock().expect("applying-remote lock poisoned").contains(&id)
    }
}

/// One peer connection, driving `codec`'s wire messages against a
/// `Registry` over a `Transport`. Server endpoints own the items (created
/// via the Facade, published to clients); client endpoints mirror whatever
/// the server publishes.
pub struct Endpoint {
    shared: Arc<Shared>,
    io_thread: Option<thread::JoinHandle<()>>,
}

impl Endpoint {
    /// Takes ownership of an already-connected `transport` and spawns the
    /// I/O thread. The registry's change hook is installed here so every
    /// local (Facade) and remote (wire) mutation funnels through the same
    /// propagation path.
    ///
    /// Built with no redial capability: if the transport goes down, this
    /// Endpoint moves to `Disconnected` and stays there. Use `connect()` for
    /// an Endpoint that retries.
    pub fn new(
        role: Role,
        registry: Arc<Registry>,
        transport: Arc<dyn Transport>,
        listeners: Arc<dyn EndpointListeners>,
    ) -> Endpoint {
        Self::new_inner(role, registry, transport, listeners, None)
    }

    fn new_inner(
        role: Role,
        registry: Arc<Registry>,
        transport: Arc<dyn Transport>,
        listeners: Arc<dyn EndpointListeners>,
        reconnect: Option<Reconnector>,
    ) -> Endpoint {
        let shared = Arc::new(Shared {
            registry,
            transport: Mutex::new(transport),
            state: Mutex::new(ConnectionState::Offline),
            listeners,
            role,
            tx_lock: Mutex::new(()),
            applying_remote: Mutex::new(HashSet::new()),
            peer_features: Mutex::new(Vec::new()),
            shutdown: AtomicBool::new(false),
            reconnect,
        });

        let hook_shared = shared.clone();
        shared.registry.set_change_hook(Box::new(move |id, value| {
            hook_shared.listeners.on_value_changed(id, value);
            if hook_shared.is_applying_remote(id) {
                return;
            }
            if let Err(e) = hook_shared.send_message(&Message::ChangeItem { id, value: value.copy() }) {
                crate::tweak_log!(
                    crate::log::Level::Warn,
                    "item {} changed locally but peer send failed: {}",
                    id,
                    e
                );
            }
        }));

        shared.set_state(ConnectionState::Connecting);
        begin_negotiating(&shared);

        let io_shared = shared.clone();
        let io_thread = thread::spawn(move || io_loop(io_shared));

        Endpoint { shared, io_thread: io_thread.into() }
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.shared.state.lock().expect("endpoint state lock poisoned")
    }

    pub fn role(&self) -> Role {
        self.shared.role
    }

    /// Server role: publishes a new item immediately to a subscribed peer.
    pub fn on_item_added(&self, id: u64) -> Result<(), Error> {
        let snap = self.shared.registry.snapshot(id).ok_or(Error::ItemNotFound)?;
        self.transmit_add_item(&snap)
    }

    /// Server role: tells a subscribed peer an item is gone.
    pub fn on_item_removed(&self, id: u64) -> Result<(), Error> {
        self.shared.send_message(&Message::RemoveItem { id }).map_err(Error::from)
    }

    fn transmit_add_item(&self, snap: &crate::registry::ItemSnapshot) -> Result<(), Error> {
        if let Some(feature) = codec::type_requires_feature(snap.default_value.value_type()) {
            let negotiated = self.shared.peer_features.lock().expect("peer features lock poisoned");
            if !negotiated.iter().any(|f| f == feature) {
                // Peer never negotiated this feature; silently skip rather
                // than send a message it cannot decode into a usable item.
                return Ok(());
            }
        }
        self.shared
            .send_message(&Message::AddItem {
                id: snap.id,
                uri: snap.uri.clone(),
                description: snap.description.clone(),
                meta: snap.meta.clone(),
                default: snap.default_value.copy(),
                current: snap.current_value.copy(),
            })
            .map_err(Error::from)
    }

    /// Client role: blocks until every uri in `uris` has a registry id, or
    /// `timeout_millis` elapses (`u64::MAX` waits indefinitely). Implemented
    /// by polling the registry rather than a dedicated condvar, since
    /// subscription delivery already runs on the I/O thread and resolution
    /// latency is bounded by network round trips, not local contention.
    pub fn wait_uris(&self, uris: &[&str], timeout_millis: u64) -> Result<Vec<u64>, Error> {
        let deadline =
            if timeout_millis == u64::MAX { None } else { Some(Instant::now() + Duration::from_millis(timeout_millis)) };
        loop {
            let mut ids = Vec::with_capacity(uris.len());
            let mut all_found = true;
            for uri in uris {
                match self.shared.registry.find_by_uri(uri) {
                    Some(id) => ids.push(id),
                    None => {
                        all_found = false;
                        break;
                    }
                }
            }
            if all_found {
                return Ok(ids);
            }
            if self.connection_state() == ConnectionState::Disconnected {
                return Err(Error::PeerDisconnected);
            }
            if let Some(dl) = deadline {
                if Instant::now() >= dl {
                    return Err(Error::Timeout);
                }
            }
            thread::sleep(Duration::from_millis(5));
        }
    }

    /// Client role: asks the server to publish its full item set. Only
    /// whole-registry subscriptions are supported, so the server treats any
    /// non-empty pattern as `*`.
    pub fn subscribe(&self, pattern: &str) -> Result<(), Error> {
        self.shared
            .send_message(&Message::Subscribe { uri_patterns: pattern.to_string() })
            .map_err(Error::from)
    }

    /// Shuts the transport down and joins the I/O thread. Always succeeds,
    /// even on an already-dead connection.
    pub fn destroy(mut self) {
        self.shared.shutdown.store(true, Ordering::SeqCst);
        self.shared.transport.lock().expect("endpoint transport lock poisoned").shutdown();
        if let Some(handle) = self.io_thread.take() {
            let _ = handle.join();
        }
    }
}

/// Transitions to `Negotiating` and, for the client role, sends `Features`
/// synchronously before the caller can possibly race it with a `subscribe`
/// call — used both for the initial connection and every reconnect.
fn begin_negotiating(shared: &Arc<Shared>) {
    shared.set_state(ConnectionState::Negotiating);
    if shared.role == Role::Client {
        let _ = shared.send_message(&Message::Features { features: feature_list_string() });
    }
}

const RECONNECT_INITIAL_BACKOFF: Duration = Duration::from_millis(50);
const RECONNECT_MAX_BACKOFF: Duration = Duration::from_secs(5);

/// Retries the reconnector with capped exponential backoff until it
/// succeeds or the Endpoint is destroyed. Returns `false` (giving up on
/// this connection for good) when there is no reconnector to try, or the
/// Endpoint was destroyed mid-retry.
fn reconnect_loop(shared: &Arc<Shared>) -> bool {
    let Some(reconnect) = shared.reconnect.as_ref() else {
        return false;
    };
    let mut backoff = RECONNECT_INITIAL_BACKOFF;
    loop {
        if shared.shutdown.load(Ordering::SeqCst) {
            return false;
        }
        shared.set_state(ConnectionState::Connecting);
        match reconnect() {
            Ok(new_transport) => {
                *shared.transport.lock().expect("endpoint transport lock poisoned") = new_transport;
                shared.peer_features.lock().expect("peer features lock poisoned").clear();
                begin_negotiating(shared);
                return true;
            }
            Err(e) => {
                crate::tweak_log!(crate::log::Level::Warn, "reconnect attempt failed: {}", e);
                let chunk = Duration::from_millis(10);
                let mut waited = Duration::ZERO;
                while waited < backoff {
                    if shared.shutdown.load(Ordering::SeqCst) {
                        return false;
                    }
                    thread::sleep(chunk);
                    waited += chunk;
                }
                backoff = (backoff * 2).min(RECONNECT_MAX_BACKOFF);
            }
        }
    }
}

fn io_loop(shared: Arc<Shared>) {
    loop {
        if shared.shutdown.load(Ordering::SeqCst) {
            return;
        }
        let transport = shared.transport.lock().expect("endpoint transport lock poisoned").clone();
        match transport.recv() {
            Ok(bytes) => match codec::decode(&bytes) {
                Ok(msg) => handle_message(&shared, msg),
                Err(e) => {
                    crate::tweak_log!(crate::log::Level::Warn, "dropping malformed message: {}", e);
                }
            },
            Err(e) => {
                if !matches!(e, TransportError::Closed) {
                    crate::tweak_log!(crate::log::Level::Warn, "transport error: {}", e);
                }
                shared.set_state(ConnectionState::Disconnected);
                if shared.shutdown.load(Ordering::SeqCst) || !reconnect_loop(&shared) {
                    return;
                }
            }
        }
    }
}

fn handle_message(shared: &Arc<Shared>, msg: Message) {
    match msg {
        Message::Features { features } => {
            let parsed = parse_feature_list(&features);
            *shared.peer_features.lock().expect("peer features lock poisoned") = parsed.clone();
            shared.listeners.on_features(&parsed);
            if *shared.state.lock().expect("endpoint state lock poisoned") == ConnectionState::Negotiating {
                shared.set_state(ConnectionState::Active);
            }
            if shared.role == Role::Server {
                let reply = Message::Features { features: feature_list_string() };
                let _ = shared.send_message(&reply);
            }
        }
        Message::Subscribe { uri_patterns } => {
            shared.listeners.on_subscribe(&uri_patterns);
            if *shared.state.lock().expect("endpoint state lock poisoned") == ConnectionState::Negotiating {
                shared.set_state(ConnectionState::Active);
            }
            // Server publishes its whole registry on every subscribe,
            // so a client sees the pre-existing item set immediately on
            // subscribe rather than waiting for the next change.
            let snapshots: Vec<crate::registry::ItemSnapshot> = {
                let mut out = Vec::new();
                shared.registry.traverse(|snap| {
                    out.push(snap.clone());
                    true
                });
                out
            };
            for snap in snapshots {
                if let Some(feature) = codec::type_requires_feature(snap.default_value.value_type()) {
                    let negotiated = shared.peer_features.lock().expect("peer features lock poisoned");
                    if !negotiated.iter().any(|f| f == feature) {
                        continue;
                    }
                }
                let _ = shared.send_message(&Message::AddItem {
                    id: snap.id,
                    uri: snap.uri,
                    description: snap.description,
                    meta: snap.meta,
                    default: snap.default_value,
                    current: snap.current_value,
                });
            }
        }
        Message::AddItem { id, uri, description, meta, default, current } => {
            match shared.registry.add_mirror(id, &uri, &description, &meta, default, current) {
                Ok(()) => shared.listeners.on_item_added(id),
                Err(_) => {
                    crate::tweak_log!(crate::log::Level::Warn, "ignoring AddItem for already-known id {}", id);
                }
            }
        }
        Message::RemoveItem { id } => {
            if shared.registry.remove(id) {
                shared.listeners.on_item_removed(id);
            }
        }
        Message::ChangeItem { id, value } => {
            // Marks only this id as being applied from the peer, so the
            // registry's change hook skips echoing it back while any
            // concurrent Facade-originated change to a different id still
            // propagates normally.
            shared.begin_applying_remote(id);
            let mut incoming = value;
            let result = shared.registry.replace_current(id, &mut incoming);
            shared.end_applying_remote(id);
            if let Err(e) = result {
                crate::tweak_log!(crate::log::Level::Warn, "ChangeItem for id {} rejected: {}", id, e);
            }
        }
    }
}

fn dial_tcp(role: Role, uri: &str) -> Result<Arc<dyn Transport>, TransportError> {
    use crate::transport::TcpTransport;
    let tcp = if role == Role::Server { TcpTransport::listen_and_accept(uri)? } else { TcpTransport::connect(uri)? };
    Ok(Arc::new(tcp))
}

/// Establishes one end of a connection per `role` and `config`, returning
/// a running `Endpoint`. The only concrete transport today is
/// `TransportKind::Nng`, backed by length-prefixed TCP (`transport.rs`);
/// anything else surfaces `TransportError::Unsupported` without spawning a
/// thread.
///
/// The returned Endpoint carries a redial closure over `role`/`uri`, so a
/// transport failure moves it to `Disconnected` and then back through
/// `Connecting` on its own rather than ending the I/O thread for good (on
/// the server role, redialing means waiting for the next client to
/// connect, consistent with one client per server endpoint).
pub fn connect(
    role: Role,
    transport_kind: &crate::config::TransportKind,
    uri: &str,
    registry: Arc<Registry>,
    listeners: Arc<dyn EndpointListeners>,
) -> Result<Endpoint, Error> {
    use crate::config::TransportKind;

    match transport_kind {
        TransportKind::Nng => {
            let transport = dial_tcp(role, uri)?;
            let owned_uri = uri.to_string();
            let reconnect: Reconnector = Box::new(move || dial_tcp(role, &owned_uri));
            Ok(Endpoint::new_inner(role, registry, transport, listeners, Some(reconnect)))
        }
        other => Err(TransportError::Unsupported(other.as_str().to_string()).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::InProcessTransport;
    use std::sync::atomic::AtomicU64;
    use std::sync::Mutex as StdMutex;
    use tweak_core::ValueType;

    #[derive(Default)]
    struct RecordingListeners {
        added: StdMutex<Vec<u64>>,
        changed: StdMutex<Vec<(u64, Value)>>,
        subscribed: StdMutex<Vec<String>>,
        active_count: AtomicU64,
    }

    impl EndpointListeners for RecordingListeners {
        fn on_item_added(&self, id: u64) {
            self.added.lock().unwrap().push(id);
        }
        fn on_value_changed(&self, id: u64, value: &Value) {
            self.changed.lock().unwrap().push((id, value.copy()));
        }
        fn on_subscribe(&self, pattern: &str) {
            self.subscribed.lock().unwrap().push(pattern.to_string());
        }
        fn on_connection_state(&self, state: ConnectionState) {
            if state == ConnectionState::Active {
                self.active_count.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

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

    #[test]
    fn client_sees_preexisting_item_after_subscribe() {
        let server_registry = Arc::new(Registry::new());
        server_registry.add("/gain", "", "", Value::new_i32(7), None).unwrap();

        let (server_t, client_t) = InProcessTransport::pair();
        let client_listeners = Arc::new(RecordingListeners::default());
        let client_registry = Arc::new(Registry::new());

        let server = Endpoint::new(
            Role::Server,
            server_registry.clone(),
            Arc::new(server_t),
            Arc::new(RecordingListeners::default()),
        );
        let client = Endpoint::new(
            Role::Client,
            client_registry.clone(),
            Arc::new(client_t),
            client_listeners.clone(),
        );
        client.subscribe("*").unwrap();

        assert!(wait_until(|| client_registry.find_by_uri("/gain").is_some(), Duration::from_secs(2)));
        let id = client_registry.find_by_uri("/gain").unwrap();
        let mut v = Value::Null;
        client_registry.clone_current(id, &mut v).unwrap();
        assert!(matches!(v, Value::I32(7)));

        client.destroy();
        server.destroy();
    }

    #[test]
    fn server_side_facade_change_propagates_to_client() {
        let server_registry = Arc::new(Registry::new());
        let id = server_registry.add("/x", "", "", Value::new_i32(0), None).unwrap();

        let (server_t, client_t) = InProcessTransport::pair();
        let client_registry = Arc::new(Registry::new());
        let client_listeners = Arc::new(RecordingListeners::default());

        let server =
            Endpoint::new(Role::Server, server_registry.clone(), Arc::new(server_t), Arc::new(RecordingListeners::default()));
        let client = Endpoint::new(Role::Client, client_registry.clone(), Arc::new(client_t), client_listeners.clone());
        client.subscribe("*").unwrap();
        assert!(wait_until(|| client_registry.find_by_uri("/x").is_some(), Duration::from_secs(2)));

        let mut v = Value::new_i32(42);
        server_registry.replace_current(id, &mut v).unwrap();

        assert!(wait_until(
            || {
                let mut out = Value::Null;
                client_registry.clone_current(id, &mut out).is_ok()
                    && matches!(out, Value::I32(42))
            },
            Duration::from_secs(2)
        ));

        client.destroy();
        server.destroy();
    }

    #[test]
    fn client_change_does_not_echo_back_as_a_redundant_send() {
        let server_registry = Arc::new(Registry::new());
        let id = server_registry.add("/y", "", "", Value::new_i32(0), None).unwrap();

        let (server_t, client_t) = InProcessTransport::pair();
        let client_registry = Arc::new(Registry::new());
        let server_listeners = Arc::new(RecordingListeners::default());

        let server = Endpoint::new(Role::Server, server_registry.clone(), Arc::new(server_t), server_listeners.clone());
        let client = Endpoint::new(Role::Client, client_registry.clone(), Arc::new(client_t), Arc::new(RecordingListeners::default()));
        client.subscribe("*").unwrap();
        assert!(wait_until(|| client_registry.find_by_uri("/y").is_some(), Duration::from_secs(2)));

        let mut v = Value::new_i32(9);
        client_registry.replace_current(id, &mut v).unwrap();

        assert!(wait_until(
            || {
                let mut out = Value::Null;
                server_registry.clone_current(id, &mut out).is_ok() && matches!(out, Value::I32(9))
            },
            Duration::from_secs(2)
        ));

        client.destroy();
        server.destroy();
    }

    #[test]
    fn local_change_to_unrelated_id_is_not_suppressed_during_incoming_change() {
        // Two server-owned items, both mirrored to the client. The server
        // repeatedly changes `/a` (arriving on the client as incoming
        // ChangeItem traffic) while the client concurrently changes `/b`
        // locally. If echo suppression were scoped globally instead of
        // per-id, the client's outbound ChangeItem for `/b` could be
        // dropped whenever it raced against the inbound handling of `/a`.
        let server_registry = Arc::new(Registry::new());
        let id_a = server_registry.add("/a", "", "", Value::new_i32(0), None).unwrap();
        let id_b = server_registry.add("/b", "", "", Value::new_i32(0), None).unwrap();

        let (server_t, client_t) = InProcessTransport::pair();
        let client_registry = Arc::new(Registry::new());

        let server =
            Endpoint::new(Role::Server, server_registry.clone(), Arc::new(server_t), Arc::new(RecordingListeners::default()));
        let client =
            Endpoint::new(Role::Client, client_registry.clone(), Arc::new(client_t), Arc::new(RecordingListeners::default()));
        client.subscribe("*").unwrap();
        assert!(wait_until(|| client_registry.find_by_uri("/a").is_some(), Duration::from_secs(2)));
        assert!(wait_until(|| client_registry.find_by_uri("/b").is_some(), Duration::from_secs(2)));

        let server_registry_for_thread = server_registry.clone();
        let driver = thread::spawn(move || {
            for i in 0..50i32 {
                let mut v = Value::new_i32(i);
                server_registry_for_thread.replace_current(id_a, &mut v).unwrap();
                thread::sleep(Duration::from_millis(1));
            }
        });

        for i in 0..50i32 {
            let mut v = Value::new_i32(i);
            client_registry.replace_current(id_b, &mut v).unwrap();
            thread::sleep(Duration::from_millis(1));
        }
        driver.join().unwrap();

        assert!(wait_until(
            || {
                let mut out = Value::Null;
                server_registry.clone_current(id_b, &mut out).is_ok() && matches!(out, Value::I32(49))
            },
            Duration::from_secs(2)
        ));

        client.destroy();
        server.destroy();
    }

    #[test]
    fn disconnect_is_observed_by_the_peer() {
        let (server_t, client_t) = InProcessTransport::pair();
        let server = Endpoint::new(
            Role::Server,
            Arc::new(Registry::new()),
            Arc::new(server_t),
            Arc::new(RecordingListeners::default()),
        );
        let client = Endpoint::new(
            Role::Client,
            Arc::new(Registry::new()),
            Arc::new(client_t),
            Arc::new(RecordingListeners::default()),
        );
        assert!(wait_until(|| client.connection_state() == ConnectionState::Active, Duration::from_secs(2)));
        client.destroy();
        assert!(wait_until(|| server.connection_state() == ConnectionState::Disconnected, Duration::from_secs(2)));
        server.destroy();
    }

    #[test]
    fn vector_item_skipped_until_peer_negotiates_vector_feature() {
        // Both ends advertise the full SUPPORTED_FEATURES list today, so
        // this asserts the happy path: a vector item does reach the peer
        // once negotiation completes.
        let server_registry = Arc::new(Registry::new());
        server_registry.add("/v", "", "", Value::new_vec_i32(&[1, 2, 3]), None).unwrap();
        let (server_t, client_t) = InProcessTransport::pair();
        let client_registry = Arc::new(Registry::new());
        let server =
            Endpoint::new(Role::Server, server_registry.clone(), Arc::new(server_t), Arc::new(RecordingListeners::default()));
        let client = Endpoint::new(Role::Client, client_registry.clone(), Arc::new(client_t), Arc::new(RecordingListeners::default()));
        client.subscribe("*").unwrap();
        assert!(wait_until(|| client_registry.find_by_uri("/v").is_some(), Duration::from_secs(2)));
        assert_eq!(client_registry.get_type(client_registry.find_by_uri("/v").unwrap()), Some(ValueType::VecI32));
        client.destroy();
        server.destroy();
    }
}
