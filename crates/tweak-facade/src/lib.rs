//! Typed public API over the tweak runtime. Hides `tweak_core::Value`
//! entirely: every operation here is a concrete Rust type in, concrete
//! Rust type out — a thin wrapper hiding a protocol client behind
//! ergonomic calls, whose only job is a clean API over an inner engine.
//!
//! One `Facade` owns exactly one `Registry` and one `Endpoint`: an
//! Endpoint is instantiated from three strings (transport kind, params,
//! uri), and that is this type's constructor.

use std::sync::Arc;
use tweak_core::Value;
use tweak_runtime::{Config, Cookie, Endpoint, EndpointListeners, Error, Registry, Role};

pub use tweak_runtime::{ConnectionState, NullListeners, TransportKind};

/// Owns the Registry and the single Endpoint connecting it to a peer.
/// `destroy` tears both down; dropping a `Facade` without calling it first
/// leaks the I/O thread's join (the thread itself still exits once the
/// transport is closed by the OS on process exit, but a clean shutdown
/// should call `destroy`).
pub struct Facade {
    registry: Arc<Registry>,
    endpoint: Option<Endpoint>,
}

impl Facade {
    /// Parses `(transport_kind, params, uri)` and connects (or, for the
    /// server role, binds and accepts) immediately on this call — there
    /// is no separate "dial later" step.
    pub fn new(
        transport_kind: &str,
        params: &str,
        uri: &str,
        listeners: Arc<dyn EndpointListeners>,
    ) -> Result<Facade, Error> {
        let config = Config::parse(transport_kind, params, uri);
        let registry = Arc::new(Registry::new());
        let endpoint =
            tweak_runtime::connect(config.role, &config.transport_kind, &config.uri, registry.clone(), listeners)?;
        Ok(Facade { registry, endpoint: Some(endpoint) })
    }

    pub fn role(&self) -> Role {
        self.endpoint.as_ref().map(|e| e.role()).unwrap_or(Role::Client)
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.endpoint.as_ref().map(|e| e.connection_state()).unwrap_or(ConnectionState::Disconnected)
    }

    /// Client role: ask the connected server to publish its items.
    pub fn subscribe(&self, pattern: &str) -> Result<(), Error> {
        self.endpoint().subscribe(pattern)
    }

    /// Client role: blocks until every uri has a registry id or the
    /// timeout (`u64::MAX` for none) elapses.
    pub fn wait_uris(&self, uris: &[&str], timeout_millis: u64) -> Result<Vec<u64>, Error> {
        self.endpoint().wait_uris(uris, timeout_millis)
    }

    pub fn item_cookie(&self, id: u64) -> Option<Cookie> {
        self.registry.item_cookie(id)
    }

    /// Removes an item; on the server role, also tells the peer. The
    /// `RemoveItem` message is handed to the outbound queue before the
    /// registry slot is released, so a failed send (e.g. a disconnected
    /// peer) leaves local and remote state in agreement instead of
    /// removing the item locally while the peer never heard about it.
    pub fn remove_item(&self, id: u64) -> Result<(), Error> {
        if self.registry.snapshot(id).is_none() {
            return Err(Error::ItemNotFound);
        }
        if self.role() == Role::Server {
            self.endpoint().on_item_removed(id)?;
        }
        if !self.registry.remove(id) {
            return Err(Error::ItemNotFound);
        }
        Ok(())
    }

    pub fn find_by_uri(&self, uri: &str) -> Option<u64> {
        self.registry.find_by_uri(uri)
    }

    /// Shuts the Endpoint's transport down and joins its I/O thread.
    pub fn destroy(mut self) {
        if let Some(endpoint) = self.endpoint.take() {
            endpoint.destroy();
        }
    }

    fn endpoint(&self) -> &Endpoint {
        self.endpoint.as_ref().expect("Facade used after destroy()")
    }

    fn publish_if_server(&self, id: u64) -> Result<(), Error> {
        if self.role() == Role::Server {
            self.endpoint().on_item_added(id)?;
        }
        Ok(())
    }

    fn get_mismatch_default<T: Default>(&self, id: u64, wanted: &str) -> T {
        tweak_runtime::tweak_log!(
            tweak_runtime::Level::Warn,
            "get on item {} requested {} but stored type differs",
            id,
            wanted
        );
        T::default()
    }

    pub fn get_vector_item_count(&self, id: u64) -> usize {
        let mut v = Value::Null;
        match self.registry.clone_current(id, &mut v) {
            Ok(()) => v.item_count(),
            Err(_) => 0,
        }
    }

    /// Creates a string item with initial value `initial`.
    pub fn create_string(&self, uri: &str, description: &str, meta_json: &str, initial: &str) -> Result<u64, Error> {
        let id = self.registry.add(uri, description, meta_json, Value::new_string(initial), None)?;
        self.publish_if_server(id)?;
        Ok(id)
    }

    pub fn set_string(&self, id: u64, value: &str) -> Result<(), Error> {
        let mut v = Value::new_string(value);
        self.registry.replace_current(id, &mut v)?;
        Ok(())
    }

    /// Copies the item's current string value, UTF-8, into `buf`. If it
    /// does not fit, the copy is truncated at a character boundary and the
    /// last three bytes of `buf` become the single-character ellipsis
    /// `…`. Returns the number of bytes written.
    pub fn get_string(&self, id: u64, buf: &mut [u8]) -> usize {
        let mut v = Value::Null;
        if self.registry.clone_current(id, &mut v).is_err() {
            return 0;
        }
        let Value::String(s) = &v else {
            return self.get_mismatch_default::<usize>(id, "string");
        };
        let bytes = s.as_bytes();
        if bytes.len() <= buf.len() {
            buf[..bytes.len()].copy_from_slice(bytes);
            return bytes.len();
        }
        if buf.len() < ELLIPSIS.len() {
            return 0;
        }
        let budget = buf.len() - ELLIPSIS.len();
        let mut cut = budget.min(bytes.len());
        while cut > 0 && !s.as_str().is_char_boundary(cut) {
            cut -= 1;
        }
        buf[..cut].copy_from_slice(&bytes[..cut]);
        buf[cut..cut + ELLIPSIS.len()].copy_from_slice(ELLIPSIS);
        cut + ELLIPSIS.len()
    }
}

const ELLIPSIS: &[u8] = "…".as_bytes();

// A hand-rolled "per type" expansion (no proc-macro dependency in this
// workspace) generating `add_scalar_T`/`add_scalar_T_ex`/`set_scalar_T`/
// `get_scalar_T`/`create_vector_T`/`set_vector_T`/`get_vector_T` for one
// concrete scalar type at a time.
macro_rules! scalar_family {
    ($add:ident, $add_ex:ident, $set:ident, $get:ident, $create_vec:ident, $set_vec:ident, $get_vec:ident,
     $ty:ty, $variant:ident, $new:ident, $vec_variant:ident, $vec_new:ident) => {
        impl Facade {
            pub fn $add(&self, uri: &str, description: &str, meta_json: &str, initial: $ty) -> Result<u64, Error> {
                let id = self.registry.add(uri, description, meta_json, Value::$new(initial), None)?;
                self.publish_if_server(id)?;
                Ok(id)
            }

            pub fn $add_ex(
                &self,
                uri: &str,
                description: &str,
                meta_json: &str,
                initial: $ty,
                cookie: Cookie,
            ) -> Result<u64, Error> {
                let id = self.registry.add(uri, description, meta_json, Value::$new(initial), Some(cookie))?;
                self.publish_if_server(id)?;
                Ok(id)
            }

            pub fn $set(&self, id: u64, value: $ty) -> Result<(), Error> {
                let mut v = Value::$new(value);
                self.registry.replace_current(id, &mut v)?;
                Ok(())
            }

            /// Returns the item's current value, or `<$ty>::default()` with
            /// a logged warning if `id` does not hold a `$ty`. Returns the
            /// default for T and logs a type-mismatch error; it does not
            /// coerce.
            pub fn $get(&self, id: u64) -> $ty {
                let mut v = Value::Null;
                if self.registry.clone_current(id, &mut v).is_err() {
                    return self.get_mismatch_default(id, stringify!($ty));
                }
                match v {
                    Value::$variant(x) => x,
                    _ => self.get_mismatch_default(id, stringify!($ty)),
                }
            }

            pub fn $create_vec(
                &self,
                uri: &str,
                description: &str,
                meta_json: &str,
                initial: &[$ty],
            ) -> Result<u64, Error> {
                let id = self.registry.add(uri, description, meta_json, Value::$vec_new(initial), None)?;
                self.publish_if_server(id)?;
                Ok(id)
            }

            pub fn $set_vec(&self, id: u64, values: &[$ty]) -> Result<(), Error> {
                let mut v = Value::$vec_new(values);
                self.registry.replace_current(id, &mut v)?;
                Ok(())
            }

            /// Copies up to `out.len()` elements into `out`, returning the
            /// number written. `0` if `id` is not a `$ty` vector.
            pub fn $get_vec(&self, id: u64, out: &mut [$ty]) -> usize {
                let mut v = Value::Null;
                if self.registry.clone_current(id, &mut v).is_err() {
                    return 0;
                }
                match v {
                    Value::$vec_variant(buf) => {
                        let src = buf.as_slice();
                        let n = src.len().min(out.len());
                        out[..n].copy_from_slice(&src[..n]);
                        n
                    }
                    _ => 0,
                }
            }
        }
    };
}

scalar_family!(
    add_scalar_i8, add_scalar_i8_ex, set_scalar_i8, get_scalar_i8,
    create_vector_i8, set_vector_i8, get_vector_i8,
    i8, I8, new_i8, VecI8, new_vec_i8
);
scalar_family!(
    add_scalar_i16, add_scalar_i16_ex, set_scalar_i16, get_scalar_i16,
    create_vector_i16, set_vector_i16, get_vector_i16,
    i16, I16, new_i16, VecI16, new_vec_i16
);
scalar_family!(
    add_scalar_i32, add_scalar_i32_ex, set_scalar_i32, get_scalar_i32,
    create_vector_i32, set_vector_i32, get_vector_i32,
    i32, I32, new_i32, VecI32, new_vec_i32
);
scalar_family!(
    add_scalar_i64, add_scalar_i64_ex, set_scalar_i64, get_scalar_i64,
    create_vector_i64, set_vector_i64, get_vector_i64,
    i64, I64, new_i64, VecI64, new_vec_i64
);
scalar_family!(
    add_scalar_u8, add_scalar_u8_ex, set_scalar_u8, get_scalar_u8,
    create_vector_u8, set_vector_u8, get_vector_u8,
    u8, U8, new_u8, VecU8, new_vec_u8
);
scalar_family!(
    add_scalar_u16, add_scalar_u16_ex, set_scalar_u16, get_scalar_u16,
    create_vector_u16, set_vector_u16, get_vector_u16,
    u16, U16, new_u16, VecU16, new_vec_u16
);
scalar_family!(
    add_scalar_u32, add_scalar_u32_ex, set_scalar_u32, get_scalar_u32,
    create_vector_u32, set_vector_u32, get_vector_u32,
    u32, U32, new_u32, VecU32, new_vec_u32
);
scalar_family!(
    add_scalar_u64, add_scalar_u64_ex, set_scalar_u64, get_scalar_u64,
    create_vector_u64, set_vector_u64, get_vector_u64,
    u64, U64, new_u64, VecU64, new_vec_u64
);
scalar_family!(
    add_scalar_f32, add_scalar_f32_ex, set_scalar_f32, get_scalar_f32,
    create_vector_f32, set_vector_f32, get_vector_f32,
    f32, F32, new_f32, VecF32, new_vec_f32
);
scalar_family!(
    add_scalar_f64, add_scalar_f64_ex, set_scalar_f64, get_scalar_f64,
    create_vector_f64, set_vector_f64, get_vector_f64,
    f64, F64, new_f64, VecF64, new_vec_f64
);

impl Facade {
    pub fn add_scalar_bool(&self, uri: &str, description: &str, meta_json: &str, initial: bool) -> Result<u64, Error> {
        let id = self.registry.add(uri, description, meta_json, Value::new_bool(initial), None)?;
        self.publish_if_server(id)?;
        Ok(id)
    }

    pub fn add_scalar_bool_ex(
        &self,
        uri: &str,
        description: &str,
        meta_json: &str,
        initial: bool,
        cookie: Cookie,
    ) -> Result<u64, Error> {
        let id = self.registry.add(uri, description, meta_json, Value::new_bool(initial), Some(cookie))?;
        self.publish_if_server(id)?;
        Ok(id)
    }

    pub fn set_scalar_bool(&self, id: u64, value: bool) -> Result<(), Error> {
        let mut v = Value::new_bool(value);
        self.registry.replace_current(id, &mut v)?;
        Ok(())
    }

    pub fn get_scalar_bool(&self, id: u64) -> bool {
        let mut v = Value::Null;
        if self.registry.clone_current(id, &mut v).is_err() {
            return self.get_mismatch_default(id, "bool");
        }
        match v {
            Value::Bool(x) => x,
            _ => self.get_mismatch_default(id, "bool"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tweak_runtime::NullListeners;

    fn standalone_server() -> Facade {
        // A server-role Facade whose Endpoint has no peer yet; item
        // operations still succeed against the Registry — set_* with a
        // disconnected endpoint silently succeeds.
        // `connect` requires an actual listener socket, so these tests
        // drive the Registry-backed methods directly through a Facade
        // built over an in-process pair with nobody on the other end
        // driving it — sufficient to exercise the typed API surface.
        let registry = Arc::new(Registry::new());
        let (a, _b) = tweak_runtime::InProcessTransport::pair();
        let endpoint = Endpoint::new(Role::Server, registry.clone(), Arc::new(a), Arc::new(NullListeners));
        Facade { registry, endpoint: Some(endpoint) }
    }

    #[test]
    fn scalar_round_trip() {
        let f = standalone_server();
        let id = f.add_scalar_i32("/gain", "", "", 7).unwrap();
        assert_eq!(f.get_scalar_i32(id), 7);
        f.set_scalar_i32(id, 9).unwrap();
        assert_eq!(f.get_scalar_i32(id), 9);
    }

    #[test]
    fn get_scalar_type_mismatch_returns_default_not_coerced() {
        let f = standalone_server();
        let id = f.add_scalar_f32("/x", "", "", 1.5).unwrap();
        assert_eq!(f.get_scalar_i32(id), 0);
        assert_eq!(f.get_scalar_f32(id), 1.5);
    }

    #[test]
    fn vector_round_trip_and_truncating_read() {
        let f = standalone_server();
        let id = f.create_vector_i32("/v", "", "", &[1, 2, 3]).unwrap();
        assert_eq!(f.get_vector_item_count(id), 3);
        let mut out = [0i32; 2];
        assert_eq!(f.get_vector_i32(id, &mut out), 2);
        assert_eq!(out, [1, 2]);
        let mut out = [0i32; 5];
        assert_eq!(f.get_vector_i32(id, &mut out), 3);
        assert_eq!(&out[..3], &[1, 2, 3]);
    }

    #[test]
    fn string_round_trip() {
        let f = standalone_server();
        let id = f.create_string("/name", "", "", "hello").unwrap();
        let mut buf = [0u8; 16];
        let n = f.get_string(id, &mut buf);
        assert_eq!(&buf[..n], b"hello");
        f.set_string(id, "goodbye").unwrap();
        let n = f.get_string(id, &mut buf);
        assert_eq!(&buf[..n], b"goodbye");
    }

    #[test]
    fn string_read_truncates_with_ellipsis_when_buffer_is_small() {
        let f = standalone_server();
        let id = f.create_string("/s", "", "", "hello world").unwrap();
        let mut buf = [0u8; 7];
        let n = f.get_string(id, &mut buf);
        assert_eq!(n, 7);
        assert_eq!(&buf[..n], "hell…".as_bytes());
    }

    #[test]
    fn remove_item_then_not_found() {
        let f = standalone_server();
        let id = f.add_scalar_bool("/b", "", "", true).unwrap();
        f.remove_item(id).unwrap();
        assert!(f.find_by_uri("/b").is_none());
        assert_eq!(f.remove_item(id).unwrap_err(), Error::ItemNotFound);
    }
}
