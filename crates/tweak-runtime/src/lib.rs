//! Registry, wire codec, transport and Endpoint protocol state machine for
//! the tweak runtime, plus the ambient logging and configuration facilities
//! that sit alongside them.

pub mod codec;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod log;
pub mod registry;
pub mod transport;

pub use codec::{decode, encode, type_requires_feature, Message};
pub use config::{Config, Role, TransportKind};
pub use endpoint::{connect, ConnectionState, Endpoint, EndpointListeners, NullListeners};
pub use error::{Error, TransportError};
pub use log::{emit, reset_sink, set_sink, Level, Record};
pub use registry::{ChangeHook, Cookie, ItemSnapshot, Registry};
pub use transport::{InProcessTransport, TcpTransport, Transport};
