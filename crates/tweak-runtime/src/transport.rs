//! Transport abstraction. Only one concrete, real backend ships here: a
//! length-prefixed TCP transport built on `std::net` with a dedicated OS
//! thread per Endpoint for its I/O loop. `rpmsg`/`serial` are recognized by
//! `config::TransportKind` but have no implementation here; constructing
//! one returns `TransportError::Unsupported`.

use crate::error::TransportError;
use std::io::{ErrorKind, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Mutex;

/// What an Endpoint requires of its connection. `send`/`recv` operate on
/// whole frames (the Codec's output); framing inside a byte-stream
/// transport like TCP is this trait's implementation's job, not the
/// Codec's.
pub trait Transport: Send + Sync {
    fn send(&self, frame: &[u8]) -> Result<(), TransportError>;
    /// Blocks the calling (I/O) thread until a frame arrives or the
    /// connection closes.
    fn recv(&self) -> Result<Vec<u8>, TransportError>;
    fn shutdown(&self);
}

fn io_err(e: std::io::Error) -> TransportError {
    if e.kind() == ErrorKind::UnexpectedEof || e.kind() == ErrorKind::ConnectionReset {
        TransportError::Closed
    } else {
        TransportError::Io(e.to_string())
    }
}

/// Parses `tcp://host:port/` (or a bare `host:port`) into a
/// `std::net`-compatible address string.
fn parse_tcp_uri(uri: &str) -> Result<String, TransportError> {
    let without_scheme = uri.strip_prefix("tcp://").unwrap_or(uri);
    let addr = without_scheme.trim_end_matches('/');
    if addr.is_empty() {
        return Err(TransportError::Io(format!("empty tcp address in uri {:?}", uri)));
    }
    Ok(addr.to_string())
}

/// Length-prefixed TCP transport: every `send`d frame is written as a
/// `u32` big-endian length followed by the frame bytes; `recv` reverses
/// this. The write half and read half are separate `TcpStream` clones so a
/// blocking `recv` on the I/O thread never stalls a concurrent `send` from
/// the application thread.
pub struct TcpTransport {
    write_half: Mutex<TcpStream>,
    read_half: Mutex<TcpStream>,
}

impl TcpTransport {
    /// Client role: dials `uri`.
    pub fn connect(uri: &str) -> Result<Self, TransportError> {
        let addr = parse_tcp_uri(uri)?;
        let stream = TcpStream::connect(&addr).map_err(io_err)?;
        Self::from_stream(stream)
    }

    /// Server role: binds `uri` and blocks for the one client this spec's
    /// Non-goals scope allows ("one client per server endpoint").
    pub fn listen_and_accept(uri: &str) -> Result<Self, TransportError> {
        let addr = parse_tcp_uri(uri)?;
        let listener = TcpListener::bind(&addr).map_err(io_err)?;
        let (stream, _peer) = listener.accept().map_err(io_err)?;
        Self::from_stream(stream)
    }

    fn from_stream(stream: TcpStream) -> Result<Self, TransportError> {
        stream.set_nodelay(true).map_err(io_err)?;
        let read_half = stream.try_clone().map_err(io_err)?;
        Ok(TcpTransport { write_half: Mutex::new(stream), read_half: Mutex::new(read_half) })
    }
}

impl Transport for TcpTransport {
    fn send(&self, frame: &[u8]) -> Result<(), TransportError> {
        let mut w = self.write_half.lock().expect("tcp write lock poisoned");
        w.write_all(&(frame.len() as u32).to_be_bytes()).map_err(io_err)?;
        w.write_all(frame).map_err(io_err)
    }

    fn recv(&self) -> Result<Vec<u8>, TransportError> {
        let mut r = self.read_half.lock().expect("tcp read lock poisoned");
        let mut len_buf = [0u8; 4];
        r.read_exact(&mut len_buf).map_err(io_err)?;
        let len = u32::from_be_bytes(len_buf) as usize;
        let mut buf = vec![0u8; len];
        r.read_exact(&mut buf).map_err(io_err)?;
        Ok(buf)
    }

    fn shutdown(&self) {
        let w = self.write_half.lock().expect("tcp write lock poisoned");
        let _ = w.shutdown(std::net::Shutdown::Both);
    }
}

/// In-process transport backed by a pair of `std::sync::mpsc` channels.
/// Lets the Endpoint protocol state machine be exercised deterministically
/// without opening real sockets.
pub struct InProcessTransport {
    tx: Mutex<mpsc::Sender<Vec<u8>>>,
    rx: Mutex<mpsc::Receiver<Vec<u8>>>,
    closed: AtomicBool,
}

impl InProcessTransport {
    pub fn pair() -> (InProcessTransport, InProcessTransport) {
        let (tx_a, rx_b) = mpsc::channel();
        let (tx_b, rx_a) = mpsc::channel();
        (
            InProcessTransport { tx: Mutex::new(tx_a), rx: Mutex::new(rx_a), closed: AtomicBool::new(false) },
            InProcessTransport { tx: Mutex::new(tx_b), rx: Mutex::new(rx_b), closed: AtomicBool::new(false) },
        )
    }
}

impl Transport for InProcessTransport {
    fn send(&self, frame: &[u8]) -> Result<(), TransportError> {
        if self.closed.load(Ordering::Relaxed) {
            return Err(TransportError::Closed);
        }
        self.tx
            .lock()
            .expect("channel lock poisoned")
            .send(frame.to_vec())
            .map_err(|_| TransportError::Closed)
    }

    fn recv(&self) -> Result<Vec<u8>, TransportError> {
        self.rx.lock().expect("channel lock poisoned").recv().map_err(|_| TransportError::Closed)
    }

    fn shutdown(&self) {
        self.closed.store(true, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn parse_uri_strips_scheme_and_trailing_slash() {
        assert_eq!(parse_tcp_uri("tcp://127.0.0.1:7777/").unwrap(), "127.0.0.1:7777");
        assert_eq!(parse_tcp_uri("127.0.0.1:7777").unwrap(), "127.0.0.1:7777");
    }

    #[test]
    fn tcp_transport_round_trips_a_frame() {
        let server = thread::spawn(|| TcpTransport::listen_and_accept("127.0.0.1:17711"));
        thread::sleep(std::time::Duration::from_millis(50));
        let client = TcpTransport::connect("tcp://127.0.0.1:17711/").unwrap();
        let server = server.join().unwrap().unwrap();

        client.send(b"hello").unwrap();
        assert_eq!(server.recv().unwrap(), b"hello");

        server.send(b"world").unwrap();
        assert_eq!(client.recv().unwrap(), b"world");
    }

    #[test]
    fn tcp_transport_recv_errors_after_shutdown() {
        let server = thread::spawn(|| TcpTransport::listen_and_accept("127.0.0.1:17712"));
        thread::sleep(std::time::Duration::from_millis(50));
        let client = TcpTransport::connect("tcp://127.0.0.1:17712/").unwrap();
        let server = server.join().unwrap().unwrap();
        client.shutdown();
        assert!(server.recv().is_err());
    }

    #[test]
    fn in_process_pair_round_trips_both_directions() {
        let (a, b) = InProcessTransport::pair();
        a.send(b"ping").unwrap();
        assert_eq!(b.recv().unwrap(), b"ping");
        b.send(b"pong").unwrap();
        assert_eq!(a.recv().unwrap(), b"pong");
    }

    #[test]
    fn in_process_send_after_shutdown_fails() {
        let (a, _b) = InProcessTransport::pair();
        a.shutdown();
        assert!(a.send(b"x").is_err());
    }
}
