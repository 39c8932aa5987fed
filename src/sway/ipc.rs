//! Low-level sway IPC transport.
//!
//! Talks to sway directly through the Unix socket named by `$SWAYSOCK`
//! using the i3-ipc framing:
//!
//! ```text
//! "i3-ipc" | payload length (u32, native endian) | message type (u32) | payload
//! ```
//!
//! Requests open a fresh connection per call and are bounded by a short
//! read/write timeout.  Only the event subscription keeps its connection
//! open, and it blocks without a timeout.

use std::io::{ErrorKind, Read, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::time::Duration;

const MAGIC: &[u8; 6] = b"i3-ipc";
const HEADER_LEN: usize = MAGIC.len() + 8;

/// Upper bound for a single payload; anything bigger is treated as garbage.
const MAX_PAYLOAD: usize = 64 * 1024 * 1024;

/// Event type bit set by sway on every event message.
pub const EVENT_BIT: u32 = 0x8000_0000;
pub const EVENT_WORKSPACE: u32 = EVENT_BIT;
pub const EVENT_WINDOW: u32 = EVENT_BIT | 3;

/// Request message types we use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum MessageType {
    RunCommand = 0,
    GetWorkspaces = 1,
    Subscribe = 2,
    GetOutputs = 3,
    GetTree = 4,
}

/// Errors that can occur when talking to sway.
#[derive(Debug, thiserror::Error)]
pub enum IpcError {
    #[error("SWAYSOCK not set")]
    NoSocket,
    #[error("connect to {0}: {1}")]
    Connect(PathBuf, std::io::Error),
    #[error("compositor did not answer within {0:?}")]
    Timeout(Duration),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed frame: {0}")]
    Frame(String),
    #[error("parse: {0}")]
    Json(#[from] serde_json::Error),
    #[error("command failed: {0}")]
    Rejected(String),
    #[error(transparent)]
    Extract(#[from] super::tree::ExtractError),
}

impl IpcError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, IpcError::Timeout(_))
    }
}

/// Resolve the sway IPC socket path from `$SWAYSOCK`.
pub fn socket_path() -> Result<PathBuf, IpcError> {
    std::env::var_os("SWAYSOCK")
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .ok_or(IpcError::NoSocket)
}

/// One open IPC connection.
pub struct Connection {
    stream: UnixStream,
    timeout: Option<Duration>,
}

impl Connection {
    /// Connect to `path`.  With `Some(timeout)` every read and write is
    /// bounded; with `None` reads block indefinitely (event streams).
    pub fn open(path: &Path, timeout: Option<Duration>) -> Result<Self, IpcError> {
        let stream = UnixStream::connect(path)
            .map_err(|e| IpcError::Connect(path.to_path_buf(), e))?;
        stream.set_read_timeout(timeout)?;
        stream.set_write_timeout(timeout)?;
        Ok(Self { stream, timeout })
    }

    /// Drop the read/write deadline; used once a subscription is confirmed.
    pub fn clear_timeout(&mut self) -> Result<(), IpcError> {
        self.stream.set_read_timeout(None)?;
        self.stream.set_write_timeout(None)?;
        self.timeout = None;
        Ok(())
    }

    /// A second handle to the same socket, used to shut a blocked reader down.
    pub fn try_clone_stream(&self) -> Result<UnixStream, IpcError> {
        Ok(self.stream.try_clone()?)
    }

    /// Send one request and return the payload of its reply.
    pub fn request(&mut self, kind: MessageType, payload: &str) -> Result<Vec<u8>, IpcError> {
        self.send(kind as u32, payload.as_bytes())?;
        let (reply_kind, body) = self.read_message()?;
        if reply_kind != kind as u32 {
            return Err(IpcError::Frame(format!(
                "expected reply type {}, got {:#x}",
                kind as u32, reply_kind
            )));
        }
        Ok(body)
    }

    fn send(&mut self, kind: u32, payload: &[u8]) -> Result<(), IpcError> {
        let frame = encode_frame(kind, payload);
        self.stream
            .write_all(&frame)
            .map_err(|e| self.map_io(e))
    }

    /// Read one complete message: `(type, payload)`.
    pub fn read_message(&mut self) -> Result<(u32, Vec<u8>), IpcError> {
        let mut header = [0u8; HEADER_LEN];
        self.stream
            .read_exact(&mut header)
            .map_err(|e| self.map_io(e))?;
        let (len, kind) = decode_header(&header)?;
        let mut body = vec![0u8; len];
        self.stream
            .read_exact(&mut body)
            .map_err(|e| self.map_io(e))?;
        Ok((kind, body))
    }

    fn map_io(&self, e: std::io::Error) -> IpcError {
        match (e.kind(), self.timeout) {
            (ErrorKind::WouldBlock | ErrorKind::TimedOut, Some(t)) => IpcError::Timeout(t),
            _ => IpcError::Io(e),
        }
    }
}

/// Build a complete frame for `kind` carrying `payload`.
pub fn encode_frame(kind: u32, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
    frame.extend_from_slice(MAGIC);
    frame.extend_from_slice(&(payload.len() as u32).to_ne_bytes());
    frame.extend_from_slice(&kind.to_ne_bytes());
    frame.extend_from_slice(payload);
    frame
}

/// Validate a header and return `(payload length, message type)`.
pub fn decode_header(header: &[u8]) -> Result<(usize, u32), IpcError> {
    if header.len() < HEADER_LEN {
        return Err(IpcError::Frame(format!("short header ({} bytes)", header.len())));
    }
    if &header[..MAGIC.len()] != MAGIC {
        return Err(IpcError::Frame("bad magic".into()));
    }
    let mut len = [0u8; 4];
    len.copy_from_slice(&header[6..10]);
    let mut kind = [0u8; 4];
    kind.copy_from_slice(&header[10..14]);
    let len = u32::from_ne_bytes(len) as usize;
    if len > MAX_PAYLOAD {
        return Err(IpcError::Frame(format!("payload of {} bytes", len)));
    }
    Ok((len, u32::from_ne_bytes(kind)))
}


#[cfg(test)]
mod tests {
    use super::fake::*;
    use super::*;

    #[test]
    fn header_round_trip() {
        let frame = encode_frame(MessageType::GetTree as u32, b"");
        assert_eq!(frame.len(), HEADER_LEN);
        assert_eq!(decode_header(&frame).unwrap(), (0, 4));
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut frame = encode_frame(0, b"[]");
        frame[0] = b'x';
        assert!(matches!(decode_header(&frame), Err(IpcError::Frame(_))));
    }

    #[test]
    fn request_returns_reply_payload() {
        let path = serve_replies(vec![(MessageType::GetWorkspaces, "[]".into())]);
        let mut conn = Connection::open(&path, Some(Duration::from_millis(500))).unwrap();
        let body = conn.request(MessageType::GetWorkspaces, "").unwrap();
        assert_eq!(body, b"[]");
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn silent_compositor_times_out() {
        let path = serve(|stream| {
            // Accept, then never answer.
            std::thread::sleep(Duration::from_millis(500));
            drop(stream);
        });
        let mut conn = Connection::open(&path, Some(Duration::from_millis(50))).unwrap();
        let err = conn.request(MessageType::GetTree, "").unwrap_err();
        assert!(err.is_timeout(), "unexpected error: {}", err);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn missing_socket_fails_to_connect() {
        let path = tmp_socket_path();
        let err = Connection::open(&path, Some(Duration::from_millis(50))).err();
        assert!(matches!(err, Some(IpcError::Connect(_, _))));
    }
}
