//! I/O utilities for sending and receiving protocol messages
//!
//! The wire format is one JSON-encoded message per line, terminated by `\n`.
//! Readers enforce a maximum line length so a misbehaving peer cannot make
//! the client buffer unbounded data.

use std::fmt;
use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt};

use crate::protocol::{ClientMessage, ServerMessage};

/// Maximum length of a single wire line in bytes.
///
/// The largest legitimate message is an `AudioMessage` carrying a base64
/// clip. A 30-second mono clip of f32 samples at 48 kHz is ~5.7 MiB raw,
/// ~7.7 MiB base64, so 8 MiB leaves headroom for the JSON envelope.
pub const MAX_LINE_LENGTH: usize = 8 * 1024 * 1024;

// =============================================================================
// Errors
// =============================================================================

/// Errors produced while reading or writing wire messages
#[derive(Debug)]
pub enum WireError {
    /// Underlying I/O failure
    Io(io::Error),
    /// A line exceeded [`MAX_LINE_LENGTH`]
    LineTooLong(usize),
    /// A line was not valid JSON for the expected message type
    InvalidJson(String),
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireError::Io(e) => write!(f, "I/O error: {e}"),
            WireError::LineTooLong(len) => {
                write!(f, "line of {len} bytes exceeds {MAX_LINE_LENGTH} byte limit")
            }
            WireError::InvalidJson(msg) => write!(f, "invalid message: {msg}"),
        }
    }
}

impl std::error::Error for WireError {}

impl From<io::Error> for WireError {
    fn from(err: io::Error) -> Self {
        WireError::Io(err)
    }
}

// =============================================================================
// Message Sending
// =============================================================================

/// Send a `ClientMessage` to the server as one JSON line
pub async fn send_client_message<W>(writer: &mut W, message: &ClientMessage) -> io::Result<()>
where
    W: AsyncWriteExt + Unpin,
{
    let mut line =
        serde_json::to_vec(message).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    line.push(b'\n');
    writer.write_all(&line).await?;
    writer.flush().await
}

/// Send a `ServerMessage` to a client as one JSON line
pub async fn send_server_message<W>(writer: &mut W, message: &ServerMessage) -> io::Result<()>
where
    W: AsyncWriteExt + Unpin,
{
    let mut line =
        serde_json::to_vec(message).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    line.push(b'\n');
    writer.write_all(&line).await?;
    writer.flush().await
}

// =============================================================================
// Message Receiving
// =============================================================================

/// Read a `ServerMessage` from the stream
///
/// Returns `Ok(None)` if the connection was cleanly closed at a message
/// boundary.
pub async fn read_server_message<R>(reader: &mut R) -> Result<Option<ServerMessage>, WireError>
where
    R: AsyncBufRead + Unpin,
{
    match read_line(reader).await? {
        Some(line) => {
            let message =
                serde_json::from_slice(&line).map_err(|e| WireError::InvalidJson(e.to_string()))?;
            Ok(Some(message))
        }
        None => Ok(None),
    }
}

/// Read a `ClientMessage` from the stream
///
/// Returns `Ok(None)` if the connection was cleanly closed at a message
/// boundary.
pub async fn read_client_message<R>(reader: &mut R) -> Result<Option<ClientMessage>, WireError>
where
    R: AsyncBufRead + Unpin,
{
    match read_line(reader).await? {
        Some(line) => {
            let message =
                serde_json::from_slice(&line).map_err(|e| WireError::InvalidJson(e.to_string()))?;
            Ok(Some(message))
        }
        None => Ok(None),
    }
}

/// Read one line, enforcing the length limit
///
/// Returns `Ok(None)` on clean EOF before any bytes of a new line.
/// A missing trailing newline at EOF is accepted so a peer that closes
/// immediately after its last message is still read completely.
async fn read_line<R>(reader: &mut R) -> Result<Option<Vec<u8>>, WireError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::new();
    // take() bounds how much one read_until can buffer; one extra byte
    // distinguishes "exactly at the limit" from "over it".
    let mut limited = (&mut *reader).take(MAX_LINE_LENGTH as u64 + 1);
    let n = limited.read_until(b'\n', &mut line).await?;

    if n == 0 {
        return Ok(None);
    }
    if line.last() == Some(&b'\n') {
        line.pop();
    }
    if line.len() > MAX_LINE_LENGTH {
        return Err(WireError::LineTooLong(line.len()));
    }
    Ok(Some(line))
}
