//! OutboundBuffer - bounded partial-write handling for stream peers
//!
//! A peer owns at most the unsent remainder of one message. A remainder is
//! flushed before anything new is attempted; while it cannot be flushed, new
//! messages for that peer are skipped instead of queued.

use std::io::{self, ErrorKind, Write};

/// Result of offering one message to a peer
#[derive(Debug)]
pub enum SendStatus {
    /// The whole message was written
    Sent,
    /// Message skipped or only partly written (remainder kept pending)
    WouldBlock,
    /// Hard failure, the peer is gone
    Failed(io::Error),
}

/// Pending remainder of at most one message
#[derive(Debug, Default)]
pub struct OutboundBuffer {
    pending: Vec<u8>,
}

impl OutboundBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes waiting to be flushed
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Forget the remainder (used when the connection is torn down)
    pub fn clear(&mut self) {
        self.pending.clear();
    }

    /// Flush the pending remainder, then try to write `message`
    pub fn send<W: Write>(&mut self, writer: &mut W, message: &[u8]) -> SendStatus {
        if !self.pending.is_empty() {
            match write_available(writer, &self.pending) {
                Ok(written) => {
                    self.pending.drain(..written);
                    if !self.pending.is_empty() {
                        return SendStatus::WouldBlock;
                    }
                }
                Err(e) => {
                    self.pending.clear();
                    return SendStatus::Failed(e);
                }
            }
        }

        match write_available(writer, message) {
            Ok(written) if written == message.len() => SendStatus::Sent,
            // Nothing went out: drop the message rather than buffer it
            Ok(0) => SendStatus::WouldBlock,
            Ok(written) => {
                self.pending.extend_from_slice(&message[written..]);
                SendStatus::WouldBlock
            }
            Err(e) => SendStatus::Failed(e),
        }
    }
}

/// Write as much of `buf` as the writer accepts without blocking
fn write_available<W: Write>(writer: &mut W, buf: &[u8]) -> io::Result<usize> {
    let mut written = 0;
    while written < buf.len() {
        match writer.write(&buf[written..]) {
            Ok(0) => {
                return Err(io::Error::new(
                    ErrorKind::WriteZero,
                    "peer stopped accepting data",
                ))
            }
            Ok(n) => written += n,
            Err(e) if e.kind() == ErrorKind::WouldBlock => break,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(written)
}
