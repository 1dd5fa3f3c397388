//! Connection Handler
//!
//! Handles individual client connections.

use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Result, RomError};
use crate::protocol::Protocol;
use crate::store::Store;

/// Longest request line accepted, terminator included (64 KB)
pub const MAX_LINE_SIZE: usize = 64 * 1024;

/// Handles a single client connection
pub struct Connection {
    /// TCP stream reader (buffered for efficiency)
    reader: BufReader<TcpStream>,

    /// TCP stream writer (buffered for efficiency)
    writer: BufWriter<TcpStream>,

    /// Shared read-only store
    store: Arc<Store>,

    /// Shared stateless codec
    protocol: Arc<dyn Protocol>,

    /// Peer address for logging
    peer_addr: String,
}

/// Disconnects that are part of normal client behaviour
fn is_disconnect(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            // Read timeout (Windows reports TimedOut instead of WouldBlock)
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::TimedOut
    )
}

impl Connection {
    /// Create a new connection handler
    ///
    /// Sets up buffered I/O on two handles of the same socket
    pub fn new(stream: TcpStream, store: Arc<Store>, protocol: Arc<dyn Protocol>) -> Result<Self> {
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        // Disable Nagle's algorithm for low latency
        stream.set_nodelay(true)?;

        let read_stream = stream.try_clone()?;
        let write_stream = stream;

        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(write_stream),
            store,
            protocol,
            peer_addr,
        })
    }

    /// Configure connection timeouts (0 = none)
    pub fn set_timeouts(&mut self, read_ms: u64, write_ms: u64) -> Result<()> {
        if read_ms > 0 {
            self.reader
                .get_ref()
                .set_read_timeout(Some(Duration::from_millis(read_ms)))?;
        }
        if write_ms > 0 {
            self.writer
                .get_ref()
                .set_write_timeout(Some(Duration::from_millis(write_ms)))?;
        }
        Ok(())
    }

    /// Handle the connection (blocking until closed)
    ///
    /// Serves one request per line. Returns `Ok` when the client goes away,
    /// `Err` on any other I/O failure. Either way only this connection ends.
    pub fn handle(&mut self) -> Result<()> {
        tracing::debug!(peer = %self.peer_addr, "connection established");

        let mut line = Vec::with_capacity(256);
        loop {
            line.clear();

            let read = (&mut self.reader)
                .take(MAX_LINE_SIZE as u64)
                .read_until(b'\n', &mut line);

            match read {
                Ok(0) => {
                    tracing::debug!(peer = %self.peer_addr, "client disconnected");
                    return Ok(());
                }
                Ok(_) if !line.ends_with(b"\n") && line.len() >= MAX_LINE_SIZE => {
                    tracing::warn!(peer = %self.peer_addr, "request line too long, closing");
                    return Err(RomError::Network(format!(
                        "request line exceeds {} bytes",
                        MAX_LINE_SIZE
                    )));
                }
                Ok(_) => {}
                Err(e) if is_disconnect(e.kind()) => {
                    tracing::debug!(peer = %self.peer_addr, error = %e, "connection closed");
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(peer = %self.peer_addr, error = %e, "error reading from client");
                    return Err(e.into());
                }
            }

            if let Err(e) = self.serve_line(&line) {
                if let RomError::Io(ref io_err) = e {
                    if is_disconnect(io_err.kind()) {
                        tracing::debug!(
                            peer = %self.peer_addr,
                            error = %e,
                            "client disconnected before response could be sent"
                        );
                        return Ok(());
                    }
                }
                tracing::warn!(peer = %self.peer_addr, error = %e, "error writing to client");
                return Err(e);
            }
        }
    }

    /// Answer one request line.
    ///
    /// Invalid commands get no output at all; found keys get a record each,
    /// misses nothing, and the whole request one terminator.
    fn serve_line(&mut self, line: &[u8]) -> Result<()> {
        let keys = match self.protocol.parse(line) {
            Ok(keys) => keys,
            Err(e) => {
                tracing::debug!(peer = %self.peer_addr, error = %e, "ignoring request");
                return Ok(());
            }
        };

        tracing::trace!(peer = %self.peer_addr, keys = keys.len(), "serving request");

        for key in &keys {
            if let Ok(value) = self.store.get(key) {
                self.protocol.reply(&mut self.writer, key, &value)?;
            }
        }
        self.protocol.finish(&mut self.writer)?;
        self.writer.flush()?;

        Ok(())
    }
}
