//! Protocol Module
//!
//! Translates between wire bytes and requested keys / found values.
//!
//! A protocol is stateless: the server shares one `Arc<dyn Protocol>`
//! across every connection.
//!
//! ## Supported Protocols
//! - `memcached`: `get` / `gets` retrieval (see [`codec`])

mod codec;
mod command;
mod response;

use std::io::{self, Write};
use std::sync::Arc;

use crate::config::ProtocolKind;
use crate::error::Result;

pub use codec::{
    encode_request, parse_command, read_values, write_request, write_value, MemcachedProtocol,
    CRLF, END, MAX_VALUE_SIZE,
};
pub use command::{Command, Verb};
pub use response::ValueRecord;

/// Server-side wire codec
pub trait Protocol: Send + Sync {
    /// Parse one request line into the keys to look up, in order.
    /// Unknown commands fail with `RomError::InvalidCommand`.
    fn parse(&self, line: &[u8]) -> Result<Vec<Vec<u8>>>;

    /// Write the record for one found key
    fn reply(&self, out: &mut dyn Write, key: &[u8], value: &[u8]) -> io::Result<()>;

    /// Terminate the response for the whole request
    fn finish(&self, out: &mut dyn Write) -> io::Result<()>;
}

/// Pick the protocol for a configured kind
pub fn from_kind(kind: ProtocolKind) -> Arc<dyn Protocol> {
    match kind {
        ProtocolKind::Memcached => Arc::new(MemcachedProtocol),
    }
}
