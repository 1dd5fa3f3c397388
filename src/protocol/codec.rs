//! Protocol codec
//!
//! memcached text protocol, retrieval commands only.
//!
//! ## Wire Format
//!
//! ### Request
//! ```text
//! get <key> [<key> ...]\r\n
//! gets <key> [<key> ...]\r\n
//! ```
//!
//! ### Response
//! ```text
//! VALUE <key> 0 <bytes>\r\n     ┐
//! <data block>\r\n              ┘ once per found key, in request order
//! END\r\n                         once per request
//! ```
//!
//! Missing keys produce nothing. The `<bytes>` length is authoritative: the
//! data block may itself contain `\r\n`.

use std::io::{self, BufRead, Write};

use crate::error::{Result, RomError};

use super::{Command, Protocol, ValueRecord, Verb};

/// Line terminator
pub const CRLF: &[u8] = b"\r\n";

/// Response terminator line
pub const END: &[u8] = b"END\r\n";

/// Largest value a client will accept (1 MB, memcached's default item size)
pub const MAX_VALUE_SIZE: usize = 1024 * 1024;

// =============================================================================
// Server side
// =============================================================================

/// Stateless memcached codec; one instance serves every connection
#[derive(Debug, Default, Clone, Copy)]
pub struct MemcachedProtocol;

impl Protocol for MemcachedProtocol {
    fn parse(&self, line: &[u8]) -> Result<Vec<Vec<u8>>> {
        parse_command(line).map(|command| command.keys)
    }

    fn reply(&self, out: &mut dyn Write, key: &[u8], value: &[u8]) -> io::Result<()> {
        write_value(out, key, value)
    }

    fn finish(&self, out: &mut dyn Write) -> io::Result<()> {
        out.write_all(END)
    }
}

/// Strip one trailing `\n` or `\r\n`
fn trim_line(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Parse a request line into a command.
///
/// Tokens are separated by spaces; runs of spaces are collapsed. Anything
/// other than `get`/`gets` followed by at least one key is
/// `RomError::InvalidCommand`.
pub fn parse_command(line: &[u8]) -> Result<Command> {
    let line = trim_line(line);
    let mut tokens = line.split(|&b| b == b' ').filter(|t| !t.is_empty());

    let verb = tokens
        .next()
        .and_then(Verb::from_bytes)
        .ok_or_else(|| RomError::InvalidCommand(String::from_utf8_lossy(line).into_owned()))?;

    let keys: Vec<Vec<u8>> = tokens.map(<[u8]>::to_vec).collect();
    if keys.is_empty() {
        return Err(RomError::InvalidCommand(format!("{} without keys", verb)));
    }

    Ok(Command { verb, keys })
}

/// Write one `VALUE` record
pub fn write_value<W: Write + ?Sized>(out: &mut W, key: &[u8], value: &[u8]) -> io::Result<()> {
    out.write_all(b"VALUE ")?;
    out.write_all(key)?;
    write!(out, " 0 {}", value.len())?;
    out.write_all(CRLF)?;
    out.write_all(value)?;
    out.write_all(CRLF)
}

// =============================================================================
// Client side
// =============================================================================

/// Encode a retrieval request line
pub fn encode_request<K: AsRef<[u8]>>(verb: Verb, keys: &[K]) -> Vec<u8> {
    let mut line = verb.as_bytes().to_vec();
    for key in keys {
        line.push(b' ');
        line.extend_from_slice(key.as_ref());
    }
    line.extend_from_slice(CRLF);
    line
}

/// Write a retrieval request to a stream
pub fn write_request<W: Write, K: AsRef<[u8]>>(writer: &mut W, verb: Verb, keys: &[K]) -> Result<()> {
    writer.write_all(&encode_request(verb, keys))?;
    writer.flush()?;
    Ok(())
}

/// Read `VALUE` records up to and including `END`.
///
/// The data block is read by its declared length, never by scanning for a
/// delimiter.
pub fn read_values<R: BufRead>(reader: &mut R) -> Result<Vec<ValueRecord>> {
    let mut records = Vec::new();
    let mut line = Vec::new();

    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            return Err(RomError::Io(io::ErrorKind::UnexpectedEof.into()));
        }

        let header = trim_line(&line);
        if header == b"END" {
            return Ok(records);
        }

        let (key, flags, len) = parse_value_header(header)?;
        if len > MAX_VALUE_SIZE {
            return Err(RomError::Protocol(format!(
                "value too large: {} bytes (max {})",
                len, MAX_VALUE_SIZE
            )));
        }

        let mut data = vec![0u8; len + CRLF.len()];
        reader.read_exact(&mut data)?;
        if !data.ends_with(CRLF) {
            return Err(RomError::Protocol(
                "data block not terminated by CRLF".to_string(),
            ));
        }
        data.truncate(len);

        records.push(ValueRecord { key, flags, data });
    }
}

/// `VALUE <key> <flags> <bytes>`
fn parse_value_header(header: &[u8]) -> Result<(Vec<u8>, u32, usize)> {
    let malformed =
        || RomError::Protocol(format!("unexpected line: {}", String::from_utf8_lossy(header)));

    let fields: Vec<&[u8]> = header.split(|&b| b == b' ').collect();
    match fields.as_slice() {
        [b"VALUE", key, flags, len] => {
            let flags = std::str::from_utf8(flags)
                .ok()
                .and_then(|s| s.parse().ok())
                .ok_or_else(malformed)?;
            let len = std::str::from_utf8(len)
                .ok()
                .and_then(|s| s.parse().ok())
                .ok_or_else(malformed)?;
            Ok((key.to_vec(), flags, len))
        }
        _ => Err(malformed()),
    }
}
