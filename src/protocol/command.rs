//! Command definitions
//!
//! Represents retrieval requests from clients.

use std::fmt;

/// Retrieval verbs. Both look up the same way; `gets` exists for client
/// compatibility only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Get,
    Gets,
}

impl Verb {
    /// Wire spelling
    pub fn as_bytes(&self) -> &'static [u8] {
        match self {
            Verb::Get => b"get",
            Verb::Gets => b"gets",
        }
    }

    pub(crate) fn from_bytes(token: &[u8]) -> Option<Self> {
        match token {
            b"get" => Some(Verb::Get),
            b"gets" => Some(Verb::Gets),
            _ => None,
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Verb::Get => "get",
            Verb::Gets => "gets",
        })
    }
}

/// A parsed request line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub verb: Verb,

    /// Requested keys in request order (duplicates preserved)
    pub keys: Vec<Vec<u8>>,
}
