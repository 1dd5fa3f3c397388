//! Response definitions
//!
//! A `VALUE` record as decoded on the client side.

/// One found key from a retrieval response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueRecord {
    pub key: Vec<u8>,

    /// Flags field; romdb always sends 0
    pub flags: u32,

    pub data: Vec<u8>,
}

impl ValueRecord {
    /// Key as text, for display
    pub fn key_lossy(&self) -> String {
        String::from_utf8_lossy(&self.key).into_owned()
    }
}
