//! Network Module
//!
//! TCP server and client handling.
//!
//! ## Architecture
//! - Single non-blocking acceptor loop
//! - One thread per accepted connection
//! - Lookups routed through the shared Store

mod connection;
mod server;

pub use connection::{Connection, MAX_LINE_SIZE};
pub use server::{Server, ShutdownHandle};
