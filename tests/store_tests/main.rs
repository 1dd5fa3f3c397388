//! Store tests
//!
//! Lifecycle, explicit and watcher-driven reloads, and concurrent readers
//! against the hot-reloading store.

mod lifecycle_tests;
mod reload_tests;
