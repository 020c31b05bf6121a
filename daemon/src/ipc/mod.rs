//! IPC module: gesture source and status surface
//!
//! The sensor driver and the backend service connect over a Unix socket to
//! deliver gestures and pipeline notices; UI clients may subscribe to
//! state events.

mod protocol;
mod server;

pub use server::Server;
