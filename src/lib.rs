//! Tether — pooled execution contexts for a TCP + HTTP socket server.
//!
//! The binary wires the member crates together; this library only carries
//! the demo handlers so the end-to-end tests can mount them too.

pub mod demo;

pub use demo::ChatHandler;
