//! TCP client session for camera bridge peers.
//!
//! Owns exactly one outbound connection, drives the request/response
//! cadence (one `DATA` token per consumed frame), and hands completed
//! (metadata, payload) pairs to the consumer through a single-slot
//! latest-frame holder — a new pair overwrites an unconsumed one, because a
//! live camera feed favors freshness over completeness.

pub mod client;
pub mod error;

pub use client::TransportSession;
pub use error::{Result, TransportError};
