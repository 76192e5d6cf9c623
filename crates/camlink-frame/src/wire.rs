//! Wire constants shared with the camera bridge peer.
//!
//! These byte sequences are fixed by the deployed bridge protocol; changing
//! any of them breaks compatibility with existing peers.

/// Marks the end of the metadata (JSON) segment of a frame.
pub const METADATA_DELIMITER: &[u8] = b"<<END_OF_JSON>>";

/// Marks the end of the binary image segment of a frame.
pub const PAYLOAD_END_DELIMITER: &[u8] = b"<<END>>";

/// Request token the client sends after connecting and after consuming each
/// frame. The peer reads exactly this many bytes per request cycle.
pub const REQUEST_TOKEN: &[u8] = b"DATA";
