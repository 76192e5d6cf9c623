use serde_json::Value;

use crate::error::Result;

/// Turns one frame's raw metadata blob into structured results.
///
/// Pipelines differ only in configuration and in how their metadata is
/// interpreted, so this is the seam where pipeline-specific parsing plugs
/// in — one session type serves every detector.
pub trait ResultDecoder: Send + Sync {
    fn decode(&self, metadata: &[u8]) -> Result<Value>;
}

/// Default decoder: metadata is a JSON document.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonDecoder;

impl ResultDecoder for JsonDecoder {
    fn decode(&self, metadata: &[u8]) -> Result<Value> {
        if metadata.is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_slice(metadata)?)
    }
}
