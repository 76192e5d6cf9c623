/// Errors that can occur in device session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Required configuration is missing or inconsistent.
    ///
    /// Rejected eagerly at connect time, before any resource is opened.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The device driver refused to start the pipeline.
    #[error("device init failed: {0}")]
    DeviceInit(String),

    /// Transport-level error on the live bridge connection.
    #[error("transport error: {0}")]
    Transport(#[from] camlink_transport::TransportError),

    /// Record/replay storage error.
    #[error("replay error: {0}")]
    Replay(#[from] camlink_replay::ReplayError),

    /// Frame metadata failed to decode.
    #[error("metadata decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// A replay operation was requested without a configured replay source.
    #[error("replay source not configured")]
    ReplayNotConfigured,
}

pub type Result<T> = std::result::Result<T, SessionError>;
