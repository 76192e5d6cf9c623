use std::path::PathBuf;

/// Errors that can occur reading or writing a recording.
#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    /// The requested frame index has no file on disk.
    ///
    /// Distinct from [`ReplayError::Io`]: during sequential playback a
    /// missing index means the recording ended (or was never contiguous),
    /// not that the disk failed.
    #[error("frame {frame} not found at {path}")]
    NotFound { frame: u32, path: PathBuf },

    /// A file exists but its metadata content is not valid UTF-8.
    #[error("frame {frame} metadata is not valid UTF-8: {source}")]
    Metadata {
        frame: u32,
        source: std::str::Utf8Error,
    },

    /// An I/O error occurred on the recording directory.
    #[error("replay I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, ReplayError>;
