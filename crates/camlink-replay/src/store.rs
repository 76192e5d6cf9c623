use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tracing::debug;

use crate::error::{ReplayError, Result};

/// One named binary image buffer belonging to a frame.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedImage {
    pub name: String,
    pub data: Bytes,
}

impl NamedImage {
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }
}

/// One frame loaded back from a recording.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayFrame {
    /// Metadata text exactly as recorded.
    pub metadata: String,
    /// Image buffers in the store's configured name order.
    pub images: Vec<NamedImage>,
}

/// Persists and retrieves frame-indexed metadata+image sets.
///
/// Layout under the base directory: `result_<n>.json` and
/// `<imageName>_<n>.png`, `<n>` a plain decimal 0-based index. `save` must
/// be called with contiguous indices starting at 0 for sequential replay to
/// work; this store reads exactly the index it is asked for and neither
/// detects nor repairs gaps.
#[derive(Debug, Clone)]
pub struct ReplayStore {
    base: PathBuf,
    image_names: Vec<String>,
}

impl ReplayStore {
    /// Create a store over `base`, loading the given image names per frame.
    ///
    /// `save` writes whatever named buffers it is handed; `image_names`
    /// only governs what `load` looks for.
    pub fn new(base: impl Into<PathBuf>, image_names: Vec<String>) -> Self {
        Self {
            base: base.into(),
            image_names,
        }
    }

    /// Base directory of the recording.
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Image names loaded per frame.
    pub fn image_names(&self) -> &[String] {
        &self.image_names
    }

    /// Write metadata text and each named image for `frame`, overwriting
    /// any existing files at that index. Errors propagate; nothing retries.
    pub fn save(&self, frame: u32, metadata: &str, images: &[NamedImage]) -> Result<()> {
        std::fs::create_dir_all(&self.base).map_err(|source| ReplayError::Io {
            path: self.base.clone(),
            source,
        })?;

        let metadata_path = self.metadata_path(frame);
        std::fs::write(&metadata_path, metadata).map_err(|source| ReplayError::Io {
            path: metadata_path,
            source,
        })?;

        for image in images {
            let image_path = self.image_path(&image.name, frame);
            std::fs::write(&image_path, &image.data).map_err(|source| ReplayError::Io {
                path: image_path,
                source,
            })?;
        }

        debug!(frame, images = images.len(), "recorded frame");
        Ok(())
    }

    /// Read the metadata and configured images for `frame`.
    ///
    /// A missing file maps to [`ReplayError::NotFound`]; any other failure
    /// keeps its I/O or decode identity.
    pub fn load(&self, frame: u32) -> Result<ReplayFrame> {
        let metadata_path = self.metadata_path(frame);
        let metadata_bytes = read_frame_file(&metadata_path, frame)?;
        let metadata = std::str::from_utf8(&metadata_bytes)
            .map_err(|source| ReplayError::Metadata { frame, source })?
            .to_string();

        let mut images = Vec::with_capacity(self.image_names.len());
        for name in &self.image_names {
            let image_path = self.image_path(name, frame);
            let data = read_frame_file(&image_path, frame)?;
            images.push(NamedImage::new(name.clone(), data));
        }

        Ok(ReplayFrame { metadata, images })
    }

    fn metadata_path(&self, frame: u32) -> PathBuf {
        self.base.join(format!("result_{frame}.json"))
    }

    fn image_path(&self, name: &str, frame: u32) -> PathBuf {
        self.base.join(format!("{name}_{frame}.png"))
    }
}

fn read_frame_file(path: &Path, frame: u32) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|source| {
        if source.kind() == ErrorKind::NotFound {
            ReplayError::NotFound {
                frame,
                path: path.to_path_buf(),
            }
        } else {
            ReplayError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })
}
