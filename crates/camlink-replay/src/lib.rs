//! Frame-indexed record/replay persistence.
//!
//! A recording is a directory of `result_<n>.json` metadata files plus one
//! `<imageName>_<n>.png` per named image, `<n>` a plain decimal 0-based
//! frame index. The same consumer code path that handles live frames can be
//! fed from a recording through [`ReplayStore`] and [`ReplayCursor`].

pub mod cursor;
pub mod error;
pub mod store;

pub use cursor::ReplayCursor;
pub use error::{ReplayError, Result};
pub use store::{NamedImage, ReplayFrame, ReplayStore};
