//! FITS image I/O
//!
//! Pixels are read with cfitsio (`fitsio`), header keywords with `fitrs` (see
//! [`Header`]) and images are written with `fitrs`. File names are always taken
//! literally: `dark[1].fits` is a file name, not a cfitsio HDU selector.

use std::{io, path::PathBuf};

use ndarray::Array2;

mod header;
mod loader;
mod writer;

pub use header::{Header, HeaderValue};
pub use loader::{load_fits, FitsLoader};
pub use writer::write_fits;

#[derive(Debug, thiserror::Error)]
pub enum FitsError {
    #[error("FITS file {0:?} not found")]
    NotFound(PathBuf),
    #[error("failed to read FITS file {1:?}")]
    Fitsio(#[source] fitsio::errors::Error, PathBuf),
    #[error("failed to read {1:?}")]
    Io(#[source] io::Error, PathBuf),
    #[error("{0:?} is not a valid FITS file name (UTF-8 without NUL expected)")]
    InvalidPath(PathBuf),
    #[error("{path:?} has no extension #{extension} (only {count} HDUs)")]
    MissingExtension {
        path: PathBuf,
        extension: usize,
        count: usize,
    },
    #[error("HDU #{extension} of {path:?} is not a 2D image")]
    NotAnImage { path: PathBuf, extension: usize },
    #[error("malformed header in {path:?}: {reason}")]
    Header { path: PathBuf, reason: String },
    #[error("{0:?} already exists")]
    AlreadyExists(PathBuf),
    #[error("failed to write FITS file {1:?}")]
    Write(#[source] io::Error, PathBuf),
}
impl FitsError {
    /// Errors raised while writing a file
    pub fn is_write(&self) -> bool {
        matches!(self, FitsError::AlreadyExists(_) | FitsError::Write(..))
    }
}
pub type Result<T> = std::result::Result<T, FitsError>;

/// Header and pixels of one HDU
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRecord {
    pub header: Header,
    /// `(NAXIS2, NAXIS1)` pixel array
    pub data: Array2<f64>,
}
impl ImageRecord {
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }
}
