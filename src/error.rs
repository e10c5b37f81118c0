use crate::{
    fits::FitsError, locator::LocatorError, master_frame::MasterFrameError,
    periodogram::PeriodogramError, photometry::PhotometryError, plot::PlotError,
    reduction::ReductionError, wcs::WcsError,
};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Error in the `locator` module")]
    Locator(#[from] LocatorError),
    #[error("Error in the `fits` module")]
    Fits(#[from] FitsError),
    #[error("Error in the `reduction` module")]
    Reduction(#[from] ReductionError),
    #[error("Error in the `master_frame` module")]
    MasterFrame(#[from] MasterFrameError),
    #[error("Error in the `photometry` module")]
    Photometry(#[from] PhotometryError),
    #[error("Error in the `periodogram` module")]
    Periodogram(#[from] PeriodogramError),
    #[error("Error in the `wcs` module")]
    Wcs(#[from] WcsError),
    #[error("Error in the `plot` module")]
    Plot(#[from] PlotError),
}

/// Error categories
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing directory or file, no input for a build
    NotFound,
    /// Not a FITS file, missing extension, HDU without a 2D image
    Format,
    /// Inconsistent image dimensions
    ShapeMismatch,
    /// Output cannot be created or overwritten
    Write,
    /// Invalid input to a computation
    Computation,
    Io,
    /// Invalid options
    Config,
}

impl LocatorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LocatorError::NotFound(_) => ErrorKind::NotFound,
            LocatorError::Io(..) => ErrorKind::Io,
            LocatorError::Pattern(..) => ErrorKind::Config,
        }
    }
}
impl FitsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FitsError::NotFound(_) => ErrorKind::NotFound,
            FitsError::Fitsio(..)
            | FitsError::MissingExtension { .. }
            | FitsError::NotAnImage { .. }
            | FitsError::InvalidPath(_)
            | FitsError::Header { .. } => ErrorKind::Format,
            FitsError::Io(..) => ErrorKind::Io,
            FitsError::AlreadyExists(_) | FitsError::Write(..) => ErrorKind::Write,
        }
    }
}
impl ReductionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReductionError::Empty => ErrorKind::Computation,
            ReductionError::ShapeMismatch { .. } => ErrorKind::ShapeMismatch,
            ReductionError::Unknown(_) => ErrorKind::Config,
        }
    }
}
impl MasterFrameError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MasterFrameError::InvalidBulk => ErrorKind::Config,
            MasterFrameError::NoInputFiles { .. } => ErrorKind::NotFound,
            MasterFrameError::Locate(e) => e.kind(),
            MasterFrameError::Load { source, .. } => source.kind(),
            MasterFrameError::ShapeMismatch { .. } => ErrorKind::ShapeMismatch,
            MasterFrameError::Reduction { source, .. } | MasterFrameError::FinalReduction(source) => {
                source.kind()
            }
            MasterFrameError::OutputDir(..) => ErrorKind::Write,
            MasterFrameError::Write { source, .. } => source.kind(),
        }
    }
}
impl PhotometryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PhotometryError::Load(e) => e.kind(),
            PhotometryError::Frame { source, .. } => source.kind(),
            PhotometryError::Csv(_) => ErrorKind::Io,
            _ => ErrorKind::Computation,
        }
    }
}
impl PeriodogramError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PeriodogramError::Csv(_) => ErrorKind::Io,
            PeriodogramError::InvalidParameter(..) => ErrorKind::Config,
            _ => ErrorKind::Computation,
        }
    }
}
impl WcsError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Computation
    }
}
impl PlotError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PlotError::EmptyImage => ErrorKind::Computation,
            PlotError::Drawing(_) => ErrorKind::Write,
            PlotError::Wcs(e) => e.kind(),
        }
    }
}
impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Locator(e) => e.kind(),
            Error::Fits(e) => e.kind(),
            Error::Reduction(e) => e.kind(),
            Error::MasterFrame(e) => e.kind(),
            Error::Photometry(e) => e.kind(),
            Error::Periodogram(e) => e.kind(),
            Error::Wcs(e) => e.kind(),
            Error::Plot(e) => e.kind(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn kinds() {
        let e: Error = MasterFrameError::NoInputFiles {
            directory: PathBuf::from("darks"),
            pattern: "*.fits".into(),
        }
        .into();
        assert_eq!(e.kind(), ErrorKind::NotFound);
        let e: Error = MasterFrameError::Load {
            batch: 1,
            path: PathBuf::from("a.fits"),
            source: FitsError::MissingExtension {
                path: PathBuf::from("a.fits"),
                extension: 2,
                count: 2,
            },
        }
        .into();
        assert_eq!(e.kind(), ErrorKind::Format);
        let e: Error = FitsError::AlreadyExists(PathBuf::from("a.fits")).into();
        assert_eq!(e.kind(), ErrorKind::Write);
        let e: Error = PhotometryError::Frame {
            path: PathBuf::from("a.fits"),
            source: Box::new(PhotometryError::EmptyAnnulus),
        }
        .into();
        assert_eq!(e.kind(), ErrorKind::Computation);
        assert_eq!(MasterFrameError::InvalidBulk.kind(), ErrorKind::Config);
    }
}
