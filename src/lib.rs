//! # phot-utils
//!
//! Helpers for astronomical image reduction:
//!  - [locator]: FITS file discovery in a directory
//!  - [fits]: FITS header and image I/O
//!  - [master_frame]: batched master frame construction (darks, flats, biases)
//!  - [photometry]: aperture photometry and light curves
//!  - [periodogram]: generalised Lomb-Scargle periodogram
//!  - [wcs]: celestial coordinates of image pixels
//!  - [plot]: image rendering with optional celestial axes (`plot` feature)
//!
//! ```no_run
//! use phot_utils::{get_filenames, load_fits, MasterFrame, Reduction};
//!
//! let darks = get_filenames("raw", "dark")?;
//! println!("{} dark frames", darks.len());
//! let record = load_fits(&darks[0], 0)?;
//! println!("{:?}", record.header.real("EXPTIME"));
//! let master = MasterFrame::new("raw")
//!     .pattern("dark*.fits")
//!     .reduction(Reduction::Median)
//!     .output_dir("masters")
//!     .build()?;
//! println!("{:?}", master.final_file);
//! # Ok::<(), phot_utils::Error>(())
//! ```

pub mod error;
pub mod fits;
pub mod locator;
pub mod master_frame;
pub mod periodogram;
pub mod photometry;
pub mod plot;
pub mod reduction;
pub mod wcs;

pub use error::{Error, ErrorKind};
pub use fits::{load_fits, write_fits, FitsLoader, Header, HeaderValue, ImageRecord};
pub use locator::get_filenames;
pub use master_frame::{create_master_frame, MasterFrame, MasterFrameOutput};
pub use periodogram::{Gls, Periodogram};
pub use photometry::{compute_flux, light_curve, Aperture, Flux, LightCurve};
#[cfg(feature = "plot")]
pub use plot::implot;
pub use plot::{ColorMap, ImplotConfig};
pub use reduction::Reduction;
pub use wcs::Wcs;

/// Default number of frames per master frame batch
pub const DEFAULT_BULK: usize = 50;
/// Default input file pattern of the master frame builder
pub const DEFAULT_PATTERN: &str = "*.fits";

/// Runs a GLS periodogram on a time series with the default frequency grid
pub fn run_gls(time: Vec<f64>, flux: Vec<f64>) -> Result<Periodogram, periodogram::PeriodogramError> {
    Gls::new(time, flux).compute()
}
