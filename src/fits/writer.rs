use std::path::Path;

use fitrs::{Fits, Hdu};
use ndarray::Array2;

use super::{FitsError, Result};

/// Writes `data` as the primary HDU (`BITPIX = -64`) of a new FITS file
///
/// An existing file is replaced only if `overwrite` is set. The primary header
/// holds the mandatory keywords only.
pub fn write_fits<P: AsRef<Path>>(path: P, data: &Array2<f64>, overwrite: bool) -> Result<()> {
    let path = path.as_ref();
    if path.exists() && !overwrite {
        return Err(FitsError::AlreadyExists(path.to_path_buf()));
    }
    let (rows, cols) = data.dim();
    let pixels: Vec<f64> = data.iter().copied().collect();
    Fits::create(path, Hdu::new(&[cols, rows], pixels))
        .map_err(|e| FitsError::Write(e, path.to_path_buf()))?;
    log::debug!("written {:?} ({}x{})", path, rows, cols);
    Ok(())
}
