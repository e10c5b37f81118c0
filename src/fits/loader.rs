use std::{
    ffi::CString,
    path::{Path, PathBuf},
    ptr,
};

use fitsio::{
    errors::check_status,
    hdu::{FitsHdu, HduInfo},
    FileOpenMode, FitsFile,
};
use ndarray::Array2;

use super::{FitsError, Header, ImageRecord, Result};

/// FITS image loader
///
/// ```no_run
/// use phot_utils::fits::FitsLoader;
/// let record = FitsLoader::new("science.fits").extension(1).load()?;
/// println!("{:?}", record.shape());
/// # Ok::<(), phot_utils::fits::FitsError>(())
/// ```
#[derive(Debug, Clone)]
pub struct FitsLoader {
    path: PathBuf,
    extension: usize,
}
impl FitsLoader {
    /// Loads the primary HDU of `path` unless [FitsLoader::extension] is set
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            extension: 0,
        }
    }
    /// Sets the HDU index, 0 being the primary HDU
    pub fn extension(self, extension: usize) -> Self {
        Self { extension, ..self }
    }
    /// Reads the header and pixels of the HDU
    pub fn load(self) -> Result<ImageRecord> {
        let data = self.load_data()?;
        let header = Header::read_keywords(&self.path, self.extension)?;
        Ok(ImageRecord { header, data })
    }
    /// Reads the pixels of the HDU only
    pub fn load_data(&self) -> Result<Array2<f64>> {
        let path = self.path.as_path();
        let mut fptr = open_fits(path)?;
        let hdu = select_hdu(&mut fptr, path, self.extension)?;
        let not_an_image = || FitsError::NotAnImage {
            path: path.to_path_buf(),
            extension: self.extension,
        };
        // cfitsio reports the shape as [NAXIS2, NAXIS1]
        let (rows, cols) = match &hdu.info {
            HduInfo::ImageInfo { shape, .. } if shape.len() == 2 => (shape[0], shape[1]),
            _ => return Err(not_an_image()),
        };
        let pixels: Vec<f64> = hdu
            .read_image(&mut fptr)
            .map_err(|e| FitsError::Fitsio(e, path.to_path_buf()))?;
        log::debug!("loaded {:?}[{}]: {}x{}", path, self.extension, rows, cols);
        Array2::from_shape_vec((rows, cols), pixels).map_err(|_| not_an_image())
    }
}

/// Opens a FITS file read-only
///
/// The name is handed to `fits_open_diskfile`, so cfitsio never interprets
/// `[..]`, `(..)`, `!` or `-` in it.
pub(super) fn open_fits(path: &Path) -> Result<FitsFile> {
    if !path.is_file() {
        return Err(FitsError::NotFound(path.to_path_buf()));
    }
    let name = path
        .to_str()
        .and_then(|name| CString::new(name).ok())
        .ok_or_else(|| FitsError::InvalidPath(path.to_path_buf()))?;
    let mut fptr: *mut fitsio::sys::fitsfile = ptr::null_mut();
    let mut status = 0;
    unsafe {
        fitsio::sys::ffdkopn(
            &mut fptr,
            name.as_ptr(),
            FileOpenMode::READONLY as i32,
            &mut status,
        );
    }
    check_status(status).map_err(|e| FitsError::Fitsio(e, path.to_path_buf()))?;
    // SAFETY: cfitsio returned a valid handle, now owned (and closed) by `FitsFile`
    unsafe { FitsFile::from_raw(fptr, FileOpenMode::READONLY) }
        .map_err(|e| FitsError::Fitsio(e, path.to_path_buf()))
}

/// Moves to HDU #`extension`
pub(super) fn select_hdu(
    fptr: &mut FitsFile,
    path: &Path,
    extension: usize,
) -> Result<FitsHdu> {
    match fptr.hdu(extension) {
        Ok(hdu) => Ok(hdu),
        Err(_) => Err(FitsError::MissingExtension {
            path: path.to_path_buf(),
            extension,
            count: fptr.iter().count(),
        }),
    }
}

/// Loads the header and the pixels of HDU #`extension` of a FITS file
pub fn load_fits<P: AsRef<Path>>(path: P, extension: usize) -> Result<ImageRecord> {
    FitsLoader::new(path).extension(extension).load()
}
