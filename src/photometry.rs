//! Circular aperture photometry
//!
//! Pixels belong to the aperture or to the background annulus according to the
//! distance of their centre to the aperture centre. Pixel `[[row, col]]` has its
//! centre at `(x, y) = (col, row)`.

use std::path::{Path, PathBuf};

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::{
    fits::{load_fits, FitsError},
    reduction::median,
};

#[derive(Debug, thiserror::Error)]
pub enum PhotometryError {
    #[error("aperture centre ({0}, {1}) is not finite")]
    InvalidCentre(f64, f64),
    #[error("aperture radius must be positive, found {0}")]
    InvalidRadius(f64),
    #[error("invalid background annulus [{inner}, {outer}] for aperture radius {radius}")]
    InvalidAnnulus { radius: f64, inner: f64, outer: f64 },
    #[error("aperture at ({0}, {1}) is outside the image")]
    OutsideImage(f64, f64),
    #[error("background annulus has no pixel inside the image")]
    EmptyAnnulus,
    #[error("non finite pixel value at [{0}, {1}] in the aperture")]
    NonFinitePixel(usize, usize),
    #[error("keyword {key:?} missing or not numeric in {path:?}")]
    MissingTimeKey { path: PathBuf, key: String },
    #[error("failed to load frame")]
    Load(#[from] FitsError),
    #[error("photometry failed in {path:?}")]
    Frame {
        path: PathBuf,
        #[source]
        source: Box<PhotometryError>,
    },
    #[error("light curve columns have different lengths ({0} and {1})")]
    LengthMismatch(usize, usize),
    #[error("failed to read or write light curve CSV file")]
    Csv(#[from] csv::Error),
}
type Result<T> = std::result::Result<T, PhotometryError>;

/// Circular aperture with an optional background annulus
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aperture {
    /// Centre column (0-based)
    pub x: f64,
    /// Centre row (0-based)
    pub y: f64,
    pub radius: f64,
    /// Inner and outer radii of the background annulus
    pub annulus: Option<(f64, f64)>,
}
impl Aperture {
    pub fn new(x: f64, y: f64, radius: f64) -> Self {
        Self {
            x,
            y,
            radius,
            annulus: None,
        }
    }
    pub fn annulus(self, inner: f64, outer: f64) -> Self {
        Self {
            annulus: Some((inner, outer)),
            ..self
        }
    }
    fn validate(&self) -> Result<()> {
        if !(self.x.is_finite() && self.y.is_finite()) {
            return Err(PhotometryError::InvalidCentre(self.x, self.y));
        }
        if !(self.radius > 0f64 && self.radius.is_finite()) {
            return Err(PhotometryError::InvalidRadius(self.radius));
        }
        match self.annulus {
            Some((inner, outer)) if !(inner >= self.radius && outer > inner && outer.is_finite()) => {
                Err(PhotometryError::InvalidAnnulus {
                    radius: self.radius,
                    inner,
                    outer,
                })
            }
            _ => Ok(()),
        }
    }
    /// Aperture and annulus pixel values
    pub fn collect_pixels(&self, image: &Array2<f64>) -> (Vec<((usize, usize), f64)>, Vec<f64>) {
        let (height, width) = image.dim();
        let reach = self
            .annulus
            .map_or(self.radius, |(_, outer)| outer)
            .ceil();
        let bounds = |c: f64, n: usize| {
            let lo = (c - reach).floor().max(0f64) as usize;
            let hi = ((c + reach).ceil() + 1f64).clamp(0f64, n as f64) as usize;
            lo..hi
        };
        let mut aperture = Vec::new();
        let mut background = Vec::new();
        for row in bounds(self.y, height) {
            for col in bounds(self.x, width) {
                let distance = (col as f64 - self.x).hypot(row as f64 - self.y);
                let value = image[[row, col]];
                if distance <= self.radius {
                    aperture.push(((row, col), value));
                } else if let Some((inner, outer)) = self.annulus {
                    if distance >= inner && distance <= outer {
                        background.push(value);
                    }
                }
            }
        }
        (aperture, background)
    }
}

/// Aperture photometry measurement
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Flux {
    /// Sum of the aperture pixels
    pub total: f64,
    /// Background level per pixel
    pub background: f64,
    /// Background subtracted flux
    pub net: f64,
    pub npix: usize,
    pub nbackground: usize,
}
impl Flux {
    /// Instrumental magnitude `zero_point - 2.5 log10(net)`, `None` for a non-positive flux
    pub fn magnitude(&self, zero_point: f64) -> Option<f64> {
        (self.net > 0f64).then(|| zero_point - 2.5 * self.net.log10())
    }
}

/// Computes the flux in an aperture
///
/// The background per pixel is the median of the annulus (finite pixels only),
/// or 0 without an annulus.
pub fn compute_flux(image: &Array2<f64>, aperture: &Aperture) -> Result<Flux> {
    aperture.validate()?;
    let (pixels, mut background) = aperture.collect_pixels(image);
    if pixels.is_empty() {
        return Err(PhotometryError::OutsideImage(aperture.x, aperture.y));
    }
    if let Some(((row, col), _)) = pixels.iter().find(|(_, value)| !value.is_finite()) {
        return Err(PhotometryError::NonFinitePixel(*row, *col));
    }
    let total: f64 = pixels.iter().map(|(_, value)| value).sum();
    background.retain(|value| value.is_finite());
    let level = match aperture.annulus {
        Some(_) if background.is_empty() => return Err(PhotometryError::EmptyAnnulus),
        Some(_) => median(&mut background),
        None => 0f64,
    };
    let npix = pixels.len();
    Ok(Flux {
        total,
        background: level,
        net: total - level * npix as f64,
        npix,
        nbackground: background.len(),
    })
}

#[derive(Debug, Serialize, Deserialize)]
struct Record {
    time: f64,
    flux: f64,
    #[serde(default)]
    error: Option<f64>,
}

/// Time series of fluxes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LightCurve {
    pub time: Vec<f64>,
    pub flux: Vec<f64>,
    /// Flux uncertainties, if known for every sample
    pub error: Option<Vec<f64>>,
}
impl LightCurve {
    pub fn new(time: Vec<f64>, flux: Vec<f64>) -> Result<Self> {
        if time.len() != flux.len() {
            return Err(PhotometryError::LengthMismatch(time.len(), flux.len()));
        }
        Ok(Self {
            time,
            flux,
            error: None,
        })
    }
    pub fn len(&self) -> usize {
        self.time.len()
    }
    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }
    /// Reads a CSV file with `time`, `flux` and optional `error` columns
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut rdr = csv::Reader::from_path(path)?;
        let mut this = Self::default();
        let mut error = Vec::new();
        for result in rdr.deserialize() {
            let record: Record = result?;
            this.time.push(record.time);
            this.flux.push(record.flux);
            error.push(record.error);
        }
        this.error = error.iter().cloned().collect();
        if this.error.is_none() && error.iter().any(Option::is_some) {
            log::warn!("flux errors ignored: missing for some samples");
        }
        Ok(this)
    }
    /// Writes the light curve to a CSV file
    ///
    /// The columns are checked first: nothing is written if `flux` or `error`
    /// does not match the length of `time`.
    pub fn to_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let n = self.time.len();
        if let Some(len) = Some(self.flux.len())
            .into_iter()
            .chain(self.error.as_ref().map(Vec::len))
            .find(|&len| len != n)
        {
            return Err(PhotometryError::LengthMismatch(n, len));
        }
        let mut wtr = csv::Writer::from_path(path)?;
        for (k, (&time, &flux)) in self.time.iter().zip(&self.flux).enumerate() {
            wtr.serialize(Record {
                time,
                flux,
                error: self.error.as_ref().map(|error| error[k]),
            })?;
        }
        wtr.flush().map_err(csv::Error::from)?;
        Ok(())
    }
}

/// Net aperture flux in each file, with the time read from header keyword `time_key`
pub fn light_curve<P: AsRef<Path>>(
    files: &[P],
    aperture: &Aperture,
    time_key: &str,
    extension: usize,
) -> Result<LightCurve> {
    let mut lc = LightCurve::default();
    for file in files {
        let path = file.as_ref();
        let record = load_fits(path, extension)?;
        let time =
            record
                .header
                .real(time_key)
                .ok_or_else(|| PhotometryError::MissingTimeKey {
                    path: path.to_path_buf(),
                    key: time_key.to_string(),
                })?;
        let flux =
            compute_flux(&record.data, aperture).map_err(|e| PhotometryError::Frame {
                path: path.to_path_buf(),
                source: Box::new(e),
            })?;
        log::debug!("{:?}: t={} flux={}", path, time, flux.net);
        lc.time.push(time);
        lc.flux.push(flux.net);
    }
    Ok(lc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn flat_image() {
        let image = Array2::from_elem((21, 21), 2f64);
        let flux = compute_flux(&image, &Aperture::new(10., 10., 3.)).unwrap();
        // 29 pixel centres within 3 pixels
        assert_eq!(flux.npix, 29);
        assert_relative_eq!(flux.total, 58.);
        assert_relative_eq!(flux.net, 58.);
        assert_eq!(flux.background, 0.);
    }

    #[test]
    fn background_subtraction() {
        let mut image = Array2::from_elem((41, 41), 10f64);
        image[[20, 20]] += 1000.;
        image[[20, 21]] += 500.;
        let flux = compute_flux(&image, &Aperture::new(20., 20., 4.).annulus(8., 12.)).unwrap();
        assert_relative_eq!(flux.background, 10.);
        assert_relative_eq!(flux.net, 1500., epsilon = 1e-9);
        assert!(flux.nbackground > 0);
        assert_relative_eq!(flux.magnitude(25.).unwrap(), 25. - 2.5 * 1500f64.log10());
    }

    #[test]
    fn negative_net_has_no_magnitude() {
        let flux = Flux {
            total: 1.,
            background: 1.,
            net: -3.,
            npix: 4,
            nbackground: 10,
        };
        assert!(flux.magnitude(25.).is_none());
    }

    #[test]
    fn aperture_clipped_by_edge() {
        let image = Array2::from_elem((10, 10), 1f64);
        let flux = compute_flux(&image, &Aperture::new(0., 0., 1.)).unwrap();
        assert_eq!(flux.npix, 3);
    }

    #[test]
    fn invalid_inputs() {
        let image = Array2::from_elem((10, 10), 1f64);
        assert!(matches!(
            compute_flux(&image, &Aperture::new(f64::NAN, 0., 1.)),
            Err(PhotometryError::InvalidCentre(..))
        ));
        assert!(matches!(
            compute_flux(&image, &Aperture::new(5., 5., 0.)),
            Err(PhotometryError::InvalidRadius(_))
        ));
        assert!(matches!(
            compute_flux(&image, &Aperture::new(5., 5., 3.).annulus(2., 4.)),
            Err(PhotometryError::InvalidAnnulus { .. })
        ));
        assert!(matches!(
            compute_flux(&image, &Aperture::new(5., 5., 1.).annulus(4., 4.)),
            Err(PhotometryError::InvalidAnnulus { .. })
        ));
        assert!(matches!(
            compute_flux(&image, &Aperture::new(50., 50., 2.)),
            Err(PhotometryError::OutsideImage(..))
        ));
        assert!(matches!(
            compute_flux(&image, &Aperture::new(5., 5., 1.).annulus(20., 30.)),
            Err(PhotometryError::EmptyAnnulus)
        ));
        let mut image = image;
        image[[5, 5]] = f64::NAN;
        assert!(matches!(
            compute_flux(&image, &Aperture::new(5., 5., 1.)),
            Err(PhotometryError::NonFinitePixel(5, 5))
        ));
    }

    #[test]
    fn csv_light_curve() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("lc.csv");
        std::fs::write(&path, "time,flux,error\n0.0,1.0,0.1\n1.0,2.0,0.2\n").unwrap();
        let lc = LightCurve::from_csv(&path).unwrap();
        assert_eq!(lc.time, vec![0., 1.]);
        assert_eq!(lc.error, Some(vec![0.1, 0.2]));

        std::fs::write(&path, "time,flux\n0.0,1.0\n1.0,2.0\n").unwrap();
        let lc = LightCurve::from_csv(&path).unwrap();
        assert_eq!(lc.flux, vec![1., 2.]);
        assert!(lc.error.is_none());

        let out = dir.path().join("out.csv");
        lc.to_csv(&out).unwrap();
        assert_eq!(LightCurve::from_csv(&out).unwrap(), lc);
    }

    #[test]
    fn csv_short_error_column() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("lc.csv");
        let mut lc = LightCurve::new(vec![0., 1., 2.], vec![5., 6., 7.]).unwrap();
        lc.error = Some(vec![0.1, 0.2]);
        assert!(matches!(
            lc.to_csv(&path),
            Err(PhotometryError::LengthMismatch(3, 2))
        ));
        lc.error = None;
        lc.flux.pop();
        assert!(matches!(
            lc.to_csv(&path),
            Err(PhotometryError::LengthMismatch(3, 2))
        ));
        assert!(!path.exists());
    }
}
