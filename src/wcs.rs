//! Celestial world coordinate system
//!
//! Linear part of a FITS WCS with a gnomonic (TAN) projection. SIP distortion
//! terms are ignored.

use nalgebra::{Matrix2, Vector2};

use crate::fits::Header;

#[derive(Debug, thiserror::Error)]
pub enum WcsError {
    #[error("WCS keyword {0} missing or not numeric")]
    MissingKey(String),
    #[error("no pixel scale (CDi_j, PCi_j or CDELTi keywords)")]
    MissingScale,
    #[error("singular CD matrix (determinant {0})")]
    Singular(f64),
    #[error("unsupported projection {0:?}, only TAN is supported")]
    UnsupportedProjection(String),
}
type Result<T> = std::result::Result<T, WcsError>;

/// TAN projection world coordinate system
#[derive(Debug, Clone, PartialEq)]
pub struct Wcs {
    /// Reference pixel, FITS 1-based convention
    pub crpix: Vector2<f64>,
    /// RA and Dec of the reference pixel in degrees
    pub crval: Vector2<f64>,
    /// Pixel offset to intermediate world coordinates in degrees
    pub cd: Matrix2<f64>,
    pub ctype: (String, String),
    cd_inverse: Matrix2<f64>,
}
impl Wcs {
    pub fn new(crpix: (f64, f64), crval: (f64, f64), cd: Matrix2<f64>) -> Result<Self> {
        let cd_inverse = cd
            .try_inverse()
            .filter(|_| cd.determinant() != 0f64)
            .ok_or(WcsError::Singular(cd.determinant()))?;
        Ok(Self {
            crpix: Vector2::new(crpix.0, crpix.1),
            crval: Vector2::new(crval.0, crval.1),
            cd,
            ctype: ("RA---TAN".to_string(), "DEC--TAN".to_string()),
            cd_inverse,
        })
    }
    /// Parses the WCS of an image header
    ///
    /// The linear transform is read from `CDi_j`, or from `PCi_j` scaled by
    /// `CDELTi`, or from `CDELTi` rotated by `CROTA2`.
    pub fn from_header(header: &Header) -> Result<Self> {
        let key = |k: &str| header.real(k).ok_or_else(|| WcsError::MissingKey(k.to_string()));
        let ctype = (
            header.text("CTYPE1").unwrap_or("RA---TAN").to_string(),
            header.text("CTYPE2").unwrap_or("DEC--TAN").to_string(),
        );
        for c in [&ctype.0, &ctype.1] {
            if c.get(4..8) != Some("-TAN") {
                return Err(WcsError::UnsupportedProjection(c.to_string()));
            }
        }
        let crpix = (key("CRPIX1")?, key("CRPIX2")?);
        let crval = (key("CRVAL1")?, key("CRVAL2")?);

        let has = |k: &str| header.real(k).is_some();
        let cd = if ["CD1_1", "CD1_2", "CD2_1", "CD2_2"].iter().any(|k| has(k)) {
            let get = |k: &str| header.real(k).unwrap_or(0f64);
            Matrix2::new(get("CD1_1"), get("CD1_2"), get("CD2_1"), get("CD2_2"))
        } else {
            let cdelt = (
                header.real("CDELT1").ok_or(WcsError::MissingScale)?,
                header.real("CDELT2").ok_or(WcsError::MissingScale)?,
            );
            let scale = Matrix2::new(cdelt.0, 0f64, 0f64, cdelt.1);
            if ["PC1_1", "PC1_2", "PC2_1", "PC2_2"].iter().any(|k| has(k)) {
                let get = |k: &str, default: f64| header.real(k).unwrap_or(default);
                let pc = Matrix2::new(
                    get("PC1_1", 1f64),
                    get("PC1_2", 0f64),
                    get("PC2_1", 0f64),
                    get("PC2_2", 1f64),
                );
                scale * pc
            } else {
                let (sin, cos) = header.real("CROTA2").unwrap_or(0f64).to_radians().sin_cos();
                Matrix2::new(
                    cdelt.0 * cos,
                    -cdelt.1 * sin,
                    cdelt.0 * sin,
                    cdelt.1 * cos,
                )
            }
        };
        let mut wcs = Self::new(crpix, crval, cd)?;
        wcs.ctype = ctype;
        Ok(wcs)
    }
    /// RA and Dec in degrees of the 0-based pixel `(x, y)` (column, row)
    pub fn pixel_to_world(&self, x: f64, y: f64) -> (f64, f64) {
        let offset = Vector2::new(x + 1f64 - self.crpix.x, y + 1f64 - self.crpix.y);
        let projected = (self.cd * offset).map(f64::to_radians);
        let (xi, eta) = (projected.x, projected.y);
        let ra0 = self.crval.x.to_radians();
        let (sin_dec0, cos_dec0) = self.crval.y.to_radians().sin_cos();
        let denom = cos_dec0 - eta * sin_dec0;
        let ra = ra0 + xi.atan2(denom);
        let dec = (sin_dec0 + eta * cos_dec0).atan2(xi.hypot(denom));
        (ra.to_degrees().rem_euclid(360f64), dec.to_degrees())
    }
    /// 0-based pixel `(x, y)` of the sky position `(ra, dec)` in degrees
    ///
    /// Returns `None` for positions more than 90 degrees away from the reference point.
    pub fn world_to_pixel(&self, ra: f64, dec: f64) -> Option<(f64, f64)> {
        let (sin_dec, cos_dec) = dec.to_radians().sin_cos();
        let (sin_dec0, cos_dec0) = self.crval.y.to_radians().sin_cos();
        let (sin_dra, cos_dra) = (ra - self.crval.x).to_radians().sin_cos();
        let d = sin_dec * sin_dec0 + cos_dec * cos_dec0 * cos_dra;
        if d <= 0f64 {
            return None;
        }
        let projected = Vector2::new(
            cos_dec * sin_dra / d,
            (sin_dec * cos_dec0 - cos_dec * sin_dec0 * cos_dra) / d,
        )
        .map(f64::to_degrees);
        let pixel = self.cd_inverse * projected + self.crpix;
        Some((pixel.x - 1f64, pixel.y - 1f64))
    }
    /// Mean pixel scale in arcseconds
    pub fn pixel_scale_arcsec(&self) -> f64 {
        self.cd.determinant().abs().sqrt() * 3600f64
    }
}

/// Formats a right ascension in degrees as `HHhMMmSS.Ss`
pub fn format_hms(ra: f64) -> String {
    let day = 24 * 36_000;
    let tenths = ((ra.rem_euclid(360f64) / 15f64 * 36_000f64).round() as u64) % day;
    format!(
        "{:02}h{:02}m{:04.1}s",
        tenths / 36_000,
        (tenths / 600) % 60,
        (tenths % 600) as f64 / 10f64
    )
}

/// Formats a declination in degrees as `±DD°MM'SS"`
pub fn format_dms(dec: f64) -> String {
    let sign = if dec < 0f64 { '-' } else { '+' };
    let arcsec = (dec.abs() * 3600f64).round() as u64;
    format!(
        "{}{:02}°{:02}'{:02}\"",
        sign,
        arcsec / 3600,
        (arcsec / 60) % 60,
        arcsec % 60
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fits::HeaderValue;
    use approx::assert_relative_eq;

    fn header(cards: &[(&str, HeaderValue)]) -> Header {
        cards
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn m31() -> Header {
        use HeaderValue::*;
        header(&[
            ("CTYPE1", Text("RA---TAN-SIP".into())),
            ("CTYPE2", Text("DEC--TAN-SIP".into())),
            ("CRPIX1", Real(512.5)),
            ("CRPIX2", Real(384.5)),
            ("CRVAL1", Real(10.6847)),
            ("CRVAL2", Real(41.2690)),
            ("CD1_1", Real(-2.8e-4)),
            ("CD1_2", Real(1.0e-5)),
            ("CD2_1", Real(1.2e-5)),
            ("CD2_2", Real(2.8e-4)),
            ("A_ORDER", Integer(2)),
        ])
    }

    #[test]
    fn reference_pixel() {
        let wcs = Wcs::from_header(&m31()).unwrap();
        let (ra, dec) = wcs.pixel_to_world(511.5, 383.5);
        assert_relative_eq!(ra, 10.6847, epsilon = 1e-10);
        assert_relative_eq!(dec, 41.2690, epsilon = 1e-10);
    }

    #[test]
    fn round_trip() {
        let wcs = Wcs::from_header(&m31()).unwrap();
        for &(x, y) in &[(0., 0.), (1023., 767.), (100.25, 700.75)] {
            let (ra, dec) = wcs.pixel_to_world(x, y);
            let (px, py) = wcs.world_to_pixel(ra, dec).unwrap();
            assert_relative_eq!(px, x, epsilon = 1e-6);
            assert_relative_eq!(py, y, epsilon = 1e-6);
        }
        assert!(wcs.world_to_pixel(190.6847, -41.269).is_none());
    }

    #[test]
    fn east_is_left() {
        let wcs = Wcs::from_header(&m31()).unwrap();
        let (ra0, _) = wcs.pixel_to_world(500., 380.);
        let (ra1, _) = wcs.pixel_to_world(501., 380.);
        assert!(ra1 < ra0);
    }

    #[test]
    fn cdelt_and_crota() {
        use HeaderValue::*;
        let wcs = Wcs::from_header(&header(&[
            ("CRPIX1", Real(1.)),
            ("CRPIX2", Real(1.)),
            ("CRVAL1", Real(0.)),
            ("CRVAL2", Real(0.)),
            ("CDELT1", Real(-0.001)),
            ("CDELT2", Real(0.001)),
            ("CROTA2", Real(90.)),
        ]))
        .unwrap();
        assert_relative_eq!(wcs.cd[(0, 0)], 0., epsilon = 1e-12);
        assert_relative_eq!(wcs.cd[(0, 1)], -0.001, epsilon = 1e-12);
        assert_relative_eq!(wcs.cd[(1, 0)], -0.001, epsilon = 1e-12);
        assert_relative_eq!(wcs.pixel_scale_arcsec(), 3.6, epsilon = 1e-9);
    }

    #[test]
    fn pc_matrix() {
        use HeaderValue::*;
        let wcs = Wcs::from_header(&header(&[
            ("CRPIX1", Real(1.)),
            ("CRPIX2", Real(1.)),
            ("CRVAL1", Real(0.)),
            ("CRVAL2", Real(0.)),
            ("CDELT1", Real(2.)),
            ("CDELT2", Real(3.)),
            ("PC1_2", Real(0.5)),
        ]))
        .unwrap();
        assert_eq!(wcs.cd, Matrix2::new(2., 1., 0., 3.));
    }

    #[test]
    fn header_errors() {
        use HeaderValue::*;
        assert!(matches!(
            Wcs::from_header(&header(&[("CRPIX1", Real(1.))])),
            Err(WcsError::MissingKey(key)) if key == "CRPIX2"
        ));
        let no_scale: Header = m31()
            .into_iter()
            .filter(|(k, _)| !k.starts_with("CD"))
            .collect();
        assert!(matches!(
            Wcs::from_header(&no_scale),
            Err(WcsError::MissingScale)
        ));
        let mut sin = m31();
        sin.insert("CTYPE1", Text("RA---SIN".into()));
        assert!(matches!(
            Wcs::from_header(&sin),
            Err(WcsError::UnsupportedProjection(_))
        ));
        let mut singular = m31();
        singular.insert("CD2_1", Real(0.));
        singular.insert("CD2_2", Real(0.));
        assert!(matches!(
            Wcs::from_header(&singular),
            Err(WcsError::Singular(_))
        ));
    }

    #[test]
    fn sexagesimal() {
        assert_eq!(format_hms(83.63308), "05h34m31.9s");
        assert_eq!(format_hms(0.), "00h00m00.0s");
        assert_eq!(format_hms(359.99999), "00h00m00.0s");
        assert_eq!(format_hms(-15.), "23h00m00.0s");
        assert_eq!(format_dms(22.0145), "+22°00'52\"");
        assert_eq!(format_dms(-5.5), "-05°30'00\"");
    }
}
