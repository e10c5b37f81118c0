//! Image rendering
//!
//! The intensity range is clipped to `mean ± scale * sigma` of the finite
//! pixels unless set explicitly. Row 0 of the image is drawn at the bottom.
//! The PNG rendering itself ([implot]) requires the `plot` feature.

use ndarray::Array2;
use strum_macros::{Display, EnumIter, EnumString};

use crate::{
    fits::Header,
    wcs::{Wcs, WcsError},
};

#[derive(Debug, thiserror::Error)]
pub enum PlotError {
    #[error("cannot plot an empty image")]
    EmptyImage,
    #[error("failed to draw the image: {0}")]
    Drawing(String),
    #[error("failed to set up WCS axes")]
    Wcs(#[from] WcsError),
}
#[cfg(feature = "plot")]
impl<E: std::error::Error + Send + Sync> From<plotters::drawing::DrawingAreaErrorKind<E>>
    for PlotError
{
    fn from(e: plotters::drawing::DrawingAreaErrorKind<E>) -> Self {
        PlotError::Drawing(e.to_string())
    }
}
#[cfg(feature = "plot")]
type Result<T> = std::result::Result<T, PlotError>;

/// Image color maps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumString, Display, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum ColorMap {
    Gray,
    /// Reversed gray: bright pixels are black
    #[default]
    GrayR,
    Viridis,
    Plasma,
    Inferno,
    Magma,
    Cubehelix,
}
impl ColorMap {
    /// RGB color of the normalized intensity `u`, clamped to `[0, 1]`
    pub fn rgb(&self, u: f64) -> (u8, u8, u8) {
        let u = if u.is_nan() { 0f64 } else { u.clamp(0f64, 1f64) };
        let gray = |u: f64| {
            let v = (255f64 * u).round() as u8;
            (v, v, v)
        };
        match self {
            ColorMap::Gray => gray(u),
            ColorMap::GrayR => gray(1f64 - u),
            ColorMap::Viridis => colorous::VIRIDIS.eval_continuous(u).as_tuple(),
            ColorMap::Plasma => colorous::PLASMA.eval_continuous(u).as_tuple(),
            ColorMap::Inferno => colorous::INFERNO.eval_continuous(u).as_tuple(),
            ColorMap::Magma => colorous::MAGMA.eval_continuous(u).as_tuple(),
            ColorMap::Cubehelix => colorous::CUBEHELIX.eval_continuous(u).as_tuple(),
        }
    }
}

/// Display intensity range of an image
///
/// `mean - scale * sigma` and `mean + scale * sigma` over the finite pixels,
/// `vmin` and `vmax` override either bound.
pub fn intensity_limits(
    image: &Array2<f64>,
    scale: f64,
    vmin: Option<f64>,
    vmax: Option<f64>,
) -> (f64, f64) {
    let (n, sum, sum_sq) = image
        .iter()
        .filter(|x| x.is_finite())
        .fold((0usize, 0f64, 0f64), |(n, s, s2), &x| (n + 1, s + x, s2 + x * x));
    let (mean, sigma) = if n == 0 {
        (0f64, 0f64)
    } else {
        let mean = sum / n as f64;
        (mean, (sum_sq / n as f64 - mean * mean).max(0f64).sqrt())
    };
    (
        vmin.unwrap_or(mean - scale * sigma),
        vmax.unwrap_or(mean + scale * sigma),
    )
}

/// Normalizes `value` to `[0, 1]` within `(lo, hi)`, 0.5 for an empty range
pub fn normalize(value: f64, (lo, hi): (f64, f64)) -> f64 {
    if hi > lo {
        ((value - lo) / (hi - lo)).clamp(0f64, 1f64)
    } else {
        0.5
    }
}

/// [implot] options
#[derive(Debug, Clone, PartialEq)]
pub struct ImplotConfig {
    /// Image size in pixels
    pub size: (u32, u32),
    pub cmap: ColorMap,
    /// Half-width of the intensity range in standard deviations
    pub scale: f64,
    pub colorbar: bool,
    pub vmin: Option<f64>,
    pub vmax: Option<f64>,
    /// Celestial axes
    pub wcs: Option<Wcs>,
}
impl Default for ImplotConfig {
    fn default() -> Self {
        Self {
            size: (1500, 1300),
            cmap: ColorMap::default(),
            scale: 0.5,
            colorbar: false,
            vmin: None,
            vmax: None,
            wcs: None,
        }
    }
}
impl ImplotConfig {
    pub fn size(self, width: u32, height: u32) -> Self {
        Self {
            size: (width, height),
            ..self
        }
    }
    pub fn cmap(self, cmap: ColorMap) -> Self {
        Self { cmap, ..self }
    }
    pub fn scale(self, scale: f64) -> Self {
        Self { scale, ..self }
    }
    pub fn colorbar(self, colorbar: bool) -> Self {
        Self { colorbar, ..self }
    }
    pub fn vmin(self, vmin: f64) -> Self {
        Self {
            vmin: Some(vmin),
            ..self
        }
    }
    pub fn vmax(self, vmax: f64) -> Self {
        Self {
            vmax: Some(vmax),
            ..self
        }
    }
    pub fn wcs(self, wcs: Wcs) -> Self {
        Self {
            wcs: Some(wcs),
            ..self
        }
    }
    /// Sets the WCS from an image header, SIP distortion keywords are dropped
    pub fn header(self, header: &Header) -> std::result::Result<Self, WcsError> {
        let wcs = Wcs::from_header(&header.without_distortion())?;
        Ok(self.wcs(wcs))
    }
    /// Intensity range of `image` with these options
    pub fn limits(&self, image: &Array2<f64>) -> (f64, f64) {
        intensity_limits(image, self.scale, self.vmin, self.vmax)
    }
}

#[cfg(feature = "plot")]
const COLORBAR_WIDTH: u32 = 140;

/// Renders `image` into a PNG file
#[cfg(feature = "plot")]
pub fn implot<P: AsRef<std::path::Path>>(
    image: &Array2<f64>,
    path: P,
    config: &ImplotConfig,
) -> Result<()> {
    use crate::wcs::{format_dms, format_hms};
    use plotters::prelude::*;

    let (rows, cols) = image.dim();
    if rows == 0 || cols == 0 {
        return Err(PlotError::EmptyImage);
    }
    let limits = config.limits(image);
    log::debug!("display range: [{:.3}, {:.3}]", limits.0, limits.1);
    let color = |value: f64| {
        if value.is_nan() {
            WHITE
        } else {
            let (r, g, b) = config.cmap.rgb(normalize(value, limits));
            RGBColor(r, g, b)
        }
    };

    let root = BitMapBackend::new(path.as_ref(), config.size).into_drawing_area();
    root.fill(&WHITE)?;
    let (width, _) = root.dim_in_pixel();
    let (image_area, colorbar_area) = if config.colorbar {
        let (image_area, colorbar_area) =
            root.split_horizontally(width.saturating_sub(COLORBAR_WIDTH) as i32);
        (image_area, Some(colorbar_area))
    } else {
        (root.clone(), None)
    };

    let mut chart = ChartBuilder::on(&image_area)
        .margin(20)
        .set_label_area_size(LabelAreaPosition::Left, 100)
        .set_label_area_size(LabelAreaPosition::Bottom, 60)
        .build_cartesian_2d(0f64..cols as f64, 0f64..rows as f64)?;

    // nearest neighbour resampling onto the plotting area
    let plotting_area = chart.plotting_area().strip_coord_spec();
    let (px_width, px_height) = plotting_area.dim_in_pixel();
    for j in 0..px_height {
        let row = rows - 1 - (j as usize * rows / px_height as usize).min(rows - 1);
        for i in 0..px_width {
            let col = (i as usize * cols / px_width as usize).min(cols - 1);
            plotting_area.draw_pixel((i as i32, j as i32), &color(image[[row, col]]))?;
        }
    }

    match &config.wcs {
        Some(wcs) => {
            // chart coordinates are pixel edges, pixel centres are at +0.5
            let ra_label = |x: &f64| format_hms(wcs.pixel_to_world(*x - 0.5, -0.5).0);
            let dec_label = |y: &f64| format_dms(wcs.pixel_to_world(-0.5, *y - 0.5).1);
            chart
                .configure_mesh()
                .x_desc("Right Ascension [hms]")
                .y_desc("Declination [degrees]")
                .x_labels(6)
                .y_labels(6)
                .x_label_formatter(&ra_label)
                .y_label_formatter(&dec_label)
                .bold_line_style(&RGBColor(128, 128, 128).mix(0.5))
                .light_line_style(&WHITE.mix(0.0))
                .draw()?;
        }
        None => {
            chart
                .configure_mesh()
                .disable_mesh()
                .x_desc("x [pixel]")
                .y_desc("y [pixel]")
                .draw()?;
        }
    }

    if let Some(area) = colorbar_area {
        let (lo, hi) = if limits.1 > limits.0 {
            limits
        } else {
            (limits.0 - 0.5, limits.0 + 0.5)
        };
        let mut bar = ChartBuilder::on(&area)
            .margin_top(20)
            .margin_bottom(80)
            .margin_right(10)
            .set_label_area_size(LabelAreaPosition::Right, 80)
            .build_cartesian_2d(0f64..1f64, lo..hi)?;
        let bar_area = bar.plotting_area().strip_coord_spec();
        let (px_width, px_height) = bar_area.dim_in_pixel();
        for j in 0..px_height {
            let u = 1f64 - j as f64 / (px_height.max(2) - 1) as f64;
            let (r, g, b) = config.cmap.rgb(u);
            for i in 0..px_width {
                bar_area.draw_pixel((i as i32, j as i32), &RGBColor(r, g, b))?;
            }
        }
        bar.configure_mesh()
            .disable_mesh()
            .disable_x_axis()
            .y_labels(8)
            .draw()?;
    }

    root.present()?;
    log::info!("image saved to {:?}", path.as_ref());
    Ok(())
}
