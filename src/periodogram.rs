//! Generalised Lomb-Scargle periodogram
//!
//! Zechmeister & Kürster (2009), A&A 496, 577: the sinusoid fit includes an
//! offset and the samples are weighted by their inverse variance. The power is
//! normalised to `[0, 1]` (fraction of the variance explained by the sinusoid).

use std::{f64::consts::PI, path::Path};

use rayon::prelude::*;

use crate::photometry::LightCurve;

#[derive(Debug, thiserror::Error)]
pub enum PeriodogramError {
    #[error("at least 3 samples are required, found {0}")]
    TooFewPoints(usize),
    #[error("time has {time} samples but {other} has {len}")]
    LengthMismatch {
        time: usize,
        other: &'static str,
        len: usize,
    },
    #[error("non finite {0} at sample #{1}")]
    NonFinite(&'static str, usize),
    #[error("all samples are at the same time")]
    ZeroTimeSpan,
    #[error("flux error must be positive, found {1} at sample #{0}")]
    NonPositiveError(usize, f64),
    #[error("the frequency grid is empty")]
    EmptyGrid,
    #[error("frequencies must be positive and finite, found {0}")]
    InvalidFrequency(f64),
    #[error("{0} must be positive, found {1}")]
    InvalidParameter(&'static str, f64),
    #[error("the flux is constant")]
    ConstantFlux,
    #[error("failed to write periodogram CSV file")]
    Csv(#[from] csv::Error),
}
type Result<T> = std::result::Result<T, PeriodogramError>;

/// GLS periodogram builder
///
/// ```
/// use phot_utils::periodogram::Gls;
/// let time: Vec<f64> = (0..60).map(|i| i as f64 * 0.37 + (i as f64).sin()).collect();
/// let flux: Vec<f64> = time.iter().map(|t| (2. * std::f64::consts::PI * t / 4.).sin()).collect();
/// let periodogram = Gls::new(time, flux).compute()?;
/// assert!((periodogram.best_period() - 4.).abs() < 0.2);
/// # Ok::<(), phot_utils::periodogram::PeriodogramError>(())
/// ```
#[derive(Debug, Clone)]
pub struct Gls {
    time: Vec<f64>,
    flux: Vec<f64>,
    error: Option<Vec<f64>>,
    ofac: f64,
    hifac: f64,
    frequencies: Option<Vec<f64>>,
}
impl Gls {
    pub fn new(time: Vec<f64>, flux: Vec<f64>) -> Self {
        Self {
            time,
            flux,
            error: None,
            ofac: 10f64,
            hifac: 1f64,
            frequencies: None,
        }
    }
    /// Flux uncertainties, the samples are weighted by `1/error^2`
    pub fn errors(self, error: Vec<f64>) -> Self {
        Self {
            error: Some(error),
            ..self
        }
    }
    /// Oversampling factor of the default frequency grid
    pub fn oversampling(self, ofac: f64) -> Self {
        Self { ofac, ..self }
    }
    /// Highest frequency of the default grid in units of the average Nyquist frequency
    pub fn max_frequency_factor(self, hifac: f64) -> Self {
        Self { hifac, ..self }
    }
    /// User frequency grid, replaces the default one
    pub fn frequencies(self, frequencies: Vec<f64>) -> Self {
        Self {
            frequencies: Some(frequencies),
            ..self
        }
    }
    fn validate(&self) -> Result<()> {
        let n = self.time.len();
        if self.flux.len() != n {
            return Err(PeriodogramError::LengthMismatch {
                time: n,
                other: "flux",
                len: self.flux.len(),
            });
        }
        if let Some(error) = &self.error {
            if error.len() != n {
                return Err(PeriodogramError::LengthMismatch {
                    time: n,
                    other: "error",
                    len: error.len(),
                });
            }
            if let Some(i) = error.iter().position(|e| !e.is_finite()) {
                return Err(PeriodogramError::NonFinite("error", i));
            }
            if let Some(i) = error.iter().position(|&e| e <= 0f64) {
                return Err(PeriodogramError::NonPositiveError(i, error[i]));
            }
        }
        if n < 3 {
            return Err(PeriodogramError::TooFewPoints(n));
        }
        if let Some(i) = self.time.iter().position(|t| !t.is_finite()) {
            return Err(PeriodogramError::NonFinite("time", i));
        }
        if let Some(i) = self.flux.iter().position(|f| !f.is_finite()) {
            return Err(PeriodogramError::NonFinite("flux", i));
        }
        if !(self.ofac > 0f64) {
            return Err(PeriodogramError::InvalidParameter("ofac", self.ofac));
        }
        if !(self.hifac > 0f64) {
            return Err(PeriodogramError::InvalidParameter("hifac", self.hifac));
        }
        Ok(())
    }
    /// Frequency grid and number of independent frequencies
    fn grid(&self, time_span: f64) -> Result<(Vec<f64>, f64)> {
        match &self.frequencies {
            Some(frequencies) => {
                if frequencies.is_empty() {
                    return Err(PeriodogramError::EmptyGrid);
                }
                if let Some(&f) = frequencies.iter().find(|f| !(f.is_finite() && **f > 0f64)) {
                    return Err(PeriodogramError::InvalidFrequency(f));
                }
                Ok((frequencies.clone(), frequencies.len() as f64))
            }
            None => {
                let n = self.time.len() as f64;
                let fstep = 1f64 / (time_span * self.ofac);
                let fbeg = fstep;
                let fend = self.hifac * n / (2f64 * time_span);
                if fend < fbeg {
                    return Err(PeriodogramError::EmptyGrid);
                }
                let n_freq = ((fend - fbeg) / fstep + 1e-9).floor() as usize + 1;
                let frequencies = (0..n_freq).map(|i| fbeg + i as f64 * fstep).collect();
                Ok((frequencies, (fend - fbeg) / fstep))
            }
        }
    }
    /// Evaluates the periodogram over the frequency grid
    pub fn compute(self) -> Result<Periodogram> {
        self.validate()?;
        let (tmin, tmax) = self
            .time
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &t| {
                (lo.min(t), hi.max(t))
            });
        let time_span = tmax - tmin;
        if time_span <= 0f64 {
            return Err(PeriodogramError::ZeroTimeSpan);
        }
        let (frequency, n_independent) = self.grid(time_span)?;

        let mut weight: Vec<f64> = match &self.error {
            Some(error) => error.iter().map(|e| e.powi(-2)).collect(),
            None => vec![1f64; self.time.len()],
        };
        let weight_sum: f64 = weight.iter().sum();
        weight.iter_mut().for_each(|w| *w /= weight_sum);

        let y_mean: f64 = weight.iter().zip(&self.flux).map(|(w, y)| w * y).sum();
        let yy: f64 = weight
            .iter()
            .zip(&self.flux)
            .map(|(w, y)| w * (y - y_mean).powi(2))
            .sum();
        if yy <= f64::EPSILON * y_mean * y_mean || yy <= 0f64 {
            return Err(PeriodogramError::ConstantFlux);
        }
        let time: Vec<f64> = self.time.iter().map(|t| t - tmin).collect();

        let power: Vec<f64> = frequency
            .par_iter()
            .map(|&f| {
                let omega = 2f64 * PI * f;
                let (mut c, mut s, mut yc, mut ys, mut cc, mut cs) = (0f64, 0f64, 0f64, 0f64, 0f64, 0f64);
                for ((&t, &y), &w) in time.iter().zip(&self.flux).zip(&weight) {
                    let (sin, cos) = (omega * t).sin_cos();
                    c += w * cos;
                    s += w * sin;
                    yc += w * y * cos;
                    ys += w * y * sin;
                    cc += w * cos * cos;
                    cs += w * cos * sin;
                }
                let ss = 1f64 - cc - s * s;
                let cc = cc - c * c;
                let cs = cs - c * s;
                let yc = yc - y_mean * c;
                let ys = ys - y_mean * s;
                let d = cc * ss - cs * cs;
                if d <= 0f64 {
                    0f64
                } else {
                    ((ss * yc * yc + cc * ys * ys - 2f64 * cs * yc * ys) / (yy * d)).clamp(0f64, 1f64)
                }
            })
            .collect();
        log::debug!(
            "GLS over {} frequencies in [{:.6}, {:.6}]",
            frequency.len(),
            frequency[0],
            frequency[frequency.len() - 1]
        );

        Ok(Periodogram {
            frequency,
            power,
            n_sample: self.time.len(),
            n_independent,
        })
    }
}
impl From<LightCurve> for Gls {
    fn from(lc: LightCurve) -> Self {
        let gls = Gls::new(lc.time, lc.flux);
        match lc.error {
            Some(error) => gls.errors(error),
            None => gls,
        }
    }
}

/// GLS power spectrum
#[derive(Debug, Clone, PartialEq)]
pub struct Periodogram {
    pub frequency: Vec<f64>,
    /// Normalised power in `[0, 1]`
    pub power: Vec<f64>,
    n_sample: usize,
    n_independent: f64,
}
impl Periodogram {
    pub fn len(&self) -> usize {
        self.frequency.len()
    }
    pub fn is_empty(&self) -> bool {
        self.frequency.is_empty()
    }
    /// Frequency and power of the highest peak
    pub fn best(&self) -> (f64, f64) {
        self.frequency
            .iter()
            .zip(&self.power)
            .fold((f64::NAN, f64::NEG_INFINITY), |(bf, bp), (&f, &p)| {
                if p > bp {
                    (f, p)
                } else {
                    (bf, bp)
                }
            })
    }
    /// Period of the highest peak
    pub fn best_period(&self) -> f64 {
        1f64 / self.best().0
    }
    pub fn periods(&self) -> impl Iterator<Item = f64> + '_ {
        self.frequency.iter().map(|f| 1f64 / f)
    }
    /// Probability that noise alone yields a peak at least as high as `power` somewhere in the grid
    pub fn false_alarm_probability(&self, power: f64) -> f64 {
        let prob = (1f64 - power).powf(0.5 * (self.n_sample as f64 - 3f64));
        // 1 - (1 - prob)^M
        -(self.n_independent * (-prob).ln_1p()).exp_m1()
    }
    /// Writes `frequency,period,power` records
    pub fn to_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut wtr = csv::Writer::from_path(path)?;
        wtr.write_record(["frequency", "period", "power"])?;
        for (f, p) in self.frequency.iter().zip(&self.power) {
            wtr.write_record(&[f.to_string(), (1f64 / f).to_string(), p.to_string()])?;
        }
        wtr.flush().map_err(csv::Error::from)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn sinusoid(n: usize, period: f64, noise: f64, seed: u64) -> (Vec<f64>, Vec<f64>) {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut time: Vec<f64> = (0..n).map(|_| rng.gen_range(0f64..100f64)).collect();
        time.sort_by(f64::total_cmp);
        let flux = time
            .iter()
            .map(|t| 5. + 2. * (2. * PI * t / period + 0.3).sin() + noise * rng.gen_range(-1f64..1f64))
            .collect();
        (time, flux)
    }

    #[test]
    fn recovers_period() {
        let (time, flux) = sinusoid(150, 3.7, 0.3, 42);
        let periodogram = Gls::new(time, flux).compute().unwrap();
        assert_relative_eq!(periodogram.best_period(), 3.7, max_relative = 0.01);
        assert!(periodogram.power.iter().all(|p| (0f64..=1f64).contains(p)));
        let (_, power) = periodogram.best();
        assert!(power > 0.9);
        assert!(periodogram.false_alarm_probability(power) < 1e-6);
    }

    #[test]
    fn noiseless_power_is_one() {
        let (time, flux) = sinusoid(40, 5., 0., 7);
        let periodogram = Gls::new(time, flux)
            .frequencies(vec![0.2])
            .compute()
            .unwrap();
        assert_eq!(periodogram.len(), 1);
        assert_relative_eq!(periodogram.power[0], 1., epsilon = 1e-9);
    }

    #[test]
    fn uniform_errors_change_nothing() {
        let (time, flux) = sinusoid(50, 8., 0.5, 3);
        let n = time.len();
        let a = Gls::new(time.clone(), flux.clone()).compute().unwrap();
        let b = Gls::new(time, flux).errors(vec![0.5; n]).compute().unwrap();
        assert_eq!(a.len(), b.len());
        a.power
            .iter()
            .zip(&b.power)
            .for_each(|(a, b)| assert_relative_eq!(a, b, epsilon = 1e-12));
    }

    #[test]
    fn default_grid() {
        let time: Vec<f64> = (0..11).map(|i| i as f64).collect();
        let flux: Vec<f64> = time.iter().map(|t| (t * 1.3).sin()).collect();
        let periodogram = Gls::new(time, flux).compute().unwrap();
        // fstep = 1/(10*10), fend = 11/(2*10)
        assert_relative_eq!(periodogram.frequency[0], 0.01);
        assert_relative_eq!(periodogram.frequency[1] - periodogram.frequency[0], 0.01, epsilon = 1e-12);
        assert!(*periodogram.frequency.last().unwrap() <= 0.55 + 1e-12);
        assert_eq!(periodogram.len(), 55);
    }

    #[test]
    fn false_alarm_probability_bounds() {
        let (time, flux) = sinusoid(30, 4., 1., 11);
        let periodogram = Gls::new(time, flux).compute().unwrap();
        assert_relative_eq!(periodogram.false_alarm_probability(0.), 1.);
        assert_relative_eq!(periodogram.false_alarm_probability(1.), 0.);
        assert!(periodogram.false_alarm_probability(0.3) > periodogram.false_alarm_probability(0.6));
    }

    #[test]
    fn invalid_inputs() {
        assert!(matches!(
            Gls::new(vec![0., 1.], vec![1., 2.]).compute(),
            Err(PeriodogramError::TooFewPoints(2))
        ));
        assert!(matches!(
            Gls::new(vec![0., 1., 2.], vec![1., 2.]).compute(),
            Err(PeriodogramError::LengthMismatch { .. })
        ));
        assert!(matches!(
            Gls::new(vec![0., f64::NAN, 2.], vec![1., 2., 3.]).compute(),
            Err(PeriodogramError::NonFinite("time", 1))
        ));
        assert!(matches!(
            Gls::new(vec![1., 1., 1.], vec![1., 2., 3.]).compute(),
            Err(PeriodogramError::ZeroTimeSpan)
        ));
        assert!(matches!(
            Gls::new(vec![0., 1., 2.], vec![1., 2., 3.])
                .errors(vec![1., 0., 1.])
                .compute(),
            Err(PeriodogramError::NonPositiveError(1, _))
        ));
        assert!(matches!(
            Gls::new(vec![0., 1., 2.], vec![1., 2., 3.])
                .frequencies(vec![])
                .compute(),
            Err(PeriodogramError::EmptyGrid)
        ));
        assert!(matches!(
            Gls::new(vec![0., 1., 2.], vec![1., 2., 3.])
                .frequencies(vec![0.1, -0.2])
                .compute(),
            Err(PeriodogramError::InvalidFrequency(_))
        ));
        assert!(matches!(
            Gls::new(vec![0., 1., 2.], vec![4., 4., 4.]).compute(),
            Err(PeriodogramError::ConstantFlux)
        ));
    }
}
