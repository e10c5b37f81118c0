//! Pixel-wise combination of image stacks

use std::{fmt, str::FromStr, sync::Arc};

use ndarray::Array2;

#[derive(Debug, thiserror::Error)]
pub enum ReductionError {
    #[error("nothing to reduce")]
    Empty,
    #[error("frame #{index} has shape {actual:?}, expected {expected:?}")]
    ShapeMismatch {
        index: usize,
        expected: (usize, usize),
        actual: (usize, usize),
    },
    #[error("unknown reduction method {0:?} (expected mean, median or sum)")]
    Unknown(String),
}
type Result<T> = std::result::Result<T, ReductionError>;

/// Named user supplied combination of the values of a pixel stack
///
/// The closure may reorder the slice it is given.
#[derive(Clone)]
pub struct CustomReduction {
    name: String,
    function: Arc<dyn Fn(&mut [f64]) -> f64 + Send + Sync>,
}
impl CustomReduction {
    pub fn new<S, F>(name: S, function: F) -> Self
    where
        S: Into<String>,
        F: Fn(&mut [f64]) -> f64 + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            function: Arc::new(function),
        }
    }
    pub fn name(&self) -> &str {
        &self.name
    }
}
impl fmt::Debug for CustomReduction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomReduction")
            .field("name", &self.name)
            .finish()
    }
}

/// Frame combination method
#[derive(Debug, Clone, Default)]
pub enum Reduction {
    Mean,
    #[default]
    Median,
    Sum,
    Custom(CustomReduction),
}
impl Reduction {
    /// Custom reduction from a closure
    ///
    /// ```
    /// use phot_utils::Reduction;
    /// let max = Reduction::custom("max", |v| v.iter().cloned().fold(f64::NEG_INFINITY, f64::max));
    /// assert_eq!(max.combine(&mut [1., 3., 2.]), 3.);
    /// ```
    pub fn custom<S, F>(name: S, function: F) -> Self
    where
        S: Into<String>,
        F: Fn(&mut [f64]) -> f64 + Send + Sync + 'static,
    {
        Reduction::Custom(CustomReduction::new(name, function))
    }
    /// Combines the values of one pixel stack
    pub fn combine(&self, values: &mut [f64]) -> f64 {
        match self {
            Reduction::Mean => values.iter().sum::<f64>() / values.len() as f64,
            Reduction::Median => median(values),
            Reduction::Sum => values.iter().sum(),
            Reduction::Custom(custom) => (custom.function)(values),
        }
    }
    /// Reduces a stack of frames pixel by pixel
    ///
    /// All the frames must have the shape of the first one.
    pub fn reduce(&self, frames: &[Array2<f64>]) -> Result<Array2<f64>> {
        let first = frames.first().ok_or(ReductionError::Empty)?;
        let expected = first.dim();
        if let Some((index, frame)) = frames
            .iter()
            .enumerate()
            .find(|(_, frame)| frame.dim() != expected)
        {
            return Err(ReductionError::ShapeMismatch {
                index,
                expected,
                actual: frame.dim(),
            });
        }
        let mut stack = vec![0f64; frames.len()];
        Ok(Array2::from_shape_fn(expected, |ij| {
            stack
                .iter_mut()
                .zip(frames)
                .for_each(|(value, frame)| *value = frame[ij]);
            self.combine(&mut stack)
        }))
    }
}
impl fmt::Display for Reduction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reduction::Mean => write!(f, "mean"),
            Reduction::Median => write!(f, "median"),
            Reduction::Sum => write!(f, "sum"),
            Reduction::Custom(custom) => write!(f, "{}", custom.name),
        }
    }
}
impl FromStr for Reduction {
    type Err = ReductionError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "mean" => Ok(Reduction::Mean),
            "median" => Ok(Reduction::Median),
            "sum" => Ok(Reduction::Sum),
            _ => Err(ReductionError::Unknown(s.to_string())),
        }
    }
}

/// Median with the mean of the two central values for an even count, NaN if any value is NaN
pub fn median(values: &mut [f64]) -> f64 {
    let n = values.len();
    if n == 0 || values.iter().any(|x| x.is_nan()) {
        return f64::NAN;
    }
    let mid = n / 2;
    let (lower, upper, _) = values.select_nth_unstable_by(mid, f64::total_cmp);
    let upper = *upper;
    if n % 2 == 1 {
        upper
    } else {
        let lower = lower.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        0.5 * (lower + upper)
    }
}
