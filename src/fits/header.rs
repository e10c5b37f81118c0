//! FITS header keywords
//!
//! cfitsio gives access to keywords one name at a time, so the full mapping of
//! an HDU header is read with `fitrs`.

use std::{collections::BTreeMap, fmt, ops::Deref, path::Path};

use fitrs::Fits;
use regex::Regex;

use super::{
    loader::{open_fits, select_hdu},
    FitsError,
};

/// SIP distortion keyword prefixes
const DISTORTION_PREFIXES: [&str; 4] = ["A_", "B_", "AP_", "BP_"];

/// Header keyword value
#[derive(Debug, Clone, PartialEq)]
pub enum HeaderValue {
    Logical(bool),
    Integer(i64),
    Real(f64),
    Text(String),
}
impl HeaderValue {
    /// Complex values are not kept
    fn from_fitrs(value: &fitrs::HeaderValue) -> Option<Self> {
        match value {
            fitrs::HeaderValue::CharacterString(x) => Some(HeaderValue::Text(x.clone())),
            fitrs::HeaderValue::Logical(x) => Some(HeaderValue::Logical(*x)),
            fitrs::HeaderValue::IntegerNumber(x) => Some(HeaderValue::Integer(i64::from(*x))),
            fitrs::HeaderValue::RealFloatingNumber(x) => Some(HeaderValue::Real(*x)),
            fitrs::HeaderValue::ComplexIntegerNumber(..)
            | fitrs::HeaderValue::ComplexFloatingNumber(..) => None,
        }
    }
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            HeaderValue::Real(x) => Some(*x),
            HeaderValue::Integer(x) => Some(*x as f64),
            _ => None,
        }
    }
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            HeaderValue::Integer(x) => Some(*x),
            _ => None,
        }
    }
    pub fn as_str(&self) -> Option<&str> {
        match self {
            HeaderValue::Text(x) => Some(x.as_str()),
            _ => None,
        }
    }
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            HeaderValue::Logical(x) => Some(*x),
            _ => None,
        }
    }
}
impl fmt::Display for HeaderValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaderValue::Logical(true) => write!(f, "T"),
            HeaderValue::Logical(false) => write!(f, "F"),
            HeaderValue::Integer(x) => write!(f, "{}", x),
            HeaderValue::Real(x) => write!(f, "{:E}", x),
            HeaderValue::Text(x) => write!(f, "'{}'", x.replace('\'', "''")),
        }
    }
}

/// The keyword/value mapping of an HDU header
///
/// Commentary cards (`COMMENT`, `HISTORY`, ...) are not kept.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Header(BTreeMap<String, HeaderValue>);
impl Deref for Header {
    type Target = BTreeMap<String, HeaderValue>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
impl FromIterator<(String, HeaderValue)> for Header {
    fn from_iter<T: IntoIterator<Item = (String, HeaderValue)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
impl IntoIterator for Header {
    type Item = (String, HeaderValue);
    type IntoIter = std::collections::btree_map::IntoIter<String, HeaderValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
impl Header {
    /// Reads the header of HDU #`extension` of a FITS file
    pub fn read<P: AsRef<Path>>(path: P, extension: usize) -> Result<Self, FitsError> {
        let path = path.as_ref();
        let mut fptr = open_fits(path)?;
        select_hdu(&mut fptr, path, extension)?;
        drop(fptr);
        Self::read_keywords(path, extension)
    }
    /// Reads the keywords of an HDU that cfitsio already found in the file
    pub(super) fn read_keywords(path: &Path, extension: usize) -> Result<Self, FitsError> {
        let fits = Fits::open(path).map_err(|e| FitsError::Io(e, path.to_path_buf()))?;
        let hdu = fits.get(extension).ok_or_else(|| FitsError::Header {
            path: path.to_path_buf(),
            reason: format!("HDU #{extension} is not stored as plain FITS records"),
        })?;
        Ok(hdu
            .iter()
            .filter_map(|(key, value)| {
                HeaderValue::from_fitrs(value?).map(|value| (key.clone(), value))
            })
            .collect())
    }
    pub fn insert<K: Into<String>>(&mut self, key: K, value: HeaderValue) -> Option<HeaderValue> {
        self.0.insert(key.into(), value)
    }
    /// Numeric value of a keyword, integers are widened
    pub fn real(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(HeaderValue::as_f64)
    }
    pub fn integer(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(HeaderValue::as_i64)
    }
    pub fn text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(HeaderValue::as_str)
    }
    pub fn logical(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(HeaderValue::as_bool)
    }
    /// Keeps the keywords matching `re`
    pub fn filter(&self, re: &Regex) -> Self {
        self.iter()
            .filter(|(key, _)| re.is_match(key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
    /// Removes the SIP distortion keywords
    pub fn without_distortion(&self) -> Self {
        self.iter()
            .filter(|(key, _)| !DISTORTION_PREFIXES.iter().any(|p| key.starts_with(p)))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
}
impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in self.iter() {
            writeln!(f, "{:<8} = {}", key, value)?;
        }
        Ok(())
    }
}
