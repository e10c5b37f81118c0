//! FITS file discovery
//!
//! Lists the files of a single directory whose name matches either a glob
//! pattern (`"*.fits"`, `"dark_??.fit"`) or a plain substring (`"flat"`).

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use glob::{MatchOptions, Pattern, PatternError};

#[derive(Debug, thiserror::Error)]
pub enum LocatorError {
    #[error("directory {0:?} not found")]
    NotFound(PathBuf),
    #[error("failed to read directory {1:?}")]
    Io(#[source] io::Error, PathBuf),
    #[error("invalid file pattern {1:?}")]
    Pattern(#[source] PatternError, String),
}
type Result<T> = std::result::Result<T, LocatorError>;

/// File name matcher
#[derive(Debug, Clone)]
pub enum Marker {
    /// Shell-like wildcard matching on the whole file name
    Glob(Pattern),
    /// File names containing the string
    Substring(String),
}
impl Marker {
    /// Builds the matcher for `marker`
    ///
    /// Markers with any of the glob metacharacters `*`, `?` or `[` are globs,
    /// anything else is a substring.
    pub fn new(marker: &str) -> Result<Self> {
        if marker.contains(&['*', '?', '['][..]) {
            Pattern::new(marker)
                .map(Marker::Glob)
                .map_err(|e| LocatorError::Pattern(e, marker.to_string()))
        } else {
            Ok(Marker::Substring(marker.to_string()))
        }
    }
    /// Checks a file name against the marker
    pub fn matches(&self, file_name: &str) -> bool {
        match self {
            Marker::Glob(pattern) => pattern.matches_with(
                file_name,
                MatchOptions {
                    require_literal_leading_dot: true,
                    ..Default::default()
                },
            ),
            Marker::Substring(s) => file_name.contains(s.as_str()),
        }
    }
}

/// Returns the sorted list of the files in `directory` matching `marker`
///
/// Sub-directories are neither returned nor searched.
/// An empty list is returned if no file matches.
pub fn get_filenames<P: AsRef<Path>>(directory: P, marker: &str) -> Result<Vec<PathBuf>> {
    let directory = directory.as_ref();
    if !directory.is_dir() {
        return Err(LocatorError::NotFound(directory.to_path_buf()));
    }
    let marker = Marker::new(marker)?;
    let entries =
        fs::read_dir(directory).map_err(|e| LocatorError::Io(e, directory.to_path_buf()))?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| LocatorError::Io(e, directory.to_path_buf()))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        match entry.file_name().to_str() {
            Some(name) if marker.matches(name) => files.push(path),
            Some(_) => (),
            None => log::warn!("skipping non UTF-8 file name {:?}", entry.file_name()),
        }
    }
    files.sort();
    files.dedup();
    log::debug!("found {} files in {:?}", files.len(), directory);
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::TempDir;

    fn populate(names: &[&str]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for name in names {
            File::create(dir.path().join(name)).unwrap();
        }
        dir
    }

    fn names(files: &[PathBuf]) -> Vec<String> {
        files
            .iter()
            .map(|f| f.file_name().unwrap().to_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn glob_is_sorted() {
        let dir = populate(&["c.fits", "a.fits", "b.fits", "notes.txt"]);
        let files = get_filenames(dir.path(), "*.fits").unwrap();
        assert_eq!(names(&files), vec!["a.fits", "b.fits", "c.fits"]);
        assert!(files.iter().all(|f| f.parent() == Some(dir.path())));
    }

    #[test]
    fn substring_marker() {
        let dir = populate(&["dark_001.fits", "flat_001.fits", "dark_002.fits"]);
        let files = get_filenames(dir.path(), "dark").unwrap();
        assert_eq!(names(&files), vec!["dark_001.fits", "dark_002.fits"]);
    }

    #[test]
    fn question_mark_glob() {
        let dir = populate(&["f1.fits", "f2.fits", "f10.fits"]);
        let files = get_filenames(dir.path(), "f?.fits").unwrap();
        assert_eq!(names(&files), vec!["f1.fits", "f2.fits"]);
    }

    #[test]
    fn no_recursion() {
        let dir = populate(&["top.fits"]);
        fs::create_dir(dir.path().join("sub.fits")).unwrap();
        File::create(dir.path().join("sub.fits").join("nested.fits")).unwrap();
        let files = get_filenames(dir.path(), "*.fits").unwrap();
        assert_eq!(names(&files), vec!["top.fits"]);
    }

    #[test]
    fn hidden_files_need_literal_dot() {
        let dir = populate(&[".hidden.fits", "visible.fits"]);
        let files = get_filenames(dir.path(), "*.fits").unwrap();
        assert_eq!(names(&files), vec!["visible.fits"]);
    }

    #[test]
    fn empty_match_is_not_an_error() {
        let dir = populate(&["a.txt"]);
        assert!(get_filenames(dir.path(), "*.fits").unwrap().is_empty());
    }

    #[test]
    fn missing_directory() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nowhere");
        assert!(matches!(
            get_filenames(&missing, "*.fits"),
            Err(LocatorError::NotFound(path)) if path == missing
        ));
    }

    #[test]
    fn bad_pattern() {
        let dir = populate(&[]);
        assert!(matches!(
            get_filenames(dir.path(), "[.fits"),
            Err(LocatorError::Pattern(..))
        ));
    }
}
