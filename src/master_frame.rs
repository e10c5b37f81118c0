//! Batched master frame construction
//!
//! The sorted list of input frames is split into consecutive batches of at most
//! `bulk` files. Each batch is reduced into a batch master frame that is saved
//! as `master_frame_batch_<index>.fits` and kept in memory. The batch master
//! frames are then reduced with the same method into `final_master_frame.fits`.
//!
//! Only one batch of frames is held in memory at any time.
//! The result of a median build depends on `bulk` (median of medians), mean
//! builds with equal batch sizes and sum builds do not.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use indicatif::{ProgressBar, ProgressStyle};
use ndarray::Array2;
use rayon::prelude::*;

use crate::{
    fits::{write_fits, FitsError, FitsLoader},
    locator::{get_filenames, LocatorError},
    reduction::{Reduction, ReductionError},
    DEFAULT_BULK, DEFAULT_PATTERN,
};

/// File name prefix of the batch master frames
pub const BATCH_PREFIX: &str = "master_frame_batch_";
/// File name of the final master frame
pub const FINAL_MASTER_FRAME: &str = "final_master_frame.fits";

#[derive(Debug, thiserror::Error)]
pub enum MasterFrameError {
    #[error("the batch size must be greater than 0")]
    InvalidBulk,
    #[error("no file matching {pattern:?} in {directory:?}")]
    NoInputFiles { directory: PathBuf, pattern: String },
    #[error("failed to list the input files")]
    Locate(#[from] LocatorError),
    #[error("failed to load {path:?} (batch #{batch})")]
    Load {
        batch: usize,
        path: PathBuf,
        #[source]
        source: FitsError,
    },
    #[error("{path:?} (batch #{batch}) has shape {actual:?}, expected {expected:?}")]
    ShapeMismatch {
        batch: usize,
        path: PathBuf,
        expected: (usize, usize),
        actual: (usize, usize),
    },
    #[error("failed to reduce batch #{batch}")]
    Reduction {
        batch: usize,
        #[source]
        source: ReductionError,
    },
    #[error("failed to reduce the batch master frames")]
    FinalReduction(#[source] ReductionError),
    #[error("failed to create output directory {1:?}")]
    OutputDir(#[source] io::Error, PathBuf),
    #[error("failed to write {path:?}")]
    Write {
        path: PathBuf,
        #[source]
        source: FitsError,
    },
}
type Result<T> = std::result::Result<T, MasterFrameError>;

/// File name of the master frame of batch #`index`
pub fn batch_file_name(index: usize) -> String {
    format!("{BATCH_PREFIX}{index}.fits")
}

/// Checks if `path` is named like one of the builder outputs
pub fn is_master_frame_output<P: AsRef<Path>>(path: P) -> bool {
    let Some(name) = path.as_ref().file_name().and_then(|name| name.to_str()) else {
        return false;
    };
    name == FINAL_MASTER_FRAME
        || name
            .strip_prefix(BATCH_PREFIX)
            .and_then(|name| name.strip_suffix(".fits"))
            .is_some_and(|index| !index.is_empty() && index.bytes().all(|c| c.is_ascii_digit()))
}

/// Files written by a master frame build
#[derive(Debug, Clone)]
pub struct MasterFrameOutput {
    /// Batch master frame files, in batch order
    pub batch_files: Vec<PathBuf>,
    /// Number of input frames in each batch
    pub batch_sizes: Vec<usize>,
    pub final_file: PathBuf,
    pub master_frame: Array2<f64>,
}
impl MasterFrameOutput {
    /// All the files in the order they were written
    pub fn written(&self) -> impl Iterator<Item = &Path> {
        self.batch_files
            .iter()
            .chain(std::iter::once(&self.final_file))
            .map(|path| path.as_path())
    }
    pub fn n_batch(&self) -> usize {
        self.batch_files.len()
    }
    pub fn n_frame(&self) -> usize {
        self.batch_sizes.iter().sum()
    }
}

/// Master frame builder
///
/// ```no_run
/// use phot_utils::{MasterFrame, Reduction};
/// let output = MasterFrame::new("darks")
///     .reduction(Reduction::Median)
///     .output_dir("masters")
///     .bulk(25)
///     .build()?;
/// println!("{:?}", output.final_file);
/// # Ok::<(), phot_utils::master_frame::MasterFrameError>(())
/// ```
#[derive(Debug, Clone)]
pub struct MasterFrame {
    source_dir: PathBuf,
    output_dir: Option<PathBuf>,
    reduction: Reduction,
    bulk: usize,
    pattern: String,
    extension: usize,
    parallel: bool,
    progress_bar: bool,
}
impl MasterFrame {
    /// Builds a median master frame from the `*.fits` files in `source_dir`
    pub fn new<P: AsRef<Path>>(source_dir: P) -> Self {
        Self {
            source_dir: source_dir.as_ref().to_path_buf(),
            output_dir: None,
            reduction: Reduction::default(),
            bulk: DEFAULT_BULK,
            pattern: DEFAULT_PATTERN.to_string(),
            extension: 0,
            parallel: false,
            progress_bar: false,
        }
    }
    pub fn reduction(self, reduction: Reduction) -> Self {
        Self { reduction, ..self }
    }
    /// Output directory, the source directory if not set
    pub fn output_dir<P: AsRef<Path>>(self, output_dir: P) -> Self {
        Self {
            output_dir: Some(output_dir.as_ref().to_path_buf()),
            ..self
        }
    }
    /// Maximum number of frames per batch
    pub fn bulk(self, bulk: usize) -> Self {
        Self { bulk, ..self }
    }
    /// Input file name pattern (glob or substring)
    pub fn pattern<S: Into<String>>(self, pattern: S) -> Self {
        Self {
            pattern: pattern.into(),
            ..self
        }
    }
    /// HDU read from every input file
    pub fn extension(self, extension: usize) -> Self {
        Self { extension, ..self }
    }
    /// Loads the frames of a batch concurrently
    pub fn parallel(self, parallel: bool) -> Self {
        Self { parallel, ..self }
    }
    pub fn progress_bar(self, progress_bar: bool) -> Self {
        Self {
            progress_bar,
            ..self
        }
    }
    /// Sorted input files, builder outputs excluded
    pub fn input_files(&self) -> Result<Vec<PathBuf>> {
        let files: Vec<_> = get_filenames(&self.source_dir, &self.pattern)?
            .into_iter()
            .filter(|file| {
                let skip = is_master_frame_output(file);
                if skip {
                    log::debug!("skipping previous output {:?}", file);
                }
                !skip
            })
            .collect();
        if files.is_empty() {
            Err(MasterFrameError::NoInputFiles {
                directory: self.source_dir.clone(),
                pattern: self.pattern.clone(),
            })
        } else {
            Ok(files)
        }
    }
    fn load_batch(&self, batch: usize, files: &[PathBuf]) -> Result<Vec<Array2<f64>>> {
        let load = |path: &PathBuf| {
            FitsLoader::new(path)
                .extension(self.extension)
                .load_data()
                .map_err(|source| MasterFrameError::Load {
                    batch,
                    path: path.clone(),
                    source,
                })
        };
        let frames: Vec<Result<Array2<f64>>> = if self.parallel {
            files.par_iter().map(&load).collect()
        } else {
            files.iter().map(&load).collect()
        };
        frames.into_iter().collect()
    }
    /// Reduces the input frames batch by batch and writes the master frames
    pub fn build(self) -> Result<MasterFrameOutput> {
        if self.bulk == 0 {
            return Err(MasterFrameError::InvalidBulk);
        }
        let files = self.input_files()?;
        let output_dir = self
            .output_dir
            .clone()
            .unwrap_or_else(|| self.source_dir.clone());
        fs::create_dir_all(&output_dir)
            .map_err(|e| MasterFrameError::OutputDir(e, output_dir.clone()))?;

        let n_batch = files.len().div_ceil(self.bulk);
        log::info!(
            "{} master frame from {} files in {} batches of up to {} frames",
            self.reduction,
            files.len(),
            n_batch,
            self.bulk
        );
        let pb = self.progress_bar.then(|| {
            let pb = ProgressBar::new(n_batch as u64);
            if let Ok(style) = ProgressStyle::default_bar().template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
            ) {
                pb.set_style(style.progress_chars("#>-"));
            }
            pb.set_message("Reducing batches");
            pb
        });

        let mut expected: Option<(usize, usize)> = None;
        let mut batch_frames = Vec::with_capacity(n_batch);
        let mut batch_files = Vec::with_capacity(n_batch);
        let mut batch_sizes = Vec::with_capacity(n_batch);
        for (batch, chunk) in files.chunks(self.bulk).enumerate() {
            let frames = self.load_batch(batch, chunk)?;
            let expected = *expected.get_or_insert_with(|| frames[0].dim());
            if let Some((path, frame)) = chunk
                .iter()
                .zip(&frames)
                .find(|(_, frame)| frame.dim() != expected)
            {
                return Err(MasterFrameError::ShapeMismatch {
                    batch,
                    path: path.clone(),
                    expected,
                    actual: frame.dim(),
                });
            }
            let master = self
                .reduction
                .reduce(&frames)
                .map_err(|source| MasterFrameError::Reduction { batch, source })?;
            drop(frames);
            let path = output_dir.join(batch_file_name(batch));
            write_fits(&path, &master, true).map_err(|source| MasterFrameError::Write {
                path: path.clone(),
                source,
            })?;
            log::info!("Processed batch {}/{}: {:?}", batch + 1, n_batch, path);
            if let Some(pb) = &pb {
                pb.inc(1);
            }
            batch_frames.push(master);
            batch_files.push(path);
            batch_sizes.push(chunk.len());
        }

        let master_frame = self
            .reduction
            .reduce(&batch_frames)
            .map_err(MasterFrameError::FinalReduction)?;
        let final_file = output_dir.join(FINAL_MASTER_FRAME);
        write_fits(&final_file, &master_frame, true).map_err(|source| {
            MasterFrameError::Write {
                path: final_file.clone(),
                source,
            }
        })?;
        if let Some(pb) = pb {
            pb.finish_with_message("Done");
        }
        log::info!("Final master frame saved to: {:?}", final_file);

        Ok(MasterFrameOutput {
            batch_files,
            batch_sizes,
            final_file,
            master_frame,
        })
    }
}

/// Builds the master frame of the `*.fits` files in `file_dir`
///
/// Outputs go to `output_dir` or to `file_dir` if `None`.
pub fn create_master_frame<P, Q>(
    file_dir: P,
    reduction: Reduction,
    output_dir: Option<Q>,
    bulk: usize,
) -> Result<MasterFrameOutput>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let builder = MasterFrame::new(file_dir).reduction(reduction).bulk(bulk);
    match output_dir {
        Some(output_dir) => builder.output_dir(output_dir),
        None => builder,
    }
    .build()
}
