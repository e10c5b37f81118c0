use std::path::PathBuf;

use anyhow::Context;
use phot_utils::{
    compute_flux, get_filenames, light_curve, load_fits, Aperture, Gls, LightCurve, MasterFrame,
    Reduction,
};
use regex::Regex;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(name = "phot-utils", about = "FITS image reduction and photometry")]
enum Opt {
    /// Lists the files of a directory matching a glob pattern or a substring
    Ls { directory: PathBuf, pattern: String },
    /// Prints the header of a FITS HDU
    Header {
        file: PathBuf,
        /// HDU index, 0 is the primary HDU
        #[structopt(long, default_value = "0")]
        ext: usize,
        /// Keyword regular expression filter
        #[structopt(short, long)]
        filter: Option<String>,
    },
    /// Builds a master frame from the FITS files of a directory
    Master {
        directory: PathBuf,
        /// Reduction method: mean, median or sum
        #[structopt(short, long, default_value = "median")]
        method: Reduction,
        /// Output directory, the input directory if not set
        #[structopt(short, long)]
        output: Option<PathBuf>,
        /// Number of frames per batch
        #[structopt(short, long, env = "PHOT_UTILS_BULK", default_value = "50")]
        bulk: usize,
        #[structopt(short, long, default_value = "*.fits")]
        pattern: String,
        #[structopt(long, default_value = "0")]
        ext: usize,
        /// Loads the frames of a batch in parallel
        #[structopt(long)]
        parallel: bool,
        /// Displays a progress bar
        #[structopt(long)]
        progress: bool,
    },
    /// Aperture photometry on a FITS image
    Flux {
        file: PathBuf,
        #[structopt(flatten)]
        aperture: ApertureOpt,
        #[structopt(long, default_value = "0")]
        ext: usize,
        /// Photometric zero point for the magnitude
        #[structopt(long)]
        zero_point: Option<f64>,
    },
    /// Light curve from the FITS images of a directory
    Lightcurve {
        directory: PathBuf,
        #[structopt(flatten)]
        aperture: ApertureOpt,
        #[structopt(short, long, default_value = "*.fits")]
        pattern: String,
        /// Header keyword of the observation time
        #[structopt(long, default_value = "MJD-OBS")]
        time_key: String,
        #[structopt(long, default_value = "0")]
        ext: usize,
        /// CSV output file
        #[structopt(short, long)]
        output: Option<PathBuf>,
    },
    /// GLS periodogram of a CSV time series with time, flux and optional error columns
    Gls {
        csv: PathBuf,
        /// Frequency oversampling factor
        #[structopt(long, default_value = "10")]
        ofac: f64,
        /// Maximum frequency in units of the average Nyquist frequency
        #[structopt(long, default_value = "1")]
        hifac: f64,
        /// CSV output file
        #[structopt(short, long)]
        output: Option<PathBuf>,
    },
    /// Renders a FITS image into a PNG file
    #[cfg(feature = "plot")]
    Plot {
        file: PathBuf,
        png: PathBuf,
        #[structopt(long, default_value = "0")]
        ext: usize,
        /// Color map: gray, gray_r, viridis, plasma, inferno, magma or cubehelix
        #[structopt(long, default_value = "gray_r")]
        cmap: phot_utils::ColorMap,
        /// Intensity range half-width in standard deviations
        #[structopt(long, default_value = "0.5")]
        scale: f64,
        #[structopt(long)]
        colorbar: bool,
        #[structopt(long)]
        vmin: Option<f64>,
        #[structopt(long)]
        vmax: Option<f64>,
        /// Celestial axes from the header WCS
        #[structopt(long)]
        wcs: bool,
    },
}

#[derive(Debug, StructOpt)]
struct ApertureOpt {
    /// Aperture centre column
    #[structopt(short, long)]
    x: f64,
    /// Aperture centre row
    #[structopt(short, long)]
    y: f64,
    /// Aperture radius
    #[structopt(short, long)]
    radius: f64,
    /// Background annulus inner and outer radii
    #[structopt(long, number_of_values = 2)]
    annulus: Option<Vec<f64>>,
}
impl From<ApertureOpt> for Aperture {
    fn from(opt: ApertureOpt) -> Self {
        let aperture = Aperture::new(opt.x, opt.y, opt.radius);
        match opt.annulus.as_deref() {
            Some(&[inner, outer]) => aperture.annulus(inner, outer),
            _ => aperture,
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    match Opt::from_args() {
        Opt::Ls { directory, pattern } => {
            for file in get_filenames(&directory, &pattern)? {
                println!("{}", file.display());
            }
        }
        Opt::Header { file, ext, filter } => {
            let header = load_fits(&file, ext)?.header;
            match filter {
                Some(filter) => {
                    let re = Regex::new(&filter).context("invalid keyword filter")?;
                    print!("{}", header.filter(&re));
                }
                None => print!("{}", header),
            }
        }
        Opt::Master {
            directory,
            method,
            output,
            bulk,
            pattern,
            ext,
            parallel,
            progress,
        } => {
            let mut builder = MasterFrame::new(&directory)
                .reduction(method)
                .bulk(bulk)
                .pattern(pattern)
                .extension(ext)
                .parallel(parallel)
                .progress_bar(progress);
            if let Some(output) = output {
                builder = builder.output_dir(output);
            }
            let master = builder
                .build()
                .with_context(|| format!("master frame from {:?} failed", directory))?;
            for path in master.written() {
                println!("{}", path.display());
            }
        }
        Opt::Flux {
            file,
            aperture,
            ext,
            zero_point,
        } => {
            let record = load_fits(&file, ext)?;
            let flux = compute_flux(&record.data, &aperture.into())?;
            println!("total      : {}", flux.total);
            println!("background : {} ({} pixels)", flux.background, flux.nbackground);
            println!("net        : {} ({} pixels)", flux.net, flux.npix);
            if let Some(zp) = zero_point {
                match flux.magnitude(zp) {
                    Some(mag) => println!("magnitude  : {:.4}", mag),
                    None => println!("magnitude  : undefined (net flux <= 0)"),
                }
            }
        }
        Opt::Lightcurve {
            directory,
            aperture,
            pattern,
            time_key,
            ext,
            output,
        } => {
            let files = get_filenames(&directory, &pattern)?;
            let lc = light_curve(&files, &aperture.into(), &time_key, ext)?;
            match output {
                Some(output) => {
                    lc.to_csv(&output)?;
                    println!("{} samples written to {:?}", lc.len(), output);
                }
                None => lc
                    .time
                    .iter()
                    .zip(&lc.flux)
                    .for_each(|(t, f)| println!("{},{}", t, f)),
            }
        }
        Opt::Gls {
            csv,
            ofac,
            hifac,
            output,
        } => {
            let lc = LightCurve::from_csv(&csv)
                .with_context(|| format!("failed to read time series from {:?}", csv))?;
            let periodogram = Gls::from(lc)
                .oversampling(ofac)
                .max_frequency_factor(hifac)
                .compute()?;
            let (frequency, power) = periodogram.best();
            println!("best frequency : {}", frequency);
            println!("best period    : {}", 1f64 / frequency);
            println!("power          : {:.6}", power);
            println!(
                "FAP            : {:.3e}",
                periodogram.false_alarm_probability(power)
            );
            if let Some(output) = output {
                periodogram.to_csv(output)?;
            }
        }
        #[cfg(feature = "plot")]
        Opt::Plot {
            file,
            png,
            ext,
            cmap,
            scale,
            colorbar,
            vmin,
            vmax,
            wcs,
        } => {
            let record = load_fits(&file, ext)?;
            let mut config = phot_utils::ImplotConfig::default()
                .cmap(cmap)
                .scale(scale)
                .colorbar(colorbar);
            config.vmin = vmin;
            config.vmax = vmax;
            if wcs {
                config = config.header(&record.header)?;
            }
            phot_utils::implot(&record.data, &png, &config)?;
        }
    }
    Ok(())
}
