use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use odyn::config::VideoConfig;
use odyn::correction::{OverwritePolicy, ProcessEngine, RunMode, RunReport};
use odyn::{
    create_config, write_stack, BootstrapOutcome, ConfigSynchronizer, Experiment, MovieCategory,
    PixelSize, Settings,
};
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;

#[derive(Parser, Debug)]
#[command(name = "odyn")]
#[command(about = "Experiment configuration and motion-correction runs for calcium imaging")]
#[command(version)]
#[command(long_about = "Creates and keeps in sync the per-experiment odyn_config.toml derived \
from raw TIFF acquisitions, drives an external motion-correction engine over test or final \
acquisition ranges, and writes corrected stacks next to the raw data.")]
struct Args {
    /// Path to application settings
    #[arg(short, long, default_value = "odyn.toml", help = "Path to TOML settings file")]
    settings: PathBuf,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,

    /// Also write logs to daily rotated files in this directory
    #[arg(long, value_name = "DIR")]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create odyn_config.toml from the raw acquisitions if it does not exist
    Init {
        /// Experiment folder
        dir: PathBuf,
    },

    /// Show the experiment config and its on-disk state
    Status {
        /// Experiment folder
        dir: PathBuf,
    },

    /// Run motion correction on the test range, or on every acquisition with --final
    Correct {
        /// Experiment folder
        dir: PathBuf,

        /// Correct the full acquisition range and write corrected stacks
        #[arg(long = "final")]
        final_run: bool,

        /// What to do with corrected stacks that already exist
        #[arg(long, value_enum)]
        overwrite: Option<OverwritePolicy>,
    },

    /// Load a movie the way the player would and report it
    Movie {
        /// Experiment folder
        dir: PathBuf,

        #[arg(value_enum)]
        category: MovieCategory,

        /// Write the loaded movie as a float TIFF stack
        #[arg(long, value_name = "FILE")]
        export: Option<PathBuf>,
    },

    /// Print default settings in TOML format and exit
    PrintSettings,
}

fn main() -> Result<()> {
    let args = Args::parse();

    if let Command::PrintSettings = args.command {
        print_default_settings()?;
        return Ok(());
    }

    // Held until exit so buffered file logs are flushed
    let _log_guard = init_logging(&args)?;

    info!("Starting odyn v{}", env!("CARGO_PKG_VERSION"));

    let settings = match Settings::load_from_file(&args.settings) {
        Ok(settings) => settings,
        Err(e) => {
            error!("Failed to load settings: {}", e);
            return Err(e).context(format!("Failed to load {}", args.settings.display()));
        }
    };
    settings.validate().context("Invalid settings")?;

    let result = match args.command {
        Command::Init { dir } => init(&dir, &settings),
        Command::Status { dir } => status(&dir, &settings),
        Command::Correct {
            dir,
            final_run,
            overwrite,
        } => correct(&dir, settings, RunMode::from_final(final_run), overwrite),
        Command::Movie {
            dir,
            category,
            export,
        } => movie(&dir, settings, category, export.as_deref()),
        Command::PrintSettings => Ok(()),
    };

    if let Err(e) = &result {
        error!("{:#}", e);
    }
    result
}

fn init(dir: &Path, settings: &Settings) -> Result<()> {
    let config_path = settings.config_path(dir);

    match create_config(&config_path, settings)
        .with_context(|| format!("Failed to create {}", config_path.display()))?
    {
        BootstrapOutcome::Created(config) => {
            println!("✓ Created {}", config_path.display());
            println!(
                "  acquisitions {}..={}, {} frames of {}x{} px at {:?} um/px",
                config.experiment.first_acq,
                config.experiment.last_acq,
                config.imaging.frames,
                config.imaging.size_pixels[0],
                config.imaging.size_pixels[1],
                config.imaging.um_per_pixels
            );
        }
        BootstrapOutcome::AlreadyExists => {
            println!("{} already exists, nothing to do", config_path.display());
        }
        BootstrapOutcome::NoRawFiles => {
            eprintln!(
                "✗ No raw '.tif' files in {}",
                dir.join(&settings.paths.raw_subfolder).display()
            );
            std::process::exit(1);
        }
    }

    Ok(())
}

fn status(dir: &Path, settings: &Settings) -> Result<()> {
    let config_path = settings.config_path(dir);
    let sync = ConfigSynchronizer::open(&config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;
    let config = sync.document();
    let date = config.date()?;

    println!("Experiment: {} / {} / {}", date, config.experiment.subject, config.experiment.name);
    println!(
        "Acquisitions: {}..={} in {}",
        config.experiment.first_acq, config.experiment.last_acq, config.experiment.raw_folder
    );
    println!(
        "Test range: {}..={}",
        config.test.first_acq, config.test.last_acq
    );
    println!(
        "Imaging: {} frames, {}x{} px, {:?} um/px",
        config.imaging.frames,
        config.imaging.size_pixels[0],
        config.imaging.size_pixels[1],
        config.imaging.um_per_pixels
    );
    println!("Corrected output: {}", config.experiment.mcor_folder);
    println!("Config hash: {}", sync.hash());
    println!(
        "Stale: {}",
        if sync.is_stale()? { "yes" } else { "no" }
    );

    Ok(())
}

fn correct(
    dir: &Path,
    settings: Settings,
    mode: RunMode,
    overwrite: Option<OverwritePolicy>,
) -> Result<()> {
    let mut policy = overwrite.unwrap_or(settings.correction.overwrite);
    let mut engine = ProcessEngine::from_settings(&settings);
    let mut experiment = Experiment::open(dir, settings)
        .with_context(|| format!("Failed to open experiment {}", dir.display()))?;

    let report = experiment
        .run_motion_correction(mode, &mut engine, &mut policy)
        .with_context(|| format!("{} motion correction failed", mode.as_str()))?;

    print_report(&report);
    Ok(())
}

fn print_report(report: &RunReport) {
    println!(
        "✓ {} run corrected {} file(s)",
        report.mode.as_str(),
        report.files.len()
    );
    println!(
        "  max_shifts {:?}, strides {:?}, overlaps {:?}, max_deviation_rigid {}",
        report.params.max_shifts,
        report.params.strides,
        report.params.overlaps,
        report.params.max_deviation_rigid
    );
    for mmap in &report.output.mmap_files {
        println!("  {}", mmap.display());
    }
    if report.promoted {
        println!("  test parameters saved as final motion_correction");
    }
    if let Some(materialized) = &report.materialized {
        println!(
            "  wrote {} corrected stack(s), kept {} existing",
            materialized.written.len(),
            materialized.skipped.len()
        );
    }
}

fn movie(
    dir: &Path,
    settings: Settings,
    category: MovieCategory,
    export: Option<&Path>,
) -> Result<()> {
    let mut experiment = Experiment::open(dir, settings)
        .with_context(|| format!("Failed to open experiment {}", dir.display()))?;
    let config = experiment.config()?;
    let player = match category {
        MovieCategory::Test => &config.test.player,
        MovieCategory::Raw | MovieCategory::Corrected => &config.player,
    };

    let movie = experiment
        .movie(category)
        .with_context(|| format!("Failed to load {} movie", category))?;
    let (frames, rows, cols) = movie.shape();
    println!("{} movie: {} frames of {}x{} px", category, frames, cols, rows);
    print_video_options(&player.video);

    if let Some(path) = export {
        let ratio = player.load.spatial_ratio;
        let um = config.imaging.um_per_pixels;
        let pixel_size = PixelSize::new([um[0] / ratio, um[1] / ratio]);
        write_stack(path, movie, Some(pixel_size))
            .with_context(|| format!("Failed to export {}", path.display()))?;
        println!("✓ Exported to {}", path.display());
    }

    Ok(())
}

fn print_video_options(video: &VideoConfig) {
    println!(
        "  fr {}, gain {}, magnification {}, quantiles {}..{}, loop {}",
        video.fr, video.gain, video.magnification, video.q_min, video.q_max, video.do_loop
    );
}

fn init_logging(args: &Args) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    // Determine log level based on flags
    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("odyn={}", log_level)));

    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_target(false)
            .with_file(false)
            .with_line_number(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_target(true)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_target(true)
                .with_file(args.debug)
                .with_line_number(args.debug)
                .boxed()
        }
    };

    let (file_layer, guard) = match &args.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, "odyn.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .with(file_layer)
        .init();

    Ok(guard)
}

/// Print default settings in TOML format
fn print_default_settings() -> Result<()> {
    println!("# odyn settings file (odyn.toml)");
    println!("# Every key can be overridden with ODYN_<SECTION>__<KEY>, e.g. ODYN_ENGINE__PROGRAM");
    println!();

    let text = toml::to_string_pretty(&Settings::default())
        .context("Failed to serialize default settings")?;
    println!("{}", text);
    Ok(())
}
