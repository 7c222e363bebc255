use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use odyn::{
    imaging::{MmapLayout, MmapOrder},
    read_mmap, write_stack, ExperimentConfig, PixelSize,
};
use serde::Serialize;
use tracing::{error, info, warn};

/// Convert engine memmap outputs into TIFF stacks.
#[derive(Parser, Debug)]
#[command(name = "mmaptool")]
#[command(about = "Convert motion-correction memmap outputs into TIFF stacks and metadata")]
struct Args {
    /// Path to a .mmap file or a directory containing .mmap files
    input: PathBuf,

    /// Output directory (defaults to the input's directory)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Experiment config to take the pixel size from
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Write metadata JSON describing each conversion
    #[arg(long)]
    metadata: bool,

    /// Overwrite existing outputs instead of skipping
    #[arg(long)]
    overwrite: bool,
}

#[derive(Debug, Serialize)]
struct LayoutMetadata {
    d1: usize,
    d2: usize,
    d3: usize,
    order: &'static str,
    frames: usize,
}

impl From<MmapLayout> for LayoutMetadata {
    fn from(layout: MmapLayout) -> Self {
        Self {
            d1: layout.d1,
            d2: layout.d2,
            d3: layout.d3,
            order: match layout.order {
                MmapOrder::F => "F",
                MmapOrder::C => "C",
            },
            frames: layout.frames,
        }
    }
}

#[derive(Debug, Serialize)]
struct ExportMetadata {
    source: String,
    tiff_path: String,
    layout: LayoutMetadata,
    um_per_pixels: Option<[f64; 2]>,
    exported_at: DateTime<Utc>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let pixel_size = load_pixel_size(args.config.as_deref())?;
    let mmap_paths = collect_mmap_paths(&args.input).context("Failed to discover memmap files")?;

    if mmap_paths.is_empty() {
        return Err(anyhow!("No memmap files found at {}", args.input.display()));
    }

    let output_dir = match &args.output {
        Some(dir) => dir.clone(),
        None => default_output_dir(&args.input),
    };

    info!(
        "Converting {} memmap file(s) into {}",
        mmap_paths.len(),
        output_dir.display()
    );

    let mut failures = 0usize;
    for mmap_path in mmap_paths {
        if let Err(e) = process_mmap(
            &mmap_path,
            &output_dir,
            pixel_size,
            args.metadata,
            args.overwrite,
        ) {
            error!("Failed to convert {}: {:#}", mmap_path.display(), e);
            failures += 1;
        }
    }

    if failures > 0 {
        return Err(anyhow!("{} file(s) could not be converted", failures));
    }
    Ok(())
}

fn load_pixel_size(config_path: Option<&Path>) -> Result<Option<PixelSize>> {
    match config_path {
        Some(path) => {
            let config = ExperimentConfig::read(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?;
            Ok(Some(PixelSize::new(config.imaging.um_per_pixels)))
        }
        None => Ok(None),
    }
}

fn default_output_dir(input: &Path) -> PathBuf {
    if input.is_dir() {
        input.to_path_buf()
    } else {
        input
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

fn collect_mmap_paths(input: &Path) -> Result<Vec<PathBuf>> {
    if input.is_file() && is_mmap(input) {
        return Ok(vec![input.to_path_buf()]);
    }

    if input.is_dir() {
        let mut mmap_paths = Vec::new();
        for entry in fs::read_dir(input)
            .with_context(|| format!("Failed to read directory {}", input.display()))?
        {
            let path = entry?.path();
            if path.is_file() && is_mmap(&path) {
                mmap_paths.push(path);
            }
        }
        mmap_paths.sort();
        return Ok(mmap_paths);
    }

    Err(anyhow!(
        "Input {} is neither a memmap file nor a directory",
        input.display()
    ))
}

fn is_mmap(path: &Path) -> bool {
    path.extension().and_then(|s| s.to_str()) == Some("mmap")
}

/// Name without the `_d1_..._frames_N_.mmap` layout suffix
fn base_name(mmap_path: &Path) -> String {
    let name = mmap_path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown");
    match name.find("_d1_") {
        Some(idx) => name[..idx].to_string(),
        None => name.trim_end_matches(".mmap").to_string(),
    }
}

fn process_mmap(
    mmap_path: &Path,
    output_dir: &Path,
    pixel_size: Option<PixelSize>,
    metadata: bool,
    overwrite: bool,
) -> Result<Option<PathBuf>> {
    let base = base_name(mmap_path);
    let tiff_path = output_dir.join(format!("{}.tif", base));

    if tiff_path.exists() && !overwrite {
        warn!(
            "Skipping existing {} (use --overwrite to replace)",
            tiff_path.display()
        );
        return Ok(None);
    }

    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output directory {}", output_dir.display()))?;

    let layout = MmapLayout::from_path(mmap_path)?;
    let movie = read_mmap(mmap_path)
        .with_context(|| format!("Failed to map {}", mmap_path.display()))?;

    info!(
        "Writing {} frames from {} to {}",
        movie.num_frames(),
        mmap_path.display(),
        tiff_path.display()
    );
    write_stack(&tiff_path, &movie, pixel_size)
        .with_context(|| format!("Failed to write {}", tiff_path.display()))?;

    if metadata {
        let metadata_path = output_dir.join("metadata").join(format!("{}.json", base));
        let export = ExportMetadata {
            source: mmap_path.display().to_string(),
            tiff_path: tiff_path.display().to_string(),
            layout: layout.into(),
            um_per_pixels: pixel_size.map(|p| p.um_per_pixels),
            exported_at: Utc::now(),
        };
        write_metadata(&export, &metadata_path, overwrite)?;
        info!("Wrote metadata to {}", metadata_path.display());
    }

    Ok(Some(tiff_path))
}

fn write_metadata(metadata: &ExportMetadata, metadata_path: &Path, overwrite: bool) -> Result<()> {
    if let Some(parent) = metadata_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create metadata directory {}", parent.display()))?;
    }

    if metadata_path.exists() && !overwrite {
        return Err(anyhow!(
            "Metadata file {} exists (use --overwrite to replace)",
            metadata_path.display()
        ));
    }

    let data = serde_json::to_vec_pretty(metadata)?;
    fs::write(metadata_path, data)
        .with_context(|| format!("Failed to write {}", metadata_path.display()))?;

    Ok(())
}
