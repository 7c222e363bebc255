use crate::error::Result;
use crate::imaging::{read_mmap, write_stack, PixelSize};
use crate::prompt;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Decides whether an existing corrected file may be replaced.
pub trait ConfirmOverwrite {
    fn confirm_overwrite(&mut self, path: &Path) -> Result<bool>;
}

impl<F> ConfirmOverwrite for F
where
    F: FnMut(&Path) -> bool,
{
    fn confirm_overwrite(&mut self, path: &Path) -> Result<bool> {
        Ok(self(path))
    }
}

/// Overwrite behavior for existing outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OverwritePolicy {
    /// Keep existing files
    Skip,
    /// Replace existing files
    Overwrite,
    /// Ask on the terminal, defaulting to no
    Ask,
}

impl ConfirmOverwrite for OverwritePolicy {
    fn confirm_overwrite(&mut self, path: &Path) -> Result<bool> {
        match self {
            OverwritePolicy::Skip => Ok(false),
            OverwritePolicy::Overwrite => Ok(true),
            OverwritePolicy::Ask => prompt::confirm(
                &format!("{} already exists. Overwrite?", path.display()),
                false,
            ),
        }
    }
}

/// One engine output and the TIFF it becomes.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterializeJob {
    pub source: PathBuf,
    pub target: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaterializeReport {
    pub written: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
}

/// Write each memory-mapped output as a TIFF stack, asking before replacing files.
///
/// Target folders are created as needed. Declined targets are skipped and
/// their sources are left in place.
pub fn materialize(
    jobs: &[MaterializeJob],
    pixel_size: Option<PixelSize>,
    confirm: &mut dyn ConfirmOverwrite,
) -> Result<MaterializeReport> {
    let mut report = MaterializeReport::default();

    for job in jobs {
        if let Some(parent) = job.target.parent() {
            fs::create_dir_all(parent)?;
        }

        if job.target.exists() && !confirm.confirm_overwrite(&job.target)? {
            info!("Keeping existing {}", job.target.display());
            report.skipped.push(job.target.clone());
            continue;
        }

        let movie = read_mmap(&job.source)?;
        write_stack(&job.target, &movie, pixel_size)?;
        info!(
            "Wrote {} frames to {}",
            movie.num_frames(),
            job.target.display()
        );
        report.written.push(job.target.clone());
    }

    Ok(report)
}
