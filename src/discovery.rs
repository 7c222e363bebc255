use crate::error::{OdynError, Result};
use glob::{glob_with, MatchOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Candidate raw acquisitions for bootstrapping: stems that start and end with a digit.
pub fn bootstrap_candidates(raw_dir: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    let pattern = if recursive {
        "**/[0-9]*[0-9].tif"
    } else {
        "[0-9]*[0-9].tif"
    };
    matching_files(raw_dir, pattern)
}

/// Every visible TIFF directly inside `dir`, sorted by name.
pub fn tiff_files(dir: &Path) -> Result<Vec<PathBuf>> {
    matching_files(dir, "*.tif")
}

/// Raw acquisitions for a correction run. A missing folder is an I/O error.
pub fn raw_acquisitions(raw_dir: &Path) -> Result<Vec<PathBuf>> {
    if !raw_dir.is_dir() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("raw folder {} does not exist", raw_dir.display()),
        )
        .into());
    }

    let files = tiff_files(raw_dir)?;
    if files.is_empty() {
        return Err(OdynError::NoFiles {
            what: "raw '.tif'".to_string(),
            dir: raw_dir.to_path_buf(),
        });
    }
    Ok(files)
}

/// Memory-mapped engine outputs in the scratch directory, searched recursively.
pub fn scratch_outputs(scratch_dir: &Path, identifier: &str) -> Result<Vec<PathBuf>> {
    matching_files(scratch_dir, &format!("**/*{}*.mmap", identifier))
}

fn matching_files(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let escaped = glob::Pattern::escape(&dir.to_string_lossy());
    let full = format!("{}/{}", escaped, pattern);
    debug!("Searching {}", full);

    let options = MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: true,
    };

    let mut files = Vec::new();
    for entry in glob_with(&full, options)? {
        match entry {
            Ok(path) if path.is_file() && !is_hidden(&path) => files.push(path),
            Ok(_) => {}
            Err(e) => warn!("Skipping unreadable path: {}", e),
        }
    }

    files.sort();
    Ok(files)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.') || n.eq_ignore_ascii_case("thumbs.db"))
        .unwrap_or(true)
}
