use crate::config::parse_date;
use crate::error::{OdynError, Result};
use chrono::NaiveDate;
use std::path::Path;

/// Metadata encoded in an acquisition filename.
///
/// Names follow `<date><d><subject><d><name>[<d>...]<d><index>.tif`, e.g.
/// `2023-05-17_m12_baseline_00001.tif` with `_` as the delimiter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquisitionName {
    pub date: NaiveDate,
    pub subject: String,
    pub name: String,
    pub index: u32,
    /// Everything before the index, e.g. `2023-05-17_m12_baseline`
    pub stem: String,
    /// Index exactly as written, zero padding included
    pub index_text: String,
}

impl AcquisitionName {
    pub fn parse(path: &Path, delimiter: &str) -> Result<Self> {
        let stem = file_stem(path)?;
        let parts: Vec<&str> = stem.split(delimiter).collect();

        if parts.len() < 4 {
            return Err(OdynError::FilenamePattern {
                file: path.to_path_buf(),
                message: format!(
                    "expected at least 4 '{}'-separated fields, found {}",
                    delimiter,
                    parts.len()
                ),
            });
        }

        let index_text = parts[parts.len() - 1];
        let index = parse_index(path, index_text)?;
        let date = parse_date(parts[0])?;

        Ok(Self {
            date,
            subject: parts[1].to_string(),
            name: parts[2].to_string(),
            index,
            stem: parts[..parts.len() - 1].join(delimiter),
            index_text: index_text.to_string(),
        })
    }
}

/// Acquisition index of a file, the last delimited field of its stem
pub fn acquisition_suffix(path: &Path, delimiter: &str) -> Result<String> {
    let stem = file_stem(path)?;
    let suffix = stem.rsplit(delimiter).next().unwrap_or(stem);
    parse_index(path, suffix)?;
    Ok(suffix.to_string())
}

/// Name of the corrected output for a raw acquisition
pub fn corrected_file_name(tiff_stem: &str, delimiter: &str, suffix: &str) -> String {
    format!("{}{}{}.tif", tiff_stem, delimiter, suffix)
}

fn file_stem(path: &Path) -> Result<&str> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| OdynError::FilenamePattern {
            file: path.to_path_buf(),
            message: "file name is not valid UTF-8".to_string(),
        })
}

fn parse_index(path: &Path, text: &str) -> Result<u32> {
    text.parse().map_err(|_| OdynError::FilenamePattern {
        file: path.to_path_buf(),
        message: format!("acquisition index '{}' is not a number", text),
    })
}
