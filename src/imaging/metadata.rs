use crate::error::{OdynError, Result};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tiff::decoder::ifd::Value;
use tiff::decoder::Decoder;
use tiff::tags::Tag;
use tracing::debug;

const UM_PER_CENTIMETER: f64 = 1e4;
const UM_PER_INCH: f64 = 25_400.0;

/// Acquisition geometry read from a TIFF's first directory.
#[derive(Debug, Clone, PartialEq)]
pub struct TiffMetadata {
    pub pages: u32,
    pub width: u32,
    pub height: u32,
    /// `[x, y]`, rounded to 4 decimals
    pub um_per_pixels: [f64; 2],
}

impl TiffMetadata {
    pub fn read(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let mut decoder = Decoder::new(BufReader::new(file))?;

        let (width, height) = decoder.dimensions()?;
        let x_resolution = rational_tag(&mut decoder, path, Tag::XResolution)?;
        let y_resolution = rational_tag(&mut decoder, path, Tag::YResolution)?;
        let unit_um = resolution_unit_um(&mut decoder)?;

        let mut pages = 1;
        while decoder.more_images() {
            decoder.next_image()?;
            pages += 1;
        }

        let metadata = Self {
            pages,
            width,
            height,
            um_per_pixels: [
                um_per_pixel(x_resolution, unit_um),
                um_per_pixel(y_resolution, unit_um),
            ],
        };

        debug!("Read TIFF metadata from {}: {:?}", path.display(), metadata);
        Ok(metadata)
    }
}

/// Pixels per unit as a rational pair
fn rational_tag<R: std::io::Read + std::io::Seek>(
    decoder: &mut Decoder<R>,
    path: &Path,
    tag: Tag,
) -> Result<(u32, u32)> {
    match decoder.find_tag(tag)? {
        Some(Value::Rational(n, d)) if n > 0 && d > 0 => Ok((n, d)),
        Some(other) => Err(OdynError::component(
            "tiff_metadata".to_string(),
            format!(
                "{:?} in {} is not a positive rational: {:?}",
                tag,
                path.display(),
                other
            ),
        )),
        None => Err(OdynError::component(
            "tiff_metadata".to_string(),
            format!("{} has no {:?} tag", path.display(), tag),
        )),
    }
}

/// Micrometers per resolution unit; centimeters unless the file says inches
fn resolution_unit_um<R: std::io::Read + std::io::Seek>(
    decoder: &mut Decoder<R>,
) -> Result<f64> {
    let unit = match decoder.find_tag(Tag::ResolutionUnit)? {
        Some(Value::Short(unit)) => Some(unit as u32),
        Some(Value::Unsigned(unit)) => Some(unit),
        _ => None,
    };

    Ok(match unit {
        Some(2) => UM_PER_INCH,
        _ => UM_PER_CENTIMETER,
    })
}

fn um_per_pixel((numerator, denominator): (u32, u32), unit_um: f64) -> f64 {
    let pixels_per_unit = numerator as f64 / denominator as f64;
    round4(unit_um / pixels_per_unit)
}

fn round4(value: f64) -> f64 {
    (value * 1e4).round() / 1e4
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::{write_stack, PixelSize};
    use crate::movie::Movie;
    use ndarray::Array3;
    use tempfile::TempDir;

    #[test]
    fn test_read_metadata() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stack.tif");
        let movie = Movie::new(Array3::zeros((3, 4, 6)));
        write_stack(&path, &movie, Some(PixelSize::new([0.5, 1.1719]))).unwrap();

        let metadata = TiffMetadata::read(&path).unwrap();

        assert_eq!(metadata.pages, 3);
        assert_eq!(metadata.width, 6);
        assert_eq!(metadata.height, 4);
        assert_eq!(metadata.um_per_pixels, [0.5, 1.1719]);
    }

    #[test]
    fn test_missing_resolution_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bare.tif");
        write_stack(&path, &Movie::new(Array3::zeros((1, 2, 2))), None).unwrap();

        assert!(TiffMetadata::read(&path).is_err());
    }

    #[test]
    fn test_unit_conversion() {
        // 20000 px/cm is half a micrometer per pixel
        assert_eq!(um_per_pixel((200_000_000, 10_000), UM_PER_CENTIMETER), 0.5);
        assert_eq!(um_per_pixel((3, 1), UM_PER_CENTIMETER), 3333.3333);
        assert_eq!(um_per_pixel((25_400, 1), UM_PER_INCH), 1.0);
    }
}
