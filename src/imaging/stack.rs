use crate::error::{OdynError, Result};
use crate::movie::Movie;
use ndarray::Array3;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::{colortype, Rational, TiffEncoder};
use tiff::tags::ResolutionUnit;
use tracing::debug;

/// Physical pixel size written into TIFF resolution tags.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelSize {
    pub um_per_pixels: [f64; 2],
}

impl PixelSize {
    pub fn new(um_per_pixels: [f64; 2]) -> Self {
        Self { um_per_pixels }
    }

    /// Pixels per centimeter with four decimals of precision
    fn rational(um_per_pixel: f64) -> Rational {
        let pixels_per_cm = 1e4 / um_per_pixel;
        let n = (pixels_per_cm * 1e4).round().min(u32::MAX as f64).max(1.0) as u32;
        Rational { n, d: 10_000 }
    }
}

/// Load every page of a single-channel TIFF as a movie
pub fn read_stack(path: &Path) -> Result<Movie> {
    let file = File::open(path)?;
    let mut decoder = Decoder::new(BufReader::new(file))?;
    let (width, height) = decoder.dimensions()?;
    let page_len = width as usize * height as usize;

    let mut samples = Vec::new();
    let mut pages = 0;
    loop {
        if decoder.dimensions()? != (width, height) {
            return Err(OdynError::movie(format!(
                "{} has pages of different sizes",
                path.display()
            )));
        }

        let before = samples.len();
        append_samples(decoder.read_image()?, &mut samples);
        if samples.len() - before != page_len {
            return Err(OdynError::movie(format!(
                "{} is not a single-channel stack",
                path.display()
            )));
        }
        pages += 1;

        if !decoder.more_images() {
            break;
        }
        decoder.next_image()?;
    }

    debug!(
        "Read {} pages of {}x{} from {}",
        pages,
        width,
        height,
        path.display()
    );

    let frames = Array3::from_shape_vec((pages, height as usize, width as usize), samples)
        .map_err(|e| OdynError::movie(e.to_string()))?;
    Ok(Movie::new(frames))
}

/// Write a movie as a multi-page 32-bit float TIFF
pub fn write_stack(path: &Path, movie: &Movie, pixel_size: Option<PixelSize>) -> Result<()> {
    let file = File::create(path)?;
    let mut encoder = TiffEncoder::new(BufWriter::new(file))?;
    let (_, rows, cols) = movie.shape();

    for frame in movie.data().outer_iter() {
        let samples: Vec<f32> = frame.iter().copied().collect();
        let mut image = encoder.new_image::<colortype::Gray32Float>(cols as u32, rows as u32)?;
        if let Some(size) = pixel_size {
            image.resolution_unit(ResolutionUnit::Centimeter);
            image.x_resolution(PixelSize::rational(size.um_per_pixels[0]));
            image.y_resolution(PixelSize::rational(size.um_per_pixels[1]));
        }
        image.write_data(&samples)?;
    }

    debug!("Wrote {} frames to {}", movie.num_frames(), path.display());
    Ok(())
}

fn append_samples(result: DecodingResult, samples: &mut Vec<f32>) {
    match result {
        DecodingResult::U8(v) => samples.extend(v.into_iter().map(|x| x as f32)),
        DecodingResult::U16(v) => samples.extend(v.into_iter().map(|x| x as f32)),
        DecodingResult::U32(v) => samples.extend(v.into_iter().map(|x| x as f32)),
        DecodingResult::U64(v) => samples.extend(v.into_iter().map(|x| x as f32)),
        DecodingResult::I8(v) => samples.extend(v.into_iter().map(|x| x as f32)),
        DecodingResult::I16(v) => samples.extend(v.into_iter().map(|x| x as f32)),
        DecodingResult::I32(v) => samples.extend(v.into_iter().map(|x| x as f32)),
        DecodingResult::I64(v) => samples.extend(v.into_iter().map(|x| x as f32)),
        DecodingResult::F32(v) => samples.extend(v),
        DecodingResult::F64(v) => samples.extend(v.into_iter().map(|x| x as f32)),
    }
}
