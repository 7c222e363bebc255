use crate::error::{OdynError, Result};
use crate::movie::Movie;
use byteorder::{ByteOrder, LittleEndian};
use memmap2::Mmap;
use ndarray::Array3;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Sample order of a memory-mapped movie.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MmapOrder {
    /// Pixel index varies fastest (`p + t * npix`)
    F,
    /// Time varies fastest (`p * frames + t`)
    C,
}

/// Geometry encoded in an engine output file name, e.g.
/// `run_rig__d1_512_d2_512_d3_1_order_F_frames_500_.mmap`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MmapLayout {
    pub d1: usize,
    pub d2: usize,
    pub d3: usize,
    pub order: MmapOrder,
    pub frames: usize,
}

impl MmapLayout {
    pub fn from_path(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| OdynError::movie(format!("invalid file name {}", path.display())))?;
        let fields: Vec<&str> = name.trim_end_matches(".mmap").split('_').collect();

        let order = match field_after(&fields, "order", name)? {
            "F" => MmapOrder::F,
            "C" => MmapOrder::C,
            other => {
                return Err(OdynError::movie(format!(
                    "{} has unknown order '{}'",
                    name, other
                )))
            }
        };

        Ok(Self {
            d1: number_after(&fields, "d1", name)?,
            d2: number_after(&fields, "d2", name)?,
            d3: number_after(&fields, "d3", name)?,
            order,
            frames: number_after(&fields, "frames", name)?,
        })
    }

    /// Samples per frame; `None` when the dimensions overflow
    pub fn pixels(&self) -> Option<usize> {
        self.d1.checked_mul(self.d2)?.checked_mul(self.d3)
    }

    /// Expected file size of `f32` samples; `None` when it overflows
    pub fn byte_len(&self) -> Option<usize> {
        self.pixels()?.checked_mul(self.frames)?.checked_mul(4)
    }

    /// File name for this layout with a given base
    pub fn file_name(&self, base: &str) -> String {
        let order = match self.order {
            MmapOrder::F => "F",
            MmapOrder::C => "C",
        };
        format!(
            "{}_d1_{}_d2_{}_d3_{}_order_{}_frames_{}_.mmap",
            base, self.d1, self.d2, self.d3, order, self.frames
        )
    }

    fn offset(&self, pixels: usize, pixel: usize, frame: usize) -> usize {
        match self.order {
            MmapOrder::F => pixel + frame * pixels,
            MmapOrder::C => pixel * self.frames + frame,
        }
    }
}

fn field_after<'a>(fields: &[&'a str], key: &str, name: &str) -> Result<&'a str> {
    fields
        .iter()
        .position(|f| *f == key)
        .and_then(|i| fields.get(i + 1))
        .copied()
        .ok_or_else(|| OdynError::movie(format!("{} has no '{}' field", name, key)))
}

fn number_after(fields: &[&str], key: &str, name: &str) -> Result<usize> {
    field_after(fields, key, name)?
        .parse()
        .map_err(|_| OdynError::movie(format!("{} has a non-numeric '{}' field", name, key)))
}

/// Load a memory-mapped engine output as a `(frames, d1, d2)` movie
pub fn read_mmap(path: &Path) -> Result<Movie> {
    let layout = MmapLayout::from_path(path)?;
    if layout.d3 != 1 {
        return Err(OdynError::movie(format!(
            "{} is volumetric (d3 = {}), only planar movies are supported",
            path.display(),
            layout.d3
        )));
    }

    let expected = layout.byte_len().ok_or_else(|| {
        OdynError::movie(format!("{} has dimensions too large to map", path.display()))
    })?;

    let file = File::open(path)?;
    // SAFETY: the engine has finished writing; the map is read-only and dropped before return.
    let mmap = unsafe { Mmap::map(&file)? };

    if mmap.len() != expected {
        return Err(OdynError::movie(format!(
            "{} holds {} bytes, expected {}",
            path.display(),
            mmap.len(),
            expected
        )));
    }

    let mut samples = vec![0f32; expected / 4];
    LittleEndian::read_f32_into(&mmap[..], &mut samples);

    // pixels are column-major over (d1, d2)
    let pixels = layout.d1 * layout.d2;
    let frames = Array3::from_shape_fn((layout.frames, layout.d1, layout.d2), |(t, i, j)| {
        samples[layout.offset(pixels, i + j * layout.d1, t)]
    });

    debug!("Mapped {:?} from {}", layout, path.display());
    Ok(Movie::new(frames))
}

/// Write a movie in the engine's memory-mapped layout, returning the file path
pub fn write_mmap(dir: &Path, base: &str, movie: &Movie, order: MmapOrder) -> Result<PathBuf> {
    let (frames, d1, d2) = movie.shape();
    let layout = MmapLayout {
        d1,
        d2,
        d3: 1,
        order,
        frames,
    };

    let pixels = d1 * d2;
    let mut samples = vec![0f32; pixels * frames];
    for ((t, i, j), value) in movie.data().indexed_iter() {
        samples[layout.offset(pixels, i + j * d1, t)] = *value;
    }

    let mut bytes = vec![0u8; samples.len() * 4];
    LittleEndian::write_f32_into(&samples, &mut bytes);

    let path = dir.join(layout.file_name(base));
    let mut writer = BufWriter::new(File::create(&path)?);
    writer.write_all(&bytes)?;
    writer.flush()?;

    Ok(path)
}
