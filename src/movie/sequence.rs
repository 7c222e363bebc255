use crate::error::{OdynError, Result};
use ndarray::{concatenate, Array3, ArrayView2, Axis};

/// Frame sequence shaped `(frames, rows, cols)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Movie {
    frames: Array3<f32>,
}

impl Movie {
    pub fn new(frames: Array3<f32>) -> Self {
        Self { frames }
    }

    pub fn data(&self) -> &Array3<f32> {
        &self.frames
    }

    /// `(frames, rows, cols)`
    pub fn shape(&self) -> (usize, usize, usize) {
        self.frames.dim()
    }

    pub fn num_frames(&self) -> usize {
        self.frames.len_of(Axis(0))
    }

    pub fn frame(&self, index: usize) -> ArrayView2<'_, f32> {
        self.frames.index_axis(Axis(0), index)
    }

    /// Resample by `fx` (cols), `fy` (rows) and `fz` (time).
    ///
    /// Each output sample averages the input samples it covers, weighted by
    /// overlap, so shrinking bins frames and enlarging repeats them.
    pub fn resize(&self, fx: f64, fy: f64, fz: f64) -> Movie {
        let mut frames = self.frames.clone();
        for (axis, factor) in [(Axis(2), fx), (Axis(1), fy), (Axis(0), fz)] {
            if factor != 1.0 {
                frames = resample_axis(&frames, axis, factor);
            }
        }
        Movie::new(frames)
    }

    /// Join movies along time, in order
    pub fn concatenate(movies: &[Movie]) -> Result<Movie> {
        if movies.is_empty() {
            return Err(OdynError::movie("nothing to concatenate"));
        }

        let views: Vec<_> = movies.iter().map(|m| m.frames.view()).collect();
        let frames = concatenate(Axis(0), &views).map_err(|e| {
            OdynError::movie(format!("cannot concatenate movies of different sizes: {}", e))
        })?;
        Ok(Movie::new(frames))
    }
}

fn resample_axis(data: &Array3<f32>, axis: Axis, factor: f64) -> Array3<f32> {
    let taps = area_taps(data.len_of(axis), factor);

    let mut shape = data.raw_dim();
    shape[axis.index()] = taps.len();
    let mut out = Array3::<f32>::zeros(shape);

    for (i, weights) in taps.iter().enumerate() {
        let mut lane = out.index_axis_mut(axis, i);
        for &(j, w) in weights {
            lane.scaled_add(w, &data.index_axis(axis, j));
        }
    }
    out
}

/// Source indices and weights for each output sample of an area resampling
fn area_taps(len: usize, factor: f64) -> Vec<Vec<(usize, f32)>> {
    if len == 0 {
        return Vec::new();
    }

    let out_len = ((len as f64 * factor).round() as usize).max(1);
    let scale = len as f64 / out_len as f64;

    (0..out_len)
        .map(|i| {
            let start = i as f64 * scale;
            let end = ((i + 1) as f64 * scale).min(len as f64);
            let span = end - start;

            let mut weights = Vec::new();
            let mut j = start.floor() as usize;
            while j < len && (j as f64) < end {
                let overlap = end.min((j + 1) as f64) - start.max(j as f64);
                if overlap > 0.0 {
                    weights.push((j, (overlap / span) as f32));
                }
                j += 1;
            }
            weights
        })
        .collect()
}
