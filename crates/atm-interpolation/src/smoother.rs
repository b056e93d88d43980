//! Nodata-aware Gaussian smoothing (normalized convolution).
//!
//! Each band is blurred together with a validity mask and divided by the
//! blurred mask, so holes are filled from their neighborhood and valid
//! pixels are not pulled towards the nodata sentinel. The kernel is
//! separable, truncated at `4σ`, with reflect-at-edge boundaries
//! (`d c b a | a b c d | d c b a`).

use std::path::Path;

use envi_raster::{BilChunkWriter, EnviRaster, GridSource, RasterShape};

use crate::error::Result;
use crate::events::{InterpolationEvent, ProgressSink};

/// Kernel radius in units of sigma.
const TRUNCATE: f64 = 4.0;

/// Blurred mask weights at or below this count as "no valid neighbor".
const MIN_MASK_WEIGHT: f64 = 1e-12;

/// Outcome of smoothing one band.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BandSmoothing {
    /// Nodata pixels that received a value.
    pub filled: usize,
    /// Pixels left as nodata because no valid pixel was within reach.
    pub unresolved: usize,
}

/// Normalized 1-D Gaussian kernel of radius `floor(4σ + 0.5)`.
pub fn gaussian_kernel(sigma: f64) -> Vec<f64> {
    let radius = (TRUNCATE * sigma + 0.5) as usize;
    let denom = 2.0 * sigma * sigma;
    let mut kernel: Vec<f64> = (0..=2 * radius)
        .map(|i| {
            let x = i as f64 - radius as f64;
            (-x * x / denom).exp()
        })
        .collect();
    let sum: f64 = kernel.iter().sum();
    kernel.iter_mut().for_each(|w| *w /= sum);
    kernel
}

#[inline]
fn reflect(i: isize, n: usize) -> usize {
    let n = n as isize;
    let m = i.rem_euclid(2 * n);
    (if m < n { m } else { 2 * n - 1 - m }) as usize
}

/// Separable Gaussian blur of a row-major `lines x samples` grid.
pub fn gaussian_blur(values: &[f64], lines: usize, samples: usize, kernel: &[f64]) -> Vec<f64> {
    let radius = (kernel.len() / 2) as isize;
    let mut horizontal = vec![0.0; values.len()];
    let mut out = vec![0.0; values.len()];
    if values.is_empty() {
        return out;
    }

    for row in 0..lines {
        let src = &values[row * samples..(row + 1) * samples];
        let dst = &mut horizontal[row * samples..(row + 1) * samples];
        for (col, value) in dst.iter_mut().enumerate() {
            *value = kernel
                .iter()
                .enumerate()
                .map(|(k, w)| w * src[reflect(col as isize + k as isize - radius, samples)])
                .sum();
        }
    }

    for row in 0..lines {
        for col in 0..samples {
            out[row * samples + col] = kernel
                .iter()
                .enumerate()
                .map(|(k, w)| {
                    let r = reflect(row as isize + k as isize - radius, lines);
                    w * horizontal[r * samples + col]
                })
                .sum();
        }
    }

    out
}

/// Gaussian smoother for interpolated rasters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Smoother {
    sigma: f64,
    nodata: f64,
}

impl Smoother {
    pub fn new(sigma: f64, nodata: f64) -> Self {
        Self { sigma, nodata }
    }

    /// Whether smoothing does anything (`sigma > 0`).
    pub fn is_enabled(&self) -> bool {
        self.sigma > 0.0
    }

    fn is_nodata(&self, value: f64) -> bool {
        (value - self.nodata).abs() <= 1e-8 + 1e-5 * self.nodata.abs()
    }

    /// Smooth one row-major band in place.
    pub fn smooth_band(&self, band: &mut [f64], lines: usize, samples: usize) -> BandSmoothing {
        let mut result = BandSmoothing::default();
        if !self.is_enabled() || band.is_empty() {
            return result;
        }

        let kernel = gaussian_kernel(self.sigma);
        let mut mask = vec![0.0; band.len()];
        let mut holes = vec![false; band.len()];
        for ((value, weight), hole) in band.iter_mut().zip(&mut mask).zip(&mut holes) {
            if self.is_nodata(*value) || !value.is_finite() {
                *value = 0.0;
                *hole = true;
            } else {
                *weight = 1.0;
            }
        }

        let blurred = gaussian_blur(band, lines, samples, &kernel);
        let weights = gaussian_blur(&mask, lines, samples, &kernel);

        for (((value, v), w), hole) in band.iter_mut().zip(&blurred).zip(&weights).zip(&holes) {
            if *w > MIN_MASK_WEIGHT {
                *value = v / w;
                if *hole {
                    result.filled += 1;
                }
            } else {
                *value = self.nodata;
                result.unresolved += 1;
            }
        }
        result
    }

    /// Smooth every band of pixel-major `data` in place.
    pub fn smooth_pixels(&self, data: &mut [f64], shape: RasterShape, sink: &dyn ProgressSink) {
        if !self.is_enabled() {
            sink.emit(&InterpolationEvent::SmoothingSkipped { sigma: self.sigma });
            return;
        }

        let mut band_values = vec![0.0; shape.pixels()];
        for band in 0..shape.bands {
            for (pixel, value) in band_values.iter_mut().enumerate() {
                *value = data[pixel * shape.bands + band];
            }
            let result = self.smooth_band(&mut band_values, shape.lines, shape.samples);
            for (pixel, value) in band_values.iter().enumerate() {
                data[pixel * shape.bands + band] = *value;
            }
            sink.emit(&InterpolationEvent::BandSmoothed {
                band,
                filled: result.filled,
                unresolved: result.unresolved,
            });
        }
    }

    /// Smooth a BIL raster on disk in place.
    ///
    /// With smoothing disabled the file is not opened at all.
    pub fn smooth_raster(&self, path: impl AsRef<Path>, sink: &dyn ProgressSink) -> Result<()> {
        if !self.is_enabled() {
            sink.emit(&InterpolationEvent::SmoothingSkipped { sigma: self.sigma });
            return Ok(());
        }

        let path = path.as_ref();
        let raster = EnviRaster::open(path)?;
        let shape = raster.shape();
        let mut bands = Vec::with_capacity(shape.bands);
        for band in 0..shape.bands {
            let mut values = raster.read_band(band)?;
            let result = self.smooth_band(&mut values, shape.lines, shape.samples);
            sink.emit(&InterpolationEvent::BandSmoothed {
                band,
                filled: result.filled,
                unresolved: result.unresolved,
            });
            bands.push(values);
        }
        drop(raster);

        let writer = BilChunkWriter::open(path)?;
        let mut row = vec![0.0; shape.row_len()];
        for r in 0..shape.lines {
            for (band, values) in bands.iter().enumerate() {
                row[band * shape.samples..(band + 1) * shape.samples]
                    .copy_from_slice(&values[r * shape.samples..(r + 1) * shape.samples]);
            }
            writer.write_rows(r, &row)?;
        }
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NullSink;

    const NODATA: f64 = -9999.0;

    #[test]
    fn test_kernel_is_normalized_and_symmetric() {
        let kernel = gaussian_kernel(2.0);
        assert_eq!(kernel.len(), 17);
        assert!((kernel.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        for i in 0..kernel.len() / 2 {
            assert!((kernel[i] - kernel[kernel.len() - 1 - i]).abs() < 1e-15);
        }
        assert_eq!(gaussian_kernel(0.1).len(), 1);
    }

    #[test]
    fn test_reflect() {
        let idx: Vec<usize> = (-3..7).map(|i| reflect(i, 4)).collect();
        assert_eq!(idx, vec![2, 1, 0, 0, 1, 2, 3, 3, 2, 1]);
        assert_eq!(reflect(5, 1), 0);
    }

    #[test]
    fn test_constant_band_is_preserved() {
        let smoother = Smoother::new(1.5, NODATA);
        let mut band = vec![3.25; 6 * 5];
        let result = smoother.smooth_band(&mut band, 6, 5);
        assert_eq!(result, BandSmoothing::default());
        assert!(band.iter().all(|v| (v - 3.25).abs() < 1e-12));
    }

    #[test]
    fn test_holes_are_filled() {
        let smoother = Smoother::new(1.0, NODATA);
        let mut band = vec![2.0; 25];
        band[12] = NODATA;
        band[0] = NODATA;
        let result = smoother.smooth_band(&mut band, 5, 5);

        assert_eq!(result.filled, 2);
        assert_eq!(result.unresolved, 0);
        assert!(band.iter().all(|v| (v - 2.0).abs() < 1e-12));
    }

    #[test]
    fn test_all_nodata_band_stays_nodata() {
        let smoother = Smoother::new(2.0, NODATA);
        let mut band = vec![NODATA; 12];
        let result = smoother.smooth_band(&mut band, 3, 4);
        assert_eq!(result.unresolved, 12);
        assert!(band.iter().all(|&v| v == NODATA));
    }

    #[test]
    fn test_far_holes_stay_nodata() {
        // a valid pixel more than 4 sigma away contributes nothing
        let smoother = Smoother::new(0.5, NODATA);
        let mut band = vec![NODATA; 10];
        band[0] = 1.0;
        let result = smoother.smooth_band(&mut band, 1, 10);
        assert!(result.unresolved > 0);
        assert_eq!(band[9], NODATA);
        assert!(band.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_repeated_smoothing_never_opens_holes() {
        let smoother = Smoother::new(2.0, NODATA);
        let mut band: Vec<f64> = (0..64).map(|i| ((i * 37) % 11) as f64 - 4.0).collect();
        for _ in 0..5 {
            let result = smoother.smooth_band(&mut band, 8, 8);
            assert_eq!(result, BandSmoothing::default());
        }
        assert!(band.iter().all(|v| v.is_finite() && *v != NODATA));
    }

    #[test]
    fn test_disabled_smoother_is_noop() {
        let smoother = Smoother::new(0.0, NODATA);
        let original = vec![1.0, NODATA, 3.0, 4.0];
        let mut data = original.clone();
        smoother.smooth_pixels(&mut data, RasterShape::new(2, 2, 1), &NullSink);
        assert_eq!(data, original);
    }

    #[test]
    fn test_smooth_pixels_handles_bands_independently() {
        let smoother = Smoother::new(1.0, NODATA);
        // 2x2, 2 bands: band 0 constant 1, band 1 constant 5 with one hole
        let mut data = vec![1.0, 5.0, 1.0, NODATA, 1.0, 5.0, 1.0, 5.0];
        smoother.smooth_pixels(&mut data, RasterShape::new(2, 2, 2), &NullSink);
        for px in data.chunks_exact(2) {
            assert!((px[0] - 1.0).abs() < 1e-12);
            assert!((px[1] - 5.0).abs() < 1e-12);
        }
    }
}
