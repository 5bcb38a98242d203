//! Local Binary Patterns Histogram recognizer.
//!
//! Each sample becomes a spatial histogram: the image is mapped to circular LBP
//! codes (bilinear sampling of `neighbors` points at `radius`), split into a
//! `grid_x` x `grid_y` grid, and every cell contributes one histogram of
//! `2^neighbors` bins normalized by the cell's pixel count. Prediction is the
//! nearest stored histogram under the chi-square distance.

use std::f64::consts::PI;

use anyhow::Result;
use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::face::{FaceRecognizer, Prediction};

const EPSILON: f64 = f32::EPSILON as f64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LbphParams {
    pub radius: u32,
    pub neighbors: u32,
    pub grid_x: u32,
    pub grid_y: u32,
}

impl Default for LbphParams {
    fn default() -> Self {
        Self {
            radius: 1,
            neighbors: 8,
            grid_x: 8,
            grid_y: 8,
        }
    }
}

impl LbphParams {
    pub fn validate(&self) -> Result<()> {
        if self.radius == 0 {
            anyhow::bail!("lbph radius must be at least 1");
        }
        if !(1..=16).contains(&self.neighbors) {
            anyhow::bail!("lbph neighbors must be in 1..=16, got {}", self.neighbors);
        }
        if self.grid_x == 0 || self.grid_y == 0 {
            anyhow::bail!("lbph grid must be at least 1x1");
        }
        Ok(())
    }

    fn bins(&self) -> usize {
        1usize << self.neighbors
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LbphRecognizer {
    params: LbphParams,
    histograms: Vec<Vec<f32>>,
    labels: Vec<i32>,
}

impl LbphRecognizer {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn labels(&self) -> &[i32] {
        &self.labels
    }
}

impl FaceRecognizer for LbphRecognizer {
    type Params = LbphParams;

    fn train(params: &LbphParams, samples: &[GrayImage], labels: &[i32]) -> Result<Self> {
        params.validate()?;
        if samples.is_empty() {
            anyhow::bail!("no training samples");
        }
        if samples.len() != labels.len() {
            anyhow::bail!("{} samples but {} labels", samples.len(), labels.len());
        }
        let histograms = samples
            .iter()
            .map(|s| spatial_histogram(s, params))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            params: *params,
            histograms,
            labels: labels.to_vec(),
        })
    }

    fn predict(&self, face: &GrayImage) -> Result<Prediction> {
        // params may come from a hand-edited model file
        self.params.validate()?;
        let query = spatial_histogram(face, &self.params)?;
        let mut best: Option<Prediction> = None;
        for (hist, &label) in self.histograms.iter().zip(&self.labels) {
            let confidence = chi_square(hist, &query);
            if best.map_or(true, |b| confidence < b.confidence) {
                best = Some(Prediction { label, confidence });
            }
        }
        best.ok_or_else(|| anyhow::anyhow!("recognizer holds no samples"))
    }
}

/// Circular LBP codes. The result is `(w - 2r) x (h - 2r)`, row-major.
fn lbp_codes(img: &GrayImage, radius: u32, neighbors: u32) -> Result<(Vec<u32>, usize, usize)> {
    let (w, h) = img.dimensions();
    let r = radius as usize;
    if w as usize <= 2 * r || h as usize <= 2 * r {
        anyhow::bail!("image {}x{} too small for radius {}", w, h, radius);
    }
    let (w, h) = (w as usize, h as usize);
    let (out_w, out_h) = (w - 2 * r, h - 2 * r);
    let src = img.as_raw();
    let at = |row: isize, col: isize| src[row as usize * w + col as usize] as f64;

    let mut codes = vec![0u32; out_w * out_h];
    for n in 0..neighbors {
        let angle = 2.0 * PI * n as f64 / neighbors as f64;
        let x = radius as f64 * angle.cos();
        let y = -(radius as f64) * angle.sin();
        let (fx, fy) = (x.floor(), y.floor());
        let (cx, cy) = (x.ceil(), y.ceil());
        let (tx, ty) = (x - fx, y - fy);
        let w1 = (1.0 - tx) * (1.0 - ty);
        let w2 = tx * (1.0 - ty);
        let w3 = (1.0 - tx) * ty;
        let w4 = tx * ty;
        let (fx, fy, cx, cy) = (fx as isize, fy as isize, cx as isize, cy as isize);

        for i in r..h - r {
            for j in r..w - r {
                let (ii, jj) = (i as isize, j as isize);
                let t = w1 * at(ii + fy, jj + fx)
                    + w2 * at(ii + fy, jj + cx)
                    + w3 * at(ii + cy, jj + fx)
                    + w4 * at(ii + cy, jj + cx);
                let center = at(ii, jj);
                if t > center || (t - center).abs() < EPSILON {
                    codes[(i - r) * out_w + (j - r)] |= 1 << n;
                }
            }
        }
    }
    Ok((codes, out_w, out_h))
}

fn spatial_histogram(img: &GrayImage, params: &LbphParams) -> Result<Vec<f32>> {
    let (codes, w, h) = lbp_codes(img, params.radius, params.neighbors)?;
    let (gx, gy) = (params.grid_x as usize, params.grid_y as usize);
    let (cell_w, cell_h) = (w / gx, h / gy);
    if cell_w == 0 || cell_h == 0 {
        anyhow::bail!(
            "image {}x{} too small for a {}x{} grid",
            img.width(),
            img.height(),
            gx,
            gy
        );
    }

    let bins = params.bins();
    let total = (cell_w * cell_h) as f32;
    let mut out = vec![0f32; gx * gy * bins];
    for cy in 0..gy {
        for cx in 0..gx {
            let hist = &mut out[(cy * gx + cx) * bins..(cy * gx + cx + 1) * bins];
            for row in cy * cell_h..(cy + 1) * cell_h {
                for &code in &codes[row * w + cx * cell_w..row * w + (cx + 1) * cell_w] {
                    hist[code as usize] += 1.0;
                }
            }
            hist.iter_mut().for_each(|v| *v /= total);
        }
    }
    Ok(out)
}

/// Symmetric chi-square: `sum 2 (a - b)^2 / (a + b)`.
fn chi_square(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(&a, &b)| {
            let (a, b) = (a as f64, b as f64);
            let sum = a + b;
            if sum.abs() > f64::EPSILON {
                2.0 * (a - b) * (a - b) / sum
            } else {
                0.0
            }
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn noise(seed: u64) -> GrayImage {
        let mut rng = StdRng::seed_from_u64(seed);
        GrayImage::from_fn(64, 64, |_, _| Luma([rng.gen()]))
    }

    fn stripes() -> GrayImage {
        GrayImage::from_fn(64, 64, |x, _| {
            let v = if (x / 4) % 2 == 0 { 30 } else { 220 };
            Luma([v])
        })
    }

    #[test]
    fn flat_image_sets_every_bit() {
        let img = GrayImage::from_pixel(5, 5, Luma([90]));
        let (codes, w, h) = lbp_codes(&img, 1, 8).unwrap();
        assert_eq!((w, h), (3, 3));
        assert!(codes.iter().all(|&c| c == 0xFF));
    }

    #[test]
    fn isolated_peak_has_zero_code() {
        let mut img = GrayImage::from_pixel(3, 3, Luma([10]));
        img.put_pixel(1, 1, Luma([250]));
        let (codes, _, _) = lbp_codes(&img, 1, 8).unwrap();
        assert_eq!(codes, vec![0]);
    }

    #[test]
    fn cell_histograms_are_normalized() {
        let params = LbphParams::default();
        let hist = spatial_histogram(&noise(3), &params).unwrap();
        assert_eq!(hist.len(), 8 * 8 * 256);
        for cell in hist.chunks(256) {
            let sum: f32 = cell.iter().sum();
            assert!((sum - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn training_sample_predicts_itself_at_zero_distance() {
        let params = LbphParams::default();
        let samples = vec![noise(1), stripes()];
        let model = LbphRecognizer::train(&params, &samples, &[0, 1]).unwrap();
        let p = model.predict(&stripes()).unwrap();
        assert_eq!(p.label, 1);
        assert!(p.confidence.abs() < 1e-9);
        assert_eq!(model.predict(&noise(1)).unwrap().label, 0);
    }

    #[test]
    fn dissimilar_texture_is_farther() {
        let params = LbphParams::default();
        let model = LbphRecognizer::train(&params, &[noise(1)], &[0]).unwrap();
        let near = model.predict(&noise(2)).unwrap().confidence;
        let far = model.predict(&stripes()).unwrap().confidence;
        assert!(far > near, "far {} near {}", far, near);
    }

    #[test]
    fn train_rejects_bad_input() {
        let params = LbphParams::default();
        assert!(LbphRecognizer::train(&params, &[], &[]).is_err());
        let one = [noise(1)];
        assert!(LbphRecognizer::train(&params, &one, &[0, 0]).is_err());
        let tiny = GrayImage::new(6, 6);
        assert!(LbphRecognizer::train(&params, &[tiny], &[0]).is_err());
        let bad = LbphParams {
            neighbors: 0,
            ..params
        };
        assert!(LbphRecognizer::train(&bad, &[noise(1)], &[0]).is_err());
    }

    #[test]
    fn corrupt_stored_params_fail_prediction() {
        let model = LbphRecognizer::train(&LbphParams::default(), &[noise(1)], &[0]).unwrap();
        for bad in [
            LbphParams {
                grid_x: 0,
                ..LbphParams::default()
            },
            LbphParams {
                neighbors: 40,
                ..LbphParams::default()
            },
        ] {
            let broken = LbphRecognizer {
                params: bad,
                ..model.clone()
            };
            assert!(broken.predict(&noise(1)).is_err());
        }
    }
}
