use anyhow::Result;
use image::{GrayImage, RgbImage};

/// Axis-aligned face box in frame pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceBox {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub score: f32,
}

impl FaceBox {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            score: 1.0,
        }
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Intersect with a `width` x `height` frame. `None` when nothing is left.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<FaceBox> {
        let x0 = self.x.max(0) as i64;
        let y0 = self.y.max(0) as i64;
        let x1 = (self.x as i64 + self.width as i64).min(width as i64);
        let y1 = (self.y as i64 + self.height as i64).min(height as i64);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(FaceBox {
            x: x0 as i32,
            y: y0 as i32,
            width: (x1 - x0) as u32,
            height: (y1 - y0) as u32,
            score: self.score,
        })
    }
}

/// Face detection capability: zero or more boxes per frame.
pub trait FaceDetector {
    fn detect(&mut self, frame: &RgbImage) -> Result<Vec<FaceBox>>;
}

/// Result of scoring one normalized face. Lower confidence is a closer match.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub label: i32,
    pub confidence: f64,
}

/// Face recognition capability: fit on labelled samples, then score new faces.
pub trait FaceRecognizer: Sized {
    type Params;

    fn train(params: &Self::Params, samples: &[GrayImage], labels: &[i32]) -> Result<Self>;

    fn predict(&self, face: &GrayImage) -> Result<Prediction>;
}

/// The largest box strictly wider than `min_width`. Ties keep the earlier box.
pub fn primary_candidate(faces: &[FaceBox], min_width: u32) -> Option<FaceBox> {
    let mut best: Option<FaceBox> = None;
    for face in faces.iter().filter(|f| f.width > min_width) {
        match best {
            Some(b) if b.area() >= face.area() => {}
            _ => best = Some(*face),
        }
    }
    best
}

/// Greedy non-maximum suppression, highest score first.
pub fn nms(faces: &[FaceBox], iou_threshold: f32) -> Vec<FaceBox> {
    let mut sorted = faces.to_vec();
    sorted.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut keep: Vec<FaceBox> = Vec::with_capacity(sorted.len());
    for face in sorted {
        if keep.iter().all(|k| iou(k, &face) <= iou_threshold) {
            keep.push(face);
        }
    }
    keep
}

fn iou(a: &FaceBox, b: &FaceBox) -> f32 {
    let x1 = a.x.max(b.x) as f32;
    let y1 = a.y.max(b.y) as f32;
    let x2 = (a.x + a.width as i32).min(b.x + b.width as i32) as f32;
    let y2 = (a.y + a.height as i32).min(b.y + b.height as i32) as f32;
    if x2 <= x1 || y2 <= y1 {
        return 0.0;
    }
    let inter = (x2 - x1) * (y2 - y1);
    inter / (a.area() as f32 + b.area() as f32 - inter)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scored(x: i32, y: i32, w: u32, h: u32, score: f32) -> FaceBox {
        FaceBox {
            score,
            ..FaceBox::new(x, y, w, h)
        }
    }

    #[test]
    fn test_iou() {
        let a = FaceBox::new(10, 10, 20, 20);
        let b = FaceBox::new(15, 15, 20, 20);
        let v = iou(&a, &b);
        assert!(v > 0.0 && v < 1.0);
        assert_eq!(iou(&a, &FaceBox::new(100, 100, 10, 10)), 0.0);
        assert!((iou(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_nms() {
        let faces = vec![
            scored(10, 10, 20, 20, 0.9),
            scored(12, 12, 20, 20, 0.8),
            scored(100, 100, 20, 20, 0.85),
        ];
        let kept = nms(&faces, 0.3);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].score, 0.9);
        assert_eq!(kept[1].score, 0.85);
    }

    #[test]
    fn primary_ignores_narrow_faces() {
        let faces = vec![FaceBox::new(0, 0, 90, 300), FaceBox::new(50, 50, 100, 100)];
        assert_eq!(primary_candidate(&faces, 100), None);
    }

    #[test]
    fn primary_picks_largest_area() {
        let faces = vec![
            FaceBox::new(0, 0, 120, 120),
            FaceBox::new(200, 0, 80, 400),
            FaceBox::new(300, 0, 150, 140),
        ];
        let best = primary_candidate(&faces, 100).unwrap();
        assert_eq!((best.x, best.width), (300, 150));
    }

    #[test]
    fn primary_keeps_first_on_tie() {
        let faces = vec![FaceBox::new(0, 0, 120, 120), FaceBox::new(50, 0, 120, 120)];
        assert_eq!(primary_candidate(&faces, 100).unwrap().x, 0);
    }

    #[test]
    fn clamp_trims_to_frame() {
        let b = FaceBox::new(-10, 630, 50, 100);
        let c = b.clamp_to(640, 480);
        assert_eq!(c, None);

        let c = FaceBox::new(-10, 400, 50, 100).clamp_to(640, 480).unwrap();
        assert_eq!((c.x, c.y, c.width, c.height), (0, 400, 40, 80));
    }
}
