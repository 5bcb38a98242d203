//! YuNet face detector on ONNX Runtime.
//!
//! The graph takes a `[1, 3, 640, 640]` BGR tensor and emits twelve outputs,
//! four per stride (8, 16, 32) in the order
//! `cls_8, cls_16, cls_32, obj_8, obj_16, obj_32, bbox_8, bbox_16, bbox_32, kps_8, kps_16, kps_32`.
//! Boxes are decoded per grid cell without anchors:
//!
//! ```text
//! cx = (col + dx) * stride      w = exp(dw) * stride
//! cy = (row + dy) * stride      h = exp(dh) * stride
//! ```

use std::path::Path;

use anyhow::Result;
use image::{imageops::FilterType, RgbImage};
use ndarray::Array4;
use ort::{session::Session, value::Value};

use crate::face::{nms, FaceBox, FaceDetector};

const INPUT_SIZE: u32 = 640;
const STRIDES: [u32; 3] = [8, 16, 32];

pub struct YuNetDetector {
    session: Session,
    score_threshold: f32,
    nms_threshold: f32,
}

/// Placement of the source frame inside the square network input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Letterbox {
    pub scale: f32,
    pub offset_x: u32,
    pub offset_y: u32,
}

impl Letterbox {
    pub(crate) fn fit(width: u32, height: u32) -> Self {
        let scale = INPUT_SIZE as f32 / width.max(height) as f32;
        let new_w = (width as f32 * scale) as u32;
        let new_h = (height as f32 * scale) as u32;
        Self {
            scale,
            offset_x: (INPUT_SIZE - new_w) / 2,
            offset_y: (INPUT_SIZE - new_h) / 2,
        }
    }

    /// Map a box in network pixels (center form) back to frame pixels.
    fn unmap(&self, cx: f32, cy: f32, w: f32, h: f32, score: f32) -> FaceBox {
        let x = (cx - w / 2.0 - self.offset_x as f32) / self.scale;
        let y = (cy - h / 2.0 - self.offset_y as f32) / self.scale;
        FaceBox {
            x: x.round() as i32,
            y: y.round() as i32,
            width: (w / self.scale).round().max(0.0) as u32,
            height: (h / self.scale).round().max(0.0) as u32,
            score,
        }
    }
}

impl YuNetDetector {
    pub fn load(model: &Path, score_threshold: f32, nms_threshold: f32) -> Result<Self> {
        Ok(Self {
            session: crate::model::detector_session(model)?,
            score_threshold,
            nms_threshold,
        })
    }

    fn input_tensor(frame: &RgbImage, letterbox: &Letterbox) -> Result<Array4<f32>> {
        let (w, h) = frame.dimensions();
        let new_w = (w as f32 * letterbox.scale) as u32;
        let new_h = (h as f32 * letterbox.scale) as u32;
        let resized = image::imageops::resize(frame, new_w, new_h, FilterType::Triangle);

        let size = INPUT_SIZE as usize;
        let mut input = Array4::<f32>::zeros((1, 3, size, size));
        for (x, y, px) in resized.enumerate_pixels() {
            let cx = (x + letterbox.offset_x) as usize;
            let cy = (y + letterbox.offset_y) as usize;
            input[[0, 0, cy, cx]] = px[2] as f32;
            input[[0, 1, cy, cx]] = px[1] as f32;
            input[[0, 2, cy, cx]] = px[0] as f32;
        }
        Ok(input)
    }
}

impl FaceDetector for YuNetDetector {
    fn detect(&mut self, frame: &RgbImage) -> Result<Vec<FaceBox>> {
        let (w, h) = frame.dimensions();
        if w == 0 || h == 0 {
            return Ok(vec![]);
        }
        let letterbox = Letterbox::fit(w, h);
        let input = Value::from_array(Self::input_tensor(frame, &letterbox)?)?;

        let outputs = self.session.run(ort::inputs![input])?;
        let mut tensors: Vec<Vec<f32>> = Vec::with_capacity(12);
        for (_name, output) in outputs.iter() {
            let (_shape, data) = output.try_extract_tensor::<f32>()?;
            tensors.push(data.to_vec());
        }

        let faces = decode(&tensors, &letterbox, self.score_threshold)?;
        log::trace!("yunet: {} raw detections", faces.len());
        let faces = nms(&faces, self.nms_threshold);
        Ok(faces
            .into_iter()
            .filter_map(|f| f.clamp_to(w, h))
            .collect())
    }
}

/// Decode the twelve flattened YuNet outputs into frame-space boxes.
pub(crate) fn decode(
    outputs: &[Vec<f32>],
    letterbox: &Letterbox,
    score_threshold: f32,
) -> Result<Vec<FaceBox>> {
    if outputs.len() < 12 {
        anyhow::bail!("expected 12 detector outputs, got {}", outputs.len());
    }

    let mut faces = Vec::new();
    for (level, &stride) in STRIDES.iter().enumerate() {
        let cols = (INPUT_SIZE / stride) as usize;
        let cells = cols * cols;
        let cls = &outputs[level];
        let obj = &outputs[level + 3];
        let bbox = &outputs[level + 6];
        if cls.len() != cells || obj.len() != cells || bbox.len() != cells * 4 {
            anyhow::bail!(
                "stride {} outputs have unexpected sizes: cls={} obj={} bbox={}",
                stride,
                cls.len(),
                obj.len(),
                bbox.len()
            );
        }

        for idx in 0..cells {
            let score = (cls[idx].clamp(0.0, 1.0) * obj[idx].clamp(0.0, 1.0)).sqrt();
            if score < score_threshold {
                continue;
            }
            let (row, col) = ((idx / cols) as f32, (idx % cols) as f32);
            let s = stride as f32;
            let d = &bbox[idx * 4..idx * 4 + 4];
            let cx = (col + d[0]) * s;
            let cy = (row + d[1]) * s;
            let bw = d[2].exp() * s;
            let bh = d[3].exp() * s;
            faces.push(letterbox.unmap(cx, cy, bw, bh, score));
        }
    }
    Ok(faces)
}
