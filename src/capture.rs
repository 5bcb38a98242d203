use anyhow::{Context, Result};
use facegate_vision::{face::primary_candidate, preprocess, FaceDetector, FrameSource};
use log::{error, info, warn};
use std::path::PathBuf;

use crate::config::Config;
use crate::preview::{Input, Overlay, View, GREEN};
use crate::storage;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct CaptureSummary {
    pub frames: usize,
    pub saved: Vec<PathBuf>,
}

/// Enrollment loop: show detections, save the primary face on Space, stop on Esc
/// or once `capture.max_samples` samples were written in this run.
pub fn run(
    cfg: &Config,
    source: &mut impl FrameSource,
    detector: &mut impl FaceDetector,
    view: &mut impl View,
    overlay: &Overlay,
) -> Result<CaptureSummary> {
    let dir = cfg.identity_dir();
    let mut next_index = storage::next_sample_index(&dir, &cfg.identity)?;
    let mut summary = CaptureSummary::default();

    info!(
        "Press [Space] to save a sample, [Esc] to quit. Only faces wider than {} px are saved.",
        cfg.capture.min_face_width
    );

    while summary.saved.len() < cfg.capture.max_samples {
        let mut frame = match source.frame() {
            Ok(frame) => frame,
            Err(e) => {
                error!("Failed to read frame from camera: {:#}", e);
                break;
            }
        };
        summary.frames += 1;

        let gray = preprocess::to_gray(&frame);
        let faces = detector.detect(&frame).unwrap_or_else(|e| {
            warn!("Detection failed: {:#}", e);
            Vec::new()
        });
        let primary = primary_candidate(&faces, cfg.capture.min_face_width);
        for face in &faces {
            overlay.draw_box(&mut frame, face, GREEN);
        }

        match view.show(&frame)? {
            Some(Input::Quit) => break,
            Some(Input::Save) => {
                let sample =
                    primary.and_then(|f| preprocess::normalize_face(&gray, &f, cfg.face_size));
                match sample {
                    Some(sample) => {
                        std::fs::create_dir_all(&dir)
                            .with_context(|| format!("creating {}", dir.display()))?;
                        let path = dir.join(storage::sample_file_name(&cfg.identity, next_index));
                        storage::save_gray(&sample, &path)?;
                        info!("Saved sample: {}", path.display());
                        next_index += 1;
                        summary.saved.push(path);
                    }
                    None => warn!("No face large enough. Move closer or add light."),
                }
            }
            None => {}
        }
    }

    if summary.saved.len() >= cfg.capture.max_samples {
        info!("Collected {} samples, done.", cfg.capture.max_samples);
    }
    Ok(summary)
}
