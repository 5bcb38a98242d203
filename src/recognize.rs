use anyhow::Result;
use facegate_vision::{preprocess, FaceDetector, FaceRecognizer, FrameSource, LbphRecognizer};
use log::{debug, error, info, warn};

use crate::config::Config;
use crate::control::{Command, Controller};
use crate::error::Error;
use crate::preview::{Input, Overlay, View, GREEN, RED};
use crate::storage;

/// Whether the enrolled identity is in front of the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Present,
    Absent,
}

impl Presence {
    /// Commands that move the device into this state.
    pub fn commands(self) -> &'static [Command] {
        match self {
            Presence::Present => &[Command::Open, Command::LedOff],
            Presence::Absent => &[Command::LedOn],
        }
    }
}

/// Debounces per-frame presence into state changes. Starts `Absent`.
#[derive(Debug, Clone)]
pub struct PresenceTracker {
    state: Presence,
}

impl Default for PresenceTracker {
    fn default() -> Self {
        Self {
            state: Presence::Absent,
        }
    }
}

impl PresenceTracker {
    pub fn state(&self) -> Presence {
        self.state
    }

    /// Record one frame. Returns the new state only when it differs from the last.
    pub fn observe(&mut self, frame: Presence) -> Option<Presence> {
        if frame == self.state {
            return None;
        }
        self.state = frame;
        Some(frame)
    }
}

/// Load the trained model and the display name of the expected label.
/// Both files must exist; nothing else is touched when they do not.
pub fn load_artifacts(cfg: &Config) -> Result<(LbphRecognizer, String)> {
    for path in [&cfg.model_path, &cfg.label_map_path] {
        if !path.exists() {
            return Err(Error::MissingArtifact(path.clone()).into());
        }
    }
    let recognizer = storage::load_model(&cfg.model_path)?;
    let label_map = storage::load_label_map(&cfg.label_map_path)?;
    let name = storage::display_name(&label_map, cfg.recognition.expected_label, cfg);
    Ok((recognizer, name))
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct RecognizeSummary {
    pub frames: usize,
    pub transitions: Vec<Presence>,
}

/// Recognition loop. Each frame is `Present` when any detected face predicts
/// `recognition.expected_label` below `recognition.confidence_threshold`; the
/// controller hears about state changes, plus one `LED_ON` when the first frame
/// is absent. Runs until Quit or a camera error.
#[allow(clippy::too_many_arguments)]
pub fn run(
    cfg: &Config,
    source: &mut impl FrameSource,
    detector: &mut impl FaceDetector,
    recognizer: &impl FaceRecognizer,
    expected_name: &str,
    view: &mut impl View,
    overlay: &Overlay,
    controller: &mut Controller<'_>,
) -> Result<RecognizeSummary> {
    let rc = &cfg.recognition;
    let mut tracker = PresenceTracker::default();
    let mut summary = RecognizeSummary::default();
    info!("Recognition started. Press [Esc] to quit.");

    loop {
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

        let mut presence = Presence::Absent;
        for face in &faces {
            let Some(sample) = preprocess::normalize_face(&gray, face, cfg.face_size) else {
                continue;
            };
            let p = recognizer.predict(&sample)?;
            debug!("label={} confidence={:.2}", p.label, p.confidence);

            let matched = p.label == rc.expected_label && p.confidence < rc.confidence_threshold;
            let (text, color) = if matched {
                presence = Presence::Present;
                (format!("{} ({})", expected_name, p.confidence as i64), GREEN)
            } else {
                (format!("Unknown ({})", p.confidence as i64), RED)
            };
            overlay.draw_box(&mut frame, face, color);
            overlay.draw_label(&mut frame, face, &text, color);
        }

        if summary.frames == 1 && presence == Presence::Absent {
            // the device state is unknown until the first frame is decided
            for &cmd in Presence::Absent.commands() {
                controller.send(cmd);
            }
        }
        if let Some(state) = tracker.observe(presence) {
            info!("State changed: {:?}", state);
            for &cmd in state.commands() {
                controller.send(cmd);
            }
            summary.transitions.push(state);
        }

        if view.show(&frame)? == Some(Input::Quit) {
            break;
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use Presence::*;

    #[test]
    fn only_changes_fire() {
        let mut tracker = PresenceTracker::default();
        let fired: Vec<(usize, Presence)> = [Absent, Absent, Present, Present, Absent]
            .into_iter()
            .enumerate()
            .filter_map(|(i, p)| tracker.observe(p).map(|s| (i + 1, s)))
            .collect();
        assert_eq!(fired, vec![(3, Present), (5, Absent)]);
    }

    #[test]
    fn long_runs_stay_quiet() {
        let mut tracker = PresenceTracker::default();
        assert_eq!(tracker.observe(Present), Some(Present));
        for _ in 0..1000 {
            assert_eq!(tracker.observe(Present), None);
        }
        assert_eq!(tracker.state(), Present);
    }

    #[test]
    fn command_pairs() {
        assert_eq!(Present.commands(), &[Command::Open, Command::LedOff]);
        assert_eq!(Absent.commands(), &[Command::LedOn]);
    }
}
