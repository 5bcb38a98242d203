use anyhow::Result;
use facegate_vision::{FaceRecognizer, LbphRecognizer};
use image::GrayImage;
use log::info;
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use std::path::Path;

use crate::config::Config;
use crate::error::Error;
use crate::storage::{self, LabelMap};

/// Every enrolled sample belongs to this label.
pub const ENROLLED_LABEL: i32 = 0;

#[derive(Debug, Clone, PartialEq)]
pub struct TrainReport {
    pub loaded: usize,
    pub evaluated: usize,
    /// Percentage of held-out samples recognized, in `0..=100`.
    pub accuracy: Option<f64>,
    pub mean_confidence: Option<f64>,
}

/// Every decodable image in `dir` as grayscale, in file-name order.
pub fn load_samples(dir: &Path) -> Result<Vec<GrayImage>> {
    Ok(storage::list_files(dir)?
        .iter()
        .filter_map(|p| storage::load_gray(p))
        .collect())
}

/// Reproducible `(train, holdout)` index split. The holdout takes
/// `ceil(n * fraction)` samples; it is empty when either side would be.
pub fn holdout_split(n: usize, fraction: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let holdout = ((n as f64 * fraction) - 1e-9).ceil().max(0.0) as usize;
    if holdout == 0 || holdout >= n {
        return ((0..n).collect(), Vec::new());
    }
    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(&mut StdRng::seed_from_u64(seed));
    let mut test = order[..holdout].to_vec();
    let mut train = order[holdout..].to_vec();
    test.sort_unstable();
    train.sort_unstable();
    (train, test)
}

/// Accuracy (percent) and mean confidence over `faces`, counting a face as
/// recognized when it predicts `expected` below `threshold`.
pub fn evaluate(
    recognizer: &impl FaceRecognizer,
    faces: &[&GrayImage],
    expected: i32,
    threshold: f64,
) -> Result<(f64, f64)> {
    if faces.is_empty() {
        anyhow::bail!("nothing to evaluate");
    }
    let mut correct = 0usize;
    let mut total_confidence = 0.0;
    for face in faces {
        let p = recognizer.predict(face)?;
        log::debug!("holdout: label={} confidence={:.2}", p.label, p.confidence);
        if p.label == expected && p.confidence < threshold {
            correct += 1;
        }
        total_confidence += p.confidence;
    }
    let n = faces.len() as f64;
    Ok((100.0 * correct as f64 / n, total_confidence / n))
}

/// Fit the recognizer on every sample of the enrolled identity and persist it
/// together with the label map. A holdout split is scored first for the log.
pub fn run(cfg: &Config) -> Result<TrainReport> {
    let dir = cfg.identity_dir();
    if !dir.is_dir() {
        return Err(Error::MissingSampleDir(dir).into());
    }
    let samples = load_samples(&dir)?;
    if samples.is_empty() {
        return Err(Error::NoSamples(dir).into());
    }
    info!("Loaded {} samples from {}", samples.len(), dir.display());

    let params = &cfg.training.lbph;
    let mut report = TrainReport {
        loaded: samples.len(),
        evaluated: 0,
        accuracy: None,
        mean_confidence: None,
    };

    let training = &cfg.training;
    let (train_idx, test_idx) =
        holdout_split(samples.len(), training.holdout_fraction, training.seed);
    if !test_idx.is_empty() {
        let train: Vec<GrayImage> = train_idx.iter().map(|&i| samples[i].clone()).collect();
        let labels = vec![ENROLLED_LABEL; train.len()];
        let model = LbphRecognizer::train(params, &train, &labels)?;
        let test: Vec<&GrayImage> = test_idx.iter().map(|&i| &samples[i]).collect();
        let (accuracy, mean_confidence) = evaluate(
            &model,
            &test,
            ENROLLED_LABEL,
            cfg.recognition.confidence_threshold,
        )?;
        info!(
            "Holdout: {} of {} samples, accuracy {:.1}%, mean confidence {:.2}",
            test.len(),
            samples.len(),
            accuracy,
            mean_confidence
        );
        report.evaluated = test.len();
        report.accuracy = Some(accuracy);
        report.mean_confidence = Some(mean_confidence);
    } else {
        info!("Too few samples for a holdout split, skipping evaluation");
    }

    let labels = vec![ENROLLED_LABEL; samples.len()];
    let model = LbphRecognizer::train(params, &samples, &labels)?;
    storage::save_model(&model, &cfg.model_path)?;

    let label_map = LabelMap::from([(ENROLLED_LABEL, cfg.identity.clone())]);
    storage::save_label_map(&label_map, &cfg.label_map_path)?;

    info!(
        "Training complete: saved {} and {}",
        cfg.model_path.display(),
        cfg.label_map_path.display()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn holdout_takes_twenty_percent() {
        let (train, test) = holdout_split(10, 0.2, 42);
        assert_eq!(test.len(), 2);
        assert_eq!(train.len(), 8);
        let mut all: Vec<usize> = train.iter().chain(&test).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn holdout_rounds_up_without_float_drift() {
        assert_eq!(holdout_split(15, 0.2, 1).1.len(), 3);
        assert_eq!(holdout_split(7, 0.2, 1).1.len(), 2);
    }

    #[test]
    fn holdout_is_reproducible_per_seed() {
        assert_eq!(holdout_split(50, 0.2, 7), holdout_split(50, 0.2, 7));
    }

    #[test]
    fn tiny_sets_skip_the_holdout() {
        assert_eq!(holdout_split(1, 0.2, 42), (vec![0], vec![]));
        assert_eq!(holdout_split(4, 0.0, 42).1.len(), 0);
        assert_eq!(holdout_split(3, 1.0, 42).1.len(), 0);
    }
}
