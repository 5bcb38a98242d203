use anyhow::Result;
use facegate_vision::augment::{adjust_brightness, flip, rotate};
use image::GrayImage;
use log::info;
use std::path::PathBuf;

use crate::config::{AugmentConfig, Config};
use crate::error::Error;
use crate::storage;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct AugmentSummary {
    pub sources: usize,
    pub written: Vec<PathBuf>,
}

/// Derived images for one source, each paired with its file name.
///
/// `base` is the source file stem and `count` the per-source counter, giving
/// `<base>_rot<angle>_<count>.jpg`, `<base>_bright<pct>_<count>.jpg` and
/// `<base>_flip_<count>.jpg`.
pub fn variants(
    img: &GrayImage,
    base: &str,
    count: usize,
    params: &AugmentConfig,
) -> Vec<(GrayImage, String)> {
    let mut out = Vec::new();
    for &angle in &params.rotation_angles {
        out.push((
            rotate(img, angle as f32),
            format!("{base}_rot{angle}_{count}.jpg"),
        ));
    }
    for &pct in &params.brightness_percent {
        out.push((
            adjust_brightness(img, pct),
            format!("{base}_bright{pct}_{count}.jpg"),
        ));
    }
    if params.flip {
        out.push((flip(img), format!("{base}_flip_{count}.jpg")));
    }
    out
}

/// Write the derived variants of every captured sample next to it.
///
/// Only `<identity>_<NNN>.jpg` files are sources, so running twice rewrites the
/// same files with the same bytes instead of augmenting earlier output.
pub fn run(cfg: &Config) -> Result<AugmentSummary> {
    let dir = cfg.identity_dir();
    if !dir.is_dir() {
        return Err(Error::MissingSampleDir(dir).into());
    }

    let mut summary = AugmentSummary::default();
    for path in storage::list_files(&dir)? {
        let Some(name) = storage::file_name(&path) else {
            continue;
        };
        if storage::sample_index(&cfg.identity, name).is_none() {
            continue;
        }
        let Some(img) = storage::load_gray(&path) else {
            continue;
        };
        let base = name.trim_end_matches(".jpg");

        for (derived, file) in variants(&img, base, summary.sources, &cfg.augment) {
            let out = dir.join(&file);
            storage::save_gray(&derived, &out)?;
            info!("Saved: {}", file);
            summary.written.push(out);
        }
        summary.sources += 1;
    }

    info!(
        "Augmentation complete: {} sources, {} images written.",
        summary.sources,
        summary.written.len()
    );
    Ok(summary)
}
