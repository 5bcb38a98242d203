use crate::config::Config;
use anyhow::{Context, Result};
use facegate_vision::LbphRecognizer;
use image::codecs::jpeg::JpegEncoder;
use image::GrayImage;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Label id to display name, persisted as `{"<label>": "<name>"}`.
pub type LabelMap = BTreeMap<i32, String>;

/// `<identity>_<NNN>.jpg`
pub fn sample_file_name(identity: &str, index: usize) -> String {
    format!("{identity}_{index:03}.jpg")
}

/// Index of a captured sample, `None` for augmented variants and foreign files.
pub fn sample_index(identity: &str, file_name: &str) -> Option<usize> {
    let digits = file_name
        .strip_prefix(identity)?
        .strip_prefix('_')?
        .strip_suffix(".jpg")?;
    if digits.len() < 3 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// First index past every captured sample already in `dir`.
pub fn next_sample_index(dir: &Path, identity: &str) -> Result<usize> {
    if !dir.is_dir() {
        return Ok(0);
    }
    let next = list_files(dir)?
        .iter()
        .filter_map(|p| sample_index(identity, file_name(p)?))
        .map(|i| i + 1)
        .max()
        .unwrap_or(0);
    Ok(next)
}

/// Regular files in `dir`, ordered by file name.
pub fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("listing {}", dir.display()))? {
        let path = entry?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

pub fn file_name(path: &Path) -> Option<&str> {
    path.file_name()?.to_str()
}

/// Decode an image as 8-bit grayscale. Undecodable files yield `None`.
pub fn load_gray(path: &Path) -> Option<GrayImage> {
    match image::open(path) {
        Ok(img) => Some(img.to_luma8()),
        Err(e) => {
            log::debug!("skipping {}: {}", path.display(), e);
            None
        }
    }
}

/// JPEG quality for samples and derived images.
pub const JPEG_QUALITY: u8 = 95;

/// Write `img` as JPEG at [`JPEG_QUALITY`].
pub fn save_gray(img: &GrayImage, path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    img.write_with_encoder(JpegEncoder::new_with_quality(&mut writer, JPEG_QUALITY))
        .with_context(|| format!("writing {}", path.display()))?;
    writer.flush()?;
    Ok(())
}

pub fn save_label_map(map: &LabelMap, path: &Path) -> Result<()> {
    let data = serde_json::to_string_pretty(map)?;
    std::fs::write(path, data).with_context(|| format!("writing {}", path.display()))
}

pub fn load_label_map(path: &Path) -> Result<LabelMap> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

/// Persist the recognizer. JSON keeps the file readable as YAML too.
pub fn save_model(model: &LbphRecognizer, path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, model)?;
    writer.flush()?;
    Ok(())
}

pub fn load_model(path: &Path) -> Result<LbphRecognizer> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("parsing model {}", path.display()))
}

/// Name shown for `label`, falling back to the configured identity.
pub fn display_name(map: &LabelMap, label: i32, cfg: &Config) -> String {
    map.get(&label)
        .cloned()
        .unwrap_or_else(|| cfg.identity.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_names_are_zero_padded() {
        assert_eq!(sample_file_name("you", 7), "you_007.jpg");
        assert_eq!(sample_file_name("you", 1234), "you_1234.jpg");
    }

    #[test]
    fn only_captured_samples_have_an_index() {
        assert_eq!(sample_index("you", "you_012.jpg"), Some(12));
        assert_eq!(sample_index("you", "you_1234.jpg"), Some(1234));
        assert_eq!(sample_index("you", "you_012_flip_0.jpg"), None);
        assert_eq!(sample_index("you", "you_012_rot-15_3.jpg"), None);
        assert_eq!(sample_index("you", "other_012.jpg"), None);
        assert_eq!(sample_index("you", "you_12.jpg"), None);
        assert_eq!(sample_index("you", "you_012.png"), None);
    }

    #[test]
    fn label_map_serializes_with_string_keys() {
        let map: LabelMap = [(0, "you".to_string())].into_iter().collect();
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"0":"you"}"#);
        let back: LabelMap = serde_json::from_str(&json).unwrap();
        assert_eq!(back, map);
    }

    #[test]
    fn gray_samples_are_written_as_jpeg() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("facegate-sample-{}.jpg", std::process::id()));
        let img = GrayImage::from_fn(40, 30, |x, y| image::Luma([(x * 5 + y) as u8]));
        save_gray(&img, &path).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
        let back = load_gray(&path).unwrap();
        assert_eq!(back.dimensions(), (40, 30));
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn display_name_falls_back_to_identity() {
        let cfg = Config::default();
        let map: LabelMap = [(0, "alice".to_string())].into_iter().collect();
        assert_eq!(display_name(&map, 0, &cfg), "alice");
        assert_eq!(display_name(&LabelMap::new(), 0, &cfg), "you");
    }
}
