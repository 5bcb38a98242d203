use anyhow::{Context, Result};
use facegate_vision::LbphParams;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub static CONFIG_PATH: Lazy<&'static Path> = Lazy::new(|| {
    Path::new(option_env!("FACEGATE_CONFIG_PATH").unwrap_or("facegate.toml"))
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Name of the single enrolled identity; also the sample folder name.
    pub identity: String,
    pub data_dir: PathBuf,
    pub model_path: PathBuf,
    pub label_map_path: PathBuf,
    pub camera: String,
    pub detector_model: PathBuf,
    /// TrueType font for preview labels. Labels are skipped without one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font: Option<PathBuf>,
    /// Side of the square normalized face sample, in pixels.
    pub face_size: u32,
    pub detection: DetectionConfig,
    pub capture: CaptureConfig,
    pub augment: AugmentConfig,
    pub training: TrainingConfig,
    pub recognition: RecognitionConfig,
    pub serial: SerialConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            identity: "you".to_string(),
            data_dir: PathBuf::from("data"),
            model_path: PathBuf::from("trainer.yml"),
            label_map_path: PathBuf::from("label_map.json"),
            camera: "/dev/video0".to_string(),
            detector_model: PathBuf::from("models/face_detection_yunet_2023mar.onnx"),
            font: None,
            face_size: 200,
            detection: DetectionConfig::default(),
            capture: CaptureConfig::default(),
            augment: AugmentConfig::default(),
            training: TrainingConfig::default(),
            recognition: RecognitionConfig::default(),
            serial: SerialConfig::default(),
        }
    }
}

impl Config {
    pub fn identity_dir(&self) -> PathBuf {
        self.data_dir.join(&self.identity)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub score_threshold: f32,
    pub nms_threshold: f32,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            score_threshold: 0.6,
            nms_threshold: 0.3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub max_samples: usize,
    /// Faces must be strictly wider than this to be saved.
    pub min_face_width: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            max_samples: 100,
            min_face_width: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AugmentConfig {
    pub rotation_angles: Vec<i32>,
    pub brightness_percent: Vec<u32>,
    pub flip: bool,
}

impl Default for AugmentConfig {
    fn default() -> Self {
        Self {
            rotation_angles: vec![-15, 15],
            brightness_percent: vec![70, 130],
            flip: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub holdout_fraction: f64,
    pub seed: u64,
    pub lbph: LbphParams,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            holdout_fraction: 0.2,
            seed: 42,
            lbph: LbphParams::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    pub expected_label: i32,
    /// Largest LBPH distance still accepted as a match.
    pub confidence_threshold: f64,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            expected_label: 0,
            confidence_threshold: 50.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    pub port: String,
    pub baud_rate: u32,
    /// Pause after opening; boards that reset on connect need it.
    pub settle_ms: u64,
    pub timeout_ms: u64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: "/dev/cu.usbserial-210".to_string(),
            baud_rate: 9600,
            settle_ms: 2000,
            timeout_ms: 1000,
        }
    }
}

pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = path.unwrap_or(&CONFIG_PATH);
    if !path.exists() {
        return Ok(Config::default());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config at {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
}

pub fn save_config(cfg: &Config, path: Option<&Path>) -> Result<()> {
    let path = path.unwrap_or(&CONFIG_PATH);
    let data = toml::to_string_pretty(cfg)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, data)?;
    Ok(())
}
