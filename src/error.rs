use std::path::PathBuf;

use thiserror::Error;

/// Failures that end a stage early without side effects.
#[derive(Debug, Error)]
pub enum Error {
    #[error("camera {device} could not be opened")]
    CameraUnavailable { device: String },
    #[error("sample folder not found: {}", .0.display())]
    MissingSampleDir(PathBuf),
    #[error("no loadable samples in {}; run `facegate capture` first", .0.display())]
    NoSamples(PathBuf),
    #[error("{} not found; run `facegate train` first", .0.display())]
    MissingArtifact(PathBuf),
}
