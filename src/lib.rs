pub mod augment;
pub mod capture;
pub mod config;
pub mod control;
pub mod error;
pub mod preview;
pub mod recognize;
pub mod storage;
pub mod train;

pub use error::Error;

// Re-export vision types for convenience
pub use facegate_vision::{
    Camera, FaceBox, FaceDetector, FaceRecognizer, FrameSource, LbphRecognizer, Prediction,
    YuNetDetector,
};
