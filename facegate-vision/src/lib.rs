pub mod augment;
pub mod face;
pub mod lbph;
pub mod model;
pub mod preprocess;
pub mod video;
pub mod yunet;

// Re-export commonly used types
pub use face::{FaceBox, FaceDetector, FaceRecognizer, Prediction};
pub use lbph::{LbphParams, LbphRecognizer};
pub use video::{Camera, FrameSource};
pub use yunet::YuNetDetector;
