use image::{imageops, imageops::FilterType, GrayImage, RgbImage};
use imageproc::contrast::equalize_histogram;

use crate::face::FaceBox;

/// Luma conversion used for every frame before cropping.
pub fn to_gray(frame: &RgbImage) -> GrayImage {
    imageops::grayscale(frame)
}

/// Crop `face` out of `gray`, equalize its histogram and resize to `size` x `size`.
///
/// This is the single normalization shared by enrollment and recognition, so the
/// recognizer always compares like with like. Returns `None` when the box lies
/// entirely outside the frame.
pub fn normalize_face(gray: &GrayImage, face: &FaceBox, size: u32) -> Option<GrayImage> {
    let (w, h) = gray.dimensions();
    let b = face.clamp_to(w, h)?;
    let crop = imageops::crop_imm(gray, b.x as u32, b.y as u32, b.width, b.height);
    let equalized = equalize_histogram(&crop.to_image());
    let resized = imageops::resize(&equalized, size, size, FilterType::Triangle);
    Some(resized)
}
