use image::{imageops, GrayImage, Luma};
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};

/// Rotate about the image center, counter-clockwise for positive `degrees`.
/// Output keeps the input dimensions; uncovered corners are black.
pub fn rotate(img: &GrayImage, degrees: f32) -> GrayImage {
    // imageproc turns clockwise for positive angles
    rotate_about_center(
        img,
        -degrees.to_radians(),
        Interpolation::Bilinear,
        Luma([0]),
    )
}

/// Multiply every intensity by `percent / 100`, rounded half to even and
/// saturated to `0..=255`.
pub fn adjust_brightness(img: &GrayImage, percent: u32) -> GrayImage {
    let mut lut = [0u8; 256];
    for (v, slot) in lut.iter_mut().enumerate() {
        let scaled = v as u32 * percent;
        let (q, r) = (scaled / 100, scaled % 100);
        let rounded = if r > 50 || (r == 50 && q % 2 == 1) {
            q + 1
        } else {
            q
        };
        *slot = rounded.min(255) as u8;
    }
    let mut out = img.clone();
    for px in out.pixels_mut() {
        px[0] = lut[px[0] as usize];
    }
    out
}

/// Mirror around the vertical axis.
pub fn flip(img: &GrayImage) -> GrayImage {
    imageops::flip_horizontal(img)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn noise(w: u32, h: u32, seed: u64) -> GrayImage {
        let mut rng = StdRng::seed_from_u64(seed);
        GrayImage::from_fn(w, h, |_, _| Luma([rng.gen()]))
    }

    #[test]
    fn every_transform_keeps_dimensions() {
        let img = noise(200, 160, 1);
        assert_eq!(rotate(&img, 15.0).dimensions(), (200, 160));
        assert_eq!(rotate(&img, -15.0).dimensions(), (200, 160));
        assert_eq!(adjust_brightness(&img, 70).dimensions(), (200, 160));
        assert_eq!(adjust_brightness(&img, 130).dimensions(), (200, 160));
        assert_eq!(flip(&img).dimensions(), (200, 160));
    }

    #[test]
    fn flip_reverses_columns() {
        let img = noise(31, 7, 2);
        let flipped = flip(&img);
        for y in 0..7 {
            for x in 0..31 {
                assert_eq!(flipped.get_pixel(x, y), img.get_pixel(30 - x, y));
            }
        }
    }

    #[test]
    fn brightness_saturates() {
        let img = GrayImage::from_raw(4, 1, vec![0, 10, 200, 255]).unwrap();
        let brighter = adjust_brightness(&img, 130).into_raw();
        assert_eq!(brighter, vec![0, 13, 255, 255]);
        let darker = adjust_brightness(&img, 70).into_raw();
        assert_eq!(darker, vec![0, 7, 140, 178]);
    }

    #[test]
    fn brightness_halves_round_to_even() {
        let img = GrayImage::from_raw(3, 1, vec![15, 25, 5]).unwrap();
        // 10.5, 17.5 and 3.5
        let darker = adjust_brightness(&img, 70).into_raw();
        assert_eq!(darker, vec![10, 18, 4]);
    }

    #[test]
    fn rotation_is_deterministic_and_fills_corners() {
        let img = GrayImage::from_pixel(100, 100, Luma([200]));
        let a = rotate(&img, 15.0);
        let b = rotate(&img, 15.0);
        assert_eq!(a, b);
        assert_eq!(a.get_pixel(0, 0)[0], 0);
        assert!(a.get_pixel(50, 50)[0].abs_diff(200) <= 1);
    }

    #[test]
    fn rotation_direction_is_counter_clockwise() {
        // a bright dot right of center moves up for a positive angle
        let mut img = GrayImage::new(101, 101);
        for y in 48..=52 {
            for x in 83..=87 {
                img.put_pixel(x, y, Luma([255]));
            }
        }
        let rotated = rotate(&img, 90.0);
        assert!(rotated.get_pixel(50, 16)[0] > 128);
        assert!(rotated.get_pixel(85, 50)[0] < 128);
    }
}
