use image::GrayImage;

use super::morphology::{BACKGROUND, FOREGROUND};

/// Fixed global threshold: anything darker becomes foreground
pub const DEFAULT_THRESHOLD: u8 = 150;

/// Map every pixel to exactly FOREGROUND or BACKGROUND
///
/// `intensity < threshold` is foreground (0), everything else background (255).
/// No adaptive thresholding: the CAPTCHA source renders digits darker than
/// the fixed cut-off and noise/background lighter.
pub fn apply(mut image: GrayImage, threshold: u8) -> GrayImage {
    for pixel in image.pixels_mut() {
        pixel.0[0] = if pixel.0[0] < threshold {
            FOREGROUND
        } else {
            BACKGROUND
        };
    }
    image
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn test_binarize_output_is_strictly_binary() {
        let img = GrayImage::from_fn(64, 4, |x, _| Luma([(x * 4) as u8]));

        let result = apply(img, DEFAULT_THRESHOLD);

        for pixel in result.pixels() {
            assert!(
                pixel.0[0] == FOREGROUND || pixel.0[0] == BACKGROUND,
                "Expected binary pixel, got {}",
                pixel.0[0]
            );
        }
    }

    #[test]
    fn test_binarize_threshold_boundary() {
        let mut img = GrayImage::new(3, 1);
        img.put_pixel(0, 0, Luma([149]));
        img.put_pixel(1, 0, Luma([150]));
        img.put_pixel(2, 0, Luma([151]));

        let result = apply(img, DEFAULT_THRESHOLD);

        assert_eq!(result.get_pixel(0, 0).0[0], FOREGROUND);
        assert_eq!(result.get_pixel(1, 0).0[0], BACKGROUND);
        assert_eq!(result.get_pixel(2, 0).0[0], BACKGROUND);
    }
}
