use crate::error::CaptchaError;
use image::{DynamicImage, GrayImage, Luma};

/// Convert image to single-channel grayscale
/// Every later step works on one 8-bit channel
///
/// Uses BT.601 luma (0.299 R + 0.587 G + 0.114 B) in 16-bit fixed point,
/// rounded to nearest. Not `DynamicImage::to_luma8`, which weighs with BT.709.
pub fn apply(image: &DynamicImage) -> Result<GrayImage, CaptchaError> {
    if image.width() == 0 || image.height() == 0 {
        return Err(CaptchaError::ShapeMismatch(format!(
            "input image is {}x{}",
            image.width(),
            image.height()
        )));
    }
    let rgb = image.to_rgb8();
    Ok(GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        let [r, g, b] = rgb.get_pixel(x, y).0;
        Luma([luma601(r, g, b)])
    }))
}

fn luma601(r: u8, g: u8, b: u8) -> u8 {
    let weighted = r as u32 * 19595 + g as u32 * 38470 + b as u32 * 7471;
    ((weighted + 0x8000) >> 16) as u8
}
