use crate::error::CaptchaError;
use image::{imageops, GrayImage};

/// Rows kept from the top of every CAPTCHA; the digits never reach below
pub const DEFAULT_CROP_HEIGHT: u32 = 40;

/// Keep the first `height` rows, full width
pub fn apply(image: &GrayImage, height: u32) -> Result<GrayImage, CaptchaError> {
    if image.height() < height {
        return Err(CaptchaError::ShapeMismatch(format!(
            "image has {} rows, at least {} required",
            image.height(),
            height
        )));
    }
    Ok(imageops::crop_imm(image, 0, 0, image.width(), height).to_image())
}
