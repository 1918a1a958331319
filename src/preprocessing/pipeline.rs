use crate::error::CaptchaError;
use image::{DynamicImage, GrayImage};
use std::time::Instant;

use super::steps;
use super::steps::morphology::{StructuringElement, FOREGROUND};

/// Cleaning parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanerConfig {
    /// Intensities below this become foreground
    pub threshold: u8,
    /// Rows kept from the top after the opening
    pub crop_height: u32,
}

impl Default for CleanerConfig {
    fn default() -> Self {
        Self {
            threshold: steps::binarize::DEFAULT_THRESHOLD,
            crop_height: steps::crop::DEFAULT_CROP_HEIGHT,
        }
    }
}

/// Binary mask after opening and cropping
///
/// Every pixel is exactly 0 (digit) or 255 (background), the height equals
/// the cleaner's crop height and at least one foreground pixel is present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanedBitmap(GrayImage);

impl CleanedBitmap {
    pub fn width(&self) -> u32 {
        self.0.width()
    }

    pub fn height(&self) -> u32 {
        self.0.height()
    }

    pub fn as_image(&self) -> &GrayImage {
        &self.0
    }

    #[cfg(test)]
    pub(crate) fn from_mask(mask: GrayImage) -> Self {
        Self(mask)
    }
}

/// Turns a raw CAPTCHA into a [`CleanedBitmap`]
#[derive(Debug, Clone, Default)]
pub struct ImageCleaner {
    config: CleanerConfig,
}

impl ImageCleaner {
    pub fn new(config: CleanerConfig) -> Self {
        Self { config }
    }

    /// Full cleaning: grayscale, binarize, open, crop
    pub fn clean(&self, image: &DynamicImage) -> Result<CleanedBitmap, CaptchaError> {
        let start = Instant::now();

        let opened = self.open(image)?;
        let cropped = self.run_step("crop", || {
            steps::crop::apply(&opened, self.config.crop_height)
        })?;

        if !cropped.pixels().any(|p| p.0[0] == FOREGROUND) {
            return Err(CaptchaError::ShapeMismatch(
                "cleaned bitmap contains no foreground pixels".to_string(),
            ));
        }

        tracing::debug!(
            width = cropped.width(),
            height = cropped.height(),
            time_ms = start.elapsed().as_millis() as u64,
            "image cleaned"
        );

        Ok(CleanedBitmap(cropped))
    }

    /// Grayscale, binarize and open without cropping
    pub fn open(&self, image: &DynamicImage) -> Result<GrayImage, CaptchaError> {
        let element = StructuringElement::SQUARE_3X3;

        let gray = self.run_step("grayscale", || steps::grayscale::apply(image))?;
        let binary = self.run_step("binarize", || {
            Ok(steps::binarize::apply(gray, self.config.threshold))
        })?;
        self.run_step("open", || Ok(steps::morphology::open(&binary, element)))
    }

    fn run_step<F>(&self, name: &str, step_fn: F) -> Result<GrayImage, CaptchaError>
    where
        F: FnOnce() -> Result<GrayImage, CaptchaError>,
    {
        let step_start = Instant::now();
        let result = step_fn()?;
        tracing::trace!(
            step = name,
            time_ms = step_start.elapsed().as_millis() as u64,
            "cleaning step finished"
        );
        Ok(result)
    }
}
