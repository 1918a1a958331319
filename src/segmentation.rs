//! Fixed-grid character segmentation

use crate::error::CaptchaError;
use crate::preprocessing::CleanedBitmap;
use image::{imageops, imageops::FilterType, GrayImage};

/// Side length of every character crop fed to the classifier
pub const CROP_SIZE: u32 = 32;

/// Number of characters in one CAPTCHA
pub const CAPTCHA_LENGTH: usize = 4;

/// One character cell: `CROP_SIZE` x `CROP_SIZE` intensities in [0, 1], row-major
#[derive(Debug, Clone, PartialEq)]
pub struct CharacterCrop {
    pixels: Vec<f32>,
}

impl CharacterCrop {
    /// Resample an arbitrary grayscale cell to the canonical size and scale to [0, 1]
    pub fn from_gray(cell: &GrayImage) -> Self {
        let resized = if cell.dimensions() == (CROP_SIZE, CROP_SIZE) {
            cell.clone()
        } else {
            imageops::resize(cell, CROP_SIZE, CROP_SIZE, FilterType::CatmullRom)
        };

        Self {
            pixels: resized.pixels().map(|p| p.0[0] as f32 / 255.0).collect(),
        }
    }

    pub fn get(&self, x: u32, y: u32) -> f32 {
        self.pixels[(y * CROP_SIZE + x) as usize]
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.pixels
    }
}

/// Splits a cleaned bitmap into equal-width vertical cells
#[derive(Debug, Clone, Copy)]
pub struct Segmenter {
    n_cells: u32,
}

impl Default for Segmenter {
    fn default() -> Self {
        Self {
            n_cells: CAPTCHA_LENGTH as u32,
        }
    }
}

impl Segmenter {
    pub fn new(n_cells: u32) -> Self {
        Self { n_cells }
    }

    /// Cut `bitmap` into `n_cells` crops, left to right
    ///
    /// Cell width is `width / n_cells` (integer division). Up to `n_cells - 1`
    /// trailing columns past `n_cells * cell_width` are dropped without error.
    pub fn segment(&self, bitmap: &CleanedBitmap) -> Result<Vec<CharacterCrop>, CaptchaError> {
        let image = bitmap.as_image();
        let (width, height) = image.dimensions();

        if self.n_cells == 0 {
            return Err(CaptchaError::ShapeMismatch(
                "segmenter needs at least one cell".to_string(),
            ));
        }
        if height == 0 {
            return Err(CaptchaError::ShapeMismatch(
                "bitmap has zero height".to_string(),
            ));
        }

        let cell_width = width / self.n_cells;
        if cell_width == 0 {
            return Err(CaptchaError::ShapeMismatch(format!(
                "bitmap width {} is too narrow for {} cells",
                width, self.n_cells
            )));
        }

        let dropped = width - cell_width * self.n_cells;
        if dropped > 0 {
            tracing::trace!(dropped, width, "trailing columns ignored by segmentation");
        }

        Ok((0..self.n_cells)
            .map(|i| {
                let cell = imageops::crop_imm(image, i * cell_width, 0, cell_width, height).to_image();
                CharacterCrop::from_gray(&cell)
            })
            .collect())
    }
}
