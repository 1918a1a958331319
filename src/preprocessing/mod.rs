//! CAPTCHA image cleaning
//!
//! Grayscale, fixed-threshold binarization, a 3x3 binary opening that deletes
//! the thin noise strokes drawn over the digits, then a crop to the rows that
//! hold the digits.

pub mod pipeline;
pub mod steps;

pub use pipeline::{CleanedBitmap, CleanerConfig, ImageCleaner};
