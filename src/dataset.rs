//! Labeled character samples built from named CAPTCHA images
//!
//! A training image is named after the digits it shows (`0193.png`); the first
//! four characters of the name are the ground truth for the four cells.

use crate::error::CaptchaError;
use crate::preprocessing::ImageCleaner;
use crate::segmentation::{CharacterCrop, Segmenter, CAPTCHA_LENGTH};
use image::DynamicImage;
use rayon::prelude::*;
use std::path::{Path, PathBuf};

/// File extensions picked up when scanning a corpus directory
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "gif"];

/// Digit labels encoded in an image name
///
/// Directory components and everything from the first `.` on are ignored; the
/// first four remaining characters must all be ASCII digits.
pub fn labels_from_identifier(name: &str) -> Result<[u8; CAPTCHA_LENGTH], CaptchaError> {
    let malformed = || CaptchaError::MalformedLabel {
        identifier: name.to_string(),
    };

    let file_name = Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(malformed)?;
    let stem = file_name.split('.').next().unwrap_or_default();

    let mut labels = [0u8; CAPTCHA_LENGTH];
    let mut chars = stem.chars();
    for label in labels.iter_mut() {
        let digit = chars
            .next()
            .and_then(|c| c.to_digit(10))
            .ok_or_else(malformed)?;
        *label = digit as u8;
    }
    Ok(labels)
}

/// One character crop with its ground-truth digit
#[derive(Debug, Clone)]
pub struct LabeledSample {
    pub crop: CharacterCrop,
    pub label: u8,
}

/// Samples in insertion order: image by image, cells left to right
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    samples: Vec<LabeledSample>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan `dir` for images and turn each into four labeled samples
    ///
    /// Files are processed in path order. Every name is checked before any
    /// image is decoded, so a malformed name aborts the build up front.
    pub fn from_dir(dir: &Path, cleaner: &ImageCleaner) -> Result<Self, CaptchaError> {
        let entries = std::fs::read_dir(dir)?.collect::<Result<Vec<_>, _>>()?;
        let mut paths: Vec<PathBuf> = entries
            .into_iter()
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && has_image_extension(path))
            .collect();
        paths.sort();

        if paths.is_empty() {
            return Err(CaptchaError::EmptyDataset(format!(
                "no images found in {}",
                dir.display()
            )));
        }

        let labeled = paths
            .into_iter()
            .map(|path| -> Result<(PathBuf, [u8; CAPTCHA_LENGTH]), CaptchaError> {
                let labels = labels_from_identifier(&path.to_string_lossy())?;
                Ok((path, labels))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let segmenter = Segmenter::default();
        let per_image = labeled
            .par_iter()
            .map(|(path, labels)| -> Result<Vec<LabeledSample>, CaptchaError> {
                let image = image::open(path).map_err(|e| {
                    CaptchaError::ImageDecode(format!("{}: {}", path.display(), e))
                })?;
                image_samples(&image, labels, cleaner, &segmenter)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let dataset = Self {
            samples: per_image.into_iter().flatten().collect(),
        };
        tracing::info!(
            "Loaded {} samples from {} images in {}",
            dataset.len(),
            labeled.len(),
            dir.display()
        );
        Ok(dataset)
    }

    /// Build from in-memory `(name, image)` pairs, in the given order
    pub fn from_images<'a, I>(images: I, cleaner: &ImageCleaner) -> Result<Self, CaptchaError>
    where
        I: IntoIterator<Item = (&'a str, &'a DynamicImage)>,
    {
        let mut dataset = Self::new();
        for (name, image) in images {
            dataset.push_image(name, image, cleaner)?;
        }
        Ok(dataset)
    }

    /// Append the four samples of one named image
    pub fn push_image(
        &mut self,
        name: &str,
        image: &DynamicImage,
        cleaner: &ImageCleaner,
    ) -> Result<(), CaptchaError> {
        let labels = labels_from_identifier(name)?;
        let samples = image_samples(image, &labels, cleaner, &Segmenter::default())?;
        self.samples.extend(samples);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[LabeledSample] {
        &self.samples
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn image_samples(
    image: &DynamicImage,
    labels: &[u8; CAPTCHA_LENGTH],
    cleaner: &ImageCleaner,
    segmenter: &Segmenter,
) -> Result<Vec<LabeledSample>, CaptchaError> {
    let bitmap = cleaner.clean(image)?;
    let crops = segmenter.segment(&bitmap)?;
    Ok(crops
        .into_iter()
        .zip(labels.iter())
        .map(|(crop, &label)| LabeledSample { crop, label })
        .collect())
}
