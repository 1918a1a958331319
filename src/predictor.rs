use crate::error::CaptchaError;
use crate::model::{argmax, Architecture, ClassifierWeights, DigitClassifier};
use crate::preprocessing::ImageCleaner;
use crate::segmentation::{Segmenter, CAPTCHA_LENGTH};
use candle_core::Device;
use image::DynamicImage;
use serde::Serialize;
use std::fmt;
use std::path::Path;

/// Recognized CAPTCHA: one digit per cell, left to right
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    pub text: String,
    /// Raw classifier scores for each cell
    pub scores: Vec<Vec<f32>>,
}

impl PredictionResult {
    pub fn digits(&self) -> Vec<u8> {
        self.text.bytes().map(|b| b - b'0').collect()
    }
}

impl fmt::Display for PredictionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Clean, segment and classify a whole CAPTCHA
///
/// Holds only immutable state after construction, so one instance can serve
/// concurrent callers.
pub struct Predictor {
    cleaner: ImageCleaner,
    segmenter: Segmenter,
    classifier: DigitClassifier,
}

impl Predictor {
    pub fn new(weights: &ClassifierWeights) -> Result<Self, CaptchaError> {
        let classifier =
            DigitClassifier::from_weights(Architecture::DIGIT_CNN, weights, &Device::Cpu)?;
        Ok(Self {
            cleaner: ImageCleaner::default(),
            segmenter: Segmenter::new(CAPTCHA_LENGTH as u32),
            classifier,
        })
    }

    /// Load the weight artifact at `path`
    pub fn from_file(path: &Path) -> Result<Self, CaptchaError> {
        let weights = ClassifierWeights::load(path, &Device::Cpu)?;
        let predictor = Self::new(&weights)?;
        tracing::info!("Loaded classifier weights from {}", path.display());
        Ok(predictor)
    }

    pub fn predict(&self, image: &DynamicImage) -> Result<PredictionResult, CaptchaError> {
        let bitmap = self.cleaner.clean(image)?;
        let crops = self.segmenter.segment(&bitmap)?;
        let scores = self.classifier.classify_batch(&crops)?;

        let text = scores
            .iter()
            .map(|s| char::from(b'0' + argmax(s) as u8))
            .collect();

        Ok(PredictionResult { text, scores })
    }

    /// Decode an encoded image (PNG, JPEG, ...) and predict
    pub fn predict_bytes(&self, bytes: &[u8]) -> Result<PredictionResult, CaptchaError> {
        let image = image::load_from_memory(bytes)
            .map_err(|e| CaptchaError::ImageDecode(e.to_string()))?;
        self.predict(&image)
    }
}
