//! Four-digit CAPTCHA recognition
//!
//! [`ImageCleaner`] binarizes a CAPTCHA and strips its line noise with a 3x3
//! opening, [`Segmenter`] cuts the result into four 32x32 cells, and
//! [`DigitClassifier`] scores each cell. [`Trainer`] fits the classifier from
//! images named after their digits; [`Predictor`] runs the whole chain.

pub mod config;
pub mod dataset;
pub mod error;
pub mod model;
pub mod predictor;
pub mod preprocessing;
pub mod segmentation;
pub mod server;
pub mod training;

pub use config::{ServerConfig, TrainConfig};
pub use dataset::{labels_from_identifier, Dataset, LabeledSample};
pub use error::CaptchaError;
pub use model::{argmax, Architecture, ClassifierWeights, DigitClassifier};
pub use predictor::{PredictionResult, Predictor};
pub use preprocessing::{CleanedBitmap, CleanerConfig, ImageCleaner};
pub use segmentation::{CharacterCrop, Segmenter, CAPTCHA_LENGTH, CROP_SIZE};
pub use training::{EpochStats, ShufflePolicy, Trainer, TrainingOutcome};
