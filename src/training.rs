//! Mini-batch training of the digit classifier

use crate::config::TrainConfig;
use crate::dataset::Dataset;
use crate::error::CaptchaError;
use crate::model::{crops_to_tensor, Architecture, ClassifierWeights, DigitClassifier};
use candle_core::{DType, Device, Tensor, D};
use candle_nn::{AdamW, Module, Optimizer, ParamsAdamW, VarBuilder, VarMap};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;
use std::time::Instant;

/// Source of randomness for sample shuffling and parameter initialisation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShufflePolicy {
    /// Same order (and initial weights) on every run
    Seeded(u64),
    /// Fresh OS entropy per run
    Entropy,
}

impl ShufflePolicy {
    pub fn from_seed(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::Seeded(seed),
            None => Self::Entropy,
        }
    }

    pub fn rng(&self) -> StdRng {
        match self {
            Self::Seeded(seed) => StdRng::seed_from_u64(*seed),
            Self::Entropy => StdRng::from_os_rng(),
        }
    }
}

/// Loss and accuracy of one pass over the dataset
#[derive(Debug, Clone, Serialize)]
pub struct EpochStats {
    pub epoch: usize,
    /// Sum of the mean batch losses
    pub loss: f32,
    /// Correct argmax predictions over samples seen
    pub accuracy: f32,
    pub samples: usize,
}

/// Weights produced by a run plus its per-epoch history
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub weights: ClassifierWeights,
    pub history: Vec<EpochStats>,
}

impl TrainingOutcome {
    pub fn final_accuracy(&self) -> f32 {
        self.history.last().map(|s| s.accuracy).unwrap_or(0.0)
    }
}

/// Fits a fresh [`DigitClassifier`] with Adam and cross-entropy
///
/// Fixed schedule: every epoch reshuffles the whole dataset and walks it in
/// mini-batches (the last one may be short). No validation split, early
/// stopping or learning-rate decay.
pub struct Trainer {
    config: TrainConfig,
    shuffle: ShufflePolicy,
    arch: Architecture,
    device: Device,
}

impl Trainer {
    pub fn new(config: TrainConfig, shuffle: ShufflePolicy) -> Self {
        Self {
            config,
            shuffle,
            arch: Architecture::DIGIT_CNN,
            device: Device::Cpu,
        }
    }

    /// Trainer whose shuffle policy comes from the config seed
    pub fn from_config(config: TrainConfig) -> Self {
        let shuffle = ShufflePolicy::from_seed(config.seed);
        Self::new(config, shuffle)
    }

    pub fn train(&self, dataset: &Dataset) -> Result<TrainingOutcome, CaptchaError> {
        self.config.validate()?;
        if dataset.is_empty() {
            return Err(CaptchaError::EmptyDataset(
                "refusing to train on zero samples".to_string(),
            ));
        }

        let mut rng = self.shuffle.rng();
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &self.device);
        let model = DigitClassifier::new(self.arch, vb)?;
        model.initialize(&varmap, &mut rng)?;

        let mut optimizer = AdamW::new(
            varmap.all_vars(),
            ParamsAdamW {
                lr: self.config.learning_rate,
                weight_decay: 0.0,
                ..Default::default()
            },
        )?;

        tracing::info!(
            samples = dataset.len(),
            epochs = self.config.epochs,
            batch_size = self.config.batch_size,
            learning_rate = self.config.learning_rate,
            "Starting training"
        );

        let samples = dataset.samples();
        let mut order: Vec<usize> = (0..samples.len()).collect();
        let mut history = Vec::with_capacity(self.config.epochs);

        for epoch in 1..=self.config.epochs {
            let start = Instant::now();
            order.shuffle(&mut rng);

            let mut total_loss = 0.0f32;
            let mut correct = 0usize;
            let mut seen = 0usize;

            for batch in order.chunks(self.config.batch_size) {
                let input = crops_to_tensor(batch.iter().map(|&i| &samples[i].crop), &self.device)?;
                let labels =
                    Tensor::from_iter(batch.iter().map(|&i| samples[i].label as u32), &self.device)?;

                let logits = model.forward(&input)?;
                let loss = candle_nn::loss::cross_entropy(&logits, &labels)?;
                optimizer.backward_step(&loss)?;

                total_loss += loss.to_scalar::<f32>()?;
                correct += logits
                    .argmax(D::Minus1)?
                    .eq(&labels)?
                    .to_dtype(DType::U32)?
                    .sum_all()?
                    .to_scalar::<u32>()? as usize;
                seen += batch.len();
            }

            let stats = EpochStats {
                epoch,
                loss: total_loss,
                accuracy: correct as f32 / seen as f32,
                samples: seen,
            };
            tracing::info!(
                "[{}/{}]  loss={:.4}  acc={:.4}  ({}ms)",
                epoch,
                self.config.epochs,
                stats.loss,
                stats.accuracy,
                start.elapsed().as_millis()
            );
            history.push(stats);
        }

        Ok(TrainingOutcome {
            weights: ClassifierWeights::from_varmap(&varmap)?,
            history,
        })
    }
}
