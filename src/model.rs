//! Digit classifier: a two-block CNN over 32x32 character crops

use crate::error::CaptchaError;
use crate::segmentation::{CharacterCrop, CROP_SIZE};
use candle_core::{DType, Device, Tensor};
use candle_nn::{Conv2d, Conv2dConfig, Linear, Module, VarBuilder, VarMap};
use rand::Rng;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Layer sizes of the classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Architecture {
    pub conv1_channels: usize,
    pub conv2_channels: usize,
    pub kernel_size: usize,
    pub hidden_units: usize,
    pub num_classes: usize,
    /// Side length of the square input
    pub input_size: usize,
}

impl Architecture {
    /// conv(1->16) pool, conv(16->32) pool, fc(2048->128), fc(128->10)
    pub const DIGIT_CNN: Self = Self {
        conv1_channels: 16,
        conv2_channels: 32,
        kernel_size: 3,
        hidden_units: 128,
        num_classes: 10,
        input_size: CROP_SIZE as usize,
    };

    /// Length of the vector entering the first fully connected layer
    ///
    /// Two 2x2 max-pools quarter each spatial side.
    pub fn flattened_features(&self) -> usize {
        let side = self.input_size / 4;
        self.conv2_channels * side * side
    }

    /// Every parameter tensor with its expected shape
    pub fn parameter_shapes(&self) -> Vec<(&'static str, Vec<usize>)> {
        let k = self.kernel_size;
        vec![
            ("conv1.weight", vec![self.conv1_channels, 1, k, k]),
            ("conv1.bias", vec![self.conv1_channels]),
            ("conv2.weight", vec![self.conv2_channels, self.conv1_channels, k, k]),
            ("conv2.bias", vec![self.conv2_channels]),
            ("fc1.weight", vec![self.hidden_units, self.flattened_features()]),
            ("fc1.bias", vec![self.hidden_units]),
            ("fc2.weight", vec![self.num_classes, self.hidden_units]),
            ("fc2.bias", vec![self.num_classes]),
        ]
    }

    /// Fan-in per layer prefix, used to scale initial parameters
    fn fan_in(&self) -> [(&'static str, usize); 4] {
        let k2 = self.kernel_size * self.kernel_size;
        [
            ("conv1", k2),
            ("conv2", self.conv1_channels * k2),
            ("fc1", self.flattened_features()),
            ("fc2", self.hidden_units),
        ]
    }
}

impl Default for Architecture {
    fn default() -> Self {
        Self::DIGIT_CNN
    }
}

/// Trained parameter set, persisted as one safetensors file
#[derive(Debug, Clone)]
pub struct ClassifierWeights {
    tensors: HashMap<String, Tensor>,
}

impl ClassifierWeights {
    /// Snapshot the variables of a training run
    pub fn from_varmap(varmap: &VarMap) -> Result<Self, CaptchaError> {
        let data = varmap
            .data()
            .lock()
            .map_err(|_| CaptchaError::Model("variable map lock poisoned".to_string()))?;

        let tensors = data
            .iter()
            .map(|(name, var)| -> Result<(String, Tensor), CaptchaError> {
                Ok((name.clone(), var.as_tensor().copy()?))
            })
            .collect::<Result<HashMap<_, _>, _>>()?;

        Ok(Self { tensors })
    }

    /// Read a weight file written by [`ClassifierWeights::save`]
    pub fn load(path: &Path, device: &Device) -> Result<Self, CaptchaError> {
        if !path.is_file() {
            return Err(CaptchaError::MissingWeights(format!(
                "no weight file at {}",
                path.display()
            )));
        }

        let tensors = candle_core::safetensors::load(path, device).map_err(|e| {
            CaptchaError::MissingWeights(format!("failed to read {}: {}", path.display(), e))
        })?;

        Ok(Self { tensors })
    }

    /// Write all tensors to `path`
    ///
    /// The file is written as `<path>.partial` and renamed into place, so
    /// readers never observe a partially written artifact. The temporary file
    /// is removed if either step fails.
    pub fn save(&self, path: &Path) -> Result<(), CaptchaError> {
        let mut partial = path.as_os_str().to_owned();
        partial.push(".partial");
        let partial = PathBuf::from(partial);

        let written = candle_core::safetensors::save(&self.tensors, &partial)
            .map_err(CaptchaError::from)
            .and_then(|()| std::fs::rename(&partial, path).map_err(CaptchaError::from));
        if let Err(e) = written {
            let _ = std::fs::remove_file(&partial);
            return Err(e);
        }

        tracing::info!("Classifier weights written to {}", path.display());
        Ok(())
    }

    /// Check that every parameter of `arch` is present with the right shape
    pub fn validate(&self, arch: &Architecture) -> Result<(), CaptchaError> {
        for (name, shape) in arch.parameter_shapes() {
            let tensor = self.tensors.get(name).ok_or_else(|| {
                CaptchaError::MissingWeights(format!("tensor '{}' not found", name))
            })?;
            if tensor.dims() != shape.as_slice() {
                return Err(CaptchaError::MissingWeights(format!(
                    "tensor '{}' has shape {:?}, expected {:?}",
                    name,
                    tensor.dims(),
                    shape
                )));
            }
        }
        Ok(())
    }
}

/// The convolutional digit classifier
///
/// Produces raw scores (logits); no softmax is applied at inference.
pub struct DigitClassifier {
    conv1: Conv2d,
    conv2: Conv2d,
    fc1: Linear,
    fc2: Linear,
    arch: Architecture,
    device: Device,
}

impl DigitClassifier {
    /// Build the layers, creating or fetching parameters through `vb`
    pub fn new(arch: Architecture, vb: VarBuilder) -> Result<Self, CaptchaError> {
        let conv_cfg = Conv2dConfig {
            padding: arch.kernel_size / 2,
            ..Default::default()
        };
        let conv1 = candle_nn::conv2d(
            1,
            arch.conv1_channels,
            arch.kernel_size,
            conv_cfg,
            vb.pp("conv1"),
        )?;
        let conv2 = candle_nn::conv2d(
            arch.conv1_channels,
            arch.conv2_channels,
            arch.kernel_size,
            conv_cfg,
            vb.pp("conv2"),
        )?;
        let fc1 = candle_nn::linear(arch.flattened_features(), arch.hidden_units, vb.pp("fc1"))?;
        let fc2 = candle_nn::linear(arch.hidden_units, arch.num_classes, vb.pp("fc2"))?;

        Ok(Self {
            conv1,
            conv2,
            fc1,
            fc2,
            arch,
            device: vb.device().clone(),
        })
    }

    /// Classifier backed by a previously trained weight set
    pub fn from_weights(
        arch: Architecture,
        weights: &ClassifierWeights,
        device: &Device,
    ) -> Result<Self, CaptchaError> {
        weights.validate(&arch)?;
        let vb = VarBuilder::from_tensors(weights.tensors.clone(), DType::F32, device);
        Self::new(arch, vb)
    }

    /// Overwrite the parameters in `varmap` with draws from `rng`
    ///
    /// Weights and biases of each layer are uniform in ±1/sqrt(fan_in).
    pub fn initialize<R: Rng>(
        &self,
        varmap: &VarMap,
        rng: &mut R,
    ) -> Result<(), CaptchaError> {
        let data = varmap
            .data()
            .lock()
            .map_err(|_| CaptchaError::Model("variable map lock poisoned".to_string()))?;
        let fan_in: HashMap<_, _> = self.arch.fan_in().into_iter().collect();

        for (name, shape) in self.arch.parameter_shapes() {
            let layer = name.split('.').next().unwrap_or(name);
            let bound = 1.0 / (fan_in[layer] as f32).sqrt();
            let var = data.get(name).ok_or_else(|| {
                CaptchaError::Model(format!("parameter '{}' was never created", name))
            })?;

            let count: usize = shape.iter().product();
            let values: Vec<f32> = (0..count).map(|_| rng.random_range(-bound..bound)).collect();
            var.set(&Tensor::from_vec(values, shape, &self.device)?)?;
        }
        Ok(())
    }

    /// Score one crop: `num_classes` raw scores
    pub fn classify(&self, crop: &CharacterCrop) -> Result<Vec<f32>, CaptchaError> {
        let mut scores = self.classify_batch(std::slice::from_ref(crop))?;
        scores
            .pop()
            .ok_or_else(|| CaptchaError::Model("classifier returned no scores".to_string()))
    }

    /// Score several crops in one forward pass, preserving order
    pub fn classify_batch(&self, crops: &[CharacterCrop]) -> Result<Vec<Vec<f32>>, CaptchaError> {
        let input = crops_to_tensor(crops.iter(), &self.device)?;
        let logits = self.forward(&input)?;
        Ok(logits.to_vec2::<f32>()?)
    }
}

impl Module for DigitClassifier {
    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let xs = self.conv1.forward(xs)?.relu()?.max_pool2d(2)?;
        let xs = self.conv2.forward(&xs)?.relu()?.max_pool2d(2)?;
        let xs = xs.flatten_from(1)?;
        let xs = self.fc1.forward(&xs)?.relu()?;
        self.fc2.forward(&xs)
    }
}

/// Stack crops into an `(n, 1, 32, 32)` input tensor
pub fn crops_to_tensor<'a, I>(crops: I, device: &Device) -> candle_core::Result<Tensor>
where
    I: IntoIterator<Item = &'a CharacterCrop>,
{
    let side = CROP_SIZE as usize;
    let mut data = Vec::new();
    let mut count = 0;
    for crop in crops {
        data.extend_from_slice(crop.as_slice());
        count += 1;
    }
    Tensor::from_vec(data, (count, 1, side, side), device)
}

/// Index of the highest score; ties go to the lowest index
pub fn argmax(scores: &[f32]) -> usize {
    let mut best = 0;
    for (i, &score) in scores.iter().enumerate().skip(1) {
        if score > scores[best] {
            best = i;
        }
    }
    best
}
