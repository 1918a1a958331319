use crate::error::CaptchaError;
use std::path::PathBuf;

/// Training hyper-parameters
#[derive(Debug, Clone, PartialEq)]
pub struct TrainConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    /// Seed for shuffling and initialisation; `None` draws from the OS
    pub seed: Option<u64>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            epochs: 15,
            batch_size: 64,
            learning_rate: 0.001,
            seed: None,
        }
    }
}

impl TrainConfig {
    pub fn validate(&self) -> Result<(), CaptchaError> {
        if self.epochs == 0 {
            return Err(CaptchaError::InvalidConfig(
                "epochs must be at least 1".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(CaptchaError::InvalidConfig(
                "batch size must be at least 1".to_string(),
            ));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(CaptchaError::InvalidConfig(format!(
                "learning rate must be a positive number, got {}",
                self.learning_rate
            )));
        }
        Ok(())
    }
}

/// Inference server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_file_size: usize,
    pub weights_path: PathBuf,
}
