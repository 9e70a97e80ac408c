//! Settings of the gradient-descent driver.

use std::path::PathBuf;

use crate::{error::ConfigError, BackpropMode};

pub const DEFAULT_LEARNING_RATE: f64 = 0.001;
pub const DEFAULT_ITERATIONS: usize = 40;
pub const DEFAULT_INPUT_PATH: &str = "housing.csv";

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    /// Step size of `w -= learning_rate * grad`.
    pub learning_rate: f64,
    pub iterations: usize,
    /// Seed for the weight initialization. `None` draws from entropy.
    pub seed: Option<u64>,
    pub mode: BackpropMode,
    pub input: PathBuf,
    /// Where to write the loss graph of the final weights, if anywhere.
    pub dot_output: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            learning_rate: DEFAULT_LEARNING_RATE,
            iterations: DEFAULT_ITERATIONS,
            seed: None,
            mode: BackpropMode::default(),
            input: PathBuf::from(DEFAULT_INPUT_PATH),
            dot_output: None,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.learning_rate.is_finite() || self.learning_rate <= 0. {
            return Err(ConfigError::Validation(format!(
                "learning_rate must be a positive number, got {}",
                self.learning_rate
            )));
        }
        if self.iterations == 0 {
            return Err(ConfigError::Validation(
                "iterations must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        let config = Config::default();
        assert_eq!(config.learning_rate, 0.001);
        assert_eq!(config.iterations, 40);
        assert_eq!(config.mode, BackpropMode::Accumulate);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_bad_learning_rate() {
        for learning_rate in [0., -0.1, f64::NAN, f64::INFINITY] {
            let config = Config {
                learning_rate,
                ..Config::default()
            };
            assert!(matches!(
                config.validate(),
                Err(ConfigError::Validation(_))
            ));
        }
    }

    #[test]
    fn rejects_zero_iterations() {
        let config = Config {
            iterations: 0,
            ..Config::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::Validation(
                "iterations must be greater than 0".to_string()
            ))
        );
    }
}
