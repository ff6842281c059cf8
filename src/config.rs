use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::models::DEFAULT_SEMANTIC_HIDDEN_DIM;
use crate::{Error, Result};

/// Hyper-parameters shared by the registered models.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelArgs {
    /// Category whose nodes are embedded; metapaths start and end here.
    pub category: String,
    pub in_dim: usize,
    pub hidden_dim: usize,
    pub out_dim: usize,
    /// Attention heads per layer; its length is the number of layers.
    pub num_heads: Vec<usize>,
    pub dropout: f32,
    pub num_layers: Option<usize>,
    pub semantic_hidden_dim: usize,
    pub negative_slope: f64,
}
impl Default for ModelArgs {
    fn default() -> Self {
        Self {
            category: String::new(),
            in_dim: 0,
            hidden_dim: 8,
            out_dim: 0,
            num_heads: vec![8],
            dropout: 0.6,
            num_layers: None,
            semantic_hidden_dim: DEFAULT_SEMANTIC_HIDDEN_DIM,
            negative_slope: 0.2,
        }
    }
}
impl ModelArgs {
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(Error::InvalidConfig(msg));
        if self.category.is_empty() {
            return invalid("category must not be empty".into());
        }
        for (name, value) in [
            ("in_dim", self.in_dim),
            ("hidden_dim", self.hidden_dim),
            ("out_dim", self.out_dim),
            ("semantic_hidden_dim", self.semantic_hidden_dim),
        ] {
            if value == 0 {
                return invalid(format!("{name} must be positive"));
            }
        }
        if self.num_heads.is_empty() || self.num_heads.contains(&0) {
            return invalid(format!("num_heads must be non-empty and positive, got {:?}", self.num_heads));
        }
        if let Some(num_layers) = self.num_layers {
            if num_layers != self.num_heads.len() {
                return invalid(format!(
                    "num_layers is {num_layers} but num_heads has {} entries",
                    self.num_heads.len()
                ));
            }
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return invalid(format!("dropout must be in [0, 1), got {}", self.dropout));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    pub max_epoch: usize,
    pub lr: f64,
    pub weight_decay: f64,
    /// Epochs without validation-loss improvement before stopping.
    pub patience: usize,
    pub progress_bar: bool,
}
impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            max_epoch: 200,
            lr: 0.005,
            weight_decay: 0.001,
            patience: 100,
            progress_bar: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    pub model: String,
    pub args: ModelArgs,
    #[serde(default)]
    pub trainer: TrainerConfig,
}
impl ExperimentConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.args.validate()?;
        Ok(config)
    }
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> ModelArgs {
        ModelArgs {
            category: "author".into(),
            in_dim: 4,
            hidden_dim: 8,
            out_dim: 3,
            num_heads: vec![2],
            dropout: 0.1,
            ..Default::default()
        }
    }

    #[test]
    fn parses_with_defaults() -> Result<()> {
        let config = ExperimentConfig::from_json(
            r#"{
                "model": "HAN",
                "args": {"category": "author", "in_dim": 334, "out_dim": 4, "num_heads": [8]}
            }"#,
        )?;
        assert_eq!(config.model, "HAN");
        assert_eq!(config.args.hidden_dim, 8);
        assert_eq!(config.args.semantic_hidden_dim, 128);
        assert_eq!(config.trainer, TrainerConfig::default());
        Ok(())
    }

    #[test]
    fn rejects_bad_values() {
        assert!(args().validate().is_ok());
        for bad in [
            ModelArgs { num_heads: vec![], ..args() },
            ModelArgs { num_heads: vec![2, 0], ..args() },
            ModelArgs { num_layers: Some(2), ..args() },
            ModelArgs { dropout: 1.0, ..args() },
            ModelArgs { in_dim: 0, ..args() },
            ModelArgs { category: String::new(), ..args() },
        ] {
            assert!(matches!(bad.validate(), Err(Error::InvalidConfig(_))), "{bad:?}");
        }
    }

    #[test]
    fn invalid_json_config_fails_before_building() {
        let err = ExperimentConfig::from_json(r#"{"model": "HAN", "args": {"category": "author"}}"#);
        assert!(matches!(err, Err(Error::InvalidConfig(_))));
        assert!(matches!(ExperimentConfig::from_json("{"), Err(Error::Json(_))));
    }

    #[test]
    fn reads_from_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("han.json");
        let config = ExperimentConfig {
            model: "HAN".into(),
            args: args(),
            trainer: TrainerConfig::default(),
        };
        std::fs::write(&path, serde_json::to_string(&config)?)?;
        assert_eq!(ExperimentConfig::from_file(&path)?, config);
        Ok(())
    }
}
