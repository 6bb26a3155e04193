//! Configuration files: a simulation [`Configuration`] tagged with the trait
//! model it is written for.

use anyhow::{Context, Result};
use evodyn_sim::model::{ConstantSelection, ContinuousSnowdrift, MatrixGame, PublicGoods};
use evodyn_sim::simulation::{Configuration, ExecutionConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum RunConfig {
    Matrix(Configuration<MatrixGame>),
    Constant(Configuration<ConstantSelection>),
    PublicGoods(Configuration<PublicGoods>),
    ContinuousSnowdrift(Configuration<ContinuousSnowdrift>),
}

/// Evaluate `$body` with `$c` bound to the typed configuration.
macro_rules! dispatch {
    ($config:expr, $c:ident => $body:expr) => {
        match $config {
            $crate::config::RunConfig::Matrix($c) => $body,
            $crate::config::RunConfig::Constant($c) => $body,
            $crate::config::RunConfig::PublicGoods($c) => $body,
            $crate::config::RunConfig::ContinuousSnowdrift($c) => $body,
        }
    };
}
pub(crate) use dispatch;

impl RunConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse configuration {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)
            .with_context(|| format!("Failed to write configuration {}", path.display()))
    }

    pub fn model_name(&self) -> &'static str {
        match self {
            Self::Matrix(_) => "matrix game",
            Self::Constant(_) => "constant selection",
            Self::PublicGoods(_) => "public goods",
            Self::ContinuousSnowdrift(_) => "continuous snowdrift",
        }
    }

    pub fn execution_mut(&mut self) -> &mut ExecutionConfig {
        dispatch!(self, c => &mut c.execution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evodyn_sim::simulation::SpeciesConfig;

    #[test]
    fn test_tagged_roundtrip() {
        let cfg = RunConfig::PublicGoods(Configuration::single(SpeciesConfig::new(
            "pgg",
            16,
            PublicGoods::new(3.0, 1.0).unwrap(),
        )));
        let json = serde_json::to_string(&cfg).unwrap();
        assert!(json.contains("\"model\":\"public_goods\""));
        let back: RunConfig = serde_json::from_str(&json).unwrap();
        assert!(matches!(back, RunConfig::PublicGoods(c) if c.species[0].size == 16));
    }

    #[test]
    fn test_minimal_file() {
        let json = r#"{
            "model": "matrix",
            "execution": { "seed": 5 },
            "species": [
                { "name": "pd", "size": 16, "model": { "payoffs": [[2.0, -1.0], [3.0, 0.0]] } }
            ]
        }"#;
        let mut cfg: RunConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.model_name(), "matrix game");
        assert_eq!(cfg.execution_mut().seed, Some(5));
    }

    #[test]
    fn test_unknown_model_rejected() {
        let json = r#"{ "model": "chess", "execution": {}, "species": [] }"#;
        assert!(serde_json::from_str::<RunConfig>(json).is_err());
    }
}
