use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// What a reset does with the event tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeRetention {
    /// Start every iteration from an empty tree.
    #[default]
    Discard,
    /// Keep the tree so that iterations extend it.
    Retain,
}

/// Program model settings, usually loaded from the driver's JSON config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub tree_retention: TreeRetention,
    /// Fail on a resumed actor that does not match the in-progress node.
    /// When off the mismatch is only logged.
    pub strict_actor_check: bool,
    pub max_tree_nodes: Option<usize>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig {
            tree_retention: TreeRetention::Discard,
            strict_actor_check: true,
            max_tree_nodes: None,
        }
    }
}

impl ModelConfig {
    pub fn retaining() -> Self {
        ModelConfig {
            tree_retention: TreeRetention::Retain,
            ..Self::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self, ModelError> {
        let config: ModelConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if self.max_tree_nodes == Some(0) {
            return Err(ModelError::Config(
                "max_tree_nodes must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
