//! Model tiers offered by the completion gateway
//!
//! The set is closed: the gateway only understands these identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Model tier selected for future sends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ModelTier {
    #[default]
    #[serde(rename = "gpt-3.5-turbo")]
    Gpt35Turbo,
    #[serde(rename = "gpt-4")]
    Gpt4,
    #[serde(rename = "gpt-4-turbo")]
    Gpt4Turbo,
}

impl ModelTier {
    /// Identifier sent on the wire
    pub fn id(self) -> &'static str {
        match self {
            ModelTier::Gpt35Turbo => "gpt-3.5-turbo",
            ModelTier::Gpt4 => "gpt-4",
            ModelTier::Gpt4Turbo => "gpt-4-turbo",
        }
    }

    /// Human-readable label for pickers
    pub fn label(self) -> &'static str {
        match self {
            ModelTier::Gpt35Turbo => "GPT-3.5",
            ModelTier::Gpt4 => "GPT-4",
            ModelTier::Gpt4Turbo => "GPT-4 Turbo",
        }
    }

    /// Look up a tier by its wire identifier
    pub fn from_id(id: &str) -> Option<Self> {
        all_tiers().iter().copied().find(|tier| tier.id() == id)
    }
}

impl fmt::Display for ModelTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// All tiers, in picker order
pub fn all_tiers() -> &'static [ModelTier] {
    &[ModelTier::Gpt35Turbo, ModelTier::Gpt4, ModelTier::Gpt4Turbo]
}
