//! Engine configuration.

use serde::{Deserialize, Serialize};

/// Limits applied by a `Context`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of success steps `simplify` follows.
    pub max_simplify_steps: usize,
    /// Maximum number of passes of a constraint re-validation.
    pub max_check_passes: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_simplify_steps: 10_000,
            max_check_passes: 64,
        }
    }
}
