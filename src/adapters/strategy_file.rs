//! JSON strategy description loader.

use std::fs;
use std::path::Path;

use crate::domain::error::SigtraderError;
use crate::domain::strategy_def::StrategyDef;

/// Read and deserialize a strategy description document. Compilation into a
/// runnable strategy is a separate step (`strategy_def::build_strategy`).
pub fn load_strategy_def(path: &Path) -> Result<StrategyDef, SigtraderError> {
    let content = fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|e| SigtraderError::StrategyParse {
        file: path.display().to_string(),
        reason: e.to_string(),
    })
}
