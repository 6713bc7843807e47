use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::SimplifyError;


pub const CONFIG_FILE: &str = "jsinn.toml";

/// Tunables of the rewrite engine and the equivalence checker.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Upper bound on rewrite passes per unit.
    pub max_passes: u32,
    /// Interpreter steps allowed per fixture run.
    pub step_budget: u64,
    pub max_call_depth: u32,
    /// Longest string a constant `JSON.stringify` may fold into.
    pub fold_threshold: usize,
    /// Body fields every handler requires. Empty means infer from the unit.
    pub required_fields: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_passes: 50,
            step_budget: 20_000,
            max_call_depth: 64,
            fold_threshold: 96,
            required_fields: Vec::new(),
        }
    }
}

/// Shape of a jsinn.toml file. Tables other than `[simplify]` belong to
/// other tools and are ignored.
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    simplify: EngineConfig,
}

impl EngineConfig {
    /// Load the `[simplify]` table of a jsinn.toml file. Keys that are
    /// absent keep their defaults.
    pub fn load(toml_path: &Path) -> Result<EngineConfig, SimplifyError> {
        let content = std::fs::read_to_string(toml_path).map_err(|e| {
            SimplifyError::Config(format!("cannot read '{}': {}", toml_path.display(), e))
        })?;
        Self::from_toml(&content).map_err(|e| SimplifyError::Config(format!("{}: {}", toml_path.display(), e)))
    }

    pub fn parse(content: &str) -> Result<EngineConfig, SimplifyError> {
        Self::from_toml(content).map_err(SimplifyError::Config)
    }

    fn from_toml(content: &str) -> Result<EngineConfig, String> {
        let file: ConfigFile = toml::from_str(content).map_err(|e| e.to_string())?;
        file.simplify.validate()?;
        Ok(file.simplify)
    }

    fn validate(&self) -> Result<(), String> {
        if self.max_passes == 0 {
            return Err("max_passes must be at least 1".to_string());
        }
        if self.step_budget == 0 || self.max_call_depth == 0 {
            return Err("step_budget and max_call_depth must be positive".to_string());
        }
        Ok(())
    }

    /// Try to find a jsinn.toml in the given directory or its ancestors.
    pub fn find(start_dir: &Path) -> Option<PathBuf> {
        let mut dir = start_dir.to_path_buf();
        loop {
            let candidate = dir.join(CONFIG_FILE);
            if candidate.exists() {
                return Some(candidate);
            }
            if !dir.pop() {
                return None;
            }
        }
    }

    /// Config from the nearest jsinn.toml, or defaults when there is none.
    pub fn discover(start_dir: &Path) -> Result<EngineConfig, SimplifyError> {
        match Self::find(start_dir) {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }
}
