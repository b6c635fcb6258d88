// Runner configuration loaded from TOML
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{HandleError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunnerConfig {
    /// Lesson ids to run, in order. Empty means all of them.
    pub lessons: Vec<String>,
    pub verbose: bool,
    pub color: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        RunnerConfig {
            lessons: Vec::new(),
            verbose: false,
            color: true,
        }
    }
}

impl RunnerConfig {
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|err| HandleError::io(path, err))?;
        Self::from_toml(&content)
    }
}
