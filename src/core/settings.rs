use std::{fs::read_to_string, path::{Path, PathBuf}};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Json struct for server settings
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Settings {
    pub web_port: Option<u16>,

    /// Directory with a prebuilt front-end, `web/` when unset
    pub static_dir: Option<PathBuf>,

    /// Pause before a monkey distribution is revealed
    pub distribution_delay_ms: Option<u64>,
}

impl Settings {
    pub const DEFAULT_PORT: u16 = 28010;

    pub fn load(file: &Path) -> Result<Self> {
        Ok(serde_json::from_str(&read_to_string(file)?)?)
    }

    pub fn port(&self) -> u16 {
        self.web_port.unwrap_or(Self::DEFAULT_PORT)
    }
}
