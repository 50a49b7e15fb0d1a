use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use serde::Deserialize;

use crate::buf::{HeapPool, BUFFER_SIZE};
use crate::error::Result;
use crate::scratch::TempFileScratch;

// Defaults for anything the command line leaves unset
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields, default)]
pub struct Config {
    pub prefix: Option<String>,

    /// Where detached parts spill to, system temp dir if unset
    pub temp_dir: Option<PathBuf>,

    pub buffer_size: usize,

    /// Read parts as live windows into the pack file instead of copying
    pub attached: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            prefix: None,
            temp_dir: None,
            buffer_size: BUFFER_SIZE,
            attached: false,
        }
    }
}

impl Config {
    pub fn load(path: Option<&Path>) -> Result<Config> {
        match path {
            None => Ok(Config::default()),
            Some(path) => {
                debug!("loading config from {:?}", path);
                Config::parse(&fs::read_to_string(path)?)
            },
        }
    }

    pub fn parse(text: &str) -> Result<Config> {
        Ok(toml::from_str(text)?)
    }

    pub fn pool(&self) -> HeapPool {
        HeapPool::new(self.buffer_size)
    }

    pub fn scratch(&self) -> TempFileScratch {
        TempFileScratch::new(self.temp_dir.clone())
    }
}
