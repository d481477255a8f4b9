pub mod dispatch;
pub mod events;
pub mod stack;

use std::path::Path;

use anyhow::Result;
use merit_core::{load_config_from_path, DispatchConfig};

pub(crate) fn load_config(path: Option<&Path>) -> Result<DispatchConfig> {
    match path {
        Some(path) => load_config_from_path(path),
        None => Ok(DispatchConfig::default()),
    }
}

pub(crate) fn display(path: &Path) -> String {
    path.display().to_string()
}
