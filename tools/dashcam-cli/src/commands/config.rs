//! Show or write the configuration.

use std::path::PathBuf;

use dashcam_common::config::{config_file_path, AppConfig};

pub fn run(config: &AppConfig, path: Option<PathBuf>, init: bool) -> anyhow::Result<()> {
    if init {
        let written = match path {
            Some(path) => config.save_to(&path).map(|()| path)?,
            None => config.save()?,
        };
        println!("Configuration written to {}", written.display());
        return Ok(());
    }

    let path = path.unwrap_or_else(config_file_path);
    println!("# {}", path.display());
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}
