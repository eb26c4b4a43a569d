//! Config command: show where the config lives and what is in effect.

use anyhow::Result;
use fetchq_core::config::{self, FetchqConfig};

pub fn run_config(cfg: &FetchqConfig) -> Result<()> {
    println!("# {}", config::config_path()?.display());
    print!("{}", cfg.to_toml()?);
    Ok(())
}
