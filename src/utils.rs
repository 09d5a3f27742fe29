use anyhow::{Result, anyhow};
use colored::*;
use std::path::PathBuf;

/// Format error for display
pub fn format_error(err: &anyhow::Error) -> String {
    format!("{} {}", "✗".red().bold(), format!("{:#}", err).red())
}

/// Directory holding the running executable
pub fn executable_dir() -> Result<PathBuf> {
    let exe = std::env::current_exe()?;
    let exe = exe.canonicalize().unwrap_or(exe);
    exe.parent()
        .map(|dir| dir.to_path_buf())
        .ok_or_else(|| anyhow!("Could not determine executable directory"))
}

/// Path to `name` next to the executable
pub fn build_local_path(name: &str) -> Result<PathBuf> {
    Ok(executable_dir()?.join(name))
}
