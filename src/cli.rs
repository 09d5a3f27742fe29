use clap::Parser;
use colored::*;
use std::path::PathBuf;

use crate::config::{DEFAULT_CONFIG_PATH, DEFAULT_CREDENTIALS_PATH};
use crate::types::RunReport;

#[derive(Parser, Debug)]
#[command(name = "backhaul")]
#[command(about = "A simple program to backup a folder and shoot it off to the cloud")]
#[command(version)]
pub struct Cli {
    /// If set the folder being backed up will be moved to the trash after upload
    #[arg(short = 't', long = "trash-backup-folder", alias = "trashBackupFolder")]
    pub trash_backup_folder: bool,

    /// Configuration file
    #[arg(long, env = "BACKHAUL_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Bucket credentials file
    #[arg(long, env = "BACKHAUL_CREDENTIALS", default_value = DEFAULT_CREDENTIALS_PATH)]
    pub credentials: PathBuf,

    /// Where archives are staged before upload (defaults to `temp/` next to the binary)
    #[arg(long)]
    pub scratch_dir: Option<PathBuf>,

    /// Download the uploaded archive again and compare SHA-256 digests
    #[arg(long)]
    pub verify: bool,

    /// Log at debug level
    #[arg(short, long)]
    pub verbose: bool,
}

pub struct CliDisplay;

impl CliDisplay {
    pub fn print_report(report: &RunReport) {
        println!(
            "{} Uploaded {} to {}",
            "✓".green().bold(),
            report.source.display().to_string().cyan(),
            report.key.cyan()
        );
        println!("  size:   {} bytes", report.size);
        println!("  sha256: {}", report.sha256.dimmed());
        if report.trashed {
            println!("  {} source folder moved to trash", "→".blue().bold());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults_leave_source_alone() {
        let cli = Cli::try_parse_from(["backhaul"]).unwrap();

        assert!(!cli.trash_backup_folder);
        assert!(!cli.verify);
        assert_eq!(cli.scratch_dir, None);
    }

    #[test]
    fn test_trash_flag_forms() {
        for flag in ["-t", "--trash-backup-folder", "--trashBackupFolder"] {
            let cli = Cli::try_parse_from(["backhaul", flag]).unwrap();
            assert!(cli.trash_backup_folder, "{flag} should enable trashing");
        }
    }

    #[test]
    fn test_rejects_positional_arguments() {
        assert!(Cli::try_parse_from(["backhaul", "run"]).is_err());
    }
}
