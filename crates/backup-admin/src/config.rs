use std::path::PathBuf;

use backup_store_s3::S3Config;
use clap::{Parser, Subcommand};

/// Configuration for the backup admin tool.
#[derive(Parser, Debug, Clone)]
#[command(name = "backup-admin")]
#[command(about = "Lists stored backup versions and restores them into the watched directory")]
pub struct Config {
    /// Directory restored files are written into (the watcher's watch directory)
    #[arg(long, default_value = "/mnt/source", env = "SOURCE_DIR")]
    pub source_dir: PathBuf,

    #[command(flatten)]
    pub store: S3Config,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// List stored versions
    List {
        /// Group versions by original file name, oldest first
        #[arg(long)]
        grouped: bool,
    },
    /// Restore a stored version into the source directory
    Restore {
        /// Versioned object key, e.g. report_20251214_133045.pdf
        key: String,

        /// File name to restore as (default: the original name encoded in the key)
        #[arg(long = "as", value_name = "NAME")]
        target_name: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_command() {
        let config = Config::try_parse_from([
            "backup-admin",
            "--store-endpoint",
            "http://localhost:9000",
            "list",
            "--grouped",
        ])
        .unwrap();

        assert_eq!(config.command, Command::List { grouped: true });
        assert_eq!(config.source_dir, PathBuf::from("/mnt/source"));
    }

    #[test]
    fn test_restore_command_with_target_name() {
        let config = Config::try_parse_from([
            "backup-admin",
            "--store-endpoint",
            "http://localhost:9000",
            "--source-dir",
            "/data",
            "restore",
            "report_20251214_133045.pdf",
            "--as",
            "report-old.pdf",
        ])
        .unwrap();

        assert_eq!(
            config.command,
            Command::Restore {
                key: "report_20251214_133045.pdf".to_string(),
                target_name: Some("report-old.pdf".to_string()),
            }
        );
        assert_eq!(config.source_dir, PathBuf::from("/data"));
    }

    #[test]
    fn test_subcommand_required() {
        let result =
            Config::try_parse_from(["backup-admin", "--store-endpoint", "http://localhost:9000"]);
        assert!(result.is_err());
    }
}
