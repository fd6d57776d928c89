// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `composewatch`.
#[derive(Debug, Clone, Default, Parser)]
#[command(
    name = "composewatch",
    version,
    about = "Rebuild bundles, images and the compose stack as sources change.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the docker-compose file.
    ///
    /// Overrides `[project].compose_file` from the config file.
    #[arg(long, short = 'f', value_name = "PATH")]
    pub compose_file: Option<PathBuf>,

    /// Path to the project config file (TOML).
    ///
    /// Default: `composewatch.toml` in the current working directory, if it
    /// exists.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Project name, used to namespace temporary folders and logs.
    #[arg(long, value_name = "NAME")]
    pub name: Option<String>,

    /// Destination folder template for build output.
    ///
    /// Supports `#APPLICATION_NAME#`, `#TASK_NAME#`, `#TASK_FOLDER#`,
    /// `#MODE_NAME#` and `#CONTEXT_ID#`.
    #[arg(long, value_name = "TEMPLATE")]
    pub destination_folder: Option<String>,

    /// Build in production mode.
    #[arg(long)]
    pub production: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `COMPOSEWATCH_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print applications and tasks, but don't build anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Skip the full build that normally runs before watching starts.
    #[arg(long)]
    pub no_initial_build: bool,

    /// Build every task and image once, then exit without watching.
    #[arg(long)]
    pub once: bool,

    /// Push images after a `--once` build.
    #[arg(long, requires = "once")]
    pub push: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_requires_once() {
        assert!(CliArgs::try_parse_from(["composewatch", "--push"]).is_err());

        let args = CliArgs::try_parse_from(["composewatch", "--once", "--push"]).unwrap();
        assert!(args.once && args.push);
    }

    #[test]
    fn compose_file_has_short_flag() {
        let args = CliArgs::try_parse_from(["composewatch", "-f", "docker/compose.yml"]).unwrap();
        assert_eq!(args.compose_file, Some(PathBuf::from("docker/compose.yml")));
    }
}
