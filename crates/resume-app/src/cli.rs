//! CLI argument definitions for the resume index.
//!
//! Uses `clap` with derive macros for ergonomic argument parsing.
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use resume_core::config::ResumeConfig;

/// Resume index: upload resumes, then search them by meaning.
#[derive(Parser, Debug)]
#[command(name = "resume", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Data directory holding the index and uploaded files.
    #[arg(short = 'd', long = "data-dir", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run the HTTP API server (default).
    Serve {
        /// API server port.
        #[arg(short = 'p', long = "port")]
        port: Option<u16>,
    },
    /// Add documents to the index.
    Ingest {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Print the documents nearest to a free-text query as JSON.
    Search {
        query: String,
        /// Number of results (clamped to `search.max_top_k`).
        #[arg(short = 'k', long = "top-k")]
        top_k: Option<usize>,
    },
    /// Print store statistics as JSON.
    Stats,
}

impl CliArgs {
    /// The subcommand to run; `serve` when none was given.
    pub fn command(&self) -> Command {
        self.command
            .clone()
            .unwrap_or(Command::Serve { port: None })
    }

    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > RESUME_CONFIG env var > ~/.resume-index/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("RESUME_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the API server port.
    ///
    /// Priority: --port flag > RESUME_PORT env var > config file value.
    pub fn resolve_port(&self, config_port: u16) -> u16 {
        if let Some(Command::Serve { port: Some(p) }) = self.command {
            return p;
        }
        if let Ok(val) = std::env::var("RESUME_PORT") {
            if let Ok(p) = val.parse::<u16>() {
                return p;
            }
        }
        config_port
    }

    /// Apply flag and env overrides on top of the loaded configuration.
    pub fn apply_overrides(&self, config: &mut ResumeConfig) {
        if let Some(ref dir) = self.data_dir {
            config.general.data_dir = dir.to_string_lossy().to_string();
        }
        if let Some(ref level) = self.log_level {
            config.general.log_level = level.clone();
        }
        config.general.port = self.resolve_port(config.general.port);
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".resume-index").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".resume-index").join("config.toml");
    }
    PathBuf::from("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_subcommand_means_serve() {
        let args = CliArgs::parse_from(["resume"]);
        assert_eq!(args.command(), Command::Serve { port: None });
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = CliArgs::parse_from(["resume", "stats", "--data-dir", "/tmp/idx", "-l", "debug"]);
        assert_eq!(args.command(), Command::Stats);

        let mut config = ResumeConfig::default();
        args.apply_overrides(&mut config);
        assert_eq!(config.general.data_dir, "/tmp/idx");
        assert_eq!(config.general.log_level, "debug");
    }

    #[test]
    fn test_serve_port_flag_wins() {
        let args = CliArgs::parse_from(["resume", "serve", "--port", "8088"]);
        assert_eq!(args.resolve_port(5000), 8088);
    }

    #[test]
    fn test_search_args() {
        let args = CliArgs::parse_from(["resume", "search", "rust engineer", "-k", "5"]);
        assert_eq!(
            args.command(),
            Command::Search {
                query: "rust engineer".to_string(),
                top_k: Some(5)
            }
        );
    }

    #[test]
    fn test_ingest_requires_files() {
        assert!(CliArgs::try_parse_from(["resume", "ingest"]).is_err());
    }

    #[test]
    fn test_explicit_config_path() {
        let args = CliArgs::parse_from(["resume", "-c", "/etc/resume.toml"]);
        assert_eq!(args.resolve_config_path(), PathBuf::from("/etc/resume.toml"));
    }
}
