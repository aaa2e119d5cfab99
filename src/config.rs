use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Deserialize;

use crate::engine::EngineConfig;

#[derive(Parser, Debug)]
#[command(name = "coderun", version, about, long_about = None)]
pub struct CliArgs {
    /// Path to the configuration file
    #[arg(long = "config", short = 'c', global = true)]
    pub config_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Execute one source file and print the result as JSON
    Run {
        /// Source file to execute
        file: PathBuf,

        /// Language tag; inferred from the file extension when omitted
        #[arg(long, short)]
        language: Option<String>,

        /// File whose lines are fed to simulated input calls
        #[arg(long)]
        stdin: Option<PathBuf>,
    },
    /// Serve `POST /execute` over HTTP
    Serve,
}

impl CliArgs {
    /// Load the configuration from `--config`, then the user config dir
    ///
    /// A missing default file is not an error; every field has a default.
    pub fn to_config(&self) -> anyhow::Result<Config> {
        if let Some(path) = &self.config_path {
            return Config::from_file(path);
        }
        match default_config_path() {
            Some(path) if path.is_file() => Config::from_file(&path),
            _ => Ok(Config::default()),
        }
    }
}

fn default_config_path() -> Option<PathBuf> {
    use directories::ProjectDirs;

    let proj_dirs = ProjectDirs::from("", "", "coderun")?;
    Some(proj_dirs.config_dir().join("config.json"))
}

#[derive(Deserialize, Debug, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub engine: EngineConfig,
}

impl Config {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open config {}", path.display()))?;
        let reader = std::io::BufReader::new(file);
        serde_json::from_reader(reader)
            .with_context(|| format!("Failed to parse config {}", path.display()))
    }
}

#[derive(Deserialize, Debug, Default, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_address: Option<String>,
    pub bind_port: Option<u16>,
}

/// Maps a source file extension to a language tag
pub fn language_for(path: &Path) -> String {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_lowercase();
    match extension.as_str() {
        "js" | "mjs" | "cjs" => "javascript".to_string(),
        "py" => "python".to_string(),
        "cc" | "cxx" | "hpp" => "cpp".to_string(),
        "h" => "c".to_string(),
        _ => extension,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_deserialization() {
        let config: Config = serde_json::from_str(
            r#"{
                "server": { "bind_address": "0.0.0.0", "bind_port": 8080 },
                "engine": { "time_limit_ms": 2000, "response_delay_ms": 0 }
            }"#,
        )
        .unwrap();
        assert_eq!(config.server.bind_address, Some("0.0.0.0".to_string()));
        assert_eq!(config.server.bind_port, Some(8080));
        assert_eq!(config.engine.time_limit_ms, 2000);
        assert_eq!(config.engine.response_delay_ms, 0);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.engine.time_limit_ms, 5000);
    }

    #[test]
    fn test_cli_parsing() {
        let cli = CliArgs::parse_from(["coderun", "run", "hello.py", "--stdin", "in.txt"]);
        assert_eq!(
            cli.command,
            Some(Command::Run {
                file: PathBuf::from("hello.py"),
                language: None,
                stdin: Some(PathBuf::from("in.txt")),
            })
        );
        assert!(CliArgs::parse_from(["coderun"]).command.is_none());
    }

    #[test]
    fn test_language_for_extension() {
        assert_eq!(language_for(Path::new("a.js")), "javascript");
        assert_eq!(language_for(Path::new("a.PY")), "python");
        assert_eq!(language_for(Path::new("a.cpp")), "cpp");
        assert_eq!(language_for(Path::new("main.rb")), "rb");
        assert_eq!(language_for(Path::new("Makefile")), "");
    }
}
