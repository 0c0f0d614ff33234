use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_INTERVAL_SECS: u64 = 3600;
const DEFAULT_USER: &str = "default";

#[derive(Debug, Deserialize, Clone)]
#[serde(untagged)]
enum StringOrVec {
    String(String),
    Vec(Vec<String>),
}

impl StringOrVec {
    fn into_vec(self) -> Vec<String> {
        match self {
            StringOrVec::String(value) => value
                .split(',')
                .map(|item| item.trim().to_string())
                .filter(|item| !item.is_empty())
                .collect(),
            StringOrVec::Vec(values) => values
                .into_iter()
                .map(|item| item.trim().to_string())
                .filter(|item| !item.is_empty())
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
struct LadderYaml {
    replay_file: Option<String>,
    backtest_mode: Option<bool>,
    users: Option<StringOrVec>,
    interval_secs: Option<u64>,
    store_dir: Option<String>,
    status_file: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LadderConfig {
    /// JSONL file with the two daily series; required in replay mode.
    pub replay_file: Option<String>,
    pub backtest_mode: bool,
    /// Users whose backlogs the service loop processes each tick.
    pub users: Vec<String>,
    pub interval_secs: u64,
    /// Book snapshots land here, one file per user. Unset = in-memory only.
    pub store_dir: Option<PathBuf>,
    pub status_file: Option<PathBuf>,
}

impl LadderConfig {
    pub fn from_env_or_yaml() -> Result<Self> {
        match env::var("LADDER_CONFIG") {
            Ok(path) if !path.trim().is_empty() => Self::from_yaml_path(path.trim()),
            _ => Self::from_env(),
        }
    }

    pub fn from_yaml_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = fs::read_to_string(path.as_ref())
            .with_context(|| format!("failed to read config file {}", path.as_ref().display()))?;
        let yaml: LadderYaml = serde_yaml::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.as_ref().display()))?;

        let mut cfg = LadderConfig {
            replay_file: yaml.replay_file,
            backtest_mode: yaml.backtest_mode.unwrap_or(false),
            users: yaml
                .users
                .map(StringOrVec::into_vec)
                .unwrap_or_else(|| vec![DEFAULT_USER.to_string()]),
            interval_secs: yaml.interval_secs.unwrap_or(DEFAULT_INTERVAL_SECS),
            store_dir: yaml.store_dir.map(PathBuf::from),
            status_file: yaml.status_file.map(PathBuf::from),
        };
        cfg.apply_env_overrides()?;
        Ok(cfg)
    }

    pub fn from_env() -> Result<Self> {
        let mut cfg = LadderConfig {
            replay_file: None,
            backtest_mode: false,
            users: vec![DEFAULT_USER.to_string()],
            interval_secs: DEFAULT_INTERVAL_SECS,
            store_dir: None,
            status_file: None,
        };
        cfg.apply_env_overrides()?;
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(value) = env::var("REPLAY_FILE") {
            if !value.trim().is_empty() {
                self.replay_file = Some(value.trim().to_string());
            }
        }
        if let Ok(value) = env::var("BACKTEST_MODE") {
            self.backtest_mode = matches!(value.trim(), "1" | "true" | "yes");
        }
        if let Ok(value) = env::var("LADDER_USERS") {
            let users = StringOrVec::String(value).into_vec();
            if !users.is_empty() {
                self.users = users;
            }
        }
        if let Ok(value) = env::var("INTERVAL_SECS") {
            self.interval_secs = value
                .trim()
                .parse::<u64>()
                .context("INTERVAL_SECS must be a positive integer")?;
        }
        if let Ok(value) = env::var("STORE_DIR") {
            if !value.trim().is_empty() {
                self.store_dir = Some(PathBuf::from(value.trim()));
            }
        }
        if let Ok(value) = env::var("STATUS_FILE") {
            if !value.trim().is_empty() {
                self.status_file = Some(PathBuf::from(value.trim()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn yaml_values_and_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "replay_file: data/series.jsonl\nbacktest_mode: true\nusers: alice, bob\n"
        )
        .unwrap();

        let cfg = LadderConfig::from_yaml_path(file.path()).unwrap();
        assert_eq!(cfg.replay_file.as_deref(), Some("data/series.jsonl"));
        assert!(cfg.backtest_mode);
        assert_eq!(cfg.users, vec!["alice", "bob"]);
        assert_eq!(cfg.interval_secs, DEFAULT_INTERVAL_SECS);
        assert!(cfg.store_dir.is_none());
    }

    #[test]
    fn users_accept_a_list_form() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "users:\n  - alice\n  - bob\n").unwrap();

        let cfg = LadderConfig::from_yaml_path(file.path()).unwrap();
        assert_eq!(cfg.users, vec!["alice", "bob"]);
    }
}
