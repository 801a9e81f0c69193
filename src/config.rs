// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Nereid and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Runtime configuration: CLI flags over environment variables over defaults.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use crate::hub::DEFAULT_VISIBILITY_TIMEOUT;
use crate::store::WriteDurability;
use crate::viewer::BackoffPolicy;

pub const DEFAULT_HTTP_PORT: u16 = 27436;
pub const DATA_DIR_ENV: &str = "NEREID_LIVE_DATA_DIR";
pub const PORT_ENV: &str = "NEREID_LIVE_PORT";
pub const NO_OPEN_ENV: &str = "NEREID_LIVE_NO_OPEN";

const APP_DIR_NAME: &str = "nereid-live";
const FALLBACK_DATA_DIR: &str = ".nereid-live";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value `{value}` for {var}: {reason}")]
    InvalidEnv {
        var: &'static str,
        value: String,
        reason: String,
    },
    #[error("failed to determine the current directory")]
    CurrentDir(#[source] io::Error),
}

/// Values given on the command line. `None`/`false` defers to the environment.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub data_dir: Option<PathBuf>,
    pub port: Option<u16>,
    pub no_open: bool,
    pub work_dir: Option<PathBuf>,
    pub durable_writes: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub data_root: PathBuf,
    /// Port of the local HTTP/websocket server; 0 picks an ephemeral port.
    pub http_port: u16,
    /// Launch a viewer when a diagram is rendered and nobody is watching.
    pub auto_open: bool,
    /// Directory whose version-control root names the collection of new diagrams.
    pub work_dir: PathBuf,
    pub durability: WriteDurability,
    pub visibility_timeout: Duration,
    pub backoff: BackoffPolicy,
}

impl Config {
    /// Resolves against the process environment and current directory.
    pub fn from_env(overrides: ConfigOverrides) -> Result<Self, ConfigError> {
        let work_dir = match overrides.work_dir.clone() {
            Some(dir) => dir,
            None => std::env::current_dir().map_err(ConfigError::CurrentDir)?,
        };
        Self::resolve(
            ConfigOverrides {
                work_dir: Some(work_dir),
                ..overrides
            },
            |name| std::env::var(name).ok(),
        )
    }

    /// Resolves with an explicit environment lookup.
    pub fn resolve<F>(overrides: ConfigOverrides, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let data_root = match overrides.data_dir {
            Some(dir) => dir,
            None => match env(DATA_DIR_ENV).filter(|value| !value.trim().is_empty()) {
                Some(dir) => PathBuf::from(dir),
                None => default_data_root(),
            },
        };

        let http_port = match overrides.port {
            Some(port) => port,
            None => match env(PORT_ENV) {
                Some(raw) => parse_port(&raw)?,
                None => DEFAULT_HTTP_PORT,
            },
        };

        let auto_open = if overrides.no_open {
            false
        } else {
            match env(NO_OPEN_ENV) {
                Some(raw) => !parse_flag(NO_OPEN_ENV, &raw)?,
                None => true,
            }
        };

        let durability = if overrides.durable_writes {
            WriteDurability::Durable
        } else {
            WriteDurability::BestEffort
        };

        Ok(Self {
            data_root,
            http_port,
            auto_open,
            work_dir: overrides.work_dir.unwrap_or_else(|| PathBuf::from(".")),
            durability,
            visibility_timeout: DEFAULT_VISIBILITY_TIMEOUT,
            backoff: BackoffPolicy::default(),
        })
    }
}

/// Per-user data directory, or `./.nereid-live` where the platform has none.
pub fn default_data_root() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join(APP_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from(FALLBACK_DATA_DIR))
}

fn parse_port(raw: &str) -> Result<u16, ConfigError> {
    raw.trim().parse().map_err(|err: std::num::ParseIntError| ConfigError::InvalidEnv {
        var: PORT_ENV,
        value: raw.to_owned(),
        reason: err.to_string(),
    })
}

fn parse_flag(var: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidEnv {
            var,
            value: raw.to_owned(),
            reason: "expected 1/0, true/false, yes/no or on/off".to_owned(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_apply_without_flags_or_env() {
        let config = Config::resolve(ConfigOverrides::default(), env(&[])).expect("config");
        assert_eq!(config.data_root, default_data_root());
        assert_eq!(config.http_port, DEFAULT_HTTP_PORT);
        assert!(config.auto_open);
        assert_eq!(config.durability, WriteDurability::BestEffort);
        assert_eq!(config.visibility_timeout, Duration::from_millis(500));
        assert_eq!(config.backoff, BackoffPolicy::default());
    }

    #[test]
    fn env_overrides_defaults() {
        let config = Config::resolve(
            ConfigOverrides::default(),
            env(&[
                (DATA_DIR_ENV, "/tmp/history"),
                (PORT_ENV, " 4100 "),
                (NO_OPEN_ENV, "1"),
            ]),
        )
        .expect("config");
        assert_eq!(config.data_root, PathBuf::from("/tmp/history"));
        assert_eq!(config.http_port, 4100);
        assert!(!config.auto_open);
    }

    #[test]
    fn flags_override_env() {
        let overrides = ConfigOverrides {
            data_dir: Some(PathBuf::from("/flag")),
            port: Some(0),
            no_open: true,
            work_dir: Some(PathBuf::from("/work")),
            durable_writes: true,
        };
        let config = Config::resolve(
            overrides,
            env(&[(DATA_DIR_ENV, "/env"), (PORT_ENV, "nope"), (NO_OPEN_ENV, "0")]),
        )
        .expect("config");
        assert_eq!(config.data_root, PathBuf::from("/flag"));
        assert_eq!(config.http_port, 0);
        assert!(!config.auto_open);
        assert_eq!(config.work_dir, PathBuf::from("/work"));
        assert_eq!(config.durability, WriteDurability::Durable);
    }

    #[test]
    fn blank_data_dir_env_falls_back_to_default() {
        let config =
            Config::resolve(ConfigOverrides::default(), env(&[(DATA_DIR_ENV, "  ")])).expect("config");
        assert_eq!(config.data_root, default_data_root());
    }

    #[test]
    fn invalid_port_env_names_the_variable() {
        let err = Config::resolve(ConfigOverrides::default(), env(&[(PORT_ENV, "http")]))
            .unwrap_err();
        match err {
            ConfigError::InvalidEnv { var, value, .. } => {
                assert_eq!(var, PORT_ENV);
                assert_eq!(value, "http");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn invalid_no_open_env_is_rejected() {
        let err = Config::resolve(ConfigOverrides::default(), env(&[(NO_OPEN_ENV, "maybe")]))
            .unwrap_err();
        assert!(err.to_string().contains(NO_OPEN_ENV));
    }

    #[test]
    fn no_open_env_accepts_false_values() {
        let config = Config::resolve(ConfigOverrides::default(), env(&[(NO_OPEN_ENV, "false")]))
            .expect("config");
        assert!(config.auto_open);
    }
}
