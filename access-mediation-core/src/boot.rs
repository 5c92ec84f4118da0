//! Boot-time configuration loading: produces the *initial* `Config` the core
//! starts with, before the first event is ever processed. Distinct from the
//! runtime `configure()` control request in `delivery.rs`, which is the only
//! way to mutate `Config` once the engine is running.
//!
//! Layering is defaults → optional TOML file → environment variable
//! overrides, each layer clamped through the same [`Config::clamp`] the
//! runtime control request uses, so a malformed file or a stray environment
//! variable can never hand the engine an out-of-range value.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::config::Config;
use crate::delivery::ConfigSource;
use crate::error::CoreError;

/// The subset of `Config` worth exposing as a document tree. `enabled_hooks`
/// and the mmap sub-policy are left to the administrative `configure()` path
/// rather than boot-time files: they are bitsets/policy flags an operator is
/// expected to tune at runtime, not static deployment configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    stall_mode: Option<bool>,
    bypass_mode: Option<bool>,
    ignore_mode: Option<bool>,
    stall_timeout_ms: Option<u32>,
    continue_timeout_ms: Option<u32>,
    deny_on_timeout: Option<bool>,
}

impl RawConfig {
    fn apply_onto(&self, mut config: Config) -> Config {
        if let Some(v) = self.stall_mode {
            config.stall_mode = v;
        }
        if let Some(v) = self.bypass_mode {
            config.bypass_mode = v;
        }
        if let Some(v) = self.ignore_mode {
            config.ignore_mode = v;
        }
        if let Some(v) = self.stall_timeout_ms {
            config.stall_timeout_ms = v;
        }
        if let Some(v) = self.continue_timeout_ms {
            config.continue_timeout_ms = v;
        }
        if let Some(v) = self.deny_on_timeout {
            config.deny_on_timeout = v;
        }
        config
    }
}

/// Indirection over environment variable lookup so tests can supply a fixed
/// map instead of touching the real process environment.
pub trait EnvProvider {
    fn get(&self, key: &str) -> Option<String>;
}

/// Reads from the real process environment.
pub struct ProcessEnv;

impl EnvProvider for ProcessEnv {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// A fixed map, for tests and for adapters that have already collected their
/// own environment snapshot.
pub struct MapEnv(pub std::collections::HashMap<String, String>);

impl EnvProvider for MapEnv {
    fn get(&self, key: &str) -> Option<String> {
        self.0.get(key).cloned()
    }
}

const ENV_PREFIX: &str = "ACCESS_MEDIATION_";

fn env_layer(env: &dyn EnvProvider) -> RawConfig {
    let bool_var = |suffix: &str| -> Option<bool> {
        env.get(&format!("{ENV_PREFIX}{suffix}"))
            .and_then(|v| match v.as_str() {
                "1" | "true" | "TRUE" | "on" | "ON" => Some(true),
                "0" | "false" | "FALSE" | "off" | "OFF" => Some(false),
                _ => None,
            })
    };
    let u32_var = |suffix: &str| -> Option<u32> {
        env.get(&format!("{ENV_PREFIX}{suffix}")).and_then(|v| v.parse().ok())
    };

    RawConfig {
        stall_mode: bool_var("STALL_MODE"),
        bypass_mode: bool_var("BYPASS_MODE"),
        ignore_mode: bool_var("IGNORE_MODE"),
        stall_timeout_ms: u32_var("STALL_TIMEOUT_MS"),
        continue_timeout_ms: u32_var("CONTINUE_TIMEOUT_MS"),
        deny_on_timeout: bool_var("DENY_ON_TIMEOUT"),
    }
}

/// Loads a `Config` by layering defaults, an optional TOML file, and
/// environment overrides, in that order — later layers win, and the result
/// is clamped once at the end so partial or conflicting layers cannot
/// produce an inconsistent record (e.g. `continue_timeout_ms` below the
/// file's `stall_timeout_ms`).
pub fn load_layered(file_path: Option<&Path>, env: &dyn EnvProvider) -> crate::error::Result<Config> {
    let mut config = Config::default();

    if let Some(path) = file_path {
        let text = std::fs::read_to_string(path).map_err(|_| CoreError::InvalidConfig("config file unreadable"))?;
        let raw: RawConfig = toml::from_str(&text).map_err(|_| CoreError::InvalidConfig("config file malformed"))?;
        config = raw.apply_onto(config);
    }

    config = env_layer(env).apply_onto(config);
    Ok(config.clamp())
}

/// A [`ConfigSource`] implementation composing [`load_layered`] for callers
/// that want the boot sequence behind the trait seam rather than a bare
/// function (e.g. to swap in a fake source in a test harness).
pub struct LayeredConfigSource<E: EnvProvider> {
    pub file_path: Option<PathBuf>,
    pub env: E,
}

impl<E: EnvProvider> ConfigSource for LayeredConfigSource<E> {
    fn load(&self) -> crate::error::Result<Config> {
        load_layered(self.file_path.as_deref(), &self.env)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_survive_with_no_layers() {
        let env = MapEnv(HashMap::new());
        let config = load_layered(None, &env).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn env_overrides_defaults() {
        let mut map = HashMap::new();
        map.insert("ACCESS_MEDIATION_STALL_TIMEOUT_MS".to_string(), "500".to_string());
        map.insert("ACCESS_MEDIATION_DENY_ON_TIMEOUT".to_string(), "true".to_string());
        let env = MapEnv(map);
        let config = load_layered(None, &env).unwrap();
        assert_eq!(config.stall_timeout_ms, 500);
        assert!(config.deny_on_timeout);
    }

    #[test]
    fn out_of_range_env_value_is_clamped() {
        let mut map = HashMap::new();
        map.insert(
            "ACCESS_MEDIATION_STALL_TIMEOUT_MS".to_string(),
            "999999999".to_string(),
        );
        let env = MapEnv(map);
        let config = load_layered(None, &env).unwrap();
        assert_eq!(config.stall_timeout_ms, crate::config::MAX_WAIT_MS);
    }

    #[test]
    fn unreadable_file_is_an_invalid_config_error() {
        let env = MapEnv(HashMap::new());
        let result = load_layered(Some(Path::new("/nonexistent/path/config.toml")), &env);
        assert_eq!(result, Err(CoreError::InvalidConfig("config file unreadable")));
    }
}
