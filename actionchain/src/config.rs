//! Configuration for the concrete execution contexts.

use crate::error::DispatchError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Environment variable selecting [`BackgroundMode`].
pub const ENV_BACKGROUND: &str = "ACTIONCHAIN_BACKGROUND";
/// Environment variable capping background blocking threads.
pub const ENV_MAX_BLOCKING_THREADS: &str = "ACTIONCHAIN_MAX_BLOCKING_THREADS";
/// Environment variable naming the foreground thread.
pub const ENV_FOREGROUND_THREAD: &str = "ACTIONCHAIN_FOREGROUND_THREAD";

/// How compute work is scheduled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackgroundMode {
    /// A tokio blocking pool; steps may run in parallel.
    #[default]
    Parallel,
    /// A single worker thread; steps run one at a time in submission order.
    Serial,
}

impl FromStr for BackgroundMode {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "parallel" => Ok(Self::Parallel),
            "serial" => Ok(Self::Serial),
            other => Err(DispatchError::Config(format!(
                "unknown background mode {other:?} (expected \"parallel\" or \"serial\")"
            ))),
        }
    }
}

impl fmt::Display for BackgroundMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parallel => f.write_str("parallel"),
            Self::Serial => f.write_str("serial"),
        }
    }
}

/// Settings for [`Contexts::from_config`](crate::Contexts::from_config)
/// and the process-wide defaults.
///
/// Deserializable, so it can live in a host application's config file.
/// Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// How compute work is scheduled.
    pub background: BackgroundMode,
    /// Cap on blocking threads in [`BackgroundMode::Parallel`].
    /// `None` keeps tokio's default.
    pub max_blocking_threads: Option<usize>,
    /// Name of the foreground dispatcher thread.
    pub foreground_thread_name: String,
    /// Name of background threads.
    pub background_thread_name: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            background: BackgroundMode::Parallel,
            max_blocking_threads: None,
            foreground_thread_name: "actionchain-foreground".into(),
            background_thread_name: "actionchain-background".into(),
        }
    }
}

impl DispatchConfig {
    /// Set the background mode.
    pub fn with_background(mut self, background: BackgroundMode) -> Self {
        self.background = background;
        self
    }

    /// Cap the number of background blocking threads.
    pub fn with_max_blocking_threads(mut self, threads: usize) -> Self {
        self.max_blocking_threads = Some(threads);
        self
    }

    /// Name the foreground dispatcher thread.
    pub fn with_foreground_thread_name(mut self, name: impl Into<String>) -> Self {
        self.foreground_thread_name = name.into();
        self
    }

    /// Read overrides from the process environment on top of the defaults.
    ///
    /// See [`ENV_BACKGROUND`], [`ENV_MAX_BLOCKING_THREADS`] and
    /// [`ENV_FOREGROUND_THREAD`].
    pub fn from_env() -> Result<Self, DispatchError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, DispatchError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(mode) = lookup(ENV_BACKGROUND) {
            config.background = mode.parse()?;
        }
        if let Some(threads) = lookup(ENV_MAX_BLOCKING_THREADS) {
            let threads = threads.trim().parse::<usize>().map_err(|e| {
                DispatchError::Config(format!("{ENV_MAX_BLOCKING_THREADS}={threads:?}: {e}"))
            })?;
            if threads == 0 {
                return Err(DispatchError::Config(format!(
                    "{ENV_MAX_BLOCKING_THREADS} must be at least 1"
                )));
            }
            config.max_blocking_threads = Some(threads);
        }
        if let Some(name) = lookup(ENV_FOREGROUND_THREAD) {
            config.foreground_thread_name = name;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn defaults_without_variables() {
        let config = DispatchConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, DispatchConfig::default());
        assert_eq!(config.background, BackgroundMode::Parallel);
        assert_eq!(config.foreground_thread_name, "actionchain-foreground");
    }

    #[test]
    fn variables_override_defaults() {
        let config = DispatchConfig::from_lookup(lookup(&[
            (ENV_BACKGROUND, " Serial "),
            (ENV_MAX_BLOCKING_THREADS, "4"),
            (ENV_FOREGROUND_THREAD, "ui"),
        ]))
        .unwrap();
        assert_eq!(config.background, BackgroundMode::Serial);
        assert_eq!(config.max_blocking_threads, Some(4));
        assert_eq!(config.foreground_thread_name, "ui");
    }

    #[test]
    fn blocking_thread_cap_is_named_for_what_it_caps() {
        let config = DispatchConfig::from_lookup(lookup(&[(
            "ACTIONCHAIN_MAX_BLOCKING_THREADS",
            "8",
        )]))
        .unwrap();
        assert_eq!(config.max_blocking_threads, Some(8));

        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["max_blocking_threads"], 8);
        assert!(json.get("worker_threads").is_none());
    }

    #[test]
    fn invalid_variables_are_rejected() {
        let err = DispatchConfig::from_lookup(lookup(&[(ENV_BACKGROUND, "eager")])).unwrap_err();
        assert!(err.to_string().contains("unknown background mode"));

        let err =
            DispatchConfig::from_lookup(lookup(&[(ENV_MAX_BLOCKING_THREADS, "many")])).unwrap_err();
        assert!(err.to_string().contains(ENV_MAX_BLOCKING_THREADS));

        let err = DispatchConfig::from_lookup(lookup(&[(ENV_MAX_BLOCKING_THREADS, "0")])).unwrap_err();
        assert!(err.to_string().contains("at least 1"));
    }

    #[test]
    fn deserializes_with_missing_fields() {
        let config: DispatchConfig =
            serde_json::from_str(r#"{"background": "serial", "max_blocking_threads": 2}"#).unwrap();
        assert_eq!(config.background, BackgroundMode::Serial);
        assert_eq!(config.max_blocking_threads, Some(2));
        assert_eq!(config.background_thread_name, "actionchain-background");
    }

    #[test]
    fn builder_methods() {
        let config = DispatchConfig::default()
            .with_background(BackgroundMode::Serial)
            .with_max_blocking_threads(3)
            .with_foreground_thread_name("main");
        assert_eq!(config.background.to_string(), "serial");
        assert_eq!(config.max_blocking_threads, Some(3));
        assert_eq!(config.foreground_thread_name, "main");
    }
}
