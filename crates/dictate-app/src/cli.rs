//! CLI argument definitions for the `dictate` binary.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use dictate_core::types::AuthorizationStatus;

/// Dictate: drive a speech dictation session against a simulated recognizer.
#[derive(Parser, Debug)]
#[command(name = "dictate", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Recognition locale, e.g. en-US.
    #[arg(short = 'L', long = "locale")]
    pub locale: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// What the simulated speaker says.
    #[arg(short = 'u', long = "utterance", default_value = "hello world")]
    pub utterance: String,

    /// Answer the simulated user gives to the authorization prompt.
    #[arg(long = "authorization", value_enum, default_value_t = AuthorizationArg::Authorized)]
    pub authorization: AuthorizationArg,

    /// Start with the recognizer temporarily unavailable.
    #[arg(long = "unavailable")]
    pub unavailable: bool,

    /// Simulate a recognizer without on-device support.
    #[arg(long = "no-on-device")]
    pub no_on_device: bool,

    /// Print raw session events as JSON lines instead of the console view.
    #[arg(long = "json")]
    pub json: bool,
}

/// `--authorization` values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum AuthorizationArg {
    Authorized,
    Denied,
    Restricted,
    NotDetermined,
}

impl From<AuthorizationArg> for AuthorizationStatus {
    fn from(arg: AuthorizationArg) -> Self {
        match arg {
            AuthorizationArg::Authorized => AuthorizationStatus::Authorized,
            AuthorizationArg::Denied => AuthorizationStatus::Denied,
            AuthorizationArg::Restricted => AuthorizationStatus::Restricted,
            AuthorizationArg::NotDetermined => AuthorizationStatus::NotDetermined,
        }
    }
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > DICTATE_CONFIG env var > platform default
    /// (~/.dictate/config.toml).
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("DICTATE_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the recognition locale.
    ///
    /// Priority: --locale flag > LC_ALL > LANG > config file value.
    pub fn resolve_locale(&self, config_locale: &str) -> String {
        if let Some(ref l) = self.locale {
            return l.clone();
        }
        for var in ["LC_ALL", "LANG"] {
            if let Some(locale) = std::env::var(var).ok().and_then(|v| locale_from_env(&v)) {
                return locale;
            }
        }
        config_locale.to_string()
    }

    /// Resolve the log level.
    ///
    /// Priority: --log-level flag > config file value.
    pub fn resolve_log_level(&self, config_level: &str) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config_level.to_string())
    }
}

/// Turn a POSIX locale value such as `en_US.UTF-8` into a language tag (`en-US`).
///
/// Returns `None` for empty values and the `C`/`POSIX` locales.
pub fn locale_from_env(value: &str) -> Option<String> {
    let base = value
        .split(['.', '@'])
        .next()
        .unwrap_or_default()
        .trim();
    if base.is_empty() || base == "C" || base == "POSIX" {
        return None;
    }
    Some(base.replace('_', "-"))
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".dictate").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".dictate").join("config.toml");
    }
    PathBuf::from("config.toml")
}
