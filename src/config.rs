use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

// ── Profile ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    /// Base URL of the assistant / document backend
    #[serde(default = "default_backend_url")]
    pub backend_url: String,
    /// Give up on a backend request after this many seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Where generated document archives are saved. Default: current directory.
    #[serde(default)]
    pub download_dir: Option<PathBuf>,
}

fn default_backend_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_request_timeout_secs() -> u64 {
    120
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            backend_url: default_backend_url(),
            request_timeout_secs: default_request_timeout_secs(),
            download_dir: None,
        }
    }
}

// ── Config file ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConfigFile {
    /// Which profile to use when none is specified
    #[serde(default = "default_profile_name")]
    pub default_profile: String,

    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

fn default_profile_name() -> String {
    "default".to_string()
}

impl ConfigFile {
    /// Load from disk, or return a default config if the file doesn't exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file at {}", path.display()))
    }

    /// Write a starter config file to disk (only if it doesn't exist).
    pub fn write_default_if_missing() -> Result<PathBuf> {
        let path = config_path();
        write_default_at(&path)?;
        Ok(path)
    }

    /// Resolve the active profile given an optional override name.
    pub fn resolve_profile(&self, name: Option<&str>) -> Option<&Profile> {
        let key = name.unwrap_or(&self.default_profile);
        self.profiles.get(key)
    }

    /// Profile names, sorted, for `--profiles`.
    pub fn profile_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.profiles.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

fn write_default_at(path: &Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(path, DEFAULT_CONFIG_TOML)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

// ── Resolved runtime config (after merging file + CLI overrides) ──────────────

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub backend_url: String,
    pub request_timeout: Duration,
    pub download_dir: PathBuf,
    /// Persisted session state lives here
    pub data_dir: PathBuf,
    /// Profile name that was resolved (for display)
    pub profile_name: String,
}

/// Command-line (and env, via clap) overrides. `None` defers to the profile.
#[derive(Debug, Clone, Default)]
pub struct Overrides<'a> {
    pub profile: Option<&'a str>,
    pub backend_url: Option<&'a str>,
    pub request_timeout_secs: Option<u64>,
    pub download_dir: Option<&'a Path>,
    pub data_dir: Option<&'a Path>,
}

impl ResolvedConfig {
    /// Merge config file profile with CLI overrides.
    /// Priority: CLI args > env vars (handled by clap) > config file profile > built-in defaults
    pub fn resolve(file: &ConfigFile, overrides: &Overrides<'_>) -> Self {
        let profile_name = overrides
            .profile
            .unwrap_or(&file.default_profile)
            .to_string();

        let base = file
            .resolve_profile(overrides.profile)
            .cloned()
            .unwrap_or_default();

        let timeout_secs = overrides
            .request_timeout_secs
            .unwrap_or(base.request_timeout_secs)
            .max(1);

        Self {
            backend_url: overrides
                .backend_url
                .map(str::to_string)
                .unwrap_or(base.backend_url),
            request_timeout: Duration::from_secs(timeout_secs),
            download_dir: overrides
                .download_dir
                .map(Path::to_path_buf)
                .or(base.download_dir)
                .unwrap_or_else(|| PathBuf::from(".")),
            data_dir: overrides
                .data_dir
                .map(Path::to_path_buf)
                .unwrap_or_else(crate::storage::data_dir),
            profile_name,
        }
    }
}

// ── Paths ─────────────────────────────────────────────────────────────────────

pub fn config_path() -> PathBuf {
    dirs_config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("zant")
        .join("config.toml")
}

fn dirs_config_dir() -> Option<PathBuf> {
    std::env::var("XDG_CONFIG_HOME")
        .ok()
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join(".config"))
        })
}

// ── Default config template written on first run ──────────────────────────────

const DEFAULT_CONFIG_TOML: &str = r#"# zant configuration
# Run `zant --init` to regenerate this file.

default_profile = "local"

# ── Local backend (default) ───────────────────────────────────────────────────
[profiles.local]
backend_url          = "http://localhost:8000"
request_timeout_secs = 120
# download_dir       = "/home/user/Dokumenty"

# ── Shared staging backend ────────────────────────────────────────────────────
# Slow model behind it, so give it longer before giving up.
# [profiles.staging]
# backend_url          = "https://zant-staging.example.org"
# request_timeout_secs = 300
"#;
