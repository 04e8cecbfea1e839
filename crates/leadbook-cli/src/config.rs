// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use leadbook_app::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, ViewOptions};
use leadbook_client::DEFAULT_BASE_URL;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const APP_NAME: &str = "leadbook";
const CONFIG_VERSION: i64 = 1;
const DEFAULT_TIMEOUT: &str = "5s";
const DEFAULT_SEARCH_DEBOUNCE: &str = "400ms";
const DEFAULT_LOG_LEVEL: &str = "info";
const LOG_LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub version: i64,
    #[serde(default)]
    pub server: Server,
    #[serde(default)]
    pub ui: Ui,
    #[serde(default)]
    pub log: Log,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            server: Server::default(),
            ui: Ui::default(),
            log: Log::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Server {
    pub base_url: Option<String>,
    pub timeout: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Ui {
    pub page_size: Option<i64>,
    pub search_debounce: Option<String>,
}

impl Default for Ui {
    fn default() -> Self {
        Self {
            page_size: Some(DEFAULT_PAGE_SIZE as i64),
            search_debounce: Some(DEFAULT_SEARCH_DEBOUNCE.to_owned()),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Log {
    pub level: Option<String>,
    pub path: Option<String>,
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = env::var_os("LEADBOOK_CONFIG_PATH") {
            return Ok(PathBuf::from(path));
        }

        let config_root = dirs::config_dir().ok_or_else(|| {
            anyhow!("cannot resolve config directory; set LEADBOOK_CONFIG_PATH to the config file")
        })?;

        let app_dir = config_root.join(APP_NAME);
        fs::create_dir_all(&app_dir)
            .with_context(|| format!("create config directory {}", app_dir.display()))?;
        Ok(app_dir.join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let value: toml::Value = toml::from_str(&raw)
            .with_context(|| format!("parse TOML config {}", path.display()))?;

        let version = value
            .get("version")
            .and_then(toml::Value::as_integer)
            .ok_or_else(|| {
                anyhow!(
                    "config file {} has no version. Add `version = 1` and put values under [server], [ui], and [log]",
                    path.display()
                )
            })?;

        if version != CONFIG_VERSION {
            bail!(
                "unsupported config version {} in {}; expected version = 1",
                version,
                path.display()
            );
        }

        let config: Config = value
            .try_into()
            .with_context(|| format!("decode config {}", path.display()))?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if let Some(timeout) = &self.server.timeout {
            let parsed = parse_duration(timeout)?;
            if parsed <= Duration::ZERO {
                bail!(
                    "server.timeout in {} must be positive, got {}",
                    path.display(),
                    timeout
                );
            }
        }

        if let Some(page_size) = self.ui.page_size
            && !(1..=MAX_PAGE_SIZE as i64).contains(&page_size)
        {
            bail!(
                "ui.page_size in {} must be between 1 and {}, got {}",
                path.display(),
                MAX_PAGE_SIZE,
                page_size
            );
        }

        if let Some(debounce) = &self.ui.search_debounce {
            parse_duration(debounce)?;
        }

        if let Some(level) = &self.log.level
            && !LOG_LEVELS.contains(&level.to_ascii_lowercase().as_str())
        {
            bail!(
                "log.level in {} must be one of {}, got {:?}",
                path.display(),
                LOG_LEVELS.join(", "),
                level
            );
        }

        Ok(())
    }

    /// Config value first, then `LEADBOOK_API_BASE`, then the local default.
    pub fn base_url(&self) -> String {
        if let Some(base_url) = &self.server.base_url {
            return base_url.trim_end_matches('/').to_owned();
        }
        match env::var("LEADBOOK_API_BASE") {
            Ok(base_url) if !base_url.trim().is_empty() => {
                base_url.trim().trim_end_matches('/').to_owned()
            }
            _ => DEFAULT_BASE_URL.to_owned(),
        }
    }

    pub fn timeout(&self) -> Result<Duration> {
        parse_duration(self.server.timeout.as_deref().unwrap_or(DEFAULT_TIMEOUT))
    }

    pub fn page_size(&self) -> usize {
        self.ui
            .page_size
            .and_then(|size| usize::try_from(size).ok())
            .unwrap_or(DEFAULT_PAGE_SIZE)
    }

    pub fn search_debounce(&self) -> Result<Duration> {
        parse_duration(
            self.ui
                .search_debounce
                .as_deref()
                .unwrap_or(DEFAULT_SEARCH_DEBOUNCE),
        )
    }

    pub fn view_options(&self) -> Result<ViewOptions> {
        Ok(ViewOptions {
            page_size: self.page_size(),
            search_debounce: self.search_debounce()?,
        })
    }

    pub fn log_level(&self) -> &str {
        self.log.level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }

    pub fn log_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.log.path {
            return Ok(PathBuf::from(path));
        }
        let data_root = dirs::data_dir().ok_or_else(|| {
            anyhow!("cannot resolve data directory; set [log].path in the config file")
        })?;
        Ok(data_root.join(APP_NAME).join("leadbook.log"))
    }

    pub fn example_config(path: &Path) -> String {
        format!(
            "# leadbook config\n# Place this file at: {}\n\nversion = 1\n\n[server]\n# Falls back to LEADBOOK_API_BASE, then {}\nbase_url = \"{}\"\ntimeout = \"{}\"\n\n[ui]\npage_size = {}\nsearch_debounce = \"{}\"\n\n[log]\n# RUST_LOG overrides this when set\nlevel = \"{}\"\n# Optional. Default is platform data dir (for example ~/.local/share/leadbook/leadbook.log)\n# path = \"/absolute/path/to/leadbook.log\"\n",
            path.display(),
            DEFAULT_BASE_URL,
            DEFAULT_BASE_URL,
            DEFAULT_TIMEOUT,
            DEFAULT_PAGE_SIZE,
            DEFAULT_SEARCH_DEBOUNCE,
            DEFAULT_LOG_LEVEL,
        )
    }
}

pub fn parse_duration(raw: &str) -> Result<Duration> {
    if let Some(value) = raw.strip_suffix("ms") {
        let millis: u64 = value
            .parse()
            .with_context(|| format!("invalid duration {raw:?}"))?;
        return Ok(Duration::from_millis(millis));
    }
    if let Some(value) = raw.strip_suffix('s') {
        let secs: u64 = value
            .parse()
            .with_context(|| format!("invalid duration {raw:?}"))?;
        return Ok(Duration::from_secs(secs));
    }
    if let Some(value) = raw.strip_suffix('m') {
        let mins: u64 = value
            .parse()
            .with_context(|| format!("invalid duration {raw:?}"))?;
        return Ok(Duration::from_secs(mins * 60));
    }

    bail!("invalid duration {raw:?}; use one of: <N>ms, <N>s, <N>m (for example 400ms or 5s)")
}

#[cfg(test)]
mod tests {
    use super::{Config, parse_duration};
    use anyhow::Result;
    use leadbook_testkit::temp_config_path;
    use std::path::PathBuf;
    use std::sync::{Mutex, OnceLock};
    use std::time::Duration;

    fn write_config(content: &str) -> Result<(tempfile::TempDir, PathBuf)> {
        let (temp, path) = temp_config_path()?;
        std::fs::write(&path, content)?;
        Ok((temp, path))
    }

    fn env_lock() -> std::sync::MutexGuard<'static, ()> {
        static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        match ENV_LOCK.get_or_init(|| Mutex::new(())).lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    #[test]
    fn missing_config_uses_defaults() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let config = Config::load(&temp.path().join("missing.toml"))?;
        assert_eq!(config.version, 1);
        assert_eq!(config.page_size(), 10);
        assert_eq!(config.search_debounce()?, Duration::from_millis(400));
        assert_eq!(config.timeout()?, Duration::from_secs(5));
        assert_eq!(config.log_level(), "info");
        Ok(())
    }

    #[test]
    fn unversioned_config_is_rejected_with_actionable_message() -> Result<()> {
        let (_temp, path) = write_config("[server]\nbase_url = \"http://api\"\n")?;
        let error = Config::load(&path).expect_err("unversioned config should fail");
        let message = error.to_string();
        assert!(message.contains("version = 1"));
        assert!(message.contains("[server], [ui], and [log]"));
        Ok(())
    }

    #[test]
    fn full_config_parses() -> Result<()> {
        let (_temp, path) = write_config(
            "version = 1\n[server]\nbase_url = \"https://leads.example.com/api/\"\ntimeout = \"2s\"\n[ui]\npage_size = 25\nsearch_debounce = \"250ms\"\n[log]\nlevel = \"debug\"\npath = \"/tmp/leadbook-test.log\"\n",
        )?;

        let config = Config::load(&path)?;
        assert_eq!(config.base_url(), "https://leads.example.com/api");
        assert_eq!(config.timeout()?, Duration::from_secs(2));
        let options = config.view_options()?;
        assert_eq!(options.page_size, 25);
        assert_eq!(options.search_debounce, Duration::from_millis(250));
        assert_eq!(config.log_level(), "debug");
        assert_eq!(config.log_path()?, PathBuf::from("/tmp/leadbook-test.log"));
        Ok(())
    }

    #[test]
    fn malformed_config_returns_parse_error() -> Result<()> {
        let (_temp, path) = write_config("{{not toml")?;
        let error = Config::load(&path).expect_err("malformed config should fail");
        assert!(error.to_string().contains("parse TOML config"));
        Ok(())
    }

    #[test]
    fn unsupported_config_version_is_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 3\n")?;
        let error = Config::load(&path).expect_err("v3 config should fail");
        assert!(error.to_string().contains("unsupported config version 3"));
        Ok(())
    }

    #[test]
    fn page_size_is_bounded() -> Result<()> {
        for bad in ["0", "201", "-4"] {
            let (_temp, path) = write_config(&format!("version = 1\n[ui]\npage_size = {bad}\n"))?;
            let error = Config::load(&path).expect_err("out of range page size should fail");
            assert!(error.to_string().contains("between 1 and 200"));
        }
        let (_temp, path) = write_config("version = 1\n[ui]\npage_size = 200\n")?;
        assert_eq!(Config::load(&path)?.page_size(), 200);
        Ok(())
    }

    #[test]
    fn zero_timeout_is_rejected_but_zero_debounce_is_allowed() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n[server]\ntimeout = \"0s\"\n")?;
        let error = Config::load(&path).expect_err("zero timeout should fail");
        assert!(error.to_string().contains("must be positive"));

        let (_temp, path) = write_config("version = 1\n[ui]\nsearch_debounce = \"0ms\"\n")?;
        assert_eq!(Config::load(&path)?.search_debounce()?, Duration::ZERO);
        Ok(())
    }

    #[test]
    fn unknown_log_level_is_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n[log]\nlevel = \"chatty\"\n")?;
        let error = Config::load(&path).expect_err("unknown level should fail");
        assert!(error.to_string().contains("log.level"));
        Ok(())
    }

    #[test]
    fn default_path_honors_env_override() -> Result<()> {
        let _guard = env_lock();
        let temp = tempfile::tempdir()?;
        let override_path = temp.path().join("custom-config.toml");
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::set_var("LEADBOOK_CONFIG_PATH", &override_path);
        }
        let resolved = Config::default_path();
        // SAFETY: test cleanup for process-local env mutation.
        unsafe {
            std::env::remove_var("LEADBOOK_CONFIG_PATH");
        }
        assert_eq!(resolved?, override_path);
        Ok(())
    }

    #[test]
    fn base_url_prefers_config_over_env() -> Result<()> {
        let _guard = env_lock();
        let (_temp, path) =
            write_config("version = 1\n[server]\nbase_url = \"http://from-config:8000\"\n")?;
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::set_var("LEADBOOK_API_BASE", "http://from-env:9000");
        }
        let config = Config::load(&path)?;
        let resolved = config.base_url();
        // SAFETY: test cleanup for process-local env mutation.
        unsafe {
            std::env::remove_var("LEADBOOK_API_BASE");
        }
        assert_eq!(resolved, "http://from-config:8000");
        Ok(())
    }

    #[test]
    fn base_url_uses_env_when_config_is_silent() -> Result<()> {
        let _guard = env_lock();
        let (_temp, path) = write_config("version = 1\n")?;
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::set_var("LEADBOOK_API_BASE", "http://from-env:9000/");
        }
        let config = Config::load(&path)?;
        let resolved = config.base_url();
        // SAFETY: test cleanup for process-local env mutation.
        unsafe {
            std::env::remove_var("LEADBOOK_API_BASE");
        }
        assert_eq!(resolved, "http://from-env:9000");
        Ok(())
    }

    #[test]
    fn base_url_defaults_to_localhost() -> Result<()> {
        let _guard = env_lock();
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::remove_var("LEADBOOK_API_BASE");
        }
        assert_eq!(Config::default().base_url(), "http://localhost:8000");
        Ok(())
    }

    #[test]
    fn durations_parse_ms_seconds_and_minutes() -> Result<()> {
        assert_eq!(parse_duration("400ms")?, Duration::from_millis(400));
        assert_eq!(parse_duration("5s")?, Duration::from_secs(5));
        assert_eq!(parse_duration("2m")?, Duration::from_secs(120));
        let error = parse_duration("soon").expect_err("invalid duration should fail");
        assert!(error.to_string().contains("invalid duration"));
        Ok(())
    }

    #[test]
    fn example_config_round_trips() -> Result<()> {
        let (_temp, path) = temp_config_path()?;
        let example = Config::example_config(&path);
        assert!(example.contains("version = 1"));
        assert!(example.contains("[server]"));
        assert!(example.contains("[ui]"));
        assert!(example.contains("[log]"));

        std::fs::write(&path, &example)?;
        let config = Config::load(&path)?;
        assert_eq!(config.page_size(), 10);
        assert_eq!(config.base_url(), "http://localhost:8000");
        Ok(())
    }
}
