// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

/// Installs the global subscriber. The terminal belongs to the TUI, so
/// records go to `path`. `RUST_LOG` wins over `level`.
pub fn init(level: &str, path: &Path) -> Result<()> {
    let file = open_log_file(path)?;
    let filter = build_filter(level)?;

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_target(true),
        )
        .try_init()
        .context("install log subscriber")?;
    Ok(())
}

fn build_filter(level: &str) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(level).with_context(|| format!("invalid [log].level {level:?}"))
}

fn open_log_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("create log directory {}", parent.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| {
            format!(
                "open log file {} -- set [log].path to a writable location",
                path.display()
            )
        })
}

#[cfg(test)]
mod tests {
    use super::{build_filter, open_log_file};
    use anyhow::Result;
    use std::io::Write;

    #[test]
    fn log_file_is_created_with_parent_directories() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("nested").join("logs").join("leadbook.log");
        let mut file = open_log_file(&path)?;
        writeln!(file, "first")?;
        drop(file);

        let mut again = open_log_file(&path)?;
        writeln!(again, "second")?;
        assert_eq!(std::fs::read_to_string(&path)?, "first\nsecond\n");
        Ok(())
    }

    #[test]
    fn configured_level_builds_a_filter() -> Result<()> {
        let filter = build_filter("debug")?;
        assert!(!filter.to_string().is_empty());
        Ok(())
    }
}
