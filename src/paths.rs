//! Filesystem locations of the child entry point and its config file.
//!
//! Resolution order: explicit env override, then the working directory in dev
//! mode, then the directory of the running executable.

use std::path::{Path, PathBuf};

use crate::types::{Error, Result};

pub const APP_MODE_ENV: &str = "APP_MODE";
pub const MODULE_PATH_ENV: &str = "APP_PYTHON_PATH";
pub const CONFIG_PATH_ENV: &str = "APP_PYTHON_CONFIG_PATH";

const MODULE_FILE: &str = "main.py";
const CONFIG_FILE: &str = "config.json";

/// `APP_MODE=dev` (any case).
pub fn is_dev_mode() -> bool {
    std::env::var(APP_MODE_ENV)
        .map(|v| v.eq_ignore_ascii_case("dev"))
        .unwrap_or(false)
}

pub fn resolve_module_path(dev: bool) -> Result<PathBuf> {
    resolve(MODULE_PATH_ENV, MODULE_FILE, dev)
}

pub fn resolve_config_path(dev: bool) -> Result<PathBuf> {
    resolve(CONFIG_PATH_ENV, CONFIG_FILE, dev)
}

fn resolve(env_key: &str, file: &str, dev: bool) -> Result<PathBuf> {
    let overridden = std::env::var(env_key).ok().filter(|v| !v.is_empty());
    let exe = if overridden.is_none() && !dev {
        Some(std::env::current_exe().map_err(|e| {
            Error::path_resolution(format!("get executable path: {}", e))
        })?)
    } else {
        None
    };
    let path = choose(overridden, dev, exe.as_deref(), file);
    tracing::trace!(path = %path.display(), env = env_key, "Resolved path");
    Ok(path)
}

fn choose(overridden: Option<String>, dev: bool, exe: Option<&Path>, file: &str) -> PathBuf {
    if let Some(path) = overridden {
        return PathBuf::from(path);
    }
    if dev {
        return Path::new(".").join(file);
    }
    exe.and_then(Path::parent)
        .map(|dir| dir.join(file))
        .unwrap_or_else(|| PathBuf::from(file))
}
