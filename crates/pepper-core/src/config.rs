//! Registry configuration.
//!
//! The registry is rebuilt from scratch on every start. Its inputs come from
//! three layers, each overriding only what it sets: an optional TOML file,
//! environment variables, then explicit command-line switches.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PluginError, Result};
use crate::plugin::builtin::BuiltinPaths;

/// Command-line switch names.
pub mod switches {
    /// Comma separated plugin list, see [`crate::plugin::command_line`].
    pub const REGISTER_PEPPER_PLUGINS: &str = "register-pepper-plugins";
    /// Run command-line plugins out of process.
    pub const PPAPI_OUT_OF_PROCESS: &str = "ppapi-out-of-process";
    /// Path of a Flash plugin library.
    pub const PPAPI_FLASH_PATH: &str = "ppapi-flash-path";
    /// Dotted version of the Flash plugin.
    pub const PPAPI_FLASH_VERSION: &str = "ppapi-flash-version";
    /// List the compiled-in remoting plugin.
    pub const ENABLE_REMOTING: &str = "enable-remoting";
}

/// Environment variable names.
pub mod env_vars {
    use std::path::PathBuf;

    pub const REGISTER_PLUGINS: &str = "PEPPER_REGISTER_PLUGINS";
    pub const OUT_OF_PROCESS: &str = "PEPPER_OUT_OF_PROCESS";
    pub const FLASH_PATH: &str = "PEPPER_FLASH_PATH";
    pub const FLASH_VERSION: &str = "PEPPER_FLASH_VERSION";
    pub const ENABLE_REMOTING: &str = "PEPPER_ENABLE_REMOTING";
    pub const PLUGIN_DIR: &str = "PEPPER_PLUGIN_DIR";

    pub fn string(name: &str) -> Option<String> {
        std::env::var(name).ok().filter(|v| !v.is_empty())
    }

    pub fn path(name: &str) -> Option<PathBuf> {
        std::env::var_os(name)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
    }

    /// `1`, `true`, `yes` and `on` are true; anything else set is false.
    pub fn flag(name: &str) -> Option<bool> {
        string(name).map(|v| {
            matches!(
                v.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            )
        })
    }
}

/// The process-wide plugin switches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginSwitches {
    /// Plugin list in the command-line grammar
    pub register_plugins: Option<String>,
    /// Applies to every command-line plugin
    pub out_of_process: bool,
    pub flash_path: Option<PathBuf>,
    pub flash_version: Option<String>,
    pub enable_remoting: bool,
}

impl PluginSwitches {
    /// Overlay values set in the environment.
    pub fn apply_env(&mut self) {
        if let Some(list) = env_vars::string(env_vars::REGISTER_PLUGINS) {
            self.register_plugins = Some(list);
        }
        if let Some(out_of_process) = env_vars::flag(env_vars::OUT_OF_PROCESS) {
            self.out_of_process = out_of_process;
        }
        if let Some(path) = env_vars::path(env_vars::FLASH_PATH) {
            self.flash_path = Some(path);
        }
        if let Some(version) = env_vars::string(env_vars::FLASH_VERSION) {
            self.flash_version = Some(version);
        }
        if let Some(enable) = env_vars::flag(env_vars::ENABLE_REMOTING) {
            self.enable_remoting = enable;
        }
    }
}

/// Everything the registry needs to compute its plugin list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Directory holding the on-disk built-ins
    pub plugin_dir: Option<PathBuf>,
    pub switches: PluginSwitches,
}

impl RegistryConfig {
    /// Parse a TOML document.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| PluginError::InvalidConfiguration(e.to_string()))
    }

    /// Load a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Defaults overlaid with the environment.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Overlay values set in the environment.
    pub fn apply_env(&mut self) {
        if let Some(dir) = env_vars::path(env_vars::PLUGIN_DIR) {
            self.plugin_dir = Some(dir);
        }
        self.switches.apply_env();
    }

    /// The configured plugin directory, or the default one.
    pub fn resolved_plugin_dir(&self) -> Option<PathBuf> {
        self.plugin_dir.clone().or_else(default_plugin_dir)
    }

    /// Locations of the on-disk built-ins.
    pub fn builtin_paths(&self) -> BuiltinPaths {
        self.resolved_plugin_dir()
            .map(|dir| BuiltinPaths::from_plugin_dir(&dir))
            .unwrap_or_default()
    }
}

/// Directory of the running executable, else the per-user data directory.
pub fn default_plugin_dir() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .or_else(|| dirs::data_local_dir().map(|dir| dir.join("pepper").join("plugins")))
}
