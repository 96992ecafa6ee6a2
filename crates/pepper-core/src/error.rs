//! Error types for plugin discovery and loading.
//!
//! Only recoverable conditions are represented here. A plugin that fails to
//! load is reported through [`PluginError`] and skipped; broken contracts
//! between modules and the registry are panics, not errors.

use std::path::PathBuf;

/// Result type for plugin operations.
pub type Result<T> = std::result::Result<T, PluginError>;

/// Plugin error types.
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    /// Plugin file does not exist.
    #[error("Plugin not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Failed to load plugin library.
    #[error("Failed to load plugin: {0}")]
    LoadFailed(String),

    /// The library is missing one of the required exports.
    #[error("Plugin {} does not export {symbol}", path.display())]
    MissingEntryPoint { path: PathBuf, symbol: &'static str },

    /// The module's initialize entry point returned a non-zero code.
    #[error("Plugin {} failed to initialize (code {code})", path.display())]
    InitializationFailed { path: PathBuf, code: i32 },

    /// Invalid registry configuration.
    #[error("Invalid plugin configuration: {0}")]
    InvalidConfiguration(String),

    /// I/O error while reading configuration or probing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PluginError::MissingEntryPoint {
            path: PathBuf::from("/opt/plugins/libfoo.so"),
            symbol: "PPP_GetInterface",
        };
        assert_eq!(
            err.to_string(),
            "Plugin /opt/plugins/libfoo.so does not export PPP_GetInterface"
        );

        let err = PluginError::InitializationFailed {
            path: PathBuf::from("internal-remoting"),
            code: -2,
        };
        assert!(err.to_string().contains("code -2"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: PluginError = io.into();
        assert!(matches!(err, PluginError::Io(_)));
    }
}
