//! Plugin module registry.
//!
//! Discovers native plugins from three sources (on-disk built-ins,
//! compiled-in built-ins, and operator-supplied switches), merges them into
//! one descriptor list, and keeps at most one loaded module per plugin path
//! alive so that every plugin instance shares it.
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use pepper_core::prelude::*;
//!
//! let config = RegistryConfig::from_env();
//! let mut registry = PluginRegistry::new(
//!     &config,
//!     HostContext::default(),
//!     Arc::new(LibloadingLoader::new()),
//! );
//!
//! if let Some(info) = registry.get_info_for_path(Path::new("/opt/plugins/libfoo.so")) {
//!     println!("{} handles {} MIME types", info.name, info.mime_types.len());
//! }
//! let module = registry.get_live_module(Path::new("/opt/plugins/libfoo.so"));
//! # drop(module);
//! ```

pub mod config;
pub mod error;
pub mod host;
pub mod plugin;
pub mod registry;

pub use error::{PluginError, Result};
pub use registry::PluginRegistry;

/// Re-exports commonly used types.
pub mod prelude {
    pub use crate::config::{PluginSwitches, RegistryConfig};
    pub use crate::error::{PluginError, Result};
    pub use crate::host::{HostContext, ShutdownSignal};
    pub use crate::plugin::{
        BuiltinDiscovery, BuiltinPaths, EntryPoints, LibloadingLoader, MimeType, ModuleId,
        ModuleState, NativeLibraryLoader, PluginDescriptor, PluginModule,
    };
    pub use crate::registry::PluginRegistry;
}
