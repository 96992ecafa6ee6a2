//! Plugin value types and the pieces that produce them.
//!
//! - [`descriptor`]: what a plugin is
//! - [`builtin`] and [`command_line`]: where descriptors come from
//! - [`loader`] and [`entry_points`]: how a plugin's code is reached
//! - [`module`]: a loaded, shared plugin instance

pub mod builtin;
pub mod command_line;
pub mod descriptor;
pub mod entry_points;
pub mod loader;
pub mod module;

pub use builtin::{BuiltinDiscovery, BuiltinKind, BuiltinPaths, FileProbe, FsProbe};
pub use command_line::{
    compute_command_line_plugins, flash_descriptor, parse_plugin_list, ParsedPluginList,
    RejectReason, RejectedEntry,
};
pub use descriptor::{find_by_path, FlashVersion, MimeType, PluginDescriptor};
pub use entry_points::{EntryPoints, InterfacePtr, PP_OK};
pub use loader::{preload_libraries, LibloadingLoader, NativeLibrary, NativeLibraryLoader};
pub use module::{ModuleId, ModuleState, PluginModule};
