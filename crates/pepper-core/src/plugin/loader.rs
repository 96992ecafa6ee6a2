//! Native library loading.
//!
//! The registry decides *which* library to open and *when*; opening it and
//! resolving its exports is the job of a [`NativeLibraryLoader`]. The default
//! loader uses `libloading` and expects the three PPAPI module exports.

use std::ffi::{c_char, c_void, CString};
use std::fmt;
use std::path::{Path, PathBuf};
use std::ptr::{self, NonNull};

use libloading::Library;
use tracing::{debug, warn};

use super::descriptor::PluginDescriptor;
use super::entry_points::{InterfacePtr, PP_OK};
use super::module::ModuleId;
use crate::error::{PluginError, Result};

/// Export looked up for interface queries.
pub const GET_INTERFACE_SYMBOL: &str = "PPP_GetInterface";
/// Export called once after the library is opened.
pub const INITIALIZE_MODULE_SYMBOL: &str = "PPP_InitializeModule";
/// Export called once before the library is closed.
pub const SHUTDOWN_MODULE_SYMBOL: &str = "PPP_ShutdownModule";

/// Host callback handed to `PPP_InitializeModule`.
type BrowserGetInterfaceFn = unsafe extern "C" fn(interface_name: *const c_char) -> *const c_void;

type PppGetInterfaceFn = unsafe extern "C" fn(interface_name: *const c_char) -> *const c_void;
type PppInitializeModuleFn =
    unsafe extern "C" fn(module_id: i32, get_browser_interface: BrowserGetInterfaceFn) -> i32;
type PppShutdownModuleFn = unsafe extern "C" fn();

/// An opened plugin library.
pub trait NativeLibrary: Send + Sync {
    /// Path the library was opened from.
    fn path(&self) -> &Path;

    /// Look up an exported interface.
    fn get_interface(&self, interface_name: &str) -> Option<InterfacePtr>;

    /// Run the library's module initializer.
    fn initialize(&self, module_id: ModuleId) -> Result<()>;

    /// Run the library's module shutdown hook.
    fn shutdown(&self);
}

/// Opens plugin libraries.
pub trait NativeLibraryLoader: Send + Sync {
    fn load(&self, path: &Path) -> Result<Box<dyn NativeLibrary>>;
}

unsafe extern "C" fn no_browser_interfaces(_interface_name: *const c_char) -> *const c_void {
    ptr::null()
}

/// Loader backed by `libloading`.
pub struct LibloadingLoader {
    browser_interface: BrowserGetInterfaceFn,
}

impl LibloadingLoader {
    /// Create a loader that exposes no host interfaces to plugins.
    pub fn new() -> Self {
        Self {
            browser_interface: no_browser_interfaces,
        }
    }
}

impl Default for LibloadingLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LibloadingLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LibloadingLoader").finish_non_exhaustive()
    }
}

impl NativeLibraryLoader for LibloadingLoader {
    fn load(&self, path: &Path) -> Result<Box<dyn NativeLibrary>> {
        if !path.is_file() {
            return Err(PluginError::NotFound(path.to_path_buf()));
        }

        // SAFETY: opening a library runs its static initializers. Plugin paths
        // come from the host's own install directory or from the operator.
        let library = unsafe {
            Library::new(path)
                .map_err(|e| PluginError::LoadFailed(format!("{}: {}", path.display(), e)))?
        };

        let missing = |symbol: &'static str| PluginError::MissingEntryPoint {
            path: path.to_path_buf(),
            symbol,
        };

        // SAFETY: the symbol types match the PPAPI module ABI, and the copied
        // function pointers are stored next to the `Library` that owns them.
        let (get_interface, initialize_module, shutdown_module) = unsafe {
            let get_interface: PppGetInterfaceFn = *library
                .get::<PppGetInterfaceFn>(GET_INTERFACE_SYMBOL.as_bytes())
                .map_err(|_| missing(GET_INTERFACE_SYMBOL))?;
            let initialize_module: PppInitializeModuleFn = *library
                .get::<PppInitializeModuleFn>(INITIALIZE_MODULE_SYMBOL.as_bytes())
                .map_err(|_| missing(INITIALIZE_MODULE_SYMBOL))?;
            let shutdown_module: PppShutdownModuleFn = *library
                .get::<PppShutdownModuleFn>(SHUTDOWN_MODULE_SYMBOL.as_bytes())
                .map_err(|_| missing(SHUTDOWN_MODULE_SYMBOL))?;
            (get_interface, initialize_module, shutdown_module)
        };

        debug!("Opened plugin library {}", path.display());
        Ok(Box::new(DynamicLibrary {
            path: path.to_path_buf(),
            get_interface,
            initialize_module,
            shutdown_module,
            browser_interface: self.browser_interface,
            _library: library,
        }))
    }
}

/// A library opened by [`LibloadingLoader`].
struct DynamicLibrary {
    path: PathBuf,
    get_interface: PppGetInterfaceFn,
    initialize_module: PppInitializeModuleFn,
    shutdown_module: PppShutdownModuleFn,
    browser_interface: BrowserGetInterfaceFn,
    // Must outlive the function pointers above.
    _library: Library,
}

impl NativeLibrary for DynamicLibrary {
    fn path(&self) -> &Path {
        &self.path
    }

    fn get_interface(&self, interface_name: &str) -> Option<InterfacePtr> {
        let name = CString::new(interface_name).ok()?;
        // SAFETY: `name` is NUL-terminated and outlives the call.
        let interface = unsafe { (self.get_interface)(name.as_ptr()) };
        NonNull::new(interface as *mut c_void)
    }

    fn initialize(&self, module_id: ModuleId) -> Result<()> {
        // SAFETY: called once per module, before any interface is used.
        let code = unsafe { (self.initialize_module)(module_id.as_raw(), self.browser_interface) };
        if code == PP_OK {
            Ok(())
        } else {
            Err(PluginError::InitializationFailed {
                path: self.path.clone(),
                code,
            })
        }
    }

    fn shutdown(&self) {
        // SAFETY: called once, after a successful initialize.
        unsafe { (self.shutdown_module)() }
    }
}

/// Open every in-process, on-disk plugin library ahead of time.
///
/// Used before the host enters a sandbox that forbids opening files. The
/// returned handles keep the libraries mapped; failures are logged and skipped.
pub fn preload_libraries(
    plugins: &[PluginDescriptor],
    loader: &dyn NativeLibraryLoader,
) -> Vec<Box<dyn NativeLibrary>> {
    plugins
        .iter()
        .filter(|plugin| !plugin.is_internal && !plugin.is_out_of_process)
        .filter_map(|plugin| match loader.load(&plugin.path) {
            Ok(library) => {
                debug!("Preloaded library {}", library.path().display());
                Some(library)
            }
            Err(e) => {
                warn!("Unable to load plugin {}: {}", plugin.path.display(), e);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_missing_file() {
        let loader = LibloadingLoader::new();
        let result = loader.load(Path::new("/nonexistent/path/libplugin.so"));
        assert!(matches!(result, Err(PluginError::NotFound(_))));
    }

    #[test]
    fn test_load_non_library_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("libfake.so");
        std::fs::write(&path, b"not an ELF file").unwrap();

        let loader = LibloadingLoader::new();
        let result = loader.load(&path);
        assert!(matches!(result, Err(PluginError::LoadFailed(_))));
    }

    #[test]
    fn test_preload_skips_internal_and_out_of_process() {
        struct CountingLoader(parking_lot::Mutex<Vec<PathBuf>>);

        impl NativeLibraryLoader for CountingLoader {
            fn load(&self, path: &Path) -> Result<Box<dyn NativeLibrary>> {
                self.0.lock().push(path.to_path_buf());
                Err(PluginError::NotFound(path.to_path_buf()))
            }
        }

        let plugins = vec![
            PluginDescriptor::new("/plugins/a.so", "A"),
            PluginDescriptor::new("/plugins/b.so", "B").out_of_process(true),
            PluginDescriptor {
                path: PathBuf::from("internal-c"),
                is_internal: true,
                ..Default::default()
            },
        ];

        let loader = CountingLoader(parking_lot::Mutex::new(Vec::new()));
        let libraries = preload_libraries(&plugins, &loader);
        assert!(libraries.is_empty());
        assert_eq!(*loader.0.lock(), vec![PathBuf::from("/plugins/a.so")]);
    }

    #[test]
    fn test_preload_returns_loaded_handles() {
        struct StubLibrary(PathBuf);

        impl NativeLibrary for StubLibrary {
            fn path(&self) -> &Path {
                &self.0
            }
            fn get_interface(&self, _interface_name: &str) -> Option<InterfacePtr> {
                None
            }
            fn initialize(&self, _module_id: ModuleId) -> Result<()> {
                Ok(())
            }
            fn shutdown(&self) {}
        }

        struct StubLoader;

        impl NativeLibraryLoader for StubLoader {
            fn load(&self, path: &Path) -> Result<Box<dyn NativeLibrary>> {
                if path.ends_with("broken.so") {
                    return Err(PluginError::LoadFailed("bad header".into()));
                }
                Ok(Box::new(StubLibrary(path.to_path_buf())))
            }
        }

        let plugins = vec![
            PluginDescriptor::new("/plugins/a.so", "A"),
            PluginDescriptor::new("/plugins/broken.so", "Broken"),
            PluginDescriptor::new("/plugins/c.so", "C"),
        ];

        let libraries = preload_libraries(&plugins, &StubLoader);
        let paths: Vec<&Path> = libraries.iter().map(|l| l.path()).collect();
        assert_eq!(paths, vec![Path::new("/plugins/a.so"), Path::new("/plugins/c.so")]);
    }
}
