//! Entry-point table for compiled-in plugins.
//!
//! Built-in plugins have no library on disk. Instead they hand the registry
//! the same three functions a shared library would export.

use std::ffi::c_void;
use std::ptr::NonNull;

use super::module::ModuleId;

/// Return code for a successful `initialize_module` call.
pub const PP_OK: i32 = 0;

/// Opaque pointer to an interface vtable exposed by a module.
pub type InterfacePtr = NonNull<c_void>;

/// Looks up an interface by name. `None` means the module does not implement it.
pub type GetInterfaceFn = fn(interface_name: &str) -> Option<InterfacePtr>;

/// Initializes the module. Returns [`PP_OK`] on success.
pub type InitializeModuleFn = fn(module_id: ModuleId) -> i32;

/// Shuts the module down. Called once, when the module is unloaded.
pub type ShutdownModuleFn = fn();

/// The fixed triple of functions a compiled-in plugin supplies.
#[derive(Debug, Clone, Copy)]
pub struct EntryPoints {
    pub get_interface: GetInterfaceFn,
    pub initialize_module: InitializeModuleFn,
    pub shutdown_module: ShutdownModuleFn,
}

impl EntryPoints {
    /// Run `initialize_module`, mapping the return code to a `Result`.
    pub fn initialize(&self, module_id: ModuleId) -> std::result::Result<(), i32> {
        match (self.initialize_module)(module_id) {
            PP_OK => Ok(()),
            code => Err(code),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_interfaces(_: &str) -> Option<InterfacePtr> {
        None
    }

    fn init_ok(_: ModuleId) -> i32 {
        PP_OK
    }

    fn init_fails(_: ModuleId) -> i32 {
        -1
    }

    fn shutdown() {}

    #[test]
    fn test_initialize_result() {
        let ok = EntryPoints {
            get_interface: no_interfaces,
            initialize_module: init_ok,
            shutdown_module: shutdown,
        };
        assert!(ok.initialize(ModuleId::next()).is_ok());

        let failing = EntryPoints {
            initialize_module: init_fails,
            ..ok
        };
        assert_eq!(failing.initialize(ModuleId::next()), Err(-1));
        assert!((failing.get_interface)("PPP_Instance;1.0").is_none());
    }
}
