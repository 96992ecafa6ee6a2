//! Loaded plugin modules.
//!
//! A [`PluginModule`] is shared through `Arc`: every plugin instance that
//! uses the module holds a clone, and the module lives as long as the longest
//! holder. When the last reference goes away the module shuts its code down
//! and posts its [`ModuleId`] on the death channel it was created with. The
//! registry drains that channel on its own thread, so a module never needs a
//! pointer back into the registry.

use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI32, Ordering};

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::entry_points::{EntryPoints, InterfacePtr};
use super::loader::{NativeLibrary, NativeLibraryLoader};
use crate::error::{PluginError, Result};

static NEXT_MODULE_ID: AtomicI32 = AtomicI32::new(1);

/// Process-unique identity of a module instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ModuleId(i32);

impl ModuleId {
    /// Allocate a fresh id.
    pub fn next() -> Self {
        Self(NEXT_MODULE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw value passed across the plugin ABI.
    pub fn as_raw(self) -> i32 {
        self.0
    }
}

impl Display for ModuleId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "module#{}", self.0)
    }
}

/// Lifecycle of a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ModuleState {
    /// Created, no code attached yet
    Unloaded,
    /// Load in progress
    Loading,
    /// Code attached and initialized
    Loaded,
    /// Load was attempted and failed
    Failed,
    /// Last reference dropped, shutting down
    Unloading,
}

/// Sender half of the channel a module reports its death on.
pub(crate) type DeathNotifier = mpsc::UnboundedSender<ModuleId>;

/// Receiver half, owned by whoever tracks live modules.
pub(crate) type DeathReceiver = mpsc::UnboundedReceiver<ModuleId>;

/// Create a death channel.
pub(crate) fn death_channel() -> (DeathNotifier, DeathReceiver) {
    mpsc::unbounded_channel()
}

/// Where a loaded module's code comes from.
enum ModuleBackend {
    /// Compiled-in entry points
    Internal(EntryPoints),
    /// Shared library opened by a loader
    Library(Box<dyn NativeLibrary>),
}

struct ModuleInner {
    state: ModuleState,
    backend: Option<ModuleBackend>,
}

/// A reference-counted, loaded plugin module.
pub struct PluginModule {
    id: ModuleId,
    path: PathBuf,
    name: String,
    inner: Mutex<ModuleInner>,
    notifier: DeathNotifier,
}

impl PluginModule {
    /// Create an unloaded module bound to a plugin path.
    ///
    /// Outside this crate modules come from `PluginRegistry::new_module`, which
    /// wires them to the registry's death channel.
    pub(crate) fn new(path: impl Into<PathBuf>, name: impl Into<String>, notifier: DeathNotifier) -> Self {
        let module = Self {
            id: ModuleId::next(),
            path: path.into(),
            name: name.into(),
            inner: Mutex::new(ModuleInner {
                state: ModuleState::Unloaded,
                backend: None,
            }),
            notifier,
        };
        debug!("Created {} for {}", module.id, module.path.display());
        module
    }

    pub fn id(&self) -> ModuleId {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> ModuleState {
        self.inner.lock().state
    }

    pub fn is_loaded(&self) -> bool {
        self.state() == ModuleState::Loaded
    }

    /// Whether this module reports its death on `notifier`'s channel.
    pub(crate) fn reports_to(&self, notifier: &DeathNotifier) -> bool {
        self.notifier.same_channel(notifier)
    }

    /// Whether the module runs compiled-in code.
    pub fn is_internal(&self) -> bool {
        matches!(self.inner.lock().backend, Some(ModuleBackend::Internal(_)))
    }

    /// Attach compiled-in entry points and initialize them.
    pub fn init_as_internal(&self, entry_points: EntryPoints) -> Result<()> {
        self.begin_loading();
        match entry_points.initialize(self.id) {
            Ok(()) => {
                self.finish_loading(ModuleBackend::Internal(entry_points));
                Ok(())
            }
            Err(code) => {
                self.inner.lock().state = ModuleState::Failed;
                Err(PluginError::InitializationFailed {
                    path: self.path.clone(),
                    code,
                })
            }
        }
    }

    /// Load the module's library through `loader` and initialize it.
    pub fn init_as_library(&self, loader: &dyn NativeLibraryLoader) -> Result<()> {
        self.begin_loading();
        let library = loader
            .load(&self.path)
            .and_then(|library| library.initialize(self.id).map(|()| library));
        match library {
            Ok(library) => {
                self.finish_loading(ModuleBackend::Library(library));
                Ok(())
            }
            Err(e) => {
                self.inner.lock().state = ModuleState::Failed;
                Err(e)
            }
        }
    }

    /// Look up an interface exported by the loaded code.
    pub fn get_interface(&self, interface_name: &str) -> Option<InterfacePtr> {
        match self.inner.lock().backend.as_ref()? {
            ModuleBackend::Internal(entry_points) => (entry_points.get_interface)(interface_name),
            ModuleBackend::Library(library) => library.get_interface(interface_name),
        }
    }

    fn begin_loading(&self) {
        let mut inner = self.inner.lock();
        assert_eq!(
            inner.state,
            ModuleState::Unloaded,
            "{} ({}) initialized more than once",
            self.id,
            self.path.display()
        );
        inner.state = ModuleState::Loading;
    }

    fn finish_loading(&self, backend: ModuleBackend) {
        let mut inner = self.inner.lock();
        inner.backend = Some(backend);
        inner.state = ModuleState::Loaded;
        debug!("Loaded {} from {}", self.id, self.path.display());
    }
}

impl fmt::Debug for PluginModule {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginModule")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("name", &self.name)
            .field("state", &self.state())
            .finish()
    }
}

impl Drop for PluginModule {
    fn drop(&mut self) {
        let inner = self.inner.get_mut();
        if let Some(backend) = inner.backend.take() {
            inner.state = ModuleState::Unloading;
            match backend {
                ModuleBackend::Internal(entry_points) => (entry_points.shutdown_module)(),
                ModuleBackend::Library(library) => library.shutdown(),
            }
        }

        // The receiver disappears with the registry; nothing is left to update then.
        if self.notifier.send(self.id).is_err() {
            warn!("{} ({}) outlived its registry", self.id, self.path.display());
        }
    }
}
