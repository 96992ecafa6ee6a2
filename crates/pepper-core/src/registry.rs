//! The plugin registry.
//!
//! One registry exists per process. It is built by the process's plugin
//! subsystem and torn down with it:
//!
//! - the merged descriptor list (built-ins, then command-line plugins)
//! - the preloaded modules, owned by the registry and loaded eagerly for every
//!   in-process plugin
//! - the live modules, a non-owning index of every module currently alive,
//!   used to hand out an existing module and to enforce one module per path
//!
//! All mutation happens on the thread that created the registry. Modules may
//! be dropped anywhere; their death notifications are applied the next time
//! the registry is entered.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};

use tracing::{debug, error, info, warn};

use crate::config::{PluginSwitches, RegistryConfig};
use crate::error::PluginError;
use crate::host::{HostContext, ShutdownSignal};
use crate::plugin::builtin::BuiltinDiscovery;
use crate::plugin::command_line::{compute_command_line_plugins, ParsedPluginList};
use crate::plugin::descriptor::{find_by_path, PluginDescriptor};
use crate::plugin::loader::NativeLibraryLoader;
use crate::plugin::module::{death_channel, DeathNotifier, DeathReceiver, ModuleId, PluginModule};

/// Non-owning record of a live module.
struct LiveEntry {
    id: ModuleId,
    module: Weak<PluginModule>,
}

/// Process-wide plugin registry.
pub struct PluginRegistry {
    plugin_list: Vec<PluginDescriptor>,
    /// Owned, eagerly loaded in-process modules.
    preloaded: HashMap<PathBuf, Arc<PluginModule>>,
    /// Every live module, preloaded or not.
    live: HashMap<PathBuf, LiveEntry>,
    death_tx: DeathNotifier,
    death_rx: DeathReceiver,
    loader: Arc<dyn NativeLibraryLoader>,
    host: HostContext,
    owner: ThreadId,
}

impl PluginRegistry {
    /// Build the registry from configuration, probing the real file system.
    pub fn new(
        config: &RegistryConfig,
        host: HostContext,
        loader: Arc<dyn NativeLibraryLoader>,
    ) -> Self {
        let discovery = BuiltinDiscovery::new(config.builtin_paths());
        Self::with_discovery(&discovery, &config.switches, host, loader)
    }

    /// Build the registry from an explicit built-in discovery.
    ///
    /// Blocks until every in-process plugin has loaded or failed.
    pub fn with_discovery(
        discovery: &BuiltinDiscovery,
        switches: &PluginSwitches,
        host: HostContext,
        loader: Arc<dyn NativeLibraryLoader>,
    ) -> Self {
        Self::from_plugin_list(Self::compute_descriptor_list(discovery, switches), host, loader)
    }

    fn from_plugin_list(
        plugin_list: Vec<PluginDescriptor>,
        host: HostContext,
        loader: Arc<dyn NativeLibraryLoader>,
    ) -> Self {
        let (death_tx, death_rx) = death_channel();
        let mut registry = Self {
            plugin_list,
            preloaded: HashMap::new(),
            live: HashMap::new(),
            death_tx,
            death_rx,
            loader,
            host,
            owner: thread::current().id(),
        };
        registry.preload_modules();
        registry
    }

    /// Merge built-in and command-line plugins, built-ins first.
    ///
    /// Paths are not deduplicated across sources; lookups take the first match.
    pub fn compute_descriptor_list(
        discovery: &BuiltinDiscovery,
        switches: &PluginSwitches,
    ) -> Vec<PluginDescriptor> {
        Self::compute_descriptors(discovery, switches).plugins
    }

    /// Like [`compute_descriptor_list`](Self::compute_descriptor_list), also
    /// returning the command-line entries that were rejected.
    pub fn compute_descriptors(
        discovery: &BuiltinDiscovery,
        switches: &PluginSwitches,
    ) -> ParsedPluginList {
        let mut parsed = compute_command_line_plugins(switches);
        let mut plugins = discovery.compute(switches.enable_remoting);
        plugins.append(&mut parsed.plugins);
        parsed.plugins = plugins;
        parsed
    }

    fn preload_modules(&mut self) {
        // Each module is registered as live before it loads: a module that
        // fails to load still reports its death and must find its entry.
        let mut seen = HashSet::new();
        for index in 0..self.plugin_list.len() {
            let plugin = &self.plugin_list[index];
            if !plugin.is_preloadable() {
                continue;
            }

            // The same path may be declared by two sources; lookups resolve
            // to the first declaration, so only that one gets a module.
            if !seen.insert(plugin.path.clone()) {
                warn!(
                    "Plugin {} is declared more than once; keeping the first",
                    plugin.path.display()
                );
                continue;
            }

            let path = plugin.path.clone();
            let entry_points = plugin.internal_entry_points;
            let is_internal = plugin.is_internal;
            let module = Arc::new(PluginModule::new(
                path.clone(),
                plugin.name.clone(),
                self.death_tx.clone(),
            ));
            self.add_live_module(&path, &module);

            let loaded = if is_internal {
                match entry_points {
                    Some(entry_points) => module.init_as_internal(entry_points),
                    None => Err(PluginError::LoadFailed(format!(
                        "internal plugin {} has no entry points",
                        path.display()
                    ))),
                }
            } else {
                module.init_as_library(self.loader.as_ref())
            };

            match loaded {
                Ok(()) => {
                    info!("Preloaded plugin module {}", path.display());
                    self.preloaded.insert(path, module);
                }
                Err(e) => error!("Failed to load plugin module {}: {}", path.display(), e),
            }
        }

        self.drain_dead_modules();
    }

    /// All known plugins, in lookup order.
    pub fn plugin_list(&self) -> &[PluginDescriptor] {
        &self.plugin_list
    }

    /// First descriptor whose path matches. Linear in the number of plugins.
    pub fn get_info_for_path(&self, path: &Path) -> Option<&PluginDescriptor> {
        find_by_path(&self.plugin_list, path)
    }

    /// The live module for `path`, without taking ownership away from its holders.
    pub fn get_live_module(&mut self, path: &Path) -> Option<Arc<PluginModule>> {
        self.assert_owner_thread();
        self.drain_dead_modules();
        self.live.get(path).and_then(|entry| entry.module.upgrade())
    }

    /// Create an unloaded module that reports its death to this registry.
    pub fn new_module(&self, path: impl Into<PathBuf>, name: impl Into<String>) -> Arc<PluginModule> {
        Arc::new(PluginModule::new(path, name, self.death_tx.clone()))
    }

    /// Register a module loaded outside the registry.
    ///
    /// # Panics
    ///
    /// If a live module is already registered for `path`, or if `module` was
    /// not created by this registry's [`new_module`](Self::new_module).
    pub fn add_live_module(&mut self, path: &Path, module: &Arc<PluginModule>) {
        self.assert_owner_thread();
        self.drain_dead_modules();
        assert!(
            module.reports_to(&self.death_tx),
            "{} was not created by this registry",
            module.id()
        );
        assert!(
            !self.live.contains_key(path),
            "a live module is already registered for {}",
            path.display()
        );
        debug!("{} is live for {}", module.id(), path.display());
        self.live.insert(
            path.to_path_buf(),
            LiveEntry {
                id: module.id(),
                module: Arc::downgrade(module),
            },
        );
    }

    /// Forget a module whose last reference is gone.
    ///
    /// Only reached through the death channel, which delivers each death
    /// exactly once. Matches by module identity, not by path.
    ///
    /// # Panics
    ///
    /// If the module was never registered.
    fn module_became_dead(&mut self, id: ModuleId) {
        self.assert_owner_thread();
        let path = self
            .live
            .iter()
            .find(|(_, entry)| entry.id == id)
            .map(|(path, _)| path.clone());
        match path {
            Some(path) => {
                debug!("{} for {} is dead", id, path.display());
                self.live.remove(&path);
            }
            None => panic!("{} died but was never registered as live", id),
        }
    }

    /// Apply pending death notifications.
    fn drain_dead_modules(&mut self) {
        while let Ok(id) = self.death_rx.try_recv() {
            self.module_became_dead(id);
        }
    }

    pub fn is_preloaded(&self, path: &Path) -> bool {
        self.preloaded.contains_key(path)
    }

    /// Paths of the preloaded modules, in no particular order.
    pub fn preloaded_paths(&self) -> impl Iterator<Item = &Path> {
        self.preloaded.keys().map(PathBuf::as_path)
    }

    pub fn preloaded_count(&self) -> usize {
        self.preloaded.len()
    }

    /// Number of live modules.
    pub fn live_count(&mut self) -> usize {
        self.drain_dead_modules();
        self.live.len()
    }

    /// Runtime driving plugin IPC, as provided by the host.
    pub fn io_handle(&self) -> Option<&tokio::runtime::Handle> {
        let handle = self.host.io_handle();
        if handle.is_none() {
            warn!("No IPC runtime: the registry is not running in a plugin host");
        }
        handle
    }

    /// Process shutdown signal, as provided by the host.
    pub fn shutdown_signal(&self) -> &ShutdownSignal {
        self.host.shutdown_signal()
    }

    /// Release the preloaded modules and check that nothing else is live.
    ///
    /// Runs automatically on drop. Preloaded modules go first so that their
    /// death notifications arrive while the live map still exists.
    ///
    /// # Panics
    ///
    /// If any module is still live afterwards, i.e. someone outside the
    /// registry still holds one.
    pub fn teardown(&mut self) {
        self.assert_owner_thread();
        self.preloaded.clear();
        self.drain_dead_modules();
        assert!(
            self.live.is_empty(),
            "plugin modules still live at registry shutdown: {:?}",
            self.live.keys().collect::<Vec<_>>()
        );
        debug!("Plugin registry torn down");
    }

    /// Tear the registry down and drop it.
    pub fn shutdown(mut self) {
        self.teardown();
    }

    fn assert_owner_thread(&self) {
        debug_assert_eq!(
            thread::current().id(),
            self.owner,
            "plugin registry used off its owning thread"
        );
    }
}

impl Drop for PluginRegistry {
    fn drop(&mut self) {
        if thread::panicking() {
            return;
        }
        self.teardown();
    }
}
