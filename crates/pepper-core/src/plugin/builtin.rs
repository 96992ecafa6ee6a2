//! Built-in plugin discovery.
//!
//! Some built-ins ship as separate libraries next to the host binary (PDF
//! viewer, Native Client), others are compiled in (remoting). On-disk
//! built-ins are only listed when their file exists. Once a file has been
//! seen it is assumed to stay there: these files are installed with the
//! binary, and later checks may run inside a sandbox that cannot see the
//! file system at all.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use super::descriptor::{MimeType, PluginDescriptor};
use super::entry_points::EntryPoints;

pub const PDF_PLUGIN_NAME: &str = "PDF Viewer";
pub const PDF_PLUGIN_MIME_TYPE: &str = "application/pdf";
pub const PDF_PLUGIN_EXTENSION: &str = "pdf";
pub const PDF_PLUGIN_DESCRIPTION: &str = "Portable Document Format";
const PDF_PLUGIN_LIBRARY: &str = "pdf";

pub const NACL_PLUGIN_NAME: &str = "Native Client";
pub const NACL_PLUGIN_MIME_TYPE: &str = "application/x-nacl";
pub const NACL_PLUGIN_EXTENSION: &str = "nexe";
pub const NACL_PLUGIN_DESCRIPTION: &str = "Native Client Executable";
const NACL_PLUGIN_LIBRARY: &str = "ppGoogleNaClPlugin";

pub const REMOTING_PLUGIN_PATH: &str = "internal-remoting";
pub const REMOTING_PLUGIN_MIME_TYPE: &str = "pepper-application/x-chromoting";

/// Platform file name for a plugin library, e.g. `libpdf.so` or `pdf.dll`.
pub fn library_file_name(stem: &str) -> String {
    format!(
        "{}{}{}",
        std::env::consts::DLL_PREFIX,
        stem,
        std::env::consts::DLL_SUFFIX
    )
}

/// Checks whether a file exists.
pub trait FileProbe: Send + Sync {
    fn exists(&self, path: &Path) -> bool;
}

/// Probe backed by the real file system.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsProbe;

impl FileProbe for FsProbe {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

/// On-disk built-in plugins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinKind {
    Pdf,
    NaCl,
}

/// Resolved locations of the on-disk built-ins. `None` means the host has no
/// location for that plugin at all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuiltinPaths {
    pub pdf: Option<PathBuf>,
    pub nacl: Option<PathBuf>,
}

impl BuiltinPaths {
    /// Resolve both built-ins inside `dir` using platform library naming.
    pub fn from_plugin_dir(dir: &Path) -> Self {
        Self {
            pdf: Some(dir.join(library_file_name(PDF_PLUGIN_LIBRARY))),
            nacl: Some(dir.join(library_file_name(NACL_PLUGIN_LIBRARY))),
        }
    }

    fn get(&self, kind: BuiltinKind) -> Option<&Path> {
        match kind {
            BuiltinKind::Pdf => self.pdf.as_deref(),
            BuiltinKind::NaCl => self.nacl.as_deref(),
        }
    }
}

/// Enumerates built-in plugins.
pub struct BuiltinDiscovery {
    paths: BuiltinPaths,
    probe: Arc<dyn FileProbe>,
    remoting: Option<EntryPoints>,
    /// Built-ins whose file has already been seen.
    confirmed: Mutex<HashSet<BuiltinKind>>,
}

impl BuiltinDiscovery {
    pub fn new(paths: BuiltinPaths) -> Self {
        Self::with_probe(paths, Arc::new(FsProbe))
    }

    pub fn with_probe(paths: BuiltinPaths, probe: Arc<dyn FileProbe>) -> Self {
        Self {
            paths,
            probe,
            remoting: None,
            confirmed: Mutex::new(HashSet::new()),
        }
    }

    /// Supply the compiled-in remoting plugin's entry points.
    pub fn with_remoting(mut self, entry_points: EntryPoints) -> Self {
        self.remoting = Some(entry_points);
        self
    }

    /// List the built-ins that are currently available.
    pub fn compute(&self, enable_remoting: bool) -> Vec<PluginDescriptor> {
        let mut plugins = Vec::new();

        if let Some(path) = self.present_path(BuiltinKind::Pdf) {
            plugins.push(
                PluginDescriptor::new(path, PDF_PLUGIN_NAME).with_mime_type(MimeType::new(
                    PDF_PLUGIN_MIME_TYPE,
                    PDF_PLUGIN_EXTENSION,
                    PDF_PLUGIN_DESCRIPTION,
                )),
            );
        }

        if let Some(path) = self.present_path(BuiltinKind::NaCl) {
            plugins.push(
                PluginDescriptor::new(path, NACL_PLUGIN_NAME).with_mime_type(MimeType::new(
                    NACL_PLUGIN_MIME_TYPE,
                    NACL_PLUGIN_EXTENSION,
                    NACL_PLUGIN_DESCRIPTION,
                )),
            );
        }

        if enable_remoting {
            match self.remoting {
                Some(entry_points) if cfg!(feature = "remoting") => {
                    plugins.push(
                        PluginDescriptor::internal(REMOTING_PLUGIN_PATH, entry_points)
                            .with_mime_type(MimeType::new(REMOTING_PLUGIN_MIME_TYPE, "", "")),
                    );
                }
                Some(_) => debug!("Remoting requested but not compiled in"),
                None => warn!("Remoting requested but no entry points were supplied"),
            }
        }

        plugins
    }

    /// Path of an on-disk built-in if its file is known to exist.
    fn present_path(&self, kind: BuiltinKind) -> Option<PathBuf> {
        let path = self.paths.get(kind)?;

        let mut confirmed = self.confirmed.lock();
        if !confirmed.contains(&kind) {
            if !self.probe.exists(path) {
                debug!("Built-in {:?} plugin not found at {}", kind, path.display());
                return None;
            }
            confirmed.insert(kind);
        }
        Some(path.to_path_buf())
    }
}
