//! Plugin descriptors.
//!
//! A descriptor is the immutable record of one discoverable plugin. The
//! `path` is the primary key everywhere: the registry looks descriptors and
//! live modules up by it.

use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::entry_points::EntryPoints;

/// One MIME type handled by a plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MimeType {
    /// MIME type, e.g. `application/pdf`
    pub mime_type: String,
    /// File extension without the dot, may be empty
    pub file_extension: String,
    /// Human readable description, may be empty
    pub description: String,
}

impl MimeType {
    pub fn new(
        mime_type: impl Into<String>,
        file_extension: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            mime_type: mime_type.into(),
            file_extension: file_extension.into(),
            description: description.into(),
        }
    }
}

/// Metadata for a single plugin.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluginDescriptor {
    /// Library path, or a synthetic identity such as `internal-remoting`
    pub path: PathBuf,
    /// Display name
    pub name: String,
    /// Display description
    pub description: String,
    /// Dotted version string
    pub version: String,
    /// Handled MIME types, primary first
    pub mime_types: Vec<MimeType>,
    /// Compiled into the host binary, no file on disk
    pub is_internal: bool,
    /// Must run isolated from the host; never preloaded
    pub is_out_of_process: bool,
    /// Entry points for internal plugins
    #[serde(skip)]
    pub internal_entry_points: Option<EntryPoints>,
}

impl PluginDescriptor {
    /// Create a descriptor for an on-disk plugin.
    pub fn new(path: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    /// Create a descriptor for a compiled-in plugin.
    pub fn internal(path: impl Into<PathBuf>, entry_points: EntryPoints) -> Self {
        Self {
            path: path.into(),
            is_internal: true,
            internal_entry_points: Some(entry_points),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_mime_type(mut self, mime_type: MimeType) -> Self {
        self.mime_types.push(mime_type);
        self
    }

    pub fn out_of_process(mut self, out_of_process: bool) -> Self {
        self.is_out_of_process = out_of_process;
        self
    }

    /// The primary MIME type, if any.
    pub fn primary_mime_type(&self) -> Option<&MimeType> {
        self.mime_types.first()
    }

    /// Whether this plugin declares the given MIME type.
    pub fn handles(&self, mime_type: &str) -> bool {
        self.mime_types
            .iter()
            .any(|m| m.mime_type.eq_ignore_ascii_case(mime_type))
    }

    /// Whether the registry loads this plugin in-process at construction.
    pub fn is_preloadable(&self) -> bool {
        !self.is_out_of_process
    }

    pub fn has_path(&self, path: &Path) -> bool {
        self.path == path
    }
}

/// First descriptor in `plugins` declared for `path`.
///
/// Earlier sources win: the list is ordered built-ins first.
pub fn find_by_path<'a>(plugins: &'a [PluginDescriptor], path: &Path) -> Option<&'a PluginDescriptor> {
    plugins.iter().find(|plugin| plugin.has_path(path))
}

/// Default components for a Flash version string.
const FLASH_VERSION_DEFAULTS: [&str; 4] = ["10", "2", "999", "999"];

/// A Flash-style `major.minor.build.patch` version.
///
/// Components are kept as strings: the value is only ever displayed and
/// joined back together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashVersion {
    pub major: String,
    pub minor: String,
    pub build: String,
    pub patch: String,
}

impl FlashVersion {
    /// Parse a dotted version, padding missing or empty components with
    /// `10`, `2`, `999`, `999`. Components after the fourth are dropped.
    pub fn parse(raw: &str) -> Self {
        let mut parts: Vec<&str> = raw.trim().split('.').map(str::trim).collect();
        if parts.len() > FLASH_VERSION_DEFAULTS.len() {
            tracing::debug!("Ignoring extra Flash version components in {:?}", raw);
            parts.truncate(FLASH_VERSION_DEFAULTS.len());
        }

        let component = |i: usize| -> String {
            match parts.get(i) {
                Some(part) if !part.is_empty() => (*part).to_string(),
                _ => FLASH_VERSION_DEFAULTS[i].to_string(),
            }
        };

        Self {
            major: component(0),
            minor: component(1),
            build: component(2),
            patch: component(3),
        }
    }

    /// Plugin description in the form `"<name> <major>.<minor> r<build>"`.
    pub fn description_for(&self, name: &str) -> String {
        format!("{} {}.{} r{}", name, self.major, self.minor, self.build)
    }
}

impl Display for FlashVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}.{}", self.major, self.minor, self.build, self.patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flash_version_padding() {
        assert_eq!(FlashVersion::parse("").to_string(), "10.2.999.999");
        assert_eq!(FlashVersion::parse("11").to_string(), "11.2.999.999");
        assert_eq!(FlashVersion::parse("11.5").to_string(), "11.5.999.999");
        assert_eq!(FlashVersion::parse("11.5.31").to_string(), "11.5.31.999");
        assert_eq!(FlashVersion::parse("11.5.31.2").to_string(), "11.5.31.2");
    }

    #[test]
    fn test_flash_version_empty_components() {
        assert_eq!(FlashVersion::parse(".3").to_string(), "10.3.999.999");
        assert_eq!(FlashVersion::parse("11..7").to_string(), "11.2.7.999");
        assert_eq!(FlashVersion::parse("1.2.3.4.5").to_string(), "1.2.3.4");
    }

    #[test]
    fn test_flash_description() {
        let version = FlashVersion::parse("10.2.154");
        assert_eq!(
            version.description_for("Shockwave Flash"),
            "Shockwave Flash 10.2 r154"
        );
    }

    #[test]
    fn test_descriptor_builder() {
        let desc = PluginDescriptor::new("/opt/plugins/libfoo.so", "Foo")
            .with_description("Foo plugin")
            .with_version("1.0")
            .with_mime_type(MimeType::new("application/x-foo", "foo", "Foo file"))
            .with_mime_type(MimeType::new("application/x-bar", "", ""));

        assert_eq!(desc.primary_mime_type().unwrap().mime_type, "application/x-foo");
        assert!(desc.handles("APPLICATION/X-BAR"));
        assert!(!desc.handles("text/plain"));
        assert!(desc.is_preloadable());
        assert!(!desc.is_internal);
        assert!(desc.has_path(Path::new("/opt/plugins/libfoo.so")));
    }

    #[test]
    fn test_find_by_path_takes_first_match() {
        let plugins = vec![
            PluginDescriptor::new("/a/b", "First"),
            PluginDescriptor::new("/a/c", "Other"),
            PluginDescriptor::new("/a/b", "Second"),
        ];
        assert_eq!(find_by_path(&plugins, Path::new("/a/b")).unwrap().name, "First");
        assert!(find_by_path(&plugins, Path::new("/a/d")).is_none());
    }

    #[test]
    fn test_descriptor_serialization_skips_entry_points() {
        let desc = PluginDescriptor::new("/a/b", "Foo").out_of_process(true);
        let json = serde_json::to_value(&desc).unwrap();
        assert_eq!(json["path"], "/a/b");
        assert_eq!(json["is_out_of_process"], true);
        assert!(json.get("internal_entry_points").is_none());
    }
}
