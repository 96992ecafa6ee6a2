//! Plugins declared by the operator on the command line.
//!
//! The plugin list switch uses this grammar, with optional whitespace around
//! every delimiter:
//!
//! ```text
//! plugin-list   = entry *( "," entry )
//! entry         = file-and-name 1*( ";" mime-type )
//! file-and-name = path [ "#" name [ "#" description [ "#" version ] ] ]
//! ```
//!
//! A malformed entry is logged and dropped; the rest of the list still loads.

use std::fmt::{self, Display, Formatter};
use std::path::Path;

use tracing::warn;

use super::descriptor::{FlashVersion, MimeType, PluginDescriptor};
use crate::config::PluginSwitches;

pub const FLASH_PLUGIN_NAME: &str = "Shockwave Flash";
pub const FLASH_PLUGIN_SWF_MIME_TYPE: &str = "application/x-shockwave-flash";
pub const FLASH_PLUGIN_SWF_EXTENSION: &str = "swf";
pub const FLASH_PLUGIN_SWF_DESCRIPTION: &str = "Shockwave Flash";
pub const FLASH_PLUGIN_SPL_MIME_TYPE: &str = "application/futuresplash";
pub const FLASH_PLUGIN_SPL_EXTENSION: &str = "spl";
pub const FLASH_PLUGIN_SPL_DESCRIPTION: &str = "FutureSplash Player";

/// Why an entry was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// No `;mime-type` part
    MissingMimeType,
    /// Nothing before the first `#`
    EmptyPath,
}

impl Display for RejectReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::MissingMimeType => write!(f, "required mime-type not found"),
            RejectReason::EmptyPath => write!(f, "plugin path is empty"),
        }
    }
}

/// An entry that was dropped while parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedEntry {
    pub entry: String,
    pub reason: RejectReason,
}

/// Result of parsing a plugin list.
#[derive(Debug, Clone, Default)]
pub struct ParsedPluginList {
    pub plugins: Vec<PluginDescriptor>,
    pub rejected: Vec<RejectedEntry>,
}

impl ParsedPluginList {
    fn extend(&mut self, other: ParsedPluginList) {
        self.plugins.extend(other.plugins);
        self.rejected.extend(other.rejected);
    }
}

/// Parse the plugin list switch. Never fails; bad entries end up in `rejected`.
pub fn parse_plugin_list(value: &str, out_of_process: bool) -> ParsedPluginList {
    let mut parsed = ParsedPluginList::default();
    if value.trim().is_empty() {
        return parsed;
    }

    for entry in value.split(',').map(str::trim) {
        match parse_entry(entry, out_of_process) {
            Ok(plugin) => parsed.plugins.push(plugin),
            Err(reason) => {
                warn!("Ignoring plugin entry {:?}: {}", entry, reason);
                parsed.rejected.push(RejectedEntry {
                    entry: entry.to_string(),
                    reason,
                });
            }
        }
    }

    parsed
}

fn parse_entry(entry: &str, out_of_process: bool) -> Result<PluginDescriptor, RejectReason> {
    let mut parts = entry.split(';').map(str::trim);
    let file_and_name = parts.next().unwrap_or_default();
    let mime_types: Vec<&str> = parts.filter(|m| !m.is_empty()).collect();
    if mime_types.is_empty() {
        return Err(RejectReason::MissingMimeType);
    }

    let mut fields = file_and_name.split('#').map(str::trim);
    let path = fields.next().unwrap_or_default();
    if path.is_empty() {
        return Err(RejectReason::EmptyPath);
    }

    let mut plugin = PluginDescriptor::new(path, fields.next().unwrap_or_default())
        .out_of_process(out_of_process);
    if let Some(description) = fields.next() {
        plugin.description = description.to_string();
    }
    if let Some(version) = fields.next() {
        plugin.version = version.to_string();
    }

    // Command-line MIME types carry no extension; they reuse the plugin description.
    for mime_type in mime_types {
        let mime_type = MimeType::new(mime_type, "", plugin.description.clone());
        plugin.mime_types.push(mime_type);
    }

    Ok(plugin)
}

/// Descriptor for a Flash plugin given its path and raw dotted version.
pub fn flash_descriptor(path: &Path, raw_version: &str, out_of_process: bool) -> PluginDescriptor {
    let version = FlashVersion::parse(raw_version);
    PluginDescriptor::new(path, FLASH_PLUGIN_NAME)
        .with_description(version.description_for(FLASH_PLUGIN_NAME))
        .with_version(version.to_string())
        .with_mime_type(MimeType::new(
            FLASH_PLUGIN_SWF_MIME_TYPE,
            FLASH_PLUGIN_SWF_EXTENSION,
            FLASH_PLUGIN_SWF_DESCRIPTION,
        ))
        .with_mime_type(MimeType::new(
            FLASH_PLUGIN_SPL_MIME_TYPE,
            FLASH_PLUGIN_SPL_EXTENSION,
            FLASH_PLUGIN_SPL_DESCRIPTION,
        ))
        .out_of_process(out_of_process)
}

/// All plugins the switches declare: Flash first, then the plugin list.
pub fn compute_command_line_plugins(switches: &PluginSwitches) -> ParsedPluginList {
    let mut parsed = ParsedPluginList::default();

    if let Some(flash_path) = switches
        .flash_path
        .as_deref()
        .filter(|p| !p.as_os_str().is_empty())
    {
        let version = switches.flash_version.as_deref().unwrap_or_default();
        parsed
            .plugins
            .push(flash_descriptor(flash_path, version, switches.out_of_process));
    }

    if let Some(list) = switches.register_plugins.as_deref() {
        parsed.extend(parse_plugin_list(list, switches.out_of_process));
    }

    parsed
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_full_entry() {
        let parsed = parse_plugin_list("/a/b#Foo#Desc#1.2.3;text/x-foo", false);
        assert!(parsed.rejected.is_empty());
        assert_eq!(parsed.plugins.len(), 1);

        let plugin = &parsed.plugins[0];
        assert_eq!(plugin.path, PathBuf::from("/a/b"));
        assert_eq!(plugin.name, "Foo");
        assert_eq!(plugin.description, "Desc");
        assert_eq!(plugin.version, "1.2.3");
        assert_eq!(
            plugin.mime_types,
            vec![MimeType::new("text/x-foo", "", "Desc")]
        );
        assert!(!plugin.is_internal);
        assert!(!plugin.is_out_of_process);
    }

    #[test]
    fn test_entry_without_mime_type_is_rejected() {
        let parsed = parse_plugin_list("/a/b", false);
        assert!(parsed.plugins.is_empty());
        assert_eq!(
            parsed.rejected,
            vec![RejectedEntry {
                entry: "/a/b".to_string(),
                reason: RejectReason::MissingMimeType,
            }]
        );
    }

    #[test]
    fn test_bad_entry_does_not_abort_list() {
        let parsed = parse_plugin_list(
            "/a/one;text/x-one , /a/two , #NoPath;text/x-three, /a/four#Four ; text/x-four ; text/x-4",
            true,
        );
        let paths: Vec<_> = parsed.plugins.iter().map(|p| p.path.clone()).collect();
        assert_eq!(paths, vec![PathBuf::from("/a/one"), PathBuf::from("/a/four")]);
        assert_eq!(parsed.rejected.len(), 2);
        assert_eq!(parsed.rejected[0].reason, RejectReason::MissingMimeType);
        assert_eq!(parsed.rejected[1].reason, RejectReason::EmptyPath);

        let four = &parsed.plugins[1];
        assert_eq!(four.name, "Four");
        assert_eq!(four.mime_types.len(), 2);
        assert_eq!(four.mime_types[1].mime_type, "text/x-4");
        assert!(parsed.plugins.iter().all(|p| p.is_out_of_process));
    }

    #[test]
    fn test_optional_fields() {
        let parsed = parse_plugin_list("/a/b#Foo;text/x-foo", false);
        let plugin = &parsed.plugins[0];
        assert_eq!(plugin.name, "Foo");
        assert!(plugin.description.is_empty());
        assert!(plugin.version.is_empty());
        assert!(plugin.mime_types[0].description.is_empty());
    }

    #[test]
    fn test_empty_value() {
        let parsed = parse_plugin_list("   ", false);
        assert!(parsed.plugins.is_empty());
        assert!(parsed.rejected.is_empty());
    }

    #[test]
    fn test_flash_descriptor() {
        let plugin = flash_descriptor(Path::new("/opt/flash/libpepflash.so"), "11.5", true);
        assert_eq!(plugin.name, FLASH_PLUGIN_NAME);
        assert_eq!(plugin.version, "11.5.999.999");
        assert_eq!(plugin.description, "Shockwave Flash 11.5 r999");
        assert_eq!(plugin.mime_types.len(), 2);
        assert_eq!(plugin.mime_types[0].file_extension, "swf");
        assert_eq!(plugin.mime_types[1].file_extension, "spl");
        assert!(plugin.is_out_of_process);
    }

    #[test]
    fn test_command_line_order() {
        let switches = PluginSwitches {
            register_plugins: Some("/a/b;text/x-foo".to_string()),
            flash_path: Some(PathBuf::from("/opt/flash/libpepflash.so")),
            flash_version: None,
            ..Default::default()
        };

        let parsed = compute_command_line_plugins(&switches);
        assert_eq!(parsed.plugins.len(), 2);
        assert_eq!(parsed.plugins[0].name, FLASH_PLUGIN_NAME);
        assert_eq!(parsed.plugins[0].version, "10.2.999.999");
        assert_eq!(parsed.plugins[1].path, PathBuf::from("/a/b"));
    }

    #[test]
    fn test_empty_flash_path_is_ignored() {
        let switches = PluginSwitches {
            flash_path: Some(PathBuf::new()),
            ..Default::default()
        };
        assert!(compute_command_line_plugins(&switches).plugins.is_empty());
    }
}
