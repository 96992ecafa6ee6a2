//! Plugin list parsing through the public switches.

use std::path::PathBuf;

use pepper_core::plugin::command_line::{FLASH_PLUGIN_NAME, FLASH_PLUGIN_SWF_MIME_TYPE};
use pepper_core::plugin::{compute_command_line_plugins, parse_plugin_list, RejectReason};
use pepper_core::prelude::*;

#[test]
fn test_whitespace_around_every_delimiter() {
    let parsed = parse_plugin_list(
        "  /opt/a.so #  Alpha # The alpha plugin # 2.0 ;  text/x-alpha ; text/x-a  ",
        false,
    );

    assert!(parsed.rejected.is_empty());
    let plugin = &parsed.plugins[0];
    assert_eq!(plugin.path, PathBuf::from("/opt/a.so"));
    assert_eq!(plugin.name, "Alpha");
    assert_eq!(plugin.description, "The alpha plugin");
    assert_eq!(plugin.version, "2.0");
    let mime_types: Vec<&str> = plugin.mime_types.iter().map(|m| m.mime_type.as_str()).collect();
    assert_eq!(mime_types, vec!["text/x-alpha", "text/x-a"]);
    assert_eq!(plugin.primary_mime_type().unwrap().mime_type, "text/x-alpha");
    assert!(plugin.handles("text/x-a"));
}

#[test]
fn test_entry_order_is_preserved() {
    let parsed = parse_plugin_list("/c;text/x-c,/a;text/x-a,/b;text/x-b", false);
    let paths: Vec<PathBuf> = parsed.plugins.into_iter().map(|p| p.path).collect();
    assert_eq!(
        paths,
        vec![PathBuf::from("/c"), PathBuf::from("/a"), PathBuf::from("/b")]
    );
}

#[test]
fn test_duplicate_paths_are_kept() {
    let parsed = parse_plugin_list("/same;text/x-one,/same;text/x-two", false);
    assert_eq!(parsed.plugins.len(), 2);
}

#[test]
fn test_empty_mime_types_do_not_count() {
    let parsed = parse_plugin_list("/a/b;;  ;", false);
    assert!(parsed.plugins.is_empty());
    assert_eq!(parsed.rejected[0].reason, RejectReason::MissingMimeType);
}

#[test]
fn test_out_of_process_applies_to_whole_list() {
    let switches = PluginSwitches {
        register_plugins: Some("/a;text/x-a,/b;text/x-b".to_string()),
        out_of_process: true,
        flash_path: Some(PathBuf::from("/opt/flash.so")),
        flash_version: Some("12.0.0.77".to_string()),
        ..Default::default()
    };

    let parsed = compute_command_line_plugins(&switches);
    assert_eq!(parsed.plugins.len(), 3);
    assert!(parsed.plugins.iter().all(|p| p.is_out_of_process));

    let flash = &parsed.plugins[0];
    assert_eq!(flash.name, FLASH_PLUGIN_NAME);
    assert_eq!(flash.version, "12.0.0.77");
    assert_eq!(flash.description, "Shockwave Flash 12.0 r0");
    assert!(flash.handles(FLASH_PLUGIN_SWF_MIME_TYPE));
}

#[test]
fn test_flash_version_padding() {
    let cases = [
        ("", "10.2.999.999"),
        ("11", "11.2.999.999"),
        ("11.1", "11.1.999.999"),
        ("11.1.102", "11.1.102.999"),
        ("11..102", "11.2.102.999"),
        ("11.1.102.55.9", "11.1.102.55"),
    ];

    for (raw, expected) in cases {
        let switches = PluginSwitches {
            flash_path: Some(PathBuf::from("/opt/flash.so")),
            flash_version: Some(raw.to_string()),
            ..Default::default()
        };
        let parsed = compute_command_line_plugins(&switches);
        assert_eq!(parsed.plugins[0].version, expected, "raw version {:?}", raw);
    }
}

#[test]
fn test_descriptor_serializes_without_entry_points() {
    let plugin = parse_plugin_list("/a/b#Foo;text/x-foo", false).plugins.remove(0);
    let value = serde_json::to_value(&plugin).unwrap();
    assert_eq!(value["name"], "Foo");
    assert!(value.get("internal_entry_points").is_none());

    let back: PluginDescriptor = serde_json::from_value(value).unwrap();
    assert_eq!(back.path, plugin.path);
    assert!(back.internal_entry_points.is_none());
}

#[test]
fn test_compute_descriptors_keeps_rejections() {
    let switches = PluginSwitches {
        register_plugins: Some("/a;text/x-a, /b, #x;text/x-c".to_string()),
        ..Default::default()
    };
    let discovery = BuiltinDiscovery::new(BuiltinPaths::default());

    let parsed = PluginRegistry::compute_descriptors(&discovery, &switches);
    assert_eq!(parsed.plugins.len(), 1);
    let reasons: Vec<RejectReason> = parsed.rejected.iter().map(|r| r.reason).collect();
    assert_eq!(reasons, vec![RejectReason::MissingMimeType, RejectReason::EmptyPath]);
}
