//! Command-line interface for the Pepper plugin registry.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use pepper_core::config::{switches, RegistryConfig};
use pepper_core::plugin::{find_by_path, ParsedPluginList};
use pepper_core::prelude::*;

/// Pepper plugin registry - inspect and load native plugins.
#[derive(Parser, Debug)]
#[command(name = "pepper")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Action to perform.
    #[command(subcommand)]
    command: Command,

    /// TOML configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the on-disk built-in plugins.
    #[arg(long, global = true)]
    plugin_dir: Option<PathBuf>,

    /// Plugin list: `path[#name[#description[#version]]];mime-type[;...]`, comma separated.
    #[arg(long = switches::REGISTER_PEPPER_PLUGINS, global = true)]
    register_plugins: Option<String>,

    /// Run command-line plugins out of process.
    #[arg(long = switches::PPAPI_OUT_OF_PROCESS, global = true)]
    out_of_process: bool,

    /// Path of a Flash plugin library.
    #[arg(long = switches::PPAPI_FLASH_PATH, global = true)]
    flash_path: Option<PathBuf>,

    /// Dotted version of the Flash plugin.
    #[arg(long = switches::PPAPI_FLASH_VERSION, global = true)]
    flash_version: Option<String>,

    /// List the compiled-in remoting plugin.
    #[arg(long = switches::ENABLE_REMOTING, global = true)]
    enable_remoting: bool,

    /// Print machine-readable JSON.
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Command {
    /// List every known plugin without loading anything.
    List,
    /// Show the plugin registered for a path.
    Info {
        /// Plugin path as it appears in the list.
        #[arg(required = true)]
        path: PathBuf,
    },
    /// Build the registry, preloading in-process plugins, and report the result.
    Load,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = build_config(&args)?;
    tracing::debug!("Resolved configuration: {:?}", config);
    match &args.command {
        Command::List => list(&config, &args),
        Command::Info { path } => info(&config, path, args.json),
        Command::Load => load(&config, args.json),
    }
}

fn init_logging(verbose: bool) {
    let json_logging = std::env::var("PEPPER_LOG_JSON")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(false);

    let default_level = if verbose { "debug" } else { "warn" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    // Logs go to stderr; stdout carries command output.
    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .compact()
            .with_writer(std::io::stderr)
            .init();
    }
}

/// Defaults, then the TOML file, then the environment, then flags.
fn build_config(args: &Args) -> Result<RegistryConfig> {
    let mut config = match &args.config {
        Some(path) => RegistryConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => RegistryConfig::default(),
    };
    config.apply_env();

    if let Some(dir) = &args.plugin_dir {
        config.plugin_dir = Some(dir.clone());
    }
    let switches = &mut config.switches;
    if let Some(list) = &args.register_plugins {
        switches.register_plugins = Some(list.clone());
    }
    if args.out_of_process {
        switches.out_of_process = true;
    }
    if let Some(path) = &args.flash_path {
        switches.flash_path = Some(path.clone());
    }
    if let Some(version) = &args.flash_version {
        switches.flash_version = Some(version.clone());
    }
    if args.enable_remoting {
        switches.enable_remoting = true;
    }

    Ok(config)
}

fn compute_descriptors(config: &RegistryConfig) -> ParsedPluginList {
    let discovery = BuiltinDiscovery::new(config.builtin_paths());
    PluginRegistry::compute_descriptors(&discovery, &config.switches)
}

fn list(config: &RegistryConfig, args: &Args) -> Result<()> {
    let ParsedPluginList { plugins, rejected } = compute_descriptors(config);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&plugins)?);
        return Ok(());
    }

    if plugins.is_empty() {
        println!("No plugins registered.");
    }
    for plugin in &plugins {
        print_summary(plugin);
    }

    if args.verbose {
        for rejected in &rejected {
            println!("Ignored entry {:?}: {}", rejected.entry, rejected.reason);
        }
    }
    Ok(())
}

fn info(config: &RegistryConfig, path: &Path, json: bool) -> Result<()> {
    let plugins = compute_descriptors(config).plugins;
    let plugin = find_by_path(&plugins, path)
        .with_context(|| format!("No plugin registered for {}", path.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(plugin)?);
        return Ok(());
    }

    println!("Path:            {}", plugin.path.display());
    println!("Name:            {}", plugin.name);
    println!("Description:     {}", plugin.description);
    println!("Version:         {}", plugin.version);
    println!("Internal:        {}", plugin.is_internal);
    println!("Out of process:  {}", plugin.is_out_of_process);
    println!("MIME types:");
    for mime_type in &plugin.mime_types {
        println!(
            "  {:<40} {:<8} {}",
            mime_type.mime_type, mime_type.file_extension, mime_type.description
        );
    }
    Ok(())
}

#[derive(Serialize)]
struct LoadReport<'a> {
    path: &'a Path,
    name: &'a str,
    out_of_process: bool,
    preloaded: bool,
}

fn load(config: &RegistryConfig, json: bool) -> Result<()> {
    let registry = PluginRegistry::new(
        config,
        HostContext::current(),
        Arc::new(LibloadingLoader::new()),
    );

    let reports: Vec<LoadReport<'_>> = registry
        .plugin_list()
        .iter()
        .map(|plugin| LoadReport {
            path: &plugin.path,
            name: &plugin.name,
            out_of_process: plugin.is_out_of_process,
            preloaded: registry.is_preloaded(&plugin.path),
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for report in &reports {
            let status = match (report.preloaded, report.out_of_process) {
                (true, _) => "preloaded",
                (false, true) => "out of process",
                (false, false) => "failed",
            };
            println!("{:<16} {}", status, report.path.display());
        }
        println!(
            "{} of {} plugins preloaded",
            registry.preloaded_count(),
            reports.len()
        );
    }

    drop(reports);
    registry.shutdown();
    Ok(())
}

fn print_summary(plugin: &PluginDescriptor) {
    let mime_types: Vec<&str> = plugin
        .mime_types
        .iter()
        .map(|m| m.mime_type.as_str())
        .collect();
    let name = if plugin.name.is_empty() {
        "<unnamed>"
    } else {
        plugin.name.as_str()
    };
    println!(
        "{}  {}  [{}]",
        name,
        plugin.path.display(),
        mime_types.join(", ")
    );
}
