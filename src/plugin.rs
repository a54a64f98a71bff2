//! The Plug-in Loader: discovers dynamic extensions in a directory and
//! exposes their prompt/builtin-intercept hooks to the core.
//!
//! Each library exports one symbol, `esh_plugin_create`, of type
//! `unsafe extern "C" fn() -> *mut dyn Plugin`; the loader calls it once
//! per library and takes ownership of the resulting trait object. A
//! library that fails to load or does not export the symbol is skipped
//! with a warning — it never aborts startup.

use std::path::Path;

use libloading::{Library, Symbol};

use crate::parser::Command;

/// The contract a plug-in exposes to the core.
pub trait Plugin {
    /// A freshly allocated prompt fragment, or `None` to contribute
    /// nothing. Contributions are concatenated left to right by
    /// registration order.
    fn make_prompt(&self) -> Option<String> {
        None
    }

    /// Inspect a command and report whether this plug-in handled it.
    fn process_builtin(&self, command: &Command) -> bool {
        let _ = command;
        false
    }
}

type CreateFn = unsafe extern "C" fn() -> *mut dyn Plugin;

/// The set of loaded plug-ins, in registration order. Libraries are kept
/// alive for as long as their plug-in trait objects are — dropping a
/// `Library` while a plug-in built from it is still live would leave the
/// plug-in's vtable pointing at unmapped code.
pub struct PluginRegistry {
    plugins: Vec<Box<dyn Plugin>>,
    libraries: Vec<Library>,
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self {
            plugins: Vec::new(),
            libraries: Vec::new(),
        }
    }

    /// Scan `dir` for dynamic libraries and load every one that exposes
    /// the plug-in entry point.
    pub fn load_dir(&mut self, dir: &Path) {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                eprintln!("esh: -p {}: {e}", dir.display());
                return;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if is_dynamic_library(&path) {
                self.load_one(&path);
            }
        }
    }

    fn load_one(&mut self, path: &Path) {
        let library = match unsafe { Library::new(path) } {
            Ok(lib) => lib,
            Err(e) => {
                eprintln!("esh: plugin {}: {e}", path.display());
                return;
            }
        };

        let create: Symbol<CreateFn> = match unsafe { library.get(b"esh_plugin_create\0") } {
            Ok(sym) => sym,
            Err(e) => {
                eprintln!("esh: plugin {}: missing esh_plugin_create: {e}", path.display());
                return;
            }
        };

        let raw = unsafe { create() };
        if raw.is_null() {
            eprintln!("esh: plugin {}: esh_plugin_create returned null", path.display());
            return;
        }

        let plugin = unsafe { Box::from_raw(raw) };
        self.plugins.push(plugin);
        self.libraries.push(library);
    }

    /// Concatenate every plug-in's prompt contribution, defaulting to
    /// `"esh> "` if none contribute.
    pub fn build_prompt(&self) -> String {
        let mut prompt = String::new();
        for plugin in &self.plugins {
            if let Some(fragment) = plugin.make_prompt() {
                prompt.push_str(&fragment);
            }
        }
        if prompt.is_empty() {
            "esh> ".to_string()
        } else {
            prompt
        }
    }

    /// Offer `command` to every plug-in in registration order; the first
    /// to claim it wins.
    pub fn intercept(&self, command: &Command) -> bool {
        self.plugins.iter().any(|plugin| plugin.process_builtin(command))
    }
}

fn is_dynamic_library(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("so") | Some("dylib") | Some("dll")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_registry_yields_default_prompt() {
        let registry = PluginRegistry::new();
        assert_eq!(registry.build_prompt(), "esh> ");
    }

    #[test]
    fn empty_registry_never_intercepts() {
        let registry = PluginRegistry::new();
        let command = Command {
            argv: vec!["ls".to_string()],
            input_redirect: None,
            output_redirect: None,
            append: false,
        };
        assert!(!registry.intercept(&command));
    }

    #[test]
    fn missing_directory_is_skipped_with_a_warning_not_a_panic() {
        let mut registry = PluginRegistry::new();
        registry.load_dir(Path::new("/nonexistent/esh-plugins-test-dir"));
        assert_eq!(registry.build_prompt(), "esh> ");
    }
}
