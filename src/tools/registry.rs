//! Plugin registry
//!
//! Owns every known manifest plus the loaded module of each enabled plugin.
//! All operations here log failures and return a sentinel; only invocation
//! (see [`crate::tools::executor`]) propagates errors.

use crate::errors::{AlfredError, Result};
use crate::tools::implementations::{write_sample_plugins, ScriptPlugin};
use crate::tools::security::EntryJail;
use crate::tools::types::{Plugin, PluginManifest, PluginTable, MANIFEST_FILE};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// A registered manifest and the directory it was read from
#[derive(Debug, Clone)]
pub struct PluginEntry {
    pub manifest: PluginManifest,
    pub dir: PathBuf,
}

/// Registry of discovered plugins
pub struct PluginRegistry {
    plugin_dir: PathBuf,
    table: PluginTable,
    plugins: BTreeMap<String, PluginEntry>,
    modules: HashMap<String, Arc<dyn Plugin>>,
}

impl PluginRegistry {
    /// Create the registry and discover everything under `plugin_dir`
    pub fn new(plugin_dir: impl Into<PathBuf>, table: PluginTable) -> Result<Self> {
        let plugin_dir = plugin_dir.into();
        std::fs::create_dir_all(&plugin_dir)?;

        let mut registry = Self {
            plugin_dir,
            table,
            plugins: BTreeMap::new(),
            modules: HashMap::new(),
        };
        registry.discover();
        Ok(registry)
    }

    /// Scan the plugin root; returns how many manifests were registered
    pub fn discover(&mut self) -> usize {
        let entries = match std::fs::read_dir(&self.plugin_dir) {
            Ok(entries) => entries,
            Err(e) => {
                error!(dir = %self.plugin_dir.display(), "Cannot scan plugin directory: {}", e);
                return 0;
            }
        };

        let mut dirs: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| !is_hidden(path))
            .filter(|path| path.is_dir() && path.join(MANIFEST_FILE).is_file())
            .collect();
        dirs.sort();

        let registered = dirs.iter().filter(|dir| self.load_plugin(dir)).count();
        info!(
            registered,
            loaded = self.modules.len(),
            "Discovered plugins in {}",
            self.plugin_dir.display()
        );
        registered
    }

    /// Register the plugin in `dir` and load it when enabled
    ///
    /// Returns false only when the manifest could not be read. A plugin
    /// whose module fails to load stays registered.
    pub fn load_plugin(&mut self, dir: &Path) -> bool {
        let manifest = match PluginManifest::from_file(&dir.join(MANIFEST_FILE)) {
            Ok(m) => m,
            Err(e) => {
                warn!(dir = %dir.display(), "Skipping plugin: {}", e);
                return false;
            }
        };

        let name = manifest.name.clone();
        let enabled = manifest.enabled;
        if let Some(previous) = self.plugins.get(&name) {
            if previous.dir != dir {
                warn!(plugin = %name, "Plugin name already registered from {}, replacing", previous.dir.display());
            }
        }

        self.modules.remove(&name);
        self.plugins.insert(
            name.clone(),
            PluginEntry {
                manifest,
                dir: dir.to_path_buf(),
            },
        );

        if enabled {
            self.load_module(&name);
        }
        debug!(plugin = %name, enabled, "Registered plugin");
        true
    }

    /// Build the module for a registered plugin
    fn load_module(&mut self, name: &str) -> bool {
        let Some(entry) = self.plugins.get(name) else {
            return false;
        };

        match self.build_module(entry) {
            Ok(module) => {
                self.modules.insert(name.to_string(), module);
                info!(plugin = %name, "Loaded plugin");
                true
            }
            Err(e) => {
                error!(plugin = %name, "Failed to load plugin: {}", e);
                false
            }
        }
    }

    fn build_module(&self, entry: &PluginEntry) -> Result<Arc<dyn Plugin>> {
        let manifest = &entry.manifest;
        let entry_file = EntryJail::new(&entry.dir)?.resolve(&manifest.entry_point)?;

        if let Some(factory) = self.table.get(&manifest.name) {
            return factory(manifest, &entry_file);
        }
        if !manifest.methods.is_empty() {
            return Ok(Arc::new(ScriptPlugin::new(
                manifest.name.clone(),
                entry_file,
                manifest.methods.clone(),
            )));
        }
        Err(AlfredError::Manifest(format!(
            "no runtime for plugin {}: not in the plugin table and no methods declared",
            manifest.name
        )))
    }

    /// Enable or disable a plugin, persisting its manifest first
    pub fn toggle(&mut self, name: &str, enabled: bool) -> bool {
        let Some(entry) = self.plugins.get(name) else {
            error!(plugin = %name, "Cannot toggle unknown plugin");
            return false;
        };

        let mut updated = entry.manifest.clone();
        updated.enabled = enabled;
        if let Err(e) = updated.save(&entry.dir.join(MANIFEST_FILE)) {
            error!(plugin = %name, "Failed to persist manifest: {}", e);
            return false;
        }

        if let Some(entry) = self.plugins.get_mut(name) {
            entry.manifest = updated;
        }

        if enabled {
            if !self.modules.contains_key(name) {
                self.load_module(name);
            }
        } else {
            self.modules.remove(name);
        }

        info!(plugin = %name, enabled, "Toggled plugin");
        true
    }

    /// Copy a plugin directory into the plugin root and load it
    pub fn install(&mut self, source: &Path) -> bool {
        match self.install_from(source) {
            Ok(target) => self.load_plugin(&target),
            Err(e) => {
                error!(source = %source.display(), "Plugin install failed: {}", e);
                false
            }
        }
    }

    fn install_from(&self, source: &Path) -> Result<PathBuf> {
        if !source.is_dir() {
            return Err(AlfredError::Manifest(format!(
                "plugin source is not a directory: {}",
                source.display()
            )));
        }
        let manifest = PluginManifest::from_file(&source.join(MANIFEST_FILE))?;

        if self.plugins.contains_key(&manifest.name) {
            warn!(plugin = %manifest.name, "Plugin already installed, overwriting");
        }

        let target = self.plugin_dir.join(&manifest.name);
        if same_path(source, &target) {
            return Ok(target);
        }

        // Copy fully before touching the current install.
        let staging = self
            .plugin_dir
            .join(format!("{}{}{}", STAGING_PREFIX, manifest.name, STAGING_SUFFIX));
        if staging.exists() {
            std::fs::remove_dir_all(&staging)?;
        }
        if let Err(e) = copy_dir_all(source, &staging).and_then(|_| replace_dir(&staging, &target)) {
            if let Err(cleanup) = std::fs::remove_dir_all(&staging) {
                debug!(dir = %staging.display(), "Staging cleanup skipped: {}", cleanup);
            }
            return Err(e.into());
        }
        Ok(target)
    }

    /// Write the bundled sample plugins and register them
    pub fn create_sample_plugins(&mut self) -> Result<usize> {
        let dirs = write_sample_plugins(&self.plugin_dir)?;
        Ok(dirs.iter().filter(|dir| self.load_plugin(dir)).count())
    }

    /// Name → enabled for every registered plugin
    pub fn list(&self) -> BTreeMap<String, bool> {
        self.plugins
            .iter()
            .map(|(name, entry)| (name.clone(), entry.manifest.enabled))
            .collect()
    }

    /// Names of enabled plugins
    pub fn available(&self) -> Vec<String> {
        self.plugins
            .iter()
            .filter(|(_, entry)| entry.manifest.enabled)
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn entry(&self, name: &str) -> Option<&PluginEntry> {
        self.plugins.get(name)
    }

    pub fn manifest(&self, name: &str) -> Option<&PluginManifest> {
        self.plugins.get(name).map(|e| &e.manifest)
    }

    pub fn module(&self, name: &str) -> Option<Arc<dyn Plugin>> {
        self.modules.get(name).cloned()
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    pub fn plugin_dir(&self) -> &Path {
        &self.plugin_dir
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn enabled_count(&self) -> usize {
        self.plugins.values().filter(|e| e.manifest.enabled).count()
    }
}

/// Install staging directories look like `.name.installing`
const STAGING_PREFIX: &str = ".";
const STAGING_SUFFIX: &str = ".installing";

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map_or(false, |n| n.starts_with(STAGING_PREFIX))
}

/// Swap `staging` into place at `target`
fn replace_dir(staging: &Path, target: &Path) -> std::io::Result<()> {
    if target.exists() {
        std::fs::remove_dir_all(target)?;
    }
    std::fs::rename(staging, target)
}

fn same_path(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Recursive directory copy
fn copy_dir_all(source: &Path, target: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(target)?;
    for entry in std::fs::read_dir(source)? {
        let entry = entry?;
        let dest = target.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_all(&entry.path(), &dest)?;
        } else {
            std::fs::copy(entry.path(), dest)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_plugin(root: &Path, dir_name: &str, manifest: &str, entry: Option<&str>) -> PathBuf {
        let dir = root.join(dir_name);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(MANIFEST_FILE), manifest).unwrap();
        if let Some(entry) = entry {
            std::fs::write(dir.join(entry), "#!/bin/sh\necho ok\n").unwrap();
        }
        dir
    }

    fn manifest_json(name: &str) -> String {
        format!(
            r#"{{"name": "{}", "version": "1.0.0", "description": "test",
                "entry_point": "run.sh", "permissions": [], "dependencies": [],
                "methods": ["ping"]}}"#,
            name
        )
    }

    #[test]
    fn test_empty_directory() {
        let root = TempDir::new().unwrap();
        let registry = PluginRegistry::new(root.path(), PluginTable::new()).unwrap();
        assert!(registry.is_empty());
        assert_eq!(registry.enabled_count(), 0);
    }

    #[test]
    fn test_discovers_script_plugin() {
        let root = TempDir::new().unwrap();
        write_plugin(root.path(), "echo", &manifest_json("echo"), Some("run.sh"));

        let registry = PluginRegistry::new(root.path(), PluginTable::new()).unwrap();
        assert_eq!(registry.list().get("echo"), Some(&true));
        assert!(registry.is_loaded("echo"));
        assert!(registry.module("echo").unwrap().has_method("ping"));
    }

    #[test]
    fn test_malformed_manifest_skipped() {
        let root = TempDir::new().unwrap();
        write_plugin(root.path(), "bad", "{ not json", None);
        write_plugin(root.path(), "good", &manifest_json("good"), Some("run.sh"));

        let registry = PluginRegistry::new(root.path(), PluginTable::new()).unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.manifest("good").is_some());
    }

    #[test]
    fn test_missing_entry_registered_not_loaded() {
        let root = TempDir::new().unwrap();
        write_plugin(root.path(), "ghost", &manifest_json("ghost"), None);

        let registry = PluginRegistry::new(root.path(), PluginTable::new()).unwrap();
        assert_eq!(registry.list().get("ghost"), Some(&true));
        assert!(!registry.is_loaded("ghost"));
    }

    #[test]
    fn test_toggle_unknown() {
        let root = TempDir::new().unwrap();
        let mut registry = PluginRegistry::new(root.path(), PluginTable::new()).unwrap();
        assert!(!registry.toggle("nobody", true));
    }

    #[test]
    fn test_install_rejects_missing_manifest() {
        let root = TempDir::new().unwrap();
        let source = TempDir::new().unwrap();
        let mut registry = PluginRegistry::new(root.path(), PluginTable::new()).unwrap();
        assert!(!registry.install(source.path()));
        assert!(!registry.install(&source.path().join("missing")));
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_reinstall_keeps_previous_install() {
        let root = TempDir::new().unwrap();
        let sources = TempDir::new().unwrap();
        let v1 = write_plugin(sources.path(), "v1", &manifest_json("echo"), Some("run.sh"));
        let v2_manifest = manifest_json("echo").replace("1.0.0", "2.0.0");
        let v2 = write_plugin(sources.path(), "v2", &v2_manifest, Some("run.sh"));
        std::os::unix::fs::symlink("/nonexistent/alfred-target", v2.join("broken")).unwrap();

        let mut registry = PluginRegistry::new(root.path(), PluginTable::new()).unwrap();
        assert!(registry.install(&v1));
        assert!(!registry.install(&v2));

        let installed = root.path().join("echo");
        let on_disk = PluginManifest::from_file(&installed.join(MANIFEST_FILE)).unwrap();
        assert_eq!(on_disk.version, "1.0.0");
        assert!(installed.join("run.sh").is_file());
        assert!(!root.path().join(".echo.installing").exists());
        assert_eq!(registry.manifest("echo").unwrap().version, "1.0.0");
        assert!(registry.is_loaded("echo"));

        assert!(registry.toggle("echo", false));
        let on_disk = PluginManifest::from_file(&installed.join(MANIFEST_FILE)).unwrap();
        assert_eq!(on_disk.version, "1.0.0");
        assert!(!on_disk.enabled);
    }

    #[test]
    fn test_discovery_ignores_staging_dirs() {
        let root = TempDir::new().unwrap();
        write_plugin(root.path(), ".echo.installing", &manifest_json("echo"), Some("run.sh"));

        let registry = PluginRegistry::new(root.path(), PluginTable::new()).unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_create_sample_plugins() {
        let root = TempDir::new().unwrap();
        let mut registry = PluginRegistry::new(root.path(), PluginTable::new()).unwrap();
        assert_eq!(registry.create_sample_plugins().unwrap(), 1);
        assert!(registry.is_loaded("calculator"));
    }
}
