//! Plugin registry and executor behaviour

use alfred::errors::AlfredError;
use alfred::tools::{
    Plugin, PluginArgs, PluginExecutor, PluginManifest, PluginRegistry, PluginTable, MANIFEST_FILE,
};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Records every call; `sleep` blocks for a while, everything else echoes
struct Recorder {
    calls: Arc<Mutex<Vec<(String, PluginArgs)>>>,
}

#[async_trait]
impl Plugin for Recorder {
    fn methods(&self) -> Vec<String> {
        vec!["add".into(), "sleep".into()]
    }

    async fn call(&self, method: &str, args: &PluginArgs) -> alfred::Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push((method.to_string(), args.clone()));
        match method {
            "sleep" => {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok("woke".into())
            }
            "add" => {
                let a: i64 = args.get("a").and_then(|v| v.parse().ok()).unwrap_or(0);
                let b: i64 = args.get("b").and_then(|v| v.parse().ok()).unwrap_or(0);
                Ok((a + b).to_string())
            }
            _ => unreachable!(),
        }
    }
}

type Calls = Arc<Mutex<Vec<(String, PluginArgs)>>>;

fn recording_table(name: &str) -> (PluginTable, Calls) {
    let calls: Calls = Arc::new(Mutex::new(Vec::new()));
    let shared = calls.clone();
    let mut table = PluginTable::new();
    table.register(name, move |_manifest: &PluginManifest, _entry: &Path| {
        Ok(Arc::new(Recorder { calls: shared.clone() }) as Arc<dyn Plugin>)
    });
    (table, calls)
}

fn manifest(name: &str, version: &str) -> String {
    format!(
        r#"{{"name": "{}", "version": "{}", "description": "test plugin",
            "entry_point": "plugin.rs", "permissions": ["compute"], "dependencies": []}}"#,
        name, version
    )
}

fn write_plugin(root: &Path, dir: &str, manifest: &str) -> PathBuf {
    let path = root.join(dir);
    std::fs::create_dir_all(&path).unwrap();
    std::fs::write(path.join(MANIFEST_FILE), manifest).unwrap();
    std::fs::write(path.join("plugin.rs"), "// calculator").unwrap();
    path
}

#[test]
fn test_manifest_missing_required_field_is_skipped() {
    let root = TempDir::new().unwrap();
    for (dir, missing) in [
        ("no_version", "version"),
        ("no_entry", "entry_point"),
        ("no_permissions", "permissions"),
    ] {
        let mut value: serde_json::Value = serde_json::from_str(&manifest(dir, "1.0")).unwrap();
        value.as_object_mut().unwrap().remove(missing);
        write_plugin(root.path(), dir, &value.to_string());
    }
    write_plugin(root.path(), "ok", &manifest("calculator", "1.0"));

    let (table, _) = recording_table("calculator");
    let registry = PluginRegistry::new(root.path(), table).unwrap();

    assert_eq!(registry.len(), 1);
    assert_eq!(registry.available(), vec!["calculator".to_string()]);
}

#[test]
fn test_toggle_round_trip_persists() {
    let root = TempDir::new().unwrap();
    let dir = write_plugin(root.path(), "calculator", &manifest("calculator", "1.0"));
    let (table, _) = recording_table("calculator");
    let mut registry = PluginRegistry::new(root.path(), table).unwrap();
    assert!(registry.is_loaded("calculator"));

    assert!(registry.toggle("calculator", false));
    let on_disk = PluginManifest::from_file(&dir.join(MANIFEST_FILE)).unwrap();
    assert!(!on_disk.enabled);
    assert_eq!(registry.list().get("calculator"), Some(&false));
    assert!(!registry.is_loaded("calculator"));

    assert!(registry.toggle("calculator", true));
    let on_disk = PluginManifest::from_file(&dir.join(MANIFEST_FILE)).unwrap();
    assert!(on_disk.enabled);
    assert_eq!(registry.list().get("calculator"), Some(&true));
    assert!(registry.is_loaded("calculator"));
}

#[test]
fn test_disabled_manifest_survives_restart() {
    let root = TempDir::new().unwrap();
    write_plugin(root.path(), "calculator", &manifest("calculator", "1.0"));
    {
        let (table, _) = recording_table("calculator");
        let mut registry = PluginRegistry::new(root.path(), table).unwrap();
        assert!(registry.toggle("calculator", false));
    }
    let (table, _) = recording_table("calculator");
    let registry = PluginRegistry::new(root.path(), table).unwrap();
    assert_eq!(registry.list().get("calculator"), Some(&false));
    assert!(!registry.is_loaded("calculator"));
}

#[test]
fn test_install_twice_overwrites() {
    let root = TempDir::new().unwrap();
    let sources = TempDir::new().unwrap();
    let v1 = write_plugin(sources.path(), "v1", &manifest("calculator", "1.0"));
    let v2 = write_plugin(sources.path(), "v2", &manifest("calculator", "2.0"));

    let (table, _) = recording_table("calculator");
    let mut registry = PluginRegistry::new(root.path(), table).unwrap();

    assert!(registry.install(&v1));
    assert!(registry.install(&v2));

    assert_eq!(registry.len(), 1);
    assert_eq!(registry.manifest("calculator").unwrap().version, "2.0");
    let installed = root.path().join("calculator");
    assert_eq!(
        PluginManifest::from_file(&installed.join(MANIFEST_FILE)).unwrap().version,
        "2.0"
    );
    assert!(registry.is_loaded("calculator"));
}

#[tokio::test]
async fn test_invoke_error_kinds() {
    let root = TempDir::new().unwrap();
    write_plugin(root.path(), "calculator", &manifest("calculator", "1.0"));
    write_plugin(root.path(), "unloadable", &manifest("unloadable", "1.0"));
    let (table, _) = recording_table("calculator");
    let mut executor = PluginExecutor::new(PluginRegistry::new(root.path(), table).unwrap());
    let args = PluginArgs::new();

    let err = executor.execute_plugin("ghost", "add", &args).await.unwrap_err();
    assert!(matches!(err, AlfredError::PluginNotFound(_)));

    let err = executor.execute_plugin("calculator", "divide", &args).await.unwrap_err();
    assert!(matches!(err, AlfredError::MethodNotFound { .. }));

    // no factory and no declared methods: registered but never loaded
    let err = executor.execute_plugin("unloadable", "add", &args).await.unwrap_err();
    assert!(matches!(err, AlfredError::PluginNotLoaded(_)));

    assert!(executor.toggle_plugin("calculator", false));
    let err = executor.execute_plugin("calculator", "add", &args).await.unwrap_err();
    assert!(matches!(err, AlfredError::PluginNotEnabled(_)));

    let stats = executor.stats();
    assert_eq!(stats.rejected_calls, 4);
    assert_eq!(stats.failed_calls, 4);
}

#[tokio::test]
async fn test_timeout_releases_gate() {
    let root = TempDir::new().unwrap();
    write_plugin(root.path(), "calculator", &manifest("calculator", "1.0"));
    let (table, _) = recording_table("calculator");
    let executor = PluginExecutor::new(PluginRegistry::new(root.path(), table).unwrap())
        .with_timeout(Duration::from_millis(100));

    let err = executor
        .execute_plugin("calculator", "sleep", &PluginArgs::new())
        .await
        .unwrap_err();
    assert!(matches!(err, AlfredError::Timeout { duration_ms: 100 }));

    let mut args = PluginArgs::new();
    args.insert("a".into(), "4".into());
    args.insert("b".into(), "5".into());
    let result = executor.execute_plugin("calculator", "add", &args).await.unwrap();
    assert_eq!(result, "9");

    let stats = executor.stats();
    assert_eq!(stats.timeouts, 1);
    assert_eq!(stats.successful_calls, 1);
}

#[tokio::test]
async fn test_tool_directive_passes_string_args() {
    let root = TempDir::new().unwrap();
    write_plugin(root.path(), "calculator", &manifest("calculator", "1.0"));
    let (table, calls) = recording_table("calculator");
    let executor = PluginExecutor::new(PluginRegistry::new(root.path(), table).unwrap());

    let out = executor
        .execute_from_response("Sure.\ntool:calculator.add(a=2,b=3)")
        .await
        .unwrap();
    assert_eq!(out, "Tool: calculator.add(a=2,b=3)\nResult: 5");

    let calls = calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    let (method, args) = &calls[0];
    assert_eq!(method, "add");
    assert_eq!(args.get("a").map(String::as_str), Some("2"));
    assert_eq!(args.get("b").map(String::as_str), Some("3"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_sample_script_plugin_end_to_end() {
    let root = TempDir::new().unwrap();
    let mut registry = PluginRegistry::new(root.path(), PluginTable::new()).unwrap();
    assert_eq!(registry.create_sample_plugins().unwrap(), 1);
    let executor = PluginExecutor::new(registry);

    let out = executor
        .execute_from_response("tool: calculator.multiply(a=6, b=7)\nsearch: weather")
        .await
        .unwrap();
    let blocks: Vec<&str> = out.split("\n\n").collect();
    assert_eq!(blocks[0], "Tool: calculator.multiply(a=6, b=7)\nResult: 42");
    assert_eq!(
        blocks[1],
        "Search: weather\nResults: Web search for 'weather' would be executed here"
    );

    let out = executor
        .execute_from_response("tool: calculator.calculate(expression=2*3+4)")
        .await
        .unwrap();
    assert_eq!(out, "Tool: calculator.calculate(expression=2*3+4)\nResult: 10");
}

#[cfg(unix)]
#[tokio::test]
async fn test_execute_directive_blocks_dangerous_commands() {
    let root = TempDir::new().unwrap();
    let executor = PluginExecutor::new(PluginRegistry::new(root.path(), PluginTable::new()).unwrap());

    let out = executor
        .execute_from_response("execute: rm -rf /\nexecute: echo hi")
        .await
        .unwrap();
    let blocks: Vec<&str> = out.split("\n\n").collect();
    assert_eq!(blocks[0], "Command: rm -rf /\nOutput: Error: Dangerous command blocked");
    assert!(blocks[1].starts_with("Command: echo hi\nOutput: hi"));
}
