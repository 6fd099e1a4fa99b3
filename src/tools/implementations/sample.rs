//! Sample calculator plugin written by `alfred plugin sample`

use crate::errors::Result;
use crate::tools::types::{PluginManifest, MANIFEST_FILE};
use std::path::{Path, PathBuf};

const CALCULATOR_SCRIPT: &str = r#"#!/bin/sh
# Sample Alfred plugin: basic arithmetic.
# Arguments arrive as ALFRED_ARG_<KEY> environment variables.
case "$1" in
  add)
    awk -v a="$ALFRED_ARG_A" -v b="$ALFRED_ARG_B" 'BEGIN { print a + b }'
    ;;
  multiply)
    awk -v a="$ALFRED_ARG_A" -v b="$ALFRED_ARG_B" 'BEGIN { print a * b }'
    ;;
  calculate)
    expr="$ALFRED_ARG_EXPRESSION"
    if [ -z "$expr" ] || [ -n "$(printf '%s' "$expr" | tr -d '0-9+*/.() -')" ]; then
      echo "Invalid characters in expression" >&2
      exit 1
    fi
    awk "BEGIN { print $expr }"
    ;;
  *)
    echo "unknown method: $1" >&2
    exit 2
    ;;
esac
"#;

/// Manifest of the sample calculator plugin
pub fn calculator_manifest() -> PluginManifest {
    PluginManifest {
        name: "calculator".to_string(),
        version: "1.0.0".to_string(),
        description: "Basic calculator plugin".to_string(),
        entry_point: "calculator.sh".to_string(),
        permissions: vec!["compute".to_string()],
        dependencies: Vec::new(),
        enabled: true,
        methods: vec![
            "add".to_string(),
            "multiply".to_string(),
            "calculate".to_string(),
        ],
    }
}

/// Write the sample plugins under `plugin_dir`, returning their directories
pub fn write_sample_plugins(plugin_dir: &Path) -> Result<Vec<PathBuf>> {
    let manifest = calculator_manifest();
    let dir = plugin_dir.join(&manifest.name);
    std::fs::create_dir_all(&dir)?;

    let script = dir.join(&manifest.entry_point);
    std::fs::write(&script, CALCULATOR_SCRIPT)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755))?;
    }

    manifest.save(&dir.join(MANIFEST_FILE))?;
    Ok(vec![dir])
}
