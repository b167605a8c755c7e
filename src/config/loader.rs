//! Configuration loading and environment parsing.

use super::Config;
use serde_json::{Map, Value};
use std::env;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

const CONFIG_JSON_VAR: &str = "SIGNAL_RELAY_CONFIG_JSON";
const CONFIG_STDIN_VAR: &str = "SIGNAL_RELAY_CONFIG_STDIN";
const CONFIG_PATH_VAR: &str = "SIGNAL_RELAY_CONFIG_PATH";
const FIELD_OVERRIDE_PREFIX: &str = "SIGNAL_RELAY__";
const CONFIG_FILE_NAME: &str = "config.json";

/// Load configuration with the following precedence (highest first):
/// 1) `SIGNAL_RELAY_CONFIG_JSON` env var containing raw JSON
/// 2) If `SIGNAL_RELAY_CONFIG_STDIN=true/1/yes`, JSON read from stdin
/// 3) File pointed to by `SIGNAL_RELAY_CONFIG_PATH`
/// 4) `config.json` in the current working directory
/// 5) `config.json` next to the executable
/// 6) Defaults compiled into the binary
///
/// Individual fields can then be overridden by `SIGNAL_RELAY__`-prefixed
/// variables using `__` as the nesting separator, e.g. `SIGNAL_RELAY__PORT=9000`
/// or `SIGNAL_RELAY__RELAY__SEND_TIMEOUT_MS=2000`.
///
/// Read and parse problems are reported on stderr and the offending source is
/// skipped; logging is not initialized yet at this point. Validation is left to
/// [`validate_config`](super::validation::validate_config).
#[must_use]
pub fn load() -> Config {
    let defaults = Config::default();
    let mut merged = serde_json::to_value(&defaults).unwrap_or_else(|_| Value::Object(Map::new()));

    // Lowest precedence is merged first so later sources overwrite it.
    if let Ok(exe_path) = env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            merge_file_source(&mut merged, &exe_dir.join(CONFIG_FILE_NAME));
        }
    }

    merge_file_source(&mut merged, Path::new(CONFIG_FILE_NAME));

    if let Ok(path) = env::var(CONFIG_PATH_VAR) {
        merge_file_source(&mut merged, &PathBuf::from(path));
    }

    if env::var(CONFIG_STDIN_VAR).is_ok_and(|val| env_var_truthy(&val)) {
        let mut buf = String::new();
        if let Err(e) = std::io::stdin().read_to_string(&mut buf) {
            eprintln!("Failed to read config from stdin: {e}");
        } else if let Some(value) = parse_json_document(&buf, "stdin") {
            merge_values(&mut merged, value);
        }
    }

    if let Ok(json) = env::var(CONFIG_JSON_VAR) {
        if let Some(value) = parse_json_document(&json, CONFIG_JSON_VAR) {
            merge_values(&mut merged, value);
        }
    }

    apply_env_overrides(&mut merged, env::vars());

    match serde_json::from_value::<Config>(merged) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to deserialize config; using defaults: {e}");
            defaults
        }
    }
}

fn parse_json_document(raw: &str, label: &str) -> Option<Value> {
    if raw.trim().is_empty() {
        return None;
    }

    match serde_json::from_str(raw) {
        Ok(value) => Some(value),
        Err(err) => {
            eprintln!("Failed to parse config from {label}: {err}");
            None
        }
    }
}

fn merge_file_source(target: &mut Value, path: &Path) {
    if path.as_os_str().is_empty() || !path.exists() {
        return;
    }

    match fs::read_to_string(path) {
        Ok(contents) => {
            if let Some(value) = parse_json_document(&contents, &format!("file {}", path.display()))
            {
                merge_values(target, value);
            }
        }
        Err(err) => {
            eprintln!("Failed to read config from {}: {}", path.display(), err);
        }
    }
}

/// Deep-merge `source` into `target`; objects merge key by key, anything else replaces.
fn merge_values(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Object(target_map), Value::Object(source_map)) => {
            for (key, value) in source_map {
                match target_map.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        target_map.insert(key, value);
                    }
                }
            }
        }
        (target_slot, source_value) => {
            *target_slot = source_value;
        }
    }
}

fn apply_env_overrides(root: &mut Value, vars: impl IntoIterator<Item = (String, String)>) {
    for (key, raw_value) in vars {
        let Some(stripped) = key.strip_prefix(FIELD_OVERRIDE_PREFIX) else {
            continue;
        };

        let segments: Vec<String> = stripped
            .split("__")
            .filter(|segment| !segment.is_empty())
            .map(str::to_ascii_lowercase)
            .collect();

        if segments.is_empty() {
            continue;
        }

        set_nested_value(root, &segments, parse_env_value(&raw_value));
    }
}

fn env_var_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes"
    )
}

fn parse_env_value(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Value::String(String::new());
    }

    // Anything that is not valid JSON (paths, origins, bare words) stays a string.
    serde_json::from_str(trimmed).unwrap_or_else(|_| Value::String(trimmed.to_string()))
}

fn set_nested_value(target: &mut Value, segments: &[String], value: Value) {
    let Some((head, rest)) = segments.split_first() else {
        *target = value;
        return;
    };

    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    let Value::Object(map) = target else {
        return;
    };

    if rest.is_empty() {
        map.insert(head.clone(), value);
        return;
    }

    let entry = map
        .entry(head.clone())
        .or_insert_with(|| Value::Object(Map::new()));
    set_nested_value(entry, rest, value);
}
