//! Scenario file loading.
//!
//! A scenario file is JSON holding either one scenario object, an array of
//! scenarios, or an object with a `scenarios` array.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use super::types::{DefinitionResult, Scenario, ScenarioError};

#[derive(Deserialize)]
struct Suite {
    scenarios: Vec<Scenario>,
}

/// Parse scenarios from JSON text; `origin` is only used in error messages
pub fn parse_scenarios(json: &str, origin: &Path) -> DefinitionResult<Vec<Scenario>> {
    let parse_error = |source| ScenarioError::Parse {
        path: origin.to_path_buf(),
        source,
    };

    let value: serde_json::Value = serde_json::from_str(json).map_err(parse_error)?;

    // Dispatch on shape so inner errors (e.g. an empty step list) surface intact
    match value {
        serde_json::Value::Object(ref map) if map.contains_key("scenarios") => {
            serde_json::from_value::<Suite>(value)
                .map(|suite| suite.scenarios)
                .map_err(parse_error)
        }
        serde_json::Value::Array(_) => serde_json::from_value(value).map_err(parse_error),
        other => serde_json::from_value::<Scenario>(other)
            .map(|scenario| vec![scenario])
            .map_err(parse_error),
    }
}

/// Load all scenarios from a file
pub fn load_file(path: &Path) -> DefinitionResult<Vec<Scenario>> {
    let json = fs::read_to_string(path).map_err(|source| ScenarioError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_scenarios(&json, path)
}

/// Resolve a scenario argument to a file.
///
/// Existing paths are used as given; otherwise the argument is treated as a
/// name and looked up as `<scenario_dir>/<name>.json`.
pub fn resolve(arg: &str, scenario_dir: &Path) -> DefinitionResult<PathBuf> {
    let direct = PathBuf::from(arg);
    if direct.is_file() {
        return Ok(direct);
    }

    let file_name = if arg.ends_with(".json") {
        arg.to_string()
    } else {
        format!("{}.json", arg)
    };
    let named = scenario_dir.join(file_name);
    if named.is_file() {
        Ok(named)
    } else {
        Err(ScenarioError::NotFound {
            name: arg.to_string(),
            searched: named,
        })
    }
}

/// Resolve and load every scenario argument, preserving argument order
pub fn load_all(args: &[String], scenario_dir: &Path) -> DefinitionResult<Vec<Scenario>> {
    let mut scenarios = Vec::new();
    for arg in args {
        let path = resolve(arg, scenario_dir)?;
        scenarios.extend(load_file(&path)?);
    }
    Ok(scenarios)
}
