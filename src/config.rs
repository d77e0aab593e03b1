//! Scene/channel configuration surface (spec §4.12): a declarative document
//! naming which scenes and channels to wire up, with per-entry options.
//! File discovery and hot-reload are left to the host application; this
//! module only reads one file and parses it.
//!
//! Format is chosen by file extension (`.json` vs `.yaml`/`.yml`), and
//! `${NAME}` / `${NAME:default}` placeholders are expanded against the
//! process environment over the raw text before structural parsing.

use std::collections::HashMap;
use std::path::Path;

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::error::ConfigError;

#[derive(Debug, Clone, Deserialize)]
pub struct ConfigEntry {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub options: Value,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scenes: Vec<ConfigEntry>,
    #[serde(default)]
    pub channels: Vec<ConfigEntry>,
}

fn placeholder_pattern() -> Regex {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(:([^}]*))?\}").expect("placeholder regex is valid")
}

/// Expand `${NAME}` / `${NAME:default}` against `env`. An unset variable
/// with no default expands to an empty string, mirroring shell semantics.
#[must_use]
pub fn expand_placeholders(text: &str, env: &HashMap<String, String>) -> String {
    placeholder_pattern()
        .replace_all(text, |caps: &regex::Captures| {
            let name = &caps[1];
            match env.get(name) {
                Some(value) => value.clone(),
                None => caps.get(3).map(|m| m.as_str()).unwrap_or("").to_string(),
            }
        })
        .into_owned()
}

fn process_env() -> HashMap<String, String> {
    std::env::vars().collect()
}

/// Load and parse a configuration document from `path`, expanding
/// environment placeholders first.
pub fn load(path: &Path) -> Result<Config, ConfigError> {
    let raw = std::fs::read_to_string(path)?;
    let expanded = expand_placeholders(&raw, &process_env());
    parse(&expanded, path)
}

fn parse(text: &str, path: &Path) -> Result<Config, ConfigError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::from_str(text).map_err(|e| ConfigError::Parse(e.to_string())),
        Some("yaml" | "yml") => {
            serde_yaml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
        }
        other => Err(ConfigError::UnknownExtension(
            other.unwrap_or_default().to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn expands_placeholder_with_env_value() {
        let mut env = HashMap::new();
        env.insert("NAME".to_string(), "world".to_string());
        assert_eq!(expand_placeholders("hello ${NAME}", &env), "hello world");
    }

    #[test]
    fn falls_back_to_default_when_unset() {
        let env = HashMap::new();
        assert_eq!(expand_placeholders("port ${PORT:8080}", &env), "port 8080");
    }

    #[test]
    fn unset_with_no_default_expands_empty() {
        let env = HashMap::new();
        assert_eq!(expand_placeholders("value=${MISSING}", &env), "value=");
    }

    #[test]
    fn loads_json_config_with_scenes_and_channels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scenewatch.json");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(
            file,
            r#"{{"scenes":[{{"type":"shell","options":{{"prompt":"\\$"}}}}],"channels":[{{"type":"logging"}}]}}"#
        )
        .unwrap();

        let config = load(&path).unwrap();
        assert_eq!(config.scenes.len(), 1);
        assert_eq!(config.scenes[0].kind, "shell");
        assert_eq!(config.channels.len(), 1);
        assert_eq!(config.channels[0].kind, "logging");
    }

    #[test]
    fn loads_yaml_config_and_expands_env() {
        std::env::set_var("SCENEWATCH_TEST_PROMPT", "user@host:\\$");
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scenewatch.yaml");
        std::fs::write(
            &path,
            "scenes:\n  - type: shell\n    options:\n      prompt: \"${SCENEWATCH_TEST_PROMPT}\"\nchannels: []\n",
        )
        .unwrap();

        let config = load(&path).unwrap();
        assert_eq!(config.scenes[0].kind, "shell");
        std::env::remove_var("SCENEWATCH_TEST_PROMPT");
    }

    #[test]
    fn unknown_extension_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scenewatch.toml");
        std::fs::write(&path, "").unwrap();
        assert!(matches!(load(&path), Err(ConfigError::UnknownExtension(_))));
    }
}
