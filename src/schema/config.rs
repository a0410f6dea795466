//! Configuration types for the machine under test.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{FsmSpecError, StateId, is_representable_symbol};

/// Where the machine under test comes from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FsmConfig {
    /// Specification file in the FSM text format.
    /// When absent, a random machine is generated from `fsm_default`.
    #[serde(default)]
    pub file: Option<PathBuf>,
    /// JSON file listing the target states (`{"UIOs": [..]}`).
    /// When absent, every state is a target.
    #[serde(default, rename = "UIOSet")]
    pub uio_set: Option<PathBuf>,
    /// Settings for random machine generation.
    #[serde(default, rename = "FSMDefault")]
    pub fsm_default: FsmDefaults,
}

/// Settings for a randomly generated machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FsmDefaults {
    /// Number of states.
    #[serde(default = "default_num_states")]
    pub number_of_states: usize,
    /// Input alphabet.
    #[serde(default = "default_input_set")]
    pub input_set: Vec<String>,
    /// Output alphabet.
    #[serde(default = "default_output_set")]
    pub output_set: Vec<String>,
    /// Shape of the transition digraph.
    #[serde(default)]
    pub digraph_shape_selection: DigraphShape,
}

impl Default for FsmDefaults {
    fn default() -> Self {
        Self {
            number_of_states: default_num_states(),
            input_set: default_input_set(),
            output_set: default_output_set(),
            digraph_shape_selection: DigraphShape::default(),
        }
    }
}

fn default_num_states() -> usize {
    100
}
fn default_input_set() -> Vec<String> {
    vec!["a".into(), "b".into(), "c".into()]
}
fn default_output_set() -> Vec<String> {
    vec!["x".into(), "y".into()]
}

/// Transition digraph shapes for random machines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigraphShape {
    /// Complete machine where every state has in-degree and out-degree
    /// equal to the input alphabet size.
    #[default]
    Symmetric,
}

impl FsmDefaults {
    /// Validate random-generation settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.number_of_states == 0 {
            return Err(ConfigError::NoStates);
        }
        if self.input_set.is_empty() {
            return Err(ConfigError::EmptyAlphabet("input"));
        }
        if self.output_set.is_empty() {
            return Err(ConfigError::EmptyAlphabet("output"));
        }
        for (alphabet, symbols) in [("input", &self.input_set), ("output", &self.output_set)] {
            if let Some(symbol) = symbols.iter().find(|s| !is_representable_symbol(s)) {
                return Err(ConfigError::UnrepresentableSymbol {
                    alphabet,
                    symbol: symbol.clone(),
                });
            }
        }
        Ok(())
    }
}

impl FsmConfig {
    /// Resolve relative file paths against `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        for path in [&mut self.file, &mut self.uio_set].into_iter().flatten() {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }

    /// Validate machine settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.file.is_none() {
            self.fsm_default.validate()?;
        }
        Ok(())
    }
}

/// Target-state file contents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TargetSet {
    #[serde(rename = "UIOs")]
    pub uios: Vec<StateId>,
}

impl TargetSet {
    /// Load a target-state file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Deduplicated targets, checked against the machine size.
    pub fn resolve(&self, num_states: usize) -> Result<BTreeSet<StateId>, ConfigError> {
        self.uios
            .iter()
            .map(|&state| {
                if state < num_states {
                    Ok(state)
                } else {
                    Err(ConfigError::UnknownTargetState { state, num_states })
                }
            })
            .collect()
    }
}

/// Configuration errors. All of them are fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Random machines need at least one state")]
    NoStates,
    #[error("The {0} alphabet is empty")]
    EmptyAlphabet(&'static str),
    #[error("The {alphabet} symbol {symbol:?} cannot be written in the FSM text format")]
    UnrepresentableSymbol {
        alphabet: &'static str,
        symbol: String,
    },
    #[error("Target state {state} does not exist in a machine with {num_states} states")]
    UnknownTargetState { state: StateId, num_states: usize },
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Invalid FSM specification: {0}")]
    Fsm(#[from] FsmSpecError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let defaults = FsmDefaults::default();
        assert_eq!(defaults.number_of_states, 100);
        assert_eq!(defaults.input_set, vec!["a", "b", "c"]);
        assert_eq!(defaults.digraph_shape_selection, DigraphShape::Symmetric);
        assert!(defaults.validate().is_ok());
    }

    #[test]
    fn test_deserialize_partial() {
        let json = r#"{"FSMDefault": {"NumberOfStates": 8, "DigraphShapeSelection": "symmetric"}}"#;
        let config: FsmConfig = serde_json::from_str(json).unwrap();
        assert!(config.file.is_none());
        assert_eq!(config.fsm_default.number_of_states, 8);
        assert_eq!(config.fsm_default.output_set, vec!["x", "y"]);
    }

    #[test]
    fn test_invalid_defaults() {
        let mut defaults = FsmDefaults {
            number_of_states: 0,
            ..Default::default()
        };
        assert!(matches!(defaults.validate(), Err(ConfigError::NoStates)));

        defaults.number_of_states = 4;
        defaults.input_set.clear();
        assert!(matches!(
            defaults.validate(),
            Err(ConfigError::EmptyAlphabet("input"))
        ));
    }

    #[test]
    fn test_unrepresentable_symbols_rejected() {
        for bad in ["a,b", "a:b", "", " a", "b\t", "x\ny"] {
            let defaults = FsmDefaults {
                input_set: vec![bad.to_string(), "c".to_string()],
                ..Default::default()
            };
            assert!(
                matches!(
                    defaults.validate(),
                    Err(ConfigError::UnrepresentableSymbol { alphabet: "input", ref symbol })
                        if symbol == bad
                ),
                "{bad:?} accepted"
            );
        }

        let defaults = FsmDefaults {
            output_set: vec!["ok".into(), "x y".into(), "z,".into()],
            ..Default::default()
        };
        assert!(matches!(
            defaults.validate(),
            Err(ConfigError::UnrepresentableSymbol { alphabet: "output", .. })
        ));

        let defaults = FsmDefaults {
            input_set: vec!["up".into(), "down-1".into(), "x y".into()],
            ..Default::default()
        };
        assert!(defaults.validate().is_ok());
    }

    #[test]
    fn test_resolve_paths() {
        let mut config = FsmConfig {
            file: Some(PathBuf::from("machine.txt")),
            uio_set: Some(PathBuf::from("/abs/targets.json")),
            ..Default::default()
        };
        config.resolve_paths(Path::new("/runs"));
        assert_eq!(config.file, Some(PathBuf::from("/runs/machine.txt")));
        assert_eq!(config.uio_set, Some(PathBuf::from("/abs/targets.json")));
    }

    #[test]
    fn test_target_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"UIOs": [2, 0, 2]}}"#).unwrap();

        let targets = TargetSet::from_file(file.path()).unwrap();
        let resolved = targets.resolve(3).unwrap();
        assert_eq!(resolved.into_iter().collect::<Vec<_>>(), vec![0, 2]);

        assert!(matches!(
            targets.resolve(2),
            Err(ConfigError::UnknownTargetState { state: 2, num_states: 2 })
        ));
    }
}
