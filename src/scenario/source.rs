use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::HarnessConfig;
use crate::engine::action::Action;
use crate::engine::assertion::Assertion;
use crate::error::{HarnessError, HarnessResult};
use crate::model::element::ElementRef;
use crate::model::state::{PageStateName, StateModel};
use crate::scenario::scenario_model::{Scenario, ScenarioStep};

// ============================================================================
// Authoring format (YAML / JSON)
// ============================================================================

/// A scenario as written in a scenario file. Elements are referenced by
/// their stable names and resolved by [`ScenarioSpec::compile`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScenarioSpec {
    pub name: String,

    pub start: PageStateName,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expect_final: Option<PageStateName>,

    #[serde(default)]
    pub steps: Vec<StepSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum StepSpec {
    Act(ActionSpec),
    Check(AssertionSpec),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ActionSpec {
    Type {
        element: String,
        text: String,
        /// Type `text` this many times (long-input cases)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        repeat: Option<usize>,
    },
    Click {
        element: String,
    },
    Navigate {
        path: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "assert", rename_all = "snake_case")]
pub enum AssertionSpec {
    TextEquals { element: String, expected: String },
    UrlIncludes { expected: String },
    /// Paths starting with `/` are joined onto the base URL
    UrlEquals { expected: String },
    Exists { element: String },
    NotExists { element: String },
    CountEquals { element: String, expected: usize },
}

impl ScenarioSpec {
    /// Resolve element names against the model. Unknown names are
    /// configuration errors, reported before anything runs.
    pub fn compile(&self, model: &StateModel, config: &HarnessConfig) -> HarnessResult<Scenario> {
        if model.state(self.start).is_none() {
            return Err(HarnessError::config(format!(
                "scenario '{}' starts on undeclared state {}",
                self.name, self.start
            )));
        }
        if let Some(state) = self.expect_final {
            if model.state(state).is_none() {
                return Err(HarnessError::config(format!(
                    "scenario '{}' expects undeclared final state {}",
                    self.name, state
                )));
            }
        }

        let element = |name: &str, index: usize| -> HarnessResult<ElementRef> {
            model.element_named(name).ok_or_else(|| {
                HarnessError::config(format!(
                    "scenario '{}' step {}: unknown element '{}'",
                    self.name, index, name
                ))
            })
        };

        let mut steps = Vec::with_capacity(self.steps.len());
        for (i, step) in self.steps.iter().enumerate() {
            let compiled = match step {
                StepSpec::Act(ActionSpec::Type { element: name, text, repeat }) => {
                    let text = text.repeat(repeat.unwrap_or(1));
                    ScenarioStep::Act(Action::Type(element(name, i)?, text))
                }
                StepSpec::Act(ActionSpec::Click { element: name }) => {
                    ScenarioStep::Act(Action::Click(element(name, i)?))
                }
                StepSpec::Act(ActionSpec::Navigate { path }) => {
                    ScenarioStep::Act(Action::Navigate(path.clone()))
                }
                StepSpec::Check(AssertionSpec::TextEquals { element: name, expected }) => {
                    ScenarioStep::Check(Assertion::TextEquals(element(name, i)?, expected.clone()))
                }
                StepSpec::Check(AssertionSpec::UrlIncludes { expected }) => {
                    ScenarioStep::Check(Assertion::UrlIncludes(expected.clone()))
                }
                StepSpec::Check(AssertionSpec::UrlEquals { expected }) => {
                    let url = if expected.starts_with('/') {
                        config.resolve_url(expected)
                    } else {
                        expected.clone()
                    };
                    ScenarioStep::Check(Assertion::UrlEquals(url))
                }
                StepSpec::Check(AssertionSpec::Exists { element: name }) => {
                    ScenarioStep::Check(Assertion::Exists(element(name, i)?))
                }
                StepSpec::Check(AssertionSpec::NotExists { element: name }) => {
                    ScenarioStep::Check(Assertion::NotExists(element(name, i)?))
                }
                StepSpec::Check(AssertionSpec::CountEquals { element: name, expected }) => {
                    ScenarioStep::Check(Assertion::CountEquals(element(name, i)?, *expected))
                }
            };
            steps.push(compiled);
        }

        Ok(Scenario {
            name: self.name.clone(),
            start: self.start,
            start_path: self.start_path.clone(),
            steps,
            expect_final: self.expect_final,
        })
    }
}

// ============================================================================
// Loading
// ============================================================================

/// Parse every YAML document in `content`.
pub fn parse_specs(content: &str) -> HarnessResult<Vec<ScenarioSpec>> {
    let mut specs = Vec::new();
    for document in serde_yaml::Deserializer::from_str(content) {
        let spec = ScenarioSpec::deserialize(document)
            .map_err(|e| HarnessError::config(format!("invalid scenario document: {}", e)))?;
        specs.push(spec);
    }
    Ok(specs)
}

/// Load scenario specs from a YAML file or a directory of YAML files.
///
/// Directory entries are read in path order; documents keep file order.
pub fn load_specs(path: &Path) -> HarnessResult<Vec<ScenarioSpec>> {
    let read = |p: &Path| {
        std::fs::read_to_string(p)
            .map_err(|e| HarnessError::config(format!("cannot read {}: {}", p.display(), e)))
    };

    let metadata = std::fs::metadata(path)
        .map_err(|e| HarnessError::config(format!("cannot access {}: {}", path.display(), e)))?;

    if !metadata.is_dir() {
        return parse_specs(&read(path)?).map_err(|e| with_file(e, path));
    }

    let entries = std::fs::read_dir(path)
        .map_err(|e| HarnessError::config(format!("cannot list {}: {}", path.display(), e)))?;
    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|e| e == "yaml" || e == "yml"))
        .collect();
    files.sort();

    let mut specs = Vec::new();
    for file in files {
        specs.extend(parse_specs(&read(&file)?).map_err(|e| with_file(e, &file))?);
    }
    Ok(specs)
}

fn with_file(err: HarnessError, path: &Path) -> HarnessError {
    match err {
        HarnessError::Configuration(msg) => {
            HarnessError::Configuration(format!("{}: {}", path.display(), msg))
        }
        other => other,
    }
}

/// Load and compile in one go.
pub fn load_scenarios(
    path: &Path,
    model: &StateModel,
    config: &HarnessConfig,
) -> HarnessResult<Vec<Scenario>> {
    load_specs(path)?
        .iter()
        .map(|spec| spec.compile(model, config))
        .collect()
}
