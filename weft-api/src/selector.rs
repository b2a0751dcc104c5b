//! Label selectors
//!
//! The match-labels / match-expressions form used by placement policies and
//! transforms. `compile` turns the declarative form into a matcher; a
//! malformed selector (bad operator arity) fails compilation, which the
//! placement evaluator reports on every candidate.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Errors produced when compiling a selector.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectorError {
    #[error("selector key must not be empty")]
    EmptyKey,

    #[error("operator {operator} on key {key:?} requires values")]
    MissingValues { key: String, operator: SelectorOperator },

    #[error("operator {operator} on key {key:?} must not carry values")]
    UnexpectedValues { key: String, operator: SelectorOperator },
}

/// Set-based selector operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectorOperator {
    In,
    NotIn,
    Exists,
    DoesNotExist,
}

impl fmt::Display for SelectorOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SelectorOperator::In => "In",
            SelectorOperator::NotIn => "NotIn",
            SelectorOperator::Exists => "Exists",
            SelectorOperator::DoesNotExist => "DoesNotExist",
        };
        f.write_str(s)
    }
}

/// One set-based requirement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectorRequirement {
    pub key: String,
    pub operator: SelectorOperator,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
}

/// Declarative label selector. An empty selector matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LabelSelector {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub match_labels: BTreeMap<String, String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub match_expressions: Vec<SelectorRequirement>,
}

impl LabelSelector {
    pub fn is_empty(&self) -> bool {
        self.match_labels.is_empty() && self.match_expressions.is_empty()
    }

    /// Validate the declarative form and return a matcher.
    pub fn compile(&self) -> Result<CompiledSelector, SelectorError> {
        for requirement in &self.match_expressions {
            if requirement.key.is_empty() {
                return Err(SelectorError::EmptyKey);
            }
            match requirement.operator {
                SelectorOperator::In | SelectorOperator::NotIn => {
                    if requirement.values.is_empty() {
                        return Err(SelectorError::MissingValues {
                            key: requirement.key.clone(),
                            operator: requirement.operator,
                        });
                    }
                }
                SelectorOperator::Exists | SelectorOperator::DoesNotExist => {
                    if !requirement.values.is_empty() {
                        return Err(SelectorError::UnexpectedValues {
                            key: requirement.key.clone(),
                            operator: requirement.operator,
                        });
                    }
                }
            }
        }
        for key in self.match_labels.keys() {
            if key.is_empty() {
                return Err(SelectorError::EmptyKey);
            }
        }
        Ok(CompiledSelector {
            selector: self.clone(),
        })
    }
}

/// A validated selector ready to match label sets.
#[derive(Debug, Clone)]
pub struct CompiledSelector {
    selector: LabelSelector,
}

impl CompiledSelector {
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        for (key, value) in &self.selector.match_labels {
            if labels.get(key) != Some(value) {
                return false;
            }
        }
        for requirement in &self.selector.match_expressions {
            let actual = labels.get(&requirement.key);
            let ok = match requirement.operator {
                SelectorOperator::In => {
                    actual.is_some_and(|v| requirement.values.iter().any(|w| w == v))
                }
                SelectorOperator::NotIn => {
                    !actual.is_some_and(|v| requirement.values.iter().any(|w| w == v))
                }
                SelectorOperator::Exists => actual.is_some(),
                SelectorOperator::DoesNotExist => actual.is_none(),
            };
            if !ok {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn empty_selector_matches_everything() {
        let compiled = LabelSelector::default().compile().unwrap();
        assert!(compiled.matches(&labels(&[])));
        assert!(compiled.matches(&labels(&[("tier", "prod")])));
    }

    #[test]
    fn match_labels_require_exact_values() {
        let selector = LabelSelector {
            match_labels: labels(&[("tier", "prod")]),
            ..Default::default()
        };
        let compiled = selector.compile().unwrap();
        assert!(compiled.matches(&labels(&[("tier", "prod"), ("region", "west")])));
        assert!(!compiled.matches(&labels(&[("tier", "staging")])));
        assert!(!compiled.matches(&labels(&[])));
    }

    #[test]
    fn expression_operators() {
        let selector = LabelSelector {
            match_expressions: vec![
                SelectorRequirement {
                    key: "region".into(),
                    operator: SelectorOperator::In,
                    values: vec!["west".into(), "east".into()],
                },
                SelectorRequirement {
                    key: "deprecated".into(),
                    operator: SelectorOperator::DoesNotExist,
                    values: vec![],
                },
            ],
            ..Default::default()
        };
        let compiled = selector.compile().unwrap();
        assert!(compiled.matches(&labels(&[("region", "west")])));
        assert!(!compiled.matches(&labels(&[("region", "north")])));
        assert!(!compiled.matches(&labels(&[("region", "west"), ("deprecated", "true")])));
    }

    #[test]
    fn compile_rejects_bad_arity() {
        let missing = LabelSelector {
            match_expressions: vec![SelectorRequirement {
                key: "region".into(),
                operator: SelectorOperator::In,
                values: vec![],
            }],
            ..Default::default()
        };
        assert!(matches!(
            missing.compile(),
            Err(SelectorError::MissingValues { .. })
        ));

        let unexpected = LabelSelector {
            match_expressions: vec![SelectorRequirement {
                key: "region".into(),
                operator: SelectorOperator::Exists,
                values: vec!["west".into()],
            }],
            ..Default::default()
        };
        assert!(matches!(
            unexpected.compile(),
            Err(SelectorError::UnexpectedValues { .. })
        ));
    }
}
