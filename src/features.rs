use std::collections::HashMap;

use crate::derivation::{Derivation, DerivationArena, FeatureVector};
use crate::example::Example;
use crate::formula::{Formula, Value};

/// Attaches local features to freshly built derivations. Every beam uses the
/// same scores, so this has to be deterministic.
pub trait Featurizer: Send + Sync {
  fn extract_local(&self, ex: &Example, deriv: &Derivation, arena: &DerivationArena, features: &mut FeatureVector);
}

/// One indicator feature per rule: `rule=<rule>`. Seeded derivations get nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleFeaturizer;

impl RuleFeaturizer {
  pub fn feature_name(rule: &crate::rules::Rule) -> String {
    format!("rule={}", rule)
  }
}

impl Featurizer for RuleFeaturizer {
  fn extract_local(&self, _ex: &Example, deriv: &Derivation, _arena: &DerivationArena, features: &mut FeatureVector) {
    if let Some(rule) = &deriv.rule {
      features.add(Self::feature_name(rule), 1.0);
    }
  }
}

/// Runs formulas. Optional; when present it backs error-value pruning and
/// the execution of predicted derivations.
pub trait Executor: Send + Sync {
  fn execute(&self, formula: &Formula, ex: &Example) -> Value;
}

/// Model weights
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
  weights: HashMap<String, f64>,
}

impl Params {
  pub fn new() -> Self {
    Default::default()
  }

  pub fn set(&mut self, name: impl Into<String>, weight: f64) {
    self.weights.insert(name.into(), weight);
  }

  pub fn weight(&self, name: &str) -> f64 {
    self.weights.get(name).copied().unwrap_or(0.0)
  }

  pub fn dot(&self, features: &FeatureVector) -> f64 {
    features.iter().map(|(name, value)| self.weight(name) * value).sum()
  }

  /// Local score plus the scores of the children
  pub fn score(&self, deriv: &Derivation, arena: &DerivationArena) -> f64 {
    let children: f64 = deriv.children.iter().map(|&c| arena.get(c).score).sum();
    self.dot(&deriv.local_features) + children
  }
}

impl<S: Into<String>> FromIterator<(S, f64)> for Params {
  fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
    Self {
      weights: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
    }
  }
}
