use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::formula::{Formula, Value};
use crate::rules::Rule;

/// Index type for the derivation arena
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DerivIdx(pub u32);

/// Where a derivation sits: over a span of the input, or floating free of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Span {
  Anchored { start: usize, end: usize },
  Floating,
}

impl Span {
  pub fn new(start: usize, end: usize) -> Self {
    Self::Anchored { start, end }
  }

  pub fn bounds(self) -> Option<(usize, usize)> {
    match self {
      Self::Anchored { start, end } => Some((start, end)),
      Self::Floating => None,
    }
  }

  pub fn is_anchored(self) -> bool {
    matches!(self, Self::Anchored { .. })
  }
}

impl fmt::Display for Span {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Anchored { start, end } => write!(f, "{}..{}", start, end),
      Self::Floating => write!(f, "~"),
    }
  }
}

/// Sparse local features: (name, value) pairs, in insertion order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureVector {
  features: Vec<(String, f64)>,
}

impl FeatureVector {
  pub fn new() -> Self {
    Default::default()
  }

  pub fn add(&mut self, name: impl Into<String>, value: f64) {
    self.features.push((name.into(), value));
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
    self.features.iter().map(|(k, v)| (k.as_str(), *v))
  }

  pub fn len(&self) -> usize {
    self.features.len()
  }

  pub fn is_empty(&self) -> bool {
    self.features.is_empty()
  }
}

/// A scored partial parse carrying a logical form.
///
/// Children are indices into the `DerivationArena` that owns this derivation,
/// so a subtree can be shared by any number of parents. Once allocated, only
/// the score, value and features are ever touched again.
#[derive(Debug, Clone)]
pub struct Derivation {
  pub cat: String,
  pub span: Span,
  /// `None` for the token and phrase derivations seeded from the input
  pub rule: Option<Arc<Rule>>,
  pub children: Vec<DerivIdx>,
  pub formula: Formula,
  /// Semantic type, if the semantic function assigned one
  pub ty: Option<String>,
  pub local_features: FeatureVector,
  pub score: f64,
  /// Filled in by an executor, or directly by a semantic function
  pub value: Option<Value>,
  /// The input words (or rule literals) this derivation accounts for
  pub canonical_utterance: String,
  featurized: bool,
  hash: u64,
}

impl Derivation {
  pub fn new(cat: impl Into<String>, span: Span, rule: Option<Arc<Rule>>, children: Vec<DerivIdx>) -> Self {
    Self {
      cat: cat.into(),
      span,
      rule,
      children,
      formula: Formula::Null,
      ty: None,
      local_features: FeatureVector::new(),
      score: 0.0,
      value: None,
      canonical_utterance: String::new(),
      featurized: false,
      hash: 0,
    }
  }

  pub fn with_formula(mut self, formula: Formula) -> Self {
    self.formula = formula;
    self
  }

  pub fn with_type(mut self, ty: impl Into<String>) -> Self {
    self.ty = Some(ty.into());
    self
  }

  pub fn with_value(mut self, value: Value) -> Self {
    self.value = Some(value);
    self
  }

  pub fn with_utterance(mut self, utterance: impl Into<String>) -> Self {
    self.canonical_utterance = utterance.into();
    self
  }

  pub fn start(&self) -> Option<usize> {
    self.span.bounds().map(|(s, _)| s)
  }

  pub fn end(&self) -> Option<usize> {
    self.span.bounds().map(|(_, e)| e)
  }

  pub fn is_featurized(&self) -> bool {
    self.featurized
  }

  pub(crate) fn mark_featurized(&mut self) {
    self.featurized = true;
  }

  pub fn rule_id(&self) -> Option<usize> {
    self.rule.as_ref().map(|r| r.id())
  }

  /// Structural hash, fixed at allocation. Zero before then.
  pub fn structural_hash(&self) -> u64 {
    self.hash
  }
}

/// An arena that owns every derivation built for one parse
#[derive(Debug, Default, Clone)]
pub struct DerivationArena {
  derivs: Vec<Derivation>,
}

impl DerivationArena {
  pub fn new() -> Self {
    Default::default()
  }

  pub fn len(&self) -> usize {
    self.derivs.len()
  }

  pub fn is_empty(&self) -> bool {
    self.derivs.is_empty()
  }

  /// Moves a derivation into the arena. Its children must already live here.
  pub fn alloc(&mut self, mut deriv: Derivation) -> DerivIdx {
    deriv.hash = self.compute_hash(&deriv);
    let idx = self.derivs.len() as u32;
    self.derivs.push(deriv);
    DerivIdx(idx)
  }

  fn compute_hash(&self, deriv: &Derivation) -> u64 {
    let mut h = DefaultHasher::new();
    deriv.cat.hash(&mut h);
    deriv.span.hash(&mut h);
    deriv.rule_id().hash(&mut h);
    for &child in deriv.children.iter() {
      self.get(child).hash.hash(&mut h);
    }
    deriv.formula.hash(&mut h);
    h.finish()
  }

  /// Get an idx. Assumes valid, panics on OOB
  pub fn get(&self, idx: DerivIdx) -> &Derivation {
    self.derivs.get(idx.0 as usize).expect("Invalid DerivIdx")
  }

  pub(crate) fn get_mut(&mut self, idx: DerivIdx) -> &mut Derivation {
    self.derivs.get_mut(idx.0 as usize).expect("Invalid DerivIdx")
  }

  /// Equal iff category, span, rule, formula and (recursively) children match
  pub fn structurally_equal(&self, a: DerivIdx, b: DerivIdx) -> bool {
    self.structural_cmp(a, b) == Ordering::Equal
  }

  /// A total order on structure, independent of arena position
  fn structural_cmp(&self, a: DerivIdx, b: DerivIdx) -> Ordering {
    if a == b {
      return Ordering::Equal;
    }
    let (da, db) = (self.get(a), self.get(b));
    da.hash
      .cmp(&db.hash)
      .then_with(|| da.cat.cmp(&db.cat))
      .then_with(|| da.span.cmp(&db.span))
      .then_with(|| da.rule_id().cmp(&db.rule_id()))
      .then_with(|| da.formula.cmp(&db.formula))
      .then_with(|| da.children.len().cmp(&db.children.len()))
      .then_with(|| {
        da.children
          .iter()
          .zip(db.children.iter())
          .map(|(&ca, &cb)| self.structural_cmp(ca, cb))
          .find(|o| o.is_ne())
          .unwrap_or(Ordering::Equal)
      })
  }

  /// Beam order: descending score, ties broken by structure (never by
  /// insertion order) so that parses are reproducible.
  pub fn rank(&self, a: DerivIdx, b: DerivIdx) -> Ordering {
    let (sa, sb) = (self.get(a).score, self.get(b).score);
    sb.total_cmp(&sa).then_with(|| self.structural_cmp(a, b))
  }

  pub fn sort_by_score(&self, derivs: &mut [DerivIdx]) {
    derivs.sort_by(|&a, &b| self.rank(a, b));
  }

  /// Input positions consumed by the anchored parts of a derivation
  pub fn anchored_tokens(&self, idx: DerivIdx) -> BTreeSet<usize> {
    let mut tokens = BTreeSet::new();
    self.collect_anchored_tokens(idx, &mut tokens);
    tokens
  }

  fn collect_anchored_tokens(&self, idx: DerivIdx, tokens: &mut BTreeSet<usize>) {
    let deriv = self.get(idx);
    match deriv.span {
      Span::Anchored { start, end } => tokens.extend(start..end),
      Span::Floating => {
        for &child in deriv.children.iter() {
          self.collect_anchored_tokens(child, tokens);
        }
      }
    }
  }

  /// Display an idx
  pub fn display(&self, idx: DerivIdx) -> DerivDisplay<'_> {
    DerivDisplay { arena: self, idx }
  }

  /// Comma-separated rendering, for log lines and error messages
  pub fn describe_all(&self, derivs: &[DerivIdx]) -> String {
    derivs
      .iter()
      .map(|&d| self.display(d).to_string())
      .collect::<Vec<_>>()
      .join(", ")
  }
}

pub struct DerivDisplay<'a> {
  arena: &'a DerivationArena,
  idx: DerivIdx,
}

impl fmt::Display for DerivDisplay<'_> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let d = self.arena.get(self.idx);
    write!(f, "{}[{}] {} (score={:.3})", d.cat, d.span, d.formula, d.score)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn leaf(arena: &mut DerivationArena, word: &str, i: usize) -> DerivIdx {
    arena.alloc(Derivation::new("$TOKEN", Span::new(i, i + 1), None, vec![]).with_formula(Formula::string(word)))
  }

  #[test]
  fn test_structural_equality() {
    let mut arena = DerivationArena::new();
    let a1 = leaf(&mut arena, "a", 0);
    let a2 = leaf(&mut arena, "a", 0);
    let b = leaf(&mut arena, "b", 0);
    assert!(arena.structurally_equal(a1, a2));
    assert_eq!(arena.get(a1).structural_hash(), arena.get(a2).structural_hash());
    assert!(!arena.structurally_equal(a1, b));

    let p1 = arena.alloc(Derivation::new("$X", Span::Floating, None, vec![a1, b]));
    let p2 = arena.alloc(Derivation::new("$X", Span::Floating, None, vec![a2, b]));
    let p3 = arena.alloc(Derivation::new("$X", Span::Floating, None, vec![b, a2]));
    assert!(arena.structurally_equal(p1, p2));
    assert!(!arena.structurally_equal(p1, p3));
  }

  #[test]
  fn test_rank_ignores_insertion_order() {
    let mut arena = DerivationArena::new();
    let x = leaf(&mut arena, "x", 0);
    let y = leaf(&mut arena, "y", 0);
    let z = leaf(&mut arena, "z", 0);
    arena.get_mut(z).score = 2.0;

    let mut forward = vec![x, y, z];
    let mut backward = vec![z, y, x];
    arena.sort_by_score(&mut forward);
    arena.sort_by_score(&mut backward);
    assert_eq!(forward, backward);
    assert_eq!(forward[0], z);
  }

  #[test]
  fn test_anchored_tokens() {
    let mut arena = DerivationArena::new();
    let a = leaf(&mut arena, "a", 1);
    let b = arena.alloc(Derivation::new("$B", Span::new(3, 5), None, vec![]));
    let inner = arena.alloc(Derivation::new("$F", Span::Floating, None, vec![b]));
    let top = arena.alloc(Derivation::new("$F", Span::Floating, None, vec![a, inner]));
    assert_eq!(arena.anchored_tokens(top).into_iter().collect::<Vec<_>>(), vec![1, 3, 4]);
  }
}
