//! Floating parsing: derivations that aren't tied to a span of the input.
//!
//! After the ordinary anchored chart is built, every anchored derivation is
//! copied into a floating cell at depth 0. Floating rules then combine
//! cells depth by depth, where a derivation's depth is one more than the
//! deepest child it was built from:
//!
//! ```text
//! tokens only          -> depth 1
//! $B, tok $B, $B tok   -> depth d, from $B at d - 1
//! $B $C                -> depth d, from one child at d - 1 and the other below d
//! ```
//!
//! Depth d only reads depths below d, so raising the maximum depth never
//! changes what the lower depths contain. Depth 0 is a plain copy of the
//! pruned anchored chart. From depth 1 up, a category never holds the same
//! formula twice, at one depth or across depths.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use tracing::debug;

use crate::derivation::{DerivIdx, Span};
use crate::error::Error;
use crate::example::Example;
use crate::features::Params;
use crate::formula::Formula;
use crate::parser::{Mode, Parse, Parser, ParserState, compose};
use crate::rules::Rule;

pub(crate) struct FloatingParserState<'p> {
  state: ParserState<'p>,
  /// (category, depth) -> derivations, pruned
  floating: BTreeMap<(String, usize), Vec<DerivIdx>>,
  /// category -> formulas already kept at some depth >= 1
  placed: HashMap<String, HashSet<Formula>>,
}

impl<'p> FloatingParserState<'p> {
  pub(crate) fn new(parser: &'p Parser, params: &'p Params, ex: &'p Example) -> Self {
    Self {
      state: ParserState::new(parser, params, ex, None, Mode::Full),
      floating: BTreeMap::new(),
      placed: HashMap::new(),
    }
  }

  pub(crate) fn infer(mut self) -> Result<Parse, Error> {
    let parser = self.state.parser;
    let max_depth = parser.options().max_depth;

    self.state.build_anchored()?;
    self.seed_depth_zero();
    for depth in 1..=max_depth {
      self.build_depth(depth)?;
    }

    let root = parser.grammar().root_cat();
    let mut predictions = self.state.anchored_roots();
    for depth in 1..=max_depth {
      predictions.extend_from_slice(self.cell(root, depth));
    }
    self.state.arena.sort_by_score(&mut predictions);

    Ok(self.state.into_parse(self.floating, predictions))
  }

  fn cell(&self, cat: &str, depth: usize) -> &[DerivIdx] {
    self
      .floating
      .get(&(cat.to_string(), depth))
      .map(Vec::as_slice)
      .unwrap_or(&[])
  }

  /// Every anchored derivation that survived its own beam also floats, at
  /// depth 0. Spans are merged but nothing is dropped: the same word at two
  /// positions stays two derivations.
  fn seed_depth_zero(&mut self) {
    for (_, _, cat, derivs) in self.state.chart.iter() {
      self
        .floating
        .entry((cat.to_string(), 0))
        .or_default()
        .extend_from_slice(derivs);
    }
  }

  fn overlaps(&self, a: DerivIdx, b: DerivIdx) -> bool {
    let arena = &self.state.arena;
    !arena.anchored_tokens(a).is_disjoint(&arena.anchored_tokens(b))
  }

  fn build_depth(&mut self, depth: usize) -> Result<(), Error> {
    let parser = self.state.parser;
    let use_anchors_once = parser.options().use_anchors_once;
    let cap = parser.options().max_new_trees_per_span;

    let mut apps: Vec<(&'p Arc<Rule>, Vec<DerivIdx>)> = Vec::new();
    for rule in parser.grammar().rules().iter().filter(|r| r.is_floating()) {
      let cats: Vec<&str> = rule.rhs_categories().collect();
      match cats.as_slice() {
        [] => {
          if depth == 1 {
            apps.push((rule, vec![]));
          }
        }
        [child] => {
          for &d in self.cell(child, depth - 1) {
            apps.push((rule, vec![d]));
          }
        }
        [left, right] => {
          let mut pairs = Vec::new();
          for &l in self.cell(left, depth - 1) {
            for below in 0..depth {
              pairs.extend(self.cell(right, below).iter().map(|&r| (l, r)));
            }
          }
          for below in 0..(depth - 1) {
            for &l in self.cell(left, below) {
              pairs.extend(self.cell(right, depth - 1).iter().map(|&r| (l, r)));
            }
          }
          for (l, r) in pairs {
            if use_anchors_once && self.overlaps(l, r) {
              continue;
            }
            apps.push((rule, vec![l, r]));
          }
        }
        _ => unreachable!("floating rules have at most two symbols"),
      }
    }

    let num_apps = apps.len();
    for (rule, children) in apps {
      let stream = compose(self.state.ex, &self.state.arena, rule, Span::Floating, &children)?;
      for deriv in stream.take(cap) {
        let idx = self.state.finish_derivation(deriv);
        self.floating.entry((rule.lhs.clone(), depth)).or_default().push(idx);
      }
    }

    self.prune_depth(depth);
    debug!(
      depth,
      applications = num_apps,
      cells = self.floating.keys().filter(|(_, d)| *d == depth).count(),
      "built floating depth"
    );
    Ok(())
  }

  fn prune_depth(&mut self, depth: usize) {
    let cats: Vec<String> = self
      .floating
      .keys()
      .filter(|(_, d)| *d == depth)
      .map(|(cat, _)| cat.clone())
      .collect();

    for cat in cats {
      let derivs = self.floating.remove(&(cat.clone(), depth)).unwrap_or_default();
      let derivs = self.dedup_by_formula(&cat, derivs);
      let kept = self
        .state
        .prune_list(|| format!("{}(depth {})", cat, depth), derivs);

      let arena = &self.state.arena;
      self
        .placed
        .entry(cat.clone())
        .or_default()
        .extend(kept.iter().map(|&d| arena.get(d).formula.clone()));
      if !kept.is_empty() {
        self.floating.insert((cat, depth), kept);
      }
    }
  }

  /// Keeps the best-ranked derivation for each formula `cat` doesn't
  /// already have at a lower depth
  fn dedup_by_formula(&mut self, cat: &str, mut derivs: Vec<DerivIdx>) -> Vec<DerivIdx> {
    let arena = &self.state.arena;
    arena.sort_by_score(&mut derivs);
    let before = derivs.len();
    let placed = self.placed.get(cat);
    let mut seen: HashSet<&Formula> = HashSet::new();
    derivs.retain(|&d| {
      let formula = &arena.get(d).formula;
      !placed.is_some_and(|p| p.contains(formula)) && seen.insert(formula)
    });
    self.state.stats.deduplicated += before - derivs.len();
    derivs
  }
}
