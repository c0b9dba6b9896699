//! The reachability pre-pass.
//!
//! A `CoarseChart` records, for each (category, span), which child
//! (category, span) pairs justified it, and nothing else: no formulas, no
//! scores. After pruning top-down from the root it answers one question for
//! the full pass: could this (category, span) end up under a root at all?

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

use tracing::debug;

use crate::chart::Chart;
use crate::derivation::{DerivIdx, DerivationArena};
use crate::error::Error;
use crate::example::Example;
use crate::grammar::{Grammar, SpecialCats};
use crate::rules::Symbol;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CategorySpan {
  pub cat: String,
  pub start: usize,
  pub end: usize,
}

impl CategorySpan {
  pub fn new(cat: impl Into<String>, start: usize, end: usize) -> Self {
    Self {
      cat: cat.into(),
      start,
      end,
    }
  }
}

impl fmt::Display for CategorySpan {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}[{}..{}]", self.cat, self.start, self.end)
  }
}

/// One way of building a (category, span): the category children it used.
/// Literal tokens leave no trace here.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CoarseEdge {
  pub children: Vec<CategorySpan>,
}

impl fmt::Display for CoarseEdge {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.children.is_empty() {
      return write!(f, "-");
    }
    for (idx, child) in self.children.iter().enumerate() {
      if idx > 0 {
        write!(f, " ")?;
      }
      write!(f, "{}", child)?;
    }
    Ok(())
  }
}

#[derive(Debug, Clone)]
pub struct CoarseChart {
  chart: Chart<CoarseEdge>,
}

impl CoarseChart {
  pub fn new(num_tokens: usize) -> Self {
    Self {
      chart: Chart::new(num_tokens),
    }
  }

  pub fn num_tokens(&self) -> usize {
    self.chart.num_tokens()
  }

  /// Adds an edge unless the same one is already there
  pub fn add(&mut self, cat: &str, start: usize, end: usize, edge: CoarseEdge) {
    if !self.edges(cat, start, end).contains(&edge) {
      self.chart.add(start, end, cat, edge);
    }
  }

  pub fn edges(&self, cat: &str, start: usize, end: usize) -> &[CoarseEdge] {
    self.chart.get(start, end, cat)
  }

  /// Is (cat, start, end) present? Absent spans are simply not allowed.
  pub fn allows(&self, cat: &str, start: usize, end: usize) -> bool {
    self.chart.contains(start, end, cat)
  }

  /// Is any of `cats` present over this span?
  pub fn allows_any(&self, cats: &BTreeSet<String>, start: usize, end: usize) -> bool {
    let Some(cell) = self.chart.cell(start, end) else {
      return false;
    };
    if cell.len() < cats.len() {
      cell.keys().any(|cat| cats.contains(cat))
    } else {
      cats.iter().any(|cat| cell.contains_key(cat))
    }
  }

  pub fn num_slots(&self) -> usize {
    self.chart.num_slots()
  }

  /// Reads the skeleton off a chart of real derivations
  pub fn from_derivations(chart: &Chart<DerivIdx>, arena: &DerivationArena) -> Self {
    let mut coarse = Self::new(chart.num_tokens());
    for (start, end, cat, derivs) in chart.iter() {
      for &d in derivs {
        let children = arena
          .get(d)
          .children
          .iter()
          .filter_map(|&c| {
            let child = arena.get(c);
            child.span.bounds().map(|(s, e)| CategorySpan::new(child.cat.as_str(), s, e))
          })
          .collect();
        coarse.add(cat, start, end, CoarseEdge { children });
      }
    }
    coarse
  }

  /// Drops every (category, span) not reachable from `root` over the whole
  /// input by following recorded edges.
  pub fn keep_top_down_reachable(&mut self, root: &str) {
    let n = self.num_tokens();
    let mut reachable: HashSet<CategorySpan> = HashSet::new();
    let mut stack = Vec::new();

    if self.allows(root, 0, n) {
      let top = CategorySpan::new(root, 0, n);
      reachable.insert(top.clone());
      stack.push(top);
    }

    while let Some(current) = stack.pop() {
      for edge in self.edges(&current.cat, current.start, current.end) {
        for child in edge.children.iter() {
          if reachable.insert(child.clone()) {
            stack.push(child.clone());
          }
        }
      }
    }

    let before = self.num_slots();
    self
      .chart
      .retain(|start, end, cat| reachable.contains(&CategorySpan::new(cat, start, end)));
    debug!(before, after = self.num_slots(), "coarse chart pruned top-down");
  }
}

impl fmt::Display for CoarseChart {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.chart)
  }
}

/// A fast reachability pass over a binarized grammar: every anchored rule
/// is `$A -> $B`, at most two symbols, or tokens only.
#[derive(Debug)]
pub struct CoarseParser {
  /// left symbol -> right symbol -> left-hand sides
  binary: HashMap<Symbol, HashMap<Symbol, BTreeSet<String>>>,
  /// token sequence -> left-hand sides
  terminals: HashMap<Vec<String>, BTreeSet<String>>,
  /// (lhs, rhs) of the anchored unary rules, in topological order
  cat_unary: Vec<(String, String)>,
  lexical: Vec<String>,
  special: SpecialCats,
}

impl CoarseParser {
  pub fn new(grammar: &Grammar) -> Result<Self, Error> {
    let mut binary: HashMap<Symbol, HashMap<Symbol, BTreeSet<String>>> = HashMap::new();
    let mut terminals: HashMap<Vec<String>, BTreeSet<String>> = HashMap::new();

    for rule in grammar.rules().iter().filter(|r| r.is_anchored()) {
      if rule.is_rhs_terminals() {
        let tokens = rule.rhs.iter().map(|s| s.symbol_str().to_string()).collect();
        terminals.entry(tokens).or_default().insert(rule.lhs.clone());
      } else if rule.is_cat_unary() {
        continue;
      } else if rule.len() == 2 {
        binary
          .entry(rule.rhs[0].clone())
          .or_default()
          .entry(rule.rhs[1].clone())
          .or_default()
          .insert(rule.lhs.clone());
      } else {
        return Err(Error::NotBinarized {
          pass: "coarse pass",
          rule: rule.to_string(),
        });
      }
    }

    let cat_unary = grammar
      .cat_unary_rules()
      .iter()
      .filter(|r| r.is_anchored())
      .map(|r| (r.lhs.clone(), r.rhs[0].symbol_str().to_string()))
      .collect();

    Ok(Self {
      binary,
      terminals,
      cat_unary,
      lexical: grammar.referenced_lexical().map(str::to_string).collect(),
      special: grammar.special().clone(),
    })
  }

  /// Fills the coarse chart bottom-up. Not pruned yet.
  pub fn parse(&self, ex: &Example) -> CoarseChart {
    let n = ex.num_tokens();
    let mut chart = CoarseChart::new(n);
    for len in 1..=n {
      for start in 0..=(n - len) {
        self.build(ex, &mut chart, start, start + len);
      }
    }
    debug!(tokens = n, slots = chart.num_slots(), "coarse pass done");
    chart
  }

  fn build(&self, ex: &Example, chart: &mut CoarseChart, start: usize, end: usize) {
    for cat in self.lexical.iter() {
      let single_token = *cat == self.special.token || *cat == self.special.lemma_token;
      if !single_token || end - start == 1 {
        chart.add(cat, start, end, CoarseEdge::default());
      }
    }

    if let Some(lhs_cats) = self.terminals.get(&ex.tokens()[start..end]) {
      for lhs in lhs_cats {
        chart.add(lhs, start, end, CoarseEdge::default());
      }
    }

    for mid in (start + 1)..end {
      let lefts = Self::symbols(ex, chart, start, mid);
      let rights = Self::symbols(ex, chart, mid, end);
      for left in lefts.iter() {
        let Some(by_right) = self.binary.get(left) else {
          continue;
        };
        for right in rights.iter() {
          let Some(lhs_cats) = by_right.get(right) else {
            continue;
          };
          let children: Vec<CategorySpan> = [(left, start, mid), (right, mid, end)]
            .into_iter()
            .filter_map(|(sym, s, e)| sym.category().map(|c| CategorySpan::new(c, s, e)))
            .collect();
          for lhs in lhs_cats {
            chart.add(
              lhs,
              start,
              end,
              CoarseEdge {
                children: children.clone(),
              },
            );
          }
        }
      }
    }

    for (lhs, rhs) in self.cat_unary.iter() {
      if chart.allows(rhs, start, end) {
        let children = vec![CategorySpan::new(rhs.as_str(), start, end)];
        chart.add(lhs, start, end, CoarseEdge { children });
      }
    }
  }

  /// What can stand in a right-hand side slot over this span
  fn symbols(ex: &Example, chart: &CoarseChart, start: usize, end: usize) -> Vec<Symbol> {
    let mut symbols: Vec<Symbol> = chart
      .chart
      .categories(start, end)
      .map(|c| Symbol::Category(c.to_string()))
      .collect();
    if end == start + 1 {
      symbols.push(Symbol::Token(ex.token(start).to_string()));
    }
    symbols
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn grammar(src: &str) -> Grammar {
    src.parse().unwrap()
  }

  #[test]
  fn test_binarized_pass_and_top_down_pruning() {
    let g = grammar(
      r#"
      $ROOT -> $A $B;
      $ROOT -> $C c;
      $A -> a;
      $C -> a;
      $B -> b;
      $B -> $D;
      $D -> b;
      "#,
    );
    let coarse = CoarseParser::new(&g).unwrap();
    let ex = Example::from_utterance("a b");
    let mut chart = coarse.parse(&ex);

    assert!(chart.allows("$C", 0, 1));
    assert!(chart.allows("$D", 1, 2));
    assert_eq!(chart.edges("$ROOT", 0, 2).len(), 1);
    assert_eq!(chart.edges("$ROOT", 0, 2)[0].to_string(), "$A[0..1] $B[1..2]");

    chart.keep_top_down_reachable("$ROOT");
    assert!(chart.allows("$ROOT", 0, 2));
    assert!(chart.allows("$A", 0, 1));
    assert!(chart.allows("$D", 1, 2));
    assert!(!chart.allows("$C", 0, 1));
    assert!(!chart.allows("$ROOT", 0, 9));

    let wanted: BTreeSet<String> = ["$C", "$B"].iter().map(|s| s.to_string()).collect();
    assert!(chart.allows_any(&wanted, 1, 2));
    assert!(!chart.allows_any(&wanted, 0, 1));
  }

  #[test]
  fn test_lexical_seeds() {
    let g = grammar("$ROOT -> $PHRASE; $ROOT -> $TOKEN $TOKEN;");
    let coarse = CoarseParser::new(&g).unwrap();
    let mut chart = coarse.parse(&Example::from_utterance("x y z"));
    assert!(chart.allows("$PHRASE", 0, 3));
    assert!(chart.allows("$TOKEN", 2, 3));
    assert!(!chart.allows("$TOKEN", 1, 3));
    assert!(!chart.allows("$LEMMA_TOKEN", 0, 1));

    chart.keep_top_down_reachable("$ROOT");
    assert!(chart.allows("$PHRASE", 0, 3));
    assert!(!chart.allows("$PHRASE", 0, 1));
    assert!(!chart.allows("$TOKEN", 0, 1));
  }

  #[test]
  fn test_requires_binarized_grammar() {
    let g = grammar("$ROOT -> a $A b; $A -> a;");
    match CoarseParser::new(&g) {
      Err(Error::NotBinarized { rule, .. }) => assert!(rule.starts_with("$ROOT -> a $A b")),
      other => panic!("expected NotBinarized, got {:?}", other.map(|_| ())),
    }

    // long token-only rules are fine
    assert!(CoarseParser::new(&grammar("$ROOT -> a b c;")).is_ok());
  }
}
