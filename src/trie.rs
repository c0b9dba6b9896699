use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::rules::{Rule, Symbol};

/// Prefix tree over rule right-hand sides. Each node knows which left-hand
/// categories can still be completed below it, so a walk can give up as soon
/// as none of them are wanted.
#[derive(Debug, Default)]
pub struct Trie {
  /// Rules whose right-hand side ends here
  rules: Vec<Arc<Rule>>,
  tokens: HashMap<String, Trie>,
  cats: HashMap<String, Trie>,
  lhs_cats: BTreeSet<String>,
}

impl Trie {
  pub fn new() -> Self {
    Default::default()
  }

  /// Indexes every anchored rule that is neither empty nor `$A -> $B`.
  /// Those are handled by the unary pass.
  pub fn from_rules<'a>(rules: impl IntoIterator<Item = &'a Arc<Rule>>) -> Self {
    let mut trie = Self::new();
    for rule in rules {
      if rule.is_anchored() && !rule.is_cat_unary() && !rule.is_empty() {
        trie.add(rule.clone());
      }
    }
    trie
  }

  pub fn add(&mut self, rule: Arc<Rule>) {
    let mut node = self;
    node.lhs_cats.insert(rule.lhs.clone());
    for symbol in rule.rhs.iter() {
      let edges = match symbol {
        Symbol::Token(_) => &mut node.tokens,
        Symbol::Category(_) => &mut node.cats,
      };
      node = edges.entry(symbol.symbol_str().to_string()).or_default();
      node.lhs_cats.insert(rule.lhs.clone());
    }
    node.rules.push(rule);
  }

  pub fn next_token(&self, token: &str) -> Option<&Trie> {
    self.tokens.get(token)
  }

  pub fn next_cat(&self, cat: &str) -> Option<&Trie> {
    self.cats.get(cat)
  }

  pub fn next(&self, symbol: &Symbol) -> Option<&Trie> {
    match symbol {
      Symbol::Token(t) => self.next_token(t),
      Symbol::Category(c) => self.next_cat(c),
    }
  }

  pub fn rules(&self) -> &[Arc<Rule>] {
    &self.rules
  }

  /// Left-hand sides of every rule at or below this node
  pub fn lhs_cats(&self) -> &BTreeSet<String> {
    &self.lhs_cats
  }

  pub fn num_nodes(&self) -> usize {
    1 + self
      .tokens
      .values()
      .chain(self.cats.values())
      .map(Trie::num_nodes)
      .sum::<usize>()
  }
}
