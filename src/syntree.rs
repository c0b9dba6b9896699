use std::fmt;

use crate::derivation::{DerivIdx, DerivationArena, Span};

#[derive(Debug, PartialEq, Clone)]
pub struct Constituent<T> {
  pub value: T,
  pub span: Span,
}

impl<T> fmt::Display for Constituent<T>
where
  T: fmt::Display,
{
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}: {}", self.span, self.value)
  }
}

#[derive(Debug, PartialEq, Clone)]
pub struct Word<U> {
  pub value: U,
  pub span: Span,
}

impl<U> fmt::Display for Word<U>
where
  U: fmt::Display,
{
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}: {}", self.span, self.value)
  }
}

#[derive(Debug, PartialEq, Clone)]
pub enum SynTree<T, U> {
  Branch(Constituent<T>, Vec<SynTree<T, U>>),
  Leaf(Word<U>),
}

impl<T, U> SynTree<T, U> {
  pub fn is_leaf(&self) -> bool {
    matches!(self, Self::Leaf(_))
  }

  pub fn is_branch(&self) -> bool {
    matches!(self, Self::Branch(_, _))
  }

  pub fn get_leaf(&self) -> Option<&Word<U>> {
    match self {
      Self::Leaf(w) => Some(w),
      _ => None,
    }
  }

  pub fn get_branch(&self) -> Option<(&Constituent<T>, &Vec<SynTree<T, U>>)> {
    match self {
      Self::Branch(c, cs) => Some((c, cs)),
      _ => None,
    }
  }
}

impl SynTree<String, String> {
  /// Branches are labelled `$Cat formula`. Seeded token and phrase
  /// derivations become leaves, as do the words under a childless rule.
  pub fn from_derivation(arena: &DerivationArena, idx: DerivIdx) -> Self {
    let d = arena.get(idx);
    let word = || {
      Self::Leaf(Word {
        value: d.canonical_utterance.clone(),
        span: d.span,
      })
    };

    if d.rule.is_none() && d.children.is_empty() {
      return word();
    }

    let mut children: Vec<Self> = d
      .children
      .iter()
      .map(|&c| Self::from_derivation(arena, c))
      .collect();
    if children.is_empty() {
      children.push(word());
    }

    Self::Branch(
      Constituent {
        value: format!("{} {}", d.cat, d.formula),
        span: d.span,
      },
      children,
    )
  }
}

impl<T, U> fmt::Display for SynTree<T, U>
where
  T: fmt::Display,
  U: fmt::Display,
{
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Leaf(t) => write!(f, "{}", t),
      Self::Branch(t, ts) => {
        write!(f, "({}", t)?;
        if ts.len() == 1 {
          write!(f, " ({}))", ts[0])
        } else {
          for t in ts.iter() {
            // indent every line of the child
            for line in t.to_string().lines() {
              write!(f, "\n  {}", line)?;
            }
          }
          write!(f, ")")
        }
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::derivation::Derivation;
  use crate::formula::Formula;

  #[test]
  fn test_tree_from_derivation() {
    let mut arena = DerivationArena::new();
    let a = arena.alloc(
      Derivation::new("$TOKEN", Span::new(0, 1), None, vec![])
        .with_formula(Formula::string("a"))
        .with_utterance("a"),
    );
    let b = arena.alloc(
      Derivation::new("$TOKEN", Span::new(1, 2), None, vec![])
        .with_formula(Formula::string("b"))
        .with_utterance("b"),
    );
    let top = arena.alloc(Derivation::new("$S", Span::new(0, 2), None, vec![a, b]).with_formula(Formula::atom("ab")));

    let tree = SynTree::from_derivation(&arena, top);
    let (cons, children) = tree.get_branch().unwrap();
    assert_eq!(cons.value, "$S ab");
    assert_eq!(children.len(), 2);
    assert!(children.iter().all(SynTree::is_leaf));
    assert_eq!(children[1].get_leaf().unwrap().value, "b");
    assert_eq!(tree.to_string(), "(0..2: $S ab\n  0..1: a\n  1..2: b)");

    let single = arena.alloc(Derivation::new("$T", Span::new(0, 2), None, vec![top]));
    let tree = SynTree::from_derivation(&arena, single);
    assert!(tree.is_branch());
    assert!(tree.to_string().starts_with("(0..2: $T null ((0..2: $S ab"));
  }
}
