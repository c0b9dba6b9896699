use std::fmt;
use std::sync::Arc;

use crate::semfn::SemanticFn;

/// Categories are told apart from literal tokens by this prefix
pub const CATEGORY_SIGIL: char = '$';

pub fn is_category(s: &str) -> bool {
  s.starts_with(CATEGORY_SIGIL)
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Symbol {
  /// A literal token that has to appear in the input
  Token(String),
  /// A category name, including its sigil
  Category(String),
}

impl Symbol {
  /// `$Foo` becomes a category, anything else a token
  pub fn parse(s: &str) -> Self {
    if is_category(s) {
      Self::Category(s.to_string())
    } else {
      Self::Token(s.to_string())
    }
  }

  pub fn symbol_str(&self) -> &str {
    match self {
      Self::Token(s) => s,
      Self::Category(s) => s,
    }
  }

  pub fn is_token(&self) -> bool {
    matches!(self, Self::Token(_))
  }

  pub fn is_category(&self) -> bool {
    matches!(self, Self::Category(_))
  }

  pub fn category(&self) -> Option<&str> {
    match self {
      Self::Category(s) => Some(s),
      _ => None,
    }
  }
}

impl fmt::Display for Symbol {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.symbol_str())
  }
}

/// Which combination topology a rule may take part in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Anchoring {
  /// Span-indexed cells only
  #[default]
  Anchored,
  /// Depth-indexed cells only
  Floating,
  Both,
}

impl Anchoring {
  pub fn is_anchored(self) -> bool {
    matches!(self, Self::Anchored | Self::Both)
  }

  pub fn is_floating(self) -> bool {
    matches!(self, Self::Floating | Self::Both)
  }
}

/// A grammar rule. Immutable once it has been handed to a `Grammar`, which
/// numbers rules in order.
#[derive(Debug, Clone)]
pub struct Rule {
  pub(crate) id: usize,
  pub lhs: String,
  pub rhs: Vec<Symbol>,
  pub sem: Arc<dyn SemanticFn>,
  pub anchoring: Anchoring,
}

impl Rule {
  pub fn new(lhs: impl Into<String>, rhs: Vec<Symbol>, sem: Arc<dyn SemanticFn>) -> Self {
    Self {
      id: 0,
      lhs: lhs.into(),
      rhs,
      sem,
      anchoring: Anchoring::default(),
    }
  }

  /// Shorthand taking whitespace-separated RHS symbols: `"$X and $Y"`
  pub fn from_strs(lhs: &str, rhs: &str, sem: Arc<dyn SemanticFn>) -> Self {
    Self::new(lhs, rhs.split_whitespace().map(Symbol::parse).collect(), sem)
  }

  pub fn with_anchoring(mut self, anchoring: Anchoring) -> Self {
    self.anchoring = anchoring;
    self
  }

  /// Position of this rule in its grammar
  pub fn id(&self) -> usize {
    self.id
  }

  pub fn len(&self) -> usize {
    self.rhs.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// `$A -> $B`
  pub fn is_cat_unary(&self) -> bool {
    self.rhs.len() == 1 && self.rhs[0].is_category()
  }

  pub fn is_rhs_terminals(&self) -> bool {
    self.rhs.iter().all(Symbol::is_token)
  }

  pub fn num_rhs_cats(&self) -> usize {
    self.rhs.iter().filter(|s| s.is_category()).count()
  }

  pub fn rhs_categories(&self) -> impl Iterator<Item = &str> {
    self.rhs.iter().filter_map(Symbol::category)
  }

  pub fn is_anchored(&self) -> bool {
    self.anchoring.is_anchored()
  }

  pub fn is_floating(&self) -> bool {
    self.anchoring.is_floating()
  }
}

impl fmt::Display for Rule {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} ->", self.lhs)?;
    for s in self.rhs.iter() {
      write!(f, " {}", s)?;
    }
    write!(f, " {:?}", self.sem)
  }
}
