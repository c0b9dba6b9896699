//! The semantic-function capability, and a handful of built-in functions.
//!
//! A semantic function gets a rule plus the concrete children matched for its
//! right-hand side, and returns a `DerivationStream` of new derivations. The
//! returned stream owns everything it needs, so it can be drained after the
//! arena has moved on.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::derivation::{DerivIdx, Derivation, DerivationArena, Span};
use crate::error::SemanticError;
use crate::example::Example;
use crate::formula::Formula;
use crate::rules::Rule;
use crate::stream::DerivationStream;

pub trait SemanticFn: fmt::Debug + Send + Sync {
  fn call(&self, ex: &Example, c: &CallInfo<'_>) -> Result<DerivationStream, SemanticError>;
}

/// Everything a semantic function gets to look at for one application.
pub struct CallInfo<'a> {
  pub cat: &'a str,
  pub span: Span,
  pub rule: &'a Arc<Rule>,
  pub children: &'a [DerivIdx],
  pub arena: &'a DerivationArena,
}

impl<'a> CallInfo<'a> {
  pub fn child(&self, i: usize) -> Result<&'a Derivation, SemanticError> {
    self
      .children
      .get(i)
      .map(|&idx| self.arena.get(idx))
      .ok_or_else(|| SemanticError(format!("{} has no child {}", self.rule, i)))
  }

  pub fn num_children(&self) -> usize {
    self.children.len()
  }

  /// A derivation for this call with no formula yet
  pub fn derivation(&self) -> Derivation {
    Derivation::new(self.cat, self.span, Some(self.rule.clone()), self.children.to_vec())
  }
}

/// Passes its only child's formula and type through.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityFn;

impl SemanticFn for IdentityFn {
  fn call(&self, ex: &Example, c: &CallInfo<'_>) -> Result<DerivationStream, SemanticError> {
    if c.num_children() != 1 {
      return Err(SemanticError(format!(
        "IdentityFn needs exactly one child, got {}",
        c.num_children()
      )));
    }
    SelectFn(0).call(ex, c)
  }
}

/// Picks out the formula of one child.
#[derive(Debug, Clone, Copy)]
pub struct SelectFn(pub usize);

impl SemanticFn for SelectFn {
  fn call(&self, _ex: &Example, c: &CallInfo<'_>) -> Result<DerivationStream, SemanticError> {
    let child = c.child(self.0)?;
    let mut deriv = c.derivation().with_formula(child.formula.clone());
    deriv.ty = child.ty.clone();
    Ok(DerivationStream::single(deriv))
  }
}

/// Ignores its children and produces a fixed formula.
#[derive(Debug, Clone)]
pub struct ConstantFn {
  pub formula: Formula,
  pub ty: Option<String>,
}

impl ConstantFn {
  pub fn new(formula: Formula) -> Self {
    Self { formula, ty: None }
  }

  pub fn with_type(mut self, ty: impl Into<String>) -> Self {
    self.ty = Some(ty.into());
    self
  }
}

impl SemanticFn for ConstantFn {
  fn call(&self, _ex: &Example, c: &CallInfo<'_>) -> Result<DerivationStream, SemanticError> {
    let base = c.derivation();
    let formula = self.formula.clone();
    let ty = self.ty.clone();
    Ok(DerivationStream::lazy_single(move || {
      let mut deriv = base.with_formula(formula);
      deriv.ty = ty;
      deriv
    }))
  }
}

/// Builds `(head child0 child1 ...)`, or `(child0 child1 ...)` without a head.
#[derive(Debug, Clone, Default)]
pub struct ApplyFn {
  pub head: Option<String>,
}

impl ApplyFn {
  pub fn new(head: impl Into<String>) -> Self {
    Self {
      head: Some(head.into()),
    }
  }
}

impl SemanticFn for ApplyFn {
  fn call(&self, _ex: &Example, c: &CallInfo<'_>) -> Result<DerivationStream, SemanticError> {
    if self.head.is_none() && c.num_children() == 0 {
      return Err(SemanticError("ApplyFn without a head needs children".into()));
    }
    let mut items = Vec::with_capacity(c.num_children() + 1);
    if let Some(head) = &self.head {
      items.push(Formula::atom(head.clone()));
    }
    for i in 0..c.num_children() {
      items.push(c.child(i)?.formula.clone());
    }
    let base = c.derivation();
    Ok(DerivationStream::lazy_single(move || base.with_formula(Formula::List(items))))
  }
}

/// Maps the phrase under its first child to every formula listed for it.
/// Unknown phrases produce nothing.
#[derive(Debug, Clone, Default)]
pub struct LexiconFn {
  entries: HashMap<String, Vec<(Formula, Option<String>)>>,
}

impl LexiconFn {
  pub fn new() -> Self {
    Default::default()
  }

  pub fn add(&mut self, phrase: impl Into<String>, formula: Formula, ty: Option<String>) {
    self.entries.entry(phrase.into()).or_default().push((formula, ty));
  }

  fn lookup_key(child: &Derivation) -> &str {
    match &child.formula {
      Formula::Str(s) => s,
      _ => &child.canonical_utterance,
    }
  }
}

impl SemanticFn for LexiconFn {
  fn call(&self, _ex: &Example, c: &CallInfo<'_>) -> Result<DerivationStream, SemanticError> {
    let child = c.child(0)?;
    let Some(entries) = self.entries.get(Self::lookup_key(child)) else {
      return Ok(DerivationStream::empty());
    };

    let base = c.derivation();
    let mut pending = entries.clone().into_iter();
    Ok(DerivationStream::from_fn(entries.len(), move || {
      let (formula, ty) = pending.next()?;
      let mut deriv = base.clone().with_formula(formula);
      deriv.ty = ty;
      Some(deriv)
    }))
  }
}
