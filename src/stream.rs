use std::fmt;

use crate::derivation::Derivation;

/// A lazy, resumable sequence of derivations sharing one rule and one tuple
/// of children. Draining it is the only thing that has side effects; `peek`
/// and `has_next` only force the next element.
pub struct DerivationStream {
  source: Box<dyn FnMut() -> Option<Derivation>>,
  peeked: Option<Option<Derivation>>,
  estimated_size: usize,
  done: bool,
}

impl DerivationStream {
  /// `estimated_size` is a hint, not a promise
  pub fn from_fn<F>(estimated_size: usize, source: F) -> Self
  where
    F: FnMut() -> Option<Derivation> + 'static,
  {
    Self {
      source: Box::new(source),
      peeked: None,
      estimated_size,
      done: false,
    }
  }

  pub fn empty() -> Self {
    Self::from_fn(0, || None)
  }

  pub fn single(deriv: Derivation) -> Self {
    Self::from_vec(vec![deriv])
  }

  /// One derivation, built only when the stream is first forced
  pub fn lazy_single<F>(build: F) -> Self
  where
    F: FnOnce() -> Derivation + 'static,
  {
    let mut build = Some(build);
    Self::from_fn(1, move || build.take().map(|f| f()))
  }

  pub fn from_vec(derivs: Vec<Derivation>) -> Self {
    let size = derivs.len();
    let mut iter = derivs.into_iter();
    Self::from_fn(size, move || iter.next())
  }

  pub fn estimated_size(&self) -> usize {
    self.estimated_size
  }

  pub fn peek(&mut self) -> Option<&Derivation> {
    if self.peeked.is_none() {
      let next = self.pull();
      self.peeked = Some(next);
    }
    self.peeked.as_ref().and_then(Option::as_ref)
  }

  pub fn has_next(&mut self) -> bool {
    self.peek().is_some()
  }

  fn pull(&mut self) -> Option<Derivation> {
    if self.done {
      return None;
    }
    let next = (self.source)();
    if next.is_none() {
      self.done = true;
    }
    next
  }
}

impl Iterator for DerivationStream {
  type Item = Derivation;

  fn next(&mut self) -> Option<Derivation> {
    match self.peeked.take() {
      Some(peeked) => peeked,
      None => self.pull(),
    }
  }
}

impl fmt::Debug for DerivationStream {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("DerivationStream")
      .field("estimated_size", &self.estimated_size)
      .field("done", &self.done)
      .finish()
  }
}
