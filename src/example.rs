use crate::error::Error;

/// A tokenized utterance to parse. Preprocessing (tokenizing, lemmatizing) happens
/// upstream; this just holds the results.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Example {
  pub id: Option<String>,
  tokens: Vec<String>,
  lemmas: Vec<String>,
}

impl Example {
  /// Lemmas default to the tokens themselves
  pub fn new<I, S>(tokens: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    let tokens: Vec<String> = tokens.into_iter().map(Into::into).collect();
    let lemmas = tokens.clone();
    Self {
      id: None,
      tokens,
      lemmas,
    }
  }

  /// Lowercases and splits on whitespace
  pub fn from_utterance(utterance: &str) -> Self {
    Self::new(utterance.split_whitespace().map(str::to_lowercase))
  }

  pub fn with_id(mut self, id: impl Into<String>) -> Self {
    self.id = Some(id.into());
    self
  }

  /// One lemma per token, or an error
  pub fn with_lemmas<I, S>(mut self, lemmas: I) -> Result<Self, Error>
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    let lemmas: Vec<String> = lemmas.into_iter().map(Into::into).collect();
    if lemmas.len() != self.tokens.len() {
      return Err(Error::InvalidOption(format!(
        "got {} lemmas for {} tokens",
        lemmas.len(),
        self.tokens.len()
      )));
    }
    self.lemmas = lemmas;
    Ok(self)
  }

  pub fn num_tokens(&self) -> usize {
    self.tokens.len()
  }

  pub fn tokens(&self) -> &[String] {
    &self.tokens
  }

  pub fn token(&self, i: usize) -> &str {
    &self.tokens[i]
  }

  pub fn lemma_token(&self, i: usize) -> &str {
    &self.lemmas[i]
  }

  pub fn phrase(&self, start: usize, end: usize) -> String {
    self.tokens[start..end].join(" ")
  }

  pub fn lemma_phrase(&self, start: usize, end: usize) -> String {
    self.lemmas[start..end].join(" ")
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_phrases() {
    let ex = Example::from_utterance("Show  me Flights").with_lemmas(["show", "me", "flight"])
      .unwrap();
    assert_eq!(ex.num_tokens(), 3);
    assert_eq!(ex.token(2), "flights");
    assert_eq!(ex.phrase(1, 3), "me flights");
    assert_eq!(ex.lemma_phrase(1, 3), "me flight");
    assert_eq!(ex.lemma_token(0), "show");
  }

  #[test]
  fn test_lemma_count_must_match() {
    let err = Example::from_utterance("two tokens").with_lemmas(["one"]).unwrap_err();
    assert!(matches!(err, Error::InvalidOption(_)));
    assert_eq!(err.to_string(), "invalid parser option: got 1 lemmas for 2 tokens");
  }
}
