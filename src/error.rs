use thiserror::Error;

/// Boxed static error type, for binaries that mix ours with io errors
pub type Err = Box<dyn std::error::Error + 'static>;

/// Raised by a semantic function when it cannot compose its children.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{0}")]
pub struct SemanticError(pub String);

impl SemanticError {
  pub fn new(msg: impl Into<String>) -> Self {
    Self(msg.into())
  }
}

#[derive(Debug, Error)]
pub enum Error {
  /// A rule's right-hand side names a category that no rule produces
  #[error("rule `{rule}` references undefined category {cat}")]
  UndefinedCategory { rule: String, cat: String },

  #[error("found cycle of unary rules: {}", cycle.join(" -> "))]
  UnaryCycle { cycle: Vec<String> },

  #[error("rule for {lhs} has an empty right-hand side")]
  EmptyRhs { lhs: String },

  #[error("{pass} assumes a binarized grammar, but got rule `{rule}`")]
  NotBinarized { pass: &'static str, rule: String },

  #[error("syntax error: {0}")]
  Syntax(String),

  #[error(transparent)]
  Io(#[from] std::io::Error),

  #[error("invalid parser option: {0}")]
  InvalidOption(String),

  /// A semantic function failed. The whole parse is aborted, since a
  /// partially composed chart can't be trusted.
  #[error("composition failed: rule = `{rule}`, children = [{children}]: {source}")]
  Composition {
    rule: String,
    children: String,
    #[source]
    source: SemanticError,
  },
}
