use std::fmt;

/// A logical form. Parsing produces these; executing them is someone else's job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Formula {
  /// Placeholder for derivations that never got a real formula (reachability passes)
  #[default]
  Null,
  /// A bare symbol, such as `fb:en.obama` or `and`
  Atom(String),
  /// A quoted string, used for token and phrase derivations
  Str(String),
  /// An application: `(head arg1 arg2 ...)`
  List(Vec<Formula>),
}

impl Formula {
  pub fn atom(s: impl Into<String>) -> Self {
    Self::Atom(s.into())
  }

  pub fn string(s: impl Into<String>) -> Self {
    Self::Str(s.into())
  }

  pub fn as_list(&self) -> Option<&[Formula]> {
    match self {
      Self::List(v) => Some(v),
      _ => None,
    }
  }
}

impl fmt::Display for Formula {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Null => write!(f, "null"),
      Self::Atom(s) => write!(f, "{}", s),
      Self::Str(s) => write!(f, "{:?}", s),
      Self::List(items) => {
        write!(f, "(")?;
        for (idx, item) in items.iter().enumerate() {
          if idx > 0 {
            write!(f, " ")?;
          }
          write!(f, "{}", item)?;
        }
        write!(f, ")")
      }
    }
  }
}

/// The result of executing a formula.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
  Atom(String),
  Str(String),
  List(Vec<Value>),
  /// Execution failed. Derivations with this value can be dropped from beams.
  Error(String),
}

impl Value {
  pub fn is_error(&self) -> bool {
    matches!(self, Self::Error(_))
  }
}

impl fmt::Display for Value {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Atom(s) => write!(f, "{}", s),
      Self::Str(s) => write!(f, "{:?}", s),
      Self::Error(msg) => write!(f, "(error {:?})", msg),
      Self::List(items) => {
        write!(f, "(list")?;
        for item in items {
          write!(f, " {}", item)?;
        }
        write!(f, ")")
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_display_nested() {
    let f = Formula::List(vec![
      Formula::atom("and"),
      Formula::string("a b"),
      Formula::List(vec![Formula::atom("not"), Formula::atom("x")]),
    ]);
    assert_eq!(f.to_string(), r#"(and "a b" (not x))"#);
    assert_eq!(Formula::Null.to_string(), "null");
  }

  #[test]
  fn test_error_value() {
    assert!(Value::Error("boom".into()).is_error());
    assert!(!Value::Atom("ok".into()).is_error());
    let v = Value::List(vec![Value::Atom("a".into()), Value::Str("b".into())]);
    assert_eq!(v.to_string(), r#"(list a "b")"#);
  }
}
