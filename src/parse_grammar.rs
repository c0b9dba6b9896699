//! Simple recursive-descent parsing of rule lists and formulas
//!
//! ```text
//! // comments run to the end of the line
//! $ROOT -> $Cmd ;
//! $Cmd  -> show me $Thing : apply show ;
//! $Thing -> flights [both] : const (type flight) ;
//! $Pair -> $Thing and $Thing ;
//! ```
//!
//! A rule without `: semfn` gets identity (one category), a constant string
//! of its tokens (no categories), or a headless `apply` (several categories).

use regex::Regex;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::Error;
use crate::formula::Formula;
use crate::rules::{Anchoring, Rule, Symbol};
use crate::semfn::{ApplyFn, ConstantFn, IdentityFn, SelectFn, SemanticFn};

type Infallible<'a, T> = (T, &'a str);
type ParseResult<'a, T> = Result<(T, &'a str), Error>;

/// helper macro for initializing a regex with lazy_static!
macro_rules! regex_static {
  ($name:ident, $pattern:expr) => {
    lazy_static! {
      static ref $name: Regex = Regex::new($pattern).unwrap();
    }
  };
}

fn syntax_err<T>(what: &str, s: &str) -> Result<T, Error> {
  let near: String = s.chars().take(30).collect();
  Err(Error::Syntax(format!("{} at {:?}", what, near)))
}

/// Try to consume a regex anchored at the start, returning None if it doesn't match
fn optional_re<'a>(re: &'static Regex, s: &'a str) -> Infallible<'a, Option<&'a str>> {
  match re.find(s) {
    Some(m) if m.start() == 0 => {
      let (matched, rest) = s.split_at(m.end());
      (Some(matched), rest)
    }
    _ => (None, s),
  }
}

/// Try to consume a regex, failing if it doesn't match
fn needed_re<'a>(re: &'static Regex, what: &str, s: &'a str) -> ParseResult<'a, &'a str> {
  match optional_re(re, s) {
    (Some(m), rest) if !m.is_empty() => Ok((m, rest)),
    _ => syntax_err(&format!("expected {}", what), s),
  }
}

/// Try to consume a char, returning None if it doesn't match
fn optional_char(c: char, s: &str) -> Infallible<'_, Option<char>> {
  match s.strip_prefix(c) {
    Some(rest) => (Some(c), rest),
    None => (None, s),
  }
}

/// Try to consume a char, failing if it doesn't match
fn needed_char(c: char, s: &str) -> ParseResult<'_, char> {
  match optional_char(c, s) {
    (Some(c), rest) => Ok((c, rest)),
    _ => syntax_err(&format!("expected '{}'", c), s),
  }
}

/// Skips whitespace and // comments
fn skip_whitespace(s: &str) -> &str {
  regex_static!(WHITESPACE_OR_COMMENT, r"^(\s+|//[^\n]*)*");
  optional_re(&WHITESPACE_OR_COMMENT, s).1
}

fn parse_category(s: &str) -> ParseResult<'_, &str> {
  regex_static!(CATEGORY, r"^\$[A-Za-z0-9_\-]+");
  needed_re(&CATEGORY, "category", s)
}

/// A quoted string with \" and \\ escapes, returned unescaped
fn parse_quoted(s: &str) -> ParseResult<'_, String> {
  regex_static!(QUOTED, r#"^"(?:[^"\\]|\\.)*""#);
  let (raw, rest) = needed_re(&QUOTED, "quoted string", s)?;
  let mut out = String::with_capacity(raw.len());
  let mut chars = raw[1..raw.len() - 1].chars();
  while let Some(c) = chars.next() {
    if c == '\\' {
      if let Some(escaped) = chars.next() {
        out.push(escaped);
      }
    } else {
      out.push(c);
    }
  }
  Ok((out, rest))
}

fn parse_symbol(s: &str) -> ParseResult<'_, Symbol> {
  regex_static!(TOKEN, r#"^[^\s;:\[\]"()$]+"#);
  if s.starts_with('$') {
    let (cat, rest) = parse_category(s)?;
    Ok((Symbol::Category(cat.to_string()), rest))
  } else if s.starts_with('"') {
    let (tok, rest) = parse_quoted(s)?;
    Ok((Symbol::Token(tok), rest))
  } else {
    let (tok, rest) = needed_re(&TOKEN, "token", s)?;
    Ok((Symbol::Token(tok.to_string()), rest))
  }
}

/// Parses `(head arg ...)`, `"string"`, or a bare atom
fn parse_formula(s: &str) -> ParseResult<'_, Formula> {
  regex_static!(ATOM, r#"^[^\s()";]+"#);
  if let (Some(_), mut rem) = optional_char('(', s) {
    let mut items = Vec::new();
    loop {
      rem = skip_whitespace(rem);
      if let (Some(_), rest) = optional_char(')', rem) {
        return Ok((Formula::List(items), rest));
      }
      if rem.is_empty() {
        return syntax_err("unclosed formula", s);
      }
      let (item, rest) = parse_formula(rem)?;
      items.push(item);
      rem = rest;
    }
  } else if s.starts_with('"') {
    let (string, rest) = parse_quoted(s)?;
    Ok((Formula::Str(string), rest))
  } else {
    let (atom, rest) = needed_re(&ATOM, "formula", s)?;
    if atom == "null" {
      Ok((Formula::Null, rest))
    } else {
      Ok((Formula::atom(atom), rest))
    }
  }
}

fn parse_anchoring(s: &str) -> ParseResult<'_, Anchoring> {
  regex_static!(WORD, r"^[a-z]+");
  let (_, s) = needed_char('[', s)?;
  let s = skip_whitespace(s);
  let (word, s) = needed_re(&WORD, "anchoring", s)?;
  let anchoring = match word {
    "anchored" => Anchoring::Anchored,
    "floating" => Anchoring::Floating,
    "both" => Anchoring::Both,
    _ => return syntax_err("anchoring must be anchored, floating or both", word),
  };
  let s = skip_whitespace(s);
  let (_, s) = needed_char(']', s)?;
  Ok((anchoring, s))
}

fn default_semfn(rhs: &[Symbol]) -> Arc<dyn SemanticFn> {
  let num_cats = rhs.iter().filter(|s| s.is_category()).count();
  match num_cats {
    0 => {
      let words: Vec<&str> = rhs.iter().map(Symbol::symbol_str).collect();
      Arc::new(ConstantFn::new(Formula::string(words.join(" "))))
    }
    1 if rhs.len() == 1 => Arc::new(IdentityFn),
    1 => Arc::new(SelectFn(0)),
    _ => Arc::new(ApplyFn::default()),
  }
}

fn parse_semfn(s: &str) -> ParseResult<'_, Arc<dyn SemanticFn>> {
  regex_static!(NAME, r"^[a-z]+");
  regex_static!(INDEX, r"^[0-9]+");
  regex_static!(HEAD, r#"^[^\s()";]+"#);

  let (name, s) = needed_re(&NAME, "semantic function", s)?;
  let s = skip_whitespace(s);
  match name {
    "identity" => Ok((Arc::new(IdentityFn), s)),
    "select" => {
      let (idx, s) = needed_re(&INDEX, "child index", s)?;
      let idx = idx
        .parse::<usize>()
        .map_err(|e| Error::Syntax(format!("child index {}: {}", idx, e)))?;
      Ok((Arc::new(SelectFn(idx)), s))
    }
    "const" => {
      let (formula, s) = parse_formula(s)?;
      Ok((Arc::new(ConstantFn::new(formula)), s))
    }
    "apply" => match optional_re(&HEAD, s) {
      (Some(head), s) => Ok((Arc::new(ApplyFn::new(head)), s)),
      (None, s) => Ok((Arc::new(ApplyFn::default()), s)),
    },
    _ => syntax_err("unknown semantic function", name),
  }
}

/// `$Lhs -> symbols [anchoring] : semfn ;`
fn parse_rule(s: &str) -> ParseResult<'_, Rule> {
  #![allow(clippy::trivial_regex)]
  regex_static!(ARROW, "^->");

  let (lhs, s) = parse_category(s)?;
  let s = skip_whitespace(s);
  let (_, s) = needed_re(&ARROW, "->", s)?;

  let mut rhs = Vec::new();
  let mut rem = skip_whitespace(s);
  while !rem.is_empty() && !rem.starts_with(['[', ':', ';']) {
    let (symbol, s) = parse_symbol(rem)?;
    rhs.push(symbol);
    rem = skip_whitespace(s);
  }

  let mut anchoring = Anchoring::default();
  if rem.starts_with('[') {
    let (a, s) = parse_anchoring(rem)?;
    anchoring = a;
    rem = skip_whitespace(s);
  }

  let sem = if let (Some(_), s) = optional_char(':', rem) {
    let (sem, s) = parse_semfn(skip_whitespace(s))?;
    rem = skip_whitespace(s);
    sem
  } else {
    default_semfn(&rhs)
  };

  let (_, rem) = needed_char(';', rem)?;
  Ok((Rule::new(lhs, rhs, sem).with_anchoring(anchoring), rem))
}

pub fn parse_rules(s: &str) -> Result<Vec<Rule>, Error> {
  let mut rules = Vec::new();
  let mut rem = s;
  loop {
    rem = skip_whitespace(rem);
    if rem.is_empty() {
      return Ok(rules);
    }
    let (rule, s) = parse_rule(rem)?;
    rules.push(rule);
    rem = s;
  }
}

impl FromStr for Formula {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let (formula, rest) = parse_formula(skip_whitespace(s))?;
    if !skip_whitespace(rest).is_empty() {
      return syntax_err("trailing input after formula", rest);
    }
    Ok(formula)
  }
}
