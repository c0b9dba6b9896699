#[macro_use]
extern crate lazy_static;

pub mod chart;
pub mod coarse;
pub mod derivation;
pub mod error;
pub mod example;
pub mod features;
mod floating;
pub mod formula;
pub mod grammar;
pub mod parse_grammar;
pub mod parser;
pub mod rules;
pub mod semfn;
pub mod stream;
pub mod syntree;
pub mod trie;

pub use crate::coarse::CoarseChart;
pub use crate::derivation::{DerivIdx, Derivation, DerivationArena, Span};
pub use crate::error::{Err, Error, SemanticError};
pub use crate::example::Example;
pub use crate::features::{Executor, Featurizer, Params, RuleFeaturizer};
pub use crate::formula::{Formula, Value};
pub use crate::grammar::{Grammar, SpecialCats};
pub use crate::parser::{Parse, ParseStats, Parser, ParserOptions, Strategy};
pub use crate::rules::{Anchoring, Rule, Symbol};

#[cfg(test)]
mod tests {
  use std::collections::BTreeSet;
  use std::sync::Arc;

  use super::*;
  use crate::parse_grammar::parse_rules;
  use crate::semfn::{CallInfo, ConstantFn, SemanticFn};
  use crate::stream::DerivationStream;

  const SENTENCES: &str = r#"
    $ROOT -> $NP $VP : apply;
    $NP -> $DET $N : apply;
    $NP -> $N;
    $DET -> the : const the;
    $N -> dog : const dog;
    $N -> cat : const cat;
    $N -> $PHRASE : apply unk;
    $VP -> runs : const runs;
    $VP -> $V $NP : apply;
    $V -> sees : const sees;
    $JUNK -> $N $N : apply junk;
  "#;

  const FLOATING: &str = r#"
    $E -> a : const a;
    $E -> $E $E : apply plus;
    $ROOT -> $E;
    $F -> $E [floating] : apply f;
    $F -> $F $F [floating] : apply g;
    $ROOT -> $F [floating];
  "#;

  fn parser(src: &str, opts: ParserOptions) -> Parser {
    Parser::new(Arc::new(src.parse().unwrap()), Arc::new(RuleFeaturizer))
      .unwrap()
      .with_options(opts)
      .unwrap()
  }

  fn floating_opts(max_depth: usize) -> ParserOptions {
    ParserOptions {
      strategy: Strategy::Floating,
      max_depth,
      ..Default::default()
    }
  }

  /// (formula, structural hash) of every prediction, in rank order
  fn summary(parse: &Parse) -> Vec<(String, u64)> {
    parse
      .predictions
      .iter()
      .map(|&d| {
        let d = parse.get(d);
        (d.formula.to_string(), d.structural_hash())
      })
      .collect()
  }

  #[test]
  fn test_span_coverage() {
    let rules = parse_rules(r#"$X -> "a"; $S -> $X $X;"#).unwrap();
    let special = SpecialCats {
      root: "$S".into(),
      ..Default::default()
    };
    let grammar = Grammar::with_special_cats(rules, special).unwrap();
    let parser = Parser::new(Arc::new(grammar), Arc::new(RuleFeaturizer)).unwrap();

    let parse = parser.parse(&Example::from_utterance("a a"), &Params::new()).unwrap();
    assert_eq!(parse.predictions.len(), 1);

    let root = parse.best().unwrap();
    assert_eq!(root.span, Span::new(0, 2));
    let spans: Vec<Span> = root.children.iter().map(|&c| parse.get(c).span).collect();
    assert_eq!(spans, vec![Span::new(0, 1), Span::new(1, 2)]);
  }

  #[test]
  fn test_beam_keeps_the_best() {
    let grammar: Grammar = "$A -> a : const five; $A -> a : const three; $ROOT -> $A;"
      .parse()
      .unwrap();
    let params: Params = grammar
      .rules()
      .iter()
      .zip([5.0, 3.0])
      .map(|(rule, weight)| (RuleFeaturizer::feature_name(rule), weight))
      .collect();
    let parser = Parser::new(Arc::new(grammar), Arc::new(RuleFeaturizer))
      .unwrap()
      .with_options(ParserOptions {
        beam_size: 1,
        ..Default::default()
      })
      .unwrap();

    let parse = parser.parse(&Example::from_utterance("a"), &params).unwrap();
    let cell = parse.cell(0, 1, "$A");
    assert_eq!(cell.len(), 1);
    assert_eq!(parse.get(cell[0]).score, 5.0);
    assert_eq!(parse.get(cell[0]).formula, Formula::atom("five"));
    assert_eq!(parse.best().unwrap().score, 5.0);
    assert!(parse.stats.fall_off_beam);
  }

  #[test]
  fn test_beam_bound() {
    let opts = ParserOptions {
      beam_size: 2,
      ..floating_opts(3)
    };
    let parse = parser(FLOATING, opts)
      .parse(&Example::from_utterance("a a a a"), &Params::new())
      .unwrap();

    assert!(parse.stats.fall_off_beam);
    assert!(parse.chart.iter().all(|(_, _, _, derivs)| derivs.len() <= 2));
    // depth 0 copies the anchored chart, whose slots were already pruned
    assert!(
      parse
        .floating
        .iter()
        .filter(|((_, depth), _)| *depth > 0)
        .all(|(_, derivs)| derivs.len() <= 2)
    );
    assert!(!parse.floating.is_empty());
  }

  #[test]
  fn test_determinism() {
    let src = "$E -> a : const a; $E -> $E $E : apply plus; $ROOT -> $E;";
    let opts = ParserOptions {
      beam_size: 3,
      ..Default::default()
    };
    let ex = Example::from_utterance("a a a a a");
    let params = Params::new();

    let p = parser(src, opts.clone());
    let first = summary(&p.parse(&ex, &params).unwrap());
    let second = summary(&p.parse(&ex, &params).unwrap());
    let fresh = summary(&parser(src, opts).parse(&ex, &params).unwrap());

    assert!(!first.is_empty());
    assert_eq!(first, second);
    assert_eq!(first, fresh);
  }

  #[test]
  fn test_coarse_pruning_never_changes_the_result() {
    let unbinarized = format!("{}\n$ROOT -> $NP $V $NP : apply three;", SENTENCES);
    for src in [SENTENCES, unbinarized.as_str()] {
      for utterance in ["the dog runs", "the cat sees the dog", "dog sees cat"] {
        let ex = Example::from_utterance(utterance);
        let with = parser(src, ParserOptions::default()).parse(&ex, &Params::new()).unwrap();
        let without = parser(
          src,
          ParserOptions {
            coarse_prune: false,
            ..Default::default()
          },
        )
        .parse(&ex, &Params::new())
        .unwrap();

        assert!(!with.predictions.is_empty());
        assert_eq!(summary(&with), summary(&without));
        assert!(with.stats.total_generated < without.stats.total_generated);
      }
    }
  }

  #[test]
  fn test_unary_cycle() {
    let err = "$ROOT -> $A; $A -> $ROOT; $A -> a;".parse::<Grammar>().unwrap_err();
    assert_eq!(err.to_string(), "found cycle of unary rules: $ROOT -> $A -> $ROOT");
  }

  #[test]
  fn test_floating_monotonicity() {
    let ex = Example::from_utterance("a a");
    let roots = |depth: usize| -> BTreeSet<(String, u64)> {
      let parse = parser(FLOATING, floating_opts(depth)).parse(&ex, &Params::new()).unwrap();
      summary(&parse).into_iter().collect()
    };

    let mut previous = roots(1);
    for depth in 2..=4 {
      let current = roots(depth);
      assert!(current.is_superset(&previous), "depth {} lost roots", depth);
      assert!(current.len() > previous.len());
      previous = current;
    }
  }

  #[test]
  fn test_floating_dedup_by_formula() {
    let src = r#"
      $A -> a [floating] : const x;
      $B -> b [floating] : const x;
      $C -> $A [floating] : identity;
      $C -> $B [floating] : identity;
      $ROOT -> $C [floating];
    "#;
    let parse = parser(src, floating_opts(3))
      .parse(&Example::from_utterance("a b"), &Params::new())
      .unwrap();

    assert_eq!(parse.floating_cell("$A", 1).len(), 1);
    assert_eq!(parse.floating_cell("$B", 1).len(), 1);
    assert_eq!(parse.floating_cell("$C", 2).len(), 1);
    assert_eq!(parse.stats.deduplicated, 1);
    assert_eq!(summary(&parse).len(), 1);
  }

  #[derive(Debug)]
  struct Broken;

  impl SemanticFn for Broken {
    fn call(&self, _ex: &Example, _c: &CallInfo<'_>) -> Result<DerivationStream, SemanticError> {
      Err(SemanticError::new("no way to compose this"))
    }
  }

  #[test]
  fn test_composition_failure_aborts_the_parse() {
    let grammar = Grammar::new(vec![
      Rule::from_strs("$A", "a", Arc::new(ConstantFn::new(Formula::atom("a")))),
      Rule::from_strs("$ROOT", "$A b", Arc::new(Broken)),
    ])
    .unwrap();
    let parser = Parser::new(Arc::new(grammar), Arc::new(RuleFeaturizer)).unwrap();

    match parser.parse(&Example::from_utterance("a b"), &Params::new()) {
      Err(Error::Composition { rule, children, source }) => {
        assert!(rule.starts_with("$ROOT -> $A b"));
        assert!(children.contains("$A[0..1]"));
        assert_eq!(source, SemanticError::new("no way to compose this"));
      }
      Err(other) => panic!("expected a composition error, got {}", other),
      Ok(_) => panic!("expected a composition error"),
    }
  }

  struct Checker;

  impl Executor for Checker {
    fn execute(&self, formula: &Formula, _ex: &Example) -> Value {
      match formula {
        Formula::Atom(a) if a == "bad" => Value::Error("bad".into()),
        other => Value::Atom(other.to_string()),
      }
    }
  }

  #[test]
  fn test_error_values() {
    let src = "$ROOT -> a : const bad; $ROOT -> a : const good;";
    let ex = Example::from_utterance("a");

    let kept = parser(src, ParserOptions::default())
      .with_executor(Arc::new(Checker))
      .parse(&ex, &Params::new())
      .unwrap();
    assert_eq!(kept.predictions.len(), 2);
    let errors = kept
      .predictions
      .iter()
      .filter(|&&d| kept.get(d).value.as_ref().is_some_and(Value::is_error))
      .count();
    assert_eq!(errors, 1);

    let pruned = parser(
      src,
      ParserOptions {
        prune_error_values: true,
        ..Default::default()
      },
    )
    .with_executor(Arc::new(Checker))
    .parse(&ex, &Params::new())
    .unwrap();
    assert_eq!(pruned.predictions.len(), 1);
    let best = pruned.best().unwrap();
    assert_eq!(best.formula, Formula::atom("good"));
    assert_eq!(best.value, Some(Value::Atom("good".into())));
  }

  #[test]
  fn test_parallel_parsing_shares_the_parser() {
    let parser = Arc::new(parser(SENTENCES, ParserOptions::default()));
    let params = Params::new();
    let inputs = ["the dog runs", "the cat sees the dog", "dog runs", "cat sees cat"];

    let sequential: Vec<_> = inputs
      .iter()
      .map(|s| summary(&parser.parse(&Example::from_utterance(s), &params).unwrap()))
      .collect();

    let parallel: Vec<_> = std::thread::scope(|scope| {
      let handles: Vec<_> = inputs
        .iter()
        .map(|s| {
          let parser = Arc::clone(&parser);
          let params = &params;
          scope.spawn(move || summary(&parser.parse(&Example::from_utterance(s), params).unwrap()))
        })
        .collect();
      handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(sequential, parallel);
  }
}
