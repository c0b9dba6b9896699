use std::sync::Arc;

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use sempar::{Example, Grammar, Params, Parser, ParserOptions, RuleFeaturizer, Strategy};

const GRAMMAR_SRC: &str = include_str!("./commands.grammar");

fn parser(opts: ParserOptions) -> Parser {
  let grammar = GRAMMAR_SRC.parse::<Grammar>().unwrap();
  Parser::new(Arc::new(grammar), Arc::new(RuleFeaturizer))
    .unwrap()
    .with_options(opts)
    .unwrap()
}

fn parse(parser: &Parser, ex: &Example, params: &Params) -> usize {
  parser.parse(ex, params).unwrap().predictions.len()
}

fn criterion_benchmark(c: &mut Criterion) {
  let params = Params::new();
  let simple = Example::from_utterance("show me flights to boston");
  let complex = Example::from_utterance("list fares from new york to denver on monday please");

  let beam = parser(ParserOptions::default());
  c.bench_function("beam parse simple", |b| {
    b.iter(|| parse(black_box(&beam), black_box(&simple), &params))
  });
  c.bench_function("beam parse complex", |b| {
    b.iter(|| parse(black_box(&beam), black_box(&complex), &params))
  });

  let no_coarse = parser(ParserOptions {
    coarse_prune: false,
    ..Default::default()
  });
  c.bench_function("beam parse complex, no coarse pass", |b| {
    b.iter(|| parse(black_box(&no_coarse), black_box(&complex), &params))
  });

  let floating = parser(ParserOptions {
    strategy: Strategy::Floating,
    max_depth: 4,
    beam_size: 50,
    ..Default::default()
  });
  c.bench_function("floating parse", |b| {
    b.iter(|| parse(black_box(&floating), black_box(&simple), &params))
  });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
