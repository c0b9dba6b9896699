//! The chart-filling driver.
//!
//! Cells are built bottom-up by span length. Within a cell, multi-symbol
//! rules are matched through the trie first, then `$A -> $B` rules run in
//! topological order, and finally every slot is cut down to the beam.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, trace, warn};

use crate::chart::Chart;
use crate::coarse::{CoarseChart, CoarseParser};
use crate::derivation::{DerivIdx, Derivation, DerivationArena, Span};
use crate::error::Error;
use crate::example::Example;
use crate::features::{Executor, Featurizer, Params};
use crate::floating::FloatingParserState;
use crate::formula::{Formula, Value};
use crate::grammar::Grammar;
use crate::rules::{Rule, Symbol};
use crate::semfn::CallInfo;
use crate::stream::DerivationStream;
use crate::syntree::SynTree;
use crate::trie::Trie;

/// Slots bigger than this before pruning are worth a warning
const LARGE_CELL: usize = 5000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
  /// Span-indexed chart only
  #[default]
  Beam,
  /// Span-indexed chart, then depth-indexed floating cells on top of it
  Floating,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParserOptions {
  /// Derivations kept per (span, category) or (category, depth)
  pub beam_size: usize,
  /// Cap on new derivations from one rule over one cell
  pub max_new_trees_per_span: usize,
  /// Run the reachability pass first. Ignored by the floating strategy,
  /// whose floating cells can use anchored derivations the root never covers.
  pub coarse_prune: bool,
  /// Drop derivations whose value is an error during pruning. Needs an
  /// executor, or semantic functions that fill in values themselves.
  pub prune_error_values: bool,
  pub strategy: Strategy,
  pub max_depth: usize,
  /// Floating combinations may not consume the same input token twice
  pub use_anchors_once: bool,
  /// Run predictions through the executor, if there is one
  pub execute_predictions: bool,
}

impl Default for ParserOptions {
  fn default() -> Self {
    Self {
      beam_size: 500,
      max_new_trees_per_span: usize::MAX,
      coarse_prune: true,
      prune_error_values: false,
      strategy: Strategy::Beam,
      max_depth: 10,
      use_anchors_once: false,
      execute_predictions: true,
    }
  }
}

impl ParserOptions {
  pub fn validate(&self) -> Result<(), Error> {
    if self.beam_size == 0 {
      return Err(Error::InvalidOption("beam_size must be at least 1".into()));
    }
    if self.max_new_trees_per_span == 0 {
      return Err(Error::InvalidOption("max_new_trees_per_span must be at least 1".into()));
    }
    Ok(())
  }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParseStats {
  pub max_cell_size: usize,
  pub max_cell_description: String,
  /// Some slot had more derivations than the beam could hold
  pub fall_off_beam: bool,
  pub total_generated: usize,
  pub num_featurized: usize,
  /// Floating derivations dropped for repeating a formula
  pub deduplicated: usize,
  pub parse_time: Duration,
}

impl fmt::Display for ParseStats {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "generated {}, featurized {}, deduplicated {}, largest cell {} ({}){}, {:?}",
      self.total_generated,
      self.num_featurized,
      self.deduplicated,
      self.max_cell_description,
      self.max_cell_size,
      if self.fall_off_beam { ", fell off beam" } else { "" },
      self.parse_time
    )
  }
}

/// Everything one parse produced. Indices in `predictions`, `chart` and
/// `floating` all point into `arena`.
#[derive(Debug, Clone)]
pub struct Parse {
  pub arena: DerivationArena,
  pub chart: Chart<DerivIdx>,
  /// (category, depth) -> derivations. Empty for beam parses.
  pub floating: BTreeMap<(String, usize), Vec<DerivIdx>>,
  /// Root derivations, best first
  pub predictions: Vec<DerivIdx>,
  pub stats: ParseStats,
}

impl Parse {
  pub fn get(&self, idx: DerivIdx) -> &Derivation {
    self.arena.get(idx)
  }

  pub fn best(&self) -> Option<&Derivation> {
    self.predictions.first().map(|&idx| self.arena.get(idx))
  }

  pub fn cell(&self, start: usize, end: usize, cat: &str) -> &[DerivIdx] {
    self.chart.get(start, end, cat)
  }

  pub fn floating_cell(&self, cat: &str, depth: usize) -> &[DerivIdx] {
    self
      .floating
      .get(&(cat.to_string(), depth))
      .map(Vec::as_slice)
      .unwrap_or(&[])
  }

  pub fn tree(&self, idx: DerivIdx) -> SynTree<String, String> {
    SynTree::from_derivation(&self.arena, idx)
  }

  /// Fills in the value of every prediction that doesn't have one yet
  pub fn execute_predictions(&mut self, executor: &dyn Executor, ex: &Example) {
    for &idx in self.predictions.iter() {
      if self.arena.get(idx).value.is_none() {
        let value = executor.execute(&self.arena.get(idx).formula, ex);
        self.arena.get_mut(idx).value = Some(value);
      }
    }
  }
}

impl fmt::Display for Parse {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (start, end, cat, derivs) in self.chart.iter() {
      writeln!(f, "{}..{} {}:", start, end, cat)?;
      for &d in derivs {
        writeln!(f, "  {}", self.arena.display(d))?;
      }
    }
    for ((cat, depth), derivs) in self.floating.iter() {
      writeln!(f, "depth {} {}:", depth, cat)?;
      for &d in derivs {
        writeln!(f, "  {}", self.arena.display(d))?;
      }
    }
    Ok(())
  }
}

/// Holds the grammar, its trie and the injected collaborators. Immutable,
/// so one parser can serve any number of threads at once.
pub struct Parser {
  grammar: Arc<Grammar>,
  trie: Trie,
  /// Present when the grammar is binarized
  coarse: Option<CoarseParser>,
  featurizer: Arc<dyn Featurizer>,
  executor: Option<Arc<dyn Executor>>,
  opts: ParserOptions,
}

impl Parser {
  pub fn new(grammar: Arc<Grammar>, featurizer: Arc<dyn Featurizer>) -> Result<Self, Error> {
    if let Some(rule) = grammar.first_unbinarized(Rule::is_floating) {
      return Err(Error::NotBinarized {
        pass: "floating parser",
        rule: rule.to_string(),
      });
    }

    let trie = Trie::from_rules(grammar.rules());
    let coarse = match CoarseParser::new(&grammar) {
      Ok(coarse) => Some(coarse),
      Err(reason) => {
        debug!(%reason, "coarse pass will run the full parser in reachability mode");
        None
      }
    };
    debug!(trie_nodes = trie.num_nodes(), "parser ready");

    Ok(Self {
      grammar,
      trie,
      coarse,
      featurizer,
      executor: None,
      opts: ParserOptions::default(),
    })
  }

  pub fn with_options(mut self, opts: ParserOptions) -> Result<Self, Error> {
    opts.validate()?;
    self.opts = opts;
    Ok(self)
  }

  pub fn with_executor(mut self, executor: Arc<dyn Executor>) -> Self {
    self.executor = Some(executor);
    self
  }

  pub fn grammar(&self) -> &Grammar {
    &self.grammar
  }

  pub fn options(&self) -> &ParserOptions {
    &self.opts
  }

  pub fn trie(&self) -> &Trie {
    &self.trie
  }

  pub fn parse(&self, ex: &Example, params: &Params) -> Result<Parse, Error> {
    let started = Instant::now();

    let mut parse = match self.opts.strategy {
      Strategy::Beam => {
        let coarse = if self.opts.coarse_prune {
          Some(self.build_coarse_chart(ex)?)
        } else {
          None
        };
        self.build_full_chart(ex, params, coarse.as_ref())?
      }
      Strategy::Floating => FloatingParserState::new(self, params, ex).infer()?,
    };

    if self.opts.execute_predictions {
      if let Some(executor) = &self.executor {
        parse.execute_predictions(executor.as_ref(), ex);
      }
    }

    parse.stats.parse_time = started.elapsed();
    info!(
      id = ex.id.as_deref().unwrap_or("-"),
      tokens = ex.num_tokens(),
      predictions = parse.predictions.len(),
      max_cell = %parse.stats.max_cell_description,
      max_cell_size = parse.stats.max_cell_size,
      time = ?parse.stats.parse_time,
      "parsed"
    );
    Ok(parse)
  }

  /// Fills the span-indexed chart and returns its ranked root derivations.
  /// With a coarse chart, (category, span) pairs it rules out are skipped.
  pub fn build_full_chart(&self, ex: &Example, params: &Params, coarse: Option<&CoarseChart>) -> Result<Parse, Error> {
    let mut state = ParserState::new(self, params, ex, coarse, Mode::Full);
    state.build_anchored()?;
    let predictions = state.anchored_roots();
    Ok(state.into_parse(BTreeMap::new(), predictions))
  }

  /// Runs the reachability pass and prunes it top-down from the root
  pub fn build_coarse_chart(&self, ex: &Example) -> Result<CoarseChart, Error> {
    let mut chart = match &self.coarse {
      Some(coarse) => coarse.parse(ex),
      None => {
        let params = Params::new();
        let mut state = ParserState::new(self, &params, ex, None, Mode::Bool);
        state.build_anchored()?;
        CoarseChart::from_derivations(&state.chart, &state.arena)
      }
    };
    chart.keep_top_down_reachable(self.grammar.root_cat());
    Ok(chart)
  }
}

/// Full mode builds real, scored derivations. Bool mode only needs to know
/// what can be built: no semantic functions, no scores, no pruning, and one
/// hypothesis per category edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mode {
  Full,
  Bool,
}

/// Runs a rule's semantic function, turning a failure into a parse-fatal error
pub(crate) fn compose(
  ex: &Example,
  arena: &DerivationArena,
  rule: &Arc<Rule>,
  span: Span,
  children: &[DerivIdx],
) -> Result<DerivationStream, Error> {
  let info = CallInfo {
    cat: &rule.lhs,
    span,
    rule,
    children,
    arena,
  };
  rule.sem.call(ex, &info).map_err(|source| {
    let children = arena.describe_all(children);
    error!(rule = %rule, children = %children, error = %source, "composition failed");
    Error::Composition {
      rule: rule.to_string(),
      children,
      source,
    }
  })
}

/// Literal tokens and children's utterances, in right-hand side order
fn canonical_utterance(rule: &Rule, children: &[DerivIdx], arena: &DerivationArena) -> String {
  let mut kids = children.iter();
  rule
    .rhs
    .iter()
    .filter_map(|symbol| match symbol {
      Symbol::Token(t) => Some(t.as_str()),
      Symbol::Category(_) => kids.next().map(|&c| arena.get(c).canonical_utterance.as_str()),
    })
    .filter(|s| !s.is_empty())
    .collect::<Vec<_>>()
    .join(" ")
}

/// A completed trie match, waiting to be turned into derivations
struct Pending {
  rule: Arc<Rule>,
  children: Vec<DerivIdx>,
  /// None in bool mode
  stream: Option<DerivationStream>,
}

/// One trie walk over one span. Only reads the chart: everything it finds
/// is queued and added once the walk is over. Nothing added to the span
/// being built could extend a match, since single-category rules aren't in
/// the trie.
struct Matcher<'a> {
  ex: &'a Example,
  chart: &'a Chart<DerivIdx>,
  arena: &'a DerivationArena,
  coarse: Option<&'a CoarseChart>,
  mode: Mode,
  start: usize,
  end: usize,
  cap: usize,
  /// Derivations the queued streams say they will produce
  promised: usize,
  pending: Vec<Pending>,
}

impl<'a> Matcher<'a> {
  fn allows(&self, cat: &str) -> bool {
    self.coarse.is_none_or(|c| c.allows(cat, self.start, self.end))
  }

  fn allows_any(&self, node: &Trie) -> bool {
    self.coarse.is_none_or(|c| c.allows_any(node.lhs_cats(), self.start, self.end))
  }

  /// Returns false once the cap is hit and the whole walk should stop
  fn walk(&mut self, i: usize, node: &Trie, children: &mut Vec<DerivIdx>) -> Result<bool, Error> {
    let chart: &'a Chart<DerivIdx> = self.chart;
    if !self.allows_any(node) {
      return Ok(true);
    }

    if i == self.end {
      for rule in node.rules() {
        if !self.allows(&rule.lhs) {
          continue;
        }
        self.complete(rule, children)?;
        if self.promised >= self.cap {
          return Ok(false);
        }
      }
      return Ok(true);
    }

    if let Some(next) = node.next_token(self.ex.token(i)) {
      if !self.walk(i + 1, next, children)? {
        return Ok(false);
      }
    }

    for j in (i + 1)..=self.end {
      // only `$A -> $B` could complete from here, and the unary pass owns those
      if i == self.start && j == self.end {
        continue;
      }
      let Some(cell) = chart.cell(i, j) else {
        continue;
      };
      for (cat, derivs) in cell.iter() {
        let Some(next) = node.next_cat(cat) else {
          continue;
        };
        for &d in derivs {
          children.push(d);
          let keep_going = self.walk(j, next, children)?;
          children.pop();
          if !keep_going {
            return Ok(false);
          }
          if self.mode == Mode::Bool {
            break;
          }
        }
      }
    }

    Ok(true)
  }

  fn complete(&mut self, rule: &Arc<Rule>, children: &[DerivIdx]) -> Result<(), Error> {
    trace!(rule = %rule, start = self.start, end = self.end, "rule matched");
    let stream = match self.mode {
      Mode::Bool => None,
      Mode::Full => Some(compose(
        self.ex,
        self.arena,
        rule,
        Span::new(self.start, self.end),
        children,
      )?),
    };
    let size = stream.as_ref().map_or(1, DerivationStream::estimated_size);
    self.promised = self.promised.saturating_add(size);
    self.pending.push(Pending {
      rule: rule.clone(),
      children: children.to_vec(),
      stream,
    });
    Ok(())
  }
}

/// The mutable state of one parse: the arena, the span-indexed chart, and
/// statistics. Borrowed collaborators come from the `Parser`.
pub(crate) struct ParserState<'p> {
  pub(crate) parser: &'p Parser,
  pub(crate) params: &'p Params,
  pub(crate) ex: &'p Example,
  coarse: Option<&'p CoarseChart>,
  mode: Mode,
  pub(crate) arena: DerivationArena,
  pub(crate) chart: Chart<DerivIdx>,
  pub(crate) stats: ParseStats,
}

impl<'p> ParserState<'p> {
  pub(crate) fn new(
    parser: &'p Parser,
    params: &'p Params,
    ex: &'p Example,
    coarse: Option<&'p CoarseChart>,
    mode: Mode,
  ) -> Self {
    Self {
      parser,
      params,
      ex,
      coarse,
      mode,
      arena: DerivationArena::new(),
      chart: Chart::new(ex.num_tokens()),
      stats: ParseStats::default(),
    }
  }

  /// Builds every cell, shortest spans first
  pub(crate) fn build_anchored(&mut self) -> Result<(), Error> {
    let n = self.ex.num_tokens();
    for len in 1..=n {
      for start in 0..=(n - len) {
        self.build(start, start + len)?;
      }
    }
    debug!(
      tokens = n,
      slots = self.chart.num_slots(),
      derivations = self.chart.num_items(),
      mode = ?self.mode,
      "anchored chart built"
    );
    Ok(())
  }

  fn build(&mut self, start: usize, end: usize) -> Result<(), Error> {
    self.seed_lexical(start, end);
    self.apply_non_cat_unary_rules(start, end)?;
    self.apply_cat_unary_rules(start, end)?;
    if self.mode == Mode::Full {
      self.prune_cell(start, end);
    }
    debug!(
      start,
      end,
      categories = self.chart.categories(start, end).count(),
      "built cell"
    );
    Ok(())
  }

  fn coarse_allows(&self, cat: &str, start: usize, end: usize) -> bool {
    self.coarse.is_none_or(|c| c.allows(cat, start, end))
  }

  /// Token and phrase derivations for the lexical categories rules read
  fn seed_lexical(&mut self, start: usize, end: usize) {
    let parser = self.parser;
    let grammar = parser.grammar.as_ref();
    let special = grammar.special();
    for cat in grammar.referenced_lexical() {
      let single_token = cat == special.token || cat == special.lemma_token;
      if single_token && end - start != 1 {
        continue;
      }
      if !self.coarse_allows(cat, start, end) {
        continue;
      }
      let text = if cat == special.lemma_token || cat == special.lemma_phrase {
        self.ex.lemma_phrase(start, end)
      } else {
        self.ex.phrase(start, end)
      };
      let deriv = Derivation::new(cat, Span::new(start, end), None, vec![])
        .with_formula(Formula::string(text))
        .with_utterance(self.ex.phrase(start, end));
      let idx = self.finish_derivation(deriv);
      self.chart.add(start, end, cat, idx);
    }
  }

  fn apply_non_cat_unary_rules(&mut self, start: usize, end: usize) -> Result<(), Error> {
    let parser = self.parser;
    let cap = parser.opts.max_new_trees_per_span;

    let pending = {
      let mut matcher = Matcher {
        ex: self.ex,
        chart: &self.chart,
        arena: &self.arena,
        coarse: self.coarse,
        mode: self.mode,
        start,
        end,
        cap,
        promised: 0,
        pending: Vec::new(),
      };
      matcher.walk(start, &parser.trie, &mut Vec::new())?;
      matcher.pending
    };

    let span = Span::new(start, end);
    let mut num_new = 0;
    for app in pending {
      match app.stream {
        None => {
          let deriv = Derivation::new(app.rule.lhs.as_str(), span, Some(app.rule.clone()), app.children);
          let idx = self.finish_derivation(deriv);
          self.chart.add(start, end, &app.rule.lhs, idx);
          num_new += 1;
        }
        Some(stream) => {
          for deriv in stream {
            let idx = self.finish_derivation(deriv);
            self.chart.add(start, end, &app.rule.lhs, idx);
            num_new += 1;
            if num_new >= cap {
              break;
            }
          }
        }
      }
      if num_new >= cap {
        trace!(start, end, cap, "new derivation cap reached");
        break;
      }
    }
    Ok(())
  }

  /// `$A -> $B` rules, in an order where `$B` is finished before it's read.
  /// `$B` is pruned right before its first reader uses it.
  fn apply_cat_unary_rules(&mut self, start: usize, end: usize) -> Result<(), Error> {
    let parser = self.parser;
    let cap = parser.opts.max_new_trees_per_span;
    let span = Span::new(start, end);
    let mut pruned: HashSet<&str> = HashSet::new();

    for rule in parser.grammar.cat_unary_rules().iter().filter(|r| r.is_anchored()) {
      if !self.coarse_allows(&rule.lhs, start, end) {
        continue;
      }
      let child_cat = rule.rhs[0].symbol_str();
      if self.mode == Mode::Full && pruned.insert(child_cat) {
        self.prune_slot(start, end, child_cat);
      }

      let children = self.chart.get(start, end, child_cat).to_vec();
      let mut num_new = 0;
      for child in children {
        if self.mode == Mode::Bool {
          let deriv = Derivation::new(rule.lhs.as_str(), span, Some(rule.clone()), vec![child]);
          let idx = self.finish_derivation(deriv);
          self.chart.add(start, end, &rule.lhs, idx);
          break;
        }

        let stream = compose(self.ex, &self.arena, rule, span, &[child])?;
        for deriv in stream {
          let idx = self.finish_derivation(deriv);
          self.chart.add(start, end, &rule.lhs, idx);
          num_new += 1;
          if num_new >= cap {
            break;
          }
        }
        if num_new >= cap {
          break;
        }
      }
    }
    Ok(())
  }

  /// Fills in the canonical utterance, features and score, then allocates
  pub(crate) fn finish_derivation(&mut self, mut deriv: Derivation) -> DerivIdx {
    if deriv.canonical_utterance.is_empty() {
      if let Some(rule) = &deriv.rule {
        deriv.canonical_utterance = canonical_utterance(rule, &deriv.children, &self.arena);
      }
    }

    if self.mode == Mode::Full && !deriv.is_featurized() {
      let mut features = std::mem::take(&mut deriv.local_features);
      self
        .parser
        .featurizer
        .extract_local(self.ex, &deriv, &self.arena, &mut features);
      deriv.local_features = features;
      deriv.score = self.params.score(&deriv, &self.arena);
      deriv.mark_featurized();
      self.stats.num_featurized += 1;
    }

    self.stats.total_generated += 1;
    self.arena.alloc(deriv)
  }

  fn prune_cell(&mut self, start: usize, end: usize) {
    let cats: Vec<String> = self.chart.categories(start, end).map(str::to_string).collect();
    for cat in cats {
      self.prune_slot(start, end, &cat);
    }
  }

  fn prune_slot(&mut self, start: usize, end: usize, cat: &str) {
    let derivs = self.chart.take(start, end, cat);
    let kept = self.prune_list(|| format!("{}({},{})", cat, start, end), derivs);
    self.chart.put(start, end, cat, kept);
  }

  /// Sorts best first and keeps the beam. Error values go first if asked.
  pub(crate) fn prune_list(&mut self, describe: impl FnOnce() -> String, mut derivs: Vec<DerivIdx>) -> Vec<DerivIdx> {
    let parser = self.parser;

    if parser.opts.prune_error_values {
      self.ensure_executed(&derivs);
      let arena = &self.arena;
      derivs.retain(|&d| !arena.get(d).value.as_ref().is_some_and(Value::is_error));
    }

    let size = derivs.len();
    if size > self.stats.max_cell_size || size > LARGE_CELL {
      let description = describe();
      if size > LARGE_CELL {
        warn!(cell = %description, size, "very large cell");
      }
      if size > self.stats.max_cell_size {
        self.stats.max_cell_size = size;
        self.stats.max_cell_description = description;
      }
    }

    self.arena.sort_by_score(&mut derivs);
    if derivs.len() > parser.opts.beam_size {
      self.stats.fall_off_beam = true;
      derivs.truncate(parser.opts.beam_size);
    }
    derivs
  }

  fn ensure_executed(&mut self, derivs: &[DerivIdx]) {
    let parser = self.parser;
    let Some(executor) = parser.executor.as_ref() else {
      return;
    };
    for &d in derivs {
      if self.arena.get(d).value.is_none() {
        let value = executor.execute(&self.arena.get(d).formula, self.ex);
        self.arena.get_mut(d).value = Some(value);
      }
    }
  }

  /// Root derivations over the whole input, best first
  pub(crate) fn anchored_roots(&self) -> Vec<DerivIdx> {
    let n = self.ex.num_tokens();
    let mut roots = self.chart.get(0, n, self.parser.grammar.root_cat()).to_vec();
    self.arena.sort_by_score(&mut roots);
    roots
  }

  pub(crate) fn into_parse(self, floating: BTreeMap<(String, usize), Vec<DerivIdx>>, predictions: Vec<DerivIdx>) -> Parse {
    Parse {
      arena: self.arena,
      chart: self.chart,
      floating,
      predictions,
      stats: self.stats,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::features::RuleFeaturizer;

  fn parser_with(src: &str, opts: ParserOptions) -> Parser {
    Parser::new(Arc::new(src.parse().unwrap()), Arc::new(RuleFeaturizer))
      .unwrap()
      .with_options(opts)
      .unwrap()
  }

  fn formulas(parse: &Parse) -> Vec<String> {
    parse
      .predictions
      .iter()
      .map(|&d| parse.get(d).formula.to_string())
      .collect()
  }

  #[test]
  fn test_invalid_options() {
    let opts = ParserOptions {
      beam_size: 0,
      ..Default::default()
    };
    assert!(matches!(opts.validate(), Err(Error::InvalidOption(_))));
    assert!(ParserOptions::default().validate().is_ok());
  }

  #[test]
  fn test_mixed_tokens_and_categories() {
    let parser = parser_with(
      r#"
      $ROOT -> show me $Thing : apply show;
      $Thing -> flights to $City : apply flights;
      $City -> $PHRASE : identity;
      "#,
      ParserOptions::default(),
    );
    let ex = Example::from_utterance("show me flights to new york");
    let parse = parser.parse(&ex, &Params::new()).unwrap();

    assert_eq!(formulas(&parse), vec![r#"(show (flights "new york"))"#]);
    let best = parse.best().unwrap();
    assert_eq!(best.span, Span::new(0, 6));
    assert_eq!(best.canonical_utterance, "show me flights to new york");
  }

  #[test]
  fn test_lemmas_seed_lemma_categories() {
    let parser = parser_with("$ROOT -> $LEMMA_TOKEN $TOKEN : apply;", ParserOptions::default());
    let ex = Example::new(["flights", "left"]).with_lemmas(["flight", "leave"]).unwrap();
    let parse = parser.parse(&ex, &Params::new()).unwrap();
    assert_eq!(formulas(&parse), vec![r#"("flight" "left")"#]);
  }

  #[test]
  fn test_new_tree_cap() {
    let src = r#"
      $A -> a : const x;
      $A -> a : const y;
      $A -> a : const z;
      $ROOT -> $A;
    "#;
    let capped = ParserOptions {
      max_new_trees_per_span: 2,
      ..Default::default()
    };
    let ex = Example::from_utterance("a");

    let parse = parser_with(src, capped).parse(&ex, &Params::new()).unwrap();
    assert_eq!(parse.cell(0, 1, "$A").len(), 2);

    let parse = parser_with(src, ParserOptions::default()).parse(&ex, &Params::new()).unwrap();
    assert_eq!(parse.cell(0, 1, "$A").len(), 3);
  }

  #[test]
  fn test_unary_reads_pruned_child() {
    let parser = parser_with(
      r#"
      $A -> a : const x;
      $A -> a : const y;
      $B -> $A;
      $ROOT -> $B;
      "#,
      ParserOptions {
        beam_size: 1,
        ..Default::default()
      },
    );
    let ex = Example::from_utterance("a");
    let parse = parser.parse(&ex, &Params::new()).unwrap();
    assert_eq!(parse.cell(0, 1, "$A").len(), 1);
    assert_eq!(parse.cell(0, 1, "$B").len(), 1);
    assert_eq!(parse.predictions.len(), 1);
    assert!(parse.stats.fall_off_beam);
    assert_eq!(parse.stats.max_cell_size, 2);
    assert_eq!(parse.stats.max_cell_description, "$A(0,1)");
  }

  #[test]
  fn test_bool_mode_coarse_chart() {
    // the three-symbol rule forces the reachability-mode fallback
    let parser = parser_with(
      r#"
      $ROOT -> $A b $A;
      $A -> a;
      $B -> a;
      "#,
      ParserOptions::default(),
    );
    let chart = parser.build_coarse_chart(&Example::from_utterance("a b a")).unwrap();
    assert!(chart.allows("$ROOT", 0, 3));
    assert!(chart.allows("$A", 0, 1));
    assert!(chart.allows("$A", 2, 3));
    assert!(!chart.allows("$B", 0, 1));
    assert_eq!(chart.num_slots(), 3);
  }

  #[test]
  fn test_empty_input() {
    let parser = parser_with("$ROOT -> a;", ParserOptions::default());
    let parse = parser.parse(&Example::from_utterance(""), &Params::new()).unwrap();
    assert!(parse.predictions.is_empty());
    assert_eq!(parse.chart.num_slots(), 0);
  }
}
