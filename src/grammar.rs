use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use tracing::debug;

use crate::error::Error;
use crate::parse_grammar::parse_rules;
use crate::rules::{Rule, is_category};

/// The categories the parser treats specially: the root it harvests, and the
/// four lexical categories it seeds over the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecialCats {
  pub root: String,
  /// Every single token
  pub token: String,
  /// Every span of tokens
  pub phrase: String,
  pub lemma_token: String,
  pub lemma_phrase: String,
}

impl Default for SpecialCats {
  fn default() -> Self {
    Self {
      root: "$ROOT".to_string(),
      token: "$TOKEN".to_string(),
      phrase: "$PHRASE".to_string(),
      lemma_token: "$LEMMA_TOKEN".to_string(),
      lemma_phrase: "$LEMMA_PHRASE".to_string(),
    }
  }
}

impl SpecialCats {
  pub fn is_lexical(&self, cat: &str) -> bool {
    cat == self.token || cat == self.phrase || cat == self.lemma_token || cat == self.lemma_phrase
  }
}

#[derive(Debug)]
pub struct Grammar {
  rules: Vec<Arc<Rule>>,
  /// `$A -> $B` rules, ordered so that `$B -> $C` comes before `$A -> $B`
  cat_unary_rules: Vec<Arc<Rule>>,
  categories: BTreeSet<String>,
  /// Every category some right-hand side mentions
  referenced: BTreeSet<String>,
  special: SpecialCats,
}

impl fmt::Display for Grammar {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(f, "//** root: {}", self.special.root)?;
    write!(f, "//** categories:")?;
    for cat in self.categories.iter() {
      write!(f, " {}", cat)?;
    }
    writeln!(f)?;

    write!(f, "//** unary order:")?;
    for rule in self.cat_unary_rules.iter() {
      write!(f, " {}<-{}", rule.lhs, rule.rhs[0])?;
    }
    writeln!(f)?;

    for rule in self.rules.iter() {
      writeln!(f, "{}", rule)?;
    }

    Ok(())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
  Unvisited,
  InProgress,
  Done,
}

impl Grammar {
  pub fn new(rules: Vec<Rule>) -> Result<Self, Error> {
    Self::with_special_cats(rules, SpecialCats::default())
  }

  /// Numbers the rules, checks that every RHS category is produced somewhere,
  /// and orders the unary rules. Fails on a cycle of unary rules.
  pub fn with_special_cats(rules: Vec<Rule>, special: SpecialCats) -> Result<Self, Error> {
    let rules: Vec<Arc<Rule>> = rules
      .into_iter()
      .enumerate()
      .map(|(id, mut rule)| {
        rule.id = id;
        Arc::new(rule)
      })
      .collect();

    let categories: BTreeSet<String> = rules.iter().map(|r| r.lhs.clone()).collect();
    let referenced: BTreeSet<String> = rules
      .iter()
      .flat_map(|r| r.rhs_categories().map(str::to_string))
      .collect();
    Self::validate(&rules, &categories, &special)?;
    let cat_unary_rules = Self::sort_cat_unary_rules(&rules)?;

    debug!(
      rules = rules.len(),
      cat_unary = cat_unary_rules.len(),
      categories = categories.len(),
      "grammar loaded"
    );

    Ok(Self {
      rules,
      cat_unary_rules,
      categories,
      referenced,
      special,
    })
  }

  pub fn read_from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
    std::fs::read_to_string(path)?.parse()
  }

  fn validate(rules: &[Arc<Rule>], categories: &BTreeSet<String>, special: &SpecialCats) -> Result<(), Error> {
    for rule in rules {
      if !is_category(&rule.lhs) {
        return Err(Error::Syntax(format!("left-hand side {} is not a category", rule.lhs)));
      }
      if rule.is_empty() {
        return Err(Error::EmptyRhs { lhs: rule.lhs.clone() });
      }
      for cat in rule.rhs_categories() {
        if !categories.contains(cat) && !special.is_lexical(cat) {
          return Err(Error::UndefinedCategory {
            rule: rule.to_string(),
            cat: cat.to_string(),
          });
        }
      }
    }
    Ok(())
  }

  /// Depth-first over the unary graph (lhs -> rhs), emitting each rule after
  /// everything below it. Uses an explicit stack, so deep chains can't blow
  /// the call stack, and reports a back edge as a cycle.
  fn sort_cat_unary_rules(rules: &[Arc<Rule>]) -> Result<Vec<Arc<Rule>>, Error> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut names: Vec<&str> = Vec::new();
    let mut graph: Vec<Vec<Arc<Rule>>> = Vec::new();

    fn node<'a>(
      name: &'a str,
      index: &mut HashMap<&'a str, usize>,
      names: &mut Vec<&'a str>,
      graph: &mut Vec<Vec<Arc<Rule>>>,
    ) -> usize {
      *index.entry(name).or_insert_with(|| {
        names.push(name);
        graph.push(Vec::new());
        names.len() - 1
      })
    }

    for rule in rules.iter().filter(|r| r.is_cat_unary()) {
      let lhs = node(&rule.lhs, &mut index, &mut names, &mut graph);
      node(rule.rhs[0].symbol_str(), &mut index, &mut names, &mut graph);
      graph[lhs].push(rule.clone());
    }

    let mut marks = vec![Mark::Unvisited; names.len()];
    let mut sorted = Vec::new();

    for root in 0..names.len() {
      if marks[root] != Mark::Unvisited {
        continue;
      }

      // frames are (node, index of the next outgoing rule to visit)
      let mut stack: Vec<(usize, usize)> = vec![(root, 0)];
      marks[root] = Mark::InProgress;

      while let Some(&(current, pos)) = stack.last() {
        if pos == graph[current].len() {
          marks[current] = Mark::Done;
          stack.pop();
          if let Some((parent, parent_pos)) = stack.last_mut() {
            sorted.push(graph[*parent][*parent_pos].clone());
            *parent_pos += 1;
          }
          continue;
        }

        let rule = &graph[current][pos];
        let child = index[rule.rhs[0].symbol_str()];
        match marks[child] {
          Mark::Done => {
            sorted.push(rule.clone());
            if let Some(top) = stack.last_mut() {
              top.1 += 1;
            }
          }
          Mark::InProgress => {
            let from = stack.iter().position(|&(n, _)| n == child).unwrap_or(0);
            let mut cycle: Vec<String> = stack[from..].iter().map(|&(n, _)| names[n].to_string()).collect();
            cycle.push(names[child].to_string());
            return Err(Error::UnaryCycle { cycle });
          }
          Mark::Unvisited => {
            marks[child] = Mark::InProgress;
            stack.push((child, 0));
          }
        }
      }
    }

    Ok(sorted)
  }

  pub fn rules(&self) -> &[Arc<Rule>] {
    &self.rules
  }

  pub fn cat_unary_rules(&self) -> &[Arc<Rule>] {
    &self.cat_unary_rules
  }

  /// Every category some rule produces

  pub fn is_referenced(&self, cat: &str) -> bool {
    self.referenced.contains(cat)
  }

  /// The lexical categories some rule actually reads, so seeding can skip the rest
  pub fn referenced_lexical(&self) -> impl Iterator<Item = &str> {
    self
      .referenced
      .iter()
      .filter(|c| self.special.is_lexical(c))
      .map(String::as_str)
  }

  pub fn special(&self) -> &SpecialCats {
    &self.special
  }

  pub fn root_cat(&self) -> &str {
    &self.special.root
  }

  /// The first rule matching `filter` whose right-hand side is longer than two
  pub fn first_unbinarized(&self, filter: impl Fn(&Rule) -> bool) -> Option<&Arc<Rule>> {
    self.rules.iter().find(|r| filter(r) && r.len() > 2)
  }
}

impl FromStr for Grammar {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let rules = parse_rules(s)?;
    if rules.is_empty() {
      return Err(Error::Syntax("empty ruleset".into()));
    }
    Self::new(rules)
  }
}
