use std::env;
use std::io;
use std::io::Write;
use std::process;
use std::sync::Arc;

use sempar::{Err, Example, Grammar, Params, Parser, ParserOptions, RuleFeaturizer, Strategy};
use tracing_subscriber::EnvFilter;

fn usage(prog_name: &str) -> String {
  format!(
    r"Usage: {} FILE [options]

Options:
  -h, --help        Print this message
  -b, --beam N      Derivations kept per cell (defaults to 500)
  -f, --floating    Also build floating derivations
  -d, --depth N     Maximum floating depth (defaults to 10)
  --no-coarse       Skip the reachability pass
  -c, --chart       Print the parse chart (defaults to not printing)
  -t, --trees       Print a tree for every prediction

Log verbosity comes from RUST_LOG, e.g. RUST_LOG=sempar=debug",
    prog_name
  )
}

fn parse(parser: &Parser, id: usize, sentence: &str, print_chart: bool, print_trees: bool) -> Result<(), Err> {
  let ex = Example::from_utterance(sentence).with_id(format!("input-{}", id));
  let parse = parser.parse(&ex, &Params::new())?;

  if print_chart {
    println!("chart:\n{}", parse);
  }

  println!(
    "Parsed {} derivation{} ({})",
    parse.predictions.len(),
    if parse.predictions.len() == 1 { "" } else { "s" },
    parse.stats
  );

  for &idx in parse.predictions.iter() {
    println!("{}", parse.arena.display(idx));
    if print_trees {
      println!("{}", parse.tree(idx));
    }
    println!();
  }

  Ok(())
}

struct Args {
  filename: String,
  opts: ParserOptions,
  print_chart: bool,
  print_trees: bool,
}

impl Args {
  fn make_error_message(msg: &str, prog_name: impl AsRef<str>) -> String {
    format!("argument error: {}.\n\n{}", msg, usage(prog_name.as_ref()))
  }

  fn parse(v: Vec<String>) -> Result<Self, String> {
    let mut iter = v.into_iter();
    let Some(prog_name) = iter.next() else {
      return Err(Self::make_error_message("bad argument vector", "sempar-cli"));
    };

    let mut filename: Option<String> = None;
    let mut opts = ParserOptions::default();
    let mut print_chart = false;
    let mut print_trees = false;

    while let Some(o) = iter.next() {
      if o == "-h" || o == "--help" {
        println!("{}", usage(&prog_name));
        process::exit(0);
      } else if o == "-b" || o == "--beam" {
        opts.beam_size = Self::number(iter.next(), &o, &prog_name)?;
      } else if o == "-d" || o == "--depth" {
        opts.max_depth = Self::number(iter.next(), &o, &prog_name)?;
      } else if o == "-f" || o == "--floating" {
        opts.strategy = Strategy::Floating;
      } else if o == "--no-coarse" {
        opts.coarse_prune = false;
      } else if o == "-c" || o == "--chart" {
        print_chart = true;
      } else if o == "-t" || o == "--trees" {
        print_trees = true;
      } else if filename.is_none() {
        filename = Some(o);
      } else {
        return Err(Self::make_error_message("invalid arguments", prog_name));
      }
    }

    if let Some(filename) = filename {
      Ok(Self {
        filename,
        opts,
        print_chart,
        print_trees,
      })
    } else {
      Err(Self::make_error_message("missing filename", prog_name))
    }
  }

  fn number(value: Option<String>, flag: &str, prog_name: &str) -> Result<usize, String> {
    value
      .and_then(|v| v.parse().ok())
      .ok_or_else(|| Self::make_error_message(&format!("{} needs a number", flag), prog_name))
  }
}

fn main() -> Result<(), Err> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .with_writer(io::stderr)
    .init();

  let args = match Args::parse(env::args().collect()) {
    Ok(args) => args,
    Err(msg) => {
      eprintln!("{}", msg);
      process::exit(255);
    }
  };

  let grammar = Grammar::read_from_file(&args.filename)?;
  let parser = Parser::new(Arc::new(grammar), Arc::new(RuleFeaturizer))?.with_options(args.opts)?;

  let mut input = String::new();
  let mut num_inputs = 0;
  loop {
    print!("> ");
    io::stdout().flush()?;

    match io::stdin().read_line(&mut input) {
      Ok(_) => {
        if input.is_empty() {
          // ctrl+d
          return Ok(());
        }
        input.make_ascii_lowercase();
        num_inputs += 1;
        if let Err(e) = parse(&parser, num_inputs, input.trim(), args.print_chart, args.print_trees) {
          eprintln!("error: {}", e);
        }
        input.clear();
      }
      Err(error) => return Err(error.into()),
    }
  }
}
