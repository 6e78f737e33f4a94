//! tipd REPL
//!
//! A Read-Eval-Print Loop over a [`tipd::Store`] and the lifted
//! [`tipd::evaluator`]. Facts are added with `.add`, queries evaluated
//! with `.query`, and `.trace` toggles per-rule trace logging at runtime
//! without restarting the process.
//!
//! ```bash
//! tipd
//! tipd --config tipd.toml
//! tipd --script facts.tipd
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::PathBuf;
use tipd::config::Config;
use tipd::{evaluator, parser, Store};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{reload, EnvFilter, Registry};

#[derive(Parser)]
#[command(name = "tipd")]
#[command(about = "Lifted probabilistic inference over a tuple-independent probabilistic database")]
#[command(version)]
struct Cli {
    /// Configuration file path (defaults to ./tipd.toml, then built-in defaults).
    #[arg(short, long)]
    config: Option<String>,

    /// A script of `.add`/`.query` statements to run before opening the REPL.
    #[arg(short, long)]
    script: Option<String>,

    /// Force rule-firing traces regardless of the configured logging level.
    #[arg(short, long)]
    trace: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::from_file(path).with_context(|| format!("loading config from {path}"))?,
        None => Config::load().unwrap_or_default(),
    };
    if cli.trace {
        config.evaluator.trace = true;
        config.logging.level = "trace".to_string();
    }
    let reload_handle = init_tracing(&config);

    let mut store = Store::new();

    if let Some(script_path) = &cli.script {
        let content = std::fs::read_to_string(script_path)
            .with_context(|| format!("reading script {script_path}"))?;
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            run_line(line, &mut store, &mut config, &reload_handle);
        }
    }

    run_repl(&mut store, &mut config, &reload_handle)
}

type FilterReloadHandle = reload::Handle<EnvFilter, Registry>;

/// Builds the subscriber behind a [`reload::Handle`] so `.trace` can raise
/// the filter to `trace` at runtime without tearing down the process-global
/// dispatcher.
fn init_tracing(config: &Config) -> FilterReloadHandle {
    let initial = EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let (filter, reload_handle) = reload::Layer::new(initial);
    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
    reload_handle
}

fn run_repl(store: &mut Store, config: &mut Config, reload_handle: &FilterReloadHandle) -> Result<()> {
    println!("tipd -- lifted probabilistic inference");
    println!("Type .help for commands, .quit to exit.\n");

    let mut rl = DefaultEditor::new().context("initializing line editor")?;
    let history_path = history_path();
    if history_path.exists() {
        let _ = rl.load_history(&history_path);
    }

    loop {
        match rl.readline("tipd> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line);

                if line == ".quit" || line == ".exit" {
                    println!("Goodbye!");
                    break;
                }
                run_line(line, store, config, reload_handle);
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                println!("readline error: {err}");
                break;
            }
        }
    }

    let _ = rl.save_history(&history_path);
    Ok(())
}

fn history_path() -> PathBuf {
    match std::env::var_os("HOME") {
        Some(home) => {
            let dir = PathBuf::from(home).join(".tipd");
            let _ = std::fs::create_dir_all(&dir);
            dir.join("history")
        }
        None => PathBuf::from(".tipd_history"),
    }
}

fn run_line(line: &str, store: &mut Store, config: &mut Config, reload_handle: &FilterReloadHandle) {
    if let Some(rest) = line.strip_prefix(".add") {
        handle_add(rest.trim(), store);
    } else if let Some(rest) = line.strip_prefix(".query") {
        handle_query(rest.trim(), store, config);
    } else if line == ".trace" {
        handle_trace(config, reload_handle);
    } else if line == ".help" {
        print_help();
    } else {
        println!("unknown command: {line}");
        println!("Type .help for available commands.");
    }
}

/// `.add <relation> <term1> [term2 ...] <probability>` -- the trailing
/// whitespace-separated token is the probability, everything between the
/// relation name and it is the ground tuple.
fn handle_add(input: &str, store: &mut Store) {
    let parts: Vec<&str> = input.split_whitespace().collect();
    if parts.len() < 2 {
        println!("usage: .add <relation> <tuple...> <probability>");
        return;
    }
    let relation = parts[0];
    let (tuple_parts, probability_str) = parts[1..].split_at(parts.len() - 2);
    let probability: f64 = match probability_str[0].parse() {
        Ok(p) => p,
        Err(_) => {
            println!("probability must be a number in [0, 1], got '{}'", probability_str[0]);
            return;
        }
    };
    let tuple: Vec<String> = tuple_parts.iter().map(|s| s.to_string()).collect();

    match store.add(relation, tuple, probability) {
        Ok(()) => println!("added {relation} with probability {probability}"),
        Err(e) => println!("error: {e}"),
    }
}

/// Toggles rule-firing trace logging at runtime, per-rule, without
/// restarting the process.
fn handle_trace(config: &mut Config, reload_handle: &FilterReloadHandle) {
    config.evaluator.trace = !config.evaluator.trace;
    let new_filter = if config.evaluator.trace {
        EnvFilter::new("trace")
    } else {
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"))
    };
    let _ = reload_handle.modify(|filter| *filter = new_filter);
    println!("trace logging: {}", if config.evaluator.trace { "on" } else { "off" });
}

fn handle_query(input: &str, store: &Store, config: &Config) {
    if input.is_empty() {
        println!("usage: .query <query>");
        return;
    }
    let query = match parser::parse(input) {
        Ok(q) => q,
        Err(e) => {
            println!("parse error: {e}");
            return;
        }
    };

    match evaluator::eval(&query, store, &config.evaluator) {
        Ok(probability) => println!("Pr[{query}] = {probability}"),
        Err(e) => println!("error: {e}"),
    }
}

fn print_help() {
    println!("Commands:");
    println!("  .add <relation> [terms...] <p>   Record a ground tuple's probability");
    println!("  .query <expr>                    Evaluate Pr[expr]");
    println!("  .trace                           Toggle per-rule trace logging");
    println!("  .help                            Show this help");
    println!("  .quit                            Exit");
    println!();
    println!("Query syntax:");
    println!("  R(a, b)                          Ground atom");
    println!("  and(R(a), S(b))                  Conjunction");
    println!("  or(R(a), S(b))                   Disjunction");
    println!("  not(R(a))                        Negation");
    println!("  exist(x, R(x, a))                Existential quantifier");
    println!("  forall(x, R(x, a))               Universal quantifier");
    println!("  x, y | R(x, y), S(z)             Quantifier-list sugar");
}
