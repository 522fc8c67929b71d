//! The `sonc` compiler driver: CLI parsing, configuration, logging setup,
//! and orchestration of the lex → parse → lower → compile → emit pipeline,
//! split into a thin `main.rs` and a `Session`-shaped `lib.rs`.

pub mod config;
pub mod error;

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use config::Config;
use error::{Result, SoncError};

/// `sonc` — a sea-of-nodes toy compiler middle end.
#[derive(Parser, Debug)]
#[command(name = "sonc")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Lowers a toy function to a sea-of-nodes MIR graph and schedules it")]
pub struct Cli {
    /// Source file to compile.
    pub input: PathBuf,

    /// Path to a `sonc.toml` configuration file (default: `./sonc.toml` if present).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// What to print after compilation. Repeatable; defaults to both.
    #[arg(long, value_enum)]
    pub emit: Vec<EmitKind>,

    /// Skip the idealization pass and print the pre-optimization graph.
    #[arg(long, default_value_t = false)]
    pub no_optimize: bool,

    /// Scratch-arena size in bytes, pre-reserved per arena.
    #[arg(long)]
    pub arena_size: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EmitKind {
    Graphviz,
    Blocks,
}

/// Parses arguments, wires up logging and configuration, and runs the
/// pipeline. The sole entry point called from `main.rs`.
pub fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging();

    let config = load_config(cli.config.as_deref())?;
    let arena_size_bytes = cli.arena_size.unwrap_or(config.arena_size_bytes);
    let optimize = if cli.no_optimize { false } else { config.optimize };
    let emit = if cli.emit.is_empty() {
        vec![EmitKind::Graphviz, EmitKind::Blocks]
    } else {
        cli.emit.clone()
    };

    run(&cli.input, optimize, arena_size_bytes, &emit)?;
    Ok(())
}

/// `SONC_LOG` controls verbosity (falls back to `info`).
fn init_logging() {
    let filter = EnvFilter::try_from_env("SONC_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .try_init();
}

fn load_config(path: Option<&std::path::Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from_path(path),
        None => Config::load(),
    }
}

/// Runs the pipeline over a single source file: read, lex+parse, lower to
/// HIR, compile to MIR, and print the requested emit kinds to stdout.
pub fn run(
    input: &std::path::Path,
    optimize: bool,
    arena_size_bytes: usize,
    emit: &[EmitKind],
) -> Result<()> {
    info!(path = %input.display(), "reading source file");
    let source = std::fs::read_to_string(input).map_err(|source| SoncError::ReadSource {
        path: input.to_path_buf(),
        source,
    })?;

    let mut interner = sonc_util::SymbolInterner::new();
    let program = sonc_front::parse(&source, &mut interner)?;

    info!("lowering AST to HIR");
    let hir = sonc_front::lower_program(&program);

    let (cx, proc, cfg) = sonc_mir::compile(&hir, optimize, arena_size_bytes);

    for kind in emit {
        match kind {
            EmitKind::Graphviz => println!("{}", sonc_mir::graphviz(&cx, proc.end)),
            EmitKind::Blocks => println!("{}", sonc_mir::format_blocks(&cfg)),
        }
    }

    Ok(())
}
