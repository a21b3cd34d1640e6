use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use itertools::Itertools;
use mimalloc::MiMalloc;
use traceblame_attribute::{
    DEFAULT_ITERATION_LIMIT, FilterKind, PropagationOptions, UrlFilter,
};
use traceblame_graph::BuildOptions;
use traceblame_schemas::ThreadRef;
use traceblame_summarize::{AnalysisOptions, SummaryOptions};
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Attribute the CPU time in a browser performance trace to the scripts
/// and source locations that caused it.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a trace and print a per-attribution summary as JSON
    ///
    /// Builds the main-thread task tree, infers an attribution for every
    /// task, and ranks attributions by cumulative and longest time.
    Analyze(AnalyzeArgs),
}

#[derive(Args)]
struct AnalyzeArgs {
    /// Trace file, in JSON array or object form
    trace: PathBuf,

    /// Output file path (writes to stdout if not specified)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Only report tasks attributed to scripts whose URL contains this
    #[arg(long)]
    script_url_pattern: Option<String>,

    /// Prune the task tree to the matching script before measuring it
    #[arg(long, value_enum, requires = "script_url_pattern")]
    filter: Option<FilterArg>,

    /// Only match source locations on this line when filtering
    #[arg(long, requires = "filter")]
    line: Option<i64>,

    /// Only report top-level tasks
    #[arg(long)]
    top_level_only: bool,

    /// Upper bound on attribution propagation rounds
    #[arg(long, default_value_t = DEFAULT_ITERATION_LIMIT)]
    iteration_limit: usize,

    /// Process id of the thread to analyze (detected if not specified)
    #[arg(long, requires = "tid")]
    pid: Option<u64>,

    /// Thread id of the thread to analyze
    #[arg(long, requires = "pid")]
    tid: Option<u64>,
}

#[derive(Clone, Copy, ValueEnum)]
enum FilterArg {
    /// Matching tasks with their ancestors and descendants
    Fine,
    /// As fine, plus the siblings of matching nested tasks
    Coarse,
}

impl AnalyzeArgs {
    fn options(&self) -> AnalysisOptions {
        let main_thread = self
            .pid
            .zip(self.tid)
            .map(|(pid, tid)| ThreadRef { pid, tid });
        let url_filter = self
            .filter
            .zip(self.script_url_pattern.clone())
            .map(|(kind, pattern)| UrlFilter {
                pattern,
                line: self.line,
                kind: match kind {
                    FilterArg::Fine => FilterKind::Fine,
                    FilterArg::Coarse => FilterKind::Coarse,
                },
            });
        AnalysisOptions {
            build: BuildOptions { main_thread },
            propagation: PropagationOptions {
                iteration_limit: self.iteration_limit,
            },
            url_filter,
            summary: SummaryOptions {
                script_url_pattern: self.script_url_pattern.clone(),
                top_level_only: self.top_level_only,
            },
        }
    }
}

fn analyze(args: &AnalyzeArgs, output: &mut dyn Write) -> Result<()> {
    info!(trace = %args.trace.display(), "analyzing trace");
    let input = open(&args.trace)?;
    traceblame_summarize::run(input, output, &args.options(), &[])?;
    Ok(())
}

fn open(path: &Path) -> Result<BufReader<File>> {
    let file = File::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    Ok(BufReader::new(file))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so JSON on stdout stays clean for piping.
    const CRATES: &[&str] = &[
        "traceblame",
        "traceblame_attribute",
        "traceblame_graph",
        "traceblame_schemas",
        "traceblame_summarize",
    ];
    let level = cli.verbose.tracing_level_filter();
    let allowlist = CRATES.iter().map(|c| format!("{c}={level}")).join(",");
    let filter = EnvFilter::new(format!("warn,{allowlist}"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_span_events(FmtSpan::ENTER | FmtSpan::CLOSE)
        .init();

    match cli.command {
        Commands::Analyze(args) => {
            // Stdout must outlive the lock, so bind it first.
            let stdout = std::io::stdout();
            let mut writer: Box<dyn Write> = match &args.output {
                Some(path) => Box::new(BufWriter::new(File::create(path)?)),
                None => Box::new(stdout.lock()),
            };
            analyze(&args, &mut *writer)?;
            writer.flush()?;
            Ok(())
        }
    }
}
