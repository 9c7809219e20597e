use clap::{error::ErrorKind, ArgGroup, CommandFactory, Parser};
use commit_batch::{self, BatchOptions, Error, RunSummary, Selection};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, level_filters::LevelFilter};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(group(
    ArgGroup::new("selection")
        .required(true)
        .args(["commit_selection", "commits"]),
))]
struct Cli {
    /// Commit selection like 'abc123,def456' or 'abc123-def456'. Accepts commas, ranges, and whitespace
    commit_selection: Option<String>,

    /// Alias for the commit selection string
    #[arg(long)]
    commits: Option<String>,

    /// Base branch to start from and return to
    #[arg(long, default_value = "main")]
    base_branch: String,

    /// Remote name to fetch commits from
    #[arg(long, default_value = "origin")]
    remote: String,

    /// Directory where output files will be written (defaults to the system temp directory)
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Don't return to the base branch at the end
    #[arg(long)]
    no_cleanup: bool,

    /// Path of the local Git repository
    #[arg(short, long, default_value = ".")]
    repo: PathBuf,

    /// Log level
    #[arg(global = true, short, long, default_value = "info")]
    log: LevelFilter,
}

fn short(sha: &str) -> &str {
    sha.get(..8).unwrap_or(sha)
}

fn short_list(commits: &[String]) -> String {
    commits.iter().map(|c| short(c)).collect::<Vec<_>>().join(", ")
}

fn print_selection(selection: &Selection) {
    println!("Requested commit selection: {}", selection.requested);
    println!("Canonical commit selection: {}", selection.canonical());
    if let (Some(first), Some(last)) = (selection.commits.first(), selection.commits.last()) {
        println!(
            "Expanded commits: count={} first={} last={} preview={}",
            selection.commits.len(),
            short(first),
            short(last),
            selection.preview()
        );
    }
}

fn print_path(label: &str, path: Option<&Path>) {
    if let Some(path) = path {
        println!("✓ {label}: {}", path.display());
    }
}

fn print_run_summary(summary: &RunSummary, output_dir: &Path) {
    println!("\n📊 Run Summary:");
    println!("==================");
    println!(
        "Requested commit count: {}; processed commit count: {}",
        summary.requested,
        summary.processed.len()
    );
    if !summary.missing.is_empty() {
        println!("Missing/inaccessible commits: {}", short_list(&summary.missing));
    }
    if !summary.skipped.is_empty() {
        println!("Skipped commits after processing: {}", short_list(&summary.skipped));
    }

    let plain = &summary.plain;
    if plain.commit_reports.is_empty() {
        println!("\nNo commits were successfully processed (without logs)");
    } else {
        println!(
            "\n✓ Successfully processed {} commit(s) (without logs)",
            plain.commit_reports.len()
        );
        println!(
            "✓ Individual files: {}/commit-{{sha}}-implementation.txt",
            output_dir.display()
        );
        print_path("Master comparison", plain.master.as_deref());
        print_path("Summary compilation", plain.summary.as_deref());
        print_path("Touched files compilation", plain.touched.as_deref());
        if !summary.round_robin.is_empty() {
            println!(
                "✓ Round-robin comparisons ({}): {}/commit-{{left}}-versus-{{right}}.txt",
                summary.round_robin.len(),
                output_dir.display()
            );
        }
    }

    let with_logs = &summary.with_logs;
    if with_logs.commit_reports.is_empty() {
        println!("\nNo commits were successfully processed (with logs)");
    } else {
        println!(
            "\n✓ Successfully processed {} commit(s) (with logs)",
            with_logs.commit_reports.len()
        );
        println!(
            "✓ Individual files (with logs): {}/commit-{{sha}}-implementation-with-logs.txt",
            output_dir.display()
        );
        print_path("Master comparison (with logs)", with_logs.master.as_deref());
        print_path("Summary compilation (with logs)", with_logs.summary.as_deref());
        print_path("Touched files compilation (with logs)", with_logs.touched.as_deref());
    }
}

#[tokio::main]
async fn main() -> commit_batch::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let env_filter = EnvFilter::from_default_env().add_directive(cli.log.into());

    fmt()
        .with_env_filter(env_filter)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(true)
        .pretty()
        .init();

    let options = BatchOptions {
        base_branch: cli.base_branch,
        remote: cli.remote,
        output_dir: cli.output_dir.unwrap_or_else(std::env::temp_dir),
        cleanup: !cli.no_cleanup,
    };
    let output_dir = options.output_dir.clone();
    let processor = Arc::new(commit_batch::new(&cli.repo, options));

    // ArgGroup ensures exactly one of the two is provided
    let requested = cli.commit_selection.or(cli.commits).unwrap_or_default();

    let selection = processor
        .parse_selection(&requested)
        .unwrap_or_else(|e| Cli::command().error(ErrorKind::ValueValidation, e).exit());
    print_selection(&selection);

    processor.ensure_base_branch()?;

    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&interrupted);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("Interrupt received");
            flag.store(true, Ordering::SeqCst);
        }
    });

    let worker = Arc::clone(&processor);
    let outcome = tokio::task::spawn_blocking(move || worker.run(&selection, &interrupted))
        .await
        .unwrap_or_else(|e| Err(Error::IoError(std::io::Error::other(e))));

    processor.cleanup();

    match outcome {
        Ok(summary) => {
            print_run_summary(&summary, &output_dir);
            Ok(())
        }
        Err(Error::Interrupted) => {
            println!("\nInterrupted by user");
            Ok(())
        }
        Err(e) => Err(e),
    }
}
