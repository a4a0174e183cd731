use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use method_logger::config::Config;
use method_logger::error::Error;
use method_logger::marker::{MarkerRegistry, Scan};
use method_logger::project::{find_rust_files, rewrite_file_in_place, rewrite_project};
use method_logger::rewrite::{RewriteResult, rewrite_source};

/// Environment variable holding the log filter (e.g. `debug`).
const LOG_ENV: &str = "METHOD_LOGGER_LOG";

#[derive(Parser)]
#[command(
    name = "method-logger",
    about = "Prepend a diagnostic println to every #[method_logger] function",
    version,
    after_help = "Workflow: method-logger list src/, then method-logger project --out <DIR>"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rewrite one source file. Prints the result to stdout unless
    /// --output or --in-place is given.
    Rewrite {
        /// Source file to rewrite.
        file: PathBuf,

        /// Write the rewritten source to PATH.
        #[arg(short, long, value_name = "PATH", conflicts_with = "in_place")]
        output: Option<PathBuf>,

        /// Replace FILE with the rewritten source.
        #[arg(long)]
        in_place: bool,

        /// Keep #[method_logger] attributes in the output.
        #[arg(long)]
        keep_marker: bool,
    },
    /// List tagged functions in a file or directory tree.
    List {
        /// File or directory to scan.
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Emit JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
    /// Copy a project into DIR with every tagged function rewritten.
    Project {
        /// Project root (defaults to current directory).
        #[arg(long, default_value = ".")]
        project: PathBuf,

        /// Output directory; must be empty or absent.
        #[arg(long, value_name = "DIR")]
        out: PathBuf,

        /// Keep #[method_logger] attributes in the output.
        #[arg(long)]
        keep_marker: bool,
    },
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("error: {e}");
        process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<(), Error> {
    match cli.command {
        Commands::Rewrite {
            file,
            output,
            in_place,
            keep_marker,
        } => cmd_rewrite(file, output, in_place, keep_marker),
        Commands::List { path, json } => cmd_list(path, json),
        Commands::Project {
            project,
            out,
            keep_marker,
        } => cmd_project(project, out, keep_marker),
    }
}

fn cmd_rewrite(
    file: PathBuf,
    output: Option<PathBuf>,
    in_place: bool,
    keep_marker: bool,
) -> Result<(), Error> {
    if !file.is_file() {
        return Err(Error::NotFound(file));
    }
    let config = Config::discover(&file)?.with_keep_marker(keep_marker);
    let registry = MarkerRegistry::default();

    let result = if in_place {
        rewrite_file_in_place(&file, &registry, config.marker_policy)?
    } else {
        let source = std::fs::read_to_string(&file).map_err(|source| Error::ReadError {
            path: file.clone(),
            source,
        })?;
        let result =
            rewrite_source(&source, &registry, config.marker_policy).map_err(|source| {
                Error::ParseError {
                    path: file.clone(),
                    source,
                }
            })?;
        match &output {
            Some(out) => std::fs::write(out, &result.source)?,
            None => anstream::print!("{}", result.source),
        }
        result
    };

    report_rewrite(&file, &result);
    Ok(())
}

fn report_rewrite(file: &Path, result: &RewriteResult) {
    eprintln!(
        "instrumented {} function(s) in {}",
        result.instrumented.len(),
        file.display()
    );
    for name in &result.instrumented {
        eprintln!("    {name}");
    }
    for name in &result.skipped {
        eprintln!("    {name} (no body, skipped)");
    }
}

/// One scanned file, as emitted by `list --json`.
#[derive(Serialize)]
struct FileScan {
    file: PathBuf,
    #[serde(flatten)]
    scan: Scan,
}

fn cmd_list(path: PathBuf, json: bool) -> Result<(), Error> {
    let files = if path.is_dir() {
        find_rust_files(&path)?
    } else if path.is_file() {
        vec![path.clone()]
    } else {
        return Err(Error::NotFound(path));
    };

    let registry = MarkerRegistry::default();
    let marker_name = registry.marker_kind().name();
    let mut scans: Vec<FileScan> = Vec::new();
    for file in &files {
        let source = std::fs::read_to_string(file).map_err(|source| Error::ReadError {
            path: file.clone(),
            source,
        })?;
        if !source.contains(marker_name) {
            continue;
        }
        let syntax = syn::parse_file(&source).map_err(|source| Error::ParseError {
            path: file.clone(),
            source,
        })?;
        let scan = registry.scan(&syntax);
        if scan.tagged.is_empty() && scan.ignored.is_empty() {
            continue;
        }
        let display = file
            .strip_prefix(&path)
            .ok()
            .filter(|rel| !rel.as_os_str().is_empty())
            .unwrap_or(file.as_path())
            .to_path_buf();
        scans.push(FileScan {
            file: display,
            scan,
        });
    }

    if json {
        let rendered = serde_json::to_string_pretty(&scans).map_err(std::io::Error::from)?;
        anstream::println!("{rendered}");
        return Ok(());
    }

    let total: usize = scans.iter().map(|s| s.scan.tagged.len()).sum();
    for file_scan in &scans {
        anstream::println!("{}:", file_scan.file.display());
        for tagged in &file_scan.scan.tagged {
            let note = if tagged.has_body { "" } else { " (no body)" };
            anstream::println!("  {:>5}  {}{note}", tagged.line, tagged.name);
        }
        for ignored in &file_scan.scan.ignored {
            eprintln!(
                "warning: {}:{}: {} -- {}",
                file_scan.file.display(),
                ignored.line,
                ignored.item,
                ignored.reason
            );
        }
    }
    eprintln!(
        "found {total} tagged function(s) across {} file(s)",
        scans.len()
    );
    Ok(())
}

fn cmd_project(project: PathBuf, out: PathBuf, keep_marker: bool) -> Result<(), Error> {
    if !project.is_dir() {
        return Err(Error::NotFound(project));
    }
    let config = Config::load(&project)?.with_keep_marker(keep_marker);
    let registry = MarkerRegistry::default();
    let report = rewrite_project(&project, &out, &registry, config.marker_policy)?;

    eprintln!(
        "instrumented {} function(s) across {} file(s)",
        report.instrumented_count(),
        report.files.len()
    );
    for file in &report.files {
        eprintln!("  {}:", file.path.display());
        for name in &file.instrumented {
            eprintln!("    {name}");
        }
        for name in &file.skipped {
            eprintln!("    {name} (no body, skipped)");
        }
    }
    eprintln!("staged: {}", out.display());
    if !std::io::stdout().is_terminal() {
        println!("{}", out.display());
    }
    Ok(())
}
