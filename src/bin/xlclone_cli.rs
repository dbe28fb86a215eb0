//! CLI tool for xlclone - writes JSON workbook snapshots into copies of a template
//!
//! Usage:
//!   xlclone_cli --template tpl/ book.json                 # Write <temp dir>/<name>.xlsx
//!   xlclone_cli --template tpl.xlsx a.json b.json --out-dir out/
//!   xlclone_cli --template tpl/ book.json -o report.xlsx

#![allow(clippy::exit)]

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use clap::Parser;
use rayon::prelude::*;
use tracing_subscriber::EnvFilter;
use xlclone::{ArchiveTimestamp, SerializeOptions, Serializer, TemplatePackage, WorkbookSnapshot, XlcloneError};

#[derive(Debug, Parser)]
#[command(name = "xlclone_cli", version, about = "Serialize workbook snapshots into a template package")]
struct Cli {
    /// Template: an unzipped package directory or an existing .xlsx file
    #[arg(long, env = "XLCLONE_TEMPLATE")]
    template: PathBuf,

    /// Directory for output files (default: system temp dir)
    #[arg(long, conflicts_with = "output")]
    out_dir: Option<PathBuf>,

    /// Output file (single snapshot only)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Timestamp stamped on every archive entry, "YYYY-MM-DD HH:MM:SS"
    #[arg(long, value_parser = parse_timestamp)]
    timestamp: Option<ArchiveTimestamp>,

    /// Fail when a sheet name differs from the template's sheet at that position
    #[arg(long)]
    strict_sheet_names: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Snapshot JSON files
    #[arg(required = true)]
    snapshots: Vec<PathBuf>,
}

fn parse_timestamp(s: &str) -> Result<ArchiveTimestamp, String> {
    s.parse().map_err(|e: XlcloneError| e.to_string())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "xlclone=info",
        _ => "xlclone=debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// `<out_dir>/<workbook name>`, with `.xlsx` appended when the name has no extension.
fn output_path(out_dir: &Path, snapshot: &WorkbookSnapshot) -> PathBuf {
    let name = Path::new(snapshot.name())
        .file_name()
        .map_or_else(|| "workbook".into(), |n| n.to_string_lossy().into_owned());
    let mut path = out_dir.join(name);
    if path.extension().is_none() {
        path.set_extension("xlsx");
    }
    path
}

/// Output paths claimed by more than one snapshot.
fn duplicate_outputs<'a>(dests: impl IntoIterator<Item = &'a Path>) -> HashSet<&'a Path> {
    let mut seen = HashSet::new();
    dests.into_iter().filter(|dest| !seen.insert(*dest)).collect()
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if cli.output.is_some() && cli.snapshots.len() > 1 {
        eprintln!("Error: -o/--output takes a single snapshot; use --out-dir for several");
        std::process::exit(2);
    }

    let template = match TemplatePackage::load(&cli.template) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Error loading template {}: {}: {}", cli.template.display(), e.kind(), e);
            std::process::exit(1);
        }
    };

    let mut options = SerializeOptions::new().strict_sheet_names(cli.strict_sheet_names);
    if let Some(ts) = cli.timestamp {
        options = options.archive_timestamp(ts);
    }
    let serializer = Serializer::with_options(options);
    let out_dir = cli.out_dir.clone().unwrap_or_else(std::env::temp_dir);

    // Resolve every destination first: two snapshots naming the same
    // workbook would otherwise race for one output file.
    let jobs: Vec<_> = cli
        .snapshots
        .par_iter()
        .map(|input| {
            let job = WorkbookSnapshot::from_json_path(input).map(|snapshot| {
                let dest = cli
                    .output
                    .clone()
                    .unwrap_or_else(|| output_path(&out_dir, &snapshot));
                (snapshot, dest)
            });
            (input, job)
        })
        .collect();
    let duplicates = duplicate_outputs(
        jobs.iter()
            .filter_map(|(_, job)| job.as_ref().ok().map(|(_, dest)| dest.as_path())),
    );

    let failures: usize = jobs
        .par_iter()
        .map(|(input, job)| match job {
            Ok((_, dest)) if duplicates.contains(dest.as_path()) => {
                eprintln!(
                    "Error in {}: output {} is also claimed by another snapshot",
                    input.display(),
                    dest.display()
                );
                1
            }
            Ok((snapshot, dest)) => match serializer.serialize_to_path(snapshot, &template, dest) {
                Ok(_) => {
                    eprintln!("Written: {}", dest.display());
                    0
                }
                Err(e) => {
                    eprintln!("Error in {}: {}: {}", input.display(), e.kind(), e);
                    1
                }
            },
            Err(e) => {
                eprintln!("Error in {}: {}: {}", input.display(), e.kind(), e);
                1
            }
        })
        .sum();

    if failures > 0 {
        std::process::exit(1);
    }
}
