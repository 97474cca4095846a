use anyhow::Context;
use clap::{ArgAction, CommandFactory, Parser};
use ico_converter::{extract_icon, OutputFormat};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::thread;
use tracing::{error, Level};

const EXTENSION: &str = "ico";

/// Extracts images from .ICO files.
#[derive(Parser, Debug, Clone)]
#[command(version)]
struct Args {
    /// .ICO file or directory with .ICO files
    #[arg(conflicts_with = "input_flag")]
    input: Option<PathBuf>,

    /// Destination directory, created if missing
    #[arg(conflicts_with = "destination_flag")]
    destination: Option<PathBuf>,

    /// .ICO file or directory with .ICO files
    #[arg(short = 'i', long = "input", value_name = "INPUT")]
    input_flag: Option<PathBuf>,

    /// Destination directory, created if missing
    #[arg(short = 'd', long = "destination", value_name = "DESTINATION")]
    destination_flag: Option<PathBuf>,

    /// Output file format: PNG, BMP, JPEG (JPG), GIF or TIFF (TIF)
    #[arg(short, long, default_value = "png")]
    format: OutputFormat,

    /// Number of files processed in parallel
    #[arg(short, long, default_value_t = 1)]
    threads: usize,

    /// More log output, repeat for more detail
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Default, Clone, Copy)]
struct Summary {
    files: usize,
    failed_files: usize,
    written: usize,
    failed: usize,
}

impl Summary {
    fn merge(self, other: Summary) -> Summary {
        Summary {
            files: self.files + other.files,
            failed_files: self.failed_files + other.failed_files,
            written: self.written + other.written,
            failed: self.failed + other.failed,
        }
    }

    fn success(&self) -> bool {
        self.failed_files == 0 && self.failed == 0
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

fn process_file(path: &Path, destination: &Path, format: OutputFormat) -> Summary {
    match extract_icon(path, destination, format) {
        Ok(report) => {
            for output in &report.outputs {
                println!("Extracted file: {}", output.display());
            }

            Summary {
                files: 1,
                failed_files: 0,
                written: report.written,
                failed: report.failed,
            }
        }
        Err(e) => {
            error!("{e}");

            Summary {
                files: 1,
                failed_files: 1,
                ..Default::default()
            }
        }
    }
}

fn collect_icons(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut entries: Vec<PathBuf> = Vec::new();

    for entry in fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))? {
        let entryw = entry?;
        let fpath = entryw.path();

        let meta = entryw.metadata()?;
        let fname = match fpath.file_name() {
            Some(s) => s.to_str().unwrap_or(""),
            None => continue,
        };

        if meta.is_dir() || fname.starts_with(".") {
            continue;
        }

        let is_icon = fpath
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(EXTENSION));

        if is_icon {
            entries.push(fpath);
        }
    }

    entries.sort();

    Ok(entries)
}

/// Files with the same stem write to the same output names, so they stay
/// together and in order on one worker.
fn group_by_stem(files: Vec<PathBuf>) -> Vec<Vec<PathBuf>> {
    let mut groups: BTreeMap<OsString, Vec<PathBuf>> = BTreeMap::new();

    for file in files {
        let stem = file.file_stem().unwrap_or_default().to_os_string();
        groups.entry(stem).or_default().push(file);
    }

    groups.into_values().collect()
}

/// A worker that panicked counts every file it was given as failed.
fn worker_summary(result: thread::Result<Summary>, files: usize) -> Summary {
    match result {
        Ok(x) => x,
        Err(_) => {
            error!("worker thread panicked, {files} file(s) not processed");

            Summary {
                files,
                failed_files: files,
                ..Default::default()
            }
        }
    }
}

fn process_files(
    files: Vec<PathBuf>,
    destination: &Path,
    format: OutputFormat,
    threads: usize,
) -> Summary {
    let groups = group_by_stem(files);
    let chunk_size = groups.len().div_ceil(threads.max(1)).max(1);

    thread::scope(|s| {
        let threads: Vec<_> = groups
            .chunks(chunk_size)
            .map(|chunk| {
                let count = chunk.iter().map(Vec::len).sum::<usize>();
                let handle = s.spawn(move || {
                    chunk
                        .iter()
                        .flatten()
                        .fold(Summary::default(), |summary, fpath| {
                            summary.merge(process_file(fpath, destination, format))
                        })
                });

                (count, handle)
            })
            .collect();

        threads
            .into_iter()
            .fold(Summary::default(), |pv, (count, thread)| {
                pv.merge(worker_summary(thread.join(), count))
            })
    })
}

fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    init_tracing(args.verbose);

    println!(
        "ico-converter {} - Extracts images from .ICO files",
        env!("CARGO_PKG_VERSION")
    );

    let Some(input) = args.input.or(args.input_flag) else {
        Args::command().print_help()?;
        return Ok(ExitCode::SUCCESS);
    };

    let destination = args.destination.or(args.destination_flag);

    let (files, destination) = match (input.is_file(), input.is_dir()) {
        (true, _) => {
            let destination = destination.unwrap_or_else(|| match input.parent() {
                Some(x) if !x.as_os_str().is_empty() => x.to_path_buf(),
                _ => PathBuf::from("."),
            });

            (vec![input], destination)
        }
        (_, true) => {
            let files = collect_icons(&input)?;
            let destination = destination.unwrap_or_else(|| input.clone());

            (files, destination)
        }
        _ => anyhow::bail!("{}: no such file or directory", input.display()),
    };

    fs::create_dir_all(&destination).with_context(|| {
        format!(
            "failed to create destination directory {}",
            destination.display()
        )
    })?;

    if files.is_empty() {
        println!("no .{EXTENSION} files found");
        return Ok(ExitCode::SUCCESS);
    }

    let summary = process_files(files, &destination, args.format, args.threads);

    println!(
        "{}/{} frames extracted from {} file(s)",
        summary.written,
        summary.written + summary.failed,
        summary.files
    );

    if summary.failed_files > 0 {
        println!("{} file(s) could not be read", summary.failed_files);
    }

    match summary.success() {
        true => Ok(ExitCode::SUCCESS),
        false => Ok(ExitCode::FAILURE),
    }
}
