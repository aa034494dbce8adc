use std::path::PathBuf;

use pingrab_engine::cancel::CancelToken;
use pingrab_engine::config::{load_config, OverwritePolicy};
use pingrab_engine::download::{DownloadOutcome, ProgressEvent, TaskState};
use pingrab_engine::grab::{self, DiscoveryStatus, Selection};
use pingrab_engine::journal::Journal;
use pingrab_engine::paths::GrabPaths;

fn main() -> Result<(), String> {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args.iter().any(|a| a == "-h" || a == "--help") {
        print_help();
        return Ok(());
    }

    let mut url: Option<String> = None;
    let mut out_dir: Option<PathBuf> = None;
    let mut base_dir: Option<PathBuf> = None;
    let mut concurrency: Option<usize> = None;
    let mut max_items: Option<usize> = None;
    let mut retries: Option<u32> = None;
    let mut timeout_secs: Option<u64> = None;
    let mut overwrite = false;
    let mut zip_path: Option<PathBuf> = None;
    let mut list_only = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--out" => {
                i += 1;
                out_dir = Some(PathBuf::from(flag_value(&args, i, "--out")?));
            }
            "--base-dir" => {
                i += 1;
                base_dir = Some(PathBuf::from(flag_value(&args, i, "--base-dir")?));
            }
            "--concurrency" => {
                i += 1;
                concurrency = Some(parse_number(&args, i, "--concurrency")?);
            }
            "--max-items" => {
                i += 1;
                max_items = Some(parse_number(&args, i, "--max-items")?);
            }
            "--retries" => {
                i += 1;
                retries = Some(parse_number(&args, i, "--retries")?);
            }
            "--timeout" => {
                i += 1;
                timeout_secs = Some(parse_number(&args, i, "--timeout")?);
            }
            "--zip" => {
                i += 1;
                zip_path = Some(PathBuf::from(flag_value(&args, i, "--zip")?));
            }
            "--overwrite" => overwrite = true,
            "--list" => list_only = true,
            other if other.starts_with("--") => {
                return Err(format!("unknown arg: {other} (try --help)"))
            }
            other => {
                if url.is_some() {
                    return Err(format!("unexpected extra argument: {other}"));
                }
                url = Some(other.to_string());
            }
        }
        i += 1;
    }

    let url = url.ok_or_else(|| "missing URL (try --help)".to_string())?;
    let base_dir = base_dir
        .or_else(GrabPaths::default_base_dir)
        .ok_or_else(|| "could not determine base dir; pass --base-dir".to_string())?;
    let paths = GrabPaths::new(base_dir);
    paths.ensure_dirs().map_err(|e| e.to_string())?;

    let mut config = load_config(&paths).map_err(|e| e.to_string())?;
    if let Some(v) = concurrency {
        config.download.concurrency = v;
    }
    if let Some(v) = max_items {
        config.crawl.max_items = v;
    }
    if let Some(v) = retries {
        config.fetch.max_retries = v;
        config.download.max_retries_per_item = v;
    }
    if let Some(v) = timeout_secs {
        config.fetch.timeout_secs = v;
        config.download.per_item_timeout_secs = v;
    }
    if overwrite {
        config.download.overwrite = OverwritePolicy::Overwrite;
    }
    let config = config.sanitized();

    let journal = Journal::open(&paths).unwrap_or_else(|_| Journal::disabled());
    let cancel = CancelToken::new();

    let discovery = grab::discover(
        &url,
        &config,
        grab::page_transport(&config.fetch),
        &cancel,
        &journal,
    )
    .map_err(|e| e.to_string())?;

    let status = discovery.status();
    println!(
        "{} {} ({} item(s), {} page(s), {:?})",
        discovery.reference.kind.as_str(),
        discovery.reference.canonical_url,
        discovery.descriptors.len(),
        discovery.pages_fetched,
        status
    );
    if let Some(err) = &discovery.error {
        println!("Warning: stopped early: {err}");
    }
    match status {
        DiscoveryStatus::Failed => return Err("no media could be collected".to_string()),
        DiscoveryStatus::ExtractionEmpty => {
            println!("No media found on this page.");
            return Ok(());
        }
        _ => {}
    }

    if list_only {
        for (idx, descriptor) in discovery.descriptors.iter().enumerate() {
            println!(
                "{idx:>4}  {:<7} {}",
                descriptor.media_type.as_str(),
                descriptor.source_url
            );
        }
        return Ok(());
    }

    let destination = out_dir.unwrap_or_else(|| discovery.default_destination(&paths));
    println!("Saving to {}", destination.to_string_lossy());

    let asset_transport = grab::asset_transport(&config.fetch, &config.download);
    let report = grab::download(
        &discovery.descriptors,
        &Selection::All,
        &destination,
        &config,
        asset_transport.as_ref(),
        &cancel,
        &journal,
        print_progress,
    );
    println!("{}", report.summary_line());
    for item in &report.items {
        if let DownloadOutcome::Failed { reason, attempts } = &item.outcome {
            println!("  failed ({attempts} attempt(s)): {} {reason}", item.descriptor.source_url);
        }
    }

    if let Some(zip_path) = zip_path {
        if report.succeeded == 0 {
            println!("Nothing to archive.");
        } else {
            match grab::bundle(&report, &zip_path, &journal) {
                Ok(summary) => println!(
                    "Archive: {} ({} file(s))",
                    summary.zip_path.to_string_lossy(),
                    summary.entries
                ),
                Err(err) => println!("Archive failed: {err}"),
            }
        }
    }

    if let Some(log) = journal.path() {
        println!("Log: {}", log.to_string_lossy());
    }
    Ok(())
}

fn print_progress(event: &ProgressEvent) {
    match event.state {
        TaskState::Succeeded | TaskState::Failed => println!(
            "[{}/{}] {:?} {}",
            event.completed, event.total, event.state, event.current_item
        ),
        TaskState::Pending | TaskState::InProgress => {}
    }
}

fn flag_value<'a>(args: &'a [String], i: usize, flag: &str) -> Result<&'a str, String> {
    args.get(i)
        .map(String::as_str)
        .ok_or_else(|| format!("{flag} requires a value"))
}

fn parse_number<T: std::str::FromStr>(args: &[String], i: usize, flag: &str) -> Result<T, String> {
    let raw = flag_value(args, i, flag)?;
    raw.parse::<T>()
        .map_err(|_| format!("{flag} expects a number, got {raw}"))
}

fn print_help() {
    println!(
        r#"pingrab

Downloads the images and videos behind a pin, board or profile URL.

Usage:
  cargo run --bin pingrab -- https://www.pinterest.com/pin/123456/
  cargo run --bin pingrab -- https://www.pinterest.com/user/board/ --zip board.zip
  cargo run --bin pingrab -- https://pin.it/AbCdEf --list

Options:
  --out <dir>          Download directory (default: <base-dir>/downloads/<kind>_<name>)
  --base-dir <path>    Override base dir (default: $PINGRAB_HOME or ~/.pingrab)
  --concurrency <n>    Simultaneous downloads
  --max-items <n>      Stop discovery after this many items
  --retries <n>        Retries for pages and downloads
  --timeout <secs>     Per-request timeout
  --overwrite          Replace files that already exist
  --zip <file>         Bundle downloaded files into a ZIP archive
  --list               Only list what was found
"#
    );
}
