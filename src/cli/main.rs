use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use photomark::batch::BatchResult;
use photomark::record::{MetadataPatch, MetadataRecord};
use photomark::{config, pipeline};

#[derive(Parser, Debug)]
#[command(
    name = "photomark",
    version,
    about = "Read and write keyword tags and star ratings embedded in image files"
)]
struct Cli {
    /// Image files or directories to process
    #[arg(value_name = "PATH")]
    paths: Vec<PathBuf>,

    /// Path to config file (default: photomark.json next to binary)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Initialize a default photomark.json and exit
    #[arg(long)]
    init: bool,

    /// Replace the keyword tags (comma separated; an empty value clears them)
    #[arg(long, value_name = "TAGS", value_delimiter = ',')]
    tags: Option<Vec<String>>,

    /// Set the star rating
    #[arg(long, value_name = "N", allow_negative_numbers = true)]
    rating: Option<i32>,

    /// Keep the .backup files instead of deleting them after a successful write
    #[arg(long)]
    keep_backup: bool,

    /// Output results as JSON
    #[arg(long)]
    json: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Handle --init
    if cli.init {
        let config = config::Config::default();
        let path = cli.config.as_deref();
        config.save(path)?;
        let save_path = match path {
            Some(p) => p.to_path_buf(),
            None => config::Config::config_path()?,
        };
        println!("Default config written to {}", save_path.display());
        return Ok(());
    }

    if cli.paths.is_empty() {
        anyhow::bail!("No input files or directories specified. Use --help for usage.");
    }

    let mut config = config::Config::load(cli.config.as_deref())?;
    if cli.keep_backup {
        config.backup.keep = true;
    }

    let images = pipeline::collect_images(&cli.paths);
    if images.is_empty() {
        anyhow::bail!("No supported image files found in the specified paths.");
    }
    log::info!("Found {} image(s)", images.len());

    let retire_wait =
        (!config.backup.keep).then(|| config.backup.retire_delay() + Duration::from_millis(100));
    let service = pipeline::MetadataService::new(config);

    let patch = MetadataPatch {
        tags: cli.tags.map(|tags| {
            tags.into_iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect()
        }),
        rating: cli.rating,
    };

    if patch.is_empty() {
        show_records(&service, &images, cli.json).await?;
        return Ok(());
    }

    let result = service.batch_write_metadata(&images, &patch, None).await?;
    let verb = if patch.tags.is_some() { "tag" } else { "rate" };

    if cli.json {
        print_batch_json(&result)?;
    }
    log::info!(
        "Done: {} succeeded, {} failed out of {} images",
        result.successful.len(),
        result.failed.len(),
        result.total_processed
    );

    // backup retirement runs on the runtime; let it finish before exiting
    if let Some(wait) = retire_wait.filter(|_| !result.successful.is_empty()) {
        log::debug!("Waiting {}ms for backup cleanup", wait.as_millis());
        tokio::time::sleep(wait).await;
    }

    if let Some(summary) = result.failure_summary(verb) {
        anyhow::bail!(summary);
    }
    Ok(())
}

async fn show_records(
    service: &pipeline::MetadataService,
    images: &[PathBuf],
    json: bool,
) -> Result<()> {
    let mut records = Vec::new();
    for path in images {
        let record = service.read_metadata(path).await;
        if !json {
            print_record(path, &record);
        }
        records.push((path, record));
    }

    if json {
        let json_results: Vec<serde_json::Value> = records
            .iter()
            .map(|(path, record)| {
                serde_json::json!({
                    "path": path.display().to_string(),
                    "metadata": record,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&json_results)?);
    }
    Ok(())
}

fn print_batch_json(result: &BatchResult) -> Result<()> {
    let json = serde_json::json!({
        "successful": result.successful.iter().map(|p| p.display().to_string()).collect::<Vec<_>>(),
        "failed": result.failed.iter().map(|f| serde_json::json!({
            "path": f.path.display().to_string(),
            "error": f.error.to_string(),
        })).collect::<Vec<_>>(),
        "total_processed": result.total_processed,
    });
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

// ANSI color codes
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";

/// Max width for the value column before wrapping.
const VAL_WIDTH: usize = 46;
/// Indent for continuation lines (tag column width + " : " = 25 chars + 2 leading spaces).
const INDENT: &str = "                           ";

/// Print one file's record, organized by section.
fn print_record(path: &std::path::Path, record: &MetadataRecord) {
    println!();
    println!("{BOLD}File:{RESET} {}", path.display());
    println!("{DIM}{}{RESET}", "═".repeat(72));

    if record.tags.is_empty() {
        print_row("Tags", "(none)");
    } else {
        print_row("Tags", &record.tags.join("; "));
    }
    print_row("Rating", &record.rating.to_string());
    print_row("DateCreated", &record.date_created.to_rfc3339());

    if let Some(camera) = &record.camera_info {
        println!();
        println!("  {BOLD}Camera{RESET}");
        println!("  {DIM}{}{RESET}", "─".repeat(70));
        let iso = camera.iso.map(|v| v.to_string());
        let fields: [(&str, Option<&str>); 7] = [
            ("Make", camera.make.as_deref()),
            ("Model", camera.model.as_deref()),
            ("Lens", camera.lens.as_deref()),
            ("Aperture", camera.aperture.as_deref()),
            ("ShutterSpeed", camera.shutter_speed.as_deref()),
            ("ISO", iso.as_deref()),
            ("FocalLength", camera.focal_length.as_deref()),
        ];
        for (tag, val) in fields {
            if let Some(v) = val {
                print_row(tag, v);
            }
        }
    }
    println!();
}

/// Print a single row in the display table.
fn print_row(tag: &str, val: &str) {
    let tag_col = format!("{:<22}", tag);
    let lines = wrap_text(val, VAL_WIDTH);
    for (i, line) in lines.iter().enumerate() {
        if i == 0 {
            println!("  {tag_col} : {line}");
        } else {
            println!("  {INDENT}{line}");
        }
    }
}

/// Wrap text at word boundaries to fit within max_width.
fn wrap_text(s: &str, max_width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current_line = String::new();

    for word in s.split_whitespace() {
        if current_line.is_empty() {
            current_line = word.to_string();
        } else if current_line.len() + 1 + word.len() <= max_width {
            current_line.push(' ');
            current_line.push_str(word);
        } else {
            lines.push(current_line);
            current_line = word.to_string();
        }
    }

    if !current_line.is_empty() {
        lines.push(current_line);
    }

    if lines.is_empty() {
        lines.push(s.to_string());
    }

    lines
}
