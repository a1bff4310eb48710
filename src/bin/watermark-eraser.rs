use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use gemini_watermark_eraser::transfer::{declared_media_type, is_image_media_type};
use gemini_watermark_eraser::{Config, Error, ProcessingClient, Session};

#[derive(Parser)]
#[command(
    name = "watermark-eraser",
    about = "Remove AI watermarks by asking the Gemini image model to repaint them",
    version,
    after_help = "Requires API_KEY (or GEMINI_API_KEY) in the environment.\n\
                  Results are saved as watermark_removed_<name>.png next to the input\n\
                  unless --output is given."
)]
struct Cli {
    /// Input image file or directory
    input: PathBuf,

    /// Output directory (default: the input's directory)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Gemini model to use (overrides GEMINI_MODEL)
    #[arg(long)]
    model: Option<String>,

    /// API base URL (overrides GEMINI_BASE_URL)
    #[arg(long)]
    base_url: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all non-error output
    #[arg(short, long)]
    quiet: bool,
}

struct FileOutcome {
    path: PathBuf,
    saved: Option<PathBuf>,
    error: Option<Error>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Fatal: {e}");
            process::exit(1);
        }
    };
    if let Some(model) = &cli.model {
        config = config.with_model(model.as_str());
    }
    if let Some(base_url) = &cli.base_url {
        config = config.with_base_url(base_url.as_str());
    }

    let client = match ProcessingClient::new(Arc::new(config)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Fatal: {e}");
            process::exit(1);
        }
    };

    if !cli.input.exists() {
        eprintln!("Error: Input path does not exist: {}", cli.input.display());
        process::exit(1);
    }

    let inputs = if cli.input.is_dir() {
        match collect_images(&cli.input) {
            Ok(v) => v,
            Err(e) => {
                eprintln!("Error: Failed to read directory: {e}");
                process::exit(1);
            }
        }
    } else {
        vec![cli.input.clone()]
    };

    if !cli.quiet {
        eprintln!("Model: {}", client.config().model);
        eprintln!();
    }

    // One request in flight at a time.
    let mut results = Vec::with_capacity(inputs.len());
    for input in inputs {
        let output_dir = cli.output.clone().unwrap_or_else(|| {
            input
                .parent()
                .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
        });
        let outcome = process_one(&client, &input, &output_dir).await;
        print_outcome(&outcome, &cli);
        results.push(outcome);
    }

    let (fail_count, remote_fail_count) = count_failures(&results);
    let success_count = results.len() - fail_count;

    if results.len() > 1 && !cli.quiet {
        eprintln!();
        eprint!("[Summary] Processed: {success_count}");
        if fail_count > 0 {
            eprint!(", Failed: {fail_count}");
            if remote_fail_count > 0 {
                eprint!(" ({remote_fail_count} rejected by the API)");
            }
        }
        eprintln!(" (Total: {})", results.len());
    }

    if fail_count > 0 {
        process::exit(1);
    }
}

/// Total failures, and how many of them came from the remote side.
fn count_failures(results: &[FileOutcome]) -> (usize, usize) {
    results
        .iter()
        .filter_map(|r| r.error.as_ref())
        .fold((0, 0), |(all, remote), e| {
            (all + 1, remote + usize::from(e.is_remote()))
        })
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn collect_images(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| {
            entry
                .map_err(|e| tracing::warn!(dir = %dir.display(), error = %e, "skipping unreadable entry"))
                .ok()
        })
        .filter(|e| match e.file_type() {
            Ok(ft) => ft.is_file(),
            Err(err) => {
                tracing::warn!(path = %e.path().display(), error = %err, "skipping entry of unknown type");
                false
            }
        })
        .map(|e| e.path())
        .filter(|p| is_image_media_type(&declared_media_type(p)))
        .collect();
    paths.sort();
    Ok(paths)
}

async fn run_session(
    client: &ProcessingClient,
    input: &Path,
    output_dir: &Path,
) -> gemini_watermark_eraser::Result<PathBuf> {
    let mut session = Session::new();
    session.upload(input).await?;
    session.process(client).await?;
    session.download(output_dir).await
}

async fn process_one(client: &ProcessingClient, input: &Path, output_dir: &Path) -> FileOutcome {
    match run_session(client, input, output_dir).await {
        Ok(saved) => FileOutcome {
            path: input.to_path_buf(),
            saved: Some(saved),
            error: None,
        },
        Err(e) => FileOutcome {
            path: input.to_path_buf(),
            saved: None,
            error: Some(e),
        },
    }
}

fn print_outcome(outcome: &FileOutcome, cli: &Cli) {
    let filename = outcome.path.file_name().map_or_else(
        || outcome.path.display().to_string(),
        |f| f.to_string_lossy().to_string(),
    );

    match (&outcome.error, &outcome.saved) {
        (Some(e), _) => {
            eprintln!("[FAIL] {filename}: {}", e.user_message());
            if cli.verbose {
                eprintln!("  -> {e}");
            }
        }
        (None, Some(saved)) if !cli.quiet => {
            eprintln!("[OK] {filename}");
            if cli.verbose {
                eprintln!("  -> {}", saved.display());
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(error: Option<Error>) -> FileOutcome {
        FileOutcome {
            path: PathBuf::from("a.png"),
            saved: None,
            error,
        }
    }

    #[test]
    fn failures_are_split_by_origin() {
        let results = vec![
            outcome(None),
            outcome(Some(Error::ProcessingFailed)),
            outcome(Some(Error::NoImageReturned)),
            outcome(Some(Error::InvalidInput {
                media_type: "text/plain".to_string(),
            })),
        ];
        assert_eq!(count_failures(&results), (3, 2));
        assert_eq!(count_failures(&[]), (0, 0));
    }

    #[test]
    fn collect_images_keeps_sorted_image_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.png"), b"x").unwrap();
        std::fs::write(dir.path().join("a.jpg"), b"x").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        std::fs::create_dir(dir.path().join("nested.png")).unwrap();

        let found = collect_images(dir.path()).unwrap();
        assert_eq!(
            found,
            vec![dir.path().join("a.jpg"), dir.path().join("b.png")]
        );
    }
}
