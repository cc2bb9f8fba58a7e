//! CLI entry point for rushia-dl.

use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use rushia_dl::downloader::validation;
use rushia_dl::engine::{self, EngineRequest, MediaEngine};
use rushia_dl::progress::ProgressEvent;
use rushia_dl::{Config, MediaDownloader, OutputFormat, Result, run_with_shutdown};
use tracing::{debug, error, info, warn};

mod cli;

use cli::{Args, Command, FetchArgs, ServeArgs};

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    debug!(?args, "CLI arguments parsed");

    let result = match load_config(args.config.as_deref()) {
        Ok(config) => match args.command {
            Command::Serve(serve) => run_serve(config, serve).await,
            Command::Fetch(fetch) => run_fetch(config, fetch).await,
        },
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "rushia-dl failed");
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => {
            info!(path = %path.display(), "Loading configuration");
            Config::load(path)
        }
        None => Ok(Config::default()),
    }
}

async fn run_serve(mut config: Config, args: ServeArgs) -> Result<()> {
    if let Some(bind) = args.bind {
        config.server.api.bind_address = bind;
    }
    if let Some(dir) = args.download_dir {
        config.download.download_dir = dir;
    }
    if let Some(max) = args.max_concurrent {
        config.download.max_concurrent_downloads = usize::from(max);
    }

    let downloader = MediaDownloader::new(config).await?;
    run_with_shutdown(downloader).await
}

/// Download each URL in turn; a failed URL is logged and skipped
async fn run_fetch(mut config: Config, args: FetchArgs) -> Result<()> {
    if let Some(dir) = args.download_dir {
        config.download.download_dir = dir;
    }
    config.validate()?;

    let urls = match (&args.url, &args.path) {
        (Some(url), _) => vec![url.clone()],
        (None, Some(path)) => {
            let content = tokio::fs::read_to_string(path).await.map_err(|e| {
                rushia_dl::Error::InvalidInput(format!(
                    "cannot read URL list '{}': {}",
                    path.display(),
                    e
                ))
            })?;
            content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect()
        }
        (None, None) => Vec::new(),
    };

    if let Some(cookie) = &args.cookie {
        if !cookie.is_file() {
            return Err(rushia_dl::Error::InvalidInput(format!(
                "cookie file '{}' not found",
                cookie.display()
            )));
        }
        info!(cookie = %cookie.display(), "Using cookie file");
    }

    tokio::fs::create_dir_all(&config.download.download_dir).await?;
    let engine = engine::select(&config.engine);
    let format = OutputFormat::from(args.format);
    let total = urls.len();
    let mut failed = 0usize;

    info!(urls = total, format = %format, "Processing URLs");

    for (index, raw) in urls.iter().enumerate() {
        info!(item = index + 1, total, url = %raw, "Downloading");

        let url = match validation::validate_url(raw, &config.download.allowed_hosts) {
            Ok(url) => url,
            Err(e) => {
                warn!(url = %raw, error = %e, "Skipping URL");
                failed += 1;
                continue;
            }
        };

        let (tx, mut rx) = tokio::sync::mpsc::channel(64);
        let reporter = tokio::spawn(async move {
            let mut last_logged = -10.0;
            while let Some(event) = rx.recv().await {
                match event {
                    ProgressEvent::Downloading(progress) => {
                        if let Some(percent) = progress.percent()
                            && percent - last_logged >= 10.0
                        {
                            info!("Progress {percent:.1}%");
                            last_logged = percent;
                        }
                    }
                    ProgressEvent::Finished => info!("Download finished, processing"),
                    ProgressEvent::PostprocessStarted | ProgressEvent::PostprocessFinished => {
                        debug!(?event, "Post-processing")
                    }
                }
            }
        });

        let request = EngineRequest {
            url,
            format,
            output_dir: config.download.download_dir.clone(),
            credential: args.cookie.clone(),
        };
        let result = engine.download(&request, tx).await;
        if let Err(e) = reporter.await {
            warn!(error = %e, "progress reporter failed");
        }

        match result {
            Ok(output) => info!(title = %output.title, id = %output.id, "Downloaded"),
            Err(e) => {
                let classified = rushia_dl::classify(&e.message);
                warn!(
                    url = %raw,
                    category = ?classified.category,
                    error = %classified.message,
                    "Download failed, continuing"
                );
                failed += 1;
            }
        }
    }

    info!(total, failed, completed = total - failed, "Batch complete");
    Ok(())
}
