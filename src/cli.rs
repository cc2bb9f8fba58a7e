//! CLI argument definitions using clap derive macros.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use rushia_dl::OutputFormat;

/// Download audio and video from YouTube.
///
/// `serve` runs the HTTP service; `fetch` downloads directly from the
/// command line.
#[derive(Parser, Debug)]
#[command(name = "rushia-dl")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file (JSON)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// What to run
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP service until SIGINT/SIGTERM
    Serve(ServeArgs),
    /// Download one URL or a list of URLs sequentially
    Fetch(FetchArgs),
}

/// Options for `serve`
#[derive(ClapArgs, Debug)]
pub struct ServeArgs {
    /// Address to bind the API to
    #[arg(short, long)]
    pub bind: Option<SocketAddr>,

    /// Directory for finished files
    #[arg(short, long)]
    pub download_dir: Option<PathBuf>,

    /// Maximum concurrent downloads (1-100)
    #[arg(short = 'c', long, value_parser = clap::value_parser!(u16).range(1..=100))]
    pub max_concurrent: Option<u16>,
}

/// Options for `fetch`
#[derive(ClapArgs, Debug)]
pub struct FetchArgs {
    /// URL of the video to download
    #[arg(short, long, conflicts_with = "path", required_unless_present = "path")]
    pub url: Option<String>,

    /// Text file with one URL per line
    #[arg(short, long)]
    pub path: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum)]
    pub format: FormatArg,

    /// Cookie file for members-only or age-restricted content
    #[arg(short = 'k', long)]
    pub cookie: Option<PathBuf>,

    /// Directory for finished files
    #[arg(short, long)]
    pub download_dir: Option<PathBuf>,
}

/// Output format choices on the command line
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum FormatArg {
    /// Audio only
    #[value(alias = "audio")]
    M4a,
    /// Video with audio
    #[value(alias = "video")]
    Mp4,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::M4a => OutputFormat::M4a,
            FormatArg::Mp4 => OutputFormat::Mp4,
        }
    }
}
