use clap::Parser;
use std::path::PathBuf;

/// Automated news broadcast player
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to a broadcast manifest JSON file - omit to fetch one from the server
    #[arg(value_name = "MANIFEST")]
    pub manifest: Option<PathBuf>,

    /// Broadcast server base URL (manifest and media source when no file is given)
    #[arg(
        short = 's',
        long = "server",
        value_name = "URL",
        default_value = "http://localhost:8080"
    )]
    pub server: String,

    /// Media root directory for file-based manifests (default: the manifest's directory)
    #[arg(short = 'm', long = "media-root", value_name = "DIR")]
    pub media_root: Option<PathBuf>,

    /// Start playback immediately
    #[arg(short = 'a', long = "autoplay")]
    pub autoplay: bool,

    /// News voice volume (0-100)
    #[arg(long = "news-volume", value_name = "PERCENT", default_value = "100")]
    pub news_volume: u8,

    /// Video audio volume (0-100)
    #[arg(long = "video-volume", value_name = "PERCENT", default_value = "60")]
    pub video_volume: u8,

    /// Master volume (0-100)
    #[arg(long = "master-volume", value_name = "PERCENT", default_value = "100")]
    pub master_volume: u8,

    /// Engine configuration file (JSON, partial overrides allowed)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Show the debug overlay in the transport line
    #[arg(short = 'd', long = "debug")]
    pub debug: bool,

    /// Enable debug logging to file (default: nexcast.log)
    #[arg(short = 'l', long = "log", value_name = "LOG_FILE")]
    pub log_file: Option<Option<PathBuf>>,

    /// Increase logging verbosity (default: warn, -v: info, -vv: debug, -vvv+: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbosity: u8,
}
