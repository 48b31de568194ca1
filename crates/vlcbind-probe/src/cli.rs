use std::time::Duration;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "vlcbind-probe", about = "Load LibVLC, play a media and log its events")]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/vlcbind.toml")]
    pub config: String,

    /// Media to play, e.g. file:///home/me/clip.mkv
    #[arg(long)]
    pub mrl: Option<String>,

    /// Renderer discovery service to browse (e.g. microdns)
    #[arg(long)]
    pub renderers: Option<String>,

    /// Seconds to wait for the media to end or renderers to show up
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,

    /// Minimum native log level forwarded: debug, notice, warning, error
    #[arg(long, default_value = "warning")]
    pub native_log: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub json_logs: bool,

    /// Run against the in-process simulator instead of LibVLC
    #[arg(long)]
    pub simulate: bool,
}

impl Args {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}
