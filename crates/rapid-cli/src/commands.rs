//! Subcommands.

use clap::Subcommand;

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP server (sync surface and event stream)
    Serve {
        /// Port to listen on
        #[arg(short, long, env = "RAPID_PORT", default_value_t = rapid_axum::bootstrap::DEFAULT_PORT)]
        port: u16,
        /// Allowed CORS origins (all origins when omitted)
        #[arg(long = "allow-origin")]
        allow_origins: Vec<String>,
    },

    /// Download a URL in the foreground with per-chunk progress
    ///
    /// Ctrl-C pauses the download; it can be resumed later with `rapid resume`.
    Download {
        /// Source URL
        url: String,
        /// Provider name (defaults to "direct")
        #[arg(short, long)]
        provider: Option<String>,
        /// Number of chunks to split the transfer into
        #[arg(short, long)]
        chunks: Option<u32>,
        /// Cookie to send, as NAME=VALUE (repeatable)
        #[arg(long = "cookie", value_name = "NAME=VALUE")]
        cookies: Vec<String>,
        /// User-agent override
        #[arg(long)]
        user_agent: Option<String>,
    },

    /// Resume a paused or failed download in the foreground
    Resume {
        /// Download id
        id: String,
    },

    /// List persisted downloads
    List {
        /// Page to show (1-based)
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
}
