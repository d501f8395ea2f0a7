//! Command-line parser.

use clap::{Parser, Subcommand};

/// Command-line interface for the vidhoard archiver.
#[derive(Parser)]
#[command(name = "vidhoard")]
#[command(about = "Archive videos and channel subscriptions locally")]
#[command(version)]
pub struct Cli {
    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the acquisition service (scheduler + workers) until interrupted
    Serve,

    /// Subscribe to a channel or playlist URL
    Subscribe {
        /// Channel or playlist URL
        url: String,

        /// Check schedule as a 5-field cron expression (default: hourly)
        #[arg(long)]
        cron: Option<String>,

        /// Quality preference: best, 1080p, 720p, 480p, 360p, worst
        #[arg(long)]
        quality: Option<String>,

        /// Only catalog newly discovered items, do not queue downloads
        #[arg(long)]
        no_auto_download: bool,
    },

    /// Queue a single video URL for archival
    Add {
        /// Video URL
        url: String,

        /// Quality preference: best, 1080p, 720p, 480p, 360p, worst
        #[arg(long)]
        quality: Option<String>,

        /// Only catalog the metadata, do not download the media
        #[arg(long)]
        no_download: bool,
    },

    /// Show queue, backoff and recent discovery activity
    Status,

    /// List subscriptions
    Subs,

    /// Reset a failed job to queued
    Retry {
        /// Job id as shown by `status`
        job_id: i64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parser_builds() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_subscribe_args() {
        let cli = Cli::parse_from([
            "vidhoard",
            "subscribe",
            "https://example.test/chan",
            "--cron",
            "*/30 * * * *",
            "--no-auto-download",
        ]);
        match cli.command {
            Some(Commands::Subscribe {
                url,
                cron,
                no_auto_download,
                ..
            }) => {
                assert_eq!(url, "https://example.test/chan");
                assert_eq!(cron.as_deref(), Some("*/30 * * * *"));
                assert!(no_auto_download);
            }
            _ => panic!("expected subscribe command"),
        }
    }
}
