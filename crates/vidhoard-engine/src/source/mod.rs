//! Content source adapters.
//!
//! Implementations of [`vidhoard_core::ContentSourcePort`]. Production uses
//! the yt-dlp subprocess adapter; tests substitute scripted fakes.

mod ytdlp;

pub use ytdlp::YtDlpSource;
