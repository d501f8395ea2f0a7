//! Quality preferences and their mapping to downloader format selectors.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A user-facing quality preference for downloads.
///
/// Maps onto a yt-dlp format selector via [`QualityPreference::format_selector`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityPreference {
    /// Best available quality.
    Best,
    /// Up to 1080p.
    #[default]
    #[serde(rename = "1080p")]
    P1080,
    /// Up to 720p.
    #[serde(rename = "720p")]
    P720,
    /// Up to 480p.
    #[serde(rename = "480p")]
    P480,
    /// Up to 360p.
    #[serde(rename = "360p")]
    P360,
    /// Worst available quality.
    Worst,
}

impl QualityPreference {
    /// Canonical string representation (also the database encoding).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Best => "best",
            Self::P1080 => "1080p",
            Self::P720 => "720p",
            Self::P480 => "480p",
            Self::P360 => "360p",
            Self::Worst => "worst",
        }
    }

    /// Parse from the canonical string; unknown values fall back to the default.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }

    /// The yt-dlp format selector expression for this preference.
    #[must_use]
    pub const fn format_selector(&self) -> &'static str {
        match self {
            Self::Best => "best",
            Self::P1080 => "bestvideo[height<=?1080]+bestaudio/best",
            Self::P720 => "bestvideo[height<=?720]+bestaudio/best",
            Self::P480 => "bestvideo[height<=?480]+bestaudio/best",
            Self::P360 => "bestvideo[height<=?360]+bestaudio/best",
            Self::Worst => "worst",
        }
    }
}

impl fmt::Display for QualityPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for QualityPreference {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "best" => Ok(Self::Best),
            "1080p" | "1080" => Ok(Self::P1080),
            "720p" | "720" => Ok(Self::P720),
            "480p" | "480" => Ok(Self::P480),
            "360p" | "360" => Ok(Self::P360),
            "worst" => Ok(Self::Worst),
            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        for q in [
            QualityPreference::Best,
            QualityPreference::P1080,
            QualityPreference::P720,
            QualityPreference::P480,
            QualityPreference::P360,
            QualityPreference::Worst,
        ] {
            assert_eq!(QualityPreference::parse(q.as_str()), q);
        }
    }

    #[test]
    fn test_parse_falls_back_to_default() {
        assert_eq!(QualityPreference::parse("4k"), QualityPreference::P1080);
    }

    #[test]
    fn test_format_selector() {
        assert_eq!(
            QualityPreference::P720.format_selector(),
            "bestvideo[height<=?720]+bestaudio/best"
        );
        assert_eq!(QualityPreference::Best.format_selector(), "best");
    }
}
