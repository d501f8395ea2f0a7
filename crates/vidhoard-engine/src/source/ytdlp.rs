//! yt-dlp content source adapter.
//!
//! Spawns the `yt-dlp` binary for listings, probes and fetches. Listings use
//! `--flat-playlist --dump-json` (one JSON object per stdout line); fetches
//! parse `--newline` progress lines and poll the cancel flag between them,
//! killing the child when cancellation is requested. stderr is classified
//! into the [`SourceError`] taxonomy after a non-zero exit.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;

use vidhoard_core::{
    CancelFlag, ContentSourcePort, ContentType, FetchRequest, FetchedMedia, ProgressCallback,
    SourceError, SourceInfo, SourceItem, SubscriptionKind, VideoProbe,
};

/// How often the fetch loop re-checks the cancel flag while the child is
/// producing no output.
const CANCEL_POLL: Duration = Duration::from_millis(250);

/// Content source adapter backed by the `yt-dlp` binary.
pub struct YtDlpSource {
    binary: PathBuf,
}

impl YtDlpSource {
    /// Locate `yt-dlp`, preferring an explicit path over a `$PATH` lookup.
    pub fn new(explicit: Option<PathBuf>) -> Result<Self, SourceError> {
        let binary = match explicit {
            Some(path) => path,
            None => which::which("yt-dlp")
                .map_err(|e| SourceError::io(format!("yt-dlp not found on PATH: {e}")))?,
        };
        tracing::debug!(binary = %binary.display(), "using yt-dlp");
        Ok(Self { binary })
    }

    /// Run yt-dlp to completion and parse its stdout as JSON lines.
    async fn run_json_lines(&self, args: &[&str]) -> Result<Vec<Value>, SourceError> {
        let output = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| SourceError::io(format!("spawning yt-dlp: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_stderr(&stderr));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut values = Vec::new();
        for line in stdout.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<Value>(line) {
                Ok(value) => values.push(value),
                Err(e) => tracing::debug!(error = %e, "skipping unparseable yt-dlp line"),
            }
        }
        Ok(values)
    }
}

#[async_trait]
impl ContentSourcePort for YtDlpSource {
    async fn list_recent_items(
        &self,
        source_url: &str,
        max_items: u32,
    ) -> Result<Vec<SourceItem>, SourceError> {
        let end = max_items.max(1).to_string();
        let values = self
            .run_json_lines(&[
                "--flat-playlist",
                "--dump-json",
                "--playlist-end",
                &end,
                "--no-warnings",
                source_url,
            ])
            .await?;

        Ok(values.iter().filter_map(flat_entry_to_item).collect())
    }

    async fn probe_source(&self, url: &str) -> Result<SourceInfo, SourceError> {
        let values = self
            .run_json_lines(&[
                "--flat-playlist",
                "--dump-single-json",
                "--playlist-end",
                "1",
                "--no-warnings",
                url,
            ])
            .await?;

        let value = values
            .into_iter()
            .next()
            .ok_or_else(|| SourceError::not_found(format!("no metadata for {url}")))?;
        parse_source_info(&value, url)
    }

    async fn probe_video(&self, url: &str) -> Result<VideoProbe, SourceError> {
        let values = self
            .run_json_lines(&["--dump-json", "--no-playlist", "--no-warnings", url])
            .await?;

        let value = values
            .into_iter()
            .next()
            .ok_or_else(|| SourceError::not_found(format!("no metadata for {url}")))?;
        parse_video_probe(&value)
    }

    async fn fetch_item(
        &self,
        request: &FetchRequest,
        on_progress: ProgressCallback<'_>,
        cancel: &CancelFlag,
    ) -> Result<FetchedMedia, SourceError> {
        if cancel.is_cancelled() {
            return Err(SourceError::Cancelled);
        }

        let outtmpl = request
            .destination
            .join(format!("{}.%(ext)s", request.external_id))
            .to_string_lossy()
            .into_owned();
        let url = format!("https://www.youtube.com/watch?v={}", request.external_id);

        let mut cmd = Command::new(&self.binary);
        cmd.arg("-f")
            .arg(request.quality.format_selector())
            .arg("-o")
            .arg(&outtmpl)
            .arg("--newline")
            .arg("--no-playlist")
            .arg("--no-warnings");
        if !request.subtitle_languages.is_empty() {
            cmd.arg("--write-subs")
                .arg("--sub-langs")
                .arg(request.subtitle_languages.join(","));
        }
        cmd.arg(&url);

        let mut child = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| SourceError::io(format!("spawning yt-dlp: {e}")))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SourceError::io("yt-dlp stdout unavailable"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| SourceError::io("yt-dlp stderr unavailable"))?;

        // Drain stderr concurrently for classification after exit
        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            let _ = stderr.read_to_string(&mut buf).await;
            buf
        });

        let mut lines = BufReader::new(stdout).lines();
        let mut poll = tokio::time::interval(CANCEL_POLL);
        loop {
            if cancel.is_cancelled() {
                let _ = child.kill().await;
                stderr_task.abort();
                return Err(SourceError::Cancelled);
            }

            tokio::select! {
                line = lines.next_line() => match line {
                    Ok(Some(line)) => {
                        if let Some(percent) = parse_progress_line(&line) {
                            on_progress(percent);
                        }
                    }
                    // stdout closed, the child is exiting
                    Ok(None) => break,
                    Err(e) => {
                        let _ = child.kill().await;
                        stderr_task.abort();
                        return Err(SourceError::io(format!("reading yt-dlp output: {e}")));
                    }
                },
                _ = poll.tick() => {}
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| SourceError::io(format!("waiting for yt-dlp: {e}")))?;
        let stderr_text = stderr_task.await.unwrap_or_default();

        if cancel.is_cancelled() {
            return Err(SourceError::Cancelled);
        }
        if !status.success() {
            return Err(classify_stderr(&stderr_text));
        }

        let media = find_media_file(&request.destination, &request.external_id)?;
        on_progress(100.0);
        Ok(media)
    }
}

/// Map one flat-playlist entry to a listing item. Entries without an id are
/// dropped (deleted/region-blocked stubs).
fn flat_entry_to_item(value: &Value) -> Option<SourceItem> {
    let external_id = value.get("id")?.as_str()?.to_string();
    let title = value
        .get("title")
        .and_then(Value::as_str)
        .unwrap_or("(untitled)")
        .to_string();

    let published_at = value
        .get("timestamp")
        .and_then(Value::as_i64)
        .and_then(|ts| DateTime::from_timestamp(ts, 0))
        .or_else(|| {
            value
                .get("upload_date")
                .and_then(Value::as_str)
                .and_then(parse_upload_date)
        });

    Some(SourceItem {
        external_id,
        title,
        content_type: classify_entry(value),
        published_at,
    })
}

/// Item category from a yt-dlp entry: live status first, then the shorts
/// URL marker, otherwise an ordinary video.
fn classify_entry(value: &Value) -> ContentType {
    if let Some("is_live" | "was_live" | "post_live") =
        value.get("live_status").and_then(Value::as_str)
    {
        return ContentType::Live;
    }

    let url = value
        .get("url")
        .and_then(Value::as_str)
        .or_else(|| value.get("webpage_url").and_then(Value::as_str))
        .unwrap_or("");
    if url.contains("/shorts/") {
        return ContentType::Short;
    }

    ContentType::Video
}

fn parse_source_info(value: &Value, url: &str) -> Result<SourceInfo, SourceError> {
    let channel_external_id = value
        .get("channel_id")
        .and_then(Value::as_str)
        .or_else(|| value.get("uploader_id").and_then(Value::as_str))
        .or_else(|| value.get("id").and_then(Value::as_str))
        .ok_or_else(|| SourceError::fetch(format!("no channel identity in metadata for {url}")))?
        .to_string();

    let channel_name = value
        .get("channel")
        .and_then(Value::as_str)
        .or_else(|| value.get("uploader").and_then(Value::as_str))
        .or_else(|| value.get("title").and_then(Value::as_str))
        .unwrap_or(&channel_external_id)
        .to_string();

    let kind = if url.contains("list=") || url.contains("/playlist") {
        SubscriptionKind::Playlist
    } else {
        SubscriptionKind::Channel
    };

    Ok(SourceInfo {
        channel_external_id,
        channel_name,
        description: value
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string),
        subscriber_count: value.get("channel_follower_count").and_then(Value::as_i64),
        kind,
    })
}

fn parse_video_probe(value: &Value) -> Result<VideoProbe, SourceError> {
    let external_id = value
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| SourceError::fetch("yt-dlp metadata is missing the video id"))?
        .to_string();

    let webpage_url = value
        .get("webpage_url")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let channel = parse_source_info(value, webpage_url)?;

    Ok(VideoProbe {
        external_id,
        title: value
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or("(untitled)")
            .to_string(),
        description: value
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string),
        duration_secs: value
            .get("duration")
            .and_then(Value::as_f64)
            .map(|d| d as i64),
        upload_date: value
            .get("timestamp")
            .and_then(Value::as_i64)
            .and_then(|ts| DateTime::from_timestamp(ts, 0))
            .or_else(|| {
                value
                    .get("upload_date")
                    .and_then(Value::as_str)
                    .and_then(parse_upload_date)
            }),
        view_count: value.get("view_count").and_then(Value::as_i64),
        like_count: value.get("like_count").and_then(Value::as_i64),
        content_type: classify_entry(value),
        channel,
    })
}

/// yt-dlp's `upload_date` is a bare `YYYYMMDD` string.
fn parse_upload_date(s: &str) -> Option<DateTime<Utc>> {
    NaiveDate::parse_from_str(s, "%Y%m%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Extract the percentage from a `--newline` progress line, e.g.
/// `[download]  42.3% of 10.00MiB at 1.00MiB/s ETA 00:05`.
fn parse_progress_line(line: &str) -> Option<f64> {
    let rest = line.strip_prefix("[download]")?.trim_start();
    let token = rest.split_whitespace().next()?.strip_suffix('%')?;
    let value: f64 = token.parse().ok()?;
    (0.0..=100.0).contains(&value).then_some(value)
}

/// Classify a failed run's stderr into the source error taxonomy.
fn classify_stderr(stderr: &str) -> SourceError {
    let lower = stderr.to_lowercase();
    let reason = stderr
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("yt-dlp failed")
        .trim()
        .to_string();

    if lower.contains("429")
        || lower.contains("rate limit")
        || lower.contains("too many requests")
    {
        SourceError::RateLimited
    } else if lower.contains("video unavailable")
        || lower.contains("private video")
        || lower.contains("does not exist")
        || lower.contains("not found")
        || lower.contains("404")
        || lower.contains("has been removed")
        || lower.contains("account associated with this video has been terminated")
    {
        SourceError::not_found(reason)
    } else if lower.contains("timed out")
        || lower.contains("timeout")
        || lower.contains("connection")
        || lower.contains("network")
        || lower.contains("temporary failure")
        || lower.contains("getaddrinfo")
        || lower.contains("unable to download webpage")
    {
        SourceError::unavailable(reason)
    } else {
        SourceError::fetch(reason)
    }
}

/// Find the fetched media file: the largest file in the destination whose
/// stem leads with the external id, excluding subtitles, partials and
/// metadata sidecars.
fn find_media_file(destination: &Path, external_id: &str) -> Result<FetchedMedia, SourceError> {
    const NON_MEDIA: &[&str] = &["part", "ytdl", "vtt", "srt", "json", "jpg", "png", "webp"];

    let entries = std::fs::read_dir(destination)
        .map_err(|e| SourceError::io(format!("reading {}: {e}", destination.display())))?;

    let mut best: Option<(PathBuf, u64)> = None;
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let leads_with_id = path
            .file_stem()
            .and_then(|s| s.to_str())
            .is_some_and(|stem| stem == external_id || stem.starts_with(&format!("{external_id}.")));
        if !leads_with_id {
            continue;
        }
        let is_media = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| !NON_MEDIA.contains(&ext.to_lowercase().as_str()));
        if !is_media {
            continue;
        }

        let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
        if best.as_ref().is_none_or(|(_, largest)| size > *largest) {
            best = Some((path, size));
        }
    }

    best.map(|(file_path, file_size)| FetchedMedia {
        file_path,
        file_size,
    })
    .ok_or_else(|| SourceError::fetch(format!("yt-dlp produced no media file for {external_id}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_progress_line() {
        assert_eq!(
            parse_progress_line("[download]  42.3% of 10.00MiB at 1.00MiB/s ETA 00:05"),
            Some(42.3)
        );
        assert_eq!(parse_progress_line("[download] 100% of 10.00MiB"), Some(100.0));
        assert_eq!(parse_progress_line("[download] Destination: /tmp/x.mp4"), None);
        assert_eq!(parse_progress_line("[info] extracting"), None);
        assert_eq!(parse_progress_line("[download] 120.0% of unknown"), None);
    }

    #[test]
    fn test_classify_stderr() {
        assert_eq!(
            classify_stderr("ERROR: HTTP Error 429: Too Many Requests"),
            SourceError::RateLimited
        );
        assert!(matches!(
            classify_stderr("ERROR: [youtube] abc: Video unavailable"),
            SourceError::NotFound { .. }
        ));
        assert!(matches!(
            classify_stderr("ERROR: unable to download webpage (read timed out)"),
            SourceError::Unavailable { .. }
        ));
        assert!(matches!(
            classify_stderr("ERROR: ffmpeg exited with code 1"),
            SourceError::Fetch { .. }
        ));
    }

    #[test]
    fn test_classify_stderr_transient_split_matches_taxonomy() {
        assert!(classify_stderr("Connection reset by peer").is_transient());
        assert!(!classify_stderr("ERROR: Private video").is_transient());
    }

    #[test]
    fn test_parse_upload_date() {
        let parsed = parse_upload_date("20240131").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2024-01-31T00:00:00+00:00");
        assert!(parse_upload_date("not-a-date").is_none());
    }

    #[test]
    fn test_flat_entry_mapping() {
        let entry = json!({
            "id": "abc123",
            "title": "A Video",
            "url": "https://www.youtube.com/watch?v=abc123",
            "upload_date": "20240115",
        });
        let item = flat_entry_to_item(&entry).unwrap();
        assert_eq!(item.external_id, "abc123");
        assert_eq!(item.title, "A Video");
        assert_eq!(item.content_type, ContentType::Video);
        assert!(item.published_at.is_some());

        // Entries without an id are dropped
        assert!(flat_entry_to_item(&json!({"title": "ghost"})).is_none());
    }

    #[test]
    fn test_classify_entry_kinds() {
        assert_eq!(
            classify_entry(&json!({"live_status": "is_live"})),
            ContentType::Live
        );
        assert_eq!(
            classify_entry(&json!({"url": "https://www.youtube.com/shorts/xyz"})),
            ContentType::Short
        );
        assert_eq!(
            classify_entry(&json!({"url": "https://www.youtube.com/watch?v=xyz"})),
            ContentType::Video
        );
    }

    #[test]
    fn test_parse_source_info_kind_from_url() {
        let value = json!({
            "channel_id": "UC123",
            "channel": "Some Channel",
            "channel_follower_count": 42,
        });

        let info =
            parse_source_info(&value, "https://www.youtube.com/playlist?list=PL1").unwrap();
        assert_eq!(info.kind, SubscriptionKind::Playlist);
        assert_eq!(info.channel_external_id, "UC123");
        assert_eq!(info.subscriber_count, Some(42));

        let info = parse_source_info(&value, "https://www.youtube.com/@somechannel").unwrap();
        assert_eq!(info.kind, SubscriptionKind::Channel);
    }

    #[test]
    fn test_find_media_file_prefers_media_over_sidecars() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("abc123.mp4"), vec![0u8; 1024]).unwrap();
        std::fs::write(dir.path().join("abc123.en.vtt"), b"subs").unwrap();
        std::fs::write(dir.path().join("abc123.mp4.part"), b"partial").unwrap();
        std::fs::write(dir.path().join("other.mp4"), vec![0u8; 4096]).unwrap();

        let media = find_media_file(dir.path(), "abc123").unwrap();
        assert_eq!(media.file_path, dir.path().join("abc123.mp4"));
        assert_eq!(media.file_size, 1024);
    }

    #[test]
    fn test_find_media_file_empty_dir_is_fetch_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            find_media_file(dir.path(), "abc123"),
            Err(SourceError::Fetch { .. })
        ));
    }
}
