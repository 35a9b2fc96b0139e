//! Subprocess resolver: media extractor for metadata, decoder for PCM
//!
//! The extractor (`yt-dlp` by default) is run to completion with
//! `tokio::process` and its JSON report parsed. The decoder (`ffmpeg`) is
//! then spawned with a blocking `std::process` pipe, since the sink reads it
//! from its own thread.

use crate::error::{Error, Result};
use crate::traits::{AudioStream, Resolved, Resolver};
use async_trait::async_trait;
use groupplay_common::config::{PlaybackConfig, ResolverConfig};
use serde::Deserialize;
use std::io::Read;
use std::process::{Child, ChildStdout, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::process::Command;
use tracing::{debug, info, warn};

const EXTRACTOR_ARGS: &[&str] = &[
    "-j",
    "--no-playlist",
    "-f",
    "bestaudio/best",
    "--default-search",
    "auto",
];

/// What the extractor reported for one reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedMedia {
    pub title: String,
    /// Direct media URL handed to the decoder
    pub stream_url: String,
    /// Canonical page URL, if reported
    pub page_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExtractorInfo {
    title: Option<String>,
    url: Option<String>,
    webpage_url: Option<String>,
    #[serde(default)]
    entries: Vec<ExtractorInfo>,
}

/// Parse the extractor's JSON output.
///
/// Search and playlist results carry `entries`; the first entry is used.
/// Line-delimited output (one object per entry) uses the first line.
pub fn parse_extractor_output(output: &str) -> Result<ExtractedMedia> {
    let line = output
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .ok_or_else(|| Error::Resolution("extractor returned no output".to_string()))?;

    let mut info: ExtractorInfo = serde_json::from_str(line)
        .map_err(|e| Error::Resolution(format!("unreadable extractor output: {}", e)))?;

    if info.url.is_none() && !info.entries.is_empty() {
        info = info.entries.swap_remove(0);
    }

    let stream_url = info
        .url
        .ok_or_else(|| Error::Resolution("no playable stream found".to_string()))?;

    Ok(ExtractedMedia {
        title: info.title.unwrap_or_else(|| "Unknown title".to_string()),
        stream_url,
        page_url: info.webpage_url,
    })
}

/// Resolver that shells out to the extractor and decoder programs
pub struct ProcessResolver {
    config: ResolverConfig,
    playback: PlaybackConfig,
}

impl ProcessResolver {
    pub fn new(config: ResolverConfig, playback: PlaybackConfig) -> Self {
        Self { config, playback }
    }

    /// Run the extractor for `reference`
    pub async fn extract(&self, reference: &str) -> Result<ExtractedMedia> {
        debug!("Running {} for {}", self.config.program, reference);

        let output = Command::new(&self.config.program)
            .args(EXTRACTOR_ARGS)
            .args(&self.config.extra_args)
            .arg(reference)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                Error::Resolution(format!("failed to run {}: {}", self.config.program, e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Resolution(format!(
                "{} failed: {}",
                self.config.program,
                stderr.trim()
            )));
        }

        parse_extractor_output(&String::from_utf8_lossy(&output.stdout))
    }
}

#[async_trait]
impl Resolver for ProcessResolver {
    async fn resolve(&self, reference: &str) -> Result<Resolved> {
        let media = self.extract(reference).await?;
        let stream = ProcessStream::spawn(&self.config.decoder, &media.stream_url, &self.playback)?;

        info!("Resolved {} to {}", reference, media.title);
        Ok(Resolved {
            title: media.title,
            url: media.page_url,
            stream: Arc::new(stream),
        })
    }
}

/// Decoder subprocess producing interleaved s16le PCM on stdout
#[derive(Debug)]
pub struct ProcessStream {
    child: Mutex<Option<Child>>,
    stdout: Mutex<Option<ChildStdout>>,
    eof: AtomicBool,
    closed: AtomicBool,
}

impl ProcessStream {
    pub fn spawn(decoder: &str, url: &str, playback: &PlaybackConfig) -> Result<Self> {
        let rate = playback.sample_rate.to_string();
        let channels = playback.channels.to_string();

        let child = std::process::Command::new(decoder)
            .args([
                "-reconnect",
                "1",
                "-reconnect_streamed",
                "1",
                "-reconnect_delay_max",
                "5",
                "-i",
                url,
                "-vn",
                "-f",
                "s16le",
                "-ar",
                &rate,
                "-ac",
                &channels,
                "-loglevel",
                "error",
                "pipe:1",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| Error::Resolution(format!("failed to start {}: {}", decoder, e)))?;

        Self::from_child(child)
    }

    /// Wrap a spawned child whose stdout is piped
    fn from_child(mut child: Child) -> Result<Self> {
        let stdout = match child.stdout.take() {
            Some(stdout) => stdout,
            None => {
                let _ = child.kill();
                return Err(Error::Internal("decoder stdout not captured".to_string()));
            }
        };

        debug!("Decoder started (pid {})", child.id());
        Ok(Self {
            child: Mutex::new(Some(child)),
            stdout: Mutex::new(Some(stdout)),
            eof: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        })
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn wait_child(mut child: Child) {
    match child.wait() {
        Ok(status) => debug!("Decoder reaped: {}", status),
        Err(e) => warn!("Failed to reap decoder: {}", e),
    }
}

/// Reap a killed child without blocking an async worker
fn reap(child: Child) {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn_blocking(move || wait_child(child));
        }
        Err(_) => wait_child(child),
    }
}

impl AudioStream for ProcessStream {
    fn read(&self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.closed.load(Ordering::Acquire) {
            return Ok(0);
        }
        let mut stdout = lock(&self.stdout);
        let Some(pipe) = stdout.as_mut() else {
            return Ok(0);
        };

        let n = pipe.read(buf)?;
        if n == 0 {
            self.eof.store(true, Ordering::Release);
        }
        Ok(n)
    }

    fn is_live(&self) -> bool {
        !self.eof.load(Ordering::Acquire) && !self.closed.load(Ordering::Acquire)
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        // Kill first: a reader blocked on the pipe then sees EOF
        if let Some(mut child) = lock(&self.child).take() {
            if let Err(e) = child.kill() {
                debug!("Decoder already exited: {}", e);
            }
            reap(child);
        }
        // A reader mid-read keeps the pipe; it is dropped with the stream
        if let Ok(mut stdout) = self.stdout.try_lock() {
            stdout.take();
        }
        debug!("Decoder stream closed");
    }
}

impl Drop for ProcessStream {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_video() {
        let json = r#"{"title":"Song A","url":"https://cdn.example/a.webm","webpage_url":"https://www.youtube.com/watch?v=aaaaaaaaaaa"}"#;
        let media = parse_extractor_output(json).unwrap();
        assert_eq!(media.title, "Song A");
        assert_eq!(media.stream_url, "https://cdn.example/a.webm");
        assert_eq!(
            media.page_url.as_deref(),
            Some("https://www.youtube.com/watch?v=aaaaaaaaaaa")
        );
    }

    #[test]
    fn test_parse_search_result_uses_first_entry() {
        let json = r#"{"title":"search","entries":[{"title":"First","url":"https://cdn.example/1"},{"title":"Second","url":"https://cdn.example/2"}]}"#;
        let media = parse_extractor_output(json).unwrap();
        assert_eq!(media.title, "First");
        assert_eq!(media.stream_url, "https://cdn.example/1");
    }

    #[test]
    fn test_parse_line_delimited_output() {
        let output = "\n{\"title\":\"One\",\"url\":\"u1\"}\n{\"title\":\"Two\",\"url\":\"u2\"}\n";
        assert_eq!(parse_extractor_output(output).unwrap().title, "One");
    }

    #[test]
    fn test_parse_failures() {
        assert!(matches!(parse_extractor_output(""), Err(Error::Resolution(_))));
        assert!(matches!(parse_extractor_output("not json"), Err(Error::Resolution(_))));
        assert!(matches!(
            parse_extractor_output(r#"{"title":"no url","entries":[]}"#),
            Err(Error::Resolution(_))
        ));
    }

    #[tokio::test]
    async fn test_close_kills_without_waiting_for_exit() {
        let child = std::process::Command::new("sleep")
            .arg("30")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .spawn()
            .unwrap();
        let stream = ProcessStream::from_child(child).unwrap();
        assert!(stream.is_live());

        let started = std::time::Instant::now();
        stream.close();
        stream.close();
        assert!(started.elapsed() < std::time::Duration::from_secs(5));

        assert!(!stream.is_live());
        let mut buf = [0u8; 16];
        assert_eq!(stream.read(&mut buf).unwrap(), 0);
        assert!(stream.child.lock().unwrap().is_none());
    }

    #[test]
    fn test_missing_decoder_is_resolution_error() {
        let err = ProcessStream::spawn(
            "groupplay-no-such-decoder",
            "https://cdn.example/a",
            &PlaybackConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Resolution(_)));
    }
}
