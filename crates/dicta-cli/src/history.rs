//! Append-only transcript history.
//!
//! The coordinator queues every result here *before* injection is
//! attempted, so a failed paste never loses the user's words. The history
//! UI proper (list, search, playback) lives elsewhere; this sink is the
//! contract it reads from.

use std::io::Write;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use serde::Serialize;

use dicta_core::TranscriptResult;

#[derive(Serialize)]
struct HistoryEntry<'a> {
    timestamp: u64,
    duration_ms: u64,
    raw_text: &'a str,
    final_text: &'a str,
    sanitized: bool,
}

/// History file location: `$XDG_DATA_HOME/dicta/history.jsonl`, falling
/// back to `~/.local/share`.
pub fn history_path() -> PathBuf {
    let data_dir = std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".local").join("share")
        });
    data_dir.join("dicta").join("history.jsonl")
}

pub fn append(result: &TranscriptResult, duration_ms: u64) -> Result<()> {
    let path = history_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create data directory")?;
    }

    let entry = HistoryEntry {
        timestamp: SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0),
        duration_ms,
        raw_text: &result.raw_text,
        final_text: &result.final_text,
        sanitized: result.sanitized,
    };

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .context("Failed to open history file")?;
    writeln!(file, "{}", serde_json::to_string(&entry)?)
        .context("Failed to append history entry")?;

    Ok(())
}
