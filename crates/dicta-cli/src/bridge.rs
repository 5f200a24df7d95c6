//! The input-bridge helper process.
//!
//! Runs as a child of the service (`dicta bridge --trigger <key>`) so the
//! global keyboard hook lives in its own OS process: a slow or blocked
//! consumer can never stall the hook, and a hook crash never takes the
//! orchestrator down. Events go out as JSON lines on stdout; injection
//! commands come in as JSON lines on stdin.

use std::io::{BufRead, Write};
use std::time::UNIX_EPOCH;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use dicta_core::{HookKey, KeyKind};

use crate::clipboard;

/// Bridge -> orchestrator, one JSON object per line on stdout.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BridgeEvent {
    /// The hook thread is starting.
    Ready,
    /// A state change of the trigger or cancel key.
    Key {
        key: HookKey,
        kind: KeyKind,
        timestamp_ms: u64,
    },
    /// Result of a `write` command.
    WriteResult {
        ok: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// The hook could not be registered; the bridge is exiting.
    Fatal { message: String },
}

/// Orchestrator -> bridge, one JSON object per line on stdin.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum BridgeCommand {
    /// Inject `text` into the focused window via clipboard-and-paste.
    Write { text: String },
    Shutdown,
}

/// Map a configured key name to the hook-level key.
pub fn parse_trigger_key(name: &str) -> Option<rdev::Key> {
    use rdev::Key;
    match name.to_lowercase().as_str() {
        "capslock" | "caps_lock" | "caps" => Some(Key::CapsLock),
        "f1" => Some(Key::F1),
        "f2" => Some(Key::F2),
        "f3" => Some(Key::F3),
        "f4" => Some(Key::F4),
        "f5" => Some(Key::F5),
        "f6" => Some(Key::F6),
        "f7" => Some(Key::F7),
        "f8" => Some(Key::F8),
        "f9" => Some(Key::F9),
        "f10" => Some(Key::F10),
        "f11" => Some(Key::F11),
        "f12" => Some(Key::F12),
        "scrolllock" | "scroll_lock" => Some(Key::ScrollLock),
        "pause" | "break" => Some(Key::Pause),
        "insert" | "ins" => Some(Key::Insert),
        "home" => Some(Key::Home),
        "end" => Some(Key::End),
        _ => None,
    }
}

fn emit(event: &BridgeEvent) {
    let mut out = std::io::stdout().lock();
    if let Ok(json) = serde_json::to_string(event) {
        let _ = writeln!(out, "{json}");
        let _ = out.flush();
    }
}

/// Bridge process entry point. Returns when stdin closes (the parent went
/// away) or a shutdown command arrives.
pub fn run(trigger_name: &str) -> Result<()> {
    let trigger = parse_trigger_key(trigger_name)
        .with_context(|| format!("Unknown trigger key: {trigger_name}"))?;

    emit(&BridgeEvent::Ready);

    // The hook runs on its own thread; rdev::listen never returns on
    // success. stdout writes from both threads serialize on the lock.
    std::thread::spawn(move || {
        let callback = move |event: rdev::Event| {
            let timestamp_ms = event
                .time
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis() as u64)
                .unwrap_or(0);

            let mapped = match event.event_type {
                rdev::EventType::KeyPress(key) if key == trigger => {
                    Some((HookKey::Trigger, KeyKind::Pressed))
                }
                rdev::EventType::KeyRelease(key) if key == trigger => {
                    Some((HookKey::Trigger, KeyKind::Released))
                }
                rdev::EventType::KeyPress(rdev::Key::Escape) => {
                    Some((HookKey::Cancel, KeyKind::Pressed))
                }
                _ => None,
            };

            if let Some((key, kind)) = mapped {
                emit(&BridgeEvent::Key {
                    key,
                    kind,
                    timestamp_ms,
                });
            }
        };

        if let Err(e) = rdev::listen(callback) {
            emit(&BridgeEvent::Fatal {
                message: format!("keyboard hook failed to register: {e:?}"),
            });
            std::process::exit(1);
        }
    });

    // Command loop. Injection happens here, in this process, so the
    // orchestrator never touches the clipboard directly.
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line.context("Failed to read command from stdin")?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<BridgeCommand>(&line) {
            Ok(BridgeCommand::Write { text }) => match clipboard::inject_text(&text) {
                Ok(()) => emit(&BridgeEvent::WriteResult {
                    ok: true,
                    error: None,
                }),
                Err(e) => emit(&BridgeEvent::WriteResult {
                    ok: false,
                    error: Some(e.to_string()),
                }),
            },
            Ok(BridgeCommand::Shutdown) => break,
            Err(e) => {
                tracing::warn!(error = %e, line = %line, "unparseable bridge command");
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_round_trip_through_json_lines() {
        let events = [
            BridgeEvent::Ready,
            BridgeEvent::Key {
                key: HookKey::Trigger,
                kind: KeyKind::Pressed,
                timestamp_ms: 1234,
            },
            BridgeEvent::WriteResult {
                ok: false,
                error: Some("no focused window".to_string()),
            },
            BridgeEvent::Fatal {
                message: "hook refused".to_string(),
            },
        ];
        for event in events {
            let line = serde_json::to_string(&event).unwrap();
            let back: BridgeEvent = serde_json::from_str(&line).unwrap();
            assert_eq!(back, event);
        }
    }

    #[test]
    fn commands_round_trip_through_json_lines() {
        let commands = [
            BridgeCommand::Write {
                text: "Faça o deploy no `main`.".to_string(),
            },
            BridgeCommand::Shutdown,
        ];
        for command in commands {
            let line = serde_json::to_string(&command).unwrap();
            let back: BridgeCommand = serde_json::from_str(&line).unwrap();
            assert_eq!(back, command);
        }
    }

    #[test]
    fn wire_format_is_stable() {
        let line = serde_json::to_string(&BridgeEvent::Key {
            key: HookKey::Trigger,
            kind: KeyKind::Released,
            timestamp_ms: 7,
        })
        .unwrap();
        assert_eq!(
            line,
            r#"{"event":"key","key":"trigger","kind":"released","timestamp_ms":7}"#
        );

        let command = serde_json::to_string(&BridgeCommand::Write {
            text: "x".to_string(),
        })
        .unwrap();
        assert_eq!(command, r#"{"cmd":"write","text":"x"}"#);
    }

    #[test]
    fn trigger_key_names_parse() {
        assert_eq!(parse_trigger_key("capslock"), Some(rdev::Key::CapsLock));
        assert_eq!(parse_trigger_key("CapsLock"), Some(rdev::Key::CapsLock));
        assert_eq!(parse_trigger_key("f8"), Some(rdev::Key::F8));
        assert_eq!(parse_trigger_key("scroll_lock"), Some(rdev::Key::ScrollLock));
        assert_eq!(parse_trigger_key("escape"), None);
        assert_eq!(parse_trigger_key(""), None);
    }
}
