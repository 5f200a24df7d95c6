use std::time::Duration;

use anyhow::{Context, Result};
use arboard::Clipboard;
use dicta_core::InjectionError;
use rdev::{EventType, Key, simulate};

/// Gap between the clipboard write and the paste chord, so the clipboard
/// manager has processed the new contents before the target app reads them.
const CLIPBOARD_SETTLE_DELAY: Duration = Duration::from_millis(50);

/// Gap between simulated key events; some applications drop events that
/// arrive back-to-back.
const KEY_EVENT_DELAY: Duration = Duration::from_millis(20);

/// How long the injected text stays on the clipboard before the previous
/// contents are restored. The target app reads the clipboard when it
/// handles the paste, which is not instantaneous.
const CLIPBOARD_RESTORE_DELAY: Duration = Duration::from_millis(200);

/// Plain clipboard copy, used by the one-shot recording mode.
pub fn copy_to_clipboard(text: &str) -> Result<()> {
    let mut clipboard = Clipboard::new().context("Failed to open clipboard")?;
    clipboard
        .set_text(text)
        .context("Failed to write clipboard")?;
    Ok(())
}

/// Clipboard-write-and-paste injection into the focused window.
///
/// The whole string lands in one paste; simulated per-character typing is
/// not supported. The previous clipboard contents are restored afterwards,
/// best-effort.
pub fn inject_text(text: &str) -> Result<(), InjectionError> {
    let mut clipboard =
        Clipboard::new().map_err(|e| InjectionError::Clipboard(e.to_string()))?;
    let previous = clipboard.get_text().ok();

    clipboard
        .set_text(text)
        .map_err(|e| InjectionError::Clipboard(e.to_string()))?;
    std::thread::sleep(CLIPBOARD_SETTLE_DELAY);

    send_paste_chord().map_err(InjectionError::Paste)?;

    std::thread::sleep(CLIPBOARD_RESTORE_DELAY);
    if let Some(previous) = previous {
        let _ = clipboard.set_text(previous);
    }

    Ok(())
}

fn send_paste_chord() -> Result<(), String> {
    let modifier = if cfg!(target_os = "macos") {
        Key::MetaLeft
    } else {
        Key::ControlLeft
    };

    let chord = [
        EventType::KeyPress(modifier),
        EventType::KeyPress(Key::KeyV),
        EventType::KeyRelease(Key::KeyV),
        EventType::KeyRelease(modifier),
    ];

    for event in &chord {
        simulate(event).map_err(|e| format!("{e:?}"))?;
        std::thread::sleep(KEY_EVENT_DELAY);
    }

    Ok(())
}
