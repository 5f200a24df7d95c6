//! User-facing feedback: desktop notifications plus a short tone.

use std::time::Duration;

use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use notify_rust::Notification;

use dicta_core::FeedbackSink;

const NOTIFICATION_TIMEOUT_MS: u32 = 4000;

/// Feedback through the desktop: toast on every branch, a completion tone
/// on success and a lower one on errors. Everything is best-effort; a
/// headless session must never break dictation.
pub struct SystemFeedback;

impl SystemFeedback {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SystemFeedback {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedbackSink for SystemFeedback {
    fn success(&self, message: &str) {
        play_tone(880.0, Duration::from_millis(120));
        notify("dicta", message);
    }

    fn error(&self, message: &str) {
        play_tone(220.0, Duration::from_millis(250));
        notify("dicta — error", message);
    }

    fn discarded(&self, message: &str) {
        notify("dicta", message);
    }
}

fn notify(summary: &str, body: &str) {
    let result = Notification::new()
        .appname("dicta")
        .summary(summary)
        .body(body)
        .timeout(notify_rust::Timeout::Milliseconds(NOTIFICATION_TIMEOUT_MS))
        .show();
    if let Err(e) = result {
        tracing::debug!(error = %e, "desktop notification unavailable");
    }
}

/// Synthesize a short sine tone on the default output device. No bundled
/// sound assets; runs on its own thread so callers never block on audio.
fn play_tone(freq: f32, duration: Duration) {
    std::thread::spawn(move || {
        if let Err(e) = try_play_tone(freq, duration) {
            tracing::debug!(error = %e, "feedback tone unavailable");
        }
    });
}

fn try_play_tone(freq: f32, duration: Duration) -> Result<()> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .context("no output device available")?;
    let config = device
        .default_output_config()
        .context("failed to get default output config")?;

    let sample_rate = config.sample_rate().0 as f32;
    let channels = config.channels() as usize;
    let mut clock = 0.0f32;

    let stream = device.build_output_stream(
        &config.into(),
        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
            for frame in data.chunks_mut(channels) {
                clock += 1.0;
                let value =
                    (clock * freq * 2.0 * std::f32::consts::PI / sample_rate).sin() * 0.2;
                for sample in frame {
                    *sample = value;
                }
            }
        },
        |err| tracing::debug!("tone stream error: {err}"),
        None,
    )?;

    stream.play()?;
    std::thread::sleep(duration);

    Ok(())
}
