use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender, bounded};

use crate::visualizer::Visualizer;

/// The immutable audio artifact produced when a recording session ends.
/// Ownership transfers to the transcript pipeline; the engine does not
/// retain it afterwards.
#[derive(Debug, Clone)]
pub struct FinalizedRecording {
    /// WAV-encoded capture (16-bit PCM).
    pub audio_wav: Vec<u8>,
    /// Wall-clock duration of the recording.
    pub duration_ms: u64,
}

enum RecorderCmd {
    Finalize {
        duration_ms: u64,
        reply: Sender<Result<FinalizedRecording>>,
    },
    Cancel,
}

/// Handle to a capture running on its own thread.
///
/// The cpal stream lives and dies on that thread; the handle only carries
/// commands. Dropping the handle without calling `finalize` or `cancel`
/// releases the microphone and discards the buffer.
pub struct RecorderHandle {
    cmd_tx: Sender<RecorderCmd>,
    started_at: Instant,
}

impl RecorderHandle {
    /// Open the default input device and start capturing.
    ///
    /// Each capture callback appends samples to the session buffer and
    /// pushes one peak-amplitude value into the visualizer. Fails
    /// synchronously when no device is available or the stream cannot start.
    pub fn start(visualizer: Arc<Visualizer>) -> Result<RecorderHandle> {
        let (cmd_tx, cmd_rx) = bounded(1);
        let (ready_tx, ready_rx) = bounded(1);

        std::thread::Builder::new()
            .name("dicta-audio".to_string())
            .spawn(move || capture_thread(cmd_rx, ready_tx, visualizer))
            .context("Failed to spawn audio capture thread")?;

        ready_rx
            .recv()
            .context("Audio capture thread exited before reporting readiness")??;

        Ok(RecorderHandle {
            cmd_tx,
            started_at: Instant::now(),
        })
    }

    /// Wall-clock time since capture started.
    pub fn duration_ms(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }

    /// Stop capturing and seal the buffer into a `FinalizedRecording`.
    pub fn finalize(self) -> Result<FinalizedRecording> {
        let duration_ms = self.duration_ms();
        let (reply_tx, reply_rx) = bounded(1);
        self.cmd_tx
            .send(RecorderCmd::Finalize {
                duration_ms,
                reply: reply_tx,
            })
            .context("Audio capture thread is gone")?;
        reply_rx
            .recv()
            .context("Audio capture thread dropped the finalize reply")?
    }

    /// Stop capturing and discard everything.
    pub fn cancel(self) {
        let _ = self.cmd_tx.send(RecorderCmd::Cancel);
    }
}

fn capture_thread(
    cmd_rx: Receiver<RecorderCmd>,
    ready_tx: Sender<Result<()>>,
    visualizer: Arc<Visualizer>,
) {
    let samples: Arc<Mutex<Vec<f32>>> = Arc::new(Mutex::new(Vec::new()));

    let opened = open_stream(samples.clone(), visualizer);
    let (stream, sample_rate, channels) = match opened {
        Ok(parts) => parts,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };
    let _ = ready_tx.send(Ok(()));

    // Block until the session decides what to do with the capture.
    match cmd_rx.recv() {
        Ok(RecorderCmd::Finalize { duration_ms, reply }) => {
            // Drop the stream first to release the microphone.
            drop(stream);
            let taken = {
                let mut guard = samples.lock().unwrap();
                std::mem::take(&mut *guard)
            };
            let result = encode_wav(&taken, sample_rate, channels).map(|audio_wav| {
                FinalizedRecording {
                    audio_wav,
                    duration_ms,
                }
            });
            let _ = reply.send(result);
        }
        Ok(RecorderCmd::Cancel) | Err(_) => {
            drop(stream);
        }
    }
}

fn open_stream(
    samples: Arc<Mutex<Vec<f32>>>,
    visualizer: Arc<Visualizer>,
) -> Result<(cpal::Stream, u32, u16)> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .context("No input device available")?;

    let config = device
        .default_input_config()
        .context("Failed to get default input config")?;

    let sample_rate = config.sample_rate().0;
    let channels = config.channels();

    let stream = match config.sample_format() {
        cpal::SampleFormat::F32 => {
            build_stream::<f32>(&device, &config.into(), samples, visualizer)?
        }
        cpal::SampleFormat::I16 => {
            build_stream::<i16>(&device, &config.into(), samples, visualizer)?
        }
        cpal::SampleFormat::U16 => {
            build_stream::<u16>(&device, &config.into(), samples, visualizer)?
        }
        _ => anyhow::bail!("Unsupported sample format"),
    };

    stream.play().context("Failed to start input stream")?;

    Ok((stream, sample_rate, channels))
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    samples: Arc<Mutex<Vec<f32>>>,
    visualizer: Arc<Visualizer>,
) -> Result<cpal::Stream>
where
    T: cpal::Sample + cpal::SizedSample,
    f32: cpal::FromSample<T>,
{
    let err_fn = |err| tracing::warn!("audio stream error: {err}");

    let stream = device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            let mut peak = 0.0f32;
            {
                let mut samples = samples.lock().unwrap();
                for &sample in data {
                    let value: f32 = cpal::Sample::from_sample(sample);
                    peak = peak.max(value.abs());
                    samples.push(value);
                }
            }
            visualizer.push(peak);
        },
        err_fn,
        None,
    )?;

    Ok(stream)
}

/// Encode raw f32 samples as 16-bit PCM WAV, in memory.
fn encode_wav(samples: &[f32], sample_rate: u32, channels: u16) -> Result<Vec<u8>> {
    if samples.is_empty() {
        anyhow::bail!("No audio data recorded");
    }

    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut buf = Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut buf, spec).context("Failed to create WAV writer")?;
        for &sample in samples {
            let clamped = sample.clamp(-1.0, 1.0);
            writer.write_sample((clamped * i16::MAX as f32) as i16)?;
        }
        writer.finalize().context("Failed to finalize WAV data")?;
    }

    Ok(buf.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_wav_produces_parseable_wav() {
        let samples: Vec<f32> = (0..16_000)
            .map(|i| (i as f32 * 0.05).sin() * 0.5)
            .collect();
        let wav = encode_wav(&samples, 16_000, 1).unwrap();

        let reader = hound::WavReader::new(Cursor::new(&wav)).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.sample_rate, 16_000);
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(reader.len(), 16_000);
    }

    #[test]
    fn encode_wav_clamps_out_of_range_samples() {
        let wav = encode_wav(&[2.0, -2.0], 16_000, 1).unwrap();
        let mut reader = hound::WavReader::new(Cursor::new(&wav)).unwrap();
        let decoded: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(decoded[0], i16::MAX);
        assert_eq!(decoded[1], -i16::MAX);
    }

    #[test]
    fn encode_wav_rejects_empty_capture() {
        assert!(encode_wav(&[], 16_000, 1).is_err());
    }
}
