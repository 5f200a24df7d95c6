//! The dictation orchestrator.
//!
//! One cooperative loop owns all session state: it polls the control
//! socket, drains bridge key events into the gesture detector, and drives
//! the recording session. The transcript pipeline and injection run as
//! detached tasks so a new recording can start while the previous one is
//! still being transcribed.

use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tokio::time::sleep;

use dicta_core::{
    ApiConfig, FeedbackSink, GestureDetector, GestureSignal, HttpRewriter, HttpTranscriber,
    InjectionCoordinator, RecorderHandle, SessionTracker, Settings, TextRewriter,
    TranscriptPipeline, Visualizer,
};

use crate::bridge_host::{BridgeHost, HostEvent};
use crate::feedback::SystemFeedback;
use crate::history;
use crate::ipc::{IpcMessage, IpcResponse, IpcServer};

const LOOP_TICK: Duration = Duration::from_millis(10);
const METER_REFRESH: Duration = Duration::from_millis(100);
const RESPAWN_BACKOFF: Duration = Duration::from_millis(500);
const MAX_RESPAWN_FAILURES: u32 = 5;

/// Stands in for the rewrite provider when no credential is configured:
/// every call fails, which the pipeline turns into the raw-transcript
/// fallback.
struct UnconfiguredRewriter(String);

impl TextRewriter for UnconfiguredRewriter {
    fn rewrite(&self, _system: &str, _user: &str) -> Result<String> {
        anyhow::bail!("{}", self.0)
    }
}

/// Build a pipeline from an immutable snapshot of settings + environment.
/// Fails only when the transcription credential is missing; a missing
/// rewrite credential degrades to raw transcripts.
pub fn build_pipeline(settings: &Settings, env: &ApiConfig) -> Result<TranscriptPipeline> {
    let stt_config = settings.stt_config(env)?;
    let pipeline_config = settings.pipeline_config();

    let rewriter: Box<dyn TextRewriter> = match settings.llm_config(env) {
        Ok(config) => Box::new(HttpRewriter::new(config)),
        Err(e) => {
            if pipeline_config.should_rewrite() {
                tracing::warn!(
                    "post-processing requested but no rewrite key is configured; \
                     transcripts will be delivered raw"
                );
            }
            Box::new(UnconfiguredRewriter(format!("{e:#}")))
        }
    };

    Ok(TranscriptPipeline::new(
        Box::new(HttpTranscriber::new(stt_config)),
        rewriter,
        pipeline_config,
    ))
}

pub struct Service {
    settings: Settings,
    bridge: BridgeHost,
    gesture: GestureDetector,
    session: SessionTracker,
    recorder: Option<RecorderHandle>,
    visualizer: Arc<Visualizer>,
    coordinator: Arc<InjectionCoordinator>,
    feedback: SystemFeedback,
    in_flight: Arc<AtomicUsize>,
    counter: u32,
    last_meter: Instant,
    respawn_failures: u32,
}

impl Service {
    pub fn new(settings: Settings, bridge: BridgeHost) -> Self {
        let coordinator = Arc::new(
            InjectionCoordinator::new(
                Box::new(bridge.injector()),
                Box::new(SystemFeedback::new()),
            )
            .with_min_duration(settings.min_duration_ms)
            .with_persistence(Box::new(
                |result: &dicta_core::TranscriptResult, duration_ms: u64| {
                    if let Err(e) = history::append(result, duration_ms) {
                        tracing::error!(error = %e, "failed to persist transcript to history");
                    }
                },
            )),
        );

        let gesture = GestureDetector::new(settings.hold_threshold_ms);

        Self {
            settings,
            bridge,
            gesture,
            session: SessionTracker::new(),
            recorder: None,
            visualizer: Arc::new(Visualizer::new()),
            coordinator,
            feedback: SystemFeedback::new(),
            in_flight: Arc::new(AtomicUsize::new(0)),
            counter: 0,
            last_meter: Instant::now(),
            respawn_failures: 0,
        }
    }

    /// Run the service main loop
    pub async fn run(mut self) -> Result<()> {
        let ipc_server = IpcServer::new().context("Failed to create IPC server")?;

        println!(
            "dicta listening. Hold {} to dictate, Esc to cancel. Ctrl+C to stop.",
            self.settings.trigger_key
        );

        loop {
            // Check for incoming IPC connections (non-blocking)
            if let Some(mut conn) = ipc_server.try_accept()? {
                match conn.receive() {
                    Ok(message) => {
                        let response = self.handle_ipc(message);
                        let _ = conn.send(response);
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "bad IPC message");
                        let _ = conn.send(IpcResponse::Error(e.to_string()));
                    }
                }
            }

            // Drain bridge key events into the gesture detector
            while let Some(event) = self.bridge.try_event() {
                match event {
                    HostEvent::Key(key_event) => {
                        if let Some(signal) = self.gesture.on_key(&key_event, Instant::now()) {
                            self.handle_signal(signal);
                        }
                    }
                    HostEvent::Fatal(message) => {
                        self.feedback
                            .error("Keyboard hook failed — dictation is unavailable.");
                        anyhow::bail!(
                            "keyboard hook failed: {message}\n\
                             dicta cannot observe the trigger key and has to stop."
                        );
                    }
                    HostEvent::Closed => {
                        self.recover_bridge().await?;
                    }
                }
            }

            // Time-based gesture transitions (hold threshold, max duration)
            if let Some(signal) = self.gesture.poll(Instant::now()) {
                self.handle_signal(signal);
            }

            self.render_meter();

            sleep(LOOP_TICK).await;
        }
    }

    fn handle_ipc(&self, message: IpcMessage) -> IpcResponse {
        match message {
            IpcMessage::Stop => {
                println!("Stop signal received");
                // Return Ok response before exiting
                tokio::spawn(async {
                    sleep(Duration::from_millis(100)).await;
                    std::process::exit(0);
                });
                IpcResponse::Ok
            }
            IpcMessage::Status => {
                if self.session.is_recording() {
                    IpcResponse::Recording
                } else if self.in_flight.load(Ordering::SeqCst) > 0 {
                    IpcResponse::Processing
                } else {
                    IpcResponse::Idle
                }
            }
        }
    }

    fn handle_signal(&mut self, signal: GestureSignal) {
        match signal {
            GestureSignal::Start => self.start_recording(),
            GestureSignal::Finish => self.finish_recording(),
            GestureSignal::Cancel => self.cancel_recording(),
        }
    }

    fn start_recording(&mut self) {
        // One session at a time; a second start is rejected, not queued.
        if self.session.is_recording() {
            tracing::warn!("start ignored, a session is already recording");
            return;
        }

        self.visualizer.reset();
        match RecorderHandle::start(self.visualizer.clone()) {
            Ok(recorder) => {
                if let Err(e) = self.session.begin(Instant::now()) {
                    tracing::error!(error = %e, "session refused to start");
                    recorder.cancel();
                    self.gesture.on_start_failed();
                    return;
                }
                self.counter += 1;
                self.recorder = Some(recorder);
                print!("\r#{} recording...", self.counter);
                let _ = std::io::stdout().flush();
            }
            Err(e) => {
                tracing::error!(error = %e, "could not open microphone");
                self.feedback
                    .error("Microphone unavailable — recording not started.");
                self.gesture.on_start_failed();
            }
        }
    }

    fn finish_recording(&mut self) {
        let Some(recorder) = self.recorder.take() else {
            return;
        };
        let count = self.counter;

        let duration_ms = match self.session.confirm(Instant::now()) {
            Ok(duration) => duration,
            Err(e) => {
                tracing::error!(error = %e, "session refused to confirm");
                recorder.cancel();
                return;
            }
        };

        // Policy gate: too-short recordings never reach the pipeline.
        if self.coordinator.screen(duration_ms).is_some() {
            recorder.cancel();
            println!("\r#{count} discarded (too short)   ");
            return;
        }

        print!("\r#{count} processing...");
        let _ = std::io::stdout().flush();

        let pipeline = match build_pipeline(&self.settings, &ApiConfig::from_env()) {
            Ok(pipeline) => pipeline,
            Err(e) => {
                recorder.cancel();
                self.feedback.error(&format!("{e:#}"));
                println!("\r#{count} error: {e:#}");
                return;
            }
        };

        // Finalization, transcription and injection run detached; the key
        // listener stays responsive and a new session may start meanwhile.
        let coordinator = self.coordinator.clone();
        let in_flight = self.in_flight.clone();
        in_flight.fetch_add(1, Ordering::SeqCst);

        tokio::spawn(async move {
            let delivered = tokio::task::spawn_blocking(move || {
                let recording = recorder.finalize()?;
                let duration_ms = recording.duration_ms;
                pipeline
                    .run(&recording)
                    .map(|result| coordinator.deliver(&result, duration_ms))
            })
            .await;

            match delivered {
                Ok(Ok(outcome)) if outcome.accepted => {
                    println!("\r#{count} done            ");
                }
                Ok(Ok(outcome)) => {
                    let reason = outcome
                        .reason
                        .map(|r| r.to_string())
                        .unwrap_or_else(|| "unknown".to_string());
                    println!("\r#{count} not injected: {reason}");
                }
                Ok(Err(e)) => {
                    SystemFeedback::new().error(&format!("Dictation failed: {e:#}"));
                    println!("\r#{count} error: {e:#}");
                }
                Err(e) => {
                    println!("\r#{count} error: pipeline task panicked: {e}");
                }
            }

            in_flight.fetch_sub(1, Ordering::SeqCst);
        });
    }

    fn cancel_recording(&mut self) {
        let Some(recorder) = self.recorder.take() else {
            return;
        };
        recorder.cancel();
        if let Err(e) = self.session.cancel() {
            tracing::error!(error = %e, "session refused to cancel");
            self.session.reset();
        }
        self.feedback.discarded("Recording cancelled.");
        println!("\r#{} cancelled       ", self.counter);
    }

    /// The bridge process went away: reset everything it fed and bring a
    /// fresh one up.
    async fn recover_bridge(&mut self) -> Result<()> {
        tracing::warn!("input bridge exited, resetting session and restarting it");
        if let Some(recorder) = self.recorder.take() {
            recorder.cancel();
        }
        self.session.reset();
        self.gesture.reset();

        loop {
            sleep(RESPAWN_BACKOFF).await;
            match self.bridge.respawn() {
                Ok(()) => {
                    self.respawn_failures = 0;
                    return Ok(());
                }
                Err(e) => {
                    self.respawn_failures += 1;
                    tracing::error!(
                        error = %e,
                        attempt = self.respawn_failures,
                        "failed to restart the input bridge"
                    );
                    if self.respawn_failures >= MAX_RESPAWN_FAILURES {
                        return Err(e).context("giving up restarting the input bridge");
                    }
                }
            }
        }
    }

    /// Compact amplitude meter on the status line while recording. This is
    /// the concurrent reader of the visualizer window.
    fn render_meter(&mut self) {
        if !self.session.is_recording() {
            return;
        }
        let now = Instant::now();
        if now.duration_since(self.last_meter) < METER_REFRESH {
            return;
        }
        self.last_meter = now;

        const BLOCKS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
        let snapshot = self.visualizer.snapshot();
        let meter: String = snapshot
            .iter()
            .rev()
            .take(12)
            .rev()
            .map(|&level| BLOCKS[((level * 7.0) as usize).min(7)])
            .collect();

        print!("\r#{} recording {meter}", self.counter);
        let _ = std::io::stdout().flush();
    }
}
