use std::fmt;

use thiserror::Error;

use crate::pipeline::TranscriptResult;

/// Minimum recording duration before the pipeline is worth invoking.
/// Shorter holds are discarded: they are almost always accidental and would
/// waste provider calls on near-empty transcripts.
pub const MIN_DURATION_MS_DEFAULT: u64 = 10_000;

/// Failure modes of the clipboard-write-and-paste injection.
#[derive(Debug, Error)]
pub enum InjectionError {
    #[error("clipboard error: {0}")]
    Clipboard(String),
    #[error("paste simulation failed: {0}")]
    Paste(String),
    #[error("input bridge is not available")]
    BridgeUnavailable,
    #[error("input bridge did not acknowledge the injection")]
    AckTimeout,
    #[error("injection failed: {0}")]
    Failed(String),
}

/// Why a recording or result was not injected. Present only on rejection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    BelowMinDuration { duration_ms: u64, min_ms: u64 },
    EmptyTranscript,
    InjectionFailed(String),
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::BelowMinDuration {
                duration_ms,
                min_ms,
            } => write!(
                f,
                "recording too short ({:.1}s < {:.0}s)",
                *duration_ms as f64 / 1000.0,
                *min_ms as f64 / 1000.0
            ),
            RejectReason::EmptyTranscript => write!(f, "nothing was transcribed"),
            RejectReason::InjectionFailed(e) => write!(f, "injection failed: {e}"),
        }
    }
}

/// The final decision for one dictation: injected or not, and why not.
#[derive(Debug, Clone)]
pub struct InjectionOutcome {
    pub accepted: bool,
    pub reason: Option<RejectReason>,
}

impl InjectionOutcome {
    fn accepted() -> Self {
        Self {
            accepted: true,
            reason: None,
        }
    }

    fn rejected(reason: RejectReason) -> Self {
        Self {
            accepted: false,
            reason: Some(reason),
        }
    }
}

/// Places final text into the focused application. Implemented by the
/// input-bridge client; mocked in tests.
pub trait TextInjector: Send + Sync {
    fn inject(&self, text: &str) -> Result<(), InjectionError>;
}

/// User-facing feedback. Every coordinator branch reports through here.
pub trait FeedbackSink: Send + Sync {
    fn success(&self, message: &str);
    fn error(&self, message: &str);
    fn discarded(&self, message: &str);
}

/// Queues a result for persistence. Invoked before injection is attempted
/// so the text survives an injection failure.
pub type PersistFn = Box<dyn Fn(&TranscriptResult, u64) + Send + Sync>;

/// Applies delivery policy to pipeline results and drives the injection.
pub struct InjectionCoordinator {
    injector: Box<dyn TextInjector>,
    feedback: Box<dyn FeedbackSink>,
    persist: Option<PersistFn>,
    min_duration_ms: u64,
}

impl InjectionCoordinator {
    pub fn new(injector: Box<dyn TextInjector>, feedback: Box<dyn FeedbackSink>) -> Self {
        Self {
            injector,
            feedback,
            persist: None,
            min_duration_ms: MIN_DURATION_MS_DEFAULT,
        }
    }

    pub fn with_min_duration(mut self, min_duration_ms: u64) -> Self {
        self.min_duration_ms = min_duration_ms;
        self
    }

    pub fn with_persistence(mut self, persist: PersistFn) -> Self {
        self.persist = Some(persist);
        self
    }

    /// Duration gate, applied on session confirmation before the pipeline
    /// is ever built. Returns the rejection when the recording is too
    /// short; `None` means proceed.
    pub fn screen(&self, duration_ms: u64) -> Option<InjectionOutcome> {
        if duration_ms >= self.min_duration_ms {
            return None;
        }
        let reason = RejectReason::BelowMinDuration {
            duration_ms,
            min_ms: self.min_duration_ms,
        };
        tracing::info!(%reason, "recording discarded");
        self.feedback.discarded(&format!("Discarded: {reason}"));
        Some(InjectionOutcome::rejected(reason))
    }

    /// Deliver a completed pipeline result: persist, inject, report.
    ///
    /// Injection is attempted only here, after the full pipeline has
    /// produced a final text; partial text is never injected. An injection
    /// failure is surfaced to the user and not retried — the text has
    /// already been queued for persistence, so nothing is lost.
    pub fn deliver(&self, result: &TranscriptResult, duration_ms: u64) -> InjectionOutcome {
        let text = result.final_text.trim();
        if text.is_empty() {
            self.feedback
                .discarded("Nothing was transcribed — the recording sounded silent.");
            return InjectionOutcome::rejected(RejectReason::EmptyTranscript);
        }

        if let Some(persist) = &self.persist {
            persist(result, duration_ms);
        }

        match self.injector.inject(text) {
            Ok(()) => {
                tracing::info!(chars = text.len(), "text injected");
                self.feedback.success("Dictation typed into the focused window.");
                InjectionOutcome::accepted()
            }
            Err(e) => {
                tracing::error!(error = %e, "injection failed");
                self.feedback.error(&format!(
                    "Could not paste into the focused window ({e}). \
                     The text was saved to history."
                ));
                InjectionOutcome::rejected(RejectReason::InjectionFailed(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct MockInjector {
        calls: AtomicUsize,
        injected: Mutex<Vec<String>>,
        fail: bool,
    }

    impl TextInjector for &MockInjector {
        fn inject(&self, text: &str) -> Result<(), InjectionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(InjectionError::Paste("no focused window".to_string()));
            }
            self.injected.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    #[derive(Default)]
    struct MockFeedback {
        successes: AtomicUsize,
        errors: AtomicUsize,
        discards: AtomicUsize,
    }

    impl FeedbackSink for &MockFeedback {
        fn success(&self, _message: &str) {
            self.successes.fetch_add(1, Ordering::SeqCst);
        }
        fn error(&self, _message: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
        fn discarded(&self, _message: &str) {
            self.discards.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn leak<T>(value: T) -> &'static T {
        Box::leak(Box::new(value))
    }

    fn result(final_text: &str) -> TranscriptResult {
        TranscriptResult {
            raw_text: final_text.to_string(),
            final_text: final_text.to_string(),
            sanitized: false,
        }
    }

    #[test]
    fn short_recording_is_screened_out_with_feedback() {
        let injector = leak(MockInjector::default());
        let feedback = leak(MockFeedback::default());
        let coordinator = InjectionCoordinator::new(Box::new(injector), Box::new(feedback));

        let outcome = coordinator.screen(8_000).expect("should reject");
        assert!(!outcome.accepted);
        assert_eq!(
            outcome.reason,
            Some(RejectReason::BelowMinDuration {
                duration_ms: 8_000,
                min_ms: MIN_DURATION_MS_DEFAULT,
            })
        );
        assert_eq!(feedback.discards.load(Ordering::SeqCst), 1);
        assert_eq!(injector.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn long_enough_recording_passes_the_screen() {
        let injector = leak(MockInjector::default());
        let feedback = leak(MockFeedback::default());
        let coordinator = InjectionCoordinator::new(Box::new(injector), Box::new(feedback));
        assert!(coordinator.screen(12_000).is_none());
        assert_eq!(feedback.discards.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn successful_delivery_persists_before_injecting() {
        let injector = leak(MockInjector::default());
        let feedback = leak(MockFeedback::default());
        let persisted: &'static Mutex<Vec<String>> = leak(Mutex::new(Vec::new()));

        let coordinator = InjectionCoordinator::new(Box::new(injector), Box::new(feedback))
            .with_persistence(Box::new(|r: &TranscriptResult, _duration: u64| {
                persisted.lock().unwrap().push(r.final_text.clone());
            }));

        let outcome = coordinator.deliver(&result("Faça o deploy no `main`."), 12_000);
        assert!(outcome.accepted);
        assert!(outcome.reason.is_none());
        assert_eq!(persisted.lock().unwrap().len(), 1);
        assert_eq!(
            injector.injected.lock().unwrap()[0],
            "Faça o deploy no `main`."
        );
        assert_eq!(feedback.successes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn injection_failure_surfaces_error_and_text_is_already_persisted() {
        let injector = leak(MockInjector {
            fail: true,
            ..Default::default()
        });
        let feedback = leak(MockFeedback::default());
        let persisted: &'static Mutex<Vec<String>> = leak(Mutex::new(Vec::new()));

        let coordinator = InjectionCoordinator::new(Box::new(injector), Box::new(feedback))
            .with_persistence(Box::new(|r: &TranscriptResult, _duration: u64| {
                persisted.lock().unwrap().push(r.final_text.clone());
            }));

        let outcome = coordinator.deliver(&result("important words"), 15_000);
        assert!(!outcome.accepted);
        assert!(matches!(
            outcome.reason,
            Some(RejectReason::InjectionFailed(_))
        ));
        // Exactly one attempt: no automatic retry.
        assert_eq!(injector.calls.load(Ordering::SeqCst), 1);
        assert_eq!(feedback.errors.load(Ordering::SeqCst), 1);
        // The text survived the failure.
        assert_eq!(persisted.lock().unwrap()[0], "important words");
    }

    #[test]
    fn empty_final_text_is_discarded_not_injected() {
        let injector = leak(MockInjector::default());
        let feedback = leak(MockFeedback::default());
        let coordinator = InjectionCoordinator::new(Box::new(injector), Box::new(feedback));

        let outcome = coordinator.deliver(&result("   "), 12_000);
        assert!(!outcome.accepted);
        assert_eq!(outcome.reason, Some(RejectReason::EmptyTranscript));
        assert_eq!(injector.calls.load(Ordering::SeqCst), 0);
        assert_eq!(feedback.discards.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn custom_min_duration_is_honored() {
        let injector = leak(MockInjector::default());
        let feedback = leak(MockFeedback::default());
        let coordinator = InjectionCoordinator::new(Box::new(injector), Box::new(feedback))
            .with_min_duration(2_000);
        assert!(coordinator.screen(1_500).is_some());
        assert!(coordinator.screen(2_500).is_none());
    }
}
