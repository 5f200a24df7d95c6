use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Default hold time before a press counts as an intentional recording start.
pub const HOLD_THRESHOLD_MS_DEFAULT: u64 = 500;
/// Valid range for the hold threshold; values outside are clamped.
pub const HOLD_THRESHOLD_MS_MIN: u64 = 200;
pub const HOLD_THRESHOLD_MS_MAX: u64 = 1500;
/// Recordings are force-finished after this long.
pub const MAX_RECORDING: Duration = Duration::from_secs(5 * 60);

/// Keys the input bridge reports. Everything else is filtered at the hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookKey {
    /// The configured push-to-talk key.
    Trigger,
    /// The forced-stop key (Escape).
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyKind {
    Pressed,
    Released,
}

/// A raw key-state change from the input bridge. Produced only by the
/// bridge process, consumed once by the gesture detector, never persisted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct KeyEvent {
    pub key: HookKey,
    pub kind: KeyKind,
    /// Wall-clock stamp from the bridge, for logging. Gesture timing uses
    /// the orchestrator's monotonic clock at receipt.
    pub timestamp_ms: u64,
}

/// High-level intent derived from the raw key stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureSignal {
    /// Hold threshold reached: begin recording.
    Start,
    /// Trigger released after a confirmed start: finish and transcribe.
    Finish,
    /// Forced stop: discard without transcribing.
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GesturePhase {
    /// Waiting for the initial press.
    Waiting,
    /// Trigger is down, counting toward the hold threshold.
    Arming { pressed_at: Instant },
    /// Recording is running.
    Active { started_at: Instant },
}

/// Maps timestamped press/hold/release of a single physical key to
/// start/finish/cancel intents.
///
/// A tap shorter than the hold threshold is treated as noise and ignored.
/// The interpretation lives here, at the orchestration layer; the bridge
/// stays a dumb event source.
pub struct GestureDetector {
    phase: GesturePhase,
    hold_threshold: Duration,
    max_recording: Duration,
}

impl GestureDetector {
    pub fn new(hold_threshold_ms: u64) -> Self {
        let clamped = hold_threshold_ms.clamp(HOLD_THRESHOLD_MS_MIN, HOLD_THRESHOLD_MS_MAX);
        Self {
            phase: GesturePhase::Waiting,
            hold_threshold: Duration::from_millis(clamped),
            max_recording: MAX_RECORDING,
        }
    }

    #[cfg(test)]
    fn with_max_recording(mut self, max: Duration) -> Self {
        self.max_recording = max;
        self
    }

    pub fn hold_threshold(&self) -> Duration {
        self.hold_threshold
    }

    pub fn is_active(&self) -> bool {
        matches!(self.phase, GesturePhase::Active { .. })
    }

    /// Feed one key event, stamped with the orchestrator's monotonic clock.
    pub fn on_key(&mut self, event: &KeyEvent, now: Instant) -> Option<GestureSignal> {
        match (self.phase, event.key, event.kind) {
            (GesturePhase::Waiting, HookKey::Trigger, KeyKind::Pressed) => {
                self.phase = GesturePhase::Arming { pressed_at: now };
                None
            }
            // OS key repeat re-delivers Pressed while held.
            (GesturePhase::Arming { .. }, HookKey::Trigger, KeyKind::Pressed)
            | (GesturePhase::Active { .. }, HookKey::Trigger, KeyKind::Pressed) => None,
            (GesturePhase::Arming { pressed_at }, HookKey::Trigger, KeyKind::Released) => {
                // Released before the threshold: accidental tap.
                tracing::debug!(
                    held_ms = now.duration_since(pressed_at).as_millis() as u64,
                    "trigger tap below hold threshold, ignoring"
                );
                self.phase = GesturePhase::Waiting;
                None
            }
            (GesturePhase::Active { .. }, HookKey::Trigger, KeyKind::Released) => {
                self.phase = GesturePhase::Waiting;
                Some(GestureSignal::Finish)
            }
            (GesturePhase::Arming { .. }, HookKey::Cancel, KeyKind::Pressed) => {
                // Nothing is recording yet, just stand down.
                self.phase = GesturePhase::Waiting;
                None
            }
            (GesturePhase::Active { .. }, HookKey::Cancel, KeyKind::Pressed) => {
                self.phase = GesturePhase::Waiting;
                Some(GestureSignal::Cancel)
            }
            _ => None,
        }
    }

    /// Drive time-based transitions: hold-threshold crossing and the
    /// maximum-duration cap. Call this regularly from the event loop.
    pub fn poll(&mut self, now: Instant) -> Option<GestureSignal> {
        match self.phase {
            GesturePhase::Arming { pressed_at }
                if now.duration_since(pressed_at) >= self.hold_threshold =>
            {
                self.phase = GesturePhase::Active { started_at: now };
                Some(GestureSignal::Start)
            }
            GesturePhase::Active { started_at }
                if now.duration_since(started_at) >= self.max_recording =>
            {
                tracing::warn!("recording hit the maximum duration, finishing");
                self.phase = GesturePhase::Waiting;
                Some(GestureSignal::Finish)
            }
            _ => None,
        }
    }

    /// The recording could not start (e.g. microphone unavailable); go back
    /// to waiting so the key must be released and held again.
    pub fn on_start_failed(&mut self) {
        self.phase = GesturePhase::Waiting;
    }

    /// Drop any in-flight gesture. Used when the bridge restarts.
    pub fn reset(&mut self) {
        self.phase = GesturePhase::Waiting;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press() -> KeyEvent {
        KeyEvent {
            key: HookKey::Trigger,
            kind: KeyKind::Pressed,
            timestamp_ms: 0,
        }
    }

    fn release() -> KeyEvent {
        KeyEvent {
            key: HookKey::Trigger,
            kind: KeyKind::Released,
            timestamp_ms: 0,
        }
    }

    fn cancel() -> KeyEvent {
        KeyEvent {
            key: HookKey::Cancel,
            kind: KeyKind::Pressed,
            timestamp_ms: 0,
        }
    }

    #[test]
    fn tap_below_threshold_emits_nothing() {
        let mut g = GestureDetector::new(500);
        let t0 = Instant::now();
        assert_eq!(g.on_key(&press(), t0), None);
        assert_eq!(g.poll(t0 + Duration::from_millis(100)), None);
        assert_eq!(g.on_key(&release(), t0 + Duration::from_millis(200)), None);
        // A later poll must not fire a stale start.
        assert_eq!(g.poll(t0 + Duration::from_secs(2)), None);
    }

    #[test]
    fn hold_crossing_threshold_emits_exactly_one_start() {
        let mut g = GestureDetector::new(500);
        let t0 = Instant::now();
        g.on_key(&press(), t0);
        assert_eq!(g.poll(t0 + Duration::from_millis(499)), None);
        assert_eq!(
            g.poll(t0 + Duration::from_millis(500)),
            Some(GestureSignal::Start)
        );
        assert_eq!(g.poll(t0 + Duration::from_millis(600)), None);
        assert!(g.is_active());
    }

    #[test]
    fn release_after_start_finishes() {
        let mut g = GestureDetector::new(500);
        let t0 = Instant::now();
        g.on_key(&press(), t0);
        g.poll(t0 + Duration::from_millis(500));
        assert_eq!(
            g.on_key(&release(), t0 + Duration::from_secs(3)),
            Some(GestureSignal::Finish)
        );
        assert!(!g.is_active());
    }

    #[test]
    fn escape_during_recording_cancels() {
        let mut g = GestureDetector::new(500);
        let t0 = Instant::now();
        g.on_key(&press(), t0);
        g.poll(t0 + Duration::from_millis(500));
        assert_eq!(
            g.on_key(&cancel(), t0 + Duration::from_secs(1)),
            Some(GestureSignal::Cancel)
        );
        // The trigger release that follows must not also finish.
        assert_eq!(g.on_key(&release(), t0 + Duration::from_secs(1)), None);
    }

    #[test]
    fn escape_while_arming_stands_down_silently() {
        let mut g = GestureDetector::new(500);
        let t0 = Instant::now();
        g.on_key(&press(), t0);
        assert_eq!(g.on_key(&cancel(), t0 + Duration::from_millis(100)), None);
        assert_eq!(g.poll(t0 + Duration::from_secs(1)), None);
    }

    #[test]
    fn key_repeat_while_held_is_ignored() {
        let mut g = GestureDetector::new(500);
        let t0 = Instant::now();
        g.on_key(&press(), t0);
        assert_eq!(g.on_key(&press(), t0 + Duration::from_millis(30)), None);
        g.poll(t0 + Duration::from_millis(500));
        assert_eq!(g.on_key(&press(), t0 + Duration::from_millis(600)), None);
        assert!(g.is_active());
    }

    #[test]
    fn max_duration_forces_finish() {
        let mut g = GestureDetector::new(500).with_max_recording(Duration::from_secs(2));
        let t0 = Instant::now();
        g.on_key(&press(), t0);
        g.poll(t0 + Duration::from_millis(500));
        assert_eq!(g.poll(t0 + Duration::from_secs(1)), None);
        assert_eq!(
            g.poll(t0 + Duration::from_secs(3)),
            Some(GestureSignal::Finish)
        );
        // The eventual key release lands in Waiting and does nothing.
        assert_eq!(g.on_key(&release(), t0 + Duration::from_secs(4)), None);
    }

    #[test]
    fn start_failure_requires_a_fresh_hold() {
        let mut g = GestureDetector::new(500);
        let t0 = Instant::now();
        g.on_key(&press(), t0);
        assert_eq!(g.poll(t0 + Duration::from_secs(1)), Some(GestureSignal::Start));
        g.on_start_failed();
        assert!(!g.is_active());
        assert_eq!(g.poll(t0 + Duration::from_secs(2)), None);
    }

    #[test]
    fn threshold_is_clamped_to_valid_range() {
        assert_eq!(
            GestureDetector::new(10).hold_threshold(),
            Duration::from_millis(HOLD_THRESHOLD_MS_MIN)
        );
        assert_eq!(
            GestureDetector::new(10_000).hold_threshold(),
            Duration::from_millis(HOLD_THRESHOLD_MS_MAX)
        );
    }
}
