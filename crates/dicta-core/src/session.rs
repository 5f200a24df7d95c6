use std::fmt;
use std::time::Instant;

use thiserror::Error;

/// Lifecycle of one recording session.
///
/// `Confirmed` and `Cancelled` are settling states: the tracker passes
/// through them and returns to `Idle` once the buffer has been handed off
/// or discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Recording,
    Confirmed,
    Cancelled,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionPhase::Idle => write!(f, "idle"),
            SessionPhase::Recording => write!(f, "recording"),
            SessionPhase::Confirmed => write!(f, "confirmed"),
            SessionPhase::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl SessionPhase {
    pub fn can_transition_to(self, to: SessionPhase) -> bool {
        matches!(
            (self, to),
            (SessionPhase::Idle, SessionPhase::Recording)
                | (SessionPhase::Recording, SessionPhase::Confirmed)
                | (SessionPhase::Recording, SessionPhase::Cancelled)
                | (SessionPhase::Confirmed, SessionPhase::Idle)
                | (SessionPhase::Cancelled, SessionPhase::Idle)
        )
    }
}

#[derive(Debug, Error)]
#[error("invalid session transition from {from} to {to}")]
pub struct InvalidTransition {
    pub from: SessionPhase,
    pub to: SessionPhase,
}

/// Tracks the single allowed recording session.
///
/// At most one session may be recording at a time; a second `begin` while
/// one is active is rejected, not queued. All transitions are validated.
#[derive(Debug)]
pub struct SessionTracker {
    phase: SessionPhase,
    started_at: Option<Instant>,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self {
            phase: SessionPhase::Idle,
            started_at: None,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_recording(&self) -> bool {
        self.phase == SessionPhase::Recording
    }

    fn transition(&mut self, to: SessionPhase) -> Result<(), InvalidTransition> {
        if self.phase.can_transition_to(to) {
            tracing::debug!("session: {} -> {}", self.phase, to);
            self.phase = to;
            Ok(())
        } else {
            Err(InvalidTransition {
                from: self.phase,
                to,
            })
        }
    }

    /// Start a session. Rejected while another session is active.
    pub fn begin(&mut self, now: Instant) -> Result<(), InvalidTransition> {
        self.transition(SessionPhase::Recording)?;
        self.started_at = Some(now);
        Ok(())
    }

    /// Confirm the session, returning its wall-clock duration in ms.
    /// The tracker settles back to `Idle`.
    pub fn confirm(&mut self, now: Instant) -> Result<u64, InvalidTransition> {
        self.transition(SessionPhase::Confirmed)?;
        let duration_ms = self
            .started_at
            .take()
            .map(|t| now.duration_since(t).as_millis() as u64)
            .unwrap_or(0);
        self.transition(SessionPhase::Idle)?;
        Ok(duration_ms)
    }

    /// Cancel the session; nothing downstream is invoked.
    pub fn cancel(&mut self) -> Result<(), InvalidTransition> {
        self.transition(SessionPhase::Cancelled)?;
        self.started_at = None;
        self.transition(SessionPhase::Idle)?;
        Ok(())
    }

    /// Force back to `Idle` regardless of phase. Used when the input bridge
    /// restarts and any in-flight session state is no longer trustworthy.
    pub fn reset(&mut self) {
        if self.phase != SessionPhase::Idle {
            tracing::warn!("session reset to idle from {}", self.phase);
        }
        self.phase = SessionPhase::Idle;
        self.started_at = None;
    }
}

impl Default for SessionTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn initial_phase_is_idle() {
        let tracker = SessionTracker::new();
        assert_eq!(tracker.phase(), SessionPhase::Idle);
        assert!(!tracker.is_recording());
    }

    #[test]
    fn valid_transitions() {
        assert!(SessionPhase::Idle.can_transition_to(SessionPhase::Recording));
        assert!(SessionPhase::Recording.can_transition_to(SessionPhase::Confirmed));
        assert!(SessionPhase::Recording.can_transition_to(SessionPhase::Cancelled));
        assert!(SessionPhase::Confirmed.can_transition_to(SessionPhase::Idle));
        assert!(SessionPhase::Cancelled.can_transition_to(SessionPhase::Idle));
    }

    #[test]
    fn invalid_transitions() {
        assert!(!SessionPhase::Idle.can_transition_to(SessionPhase::Confirmed));
        assert!(!SessionPhase::Idle.can_transition_to(SessionPhase::Cancelled));
        assert!(!SessionPhase::Confirmed.can_transition_to(SessionPhase::Recording));
        assert!(!SessionPhase::Cancelled.can_transition_to(SessionPhase::Recording));
        assert!(!SessionPhase::Recording.can_transition_to(SessionPhase::Recording));
    }

    #[test]
    fn confirm_reports_duration_and_settles_to_idle() {
        let mut tracker = SessionTracker::new();
        let t0 = Instant::now();
        tracker.begin(t0).unwrap();
        assert!(tracker.is_recording());

        let duration = tracker.confirm(t0 + Duration::from_millis(8000)).unwrap();
        assert_eq!(duration, 8000);
        assert_eq!(tracker.phase(), SessionPhase::Idle);
    }

    #[test]
    fn second_begin_while_recording_is_rejected() {
        let mut tracker = SessionTracker::new();
        let t0 = Instant::now();
        tracker.begin(t0).unwrap();

        let err = tracker.begin(t0 + Duration::from_millis(10)).unwrap_err();
        assert_eq!(err.from, SessionPhase::Recording);
        assert_eq!(err.to, SessionPhase::Recording);
        // Still recording the first session.
        assert!(tracker.is_recording());
    }

    #[test]
    fn cancel_discards_and_settles_to_idle() {
        let mut tracker = SessionTracker::new();
        tracker.begin(Instant::now()).unwrap();
        tracker.cancel().unwrap();
        assert_eq!(tracker.phase(), SessionPhase::Idle);
    }

    #[test]
    fn confirm_without_recording_fails() {
        let mut tracker = SessionTracker::new();
        assert!(tracker.confirm(Instant::now()).is_err());
        assert!(tracker.cancel().is_err());
    }

    #[test]
    fn reset_recovers_from_any_phase() {
        let mut tracker = SessionTracker::new();
        tracker.begin(Instant::now()).unwrap();
        tracker.reset();
        assert_eq!(tracker.phase(), SessionPhase::Idle);
        // A new session can start after the reset.
        tracker.begin(Instant::now()).unwrap();
        assert!(tracker.is_recording());
    }

    #[test]
    fn full_cycle_then_restart() {
        let mut tracker = SessionTracker::new();
        let t0 = Instant::now();
        tracker.begin(t0).unwrap();
        tracker.confirm(t0 + Duration::from_secs(12)).unwrap();

        tracker.begin(t0 + Duration::from_secs(20)).unwrap();
        assert!(tracker.is_recording());
    }
}
