use std::collections::VecDeque;
use std::sync::Mutex;

/// Number of amplitude samples the window holds. The window always has
/// exactly this length; a fresh window reads as a flat baseline.
pub const WINDOW_LEN: usize = 64;

/// Amplitude reported before any real audio has arrived.
pub const SILENT_LEVEL: f32 = 0.0;

/// Fixed-length rolling window of amplitude samples for the level meter.
///
/// Written by the audio capture callback (one peak value per chunk) and read
/// concurrently by the UI refresh consumer. Readers always get a full copy,
/// never a partially-updated window.
pub struct Visualizer {
    window: Mutex<VecDeque<f32>>,
}

impl Visualizer {
    pub fn new() -> Self {
        let mut window = VecDeque::with_capacity(WINDOW_LEN);
        window.extend(std::iter::repeat_n(SILENT_LEVEL, WINDOW_LEN));
        Self {
            window: Mutex::new(window),
        }
    }

    /// Push one amplitude sample, evicting the oldest.
    pub fn push(&self, level: f32) {
        let mut window = self.window.lock().unwrap();
        window.pop_front();
        window.push_back(level.clamp(0.0, 1.0));
    }

    /// Refill the window with the silent baseline.
    pub fn reset(&self) {
        let mut window = self.window.lock().unwrap();
        window.clear();
        window.extend(std::iter::repeat_n(SILENT_LEVEL, WINDOW_LEN));
    }

    /// Consistent copy of the current window, oldest sample first.
    pub fn snapshot(&self) -> Vec<f32> {
        let window = self.window.lock().unwrap();
        window.iter().copied().collect()
    }
}

impl Default for Visualizer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_window_is_silent_baseline_of_full_length() {
        let viz = Visualizer::new();
        let snap = viz.snapshot();
        assert_eq!(snap.len(), WINDOW_LEN);
        assert!(snap.iter().all(|&s| s == SILENT_LEVEL));
    }

    #[test]
    fn length_is_invariant_under_pushes() {
        let viz = Visualizer::new();
        for i in 0..5 {
            viz.push(i as f32 / 10.0);
            assert_eq!(viz.snapshot().len(), WINDOW_LEN);
        }
        for i in 0..(WINDOW_LEN * 3) {
            viz.push((i % 10) as f32 / 10.0);
        }
        assert_eq!(viz.snapshot().len(), WINDOW_LEN);
    }

    #[test]
    fn oldest_sample_is_evicted_first() {
        let viz = Visualizer::new();
        for _ in 0..WINDOW_LEN {
            viz.push(0.5);
        }
        viz.push(0.9);
        let snap = viz.snapshot();
        assert_eq!(snap[WINDOW_LEN - 1], 0.9);
        assert_eq!(snap[0], 0.5);
    }

    #[test]
    fn levels_are_clamped_to_unit_range() {
        let viz = Visualizer::new();
        viz.push(3.0);
        viz.push(-1.0);
        let snap = viz.snapshot();
        assert_eq!(snap[WINDOW_LEN - 2], 1.0);
        assert_eq!(snap[WINDOW_LEN - 1], 0.0);
    }

    #[test]
    fn reset_restores_baseline() {
        let viz = Visualizer::new();
        for _ in 0..10 {
            viz.push(0.7);
        }
        viz.reset();
        let snap = viz.snapshot();
        assert_eq!(snap.len(), WINDOW_LEN);
        assert!(snap.iter().all(|&s| s == SILENT_LEVEL));
    }
}
