use indicatif::{ProgressBar, ProgressStyle};

/// Resolution of the rendered bar; fractions are mapped onto this many steps
const BAR_STEPS: u64 = 1000;

/// Latest progress of the active request
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressState {
    /// Completion in `[0.0, 1.0]`
    pub fraction: f64,

    /// Human-readable status line
    pub message: String,
}

impl ProgressState {
    pub fn new() -> Self {
        Self {
            fraction: 0.0,
            message: String::new(),
        }
    }

    /// Overwrite the state, clamping the fraction into `[0.0, 1.0]`
    pub fn update(&mut self, fraction: f64, message: impl Into<String>) {
        self.fraction = clamp_fraction(fraction);
        self.message = message.into();
    }
}

impl Default for ProgressState {
    fn default() -> Self {
        Self::new()
    }
}

/// Clamp into `[0.0, 1.0]`; NaN becomes 0.0
pub fn clamp_fraction(fraction: f64) -> f64 {
    if fraction.is_nan() {
        0.0
    } else {
        fraction.clamp(0.0, 1.0)
    }
}

/// Destination for progress updates emitted by the pipeline stages.
///
/// Each call overwrites the previous value; nothing is queued. Implementations
/// must not fail: a broken display never aborts a download.
#[cfg_attr(test, mockall::automock)]
pub trait ProgressSink: Send {
    fn set(&mut self, fraction: f64, message: &str);
}

impl ProgressSink for ProgressState {
    fn set(&mut self, fraction: f64, message: &str) {
        self.update(fraction, message);
    }
}

/// Progress sink that renders onto an indicatif bar
pub struct BarSink {
    state: ProgressState,
    bar: ProgressBar,
}

impl BarSink {
    /// Create a visible bar on stderr
    pub fn new() -> Self {
        let bar = ProgressBar::new(BAR_STEPS);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        Self {
            state: ProgressState::new(),
            bar,
        }
    }

    /// Create a sink that tracks state without drawing anything
    pub fn hidden() -> Self {
        Self {
            state: ProgressState::new(),
            bar: ProgressBar::hidden(),
        }
    }

    pub fn state(&self) -> &ProgressState {
        &self.state
    }

    /// Stop drawing and leave the final message on screen
    pub fn finish(&self) {
        self.bar.finish_with_message(self.state.message.clone());
    }

    /// Stop drawing and clear the bar
    pub fn abandon(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressSink for BarSink {
    fn set(&mut self, fraction: f64, message: &str) {
        self.state.update(fraction, message);
        self.bar
            .set_position((self.state.fraction * BAR_STEPS as f64).round() as u64);
        self.bar.set_message(self.state.message.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_overwrites_previous_value() {
        let mut state = ProgressState::new();
        state.set(0.3, "first");
        state.set(0.1, "second");
        assert_eq!(state.fraction, 0.1);
        assert_eq!(state.message, "second");
    }

    #[test]
    fn test_fraction_is_clamped() {
        let mut state = ProgressState::new();
        state.set(1.7, "over");
        assert_eq!(state.fraction, 1.0);
        state.set(-0.2, "under");
        assert_eq!(state.fraction, 0.0);
        state.set(f64::NAN, "nan");
        assert_eq!(state.fraction, 0.0);
    }

    #[test]
    fn test_hidden_bar_tracks_state() {
        let mut sink = BarSink::hidden();
        sink.set(0.25, "Downloading: 25.0%");
        assert_eq!(sink.state().fraction, 0.25);
        assert_eq!(sink.state().message, "Downloading: 25.0%");
        sink.finish();
    }
}
