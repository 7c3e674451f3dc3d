use indicatif::{ProgressBar, ProgressStyle};
use skullstrip_atlas::{ProgressCallback, ProgressInfo};

const RESOLUTION: u64 = 1000;

/// Terminal progress bar driven by the stripper's progress reports.
pub struct ProgressBarCallback {
    bar: ProgressBar,
}

impl ProgressBarCallback {
    pub fn new() -> Self {
        Self::with_bar(ProgressBar::new(RESOLUTION))
    }

    /// Wrap an existing bar; its length is reset to the callback's resolution.
    pub fn with_bar(bar: ProgressBar) -> Self {
        bar.set_length(RESOLUTION);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {percent:>3}% {msg}")
            .map(|style| style.progress_chars("#>-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style);
        Self { bar }
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    fn set_fraction(&self, fraction: f64) {
        let position = (fraction.clamp(0.0, 1.0) * RESOLUTION as f64).round() as u64;
        // Stages are reported in order; never move backwards.
        if position > self.bar.position() {
            self.bar.set_position(position);
        }
    }
}

impl Default for ProgressBarCallback {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressCallback for ProgressBarCallback {
    fn on_progress(&self, info: &ProgressInfo) {
        self.set_fraction(info.fraction);
        self.bar.set_message(format!("{} | metric {:.5}", info.stage, info.metric));
    }

    fn on_start(&self) {
        self.bar.reset_elapsed();
        self.bar.set_message("starting");
    }

    fn on_stage(&self, stage: &str, fraction: f64) {
        self.set_fraction(fraction);
        self.bar.set_message(stage.to_string());
    }

    fn on_complete(&self, _info: &ProgressInfo) {
        self.bar.set_position(RESOLUTION);
        self.bar.finish_and_clear();
    }

    fn on_error(&self, _error: &str) {
        self.bar.abandon();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_bar_follows_fraction() {
        let callback = ProgressBarCallback::with_bar(ProgressBar::hidden());
        callback.on_start();
        callback.on_stage("Registration level 1/3", 0.05);
        assert_eq!(callback.position(), 50);

        let info = ProgressInfo::new("Registration level 1/3", 4, Some(10), -0.8, Duration::ZERO, 1.0).with_fraction(0.3);
        callback.on_progress(&info);
        assert_eq!(callback.position(), 300);

        callback.on_stage("Registration level 1/3", 0.1);
        assert_eq!(callback.position(), 300);
    }
}
