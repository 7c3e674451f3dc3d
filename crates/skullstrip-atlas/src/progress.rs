//! Progress tracking and callbacks for skull stripping.
//!
//! The stripper reports every optimizer iteration and every phase change to
//! a [`ProgressTracker`], which fans the information out to any number of
//! [`ProgressCallback`]s. Callbacks can also request cooperative
//! cancellation through [`ProgressCallback::should_abort`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Progress information for one stripping update.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// Phase the update belongs to (`"registration level 1/3"`, `"refinement"`, ...).
    pub stage: String,
    /// Iteration within the stage.
    pub iteration: usize,
    /// Total number of iterations in the stage (if known).
    pub total_iterations: Option<usize>,
    /// Current metric value.
    pub metric: f64,
    /// Current optimizer step length.
    pub step_length: f64,
    /// Overall completion in `[0, 1]`.
    pub fraction: f64,
    /// Time elapsed since start.
    pub elapsed: Duration,
    /// Estimated remaining time.
    pub estimated_remaining: Option<Duration>,
    /// Additional metrics.
    pub metrics: Vec<(String, f64)>,
}

impl ProgressInfo {
    /// Create new progress information.
    pub fn new(
        stage: impl Into<String>,
        iteration: usize,
        total_iterations: Option<usize>,
        metric: f64,
        elapsed: Duration,
        step_length: f64,
    ) -> Self {
        Self {
            stage: stage.into(),
            iteration,
            total_iterations,
            metric,
            step_length,
            fraction: 0.0,
            elapsed,
            estimated_remaining: None,
            metrics: Vec::new(),
        }
    }

    /// Set overall completion.
    pub fn with_fraction(mut self, fraction: f64) -> Self {
        self.fraction = fraction.clamp(0.0, 1.0);
        self
    }

    /// Iteration progress within the stage.
    pub fn progress_percent(&self) -> Option<f64> {
        self.total_iterations
            .filter(|&total| total > 0)
            .map(|total| (self.iteration as f64 / total as f64) * 100.0)
    }

    /// Estimate remaining time from overall completion.
    pub fn calculate_remaining(&mut self) {
        if self.fraction > 0.0 && self.fraction < 1.0 {
            let total = self.elapsed.as_secs_f64() / self.fraction;
            self.estimated_remaining = Some(Duration::from_secs_f64(total - self.elapsed.as_secs_f64()));
        }
    }

    /// Add a custom metric.
    pub fn add_metric(&mut self, name: impl Into<String>, value: f64) {
        self.metrics.push((name.into(), value));
    }
}

/// Progress callback trait for monitoring skull stripping.
pub trait ProgressCallback: Send + Sync {
    /// Called at each optimizer iteration.
    fn on_progress(&self, info: &ProgressInfo);

    /// Called when stripping starts.
    fn on_start(&self) {}

    /// Called when a new phase begins.
    fn on_stage(&self, _stage: &str, _fraction: f64) {}

    /// Called when stripping completes successfully.
    fn on_complete(&self, _info: &ProgressInfo) {}

    /// Called when stripping fails.
    fn on_error(&self, _error: &str) {}

    /// Polled between iterations and phases; `true` cancels the run.
    fn should_abort(&self) -> bool {
        false
    }
}

/// Console progress callback that logs to tracing.
#[derive(Debug, Clone)]
pub struct ConsoleProgressCallback {
    /// Log interval (iterations).
    pub log_interval: usize,
}

impl Default for ConsoleProgressCallback {
    fn default() -> Self {
        Self { log_interval: 25 }
    }
}

impl ConsoleProgressCallback {
    /// Create a new console progress callback.
    pub fn new(log_interval: usize) -> Self {
        Self {
            log_interval: log_interval.max(1),
        }
    }
}

impl ProgressCallback for ConsoleProgressCallback {
    fn on_progress(&self, info: &ProgressInfo) {
        if info.iteration % self.log_interval == 0 || info.total_iterations == Some(info.iteration) {
            let remaining = info
                .estimated_remaining
                .map(|d| format!("{:.1}s", d.as_secs_f64()))
                .unwrap_or_else(|| "N/A".to_string());

            tracing::info!(
                "{} | Iter {}/{} | Metric: {:.6} | Step: {:.3e} | {:.0}% | ETA: {}",
                info.stage,
                info.iteration,
                info.total_iterations.map(|n| n.to_string()).unwrap_or_else(|| "?".to_string()),
                info.metric,
                info.step_length,
                info.fraction * 100.0,
                remaining
            );

            for (name, value) in &info.metrics {
                tracing::info!("  {}: {:.6}", name, value);
            }
        }
    }

    fn on_start(&self) {
        tracing::info!("Skull stripping started");
    }

    fn on_stage(&self, stage: &str, fraction: f64) {
        tracing::info!("{} ({:.0}%)", stage, fraction * 100.0);
    }

    fn on_complete(&self, info: &ProgressInfo) {
        tracing::info!(
            "Skull stripping completed in {:.2}s with final metric: {:.6}",
            info.elapsed.as_secs_f64(),
            info.metric
        );
    }

    fn on_error(&self, error: &str) {
        tracing::error!("Skull stripping failed: {}", error);
    }
}

/// History callback that records all progress information.
#[derive(Debug, Clone, Default)]
pub struct HistoryCallback {
    history: Arc<Mutex<Vec<ProgressInfo>>>,
    stages: Arc<Mutex<Vec<String>>>,
}

impl HistoryCallback {
    /// Create a new history callback.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the recorded iteration history.
    pub fn get_history(&self) -> Vec<ProgressInfo> {
        self.history.lock().map(|h| h.clone()).unwrap_or_default()
    }

    /// Stages announced so far, in order.
    pub fn get_stages(&self) -> Vec<String> {
        self.stages.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Clear the history.
    pub fn clear(&self) {
        if let Ok(mut history) = self.history.lock() {
            history.clear();
        }
        if let Ok(mut stages) = self.stages.lock() {
            stages.clear();
        }
    }
}

impl ProgressCallback for HistoryCallback {
    fn on_progress(&self, info: &ProgressInfo) {
        if let Ok(mut history) = self.history.lock() {
            history.push(info.clone());
        }
    }

    fn on_stage(&self, stage: &str, _fraction: f64) {
        if let Ok(mut stages) = self.stages.lock() {
            stages.push(stage.to_string());
        }
    }
}

/// Cancellation flag shared between the caller and a running stripper.
///
/// Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationCallback {
    cancelled: Arc<AtomicBool>,
    /// Cancel automatically once this many iterations have been reported.
    after_iterations: Option<usize>,
    seen: Arc<Mutex<usize>>,
}

impl CancellationCallback {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation after `iterations` progress updates.
    pub fn after_iterations(iterations: usize) -> Self {
        Self {
            after_iterations: Some(iterations),
            ..Self::default()
        }
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl ProgressCallback for CancellationCallback {
    fn on_progress(&self, _info: &ProgressInfo) {
        if let Some(limit) = self.after_iterations {
            if let Ok(mut seen) = self.seen.lock() {
                *seen += 1;
                if *seen >= limit {
                    self.cancel();
                }
            }
        }
    }

    fn should_abort(&self) -> bool {
        self.is_cancelled()
    }
}

/// Progress tracker that manages multiple callbacks.
#[derive(Clone, Default)]
pub struct ProgressTracker {
    callbacks: Vec<Arc<dyn ProgressCallback>>,
    start_time: Arc<Mutex<Option<Instant>>>,
}

impl ProgressTracker {
    /// Create a new progress tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a callback.
    pub fn add_callback(&mut self, callback: Arc<dyn ProgressCallback>) {
        self.callbacks.push(callback);
    }

    /// Builder form of [`add_callback`](Self::add_callback).
    pub fn with_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.add_callback(callback);
        self
    }

    fn elapsed(&self) -> Duration {
        self.start_time
            .lock()
            .ok()
            .and_then(|start| start.map(|t| t.elapsed()))
            .unwrap_or(Duration::ZERO)
    }

    /// Start tracking.
    pub fn start(&self) {
        if let Ok(mut start) = self.start_time.lock() {
            *start = Some(Instant::now());
        }
        for callback in &self.callbacks {
            callback.on_start();
        }
    }

    /// Announce a new phase.
    pub fn stage(&self, stage: &str, fraction: f64) {
        for callback in &self.callbacks {
            callback.on_stage(stage, fraction);
        }
    }

    /// Report one optimizer iteration.
    pub fn update(
        &self,
        stage: &str,
        iteration: usize,
        total_iterations: Option<usize>,
        metric: f64,
        step_length: f64,
        fraction: f64,
    ) {
        let mut info = ProgressInfo::new(stage, iteration, total_iterations, metric, self.elapsed(), step_length)
            .with_fraction(fraction);
        info.calculate_remaining();

        for callback in &self.callbacks {
            callback.on_progress(&info);
        }
    }

    /// Complete tracking.
    pub fn complete(&self, final_metric: f64) {
        let info = ProgressInfo::new("done", 0, None, final_metric, self.elapsed(), 0.0).with_fraction(1.0);
        for callback in &self.callbacks {
            callback.on_complete(&info);
        }
    }

    /// Report error.
    pub fn error(&self, error: &str) {
        for callback in &self.callbacks {
            callback.on_error(error);
        }
    }

    /// Whether any callback requested cancellation.
    pub fn should_abort(&self) -> bool {
        self.callbacks.iter().any(|c| c.should_abort())
    }
}
