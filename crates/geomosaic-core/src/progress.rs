//! Progress reporting.
//!
//! Callbacks receive a completion fraction in `[0, 1]`. Stages may report
//! from worker threads, so every callback is `Send + Sync`.

use std::sync::Mutex;

use tracing::info;

pub trait ProgressCallback: Send + Sync {
    fn report(&self, fraction: f64);
}

/// Discards every report.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn report(&self, _fraction: f64) {}
}

/// Logs at `info` every time another tenth of the work completes.
#[derive(Debug)]
pub struct LogProgress {
    label: String,
    last_decile: Mutex<i64>,
}

impl LogProgress {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            last_decile: Mutex::new(-1),
        }
    }
}

impl ProgressCallback for LogProgress {
    fn report(&self, fraction: f64) {
        let decile = (fraction.clamp(0.0, 1.0) * 10.0).floor() as i64;
        let Ok(mut last) = self.last_decile.lock() else {
            return;
        };
        if decile > *last {
            *last = decile;
            info!(task = %self.label, percent = decile * 10, "Progress");
        }
    }
}

/// Maps `[0, 1]` onto `[from, to]` of an outer callback and never lets the
/// reported value go backwards.
pub struct SubProgress<'a> {
    inner: &'a dyn ProgressCallback,
    from: f64,
    to: f64,
    best: Mutex<f64>,
}

impl<'a> SubProgress<'a> {
    pub fn new(inner: &'a dyn ProgressCallback, from: f64, to: f64) -> Self {
        Self {
            inner,
            from,
            to,
            best: Mutex::new(0.0),
        }
    }
}

impl ProgressCallback for SubProgress<'_> {
    fn report(&self, fraction: f64) {
        let fraction = if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            return;
        };
        let Ok(mut best) = self.best.lock() else {
            return;
        };
        if fraction < *best {
            return;
        }
        *best = fraction;
        self.inner
            .report(self.from + (self.to - self.from) * fraction);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Records every report it receives.
    #[derive(Default)]
    pub(crate) struct RecordingProgress {
        pub(crate) values: Mutex<Vec<f64>>,
    }

    impl ProgressCallback for RecordingProgress {
        fn report(&self, fraction: f64) {
            self.values.lock().unwrap().push(fraction);
        }
    }

    #[test]
    fn test_sub_progress_maps_range() {
        let rec = RecordingProgress::default();
        let sub = SubProgress::new(&rec, 0.5, 1.0);
        sub.report(0.0);
        sub.report(0.5);
        sub.report(1.0);
        assert_eq!(*rec.values.lock().unwrap(), vec![0.5, 0.75, 1.0]);
    }

    #[test]
    fn test_sub_progress_is_monotonic() {
        let rec = RecordingProgress::default();
        let sub = SubProgress::new(&rec, 0.0, 1.0);
        sub.report(0.6);
        sub.report(0.4);
        sub.report(f64::NAN);
        sub.report(2.0);
        assert_eq!(*rec.values.lock().unwrap(), vec![0.6, 1.0]);
    }

    #[test]
    fn test_log_progress_accepts_any_order() {
        let log = LogProgress::new("tiles");
        log.report(0.35);
        log.report(0.1);
        log.report(1.0);
        assert_eq!(*log.last_decile.lock().unwrap(), 10);
    }
}
