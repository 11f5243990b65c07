use std::collections::VecDeque;

/// Maximum number of error measurements kept in history.
const MAX_HISTORY: usize = 20;
/// Warning threshold in PPM.
const PPM_THRESHOLD: f64 = 3.5;
/// Round suggested error to nearest this many Hz.
const SUGGESTED_ERROR_ROUNDING: i32 = 10;

/// Tracks the last [`MAX_HISTORY`] tuning-error measurements reported by a
/// source's FLL band-edge filter and keeps a running average correction,
/// applied as a frequency offset at the start of each call and refined as
/// recorders stop. Operation mirrors `AutotuneManager` in the original:
/// this struct is deliberately source-agnostic (no back-reference to the
/// owning `Source`) so the caller passes in the center frequency each time,
/// avoiding a parent pointer.
pub struct AutotuneManager {
    error_history: VecDeque<i32>,
    average_error: i32,
}

impl Default for AutotuneManager {
    fn default() -> Self {
        Self::new()
    }
}

impl AutotuneManager {
    pub fn new() -> Self {
        Self {
            error_history: VecDeque::with_capacity(MAX_HISTORY),
            average_error: 0,
        }
    }

    /// Adds a new measurement (`observed_error + current_offset`) to the
    /// front of the history, drops the oldest once the cap is exceeded, and
    /// recomputes the cached average. Logs a warning if the resulting
    /// correction exceeds [`PPM_THRESHOLD`] relative to `center_freq_hz`.
    pub fn add_error_measurement(&mut self, observed_error: i32, current_offset: i32, center_freq_hz: f64) {
        let total_error = observed_error + current_offset;
        self.error_history.push_front(total_error);
        if self.error_history.len() > MAX_HISTORY {
            self.error_history.pop_back();
        }

        let total: i32 = self.error_history.iter().sum();
        self.average_error = total / self.error_history.len() as i32;

        log::debug!(
            "autotune errors: {:?} avg: {}",
            self.error_history,
            self.average_error
        );

        if center_freq_hz != 0.0 {
            let ppm_correction = self.average_error as f64 / (center_freq_hz / 1_000_000.0);
            if ppm_correction.abs() > PPM_THRESHOLD {
                log::warn!(
                    "autotune offset {} Hz exceeds {PPM_THRESHOLD} PPM (center freq {:.3} MHz), verify initial offset",
                    self.average_error,
                    center_freq_hz / 1e6
                );
            }
        }
    }

    pub fn average_error(&self) -> i32 {
        self.average_error
    }

    /// A log line showing the live correction and a config-ready suggested
    /// `error` value (rounded to the nearest [`SUGGESTED_ERROR_ROUNDING`] Hz).
    pub fn status_string(&self, initial_error: f64) -> String {
        let total_error = initial_error - self.average_error as f64;
        let suggested_error =
            ((total_error / SUGGESTED_ERROR_ROUNDING as f64).round() as i32) * SUGGESTED_ERROR_ROUNDING;
        format!(
            "AutoTune: {:+} Hz, \"error\": {}",
            self.average_error, suggested_error
        )
    }

    pub fn reset(&mut self) {
        self.error_history.clear();
    }
}
