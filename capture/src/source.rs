use std::collections::HashMap;

use recorder::{Recorder, RecorderKind, RecorderState};

use crate::autotune::AutotuneManager;

/// SDR driver family a [`Source`] is backed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverKind {
    Osmosdr,
    Usrp,
}

/// IF frequency candidates considered when computing the decimation margin.
const IF_CANDIDATES: [i64; 3] = [24000, 25000, 32000];

/// A physical SDR receiver covering `[min_hz, max_hz]`, a window narrower
/// than its full sample-rate span by the decimation margin, plus the pools
/// of recorders fanned out from its sample stream.
pub struct Source {
    driver: DriverKind,
    device: String,
    rate: f64,
    center: f64,
    error: f64,
    min_hz: f64,
    max_hz: f64,
    gains: HashMap<String, i32>,
    antenna: String,
    digital_recorders: Vec<Recorder>,
    analog_recorders: Vec<Recorder>,
    debug_recorders: Vec<Recorder>,
    sigmf_recorders: Vec<Recorder>,
    pub autotune: AutotuneManager,
}

impl Source {
    pub fn new(driver: DriverKind, device: impl Into<String>, center: f64, rate: f64, error: f64) -> Self {
        let (min_hz, max_hz) = usable_window(center, rate);
        Self {
            driver,
            device: device.into(),
            rate,
            center,
            error,
            min_hz,
            max_hz,
            gains: HashMap::new(),
            antenna: String::new(),
            digital_recorders: Vec::new(),
            analog_recorders: Vec::new(),
            debug_recorders: Vec::new(),
            sigmf_recorders: Vec::new(),
            autotune: AutotuneManager::new(),
        }
    }

    pub fn driver(&self) -> DriverKind {
        self.driver
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn center(&self) -> f64 {
        self.center
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn error(&self) -> f64 {
        self.error
    }

    pub fn min_hz(&self) -> f64 {
        self.min_hz
    }

    pub fn max_hz(&self) -> f64 {
        self.max_hz
    }

    pub fn covers(&self, freq: f64) -> bool {
        freq >= self.min_hz && freq <= self.max_hz
    }

    pub fn set_gain(&mut self, stage: impl Into<String>, value: i32) {
        self.gains.insert(stage.into(), value);
    }

    pub fn gain(&self, stage: &str) -> Option<i32> {
        self.gains.get(stage).copied()
    }

    pub fn set_antenna(&mut self, antenna: impl Into<String>) {
        self.antenna = antenna.into();
    }

    pub fn antenna(&self) -> &str {
        &self.antenna
    }

    pub fn create_digital_recorders(&mut self, count: usize, sample_rate: u32) {
        for i in 0..count {
            self.digital_recorders
                .push(Recorder::new(i, RecorderKind::Digital, sample_rate, 1));
        }
    }

    pub fn create_analog_recorders(&mut self, count: usize, sample_rate: u32) {
        for i in 0..count {
            self.analog_recorders
                .push(Recorder::new(i, RecorderKind::Analog, sample_rate, 1));
        }
    }

    pub fn create_debug_recorder(&mut self, sample_rate: u32) {
        self.debug_recorders
            .push(Recorder::new(0, RecorderKind::Debug, sample_rate, 1));
    }

    pub fn create_sigmf_recorders(&mut self, count: usize, sample_rate: u32) {
        for i in 0..count {
            self.sigmf_recorders
                .push(Recorder::new(i, RecorderKind::Sigmf, sample_rate, 1));
        }
    }

    pub fn digital_recorder_count(&self) -> usize {
        self.digital_recorders.len()
    }

    pub fn analog_recorder_count(&self) -> usize {
        self.analog_recorders.len()
    }

    pub fn digital_recorders(&self) -> &[Recorder] {
        &self.digital_recorders
    }

    pub fn analog_recorders(&self) -> &[Recorder] {
        &self.analog_recorders
    }

    pub fn num_available_digital_recorders(&self) -> usize {
        self.digital_recorders.iter().filter(|r| r.is_available()).count()
    }

    pub fn num_available_analog_recorders(&self) -> usize {
        self.analog_recorders.iter().filter(|r| r.is_available()).count()
    }

    /// Returns the first `AVAILABLE` digital recorder, or `None` if a
    /// `priority` is given and exceeds the number currently available
    /// (low priority may not consume the last few recorders).
    pub fn get_digital_recorder(&mut self, priority: Option<u32>) -> Option<&mut Recorder> {
        let available = self.num_available_digital_recorders();
        if let Some(priority) = priority {
            if priority as usize > available {
                log::info!(
                    "not recording: priority {priority} but only {available} digital recorders available"
                );
                return None;
            }
        }

        let found = self.digital_recorders.iter_mut().any(|r| r.is_available());
        if !found {
            log::info!("[{}] no digital recorders available", self.device);
            for r in &self.digital_recorders {
                log::info!("[{}] state {:?} freq {}", r.id(), r.state(), r.freq());
            }
            return None;
        }
        self.digital_recorders.iter_mut().find(|r| r.is_available())
    }

    pub fn get_analog_recorder(&mut self, priority: Option<u32>) -> Option<&mut Recorder> {
        let available = self.num_available_analog_recorders();
        if let Some(priority) = priority {
            if priority as usize > available {
                log::info!(
                    "not recording: priority {priority} but only {available} analog recorders available"
                );
                return None;
            }
        }

        let found = self.analog_recorders.iter_mut().find(|r| r.is_available());
        if found.is_none() {
            log::info!("[{}] no analog recorders available", self.device);
        }
        self.analog_recorders.iter_mut().find(|r| r.is_available())
    }

    /// Debug and SigMF recorders sit `INACTIVE` until claimed rather than
    /// `AVAILABLE` like digital/analog pools - preserved verbatim from the
    /// original allocator rather than unified, since only one debug
    /// recorder per source normally exists and nothing else contends for
    /// the sigmf pool's sentinel state.
    pub fn get_debug_recorder(&mut self) -> Option<&mut Recorder> {
        self.debug_recorders
            .iter_mut()
            .find(|r| r.state() == RecorderState::Inactive)
    }

    pub fn get_sigmf_recorder(&mut self) -> Option<&mut Recorder> {
        self.sigmf_recorders
            .iter_mut()
            .find(|r| r.state() == RecorderState::Inactive)
    }

    /// Releases whichever digital or analog recorder is bound to
    /// `call_num` back to its pool. Returns `false` if none currently
    /// holds that call.
    pub fn release_by_call_num(&mut self, call_num: u64) -> Result<bool, recorder::RecorderError> {
        for rec in self.digital_recorders.iter_mut().chain(self.analog_recorders.iter_mut()) {
            if rec.call_num() == Some(call_num) {
                rec.release()?;
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Retunes whichever digital or analog recorder is bound to `call_num`,
    /// used when a trunking message updates a call's frequency mid-flight.
    /// Returns `false` if no recorder currently holds that call.
    pub fn retune_by_call_num(&mut self, call_num: u64, freq: f64) -> bool {
        for rec in self.digital_recorders.iter_mut().chain(self.analog_recorders.iter_mut()) {
            if rec.call_num() == Some(call_num) {
                rec.retune(freq);
                return true;
            }
        }
        false
    }

    /// Sets `record_more_transmissions` on whichever digital or analog
    /// recorder is bound to `call_num` (spec 4.9: an `UPDATE` message keeps
    /// a call alive across a short silence). Returns `false` if no recorder
    /// currently holds that call.
    pub fn set_record_more_transmissions_by_call_num(&mut self, call_num: u64, more: bool) -> bool {
        for rec in self.digital_recorders.iter_mut().chain(self.analog_recorders.iter_mut()) {
            if rec.call_num() == Some(call_num) {
                rec.set_record_more_transmissions(more);
                return true;
            }
        }
        false
    }

    /// Re-aligns every currently active digital recorder after an autotune
    /// shift, applying the manager's current average error as a frequency
    /// correction.
    pub fn tune_digital_recorders(&mut self) {
        let offset = self.autotune.average_error() as f64;
        for rec in self.digital_recorders.iter_mut() {
            if matches!(
                rec.state(),
                RecorderState::Active | RecorderState::Idle | RecorderState::Recording
            ) {
                let freq = rec.freq();
                rec.retune(freq - offset);
            }
        }
    }
}

/// Computes the usable frequency window: narrower than the full
/// sample-rate span by the decimation margin, derived from which of the
/// fixed IF candidates evenly divides the sample rate. The last matching
/// candidate in `IF_CANDIDATES` order wins, matching the original's
/// straight-through loop with no early exit.
pub fn usable_window(center: f64, rate: f64) -> (f64, f64) {
    let s = rate.round() as i64;
    let mut decim: i64 = 24000;

    for &if_freq in IF_CANDIDATES.iter() {
        if s % if_freq != 0 {
            continue;
        }
        let q = s / if_freq;
        if q & 1 != 0 {
            continue;
        }
        decim = if q >= 40 && q % 4 == 0 { q / 4 } else { q / 2 };
    }

    let if1 = s / decim;
    let min_hz = center - (rate / 2.0 - if1 as f64 / 2.0);
    let max_hz = center + (rate / 2.0 - if1 as f64 / 2.0);
    (min_hz, max_hz)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usable_window_narrower_than_full_span() {
        let (min_hz, max_hz) = usable_window(851_000_000.0, 2_400_000.0);
        assert!(min_hz > 851_000_000.0 - 1_200_000.0);
        assert!(max_hz < 851_000_000.0 + 1_200_000.0);
    }

    #[test]
    fn source_covers_freq_inside_window() {
        let src = Source::new(DriverKind::Usrp, "usrp0", 851_000_000.0, 2_400_000.0, 0.0);
        assert!(src.covers(851_000_000.0));
        assert!(!src.covers(900_000_000.0));
    }

    #[test]
    fn priority_gating_denies_low_priority_when_pool_nearly_exhausted() {
        let mut src = Source::new(DriverKind::Usrp, "usrp0", 851_000_000.0, 2_400_000.0, 0.0);
        src.create_digital_recorders(2, 8000);
        assert!(src.get_digital_recorder(Some(3)).is_none());
        assert!(src.get_digital_recorder(Some(1)).is_some());
    }

    #[test]
    fn digital_recorder_allocation_is_first_in_pool_order() {
        let mut src = Source::new(DriverKind::Usrp, "usrp0", 851_000_000.0, 2_400_000.0, 0.0);
        src.create_digital_recorders(3, 8000);
        let first = src.get_digital_recorder(None).unwrap();
        assert_eq!(first.id(), 0);
    }
}
