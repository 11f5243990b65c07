use frame::SampleTag;

use crate::error::RecorderError;
use crate::sink::{CallContext, SinkState, TransmissionSink};

/// Which pool a recorder belongs to on its source (spec 4.7's `Source`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderKind {
    Digital,
    Analog,
    Debug,
    Sigmf,
}

/// Coarse lifecycle of a recorder (spec 3: `Recorder`). `Idle`/`Recording`/
/// `Stopped` mirror the bound [`TransmissionSink`]'s own state once a call
/// is attached; `Active` covers the brief window between a pool grant and
/// the sink producing its first sample; `Inactive` is used while the
/// recorder is pulled out of the pool for retuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    Available,
    Active,
    Idle,
    Recording,
    Stopped,
    Inactive,
}

/// A reusable processing graph: slicer -> frame assembler -> transmission
/// sink, with a tunable center frequency and at most one bound call.
pub struct Recorder {
    id: usize,
    kind: RecorderKind,
    freq: f64,
    state: RecorderState,
    call_num: Option<u64>,
    sink: TransmissionSink,
}

impl Recorder {
    pub fn new(id: usize, kind: RecorderKind, sample_rate: u32, channels: u16) -> Self {
        Self {
            id,
            kind,
            freq: 0.0,
            state: RecorderState::Available,
            call_num: None,
            sink: TransmissionSink::new(sample_rate, channels),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn kind(&self) -> RecorderKind {
        self.kind
    }

    pub fn freq(&self) -> f64 {
        self.freq
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    pub fn is_available(&self) -> bool {
        self.state == RecorderState::Available
    }

    pub fn call_num(&self) -> Option<u64> {
        self.call_num
    }

    /// Binds this `AVAILABLE` recorder to a call, tuning it to the call's
    /// frequency and handing the sink its call context.
    pub fn bind(&mut self, call: CallContext, slot: Option<i32>) {
        self.freq = call.freq;
        self.call_num = Some(call.call_num);
        self.sink.start_recording(call, slot);
        self.state = RecorderState::Active;
    }

    /// Feeds samples through the sink and reflects the sink's resulting
    /// state back onto the recorder (spec 5: the dispatcher only ever
    /// calls thread-safe setters; this reconciliation happens on the
    /// recorder's own worker thread after each batch).
    pub fn push_samples(&mut self, samples: &[i16]) -> Result<usize, RecorderError> {
        let n = self.sink.push_samples(samples)?;
        self.sync_state();
        Ok(n)
    }

    pub fn apply_tag(&mut self, tag: SampleTag) {
        self.sink.apply_tag(tag);
    }

    /// Forwards to the sink (spec 4.9: an `UPDATE` message keeps a call
    /// alive across a short silence) and reconciles the recorder's own
    /// state, since reviving a `STOPPED` sink moves it back to `IDLE`.
    pub fn set_record_more_transmissions(&mut self, more: bool) {
        self.sink.set_record_more_transmissions(more);
        self.sync_state();
    }

    fn sync_state(&mut self) {
        if self.state == RecorderState::Inactive {
            return;
        }
        self.state = match self.sink.state() {
            SinkState::Available => RecorderState::Available,
            SinkState::Idle => RecorderState::Idle,
            SinkState::Recording => RecorderState::Recording,
            SinkState::Stopped => RecorderState::Stopped,
        };
    }

    /// Releases the bound call and returns this recorder to the pool.
    pub fn release(&mut self) -> Result<(), RecorderError> {
        self.sink.stop_recording()?;
        self.call_num = None;
        self.state = RecorderState::Available;
        Ok(())
    }

    /// Re-aligns a currently bound recorder's center frequency after an
    /// autotune shift (spec 4.7's `tune_digital_recorders`). Only valid
    /// while the recorder is actively bound to a call.
    pub fn retune(&mut self, freq: f64) {
        self.freq = freq;
    }

    /// Pulls the recorder out of its pool, e.g. while the source it
    /// belongs to is being reconfigured.
    pub fn set_inactive(&mut self) {
        self.state = RecorderState::Inactive;
    }

    pub fn set_active(&mut self) {
        self.sync_state();
    }

    pub fn transmission_list(&self) -> &[frame::Transmission] {
        self.sink.transmission_list()
    }

    pub fn total_length_in_seconds(&self) -> f64 {
        self.sink.total_length_in_seconds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn ctx() -> CallContext {
        CallContext {
            call_num: 7,
            talkgroup: 100,
            freq: 851_000_000.0,
            short_name: "test".into(),
            capture_dir: PathBuf::from("/tmp"),
            conventional: false,
            current_source_id: -1,
        }
    }

    #[test]
    fn starts_available_and_binds_into_active() {
        let mut rec = Recorder::new(0, RecorderKind::Digital, 8000, 1);
        assert!(rec.is_available());
        rec.bind(ctx(), None);
        assert_eq!(rec.state(), RecorderState::Active);
        assert_eq!(rec.call_num(), Some(7));
        assert_eq!(rec.freq(), 851_000_000.0);
    }

    #[test]
    fn release_returns_to_available() {
        let mut rec = Recorder::new(1, RecorderKind::Analog, 8000, 1);
        rec.bind(ctx(), None);
        rec.release().unwrap();
        assert!(rec.is_available());
        assert_eq!(rec.call_num(), None);
    }

    #[test]
    fn inactive_state_is_not_overwritten_by_sample_pushes() {
        let mut rec = Recorder::new(2, RecorderKind::Digital, 8000, 1);
        rec.bind(ctx(), None);
        rec.set_inactive();
        assert_eq!(rec.state(), RecorderState::Inactive);
    }
}
