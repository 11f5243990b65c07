//! A single voice call: the unit of work the dispatcher tracks per grant,
//! and the table that deduplicates/supersedes calls on the same talkgroup.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    /// Waiting on a source/recorder, or recording with no voice activity.
    Monitoring,
    Recording,
    Inactive,
}

/// Why a call is sitting in `Monitoring` instead of `Recording`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitoringSubstate {
    /// The talkgroup grant referenced isn't in the talkgroup table at all.
    UnknownTg,
    /// The talkgroup table lists this talkgroup with negative priority.
    IgnoredTg,
    /// No `Source` covers the granted frequency.
    NoSource,
    /// A source covers the frequency but its recorder pool is exhausted.
    NoRecorder,
    Encrypted,
    /// A grant arrived for a talkgroup already recording on the same
    /// frequency; the existing call continues, this one is a no-op.
    Duplicate,
    /// A grant arrived for a talkgroup already recording on a different
    /// frequency; the prior call was ended in favor of this one.
    Superseded,
    Unspecified,
}

#[derive(Debug, Clone)]
pub struct Call {
    pub call_num: u64,
    pub talkgroup: u32,
    pub freq_hz: u64,
    pub source_unit_id: i64,
    pub slot: Option<u8>,
    pub system_short_name: String,
    pub capture_dir: String,
    pub conventional: bool,
    pub state: CallState,
    pub substate: MonitoringSubstate,
    pub start_time: i64,
    pub recorder_id: Option<u32>,
}

impl Call {
    pub fn new(
        call_num: u64,
        talkgroup: u32,
        freq_hz: u64,
        source_unit_id: i64,
        slot: Option<u8>,
        system_short_name: impl Into<String>,
        capture_dir: impl Into<String>,
        conventional: bool,
        start_time: i64,
    ) -> Self {
        Self {
            call_num,
            talkgroup,
            freq_hz,
            source_unit_id,
            slot,
            system_short_name: system_short_name.into(),
            capture_dir: capture_dir.into(),
            conventional,
            state: CallState::Monitoring,
            substate: MonitoringSubstate::Unspecified,
            start_time,
            recorder_id: None,
        }
    }

    pub fn bind_recorder(&mut self, recorder_id: u32) {
        self.recorder_id = Some(recorder_id);
        self.state = CallState::Recording;
        self.substate = MonitoringSubstate::Unspecified;
    }

    pub fn set_monitoring(&mut self, substate: MonitoringSubstate) {
        self.state = CallState::Monitoring;
        self.substate = substate;
    }

    pub fn end(&mut self) {
        self.state = CallState::Inactive;
    }
}

/// What a new grant means for the talkgroup's existing call, if any.
pub enum GrantOutcome {
    /// No call existed for this talkgroup; the caller should start one.
    New,
    /// An identical grant (same talkgroup, same frequency) is already
    /// active; the existing call continues untouched.
    Duplicate,
    /// A call for this talkgroup is active on a different frequency; it
    /// has been marked `Superseded` and removed, the caller should start
    /// a fresh one for the new grant.
    Superseded(Call),
}

#[derive(Default)]
pub struct CallTable {
    by_talkgroup: HashMap<u32, Call>,
    next_call_num: u64,
}

impl CallTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_call_num(&mut self) -> u64 {
        self.next_call_num += 1;
        self.next_call_num
    }

    /// Decides how a grant for `talkgroup` at `freq_hz` relates to any
    /// call already tracked for that talkgroup.
    pub fn evaluate_grant(&mut self, talkgroup: u32, freq_hz: u64) -> GrantOutcome {
        match self.by_talkgroup.get(&talkgroup) {
            Some(existing) if existing.state == CallState::Recording && existing.freq_hz == freq_hz => {
                GrantOutcome::Duplicate
            }
            Some(existing) if existing.state == CallState::Recording => {
                let mut superseded = self.by_talkgroup.remove(&talkgroup).unwrap();
                superseded.set_monitoring(MonitoringSubstate::Superseded);
                GrantOutcome::Superseded(superseded)
            }
            _ => GrantOutcome::New,
        }
    }

    pub fn insert(&mut self, call: Call) {
        self.by_talkgroup.insert(call.talkgroup, call);
    }

    pub fn get(&self, talkgroup: u32) -> Option<&Call> {
        self.by_talkgroup.get(&talkgroup)
    }

    pub fn get_mut(&mut self, talkgroup: u32) -> Option<&mut Call> {
        self.by_talkgroup.get_mut(&talkgroup)
    }

    pub fn remove(&mut self, talkgroup: u32) -> Option<Call> {
        self.by_talkgroup.remove(&talkgroup)
    }

    pub fn active_calls(&self) -> impl Iterator<Item = &Call> {
        self.by_talkgroup.values()
    }

    pub fn len(&self) -> usize {
        self.by_talkgroup.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_talkgroup.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(num: u64, tg: u32, freq: u64) -> Call {
        Call::new(num, tg, freq, 1001, None, "sys", "/tmp", false, 1000)
    }

    #[test]
    fn first_grant_for_a_talkgroup_is_new() {
        let mut table = CallTable::new();
        assert!(matches!(table.evaluate_grant(100, 851_000_000), GrantOutcome::New));
    }

    #[test]
    fn repeated_grant_same_frequency_is_duplicate() {
        let mut table = CallTable::new();
        let mut c = call(1, 100, 851_000_000);
        c.bind_recorder(0);
        table.insert(c);

        assert!(matches!(
            table.evaluate_grant(100, 851_000_000),
            GrantOutcome::Duplicate
        ));
        assert_eq!(table.get(100).unwrap().state, CallState::Recording);
    }

    #[test]
    fn grant_on_new_frequency_supersedes_existing_call() {
        let mut table = CallTable::new();
        let mut c = call(1, 100, 851_000_000);
        c.bind_recorder(0);
        table.insert(c);

        match table.evaluate_grant(100, 852_000_000) {
            GrantOutcome::Superseded(old) => {
                assert_eq!(old.substate, MonitoringSubstate::Superseded);
                assert_eq!(old.freq_hz, 851_000_000);
            }
            _ => panic!("expected Superseded"),
        }
        assert!(table.get(100).is_none());
    }

    #[test]
    fn call_nums_increase_monotonically() {
        let mut table = CallTable::new();
        assert_eq!(table.next_call_num(), 1);
        assert_eq!(table.next_call_num(), 2);
    }
}
