//! Reacts to decoded control-channel messages: resolves a grant against the
//! talkgroup table, allocates or releases recorders on a [`capture::Source`],
//! and keeps the system's patch/subscriber bookkeeping current.

use std::path::PathBuf;

use capture::Source;
use frame::TrunkMessage;
use recorder::CallContext;

use crate::call::{Call, CallState, CallTable, GrantOutcome, MonitoringSubstate};
use crate::error::DispatcherError;
use crate::system::System;
use crate::talkgroup::TalkgroupTable;
use crate::unit_tags::UnitTags;

pub struct Dispatcher {
    system: System,
    talkgroups: TalkgroupTable,
    unit_tags: UnitTags,
    calls: CallTable,
    capture_dir: PathBuf,
}

impl Dispatcher {
    pub fn new(system: System, talkgroups: TalkgroupTable, unit_tags: UnitTags, capture_dir: PathBuf) -> Self {
        Self {
            system,
            talkgroups,
            unit_tags,
            calls: CallTable::new(),
            capture_dir,
        }
    }

    pub fn system(&self) -> &System {
        &self.system
    }

    pub fn system_mut(&mut self) -> &mut System {
        &mut self.system
    }

    pub fn calls(&self) -> &CallTable {
        &self.calls
    }

    pub fn unit_tags(&self) -> &UnitTags {
        &self.unit_tags
    }

    pub fn unit_tags_mut(&mut self) -> &mut UnitTags {
        &mut self.unit_tags
    }

    /// Dispatches one decoded control-channel message against `source`.
    pub fn handle_message(
        &mut self,
        msg: TrunkMessage,
        source: &mut Source,
        now: i64,
    ) -> Result<(), DispatcherError> {
        match msg {
            TrunkMessage::Grant {
                talkgroup,
                freq_hz,
                source_unit_id,
                slot,
                encrypted,
            } => self.handle_grant(talkgroup, freq_hz, source_unit_id, slot, encrypted, source, now),
            TrunkMessage::Update { talkgroup, freq_hz } => {
                self.handle_update(talkgroup, freq_hz, source);
                Ok(())
            }
            TrunkMessage::PatchAdd { supergroup, talkgroup } => {
                self.system.update_active_talkgroup_patches(supergroup, talkgroup, now);
                Ok(())
            }
            TrunkMessage::PatchDelete { supergroup, talkgroup } => {
                self.system.delete_talkgroup_patch(supergroup, talkgroup);
                Ok(())
            }
            TrunkMessage::ControlChannel { freq_hz } => {
                log::info!("{}: control channel reported at {freq_hz} Hz", self.system.short_name());
                Ok(())
            }
            TrunkMessage::SubscriberActivity {
                talkgroup,
                source_unit_id,
            } => {
                self.system.record_subscriber_activity(talkgroup, source_unit_id, now);
                Ok(())
            }
        }
    }

    fn handle_grant(
        &mut self,
        talkgroup: u32,
        freq_hz: u64,
        source_unit_id: i64,
        slot: Option<u8>,
        encrypted: bool,
        source: &mut Source,
        now: i64,
    ) -> Result<(), DispatcherError> {
        match self.calls.evaluate_grant(talkgroup, freq_hz) {
            GrantOutcome::Duplicate => {
                log::debug!("{}: duplicate grant for tg {talkgroup}", self.system.short_name());
                return Ok(());
            }
            GrantOutcome::Superseded(mut old) => {
                log::info!(
                    "{}: tg {talkgroup} superseded, releasing recorder from {} Hz",
                    self.system.short_name(),
                    old.freq_hz
                );
                if old.recorder_id.is_some() {
                    source.retune_by_call_num(old.call_num, old.freq_hz as f64);
                    self.release_call(&mut old, source)?;
                }
            }
            GrantOutcome::New => {}
        }

        let call_num = self.calls.next_call_num();
        let mut call = Call::new(
            call_num,
            talkgroup,
            freq_hz,
            source_unit_id,
            slot,
            self.system.short_name(),
            self.capture_dir.to_string_lossy(),
            false,
            now,
        );

        let Some(tg) = self.talkgroups.get(talkgroup) else {
            call.set_monitoring(MonitoringSubstate::UnknownTg);
            self.calls.insert(call);
            return Ok(());
        };
        if !tg.should_record() {
            call.set_monitoring(MonitoringSubstate::IgnoredTg);
            self.calls.insert(call);
            return Ok(());
        }
        if encrypted {
            call.set_monitoring(MonitoringSubstate::Encrypted);
            self.calls.insert(call);
            return Ok(());
        }
        if !source.covers(freq_hz as f64) {
            call.set_monitoring(MonitoringSubstate::NoSource);
            self.calls.insert(call);
            return Ok(());
        }

        let priority = tg.priority.max(0) as u32;
        let Some(rec) = source.get_digital_recorder(Some(priority)) else {
            call.set_monitoring(MonitoringSubstate::NoRecorder);
            self.calls.insert(call);
            return Ok(());
        };

        rec.bind(
            CallContext {
                call_num,
                talkgroup: talkgroup as i64,
                freq: freq_hz as f64,
                short_name: self.system.short_name().to_string(),
                capture_dir: self.capture_dir.clone(),
                conventional: false,
                current_source_id: source_unit_id,
            },
            slot.map(|s| s as i32),
        );
        call.bind_recorder(rec.id() as u32);
        self.calls.insert(call);
        Ok(())
    }

    fn handle_update(&mut self, talkgroup: u32, freq_hz: u64, source: &mut Source) {
        let Some(call) = self.calls.get_mut(talkgroup) else {
            return;
        };
        if call.state != CallState::Recording {
            return;
        }
        call.freq_hz = freq_hz;
        source.retune_by_call_num(call.call_num, freq_hz as f64);
        source.set_record_more_transmissions_by_call_num(call.call_num, true);
    }

    fn release_call(&mut self, call: &mut Call, source: &mut Source) -> Result<(), DispatcherError> {
        source.release_by_call_num(call.call_num)?;
        call.end();
        Ok(())
    }

    /// Periodic housekeeping: purges stale talkgroup patches and re-applies
    /// the source's current autotune correction to every active recorder.
    pub fn tick(&mut self, source: &mut Source, now: i64) {
        self.system.clear_stale_talkgroup_patches(now);
        source.tune_digital_recorders();
        log::debug!(
            "{}: {} active calls, {} digital recorders available",
            self.system.short_name(),
            self.calls.len(),
            source.num_available_digital_recorders()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::{SystemIdentity, SystemType};
    use capture::DriverKind;

    fn dispatcher_with_source() -> (Dispatcher, Source) {
        let system = System::new(
            "test-sys",
            SystemType::P25,
            SystemIdentity {
                nac: 0x123,
                sysid: 0x1,
                wacn: 0xBEE00,
            },
            false,
            vec![851_000_000],
        );
        let mut talkgroups = TalkgroupTable::new();
        talkgroups.load(dummy_talkgroups_csv()).unwrap();
        let unit_tags = UnitTags::new(crate::unit_tags::UnitTagMode::None);
        let dispatcher = Dispatcher::new(system, talkgroups, unit_tags, PathBuf::from("/tmp/captures"));

        let mut source = Source::new(DriverKind::Usrp, "usrp0", 851_000_000.0, 2_400_000.0, 0.0);
        source.create_digital_recorders(2, 8000);
        (dispatcher, source)
    }

    fn dummy_talkgroups_csv() -> PathBuf {
        use std::io::Write as _;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("talkgroups.csv");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "Number,Mode,AlphaTag,Description,Tag,Group,Priority").unwrap();
        writeln!(f, "100,D,Dispatch,Dispatch,Law,Police,1").unwrap();
        writeln!(f, "200,D,Ignored,Ignored,Law,Police,-1").unwrap();
        std::mem::forget(dir);
        path
    }

    #[test]
    fn grant_for_known_talkgroup_binds_a_recorder() {
        let (mut dispatcher, mut source) = dispatcher_with_source();
        dispatcher
            .handle_message(
                TrunkMessage::Grant {
                    talkgroup: 100,
                    freq_hz: 851_000_000,
                    source_unit_id: 5001,
                    slot: None,
                    encrypted: false,
                },
                &mut source,
                1000,
            )
            .unwrap();

        let call = dispatcher.calls().get(100).unwrap();
        assert_eq!(call.state, CallState::Recording);
        assert!(call.recorder_id.is_some());
    }

    #[test]
    fn grant_for_unknown_talkgroup_is_unknown_tg_monitoring() {
        let (mut dispatcher, mut source) = dispatcher_with_source();
        dispatcher
            .handle_message(
                TrunkMessage::Grant {
                    talkgroup: 999,
                    freq_hz: 851_000_000,
                    source_unit_id: 5001,
                    slot: None,
                    encrypted: false,
                },
                &mut source,
                1000,
            )
            .unwrap();

        let call = dispatcher.calls().get(999).unwrap();
        assert_eq!(call.state, CallState::Monitoring);
        assert_eq!(call.substate, MonitoringSubstate::UnknownTg);
    }

    #[test]
    fn grant_for_ignored_talkgroup_does_not_bind_a_recorder() {
        let (mut dispatcher, mut source) = dispatcher_with_source();
        dispatcher
            .handle_message(
                TrunkMessage::Grant {
                    talkgroup: 200,
                    freq_hz: 851_000_000,
                    source_unit_id: 5001,
                    slot: None,
                    encrypted: false,
                },
                &mut source,
                1000,
            )
            .unwrap();

        let call = dispatcher.calls().get(200).unwrap();
        assert_eq!(call.substate, MonitoringSubstate::IgnoredTg);
    }

    #[test]
    fn grant_out_of_source_coverage_is_no_source() {
        let (mut dispatcher, mut source) = dispatcher_with_source();
        dispatcher
            .handle_message(
                TrunkMessage::Grant {
                    talkgroup: 100,
                    freq_hz: 900_000_000,
                    source_unit_id: 5001,
                    slot: None,
                    encrypted: false,
                },
                &mut source,
                1000,
            )
            .unwrap();

        let call = dispatcher.calls().get(100).unwrap();
        assert_eq!(call.substate, MonitoringSubstate::NoSource);
    }

    #[test]
    fn patch_add_then_delete_round_trips_through_system() {
        let (mut dispatcher, mut source) = dispatcher_with_source();
        dispatcher
            .handle_message(
                TrunkMessage::PatchAdd {
                    supergroup: 300,
                    talkgroup: 301,
                },
                &mut source,
                1000,
            )
            .unwrap();
        assert_eq!(dispatcher.system().get_talkgroup_patch(300), vec![301]);

        dispatcher
            .handle_message(
                TrunkMessage::PatchDelete {
                    supergroup: 300,
                    talkgroup: 301,
                },
                &mut source,
                1001,
            )
            .unwrap();
        assert!(dispatcher.system().get_talkgroup_patch(300).is_empty());
    }
}
