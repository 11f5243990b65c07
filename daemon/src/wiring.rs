//! Builds the object graph spec §2 describes (sources, systems,
//! dispatchers) from a loaded [`recorder_common::Config`] and drives the
//! dispatcher's single application thread (spec §5): it drains
//! `TrunkMessage`s from whatever feeds `message_sender()` — the
//! control-channel bit parser itself is out of scope (spec §1), this is
//! the seam it would plug into, the same way [`capture::SdrFrontEnd`] is
//! the seam a concrete radio driver plugs into — and ticks periodic
//! housekeeping (autotune, patch TTL sweep, metadata snapshots) on a
//! fixed interval.

use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use capture::{DriverKind, Source};
use dispatcher::{Dispatcher, System, SystemIdentity, SystemType, TalkgroupTable, UnitTagMode, UnitTags};
use frame::TrunkMessage;
use recorder_common::{Config, SourceConfig, SystemConfig};

use crate::error::DaemonError;
use crate::metadata::{
    CallStartPayload, CallSummary, CallsActivePayload, ConfigPayload, RatesPayload,
    RecorderSummary, RecordersPayload, SystemPayload, SystemRate, SystemSummary, SystemsPayload,
};
use crate::server::MetadataHub;

/// Digital/analog recorder pools decode at the IMBE frame rate regardless
/// of the source's raw sample rate (spec §4.6/§6: 8 kHz mono output).
const RECORDER_SAMPLE_RATE: u32 = 8000;

pub fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

fn parse_driver_kind(driver: &str) -> Result<DriverKind, DaemonError> {
    match driver {
        "osmosdr" => Ok(DriverKind::Osmosdr),
        "usrp" => Ok(DriverKind::Usrp),
        other => Err(DaemonError::InvalidValue(format!(
            "unknown driver kind {other:?} (expected \"osmosdr\" or \"usrp\")"
        ))),
    }
}

fn parse_system_type(system_type: &str) -> Result<SystemType, DaemonError> {
    match system_type {
        "smartnet" => Ok(SystemType::SmartNet),
        "p25" => Ok(SystemType::P25),
        "conventional" => Ok(SystemType::Conventional),
        "conventionalP25" => Ok(SystemType::ConventionalP25),
        "conventionalDMR" => Ok(SystemType::ConventionalDmr),
        other => Err(DaemonError::InvalidValue(format!(
            "unknown system type {other:?}"
        ))),
    }
}

fn parse_unit_tag_mode(mode: &str) -> UnitTagMode {
    match mode {
        "otaFirst" => UnitTagMode::OtaFirst,
        "userOnly" => UnitTagMode::UserOnly,
        "none" => UnitTagMode::None,
        _ => UnitTagMode::UserFirst,
    }
}

fn build_source(cfg: &SourceConfig) -> Result<Source, DaemonError> {
    let driver = parse_driver_kind(&cfg.driver)?;
    let mut source = Source::new(driver, cfg.device.as_str(), cfg.center, cfg.rate, cfg.error);
    if let Some(antenna) = &cfg.antenna {
        source.set_antenna(antenna.clone());
    }
    source.create_digital_recorders(cfg.digital_recorders, RECORDER_SAMPLE_RATE);
    source.create_analog_recorders(cfg.analog_recorders, RECORDER_SAMPLE_RATE);
    if cfg.debug_recorder {
        source.create_debug_recorder(RECORDER_SAMPLE_RATE);
    }
    source.create_sigmf_recorders(cfg.sigmf_recorders, RECORDER_SAMPLE_RATE);
    Ok(source)
}

fn build_dispatcher(cfg: &SystemConfig, capture_dir: &str) -> Result<Dispatcher, DaemonError> {
    let system_type = parse_system_type(&cfg.system_type)?;
    let identity = SystemIdentity {
        nac: cfg.nac,
        sysid: cfg.sysid,
        wacn: cfg.wacn,
    };
    let system = System::new(
        cfg.short_name.as_str(),
        system_type,
        identity,
        cfg.p25_phase2,
        cfg.control_channels.clone(),
    );

    let mut talkgroups = TalkgroupTable::new();
    talkgroups
        .load(&cfg.talkgroups_file)
        .map_err(|e| DaemonError::Fatal(e.into()))?;

    let mut unit_tags = UnitTags::new(parse_unit_tag_mode(&cfg.unit_tag_mode));
    if let Some(path) = &cfg.unit_tags_file {
        unit_tags.load_unit_tags(path).map_err(|e| DaemonError::Fatal(e.into()))?;
    }
    if let Some(path) = &cfg.unit_tags_ota_file {
        unit_tags
            .load_unit_tags_ota(path)
            .map_err(|e| DaemonError::Fatal(e.into()))?;
    }

    Ok(Dispatcher::new(
        system,
        talkgroups,
        unit_tags,
        capture_dir.into(),
    ))
}

/// One configured trunking system's runtime state, plus the rolling
/// message count used to report a `rates` metadata snapshot each tick.
struct SystemRuntime {
    dispatcher: Dispatcher,
    messages_since_tick: u32,
}

/// Owns every [`Source`] and [`Dispatcher`] built from config, and drains
/// [`TrunkMessage`]s against them on the calling thread.
pub struct Daemon {
    hub: Arc<MetadataHub>,
    sources: Vec<Source>,
    systems: Vec<SystemRuntime>,
    tx: mpsc::Sender<(usize, TrunkMessage)>,
    rx: mpsc::Receiver<(usize, TrunkMessage)>,
}

impl Daemon {
    pub fn build(config: &Config, hub: Arc<MetadataHub>) -> Result<Self, DaemonError> {
        let mut sources = Vec::with_capacity(config.sources.len());
        for source_cfg in &config.sources {
            sources.push(build_source(source_cfg)?);
        }

        let mut systems = Vec::with_capacity(config.systems.len());
        for system_cfg in &config.systems {
            let dispatcher = build_dispatcher(system_cfg, &config.capture_dir)?;
            systems.push(SystemRuntime {
                dispatcher,
                messages_since_tick: 0,
            });
        }

        let (tx, rx) = mpsc::channel();
        Ok(Self {
            hub,
            sources,
            systems,
            tx,
            rx,
        })
    }

    /// A clone of the sending half the control-channel parser (out of
    /// scope) would use to hand decoded [`TrunkMessage`]s to this daemon,
    /// tagged with the index of the system they belong to (the index into
    /// the config's `systems` array).
    pub fn message_sender(&self) -> mpsc::Sender<(usize, TrunkMessage)> {
        self.tx.clone()
    }

    pub fn system_count(&self) -> usize {
        self.systems.len()
    }

    /// Publishes the one-time `config` and `systems` snapshots new
    /// subscribers expect to see first.
    pub fn publish_startup_snapshot(&self, config: &Config) {
        self.hub.publish(
            "config",
            ConfigPayload {
                capture_dir: config.capture_dir.clone(),
                call_timeout: config.call_timeout,
                log_level: config.log_level.clone(),
                broadcast_signals: config.broadcast_signals,
            },
        );
        self.hub.publish(
            "systems",
            SystemsPayload {
                systems: self
                    .systems
                    .iter()
                    .map(|s| SystemSummary {
                        short_name: s.dispatcher.system().short_name().to_string(),
                        system_type: format!("{:?}", s.dispatcher.system().system_type()),
                    })
                    .collect(),
            },
        );
        for runtime in &self.systems {
            let system = runtime.dispatcher.system();
            let identity = system.identity();
            self.hub.publish(
                "system",
                SystemPayload {
                    short_name: system.short_name().to_string(),
                    system_type: format!("{:?}", system.system_type()),
                    nac: identity.nac,
                    sysid: identity.sysid,
                    wacn: identity.wacn,
                    control_channel: system.control_channel(),
                },
            );
        }
    }

    /// Runs until `message_sender()`'s last clone is dropped. Drains
    /// queued messages as they arrive; when none arrive within
    /// `tick_interval`, runs periodic housekeeping instead.
    pub fn run(&mut self, tick_interval: Duration) {
        loop {
            match self.rx.recv_timeout(tick_interval) {
                Ok((system_index, message)) => self.dispatch(system_index, message),
                Err(mpsc::RecvTimeoutError::Timeout) => self.tick(),
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    log::info!("trunk message channel closed, shutting down dispatch loop");
                    break;
                }
            }
        }
    }

    fn dispatch(&mut self, system_index: usize, message: TrunkMessage) {
        let Some(runtime) = self.systems.get_mut(system_index) else {
            log::warn!("message for unknown system index {system_index}, dropping");
            return;
        };
        runtime.messages_since_tick += 1;
        let is_grant = matches!(message, TrunkMessage::Grant { .. });

        let chosen = find_covering_source(&mut self.sources, &message);
        if chosen.is_none() {
            log::warn!(
                "{}: no configured source covers this message's frequency",
                runtime.dispatcher.system().short_name()
            );
        }
        // Falls back to the first configured source so a grant outside
        // every source's window still records a NO_SOURCE monitoring call
        // rather than being silently dropped.
        let Some(source) = chosen.or_else(|| self.sources.first_mut()) else {
            return;
        };

        if let Err(e) = runtime.dispatcher.handle_message(message, source, now_unix()) {
            log::error!("dispatch error: {e}");
        }

        if is_grant {
            self.publish_call_start(system_index);
        }
        self.publish_calls_active(system_index);
    }

    fn publish_call_start(&self, system_index: usize) {
        let runtime = &self.systems[system_index];
        if let Some(call) = runtime
            .dispatcher
            .calls()
            .active_calls()
            .max_by_key(|c| c.call_num)
        {
            self.hub.publish(
                "call_start",
                CallStartPayload {
                    call: CallSummary::from_call(call),
                },
            );
        }
    }

    fn publish_calls_active(&self, system_index: usize) {
        let runtime = &self.systems[system_index];
        self.hub.publish(
            "calls_active",
            CallsActivePayload {
                calls: runtime
                    .dispatcher
                    .calls()
                    .active_calls()
                    .map(CallSummary::from_call)
                    .collect(),
            },
        );
    }

    fn tick(&mut self) {
        let now = now_unix();
        let mut rates = Vec::with_capacity(self.systems.len());

        for runtime in self.systems.iter_mut() {
            for source in self.sources.iter_mut() {
                runtime.dispatcher.tick(source, now);
            }
            rates.push(SystemRate {
                system: runtime.dispatcher.system().short_name().to_string(),
                decode_rate: runtime.messages_since_tick as f64,
            });
            runtime.messages_since_tick = 0;
        }
        self.hub.publish("rates", RatesPayload { rates });

        let recorders: Vec<RecorderSummary> = self
            .sources
            .iter()
            .flat_map(|s| s.digital_recorders().iter().chain(s.analog_recorders().iter()))
            .map(RecorderSummary::from_recorder)
            .collect();
        self.hub.publish("recorders", RecordersPayload { recorders });
        log_pool_utilization(&self.sources);

        for index in 0..self.systems.len() {
            self.publish_calls_active(index);
        }
    }
}

/// Logs a pool usage summary per source, at each tick per spec §4.9
/// ("log recorder-pool utilization").
fn log_pool_utilization(sources: &[Source]) {
    for source in sources {
        log::debug!(
            "[{}] digital {}/{} available, analog {}/{} available",
            source.device(),
            source.num_available_digital_recorders(),
            source.digital_recorder_count(),
            source.num_available_analog_recorders(),
            source.analog_recorder_count(),
        );
    }
}

fn find_covering_source<'s>(sources: &'s mut [Source], message: &TrunkMessage) -> Option<&'s mut Source> {
    let freq_hz = match message {
        TrunkMessage::Grant { freq_hz, .. } | TrunkMessage::Update { freq_hz, .. } => *freq_hz as f64,
        _ => return sources.first_mut(),
    };
    sources.iter_mut().find(|s| s.covers(freq_hz))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn write_talkgroups_csv(dir: &std::path::Path) -> String {
        let path = dir.join("tg.csv");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "Number,Mode,AlphaTag,Description,Tag,Group,Priority").unwrap();
        writeln!(f, "100,D,Dispatch,Dispatch,Law,Police,1").unwrap();
        path.to_string_lossy().to_string()
    }

    fn minimal_config(dir: &std::path::Path) -> Config {
        let talkgroups_file = write_talkgroups_csv(dir);
        serde_json::from_value(serde_json::json!({
            "capture_dir": dir.to_string_lossy(),
            "sources": [{
                "device": "usrp0",
                "driver": "usrp",
                "center": 851_000_000.0,
                "rate": 2_400_000.0,
                "digital_recorders": 2
            }],
            "systems": [{
                "short_name": "testsys",
                "type": "p25",
                "control_channels": [851_000_000u64],
                "talkgroups_file": talkgroups_file
            }]
        }))
        .unwrap()
    }

    #[test]
    fn build_wires_one_source_and_one_dispatcher() {
        let dir = tempfile::tempdir().unwrap();
        let config = minimal_config(dir.path());
        let hub = MetadataHub::new("inst", "key");
        let daemon = Daemon::build(&config, hub).unwrap();
        assert_eq!(daemon.system_count(), 1);
        assert_eq!(daemon.sources.len(), 1);
    }

    #[test]
    fn dispatching_a_grant_binds_a_recorder_and_publishes_call_start() {
        let dir = tempfile::tempdir().unwrap();
        let config = minimal_config(dir.path());
        let hub = MetadataHub::new("inst", "key");
        let mut daemon = Daemon::build(&config, hub).unwrap();

        daemon.dispatch(
            0,
            TrunkMessage::Grant {
                talkgroup: 100,
                freq_hz: 851_000_000,
                source_unit_id: 5001,
                slot: None,
                encrypted: false,
            },
        );

        let runtime = &daemon.systems[0];
        let call = runtime.dispatcher.calls().get(100).unwrap();
        assert!(call.recorder_id.is_some());
    }

    #[test]
    fn unmatched_system_index_is_dropped_without_panicking() {
        let dir = tempfile::tempdir().unwrap();
        let config = minimal_config(dir.path());
        let hub = MetadataHub::new("inst", "key");
        let mut daemon = Daemon::build(&config, hub).unwrap();
        daemon.dispatch(
            7,
            TrunkMessage::ControlChannel {
                freq_hz: 851_000_000,
            },
        );
    }
}
