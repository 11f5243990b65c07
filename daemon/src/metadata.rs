//! Structured metadata schema (spec §6): JSON objects broadcast to
//! downstream consumers (uploaders, dashboards — both out of scope
//! themselves, per spec §1) over the metadata TCP port. Every object
//! shares the `{type, instanceId, instanceKey, ...}` envelope; the
//! `type` field is the discriminant a consumer switches on.

use serde::Serialize;

use dispatcher::{Call, CallState, MonitoringSubstate};
use recorder::{RecorderKind, RecorderState};

/// Wraps a payload with the envelope fields every metadata message shares.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope<T: Serialize> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(rename = "instanceId")]
    pub instance_id: String,
    #[serde(rename = "instanceKey")]
    pub instance_key: String,
    #[serde(flatten)]
    pub payload: T,
}

impl<T: Serialize> Envelope<T> {
    pub fn new(kind: &'static str, instance_id: &str, instance_key: &str, payload: T) -> Self {
        Self {
            kind,
            instance_id: instance_id.to_string(),
            instance_key: instance_key.to_string(),
            payload,
        }
    }

    /// Serializes this message as one newline-terminated JSON line, the
    /// wire framing the metadata TCP server writes to every subscriber.
    pub fn to_line(&self) -> serde_json::Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigPayload {
    #[serde(rename = "captureDir")]
    pub capture_dir: String,
    #[serde(rename = "callTimeout")]
    pub call_timeout: u64,
    #[serde(rename = "logLevel")]
    pub log_level: String,
    #[serde(rename = "broadcastSignals")]
    pub broadcast_signals: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemRate {
    pub system: String,
    #[serde(rename = "decoderate")]
    pub decode_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RatesPayload {
    pub rates: Vec<SystemRate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemSummary {
    #[serde(rename = "shortName")]
    pub short_name: String,
    #[serde(rename = "type")]
    pub system_type: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemsPayload {
    pub systems: Vec<SystemSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemPayload {
    #[serde(rename = "shortName")]
    pub short_name: String,
    #[serde(rename = "type")]
    pub system_type: String,
    pub nac: u16,
    pub sysid: u16,
    pub wacn: u32,
    #[serde(rename = "controlChannel")]
    pub control_channel: u64,
}

/// `Call` summary shape shared by `calls_active` (a snapshot of every
/// tracked call) and `call_start` (one newly created call).
#[derive(Debug, Clone, Serialize)]
pub struct CallSummary {
    pub id: u64,
    #[serde(rename = "shortName")]
    pub short_name: String,
    pub talkgroup: u32,
    pub freq: u64,
    #[serde(rename = "srcId")]
    pub source_id: i64,
    pub slot: Option<u8>,
    pub state: &'static str,
    #[serde(rename = "monitoringState")]
    pub monitoring_state: Option<&'static str>,
    #[serde(rename = "startTime")]
    pub start_time: i64,
}

impl CallSummary {
    pub fn from_call(call: &Call) -> Self {
        Self {
            id: call.call_num,
            short_name: call.system_short_name.clone(),
            talkgroup: call.talkgroup,
            freq: call.freq_hz,
            source_id: call.source_unit_id,
            slot: call.slot,
            state: call_state_str(call.state),
            monitoring_state: (call.state == CallState::Monitoring)
                .then(|| monitoring_substate_str(call.substate)),
            start_time: call.start_time,
        }
    }
}

fn call_state_str(state: CallState) -> &'static str {
    match state {
        CallState::Monitoring => "monitoring",
        CallState::Recording => "recording",
        CallState::Inactive => "inactive",
    }
}

fn monitoring_substate_str(substate: MonitoringSubstate) -> &'static str {
    match substate {
        MonitoringSubstate::UnknownTg => "unknown_tg",
        MonitoringSubstate::IgnoredTg => "ignored_tg",
        MonitoringSubstate::NoSource => "no_source",
        MonitoringSubstate::NoRecorder => "no_recorder",
        MonitoringSubstate::Encrypted => "encrypted",
        MonitoringSubstate::Duplicate => "duplicate",
        MonitoringSubstate::Superseded => "superseded",
        MonitoringSubstate::Unspecified => "unspecified",
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CallsActivePayload {
    pub calls: Vec<CallSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CallStartPayload {
    pub call: CallSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecorderSummary {
    pub id: usize,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub state: &'static str,
    pub freq: f64,
    #[serde(rename = "callNum")]
    pub call_num: Option<u64>,
}

impl RecorderSummary {
    pub fn from_recorder(rec: &recorder::Recorder) -> Self {
        Self {
            id: rec.id(),
            kind: recorder_kind_str(rec.kind()),
            state: recorder_state_str(rec.state()),
            freq: rec.freq(),
            call_num: rec.call_num(),
        }
    }
}

fn recorder_kind_str(kind: RecorderKind) -> &'static str {
    match kind {
        RecorderKind::Digital => "digital",
        RecorderKind::Analog => "analog",
        RecorderKind::Debug => "debug",
        RecorderKind::Sigmf => "sigmf",
    }
}

fn recorder_state_str(state: RecorderState) -> &'static str {
    match state {
        RecorderState::Available => "available",
        RecorderState::Active => "active",
        RecorderState::Idle => "idle",
        RecorderState::Recording => "recording",
        RecorderState::Stopped => "stopped",
        RecorderState::Inactive => "inactive",
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RecordersPayload {
    pub recorders: Vec<RecorderSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecorderPayload {
    pub recorder: RecorderSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignalPayload {
    pub source: String,
    pub freq: f64,
    #[serde(rename = "errorHz")]
    pub error_hz: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_carries_type_and_instance_fields() {
        let payload = ConfigPayload {
            capture_dir: "/tmp".into(),
            call_timeout: 3,
            log_level: "info".into(),
            broadcast_signals: false,
        };
        let env = Envelope::new("config", "inst-1", "key-1", payload);
        let line = env.to_line().unwrap();
        assert!(line.ends_with('\n'));
        let value: serde_json::Value = serde_json::from_str(line.trim_end()).unwrap();
        assert_eq!(value["type"], "config");
        assert_eq!(value["instanceId"], "inst-1");
        assert_eq!(value["instanceKey"], "key-1");
        assert_eq!(value["captureDir"], "/tmp");
    }

    #[test]
    fn call_summary_reports_monitoring_substate_only_while_monitoring() {
        let mut call = Call::new(1, 100, 851_000_000, -1, None, "sys", "/tmp", false, 1000);
        let summary = CallSummary::from_call(&call);
        assert_eq!(summary.state, "monitoring");
        assert_eq!(summary.monitoring_state, Some("unspecified"));

        call.bind_recorder(0);
        let summary = CallSummary::from_call(&call);
        assert_eq!(summary.state, "recording");
        assert_eq!(summary.monitoring_state, None);
    }
}
