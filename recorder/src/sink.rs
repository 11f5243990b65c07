use std::fs;
use std::io::BufWriter;
use std::path::PathBuf;

use chrono::{Local, TimeZone};
use frame::{SampleTag, Transmission};

use crate::error::RecorderError;

/// Everything the sink needs from the call it is bound to. Kept separate
/// from the dispatcher's own `Call` type so this crate has no dependency
/// on the dispatcher.
#[derive(Debug, Clone)]
pub struct CallContext {
    pub call_num: u64,
    pub talkgroup: i64,
    pub freq: f64,
    pub short_name: String,
    pub capture_dir: PathBuf,
    pub conventional: bool,
    pub current_source_id: i64,
}

/// Observable lifecycle of a transmission sink (spec section 4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkState {
    Available,
    Idle,
    Recording,
    Stopped,
}

/// Per-recorder segmenting writer. Turns a continuous tagged sample stream
/// into a sequence of WAV files, one per transmission.
pub struct TransmissionSink {
    sample_rate: u32,
    channels: u16,
    state: SinkState,
    call: Option<CallContext>,
    slot: Option<i32>,
    curr_src_id: i64,
    sample_count: u64,
    spike_count: u64,
    error_count: u64,
    prior_transmission_length: f64,
    start_time: i64,
    stop_time: i64,
    termination_flag: bool,
    record_more_transmissions: bool,
    current_base_filename: String,
    current_filename: String,
    writer: Option<hound::WavWriter<BufWriter<fs::File>>>,
    transmission_list: Vec<Transmission>,
}

impl TransmissionSink {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
            state: SinkState::Available,
            call: None,
            slot: None,
            curr_src_id: -1,
            sample_count: 0,
            spike_count: 0,
            error_count: 0,
            prior_transmission_length: 0.0,
            start_time: 0,
            stop_time: 0,
            termination_flag: false,
            record_more_transmissions: true,
            current_base_filename: String::new(),
            current_filename: String::new(),
            writer: None,
            transmission_list: Vec::new(),
        }
    }

    pub fn state(&self) -> SinkState {
        self.state
    }

    pub fn transmission_list(&self) -> &[Transmission] {
        &self.transmission_list
    }

    pub fn clear_transmission_list(&mut self) {
        self.transmission_list.clear();
        self.transmission_list.shrink_to_fit();
    }

    pub fn length_in_seconds(&self) -> f64 {
        self.sample_count as f64 / self.sample_rate as f64
    }

    pub fn total_length_in_seconds(&self) -> f64 {
        self.length_in_seconds() + self.prior_transmission_length
    }

    /// Binds a call to this (`AVAILABLE`) sink, resetting all per-call
    /// counters and moving it to `IDLE`.
    pub fn start_recording(&mut self, call: CallContext, slot: Option<i32>) {
        if self.writer.is_some() {
            log::trace!(
                "start_recording() called while a file was still open for {}",
                self.current_filename
            );
        }

        self.slot = slot;
        self.curr_src_id = call.current_source_id;
        self.prior_transmission_length = 0.0;
        self.error_count = 0;
        self.spike_count = 0;
        self.record_more_transmissions = true;
        self.clear_transmission_list();
        self.sample_count = 0;
        self.call = Some(call);
        self.state = SinkState::Idle;

        log::info!(
            "[{}] starting transmission sink, src: {}",
            self.call.as_ref().unwrap().short_name,
            self.curr_src_id
        );
    }

    /// Ends any open transmission, releases the call, returns to `AVAILABLE`.
    pub fn stop_recording(&mut self) -> Result<(), RecorderError> {
        if self.sample_count > 0 {
            self.end_transmission()?;
        }
        if self.state == SinkState::Recording {
            log::trace!("stop_recording() called while still RECORDING");
        }
        self.call = None;
        self.termination_flag = false;
        self.state = SinkState::Available;
        Ok(())
    }

    /// Adopts a source-unit ID tag. A source change never ends a
    /// transmission by itself; only `terminate` does (spec 4.6).
    pub fn set_source(&mut self, src: i64) {
        if self.curr_src_id == -1 {
            self.curr_src_id = src;
        } else if src != self.curr_src_id {
            if self.state == SinkState::Recording {
                log::warn!(
                    "source id changed mid-recording: current {} new {}, not splitting transmission",
                    self.curr_src_id,
                    src
                );
            }
            self.curr_src_id = src;
        }
    }

    pub fn set_record_more_transmissions(&mut self, more: bool) {
        if self.record_more_transmissions != more {
            log::trace!(
                "setting record_more_transmissions to {more}, state {:?}, samples {}",
                self.state,
                self.sample_count
            );
        }
        if !self.record_more_transmissions && more && self.state == SinkState::Stopped {
            self.sample_count = 0;
            self.state = SinkState::Idle;
        }
        self.record_more_transmissions = more;
    }

    /// Applies an out-of-band tag delivered alongside the sample at the
    /// given offset within the current batch.
    pub fn apply_tag(&mut self, tag: SampleTag) {
        match tag {
            SampleTag::SrcId(src) => self.set_source(src),
            SampleTag::Terminate => self.termination_flag = true,
            SampleTag::SpikeCount(count) => {
                if self.state == SinkState::Recording {
                    self.spike_count = count;
                }
            }
            SampleTag::ErrorCount(count) => {
                if self.state == SinkState::Recording {
                    self.error_count = count;
                }
            }
        }
    }

    /// Feeds a batch of demodulated samples through the state machine.
    /// Returns the number of samples accepted (all of them, even when
    /// dropped, mirroring the block's `work()` contract of always
    /// consuming its input).
    pub fn push_samples(&mut self, samples: &[i16]) -> Result<usize, RecorderError> {
        if self.call.is_none() {
            log::error!("dropping {} samples - no call bound", samples.len());
            return Ok(samples.len());
        }

        if self.termination_flag {
            self.termination_flag = false;
            return self.handle_termination(samples.len());
        }

        if matches!(self.state, SinkState::Stopped | SinkState::Available) {
            if samples.len() > 1 {
                log::warn!(
                    "dropping {} samples - sink state is {:?}",
                    samples.len(),
                    self.state
                );
            }
            return Ok(samples.len());
        }

        if self.state == SinkState::Idle {
            self.open_new_transmission()?;
            self.state = SinkState::Recording;
            self.record_more_transmissions = false;
        }

        if self.state == SinkState::Recording {
            let writer = self.writer.as_mut().ok_or(RecorderError::NoCall)?;
            for &sample in samples {
                writer.write_sample(sample)?;
                self.sample_count += 1;
            }
        }

        Ok(samples.len())
    }

    fn handle_termination(&mut self, noutput_items: usize) -> Result<usize, RecorderError> {
        if self.call.is_none() {
            log::error!("termination tag seen with no current call");
            self.state = SinkState::Stopped;
            return Ok(noutput_items);
        }

        if self.sample_count > 0 {
            let conventional = self.call.as_ref().unwrap().conventional;
            self.end_transmission()?;
            self.state = if conventional || self.record_more_transmissions {
                SinkState::Idle
            } else {
                SinkState::Stopped
            };
        }

        Ok(noutput_items)
    }

    fn open_new_transmission(&mut self) -> Result<(), RecorderError> {
        if self.writer.is_some() {
            log::info!("opening a new transmission while a file was still open");
            self.close_wav()?;
        }

        let now = Local::now().timestamp();
        self.start_time = if now == self.start_time { now + 1 } else { now };

        self.create_base_filename();
        self.current_filename = format!("{}.wav", self.current_base_filename);

        let spec = hound::WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let writer = hound::WavWriter::create(&self.current_filename, spec)?;
        self.writer = Some(writer);
        self.sample_count = 0;

        log::info!(
            "[{}] starting new transmission: {}",
            self.call.as_ref().unwrap().short_name,
            self.current_filename
        );
        Ok(())
    }

    fn create_base_filename(&mut self) {
        let call = self.call.as_ref().expect("call bound while creating filename");
        let start = Local
            .timestamp_opt(self.start_time, 0)
            .single()
            .unwrap_or_else(Local::now);

        let dir = call
            .capture_dir
            .join(&call.short_name)
            .join(format!("{}", start.format("%Y")))
            .join(format!("{}", start.format("%-m")))
            .join(format!("{}", start.format("%-d")));
        if let Err(e) = fs::create_dir_all(&dir) {
            log::error!("failed to create capture directory {dir:?}: {e}");
        }

        let freq = call.freq as i64;
        self.current_base_filename = match self.slot {
            Some(slot) => format!(
                "{}/{}-{}_{}.{}",
                dir.display(),
                call.talkgroup,
                self.start_time,
                freq,
                slot
            ),
            None => format!(
                "{}/{}-{}_{}",
                dir.display(),
                call.talkgroup,
                self.start_time,
                freq
            ),
        };
    }

    fn close_wav(&mut self) -> Result<(), RecorderError> {
        if let Some(writer) = self.writer.take() {
            writer.finalize()?;
        }
        Ok(())
    }

    fn end_transmission(&mut self) -> Result<(), RecorderError> {
        if self.sample_count == 0 {
            log::error!("ending a transmission with sample_count == 0");
            return Ok(());
        }

        self.close_wav()?;
        self.stop_time = Local::now().timestamp();

        let transmission = Transmission {
            source_unit_id: self.curr_src_id,
            start_time: self.start_time,
            stop_time: self.stop_time,
            sample_count: self.sample_count,
            spike_count: self.spike_count,
            error_count: self.error_count,
            length_seconds: self.length_in_seconds(),
            base_filename: self.current_base_filename.clone(),
            filename: self.current_filename.clone(),
        };
        self.prior_transmission_length += transmission.length_seconds;
        self.transmission_list.push(transmission);

        self.sample_count = 0;
        self.error_count = 0;
        self.spike_count = 0;
        self.curr_src_id = -1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn ctx(dir: &std::path::Path) -> CallContext {
        CallContext {
            call_num: 1,
            talkgroup: 4200,
            freq: 851_012_500.0,
            short_name: "county".into(),
            capture_dir: dir.to_path_buf(),
            conventional: false,
            current_source_id: -1,
        }
    }

    #[test]
    fn starts_available_and_rejects_samples() {
        let mut sink = TransmissionSink::new(8000, 1);
        assert_eq!(sink.state(), SinkState::Available);
        let accepted = sink.push_samples(&[1, 2, 3]).unwrap();
        assert_eq!(accepted, 3);
        assert_eq!(sink.transmission_list().len(), 0);
    }

    #[test]
    fn records_a_transmission_end_to_end() {
        let dir = tempdir().unwrap();
        let mut sink = TransmissionSink::new(8000, 1);
        sink.start_recording(ctx(dir.path()), None);
        assert_eq!(sink.state(), SinkState::Idle);

        sink.push_samples(&[0i16; 160]).unwrap();
        assert_eq!(sink.state(), SinkState::Recording);

        sink.apply_tag(SampleTag::Terminate);
        sink.push_samples(&[]).unwrap();

        assert_eq!(sink.transmission_list().len(), 1);
        let t = &sink.transmission_list()[0];
        assert_eq!(t.sample_count, 160);
        assert!(std::path::Path::new(&t.filename).exists());
    }

    #[test]
    fn conventional_call_returns_to_idle_after_terminate() {
        let dir = tempdir().unwrap();
        let mut sink = TransmissionSink::new(8000, 1);
        let mut call = ctx(dir.path());
        call.conventional = true;
        sink.start_recording(call, None);
        sink.push_samples(&[0i16; 80]).unwrap();
        sink.apply_tag(SampleTag::Terminate);
        sink.push_samples(&[]).unwrap();
        assert_eq!(sink.state(), SinkState::Idle);
    }

    #[test]
    fn trunked_call_stops_after_terminate_without_record_more() {
        let dir = tempdir().unwrap();
        let mut sink = TransmissionSink::new(8000, 1);
        sink.start_recording(ctx(dir.path()), None);
        sink.push_samples(&[0i16; 80]).unwrap();
        sink.set_record_more_transmissions(false);
        sink.apply_tag(SampleTag::Terminate);
        sink.push_samples(&[]).unwrap();
        assert_eq!(sink.state(), SinkState::Stopped);
    }

    #[test]
    fn source_change_mid_recording_does_not_split_transmission() {
        let dir = tempdir().unwrap();
        let mut sink = TransmissionSink::new(8000, 1);
        sink.start_recording(ctx(dir.path()), None);
        sink.push_samples(&[0i16; 40]).unwrap();
        sink.apply_tag(SampleTag::SrcId(99));
        sink.push_samples(&[0i16; 40]).unwrap();
        sink.apply_tag(SampleTag::Terminate);
        sink.push_samples(&[]).unwrap();
        assert_eq!(sink.transmission_list().len(), 1);
        assert_eq!(sink.transmission_list()[0].sample_count, 80);
        assert_eq!(sink.transmission_list()[0].source_unit_id, 99);
    }

    #[test]
    fn stop_recording_returns_to_available() {
        let dir = tempdir().unwrap();
        let mut sink = TransmissionSink::new(8000, 1);
        sink.start_recording(ctx(dir.path()), None);
        sink.push_samples(&[0i16; 10]).unwrap();
        sink.stop_recording().unwrap();
        assert_eq!(sink.state(), SinkState::Available);
    }
}
