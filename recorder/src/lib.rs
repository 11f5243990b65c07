//! Per-recorder transmission pipeline: a reusable processing graph that
//! segments a continuous, tagged sample stream into discrete, correctly
//! framed audio transmissions and writes them out as WAV files alongside
//! their `Transmission` metadata.

mod error;
mod recorder;
mod sink;

pub use error::RecorderError;
pub use recorder::{Recorder, RecorderKind, RecorderState};
pub use sink::{CallContext, SinkState, TransmissionSink};
