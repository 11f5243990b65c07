//! Shared data types for the trunked-radio recorder pipeline.
//!
//! No logic lives here, only the shapes that cross crate boundaries: raw
//! I/Q samples, P25 voice frame bits, out-of-band sample tags, the
//! `Transmission` record written alongside each WAV file, and the
//! `TrunkMessage` sum type the control-channel parser (out of scope)
//! hands to the dispatcher.

mod iq;
mod transmission;
mod trunk;
mod voice;

pub use self::iq::IqSample;
pub use self::transmission::Transmission;
pub use self::trunk::TrunkMessage;
pub use self::voice::{
    PcmFrame, SampleTag, TaggedSample, VoiceFrameBits, FRAME_VECTOR_LEN, PCM_SAMPLES_PER_FRAME,
};
