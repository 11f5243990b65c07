//! Fixed-point IMBE vocoder decode path: 88 encoded bits in, 160 PCM
//! samples out, per 20 ms frame.

mod error;
mod frame_decode;
mod param;
mod smoothing;
mod spectral;
mod synth;
mod tables;

pub use error::ImbeError;
pub use param::{ImbeParam, BIT_STREAM_LEN, NUM_BANDS_MAX, NUM_BANDS_MIN, NUM_HARMS_MAX, NUM_HARMS_MIN};

use frame::{PcmFrame, VoiceFrameBits};

/// Decodes one 20 ms P25 voice frame, mutating `param` in place and
/// returning the frame's 160 PCM samples.
///
/// Runs the full pipeline: frame-vector decode (with frame-repeat/mute
/// handling), voicing expansion, spectral amplitude decode and
/// enhancement, adaptive smoothing, then voiced/unvoiced synthesis.
pub fn decode(param: &mut ImbeParam, frame_vector: &VoiceFrameBits) -> Result<PcmFrame, ImbeError> {
    frame_decode::decode_frame_vector(param, frame_vector)?;

    if !param.mute_audio {
        frame_decode::v_uv_decode(param);
        spectral::sa_decode(param);
        spectral::sa_enh(param);
        smoothing::adaptive_smoothing(param);
    }

    Ok(synth::synthesize(param))
}
